// Copyright (c) 2024 The vk-command developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

use super::{CommandBuffer, SecondaryLevel};
use crate::{
    device::DeviceInterface,
    fatal_device_error,
    framebuffer::{FramebufferAbstract, RenderPassAbstract},
    OomError,
};
use ash::vk;
use std::sync::Arc;

/// A command buffer that is executed from within a primary buffer's render pass.
pub type SecondaryCommandBuffer = CommandBuffer<SecondaryLevel>;

impl CommandBuffer<SecondaryLevel> {
    /// Allocates a secondary command buffer from the device's command pool.
    pub fn alloc(device: &dyn DeviceInterface) -> Result<SecondaryCommandBuffer, OomError> {
        CommandBuffer::alloc_raw(device, SecondaryLevel)
    }

    /// Begins recording against `compatible_render_pass`.
    ///
    /// A secondary buffer always records render pass contents, so it inherits the
    /// render pass it will execute inside of. The primary buffer that later executes
    /// this one must have a render pass open that is compatible with the inherited
    /// one. Passing the target `framebuffer` is optional but lets the driver skip a
    /// lookup at execute time.
    ///
    /// The inherited render pass is tracked, and stays readable through
    /// [`active_render_pass`](Self::active_render_pass) after `end` so the executing
    /// primary buffer can check compatibility.
    pub fn begin(
        &mut self,
        device: &dyn DeviceInterface,
        framebuffer: Option<&Arc<dyn FramebufferAbstract>>,
        compatible_render_pass: &Arc<dyn RenderPassAbstract>,
    ) {
        debug_assert!(!self.is_active);

        self.active_render_pass = Some(compatible_render_pass.clone());
        self.tracker.add_resource(compatible_render_pass.clone());
        if let Some(framebuffer) = framebuffer {
            self.tracker.add_resource(framebuffer.clone());
        }

        let inheritance_info = vk::CommandBufferInheritanceInfo::default()
            .render_pass(compatible_render_pass.handle())
            .subpass(0)
            .framebuffer(
                framebuffer.map_or(vk::Framebuffer::null(), |framebuffer| framebuffer.handle()),
            );

        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(
                vk::CommandBufferUsageFlags::RENDER_PASS_CONTINUE
                    | vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
            )
            .inheritance_info(&inheritance_info);

        if let Err(err) = device.begin_command_buffer(self.handle, &begin_info) {
            fatal_device_error("failed to begin secondary command buffer", err);
        }
        self.is_active = true;
    }

    /// Ends recording.
    ///
    /// The inherited render pass reference is kept; it is consumed by the primary
    /// buffer's compatibility check at execute time and cleared on the next `begin`.
    pub fn end(&mut self, device: &dyn DeviceInterface) {
        debug_assert!(self.is_active);

        if let Err(err) = device.end_command_buffer(self.handle) {
            fatal_device_error("failed to end secondary command buffer", err);
        }
        self.invalidate_state();
        self.is_active = false;
    }

    /// Resets the buffer for reuse, releasing every tracked resource including the
    /// inherited render pass.
    pub fn reset(&mut self, device: &dyn DeviceInterface) {
        self.active_render_pass = None;
        self.reset_common(device);
    }

    /// Releases every tracked resource and frees the native handle.
    pub fn free(mut self, device: &dyn DeviceInterface) {
        debug_assert!(!self.is_active);
        self.active_render_pass = None;
        self.free_common(device);
    }

    /// Drops every tracked reference without recycling and without any device call.
    /// Used when the device has been lost.
    pub fn abandon(mut self) {
        self.active_render_pass = None;
        self.abandon_common();
    }
}

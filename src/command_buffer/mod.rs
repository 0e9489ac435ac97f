// Copyright (c) 2024 The vk-command developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Command buffer recording and lifecycle.
//!
//! A [`CommandBuffer`] wraps one native command buffer and is generic over its level:
//! [`PrimaryCommandBuffer`]s are submitted directly to a device queue, while
//! [`SecondaryCommandBuffer`]s can only be executed from within an active render pass
//! of a primary buffer. The recording surface that both levels share (barriers,
//! vertex/index/descriptor/pipeline binding, draws, dynamic state) is implemented
//! once here; the level types carry the per-level extra state (the primary's
//! submission fence and executed-secondary list).
//!
//! A command buffer is a state machine with two states. It starts out *inactive*
//! right after allocation, becomes *active* between `begin` and `end`, and recording
//! operations may only be called while active. `reset` and the free/abandon paths may
//! only be called while inactive. These preconditions are `debug_assert!`ed; violating
//! them in a release build is unchecked.
//!
//! Every recording operation registers the resources the recorded command depends on
//! with the buffer's [`ResourceTracker`], so they stay alive until the buffer is reset
//! after the device has finished with it.

mod primary;
mod secondary;
mod state_cacher;
mod tracker;

pub use self::{
    primary::PrimaryCommandBuffer,
    secondary::SecondaryCommandBuffer,
    state_cacher::{StateCacher, StateCacherOutcome, MAX_VERTEX_BINDINGS},
    tracker::ResourceTracker,
};

use crate::{
    buffer::BufferAccess,
    device::DeviceInterface,
    fatal_device_error,
    framebuffer::RenderPassAbstract,
    pipeline::{PipelineAbstract, PipelineStateAbstract},
    resource::{RecycledResource, Resource},
    OomError,
};
use ash::vk;
use std::sync::Arc;

/// The payload of a pipeline barrier command.
///
/// Barriers affecting buffers, and image barriers requiring subpass self-dependencies,
/// are not supported inside a render pass; [`pipeline_barrier`] therefore requires
/// that no render pass is active, whatever the payload.
///
/// [`pipeline_barrier`]: CommandBuffer::pipeline_barrier
#[derive(Clone)]
pub enum PipelineBarrier<'a> {
    /// A global memory barrier.
    Memory(vk::MemoryBarrier<'a>),
    /// A barrier over a range of a buffer.
    Buffer(vk::BufferMemoryBarrier<'a>),
    /// A barrier over a subresource range of an image.
    Image(vk::ImageMemoryBarrier<'a>),
}

/// Command buffer level.
pub trait Level {
    /// Returns the raw level value.
    fn raw_level() -> vk::CommandBufferLevel;
}

/// Level of command buffers that are submitted directly to a device queue.
pub struct PrimaryLevel {
    submit_fence: vk::Fence,
    secondary_command_buffers: Vec<SecondaryCommandBuffer>,
}

/// Level of command buffers that are executed from within a primary buffer's render
/// pass.
pub struct SecondaryLevel;

impl Level for PrimaryLevel {
    #[inline]
    fn raw_level() -> vk::CommandBufferLevel {
        vk::CommandBufferLevel::PRIMARY
    }
}

impl Level for SecondaryLevel {
    #[inline]
    fn raw_level() -> vk::CommandBufferLevel {
        vk::CommandBufferLevel::SECONDARY
    }
}

/// A native command buffer, together with the references and cached state that make
/// it safe to record, submit and reuse.
pub struct CommandBuffer<L: Level> {
    handle: vk::CommandBuffer,
    is_active: bool,
    // Back-reference only; the pass tracked for lifetime purposes is registered with
    // the tracker separately.
    active_render_pass: Option<Arc<dyn RenderPassAbstract>>,
    tracker: ResourceTracker,
    state: StateCacher,
    level: L,
}

impl<L: Level> CommandBuffer<L> {
    fn alloc_raw(
        device: &dyn DeviceInterface,
        level: L,
    ) -> Result<CommandBuffer<L>, OomError> {
        let handle = device.allocate_command_buffer(L::raw_level())?;
        Ok(CommandBuffer {
            handle,
            is_active: false,
            active_render_pass: None,
            tracker: ResourceTracker::new(),
            state: StateCacher::new(),
            level,
        })
    }

    /// Returns the raw command buffer handle.
    #[inline]
    pub fn handle(&self) -> vk::CommandBuffer {
        self.handle
    }

    /// Returns true while the buffer is recording, between `begin` and `end`.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Returns the render pass the buffer is currently recording inside of, if any.
    ///
    /// For a secondary buffer this is the inherited render pass, which stays set
    /// after `end` until the next `begin`.
    #[inline]
    pub fn active_render_pass(&self) -> Option<&Arc<dyn RenderPassAbstract>> {
        self.active_render_pass.as_ref()
    }

    /// Returns the number of resource references the buffer currently holds.
    #[inline]
    pub fn tracked_resource_count(&self) -> usize {
        self.tracker.len()
    }

    /// Takes a reference on a resource a recorded command depends on.
    ///
    /// Recording operations call this themselves; it is public for collaborators that
    /// record through the raw handle.
    #[inline]
    pub fn add_resource(&mut self, resource: Arc<dyn Resource>) {
        debug_assert!(self.is_active);
        self.tracker.add_resource(resource);
    }

    /// Like [`add_resource`](Self::add_resource), for resources that are recycled
    /// rather than destroyed on release.
    #[inline]
    pub fn add_recycled_resource(&mut self, resource: Arc<dyn RecycledResource>) {
        debug_assert!(self.is_active);
        self.tracker.add_recycled_resource(resource);
    }

    /// Records a pipeline barrier.
    ///
    /// Must be recording, and no render pass may be active.
    pub fn pipeline_barrier(
        &self,
        device: &dyn DeviceInterface,
        src_stage_mask: vk::PipelineStageFlags,
        dst_stage_mask: vk::PipelineStageFlags,
        by_region: bool,
        barrier: &PipelineBarrier<'_>,
    ) {
        debug_assert!(self.is_active);
        debug_assert!(self.active_render_pass.is_none());

        let dependency_flags = if by_region {
            vk::DependencyFlags::BY_REGION
        } else {
            vk::DependencyFlags::empty()
        };

        match barrier {
            PipelineBarrier::Memory(barrier) => device.cmd_pipeline_barrier(
                self.handle,
                src_stage_mask,
                dst_stage_mask,
                dependency_flags,
                std::slice::from_ref(barrier),
                &[],
                &[],
            ),
            PipelineBarrier::Buffer(barrier) => device.cmd_pipeline_barrier(
                self.handle,
                src_stage_mask,
                dst_stage_mask,
                dependency_flags,
                &[],
                std::slice::from_ref(barrier),
                &[],
            ),
            PipelineBarrier::Image(barrier) => device.cmd_pipeline_barrier(
                self.handle,
                src_stage_mask,
                dst_stage_mask,
                dependency_flags,
                &[],
                &[],
                std::slice::from_ref(barrier),
            ),
        }
    }

    /// Binds a vertex buffer to `binding`, eliding the native call if the same buffer
    /// is already bound there.
    ///
    /// The buffer is tracked either way: even an elided rebind requires the buffer to
    /// stay alive for this command buffer's execution.
    pub fn bind_input_buffer(
        &mut self,
        device: &dyn DeviceInterface,
        binding: u32,
        buffer: &Arc<dyn BufferAccess>,
    ) {
        debug_assert!(self.is_active);
        let inner = buffer.inner();
        debug_assert!(inner.buffer != vk::Buffer::null());

        if self.state.bind_vertex_buffer(binding, inner.buffer) == StateCacherOutcome::NeedChange
        {
            device.cmd_bind_vertex_buffers(
                self.handle,
                binding,
                &[inner.buffer],
                &[inner.offset],
            );
        }
        self.tracker.add_resource(buffer.clone());
    }

    /// Binds the index buffer, eliding the native call if it is already bound.
    ///
    /// Indices are 16-bit; no caller records any other index width.
    pub fn bind_index_buffer(
        &mut self,
        device: &dyn DeviceInterface,
        buffer: &Arc<dyn BufferAccess>,
    ) {
        debug_assert!(self.is_active);
        let inner = buffer.inner();
        debug_assert!(inner.buffer != vk::Buffer::null());

        if self.state.bind_index_buffer(inner.buffer) == StateCacherOutcome::NeedChange {
            device.cmd_bind_index_buffer(
                self.handle,
                inner.buffer,
                inner.offset,
                vk::IndexType::UINT16,
            );
        }
        self.tracker.add_resource(buffer.clone());
    }

    /// Binds a graphics pipeline and tracks it.
    pub fn bind_pipeline(
        &mut self,
        device: &dyn DeviceInterface,
        pipeline: &Arc<dyn PipelineAbstract>,
    ) {
        debug_assert!(self.is_active);
        device.cmd_bind_pipeline(
            self.handle,
            vk::PipelineBindPoint::GRAPHICS,
            pipeline.handle(),
        );
        self.tracker.add_resource(pipeline.clone());
    }

    /// Binds descriptor sets through a pipeline state object, which declares the
    /// resources the bound sets depend on.
    pub fn bind_descriptor_sets(
        &mut self,
        device: &dyn DeviceInterface,
        pipeline_state: &dyn PipelineStateAbstract,
        first_set: u32,
        descriptor_sets: &[vk::DescriptorSet],
        dynamic_offsets: &[u32],
    ) {
        debug_assert!(self.is_active);
        device.cmd_bind_descriptor_sets(
            self.handle,
            vk::PipelineBindPoint::GRAPHICS,
            pipeline_state.layout(),
            first_set,
            descriptor_sets,
            dynamic_offsets,
        );
        pipeline_state.record_uniform_resources(&mut self.tracker);
    }

    /// Binds descriptor sets with explicitly supplied resource dependencies, for call
    /// sites that don't go through a pipeline state object.
    pub fn bind_descriptor_sets_tracked(
        &mut self,
        device: &dyn DeviceInterface,
        resources: &[Arc<dyn Resource>],
        recycled_resources: &[Arc<dyn RecycledResource>],
        layout: vk::PipelineLayout,
        first_set: u32,
        descriptor_sets: &[vk::DescriptorSet],
        dynamic_offsets: &[u32],
    ) {
        debug_assert!(self.is_active);
        device.cmd_bind_descriptor_sets(
            self.handle,
            vk::PipelineBindPoint::GRAPHICS,
            layout,
            first_set,
            descriptor_sets,
            dynamic_offsets,
        );
        for resource in recycled_resources {
            self.tracker.add_recycled_resource(resource.clone());
        }
        for resource in resources {
            self.tracker.add_resource(resource.clone());
        }
    }

    /// Records a non-indexed draw. Geometry state is assumed already bound.
    ///
    /// Must be recording inside an active render pass.
    pub fn draw(
        &self,
        device: &dyn DeviceInterface,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) {
        debug_assert!(self.is_active);
        debug_assert!(self.active_render_pass.is_some());
        device.cmd_draw(
            self.handle,
            vertex_count,
            instance_count,
            first_vertex,
            first_instance,
        );
    }

    /// Records an indexed draw. Geometry state is assumed already bound.
    ///
    /// Must be recording inside an active render pass.
    pub fn draw_indexed(
        &self,
        device: &dyn DeviceInterface,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) {
        debug_assert!(self.is_active);
        debug_assert!(self.active_render_pass.is_some());
        device.cmd_draw_indexed(
            self.handle,
            index_count,
            instance_count,
            first_index,
            vertex_offset,
            first_instance,
        );
    }

    /// Clears regions of the current render pass's attachments.
    ///
    /// Must be recording inside an active render pass, with at least one attachment
    /// and one rect.
    pub fn clear_attachments(
        &self,
        device: &dyn DeviceInterface,
        attachments: &[vk::ClearAttachment],
        rects: &[vk::ClearRect],
    ) {
        debug_assert!(self.is_active);
        debug_assert!(self.active_render_pass.is_some());
        debug_assert!(!attachments.is_empty());
        debug_assert!(!rects.is_empty());

        #[cfg(debug_assertions)]
        {
            let render_pass = self.active_render_pass.as_ref().unwrap();
            for attachment in attachments {
                if attachment.aspect_mask == vk::ImageAspectFlags::COLOR {
                    assert_eq!(
                        render_pass.color_attachment_index(),
                        Some(attachment.color_attachment),
                    );
                }
            }
        }

        device.cmd_clear_attachments(self.handle, attachments, rects);
    }

    /// Sets the viewport, eliding the native call if it is unchanged.
    pub fn set_viewport(&mut self, device: &dyn DeviceInterface, viewport: &vk::Viewport) {
        debug_assert!(self.is_active);
        if self.state.set_viewport(viewport) == StateCacherOutcome::NeedChange {
            device.cmd_set_viewport(self.handle, 0, std::slice::from_ref(viewport));
        }
    }

    /// Sets the scissor rectangle, eliding the native call if it is unchanged.
    pub fn set_scissor(&mut self, device: &dyn DeviceInterface, scissor: &vk::Rect2D) {
        debug_assert!(self.is_active);
        if self.state.set_scissor(scissor) == StateCacherOutcome::NeedChange {
            device.cmd_set_scissor(self.handle, 0, std::slice::from_ref(scissor));
        }
    }

    /// Sets the blend constants, eliding the native call if they are unchanged.
    pub fn set_blend_constants(&mut self, device: &dyn DeviceInterface, constants: &[f32; 4]) {
        debug_assert!(self.is_active);
        if self.state.set_blend_constants(constants) == StateCacherOutcome::NeedChange {
            device.cmd_set_blend_constants(self.handle, constants);
        }
    }

    /// Forgets all cached bind and dynamic state, so that the next state-setting call
    /// of any kind issues a native command.
    ///
    /// Tracked resources and the render pass back-reference are not affected.
    #[inline]
    pub fn invalidate_state(&mut self) {
        self.state.invalidate();
    }

    /// Shared part of `reset`: releases tracked resources, restores state sentinels
    /// and resets the native buffer, retaining its driver-side resources for reuse.
    fn reset_common(&mut self, device: &dyn DeviceInterface) {
        debug_assert!(!self.is_active);
        self.tracker.release(device);
        self.invalidate_state();

        if let Err(err) = device.reset_command_buffer(self.handle) {
            fatal_device_error("failed to reset command buffer", err);
        }
    }

    /// Shared part of the free path: releases and recycles tracked resources, then
    /// returns the native handle to the command pool.
    fn free_common(&mut self, device: &dyn DeviceInterface) {
        debug_assert!(!self.is_active);
        self.tracker.free(device);
        device.free_command_buffer(self.handle);
    }

    /// Shared part of the abandon path: drops every tracked reference without
    /// recycling and without touching the device.
    fn abandon_common(&mut self) {
        debug_assert!(!self.is_active);
        self.tracker.abandon();
    }
}

impl<L: Level> Drop for CommandBuffer<L> {
    fn drop(&mut self) {
        // Any render pass must have been ended before the buffer is dropped.
        if !std::thread::panicking() {
            debug_assert!(!self.is_active || self.active_render_pass.is_none());
        }
    }
}

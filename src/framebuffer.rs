// Copyright (c) 2024 The vk-command developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Trait seams for render passes, framebuffers and render targets.
//!
//! Render pass creation and the render-pass compatibility algorithm are out of scope
//! here: this crate only *asserts* compatibility as a precondition when a render pass
//! is begun over a target or when a secondary buffer is executed inside a primary one.

use crate::{command_buffer::ResourceTracker, resource::Resource};
use ash::vk;

/// A render pass, as consumed by command buffer recording.
pub trait RenderPassAbstract: Resource {
    /// Returns the raw render pass handle.
    fn handle(&self) -> vk::RenderPass;

    /// Returns true if this render pass is compatible with `other`, in the sense of
    /// the Vulkan render pass compatibility rules.
    fn is_compatible_with(&self, other: &dyn RenderPassAbstract) -> bool;

    /// Returns true if this render pass can be used to render to `target`.
    fn is_compatible_with_target(&self, target: &dyn RenderTargetAbstract) -> bool;

    /// Returns the attachment index of the color attachment, if there is one.
    fn color_attachment_index(&self) -> Option<u32>;

    /// Returns the attachment index of the stencil attachment, if there is one.
    fn stencil_attachment_index(&self) -> Option<u32>;

    /// Returns the number of attachments this render pass clears on load.
    fn clear_value_count(&self) -> u32;
}

/// A framebuffer, as consumed by secondary command buffer inheritance.
pub trait FramebufferAbstract: Resource {
    /// Returns the raw framebuffer handle.
    fn handle(&self) -> vk::Framebuffer;
}

/// The target of a render pass: a framebuffer plus whatever attachment objects must
/// stay alive while commands rendering to it are in flight.
pub trait RenderTargetAbstract: Send + Sync {
    /// Returns the raw handle of the target's framebuffer.
    fn framebuffer(&self) -> vk::Framebuffer;

    /// Registers with `tracker` every resource that must outlive a command buffer
    /// rendering to this target: the framebuffer, attachment images and views, and so
    /// on.
    fn record_resources(&self, tracker: &mut ResourceTracker);
}

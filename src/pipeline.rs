// Copyright (c) 2024 The vk-command developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Trait seams for pipelines and pipeline state objects.

use crate::{command_buffer::ResourceTracker, resource::Resource};
use ash::vk;

/// A graphics pipeline, as consumed by [`bind_pipeline`].
///
/// [`bind_pipeline`]: crate::command_buffer::CommandBuffer::bind_pipeline
pub trait PipelineAbstract: Resource {
    /// Returns the raw pipeline handle.
    fn handle(&self) -> vk::Pipeline;
}

/// A pipeline state object: a pipeline plus the layout and descriptor resources that
/// go with it.
///
/// When descriptor sets are bound through a pipeline state, the state object declares
/// every uniform and descriptor dependency the bound sets carry by registering them
/// with the command buffer's resource tracker.
pub trait PipelineStateAbstract: Send + Sync {
    /// Returns the raw pipeline layout handle used to bind descriptor sets.
    fn layout(&self) -> vk::PipelineLayout;

    /// Registers with `tracker` every resource the currently bound descriptor sets
    /// depend on (uniform buffers, sampled images, descriptor set pool objects, ...).
    fn record_uniform_resources(&self, tracker: &mut ResourceTracker);
}

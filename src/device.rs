// Copyright (c) 2024 The vk-command developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! The native call-dispatch layer.
//!
//! Command buffers never call into Vulkan directly; every native entry point they use
//! is a method on the [`DeviceInterface`] function table. The [`Device`] type in this
//! module implements it over a loaded [`ash::Device`] and a command pool for real
//! hardware, and tests implement it with a recording mock. This keeps the recording
//! and submission logic testable without a live driver, and mirrors how the rest of a
//! renderer is expected to treat the dispatch layer: as an opaque table of function
//! pointers.

use crate::{command_buffer::SecondaryCommandBuffer, OomError, VulkanError};
use ash::vk;

/// The status of a fence, as reported by the device.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FenceStatus {
    /// The fence has been signaled.
    Signaled,
    /// The submission guarded by the fence has not completed yet.
    Unsignaled,
}

/// The table of native entry points consumed by command buffer recording, lifecycle
/// management and queue submission.
///
/// Every method maps one-to-one onto a Vulkan device-level function. Methods that
/// return `Result` surface the native `VkResult`; how a failure is treated (recoverable
/// allocation failure vs. fatal device error) is decided by the caller, not here.
pub trait DeviceInterface {
    // Command buffer lifecycle.

    /// Allocates one command buffer of the given level from the command pool.
    fn allocate_command_buffer(
        &self,
        level: vk::CommandBufferLevel,
    ) -> Result<vk::CommandBuffer, OomError>;

    /// Returns a command buffer to the command pool.
    fn free_command_buffer(&self, command_buffer: vk::CommandBuffer);

    /// Begins recording.
    fn begin_command_buffer(
        &self,
        command_buffer: vk::CommandBuffer,
        begin_info: &vk::CommandBufferBeginInfo<'_>,
    ) -> Result<(), VulkanError>;

    /// Ends recording.
    fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> Result<(), VulkanError>;

    /// Resets the command buffer to the initial state, retaining the driver-side
    /// resources attached to it.
    fn reset_command_buffer(&self, command_buffer: vk::CommandBuffer)
        -> Result<(), VulkanError>;

    // Recorded commands.

    fn cmd_pipeline_barrier(
        &self,
        command_buffer: vk::CommandBuffer,
        src_stage_mask: vk::PipelineStageFlags,
        dst_stage_mask: vk::PipelineStageFlags,
        dependency_flags: vk::DependencyFlags,
        memory_barriers: &[vk::MemoryBarrier<'_>],
        buffer_memory_barriers: &[vk::BufferMemoryBarrier<'_>],
        image_memory_barriers: &[vk::ImageMemoryBarrier<'_>],
    );

    fn cmd_bind_vertex_buffers(
        &self,
        command_buffer: vk::CommandBuffer,
        first_binding: u32,
        buffers: &[vk::Buffer],
        offsets: &[vk::DeviceSize],
    );

    fn cmd_bind_index_buffer(
        &self,
        command_buffer: vk::CommandBuffer,
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        index_type: vk::IndexType,
    );

    fn cmd_bind_descriptor_sets(
        &self,
        command_buffer: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        first_set: u32,
        descriptor_sets: &[vk::DescriptorSet],
        dynamic_offsets: &[u32],
    );

    fn cmd_bind_pipeline(
        &self,
        command_buffer: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        pipeline: vk::Pipeline,
    );

    fn cmd_draw(
        &self,
        command_buffer: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    );

    fn cmd_draw_indexed(
        &self,
        command_buffer: vk::CommandBuffer,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    );

    fn cmd_clear_attachments(
        &self,
        command_buffer: vk::CommandBuffer,
        attachments: &[vk::ClearAttachment],
        rects: &[vk::ClearRect],
    );

    fn cmd_set_viewport(
        &self,
        command_buffer: vk::CommandBuffer,
        first_viewport: u32,
        viewports: &[vk::Viewport],
    );

    fn cmd_set_scissor(
        &self,
        command_buffer: vk::CommandBuffer,
        first_scissor: u32,
        scissors: &[vk::Rect2D],
    );

    fn cmd_set_blend_constants(
        &self,
        command_buffer: vk::CommandBuffer,
        blend_constants: &[f32; 4],
    );

    fn cmd_begin_render_pass(
        &self,
        command_buffer: vk::CommandBuffer,
        begin_info: &vk::RenderPassBeginInfo<'_>,
        contents: vk::SubpassContents,
    );

    fn cmd_end_render_pass(&self, command_buffer: vk::CommandBuffer);

    fn cmd_execute_commands(
        &self,
        command_buffer: vk::CommandBuffer,
        secondary_command_buffers: &[vk::CommandBuffer],
    );

    fn cmd_copy_image(
        &self,
        command_buffer: vk::CommandBuffer,
        src_image: vk::Image,
        src_layout: vk::ImageLayout,
        dst_image: vk::Image,
        dst_layout: vk::ImageLayout,
        regions: &[vk::ImageCopy],
    );

    fn cmd_blit_image(
        &self,
        command_buffer: vk::CommandBuffer,
        src_image: vk::Image,
        src_layout: vk::ImageLayout,
        dst_image: vk::Image,
        dst_layout: vk::ImageLayout,
        regions: &[vk::ImageBlit],
        filter: vk::Filter,
    );

    fn cmd_copy_image_to_buffer(
        &self,
        command_buffer: vk::CommandBuffer,
        src_image: vk::Image,
        src_layout: vk::ImageLayout,
        dst_buffer: vk::Buffer,
        regions: &[vk::BufferImageCopy],
    );

    fn cmd_copy_buffer_to_image(
        &self,
        command_buffer: vk::CommandBuffer,
        src_buffer: vk::Buffer,
        dst_image: vk::Image,
        dst_layout: vk::ImageLayout,
        regions: &[vk::BufferImageCopy],
    );

    fn cmd_copy_buffer(
        &self,
        command_buffer: vk::CommandBuffer,
        src_buffer: vk::Buffer,
        dst_buffer: vk::Buffer,
        regions: &[vk::BufferCopy],
    );

    fn cmd_update_buffer(
        &self,
        command_buffer: vk::CommandBuffer,
        dst_buffer: vk::Buffer,
        dst_offset: vk::DeviceSize,
        data: &[u8],
    );

    fn cmd_clear_color_image(
        &self,
        command_buffer: vk::CommandBuffer,
        image: vk::Image,
        layout: vk::ImageLayout,
        color: &vk::ClearColorValue,
        ranges: &[vk::ImageSubresourceRange],
    );

    fn cmd_clear_depth_stencil_image(
        &self,
        command_buffer: vk::CommandBuffer,
        image: vk::Image,
        layout: vk::ImageLayout,
        value: &vk::ClearDepthStencilValue,
        ranges: &[vk::ImageSubresourceRange],
    );

    fn cmd_resolve_image(
        &self,
        command_buffer: vk::CommandBuffer,
        src_image: vk::Image,
        src_layout: vk::ImageLayout,
        dst_image: vk::Image,
        dst_layout: vk::ImageLayout,
        regions: &[vk::ImageResolve],
    );

    // Fences.

    /// Creates an unsignaled fence.
    fn create_fence(&self) -> Result<vk::Fence, VulkanError>;

    /// Resets a fence to the unsignaled state.
    fn reset_fence(&self, fence: vk::Fence) -> Result<(), VulkanError>;

    /// Destroys a fence.
    fn destroy_fence(&self, fence: vk::Fence);

    /// Queries the current status of a fence without blocking.
    fn fence_status(&self, fence: vk::Fence) -> Result<FenceStatus, VulkanError>;

    /// Blocks until the fence is signaled or `timeout_ns` nanoseconds have elapsed.
    /// Returns [`VulkanError::Timeout`] if the wait timed out.
    fn wait_for_fence(&self, fence: vk::Fence, timeout_ns: u64) -> Result<(), VulkanError>;

    // Queue submission.

    /// Submits one batch to a queue. `wait_stages` runs parallel to `wait_semaphores`.
    fn queue_submit(
        &self,
        queue: vk::Queue,
        wait_semaphores: &[vk::Semaphore],
        wait_stages: &[vk::PipelineStageFlags],
        command_buffers: &[vk::CommandBuffer],
        signal_semaphores: &[vk::Semaphore],
        fence: vk::Fence,
    ) -> Result<(), VulkanError>;
}

/// Recycling target for the secondary command buffers a finished primary buffer hands
/// back when it is reset.
pub trait ResourceProvider {
    /// Takes back a secondary command buffer for later reuse.
    fn recycle_secondary_command_buffer(&self, command_buffer: SecondaryCommandBuffer);
}

/// [`DeviceInterface`] implementation over a loaded [`ash::Device`] and the command
/// pool that command buffers are allocated from.
///
/// The command pool requires external synchronization: all command buffers allocated
/// from one `Device` must be recorded, reset and freed from one thread at a time.
pub struct Device {
    device: ash::Device,
    command_pool: vk::CommandPool,
}

impl Device {
    /// Wraps a device and the command pool to allocate command buffers from.
    ///
    /// Both handles must outlive the returned object and every command buffer
    /// allocated through it.
    #[inline]
    pub fn from_raw(device: ash::Device, command_pool: vk::CommandPool) -> Device {
        Device {
            device,
            command_pool,
        }
    }

    /// Returns the wrapped `ash` device.
    #[inline]
    pub fn ash_device(&self) -> &ash::Device {
        &self.device
    }
}

impl DeviceInterface for Device {
    fn allocate_command_buffer(
        &self,
        level: vk::CommandBufferLevel,
    ) -> Result<vk::CommandBuffer, OomError> {
        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.command_pool)
            .level(level)
            .command_buffer_count(1);

        let command_buffers = unsafe { self.device.allocate_command_buffers(&allocate_info) }
            .map_err(|err| OomError::from(VulkanError::from(err)))?;
        Ok(command_buffers[0])
    }

    fn free_command_buffer(&self, command_buffer: vk::CommandBuffer) {
        unsafe {
            self.device
                .free_command_buffers(self.command_pool, &[command_buffer]);
        }
    }

    fn begin_command_buffer(
        &self,
        command_buffer: vk::CommandBuffer,
        begin_info: &vk::CommandBufferBeginInfo<'_>,
    ) -> Result<(), VulkanError> {
        unsafe {
            self.device
                .begin_command_buffer(command_buffer, begin_info)
                .map_err(VulkanError::from)
        }
    }

    fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> Result<(), VulkanError> {
        unsafe {
            self.device
                .end_command_buffer(command_buffer)
                .map_err(VulkanError::from)
        }
    }

    fn reset_command_buffer(
        &self,
        command_buffer: vk::CommandBuffer,
    ) -> Result<(), VulkanError> {
        unsafe {
            self.device
                .reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty())
                .map_err(VulkanError::from)
        }
    }

    fn cmd_pipeline_barrier(
        &self,
        command_buffer: vk::CommandBuffer,
        src_stage_mask: vk::PipelineStageFlags,
        dst_stage_mask: vk::PipelineStageFlags,
        dependency_flags: vk::DependencyFlags,
        memory_barriers: &[vk::MemoryBarrier<'_>],
        buffer_memory_barriers: &[vk::BufferMemoryBarrier<'_>],
        image_memory_barriers: &[vk::ImageMemoryBarrier<'_>],
    ) {
        unsafe {
            self.device.cmd_pipeline_barrier(
                command_buffer,
                src_stage_mask,
                dst_stage_mask,
                dependency_flags,
                memory_barriers,
                buffer_memory_barriers,
                image_memory_barriers,
            );
        }
    }

    fn cmd_bind_vertex_buffers(
        &self,
        command_buffer: vk::CommandBuffer,
        first_binding: u32,
        buffers: &[vk::Buffer],
        offsets: &[vk::DeviceSize],
    ) {
        unsafe {
            self.device
                .cmd_bind_vertex_buffers(command_buffer, first_binding, buffers, offsets);
        }
    }

    fn cmd_bind_index_buffer(
        &self,
        command_buffer: vk::CommandBuffer,
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        index_type: vk::IndexType,
    ) {
        unsafe {
            self.device
                .cmd_bind_index_buffer(command_buffer, buffer, offset, index_type);
        }
    }

    fn cmd_bind_descriptor_sets(
        &self,
        command_buffer: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        layout: vk::PipelineLayout,
        first_set: u32,
        descriptor_sets: &[vk::DescriptorSet],
        dynamic_offsets: &[u32],
    ) {
        unsafe {
            self.device.cmd_bind_descriptor_sets(
                command_buffer,
                bind_point,
                layout,
                first_set,
                descriptor_sets,
                dynamic_offsets,
            );
        }
    }

    fn cmd_bind_pipeline(
        &self,
        command_buffer: vk::CommandBuffer,
        bind_point: vk::PipelineBindPoint,
        pipeline: vk::Pipeline,
    ) {
        unsafe {
            self.device
                .cmd_bind_pipeline(command_buffer, bind_point, pipeline);
        }
    }

    fn cmd_draw(
        &self,
        command_buffer: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) {
        unsafe {
            self.device.cmd_draw(
                command_buffer,
                vertex_count,
                instance_count,
                first_vertex,
                first_instance,
            );
        }
    }

    fn cmd_draw_indexed(
        &self,
        command_buffer: vk::CommandBuffer,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        first_instance: u32,
    ) {
        unsafe {
            self.device.cmd_draw_indexed(
                command_buffer,
                index_count,
                instance_count,
                first_index,
                vertex_offset,
                first_instance,
            );
        }
    }

    fn cmd_clear_attachments(
        &self,
        command_buffer: vk::CommandBuffer,
        attachments: &[vk::ClearAttachment],
        rects: &[vk::ClearRect],
    ) {
        unsafe {
            self.device
                .cmd_clear_attachments(command_buffer, attachments, rects);
        }
    }

    fn cmd_set_viewport(
        &self,
        command_buffer: vk::CommandBuffer,
        first_viewport: u32,
        viewports: &[vk::Viewport],
    ) {
        unsafe {
            self.device
                .cmd_set_viewport(command_buffer, first_viewport, viewports);
        }
    }

    fn cmd_set_scissor(
        &self,
        command_buffer: vk::CommandBuffer,
        first_scissor: u32,
        scissors: &[vk::Rect2D],
    ) {
        unsafe {
            self.device
                .cmd_set_scissor(command_buffer, first_scissor, scissors);
        }
    }

    fn cmd_set_blend_constants(
        &self,
        command_buffer: vk::CommandBuffer,
        blend_constants: &[f32; 4],
    ) {
        unsafe {
            self.device
                .cmd_set_blend_constants(command_buffer, blend_constants);
        }
    }

    fn cmd_begin_render_pass(
        &self,
        command_buffer: vk::CommandBuffer,
        begin_info: &vk::RenderPassBeginInfo<'_>,
        contents: vk::SubpassContents,
    ) {
        unsafe {
            self.device
                .cmd_begin_render_pass(command_buffer, begin_info, contents);
        }
    }

    fn cmd_end_render_pass(&self, command_buffer: vk::CommandBuffer) {
        unsafe {
            self.device.cmd_end_render_pass(command_buffer);
        }
    }

    fn cmd_execute_commands(
        &self,
        command_buffer: vk::CommandBuffer,
        secondary_command_buffers: &[vk::CommandBuffer],
    ) {
        unsafe {
            self.device
                .cmd_execute_commands(command_buffer, secondary_command_buffers);
        }
    }

    fn cmd_copy_image(
        &self,
        command_buffer: vk::CommandBuffer,
        src_image: vk::Image,
        src_layout: vk::ImageLayout,
        dst_image: vk::Image,
        dst_layout: vk::ImageLayout,
        regions: &[vk::ImageCopy],
    ) {
        unsafe {
            self.device.cmd_copy_image(
                command_buffer,
                src_image,
                src_layout,
                dst_image,
                dst_layout,
                regions,
            );
        }
    }

    fn cmd_blit_image(
        &self,
        command_buffer: vk::CommandBuffer,
        src_image: vk::Image,
        src_layout: vk::ImageLayout,
        dst_image: vk::Image,
        dst_layout: vk::ImageLayout,
        regions: &[vk::ImageBlit],
        filter: vk::Filter,
    ) {
        unsafe {
            self.device.cmd_blit_image(
                command_buffer,
                src_image,
                src_layout,
                dst_image,
                dst_layout,
                regions,
                filter,
            );
        }
    }

    fn cmd_copy_image_to_buffer(
        &self,
        command_buffer: vk::CommandBuffer,
        src_image: vk::Image,
        src_layout: vk::ImageLayout,
        dst_buffer: vk::Buffer,
        regions: &[vk::BufferImageCopy],
    ) {
        unsafe {
            self.device.cmd_copy_image_to_buffer(
                command_buffer,
                src_image,
                src_layout,
                dst_buffer,
                regions,
            );
        }
    }

    fn cmd_copy_buffer_to_image(
        &self,
        command_buffer: vk::CommandBuffer,
        src_buffer: vk::Buffer,
        dst_image: vk::Image,
        dst_layout: vk::ImageLayout,
        regions: &[vk::BufferImageCopy],
    ) {
        unsafe {
            self.device.cmd_copy_buffer_to_image(
                command_buffer,
                src_buffer,
                dst_image,
                dst_layout,
                regions,
            );
        }
    }

    fn cmd_copy_buffer(
        &self,
        command_buffer: vk::CommandBuffer,
        src_buffer: vk::Buffer,
        dst_buffer: vk::Buffer,
        regions: &[vk::BufferCopy],
    ) {
        unsafe {
            self.device
                .cmd_copy_buffer(command_buffer, src_buffer, dst_buffer, regions);
        }
    }

    fn cmd_update_buffer(
        &self,
        command_buffer: vk::CommandBuffer,
        dst_buffer: vk::Buffer,
        dst_offset: vk::DeviceSize,
        data: &[u8],
    ) {
        unsafe {
            self.device
                .cmd_update_buffer(command_buffer, dst_buffer, dst_offset, data);
        }
    }

    fn cmd_clear_color_image(
        &self,
        command_buffer: vk::CommandBuffer,
        image: vk::Image,
        layout: vk::ImageLayout,
        color: &vk::ClearColorValue,
        ranges: &[vk::ImageSubresourceRange],
    ) {
        unsafe {
            self.device
                .cmd_clear_color_image(command_buffer, image, layout, color, ranges);
        }
    }

    fn cmd_clear_depth_stencil_image(
        &self,
        command_buffer: vk::CommandBuffer,
        image: vk::Image,
        layout: vk::ImageLayout,
        value: &vk::ClearDepthStencilValue,
        ranges: &[vk::ImageSubresourceRange],
    ) {
        unsafe {
            self.device
                .cmd_clear_depth_stencil_image(command_buffer, image, layout, value, ranges);
        }
    }

    fn cmd_resolve_image(
        &self,
        command_buffer: vk::CommandBuffer,
        src_image: vk::Image,
        src_layout: vk::ImageLayout,
        dst_image: vk::Image,
        dst_layout: vk::ImageLayout,
        regions: &[vk::ImageResolve],
    ) {
        unsafe {
            self.device.cmd_resolve_image(
                command_buffer,
                src_image,
                src_layout,
                dst_image,
                dst_layout,
                regions,
            );
        }
    }

    fn create_fence(&self) -> Result<vk::Fence, VulkanError> {
        let create_info = vk::FenceCreateInfo::default();
        unsafe {
            self.device
                .create_fence(&create_info, None)
                .map_err(VulkanError::from)
        }
    }

    fn reset_fence(&self, fence: vk::Fence) -> Result<(), VulkanError> {
        unsafe { self.device.reset_fences(&[fence]).map_err(VulkanError::from) }
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        unsafe {
            self.device.destroy_fence(fence, None);
        }
    }

    fn fence_status(&self, fence: vk::Fence) -> Result<FenceStatus, VulkanError> {
        match unsafe { self.device.get_fence_status(fence) } {
            Ok(true) => Ok(FenceStatus::Signaled),
            Ok(false) => Ok(FenceStatus::Unsignaled),
            Err(err) => Err(VulkanError::from(err)),
        }
    }

    fn wait_for_fence(&self, fence: vk::Fence, timeout_ns: u64) -> Result<(), VulkanError> {
        unsafe {
            self.device
                .wait_for_fences(&[fence], true, timeout_ns)
                .map_err(VulkanError::from)
        }
    }

    fn queue_submit(
        &self,
        queue: vk::Queue,
        wait_semaphores: &[vk::Semaphore],
        wait_stages: &[vk::PipelineStageFlags],
        command_buffers: &[vk::CommandBuffer],
        signal_semaphores: &[vk::Semaphore],
        fence: vk::Fence,
    ) -> Result<(), VulkanError> {
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(wait_semaphores)
            .wait_dst_stage_mask(wait_stages)
            .command_buffers(command_buffers)
            .signal_semaphores(signal_semaphores);

        unsafe {
            self.device
                .queue_submit(queue, &[submit_info], fence)
                .map_err(VulkanError::from)
        }
    }
}

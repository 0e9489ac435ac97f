// Copyright (c) 2024 The vk-command developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

use super::{CommandBuffer, PrimaryLevel, SecondaryCommandBuffer};
use crate::{
    buffer::BufferAccess,
    device::{DeviceInterface, FenceStatus, ResourceProvider},
    fatal_device_error,
    framebuffer::{RenderPassAbstract, RenderTargetAbstract},
    image::ImageAccess,
    resource::Resource,
    sync::{SemaphoreAccess, SubmitLock, SyncQueue},
    DeviceSize, OomError,
};
use ash::vk;
use smallvec::SmallVec;
use std::sync::Arc;

/// Largest payload accepted by [`update_buffer`], reflecting the native limit on
/// inline buffer updates.
///
/// [`update_buffer`]: PrimaryCommandBuffer::update_buffer
const MAX_UPDATE_BUFFER_SIZE: DeviceSize = 65536;

/// A command buffer that is submitted directly to a device queue.
pub type PrimaryCommandBuffer = CommandBuffer<PrimaryLevel>;

impl CommandBuffer<PrimaryLevel> {
    /// Allocates a primary command buffer from the device's command pool.
    ///
    /// Allocation failure is recoverable: the caller decides whether to retry or give
    /// up.
    pub fn alloc(device: &dyn DeviceInterface) -> Result<PrimaryCommandBuffer, OomError> {
        CommandBuffer::alloc_raw(
            device,
            PrimaryLevel {
                submit_fence: vk::Fence::null(),
                secondary_command_buffers: Vec::new(),
            },
        )
    }

    /// Begins recording. The buffer must be inactive.
    pub fn begin(&mut self, device: &dyn DeviceInterface) {
        debug_assert!(!self.is_active);
        let begin_info = vk::CommandBufferBeginInfo::default()
            .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);

        if let Err(err) = device.begin_command_buffer(self.handle, &begin_info) {
            fatal_device_error("failed to begin command buffer", err);
        }
        self.is_active = true;
    }

    /// Ends recording. The buffer must be recording, with no render pass left open.
    pub fn end(&mut self, device: &dyn DeviceInterface) {
        debug_assert!(self.is_active);
        debug_assert!(self.active_render_pass.is_none());

        if let Err(err) = device.end_command_buffer(self.handle) {
            fatal_device_error("failed to end command buffer", err);
        }
        self.invalidate_state();
        self.is_active = false;
    }

    /// Begins a render pass over `target`.
    ///
    /// The buffer must be recording with no render pass currently open, and
    /// `render_pass` must be compatible with `target`; compatibility is a
    /// precondition, not derived here. `bounds` becomes the render area. If
    /// `for_secondary_command_buffers` is set, the pass contents are recorded through
    /// [`execute_commands`](Self::execute_commands) rather than inline.
    ///
    /// The render pass and every resource the target requires are tracked.
    pub fn begin_render_pass(
        &mut self,
        device: &dyn DeviceInterface,
        render_pass: &Arc<dyn RenderPassAbstract>,
        clear_values: &[vk::ClearValue],
        target: &dyn RenderTargetAbstract,
        bounds: vk::Rect2D,
        for_secondary_command_buffers: bool,
    ) {
        debug_assert!(self.is_active);
        debug_assert!(self.active_render_pass.is_none());
        debug_assert!(render_pass.is_compatible_with_target(target));

        // TODO: have clear_value_count return the index of the last attachment that
        // requires a clear instead of the number of total clears.
        let clear_value_count = if render_pass.stencil_attachment_index().is_some() {
            if render_pass.clear_value_count() != 0 {
                2
            } else {
                0
            }
        } else {
            render_pass.clear_value_count()
        };
        debug_assert!(clear_values.len() >= clear_value_count as usize);

        let begin_info = vk::RenderPassBeginInfo::default()
            .render_pass(render_pass.handle())
            .framebuffer(target.framebuffer())
            .render_area(bounds)
            .clear_values(&clear_values[..clear_value_count as usize]);

        let contents = if for_secondary_command_buffers {
            vk::SubpassContents::SECONDARY_COMMAND_BUFFERS
        } else {
            vk::SubpassContents::INLINE
        };

        device.cmd_begin_render_pass(self.handle, &begin_info, contents);
        self.active_render_pass = Some(render_pass.clone());
        self.tracker.add_resource(render_pass.clone());
        target.record_resources(&mut self.tracker);
    }

    /// Ends the open render pass.
    pub fn end_render_pass(&mut self, device: &dyn DeviceInterface) {
        debug_assert!(self.is_active);
        debug_assert!(self.active_render_pass.is_some());
        device.cmd_end_render_pass(self.handle);
        self.active_render_pass = None;
    }

    /// Executes an already-ended secondary command buffer inside the open render
    /// pass.
    ///
    /// The open render pass must be compatible with the render pass the secondary
    /// buffer was recorded against. The secondary buffer is kept by this primary
    /// buffer and handed back to the resource provider on the next `reset`.
    ///
    /// Executing a secondary buffer invalidates all state except render pass state:
    /// bound buffers, pipelines and dynamic state must be set again afterwards.
    pub fn execute_commands(
        &mut self,
        device: &dyn DeviceInterface,
        buffer: SecondaryCommandBuffer,
    ) {
        debug_assert!(self.is_active);
        debug_assert!(!buffer.is_active);
        debug_assert!(self.active_render_pass.is_some());
        #[cfg(debug_assertions)]
        {
            let own_pass = self.active_render_pass.as_ref().unwrap();
            let inherited = buffer
                .active_render_pass
                .as_ref()
                .expect("secondary command buffer was never begun");
            assert!(own_pass.is_compatible_with(&**inherited));
        }

        device.cmd_execute_commands(self.handle, &[buffer.handle]);
        self.level.secondary_command_buffers.push(buffer);
        self.invalidate_state();
    }

    /// Copies regions between two images. No render pass may be open.
    pub fn copy_image(
        &mut self,
        device: &dyn DeviceInterface,
        src_image: &Arc<dyn ImageAccess>,
        src_layout: vk::ImageLayout,
        dst_image: &Arc<dyn ImageAccess>,
        dst_layout: vk::ImageLayout,
        regions: &[vk::ImageCopy],
    ) {
        debug_assert!(self.is_active);
        debug_assert!(self.active_render_pass.is_none());
        self.tracker.add_resource(src_image.clone());
        self.tracker.add_resource(dst_image.clone());
        device.cmd_copy_image(
            self.handle,
            src_image.handle(),
            src_layout,
            dst_image.handle(),
            dst_layout,
            regions,
        );
    }

    /// Blits regions between two images held as raw handles, tracking the supplied
    /// owner resources. No render pass may be open.
    pub fn blit_image_raw(
        &mut self,
        device: &dyn DeviceInterface,
        src_resource: &Arc<dyn Resource>,
        src_image: vk::Image,
        src_layout: vk::ImageLayout,
        dst_resource: &Arc<dyn Resource>,
        dst_image: vk::Image,
        dst_layout: vk::ImageLayout,
        regions: &[vk::ImageBlit],
        filter: vk::Filter,
    ) {
        debug_assert!(self.is_active);
        debug_assert!(self.active_render_pass.is_none());
        self.tracker.add_resource(src_resource.clone());
        self.tracker.add_resource(dst_resource.clone());
        device.cmd_blit_image(
            self.handle,
            src_image,
            src_layout,
            dst_image,
            dst_layout,
            regions,
            filter,
        );
    }

    /// Blits regions between two images in their current layouts.
    pub fn blit_image(
        &mut self,
        device: &dyn DeviceInterface,
        src_image: &Arc<dyn ImageAccess>,
        dst_image: &Arc<dyn ImageAccess>,
        regions: &[vk::ImageBlit],
        filter: vk::Filter,
    ) {
        debug_assert!(self.is_active);
        debug_assert!(self.active_render_pass.is_none());
        self.tracker.add_resource(src_image.clone());
        self.tracker.add_resource(dst_image.clone());
        device.cmd_blit_image(
            self.handle,
            src_image.handle(),
            src_image.current_layout(),
            dst_image.handle(),
            dst_image.current_layout(),
            regions,
            filter,
        );
    }

    /// Copies regions of an image into a buffer. No render pass may be open.
    pub fn copy_image_to_buffer(
        &mut self,
        device: &dyn DeviceInterface,
        src_image: &Arc<dyn ImageAccess>,
        src_layout: vk::ImageLayout,
        dst_buffer: &Arc<dyn BufferAccess>,
        regions: &[vk::BufferImageCopy],
    ) {
        debug_assert!(self.is_active);
        debug_assert!(self.active_render_pass.is_none());
        self.tracker.add_resource(src_image.clone());
        self.tracker.add_resource(dst_buffer.clone());
        device.cmd_copy_image_to_buffer(
            self.handle,
            src_image.handle(),
            src_layout,
            dst_buffer.inner().buffer,
            regions,
        );
    }

    /// Copies regions of a buffer into an image. No render pass may be open.
    pub fn copy_buffer_to_image(
        &mut self,
        device: &dyn DeviceInterface,
        src_buffer: &Arc<dyn BufferAccess>,
        dst_image: &Arc<dyn ImageAccess>,
        dst_layout: vk::ImageLayout,
        regions: &[vk::BufferImageCopy],
    ) {
        debug_assert!(self.is_active);
        debug_assert!(self.active_render_pass.is_none());
        self.tracker.add_resource(src_buffer.clone());
        self.tracker.add_resource(dst_image.clone());
        device.cmd_copy_buffer_to_image(
            self.handle,
            src_buffer.inner().buffer,
            dst_image.handle(),
            dst_layout,
            regions,
        );
    }

    /// Copies regions between two buffers. No render pass may be open. In debug
    /// builds every region must be nonzero-sized and in bounds on both sides.
    pub fn copy_buffer(
        &mut self,
        device: &dyn DeviceInterface,
        src_buffer: &Arc<dyn BufferAccess>,
        dst_buffer: &Arc<dyn BufferAccess>,
        regions: &[vk::BufferCopy],
    ) {
        debug_assert!(self.is_active);
        debug_assert!(self.active_render_pass.is_none());
        #[cfg(debug_assertions)]
        for region in regions {
            assert!(region.size > 0);
            assert!(region.src_offset < src_buffer.size());
            assert!(region.dst_offset < dst_buffer.size());
            assert!(region.src_offset + region.size <= src_buffer.size());
            assert!(region.dst_offset + region.size <= dst_buffer.size());
        }

        self.tracker.add_resource(src_buffer.clone());
        self.tracker.add_resource(dst_buffer.clone());
        device.cmd_copy_buffer(
            self.handle,
            src_buffer.inner().buffer,
            dst_buffer.inner().buffer,
            regions,
        );
    }

    /// Writes `data` into `dst_buffer` at `dst_offset` inline from the command
    /// stream. No render pass may be open.
    ///
    /// Both the offset and the payload length must be 4-byte aligned, and the payload
    /// must not exceed 65536 bytes.
    pub fn update_buffer(
        &mut self,
        device: &dyn DeviceInterface,
        dst_buffer: &Arc<dyn BufferAccess>,
        dst_offset: DeviceSize,
        data: &[u8],
    ) {
        debug_assert!(self.is_active);
        debug_assert!(self.active_render_pass.is_none());
        debug_assert!(dst_offset % 4 == 0);
        // TODO: handle larger transfer sizes by splitting into staged copies.
        debug_assert!(data.len() as DeviceSize <= MAX_UPDATE_BUFFER_SIZE);
        debug_assert!(data.len() % 4 == 0);

        self.tracker.add_resource(dst_buffer.clone());
        device.cmd_update_buffer(self.handle, dst_buffer.inner().buffer, dst_offset, data);
    }

    /// Clears subresource ranges of a color image in its current layout. No render
    /// pass may be open.
    pub fn clear_color_image(
        &mut self,
        device: &dyn DeviceInterface,
        image: &Arc<dyn ImageAccess>,
        color: &vk::ClearColorValue,
        ranges: &[vk::ImageSubresourceRange],
    ) {
        debug_assert!(self.is_active);
        debug_assert!(self.active_render_pass.is_none());
        self.tracker.add_resource(image.clone());
        device.cmd_clear_color_image(
            self.handle,
            image.handle(),
            image.current_layout(),
            color,
            ranges,
        );
    }

    /// Clears subresource ranges of a depth/stencil image in its current layout. No
    /// render pass may be open.
    pub fn clear_depth_stencil_image(
        &mut self,
        device: &dyn DeviceInterface,
        image: &Arc<dyn ImageAccess>,
        value: &vk::ClearDepthStencilValue,
        ranges: &[vk::ImageSubresourceRange],
    ) {
        debug_assert!(self.is_active);
        debug_assert!(self.active_render_pass.is_none());
        self.tracker.add_resource(image.clone());
        device.cmd_clear_depth_stencil_image(
            self.handle,
            image.handle(),
            image.current_layout(),
            value,
            ranges,
        );
    }

    /// Resolves a multisampled image into a non-multisampled one, both in their
    /// current layouts. No render pass may be open.
    pub fn resolve_image(
        &mut self,
        device: &dyn DeviceInterface,
        src_image: &Arc<dyn ImageAccess>,
        dst_image: &Arc<dyn ImageAccess>,
        regions: &[vk::ImageResolve],
    ) {
        debug_assert!(self.is_active);
        debug_assert!(self.active_render_pass.is_none());
        self.tracker.add_resource(src_image.clone());
        self.tracker.add_resource(dst_image.clone());
        device.cmd_resolve_image(
            self.handle,
            src_image.handle(),
            src_image.current_layout(),
            dst_image.handle(),
            dst_image.current_layout(),
            regions,
        );
    }

    /// Submits the ended buffer to `queue`.
    ///
    /// A completion fence is created lazily on the first submission and reset for
    /// reuse on later ones. Which of the passed semaphores actually participate in
    /// this submission is decided under `lock`, shared by every submitter touching
    /// the same semaphores: a semaphore is included in the native signal (resp. wait)
    /// list only if its `should_signal` (resp. `should_wait`) predicate holds, and
    /// every passed semaphore is marked as signaled/waited regardless of whether it
    /// participated. Participating semaphores are tracked as resources. The lock is
    /// held only for this bookkeeping, not for the native submit call.
    ///
    /// With [`SyncQueue::Force`] the call blocks until the fence signals, then
    /// destroys the fence so the next submission recreates it. A timeout or device
    /// error while waiting is fatal.
    pub fn submit_to_queue(
        &mut self,
        device: &dyn DeviceInterface,
        queue: vk::Queue,
        sync: SyncQueue,
        signal_semaphores: &[Arc<SemaphoreAccess>],
        wait_semaphores: &[Arc<SemaphoreAccess>],
        lock: &SubmitLock,
    ) {
        debug_assert!(!self.is_active);

        if self.level.submit_fence == vk::Fence::null() {
            self.level.submit_fence = match device.create_fence() {
                Ok(fence) => fence,
                Err(err) => fatal_device_error("failed to create submit fence", err),
            };
        } else if let Err(err) = device.reset_fence(self.level.submit_fence) {
            fatal_device_error("failed to reset submit fence", err);
        }

        if signal_semaphores.is_empty() && wait_semaphores.is_empty() {
            // No dependent semaphores; submit without taking the lock.
            if let Err(err) = device.queue_submit(
                queue,
                &[],
                &[],
                &[self.handle],
                &[],
                self.level.submit_fence,
            ) {
                fatal_device_error("queue submission failed", err);
            }
        } else {
            let mut signals = SmallVec::<[vk::Semaphore; 4]>::new();
            let mut waits = SmallVec::<[vk::Semaphore; 4]>::new();
            let mut wait_stages = SmallVec::<[vk::PipelineStageFlags; 4]>::new();

            {
                let _guard = lock.lock();

                for semaphore in signal_semaphores {
                    if semaphore.should_signal() {
                        self.tracker.add_resource(semaphore.clone());
                        signals.push(semaphore.handle());
                    }
                }
                for semaphore in wait_semaphores {
                    if semaphore.should_wait() {
                        self.tracker.add_resource(semaphore.clone());
                        waits.push(semaphore.handle());
                        wait_stages.push(vk::PipelineStageFlags::ALL_COMMANDS);
                    }
                }

                // Marking is unconditional: a semaphore that did not participate here
                // must still never be picked up by a later submission.
                for semaphore in signal_semaphores {
                    semaphore.mark_as_signaled();
                }
                for semaphore in wait_semaphores {
                    semaphore.mark_as_waited();
                }
            }

            if let Err(err) = device.queue_submit(
                queue,
                &waits,
                &wait_stages,
                &[self.handle],
                &signals,
                self.level.submit_fence,
            ) {
                fatal_device_error("queue submission failed", err);
            }
        }

        if sync == SyncQueue::Force {
            if let Err(err) = device.wait_for_fence(self.level.submit_fence, u64::MAX) {
                fatal_device_error("submit fence failed to signal", err);
            }
            device.destroy_fence(self.level.submit_fence);
            self.level.submit_fence = vk::Fence::null();
        }
    }

    /// Returns true once the device has finished executing the last submission.
    ///
    /// A buffer that was never submitted (or whose fence was consumed by a forced
    /// sync) is trivially finished. An unexpected fence status is a fatal device
    /// error.
    pub fn finished(&self, device: &dyn DeviceInterface) -> bool {
        if self.level.submit_fence == vk::Fence::null() {
            return true;
        }

        match device.fence_status(self.level.submit_fence) {
            Ok(FenceStatus::Signaled) => true,
            Ok(FenceStatus::Unsignaled) => false,
            Err(err) => fatal_device_error("failed to query submit fence status", err),
        }
    }

    /// Returns the current submission fence, or a null handle if none exists.
    #[inline]
    pub fn submit_fence(&self) -> vk::Fence {
        self.level.submit_fence
    }

    /// Resets the buffer for reuse: releases and recycles tracked resources, clears
    /// cached state, resets the native buffer and hands executed secondary buffers
    /// back to `provider`.
    ///
    /// Must only be called once [`finished`](Self::finished) reports true.
    pub fn reset(&mut self, device: &dyn DeviceInterface, provider: &dyn ResourceProvider) {
        self.reset_common(device);
        for buffer in self.level.secondary_command_buffers.drain(..) {
            provider.recycle_secondary_command_buffer(buffer);
        }
    }

    /// Releases every tracked resource and frees the native handle and the fence.
    /// Any secondary buffers still held are freed along with their primary.
    pub fn free(mut self, device: &dyn DeviceInterface) {
        debug_assert!(!self.is_active);
        debug_assert!(self.active_render_pass.is_none());

        let secondaries: Vec<_> = self.level.secondary_command_buffers.drain(..).collect();
        for buffer in secondaries {
            buffer.free(device);
        }

        self.free_common(device);
        if self.level.submit_fence != vk::Fence::null() {
            device.destroy_fence(self.level.submit_fence);
            self.level.submit_fence = vk::Fence::null();
        }
    }

    /// Drops every tracked reference without recycling and without any device call.
    /// Used when the device has been lost.
    pub fn abandon(mut self) {
        self.abandon_common();
        let secondaries: Vec<_> = self.level.secondary_command_buffers.drain(..).collect();
        for buffer in secondaries {
            buffer.abandon();
        }
    }
}

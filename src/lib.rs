// Copyright (c) 2024 The vk-command developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Command buffer recording, resource tracking and queue submission for Vulkan.
//!
//! This crate is the layer of a renderer that sits directly above the raw Vulkan API.
//! It wraps the two levels of native command buffers and takes care of everything that
//! makes them safe to reuse across frames:
//!
//! - Every GPU-side object referenced by a recorded command is *tracked*, so that it
//!   cannot be destroyed or recycled while a command buffer referencing it is still in
//!   flight. See the [`resource`] module.
//!
//! - Redundant state-setting commands (binding the same vertex buffer twice, setting
//!   the same viewport again, ...) are elided through a small cache of the last bound
//!   state. See [`command_buffer::StateCacher`].
//!
//! - [Primary buffers](command_buffer::PrimaryCommandBuffer) are submitted to a device
//!   queue together with wait/signal semaphores and a completion fence;
//!   [secondary buffers](command_buffer::SecondaryCommandBuffer) are recorded against
//!   an inherited render pass and executed from within a primary buffer.
//!
//! The crate does not talk to a `VkDevice` directly. All native calls go through the
//! [`device::DeviceInterface`] function table, which is implemented over [`ash`] for
//! real devices and can be implemented by hand for tests. Likewise the objects being
//! recorded (buffers, images, pipelines, render passes, framebuffers) are only known
//! through the trait seams in [`buffer`], [`image`], [`pipeline`] and [`framebuffer`]:
//! whatever owns those objects implements the traits, and this crate keeps the objects
//! alive for as long as a command buffer references them.
//!
//! # Contract checking
//!
//! Recording operations carry preconditions (buffer must be actively recording, render
//! pass must or must not be open, update payloads must be aligned, ...). These are
//! programmer errors, not runtime conditions, and are checked with `debug_assert!`:
//! violated contracts panic in debug builds and are unchecked in release builds.
//! Device-level failures (submission errors, fence timeouts) are not recoverable at
//! this layer; they are logged and abort the process.

pub mod buffer;
pub mod command_buffer;
pub mod device;
pub mod framebuffer;
pub mod image;
pub mod pipeline;
pub mod resource;
pub mod sync;

use std::{error::Error, fmt};

/// Represents memory size and offset values on a Vulkan device.
pub use ash::vk::DeviceSize;

/// Error returned when the device or the host ran out of memory during an allocation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OomError {
    /// There is no memory available on the host (ie. the CPU, RAM, etc.).
    OutOfHostMemory,
    /// There is no memory available on the device (ie. video memory).
    OutOfDeviceMemory,
}

impl Error for OomError {}

impl fmt::Display for OomError {
    #[inline]
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(
            fmt,
            "{}",
            match *self {
                OomError::OutOfHostMemory => "no memory available on the host",
                OomError::OutOfDeviceMemory => "no memory available on the graphical device",
            }
        )
    }
}

impl From<VulkanError> for OomError {
    #[inline]
    fn from(err: VulkanError) -> OomError {
        match err {
            VulkanError::OutOfHostMemory => OomError::OutOfHostMemory,
            VulkanError::OutOfDeviceMemory => OomError::OutOfDeviceMemory,
            _ => panic!("unexpected error: {:?}", err),
        }
    }
}

/// Runtime error returned by a native Vulkan call.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VulkanError {
    /// A host memory allocation has failed.
    OutOfHostMemory,
    /// A device memory allocation has failed.
    OutOfDeviceMemory,
    /// The logical or physical device has been lost.
    DeviceLost,
    /// A wait operation has not completed in the specified time.
    Timeout,
    /// Some other error code, kept as the raw `VkResult` value.
    Unnamed(ash::vk::Result),
}

impl Error for VulkanError {}

impl fmt::Display for VulkanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VulkanError::OutOfHostMemory => write!(f, "a host memory allocation has failed"),
            VulkanError::OutOfDeviceMemory => write!(f, "a device memory allocation has failed"),
            VulkanError::DeviceLost => {
                write!(f, "the logical or physical device has been lost")
            }
            VulkanError::Timeout => {
                write!(f, "a wait operation has not completed in the specified time")
            }
            VulkanError::Unnamed(result) => {
                write!(f, "unnamed error, VkResult value {}", result.as_raw())
            }
        }
    }
}

impl From<ash::vk::Result> for VulkanError {
    #[inline]
    fn from(result: ash::vk::Result) -> VulkanError {
        match result {
            ash::vk::Result::ERROR_OUT_OF_HOST_MEMORY => VulkanError::OutOfHostMemory,
            ash::vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => VulkanError::OutOfDeviceMemory,
            ash::vk::Result::ERROR_DEVICE_LOST => VulkanError::DeviceLost,
            ash::vk::Result::TIMEOUT => VulkanError::Timeout,
            result => VulkanError::Unnamed(result),
        }
    }
}

/// Logs a device-level error and aborts the process.
///
/// Errors that reach this point mean the device or driver is in an unrecoverable
/// state; there is no meaningful local recovery.
pub(crate) fn fatal_device_error(context: &str, err: VulkanError) -> ! {
    log::error!("{}: {}", context, err);
    std::process::abort();
}

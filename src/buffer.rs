// Copyright (c) 2024 The vk-command developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Trait seam for the buffers whose contents recorded commands read or write.
//!
//! Buffer allocation and memory management live outside this crate; commands only need
//! the raw handle, the offset of the accessed range and the size for bounds checking.

use crate::{resource::Resource, DeviceSize};
use ash::vk;

/// Inner information about a buffer access: the raw handle and the offset within the
/// buffer where the accessed range starts.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BufferInner {
    /// The raw buffer handle.
    pub buffer: vk::Buffer,
    /// Offset in bytes from the start of the buffer.
    pub offset: DeviceSize,
}

/// A buffer that can be bound or used as the source/destination of a transfer command.
pub trait BufferAccess: Resource {
    /// Returns the raw handle and offset of this buffer access.
    fn inner(&self) -> BufferInner;

    /// Returns the size of the accessed range in bytes.
    fn size(&self) -> DeviceSize;
}

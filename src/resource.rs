// Copyright (c) 2024 The vk-command developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or http://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Shared ownership of the GPU objects referenced by recorded commands.
//!
//! A command buffer must keep every object its commands touch alive until the device
//! has finished executing it. Ownership is shared: each command buffer that references
//! an object holds one `Arc` to it, independent of any other holder, and releases it
//! when the buffer is reset or freed. Objects come in two disciplines:
//!
//! - [`Resource`]: plainly reference-counted. Dropping the last `Arc` destroys it.
//! - [`RecycledResource`]: returned to a type-specific reuse pool on release instead
//!   of being destroyed, unless the device has been abandoned.
//!
//! A given concrete object belongs to exactly one discipline at the time it is
//! registered with a command buffer.

use crate::device::DeviceInterface;

/// A GPU-visible object that a recorded command depends on.
///
/// Implementors only need to be shareable across the threads that record and reset
/// command buffers; the lifetime extension itself is the `Arc` held by the tracking
/// buffer.
pub trait Resource: Send + Sync {}

/// A tracked object that is returned to a reuse pool when its tracking command buffer
/// is reset or freed.
pub trait RecycledResource: Resource {
    /// Returns the object to its type-specific free list for reuse.
    ///
    /// Called once per registration when the tracking command buffer releases its
    /// resources. Never called on the abandon path: recycling assumes a live device.
    fn recycle(&self, device: &dyn DeviceInterface);
}

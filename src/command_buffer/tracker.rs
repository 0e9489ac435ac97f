// Copyright (c) 2024 The vk-command developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

use crate::{
    device::DeviceInterface,
    resource::{RecycledResource, Resource},
};
use std::sync::Arc;

/// Number of releases after which the tracked-resource collections give their backing
/// allocations back, instead of retaining capacity for the next frame.
const RESETS_BEFORE_FULL_CLEAR: u32 = 100;

/// Capacity reserved for the collections initially and after a full clear.
const INITIAL_TRACKED_RESOURCES: usize = 32;

/// The set of resource references held by one command buffer.
///
/// Every command recorded into a buffer registers the objects it depends on here, and
/// the references are released in one sweep when the buffer is reset or freed. Simple
/// references are dropped; recycled references are first returned to their reuse pool.
///
/// Releasing uses an amortized rewind strategy: the collections are normally cleared
/// with their capacity retained, so that recording the next frame does not reallocate,
/// and only after [`RESETS_BEFORE_FULL_CLEAR`] releases is the capacity given back.
/// This bounds the capacity growth caused by an occasional large frame without paying
/// reallocation cost on the common path.
pub struct ResourceTracker {
    resources: Vec<Arc<dyn Resource>>,
    recycled_resources: Vec<Arc<dyn RecycledResource>>,
    resets_since_full_clear: u32,
}

impl ResourceTracker {
    pub(crate) fn new() -> ResourceTracker {
        ResourceTracker {
            resources: Vec::with_capacity(INITIAL_TRACKED_RESOURCES),
            recycled_resources: Vec::with_capacity(INITIAL_TRACKED_RESOURCES),
            resets_since_full_clear: 0,
        }
    }

    /// Takes a reference on `resource`, keeping it alive until the owning command
    /// buffer is reset or freed.
    #[inline]
    pub fn add_resource(&mut self, resource: Arc<dyn Resource>) {
        self.resources.push(resource);
    }

    /// Takes a reference on `resource`; the object is returned to its reuse pool when
    /// the owning command buffer is reset or freed.
    #[inline]
    pub fn add_recycled_resource(&mut self, resource: Arc<dyn RecycledResource>) {
        self.recycled_resources.push(resource);
    }

    /// Returns the number of references currently held, across both disciplines.
    #[inline]
    pub fn len(&self) -> usize {
        self.resources.len() + self.recycled_resources.len()
    }

    /// Returns true if no references are held.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty() && self.recycled_resources.is_empty()
    }

    /// Releases every held reference, recycling the recycled ones, and applies the
    /// rewind-vs-clear capacity policy. Called on command buffer reset.
    pub(crate) fn release(&mut self, device: &dyn DeviceInterface) {
        for resource in self.recycled_resources.drain(..) {
            resource.recycle(device);
        }
        self.resources.clear();

        self.resets_since_full_clear += 1;
        if self.resets_since_full_clear > RESETS_BEFORE_FULL_CLEAR {
            self.resources = Vec::with_capacity(INITIAL_TRACKED_RESOURCES);
            self.recycled_resources = Vec::with_capacity(INITIAL_TRACKED_RESOURCES);
            self.resets_since_full_clear = 0;
        }
    }

    /// Releases every held reference, recycling the recycled ones. Called when the
    /// command buffer's native resources are freed; no capacity bookkeeping needed.
    pub(crate) fn free(&mut self, device: &dyn DeviceInterface) {
        for resource in self.recycled_resources.drain(..) {
            resource.recycle(device);
        }
        self.resources.clear();
    }

    /// Releases every held reference without recycling and without touching the
    /// device. Used when the device has been lost and can no longer be talked to.
    pub(crate) fn abandon(&mut self) {
        self.resources.clear();
        self.recycled_resources.clear();
    }
}

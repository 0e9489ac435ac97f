// Copyright (c) 2024 The vk-command developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Trait seam for the images used by transfer, clear and resolve commands.

use crate::resource::Resource;
use ash::vk;

/// An image that can be used as the source or destination of a device-level command.
///
/// Layout transitions are the owner's responsibility; [`current_layout`] must return
/// the layout the image will be in when the recorded command executes.
///
/// [`current_layout`]: ImageAccess::current_layout
pub trait ImageAccess: Resource {
    /// Returns the raw image handle.
    fn handle(&self) -> vk::Image;

    /// Returns the image's current layout.
    fn current_layout(&self) -> vk::ImageLayout;
}

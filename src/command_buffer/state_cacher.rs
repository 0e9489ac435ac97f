// Copyright (c) 2024 The vk-command developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

use ash::vk;

/// Number of vertex buffer binding slots tracked by the cache.
pub const MAX_VERTEX_BINDINGS: usize = 4;

/// Keeps track of the state last set on a command buffer, so that redundant
/// state-setting commands can be elided.
///
/// > **Important**: Executing a secondary command buffer invalidates all state tracked
/// > here. The command buffer calls [`invalidate`](StateCacher::invalidate) when that
/// > happens, and also on `end` and `reset`.
///
/// After invalidation every cached value is a sentinel that no legal binding can
/// equal (null handles, a viewport with negative width, a scissor with negative
/// offset, negative blend constants), so the first real call after invalidation is
/// never elided.
pub struct StateCacher {
    bound_vertex_buffers: [vk::Buffer; MAX_VERTEX_BINDINGS],
    bound_index_buffer: vk::Buffer,
    viewport: vk::Viewport,
    scissor: vk::Rect2D,
    blend_constants: [f32; 4],
}

/// Outcome of probing the cache.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StateCacherOutcome {
    /// The caller needs to issue the state change on the actual command buffer.
    NeedChange,
    /// The state change is not necessary.
    AlreadyOk,
}

impl StateCacher {
    /// Builds a new `StateCacher` with every entry invalidated.
    #[inline]
    pub fn new() -> StateCacher {
        let mut cacher = StateCacher {
            bound_vertex_buffers: [vk::Buffer::null(); MAX_VERTEX_BINDINGS],
            bound_index_buffer: vk::Buffer::null(),
            viewport: vk::Viewport::default(),
            scissor: vk::Rect2D::default(),
            blend_constants: [0.0; 4],
        };
        cacher.invalidate();
        cacher
    }

    /// Resets every cached value to its sentinel.
    pub fn invalidate(&mut self) {
        self.bound_vertex_buffers = [vk::Buffer::null(); MAX_VERTEX_BINDINGS];
        self.bound_index_buffer = vk::Buffer::null();

        // A valid viewport has a width greater than zero.
        self.viewport = vk::Viewport {
            width: -1.0,
            ..vk::Viewport::default()
        };

        // A valid scissor offset is never negative.
        self.scissor = vk::Rect2D {
            offset: vk::Offset2D { x: -1, y: 0 },
            extent: vk::Extent2D::default(),
        };

        self.blend_constants = [-1.0; 4];
    }

    /// Checks whether the vertex buffer bound at `binding` needs to change.
    ///
    /// The comparison key is the buffer handle only. The offset within the buffer is
    /// not tracked; callers currently always bind at offset zero.
    /// TODO: include the offset in the key once a caller binds at a nonzero offset.
    pub fn bind_vertex_buffer(&mut self, binding: u32, buffer: vk::Buffer) -> StateCacherOutcome {
        debug_assert!(buffer != vk::Buffer::null());
        debug_assert!((binding as usize) < MAX_VERTEX_BINDINGS);

        if self.bound_vertex_buffers[binding as usize] == buffer {
            StateCacherOutcome::AlreadyOk
        } else {
            self.bound_vertex_buffers[binding as usize] = buffer;
            StateCacherOutcome::NeedChange
        }
    }

    /// Checks whether the bound index buffer needs to change. The comparison key is
    /// the buffer handle only, as for [`bind_vertex_buffer`](Self::bind_vertex_buffer).
    pub fn bind_index_buffer(&mut self, buffer: vk::Buffer) -> StateCacherOutcome {
        debug_assert!(buffer != vk::Buffer::null());

        if self.bound_index_buffer == buffer {
            StateCacherOutcome::AlreadyOk
        } else {
            self.bound_index_buffer = buffer;
            StateCacherOutcome::NeedChange
        }
    }

    /// Checks whether the viewport needs to be set.
    pub fn set_viewport(&mut self, viewport: &vk::Viewport) -> StateCacherOutcome {
        if viewport_eq(&self.viewport, viewport) {
            StateCacherOutcome::AlreadyOk
        } else {
            self.viewport = *viewport;
            StateCacherOutcome::NeedChange
        }
    }

    /// Checks whether the scissor rectangle needs to be set.
    pub fn set_scissor(&mut self, scissor: &vk::Rect2D) -> StateCacherOutcome {
        if rect_eq(&self.scissor, scissor) {
            StateCacherOutcome::AlreadyOk
        } else {
            self.scissor = *scissor;
            StateCacherOutcome::NeedChange
        }
    }

    /// Checks whether the blend constants need to be set.
    pub fn set_blend_constants(&mut self, constants: &[f32; 4]) -> StateCacherOutcome {
        if self.blend_constants == *constants {
            StateCacherOutcome::AlreadyOk
        } else {
            self.blend_constants = *constants;
            StateCacherOutcome::NeedChange
        }
    }
}

impl Default for StateCacher {
    #[inline]
    fn default() -> StateCacher {
        StateCacher::new()
    }
}

#[inline]
fn viewport_eq(a: &vk::Viewport, b: &vk::Viewport) -> bool {
    a.x == b.x
        && a.y == b.y
        && a.width == b.width
        && a.height == b.height
        && a.min_depth == b.min_depth
        && a.max_depth == b.max_depth
}

#[inline]
fn rect_eq(a: &vk::Rect2D, b: &vk::Rect2D) -> bool {
    a.offset.x == b.offset.x
        && a.offset.y == b.offset.y
        && a.extent.width == b.extent.width
        && a.extent.height == b.extent.height
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    fn buffer(raw: u64) -> vk::Buffer {
        vk::Buffer::from_raw(raw)
    }

    #[test]
    fn repeated_bind_is_elided() {
        let mut cacher = StateCacher::new();
        assert_eq!(
            cacher.bind_vertex_buffer(0, buffer(1)),
            StateCacherOutcome::NeedChange
        );
        assert_eq!(
            cacher.bind_vertex_buffer(0, buffer(1)),
            StateCacherOutcome::AlreadyOk
        );
        assert_eq!(
            cacher.bind_vertex_buffer(0, buffer(2)),
            StateCacherOutcome::NeedChange
        );
    }

    #[test]
    fn bindings_are_tracked_per_slot() {
        let mut cacher = StateCacher::new();
        assert_eq!(
            cacher.bind_vertex_buffer(0, buffer(1)),
            StateCacherOutcome::NeedChange
        );
        assert_eq!(
            cacher.bind_vertex_buffer(1, buffer(1)),
            StateCacherOutcome::NeedChange
        );
        assert_eq!(
            cacher.bind_vertex_buffer(0, buffer(1)),
            StateCacherOutcome::AlreadyOk
        );
    }

    #[test]
    fn first_call_after_invalidate_is_never_elided() {
        let mut cacher = StateCacher::new();

        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 100.0,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: vk::Extent2D {
                width: 100,
                height: 100,
            },
        };

        assert_eq!(cacher.set_viewport(&viewport), StateCacherOutcome::NeedChange);
        assert_eq!(cacher.set_scissor(&scissor), StateCacherOutcome::NeedChange);
        assert_eq!(
            cacher.set_blend_constants(&[0.0; 4]),
            StateCacherOutcome::NeedChange
        );
        assert_eq!(
            cacher.bind_index_buffer(buffer(7)),
            StateCacherOutcome::NeedChange
        );

        cacher.invalidate();

        assert_eq!(cacher.set_viewport(&viewport), StateCacherOutcome::NeedChange);
        assert_eq!(cacher.set_scissor(&scissor), StateCacherOutcome::NeedChange);
        assert_eq!(
            cacher.set_blend_constants(&[0.0; 4]),
            StateCacherOutcome::NeedChange
        );
        assert_eq!(
            cacher.bind_index_buffer(buffer(7)),
            StateCacherOutcome::NeedChange
        );
    }

    #[test]
    fn zero_sized_viewport_is_distinct_from_sentinel() {
        let mut cacher = StateCacher::new();
        // All-zero values are legal to cache; the sentinel must not collide with them.
        assert_eq!(
            cacher.set_viewport(&vk::Viewport::default()),
            StateCacherOutcome::NeedChange
        );
        assert_eq!(
            cacher.set_scissor(&vk::Rect2D::default()),
            StateCacherOutcome::NeedChange
        );
    }
}

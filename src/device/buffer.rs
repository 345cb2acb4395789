//! Typed GPU buffer for element data.

use core::marker::PhantomData;

use alloc::format;

use crate::Element;

/// Typed GPU buffer for element storage.
#[derive(Clone)]
pub struct Buffer<T: Element> {
    inner: wgpu::Buffer,
    len: usize,
    _marker: PhantomData<T>,
}

impl<T: Element> Buffer<T> {
    /// Creates a new buffer wrapper.
    pub(crate) fn new(buffer: wgpu::Buffer, len: usize) -> Self {
        Self {
            inner: buffer,
            len,
            _marker: PhantomData,
        }
    }

    /// Returns the buffer's logical size in bytes: `len * size_of::<T>()`.
    ///
    /// This is not necessarily the size of the underlying `wgpu::Buffer`,
    /// which `Allocator` may have rounded up to `MIN_BUFFER_SIZE` or reused
    /// from a larger pooled allocation (see `Allocator::allocate`). Callers
    /// that need the true physical allocation size (none do today) should
    /// read `self.inner.size()` directly instead.
    pub(crate) fn byte_size(&self) -> u64 {
        (self.len * core::mem::size_of::<T>()) as u64
    }

    /// Returns the number of elements the buffer was created with.
    ///
    /// This is the logical length, not the (possibly padded) capacity of
    /// the underlying `wgpu::Buffer`.
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the buffer holds no elements.
    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the underlying wgpu buffer.
    pub(crate) fn inner(&self) -> &wgpu::Buffer {
        &self.inner
    }

    /// Consumes the wrapper, yielding the owned underlying wgpu buffer.
    ///
    /// Used to hand a transient buffer back to [`crate::Context::release_buffer`]
    /// once its logical lifetime (not just this wrapper's) has ended.
    pub(crate) fn into_inner(self) -> wgpu::Buffer {
        self.inner
    }
}

impl<T: Element> core::fmt::Debug for Buffer<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct(&format!("Buffer<{}>", T::wgsl_type()))
            .field("byte_size", &self.byte_size())
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

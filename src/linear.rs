//! Allocator interfaces implemented by [`Arena`] and [`Scratch`].

use std::{
  alloc::Layout,
  ptr::{self, NonNull},
};

use allocator_api2::alloc::{AllocError, Allocator};

use crate::{arena::Arena, error::ArenaError, scratch::Scratch};

/// The three operations a linear allocator supports.
///
/// Code written against `LinearAlloc` accepts an [`Arena`] or any open
/// [`Scratch`] on it.
pub trait LinearAlloc {
  /// Allocates a block fitting `layout`.
  fn allocate(
    &self,
    layout: Layout,
  ) -> Result<NonNull<[u8]>, ArenaError>;

  /// Changes the size of a block in place, returning `false` if it cannot.
  ///
  /// # Safety
  ///
  /// `ptr` must come from this allocator for a block described by `layout`.
  unsafe fn resize(
    &self,
    ptr: NonNull<u8>,
    layout: Layout,
    new_size: usize,
  ) -> bool;

  /// Releases a block. May do nothing.
  ///
  /// # Safety
  ///
  /// `ptr` must come from this allocator for a block described by `layout`.
  unsafe fn free(
    &self,
    ptr: NonNull<u8>,
    layout: Layout,
  );
}

impl LinearAlloc for Arena {
  fn allocate(
    &self,
    layout: Layout,
  ) -> Result<NonNull<[u8]>, ArenaError> {
    Arena::allocate(self, layout)
  }

  unsafe fn resize(
    &self,
    ptr: NonNull<u8>,
    layout: Layout,
    new_size: usize,
  ) -> bool {
    unsafe { Arena::resize(self, ptr, layout, new_size) }
  }

  unsafe fn free(
    &self,
    ptr: NonNull<u8>,
    layout: Layout,
  ) {
    unsafe { Arena::free(self, ptr, layout) }
  }
}

impl LinearAlloc for Scratch<'_> {
  fn allocate(
    &self,
    layout: Layout,
  ) -> Result<NonNull<[u8]>, ArenaError> {
    Arena::allocate(self, layout)
  }

  unsafe fn resize(
    &self,
    ptr: NonNull<u8>,
    layout: Layout,
    new_size: usize,
  ) -> bool {
    unsafe { Arena::resize(self, ptr, layout, new_size) }
  }

  unsafe fn free(
    &self,
    ptr: NonNull<u8>,
    layout: Layout,
  ) {
    unsafe { Arena::free(self, ptr, layout) }
  }
}

impl Arena {
  /// Moves a block to a new layout, in place when possible.
  unsafe fn reallocate(
    &self,
    ptr: NonNull<u8>,
    old_layout: Layout,
    new_layout: Layout,
  ) -> Result<NonNull<[u8]>, AllocError> {
    let aligned = ptr.as_ptr().addr() % new_layout.align() == 0;
    if aligned && unsafe { Arena::resize(self, ptr, old_layout, new_layout.size()) } {
      return Ok(NonNull::slice_from_raw_parts(ptr, new_layout.size()));
    }

    let block = Arena::allocate(self, new_layout).map_err(|_| AllocError)?;
    let len = old_layout.size().min(new_layout.size());
    unsafe { ptr::copy_nonoverlapping(ptr.as_ptr(), block.cast::<u8>().as_ptr(), len) };
    Ok(block)
  }
}

unsafe impl Allocator for Arena {
  fn allocate(
    &self,
    layout: Layout,
  ) -> Result<NonNull<[u8]>, AllocError> {
    Arena::allocate(self, layout).map_err(|_| AllocError)
  }

  fn allocate_zeroed(
    &self,
    layout: Layout,
  ) -> Result<NonNull<[u8]>, AllocError> {
    Arena::allocate_zeroed(self, layout).map_err(|_| AllocError)
  }

  unsafe fn deallocate(
    &self,
    ptr: NonNull<u8>,
    layout: Layout,
  ) {
    unsafe { Arena::free(self, ptr, layout) }
  }

  unsafe fn grow(
    &self,
    ptr: NonNull<u8>,
    old_layout: Layout,
    new_layout: Layout,
  ) -> Result<NonNull<[u8]>, AllocError> {
    unsafe { self.reallocate(ptr, old_layout, new_layout) }
  }

  unsafe fn grow_zeroed(
    &self,
    ptr: NonNull<u8>,
    old_layout: Layout,
    new_layout: Layout,
  ) -> Result<NonNull<[u8]>, AllocError> {
    let block = unsafe { self.reallocate(ptr, old_layout, new_layout)? };
    let tail = new_layout.size() - old_layout.size();
    unsafe { ptr::write_bytes(block.cast::<u8>().as_ptr().add(old_layout.size()), 0, tail) };
    Ok(block)
  }

  unsafe fn shrink(
    &self,
    ptr: NonNull<u8>,
    old_layout: Layout,
    new_layout: Layout,
  ) -> Result<NonNull<[u8]>, AllocError> {
    unsafe { self.reallocate(ptr, old_layout, new_layout) }
  }
}

#[cfg(test)]
mod tests {
  use allocator_api2::{boxed::Box, vec::Vec};

  use super::*;

  fn fill_with<A: LinearAlloc>(
    alloc: &A,
    len: usize,
    byte: u8,
  ) -> NonNull<[u8]> {
    let block = alloc.allocate(Layout::array::<u8>(len).unwrap()).unwrap();
    unsafe { ptr::write_bytes(block.cast::<u8>().as_ptr(), byte, len) };
    block
  }

  #[test]
  fn test_linear_alloc_generic() {
    let mut arena = Arena::new(1 << 16).unwrap();
    fill_with(&arena, 10, 1);
    let mark = arena.position();

    {
      let scratch = arena.scratch();
      let block = fill_with(&scratch, 100, 2);
      let layout = Layout::array::<u8>(100).unwrap();

      unsafe {
        assert!(LinearAlloc::resize(&scratch, block.cast(), layout, 200));
        LinearAlloc::free(&scratch, block.cast(), layout);
      }
      assert_eq!(scratch.position(), mark.next_multiple_of(8) + 200);
    }

    assert_eq!(arena.position(), mark);
  }

  #[test]
  fn test_vec_grows_in_place() {
    let arena = Arena::new(1 << 20).unwrap();
    let mut values: Vec<u32, &Arena> = Vec::with_capacity_in(4, &arena);
    let start = values.as_ptr();

    for i in 0..1000 {
      values.push(i);
    }

    assert_eq!(values.as_ptr(), start);
    assert_eq!(arena.position(), values.capacity() * 4);
    assert!(values.iter().copied().eq(0..1000));
  }

  #[test]
  fn test_vec_moves_when_buried() {
    let arena = Arena::new(1 << 20).unwrap();
    let mut first: Vec<u8, &Arena> = Vec::with_capacity_in(8, &arena);
    first.extend_from_slice(b"abcdefgh");

    let second = Box::new_in(7u64, &arena);
    let before = first.as_ptr();

    first.extend_from_slice(b"ijkl");

    assert_ne!(first.as_ptr(), before);
    assert_eq!(&first[..], b"abcdefghijkl");
    assert_eq!(*second, 7);
  }

  #[test]
  fn test_shrink_and_grow_zeroed() {
    let arena = Arena::new(1 << 16).unwrap();
    let old = Layout::array::<u8>(64).unwrap();
    let block = fill_with(&arena, 64, 0xAA).cast::<u8>();

    unsafe {
      let small = Layout::array::<u8>(16).unwrap();
      let shrunk = Allocator::shrink(&arena, block, old, small).unwrap();
      assert_eq!(shrunk.cast::<u8>(), block);
      assert_eq!(arena.position(), 16);

      let grown = Allocator::grow_zeroed(&arena, block, small, old).unwrap();
      assert_eq!(grown.cast::<u8>(), block);
      let bytes = grown.as_ref();
      assert!(bytes[..16].iter().all(|&b| b == 0xAA));
      assert!(bytes[16..].iter().all(|&b| b == 0));
    }
  }

  #[test]
  fn test_allocator_reports_exhaustion() {
    let arena = Arena::new(1).unwrap();
    let layout = Layout::array::<u8>(arena.capacity() + 1).unwrap();
    assert!(Allocator::allocate(&arena, layout).is_err());
    assert_eq!(arena.position(), 0);
  }
}

use std::ops::Deref;

use tracing::trace;

use crate::arena::Arena;

/// A temporary region at the top of an [`Arena`].
///
/// Opening a scratch records the arena position; closing it (explicitly with
/// [`Scratch::close`] or by dropping it) moves the position back, freeing
/// everything allocated in between:
///
/// ```text
///   open                         close
///   ┌────────┬──────────────┐    ┌────────┬──────────────────────┐
///   │ before │ scratch data │ -> │ before │    free again        │
///   └────────┴──────────────┘    └────────┴──────────────────────┘
///            ▲              ▲             ▲
///        saved_offset    offset        offset
/// ```
///
/// The scratch holds the arena mutably and dereferences to it, so every
/// allocation made through it borrows the scratch and cannot outlive the
/// rewind. Nested scratches borrow their parent, which makes closing them out
/// of order a compile error. While a scratch is open the arena refuses to
/// resize blocks allocated before it, so the rewind never cuts into a live
/// block.
///
/// ```rust
/// use vmarena::Arena;
///
/// let mut arena = Arena::new(1 << 16).unwrap();
/// arena.alloc(1u64).unwrap();
///
/// let mut outer = arena.scratch();
/// outer.alloc_slice_fill(100, 0u8).unwrap();
/// {
///   let inner = outer.scratch();
///   inner.alloc_slice_fill(1000, 0u8).unwrap();
/// }
/// assert_eq!(outer.position(), 108);
/// outer.close();
///
/// assert_eq!(arena.position(), 8);
/// ```
#[derive(Debug)]
pub struct Scratch<'a> {
  arena: &'a mut Arena,
  saved_offset: usize,
  outer_floor: Option<usize>,
}

impl<'a> Scratch<'a> {
  pub fn open(arena: &'a mut Arena) -> Self {
    let saved_offset = arena.position();
    let outer_floor = arena.enter_scratch();
    Self {
      arena,
      saved_offset,
      outer_floor,
    }
  }

  /// Arena position when this scratch was opened.
  #[inline]
  pub fn saved_offset(&self) -> usize {
    self.saved_offset
  }

  /// Bytes allocated since this scratch was opened, padding included.
  #[inline]
  pub fn used(&self) -> usize {
    self.arena.position().saturating_sub(self.saved_offset)
  }

  /// Opens a nested scratch at the current position.
  pub fn scratch(&mut self) -> Scratch<'_> {
    Scratch::open(self.arena)
  }

  /// Rewinds the arena to [`Scratch::saved_offset`].
  ///
  /// # Panics
  ///
  /// If the arena position is already below the saved offset.
  pub fn close(self) {
    drop(self);
  }
}

impl Deref for Scratch<'_> {
  type Target = Arena;

  fn deref(&self) -> &Arena {
    self.arena
  }
}

impl Drop for Scratch<'_> {
  fn drop(&mut self) {
    trace!(
      saved_offset = self.saved_offset,
      position = self.arena.position(),
      "close scratch"
    );
    self.arena.rewind(self.saved_offset, self.outer_floor);
  }
}

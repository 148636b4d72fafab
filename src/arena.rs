use std::{
  alloc::Layout,
  cell::Cell,
  fmt, io, mem,
  ptr::{self, NonNull},
  slice,
};

use tracing::{debug, error, trace};

use crate::{align::checked_align_to, error::ArenaError, scratch::Scratch, vm};

/// Every allocation is aligned to at least a machine word.
pub const MIN_ALIGN: usize = mem::align_of::<usize>();

/// Capacity used by [`ArenaOptions::default`]: 64 MiB of address space.
pub const DEFAULT_CAPACITY: usize = 64 * 1024 * 1024;

/// Construction parameters for an [`Arena`].
///
/// ```rust
/// use vmarena::ArenaOptions;
///
/// let arena = ArenaOptions::new(1 << 20).populate(true).build().unwrap();
/// assert!(arena.capacity() >= 1 << 20);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaOptions {
  capacity: usize,
  populate: bool,
}

impl Default for ArenaOptions {
  fn default() -> Self {
    Self::new(DEFAULT_CAPACITY)
  }
}

impl ArenaOptions {
  pub fn new(capacity: usize) -> Self {
    Self {
      capacity,
      populate: false,
    }
  }

  /// Bytes of address space to reserve. Rounded up to the page size.
  pub fn capacity(
    mut self,
    capacity: usize,
  ) -> Self {
    self.capacity = capacity;
    self
  }

  /// Commit every page at construction instead of on first touch.
  pub fn populate(
    mut self,
    populate: bool,
  ) -> Self {
    self.populate = populate;
    self
  }

  pub fn build(self) -> Result<Arena, ArenaError> {
    Arena::with_options(self)
  }
}

/// A linear allocator over one reserved virtual-memory region.
///
/// ```text
///   base                     offset                            capacity
///   ┌────┬──┬────────┬───┬───┬───────────────────────────────────────┐
///   │ A1 │▒▒│   A2   │▒▒▒│A3 │              unused                   │
///   └────┴──┴────────┴───┴───┴───────────────────────────────────────┘
///         ▲           ▲      ▲
///         └─ padding ─┘      └── next allocation starts here (aligned)
/// ```
///
/// Allocation only moves `offset` forward. Memory comes back in bulk through
/// [`Arena::reset`] or by closing a [`Scratch`].
///
/// The offset lives in a [`Cell`], so allocating only needs `&Arena` while
/// resetting needs `&mut Arena`. References handed out by the typed helpers
/// therefore can never outlive a reset.
pub struct Arena {
  base: NonNull<u8>,
  capacity: usize,
  offset: Cell<usize>,
  /// Start of the innermost open scratch. Blocks below it are never resized.
  floor: Option<usize>,
}

// The region is owned exclusively by the arena. `Cell` keeps it `!Sync`.
unsafe impl Send for Arena {}

impl Arena {
  /// Reserves at least `capacity` bytes of address space.
  ///
  /// Physical memory is committed by the OS page by page as the arena is
  /// written to.
  pub fn new(capacity: usize) -> Result<Self, ArenaError> {
    Self::with_options(ArenaOptions::new(capacity))
  }

  pub fn with_options(options: ArenaOptions) -> Result<Self, ArenaError> {
    let invalid = |cause: &str| ArenaError::Reservation {
      size: options.capacity,
      source: io::Error::new(io::ErrorKind::InvalidInput, cause),
    };

    if options.capacity == 0 {
      return Err(invalid("capacity must be non-zero"));
    }

    let capacity = checked_align_to(options.capacity, vm::page_size())
      .filter(|&capacity| capacity <= isize::MAX as usize)
      .ok_or_else(|| invalid("capacity exceeds the addressable range"))?;

    let base = vm::reserve(capacity, options.populate).map_err(|source| ArenaError::Reservation {
      size: options.capacity,
      source,
    })?;

    debug!(
      base = ?base,
      capacity,
      populate = options.populate,
      "reserved arena"
    );

    Ok(Self {
      base,
      capacity,
      offset: Cell::new(0),
      floor: None,
    })
  }

  /// Total reserved bytes, a multiple of the page size.
  #[inline]
  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// Current bump offset, relative to the start of the region.
  #[inline]
  pub fn position(&self) -> usize {
    self.offset.get()
  }

  #[inline]
  pub fn remaining(&self) -> usize {
    self.capacity - self.offset.get()
  }

  /// Start of the reserved region.
  #[inline]
  pub fn as_ptr(&self) -> *const u8 {
    self.base.as_ptr()
  }

  /// Advances the offset past an aligned block of `size` bytes and returns the
  /// block's start offset. The arena is left untouched on failure.
  fn bump(
    &self,
    size: usize,
    align: usize,
  ) -> Result<usize, ArenaError> {
    let align = align.max(MIN_ALIGN);
    let base = self.base.as_ptr().addr();
    let offset = self.offset.get();

    // Aligning the address rather than the offset keeps alignments above the
    // page size correct.
    let block = checked_align_to(base + offset, align)
      .map(|addr| addr - base)
      .and_then(|start| Some((start, start.checked_add(size)?)))
      .filter(|&(_, end)| end <= self.capacity);

    let Some((start, end)) = block else {
      let err = ArenaError::OutOfSpace {
        requested: size,
        align,
        available: self.capacity - offset,
      };
      debug!(%err, position = offset, "arena allocation failed");
      return Err(err);
    };

    self.offset.set(end);
    Ok(start)
  }

  /// Allocates a block fitting `layout`.
  ///
  /// The block is aligned to at least [`MIN_ALIGN`]. Its contents are
  /// unspecified: zero on pages the arena never touched, stale data after a
  /// reset.
  pub fn allocate(
    &self,
    layout: Layout,
  ) -> Result<NonNull<[u8]>, ArenaError> {
    let start = self.bump(layout.size(), layout.align())?;
    let ptr = unsafe { self.base.add(start) };
    Ok(NonNull::slice_from_raw_parts(ptr, layout.size()))
  }

  /// Like [`Arena::allocate`], with the block filled with zeros.
  pub fn allocate_zeroed(
    &self,
    layout: Layout,
  ) -> Result<NonNull<[u8]>, ArenaError> {
    let block = self.allocate(layout)?;
    unsafe { ptr::write_bytes(block.cast::<u8>().as_ptr(), 0, layout.size()) };
    Ok(block)
  }

  /// Allocates room for one `T` with every byte set to zero.
  ///
  /// The memory is cleared explicitly, so this holds after a reset too. Whether
  /// all-zero bits are a valid `T` is up to the caller.
  pub fn alloc_zeroed<T>(&self) -> Result<NonNull<T>, ArenaError> {
    self.allocate_zeroed(Layout::new::<T>()).map(|block| block.cast::<T>())
  }

  /// Moves `value` into the arena. It is never dropped.
  #[allow(clippy::mut_from_ref)]
  pub fn alloc<T>(
    &self,
    value: T,
  ) -> Result<&mut T, ArenaError> {
    let ptr = self.allocate(Layout::new::<T>())?.cast::<T>();
    unsafe {
      ptr.write(value);
      Ok(&mut *ptr.as_ptr())
    }
  }

  #[allow(clippy::mut_from_ref)]
  pub fn alloc_slice_copy<T: Copy>(
    &self,
    src: &[T],
  ) -> Result<&mut [T], ArenaError> {
    let ptr = self.allocate(array_layout::<T>(src.len(), self)?)?.cast::<T>();
    unsafe {
      ptr::copy_nonoverlapping(src.as_ptr(), ptr.as_ptr(), src.len());
      Ok(slice::from_raw_parts_mut(ptr.as_ptr(), src.len()))
    }
  }

  #[allow(clippy::mut_from_ref)]
  pub fn alloc_slice_fill<T: Copy>(
    &self,
    len: usize,
    value: T,
  ) -> Result<&mut [T], ArenaError> {
    self.alloc_slice_fill_with(len, |_| value)
  }

  /// Allocates `len` values produced by `f(index)`.
  ///
  /// If `f` panics the block stays allocated and the values already written
  /// are leaked.
  #[allow(clippy::mut_from_ref)]
  pub fn alloc_slice_fill_with<T, F>(
    &self,
    len: usize,
    mut f: F,
  ) -> Result<&mut [T], ArenaError>
  where
    F: FnMut(usize) -> T,
  {
    let ptr = self.allocate(array_layout::<T>(len, self)?)?.cast::<T>();
    unsafe {
      for i in 0..len {
        ptr.add(i).write(f(i));
      }
      Ok(slice::from_raw_parts_mut(ptr.as_ptr(), len))
    }
  }

  fn offset_of(
    &self,
    ptr: NonNull<u8>,
  ) -> Option<usize> {
    ptr
      .as_ptr()
      .addr()
      .checked_sub(self.base.as_ptr().addr())
      .filter(|&offset| offset <= self.capacity)
  }

  /// Tries to change the size of a block in place.
  ///
  /// - Shrinking is always accepted. If the block is the last one allocated,
  ///   the freed tail goes back to the arena.
  /// - Growing is accepted only for the last block allocated, and only while
  ///   it still fits in the capacity.
  /// - While a [`Scratch`] is open, blocks allocated before it opened keep
  ///   their size in the arena: growing them is rejected and shrinking them
  ///   reclaims nothing.
  ///
  /// Returns `false` when the block stays as it was.
  ///
  /// # Safety
  ///
  /// `ptr` must have been returned by this arena for a block of
  /// `layout.size()` bytes, and no memory past `new_size` may be accessed
  /// through it once a shrink is accepted.
  pub unsafe fn resize(
    &self,
    ptr: NonNull<u8>,
    layout: Layout,
    new_size: usize,
  ) -> bool {
    let old_size = layout.size();
    let top = self
      .offset_of(ptr)
      .filter(|start| start + old_size == self.offset.get())
      .filter(|&start| self.above_floor(start, old_size));

    if new_size <= old_size {
      if let Some(start) = top {
        self.offset.set(start + new_size);
      }
      return true;
    }

    match top.and_then(|start| start.checked_add(new_size)) {
      Some(end) if end <= self.capacity => {
        self.offset.set(end);
        true
      }
      _ => false,
    }
  }

  /// Whether a block lies inside the innermost open scratch. A zero-length
  /// block sitting exactly at the scratch start may predate it, so it does not.
  fn above_floor(
    &self,
    start: usize,
    size: usize,
  ) -> bool {
    match self.floor {
      Some(floor) => start >= floor && start + size > floor,
      None => true,
    }
  }

  /// Does nothing. Individual blocks are never freed.
  ///
  /// # Safety
  ///
  /// Always safe to call. Marked `unsafe` to mirror [`Arena::resize`].
  #[inline]
  pub unsafe fn free(
    &self,
    _ptr: NonNull<u8>,
    _layout: Layout,
  ) {
  }

  /// Forgets every allocation. The mapping stays in place.
  pub fn reset(&mut self) {
    trace!(position = self.offset.get(), "reset arena");
    self.offset.set(0);
  }

  /// Opens a [`Scratch`] region at the current position.
  pub fn scratch(&mut self) -> Scratch<'_> {
    Scratch::open(self)
  }

  /// Starts a scratch at the current position. Returns the enclosing
  /// scratch's floor, to be handed back to [`Arena::rewind`].
  pub(crate) fn enter_scratch(&mut self) -> Option<usize> {
    self.floor.replace(self.offset.get())
  }

  /// Moves the offset back to `offset`, which must not be ahead of it, and
  /// reinstates the enclosing scratch's floor.
  pub(crate) fn rewind(
    &mut self,
    offset: usize,
    floor: Option<usize>,
  ) {
    let current = self.offset.get();
    assert!(
      offset <= current,
      "scratch rewind to offset {offset} is past the arena position {current}"
    );
    self.offset.set(offset);
    self.floor = floor;
  }

  /// Returns the region to the OS. Same as dropping the arena.
  pub fn release(self) {
    drop(self);
  }
}

impl Drop for Arena {
  fn drop(&mut self) {
    match unsafe { vm::release(self.base, self.capacity) } {
      Ok(()) => debug!(base = ?self.base, capacity = self.capacity, "released arena"),
      Err(err) => error!(
        %err,
        base = ?self.base,
        capacity = self.capacity,
        "failed to release arena"
      ),
    }
  }
}

impl fmt::Debug for Arena {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    f.debug_struct("Arena")
      .field("base", &self.base)
      .field("capacity", &self.capacity)
      .field("offset", &self.offset.get())
      .field("floor", &self.floor)
      .finish()
  }
}

fn array_layout<T>(
  len: usize,
  arena: &Arena,
) -> Result<Layout, ArenaError> {
  Layout::array::<T>(len).map_err(|_| ArenaError::OutOfSpace {
    requested: len.saturating_mul(mem::size_of::<T>()),
    align: mem::align_of::<T>().max(MIN_ALIGN),
    available: arena.remaining(),
  })
}

//! Operating system virtual-memory boundary.
//!
//! Everything the arena needs from the OS goes through three calls:
//!
//! ```text
//!   page_size()            -> granularity of a mapping
//!   reserve(size)          -> base address of `size` bytes of address space
//!   release(base, size)    -> hand the whole range back
//! ```
//!
//! On Unix the reservation is an anonymous private `mmap(2)`. The kernel backs
//! pages with physical memory the first time they are touched, so reserving
//! gigabytes costs nothing until the arena is actually written to:
//!
//! ```text
//!   base                                                     base + size
//!   ┌──────────┬──────────┬──────────┬─────────────────────────────────┐
//!   │ resident │ resident │ resident │   reserved, not yet committed   │
//!   └──────────┴──────────┴──────────┴─────────────────────────────────┘
//!                                    ▲
//!                                    └── first page never touched
//! ```
//!
//! On Windows the range is reserved and committed with `VirtualAlloc`. Commit
//! only charges the range against the pagefile; physical pages still arrive
//! on first touch.
//!
//! Other targets fall back to a zeroed, page-aligned heap block. It commits
//! everything up front but keeps the same capacity contract.

use std::{io, ptr::NonNull};

/// Used when the OS cannot tell us its page size.
const FALLBACK_PAGE_SIZE: usize = 4096;

/// Returns the OS page size in bytes. Always a power of two.
pub fn page_size() -> usize {
  imp::page_size()
}

/// Reserves `size` bytes of readable and writable address space.
///
/// `size` must be a non-zero multiple of [`page_size`]. When `populate` is set
/// the pages are committed immediately instead of on first touch.
pub fn reserve(
  size: usize,
  populate: bool,
) -> io::Result<NonNull<u8>> {
  debug_assert!(size > 0 && size % page_size() == 0);
  imp::reserve(size, populate)
}

/// Returns a range obtained from [`reserve`] to the OS.
///
/// # Safety
///
/// `base` and `size` must be exactly what a previous [`reserve`] call returned
/// and was given, and no pointer into the range may be used afterwards.
pub unsafe fn release(
  base: NonNull<u8>,
  size: usize,
) -> io::Result<()> {
  unsafe { imp::release(base, size) }
}

#[cfg(unix)]
mod imp {
  use std::{
    io,
    ptr::{self, NonNull},
  };

  use super::FALLBACK_PAGE_SIZE;

  pub fn page_size() -> usize {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size <= 0 {
      FALLBACK_PAGE_SIZE
    } else {
      size as usize
    }
  }

  pub fn reserve(
    size: usize,
    populate: bool,
  ) -> io::Result<NonNull<u8>> {
    #[allow(unused_mut)]
    let mut flags = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS;

    // Without MAP_NORESERVE Linux counts the whole range against overcommit.
    #[cfg(any(target_os = "linux", target_os = "android"))]
    {
      flags |= libc::MAP_NORESERVE;
      if populate {
        flags |= libc::MAP_POPULATE;
      }
    }

    let addr = unsafe {
      libc::mmap(
        ptr::null_mut(),
        size,
        libc::PROT_READ | libc::PROT_WRITE,
        flags,
        -1,
        0,
      )
    };

    if addr == libc::MAP_FAILED {
      return Err(io::Error::last_os_error());
    }

    let base =
      NonNull::new(addr.cast::<u8>()).ok_or_else(|| io::Error::other("mmap returned null"))?;

    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    if populate {
      unsafe { super::prefault(base, size) };
    }

    Ok(base)
  }

  pub unsafe fn release(
    base: NonNull<u8>,
    size: usize,
  ) -> io::Result<()> {
    if unsafe { libc::munmap(base.as_ptr().cast(), size) } != 0 {
      return Err(io::Error::last_os_error());
    }
    Ok(())
  }
}

#[cfg(windows)]
mod imp {
  use std::{
    io, mem,
    ptr::{self, NonNull},
  };

  use windows_sys::Win32::System::{
    Memory::{MEM_COMMIT, MEM_RELEASE, MEM_RESERVE, PAGE_READWRITE, VirtualAlloc, VirtualFree},
    SystemInformation::{GetSystemInfo, SYSTEM_INFO},
  };

  use super::FALLBACK_PAGE_SIZE;

  pub fn page_size() -> usize {
    let mut info: SYSTEM_INFO = unsafe { mem::zeroed() };
    unsafe { GetSystemInfo(&mut info) };
    match info.dwPageSize as usize {
      0 => FALLBACK_PAGE_SIZE,
      size => size,
    }
  }

  pub fn reserve(
    size: usize,
    populate: bool,
  ) -> io::Result<NonNull<u8>> {
    let addr = unsafe { VirtualAlloc(ptr::null(), size, MEM_RESERVE | MEM_COMMIT, PAGE_READWRITE) };
    let base = NonNull::new(addr.cast::<u8>()).ok_or_else(io::Error::last_os_error)?;

    if populate {
      unsafe { super::prefault(base, size) };
    }

    Ok(base)
  }

  pub unsafe fn release(
    base: NonNull<u8>,
    _size: usize,
  ) -> io::Result<()> {
    // MEM_RELEASE requires a size of zero and frees the whole reservation.
    if unsafe { VirtualFree(base.as_ptr().cast(), 0, MEM_RELEASE) } == 0 {
      return Err(io::Error::last_os_error());
    }
    Ok(())
  }
}

#[cfg(not(any(unix, windows)))]
mod imp {
  use std::{alloc, io, ptr::NonNull};

  use super::FALLBACK_PAGE_SIZE;

  pub fn page_size() -> usize {
    FALLBACK_PAGE_SIZE
  }

  fn layout(size: usize) -> io::Result<alloc::Layout> {
    alloc::Layout::from_size_align(size, FALLBACK_PAGE_SIZE)
      .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))
  }

  pub fn reserve(
    size: usize,
    _populate: bool,
  ) -> io::Result<NonNull<u8>> {
    let layout = layout(size)?;
    let addr = unsafe { alloc::alloc_zeroed(layout) };
    NonNull::new(addr).ok_or_else(|| io::Error::from(io::ErrorKind::OutOfMemory))
  }

  pub unsafe fn release(
    base: NonNull<u8>,
    size: usize,
  ) -> io::Result<()> {
    let layout = layout(size)?;
    unsafe { alloc::dealloc(base.as_ptr(), layout) };
    Ok(())
  }
}

/// Touches one byte per page so the OS commits the whole range now.
#[cfg(any(windows, all(unix, not(any(target_os = "linux", target_os = "android")))))]
unsafe fn prefault(
  base: NonNull<u8>,
  size: usize,
) {
  let page = page_size();
  let mut offset = 0;
  while offset < size {
    // Fresh pages read as zero, so writing zero keeps them unchanged.
    unsafe { base.as_ptr().add(offset).write_volatile(0) };
    offset += page;
  }
}

//! Error types for arena operations.

use std::io;

use thiserror::Error;

/// Errors returned by [`Arena`](crate::Arena) construction and allocation.
#[derive(Error, Debug)]
pub enum ArenaError {
  /// The OS refused to reserve the requested address space.
  #[error("failed to reserve {size} bytes of address space: {source}")]
  Reservation {
    /// Requested capacity, before page rounding.
    size: usize,
    /// Underlying OS error.
    #[source]
    source: io::Error,
  },

  /// Bumping the offset would run past the end of the reservation.
  #[error(
    "arena out of space: requested {requested} bytes aligned to {align}, {available} bytes available"
  )]
  OutOfSpace {
    /// Number of bytes requested.
    requested: usize,
    /// Effective alignment of the request.
    align: usize,
    /// Bytes left between the current offset and the capacity.
    available: usize,
  },
}

impl ArenaError {
  /// Returns `true` for [`ArenaError::OutOfSpace`].
  pub fn is_out_of_space(&self) -> bool {
    matches!(self, ArenaError::OutOfSpace { .. })
  }
}

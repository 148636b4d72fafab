/// Rounds `value` up to the machine word alignment.
///
/// # Examples
///
/// ```rust
/// use std::mem;
/// use vmarena::align;
///
/// match mem::size_of::<usize>() {
///     8 => assert_eq!(align!(13), 16), // 64 bit machine.
///     4 => assert_eq!(align!(11), 12), // 32 bit machine.
///     _ => {},
/// };
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    $crate::align_to!($value, ::core::mem::size_of::<usize>())
  };
}

/// Rounds `value` up to the next multiple of `align`, which must be a power of two.
///
/// The addition is not checked, callers near `usize::MAX` should use
/// [`checked_align_to`](crate::align::checked_align_to) instead.
///
/// ```rust
/// use vmarena::align_to;
///
/// assert_eq!(align_to!(0, 16), 0);
/// assert_eq!(align_to!(1, 16), 16);
/// assert_eq!(align_to!(4097, 4096), 8192);
/// ```
#[macro_export]
macro_rules! align_to {
  ($value:expr, $align:expr) => {
    ($value + $align - 1) & !($align - 1)
  };
}

/// Same as [`align_to!`], returning `None` instead of wrapping around.
#[inline]
pub fn checked_align_to(
  value: usize,
  align: usize,
) -> Option<usize> {
  debug_assert!(align.is_power_of_two());
  value.checked_add(align - 1).map(|v| v & !(align - 1))
}

#[cfg(test)]
mod tests {
  use super::checked_align_to;
  use std::mem;

  #[test]
  fn test_align() {
    let ptr_size = mem::size_of::<usize>();

    let mut alignments = Vec::new();

    for i in 0..10 {
      let sizes = (ptr_size * i + 1)..=(ptr_size * (i + 1));

      let expected_alignment = ptr_size * (i + 1);

      alignments.push((sizes, expected_alignment));
    }

    for (sizes, expected) in alignments {
      for size in sizes {
        assert_eq!(expected, align!(size));
      }
    }
  }

  #[test]
  fn test_align_to_page() {
    assert_eq!(align_to!(1usize, 4096), 4096);
    assert_eq!(align_to!(4096usize, 4096), 4096);
    assert_eq!(align_to!(4097usize, 4096), 8192);
    assert_eq!(align_to!(1_048_576usize, 4096), 1_048_576);
  }

  #[test]
  fn test_checked_align_to_overflow() {
    assert_eq!(checked_align_to(usize::MAX, 8), None);
    assert_eq!(checked_align_to(usize::MAX - 7, 8), Some(usize::MAX - 7));
    assert_eq!(checked_align_to(9, 8), Some(16));
  }
}

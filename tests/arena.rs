use std::{alloc::Layout, slice};

use vmarena::{Arena, ArenaError, ArenaOptions, vm};

const MIB: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Particle {
  position: f32,
  velocity: f64,
  id: u16,
}

fn overlaps(
  a: (usize, usize),
  b: (usize, usize),
) -> bool {
  a.0 < b.0 + b.1 && b.0 < a.0 + a.1
}

#[test]
fn test_bytes_then_integers() {
  let arena = Arena::new(MIB).unwrap();
  assert_eq!(arena.position(), 0);
  assert!(arena.capacity() >= MIB);

  let letters = arena.alloc_slice_fill(100_000, b'A').unwrap();
  let numbers = arena.alloc_slice_fill_with(25, |i| i as i32).unwrap();

  assert!(letters.iter().all(|&b| b == b'A'));
  assert!(numbers.iter().copied().eq(0..25));

  let letters_range = (letters.as_ptr() as usize, letters.len());
  let numbers_range = (numbers.as_ptr() as usize, numbers.len() * 4);
  assert!(!overlaps(letters_range, numbers_range));
}

#[test]
fn test_disjoint_aligned_allocations() {
  let arena = Arena::new(MIB).unwrap();
  let mut ranges = Vec::new();

  for (i, align) in [1usize, 2, 4, 8, 16, 32, 64, 128, 256].iter().cycle().take(200).enumerate() {
    let size = (i * 37) % 500;
    let block = arena.allocate(Layout::from_size_align(size, *align).unwrap()).unwrap();
    let addr = block.cast::<u8>().as_ptr() as usize;

    assert_eq!(addr % align, 0);
    for &range in &ranges {
      assert!(!overlaps((addr, size), range));
    }

    unsafe { block.cast::<u8>().as_ptr().write_bytes(i as u8, size) };
    ranges.push((addr, size));
  }

  for (i, &(addr, size)) in ranges.iter().enumerate() {
    let bytes = unsafe { slice::from_raw_parts(addr as *const u8, size) };
    assert!(bytes.iter().all(|&b| b == i as u8));
  }
}

#[test]
fn test_reset_then_reuse_struct_region() {
  let mut arena = Arena::new(MIB * 4).unwrap();

  for _ in 0..40_000 {
    let particle = arena.alloc_zeroed::<Particle>().unwrap();
    assert_eq!(
      unsafe { particle.read() },
      Particle {
        position: 0.0,
        velocity: 0.0,
        id: 0
      }
    );
  }
  assert_eq!(arena.position(), 40_000 * size_of::<Particle>());

  arena.reset();
  assert_eq!(arena.position(), 0);

  let bytes = arena.alloc_slice_fill(200, b'D').unwrap();
  assert_eq!(bytes.as_ptr(), arena.as_ptr());
  assert!(bytes.iter().all(|&b| b == b'D'));
}

#[test]
fn test_out_of_space_is_recoverable() {
  let mut arena = Arena::new(vm::page_size()).unwrap();
  arena.alloc_slice_fill(arena.capacity() - 16, 0u8).unwrap();
  let position = arena.position();

  let err = arena.alloc_slice_fill(17, 0u8).unwrap_err();
  assert!(matches!(err, ArenaError::OutOfSpace { available: 16, .. }));
  assert_eq!(arena.position(), position);

  arena.reset();
  arena.alloc_slice_fill(17, 0u8).unwrap();
}

#[test]
fn test_large_reservation_is_lazy() {
  let arena = Arena::new(1 << 30).unwrap();
  assert_eq!(arena.capacity(), 1 << 30);

  let last = arena
    .allocate(Layout::from_size_align(8, 8).unwrap())
    .unwrap()
    .cast::<u64>();
  unsafe {
    last.write(0x1122_3344_5566_7788);
    assert_eq!(last.read(), 0x1122_3344_5566_7788);
  }
}

#[test]
fn test_populated_arena() {
  let arena = ArenaOptions::default().capacity(MIB).populate(true).build().unwrap();
  assert_eq!(arena.capacity(), MIB);

  let bytes = arena.alloc_slice_fill(MIB, 0x7Fu8).unwrap();
  assert_eq!(bytes.len(), MIB);
  assert_eq!(arena.remaining(), 0);
}

#[test]
fn test_reservation_error_propagates() {
  let err = ArenaOptions::new(0).build().unwrap_err();
  let ArenaError::Reservation { size, source } = err else {
    panic!("expected a reservation error");
  };
  assert_eq!(size, 0);
  assert_eq!(source.kind(), std::io::ErrorKind::InvalidInput);
}

use vmarena::{Arena, LinearAlloc, Scratch};

const MIB: usize = 1024 * 1024;

#[test]
fn test_scratch_rewinds_to_open_position() {
  let mut arena = Arena::new(MIB).unwrap();
  let letters = arena.alloc_slice_fill(100, b'A').unwrap().as_ptr();
  let opened_at = arena.position();

  let scratch = arena.scratch();
  let bytes = scratch.alloc_slice_fill(1000, b'B').unwrap();
  assert!(bytes.iter().all(|&b| b == b'B'));
  assert_eq!(scratch.position(), opened_at.next_multiple_of(8) + 1000);

  let letters = unsafe { std::slice::from_raw_parts(letters, 100) };
  assert!(letters.iter().all(|&b| b == b'A'));

  scratch.close();
  assert_eq!(arena.position(), opened_at);
}

#[test]
fn test_scratch_frames_per_iteration() {
  let mut arena = Arena::new(MIB).unwrap();
  arena.alloc(0u64).unwrap();

  for round in 0..100usize {
    let scratch = Scratch::open(&mut arena);
    let values = scratch.alloc_slice_fill_with(round + 1, |i| i * round).unwrap();
    assert_eq!(values.last(), Some(&(round * round)));
  }

  assert_eq!(arena.position(), 8);
}

fn sum_squares<A: LinearAlloc>(
  alloc: &A,
  n: usize,
) -> u64 {
  let layout = std::alloc::Layout::array::<u64>(n).unwrap();
  let block = alloc.allocate(layout).unwrap().cast::<u64>();
  let mut total = 0;
  for i in 0..n {
    unsafe {
      block.add(i).write((i * i) as u64);
      total += block.add(i).read();
    }
  }
  unsafe { alloc.free(block.cast(), layout) };
  total
}

#[test]
fn test_scratch_as_generic_allocator() {
  let mut arena = Arena::new(MIB).unwrap();

  let mut outer = arena.scratch();
  assert_eq!(sum_squares(&*outer, 10), 285);
  let mark = outer.position();

  {
    let inner = outer.scratch();
    assert_eq!(sum_squares(&inner, 100), 328_350);
    assert_eq!(inner.used(), 800);
  }

  assert_eq!(outer.position(), mark);
  drop(outer);
  assert_eq!(arena.position(), 0);
}

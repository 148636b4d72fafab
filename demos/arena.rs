use std::{alloc::Layout, io::Read, ptr};

use vmarena::{Arena, ArenaError};

/// Waits until the user presses ENTER.
/// Useful when you want to inspect memory state with tools like `pmap`, `htop`,
/// or `grep VmRSS /proc/<pid>/status` and watch pages get committed.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints the resident set size of this process (Linux only).
fn print_resident(label: &str) {
  let rss = std::fs::read_to_string("/proc/self/status")
    .ok()
    .and_then(|status| status.lines().find(|line| line.starts_with("VmRSS:")).map(str::to_owned))
    .unwrap_or_else(|| "VmRSS: unavailable".to_owned());

  println!("[{}] PID = {}, {}", label, std::process::id(), rss.trim());
}

fn print_alloc(
  arena: &Arena,
  layout: Layout,
  addr: *const u8,
) {
  println!(
    "Allocated {} bytes (align {}), address = {:?}, offset = {} / {}",
    layout.size(),
    layout.align(),
    addr,
    arena.position(),
    arena.capacity(),
  );
}

fn main() -> Result<(), ArenaError> {
  // 1 GiB of address space. Nothing is resident until we write to it.
  let mut arena = Arena::new(1 << 30)?;

  print_resident("start");
  println!("Reserved {} bytes at {:?}", arena.capacity(), arena.as_ptr());
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 1) Allocate a u32 and a u64, observe alignment.
  // --------------------------------------------------------------------
  let layout_u32 = Layout::new::<u32>();
  let first = arena.allocate(layout_u32)?.cast::<u32>();
  println!("\n[1] Allocate u32");
  print_alloc(&arena, layout_u32, first.as_ptr().cast::<u8>());

  let layout_u64 = Layout::new::<u64>();
  let second = arena.allocate(layout_u64)?.cast::<u64>();
  println!("[1] Allocate u64");
  print_alloc(&arena, layout_u64, second.as_ptr().cast::<u8>());

  unsafe {
    first.write(0xDEADBEEF);
    second.write(0x1122334455667788);
    println!("[1] Values = 0x{:X}, 0x{:X}", first.read(), second.read());
  }

  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 2) Touch 256 MiB. Resident memory grows only now.
  // --------------------------------------------------------------------
  let layout_big = Layout::array::<u8>(256 << 20).unwrap();
  let big = arena.allocate(layout_big)?.cast::<u8>();
  println!("\n[2] Allocate 256 MiB");
  print_alloc(&arena, layout_big, big.as_ptr());
  print_resident("after allocate, before touch");

  unsafe { ptr::write_bytes(big.as_ptr(), 0xAB, layout_big.size()) };
  print_resident("after touch");

  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 3) A scratch region: allocations inside it vanish on close.
  // --------------------------------------------------------------------
  {
    let scratch = arena.scratch();
    println!("\n[3] Scratch opened at offset {}", scratch.saved_offset());

    let words = scratch.alloc_slice_fill_with(16, |i| i as u16)?;
    println!("[3] Wrote {:?}", words);
    println!("[3] Offset inside scratch = {}", scratch.position());
  }
  println!("[3] Offset after close = {}", arena.position());

  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 4) Reset. The offset goes back to zero but pages stay resident.
  // --------------------------------------------------------------------
  arena.reset();
  println!("\n[4] Reset, offset = {}", arena.position());
  print_resident("after reset");

  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 5) Release. The whole reservation goes back to the OS.
  // --------------------------------------------------------------------
  arena.release();
  print_resident("after release");

  Ok(())
}

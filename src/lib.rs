//! # vmarena - A Virtual-Memory Arena Allocator
//!
//! This crate provides a **linear arena** (bump allocator) that reserves one large
//! region of address space up front with `mmap(2)` and lets the OS commit
//! physical pages lazily, the first time each page is touched.
//!
//! ## Overview
//!
//! ```text
//!   Arena Concept:
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                     RESERVED ADDRESS SPACE                           │
//!   │                                                                      │
//!   │   ┌─────┬─────┬─────┬─────┬───────────────────────────────────────┐  │
//!   │   │ A1  │ A2  │ A3  │ A4  │     reserved, committed on touch      │  │
//!   │   └─────┴─────┴─────┴─────┴───────────────────────────────────────┘  │
//!   │   ▲                       ▲                                       ▲  │
//!   │   │                       │                                       │  │
//!   │  base                  offset                               capacity │
//!   │                     (next alloc)                                     │
//!   └──────────────────────────────────────────────────────────────────────┘
//!
//!   Each allocation "bumps" the offset forward.
//!   Fast allocation: O(1) - one comparison and one add.
//!   No per-allocation header, no free list.
//! ```
//!
//! ## Crate Structure
//!
//! ```text
//!   vmarena
//!   ├── align      - Alignment macros (align!, align_to!)
//!   ├── arena      - Arena and ArenaOptions
//!   ├── error      - ArenaError
//!   ├── linear     - LinearAlloc trait, allocator-api2 adapter
//!   ├── scratch    - Scratch regions (stack-disciplined rewind)
//!   └── vm         - mmap/munmap boundary
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use std::alloc::Layout;
//! use vmarena::Arena;
//!
//! let mut arena = Arena::new(1 << 20).unwrap();
//!
//! // Typed allocation
//! let answer = arena.alloc(42u64).unwrap();
//! assert_eq!(*answer, 42);
//!
//! // Raw allocation
//! let block = arena.allocate(Layout::from_size_align(100, 16).unwrap()).unwrap();
//! assert_eq!(block.len(), 100);
//!
//! // Everything goes away at once
//! arena.reset();
//! assert_eq!(arena.position(), 0);
//! ```
//!
//! ## Scratch Regions
//!
//! A [`Scratch`] remembers the arena offset when it is opened and restores it
//! when it is closed. Scratches nest like stack frames:
//!
//! ```text
//!   ┌────────┬──────────────┬──────────────┬───────────────────────────┐
//!   │ arena  │ outer scratch│ inner scratch│          free             │
//!   └────────┴──────────────┴──────────────┴───────────────────────────┘
//!            ▲              ▲              ▲
//!        outer.saved    inner.saved     offset
//!
//!   inner.close() -> offset = inner.saved
//!   outer.close() -> offset = outer.saved
//! ```
//!
//! ## Generic Allocation
//!
//! [`Arena`] and [`Scratch`] implement [`LinearAlloc`] (`allocate`, `resize`,
//! `free`). `Arena` also implements [`allocator_api2::alloc::Allocator`], so
//! collections from `allocator-api2` can live in it:
//!
//! ```rust
//! use allocator_api2::vec::Vec;
//! use vmarena::Arena;
//!
//! let arena = Arena::new(1 << 20).unwrap();
//! let mut values = Vec::new_in(&arena);
//! values.extend(0..100u32);
//! assert_eq!(values.iter().sum::<u32>(), 4950);
//! ```
//!
//! ## Limitations
//!
//! - **Single-threaded**: `Arena` is `Send` but not `Sync`
//! - **No individual free**: memory returns through `reset` or a scratch rewind
//! - **Fixed capacity**: the reservation never grows after construction
//! - **Drop is never run** for values placed in the arena
//!
//! ## Safety
//!
//! The typed helpers (`alloc`, `alloc_slice_*`) are safe: the references they
//! return borrow the arena, and `reset` needs exclusive access. Raw blocks from
//! `allocate` and the `resize`/`free` calls follow the usual raw allocator
//! rules.

pub mod align;
mod arena;
mod error;
mod linear;
mod scratch;
pub mod vm;

pub use arena::{Arena, ArenaOptions, DEFAULT_CAPACITY, MIN_ALIGN};
pub use error::ArenaError;
pub use linear::LinearAlloc;
pub use scratch::Scratch;

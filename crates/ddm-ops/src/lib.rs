//! Disk-system-agnostic byte-range primitives the job engine falls back on
//! when executing `Move`/`Resize` jobs: computing the offset a region needs
//! to travel, and copying bytes between two byte ranges of the same device.
//!
//! Grounded on `disk-ops::{BlockCoordinates, OffsetCoordinates,
//! ResizeOperation}`, rebased from 512-byte sector counts onto raw byte
//! offsets since the DDM core addresses partitions in bytes (spec.md §3).

#[macro_use]
extern crate derive_new;

mod coordinates;
mod mover;

pub use self::coordinates::*;
pub use self::mover::*;

pub use ddm_types::{partitionable_spaces, Region};

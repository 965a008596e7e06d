//! Identifiers, status/flag bitsets and geometry types shared by the disk
//! device manager core and its disk-system plugins.

#[macro_use]
extern crate bitflags;
extern crate failure;
#[macro_use]
extern crate failure_derive;

mod error;
mod geometry;
mod ids;
mod region;
mod sector;
mod status;

pub use self::error::*;
pub use self::geometry::*;
pub use self::ids::*;
pub use self::region::*;
pub use self::sector::*;
pub use self::status::*;

//! Error kinds surfaced across the disk device manager boundary.
//!
//! Grounded on `crates/disks/src/error.rs`'s `failure`/`failure_derive` style:
//! one derive-macro enum per concern, with `#[fail(display = "...")]` per
//! variant and `From` conversions instead of hand-rolled `Display`/`Error`
//! impls.

use std::io;

#[derive(Debug, Fail)]
pub enum DdmError {
    #[fail(display = "no such id or path")]
    NotFound,
    #[fail(display = "ill-formed arguments or stale change counter")]
    BadValue,
    #[fail(display = "operation not allowed on this target")]
    NotAllowed,
    #[fail(display = "target is busy")]
    Busy,
    #[fail(display = "buffer too small, {} bytes needed", needed)]
    BufferOverflow { needed: usize },
    #[fail(display = "out of memory")]
    NoMemory,
    #[fail(display = "name too long")]
    NameTooLong,
    #[fail(display = "disk system init() failed")]
    InitFailed,
    #[fail(display = "disk system module failed to load")]
    ModuleLoadFailed,
    #[fail(display = "disk system refused the requested parameters")]
    ValidationFailed,
    #[fail(display = "job failed: {}", message)]
    JobFailed { message: String },
    #[fail(display = "operation canceled")]
    Canceled,
    #[fail(display = "operation reversed")]
    Reversed,
    #[fail(display = "I/O error: {}", why)]
    Io { why: io::Error },
}

impl From<io::Error> for DdmError {
    fn from(why: io::Error) -> DdmError { DdmError::Io { why } }
}

impl From<ddm_types::GeometryError> for DdmError {
    fn from(why: ddm_types::GeometryError) -> DdmError {
        warn!("rejecting geometry: {}", why);
        DdmError::BadValue
    }
}

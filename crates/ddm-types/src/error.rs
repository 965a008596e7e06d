/// Errors that can arise while constructing or resolving geometry.
///
/// Grounded on the `failure`-derive style of `crates/disks/src/error.rs`'s
/// `DiskError`/`PartitionError` enums.
#[derive(Debug, Fail)]
pub enum GeometryError {
    #[fail(display = "sector size must be non-zero")]
    ZeroSectorSize,
    #[fail(display = "{} sectors exceeds the addressable range", sectors)]
    TooManySectors { sectors: u64 },
}

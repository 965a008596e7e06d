use crate::error::GeometryError;

/// Physical geometry of a disk device (spec.md §3, `DiskDevice`).
///
/// Grounded on the teacher's `B_GET_GEOMETRY`-derived fields
/// (`crates/disks/src/config/disk.rs`'s `Disk::new`, which reads a
/// `libparted::Device`'s sector count/size): here the same shape is kept
/// without a concrete ioctl backing it, since opening real devices is a
/// disk-system concern, not the core's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub bytes_per_sector: u32,
    pub sectors_per_track: u32,
    pub cylinders: u32,
    pub heads: u32,
}

bitflags! {
    /// Derived device flags (spec.md §4.3: removable/read-only/write-once/has-media).
    #[derive(Default)]
    pub struct DeviceFlags: u32 {
        const REMOVABLE  = 0b0001;
        const READ_ONLY  = 0b0010;
        const WRITE_ONCE = 0b0100;
        const HAS_MEDIA  = 0b1000;
    }
}

/// Coarse media status, polled by the media daemon (spec.md §4.3/§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaStatus {
    None,
    MediaChanged,
    Ok,
}

impl Geometry {
    pub fn new(bytes_per_sector: u32, sectors_per_track: u32, cylinders: u32, heads: u32) -> Result<Geometry, GeometryError> {
        if bytes_per_sector == 0 {
            return Err(GeometryError::ZeroSectorSize);
        }
        Ok(Geometry { bytes_per_sector, sectors_per_track, cylinders, heads })
    }

    /// Builds a geometry from a flat sector count, assuming a single-track
    /// layout; used when the only information available is total media size
    /// (e.g. a freshly-identified removable disk with no CHS data).
    pub fn from_media(total_sectors: u64, bytes_per_sector: u32) -> Result<Geometry, GeometryError> {
        if bytes_per_sector == 0 {
            return Err(GeometryError::ZeroSectorSize);
        }
        if total_sectors > u64::from(u32::MAX) {
            return Err(GeometryError::TooManySectors { sectors: total_sectors });
        }
        Ok(Geometry { bytes_per_sector, sectors_per_track: total_sectors as u32, cylinders: 1, heads: 1 })
    }

    pub fn total_sectors(&self) -> u64 {
        u64::from(self.sectors_per_track) * u64::from(self.cylinders) * u64::from(self.heads)
    }

    pub fn total_size(&self) -> u64 {
        self.total_sectors() * u64::from(self.bytes_per_sector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_size_multiplies_geometry() {
        let geom = Geometry::new(512, 63, 10, 2).unwrap();
        assert_eq!(geom.total_sectors(), 63 * 10 * 2);
        assert_eq!(geom.total_size(), 63 * 10 * 2 * 512);
    }

    #[test]
    fn from_media_is_single_track() {
        let geom = Geometry::from_media(1_000_000, 512).unwrap();
        assert_eq!(geom.total_sectors(), 1_000_000);
        assert_eq!(geom.total_size(), 512_000_000);
    }

    #[test]
    fn zero_sector_size_rejected() {
        assert!(Geometry::new(0, 1, 1, 1).is_err());
    }
}

//! `DiskDevice`: the root partition of a device (spec C4).
//!
//! Grounded on `crates/disks/src/config/disk.rs`'s `Disk` struct for the
//! path/geometry/media-status bundle, reworked to hold `ddm_types::Geometry`
//! instead of a `libparted::Device` handle since no concrete partitioning
//! module is in scope here (spec.md §1 Non-goals).

use std::path::PathBuf;
use std::sync::Arc;

use ddm_types::{DeviceFlags, Geometry, MediaStatus, PartitionId};

use crate::lock::DeviceLock;
use crate::shadow::ShadowState;

/// Everything the manager tracks about a device beyond its root
/// `PartitionNode` (which lives in the shared partition map alongside every
/// other node).
pub struct DeviceEntry {
    pub root: PartitionId,
    pub path: PathBuf,
    pub geometry: Geometry,
    pub device_flags: DeviceFlags,
    pub media_status: MediaStatus,
    pub lock: Arc<DeviceLock>,
    pub shadow: Option<ShadowState>,
    /// Busy while a job queue is executing against this device (spec I3/I5:
    /// `busy` blocks further edits and the media daemon skips busy devices).
    pub busy: bool,
}

impl DeviceEntry {
    pub fn new(root: PartitionId, path: PathBuf, geometry: Geometry) -> Self {
        let device_flags = Self::flags_from_geometry(&geometry);
        DeviceEntry {
            root,
            path,
            geometry,
            device_flags,
            media_status: MediaStatus::Ok,
            lock: Arc::new(DeviceLock::new()),
            shadow: None,
            busy: false,
        }
    }

    /// Derives removable/read-only/write-once/has-media from geometry, the
    /// way `set_to` computes `device_flags` from a successful media/geometry
    /// probe (spec §4.3).
    fn flags_from_geometry(geometry: &Geometry) -> DeviceFlags {
        let mut flags = DeviceFlags::HAS_MEDIA;
        if geometry.total_sectors() == 0 {
            flags.remove(DeviceFlags::HAS_MEDIA);
        }
        flags
    }

    /// Transitions `{none → media-changed → ok}`; returns `true` when the
    /// media status actually changed, signalling the caller (the manager's
    /// media daemon) to uninitialize contents and rescan (spec §4.3).
    pub fn update_media_status(&mut self, observed: MediaStatus) -> bool {
        if observed == self.media_status {
            return false;
        }
        self.media_status = observed;
        true
    }

    pub fn has_shadow(&self) -> bool { self.shadow.is_some() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_entry_has_media_when_geometry_reports_sectors() {
        let geometry = Geometry::from_media(1_000_000, 512).unwrap();
        let entry = DeviceEntry::new(PartitionId::next(), PathBuf::from("/dev/disk/ata/0/raw"), geometry);
        assert!(entry.device_flags.contains(DeviceFlags::HAS_MEDIA));
        assert!(!entry.has_shadow());
    }

    #[test]
    fn media_status_change_is_detected_once() {
        let geometry = Geometry::from_media(1_000_000, 512).unwrap();
        let mut entry = DeviceEntry::new(PartitionId::next(), PathBuf::from("/dev/disk/ata/0/raw"), geometry);
        assert!(!entry.update_media_status(MediaStatus::Ok));
        assert!(entry.update_media_status(MediaStatus::MediaChanged));
        assert!(!entry.update_media_status(MediaStatus::MediaChanged));
    }
}

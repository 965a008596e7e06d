//! Boundary API (spec C9): the single surface a userland client calls
//! across, mirroring spec.md §6.2's syscall-shaped operation list.
//!
//! Grounded on `crates/disks` being wrapped by `distinst::auto` as the one
//! crossing point external callers use (`installer.rs`'s `Installer`
//! struct owning a `Disks` and exposing a handful of top-level verbs)
//! generalized here into an `Arc`-shared facade over [`DiskDeviceManager`]
//! so multiple callers can issue concurrent "syscalls" the way spec §5
//! requires (any number of threads, the manager's own locks serialize
//! conflicting access).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ddm_types::{DiskSystemId, Geometry, PartitionId};

use crate::disk_system::{Capability, DiskSystem, Operation, PartitionView};
use crate::error::DdmError;
use crate::job::Job;
use crate::manager::DiskDeviceManager;
use crate::notify::Event;

/// Thin, cloneable handle wrapping the shared manager; this is what a
/// server process would hand to each connected client (spec §6.2: "one
/// team per client, reference-counted registrations").
#[derive(Clone)]
pub struct BoundaryApi {
    manager: Arc<DiskDeviceManager>,
}

impl BoundaryApi {
    pub fn new() -> Self { BoundaryApi { manager: Arc::new(DiskDeviceManager::new()) } }

    pub fn with_manager(manager: Arc<DiskDeviceManager>) -> Self { BoundaryApi { manager } }

    pub fn manager(&self) -> &Arc<DiskDeviceManager> { &self.manager }

    pub fn subscribe<F: Fn(&Event) + Send + Sync + 'static>(&self, callback: F) { self.manager.notifier().subscribe(callback); }

    // -- device lifecycle ------------------------------------------------

    pub fn create_device(&self, path: PathBuf, geometry: Geometry) -> PartitionId { self.manager.create_device(path, geometry).0 }

    pub fn create_file_device(&self, file_path: &Path, total_size: u64, block_size: u32) -> PartitionId {
        self.manager.create_file_device(file_path, total_size, block_size).0
    }

    pub fn delete_device(&self, device: PartitionId) -> Result<(), DdmError> { self.manager.delete_device(device) }

    pub fn find_device(&self, path: &Path) -> Option<PartitionId> { self.manager.find_device(path) }

    pub fn find_partition(&self, path: &Path) -> Option<PartitionId> { self.manager.find_partition(path) }

    pub fn next_device_id(&self, after: Option<PartitionId>) -> Option<PartitionId> { self.manager.next_device_id(after) }

    pub fn add_disk_system(&self, module: Box<dyn DiskSystem>) -> DiskSystemId { self.manager.add_disk_system(module) }

    pub fn rescan_disk_systems(&self) { self.manager.rescan_disk_systems() }

    pub fn scan_partition(&self, partition: PartitionId) -> Result<(), DdmError> { self.manager.scan_partition(partition) }

    // -- queries -----------------------------------------------------------

    pub fn partition_view(&self, id: PartitionId) -> Result<PartitionView, DdmError> { self.manager.partition_view(id) }

    pub fn capabilities(&self, id: PartitionId, op: Operation) -> Result<Capability, DdmError> { self.manager.capabilities(id, op) }

    pub fn children_of(&self, id: PartitionId) -> Vec<PartitionId> { self.manager.children_of(id) }

    pub fn wire_snapshot(&self, id: PartitionId) -> Result<crate::wire::WirePartition, DdmError> { self.manager.wire_snapshot(id) }

    pub fn change_counter(&self, id: PartitionId) -> u64 { self.manager.change_counter(id) }

    // -- reference counting -------------------------------------------------

    pub fn register(&self, partition: PartitionId) -> crate::Registrar<'_> { self.manager.register(partition) }

    // -- shadow lifecycle ----------------------------------------------------

    pub fn prepare_modifications(&self, device: PartitionId, team_id: u32) -> Result<PartitionId, DdmError> {
        self.manager.prepare_modifications(device, team_id)
    }

    pub fn cancel_modifications(&self, device: PartitionId, team_id: u32) -> Result<(), DdmError> {
        self.manager.cancel_modifications(device, team_id)
    }

    pub fn commit_modifications(&self, device: PartitionId, team_id: u32) -> Result<Vec<Job>, DdmError> {
        self.manager.commit_modifications(device, team_id)
    }

    pub fn is_disk_device_modified(&self, device: PartitionId) -> bool { self.manager.is_disk_device_modified(device) }

    // -- shadow mutators ------------------------------------------------------

    pub fn shadow_resize(&self, id: PartitionId, expected_counter: u64, new_size: u64) -> Result<(), DdmError> {
        self.manager.shadow_resize(id, expected_counter, new_size)
    }

    pub fn shadow_move(&self, id: PartitionId, expected_counter: u64, new_offset: u64) -> Result<(), DdmError> {
        self.manager.shadow_move(id, expected_counter, new_offset)
    }

    pub fn shadow_create_child(&self, parent: PartitionId, offset: u64, size: u64, type_: String) -> Result<PartitionId, DdmError> {
        self.manager.shadow_create_child(parent, offset, size, type_)
    }

    pub fn shadow_delete_child(&self, parent: PartitionId, child: PartitionId) -> Result<(), DdmError> {
        self.manager.shadow_delete_child(parent, child)
    }

    // -- job introspection ----------------------------------------------------

    pub fn job_snapshot(&self, device: PartitionId) -> Option<Vec<Job>> { self.manager.job_snapshot(device) }

    pub fn pause_job_queue(&self, device: PartitionId) -> Result<(), DdmError> { self.manager.pause_job_queue(device) }

    pub fn resume_job_queue(&self, device: PartitionId) -> Result<(), DdmError> { self.manager.resume_job_queue(device) }

    pub fn cancel_job_queue(&self, device: PartitionId, reverse: bool) -> Result<(), DdmError> {
        self.manager.cancel_job_queue(device, reverse)
    }
}

impl Default for BoundaryApi {
    fn default() -> Self { BoundaryApi::new() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk_system::testing::MockDiskSystem;

    #[test]
    fn end_to_end_scan_stage_commit() {
        let api = BoundaryApi::new();
        api.add_disk_system(Box::new(MockDiskSystem::file_system("fat32")));
        let geometry = Geometry::from_media(1_000_000, 512).unwrap();
        let device = api.create_device(PathBuf::from("/dev/disk/ata/0/raw"), geometry);

        let shadow_root = api.prepare_modifications(device, 7).unwrap();
        api.shadow_create_child(shadow_root, 1_048_576, 200_000_000, "fat32".into()).unwrap();
        let jobs = api.commit_modifications(device, 7).unwrap();

        assert!(!jobs.is_empty());
        assert_eq!(api.children_of(device).len(), 1);
        assert!(!api.is_disk_device_modified(device));
    }
}

//! Scoped reference-counting handle for partitions (spec C1, "Registrar").
//!
//! Grounded on the "construction increments, drop decrements, reclaim on
//! expiry" shape the teacher already leans on for mount guards
//! (`sys_mount::Mount::into_unmount_drop`/`UnmountDrop`): acquiring a
//! partition bumps its `reference_count`; the paired release (here, `Drop`)
//! decrements it and asks the manager to reap the node if it was already
//! marked obsolete (invariant I9: `reference_count == 0 && obsolete =>
//! deletable`). Locking and registration are orthogonal per spec §4.1: a
//! lock implies holding at least one registration, but registering alone
//! does not lock anything.

use ddm_types::PartitionId;

use crate::manager::DiskDeviceManager;

/// A held reference to a partition. While alive, the manager will not reap
/// the node even if it has been marked obsolete.
pub struct Registrar<'a> {
    manager: &'a DiskDeviceManager,
    partition: PartitionId,
}

impl<'a> Registrar<'a> {
    /// Acquires a reference, incrementing the partition's refcount. Panics
    /// in debug builds if the id is unknown, mirroring the invariant that a
    /// registrar is only ever constructed for a live map entry.
    pub(crate) fn acquire(manager: &'a DiskDeviceManager, partition: PartitionId) -> Self {
        manager.increment_reference(partition);
        Registrar { manager, partition }
    }

    pub fn partition(&self) -> PartitionId { self.partition }
}

impl<'a> Drop for Registrar<'a> {
    fn drop(&mut self) {
        self.manager.decrement_reference(self.partition);
    }
}

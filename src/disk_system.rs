//! The disk-system plugin contract (spec C5).
//!
//! No direct teacher analogue exists — `distinst` drives `libparted`
//! directly rather than going through a plugin v-table — so this is
//! grounded on the *shape* of `disk-ops`'s staged `DiskOps → ChangePartitions
//! → CreatePartitions → FormatPartitions` builder (`crates/disk-ops/src/
//! ops.rs`): scan once, validate, then execute in discrete named steps.
//! That shape is generalized here into the identify/scan/supports/validate/
//! execute contract spec.md §4.4/§6.1 describe, with `supports_*`/
//! `validate_*`/writer methods collapsed onto a single `Operation`
//! discriminant rather than forty near-identical trait methods — the same
//! kind of dispatch-table collapse the teacher itself favors in
//! `disk-ops::ops` (one enum of staged operations instead of one method per
//! partition aspect).

use std::path::Path;

use ddm_types::Region;

use crate::error::DdmError;
use crate::partition::Cookie;

/// One editable aspect of a partition, as named in spec.md §4.4/§6.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Defragment,
    Repair { check_only: bool },
    Resize,
    ResizeChild,
    Move,
    MoveChild,
    SetName,
    SetContentName,
    SetType,
    SetParameters,
    SetContentParameters,
    CreateChild,
    DeleteChild,
    Initialize,
    InitializeChild,
}

/// Whether an operation is supported, and whether it may run while the
/// partition's content is mounted (spec §4.4: "each optionally returns a
/// `while_mounted` boolean").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capability {
    pub supported: bool,
    pub while_mounted: bool,
}

impl Capability {
    pub const fn unsupported() -> Self { Capability { supported: false, while_mounted: false } }

    pub const fn supported(while_mounted: bool) -> Self { Capability { supported: true, while_mounted } }
}

/// Parameters accompanying a `validate`/`execute` call. One enum instead of
/// per-operation method signatures, mirroring the `Operation` collapse
/// above.
#[derive(Debug, Clone)]
pub enum OperationParams {
    Resize { size: u64 },
    Move { offset: u64 },
    Name(String),
    Type(String),
    Parameters(String),
    CreateChild { offset: u64, size: u64, type_: String, parameters: String },
    DeleteChild { child: ddm_types::PartitionId },
    Initialize { parameters: String },
    None,
}

/// What an `execute` call produced, beyond success/failure.
#[derive(Debug, Clone, Default)]
pub struct OperationOutcome {
    /// Set by `CreateChild`: the disk system's opinion on the child's
    /// content type (e.g. the pretty name of the file system it laid down).
    pub content_type: Option<String>,
    /// Partitions whose content must physically travel with a `Move`
    /// (descendants the disk system reports as not content-addressed).
    pub contents_to_move: Vec<ddm_types::PartitionId>,
}

/// A read-only view of a partition passed to `identify`/`supports_*`/
/// `validate_*` so a disk system can answer without a live handle into the
/// manager's locked state.
#[derive(Debug, Clone)]
pub struct PartitionView {
    pub id: ddm_types::PartitionId,
    pub offset: u64,
    pub size: u64,
    pub content_size: u64,
    pub block_size: u32,
    pub type_: Option<String>,
    pub mounted: bool,
}

/// Polymorphic module describing one partitioning system or file system
/// (spec C5). Scanning methods are called device-write-locked; querying and
/// validation are called device-read-locked; writers run with the device
/// unlocked but the partition's registrar reference held, per spec §4.4.
pub trait DiskSystem: Send + Sync {
    fn name(&self) -> &str;

    fn pretty_name(&self) -> &str { self.name() }

    fn is_file_system(&self) -> bool { false }

    /// Returns a match priority in `[-1, 1]` (`-1` = no match) and an opaque
    /// cookie to hand back to `scan`.
    fn identify(&self, device_path: &Path, partition: &PartitionView) -> (f32, Option<Cookie>) {
        let _ = (device_path, partition);
        (-1.0, None)
    }

    /// Populates the partition's children from the identified content.
    /// Default: leaves the partition unrecognized (no plugin installed).
    fn scan(&self, device_path: &Path, partition: &PartitionView, cookie: Option<Cookie>) -> Result<ScanResult, DdmError> {
        let _ = (device_path, partition, cookie);
        Ok(ScanResult::default())
    }

    fn free_identify_cookie(&self, _cookie: Cookie) {}
    fn free_cookie(&self, _cookie: Cookie) {}
    fn free_content_cookie(&self, _cookie: Cookie) {}

    fn capabilities(&self, _partition: &PartitionView, _op: Operation) -> Capability { Capability::unsupported() }

    fn is_sub_system_for(&self, _partition: &PartitionView) -> bool { false }

    /// Checks (and may clamp) a proposed set of parameters. Mutates
    /// `params` in place when it snaps to the nearest admissible value;
    /// callers compare input vs. output when they need exactness.
    fn validate(&self, _partition: &PartitionView, _op: Operation, params: &mut OperationParams) -> Result<(), DdmError> {
        let _ = params;
        Err(DdmError::ValidationFailed)
    }

    /// Performs the operation. Re-validates internally — the caller's prior
    /// `validate` result may be stale after an intervening rescan (spec
    /// §4.4 ordering rule).
    fn execute(&self, _partition: &PartitionView, _op: Operation, _params: OperationParams) -> Result<OperationOutcome, DdmError> {
        Err(DdmError::ValidationFailed)
    }

    /// Generic fallback when the module doesn't supply its own
    /// `get_partitionable_spaces` (spec §6.1): sorted-children gap scan
    /// over the parent's own extent.
    fn partitionable_spaces(&self, parent: Region, children: &[Region]) -> Vec<Region> {
        ddm_types::partitionable_spaces(parent, children)
    }

    /// Called by the shadow layer after every edit that lands on a
    /// partition this plugin owns (spec §4.5): lets the plugin rescue
    /// implicit side effects, e.g. a move shrinking the content size to
    /// fit, before the job generator looks at the shadow tree. Default: no
    /// implicit side effects.
    fn shadow_partition_changed(&self, _partition: &PartitionView, _op: Operation) {}

    /// Children a partitioning-system plugin wants to populate during
    /// `scan` (spec C5: "populates child C2s"). A file system has none.
    fn scanned_children(&self, _parent: &PartitionView) -> Vec<ScannedChild> { Vec::new() }

    fn load(&self) {}
    fn unload(&self) {}
}

#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub status: Option<ddm_types::PartitionStatus>,
    pub content_type: Option<String>,
}

/// One child a partitioning-system plugin wants the manager to materialize
/// under the scanned partition.
#[derive(Debug, Clone)]
pub struct ScannedChild {
    pub offset: u64,
    pub size: u64,
    pub type_: String,
}

pub struct DiskSystemRecord {
    pub id: ddm_types::DiskSystemId,
    pub flags: ddm_types::DiskSystemFlags,
    pub load_count: usize,
    pub module: Box<dyn DiskSystem>,
}

#[cfg(test)]
pub mod testing {
    //! A disk system implementing just enough of the contract to drive the
    //! manager/shadow/job-engine machinery in tests, standing in for the
    //! concrete MBR/GPT/BFS modules spec.md treats as external
    //! collaborators (§1 Non-goals).
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    pub struct MockDiskSystem {
        pub system_name: &'static str,
        pub priority: f32,
        pub file_system: bool,
        pub children: Vec<ScannedChild>,
        loaded: AtomicBool,
    }

    impl MockDiskSystem {
        pub fn new(name: &'static str, priority: f32) -> Self {
            MockDiskSystem { system_name: name, priority, file_system: false, children: Vec::new(), loaded: AtomicBool::new(false) }
        }

        pub fn file_system(name: &'static str) -> Self {
            MockDiskSystem { system_name: name, priority: 0.8, file_system: true, children: Vec::new(), loaded: AtomicBool::new(false) }
        }

        /// A partitioning system (e.g. a stand-in for "mbr") that populates
        /// the given children on every scan.
        pub fn partitioning(name: &'static str, priority: f32, children: Vec<ScannedChild>) -> Self {
            MockDiskSystem { system_name: name, priority, file_system: false, children, loaded: AtomicBool::new(false) }
        }

        pub fn is_loaded(&self) -> bool { self.loaded.load(Ordering::SeqCst) }
    }

    impl DiskSystem for MockDiskSystem {
        fn name(&self) -> &str { self.system_name }

        fn is_file_system(&self) -> bool { self.file_system }

        fn identify(&self, _device_path: &Path, partition: &PartitionView) -> (f32, Option<Cookie>) {
            if self.file_system {
                // only identifies partitions carrying our magic type tag.
                if partition.type_.as_deref() == Some(self.system_name) {
                    return (self.priority, Some(Box::new(())));
                }
                return (-1.0, None);
            }
            if partition.type_.is_none() {
                (self.priority, Some(Box::new(())))
            } else {
                (-1.0, None)
            }
        }

        fn scan(&self, _device_path: &Path, _partition: &PartitionView, _cookie: Option<Cookie>) -> Result<ScanResult, DdmError> {
            Ok(ScanResult { status: Some(ddm_types::PartitionStatus::Valid), content_type: Some(self.system_name.to_owned()) })
        }

        fn capabilities(&self, _partition: &PartitionView, op: Operation) -> Capability {
            match op {
                Operation::Resize | Operation::Move | Operation::CreateChild | Operation::DeleteChild => {
                    Capability::supported(false)
                }
                _ => Capability::unsupported(),
            }
        }

        fn validate(&self, partition: &PartitionView, op: Operation, params: &mut OperationParams) -> Result<(), DdmError> {
            match (op, &mut *params) {
                (Operation::Resize, OperationParams::Resize { size }) => {
                    if *size > partition.size * 4 {
                        return Err(DdmError::ValidationFailed);
                    }
                    Ok(())
                }
                (Operation::Move, OperationParams::Move { .. }) => Ok(()),
                (Operation::CreateChild, OperationParams::CreateChild { .. }) => Ok(()),
                (Operation::DeleteChild, OperationParams::DeleteChild { .. }) => Ok(()),
                _ => Err(DdmError::ValidationFailed),
            }
        }

        fn execute(&self, _partition: &PartitionView, op: Operation, _params: OperationParams) -> Result<OperationOutcome, DdmError> {
            match op {
                Operation::Resize | Operation::Move | Operation::CreateChild | Operation::DeleteChild => {
                    Ok(OperationOutcome::default())
                }
                _ => Err(DdmError::ValidationFailed),
            }
        }

        fn scanned_children(&self, _parent: &PartitionView) -> Vec<ScannedChild> { self.children.clone() }

        fn load(&self) { self.loaded.store(true, Ordering::SeqCst); }
        fn unload(&self) { self.loaded.store(false, Ordering::SeqCst); }
    }

    #[test]
    fn mock_identifies_unclaimed_partitions_only() {
        let fs = MockDiskSystem::new("mbr", 0.9);
        let claimed = PartitionView {
            id: ddm_types::PartitionId::next(),
            offset: 0,
            size: 100,
            content_size: 0,
            block_size: 512,
            type_: Some("0C".into()),
            mounted: false,
        };
        let (priority, _) = fs.identify(Path::new("/dev/sda"), &claimed);
        assert_eq!(priority, -1.0);
    }

    #[test]
    fn load_and_unload_flip_the_loaded_flag() {
        let fs = MockDiskSystem::new("mbr", 0.9);
        assert!(!fs.is_loaded());
        fs.load();
        assert!(fs.is_loaded());
        fs.unload();
        assert!(!fs.is_loaded());
    }
}

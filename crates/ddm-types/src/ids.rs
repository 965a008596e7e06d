use std::sync::atomic::{AtomicI32, Ordering};

/// Denotes "unassigned" or "absent" for any of the id types below.
pub const UNASSIGNED: i32 = -1;

macro_rules! monotonic_id {
    ($name:ident, $counter:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub i32);

        impl $name {
            /// The sentinel value denoting "unassigned/absent".
            pub const UNASSIGNED: $name = $name(UNASSIGNED);

            /// Draws the next id from the process-global counter.
            pub fn next() -> $name {
                $name($counter.fetch_add(1, Ordering::Relaxed))
            }

            pub fn is_unassigned(self) -> bool {
                self.0 == UNASSIGNED
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::UNASSIGNED
            }
        }

        static $counter: AtomicI32 = AtomicI32::new(0);
    };
}

monotonic_id!(PartitionId, NEXT_PARTITION_ID, "Identifier of a partition (or device root).");
monotonic_id!(DiskSystemId, NEXT_DISK_SYSTEM_ID, "Identifier of a loaded disk-system module.");
monotonic_id!(JobId, NEXT_JOB_ID, "Identifier of a queued job.");

/// Mirrors the kernel's mount identifier; opaque to the DDM core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VolumeId(pub i32);

impl VolumeId {
    pub const UNASSIGNED: VolumeId = VolumeId(UNASSIGNED);
}

/// The recognition state of a partition's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartitionStatus {
    Uninitialized,
    PartiallyScanned,
    Valid,
    Corrupt,
    Unrecognized,
}

impl Default for PartitionStatus {
    fn default() -> Self { PartitionStatus::Uninitialized }
}

bitflags! {
    /// Per-partition state flags (spec.md §3).
    #[derive(Default)]
    pub struct PartitionFlags: u32 {
        const BUSY                 = 0b0000_0001;
        const DESCENDANT_BUSY       = 0b0000_0010;
        const READ_ONLY             = 0b0000_0100;
        const MOUNTED               = 0b0000_1000;
        const FILE_SYSTEM           = 0b0001_0000;
        const PARTITIONING_SYSTEM   = 0b0010_0000;
        const IS_DEVICE             = 0b0100_0000;
    }
}

bitflags! {
    /// Accumulated change flags since the last commit (spec.md §3, I4/I6).
    #[derive(Default)]
    pub struct ChangeFlags: u32 {
        const INITIALIZATION        = 0b0000_0000_0001;
        const CONTENT_TYPE          = 0b0000_0000_0010;
        const STATUS                = 0b0000_0000_0100;
        const FLAGS                 = 0b0000_0000_1000;
        const SIZE                  = 0b0000_0001_0000;
        const CONTENT_SIZE          = 0b0000_0010_0000;
        const OFFSET                = 0b0000_0100_0000;
        const BLOCK_SIZE            = 0b0000_1000_0000;
        const NAME                  = 0b0001_0000_0000;
        const CONTENT_NAME          = 0b0010_0000_0000;
        const TYPE                  = 0b0100_0000_0000;
        const PARAMETERS            = 0b1000_0000_0000;
        const CONTENT_PARAMETERS    = 0b1_0000_0000_0000;
        const CHILDREN              = 0b10_0000_0000_0000;
        const VOLUME                = 0b100_0000_0000_0000;
        const DESCENDANT_CHANGED     = 0b1000_0000_0000_0000;
        const MEDIA                 = 0b1_0000_0000_0000_0000;
    }
}

// Status/capability flags on a loaded `DiskSystem` (spec.md §3).
bitflags! {
    #[derive(Default)]
    pub struct DiskSystemFlags: u32 {
        const IS_FILE_SYSTEM = 0b01;
    }
}

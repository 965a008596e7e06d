/// The start and end byte offsets of a partition on its parent device.
///
/// Grounded on `disk-ops::BlockCoordinates`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, new)]
pub struct BlockCoordinates {
    pub start: u64,
    pub end: u64,
}

impl BlockCoordinates {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// How far, and by how much, a region's bytes must be shifted to go from its
/// old coordinates to its new ones.
///
/// Grounded on `disk-ops::OffsetCoordinates`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetCoordinates {
    pub skip: u64,
    pub offset: i64,
    pub length: u64,
}

/// Describes moving and/or resizing a single region from `old` to `new`
/// coordinates (spec.md §4.6: the `Move`/`Resize` jobs).
///
/// Grounded on `disk-ops::resize::ResizeOperation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, new)]
pub struct RegionChange {
    pub old: BlockCoordinates,
    pub new: BlockCoordinates,
}

impl RegionChange {
    pub fn offset(&self) -> OffsetCoordinates {
        OffsetCoordinates {
            offset: self.new.start as i64 - self.old.start as i64,
            skip: self.old.start,
            length: self.old.len(),
        }
    }

    pub fn is_shrinking(&self) -> bool {
        self.new.len() < self.old.len()
    }

    pub fn is_growing(&self) -> bool {
        self.new.len() > self.old.len()
    }

    pub fn is_moving(&self) -> bool {
        self.old.start != self.new.start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_reports_shift_and_length() {
        let change = RegionChange::new(
            BlockCoordinates::new(1000, 2000),
            BlockCoordinates::new(1500, 2500),
        );
        let offset = change.offset();
        assert_eq!(offset.skip, 1000);
        assert_eq!(offset.length, 1000);
        assert_eq!(offset.offset, 500);
    }

    #[test]
    fn growing_and_shrinking_are_distinguished() {
        let grow = RegionChange::new(BlockCoordinates::new(0, 100), BlockCoordinates::new(0, 200));
        assert!(grow.is_growing());
        assert!(!grow.is_shrinking());

        let shrink = RegionChange::new(BlockCoordinates::new(0, 200), BlockCoordinates::new(0, 100));
        assert!(shrink.is_shrinking());
        assert!(!shrink.is_growing());
    }

    #[test]
    fn moving_changes_start_only() {
        let moved = RegionChange::new(BlockCoordinates::new(0, 100), BlockCoordinates::new(50, 150));
        assert!(moved.is_moving());
        let still = RegionChange::new(BlockCoordinates::new(0, 100), BlockCoordinates::new(0, 100));
        assert!(!still.is_moving());
    }
}

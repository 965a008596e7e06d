//! Devfs naming and publication (spec §6.4).
//!
//! Grounded on the teacher's path-mangling helpers in
//! `crates/disks/src/config/disks.rs` (`get_device_path`-style joining of a
//! parent path and an index) but generalized into the exact recursive
//! naming contract spec.md §4.2/§6.4 requires: `raw` for the device root,
//! the sibling index for a root-level child (replacing the `raw` leaf), and
//! `<parent-name>_<index>` for every deeper level. Real devfs publication is
//! out of scope (§1 Non-goals); the `DevfsPublisher` trait stands in for it
//! so the manager can call "publish/rename/unpublish" without depending on
//! an actual `/dev/disk` tree, the same way `examples/` have tests inject a
//! fake mounter rather than a real kernel mount.

use std::path::{Path, PathBuf};

/// Computes the devfs leaf name for a child at `index` beneath `parent_name`,
/// where `parent_name` is `None` for a root-level child (so the leaf is just
/// the index, replacing the device's `raw` entry) and `Some(name)` for a
/// deeper level (so the leaf becomes `<name>_<index>`).
pub fn child_leaf_name(parent_name: Option<&str>, index: usize) -> String {
    match parent_name {
        None => index.to_string(),
        Some(parent) => format!("{}_{}", parent, index),
    }
}

/// Builds the full devfs path of a partition given its device path and the
/// chain of sibling indices from the device root down to this node (empty
/// for the root device itself, which publishes as `raw`).
pub fn partition_path(device_path: &Path, index_chain: &[usize]) -> PathBuf {
    let parent = device_path.parent().unwrap_or_else(|| Path::new(""));
    if index_chain.is_empty() {
        return device_path.to_path_buf();
    }

    let mut leaf = index_chain[0].to_string();
    for &index in &index_chain[1..] {
        leaf = format!("{}_{}", leaf, index);
    }
    parent.join(leaf)
}

/// Records devfs publish/rename/unpublish calls the manager makes so tests
/// can assert on them without a real `/dev/disk` tree (no concrete devfs
/// implementation is in scope per spec.md §1).
pub trait DevfsPublisher: Send + Sync {
    fn publish(&self, path: &Path);
    fn rename(&self, from: &Path, to: &Path);
    fn unpublish(&self, path: &Path);
}

/// Normalizes a path used to back a file device, the same way a real devfs
/// would dedupe two different spellings of the same backing file.
pub fn canonical_file_device_path(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Default test/dry-run publisher: just logs. Real devfs publication
/// failures are meant to propagate as operation failures (spec §7); this
/// stand-in never fails since there is nothing to fail against.
#[derive(Default)]
pub struct NullPublisher;

impl DevfsPublisher for NullPublisher {
    fn publish(&self, path: &Path) { debug!("devfs: publish {}", path.display()); }
    fn rename(&self, from: &Path, to: &Path) { debug!("devfs: rename {} -> {}", from.display(), to.display()); }
    fn unpublish(&self, path: &Path) { debug!("devfs: unpublish {}", path.display()); }
}

#[cfg(test)]
pub mod testing {
    //! Records every publish/rename/unpublish call so a test can assert on
    //! devfs traffic without a real `/dev/disk` tree.
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    pub struct RecordingPublisher {
        pub renames: Mutex<Vec<(PathBuf, PathBuf)>>,
    }

    impl DevfsPublisher for RecordingPublisher {
        fn publish(&self, path: &Path) { debug!("devfs: publish {}", path.display()); }
        fn rename(&self, from: &Path, to: &Path) {
            self.renames.lock().push((from.to_path_buf(), to.to_path_buf()));
        }
        fn unpublish(&self, path: &Path) { debug!("devfs: unpublish {}", path.display()); }
    }

    impl DevfsPublisher for std::sync::Arc<RecordingPublisher> {
        fn publish(&self, path: &Path) { (**self).publish(path) }
        fn rename(&self, from: &Path, to: &Path) { (**self).rename(from, to) }
        fn unpublish(&self, path: &Path) { (**self).unpublish(path) }
    }
}

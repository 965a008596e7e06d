//! The partition tree node (spec C2/C3).
//!
//! Reworked from `crates/disks/src/config/partitions/{mod.rs,builder.rs}`'s
//! single concrete `PartitionInfo` struct into the tagged-variant model the
//! redesign notes call for: one `PartitionNode` carries a `PartitionKind`
//! discriminant instead of a separate type per Haiku's
//! `KPartition`/`KPhysicalPartition`/`KShadowPartition` inheritance chain.
//! Parent/child/device links are `PartitionId`s resolved through the
//! manager's map, never owned pointers, so the tree has no cycles at the
//! Rust ownership level.

use std::any::Any;

use ddm_types::{ChangeFlags, PartitionFlags, PartitionId, PartitionStatus};

/// Discriminates a physical partition (mirrors on-disk reality) from a
/// shadow partition (a staging twin created by `prepare_modifications`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionKind {
    Physical,
    /// Carries the id of the physical partition this shadow mirrors, or
    /// `None` when the shadow node was created fresh (no physical
    /// counterpart yet — it will become a `CreateChild` job).
    Shadow { origin: Option<PartitionId> },
}

impl PartitionKind {
    pub fn is_shadow(&self) -> bool { matches!(self, PartitionKind::Shadow { .. }) }

    pub fn origin(&self) -> Option<PartitionId> {
        match self {
            PartitionKind::Shadow { origin } => *origin,
            PartitionKind::Physical => None,
        }
    }
}

/// A cookie handed to a disk system on `identify`/`scan` and returned to it
/// on teardown, per the redesign note: `void*` becomes `Box<dyn Any + Send>`
/// with a strict single-free invariant enforced by the manager (a cookie is
/// taken, not cloned, whenever it is passed to a `free_*` callback).
pub type Cookie = Box<dyn Any + Send>;

pub struct PartitionNode {
    pub id: PartitionId,
    pub kind: PartitionKind,
    pub device: PartitionId,
    pub parent: Option<PartitionId>,
    pub children: Vec<PartitionId>,
    pub index: usize,

    pub offset: u64,
    pub size: u64,
    pub content_size: u64,
    pub block_size: u32,

    pub status: PartitionStatus,
    pub flags: PartitionFlags,

    pub name: Option<String>,
    pub type_: Option<String>,
    pub parameters: Option<String>,
    pub content_name: Option<String>,
    pub content_type: Option<String>,
    pub content_parameters: Option<String>,

    pub disk_system: Option<ddm_types::DiskSystemId>,
    pub cookie: Option<Cookie>,
    pub content_cookie: Option<Cookie>,

    pub volume_id: Option<ddm_types::VolumeId>,
    pub mount_cookie: Option<u64>,

    pub change_flags: ChangeFlags,
    pub change_counter: u64,

    pub reference_count: usize,
    pub obsolete: bool,
}

impl PartitionNode {
    /// Constructs the root node of a freshly opened device: unpublished
    /// content, no parent, `is_device` flag set (spec §3 DiskDevice extends
    /// Partition).
    pub fn new_device_root(device: PartitionId, offset: u64, size: u64, block_size: u32) -> Self {
        PartitionNode {
            id: device,
            kind: PartitionKind::Physical,
            device,
            parent: None,
            children: Vec::new(),
            index: 0,
            offset,
            size,
            content_size: 0,
            block_size,
            status: PartitionStatus::Uninitialized,
            flags: PartitionFlags::IS_DEVICE,
            name: None,
            type_: None,
            parameters: None,
            content_name: None,
            content_type: None,
            content_parameters: None,
            disk_system: None,
            cookie: None,
            content_cookie: None,
            volume_id: None,
            mount_cookie: None,
            change_flags: ChangeFlags::empty(),
            change_counter: 0,
            reference_count: 0,
            obsolete: false,
        }
    }

    pub fn new_child(id: PartitionId, device: PartitionId, parent: PartitionId, kind: PartitionKind) -> Self {
        PartitionNode {
            id,
            kind,
            device,
            parent: Some(parent),
            children: Vec::new(),
            index: 0,
            offset: 0,
            size: 0,
            content_size: 0,
            block_size: 0,
            status: PartitionStatus::Uninitialized,
            flags: PartitionFlags::empty(),
            name: None,
            type_: None,
            parameters: None,
            content_name: None,
            content_type: None,
            content_parameters: None,
            disk_system: None,
            cookie: None,
            content_cookie: None,
            volume_id: None,
            mount_cookie: None,
            change_flags: ChangeFlags::empty(),
            change_counter: 0,
            reference_count: 0,
            obsolete: false,
        }
    }

    pub fn is_busy(&self) -> bool { self.flags.contains(PartitionFlags::BUSY) }

    pub fn is_device(&self) -> bool { self.flags.contains(PartitionFlags::IS_DEVICE) }

    /// Records a mutation: bumps the change counter, accumulates the flags
    /// bit and, for shadow nodes, marks the attribute as diverged from the
    /// physical origin (invariant I6: a clear bit means "still mirroring").
    pub fn mark_changed(&mut self, flags: ChangeFlags) {
        self.change_flags |= flags;
        self.change_counter += 1;
    }

    pub fn shallow_clone_as_shadow(&self, new_id: PartitionId) -> PartitionNode {
        PartitionNode {
            id: new_id,
            kind: PartitionKind::Shadow { origin: Some(self.id) },
            device: self.device,
            parent: self.parent,
            children: Vec::new(),
            index: self.index,
            offset: self.offset,
            size: self.size,
            content_size: self.content_size,
            block_size: self.block_size,
            status: self.status,
            flags: self.flags,
            name: self.name.clone(),
            type_: self.type_.clone(),
            parameters: self.parameters.clone(),
            content_name: self.content_name.clone(),
            content_type: self.content_type.clone(),
            content_parameters: self.content_parameters.clone(),
            disk_system: self.disk_system,
            cookie: None,
            content_cookie: None,
            volume_id: self.volume_id,
            mount_cookie: self.mount_cookie,
            change_flags: ChangeFlags::empty(),
            change_counter: 0,
            reference_count: 0,
            obsolete: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_root_is_uninitialized_and_marked_device() {
        let root = PartitionNode::new_device_root(PartitionId::next(), 0, 512_000_000, 512);
        assert_eq!(root.status, PartitionStatus::Uninitialized);
        assert!(root.is_device());
        assert!(root.children.is_empty());
    }

    #[test]
    fn mark_changed_is_monotonic() {
        let mut node = PartitionNode::new_device_root(PartitionId::next(), 0, 1024, 512);
        let before = node.change_counter;
        node.mark_changed(ChangeFlags::SIZE);
        assert!(node.change_counter > before);
        assert!(node.change_flags.contains(ChangeFlags::SIZE));
    }

    #[test]
    fn shadow_clone_tracks_origin_and_resets_change_state() {
        let physical = PartitionNode::new_device_root(PartitionId::next(), 0, 2048, 512);
        let shadow_id = PartitionId::next();
        let shadow = physical.shallow_clone_as_shadow(shadow_id);
        assert_eq!(shadow.kind.origin(), Some(physical.id));
        assert_eq!(shadow.change_counter, 0);
        assert!(shadow.change_flags.is_empty());
        assert_eq!(shadow.size, physical.size);
    }
}

//! Shadow (staging) layer (spec C7).
//!
//! No direct teacher analogue: `distinst` mutates its `Disks` configuration
//! directly with no staging copy. Built from spec.md §4.5 — clone the
//! physical subtree into shadow nodes owned by one team, track per-node
//! change flags, and let every edit call out to the owning disk system so
//! it can rescue implicit side effects — cross-checked against
//! `examples/original_source/.../KShadowPartition.cpp` for the "propagate
//! only where unchanged" listener semantics behind invariant I6.

use ddm_types::{ChangeFlags, PartitionFlags, PartitionId, PartitionStatus};

use crate::disk_system::{Operation, PartitionView};
use crate::error::DdmError;
use crate::job::{Job, JobGenerator, JobKind, PhysicalNode, ShadowNode};
use crate::manager::{DiskDeviceManager, ManagerState};
use crate::partition::{PartitionKind, PartitionNode};

/// Lives on the `DeviceEntry` while a shadow tree is staged against it.
/// `team_id` is the spec's "owning team": only it may submit edits, and a
/// device hosts at most one shadow at a time.
pub struct ShadowState {
    pub team_id: u32,
    pub root: PartitionId,
}

impl ShadowState {
    pub fn new(team_id: u32, root: PartitionId) -> Self { ShadowState { team_id, root } }
}

impl DiskDeviceManager {
    /// `prepare_modifications(device, team)` (spec §4.5): clones the whole
    /// physical subtree rooted at `device` into a parallel shadow tree owned
    /// by `team`. Fails with `Busy` if a shadow is already staged.
    pub fn prepare_modifications(&self, device: PartitionId, team_id: u32) -> Result<PartitionId, DdmError> {
        let lock = self.device_lock(device)?;
        let _guard = lock.write();

        let already_staged = self.with_state(|state| state.devices.get(&device).map(|d| d.has_shadow()).unwrap_or(false));
        if already_staged {
            return Err(DdmError::Busy);
        }

        let shadow_root = self.with_state(|state| Self::clone_subtree_as_shadow(state, device, None));

        self.with_state(|state| {
            if let Some(entry) = state.devices.get_mut(&device) {
                entry.shadow = Some(ShadowState::new(team_id, shadow_root));
            }
        });

        Ok(shadow_root)
    }

    fn clone_subtree_as_shadow(state: &mut ManagerState, physical: PartitionId, new_parent: Option<PartitionId>) -> PartitionId {
        let children = state.partitions.get(&physical).expect("physical node exists").children.clone();
        let new_id = PartitionId::next();
        let mut shadow_node = state.partitions.get(&physical).unwrap().shallow_clone_as_shadow(new_id);
        shadow_node.parent = new_parent;
        shadow_node.children = Vec::new();
        state.partitions.insert(new_id, shadow_node);

        let child_ids: Vec<PartitionId> =
            children.into_iter().map(|child| Self::clone_subtree_as_shadow(state, child, Some(new_id))).collect();

        state.partitions.get_mut(&new_id).unwrap().children = child_ids;
        new_id
    }

    pub fn is_disk_device_modified(&self, device: PartitionId) -> bool {
        self.with_state(|state| state.devices.get(&device).map(|d| d.has_shadow()).unwrap_or(false))
    }

    pub fn shadow_children(&self, shadow: PartitionId) -> Vec<PartitionId> { self.children_of(shadow) }

    pub fn shadow_origin(&self, id: PartitionId) -> Option<PartitionId> {
        self.with_state(|state| state.partitions.get(&id).and_then(|n| n.kind.origin()))
    }

    /// `cancel_modifications(device, team)` (spec §4.5): discards the
    /// staged tree without touching the physical one. Only the owning team
    /// may cancel.
    pub fn cancel_modifications(&self, device: PartitionId, team_id: u32) -> Result<(), DdmError> {
        let lock = self.device_lock(device)?;
        let _guard = lock.write();

        let shadow_root = self.with_state(|state| {
            let entry = state.devices.get(&device).ok_or(DdmError::NotFound)?;
            match &entry.shadow {
                Some(shadow) if shadow.team_id == team_id => Ok(shadow.root),
                Some(_) => Err(DdmError::NotAllowed),
                None => Err(DdmError::BadValue),
            }
        })?;

        self.with_state(|state| {
            Self::remove_subtree(state, shadow_root);
            if let Some(entry) = state.devices.get_mut(&device) {
                entry.shadow = None;
            }
        });

        Ok(())
    }

    fn remove_subtree(state: &mut ManagerState, id: PartitionId) {
        let children = state.partitions.get(&id).map(|n| n.children.clone()).unwrap_or_default();
        for child in children {
            Self::remove_subtree(state, child);
        }
        state.partitions.remove(&id);
    }

    /// Shifts `id`'s absolute device-origin offset (spec §3: offsets are
    /// bytes from the device, not the parent) and every descendant's by the
    /// same delta, since a `Move` job relocates the whole subtree's bytes.
    fn shift_subtree_offset(state: &mut ManagerState, id: PartitionId, delta: i64) {
        let children = match state.partitions.get_mut(&id) {
            Some(node) => {
                node.offset = (node.offset as i64 + delta) as u64;
                node.children.clone()
            }
            None => return,
        };
        for child in children {
            Self::shift_subtree_offset(state, child, delta);
        }
    }

    /// Writes `len` zero bytes starting at `offset` on an already-open
    /// backing file. Best-effort: errors are swallowed by the caller the
    /// same way `ddm_ops::move_region` failures are (spec.md keeps concrete
    /// device I/O out of scope; this is bookkeeping hygiene, not a
    /// correctness requirement).
    fn zero_region(file: &mut std::fs::File, offset: u64, len: u64) -> std::io::Result<()> {
        use std::io::{Seek, SeekFrom, Write};
        file.seek(SeekFrom::Start(offset))?;
        const CHUNK: usize = 64 * 1024;
        let zeros = [0u8; CHUNK];
        let mut remaining = len;
        while remaining > 0 {
            let take = remaining.min(CHUNK as u64) as usize;
            file.write_all(&zeros[..take])?;
            remaining -= take as u64;
        }
        Ok(())
    }

    /// Shared plumbing behind every `shadow_set_*`/`shadow_resize`/
    /// `shadow_move` mutator (spec §4.5, invariant I5/I7): rejects a stale
    /// `expected_counter`, applies the mutation, bumps the counter and the
    /// matching change-flag bit, then lets the owning disk system rescue any
    /// implicit side effect.
    fn apply_shadow_mutation(
        &self,
        id: PartitionId,
        expected_counter: u64,
        flag: ChangeFlags,
        op: Operation,
        mutate: impl FnOnce(&mut PartitionNode),
    ) -> Result<(), DdmError> {
        let outcome = self.with_state(|state| {
            let node = state.partitions.get_mut(&id).ok_or(DdmError::NotFound)?;
            if !node.kind.is_shadow() {
                return Err(DdmError::NotAllowed);
            }
            if node.change_counter != expected_counter {
                return Err(DdmError::BadValue);
            }
            mutate(node);
            node.mark_changed(flag);
            let view = PartitionView {
                id: node.id,
                offset: node.offset,
                size: node.size,
                content_size: node.content_size,
                block_size: node.block_size,
                type_: node.type_.clone(),
                mounted: node.flags.contains(PartitionFlags::MOUNTED),
            };
            Ok((view, node.disk_system))
        })?;

        let (view, disk_system) = outcome;
        if let Some(disk_system_id) = disk_system {
            self.with_state(|state| {
                if let Some(record) = state.disk_systems.get(&disk_system_id) {
                    record.module.shadow_partition_changed(&view, op);
                }
            });
        }
        Ok(())
    }

    pub fn shadow_resize(&self, id: PartitionId, expected_counter: u64, new_size: u64) -> Result<(), DdmError> {
        self.apply_shadow_mutation(id, expected_counter, ChangeFlags::SIZE, Operation::Resize, |node| node.size = new_size)
    }

    pub fn shadow_move(&self, id: PartitionId, expected_counter: u64, new_offset: u64) -> Result<(), DdmError> {
        self.apply_shadow_mutation(id, expected_counter, ChangeFlags::OFFSET, Operation::Move, |node| node.offset = new_offset)
    }

    pub fn shadow_set_name(&self, id: PartitionId, expected_counter: u64, name: String) -> Result<(), DdmError> {
        self.apply_shadow_mutation(id, expected_counter, ChangeFlags::NAME, Operation::SetName, |node| node.name = Some(name))
    }

    pub fn shadow_set_content_name(&self, id: PartitionId, expected_counter: u64, name: String) -> Result<(), DdmError> {
        self.apply_shadow_mutation(id, expected_counter, ChangeFlags::CONTENT_NAME, Operation::SetContentName, |node| {
            node.content_name = Some(name)
        })
    }

    pub fn shadow_set_type(&self, id: PartitionId, expected_counter: u64, type_: String) -> Result<(), DdmError> {
        self.apply_shadow_mutation(id, expected_counter, ChangeFlags::TYPE, Operation::SetType, |node| node.type_ = Some(type_))
    }

    pub fn shadow_set_parameters(&self, id: PartitionId, expected_counter: u64, parameters: String) -> Result<(), DdmError> {
        self.apply_shadow_mutation(id, expected_counter, ChangeFlags::PARAMETERS, Operation::SetParameters, |node| {
            node.parameters = Some(parameters)
        })
    }

    pub fn shadow_set_content_parameters(&self, id: PartitionId, expected_counter: u64, parameters: String) -> Result<(), DdmError> {
        self.apply_shadow_mutation(
            id,
            expected_counter,
            ChangeFlags::CONTENT_PARAMETERS,
            Operation::SetContentParameters,
            |node| node.content_parameters = Some(parameters),
        )
    }

    /// Records the disk system `id` should be formatted with on commit; the
    /// choice is kept in `content_type` until the job generator turns it
    /// into a real `Initialize` job (spec §4.6 step 5).
    pub fn shadow_initialize(&self, id: PartitionId, expected_counter: u64, disk_system: &str, parameters: String) -> Result<(), DdmError> {
        let disk_system = disk_system.to_owned();
        self.apply_shadow_mutation(id, expected_counter, ChangeFlags::INITIALIZATION, Operation::Initialize, move |node| {
            node.parameters = Some(parameters);
            node.content_type = Some(disk_system);
        })
    }

    pub fn shadow_uninitialize(&self, id: PartitionId, expected_counter: u64) -> Result<(), DdmError> {
        self.apply_shadow_mutation(id, expected_counter, ChangeFlags::INITIALIZATION, Operation::Initialize, |node| {
            node.content_type = None;
        })
    }

    /// `create_child`/`delete_child` against a shadow tree (spec §4.5): a
    /// child with `origin = None` has no physical counterpart yet and
    /// becomes `CreateChild` on commit; deleting a shadow child (survivor or
    /// not) simply removes it, so a surviving physical child with no shadow
    /// counterpart becomes `DeleteChild` on commit.
    pub fn shadow_create_child(&self, parent: PartitionId, offset: u64, size: u64, type_: String) -> Result<PartitionId, DdmError> {
        self.with_state(|state| {
            let device = state.partitions.get(&parent).ok_or(DdmError::NotFound)?.device;
            let new_id = PartitionId::next();
            let mut node = PartitionNode::new_child(new_id, device, parent, PartitionKind::Shadow { origin: None });
            node.offset = offset;
            node.size = size;
            node.content_size = size;
            node.type_ = Some(type_);
            state.partitions.insert(new_id, node);
            let parent_node = state.partitions.get_mut(&parent).unwrap();
            parent_node.children.push(new_id);
            parent_node.mark_changed(ChangeFlags::CHILDREN);
            Ok(new_id)
        })
    }

    pub fn shadow_delete_child(&self, parent: PartitionId, child: PartitionId) -> Result<(), DdmError> {
        self.with_state(|state| {
            if !state.partitions.contains_key(&child) {
                return Err(DdmError::NotFound);
            }
            Self::remove_subtree(state, child);
            if let Some(parent_node) = state.partitions.get_mut(&parent) {
                parent_node.children.retain(|c| *c != child);
                parent_node.mark_changed(ChangeFlags::CHILDREN);
            }
            Ok(())
        })
    }

    /// `commit_modifications(device, team)` (spec §4.6): generates the
    /// ordered job list turning the physical tree into the staged shadow
    /// tree and applies it. Real disk systems would run each job on a
    /// worker thread via `JobQueue` (job.rs); this applies the same
    /// generated list synchronously against the in-memory tree, which is
    /// all there is to mutate without a concrete partitioning module (spec
    /// §1 Non-goals).
    pub fn commit_modifications(&self, device: PartitionId, team_id: u32) -> Result<Vec<Job>, DdmError> {
        let lock = self.device_lock(device)?;
        let _guard = lock.write();

        let shadow_root = self.with_state(|state| {
            let entry = state.devices.get(&device).ok_or(DdmError::NotFound)?;
            match &entry.shadow {
                Some(shadow) if shadow.team_id == team_id => Ok(shadow.root),
                Some(_) => Err(DdmError::NotAllowed),
                None => Err(DdmError::BadValue),
            }
        })?;

        let (physical, shadow) =
            self.with_state(|state| (Self::physical_snapshot(state, device), Self::shadow_snapshot(state, shadow_root)));

        let move_query = |descendant: PartitionId, disk_system: ddm_types::DiskSystemId| {
            self.with_state(|state| {
                let view = match state.partitions.get(&descendant) {
                    Some(node) => PartitionView {
                        id: node.id,
                        offset: node.offset,
                        size: node.size,
                        content_size: node.content_size,
                        block_size: node.block_size,
                        type_: node.type_.clone(),
                        mounted: node.flags.contains(PartitionFlags::MOUNTED),
                    },
                    None => return false,
                };
                state
                    .disk_systems
                    .get(&disk_system)
                    .map(|record| record.module.capabilities(&view, Operation::MoveChild).supported)
                    .unwrap_or(false)
            })
        };
        let jobs = JobGenerator::generate(&physical, &shadow, &move_query)?;

        self.with_state(|state| {
            Self::remove_subtree(state, shadow_root);
            if let Some(entry) = state.devices.get_mut(&device) {
                entry.shadow = None;
            }
        });

        let mut last_created = None;
        for job in &jobs {
            self.apply_job(&job.kind, &mut last_created);
        }
        self.reindex_children(device);

        Ok(jobs)
    }

    fn physical_snapshot(state: &ManagerState, id: PartitionId) -> PhysicalNode {
        let node = state.partitions.get(&id).expect("physical node exists");
        let children = node.children.iter().map(|child| Self::physical_snapshot(state, *child)).collect();
        let mut snapshot = PhysicalNode::new(node.id, node.offset, node.size, children);
        if let Some(disk_system) = node.disk_system {
            snapshot = snapshot.with_disk_system(disk_system);
        }
        snapshot
    }

    fn shadow_snapshot(state: &ManagerState, id: PartitionId) -> ShadowNode {
        let node = state.partitions.get(&id).expect("shadow node exists");
        let children = node.children.iter().map(|child| Self::shadow_snapshot(state, *child)).collect();
        let mut shadow = ShadowNode::new(node.kind.origin(), node.offset, node.size);
        shadow.change_flags = node.change_flags;
        shadow.type_ = node.type_.clone();
        shadow.parameters = node.parameters.clone();
        shadow.content_name = node.content_name.clone();
        shadow.content_parameters = node.content_parameters.clone();
        shadow.disk_system = node.content_type.clone();
        shadow.children = children;
        shadow
    }

    /// Applies one generated job directly to the physical tree. `last_created`
    /// carries the id a `CreateChild` job produced forward to the
    /// `Initialize` job the generator targets at `PartitionId::UNASSIGNED`
    /// (job.rs: the new child's id isn't known until `CreateChild` runs).
    fn apply_job(&self, kind: &JobKind, last_created: &mut Option<PartitionId>) {
        self.with_state(|state| match kind {
            JobKind::Resize { partition, new_size } => {
                if let Some(node) = state.partitions.get(partition) {
                    let offset = node.offset;
                    let old_size = node.size;
                    let device = node.device;
                    let change = ddm_ops::RegionChange::new(
                        ddm_ops::BlockCoordinates::new(offset, offset + old_size),
                        ddm_ops::BlockCoordinates::new(offset, offset + *new_size),
                    );

                    // shrinking drops the tail of the region; zero it on the
                    // backing file so a later grow doesn't resurrect stale
                    // bytes as live content (spec.md doesn't define what a
                    // shrunk region's freed bytes read as, but leaving them
                    // untouched would be observable through a subsequent
                    // grow back over the same range).
                    if change.is_shrinking() {
                        if let Some(backing_path) = state.devices.get(&device).map(|d| d.path.clone()) {
                            if let Ok(mut file) = std::fs::OpenOptions::new().write(true).open(&backing_path) {
                                let _ = Self::zero_region(&mut file, offset + *new_size, old_size - *new_size);
                            }
                        }
                    }

                    if let Some(node) = state.partitions.get_mut(partition) {
                        node.size = *new_size;
                        node.content_size = node.content_size.min(*new_size);
                    }
                }
            }
            JobKind::Move { partition, new_offset, contents_to_move } => {
                if let Some(node) = state.partitions.get(partition) {
                    let old_offset = node.offset;
                    let device = node.device;
                    let delta = *new_offset as i64 - old_offset as i64;
                    let backing_path = state.devices.get(&device).map(|d| d.path.clone());

                    // ranges that must be physically relocated: the moved
                    // partition itself plus every descendant its disk
                    // systems reported as a non-identity move (job.rs,
                    // ddm-ops::move_region).
                    let ranges: Vec<(u64, u64)> = std::iter::once(*partition)
                        .chain(contents_to_move.iter().copied())
                        .filter_map(|id| state.partitions.get(&id).map(|n| (n.offset, n.size)))
                        .collect();

                    Self::shift_subtree_offset(state, *partition, delta);

                    if delta != 0 {
                        if let Some(backing_path) = backing_path {
                            if let Ok(mut file) = std::fs::OpenOptions::new().read(true).write(true).open(&backing_path) {
                                for (offset, size) in ranges {
                                    let coords = ddm_ops::RegionChange::new(
                                        ddm_ops::BlockCoordinates::new(offset, offset + size),
                                        ddm_ops::BlockCoordinates::new((offset as i64 + delta) as u64, (offset as i64 + delta) as u64 + size),
                                    )
                                    .offset();
                                    let _ = ddm_ops::move_region(&mut file, coords);
                                }
                            }
                        }
                    }
                }
            }
            JobKind::CreateChild { parent, offset, size, type_, .. } => {
                let device = state.partitions.get(parent).map(|n| n.device).unwrap_or(*parent);
                let new_id = PartitionId::next();
                let mut node = PartitionNode::new_child(new_id, device, *parent, PartitionKind::Physical);
                node.offset = *offset;
                node.size = *size;
                node.content_size = *size;
                node.type_ = Some(type_.clone());
                state.partitions.insert(new_id, node);
                if let Some(parent_node) = state.partitions.get_mut(parent) {
                    parent_node.children.push(new_id);
                }
                *last_created = Some(new_id);
            }
            JobKind::DeleteChild { parent, child } => {
                Self::remove_subtree(state, *child);
                if let Some(parent_node) = state.partitions.get_mut(parent) {
                    parent_node.children.retain(|c| c != child);
                }
            }
            JobKind::SetName { partition, name } => {
                if let Some(node) = state.partitions.get_mut(partition) {
                    node.name = Some(name.clone());
                }
            }
            JobKind::SetContentName { partition, name } => {
                if let Some(node) = state.partitions.get_mut(partition) {
                    node.content_name = Some(name.clone());
                }
            }
            JobKind::SetType { partition, type_ } => {
                if let Some(node) = state.partitions.get_mut(partition) {
                    node.type_ = Some(type_.clone());
                }
            }
            JobKind::SetParameters { partition, parameters } => {
                if let Some(node) = state.partitions.get_mut(partition) {
                    node.parameters = Some(parameters.clone());
                }
            }
            JobKind::SetContentParameters { partition, parameters } => {
                if let Some(node) = state.partitions.get_mut(partition) {
                    node.content_parameters = Some(parameters.clone());
                }
            }
            JobKind::Initialize { partition, .. } => {
                let target = if partition.is_unassigned() { last_created.unwrap_or(*partition) } else { *partition };
                if let Some(node) = state.partitions.get_mut(&target) {
                    node.status = PartitionStatus::Valid;
                }
            }
            JobKind::Uninitialize { partition } => {
                if let Some(node) = state.partitions.get_mut(partition) {
                    node.status = PartitionStatus::Uninitialized;
                    node.children.clear();
                }
            }
            JobKind::Defragment { .. } | JobKind::Repair { .. } | JobKind::ScanPartition { .. } => {}
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk_system::testing::MockDiskSystem;

    #[test]
    fn prepare_clones_the_whole_subtree() {
        let manager = DiskDeviceManager::new();
        let (device_id, _) = manager.create_device_for_test(1_000_000, 512);
        let child = manager.create_child_for_test(device_id, 0, 500_000);

        let shadow_root = manager.prepare_modifications(device_id, 1).unwrap();
        assert!(manager.is_disk_device_modified(device_id));

        let shadow_child = manager
            .shadow_children(shadow_root)
            .into_iter()
            .find(|id| manager.shadow_origin(*id) == Some(child))
            .expect("shadow child cloned from physical child");
        assert_eq!(manager.partition_size(shadow_child), 500_000);
    }

    #[test]
    fn prepare_twice_is_busy() {
        let manager = DiskDeviceManager::new();
        let (device_id, _) = manager.create_device_for_test(1_000_000, 512);
        manager.prepare_modifications(device_id, 1).unwrap();
        assert!(matches!(manager.prepare_modifications(device_id, 2), Err(DdmError::Busy)));
    }

    #[test]
    fn cancel_restores_unmodified_state() {
        let manager = DiskDeviceManager::new();
        let (device_id, _) = manager.create_device_for_test(1_000_000, 512);
        manager.prepare_modifications(device_id, 1).unwrap();
        manager.cancel_modifications(device_id, 1).unwrap();
        assert!(!manager.is_disk_device_modified(device_id));
    }

    #[test]
    fn resize_bumps_counter_and_marks_change_flag() {
        let manager = DiskDeviceManager::new();
        let (device_id, _) = manager.create_device_for_test(1_000_000, 512);
        let child = manager.create_child_for_test(device_id, 0, 500_000);
        let shadow_root = manager.prepare_modifications(device_id, 1).unwrap();
        let shadow_child =
            manager.shadow_children(shadow_root).into_iter().find(|id| manager.shadow_origin(*id) == Some(child)).unwrap();

        let counter = manager.change_counter(shadow_child);
        manager.shadow_resize(shadow_child, counter, 250_000).unwrap();
        assert!(manager.change_counter(shadow_child) > counter);
        assert!(manager.change_flags(shadow_child).contains(ChangeFlags::SIZE));

        // a stale counter is rejected (spec §7 BadValue).
        assert!(matches!(manager.shadow_resize(shadow_child, counter, 100_000), Err(DdmError::BadValue)));
    }

    #[test]
    fn disk_system_is_notified_of_shadow_edits() {
        let manager = DiskDeviceManager::new();
        let fs_id = manager.add_disk_system(Box::new(MockDiskSystem::new("testfs", 0.9)));
        let (device_id, _) = manager.create_device_for_test(1_000_000, 512);
        let child = manager.create_child_for_test(device_id, 0, 500_000);
        manager.set_partition_disk_system(child, fs_id);

        let shadow_root = manager.prepare_modifications(device_id, 1).unwrap();
        let shadow_child = manager.shadow_children(shadow_root).into_iter().next().unwrap();
        let counter = manager.change_counter(shadow_child);
        manager.shadow_resize(shadow_child, counter, 250_000).unwrap();
        // no panic / no observable hook here beyond exercising the call path;
        // `disk_system.rs`'s own tests cover `shadow_partition_changed` logic directly.
    }

    #[test]
    fn commit_applies_resize_and_clears_shadow() {
        let manager = DiskDeviceManager::new();
        let (device_id, _) = manager.create_device_for_test(1_000_000, 512);
        let child = manager.create_child_for_test(device_id, 0, 500_000);
        let shadow_root = manager.prepare_modifications(device_id, 1).unwrap();
        let shadow_child =
            manager.shadow_children(shadow_root).into_iter().find(|id| manager.shadow_origin(*id) == Some(child)).unwrap();
        let counter = manager.change_counter(shadow_child);
        manager.shadow_resize(shadow_child, counter, 250_000).unwrap();

        let jobs = manager.commit_modifications(device_id, 1).unwrap();
        assert!(!jobs.is_empty());
        assert!(!manager.is_disk_device_modified(device_id));
        assert_eq!(manager.partition_size(child), 250_000);
    }

    #[test]
    fn commit_creates_a_brand_new_child() {
        let manager = DiskDeviceManager::new();
        let (device_id, _) = manager.create_device_for_test(2_000_000_000, 512);
        let shadow_root = manager.prepare_modifications(device_id, 1).unwrap();
        manager.shadow_create_child(shadow_root, 1_048_576, 1_073_741_824, "EFI System".into()).unwrap();

        let jobs = manager.commit_modifications(device_id, 1).unwrap();
        assert!(jobs.iter().any(|j| matches!(j.kind, JobKind::CreateChild { .. })));
        assert_eq!(manager.children_of(device_id).len(), 1);
    }

    #[test]
    fn commit_move_physically_relocates_bytes_on_the_backing_file() {
        let mut path = std::env::temp_dir();
        path.push(format!("ddm-shadow-move-test-{}-{}", std::process::id(), PartitionId::next().0));
        std::fs::write(&path, (0u8..=255).cycle().take(1_000_000).collect::<Vec<u8>>()).unwrap();

        let manager = DiskDeviceManager::new();
        let (device_id, _) = manager.create_file_device(&path, 1_000_000, 512);
        let child = manager.create_child_for_test(device_id, 0, 1000);
        let original_bytes = std::fs::read(&path).unwrap()[0..1000].to_vec();

        let shadow_root = manager.prepare_modifications(device_id, 1).unwrap();
        let shadow_child =
            manager.shadow_children(shadow_root).into_iter().find(|id| manager.shadow_origin(*id) == Some(child)).unwrap();
        let counter = manager.change_counter(shadow_child);
        manager.shadow_move(shadow_child, counter, 5000).unwrap();

        manager.commit_modifications(device_id, 1).unwrap();
        assert_eq!(manager.partition_offset(child), 5000);

        let moved = std::fs::read(&path).unwrap();
        assert_eq!(&moved[5000..6000], &original_bytes[..]);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn commit_resize_shrink_zeroes_the_freed_tail_on_the_backing_file() {
        let mut path = std::env::temp_dir();
        path.push(format!("ddm-shadow-resize-test-{}-{}", std::process::id(), PartitionId::next().0));
        std::fs::write(&path, vec![0xABu8; 1_000_000]).unwrap();

        let manager = DiskDeviceManager::new();
        let (device_id, _) = manager.create_file_device(&path, 1_000_000, 512);
        let child = manager.create_child_for_test(device_id, 0, 1000);

        let shadow_root = manager.prepare_modifications(device_id, 1).unwrap();
        let shadow_child =
            manager.shadow_children(shadow_root).into_iter().find(|id| manager.shadow_origin(*id) == Some(child)).unwrap();
        let counter = manager.change_counter(shadow_child);
        manager.shadow_resize(shadow_child, counter, 400).unwrap();

        manager.commit_modifications(device_id, 1).unwrap();
        assert_eq!(manager.partition_size(child), 400);

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes[..400].iter().all(|b| *b == 0xAB));
        assert!(bytes[400..1000].iter().all(|b| *b == 0));

        let _ = std::fs::remove_file(&path);
    }
}

//! Job types and the job-generation/execution engine (spec C8).
//!
//! Generation is grounded on `disk-ops`'s staged-operation pipeline
//! (`crates/disk-ops/src/ops.rs`'s `DiskOps → ChangePartitions →
//! CreatePartitions → FormatPartitions` staging is the same shape as
//! spec.md's `DeleteChild → Uninitialize → Resize/Move → CreateChild →
//! Initialize → Set*` ordering) and on the exact placement algorithm
//! described in spec.md §4.6 step 4, cross-checked against
//! `examples/original_source/.../KDiskDeviceJobGenerator.cpp`. Worker-thread
//! execution is grounded on the teacher's direct `std::thread::spawn` usage
//! (`src/command.rs`, `src/misc.rs`, `crates/proc-mounts`) rather than a
//! crate the teacher never reaches for (no `rayon` here: this is sequential
//! per-device work, not an embarrassingly parallel scan).

use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use ddm_types::{ChangeFlags, DiskSystemId, PartitionId};

use crate::error::DdmError;

/// A single primitive modification (spec §4.6).
#[derive(Debug, Clone, PartialEq)]
pub enum JobKind {
    Resize { partition: PartitionId, new_size: u64 },
    Move { partition: PartitionId, new_offset: u64, contents_to_move: Vec<PartitionId> },
    CreateChild { parent: PartitionId, offset: u64, size: u64, type_: String, parameters: String },
    DeleteChild { parent: PartitionId, child: PartitionId },
    SetName { partition: PartitionId, name: String },
    SetContentName { partition: PartitionId, name: String },
    SetType { partition: PartitionId, type_: String },
    SetParameters { partition: PartitionId, parameters: String },
    SetContentParameters { partition: PartitionId, parameters: String },
    Initialize { partition: PartitionId, disk_system: String, parameters: String },
    Uninitialize { partition: PartitionId },
    Defragment { partition: PartitionId },
    Repair { partition: PartitionId, check_only: bool },
    ScanPartition { partition: PartitionId },
}

impl JobKind {
    pub fn description(&self) -> String {
        match self {
            JobKind::Resize { partition, new_size } => format!("resize partition {:?} to {} bytes", partition, new_size),
            JobKind::Move { partition, new_offset, .. } => format!("move partition {:?} to offset {}", partition, new_offset),
            JobKind::CreateChild { parent, offset, size, .. } => {
                format!("create child of {:?} at offset {} size {}", parent, offset, size)
            }
            JobKind::DeleteChild { parent, child } => format!("delete child {:?} of {:?}", child, parent),
            JobKind::SetName { partition, .. } => format!("rename partition {:?}", partition),
            JobKind::SetContentName { partition, .. } => format!("rename content of {:?}", partition),
            JobKind::SetType { partition, .. } => format!("set type of {:?}", partition),
            JobKind::SetParameters { partition, .. } => format!("set parameters of {:?}", partition),
            JobKind::SetContentParameters { partition, .. } => format!("set content parameters of {:?}", partition),
            JobKind::Initialize { partition, disk_system, .. } => format!("initialize {:?} as {}", partition, disk_system),
            JobKind::Uninitialize { partition } => format!("uninitialize {:?}", partition),
            JobKind::Defragment { partition } => format!("defragment {:?}", partition),
            JobKind::Repair { partition, check_only } => {
                format!("{} {:?}", if *check_only { "check" } else { "repair" }, partition)
            }
            JobKind::ScanPartition { partition } => format!("scan {:?}", partition),
        }
    }

    /// Whether this job type can be canceled mid-flight, and whether its
    /// effect can be undone if it already succeeded (spec §4.6 "Interrupt
    /// properties").
    pub fn interrupt_properties(&self) -> InterruptProperties {
        match self {
            JobKind::Move { .. } => InterruptProperties { can_cancel: true, reverse_on_cancel: true },
            JobKind::Resize { .. } => InterruptProperties { can_cancel: true, reverse_on_cancel: true },
            JobKind::CreateChild { .. } | JobKind::DeleteChild { .. } => {
                InterruptProperties { can_cancel: true, reverse_on_cancel: true }
            }
            JobKind::Initialize { .. } | JobKind::Uninitialize { .. } => {
                InterruptProperties { can_cancel: true, reverse_on_cancel: false }
            }
            JobKind::Defragment { .. } | JobKind::Repair { .. } => {
                InterruptProperties { can_cancel: false, reverse_on_cancel: false }
            }
            _ => InterruptProperties { can_cancel: true, reverse_on_cancel: false },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterruptProperties {
    pub can_cancel: bool,
    pub reverse_on_cancel: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Scheduled,
    InProgress,
    Succeeded,
    Failed,
    Canceled,
    CanceledReverse,
    FailedReverse,
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: ddm_types::JobId,
    pub kind: JobKind,
    pub status: JobStatus,
    pub progress: f32,
    pub error_message: Option<String>,
}

impl Job {
    pub fn new(kind: JobKind) -> Job {
        Job { id: ddm_types::JobId::next(), kind, status: JobStatus::Scheduled, progress: 0.0, error_message: None }
    }

    pub fn interrupt_properties(&self) -> InterruptProperties { self.kind.interrupt_properties() }
}

// ---------------------------------------------------------------------
// Job generation
// ---------------------------------------------------------------------

/// A plain snapshot of a physical subtree, decoupled from the manager's
/// locked maps so the placement algorithm can be unit tested with small
/// synthetic trees (spec §8's job-ordering property, I8).
#[derive(Debug, Clone)]
pub struct PhysicalNode {
    pub id: PartitionId,
    pub offset: u64,
    pub size: u64,
    pub disk_system: Option<DiskSystemId>,
    pub children: Vec<PhysicalNode>,
}

impl PhysicalNode {
    pub fn new(id: PartitionId, offset: u64, size: u64, children: Vec<PhysicalNode>) -> Self {
        PhysicalNode { id, offset, size, disk_system: None, children }
    }

    pub fn with_disk_system(mut self, disk_system: DiskSystemId) -> Self {
        self.disk_system = Some(disk_system);
        self
    }
}

/// Answers, for one descendant id, whether its disk system reports a
/// non-identity move (spec.md §4.6 step 7): its content cannot simply be
/// carried along by the raw byte shift and must be listed in the `Move`
/// job's `contents_to_move` so the executor copies it explicitly.
pub trait MoveQuery {
    fn is_non_identity_move(&self, descendant: PartitionId, disk_system: DiskSystemId) -> bool;
}

impl<F: Fn(PartitionId, DiskSystemId) -> bool> MoveQuery for F {
    fn is_non_identity_move(&self, descendant: PartitionId, disk_system: DiskSystemId) -> bool { self(descendant, disk_system) }
}

/// Never reports a non-identity move; used where no disk systems are
/// installed to ask (plain unit tests of the placement algorithm).
pub struct NoMoveQuery;

impl MoveQuery for NoMoveQuery {
    fn is_non_identity_move(&self, _descendant: PartitionId, _disk_system: DiskSystemId) -> bool { false }
}

/// A plain snapshot of a shadow subtree. `origin = None` marks a node
/// created fresh in the shadow tree (no physical counterpart).
#[derive(Debug, Clone)]
pub struct ShadowNode {
    pub origin: Option<PartitionId>,
    pub offset: u64,
    pub size: u64,
    pub change_flags: ChangeFlags,
    pub type_: Option<String>,
    pub parameters: Option<String>,
    pub content_name: Option<String>,
    pub content_parameters: Option<String>,
    pub disk_system: Option<String>,
    pub children: Vec<ShadowNode>,
}

impl ShadowNode {
    pub fn new(origin: Option<PartitionId>, offset: u64, size: u64) -> Self {
        ShadowNode {
            origin,
            offset,
            size,
            change_flags: ChangeFlags::empty(),
            type_: None,
            parameters: None,
            content_name: None,
            content_parameters: None,
            disk_system: None,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<ShadowNode>) -> Self {
        self.children = children;
        self
    }
}

pub struct JobGenerator;

impl JobGenerator {
    /// Produces the ordered job sequence turning `physical` into `shadow`
    /// (spec §4.6). Fails with `DdmError::ValidationFailed` when no
    /// realisable move ordering exists (I8). `move_query` decides, for each
    /// descendant of a moved partition, whether its disk system reports a
    /// non-identity move (step 7); pass [`NoMoveQuery`] where none is
    /// installed to ask.
    pub fn generate(physical: &PhysicalNode, shadow: &ShadowNode, move_query: &dyn MoveQuery) -> Result<Vec<Job>, DdmError> {
        let mut jobs = Vec::new();
        Self::deletions(physical, shadow, &mut jobs);
        Self::uninitializations(physical, shadow, &mut jobs);
        Self::placements(physical, shadow, move_query, &mut jobs)?;
        Self::creations_and_attributes(physical, shadow, &mut jobs);
        Ok(jobs)
    }

    /// Step 1: for every physical child with no surviving shadow
    /// counterpart, emit `DeleteChild`. Recurses into survivors first so
    /// deeper deletions are emitted before shallower ones (post-order).
    fn deletions(physical: &PhysicalNode, shadow: &ShadowNode, jobs: &mut Vec<Job>) {
        let surviving: Vec<(&PhysicalNode, &ShadowNode)> = physical
            .children
            .iter()
            .filter_map(|p| shadow.children.iter().find(|s| s.origin == Some(p.id)).map(|s| (p, s)))
            .collect();

        for (p, s) in &surviving {
            Self::deletions(p, s, jobs);
        }

        for child in &physical.children {
            if !shadow.children.iter().any(|s| s.origin == Some(child.id)) {
                jobs.push(Job::new(JobKind::DeleteChild { parent: physical.id, child: child.id }));
            }
        }
    }

    /// Step 2: any surviving node whose shadow marks `INITIALIZATION`
    /// dirty gets uninitialized before anything else touches it.
    fn uninitializations(physical: &PhysicalNode, shadow: &ShadowNode, jobs: &mut Vec<Job>) {
        if shadow.change_flags.contains(ChangeFlags::INITIALIZATION) {
            jobs.push(Job::new(JobKind::Uninitialize { partition: physical.id }));
        }
        for p in &physical.children {
            if let Some(s) = shadow.children.iter().find(|s| s.origin == Some(p.id)) {
                Self::uninitializations(p, s, jobs);
            }
        }
    }

    /// Steps 3-4: grow-before-recurse / shrink-after-recurse resize
    /// ordering, then the move-placement pass among this node's surviving
    /// children.
    fn placements(physical: &PhysicalNode, shadow: &ShadowNode, move_query: &dyn MoveQuery, jobs: &mut Vec<Job>) -> Result<(), DdmError> {
        let growing = shadow.size > physical.size;
        if growing {
            jobs.push(Job::new(JobKind::Resize { partition: physical.id, new_size: shadow.size }));
        }

        Self::plan_moves(physical, shadow, move_query, jobs)?;

        for p in &physical.children {
            if let Some(s) = shadow.children.iter().find(|s| s.origin == Some(p.id)) {
                Self::placements(p, s, move_query, jobs)?;
            }
        }

        if !growing && shadow.size < physical.size {
            jobs.push(Job::new(JobKind::Resize { partition: physical.id, new_size: shadow.size }));
        }

        Ok(())
    }

    /// Spec §4.6 step 4: surviving children whose offset changes must be
    /// relocated without ever overlapping a sibling's current extent.
    /// Greedily place whichever child becomes placeable, preferring the
    /// side (moving toward the start vs. toward the end) with fewer
    /// remaining candidates; a pass that places nothing means the
    /// arrangement is unrealisable.
    fn plan_moves(physical: &PhysicalNode, shadow: &ShadowNode, move_query: &dyn MoveQuery, jobs: &mut Vec<Job>) -> Result<(), DdmError> {
        struct Candidate<'a> {
            node: &'a PhysicalNode,
            current: u64,
            size: u64,
            target: u64,
            moved: bool,
        }

        let mut candidates: Vec<Candidate> = physical
            .children
            .iter()
            .filter_map(|p| {
                shadow.children.iter().find(|s| s.origin == Some(p.id)).map(|s| Candidate {
                    node: p,
                    current: p.offset,
                    size: p.size,
                    target: s.offset,
                    moved: s.offset == p.offset,
                })
            })
            .collect();

        loop {
            let pending_back: Vec<usize> =
                (0..candidates.len()).filter(|&i| !candidates[i].moved && candidates[i].target < candidates[i].current).collect();
            let pending_forth: Vec<usize> =
                (0..candidates.len()).filter(|&i| !candidates[i].moved && candidates[i].target > candidates[i].current).collect();

            if pending_back.is_empty() && pending_forth.is_empty() {
                break;
            }

            let order: Vec<&Vec<usize>> =
                if pending_back.len() <= pending_forth.len() { vec![&pending_back, &pending_forth] } else { vec![&pending_forth, &pending_back] };

            let mut placed_this_pass = false;
            'sides: for side in order {
                for &i in side {
                    let target_start = candidates[i].target;
                    let target_end = target_start + candidates[i].size;
                    let collides = candidates.iter().enumerate().any(|(j, other)| {
                        if j == i {
                            return false;
                        }
                        let other_start = other.current;
                        let other_end = other_start + other.size;
                        target_start < other_end && other_start < target_end
                    });
                    if !collides {
                        candidates[i].current = target_start;
                        candidates[i].moved = true;
                        let mut contents_to_move = vec![candidates[i].node.id];
                        Self::collect_non_identity_descendants(candidates[i].node, move_query, &mut contents_to_move);
                        jobs.push(Job::new(JobKind::Move {
                            partition: candidates[i].node.id,
                            new_offset: target_start,
                            contents_to_move,
                        }));
                        placed_this_pass = true;
                        break 'sides;
                    }
                }
            }

            if !placed_this_pass {
                return Err(DdmError::ValidationFailed);
            }
        }

        Ok(())
    }

    /// Walks every descendant beneath a moved partition and appends the ones
    /// whose disk system reports a non-identity move (spec.md §4.6 step 7):
    /// these are the partitions the `Move` job's executor must copy
    /// explicitly rather than letting the raw byte shift carry them along.
    fn collect_non_identity_descendants(node: &PhysicalNode, move_query: &dyn MoveQuery, out: &mut Vec<PartitionId>) {
        for child in &node.children {
            if let Some(disk_system) = child.disk_system {
                if move_query.is_non_identity_move(child.id, disk_system) {
                    out.push(child.id);
                }
            }
            Self::collect_non_identity_descendants(child, move_query, out);
        }
    }

    /// Steps 5-6: brand-new shadow children become `CreateChild` +
    /// `Initialize` + per-attribute `Set*`; surviving children with dirty
    /// attribute bits get the matching `Set*` jobs.
    fn creations_and_attributes(physical: &PhysicalNode, shadow: &ShadowNode, jobs: &mut Vec<Job>) {
        for s in &shadow.children {
            match s.origin {
                None => {
                    jobs.push(Job::new(JobKind::CreateChild {
                        parent: physical.id,
                        offset: s.offset,
                        size: s.size,
                        type_: s.type_.clone().unwrap_or_default(),
                        parameters: s.parameters.clone().unwrap_or_default(),
                    }));
                    if let Some(disk_system) = &s.disk_system {
                        // the new child's own id isn't known until CreateChild
                        // executes; Initialize targets it through a sentinel
                        // the job queue resolves at execution time.
                        jobs.push(Job::new(JobKind::Initialize {
                            partition: PartitionId::UNASSIGNED,
                            disk_system: disk_system.clone(),
                            parameters: String::new(),
                        }));
                    }
                }
                Some(origin) => {
                    Self::attribute_jobs(origin, s, jobs);
                    if let Some(p) = physical.children.iter().find(|p| p.id == origin) {
                        Self::creations_and_attributes(p, s, jobs);
                    }
                }
            }
        }
    }

    fn attribute_jobs(partition: PartitionId, shadow: &ShadowNode, jobs: &mut Vec<Job>) {
        if shadow.change_flags.contains(ChangeFlags::TYPE) {
            jobs.push(Job::new(JobKind::SetType { partition, type_: shadow.type_.clone().unwrap_or_default() }));
        }
        if shadow.change_flags.contains(ChangeFlags::CONTENT_NAME) {
            jobs.push(Job::new(JobKind::SetContentName { partition, name: shadow.content_name.clone().unwrap_or_default() }));
        }
        if shadow.change_flags.contains(ChangeFlags::PARAMETERS) {
            jobs.push(Job::new(JobKind::SetParameters { partition, parameters: shadow.parameters.clone().unwrap_or_default() }));
        }
        if shadow.change_flags.contains(ChangeFlags::CONTENT_PARAMETERS) {
            jobs.push(Job::new(JobKind::SetContentParameters {
                partition,
                parameters: shadow.content_parameters.clone().unwrap_or_default(),
            }));
        }
    }
}

// ---------------------------------------------------------------------
// Job queue execution
// ---------------------------------------------------------------------

struct QueueState {
    jobs: Vec<Job>,
    active: usize,
    paused: bool,
    cancel_reverse: Option<bool>,
    stopped: bool,
}

/// Executes a generated job list on a dedicated worker thread (spec
/// §4.6 "Execution"). One queue per device; jobs within it run strictly in
/// order. `pause`/`resume`/`cancel` mutate the shared state directly and
/// wake the worker through the condvar — there is no separate control
/// channel, so a paused worker blocked in `Condvar::wait` is always the one
/// woken by the next state change.
pub struct JobQueue {
    state: Arc<Mutex<QueueState>>,
    cv: Arc<Condvar>,
    handle: Option<thread::JoinHandle<()>>,
}

/// A single job's executable behaviour, supplied by the caller (the
/// manager, wiring in disk-system dispatch) so the worker loop itself stays
/// free of manager-lock concerns.
pub trait JobRunner: Send {
    fn run(&self, job: &JobKind) -> Result<(), DdmError>;
    /// Best-effort inverse of an already-succeeded job; `Err` means
    /// non-invertible (spec: "any job reporting non-invertible aborts the
    /// reverse").
    fn reverse(&self, job: &JobKind) -> Result<(), DdmError>;
}

impl JobQueue {
    pub fn spawn<R: JobRunner + 'static>(jobs: Vec<Job>, runner: R) -> JobQueue {
        let state = Arc::new(Mutex::new(QueueState {
            jobs,
            active: 0,
            paused: false,
            cancel_reverse: None,
            stopped: false,
        }));
        let cv = Arc::new(Condvar::new());

        let worker_state = state.clone();
        let worker_cv = cv.clone();
        let handle = thread::spawn(move || Self::run_loop(worker_state, worker_cv, runner));

        JobQueue { state, cv, handle: Some(handle) }
    }

    fn run_loop<R: JobRunner>(state: Arc<Mutex<QueueState>>, cv: Arc<Condvar>, runner: R) {
        loop {
            let mut guard = state.lock().unwrap();
            while guard.paused && guard.cancel_reverse.is_none() {
                guard = cv.wait(guard).unwrap();
            }

            if guard.cancel_reverse.is_some() || guard.active >= guard.jobs.len() {
                guard.stopped = true;
                let reverse = guard.cancel_reverse.unwrap_or(false);
                drop(guard);
                if reverse {
                    Self::reverse(&state, &runner);
                }
                cv.notify_all();
                return;
            }

            let idx = guard.active;
            guard.jobs[idx].status = JobStatus::InProgress;
            let kind = guard.jobs[idx].kind.clone();
            drop(guard);

            let result = runner.run(&kind);

            let mut guard = state.lock().unwrap();
            match result {
                Ok(()) => {
                    guard.jobs[idx].status = JobStatus::Succeeded;
                    guard.jobs[idx].progress = 1.0;
                    guard.active += 1;
                }
                Err(why) => {
                    guard.jobs[idx].status = JobStatus::Failed;
                    guard.jobs[idx].error_message = Some(why.to_string());
                    for job in guard.jobs.iter_mut().skip(idx + 1) {
                        job.status = JobStatus::Failed;
                    }
                    guard.stopped = true;
                    return;
                }
            }
        }
    }

    fn reverse<R: JobRunner>(state: &Arc<Mutex<QueueState>>, runner: &R) {
        let succeeded: Vec<(usize, JobKind)> = {
            let guard = state.lock().unwrap();
            guard
                .jobs
                .iter()
                .enumerate()
                .filter(|(_, j)| j.status == JobStatus::Succeeded)
                .map(|(i, j)| (i, j.kind.clone()))
                .collect()
        };

        for (idx, kind) in succeeded.into_iter().rev() {
            let mut guard = state.lock().unwrap();
            if !kind.interrupt_properties().reverse_on_cancel {
                guard.jobs[idx].status = JobStatus::FailedReverse;
                return;
            }
            drop(guard);

            match runner.reverse(&kind) {
                Ok(()) => {
                    let mut guard = state.lock().unwrap();
                    guard.jobs[idx].status = JobStatus::CanceledReverse;
                }
                Err(_) => {
                    let mut guard = state.lock().unwrap();
                    guard.jobs[idx].status = JobStatus::FailedReverse;
                    return;
                }
            }
        }
    }

    pub fn pause(&self) {
        self.state.lock().unwrap().paused = true;
        self.cv.notify_all();
    }

    pub fn resume(&self) {
        self.state.lock().unwrap().paused = false;
        self.cv.notify_all();
    }

    /// Returns `BadValue` (as `Err`) if the currently active job doesn't
    /// permit the requested cancellation mode.
    pub fn cancel(&self, reverse: bool) -> Result<(), DdmError> {
        let mut guard = self.state.lock().unwrap();
        if let Some(active) = guard.jobs.get(guard.active) {
            let props = active.interrupt_properties();
            if !props.can_cancel || (reverse && !props.reverse_on_cancel) {
                return Err(DdmError::BadValue);
            }
        }
        let active = guard.active;
        for job in guard.jobs.iter_mut().skip(active) {
            if job.status == JobStatus::Scheduled {
                job.status = JobStatus::Canceled;
            }
        }
        guard.cancel_reverse = Some(reverse);
        guard.paused = false;
        drop(guard);
        self.cv.notify_all();
        Ok(())
    }

    pub fn snapshot(&self) -> Vec<Job> { self.state.lock().unwrap().jobs.clone() }

    pub fn job_progress(&self, id: ddm_types::JobId) -> Option<Job> {
        self.state.lock().unwrap().jobs.iter().find(|j| j.id == id).cloned()
    }

    pub fn is_stopped(&self) -> bool { self.state.lock().unwrap().stopped }

    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// A `JobRunner` used by tests and the CLI's dry-run mode: records every
/// job it was asked to run without touching any real state.
pub struct RecordingRunner {
    pub ran: Mutex<Vec<JobKind>>,
    pub fail_on: Option<JobKind>,
}

impl RecordingRunner {
    pub fn new() -> Self { RecordingRunner { ran: Mutex::new(Vec::new()), fail_on: None } }
}

impl Default for RecordingRunner {
    fn default() -> Self { RecordingRunner::new() }
}

impl JobRunner for RecordingRunner {
    fn run(&self, job: &JobKind) -> Result<(), DdmError> {
        self.ran.lock().unwrap().push(job.clone());
        if self.fail_on.as_ref() == Some(job) {
            return Err(DdmError::JobFailed { message: "synthetic failure".into() });
        }
        Ok(())
    }

    fn reverse(&self, _job: &JobKind) -> Result<(), DdmError> { Ok(()) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn leaf(id: i32, offset: u64, size: u64) -> PhysicalNode {
        PhysicalNode::new(PartitionId(id), offset, size, Vec::new())
    }

    fn shadow_leaf(origin: i32, offset: u64, size: u64) -> ShadowNode {
        ShadowNode::new(Some(PartitionId(origin)), offset, size)
    }

    #[test]
    fn shrink_emits_content_resize_before_structural_resize() {
        // scenario 2 from spec.md §8: shrink a child, content resize runs first.
        let physical = PhysicalNode::new(PartitionId(0), 0, 1_000_000, vec![leaf(1, 0, 500_000)]);
        let mut shadow_child = shadow_leaf(1, 0, 250_000);
        shadow_child.change_flags = ChangeFlags::SIZE;
        let shadow = ShadowNode::new(None, 0, 1_000_000).with_children(vec![shadow_child]);

        let jobs = JobGenerator::generate(&physical, &shadow, &NoMoveQuery).unwrap();
        let resize_jobs: Vec<_> = jobs
            .iter()
            .filter(|j| matches!(j.kind, JobKind::Resize { partition, .. } if partition == PartitionId(1)))
            .collect();
        assert_eq!(resize_jobs.len(), 1);
    }

    #[test]
    fn delete_then_move_matches_scenario_three() {
        // scenario 3: delete p0, then move p1 left into the freed space.
        let physical = PhysicalNode::new(
            PartitionId(0),
            0,
            1_000_000,
            vec![leaf(1, 0, 200_000), leaf(2, 200_000, 300_000)],
        );
        let shadow = ShadowNode::new(None, 0, 1_000_000).with_children(vec![shadow_leaf(2, 0, 300_000)]);

        let jobs = JobGenerator::generate(&physical, &shadow, &NoMoveQuery).unwrap();
        assert!(matches!(&jobs[0].kind, JobKind::DeleteChild { child, .. } if *child == PartitionId(1)));
        assert!(jobs.iter().any(|j| matches!(&j.kind, JobKind::Move { partition, new_offset, .. }
            if *partition == PartitionId(2) && *new_offset == 0)));
    }

    #[test]
    fn move_carries_non_identity_descendants_but_not_identity_ones() {
        // scenario 3 again, but p1 (the partition that moves left into the
        // space p0 frees) has two children: p10's disk system reports a
        // non-identity move, p11's doesn't. contents_to_move must list p1
        // and p10, but never p11 (regression for the bug where it was
        // hardcoded to just the moved partition's own id).
        let disk_system = ddm_types::DiskSystemId(1);
        let p10 = leaf(10, 50_000, 10_000).with_disk_system(disk_system);
        let p11 = leaf(11, 70_000, 10_000).with_disk_system(disk_system);
        let p1 = PhysicalNode::new(PartitionId(1), 200_000, 200_000, vec![p10, p11]);
        let physical = PhysicalNode::new(PartitionId(0), 0, 1_000_000, vec![leaf(9, 0, 200_000), p1]);

        let shadow = ShadowNode::new(None, 0, 1_000_000).with_children(vec![shadow_leaf(1, 0, 200_000)]);

        let query = |descendant: PartitionId, _ds: DiskSystemId| descendant == PartitionId(10);
        let jobs = JobGenerator::generate(&physical, &shadow, &query).unwrap();

        let move_job = jobs
            .iter()
            .find(|j| matches!(&j.kind, JobKind::Move { partition, .. } if *partition == PartitionId(1)))
            .unwrap();
        match &move_job.kind {
            JobKind::Move { contents_to_move, .. } => {
                assert_eq!(contents_to_move, &vec![PartitionId(1), PartitionId(10)]);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn unrealisable_swap_fails_generation() {
        // two children swapping places with no free space between them: no
        // pass can place either without colliding, generation must fail.
        let physical = PhysicalNode::new(
            PartitionId(0),
            0,
            1000,
            vec![leaf(1, 0, 100), leaf(2, 100, 100)],
        );
        let shadow = ShadowNode::new(None, 0, 1000).with_children(vec![shadow_leaf(1, 100, 100), shadow_leaf(2, 0, 100)]);

        assert!(JobGenerator::generate(&physical, &shadow, &NoMoveQuery).is_err());
    }

    #[test]
    fn create_child_on_empty_device_matches_scenario_four() {
        let physical = PhysicalNode::new(PartitionId(0), 0, 2_000_000_000, Vec::new());
        let mut new_child = ShadowNode::new(None, 1_048_576, 1_073_741_824);
        new_child.type_ = Some("EFI System".into());
        let mut root = ShadowNode::new(None, 0, 2_000_000_000).with_children(vec![new_child]);
        root.disk_system = Some("gpt".into());
        root.change_flags = ChangeFlags::INITIALIZATION;

        let jobs = JobGenerator::generate(&physical, &root, &NoMoveQuery).unwrap();
        assert!(matches!(jobs[0].kind, JobKind::Uninitialize { .. }));
        assert!(jobs.iter().any(|j| matches!(&j.kind, JobKind::CreateChild { offset, size, .. }
            if *offset == 1_048_576 && *size == 1_073_741_824)));
    }

    #[test]
    fn move_prefers_smaller_side_and_breaks_ties_toward_back() {
        // three children where only the back-moving side can proceed first.
        let physical = PhysicalNode::new(
            PartitionId(0),
            0,
            1000,
            vec![leaf(1, 0, 100), leaf(2, 200, 100), leaf(3, 400, 100)],
        );
        let shadow = ShadowNode::new(None, 0, 1000).with_children(vec![
            shadow_leaf(1, 0, 100),
            shadow_leaf(2, 100, 100),
            shadow_leaf(3, 400, 100),
        ]);

        let jobs = JobGenerator::generate(&physical, &shadow, &NoMoveQuery).unwrap();
        let moved: Vec<_> = jobs
            .iter()
            .filter_map(|j| match &j.kind {
                JobKind::Move { partition, new_offset, .. } => Some((*partition, *new_offset)),
                _ => None,
            })
            .collect();
        assert_eq!(moved, vec![(PartitionId(2), 100)]);
    }

    #[test]
    fn queue_executes_jobs_in_order_and_reports_progress() {
        let jobs = vec![Job::new(JobKind::ScanPartition { partition: PartitionId(1) }), Job::new(JobKind::Defragment { partition: PartitionId(1) })];
        let queue = JobQueue::spawn(jobs, RecordingRunner::new());
        thread::sleep(Duration::from_millis(50));
        let snapshot = queue.snapshot();
        assert!(snapshot.iter().all(|j| j.status == JobStatus::Succeeded));
    }

    #[test]
    fn queue_fails_remaining_jobs_after_a_failure() {
        let a = Job::new(JobKind::ScanPartition { partition: PartitionId(1) });
        let b = Job::new(JobKind::Defragment { partition: PartitionId(1) });
        let mut runner = RecordingRunner::new();
        runner.fail_on = Some(a.kind.clone());
        let jobs = vec![a, b];
        let queue = JobQueue::spawn(jobs, runner);
        thread::sleep(Duration::from_millis(50));
        let snapshot = queue.snapshot();
        assert_eq!(snapshot[0].status, JobStatus::Failed);
        assert_eq!(snapshot[1].status, JobStatus::Failed);
    }

    #[test]
    fn cancel_with_reverse_undoes_succeeded_jobs() {
        let jobs = vec![
            Job::new(JobKind::Move { partition: PartitionId(1), new_offset: 10, contents_to_move: vec![] }),
            Job::new(JobKind::Move { partition: PartitionId(2), new_offset: 20, contents_to_move: vec![] }),
        ];
        let queue = JobQueue::spawn(jobs, RecordingRunner::new());
        queue.pause();
        thread::sleep(Duration::from_millis(20));
        queue.cancel(true).unwrap();
        thread::sleep(Duration::from_millis(50));
    }
}

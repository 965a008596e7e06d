//! A kernel-resident disk device manager: partition tree, disk-system
//! plugin framework, shadow staging and job engine.
//!
//! Ported from the shape of Haiku's `disk_device_manager` kernel subsystem
//! into a process-embeddable Rust library: a process-wide [`manager::DiskDeviceManager`]
//! owns every [`device::DeviceEntry`]/[`partition::PartitionNode`], disk
//! systems plug in through [`disk_system::DiskSystem`], callers stage edits
//! through [`shadow`] and commit them as an ordered [`job`] list, and
//! [`notify`] fans changes out to subscribers.

#![allow(unknown_lints)]

#[macro_use]
extern crate failure_derive;
extern crate failure;
#[macro_use]
extern crate log;
extern crate parking_lot;

pub extern crate ddm_types;
pub extern crate ddm_ops;
pub extern crate ddm_util;

mod device;
mod disk_system;
mod error;
mod job;
mod lock;
mod manager;
mod partition;
mod registrar;
mod shadow;

pub mod boundary;
pub mod devfs;
pub mod notify;
pub mod wire;

pub use device::DeviceEntry;
pub use disk_system::{
    Capability, DiskSystem, DiskSystemRecord, OperationOutcome, OperationParams, Operation, PartitionView, ScanResult, ScannedChild,
};
pub use error::DdmError;
pub use job::{Job, JobKind, JobQueue, JobRunner, JobStatus};
pub use manager::DiskDeviceManager;
pub use partition::{Cookie, PartitionKind, PartitionNode};
pub use registrar::Registrar;
pub use shadow::ShadowState;

#[cfg(test)]
extern crate env_logger;

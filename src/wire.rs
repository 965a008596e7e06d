//! Flat-buffer wire encoding for partition/device snapshots handed back
//! across the boundary API (spec §6.3).
//!
//! Grounded on `examples/original_source/.../UserDataWriter.cpp`'s bump
//! allocator, which keeps accumulating `fAllocatedSize` past the buffer's
//! end so the caller can see how large a retry buffer needs to be instead
//! of getting back a bare null pointer; reworked here into
//! `DdmError::BufferOverflow { needed }` (spec §7) and length-prefixed
//! strings standing in for the original's relocatable `char*` fields.

use std::convert::TryInto;
use std::path::{Path, PathBuf};

use ddm_types::{DiskSystemId, PartitionFlags, PartitionId, PartitionStatus};

use crate::error::DdmError;

/// A snapshot of one partition (and, recursively, its children) in the form
/// handed back across the boundary — decoupled from [`crate::partition::PartitionNode`]
/// so it carries no cookies or locks.
#[derive(Debug, Clone, PartialEq)]
pub struct WirePartition {
    pub id: PartitionId,
    pub path: PathBuf,
    pub offset: u64,
    pub size: u64,
    pub content_size: u64,
    pub block_size: u32,
    pub status: PartitionStatus,
    pub flags: PartitionFlags,
    pub name: Option<String>,
    pub type_: Option<String>,
    pub content_name: Option<String>,
    pub disk_system: Option<DiskSystemId>,
    pub children: Vec<WirePartition>,
}

fn status_to_u32(status: PartitionStatus) -> u32 {
    match status {
        PartitionStatus::Uninitialized => 0,
        PartitionStatus::PartiallyScanned => 1,
        PartitionStatus::Valid => 2,
        PartitionStatus::Corrupt => 3,
        PartitionStatus::Unrecognized => 4,
    }
}

fn status_from_u32(value: u32) -> Result<PartitionStatus, DdmError> {
    match value {
        0 => Ok(PartitionStatus::Uninitialized),
        1 => Ok(PartitionStatus::PartiallyScanned),
        2 => Ok(PartitionStatus::Valid),
        3 => Ok(PartitionStatus::Corrupt),
        4 => Ok(PartitionStatus::Unrecognized),
        _ => Err(DdmError::BadValue),
    }
}

/// Bump-allocates a `WirePartition` tree into a caller-owned flat buffer.
/// Writing keeps going past the buffer's end purely to compute the needed
/// size; `finish` is what actually reports `BufferOverflow`.
pub struct UserDataWriter<'a> {
    buffer: &'a mut [u8],
    allocated: usize,
    overflowed: bool,
}

impl<'a> UserDataWriter<'a> {
    pub fn new(buffer: &'a mut [u8]) -> Self { UserDataWriter { buffer, allocated: 0, overflowed: false } }

    fn allocate(&mut self, bytes: &[u8]) {
        let end = self.allocated + bytes.len();
        if end <= self.buffer.len() {
            self.buffer[self.allocated..end].copy_from_slice(bytes);
        } else {
            self.overflowed = true;
        }
        self.allocated = end;
    }

    fn write_u64(&mut self, value: u64) { self.allocate(&value.to_le_bytes()) }
    fn write_u32(&mut self, value: u32) { self.allocate(&value.to_le_bytes()) }
    fn write_i32(&mut self, value: i32) { self.allocate(&value.to_le_bytes()) }

    fn write_string(&mut self, value: &Option<String>) {
        match value {
            None => self.write_u32(0),
            Some(s) => {
                let bytes = s.as_bytes();
                self.write_u32(bytes.len() as u32);
                self.allocate(bytes);
            }
        }
    }

    fn write_path(&mut self, path: &Path) {
        let bytes = path.to_string_lossy().into_owned().into_bytes();
        self.write_u32(bytes.len() as u32);
        self.allocate(&bytes);
    }

    fn write_partition(&mut self, partition: &WirePartition) {
        self.write_i32(partition.id.0);
        self.write_path(&partition.path);
        self.write_u64(partition.offset);
        self.write_u64(partition.size);
        self.write_u64(partition.content_size);
        self.write_u32(partition.block_size);
        self.write_u32(status_to_u32(partition.status));
        self.write_u32(partition.flags.bits());
        self.write_string(&partition.name);
        self.write_string(&partition.type_);
        self.write_string(&partition.content_name);
        self.write_i32(partition.disk_system.map(|id| id.0).unwrap_or(-1));
        self.write_u32(partition.children.len() as u32);
        for child in &partition.children {
            self.write_partition(child);
        }
    }

    /// Writes the whole tree, returning the number of bytes used. Returns
    /// `BufferOverflow { needed }` if the buffer was too small, with
    /// `needed` being the size a retry call should allocate.
    pub fn finish(mut self, root: &WirePartition) -> Result<usize, DdmError> {
        self.write_partition(root);
        if self.overflowed {
            Err(DdmError::BufferOverflow { needed: self.allocated })
        } else {
            Ok(self.allocated)
        }
    }
}

/// Reads a `WirePartition` tree back out of a buffer written by
/// [`UserDataWriter`].
pub struct UserDataReader<'a> {
    buffer: &'a [u8],
    cursor: usize,
}

impl<'a> UserDataReader<'a> {
    pub fn new(buffer: &'a [u8]) -> Self { UserDataReader { buffer, cursor: 0 } }

    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], DdmError> {
        let end = self.cursor + len;
        let slice = self.buffer.get(self.cursor..end).ok_or(DdmError::BadValue)?;
        self.cursor = end;
        Ok(slice)
    }

    fn read_u64(&mut self) -> Result<u64, DdmError> { Ok(u64::from_le_bytes(self.read_bytes(8)?.try_into().unwrap())) }
    fn read_u32(&mut self) -> Result<u32, DdmError> { Ok(u32::from_le_bytes(self.read_bytes(4)?.try_into().unwrap())) }
    fn read_i32(&mut self) -> Result<i32, DdmError> { Ok(i32::from_le_bytes(self.read_bytes(4)?.try_into().unwrap())) }

    fn read_string(&mut self) -> Result<Option<String>, DdmError> {
        let len = self.read_u32()? as usize;
        if len == 0 {
            return Ok(None);
        }
        let bytes = self.read_bytes(len)?;
        Ok(Some(String::from_utf8_lossy(bytes).into_owned()))
    }

    fn read_path(&mut self) -> Result<PathBuf, DdmError> {
        let len = self.read_u32()? as usize;
        let bytes = self.read_bytes(len)?;
        Ok(PathBuf::from(String::from_utf8_lossy(bytes).into_owned()))
    }

    pub fn read_partition(&mut self) -> Result<WirePartition, DdmError> {
        let id = PartitionId(self.read_i32()?);
        let path = self.read_path()?;
        let offset = self.read_u64()?;
        let size = self.read_u64()?;
        let content_size = self.read_u64()?;
        let block_size = self.read_u32()?;
        let status = status_from_u32(self.read_u32()?)?;
        let flags = PartitionFlags::from_bits_truncate(self.read_u32()?);
        let name = self.read_string()?;
        let type_ = self.read_string()?;
        let content_name = self.read_string()?;
        let disk_system_raw = self.read_i32()?;
        let disk_system = if disk_system_raw < 0 { None } else { Some(DiskSystemId(disk_system_raw)) };
        let child_count = self.read_u32()? as usize;
        let mut children = Vec::with_capacity(child_count);
        for _ in 0..child_count {
            children.push(self.read_partition()?);
        }
        Ok(WirePartition {
            id,
            path,
            offset,
            size,
            content_size,
            block_size,
            status,
            flags,
            name,
            type_,
            content_name,
            disk_system,
            children,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> WirePartition {
        WirePartition {
            id: PartitionId(1),
            path: PathBuf::from("/dev/disk/ata/0/1"),
            offset: 1_048_576,
            size: 200_000_000,
            content_size: 199_000_000,
            block_size: 512,
            status: PartitionStatus::Valid,
            flags: PartitionFlags::FILE_SYSTEM,
            name: Some("boot".into()),
            type_: Some("EFI System".into()),
            content_name: None,
            disk_system: Some(DiskSystemId(3)),
            children: vec![WirePartition {
                id: PartitionId(2),
                path: PathBuf::from("/dev/disk/ata/0/1_0"),
                offset: 0,
                size: 1024,
                content_size: 0,
                block_size: 512,
                status: PartitionStatus::Uninitialized,
                flags: PartitionFlags::empty(),
                name: None,
                type_: None,
                content_name: None,
                disk_system: None,
                children: Vec::new(),
            }],
        }
    }

    #[test]
    fn round_trips_through_the_buffer() {
        let tree = sample();
        let mut buffer = vec![0u8; 4096];
        let used = UserDataWriter::new(&mut buffer).finish(&tree).unwrap();

        let mut reader = UserDataReader::new(&buffer[..used]);
        let decoded = reader.read_partition().unwrap();
        assert_eq!(decoded, tree);
    }

    #[test]
    fn undersized_buffer_reports_needed_size() {
        let tree = sample();
        let mut buffer = vec![0u8; 4];
        let err = UserDataWriter::new(&mut buffer).finish(&tree).unwrap_err();
        match err {
            DdmError::BufferOverflow { needed } => assert!(needed > 4),
            other => panic!("expected BufferOverflow, got {:?}", other),
        }
    }
}

use crate::coordinates::OffsetCoordinates;
use std::io::{self, Read, Seek, SeekFrom, Write};

const CHUNK: usize = 1024 * 1024;

/// Copies `coords.length` bytes from `coords.skip` to `coords.skip +
/// coords.offset` on `device`, moving in whichever direction avoids
/// self-overlap corruption (backwards when shifting forward, forwards when
/// shifting backward), the way `dd`-style in-place moves must.
///
/// This is what a `Move` job falls back to for the partitions a disk-system
/// plugin reports in its `contents_to_move` list (spec.md §4.6 step 7):
/// the plugin only reports *which* descendants need to travel with the
/// bytes, the generic byte shuffle here is what actually relocates them.
pub fn move_region<D: Read + Write + Seek>(
    device: &mut D,
    coords: OffsetCoordinates,
) -> io::Result<()> {
    if coords.offset == 0 || coords.length == 0 {
        return Ok(());
    }

    let mut buffer = vec![0u8; CHUNK.min(coords.length as usize).max(1)];
    let mut remaining = coords.length;

    if coords.offset > 0 {
        // Destination is ahead of the source: copy back-to-front so we never
        // overwrite bytes we haven't read yet.
        while remaining > 0 {
            let take = buffer.len().min(remaining as usize) as u64;
            let src = coords.skip + remaining - take;
            let dst = (src as i64 + coords.offset) as u64;

            device.seek(SeekFrom::Start(src))?;
            device.read_exact(&mut buffer[..take as usize])?;
            device.seek(SeekFrom::Start(dst))?;
            device.write_all(&buffer[..take as usize])?;

            remaining -= take;
        }
    } else {
        // Destination is behind the source: copy front-to-back.
        let mut cursor = 0u64;
        while remaining > 0 {
            let take = buffer.len().min(remaining as usize) as u64;
            let src = coords.skip + cursor;
            let dst = (src as i64 + coords.offset) as u64;

            device.seek(SeekFrom::Start(src))?;
            device.read_exact(&mut buffer[..take as usize])?;
            device.seek(SeekFrom::Start(dst))?;
            device.write_all(&buffer[..take as usize])?;

            cursor += take;
            remaining -= take;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn device_with(data: &[u8]) -> Cursor<Vec<u8>> {
        Cursor::new(data.to_vec())
    }

    #[test]
    fn shift_forward_preserves_bytes() {
        let mut dev = device_with(&(0u8..20).collect::<Vec<_>>());
        move_region(&mut dev, OffsetCoordinates { skip: 0, offset: 5, length: 10 }).unwrap();
        let data = dev.into_inner();
        assert_eq!(&data[5..15], &(0u8..10).collect::<Vec<_>>()[..]);
    }

    #[test]
    fn shift_backward_preserves_bytes() {
        let mut dev = device_with(&(0u8..20).collect::<Vec<_>>());
        move_region(&mut dev, OffsetCoordinates { skip: 10, offset: -5, length: 10 }).unwrap();
        let data = dev.into_inner();
        assert_eq!(&data[5..15], &(10u8..20).collect::<Vec<_>>()[..]);
    }

    #[test]
    fn zero_offset_is_a_no_op() {
        let original: Vec<u8> = (0u8..20).collect();
        let mut dev = device_with(&original);
        move_region(&mut dev, OffsetCoordinates { skip: 0, offset: 0, length: 10 }).unwrap();
        assert_eq!(dev.into_inner(), original);
    }
}

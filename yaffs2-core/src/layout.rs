//! Given a prefix of the image, selects among the four supported
//! (chunk, spare) pairs by structural validation, without rewinding the
//! source — the consumed prefix is handed back as a look-ahead buffer for
//! the reader to replay.

use std::io::{ErrorKind, Read};

use crate::error::{Result, Yaffs2Error};
use crate::header::{self, ObjectType};
use crate::reader::{MAX_CHUNK_SIZE, MAX_SPARE_SIZE};
use crate::tags::{self, TAG_SIZE};

const CANDIDATES: [(u32, u32); 4] = [(2048, 64), (4096, 128), (8192, 256), (16384, 512)];

fn fill_tolerant(source: &mut dyn Read, max_len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; max_len];
    let mut filled = 0;
    while filled < max_len {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(Yaffs2Error::output("reading image", e)),
        }
    }
    buf.truncate(filled);
    Ok(buf)
}

fn tag_at(buf: &[u8], offset: usize) -> Option<tags::PackedTag> {
    if offset + TAG_SIZE > buf.len() {
        return None;
    }
    Some(tags::decode(&buf[offset..offset + TAG_SIZE]))
}

fn is_header_like(tag: &tags::PackedTag) -> bool {
    tag.byte_count == 0xFFFF && tag.chunk_id == 0
}

/// Reads a look-ahead prefix from `source` and picks the smallest matching
/// layout. Returns `(chunk_size, spare_size, prefix)`; `prefix` must be
/// replayed through the `ImageReader` before further reads from `source`.
pub fn detect(source: &mut dyn Read) -> Result<(u32, u32, Vec<u8>)> {
    let max_len = 2 * (MAX_CHUNK_SIZE + MAX_SPARE_SIZE);
    let buf = fill_tolerant(source, max_len)?;

    let (first_type, first_parent) =
        header::peek_type_and_parent(&buf).ok_or(Yaffs2Error::NotYaffs2)?;
    let plausible_type = matches!(
        first_type,
        ObjectType::File
            | ObjectType::Directory
            | ObjectType::Symlink
            | ObjectType::Hardlink
            | ObjectType::Special
    );
    if first_parent != 1 || !plausible_type {
        return Err(Yaffs2Error::NotYaffs2);
    }

    for (chunk, spare) in CANDIDATES {
        let (chunk, spare) = (chunk as usize, spare as usize);
        let tag1 = match tag_at(&buf, chunk) {
            Some(t) => t,
            None => continue,
        };
        if !is_header_like(&tag1) {
            continue;
        }
        let tag2 = match tag_at(&buf, 2 * chunk + spare) {
            Some(t) => t,
            None => continue,
        };
        let tag2_ok = is_header_like(&tag2) || (tag2.object_id == tag1.object_id && tag2.chunk_id == 1);
        if tag2_ok {
            return Ok((chunk as u32, spare as u32, buf));
        }
    }

    Err(Yaffs2Error::UndetectableLayout)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spare_bytes(obj: u32, chunk_id: u32, byte_count: u32, len: usize) -> Vec<u8> {
        let mut v = vec![0u8; len];
        v[0..4].copy_from_slice(&0u32.to_le_bytes());
        v[4..8].copy_from_slice(&obj.to_le_bytes());
        v[8..12].copy_from_slice(&chunk_id.to_le_bytes());
        v[12..16].copy_from_slice(&byte_count.to_le_bytes());
        v
    }

    fn header_chunk(obj_type: u32, parent: i32, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        buf[0..4].copy_from_slice(&obj_type.to_le_bytes());
        buf[4..8].copy_from_slice(&parent.to_le_bytes());
        buf[10] = 0; // empty NUL-terminated name, still decodable
        buf
    }

    #[test]
    fn picks_smallest_matching_candidate() {
        let mut image = Vec::new();
        image.extend(header_chunk(3, 1, 2048)); // root-ish directory header, chunk 0
        image.extend(spare_bytes(1, 0, 0xFFFF, 64)); // tag1 at offset 2048
        image.extend(header_chunk(3, 1, 2048)); // second record's chunk payload
        image.extend(spare_bytes(2, 0, 0xFFFF, 64)); // tag2 at offset 2*2048+64
        let mut cursor = std::io::Cursor::new(image);
        let (chunk, spare, _) = detect(&mut cursor).unwrap();
        assert_eq!((chunk, spare), (2048, 64));
    }

    #[test]
    fn rejects_non_yaffs2_prefix() {
        let mut cursor = std::io::Cursor::new(vec![0xFFu8; 64]);
        let err = detect(&mut cursor).unwrap_err();
        assert!(matches!(err, Yaffs2Error::NotYaffs2));
    }
}

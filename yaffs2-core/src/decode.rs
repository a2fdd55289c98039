//! Combines a chunk's tag and payload into one classified record. Pure
//! function over byte slices: no I/O, no allocation beyond what a header's
//! `String` fields need.

use crate::header::{self, ObjectHeader};
use crate::tags::{self, TagClass};

pub enum Record {
    Empty,
    Header { object_id: u32, header: ObjectHeader },
    Data {
        object_id: u32,
        chunk_id: u32,
        byte_count: u32,
    },
    Malformed,
}

/// Decodes one chunk+spare record. `chunk` must be `chunk_size` bytes,
/// `spare` must be at least `tags::TAG_SIZE` bytes.
pub fn decode_record(chunk: &[u8], spare: &[u8]) -> Record {
    let tag = tags::decode(spare);
    match tags::classify(&tag) {
        TagClass::Empty => Record::Empty,
        TagClass::Header => match header::decode(chunk) {
            Some(h) => Record::Header {
                object_id: tag.object_id,
                header: h,
            },
            None => Record::Malformed,
        },
        TagClass::Data => Record::Data {
            object_id: tag.object_id,
            chunk_id: tag.chunk_id,
            byte_count: tag.byte_count,
        },
        TagClass::Malformed => Record::Malformed,
    }
}

/// Returns the byte range of a data record's payload within `chunk`,
/// capped at `chunk.len()` (byte_count is attacker/corruption-controlled).
pub fn data_payload<'a>(chunk: &'a [u8], byte_count: u32) -> &'a [u8] {
    let n = (byte_count as usize).min(chunk.len());
    &chunk[..n]
}

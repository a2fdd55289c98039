//! Shared helpers for synthesizing in-memory YAFFS2 images in tests.

use crate::header::{self, ObjectHeader, ObjectType};

pub(crate) fn spare(object_id: u32, chunk_id: u32, byte_count: u32, spare_size: usize) -> Vec<u8> {
    let mut v = vec![0u8; spare_size];
    v[0..4].copy_from_slice(&0u32.to_le_bytes());
    v[4..8].copy_from_slice(&object_id.to_le_bytes());
    v[8..12].copy_from_slice(&chunk_id.to_le_bytes());
    v[12..16].copy_from_slice(&byte_count.to_le_bytes());
    v
}

pub(crate) fn chunk_payload(mut payload: Vec<u8>, chunk_size: usize) -> Vec<u8> {
    payload.resize(chunk_size, 0);
    payload
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn header_record(
    chunk_size: usize,
    spare_size: usize,
    object_id: u32,
    parent_object_id: i32,
    obj_type: ObjectType,
    name: &str,
) -> Vec<u8> {
    header_record_full(
        chunk_size,
        spare_size,
        object_id,
        parent_object_id,
        obj_type,
        name,
        0,
        0,
        0,
        0,
        0,
        0,
        "",
        0,
    )
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn header_record_full(
    chunk_size: usize,
    spare_size: usize,
    object_id: u32,
    parent_object_id: i32,
    obj_type: ObjectType,
    name: &str,
    mode: u32,
    uid: u32,
    gid: u32,
    atime: u32,
    mtime: u32,
    file_size: i32,
    alias: &str,
    equivalent_object_id: i32,
) -> Vec<u8> {
    let oh = ObjectHeader {
        obj_type,
        parent_object_id,
        name: name.to_string(),
        mode,
        uid,
        gid,
        atime,
        mtime,
        ctime: mtime,
        file_size,
        equivalent_object_id,
        alias: alias.to_string(),
        rdev: 0,
    };
    let chunk = chunk_payload(header::encode(&oh), chunk_size);
    let spare = spare(object_id, 0, 0xFFFF, spare_size);
    let mut rec = chunk;
    rec.extend(spare);
    rec
}

pub(crate) fn data_record(
    chunk_size: usize,
    spare_size: usize,
    object_id: u32,
    chunk_id: u32,
    data: &[u8],
) -> Vec<u8> {
    let chunk = chunk_payload(data.to_vec(), chunk_size);
    let spare = spare(object_id, chunk_id, data.len() as u32, spare_size);
    let mut rec = chunk;
    rec.extend(spare);
    rec
}

pub(crate) fn malformed_record(chunk_size: usize, spare_size: usize) -> Vec<u8> {
    let chunk = vec![0u8; chunk_size];
    // chunk_id == 0 with a byte_count that is neither 0xFFFF nor 0xFFFFFFFF.
    let spare = spare(0, 0, 42, spare_size);
    let mut rec = chunk;
    rec.extend(spare);
    rec
}

//! Translates header records into filesystem operations, streams data
//! chunks into open output files, and enforces the ordering constraints
//! (hard link target must already exist; directory mtimes are re-applied
//! only at shutdown, after children have been written).

use std::io::Write;

use crate::error::{Result, Yaffs2Error};
use crate::fs_ops::Filesystem;
use crate::header::{ObjectHeader, ObjectType};
use crate::objects::{ObjectEntry, ObjectTable, ROOT_ID};

pub const MAX_WARN: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Extract,
    ListNames,
    ListLong,
}

struct PendingFile {
    object_id: u32,
    remaining: u64,
    writer: Box<dyn Write>,
}

pub enum WarnOutcome {
    Continue(Yaffs2Error),
    Abort(Yaffs2Error),
}

fn push_soft_warning(
    result: std::io::Result<()>,
    op: &str,
    path: &str,
    warnings: &mut Vec<Yaffs2Error>,
) {
    if let Err(e) = result {
        warnings.push(Yaffs2Error::MetadataBestEffort(format!(
            "{op} \"{path}\": {e}"
        )));
    }
}

pub struct Extractor<'a> {
    table: ObjectTable,
    mode: Mode,
    warn_count: u32,
    fs: &'a mut dyn Filesystem,
    pending_file: Option<PendingFile>,
}

impl<'a> Extractor<'a> {
    pub fn new(mode: Mode, fs: &'a mut dyn Filesystem) -> Self {
        Extractor {
            table: ObjectTable::new(),
            mode,
            warn_count: 0,
            fs,
            pending_file: None,
        }
    }

    pub fn table(&self) -> &ObjectTable {
        &self.table
    }

    pub fn note_malformed(&mut self, chunk_no: u64) -> WarnOutcome {
        self.warn_count += 1;
        let warning = Yaffs2Error::MalformedRecord { chunk: chunk_no };
        if self.warn_count >= MAX_WARN {
            WarnOutcome::Abort(warning)
        } else {
            WarnOutcome::Continue(warning)
        }
    }

    fn apply_directory(
        &mut self,
        id: u32,
        oh: &ObjectHeader,
        is_root: bool,
        warnings: &mut Vec<Yaffs2Error>,
    ) -> Result<()> {
        if self.mode != Mode::Extract {
            return Ok(());
        }
        let path = self.table.get(id).expect("entry just inserted").path.clone();
        if !is_root {
            if let Err(e) = self.fs.mkdir(&path, oh.mode) {
                return Err(Yaffs2Error::output(format!("cannot create directory \"{path}\""), e));
            }
        }
        push_soft_warning(self.fs.lchown(&path, oh.uid, oh.gid), "lchown", &path, warnings);
        let special_bits = oh.mode & 0o7000 != 0;
        if special_bits || is_root {
            push_soft_warning(self.fs.chmod(&path, oh.mode), "chmod", &path, warnings);
        }
        Ok(())
    }

    fn finalize_pending_file(&mut self) -> Result<Vec<Yaffs2Error>> {
        let pf = self
            .pending_file
            .take()
            .expect("finalize called with an open pending file");
        drop(pf.writer);
        let mut warnings = Vec::new();
        if self.mode == Mode::Extract {
            let entry = self.table.get(pf.object_id).expect("entry exists");
            let (path, mode, uid, gid, atime, mtime) =
                (entry.path.clone(), entry.mode, entry.uid, entry.gid, entry.atime, entry.mtime);
            push_soft_warning(self.fs.lchown(&path, uid, gid), "lchown", &path, &mut warnings);
            if mode & 0o7000 != 0 {
                push_soft_warning(self.fs.chmod(&path, mode), "chmod", &path, &mut warnings);
            }
            push_soft_warning(self.fs.set_utime(&path, atime, mtime), "utime", &path, &mut warnings);
        }
        Ok(warnings)
    }

    /// Processes one decoded header record. Returns any non-fatal warnings
    /// generated while doing so.
    pub fn handle_header(&mut self, object_id: u32, oh: ObjectHeader) -> Result<Vec<Yaffs2Error>> {
        // A pending file is only ever cleared once its declared fileSize has
        // been written (see `finalize_pending_file`); a header arriving
        // while one is still open means that file's data records never
        // fully showed up before the stream moved on to the next object.
        if self.pending_file.is_some() {
            return Err(Yaffs2Error::BrokenImage);
        }

        let mut warnings = Vec::new();

        if object_id == ROOT_ID {
            if oh.obj_type != ObjectType::Directory {
                return Err(Yaffs2Error::InvalidReference(format!(
                    "root object id {ROOT_ID} has invalid type"
                )));
            }
            self.table.refresh_times(ROOT_ID, oh.atime, oh.mtime);
            if let Some(e) = self.table.get_mut(ROOT_ID) {
                e.mode = oh.mode;
                e.uid = oh.uid;
                e.gid = oh.gid;
            }
            if self.table.last_dir_id.is_none() {
                self.table.last_dir_id = Some(ROOT_ID);
            }
            self.apply_directory(ROOT_ID, &oh, true, &mut warnings)?;
            return Ok(warnings);
        }

        ObjectTable::validate_name(&oh.name)?;
        let parent_id = oh.parent_object_id.max(0) as u32;
        let path = self.table.child_path(parent_id, &oh.name)?;

        let entry = ObjectEntry {
            id: object_id,
            obj_type: oh.obj_type,
            path: path.clone(),
            prev_dir_id: None,
            atime: oh.atime,
            mtime: oh.mtime,
            mode: oh.mode,
            uid: oh.uid,
            gid: oh.gid,
            size: 0,
            rdev: oh.rdev,
            alias: oh.alias.clone(),
            equivalent_object_id: if oh.obj_type == ObjectType::Hardlink {
                Some(oh.equivalent_object_id.max(0) as u32)
            } else {
                None
            },
        };
        self.table.insert(entry)?;

        match oh.obj_type {
            ObjectType::File => {
                let size = oh.file_size.max(0) as u64;
                if let Some(e) = self.table.get_mut(object_id) {
                    e.size = size;
                }
                let writer: Box<dyn Write> = if self.mode == Mode::Extract {
                    self.fs
                        .create_file(&path, oh.mode)
                        .map_err(|e| Yaffs2Error::output(format!("cannot create file \"{path}\""), e))?
                } else {
                    Box::new(std::io::sink())
                };
                self.pending_file = Some(PendingFile {
                    object_id,
                    remaining: size,
                    writer,
                });
                if size == 0 {
                    warnings.extend(self.finalize_pending_file()?);
                }
            }
            ObjectType::Symlink => {
                if self.mode == Mode::Extract {
                    self.fs
                        .symlink(&oh.alias, &path)
                        .map_err(|e| Yaffs2Error::output(format!("cannot create symlink \"{path}\""), e))?;
                    push_soft_warning(self.fs.lchown(&path, oh.uid, oh.gid), "lchown", &path, &mut warnings);
                    if self.fs.supports_symlink_utime() {
                        push_soft_warning(
                            self.fs.set_lutime(&path, oh.atime, oh.mtime),
                            "utime",
                            &path,
                            &mut warnings,
                        );
                    }
                }
            }
            ObjectType::Directory => {
                self.apply_directory(object_id, &oh, false, &mut warnings)?;
            }
            ObjectType::Hardlink => {
                let equiv_id = oh.equivalent_object_id.max(0) as u32;
                let target_path = match self.table.get(equiv_id) {
                    Some(t) if t.obj_type != ObjectType::Directory => t.path.clone(),
                    _ => {
                        return Err(Yaffs2Error::InvalidReference(format!(
                            "Invalid equivalentObjectId {} in object {object_id} (\"{path}\")",
                            oh.equivalent_object_id
                        )))
                    }
                };
                if self.mode == Mode::Extract {
                    self.fs
                        .hard_link(&target_path, &path)
                        .map_err(|e| Yaffs2Error::output(format!("cannot create hard link \"{path}\""), e))?;
                }
            }
            ObjectType::Special => {
                if self.mode == Mode::Extract {
                    match self.fs.mknod(&path, oh.mode, oh.rdev) {
                        Ok(()) => {}
                        Err(e) => {
                            if matches!(e.raw_os_error(), Some(libc::EPERM) | Some(libc::EINVAL)) {
                                warnings.push(Yaffs2Error::DeviceNodePermission(format!(
                                    "cannot create device node \"{path}\": {e}"
                                )));
                            } else {
                                return Err(Yaffs2Error::output(
                                    format!("cannot create device node \"{path}\""),
                                    e,
                                ));
                            }
                        }
                    }
                    push_soft_warning(self.fs.lchown(&path, oh.uid, oh.gid), "lchown", &path, &mut warnings);
                    push_soft_warning(
                        self.fs.set_utime(&path, oh.atime, oh.mtime),
                        "utime",
                        &path,
                        &mut warnings,
                    );
                }
            }
            ObjectType::Unknown => {}
        }

        Ok(warnings)
    }

    /// Processes one decoded data record, discarding bytes that don't
    /// belong to the currently open file (stale or out-of-context chunks
    /// are skipped, never erred on).
    pub fn handle_data(
        &mut self,
        object_id: u32,
        _chunk_id: u32,
        byte_count: u32,
        payload: &[u8],
    ) -> Result<Vec<Yaffs2Error>> {
        let matches_pending = matches!(&self.pending_file, Some(pf) if pf.object_id == object_id);
        if !matches_pending {
            return Ok(Vec::new());
        }
        let pf = self.pending_file.as_mut().expect("checked above");
        let n = (byte_count as u64).min(pf.remaining).min(payload.len() as u64) as usize;
        if n > 0 {
            pf.writer
                .write_all(&payload[..n])
                .map_err(|e| Yaffs2Error::output("writing file data", e))?;
        }
        pf.remaining -= n as u64;
        if pf.remaining == 0 {
            self.finalize_pending_file()
        } else {
            Ok(Vec::new())
        }
    }

    /// True once every FILE opened so far has received all of its declared
    /// bytes; used by the orchestrator to distinguish clean EOS from a
    /// stream that ended mid-file (`BrokenImage`).
    pub fn has_unfinished_file(&self) -> bool {
        self.pending_file.is_some()
    }

    /// Replays directory mtimes in reverse creation order and hands back
    /// the final object table for the listing formatter.
    pub fn finish(self) -> Result<(Vec<Yaffs2Error>, ObjectTable)> {
        let Extractor {
            mut table, mode, fs, ..
        } = self;
        let mut warnings = Vec::new();
        if mode == Mode::Extract {
            let mut cur = table.last_dir_id;
            while let Some(id) = cur {
                let (path, atime, mtime, prev) = {
                    let e = table.get(id).expect("dir entry exists");
                    (e.path.clone(), e.atime, e.mtime, e.prev_dir_id)
                };
                push_soft_warning(fs.set_utime(&path, atime, mtime), "utime", &path, &mut warnings);
                cur = prev;
            }
        }
        Ok((warnings, table))
    }
}

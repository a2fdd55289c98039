//! Maps object id to object record: type, parent-linked absolute path,
//! timestamps, and the chain pointer used for directory-mtime replay.

use std::collections::HashMap;

use crate::error::{Result, Yaffs2Error};
use crate::header::ObjectType;

pub const ROOT_ID: u32 = 1;

#[derive(Debug, Clone)]
pub struct ObjectEntry {
    pub id: u32,
    pub obj_type: ObjectType,
    pub path: String,
    pub prev_dir_id: Option<u32>,
    pub atime: u32,
    pub mtime: u32,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub rdev: u32,
    pub alias: String,
    pub equivalent_object_id: Option<u32>,
}

/// Object id → entry, plus bookkeeping for directory-mtime replay and
/// listing order. Backed by a `HashMap`: an ordinary hash map already gives
/// O(1) average lookup on a small integer key, so no bespoke bucket table
/// is needed here.
pub struct ObjectTable {
    entries: HashMap<u32, ObjectEntry>,
    pub last_dir_id: Option<u32>,
    /// Insertion order of non-root objects, for listing stability.
    order: Vec<u32>,
}

impl ObjectTable {
    pub fn new() -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            ROOT_ID,
            ObjectEntry {
                id: ROOT_ID,
                obj_type: ObjectType::Directory,
                path: ".".to_string(),
                prev_dir_id: None,
                atime: 0,
                mtime: 0,
                mode: 0,
                uid: 0,
                gid: 0,
                size: 0,
                rdev: 0,
                alias: String::new(),
                equivalent_object_id: None,
            },
        );
        ObjectTable {
            entries,
            last_dir_id: None,
            order: Vec::new(),
        }
    }

    pub fn get(&self, id: u32) -> Option<&ObjectEntry> {
        self.entries.get(&id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut ObjectEntry> {
        self.entries.get_mut(&id)
    }

    /// Insertion order, root excluded — the order headers were processed in.
    pub fn order(&self) -> impl Iterator<Item = &ObjectEntry> {
        self.order.iter().map(move |id| &self.entries[id])
    }

    pub fn refresh_times(&mut self, id: u32, atime: u32, mtime: u32) {
        if let Some(e) = self.entries.get_mut(&id) {
            e.atime = atime;
            e.mtime = mtime;
        }
    }

    /// Builds the absolute path for a child named `name` under `parent_id`.
    /// The parent must already exist and be a directory.
    pub fn child_path(&self, parent_id: u32, name: &str) -> Result<String> {
        let parent = self.entries.get(&parent_id).ok_or_else(|| {
            Yaffs2Error::InvalidReference(format!(
                "Invalid parentObjectId {parent_id} in object \"{name}\""
            ))
        })?;
        if parent.obj_type != ObjectType::Directory {
            return Err(Yaffs2Error::InvalidReference(format!(
                "parentObjectId {parent_id} in object \"{name}\" is not a directory"
            )));
        }
        if parent.path == "." {
            Ok(name.to_string())
        } else {
            Ok(format!("{}/{}", parent.path, name))
        }
    }

    /// Inserts a freshly-constructed, non-root entry. Pushes onto the
    /// directory stack if it is itself a directory.
    pub fn insert(&mut self, mut entry: ObjectEntry) -> Result<()> {
        if entry.id == ROOT_ID || self.entries.contains_key(&entry.id) {
            return Err(Yaffs2Error::InvalidReference(format!(
                "Duplicate objectId {} (\"{}\")",
                entry.id, entry.path
            )));
        }
        if entry.obj_type == ObjectType::Directory {
            entry.prev_dir_id = self.last_dir_id;
            self.last_dir_id = Some(entry.id);
        }
        let id = entry.id;
        self.entries.insert(id, entry);
        self.order.push(id);
        Ok(())
    }

    pub fn validate_name(name: &str) -> Result<()> {
        if name.is_empty() || name == "." || name == ".." || name.contains('/') {
            return Err(Yaffs2Error::InvalidReference(format!(
                "Illegal name \"{name}\""
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_preexists_at_dot() {
        let table = ObjectTable::new();
        let root = table.get(ROOT_ID).unwrap();
        assert_eq!(root.path, ".");
        assert_eq!(root.obj_type, ObjectType::Directory);
    }

    #[test]
    fn child_path_under_root_has_no_leading_slash() {
        let table = ObjectTable::new();
        assert_eq!(table.child_path(ROOT_ID, "a").unwrap(), "a");
    }

    #[test]
    fn rejects_duplicate_id() {
        let mut table = ObjectTable::new();
        let entry = ObjectEntry {
            id: 2,
            obj_type: ObjectType::File,
            path: "a".into(),
            prev_dir_id: None,
            atime: 0,
            mtime: 0,
            mode: 0,
            uid: 0,
            gid: 0,
            size: 0,
            rdev: 0,
            alias: String::new(),
            equivalent_object_id: None,
        };
        table.insert(entry.clone()).unwrap();
        assert!(table.insert(entry).is_err());
    }

    #[test]
    fn directory_stack_chains_in_creation_order() {
        let mut table = ObjectTable::new();
        for (id, name) in [(2u32, "a"), (3, "b")] {
            table
                .insert(ObjectEntry {
                    id,
                    obj_type: ObjectType::Directory,
                    path: name.into(),
                    prev_dir_id: None,
                    atime: 0,
                    mtime: 0,
                    mode: 0,
                    uid: 0,
                    gid: 0,
                    size: 0,
                    rdev: 0,
                    alias: String::new(),
                    equivalent_object_id: None,
                })
                .unwrap();
        }
        assert_eq!(table.last_dir_id, Some(3));
        assert_eq!(table.get(3).unwrap().prev_dir_id, Some(2));
    }
}

//! The narrow seam between the Extractor and real POSIX syscalls. Exists so
//! the Extractor has no direct syscall dependency and is unit-testable
//! without touching a real directory tree — not a feature, a testability
//! boundary, the same role the teacher lib's `ArchiveRepo` trait plays for
//! its own storage backend.

use std::io::Write;

/// Operations §4.E dispatches to. Every method returns a plain
/// `std::io::Result`; the Extractor classifies failures (fatal vs warning)
/// itself, since that policy depends on which operation failed and why, not
/// on anything the filesystem adapter knows.
pub trait Filesystem {
    fn create_file(&mut self, path: &str, mode: u32) -> std::io::Result<Box<dyn Write>>;
    fn mkdir(&mut self, path: &str, mode: u32) -> std::io::Result<()>;
    fn symlink(&mut self, target: &str, path: &str) -> std::io::Result<()>;
    fn hard_link(&mut self, existing: &str, path: &str) -> std::io::Result<()>;
    fn mknod(&mut self, path: &str, mode: u32, rdev: u32) -> std::io::Result<()>;
    fn lchown(&mut self, path: &str, uid: u32, gid: u32) -> std::io::Result<()>;
    fn chmod(&mut self, path: &str, mode: u32) -> std::io::Result<()>;
    fn set_utime(&mut self, path: &str, atime: u32, mtime: u32) -> std::io::Result<()>;
    fn set_lutime(&mut self, path: &str, atime: u32, mtime: u32) -> std::io::Result<()>;
    fn supports_symlink_utime(&self) -> bool;
}

/// Production implementation: real syscalls through `nix` and
/// `std::os::unix`.
pub struct UnixFilesystem;

impl UnixFilesystem {
    pub fn new() -> Self {
        UnixFilesystem
    }
}

impl Default for UnixFilesystem {
    fn default() -> Self {
        Self::new()
    }
}

fn file_time(secs: u32) -> filetime::FileTime {
    filetime::FileTime::from_unix_time(secs as i64, 0)
}

impl Filesystem for UnixFilesystem {
    fn create_file(&mut self, path: &str, mode: u32) -> std::io::Result<Box<dyn Write>> {
        use std::os::unix::fs::OpenOptionsExt;
        let f = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(mode & 0o777)
            .open(path)?;
        Ok(Box::new(f))
    }

    fn mkdir(&mut self, path: &str, mode: u32) -> std::io::Result<()> {
        use std::os::unix::fs::DirBuilderExt;
        std::fs::DirBuilder::new()
            .mode(mode & 0o777)
            .create(path)
    }

    fn symlink(&mut self, target: &str, path: &str) -> std::io::Result<()> {
        std::os::unix::fs::symlink(target, path)
    }

    fn hard_link(&mut self, existing: &str, path: &str) -> std::io::Result<()> {
        std::fs::hard_link(existing, path)
    }

    fn mknod(&mut self, path: &str, mode: u32, rdev: u32) -> std::io::Result<()> {
        use nix::sys::stat::{mknod, Mode, SFlag};
        let kind = SFlag::from_bits_truncate(mode & libc::S_IFMT);
        let perm = Mode::from_bits_truncate(mode & 0o7777);
        mknod(path, kind, perm, rdev as u64)
            .map_err(|e| std::io::Error::from_raw_os_error(e as i32))
    }

    fn lchown(&mut self, path: &str, uid: u32, gid: u32) -> std::io::Result<()> {
        std::os::unix::fs::lchown(path, Some(uid), Some(gid))
    }

    fn chmod(&mut self, path: &str, mode: u32) -> std::io::Result<()> {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode & 0o7777))
    }

    fn set_utime(&mut self, path: &str, atime: u32, mtime: u32) -> std::io::Result<()> {
        filetime::set_file_times(path, file_time(atime), file_time(mtime))
    }

    fn set_lutime(&mut self, path: &str, atime: u32, mtime: u32) -> std::io::Result<()> {
        filetime::set_symlink_file_times(path, file_time(atime), file_time(mtime))
    }

    fn supports_symlink_utime(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod unix_tests {
    use super::{Filesystem, UnixFilesystem};
    use std::io::Write;
    use std::os::unix::fs::MetadataExt;

    fn path_in(dir: &tempfile::TempDir, name: &str) -> String {
        dir.path().join(name).to_str().unwrap().to_string()
    }

    #[test]
    fn creates_file_with_masked_mode_and_exact_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = path_in(&dir, "a");
        let mut fs = UnixFilesystem::new();
        let mut w = fs.create_file(&path, 0o104644).unwrap();
        w.write_all(b"abc").unwrap();
        drop(w);
        assert_eq!(std::fs::read(&path).unwrap(), b"abc");
        let mode = std::fs::metadata(&path).unwrap().mode() & 0o7777;
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn hard_link_shares_inode_with_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = path_in(&dir, "a");
        let link = path_in(&dir, "b");
        let mut fs = UnixFilesystem::new();
        fs.create_file(&target, 0o644).unwrap().write_all(b"x").unwrap();
        fs.hard_link(&target, &link).unwrap();
        let ino_a = std::fs::metadata(&target).unwrap().ino();
        let ino_b = std::fs::metadata(&link).unwrap().ino();
        assert_eq!(ino_a, ino_b);
        assert_eq!(std::fs::read(&link).unwrap(), b"x");
    }

    #[test]
    fn symlink_target_is_readable_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = path_in(&dir, "link");
        let mut fs = UnixFilesystem::new();
        fs.symlink("../x", &path).unwrap();
        assert_eq!(std::fs::read_link(&path).unwrap().to_str().unwrap(), "../x");
    }

    #[test]
    fn set_utime_round_trips_through_real_fs() {
        let dir = tempfile::tempdir().unwrap();
        let path = path_in(&dir, "d");
        let mut fs = UnixFilesystem::new();
        fs.mkdir(&path, 0o755).unwrap();
        fs.set_utime(&path, 1_600_000_000, 1_600_000_123).unwrap();
        let meta = std::fs::metadata(&path).unwrap();
        assert_eq!(meta.mtime(), 1_600_000_123);
    }
}

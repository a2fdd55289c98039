//! Renders either plain names or an extended listing (type, permission
//! string, size, mtime, link target) for the final object table.

use chrono::{Local, TimeZone};

use crate::extract::Mode;
use crate::header::ObjectType;
use crate::objects::{ObjectEntry, ObjectTable};

fn perm_string(mode: u32) -> String {
    const BITS: [(u32, u8); 9] = [
        (0o400, b'r'),
        (0o200, b'w'),
        (0o100, b'x'),
        (0o040, b'r'),
        (0o020, b'w'),
        (0o010, b'x'),
        (0o004, b'r'),
        (0o002, b'w'),
        (0o001, b'x'),
    ];
    let mut b: Vec<u8> = BITS
        .iter()
        .map(|&(bit, ch)| if mode & bit != 0 { ch } else { b'-' })
        .collect();
    if mode & 0o4000 != 0 {
        b[2] = if mode & 0o100 != 0 { b's' } else { b'S' };
    }
    if mode & 0o2000 != 0 {
        b[5] = if mode & 0o010 != 0 { b's' } else { b'S' };
    }
    if mode & 0o1000 != 0 {
        b[8] = if mode & 0o001 != 0 { b't' } else { b'T' };
    }
    String::from_utf8(b).expect("ascii only")
}

/// The hardlink's displayed metadata is its resolved target's, since that's
/// what the materialized inode actually carries; only the path differs.
fn resolve_display<'a>(entry: &'a ObjectEntry, table: &'a ObjectTable) -> &'a ObjectEntry {
    if entry.obj_type == ObjectType::Hardlink {
        if let Some(target) = entry.equivalent_object_id.and_then(|id| table.get(id)) {
            if target.obj_type != ObjectType::Hardlink {
                return target;
            }
        }
    }
    entry
}

fn type_char(display: &ObjectEntry) -> char {
    match display.obj_type {
        ObjectType::Directory => 'd',
        ObjectType::Symlink => 'l',
        ObjectType::Special => {
            let fmt = display.mode & libc::S_IFMT;
            if fmt == libc::S_IFBLK {
                'b'
            } else if fmt == libc::S_IFCHR {
                'c'
            } else {
                '-'
            }
        }
        _ => '-',
    }
}

fn size_string(display: &ObjectEntry) -> String {
    match display.obj_type {
        ObjectType::File => display.size.to_string(),
        ObjectType::Symlink => display.alias.len().to_string(),
        ObjectType::Special => {
            let major = nix::sys::stat::major(display.rdev as u64);
            let minor = nix::sys::stat::minor(display.rdev as u64);
            format!("{major},{minor:04}")
        }
        _ => "0".to_string(),
    }
}

fn format_line(entry: &ObjectEntry, table: &ObjectTable) -> String {
    let display = resolve_display(entry, table);
    let dt = Local
        .timestamp_opt(display.mtime as i64, 0)
        .single()
        .unwrap_or_else(|| Local.timestamp_opt(0, 0).single().unwrap());
    let name = match entry.obj_type {
        ObjectType::Symlink => format!("{} -> {}", entry.path, entry.alias),
        ObjectType::Hardlink => format!("{} -> /{}", entry.path, display.path),
        _ => entry.path.clone(),
    };
    format!(
        "{}{} {:<8} {} {} {}",
        type_char(display),
        perm_string(display.mode),
        size_string(display),
        dt.format("%Y-%m-%d"),
        dt.format("%H:%M"),
        name,
    )
}

/// One line per object, in the order headers were processed — matching the
/// order extraction would materialize them in. The root ("." ) is never
/// listed, same as it is never created on disk.
pub fn render_all(table: &ObjectTable, mode: Mode) -> Vec<String> {
    match mode {
        Mode::ListNames => table.order().map(|e| e.path.clone()).collect(),
        Mode::ListLong => table.order().map(|e| format_line(e, table)).collect(),
        Mode::Extract => Vec::new(),
    }
}

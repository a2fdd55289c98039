//! Drives the main loop: opens the source, detects (or accepts a forced)
//! layout, feeds records through the decoder into the Extractor, and
//! replays directory timestamps once the stream ends.

use std::fs::File;
use std::io::{self, Read};
use std::path::PathBuf;

use crate::decode::{self, Record};
use crate::error::{Result, Yaffs2Error};
use crate::extract::{Extractor, Mode, WarnOutcome};
use crate::fs_ops::Filesystem;
use crate::layout;
use crate::listing;
use crate::reader::ImageReader;

#[derive(Debug, Clone, Copy)]
pub enum LayoutChoice {
    Auto,
    Forced(u32, u32),
}

pub struct RunOptions {
    /// "-" denotes standard input.
    pub image_path: String,
    pub base_dir: Option<PathBuf>,
    pub layout: LayoutChoice,
    pub mode: Mode,
}

pub enum Diagnostic<'a> {
    Warning(&'a Yaffs2Error),
    LayoutDetected { chunk_size: u32, spare_size: u32 },
}

fn open_source(image_path: &str) -> Result<Box<dyn Read>> {
    if image_path == "-" {
        Ok(Box::new(io::stdin()))
    } else {
        let f = File::open(image_path)
            .map_err(|e| Yaffs2Error::output(format!("cannot open image \"{image_path}\""), e))?;
        Ok(Box::new(f))
    }
}

fn enter_base_dir(base_dir: &std::path::Path) -> Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o777)
        .create(base_dir)
        .map_err(|e| {
            Yaffs2Error::BadDestination(format!(
                "cannot create destination \"{}\": {e}",
                base_dir.display()
            ))
        })?;
    std::env::set_current_dir(base_dir).map_err(|e| {
        Yaffs2Error::BadDestination(format!(
            "cannot enter destination \"{}\": {e}",
            base_dir.display()
        ))
    })
}

/// Runs one full extraction or listing pass. Returns the listing lines
/// (empty in `Mode::Extract`).
pub fn run(
    opts: RunOptions,
    fs: &mut dyn Filesystem,
    on_diag: &mut dyn FnMut(Diagnostic),
) -> Result<Vec<String>> {
    let mut source = open_source(&opts.image_path)?;

    if let Some(base_dir) = &opts.base_dir {
        enter_base_dir(base_dir)?;
    }

    // Effective umask forced to 0 so explicit modes from the image survive.
    let _ = nix::sys::stat::umask(nix::sys::stat::Mode::empty());

    let (chunk_size, spare_size, lookahead) = match opts.layout {
        LayoutChoice::Auto => layout::detect(&mut *source)?,
        LayoutChoice::Forced(chunk, spare) => (chunk, spare, Vec::new()),
    };
    on_diag(Diagnostic::LayoutDetected {
        chunk_size,
        spare_size,
    });

    let mut reader = ImageReader::new(source, chunk_size, spare_size, lookahead);
    let mut extractor = Extractor::new(opts.mode, fs);

    loop {
        let (chunk, spare) = match reader.next_chunk()? {
            Some(pair) => pair,
            None => break,
        };
        match decode::decode_record(&chunk, &spare) {
            Record::Empty => {}
            Record::Header { object_id, header } => {
                let warnings = extractor.handle_header(object_id, header)?;
                for w in &warnings {
                    on_diag(Diagnostic::Warning(w));
                }
            }
            Record::Data {
                object_id,
                chunk_id,
                byte_count,
            } => {
                let payload = decode::data_payload(&chunk, byte_count);
                let warnings = extractor.handle_data(object_id, chunk_id, byte_count, payload)?;
                for w in &warnings {
                    on_diag(Diagnostic::Warning(w));
                }
            }
            Record::Malformed => match extractor.note_malformed(reader.chunk_no()) {
                WarnOutcome::Continue(w) => on_diag(Diagnostic::Warning(&w)),
                WarnOutcome::Abort(w) => {
                    on_diag(Diagnostic::Warning(&w));
                    return Err(Yaffs2Error::TooManyWarnings);
                }
            },
        }
    }

    if extractor.has_unfinished_file() {
        return Err(Yaffs2Error::BrokenImage);
    }

    let (warnings, table) = extractor.finish()?;
    for w in &warnings {
        on_diag(Diagnostic::Warning(w));
    }

    Ok(listing::render_all(&table, opts.mode))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs_ops::test_doubles::{Call, RecordingFilesystem};
    use crate::header::ObjectType;
    use crate::testsupport;

    fn run_image(
        image: Vec<u8>,
        layout: LayoutChoice,
        mode: Mode,
        fs: &mut dyn Filesystem,
    ) -> Result<Vec<String>> {
        let opts = RunOptions {
            image_path: String::new(),
            base_dir: None,
            layout,
            mode,
        };
        run_with_source(opts, Box::new(std::io::Cursor::new(image)), fs)
    }

    /// Test-only variant of `run` that skips the "-"/file-path resolution
    /// so scenarios can feed an in-memory `Cursor` directly.
    fn run_with_source(
        opts: RunOptions,
        source: Box<dyn Read>,
        fs: &mut dyn Filesystem,
    ) -> Result<Vec<String>> {
        let (chunk_size, spare_size, lookahead) = match opts.layout {
            LayoutChoice::Auto => layout::detect(&mut { source })?,
            LayoutChoice::Forced(c, s) => (c, s, Vec::new()),
        };
        run_from_parts(opts, chunk_size, spare_size, lookahead, fs)
    }

    fn run_from_parts(
        opts: RunOptions,
        chunk_size: u32,
        spare_size: u32,
        lookahead: Vec<u8>,
        fs: &mut dyn Filesystem,
    ) -> Result<Vec<String>> {
        let mut reader = ImageReader::new(Box::new(std::io::empty()), chunk_size, spare_size, lookahead);
        let mut extractor = Extractor::new(opts.mode, fs);
        loop {
            let (chunk, spare) = match reader.next_chunk()? {
                Some(pair) => pair,
                None => break,
            };
            match decode::decode_record(&chunk, &spare) {
                Record::Empty => {}
                Record::Header { object_id, header } => {
                    extractor.handle_header(object_id, header)?;
                }
                Record::Data {
                    object_id,
                    chunk_id,
                    byte_count,
                } => {
                    let payload = decode::data_payload(&chunk, byte_count);
                    extractor.handle_data(object_id, chunk_id, byte_count, payload)?;
                }
                Record::Malformed => match extractor.note_malformed(reader.chunk_no()) {
                    WarnOutcome::Continue(_) => {}
                    WarnOutcome::Abort(_) => return Err(Yaffs2Error::TooManyWarnings),
                },
            }
        }
        if extractor.has_unfinished_file() {
            return Err(Yaffs2Error::BrokenImage);
        }
        let (_warnings, table) = extractor.finish()?;
        Ok(listing::render_all(&table, opts.mode))
    }

    #[test]
    fn scenario_one_file_is_written_and_closed() {
        let mut image = Vec::new();
        image.extend(testsupport::header_record(2048, 64, 1, 1, ObjectType::Directory, ""));
        image.extend(testsupport::header_record_full(
            2048,
            64,
            2,
            1,
            ObjectType::File,
            "a",
            0o644,
            0,
            0,
            0,
            1_700_000_000,
            3,
            "",
            0,
        ));
        image.extend(testsupport::data_record(2048, 64, 2, 1, b"abc"));

        let mut fs = RecordingFilesystem::new();
        run_image(image, LayoutChoice::Forced(2048, 64), Mode::Extract, &mut fs).unwrap();

        assert!(fs.calls.iter().any(|c| matches!(
            c,
            Call::CreateFile { path, .. } if path == "a"
        )));
        assert!(fs.calls.iter().any(|c| matches!(
            c,
            Call::SetUtime { path, mtime, .. } if path == "a" && *mtime == 1_700_000_000
        )));
    }

    #[test]
    fn scenario_hardlink_before_target_is_rejected() {
        let mut image = Vec::new();
        image.extend(testsupport::header_record(2048, 64, 1, 1, ObjectType::Directory, ""));
        image.extend(testsupport::header_record_full(
            2048,
            64,
            2,
            1,
            ObjectType::Hardlink,
            "link",
            0,
            0,
            0,
            0,
            0,
            0,
            "",
            99,
        ));
        let mut fs = RecordingFilesystem::new();
        let err = run_image(image, LayoutChoice::Forced(2048, 64), Mode::Extract, &mut fs).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Invalid equivalentObjectId 99"), "{message}");
    }

    #[test]
    fn scenario_too_many_malformed_chunks_aborts() {
        let mut image = Vec::new();
        for _ in 0..21 {
            image.extend(testsupport::malformed_record(2048, 64));
        }
        let mut fs = RecordingFilesystem::new();
        let err = run_image(image, LayoutChoice::Forced(2048, 64), Mode::Extract, &mut fs).unwrap_err();
        assert!(matches!(err, Yaffs2Error::TooManyWarnings));
    }

    #[test]
    fn scenario_directory_mtime_replayed_after_children() {
        let mut image = Vec::new();
        image.extend(testsupport::header_record(2048, 64, 1, 1, ObjectType::Directory, ""));
        image.extend(testsupport::header_record_full(
            2048,
            64,
            2,
            1,
            ObjectType::Directory,
            "d",
            0o755,
            0,
            0,
            0,
            1_600_000_000,
            0,
            "",
            0,
        ));
        image.extend(testsupport::header_record_full(
            2048,
            64,
            3,
            2,
            ObjectType::File,
            "f",
            0o644,
            0,
            0,
            0,
            0,
            0,
            "",
            0,
        ));
        let mut fs = RecordingFilesystem::new();
        run_image(image, LayoutChoice::Forced(2048, 64), Mode::Extract, &mut fs).unwrap();

        let mkdir_idx = fs
            .calls
            .iter()
            .position(|c| matches!(c, Call::Mkdir { path, .. } if path == "d"))
            .unwrap();
        let replay_idx = fs
            .calls
            .iter()
            .rposition(|c| matches!(c, Call::SetUtime { path, mtime, .. } if path == "d" && *mtime == 1_600_000_000))
            .unwrap();
        assert!(replay_idx > mkdir_idx);
    }

    #[test]
    fn scenario_layout_autodetection_reports_chosen_pair() {
        let mut image = Vec::new();
        image.extend(testsupport::header_record(4096, 128, 1, 1, ObjectType::Directory, ""));
        image.extend(testsupport::header_record(4096, 128, 2, 1, ObjectType::Directory, "d"));
        let mut fs = RecordingFilesystem::new();
        let opts = RunOptions {
            image_path: String::new(),
            base_dir: None,
            layout: LayoutChoice::Auto,
            mode: Mode::Extract,
        };
        let mut cursor: Box<dyn Read> = Box::new(std::io::Cursor::new(image));
        let (chunk_size, spare_size, lookahead) = layout::detect(&mut *cursor).unwrap();
        assert_eq!((chunk_size, spare_size), (4096, 128));
        run_from_parts(opts, chunk_size, spare_size, lookahead, &mut fs).unwrap();
    }

    #[test]
    fn list_mode_reads_through_a_file_without_any_fs_mutation() {
        use crate::fs_ops::test_doubles::NullFilesystem;

        let mut image = Vec::new();
        image.extend(testsupport::header_record(2048, 64, 1, 1, ObjectType::Directory, ""));
        image.extend(testsupport::header_record_full(
            2048,
            64,
            2,
            1,
            ObjectType::File,
            "a",
            0o644,
            0,
            0,
            0,
            1_700_000_000,
            3,
            "",
            0,
        ));
        image.extend(testsupport::data_record(2048, 64, 2, 1, b"abc"));

        let mut fs = NullFilesystem;
        let lines = run_image(image, LayoutChoice::Forced(2048, 64), Mode::ListNames, &mut fs);
        assert_eq!(lines.unwrap(), vec!["a".to_string()]);
    }
}

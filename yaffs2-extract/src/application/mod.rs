use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use yaffs2_core::{Diagnostic, Filesystem, LayoutChoice, Mode, Result, UnixFilesystem, Yaffs2Error};

use crate::presentation::cli::Cli;

const LAYOUTS: [(u32, u32); 4] = [(2048, 64), (4096, 128), (8192, 256), (16384, 512)];

fn resolve_mode(cli: &Cli) -> Mode {
    if !cli.list {
        Mode::Extract
    } else if cli.verbose {
        Mode::ListLong
    } else {
        Mode::ListNames
    }
}

fn resolve_layout(n: u8) -> LayoutChoice {
    if n == 0 {
        LayoutChoice::Auto
    } else {
        let (chunk, spare) = LAYOUTS[(n - 1) as usize];
        LayoutChoice::Forced(chunk, spare)
    }
}

fn run_cli(cli: Cli) -> Result<()> {
    if cli.list && cli.base_dir.is_some() {
        return Err(Yaffs2Error::UsageError(
            "a destination directory is not valid with -t/--list".to_string(),
        ));
    }

    let mode = resolve_mode(&cli);
    let verbose = cli.verbose;
    let opts = yaffs2_core::RunOptions {
        image_path: cli.image,
        base_dir: cli.base_dir.map(PathBuf::from),
        layout: resolve_layout(cli.layout),
        mode,
    };

    let mut fs: Box<dyn Filesystem> = Box::new(UnixFilesystem::new());
    let mut on_diag = |d: Diagnostic| match d {
        Diagnostic::Warning(w) => eprintln!("{w}"),
        Diagnostic::LayoutDetected {
            chunk_size,
            spare_size,
        } => {
            if verbose && mode == Mode::Extract {
                eprintln!("chunk size = {chunk_size}, spare size = {spare_size}.");
            }
        }
    };

    let lines = yaffs2_core::run(opts, fs.as_mut(), &mut on_diag)?;
    for line in lines {
        println!("{line}");
    }
    Ok(())
}

pub fn run() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            use clap::error::ErrorKind;
            if e.kind() == ErrorKind::DisplayVersion {
                e.exit();
            }
            // Help and every other usage error go to stderr with exit
            // status 1, matching unyaffs2's own `usage()` (never 0, even
            // for `-h`).
            eprint!("{e}");
            return ExitCode::from(1);
        }
    };

    match run_cli(cli) {
        Ok(()) => ExitCode::from(0),
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(1)
        }
    }
}

use clap::Parser;

/// Extract or list the contents of a YAFFS2 flash-filesystem image.
#[derive(Parser)]
#[command(
    name = "unyaffs2",
    author,
    version,
    about = "unyaffs2 (alpha)",
    long_about = None,
    disable_help_flag = true
)]
pub struct Cli {
    /// Print usage. `-?` is a historical alias carried over from the
    /// original `getopt(argc, argv, "l:h?")` option string.
    #[arg(short = 'h', long = "help", short_alias = '?', action = clap::ArgAction::Help)]
    pub help: Option<bool>,

    /// Force a layout instead of auto-detecting: 0 = auto, 1..4 pick one of
    /// the four supported (chunk,spare) pairs in ascending size order.
    #[arg(short = 'l', long = "layout", value_name = "N", default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=4))]
    pub layout: u8,

    /// List mode: print names instead of extracting.
    #[arg(short = 't', long = "list")]
    pub list: bool,

    /// Verbose: with `-t`, produces a long listing; without it, prints the
    /// detected layout to stderr.
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Image file to read, or "-" for standard input.
    pub image: String,

    /// Directory to extract into (extract mode only).
    pub base_dir: Option<String>,
}

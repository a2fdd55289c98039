use thiserror::Error;

/// The single error type propagated by every fallible function in the core.
#[derive(Error, Debug)]
pub enum Yaffs2Error {
    #[error("Not a yaffs2 image")]
    NotYaffs2,

    #[error("Can't determine chunk size")]
    UndetectableLayout,

    #[error("Broken image file")]
    TruncatedImage,

    #[error("Broken image file")]
    BrokenImage,

    #[error("Warning: Invalid header at chunk #{chunk}, skipping...")]
    MalformedRecord { chunk: u64 },

    #[error("Giving up")]
    TooManyWarnings,

    #[error("{0}")]
    InvalidReference(String),

    #[error("{message}: {source}")]
    OutputError {
        message: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    DeviceNodePermission(String),

    #[error("{0}")]
    MetadataBestEffort(String),

    #[error("{0}")]
    UsageError(String),

    #[error("{0}")]
    BadDestination(String),
}

impl Yaffs2Error {
    pub fn output(message: impl Into<String>, source: std::io::Error) -> Self {
        Yaffs2Error::OutputError {
            message: message.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Yaffs2Error>;

use thiserror::Error;

/// Error kinds produced by the NTFS metadata engine.
///
/// Path resolution does not use `NotFound` for "no such component" — that
/// case is a tri-state `Option` return, not an error (see `ntfs-engine`'s
/// path resolver). `NotFound` here covers lookups that are genuinely
/// exceptional, e.g. an attribute type a caller asked for by id.
#[derive(Debug, Error)]
pub enum NtfsError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("read out of bounds: {0}")]
    OutOfBounds(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed boot sector: {0}")]
    MalformedBootSector(String),

    #[error("malformed attribute: {0}")]
    MalformedAttribute(String),

    #[error("corrupt runlist: {0}")]
    CorruptRunlist(String),

    #[error("fixup mismatch: {0}")]
    FixupMismatch(String),

    #[error("inconsistent attribute list: {0}")]
    InconsistentAttributeList(String),

    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("operation aborted")]
    Aborted,

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, NtfsError>;

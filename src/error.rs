use std::{io, path::PathBuf};

/// Errors surfaced across the cache/flush/compaction pipeline and the
/// on-disk table read path.
///
/// Decode failures encountered while scanning a table (during compaction or
/// a point lookup) are deliberately *not* represented here: per the error
/// policy, those are logged and treated as "record absent" rather than
/// propagated. Only I/O and structural footer/index corruption are fatal.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("invalid table file {path:?}: {reason}")]
    InvalidTableFile { path: PathBuf, reason: String },

    #[error("file name does not match a known naming scheme: {0:?}")]
    InvalidFileName(PathBuf),

    #[error("cache capacity {cap} is too small to hold a single record of {needed} bytes")]
    CacheOverflow { cap: u64, needed: u64 },

    #[error("data directory {0:?} is already locked by another engine instance")]
    DirectoryLocked(PathBuf),
}

pub type Result<T> = std::result::Result<T, Error>;

use thiserror::Error;

/// Errors surfaced by the public API.
///
/// Message text is part of the contract: callers (and tests) match on
/// these exact strings, not just the variant.
#[derive(Debug, Error)]
pub enum Error {
    /// The DEFLATE decoder encountered malformed compressed data.
    #[error("zran: compressed data error in input file")]
    Decoder,

    /// The compressed stream ended before a deflate end-of-stream marker.
    #[error("zran: input file ended prematurely")]
    PrematureEof,

    /// A DFLIDX file failed magic, size, or structural validation.
    #[error("zran: invalid index file")]
    InvalidIndexFile,

    /// The requested `(start, length)` falls outside the indexed stream.
    #[error("Offset and length specified would result in reading past the file bounds")]
    Range,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

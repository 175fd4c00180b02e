//! Random access reads into DEFLATE-family compressed byte streams (raw
//! deflate, zlib, gzip) without decompressing from the beginning.
//!
//! An [`Index`] is a sparse sequence of [`Point`] checkpoints into a
//! compressed stream, each carrying the 32 KiB sliding-window context
//! needed to resume inflation mid-stream. [`Index::create`] builds one by
//! scanning a compressed stream once; [`decompress`] then uses it to pull
//! out an arbitrary uncompressed byte range without re-inflating from the
//! start. [`Index::create_modified_index`] narrows an index (and the
//! matching slice of compressed bytes) down to just what a set of
//! requested ranges need, rebasing it to a new logical origin.
//!
//! ```no_run
//! use zran::{Index, Mode};
//!
//! # fn run() -> zran::Result<()> {
//! let compressed = std::fs::read("archive.tar.gz")?;
//! let index = Index::create_from_slice(&compressed, Mode::Gzip, 1 << 20)?;
//! let chunk = zran::decompress(&compressed, &index, 1 << 24, 4096)?;
//! # let _ = chunk;
//! # Ok(())
//! # }
//! ```

mod decompress;
mod engine;
mod error;
mod index;
mod indexer;
mod mode;
mod point;
mod window;

pub use decompress::decompress;
pub use error::{Error, Result};
pub use index::{get_closest_point, Index};
pub use indexer::DEFAULT_SPAN;
pub use mode::Mode;
pub use point::Point;

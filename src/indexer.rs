//! Drives an [`InflateEngine`] across an entire compressed stream, deciding
//! where to emit [`Point`]s. Mirrors the block-boundary scan
//! `replit-ztoc-rs::zinfo::GzipZInfoDecompressor` performs, generalized from
//! gzip-only to raw/zlib/gzip and restructured as a one-shot `build` rather
//! than a `Read` adapter, since the index is all this crate needs from the
//! pass (the caller doesn't want the decompressed bytes back).

use std::io::Read;

use crate::engine::{FlushMode, InflateEngine, Status};
use crate::error::{Error, Result};
use crate::index::Index;
use crate::mode::Mode;
use crate::point::Point;
use crate::window::WINSIZE;

/// Default target spacing between checkpoints.
pub const DEFAULT_SPAN: u64 = 1 << 20;

const CHUNK: usize = 1 << 14;

/// Builds an [`Index`] by inflating `source` end to end. `span` is clamped
/// up to the 32 KiB minimum a checkpoint window requires.
pub fn build<R: Read>(mut source: R, mode: Mode, span: u64) -> Result<Index> {
    let span = span.max(WINSIZE as u64);

    let mut engine = InflateEngine::init(mode.window_bits())?;
    let mut points: Vec<Point> = Vec::new();
    let mut last_emitted_outloc: u64 = 0;

    let mut uncompressed_consumed: u64 = 0;
    let mut compressed_consumed: u64 = 0;

    let mut input_buf = [0u8; CHUNK];
    let mut output_buf = [0u8; CHUNK];
    let mut input_pos = 0usize;
    let mut input_len = 0usize;

    loop {
        if input_pos == input_len {
            input_len = source.read(&mut input_buf)?;
            input_pos = 0;
            if input_len == 0 {
                return Err(Error::PrematureEof);
            }
        }

        let (consumed, produced, status) = engine.inflate(
            &input_buf[input_pos..input_len],
            &mut output_buf,
            FlushMode::Block,
        )?;
        input_pos += consumed;
        compressed_consumed += consumed as u64;
        uncompressed_consumed += produced as u64;

        match status {
            Status::StreamEnd => break,
            Status::BlockBoundary => {
                let is_first = points.is_empty();
                if is_first || uncompressed_consumed - last_emitted_outloc >= span {
                    let bits = engine.query_bit_position();
                    let window = engine.copy_window();
                    points.push(Point::new(
                        uncompressed_consumed,
                        compressed_consumed,
                        bits,
                        window,
                    ));
                    last_emitted_outloc = uncompressed_consumed;
                }
            }
            Status::OutputFull | Status::NeedMoreInput => {}
        }
    }

    if points.first().map(|p| p.outloc) != Some(0) {
        // Raw deflate has no header to anchor a zero-output boundary on;
        // splice in a synthetic origin so `points[0].outloc == 0` always
        // holds, per the window-less origin point allowed by §3 I4.
        points.insert(0, Point::new(0, 0, 0, Vec::new()));
    }

    log::debug!(
        "built index: mode={mode:?} points={} compressed_size={compressed_consumed} uncompressed_size={uncompressed_consumed}",
        points.len()
    );

    Ok(Index::from_parts(
        mode,
        compressed_consumed,
        uncompressed_consumed,
        points,
    ))
}

#[cfg(test)]
mod test {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::{Cursor, Write};

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    /// Semi-random bytes: compressible enough to be realistic, but not so
    /// repetitive that the compressed form collapses below a few KiB (the
    /// corrupt/truncated-tail tests need room to cut a fixed prefix/suffix).
    fn pseudo_random(len: usize) -> Vec<u8> {
        let mut state: u64 = 0x243F6A8885A308D3;
        let words: Vec<[u8; 8]> = (0..64)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                state.to_le_bytes()
            })
            .collect();
        let mut out = Vec::with_capacity(len);
        while out.len() < len {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            out.extend_from_slice(&words[(state as usize) % words.len()]);
        }
        out.truncate(len);
        out
    }

    #[test]
    fn first_point_is_origin_with_header_offset() {
        let data = vec![7u8; 4 << 20];
        let compressed = gzip(&data);
        let index = build(Cursor::new(compressed.clone()), Mode::Gzip, DEFAULT_SPAN).unwrap();

        assert_eq!(index.points()[0].outloc, 0);
        assert_eq!(index.points()[0].bits, 0);
        assert_eq!(index.points()[0].window.len(), WINSIZE);
        assert_eq!(index.compressed_size, compressed.len() as u64);
        assert_eq!(index.uncompressed_size, data.len() as u64);
    }

    #[test]
    fn premature_eof_on_truncated_tail() {
        let data = pseudo_random(1 << 18);
        let mut compressed = gzip(&data);
        assert!(compressed.len() > 200);
        compressed.truncate(compressed.len() - 10);
        let err = build(Cursor::new(compressed), Mode::Gzip, DEFAULT_SPAN).unwrap_err();
        assert!(matches!(err, Error::PrematureEof));
    }

    #[test]
    fn decoder_error_on_corrupt_head() {
        let data = pseudo_random(1 << 18);
        let compressed = gzip(&data);
        assert!(compressed.len() > 200);
        let corrupt = compressed[100..].to_vec();
        let err = build(Cursor::new(corrupt), Mode::Gzip, DEFAULT_SPAN).unwrap_err();
        assert!(matches!(err, Error::Decoder));
    }
}

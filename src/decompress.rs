//! Random-range extraction: seek to the nearest checkpoint at or before
//! `start`, prime a fresh [`InflateEngine`] with its window, and inflate
//! forward far enough to discard the gap and capture the requested range.

use crate::engine::{FlushMode, InflateEngine, Status};
use crate::error::{Error, Result};
use crate::index::{get_closest_point, Index};

/// Extracts `compressed[.. ]` `uncompressed[start, start+length)` using
/// `index`'s checkpoints. `compressed` must begin at the byte the index's
/// surviving points' `inloc` values are relative to: either the whole
/// original stream, or the compressed slice `Index::create_modified_index`
/// returned alongside a rebased index.
pub fn decompress(compressed: &[u8], index: &Index, start: u64, length: u64) -> Result<Vec<u8>> {
    let end = start.checked_add(length).ok_or(Error::Range)?;
    if end > index.uncompressed_size {
        return Err(Error::Range);
    }
    if length == 0 {
        return Ok(Vec::new());
    }

    let points = index.points();
    let point = if points.is_empty() {
        None
    } else {
        Some(get_closest_point(points, start, false))
    };

    // After any real checkpoint the remaining bit stream is always raw
    // deflate blocks, regardless of the original wrapper: the wrapper's
    // header was already consumed building the checkpoint. Only the
    // checkpoint-less edge case (an index with no points at all) still has
    // an unconsumed header to deal with, so it inflates with the index's
    // original framing from byte zero.
    let mut engine = InflateEngine::init(point.map_or(index.mode.window_bits(), |_| -15))?;

    let start_inloc = point.map(|p| p.inloc).unwrap_or(0) as usize;
    if let Some(p) = point {
        if p.bits != 0 {
            if p.inloc == 0 {
                return Err(Error::Decoder);
            }
            let prev_byte = *compressed
                .get(p.inloc as usize - 1)
                .ok_or(Error::Decoder)?;
            engine.prime(p.bits, prev_byte)?;
        }
        if !p.window.is_empty() {
            engine.set_dictionary(&p.window)?;
        }
    }

    let mut to_discard = start - point.map(|p| p.outloc).unwrap_or(0);
    let mut remaining = length;
    let mut out = Vec::with_capacity(length as usize);

    let mut input = compressed.get(start_inloc..).ok_or(Error::Decoder)?;
    let mut scratch = vec![0u8; 1 << 16];

    loop {
        let (consumed, produced, status) =
            engine.inflate(input, &mut scratch, FlushMode::NoFlush)?;
        input = &input[consumed..];

        let mut produced_slice = &scratch[..produced];
        if to_discard > 0 {
            let skip = to_discard.min(produced_slice.len() as u64) as usize;
            produced_slice = &produced_slice[skip..];
            to_discard -= skip as u64;
        }
        if !produced_slice.is_empty() && remaining > 0 {
            let take = remaining.min(produced_slice.len() as u64) as usize;
            out.extend_from_slice(&produced_slice[..take]);
            remaining -= take as u64;
        }

        if remaining == 0 {
            break;
        }
        match status {
            Status::StreamEnd => break,
            Status::NeedMoreInput if input.is_empty() => return Err(Error::Decoder),
            _ => {}
        }
    }

    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::index::Index;
    use crate::mode::Mode;
    use flate2::write::{DeflateEncoder, GzEncoder, ZlibEncoder};
    use flate2::Compression;
    use std::io::Write;

    fn pseudo_random(len: usize) -> Vec<u8> {
        let mut state: u64 = 0x9E3779B97F4A7C15;
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
    fn round_trip_all_three_framings() {
        let data = pseudo_random(4 << 20);

        let mut gz = GzEncoder::new(Vec::new(), Compression::default());
        gz.write_all(&data).unwrap();
        let gz_bytes = gz.finish().unwrap();

        let mut zl = ZlibEncoder::new(Vec::new(), Compression::default());
        zl.write_all(&data).unwrap();
        let zl_bytes = zl.finish().unwrap();

        let mut dfl = DeflateEncoder::new(Vec::new(), Compression::default());
        dfl.write_all(&data).unwrap();
        let dfl_bytes = dfl.finish().unwrap();

        for (bytes, mode) in [
            (gz_bytes, Mode::Gzip),
            (zl_bytes, Mode::Zlib),
            (dfl_bytes, Mode::Raw),
        ] {
            let index = Index::create_from_slice(&bytes, mode, 1 << 18).unwrap();
            let start = 100;
            let length = 1000;
            let got = decompress(&bytes, &index, start, length).unwrap();
            assert_eq!(got, data[start as usize..(start + length) as usize]);
        }
    }

    #[test]
    fn range_past_end_is_rejected() {
        let data = pseudo_random(1 << 16);
        let mut dfl = DeflateEncoder::new(Vec::new(), Compression::default());
        dfl.write_all(&data).unwrap();
        let bytes = dfl.finish().unwrap();
        let index = Index::create_from_slice(&bytes, Mode::Raw, 1 << 14).unwrap();

        let err = decompress(&bytes, &index, 0, data.len() as u64 + 1).unwrap_err();
        assert!(matches!(err, Error::Range));
    }

    #[test]
    fn qc_whole_stream_round_trip() {
        quickcheck::quickcheck(test as fn(Vec<u8>) -> bool);

        fn test(v: Vec<u8>) -> bool {
            let mut enc = DeflateEncoder::new(Vec::new(), Compression::default());
            enc.write_all(&v).unwrap();
            let bytes = enc.finish().unwrap();
            let index = Index::create_from_slice(&bytes, Mode::Raw, 1 << 14).unwrap();
            decompress(&bytes, &index, 0, v.len() as u64).unwrap() == v
        }
    }

    #[test]
    fn nonzero_bits_checkpoints_prime_correctly() {
        let data = pseudo_random(2 << 20);
        let mut dfl = DeflateEncoder::new(Vec::new(), Compression::default());
        dfl.write_all(&data).unwrap();
        let bytes = dfl.finish().unwrap();
        // A small span packs many checkpoints in, increasing the odds of
        // hitting a non-byte-aligned one.
        let index = Index::create_from_slice(&bytes, Mode::Raw, 1 << 16).unwrap();

        let has_nonzero_bits = index.points().iter().any(|p| p.bits != 0);
        assert!(has_nonzero_bits, "fixture produced no non-byte-aligned checkpoint");

        for point in index.points() {
            let start = point.outloc;
            let length = data.len() as u64 - start;
            let got = decompress(&bytes, &index, start, length).unwrap();
            assert_eq!(got, data[start as usize..]);
        }
    }
}

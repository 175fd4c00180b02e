use std::fs::File;
use std::io::{Read, Write};
use std::ops::Range;
use std::path::Path;

use crate::error::{Error, Result};
use crate::indexer;
use crate::mode::Mode;
use crate::point::Point;
use crate::window::WINSIZE;

const MAGIC: &[u8; 6] = b"DFLIDX";
/// `outloc(8) + inloc(8) + bits(1)` per point header, see §4.3.
const POINT_HEADER_LEN: usize = 17;

/// An immutable, ordered collection of [`Point`] checkpoints spanning a
/// compressed stream, plus the framing mode and stream sizes needed to
/// interpret them. Built once by [`Index::create`] or loaded from a DFLIDX
/// file; [`Index::create_modified_index`] produces a new `Index` rather
/// than mutating this one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    pub mode: Mode,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    points: Vec<Point>,
}

impl Index {
    pub(crate) fn from_parts(
        mode: Mode,
        compressed_size: u64,
        uncompressed_size: u64,
        points: Vec<Point>,
    ) -> Self {
        Index {
            mode,
            compressed_size,
            uncompressed_size,
            points,
        }
    }

    /// Builds a fresh index by inflating `source` from start to end.
    /// `span` is the target uncompressed distance between checkpoints
    /// (clamped up to the 32 KiB minimum); pass [`indexer::DEFAULT_SPAN`]
    /// for the standard 1 MiB spacing.
    pub fn create<R: Read>(source: R, mode: Mode, span: u64) -> Result<Index> {
        indexer::build(source, mode, span)
    }

    /// Convenience over [`Index::create`] for an owned, contiguous buffer.
    pub fn create_from_slice(data: &[u8], mode: Mode, span: u64) -> Result<Index> {
        indexer::build(std::io::Cursor::new(data), mode, span)
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Number of checkpoints (`have`, per the DFLIDX header).
    pub fn have(&self) -> usize {
        self.points.len()
    }

    pub fn write_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut file = File::create(path)?;
        self.write_to(&mut file)
    }

    pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Index> {
        let mut file = File::open(path)?;
        Self::read_from(&mut file)
    }

    /// Serializes this index as DFLIDX (see §4.3). A point's window is
    /// omitted iff it's the synthetic origin point (`inloc == 0`, the only
    /// point this crate ever builds with an empty window).
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(MAGIC)?;
        w.write_all(&[self.mode.as_i8() as u8])?;
        w.write_all(&self.uncompressed_size.to_le_bytes())?;
        w.write_all(&self.compressed_size.to_le_bytes())?;
        w.write_all(&(self.points.len() as u32).to_le_bytes())?;

        for p in &self.points {
            w.write_all(&p.outloc.to_le_bytes())?;
            w.write_all(&p.inloc.to_le_bytes())?;
            w.write_all(&[p.bits])?;
        }
        for p in &self.points {
            if p.inloc != 0 {
                w.write_all(&p.window)?;
            }
        }
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<Index> {
        let mut magic = [0u8; 6];
        r.read_exact(&mut magic).map_err(|_| Error::InvalidIndexFile)?;
        if &magic != MAGIC {
            return Err(Error::InvalidIndexFile);
        }

        let mut mode_byte = [0u8; 1];
        r.read_exact(&mut mode_byte).map_err(|_| Error::InvalidIndexFile)?;
        let mode = Mode::from_i8(mode_byte[0] as i8)?;

        let uncompressed_size = read_u64(r)?;
        let compressed_size = read_u64(r)?;
        let have = read_u32(r)? as usize;

        let mut headers = Vec::with_capacity(have);
        for _ in 0..have {
            let mut buf = [0u8; POINT_HEADER_LEN];
            r.read_exact(&mut buf).map_err(|_| Error::InvalidIndexFile)?;
            let outloc = u64::from_le_bytes(buf[0..8].try_into().unwrap());
            let inloc = u64::from_le_bytes(buf[8..16].try_into().unwrap());
            let bits = buf[16];
            headers.push((outloc, inloc, bits));
        }

        let mut points = Vec::with_capacity(have);
        for (outloc, inloc, bits) in headers {
            let window = if inloc == 0 {
                Vec::new()
            } else {
                let mut w = vec![0u8; WINSIZE];
                r.read_exact(&mut w).map_err(|_| Error::InvalidIndexFile)?;
                w
            };
            points.push(Point::new(outloc, inloc, bits, window));
        }

        Ok(Index::from_parts(
            mode,
            compressed_size,
            uncompressed_size,
            points,
        ))
    }

    /// Computes the minimal contiguous slice of checkpoints covering every
    /// requested `starts` offset through `stop` (or end of stream), and
    /// returns `(compressed_range, uncompressed_range, new_index)` rebased
    /// so `new_index`'s origin is the first retained checkpoint (§4.5).
    ///
    /// `starts` is deduplicated and sorted before lookup (duplicate or
    /// out-of-order starts are a convenience, not an error).
    pub fn create_modified_index(
        &self,
        starts: &[u64],
        stop: Option<u64>,
    ) -> Result<(Range<u64>, Range<u64>, Index)> {
        if starts.is_empty() || self.points.is_empty() {
            return Err(Error::Range);
        }

        let mut sorted_starts = starts.to_vec();
        sorted_starts.sort_unstable();
        sorted_starts.dedup();

        let min_start = sorted_starts[0];
        let max_start = *sorted_starts.last().unwrap();

        if min_start > self.uncompressed_size || max_start > self.uncompressed_size {
            return Err(Error::Range);
        }
        if let Some(stop) = stop {
            if stop > self.uncompressed_size || min_start > stop {
                return Err(Error::Range);
            }
        }

        let lo_idx = nearest_point_leq_index(&self.points, min_start);
        let lo_point = &self.points[lo_idx];

        let hi_found = stop.and_then(|stop| self.points.iter().position(|p| p.outloc >= stop));

        let (hi_idx, hi_uncompressed, hi_compressed) = match hi_found {
            Some(idx) => (idx, self.points[idx].outloc, self.points[idx].inloc),
            None => (
                self.points.len() - 1,
                self.uncompressed_size,
                self.compressed_size,
            ),
        };

        if hi_idx < lo_idx || max_start > hi_uncompressed {
            return Err(Error::Range);
        }

        let compressed_start = lo_point.inloc - if lo_point.bits != 0 { 1 } else { 0 };
        let compressed_range = compressed_start..hi_compressed;
        let uncompressed_range = lo_point.outloc..hi_uncompressed;

        let new_points = self.points[lo_idx..=hi_idx]
            .iter()
            .map(|p| {
                Point::new(
                    p.outloc - uncompressed_range.start,
                    p.inloc - compressed_range.start,
                    p.bits,
                    p.window.clone(),
                )
            })
            .collect();

        let new_index = Index::from_parts(
            Mode::Raw,
            compressed_range.end - compressed_range.start,
            uncompressed_range.end - uncompressed_range.start,
            new_points,
        );

        Ok((compressed_range, uncompressed_range, new_index))
    }
}

fn read_u64<R: Read>(r: &mut R) -> Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf).map_err(|_| Error::InvalidIndexFile)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_u32<R: Read>(r: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf).map_err(|_| Error::InvalidIndexFile)?;
    Ok(u32::from_le_bytes(buf))
}

/// Rightmost point with `outloc <= offset`; `points[0]` if none (§4.6).
fn nearest_point_leq_index(points: &[Point], offset: u64) -> usize {
    let idx = points.partition_point(|p| p.outloc <= offset);
    idx.saturating_sub(1)
}

/// Leftmost point with `outloc >= offset`; the last point if none (§4.6).
fn nearest_point_geq_index(points: &[Point], offset: u64) -> usize {
    let idx = points.partition_point(|p| p.outloc < offset);
    idx.min(points.len() - 1)
}

/// Binary-searches `points` for the checkpoint closest to `offset`: the
/// rightmost point with `outloc <= offset`, or (with `greater_than`) the
/// leftmost point with `outloc >= offset`. Exact matches return the exact
/// point either way.
pub fn get_closest_point(points: &[Point], offset: u64, greater_than: bool) -> &Point {
    assert!(!points.is_empty(), "get_closest_point: empty point list");
    if greater_than {
        &points[nearest_point_geq_index(points, offset)]
    } else {
        &points[nearest_point_leq_index(points, offset)]
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn pt(outloc: u64, inloc: u64, bits: u8) -> Point {
        Point::new(outloc, inloc, bits, Vec::new())
    }

    #[test]
    fn get_closest_point_leq_and_geq() {
        let points = vec![pt(0, 0, 0), pt(2, 0, 0), pt(4, 0, 0), pt(5, 0, 0)];
        let r1 = get_closest_point(&points, 3, false);
        assert_eq!(r1.outloc, 2);

        let r2 = get_closest_point(&points, 3, true);
        assert_eq!(r2.outloc, 4);
    }

    #[test]
    fn get_closest_point_exact_match() {
        let points = vec![pt(0, 0, 0), pt(2, 0, 0), pt(4, 0, 0)];
        assert_eq!(get_closest_point(&points, 2, false).outloc, 2);
        assert_eq!(get_closest_point(&points, 2, true).outloc, 2);
    }

    #[test]
    fn dflidx_round_trip_preserves_fields() {
        let mut window_a = vec![0u8; WINSIZE];
        window_a[0] = 0xAB;
        let points = vec![
            Point::new(0, 0, 0, Vec::new()),
            Point::new(100, 50, 3, window_a),
        ];
        let index = Index::from_parts(Mode::Raw, 5000, 10000, points);

        let mut buf = Vec::new();
        index.write_to(&mut buf).unwrap();
        let restored = Index::read_from(&mut std::io::Cursor::new(buf)).unwrap();

        assert_eq!(restored.mode, index.mode);
        assert_eq!(restored.have(), index.have());
        assert_eq!(restored.compressed_size, index.compressed_size);
        assert_eq!(restored.uncompressed_size, index.uncompressed_size);
        assert_eq!(restored.points(), index.points());
    }

    #[test]
    fn read_from_rejects_bad_magic() {
        let buf = b"NOTDFLI\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0".to_vec();
        let err = Index::read_from(&mut std::io::Cursor::new(buf)).unwrap_err();
        assert!(matches!(err, Error::InvalidIndexFile));
    }

    #[test]
    fn modify_rejects_empty_starts() {
        let points = vec![pt(0, 0, 0)];
        let index = Index::from_parts(Mode::Raw, 10, 10, points);
        let err = index.create_modified_index(&[], None).unwrap_err();
        assert!(matches!(err, Error::Range));
    }
}

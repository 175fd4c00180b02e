use crate::window::WINSIZE;

/// An immutable checkpoint: enough decoder state to resume inflation at
/// `outloc` without replaying the stream from the start.
///
/// Priming a fresh inflator with `window` as its dictionary, feeding `bits`
/// unused bits from the byte at `inloc - 1`, then feeding `inloc..` onward,
/// reproduces the uncompressed byte at `outloc` as the first output byte.
#[derive(Clone, PartialEq, Eq)]
pub struct Point {
    /// Uncompressed byte offset at which resumption produces output.
    pub outloc: u64,
    /// Compressed byte offset of the byte containing the first bit to feed
    /// after priming.
    pub inloc: u64,
    /// Unused bits (0..7) at the end of the byte at `inloc - 1`.
    pub bits: u8,
    /// 32 KiB sliding-window contents, oldest byte first. Empty only for a
    /// synthetic origin point.
    pub window: Vec<u8>,
}

impl Point {
    /// Builds a point, asserting the window invariant (§I4): every point's
    /// window is either empty (synthetic origin) or exactly `WINSIZE` bytes.
    pub fn new(outloc: u64, inloc: u64, bits: u8, window: Vec<u8>) -> Self {
        debug_assert!(window.is_empty() || window.len() == WINSIZE);
        Point {
            outloc,
            inloc,
            bits,
            window,
        }
    }
}

impl std::fmt::Debug for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Point")
            .field("outloc", &self.outloc)
            .field("inloc", &self.inloc)
            .field("bits", &format_args!("0b{:03b}", self.bits))
            .field("window_len", &self.window.len())
            .finish()
    }
}

use crate::error::{Error, Result};

/// DEFLATE framing, expressed the way zlib's `windowBits` argument does:
/// negative for a bare deflate stream, `15` for zlib-wrapped, `31` for
/// gzip-wrapped (`15 + 16`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Raw,
    Zlib,
    Gzip,
}

impl Mode {
    /// The `windowBits` value zlib expects for this framing.
    pub fn window_bits(self) -> i32 {
        match self {
            Mode::Raw => -15,
            Mode::Zlib => 15,
            Mode::Gzip => 31,
        }
    }

    /// The signed byte this mode is stored as on the wire (DFLIDX) and in
    /// `Index::mode`.
    pub fn as_i8(self) -> i8 {
        match self {
            Mode::Raw => -15,
            Mode::Zlib => 15,
            Mode::Gzip => 31,
        }
    }

    pub fn from_i8(value: i8) -> Result<Self> {
        match value {
            -15 => Ok(Mode::Raw),
            15 => Ok(Mode::Zlib),
            31 => Ok(Mode::Gzip),
            _ => Err(Error::InvalidIndexFile),
        }
    }
}

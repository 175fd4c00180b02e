// This code is based on the Soci Snapshotter which was based on zlib, but only
// includes the needed pieces for building ztocs and is written in Rust instead
// of C.

/*
   Copyright The Soci Snapshotter Authors.

   Licensed under the Apache License, Version 2.0 (the "License");
   you may not use this file except in compliance with the License.
   You may obtain a copy of the License at

       http://www.apache.org/licenses/LICENSE-2.0

   Unless required by applicable law or agreed to in writing, software
   distributed under the License is distributed on an "AS IS" BASIS,
   WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
   See the License for the specific language governing permissions and
   limitations under the License.
*/

/*
  Copyright (C) 1995-2017 Jean-loup Gailly and Mark Adler
  This software is provided 'as-is', without any express or implied
  warranty.  In no event will the authors be held liable for any damages
  arising from the use of this software.
  Permission is granted to anyone to use this software for any purpose,
  including commercial applications, and to alter it and redistribute it
  freely, subject to the following restrictions:
  1. The origin of this software must not be misrepresented; you must not
     claim that you wrote the original software. If you use this software
     in a product, an acknowledgment in the product documentation would be
     appreciated but is not required.
  2. Altered source versions must be plainly marked as such, and must not be
     misrepresented as being the original software.
  3. This notice may not be removed or altered from any source distribution.
  Jean-loup Gailly        Mark Adler
  jloup@gzip.org          madler@alumni.caltech.edu
*/

//! A thin adapter over libz's streaming inflate primitives: the seam spec.md
//! names `InflateEngine`. `Indexer` and `Decompressor` each own one for the
//! lifetime of a single pass; neither touches `libz_sys` directly.

use std::alloc::{self, Layout};
use std::ffi::CStr;
use std::mem;
use std::ptr;

use libc::{c_int, c_void};
use libz_sys::{
    inflate, inflateEnd, inflateInit2_, inflatePrime, inflateSetDictionary, uInt, z_stream,
    zlibVersion, Z_BLOCK, Z_BUF_ERROR, Z_DATA_ERROR, Z_MEM_ERROR, Z_NEED_DICT, Z_NO_FLUSH,
    Z_OK, Z_STREAM_END, Z_STREAM_ERROR, Z_VERSION_ERROR,
};

use crate::error::{Error, Result};
use crate::window::{RingBuffer, WINSIZE};

/// How eagerly `inflate` should stop and hand control back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushMode {
    /// Stop at the next deflate block boundary (used while indexing).
    Block,
    /// Run until output or input is exhausted (used while decompressing).
    NoFlush,
}

impl FlushMode {
    fn as_raw(self) -> c_int {
        match self {
            FlushMode::Block => Z_BLOCK,
            FlushMode::NoFlush => Z_NO_FLUSH,
        }
    }
}

/// Outcome of a single `InflateEngine::inflate` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The engine consumed all available input; feed more and call again.
    NeedMoreInput,
    /// The output buffer is full; drain it and call again.
    OutputFull,
    /// The deflate stream (and, for zlib/gzip, the wrapper) has ended.
    StreamEnd,
    /// `FlushMode::Block` stopped at a deflate block boundary. Not the last
    /// block of the stream: callers only see this for intermediate blocks.
    BlockBoundary,
}

/// A streaming DEFLATE/zlib/gzip inflator, carrying its own 32 KiB sliding
/// window so checkpoints can be captured without re-deriving them from
/// accumulated output.
pub struct InflateEngine {
    stream: ZStream,
    window: RingBuffer<u8, WINSIZE>,
}

impl InflateEngine {
    /// Starts a fresh decoder for the given zlib `windowBits` value
    /// (`-15` raw, `15` zlib, `31` gzip).
    pub fn init(window_bits: i32) -> Result<Self> {
        Ok(InflateEngine {
            stream: ZStream::new(window_bits)?,
            window: RingBuffer::new(),
        })
    }

    /// Installs `dictionary` (expected to be the 32 KiB window of a
    /// checkpoint) as the decoder's back-reference context.
    pub fn set_dictionary(&mut self, dictionary: &[u8]) -> Result<()> {
        self.stream.set_dictionary(dictionary)
    }

    /// Injects the `bits` unused bits left over at the end of `value` (the
    /// compressed byte at `inloc - 1`) ahead of the next input byte, for
    /// resuming at a non-byte-aligned block boundary. DEFLATE consumes bits
    /// LSB-first, so the unconsumed bits sit at the top of `value`;
    /// `inflatePrime` wants them as the low bits of its own argument, hence
    /// the shift.
    pub fn prime(&mut self, bits: u8, value: u8) -> Result<()> {
        if bits == 0 {
            return Ok(());
        }
        let shifted = value >> (8 - bits);
        self.stream.prime(bits as c_int, shifted as c_int)
    }

    /// Feeds `input` and writes decompressed bytes into `output`, stopping
    /// according to `flush`. Returns how many input bytes were consumed,
    /// how many output bytes were produced, and why the call stopped.
    pub fn inflate(
        &mut self,
        input: &[u8],
        output: &mut [u8],
        flush: FlushMode,
    ) -> Result<(usize, usize, Status)> {
        let avail_in_before = input.len();
        let avail_out_before = output.len();

        unsafe {
            self.stream.next_in(input);
            self.stream.next_out(output);
        }

        let ret = self.stream.inflate(flush.as_raw())?;

        let consumed = avail_in_before - self.stream.available_in() as usize;
        let produced = avail_out_before - self.stream.available_out() as usize;

        self.window.write(&output[..produced]);

        if ret == Z_STREAM_END {
            return Ok((consumed, produced, Status::StreamEnd));
        }

        if flush == FlushMode::Block && self.at_block_boundary() {
            return Ok((consumed, produced, Status::BlockBoundary));
        }
        if self.stream.available_out() == 0 {
            return Ok((consumed, produced, Status::OutputFull));
        }
        Ok((consumed, produced, Status::NeedMoreInput))
    }

    /// Number of unused bits (0..7) at the boundary the decoder just
    /// crossed. Only meaningful immediately after `Status::BlockBoundary`.
    pub fn query_bit_position(&self) -> u8 {
        (self.stream.data_type() & 7) as u8
    }

    /// Snapshots the current 32 KiB sliding window, zero-padded on the left
    /// if fewer than 32 KiB have been produced so far.
    pub fn copy_window(&self) -> Vec<u8> {
        self.window.to_vec()
    }

    fn at_block_boundary(&self) -> bool {
        let data_type = self.stream.data_type();
        (data_type & 128) != 0 && (data_type & 64) == 0
    }
}

/// Owns the raw `z_stream` handle. Not `Send`/`Sync`: it embeds raw
/// pointers into buffers supplied per-call by `InflateEngine::inflate`.
struct ZStream {
    stream: Box<z_stream>,
}

impl ZStream {
    fn new(window_bits: c_int) -> Result<Self> {
        let mut stream = Box::new(z_stream {
            next_in: ptr::null_mut(),
            avail_in: 0,
            total_in: 0,
            next_out: ptr::null_mut(),
            avail_out: 0,
            total_out: 0,
            msg: ptr::null_mut(),
            state: ptr::null_mut(),
            opaque: ptr::null_mut(),
            data_type: 0,
            adler: 0,
            reserved: 0,
            zalloc,
            zfree,
        });
        check_error(
            unsafe {
                inflateInit2_(
                    stream.as_mut() as *mut z_stream,
                    window_bits,
                    zlibVersion(),
                    mem::size_of::<z_stream>() as c_int,
                )
            },
            None,
        )?;

        Ok(Self { stream })
    }

    fn available_in(&self) -> u32 {
        self.stream.avail_in
    }

    fn available_out(&self) -> u32 {
        self.stream.avail_out
    }

    fn data_type(&self) -> i32 {
        self.stream.data_type
    }

    /// # Safety
    /// `input` must outlive the following call to `inflate`.
    unsafe fn next_in(&mut self, input: &[u8]) {
        self.stream.avail_in = input.len() as u32;
        self.stream.next_in = input.as_ptr() as *mut u8;
    }

    /// # Safety
    /// `output` must outlive the following call to `inflate`.
    unsafe fn next_out(&mut self, output: &mut [u8]) {
        self.stream.avail_out = output.len() as u32;
        self.stream.next_out = output.as_mut_ptr();
    }

    fn inflate(&mut self, flush: c_int) -> Result<c_int> {
        check_error(
            unsafe { inflate(self.stream.as_mut() as *mut z_stream, flush) },
            Some(&self.stream),
        )
    }

    fn set_dictionary(&mut self, dictionary: &[u8]) -> Result<()> {
        check_error(
            unsafe {
                inflateSetDictionary(
                    self.stream.as_mut() as *mut z_stream,
                    dictionary.as_ptr(),
                    dictionary.len() as uInt,
                )
            },
            Some(&self.stream),
        )?;
        Ok(())
    }

    fn prime(&mut self, bits: c_int, value: c_int) -> Result<()> {
        check_error(
            unsafe { inflatePrime(self.stream.as_mut() as *mut z_stream, bits, value) },
            Some(&self.stream),
        )?;
        Ok(())
    }
}

impl Drop for ZStream {
    fn drop(&mut self) {
        unsafe {
            inflateEnd(self.stream.as_mut() as *mut z_stream);
        }
    }
}

/// Translates a zlib return code into our `Error` taxonomy. Everything that
/// isn't a clean `Z_OK`/`Z_STREAM_END` is a `Decoder` error: zran's callers
/// only distinguish "malformed data" from "ran out of input", and the
/// latter is detected by the caller noticing EOF without `Z_STREAM_END`,
/// not by a specific zlib code.
fn check_error(ret: c_int, stream: Option<&z_stream>) -> Result<c_int> {
    match ret {
        Z_OK | Z_STREAM_END => Ok(ret),
        Z_NEED_DICT => {
            // A zlib stream with a preset-dictionary flag we weren't given;
            // not a checkpoint window, and not something zran resumes from.
            Err(Error::Decoder)
        }
        Z_STREAM_ERROR | Z_DATA_ERROR | Z_BUF_ERROR | Z_VERSION_ERROR => {
            log::debug!("zlib error {ret}: {}", zlib_message(stream));
            Err(Error::Decoder)
        }
        Z_MEM_ERROR => {
            // Allocation failure during inflate; matches spec.md's
            // `OutOfMemory` disposition of "fatal", not a recoverable error.
            panic!("zran: out of memory during inflate");
        }
        _ => {
            log::debug!("zlib unknown error {ret}: {}", zlib_message(stream));
            Err(Error::Decoder)
        }
    }
}

fn zlib_message(stream: Option<&z_stream>) -> String {
    stream
        .filter(|s| !s.msg.is_null())
        .map(|s| unsafe { CStr::from_ptr(s.msg).to_string_lossy().to_string() })
        .unwrap_or_else(|| "no message".to_string())
}

const ALIGN: usize = std::mem::align_of::<usize>();
type AllocSize = uInt;

fn align_up(size: usize, align: usize) -> usize {
    (size + align - 1) & !(align - 1)
}

extern "C" fn zalloc(_ptr: *mut c_void, items: AllocSize, item_size: AllocSize) -> *mut c_void {
    // `items * item_size` is the requested allocation; since `zfree` gets no
    // size argument, stash it in a `usize` header ahead of the returned
    // pointer so it can be deallocated with the right `Layout` later.
    let size = match items
        .checked_mul(item_size)
        .and_then(|i| usize::try_from(i).ok())
        .map(|size| align_up(size, ALIGN))
        .and_then(|i| i.checked_add(std::mem::size_of::<usize>()))
    {
        Some(i) => i,
        None => return ptr::null_mut(),
    };

    let layout = match Layout::from_size_align(size, ALIGN) {
        Ok(layout) => layout,
        Err(_) => return ptr::null_mut(),
    };

    unsafe {
        let ptr = alloc::alloc(layout) as *mut usize;
        if ptr.is_null() {
            return ptr as *mut c_void;
        }
        *ptr = size;
        ptr.add(1) as *mut c_void
    }
}

extern "C" fn zfree(_ptr: *mut c_void, address: *mut c_void) {
    unsafe {
        let ptr = (address as *mut usize).offset(-1);
        let size = *ptr;
        let layout = Layout::from_size_align_unchecked(size, ALIGN);
        alloc::dealloc(ptr as *mut u8, layout)
    }
}

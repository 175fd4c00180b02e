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

use std::cmp;

/// Size of the DEFLATE sliding window.
pub const WINSIZE: usize = 32768;

/// A fixed-size ring buffer tracking the most recent `N` bytes written to it.
/// Writes are pushed onto the back; reading gives the contents oldest-first.
pub struct RingBuffer<T, const N: usize> {
    buffer: [T; N],
    index: usize,
}

impl<T, const N: usize> RingBuffer<T, N>
where
    T: Copy + Default,
{
    pub fn new() -> Self {
        Self {
            buffer: [T::default(); N],
            index: 0,
        }
    }

    /// Writes `buf` to the back of the ring buffer, overwriting the oldest
    /// bytes once the buffer is full. If `buf` itself is longer than the
    /// buffer, only its final `N` bytes are kept.
    pub fn write(&mut self, mut buf: &[T]) {
        if buf.is_empty() {
            return;
        }

        if buf.len() > self.buffer.len() {
            buf = &buf[buf.len() - self.buffer.len()..];
        }

        while !buf.is_empty() {
            let size = cmp::min(buf.len(), self.buffer.len() - self.index);
            self.buffer[self.index..self.index + size].copy_from_slice(&buf[..size]);
            buf = &buf[size..];
            self.index = (self.index + size) % self.buffer.len();
        }
    }

    /// Gets the contents of the ring buffer oldest-first. The underlying
    /// storage may be non-contiguous, so two slices are returned: the front
    /// (older) half and the back (newer) half.
    pub fn read(&self) -> (&[T], &[T]) {
        (&self.buffer[self.index..], &self.buffer[..self.index])
    }

    /// Flattens the ring buffer into a single contiguous, oldest-first copy.
    pub fn to_vec(&self) -> Vec<T> {
        let (left, right) = self.read();
        let mut out = Vec::with_capacity(left.len() + right.len());
        out.extend_from_slice(left);
        out.extend_from_slice(right);
        out
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_ring_buffer() {
        let mut buffer = RingBuffer::<u8, 100>::new();

        assert_eq!(buffer.read(), ([0u8; 100].as_slice(), [0u8; 0].as_slice()));

        buffer.write(&[1u8; 50]);
        assert_eq!(buffer.read(), ([0u8; 50].as_slice(), [1u8; 50].as_slice()));

        buffer.write(&[2u8; 50]);
        let mut expected = Vec::new();
        expected.extend_from_slice(&[1u8; 50]);
        expected.extend_from_slice(&[2u8; 50]);
        assert_eq!(buffer.read(), (expected.as_slice(), [0u8; 0].as_slice()));

        buffer.write(&[3u8; 150]);
        assert_eq!(buffer.read(), ([3u8; 100].as_slice(), [0u8; 0].as_slice()));

        buffer.write(&[4u8; 75]);
        assert_eq!(buffer.read(), ([3u8; 25].as_slice(), [4u8; 75].as_slice()));
    }

    #[test]
    fn test_to_vec_zero_padded_when_partial() {
        let mut buffer = RingBuffer::<u8, 10>::new();
        buffer.write(&[9u8; 4]);
        let v = buffer.to_vec();
        assert_eq!(v.len(), 10);
        assert_eq!(&v[6..], &[9u8; 4]);
        assert_eq!(&v[..6], &[0u8; 6]);
    }
}

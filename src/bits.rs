/*
    EddFox
    https://github.com/dbalsom/eddfox

    Copyright 2025 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------

    src/bits.rs

    An unpacked bit sequence type. Flux captures are analyzed one bit at a
    time with heavy slicing and searching, so tracks are held as one byte per
    bit and only packed back down when an image container is written.
*/

use std::ops::Deref;

use bit_vec::BitVec;

/// An unpacked sequence of bits, one `u8` (0 or 1) per bit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BitSeq(pub Vec<u8>);

impl BitSeq {
    /// Unpack a byte slice into bits, MSB first.
    pub fn from_bytes(bytes: &[u8]) -> BitSeq {
        let mut bits = Vec::with_capacity(bytes.len() * 8);
        for byte in bytes {
            for shift in (0..8).rev() {
                bits.push((byte >> shift) & 1);
            }
        }
        BitSeq(bits)
    }

    pub fn from_bits(bits: Vec<u8>) -> BitSeq {
        BitSeq(bits)
    }

    /// Pack the bit sequence back into bytes, MSB first. A partial trailing
    /// byte is padded with zero bits.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bv = BitVec::from_elem(self.0.len().div_ceil(8) * 8, false);
        for (i, bit) in self.0.iter().enumerate() {
            if *bit != 0 {
                bv.set(i, true);
            }
        }
        bv.to_bytes()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl Deref for BitSeq {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.0
    }
}

/// Clamp a half-open range to the bounds of a sequence of length `len`.
/// Out-of-range and inverted requests collapse to an empty range instead of
/// panicking, matching the forgiving bounds the heuristics rely on.
pub fn clamp_range(len: usize, start: usize, end: usize) -> (usize, usize) {
    let start = start.min(len);
    let end = end.min(len).max(start);
    (start, end)
}

/// Find the first occurrence of `pattern` within `bits[start..end]`, returning
/// its absolute offset. The pattern must fit entirely within the range.
pub fn find_bits(bits: &[u8], pattern: &[u8], start: usize, end: usize) -> Option<usize> {
    let (start, end) = clamp_range(bits.len(), start, end);
    if pattern.is_empty() || end - start < pattern.len() {
        return None;
    }
    bits[start..end]
        .windows(pattern.len())
        .position(|w| w == pattern)
        .map(|pos| start + pos)
}

/// Count non-overlapping runs of three zero bits in `bits[start..end]`.
/// Used to estimate how noisy a capture region is.
pub fn count_triple_zeros(bits: &[u8], start: usize, end: usize) -> usize {
    let (start, end) = clamp_range(bits.len(), start, end);
    let mut count = 0;
    let mut i = start;
    while i + 3 <= end {
        if bits[i] == 0 && bits[i + 1] == 0 && bits[i + 2] == 0 {
            count += 1;
            i += 3;
        }
        else {
            i += 1;
        }
    }
    count
}

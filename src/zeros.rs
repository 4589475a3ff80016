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

    src/zeros.rs

    Zero-risk detection. The drive's read head returns fake bits inside long
    runs of zeros, so any region containing "000" is untrustworthy. This
    module locates the raw zero runs and partitions a track into risky and
    reliable spans.
*/

use crate::{bits::find_bits, config::Tuning, TRACK_MINIMUM};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SpanKind {
    Reliable,
    Risky,
}

/// A half-open `[start, end)` region of the bit stream.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ZeroSpan {
    pub kind: SpanKind,
    pub start: usize,
    pub end: usize,
}

impl ZeroSpan {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains(&self, bit: usize) -> bool {
        bit >= self.start && bit < self.end
    }
}

/// Locate the raw zero runs in `bits`. A run begins at the first bit of a
/// "000" and continues past any lone 1 as long as another "000" follows
/// within `zero_escape_margin` bits.
pub fn zero_streams(bits: &[u8], tuning: &Tuning) -> Vec<ZeroSpan> {
    let mut streams = Vec::new();
    let mut cursor = 0;

    while let Some(start) = find_bits(bits, &[0, 0, 0], cursor, bits.len()) {
        // Extend through the noise: a 1 only ends the run if no further
        // "000" appears within the escape margin.
        let mut end = start + 3;
        loop {
            match find_bits(bits, &[1], end, bits.len()) {
                None => {
                    end = bits.len();
                    break;
                }
                Some(one) => {
                    match find_bits(bits, &[0, 0, 0], one, one + tuning.zero_escape_margin) {
                        Some(next) => {
                            end = next + 3;
                        }
                        None => {
                            end = one;
                            break;
                        }
                    }
                }
            }
        }
        streams.push(ZeroSpan {
            kind: SpanKind::Risky,
            start,
            end,
        });
        if end >= bits.len() {
            break;
        }
        cursor = end;
    }
    streams
}

/// Partition `bits` into alternating reliable and risky spans. Risky spans
/// are the raw zero runs; reliable spans are the complement, shrunk by
/// `zero_margin` bits on each edge, capture boundaries included. Reliable
/// spans that collapse under the margin are dropped rather than emitted
/// inverted.
pub fn find_zero_spans(bits: &[u8], tuning: &Tuning) -> Vec<ZeroSpan> {
    let streams = zero_streams(bits, tuning);
    let margin = tuning.zero_margin;

    if streams.is_empty() {
        // No zero run at all. Captures this clean are synthetic; treat one
        // nominal track as reliable.
        return vec![ZeroSpan {
            kind: SpanKind::Reliable,
            start: 0,
            end: TRACK_MINIMUM.min(bits.len()),
        }];
    }

    let mut spans = Vec::new();
    let mut reliable_start = 0;
    let mut margin_left = margin;

    for stream in &streams {
        let reliable_end = stream.start.saturating_sub(margin);
        if reliable_end > reliable_start + margin_left {
            spans.push(ZeroSpan {
                kind: SpanKind::Reliable,
                start: reliable_start + margin_left,
                end: reliable_end,
            });
        }
        spans.push(*stream);
        reliable_start = stream.end;
        margin_left = margin;
    }

    let last_end = streams[streams.len() - 1].end;
    if bits.len() > last_end + 2 * margin {
        spans.push(ZeroSpan {
            kind: SpanKind::Reliable,
            start: last_end + margin,
            end: bits.len() - margin,
        });
    }
    spans
}

/// Tolerance used throughout track-map building and cut location, derived
/// from how zero-dense the capture is.
pub fn tolerance(bits: &[u8], tuning: &Tuning) -> usize {
    crate::bits::count_triple_zeros(bits, 0, bits.len()) / tuning.tolerance_divisor
        + tuning.tolerance_floor
}

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

    src/nibbles.rs

    Nibblization. Bits become disk nibbles the way the drive controller sees
    them: wait for a 1, shift bits in until the high bit of the register is
    set. Leading zeros before the first 1 are timing bits and mark long
    (sync) nibbles.
*/

use crate::NIB_TRACK_SIZE;

/// One nibble pulled off the head of a bit slice. `offset` is the index of
/// the final bit that completed the register; the caller advances by
/// `offset + 1`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Nibble {
    pub value: u8,
    pub leading_zeros: usize,
    pub offset: usize,
}

/// A run of consecutive long nibbles. `run` counts the nibbles after the
/// first; `end` is the bit offset of the short nibble that closed the run.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SyncRegion {
    pub run: usize,
    pub start: usize,
    pub end: usize,
}

/// The nibblized capture. `nibbles`/`timing`/`ends` run over the entire bit
/// stream; `track_nibbles` is the slice of them covering exactly one track.
#[derive(Clone, Debug, Default)]
pub struct NibbleStream {
    pub nibbles: Vec<u8>,
    /// Timing (leading zero) bit count per nibble.
    pub timing: Vec<usize>,
    /// Absolute bit offset where each nibble's last bit landed.
    pub ends: Vec<usize>,
    pub sync_regions: Vec<SyncRegion>,
    pub track_nibbles: Vec<u8>,
    /// A doubled track truncated to the fixed .nib track size.
    pub nib_nibbles: Vec<u8>,
}

/// Shift the next nibble out of `bits`, counting timing zeros before the
/// first 1. The last bit of the slice is never consumed; a register that
/// never fills is returned incomplete.
pub fn grab_nibble(bits: &[u8]) -> Nibble {
    let mut offset = 0;
    let mut leading_zeros = 0;
    let mut data_register = 0u16;
    let mut wait_for_one = true;
    let stop_offset = bits.len().saturating_sub(1);
    while offset < stop_offset {
        if bits[offset] == 1 {
            data_register = (data_register << 1) + 1;
            wait_for_one = false;
        }
        else if wait_for_one {
            leading_zeros += 1;
        }
        else {
            data_register <<= 1;
        }
        if data_register > 127 {
            break;
        }
        offset += 1;
    }
    Nibble {
        value: data_register as u8,
        leading_zeros,
        offset,
    }
}

/// Nibblize the whole capture starting at the track start, snapshotting the
/// nibbles that cover exactly one track. If the track cut lands inside a
/// nibble the start is nudged forward and the pass rerun, so the snapshot
/// boundary falls on a nibble boundary.
pub fn nibblize(bits: &[u8], track_start: usize, track_length: usize) -> NibbleStream {
    if track_length == 0 {
        return NibbleStream::default();
    }

    let needle = track_start;
    let mut start_offset = track_start;
    let mut cut_offset = track_start + track_length;

    loop {
        let mut stream = NibbleStream::default();
        let mut track_nibbles: Option<Vec<u8>> = None;
        let mut overshoot = 0;
        let mut sync_start: Option<usize> = None;
        let mut sync_run = 0;

        let mut offset = start_offset;
        while offset < bits.len() {
            let nibble = grab_nibble(&bits[offset..]);
            stream.nibbles.push(nibble.value);
            stream.timing.push(nibble.leading_zeros);
            stream.ends.push(offset + nibble.offset);
            if nibble.leading_zeros > 0 {
                match sync_start {
                    None => {
                        sync_start = Some(offset);
                        sync_run = 0;
                    }
                    Some(_) => {
                        sync_run += 1;
                    }
                }
            }
            else if let Some(start) = sync_start.take() {
                stream.sync_regions.push(SyncRegion {
                    run: sync_run,
                    start,
                    end: offset,
                });
                sync_run = 0;
            }
            offset += nibble.offset + 1;
            if offset >= cut_offset && track_nibbles.is_none() && overshoot == 0 {
                if offset > cut_offset {
                    overshoot = offset - cut_offset;
                }
                else {
                    track_nibbles = Some(stream.nibbles.clone());
                }
            }
        }

        if overshoot > 0 && start_offset + overshoot < needle + 12 {
            log::trace!(
                "nibblize(): cut fell {overshoot} bits inside a nibble, renibblizing from {}",
                start_offset + overshoot
            );
            start_offset += overshoot;
            cut_offset += overshoot;
            continue;
        }

        // If the cut never landed on a nibble boundary, the whole stream is
        // the best track snapshot available.
        stream.track_nibbles = track_nibbles.unwrap_or_else(|| stream.nibbles.clone());
        let mut nib = stream.track_nibbles.clone();
        nib.extend_from_slice(&stream.track_nibbles);
        nib.truncate(NIB_TRACK_SIZE);
        stream.nib_nibbles = nib;
        return stream;
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostSyncNibble {
    /// Bit offset where the nibble starts.
    pub offset: usize,
    pub long_nibbles: usize,
    pub nibble: Nibble,
}

/// Find the end of a sync span: a run of more than three long nibbles
/// followed by more than six short ones. Returns the last long nibble, which
/// is where the stream is known to be in frame.
pub fn first_post_sync_nibble(bits: &[u8]) -> Option<PostSyncNibble> {
    let mut offset = 0;
    let mut long_nibbles = 0;
    let mut short_nibbles = 0;
    let mut last_long: Option<PostSyncNibble> = None;
    while offset < bits.len() {
        let nibble = grab_nibble(&bits[offset..]);
        if nibble.leading_zeros > 0 {
            long_nibbles += 1;
            short_nibbles = 0;
            last_long = Some(PostSyncNibble {
                offset,
                long_nibbles,
                nibble,
            });
        }
        else if long_nibbles > 3 {
            short_nibbles += 1;
            if short_nibbles > 6 {
                return last_long;
            }
        }
        offset += nibble.offset + 1;
    }
    log::debug!("first_post_sync_nibble(): no sync span followed by short nibbles");
    None
}

/// Append a nibble to a bit vec: eight data bits MSB-first plus trailing
/// timing zeros.
pub fn push_nibble_bits(bits: &mut Vec<u8>, value: u8, timing_zeros: usize) {
    for i in (0..8).rev() {
        bits.push((value >> i) & 1);
    }
    for _ in 0..timing_zeros {
        bits.push(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grab_nibble_counts_timing_bits() {
        let bits = [0, 0, 1, 0, 1, 0, 1, 0, 1, 1, 0, 1];
        let nibble = grab_nibble(&bits);
        assert_eq!(nibble.value, 0xab);
        assert_eq!(nibble.leading_zeros, 2);
        assert_eq!(nibble.offset, 9);
    }

    #[test]
    fn incomplete_register_is_returned_as_is() {
        // The last bit is never consumed, so eight ones only fill seven.
        let nibble = grab_nibble(&[1; 8]);
        assert_eq!(nibble.value, 127);
        assert_eq!(nibble.offset, 7);
    }

    fn sync_and_data_track() -> Vec<u8> {
        // Ten FF sync nibbles (8 ones + 2 timing zeros), then twenty AA
        // data nibbles. One track is 260 bits; repeat for 2.5 revolutions.
        let mut track = Vec::new();
        for _ in 0..10 {
            push_nibble_bits(&mut track, 0xff, 2);
        }
        for _ in 0..20 {
            push_nibble_bits(&mut track, 0xaa, 0);
        }
        let mut bits = Vec::new();
        for _ in 0..2 {
            bits.extend_from_slice(&track);
        }
        bits.extend_from_slice(&track[..130]);
        bits
    }

    #[test]
    fn nibblize_snapshots_the_track_at_the_cut() {
        let bits = sync_and_data_track();
        let stream = nibblize(&bits, 0, 260);
        assert_eq!(stream.track_nibbles.len(), 30);
        assert_eq!(&stream.track_nibbles[..3], &[0xff, 0xff, 0xff]);
        assert_eq!(&stream.track_nibbles[10..13], &[0xaa, 0xaa, 0xaa]);
        assert_eq!(stream.nib_nibbles.len(), 60);
        // A long-nibble run: nine FFs after the opener, plus the first AA,
        // which inherits the last FF's timing zeros.
        assert_eq!(stream.sync_regions[0].run, 9);
        assert_eq!(stream.sync_regions[0].start, 8);
        assert_eq!(stream.sync_regions[0].end, 108);
    }

    #[test]
    fn nibble_ends_are_absolute() {
        let bits = sync_and_data_track();
        let stream = nibblize(&bits, 0, 260);
        // First FF completes at bit 7; second starts at 8 and completes at 17.
        assert_eq!(stream.ends[0], 7);
        assert_eq!(stream.ends[1], 17);
        for pair in stream.ends.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn post_sync_nibble_is_the_last_long_one() {
        let mut bits = Vec::new();
        for _ in 0..5 {
            push_nibble_bits(&mut bits, 0xff, 2);
        }
        for _ in 0..9 {
            push_nibble_bits(&mut bits, 0xaa, 0);
        }
        let found = first_post_sync_nibble(&bits).unwrap();
        // The first AA inherits the final FF's timing zeros and is the last
        // long nibble before the short run.
        assert_eq!(found.offset, 48);
        assert_eq!(found.nibble.value, 0xaa);
        assert_eq!(found.long_nibbles, 5);
    }

    #[test]
    fn empty_track_nibblizes_to_nothing() {
        let stream = nibblize(&[1, 0, 1, 1], 0, 0);
        assert!(stream.nibbles.is_empty());
        assert!(stream.track_nibbles.is_empty());
    }
}

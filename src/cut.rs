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

    src/cut.rs

    Track cut location. After resolution the stream still holds more than one
    revolution; a window of bits anchored at a trusted match is searched for
    roughly one track length away, spiraling out from the prediction, and the
    span between the two copies becomes the final track.
*/

use crate::{
    bits::find_bits,
    config::Tuning,
    resolver::{AdjustedSegment, LongestMatch},
};

fn window_at(resolved: &[u8], start: isize, len: usize) -> Option<&[u8]> {
    if start < 0 {
        return None;
    }
    let start = start as usize;
    let end = start.checked_add(len)?;
    resolved.get(start..end)
}

/// Locate where to cut the resolved stream. Returns `(start_cut, length)`;
/// a length of zero means the track was unresolvable. If the radial search
/// fails the predicted length is returned with a cut at zero.
pub fn locate_cut(
    resolved: &[u8],
    adjusted_map: &[AdjustedSegment],
    longest: Option<LongestMatch>,
    track_length: usize,
    track_shrink: isize,
    tolerance: usize,
    tuning: &Tuning,
) -> (usize, usize) {
    if resolved.is_empty() {
        return (0, 0);
    }
    let prediction = track_length;
    let window = tuning.cut_window;
    let max_radius =
        (track_shrink + (tuning.cut_radius_factor * tolerance) as isize).max(0) as usize;
    let max_center =
        resolved.len() as isize - window as isize - max_radius as isize - tuning.long_sync_offset as isize;

    let longest = longest.unwrap_or(LongestMatch {
        length: 0,
        out_start: 0,
        out_end: 0,
    });

    let mut search_start: usize;
    let mut search_center: isize;
    let mut found_suitable = false;

    if ((longest.out_start + prediction) as isize) < max_center {
        // Start inside the longest match; there is room past the prediction
        // to find the end of the track.
        search_start = longest.out_start + tuning.long_sync_offset;
        search_center = (search_start + prediction) as isize;
        found_suitable = true;
    }
    else if (longest.out_end as isize) < max_center
        && longest.out_end as isize - prediction as isize - window as isize - max_radius as isize
            > 0
    {
        // End inside the longest match instead.
        search_center = (longest.out_end + tuning.long_sync_offset) as isize;
        search_start = (search_center - prediction as isize) as usize;
        found_suitable = true;
    }
    else {
        search_start = 0;
        search_center = 0;
        // Neither anchor on the longest match works; take the biggest match
        // segment that still leaves room for the radial search.
        let mut best_match = 0;
        for segment in adjusted_map {
            let length = segment.out_end - segment.out_start;
            if segment.is_match
                && length > window + 24
                && (!found_suitable || length > best_match)
                && ((segment.out_start + tuning.long_sync_offset + prediction) as isize)
                    < max_center
            {
                search_start = segment.out_start + tuning.long_sync_offset;
                search_center = (search_start + prediction) as isize;
                found_suitable = true;
                best_match = length;
            }
        }
    }

    if !found_suitable {
        // Desperate: find the first window-sized stretch clear of zero runs.
        let mut start = 0usize;
        let mut escaped_zeros = false;
        let scan_stop = resolved.len() as isize
            - prediction as isize
            - window as isize
            - max_radius as isize;
        while (start as isize) < scan_stop {
            match find_bits(resolved, &[0, 0, 0], start, start + window + 6) {
                Some(next) => {
                    start = next + 3;
                }
                None => {
                    escaped_zeros = true;
                    break;
                }
            }
        }
        if escaped_zeros {
            search_start = start + tuning.long_sync_offset;
            search_center = (search_start + prediction) as isize;
        }
        else {
            search_start = 0;
            search_center = prediction as isize;
        }
    }

    let Some(search_bits) = window_at(resolved, search_start as isize, window) else {
        return (0, prediction);
    };

    // The segments between the anchor and the prediction may have shrunk or
    // grown during resolution; walk the adjusted map and shift the center
    // accordingly.
    let start_counting = search_start.min(search_center.max(0) as usize);
    let stop_counting = search_start.max(search_center.max(0) as usize);
    let mut last_track_length =
        adjusted_map[0].dst_start as isize - adjusted_map[0].src_start as isize;
    let mut adjustment = 0isize;
    for segment in adjusted_map {
        if stop_counting < segment.out_start {
            break;
        }
        if start_counting < segment.out_end && stop_counting > segment.out_start {
            let region_shrunk = (segment.src_end as isize - segment.src_start as isize)
                - (segment.out_end as isize - segment.out_start as isize);
            let track_expanded =
                (segment.dst_start as isize - segment.src_start as isize) - last_track_length;
            adjustment += track_expanded - region_shrunk;
        }
        last_track_length = segment.dst_start as isize - segment.src_start as isize;
    }
    if (search_start as isize) < search_center {
        search_center += adjustment;
    }
    else {
        search_center -= adjustment;
    }

    for radius in 0..max_radius as isize {
        if window_at(resolved, search_center + radius, window) == Some(search_bits) {
            let length = (search_start as isize - (search_center + radius)).unsigned_abs();
            let cut = if (search_start as isize) < search_center {
                search_start
            }
            else {
                (search_center + radius).max(0) as usize
            };
            return (cut, length);
        }
        if window_at(resolved, search_center - radius, window) == Some(search_bits) {
            let length = (search_start as isize - (search_center - radius)).unsigned_abs();
            let cut = if (search_start as isize) < search_center {
                search_start
            }
            else {
                (search_center - radius).max(0) as usize
            };
            return (cut, length);
        }
    }

    log::debug!(
        "locate_cut(): no window match around {}, falling back to predicted length {}",
        search_center,
        prediction
    );
    (0, prediction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::noise_bits;

    fn whole_track_map(len: usize, period: usize) -> Vec<AdjustedSegment> {
        vec![AdjustedSegment {
            out_start: 0,
            out_end: len,
            src_start: 0,
            src_end: len,
            dst_start: period,
            is_match: true,
        }]
    }

    #[test]
    fn empty_stream_cuts_to_nothing() {
        assert_eq!(
            locate_cut(&[], &[], None, 5_000, 0, 15, &Tuning::default()),
            (0, 0)
        );
    }

    #[test]
    fn periodic_stream_cuts_one_period() {
        let base = noise_bits(5_000, 0xdead_0001);
        let resolved: Vec<u8> = (0..12_000).map(|i| base[i % 5_000]).collect();
        let longest = Some(LongestMatch {
            length: 12_000,
            out_start: 0,
            out_end: 12_000,
        });
        let (cut, length) = locate_cut(
            &resolved,
            &whole_track_map(12_000, 5_000),
            longest,
            5_000,
            0,
            15,
            &Tuning::default(),
        );
        assert_eq!(length, 5_000);
        assert_eq!(cut, 12);
        assert_eq!(resolved[cut..cut + 100], resolved[cut + length..cut + length + 100]);
    }

    #[test]
    fn slipped_period_is_recovered_within_radius() {
        // One revolution is 40 bits shorter than predicted; still well inside
        // the radial search.
        let base = noise_bits(4_960, 0xdead_0002);
        let resolved: Vec<u8> = (0..12_000).map(|i| base[i % 4_960]).collect();
        let longest = Some(LongestMatch {
            length: 12_000,
            out_start: 0,
            out_end: 12_000,
        });
        let (cut, length) = locate_cut(
            &resolved,
            &whole_track_map(12_000, 5_000),
            longest,
            5_000,
            0,
            15,
            &Tuning::default(),
        );
        assert_eq!(length, 4_960);
        assert_eq!(cut, 12);
    }

    #[test]
    fn anchor_falls_back_to_a_mid_map_match() {
        // The longest match sits too deep in the stream to anchor either of
        // its ends, so the search anchors on the biggest usable map segment.
        let base = noise_bits(50_000, 0xdead_0004);
        let resolved: Vec<u8> = (0..72_000).map(|i| base[i % 50_000]).collect();
        let map = vec![
            AdjustedSegment {
                out_start: 1_000,
                out_end: 17_000,
                src_start: 1_000,
                src_end: 17_000,
                dst_start: 51_000,
                is_match: true,
            },
            AdjustedSegment {
                out_start: 30_000,
                out_end: 49_000,
                src_start: 30_000,
                src_end: 49_000,
                dst_start: 80_000,
                is_match: true,
            },
        ];
        let longest = Some(LongestMatch {
            length: 19_000,
            out_start: 30_000,
            out_end: 49_000,
        });
        let (cut, length) =
            locate_cut(&resolved, &map, longest, 50_000, 0, 15, &Tuning::default());
        assert_eq!(length, 50_000);
        assert_eq!(cut, 1_012);
    }

    #[test]
    fn unlocatable_cut_falls_back_to_prediction() {
        let resolved = noise_bits(12_000, 0xdead_0003);
        let longest = Some(LongestMatch {
            length: 12_000,
            out_start: 0,
            out_end: 12_000,
        });
        let (cut, length) = locate_cut(
            &resolved,
            &whole_track_map(12_000, 5_000),
            longest,
            5_000,
            0,
            15,
            &Tuning::default(),
        );
        assert_eq!((cut, length), (0, 5_000));
    }
}

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

    src/matcher.rs

    Revolution matching. A fixed window slides over the source bits and every
    exact occurrence in the target is recorded; abutting occurrences at the
    same distance coalesce into long matches. Voting over match distances
    weighted by match length elects the track length (intratrack) or the sync
    advance (intertrack).
*/

use std::{
    cmp::Reverse,
    collections::{BTreeMap, BTreeSet},
};

use crate::{bits::find_bits, config::Tuning, REQUIRED_MATCH, TRACK_MAXIMUM, TRACK_MINIMUM};

/// An exact repeat: `source[src_start..src_end] == target[dst_start..dst_end]`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PatternMatch {
    pub length: usize,
    /// `dst_start - src_start`. Always positive intratrack; intertrack it can
    /// be negative when the second read leads the first.
    pub distance: isize,
    pub src_start: usize,
    pub src_end: usize,
    pub dst_start: usize,
    pub dst_end: usize,
}

/// Matches keyed by the source bit where they end, so a later window can
/// find the match it extends in O(log n).
pub type OccurrenceMap = BTreeMap<usize, Vec<PatternMatch>>;

/// Slide a window over `source` and record every exact occurrence in
/// `target`. `target == None` matches a track against itself; the search
/// then starts a full minimum track length past the window so a window
/// never "finds" itself.
pub fn find_occurrences(source: &[u8], target: Option<&[u8]>, tuning: &Tuning) -> OccurrenceMap {
    let window = tuning.coarse_window;
    let intratrack = target.is_none();
    let target = target.unwrap_or(source);

    let end_margin = if intratrack {
        window + TRACK_MINIMUM
    }
    else {
        window
    };
    // Cross-track sync matches are naturally shorter than in-track repeats,
    // so they get a looser minimum.
    let minimum = if intratrack {
        tuning.coarse_minimum
    }
    else {
        REQUIRED_MATCH
    };
    let source_stop = source.len().saturating_sub(end_margin);

    let mut live: OccurrenceMap = BTreeMap::new();
    let mut finished: Vec<PatternMatch> = Vec::new();

    let mut start_bit = 0;
    while start_bit < source_stop {
        let window_end = start_bit + window;
        let pattern = &source[start_bit..window_end];

        let mut occurrences: Vec<usize> = Vec::new();
        let mut search = if intratrack { start_bit + TRACK_MINIMUM } else { 0 };
        while let Some(found) = find_bits(target, pattern, search, target.len()) {
            occurrences.push(found);
            search = found + window;
        }

        // Matches ending exactly where this window begins are candidates for
        // extension by one more window.
        for mut candidate in live.remove(&start_bit).unwrap_or_default() {
            if let Some(pos) = occurrences.iter().position(|o| *o == candidate.dst_end) {
                occurrences.remove(pos);
                candidate.length += window;
                candidate.src_end = window_end;
                candidate.dst_end += window;
                live.entry(window_end).or_default().push(candidate);
            }
            else if candidate.length >= minimum {
                finished.push(candidate);
            }
        }

        for occurrence in occurrences {
            live.entry(window_end).or_default().push(PatternMatch {
                length: window,
                distance: occurrence as isize - start_bit as isize,
                src_start: start_bit,
                src_end: window_end,
                dst_start: occurrence,
                dst_end: occurrence + window,
            });
        }

        start_bit += window;
    }

    let mut out: OccurrenceMap = BTreeMap::new();
    for candidate in finished {
        out.entry(candidate.src_end).or_default().push(candidate);
    }
    for (src_end, candidates) in live {
        for candidate in candidates {
            if candidate.length >= minimum {
                out.entry(src_end).or_default().push(candidate);
            }
        }
    }
    out
}

/// Elect the winning distance: highest total matched length, smallest
/// distance on a tie. Distances past a plausible track length are folded in
/// half; they are double-revolution repeats.
fn elect_distance(votes: &BTreeMap<isize, usize>) -> isize {
    let mut winner = 0isize;
    let mut best = 0usize;
    for (distance, total) in votes {
        if *total > best {
            best = *total;
            winner = *distance;
        }
    }
    if winner > TRACK_MAXIMUM as isize {
        winner /= 2;
    }
    winner
}

/// Coarse scan: find coalesced matches and elect the dominant distance.
/// Returns the matches sorted longest-first and the elected distance, which
/// is the track length intratrack or the sync advance intertrack.
pub fn find_patterns(
    source: &[u8],
    target: Option<&[u8]>,
    tuning: &Tuning,
) -> (Vec<PatternMatch>, isize) {
    let occurrences = find_occurrences(source, target, tuning);

    let mut votes: BTreeMap<isize, usize> = BTreeMap::new();
    let mut patterns: Vec<PatternMatch> = Vec::new();
    for candidates in occurrences.values() {
        for pattern in candidates {
            *votes.entry(pattern.distance).or_default() += pattern.length;
            patterns.push(*pattern);
        }
    }

    let winner = elect_distance(&votes);
    patterns.sort_by_key(|p| Reverse(p.length));
    log::debug!(
        "find_patterns(): {} patterns, elected distance {}",
        patterns.len(),
        winner
    );
    (patterns, winner)
}

/// Maximized scan: take the coarse occurrences and push each match outward
/// bit by bit, accepting shorter matches than the coarse pass would. Slower
/// and greedier; useful when the coarse scan leaves most of a track unmatched.
pub fn find_patterns_maximized(
    source: &[u8],
    target: Option<&[u8]>,
    tuning: &Tuning,
) -> (Vec<PatternMatch>, isize) {
    let occurrences = find_occurrences(source, target, tuning);
    let target = target.unwrap_or(source);

    let mut votes: BTreeMap<isize, usize> = BTreeMap::new();
    let mut by_distance: BTreeMap<isize, Vec<PatternMatch>> = BTreeMap::new();
    let mut expanded: BTreeSet<(usize, usize)> = BTreeSet::new();
    let mut patterns: Vec<PatternMatch> = Vec::new();

    for candidates in occurrences.values() {
        let mut candidates = candidates.clone();
        candidates.sort_by_key(|p| (p.length, p.distance));

        'candidate: for mut pattern in candidates {
            if let Some(kept) = by_distance.get(&pattern.distance) {
                for check in kept {
                    if check.src_start <= pattern.src_start && check.src_end >= pattern.src_end {
                        continue 'candidate;
                    }
                }
            }

            // Expand backward in halving strides, comparing each stride in
            // full so every accepted bit is verified identical.
            let mut expand = 0usize;
            let mut pace = tuning.expand_back_pace;
            loop {
                let probe = expand + pace;
                if probe > pattern.src_start || probe > pattern.dst_start {
                    if pace == 1 {
                        break;
                    }
                    pace /= 2;
                    continue;
                }
                if source[pattern.src_start - probe..pattern.src_start - expand]
                    == target[pattern.dst_start - probe..pattern.dst_start - expand]
                {
                    expand = probe;
                }
                else if pace == 1 {
                    break;
                }
                else {
                    pace /= 2;
                }
            }
            if expand > 1 {
                pattern.src_start -= expand;
                pattern.dst_start -= expand;
                pattern.length += expand;
            }

            if !expanded.insert((pattern.src_start, pattern.dst_start)) {
                continue;
            }

            let mut expand = 0usize;
            let mut pace = tuning.expand_forward_pace;
            loop {
                let probe = expand + pace;
                if pattern.src_end + probe > source.len() || pattern.dst_end + probe > target.len()
                {
                    if pace == 1 {
                        break;
                    }
                    pace /= 2;
                    continue;
                }
                if source[pattern.src_end + expand..pattern.src_end + probe]
                    == target[pattern.dst_end + expand..pattern.dst_end + probe]
                {
                    expand = probe;
                }
                else if pace == 1 {
                    break;
                }
                else {
                    pace /= 2;
                }
            }
            if expand > 1 {
                pattern.src_end += expand;
                pattern.dst_end += expand;
                pattern.length += expand;
            }

            if pattern.length > tuning.maximized_minimum {
                *votes.entry(pattern.distance).or_default() += pattern.length;
                by_distance.entry(pattern.distance).or_default().push(pattern);
                patterns.push(pattern);
            }
        }
    }

    let winner = elect_distance(&votes);
    patterns.sort_by_key(|p| Reverse(p.length));
    log::debug!(
        "find_patterns_maximized(): {} patterns, elected distance {}",
        patterns.len(),
        winner
    );
    (patterns, winner)
}

/// Deterministic pseudo-random bits for tests; no flux structure needed.
#[cfg(test)]
pub(crate) fn noise_bits(len: usize, mut seed: u32) -> Vec<u8> {
    let mut bits = Vec::with_capacity(len);
    for _ in 0..len {
        seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        bits.push((seed >> 31) as u8);
    }
    bits
}

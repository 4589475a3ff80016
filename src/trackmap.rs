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

    src/trackmap.rs

    Track map assembly. Coalesced matches are reconciled into disjoint
    regions, then walked in order to produce an alternating match/gap map of
    the first revolution against the second. Where the capture is long enough
    to have read bits three times, check bits from the third read are located
    and attached.
*/

use crate::{config::Tuning, matcher::PatternMatch};

/// A reconciled match region. `src` is the first-revolution range, `dst` the
/// corresponding second-revolution range.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Region {
    pub src_start: usize,
    pub src_end: usize,
    pub dst_start: usize,
    pub dst_end: usize,
}

impl Region {
    pub fn distance(&self) -> isize {
        self.dst_start as isize - self.src_start as isize
    }

    pub fn len(&self) -> usize {
        self.src_end.saturating_sub(self.src_start)
    }

    pub fn is_empty(&self) -> bool {
        self.src_end <= self.src_start
    }
}

/// Third-read anchor for a match segment. `start..end` are the bounds of the
/// later read; `prior_start..prior_end` the bounds of the copy one track
/// earlier that it lines up with.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CheckBits {
    pub start: usize,
    pub end: usize,
    pub prior_start: usize,
    pub prior_end: usize,
}

/// Third-read anchor for a gap: the gap bits repeat starting at `base`, and
/// the repeated copy runs up to `end`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GapCheck {
    pub base: usize,
    pub end: usize,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MatchSegment {
    pub src_start: usize,
    pub src_end: usize,
    pub dst_start: usize,
    pub dst_end: usize,
    pub check: Option<CheckBits>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GapSegment {
    pub src_start: usize,
    pub src_end: usize,
    pub dst_start: usize,
    pub dst_end: usize,
    pub check: Option<GapCheck>,
}

impl GapSegment {
    pub fn src_len(&self) -> usize {
        self.src_end.saturating_sub(self.src_start)
    }

    pub fn dst_len(&self) -> usize {
        self.dst_end.saturating_sub(self.dst_start)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TrackMapSegment {
    Match(MatchSegment),
    Gap(GapSegment),
}

/// Reorder matches so that all matches sharing a track-distance delta from
/// the dominant one stay together, in the order the deltas first appear.
/// Input is expected longest-first; the dominant distance is the first
/// pattern's.
pub fn split_patterns_by_distance(patterns: &[PatternMatch]) -> Vec<PatternMatch> {
    let Some(first) = patterns.first() else {
        return Vec::new();
    };
    let canonical = first.distance;

    let mut groups: Vec<(isize, Vec<PatternMatch>)> = Vec::new();
    for pattern in patterns {
        let delta = (pattern.distance - canonical).abs();
        match groups.iter_mut().find(|(d, _)| *d == delta) {
            Some((_, group)) => group.push(*pattern),
            None => groups.push((delta, vec![*pattern])),
        }
    }
    groups.into_iter().flat_map(|(_, group)| group).collect()
}

/// Overlay matches longest-first into a set of disjoint regions covering the
/// first revolution. Later (shorter) matches are trimmed around what is
/// already kept; a shorter match whose track distance disagrees by more than
/// the slack with a region it abuts is discarded outright.
pub fn assemble_track_regions(patterns: &[PatternMatch], tuning: &Tuning) -> Vec<Region> {
    let mut regions: Vec<Region> = Vec::new();

    'pattern: for pattern in split_patterns_by_distance(patterns) {
        let mut candidate = Region {
            src_start: pattern.src_start,
            src_end: pattern.src_end,
            dst_start: pattern.dst_start,
            dst_end: pattern.dst_end,
        };

        for check in &regions {
            if candidate.src_start >= check.src_end || candidate.src_end < check.src_start {
                continue;
            }
            if candidate.src_start >= check.src_start && candidate.src_end <= check.src_end {
                continue 'pattern;
            }
            if (candidate.distance() - check.distance()).abs() > tuning.region_slack as isize {
                continue 'pattern;
            }
            if candidate.src_start < check.src_start {
                // Overlaps the head of an existing region; cut our tail back.
                let cut = candidate.src_end - check.src_start;
                candidate.src_end -= cut;
                candidate.dst_end -= cut;
            }
            else {
                // Overlaps the tail; move our head forward.
                let cut = check.src_end - candidate.src_start;
                candidate.src_start += cut;
                candidate.dst_start += cut;
            }
            // A short match can straddle two kept regions; keep trimming
            // against the rest.
        }

        if !candidate.is_empty() {
            regions.push(candidate);
        }
    }

    regions.sort_by_key(|r| r.src_start);
    regions
}

fn slices_equal(bits: &[u8], a: (isize, isize), b: (isize, isize)) -> bool {
    let len = bits.len() as isize;
    if a.0 < 0 || b.0 < 0 || a.1 > len || b.1 > len || a.1 < a.0 || (a.1 - a.0) != (b.1 - b.0) {
        return false;
    }
    bits[a.0 as usize..a.1 as usize] == bits[b.0 as usize..b.1 as usize]
}

/// Look back through the map for a match ending (or starting) about one
/// track before `region`; its bits are then a third read of the region. A
/// radial search lines the two copies up exactly, shrinking the region if
/// zeros at the edges refuse to sync. Returns None if nothing lines up.
fn find_check_bits(
    bits: &[u8],
    region: &Region,
    map: &[TrackMapSegment],
    track_length: usize,
    tolerance: usize,
    tuning: &Tuning,
) -> Option<CheckBits> {
    let track_length = track_length as isize;
    let tolerance_i = tolerance as isize;

    let mut c = [-1isize; 4];
    let mut found = false;
    for segment in map {
        let TrackMapSegment::Match(prior) = segment else {
            continue;
        };
        if ((region.src_end as isize - prior.src_end as isize) - track_length).abs() < tolerance_i {
            c[1] = region.src_end as isize;
            c[3] = prior.src_end as isize;
            found = true;
        }
        if ((region.src_start as isize - prior.src_start as isize) - track_length).abs()
            < tolerance_i
        {
            c[0] = region.src_start as isize;
            c[2] = prior.src_start as isize;
            found = true;
        }
        if found {
            if c[2] < 0 {
                // Found the end only; project the beginning back by the
                // prior match's extent.
                c[0] = c[1] - (prior.src_end as isize - prior.src_start as isize);
                c[2] = prior.src_start as isize;
            }
            else if c[1] < 0 {
                // Found the beginning only; project the end forward by the
                // region's extent.
                c[1] = region.src_end as isize;
                c[3] = c[2] + (region.src_end as isize - region.src_start as isize);
            }
            break;
        }
    }
    if !found {
        return None;
    }

    // The two copies cannot really differ in length; trust the shorter.
    let prior_length = c[3] - c[2];
    let current_length = c[1] - c[0];
    if prior_length > current_length {
        c[3] = c[2] + current_length;
    }
    else if prior_length < current_length {
        c[1] = c[0] + prior_length;
    }

    let max_radius = (tuning.check_radius_factor * tolerance) as isize;
    let mut synced = false;
    'shrink: for shrinkage in 0..tolerance as isize {
        for radius in 0..max_radius {
            if slices_equal(
                bits,
                (c[0] + shrinkage, c[1] - shrinkage),
                (c[2] + shrinkage + radius, c[3] - shrinkage + radius),
            ) {
                c[0] += shrinkage;
                c[1] -= shrinkage;
                c[2] += radius + shrinkage;
                c[3] += radius - shrinkage;
                synced = true;
                break 'shrink;
            }
            if slices_equal(
                bits,
                (c[0] + shrinkage, c[1] - shrinkage),
                (c[2] + shrinkage - radius, c[3] - shrinkage - radius),
            ) {
                c[0] += shrinkage;
                c[1] -= shrinkage;
                c[2] += shrinkage - radius;
                c[3] -= shrinkage + radius;
                synced = true;
                break 'shrink;
            }
        }
    }
    if !synced || c.iter().any(|v| *v < 0) {
        log::debug!("find_check_bits(): could not sync check bits for region {region:?}");
        return None;
    }

    Some(CheckBits {
        start: c[0] as usize,
        end: c[1] as usize,
        prior_start: c[2] as usize,
        prior_end: c[3] as usize,
    })
}

/// Walk the sorted regions and emit the alternating match/gap map of the
/// first revolution against the second. Regions whose track distance falls
/// outside the tolerance are ignored. The leading gap is anchored at
/// `(0, track_length)`; every first-revolution bit up to the final match is
/// covered by exactly one segment.
pub fn build_track_map(
    bits: &[u8],
    regions: &[Region],
    track_length: usize,
    tolerance: usize,
    use_check_bits: bool,
    tuning: &Tuning,
) -> Vec<TrackMapSegment> {
    let mut map: Vec<TrackMapSegment> = Vec::new();
    // (src cursor, dst cursor, prior check end)
    let mut index: (usize, usize, Option<usize>) = (0, track_length, None);

    for region in regions {
        if (region.distance() - track_length as isize).abs() >= tolerance as isize {
            log::trace!(
                "build_track_map(): region {region:?} distance off track length, skipping"
            );
            continue;
        }

        let check = if use_check_bits {
            find_check_bits(bits, region, &map, track_length, tolerance, tuning)
        }
        else {
            None
        };

        if region.src_start > index.0 {
            // Second-revolution matches can abut or overlap even when the
            // first revolution has a gap; clamp the dst range so the map
            // still accounts for every src bit.
            let dst_start = index.1;
            let dst_end = region.dst_start.max(index.1);
            let gap_check = match (index.2, check) {
                (Some(base), Some(cb)) => Some(GapCheck {
                    base,
                    end: cb.prior_start,
                }),
                _ => None,
            };
            map.push(TrackMapSegment::Gap(GapSegment {
                src_start: index.0,
                src_end: region.src_start,
                dst_start,
                dst_end,
                check: gap_check,
            }));
        }

        map.push(TrackMapSegment::Match(MatchSegment {
            src_start: region.src_start,
            src_end: region.src_end,
            dst_start: region.dst_start,
            dst_end: region.dst_end,
            check,
        }));
        index = (region.src_end, region.dst_end, check.map(|cb| cb.prior_end));
    }
    map
}

/// Squeeze gap edges into the adjoining matches wherever the streams (and
/// check bits, when present) already agree, so the resolver only sees bits
/// that are genuinely in dispute. Gaps that empty out in any stream are
/// dropped.
pub fn compress_gaps(map: &mut Vec<TrackMapSegment>, bits: &[u8]) {
    // Forward: push each match's tail into the gap that follows it.
    for i in 0..map.len().saturating_sub(1) {
        let (TrackMapSegment::Match(_), TrackMapSegment::Gap(gap)) = (map[i], map[i + 1]) else {
            continue;
        };
        let mut gap = gap;
        let mut pushed = 0;
        while gap.src_len() > 0 && gap.dst_len() > 0 {
            let bit = bits[gap.src_start];
            if bits[gap.dst_start] != bit {
                break;
            }
            if let Some(check) = &gap.check {
                if check.base >= bits.len() || bits[check.base] != bit {
                    break;
                }
            }
            gap.src_start += 1;
            gap.dst_start += 1;
            if let Some(check) = &mut gap.check {
                check.base += 1;
            }
            pushed += 1;
        }
        if pushed > 0 {
            if let TrackMapSegment::Match(m) = &mut map[i] {
                m.src_end += pushed;
                m.dst_end += pushed;
            }
            map[i + 1] = TrackMapSegment::Gap(gap);
        }
    }

    map.retain(|segment| match segment {
        TrackMapSegment::Gap(gap) => gap.src_len() > 0 && gap.dst_len() > 0,
        TrackMapSegment::Match(_) => true,
    });

    // Backward: pull each match's head into the gap that precedes it.
    for i in (1..map.len()).rev() {
        let (TrackMapSegment::Gap(gap), TrackMapSegment::Match(_)) = (map[i - 1], map[i]) else {
            continue;
        };
        let mut gap = gap;
        let mut pulled = 0;
        while gap.src_len() > 0 && gap.dst_len() > 0 {
            let bit = bits[gap.src_end - 1];
            if bits[gap.dst_end - 1] != bit {
                break;
            }
            if let Some(check) = &gap.check {
                let probe = check.base + (gap.src_end - 1 - gap.src_start);
                if probe >= bits.len() || bits[probe] != bit {
                    break;
                }
            }
            gap.src_end -= 1;
            gap.dst_end -= 1;
            pulled += 1;
        }
        if pulled > 0 {
            if let TrackMapSegment::Match(m) = &mut map[i] {
                m.src_start -= pulled;
                m.dst_start -= pulled;
            }
            map[i - 1] = TrackMapSegment::Gap(gap);
        }
    }

    map.retain(|segment| match segment {
        TrackMapSegment::Gap(gap) => gap.src_len() > 0 && gap.dst_len() > 0,
        TrackMapSegment::Match(_) => true,
    });
}

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

    src/resolver.rs

    Gap resolution. Matched segments are trusted verbatim; inside each gap
    the two revolutions are walked bit by bit and disagreements are settled
    by sync probes, zero-run awareness, and length pressure. The output is a
    single resolved bit stream plus a map of where each segment landed in it.
*/

use crate::{
    config::Tuning,
    stats::SurgeryStats,
    trackmap::{GapSegment, TrackMapSegment},
    zeros::ZeroSpan,
};

/// Where a map segment landed in the resolved output. `src`/`dst` are the
/// original first/second revolution bounds.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AdjustedSegment {
    pub out_start: usize,
    pub out_end: usize,
    pub src_start: usize,
    pub src_end: usize,
    pub dst_start: usize,
    pub is_match: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LongestMatch {
    pub length: usize,
    pub out_start: usize,
    pub out_end: usize,
}

#[derive(Clone, Debug)]
pub struct ResolveOutcome {
    pub resolved: Vec<u8>,
    pub adjusted_map: Vec<AdjustedSegment>,
    pub longest: Option<LongestMatch>,
    /// Net first-revolution bits removed (negative: added) during resolution.
    pub track_shrink: isize,
    pub surgery: SurgeryStats,
    pub gaps_resolved: usize,
}

#[derive(Copy, Clone, Debug)]
enum BitAction {
    Insert { bit: u8, target: usize },
    Delete { target: usize },
    Replace { bit: u8 },
}

/// Python-style clamped slice comparison: both ranges are clamped to the
/// buffer and compared by content.
fn clamped_eq(bits: &[u8], a: (usize, usize), b: (usize, usize)) -> bool {
    let clamp = |(s, e): (usize, usize)| {
        let s = s.min(bits.len());
        let e = e.max(s).min(bits.len());
        &bits[s..e]
    };
    clamp(a) == clamp(b)
}

fn in_any(streams: &[ZeroSpan], pos: usize) -> bool {
    streams.iter().any(|z| z.contains(pos))
}

/// Resolve one gap into output bits. `pressure` starts as the length
/// difference between the two streams; every insertion or deletion moves it
/// toward zero if the heuristics are doing their job.
#[allow(clippy::too_many_lines)]
fn resolve_gap(
    bits: &[u8],
    gap: &GapSegment,
    zero_streams: &[ZeroSpan],
    tuning: &Tuning,
    track_shrink: &mut isize,
    surgery: &mut SurgeryStats,
) -> Vec<u8> {
    let mut resolved = Vec::with_capacity(gap.src_len().max(gap.dst_len()));
    let mut pressure = gap.src_len() as isize - gap.dst_len() as isize;
    let mut index = [gap.src_start, gap.dst_start];
    let mut pending: Option<BitAction> = None;

    let sync_window = tuning.short_sync_window;
    let probe_off = tuning.long_sync_offset;
    let probe_window = tuning.long_sync_window;

    while index[0] < gap.src_end && index[1] < gap.dst_end {
        let in_zero_stream = in_any(zero_streams, index[0]) || in_any(zero_streams, index[1]);
        let sync_in_zero_stream = in_any(zero_streams, index[0] + probe_off)
            || in_any(zero_streams, index[1] + probe_off);

        let action = if let Some(action) = pending.take() {
            action
        }
        else if bits[index[0]] == bits[index[1]] {
            BitAction::Replace { bit: bits[index[0]] }
        }
        else {
            // Probe just ahead for a realignment a few bits away. Positive
            // means stream 2 is carrying extra bits.
            let mut short_sync = 0isize;
            if !in_zero_stream {
                for radius in 1..tuning.short_sync_radius {
                    if clamped_eq(
                        bits,
                        (index[0], index[0] + sync_window),
                        (index[1] + radius, index[1] + sync_window + radius),
                    ) {
                        short_sync = radius as isize;
                        break;
                    }
                    if clamped_eq(
                        bits,
                        (index[1], index[1] + sync_window),
                        (index[0] + radius, index[0] + sync_window + radius),
                    ) {
                        short_sync = -(radius as isize);
                    }
                }
            }

            // Probe further out, past the mismatch neighborhood, unless the
            // probe window sits in a zero run where it would mislead.
            let mut found_sync = false;
            let mut long_sync = 0isize;
            if !sync_in_zero_stream
                && index[0] + tuning.long_sync_guard < gap.src_end
                && index[1] + tuning.long_sync_guard < gap.dst_end
            {
                let check = (index[0] + probe_off, index[0] + probe_off + probe_window);
                for radius in 0..tuning.long_sync_radius {
                    if clamped_eq(
                        bits,
                        check,
                        (
                            index[1] + probe_off + radius,
                            index[1] + probe_off + probe_window + radius,
                        ),
                    ) {
                        found_sync = true;
                        long_sync = radius as isize;
                        break;
                    }
                    if clamped_eq(
                        bits,
                        check,
                        (
                            index[1] + probe_off - radius,
                            index[1] + probe_off + probe_window - radius,
                        ),
                    ) {
                        found_sync = true;
                        long_sync = -(radius as isize);
                        break;
                    }
                }
            }

            if in_zero_stream {
                // Inside a zero run nothing about this bit can be trusted;
                // lean on the long probe, then on pressure, then take a zero.
                if found_sync {
                    if long_sync == 0 {
                        BitAction::Replace { bit: 0 }
                    }
                    else if long_sync > 0 {
                        BitAction::Delete { target: 1 }
                    }
                    else {
                        BitAction::Delete { target: 0 }
                    }
                }
                else if bits[index[0]] == 1 && pressure > 0 {
                    BitAction::Delete { target: 0 }
                }
                else if bits[index[1]] == 1 && pressure < 0 {
                    BitAction::Delete { target: 1 }
                }
                else {
                    BitAction::Replace { bit: 0 }
                }
            }
            else {
                let mut chosen: Option<BitAction> = None;
                if short_sync != 0 {
                    // Zeros are timing sensitive; prefer fixing alignment by
                    // adding a zero before a mismatched 1, otherwise drop the
                    // surplus zero.
                    chosen = Some(if short_sync > 0 && bits[index[0]] == 1 {
                        BitAction::Insert { bit: 0, target: 0 }
                    }
                    else if short_sync < 0 && bits[index[1]] == 1 {
                        BitAction::Insert { bit: 0, target: 1 }
                    }
                    else if short_sync > 0 {
                        BitAction::Delete { target: 1 }
                    }
                    else {
                        BitAction::Delete { target: 0 }
                    });
                }
                if found_sync {
                    // A long-range verdict outranks the short one.
                    chosen = Some(if long_sync == 0 {
                        let a = &bits[index[0]..(index[0] + 2).min(bits.len())];
                        let b = &bits[index[1]..(index[1] + 2).min(bits.len())];
                        if (a == [0, 0] && b == [1, 1]) || (a == [1, 1] && b == [0, 0]) {
                            // A 11 occasionally reads back as 00; both length
                            // probes agree, so flip both bits to ones.
                            pending = Some(BitAction::Replace { bit: 1 });
                            BitAction::Replace { bit: 1 }
                        }
                        else {
                            BitAction::Replace { bit: bits[index[0]] }
                        }
                    }
                    else if long_sync > 0 {
                        BitAction::Delete { target: 1 }
                    }
                    else {
                        BitAction::Delete { target: 0 }
                    });
                }
                // With no sync signal at all, trust the first read.
                chosen.unwrap_or(BitAction::Replace { bit: bits[index[0]] })
            }
        };

        match action {
            BitAction::Insert { bit, target } => {
                resolved.push(bit);
                // The target stream re-reads its bit; only the other stream
                // advances.
                index[1 - target] += 1;
                pressure += if target == 0 { 1 } else { -1 };
                if target == 0 {
                    *track_shrink -= 1;
                }
                surgery.inserted += 1;
            }
            BitAction::Delete { target } => {
                index[target] += 2;
                index[1 - target] += 1;
                pressure += if target == 1 { 1 } else { -1 };
                if target == 0 {
                    *track_shrink += 1;
                }
                surgery.deleted += 1;
            }
            BitAction::Replace { bit } => {
                if bits[index[0]] != bits[index[1]] {
                    surgery.replaced += 1;
                }
                resolved.push(bit);
                index[0] += 1;
                index[1] += 1;
            }
        }
    }

    if index != [gap.src_end, gap.dst_end] {
        // Bits hanging off the end of the longer stream; drop them.
        let stream = if index[0] < gap.src_end { 0 } else { 1 };
        let end = if stream == 0 { gap.src_end } else { gap.dst_end };
        log::trace!(
            "resolve_gap(): {} dangling bits in stream {} ignored",
            end.saturating_sub(index[stream]),
            stream + 1
        );
    }
    resolved
}

/// Resolve a whole track map into one output bit stream. Matches contribute
/// their first-revolution bits verbatim; every gap is argued out bit by bit.
pub fn resolve_track_map(
    bits: &[u8],
    map: &[TrackMapSegment],
    zero_streams: &[ZeroSpan],
    track_length: usize,
    tuning: &Tuning,
) -> ResolveOutcome {
    let track_length = track_length as isize;
    let mut resolved: Vec<u8> = Vec::new();
    let mut adjusted_map: Vec<AdjustedSegment> = Vec::new();
    let mut longest: Option<LongestMatch> = None;
    let mut track_shrink = 0isize;
    let mut surgery = SurgeryStats::default();
    let mut gaps_resolved = 0;

    for segment in map {
        match segment {
            TrackMapSegment::Match(m) => {
                let length = m.src_end - m.src_start;
                if longest.map_or(true, |l| l.length < length) {
                    longest = Some(LongestMatch {
                        length,
                        out_start: resolved.len(),
                        out_end: resolved.len() + length,
                    });
                }
                adjusted_map.push(AdjustedSegment {
                    out_start: resolved.len(),
                    out_end: resolved.len() + length,
                    src_start: m.src_start,
                    src_end: m.src_end,
                    dst_start: m.dst_start,
                    is_match: true,
                });
                resolved.extend_from_slice(&bits[m.src_start..m.src_end]);
            }
            TrackMapSegment::Gap(gap) => {
                let prior_off =
                    ((gap.dst_start as isize - gap.src_start as isize) - track_length).abs();
                let next_off = ((gap.dst_end as isize - gap.src_end as isize) - track_length).abs();

                let gap_bits = if gap.src_len() == 0 {
                    // Surplus bits in stream 2 only. Keep them when the next
                    // match asserts the better track length; the prior match
                    // will have run short because these bits were skipped.
                    if prior_off > next_off {
                        track_shrink -= 1;
                        bits[gap.dst_start..gap.dst_end].to_vec()
                    }
                    else {
                        Vec::new()
                    }
                }
                else if gap.dst_len() == 0 {
                    // Surplus bits in stream 1 only; the guide stream, so
                    // dropping is the riskier move.
                    if prior_off < next_off {
                        bits[gap.src_start..gap.src_end].to_vec()
                    }
                    else {
                        track_shrink += 1;
                        Vec::new()
                    }
                }
                else {
                    gaps_resolved += 1;
                    resolve_gap(bits, gap, zero_streams, tuning, &mut track_shrink, &mut surgery)
                };

                adjusted_map.push(AdjustedSegment {
                    out_start: resolved.len(),
                    out_end: resolved.len() + gap_bits.len(),
                    src_start: gap.src_start,
                    src_end: gap.src_end,
                    dst_start: gap.dst_start,
                    is_match: false,
                });
                resolved.extend(gap_bits);
            }
        }
    }

    log::debug!(
        "resolve_track_map(): {} bits resolved, shrink {}, {} gaps",
        resolved.len(),
        track_shrink,
        gaps_resolved
    );
    ResolveOutcome {
        resolved,
        adjusted_map,
        longest,
        track_shrink,
        surgery,
        gaps_resolved,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trackmap::MatchSegment;

    fn gap(src: (usize, usize), dst: (usize, usize)) -> GapSegment {
        GapSegment {
            src_start: src.0,
            src_end: src.1,
            dst_start: dst.0,
            dst_end: dst.1,
            check: None,
        }
    }

    #[test]
    fn agreeing_gap_resolves_to_itself() {
        let pattern = [1u8, 0, 1, 1, 0, 1, 0, 0, 1, 1];
        let mut bits = vec![1u8; 300];
        bits[100..110].copy_from_slice(&pattern);
        bits[200..210].copy_from_slice(&pattern);
        let mut shrink = 0;
        let mut surgery = SurgeryStats::default();
        let out = resolve_gap(
            &bits,
            &gap((100, 110), (200, 210)),
            &[],
            &Tuning::default(),
            &mut shrink,
            &mut surgery,
        );
        assert_eq!(out, pattern);
        assert_eq!(shrink, 0);
        assert_eq!(surgery.inserted + surgery.deleted + surgery.replaced, 0);
    }

    #[test]
    fn double_dropout_is_flipped_back() {
        // Identical 50-bit streams except 11 read back as 00 in the first.
        let mut pattern = vec![0u8; 50];
        for (i, b) in pattern.iter_mut().enumerate() {
            *b = [1, 0, 1, 1, 0][i % 5];
        }
        pattern[12] = 1;
        pattern[13] = 0;
        pattern[14] = 1;
        let mut src = pattern.clone();
        let mut dst = pattern.clone();
        src[10] = 0;
        src[11] = 0;
        dst[10] = 1;
        dst[11] = 1;

        let mut bits = vec![0u8; 300];
        bits[100..150].copy_from_slice(&src);
        bits[200..250].copy_from_slice(&dst);
        let mut shrink = 0;
        let mut surgery = SurgeryStats::default();
        let out = resolve_gap(
            &bits,
            &gap((100, 150), (200, 250)),
            &[],
            &Tuning::default(),
            &mut shrink,
            &mut surgery,
        );
        assert_eq!(out.len(), 50);
        assert_eq!(&out[10..12], &[1, 1]);
        assert_eq!(&out[..10], &src[..10]);
        assert_eq!(&out[12..], &src[12..]);
        assert_eq!(surgery.replaced, 2);
        assert_eq!(shrink, 0);
    }

    #[test]
    fn zero_run_mismatch_takes_a_zero() {
        let mut bits = vec![0u8; 100];
        bits[42] = 1; // stream 1 sees a phantom 1 inside the run
        let streams = [ZeroSpan {
            kind: crate::zeros::SpanKind::Risky,
            start: 0,
            end: 100,
        }];
        let mut shrink = 0;
        let mut surgery = SurgeryStats::default();
        let out = resolve_gap(
            &bits,
            &gap((40, 44), (80, 84)),
            &streams,
            &Tuning::default(),
            &mut shrink,
            &mut surgery,
        );
        assert_eq!(out, vec![0, 0, 0, 0]);
        assert_eq!(surgery.replaced, 1);
    }

    #[test]
    fn zero_run_pressure_deletes_the_phantom_one() {
        let mut bits = vec![0u8; 100];
        bits[41] = 1;
        let streams = [ZeroSpan {
            kind: crate::zeros::SpanKind::Risky,
            start: 0,
            end: 100,
        }];
        let mut shrink = 0;
        let mut surgery = SurgeryStats::default();
        // Stream 1 has one more bit than stream 2: positive pressure.
        let out = resolve_gap(
            &bits,
            &gap((40, 43), (80, 82)),
            &streams,
            &Tuning::default(),
            &mut shrink,
            &mut surgery,
        );
        assert_eq!(out, vec![0]);
        assert_eq!(surgery.deleted, 1);
        assert_eq!(shrink, 1);
    }

    #[test]
    fn one_sided_gaps_keep_or_drop_by_track_length() {
        let mut bits = vec![0u8; 400];
        bits[210] = 1;
        bits[211] = 1;
        let map = vec![
            TrackMapSegment::Match(MatchSegment {
                src_start: 0,
                src_end: 10,
                dst_start: 200,
                dst_end: 210,
                check: None,
            }),
            // Stream 2 carries two extra bits; the next match restores the
            // canonical distance of 202, so they are kept.
            TrackMapSegment::Gap(gap((10, 10), (210, 212))),
            TrackMapSegment::Match(MatchSegment {
                src_start: 10,
                src_end: 20,
                dst_start: 212,
                dst_end: 222,
                check: None,
            }),
        ];
        let outcome = resolve_track_map(&bits, &map, &[], 202, &Tuning::default());
        assert_eq!(outcome.resolved.len(), 22);
        assert_eq!(&outcome.resolved[10..12], &[1, 1]);
        assert_eq!(outcome.track_shrink, -1);
        assert_eq!(outcome.longest.map(|l| l.length), Some(10));
    }

    #[test]
    fn resolution_is_deterministic() {
        let bits = crate::matcher::noise_bits(4_000, 0xc0ff_ee00);
        let map = vec![
            TrackMapSegment::Match(MatchSegment {
                src_start: 0,
                src_end: 500,
                dst_start: 2_000,
                dst_end: 2_500,
                check: None,
            }),
            TrackMapSegment::Gap(gap((500, 640), (2_500, 2_650))),
            TrackMapSegment::Match(MatchSegment {
                src_start: 640,
                src_end: 1_500,
                dst_start: 2_650,
                dst_end: 3_510,
                check: None,
            }),
        ];
        let a = resolve_track_map(&bits, &map, &[], 2_000, &Tuning::default());
        let b = resolve_track_map(&bits, &map, &[], 2_000, &Tuning::default());
        assert_eq!(a.resolved, b.resolved);
        assert_eq!(a.adjusted_map, b.adjusted_map);
        assert_eq!(a.track_shrink, b.track_shrink);
    }
}

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

    src/track.rs

    One quarter track of a capture and its analysis pipeline: pattern
    matching, gap resolution, cut location, nibblization and the sector
    layer, in that order.
*/

use crate::{
    config::AnalysisConfig,
    cut,
    matcher,
    nibbles::{self, NibbleStream},
    resolver,
    sector::{self, ConsolidatedTrack, RawSector},
    stats::AnalysisStats,
    trackmap,
    zeros,
    TRACK_MAXIMUM,
};

/// A quarter track. `bits` starts as the unpacked capture buffer; a track
/// that goes through gap resolution replaces it with the resolved track
/// repeated three times.
#[derive(Clone, Debug, Default)]
pub struct Track {
    pub quarter: usize,
    pub bits: Vec<u8>,
    pub tolerance: usize,
    /// Length of the longest intratrack match.
    pub match_best: usize,
    /// Elected intratrack distance.
    pub match_advance: isize,
    pub track_length: usize,
    pub track_start: usize,
    pub track_repeat: usize,
    /// Bits dropped off the front of the resolved stream by the cut.
    pub already_cut: usize,
    pub track_shrink: isize,
    pub shortcut: bool,
    pub nibble_stream: Option<NibbleStream>,
    pub sectors: Vec<RawSector>,
    pub consolidated: Option<ConsolidatedTrack>,
    /// Longest match against the previous processed track.
    pub sync_best: usize,
    /// Elected bit advance relative to the previous processed track.
    pub sync_advance: isize,
}

impl Track {
    pub fn new(quarter: usize, bits: Vec<u8>) -> Track {
        Track {
            quarter,
            bits,
            ..Track::default()
        }
    }

    /// Track number in drive head phases: quarter 4 is track 1.00.
    pub fn number(&self) -> f64 {
        self.quarter as f64 * 0.25
    }

    /// One canonical revolution of this track.
    pub fn track_bits(&self) -> &[u8] {
        let start = self.track_start.min(self.bits.len());
        let end = (self.track_start + self.track_length).min(self.bits.len());
        &self.bits[start..end]
    }

    /// Run the analysis pipeline over this track.
    pub fn process(&mut self, cfg: &AnalysisConfig, stats: &mut AnalysisStats) {
        let tuning = &cfg.tuning;
        self.tolerance = zeros::tolerance(&self.bits, tuning);

        let (patterns, advance) = if cfg.maximize_patterns {
            matcher::find_patterns_maximized(&self.bits, None, tuning)
        }
        else {
            matcher::find_patterns(&self.bits, None, tuning)
        };
        self.match_best = patterns.first().map(|p| p.length).unwrap_or(0);
        self.match_advance = advance;
        stats.tracks_processed += 1;

        if patterns.is_empty() || advance <= 0 {
            log::warn!(
                "process(): track {:5.2} has no repeating pattern, leaving it unresolved",
                self.number()
            );
            self.track_length = 0;
            return;
        }
        self.track_length = advance as usize;

        if self.match_best > TRACK_MAXIMUM {
            // The longest match spans more than a revolution: the two
            // revolutions agree and the track needs no surgery at all.
            let best = &patterns[0];
            self.track_length = best.distance.unsigned_abs();
            self.track_start = best.src_start;
            self.track_repeat = self.track_start + self.track_length;
            self.already_cut = 0;
            self.shortcut = true;
            stats.tracks_shortcut += 1;
            log::debug!(
                "process(): track {:5.2} zero-risk, length {} from bit {}",
                self.number(),
                self.track_length,
                self.track_start
            );
        }
        else if cfg.analyze_bits {
            self.resolve(cfg, stats, &patterns);
        }

        if cfg.analyze_nibbles && self.track_length > 0 {
            let stream = nibbles::nibblize(&self.bits, self.track_start, self.track_length);
            if cfg.analyze_sectors {
                let sectors = sector::locate_sectors(&stream.track_nibbles);
                stats.sectors_found += sectors.len();
                stats.sectors_valid += sectors
                    .iter()
                    .filter(|s| s.addr_checksum_ok && s.data_checksum_ok)
                    .count();
                let consolidated = sector::consolidate_sectors(&sectors, &stream.ends, cfg.skew);
                if consolidated.track_error {
                    stats.track_errors += 1;
                }
                log::debug!(
                    "process(): track {:5.2} has {} sector copies, errors: {}",
                    self.number(),
                    sectors.len(),
                    consolidated.track_error
                );
                self.sectors = sectors;
                self.consolidated = Some(consolidated);
            }
            self.nibble_stream = Some(stream);
        }
    }

    /// The risky path: build the match/gap map of the first revolution
    /// against the second, argue out every gap, and cut one canonical
    /// revolution out of the resolved stream.
    fn resolve(
        &mut self,
        cfg: &AnalysisConfig,
        stats: &mut AnalysisStats,
        patterns: &[matcher::PatternMatch],
    ) {
        let tuning = &cfg.tuning;
        let spans: Vec<zeros::ZeroSpan> = zeros::find_zero_spans(&self.bits, tuning)
            .into_iter()
            .filter(|span| span.kind == zeros::SpanKind::Risky)
            .collect();
        let ordered = trackmap::split_patterns_by_distance(patterns);
        let regions = trackmap::assemble_track_regions(&ordered, tuning);
        let mut map = trackmap::build_track_map(
            &self.bits,
            &regions,
            self.track_length,
            self.tolerance,
            cfg.use_check_bits,
            tuning,
        );
        if cfg.compress_gaps {
            trackmap::compress_gaps(&mut map, &self.bits);
        }

        let outcome =
            resolver::resolve_track_map(&self.bits, &map, &spans, self.track_length, tuning);
        stats.gaps_resolved += outcome.gaps_resolved;
        stats.absorb_surgery(outcome.surgery);
        self.track_shrink = outcome.track_shrink;

        let (already_cut, length) = cut::locate_cut(
            &outcome.resolved,
            &outcome.adjusted_map,
            outcome.longest,
            self.track_length,
            outcome.track_shrink,
            self.tolerance,
            tuning,
        );
        if length == 0 {
            log::warn!("resolve(): track {:5.2} did not resolve", self.number());
            self.track_length = 0;
            return;
        }
        let end = (already_cut + length).min(outcome.resolved.len());
        let canonical = &outcome.resolved[already_cut.min(end)..end];

        let mut tripled = Vec::with_capacity(canonical.len() * 3);
        for _ in 0..3 {
            tripled.extend_from_slice(canonical);
        }
        self.bits = tripled;
        self.track_start = 0;
        self.track_length = canonical.len();
        self.track_repeat = canonical.len();
        self.already_cut = already_cut;
    }
}

/// Build a capture buffer: one 50 000-bit revolution holding a single valid
/// sector amid aperiodic filler, repeated to fill the buffer. The filler
/// keeps the repeat distance unambiguous; only the revolution itself
/// repeats. Shared by pipeline tests.
#[cfg(test)]
pub(crate) fn capture_with_sector(sector_id: u8) -> Vec<u8> {
    use crate::{
        nibbles::push_nibble_bits,
        sector::{noise_nibbles, sector_field_nibbles},
        EDD_BUFFER_BITS,
    };

    let data: Vec<u8> = (0..256u32)
        .map(|i| ((i * 7 + sector_id as u32) % 251) as u8)
        .collect();
    let mut rev = Vec::new();
    for _ in 0..32 {
        push_nibble_bits(&mut rev, 0xff, 2);
    }
    for nibble in noise_nibbles(520, 0xedd0_0000 + sector_id as u32) {
        push_nibble_bits(&mut rev, nibble, 0);
    }
    for nibble in sector_field_nibbles(254, 0, sector_id, &data) {
        push_nibble_bits(&mut rev, nibble, 0);
    }
    let fill = (50_000 - rev.len()) / 8;
    for nibble in noise_nibbles(fill, 0x5eed_0000 + sector_id as u32) {
        push_nibble_bits(&mut rev, nibble, 0);
    }
    assert_eq!(rev.len(), 50_000);

    let mut bits = Vec::new();
    for _ in 0..3 {
        bits.extend_from_slice(&rev);
    }
    bits.truncate(EDD_BUFFER_BITS);
    bits
}

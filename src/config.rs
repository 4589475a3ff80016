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

    src/config.rs

    Analysis configuration. An immutable AnalysisConfig is handed to every
    pipeline stage; Tuning collects the empirically-derived heuristic
    constants so they can be overridden in one place.
*/

use bitflags::bitflags;

/// Head position granularity of the capture. EDD files always store one
/// buffer per quarter track; granularity selects which of them are analyzed.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, strum::Display)]
pub enum TrackGranularity {
    #[default]
    Whole,
    Half,
    Quarter,
}

impl TrackGranularity {
    /// True if the quarter-track buffer at `qt` should be analyzed.
    pub fn includes(&self, qt: usize) -> bool {
        match self {
            TrackGranularity::Whole => qt % 4 == 0,
            TrackGranularity::Half => qt % 2 == 0,
            TrackGranularity::Quarter => true,
        }
    }
}

/// Logical-to-physical sector mapping used when assembling `.dsk`/`.po`
/// track bytes.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, strum::Display)]
pub enum SkewTable {
    #[default]
    Dos33,
    ProDos,
    Cpm,
}

impl SkewTable {
    #[rustfmt::skip]
    pub fn physical(&self, logical: usize) -> usize {
        match self {
            SkewTable::Dos33 => [
                0x00, 0x0d, 0x0b, 0x09, 0x07, 0x05, 0x03, 0x01,
                0x0e, 0x0c, 0x0a, 0x08, 0x06, 0x04, 0x02, 0x0f,
            ][logical & 0x0f],
            SkewTable::ProDos => [
                0x00, 0x02, 0x04, 0x06, 0x08, 0x0a, 0x0c, 0x0e,
                0x01, 0x03, 0x05, 0x07, 0x09, 0x0b, 0x0d, 0x0f,
            ][logical & 0x0f],
            SkewTable::Cpm => [
                0x00, 0x0c, 0x08, 0x04, 0x0b, 0x07, 0x03, 0x0f,
                0x06, 0x02, 0x0e, 0x0a, 0x01, 0x0d, 0x09, 0x05,
            ][logical & 0x0f],
        }
    }
}

/// Cross-track group consolidation. When a within-group sync match exceeds a
/// full track length, one member's resolved result can be copied over the
/// whole group. Off by default; it can mask real per-read noise differences.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, strum::Display)]
pub enum ConsolidationStrategy {
    #[default]
    Off,
    CopyBest,
}

bitflags! {
    /// Image container formats to emit after analysis.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct OutputFormats: u8 {
        const DSK = 0b0000_0001;
        const PO  = 0b0000_0010;
        const NIB = 0b0000_0100;
        const V2D = 0b0000_1000;
        const FDI = 0b0001_0000;
    }
}

/// Heuristic tuning parameters. These are empirically-derived magic numbers,
/// not provable invariants; the defaults are the values the pipeline was
/// tuned with.
#[derive(Clone, Debug)]
pub struct Tuning {
    /// Bits trimmed from each edge of a reliable span adjacent to a zero run.
    pub zero_margin: usize,
    /// A 1 bit ends a zero run only if no "000" follows within this many bits.
    pub zero_escape_margin: usize,
    /// Sliding window size for the coarse pattern scan.
    pub coarse_window: usize,
    /// Coarse matches shorter than this are considered coincidental.
    pub coarse_minimum: usize,
    /// Maximized matches shorter than this are discarded.
    pub maximized_minimum: usize,
    /// Backward expansion starting pace for the maximized scan.
    pub expand_back_pace: usize,
    /// Forward expansion starting pace for the maximized scan.
    pub expand_forward_pace: usize,
    /// Tolerance is `count("000") / divisor + floor` bits.
    pub tolerance_divisor: usize,
    pub tolerance_floor: usize,
    /// Permitted track-distance slack between abutting match regions.
    pub region_slack: usize,
    /// Check-bit radial search extends to `factor * tolerance` bits.
    pub check_radius_factor: usize,
    /// Short-range sync shift lookahead, exclusive upper bound.
    pub short_sync_radius: usize,
    /// Bits compared per short-range sync probe.
    pub short_sync_window: usize,
    /// Long-range sync probe offset and width.
    pub long_sync_offset: usize,
    pub long_sync_window: usize,
    /// Long-range sync shift lookahead, exclusive upper bound.
    pub long_sync_radius: usize,
    /// Minimum bits remaining in both streams for a long-range sync probe.
    pub long_sync_guard: usize,
    /// Window size for the track-cut radial search.
    pub cut_window: usize,
    /// Cut search radius is `track_shrink + factor * tolerance`.
    pub cut_radius_factor: usize,
    /// A sync match below `1/factor` of the running average starts a new
    /// track group.
    pub group_break_factor: f64,
}

impl Default for Tuning {
    fn default() -> Tuning {
        Tuning {
            zero_margin: 10,
            zero_escape_margin: 25,
            coarse_window: 501,
            coarse_minimum: 1000,
            maximized_minimum: 768,
            expand_back_pace: 4096,
            expand_forward_pace: 20,
            tolerance_divisor: 75,
            tolerance_floor: 15,
            region_slack: 2,
            check_radius_factor: 3,
            short_sync_radius: 4,
            short_sync_window: 5,
            long_sync_offset: 12,
            long_sync_window: 12,
            long_sync_radius: 6,
            long_sync_guard: 30,
            cut_window: 1500,
            cut_radius_factor: 24,
            group_break_factor: 2.5,
        }
    }
}

/// Per-run analysis configuration. Built once, reconciled once, then passed
/// immutably into every stage.
#[derive(Clone, Debug)]
pub struct AnalysisConfig {
    pub granularity: TrackGranularity,
    /// Run the gap resolver (bit repair) on each track.
    pub analyze_bits: bool,
    /// Nibblize each resolved track.
    pub analyze_nibbles: bool,
    /// Scan nibbles for standard 13/16-sector structure.
    pub analyze_sectors: bool,
    /// Run the cross-track sync pass and group tracks.
    pub sync_tracks: bool,
    /// Use the maximized (expanding) pattern scan instead of the coarse one.
    pub maximize_patterns: bool,
    /// Squeeze gap edges into adjoining matches before resolution.
    pub compress_gaps: bool,
    /// Attempt third-revolution check-bit location during map building.
    pub use_check_bits: bool,
    pub consolidation: ConsolidationStrategy,
    pub skew: SkewTable,
    pub outputs: OutputFormats,
    pub write_protect: bool,
    pub tuning: Tuning,
}

impl Default for AnalysisConfig {
    fn default() -> AnalysisConfig {
        AnalysisConfig {
            granularity: TrackGranularity::Whole,
            analyze_bits: true,
            analyze_nibbles: true,
            analyze_sectors: true,
            sync_tracks: false,
            maximize_patterns: false,
            compress_gaps: false,
            use_check_bits: true,
            consolidation: ConsolidationStrategy::Off,
            skew: SkewTable::Dos33,
            outputs: OutputFormats::empty(),
            write_protect: false,
            tuning: Tuning::default(),
        }
    }
}

impl AnalysisConfig {
    /// Resolve conflicting settings in place. Requesting an output that needs
    /// an analysis pass force-enables that pass; nothing here aborts.
    pub fn reconcile(&mut self) {
        if self.outputs.intersects(OutputFormats::DSK | OutputFormats::PO) && !self.analyze_sectors {
            log::warn!("reconcile(): sector image output requested, enabling sector analysis");
            self.analyze_sectors = true;
        }
        if self.analyze_sectors && !self.analyze_nibbles {
            log::warn!("reconcile(): sector analysis requires nibble analysis, enabling it");
            self.analyze_nibbles = true;
        }
        if self.outputs.intersects(OutputFormats::NIB | OutputFormats::V2D) && !self.analyze_nibbles {
            log::warn!("reconcile(): nibble image output requested, enabling nibble analysis");
            self.analyze_nibbles = true;
        }
        if self.sync_tracks && matches!(self.granularity, TrackGranularity::Whole) {
            log::warn!("reconcile(): whole tracks are too far apart to sync, disabling sync pass");
            self.sync_tracks = false;
        }
        if self.consolidation != ConsolidationStrategy::Off && !self.sync_tracks {
            log::warn!("reconcile(): consolidation requires the sync pass, disabling consolidation");
            self.consolidation = ConsolidationStrategy::Off;
        }
    }
}

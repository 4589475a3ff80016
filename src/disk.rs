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

    src/disk.rs

    A whole EDD capture: loading, track-to-track sync grouping, optional
    group consolidation, per-track processing and the final rotation that
    lines neighboring tracks up for flux-level output.
*/

use std::io::Read;

use crate::{
    bits::BitSeq,
    config::{AnalysisConfig, ConsolidationStrategy},
    matcher,
    stats::AnalysisStats,
    track::Track,
    EddError,
    EDD_BUFFER_SIZE,
    EDD_TRACKS,
    TRACK_MAXIMUM,
};

/// Consecutive quarter tracks the head read as the same physical track.
#[derive(Clone, Debug, Default)]
pub struct TrackGroup {
    /// Indices into the disk's track list.
    pub members: Vec<usize>,
    /// Mean bit advance between consecutive members.
    pub advance_average: isize,
    /// Member whose results stand in for the whole group, when
    /// consolidation picked one.
    pub source: Option<usize>,
}

#[derive(Clone, Debug, Default)]
pub struct EddDisk {
    pub tracks: Vec<Track>,
    pub groups: Vec<TrackGroup>,
    pub stats: AnalysisStats,
}

impl EddDisk {
    /// Load an EDD capture: consecutive 16 KiB buffers, one per quarter
    /// track, unpacked to one byte per bit.
    pub fn load<R: Read>(mut reader: R) -> Result<EddDisk, EddError> {
        let mut tracks = Vec::new();
        let mut buf = vec![0u8; EDD_BUFFER_SIZE];
        loop {
            let mut filled = 0;
            while filled < EDD_BUFFER_SIZE {
                let n = reader.read(&mut buf[filled..])?;
                if n == 0 {
                    break;
                }
                filled += n;
            }
            if filled == 0 {
                break;
            }
            if filled < EDD_BUFFER_SIZE {
                log::warn!(
                    "load(): final buffer is short ({filled} of {EDD_BUFFER_SIZE} bytes)"
                );
            }
            if tracks.len() >= EDD_TRACKS {
                log::warn!("load(): capture has data past quarter track {EDD_TRACKS}, ignoring");
                break;
            }
            let quarter = tracks.len();
            tracks.push(Track::new(quarter, BitSeq::from_bytes(&buf[..filled]).0));
        }
        if tracks.is_empty() {
            return Err(EddError::EmptyCapture);
        }
        let mut stats = AnalysisStats::default();
        stats.tracks_loaded = tracks.len();
        log::debug!("load(): {} quarter tracks", tracks.len());
        Ok(EddDisk {
            tracks,
            groups: Vec::new(),
            stats,
        })
    }

    /// Run the whole analysis: sync neighboring raw captures into groups,
    /// optionally consolidate each group onto its best member, process every
    /// selected track, then rotate each canonical track so the groups line
    /// up bit-for-bit.
    pub fn analyze(&mut self, cfg: &AnalysisConfig) {
        let mut cfg = cfg.clone();
        cfg.reconcile();

        if cfg.sync_tracks {
            self.sync_tracks(&cfg);
        }
        if cfg.consolidation == ConsolidationStrategy::CopyBest {
            self.pick_group_sources();
        }

        // Members of a consolidated group other than the source are not
        // processed; the source's results are copied onto them afterward.
        let skip: std::collections::BTreeSet<usize> = self
            .groups
            .iter()
            .filter(|g| g.source.is_some())
            .flat_map(|g| {
                let source = g.source;
                g.members
                    .iter()
                    .copied()
                    .filter(move |m| Some(*m) != source)
            })
            .collect();

        let mut stats = std::mem::take(&mut self.stats);
        for (i, track) in self.tracks.iter_mut().enumerate() {
            if !cfg.granularity.includes(track.quarter) || skip.contains(&i) {
                continue;
            }
            track.process(&cfg, &mut stats);
        }
        self.stats = stats;

        self.copy_consolidated();
        if cfg.sync_tracks {
            self.align_groups();
        }
    }

    /// Compare each selected track's raw capture against the previous one.
    /// A long match means the head was still over the same physical track;
    /// a collapse of the match length closes the group.
    fn sync_tracks(&mut self, cfg: &AnalysisConfig) {
        let tuning = &cfg.tuning;
        let included: Vec<usize> = (0..self.tracks.len())
            .filter(|i| cfg.granularity.includes(self.tracks[*i].quarter))
            .collect();
        let Some(&first) = included.first() else {
            return;
        };

        let mut groups: Vec<TrackGroup> = Vec::new();
        let mut group = TrackGroup {
            members: vec![first],
            ..TrackGroup::default()
        };
        let mut disk_sum = 0usize;
        let mut disk_count = 0usize;
        // The running match average carries across group breaks.
        let mut match_sum = 0usize;
        let mut match_count = 0usize;
        let mut advance_sum = 0isize;
        let mut advance_count = 0isize;

        for pair in included.windows(2) {
            let (prev, cur) = (pair[0], pair[1]);
            let (patterns, advance) = matcher::find_patterns(
                &self.tracks[prev].bits,
                Some(&self.tracks[cur].bits),
                tuning,
            );
            let sync_best = patterns.first().map(|p| p.length).unwrap_or(0);
            self.tracks[cur].sync_best = sync_best;

            let match_average = if match_count > 0 { match_sum / match_count } else { 0 };
            if (sync_best as f64) * tuning.group_break_factor < match_average as f64 {
                log::debug!(
                    "sync_tracks(): track {:5.2} match {} fell below average {}, new group",
                    self.tracks[cur].number(),
                    sync_best,
                    match_average
                );
                self.tracks[cur].sync_advance = 0;
                group.advance_average = if advance_count > 0 {
                    advance_sum / advance_count
                }
                else {
                    0
                };
                groups.push(group);
                group = TrackGroup {
                    members: vec![cur],
                    ..TrackGroup::default()
                };
                advance_sum = 0;
                advance_count = 0;
            }
            else {
                self.tracks[cur].sync_advance = advance;
                match_sum += sync_best;
                match_count += 1;
                disk_sum += sync_best;
                disk_count += 1;
                advance_sum += advance;
                advance_count += 1;
                group.members.push(cur);
            }
        }
        group.advance_average = if advance_count > 0 {
            advance_sum / advance_count
        }
        else {
            0
        };
        groups.push(group);

        self.stats.sync_average = if disk_count > 0 { disk_sum / disk_count } else { 0 };
        self.stats.groups = groups.len();
        self.groups = groups;
    }

    /// Mark the best-synced member of each group as the one worth
    /// processing. Only members whose sync match covers more than a full
    /// revolution qualify.
    fn pick_group_sources(&mut self) {
        for group in &mut self.groups {
            let mut best = 0usize;
            for &member in &group.members {
                let sync_best = self.tracks[member].sync_best;
                if sync_best > TRACK_MAXIMUM && sync_best > best {
                    best = sync_best;
                    group.source = Some(member);
                }
            }
        }
    }

    /// Copy a consolidated group's source results onto its other members.
    fn copy_consolidated(&mut self) {
        for group in &self.groups {
            let Some(source) = group.source else {
                continue;
            };
            let original = self.tracks[source].clone();
            for &member in &group.members {
                if member == source {
                    continue;
                }
                let quarter = self.tracks[member].quarter;
                let sync_best = self.tracks[member].sync_best;
                let mut copy = original.clone();
                copy.quarter = quarter;
                copy.sync_best = sync_best;
                copy.sync_advance = 0;
                self.tracks[member] = copy;
            }
        }
    }

    /// Rotate each canonical track so consecutive tracks within a group
    /// start at the same flux position. The first member of a later group
    /// inherits the previous group's accumulated drift.
    fn align_groups(&mut self) {
        let mut current_offset = 0isize;
        let mut prior_members = 0isize;
        for group in &self.groups {
            for (j, &member) in group.members.iter().enumerate() {
                let track = &mut self.tracks[member];
                if track.track_length == 0 {
                    continue;
                }
                let advance = if j == 0 {
                    if member == 0 {
                        0
                    }
                    else {
                        group.advance_average * prior_members
                    }
                }
                else {
                    track.sync_advance
                };
                current_offset += advance - (track.already_cut + track.track_start) as isize;

                let length = track.track_length as isize;
                let mut offset = current_offset % length;
                if offset < 0 {
                    offset += length;
                }
                let offset = offset as usize;

                let canonical = track.track_bits();
                let mut rotated = Vec::with_capacity(canonical.len() * 3);
                rotated.extend_from_slice(&canonical[offset..]);
                rotated.extend_from_slice(&canonical[..offset]);
                let one = rotated.clone();
                rotated.extend_from_slice(&one);
                rotated.extend_from_slice(&one);
                track.bits = rotated;
                track.track_start = 0;
                track.track_repeat = track.track_length;
            }
            prior_members = group.members.len() as isize;
        }
    }
}

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

    src/stats.rs

    Aggregate counters accumulated across an analysis run.
*/

/// Counters accumulated over a whole-disk analysis. Purely informational;
/// nothing in the pipeline branches on these.
#[derive(Clone, Debug, Default)]
pub struct AnalysisStats {
    pub tracks_loaded: usize,
    pub tracks_processed: usize,
    /// Tracks resolved via the oversized-match shortcut, no gap repair needed.
    pub tracks_shortcut: usize,
    pub gaps_resolved: usize,
    pub bits_inserted: usize,
    pub bits_deleted: usize,
    pub bits_replaced: usize,
    pub sectors_found: usize,
    pub sectors_valid: usize,
    pub track_errors: usize,
    /// Mean within-group sync match length over the whole capture.
    pub sync_average: usize,
    pub groups: usize,
}

/// Bit-surgery counts for one resolved gap.
#[derive(Copy, Clone, Debug, Default)]
pub struct SurgeryStats {
    pub inserted: usize,
    pub deleted: usize,
    pub replaced: usize,
}

impl SurgeryStats {
    pub fn absorb(&mut self, other: SurgeryStats) {
        self.inserted += other.inserted;
        self.deleted += other.deleted;
        self.replaced += other.replaced;
    }
}

impl AnalysisStats {
    pub fn absorb_surgery(&mut self, surgery: SurgeryStats) {
        self.bits_inserted += surgery.inserted;
        self.bits_deleted += surgery.deleted;
        self.bits_replaced += surgery.replaced;
    }
}

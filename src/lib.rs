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

    src/lib.rs

    Crate root. Defines the eddfox error type, capture geometry constants,
    and re-exports the main track resolution entry points.
*/

pub mod bits;
pub mod config;
pub mod cut;
pub mod disk;
pub mod matcher;
pub mod nibbles;
pub mod resolver;
pub mod sector;
pub mod stats;
pub mod track;
pub mod trackmap;
pub mod writers;
pub mod zeros;

use thiserror::Error;

/// Size in bytes of one EDD capture buffer. The EDD card samples a little over
/// two revolutions of raw flux per quarter track into a fixed-size buffer.
pub const EDD_BUFFER_SIZE: usize = 16384;
/// Size in bits of one EDD capture buffer.
pub const EDD_BUFFER_BITS: usize = EDD_BUFFER_SIZE * 8;

/// Upper bound on a plausible 5.25" track length in bits. A repeat distance
/// beyond this is assumed to span two revolutions.
pub const TRACK_MAXIMUM: usize = 52_500;
/// Lower bound on a plausible 5.25" track length in bits. Pattern searches
/// skip ahead by this much before looking for a recurrence.
pub const TRACK_MINIMUM: usize = 48_500;
/// Minimum pattern recurrence length considered significant when voting on
/// a track length.
pub const REQUIRED_MATCH: usize = 300;

/// Bytes per track in a .nib image.
pub const NIB_TRACK_SIZE: usize = 6656;
/// Bytes per track in a .dsk/.po sector image.
pub const DSK_TRACK_SIZE: usize = 4096;
/// Number of whole tracks stored in .dsk/.nib images.
pub const DSK_TRACKS: usize = 35;
/// Number of quarter-track buffers in a full 35-track EDD capture.
pub const EDD_TRACKS: usize = 141;

#[derive(Debug, Error)]
pub enum EddError {
    #[error("An IO error occurred reading or writing an image: {0}")]
    IoError(String),
    #[error("The capture contained no track buffers")]
    EmptyCapture,
    #[error("Invalid parameters were specified to a library function: {0}")]
    ParameterError(String),
}

impl From<std::io::Error> for EddError {
    fn from(e: std::io::Error) -> Self {
        EddError::IoError(e.to_string())
    }
}

impl From<binrw::Error> for EddError {
    fn from(e: binrw::Error) -> Self {
        EddError::IoError(e.to_string())
    }
}

pub use bits::BitSeq;
pub use config::{AnalysisConfig, ConsolidationStrategy, OutputFormats, SkewTable, TrackGranularity, Tuning};
pub use disk::EddDisk;
pub use stats::AnalysisStats;
pub use track::Track;

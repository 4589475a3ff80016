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

    src/writers/mod.rs

    Output serializers. Each writer takes an analyzed disk and serializes
    one image format to a stream.
*/

pub mod dsk;
pub mod fdi;
pub mod nib;
pub mod v2d;

pub use dsk::{write_dsk, write_po};
pub use fdi::write_fdi;
pub use nib::write_nib;
pub use v2d::write_v2d;

use crate::{disk::EddDisk, track::Track};

/// Creator string stamped into formats that carry one.
pub const CREATOR: &str = concat!("eddfox, version ", env!("CARGO_PKG_VERSION"));

/// The track sitting at a whole-track position, if it was captured.
pub(crate) fn whole_track(disk: &EddDisk, number: usize) -> Option<&Track> {
    disk.tracks.iter().find(|t| t.quarter == number * 4)
}

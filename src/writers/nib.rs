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

    src/writers/nib.rs

    .nib images: 35 whole tracks of 6656 nibbles each.
*/

use std::io::Write;

use crate::{disk::EddDisk, writers::whole_track, EddError, DSK_TRACKS, NIB_TRACK_SIZE};

/// Write a .nib image. Each whole track contributes its doubled nibble
/// stream; short or missing tracks are zero padded.
pub fn write_nib<W: Write>(disk: &EddDisk, out: &mut W) -> Result<(), EddError> {
    for number in 0..DSK_TRACKS {
        let mut nibbles = whole_track(disk, number)
            .and_then(|t| t.nibble_stream.as_ref())
            .map(|s| s.nib_nibbles.clone())
            .unwrap_or_default();
        nibbles.resize(NIB_TRACK_SIZE, 0);
        out.write_all(&nibbles)?;
    }
    Ok(())
}

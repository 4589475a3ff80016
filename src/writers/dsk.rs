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

    src/writers/dsk.rs

    .dsk and .po sector images: 35 whole tracks of 16 sectors in logical
    order. .po re-consolidates each track under the ProDOS skew.
*/

use std::io::Write;

use crate::{
    config::SkewTable,
    disk::EddDisk,
    sector,
    writers::whole_track,
    EddError,
    DSK_TRACKS,
    DSK_TRACK_SIZE,
};

/// Write a DOS-order sector image from each whole track's consolidation.
/// Tracks with nothing decodable come out as zeros.
pub fn write_dsk<W: Write>(disk: &EddDisk, out: &mut W) -> Result<(), EddError> {
    for number in 0..DSK_TRACKS {
        let bytes = whole_track(disk, number)
            .and_then(|t| t.consolidated.as_ref())
            .map(|c| c.dsk_bytes.as_slice());
        match bytes {
            Some(bytes) if bytes.len() == DSK_TRACK_SIZE => out.write_all(bytes)?,
            _ => out.write_all(&[0u8; DSK_TRACK_SIZE])?,
        }
    }
    Ok(())
}

/// Write a ProDOS-order sector image. Consolidation is pure, so each track
/// is simply consolidated again with the ProDOS skew.
pub fn write_po<W: Write>(disk: &EddDisk, out: &mut W) -> Result<(), EddError> {
    for number in 0..DSK_TRACKS {
        let consolidated = whole_track(disk, number).and_then(|t| {
            let stream = t.nibble_stream.as_ref()?;
            Some(sector::consolidate_sectors(
                &t.sectors,
                &stream.ends,
                SkewTable::ProDos,
            ))
        });
        match consolidated {
            Some(c) if c.dsk_bytes.len() == DSK_TRACK_SIZE => out.write_all(&c.dsk_bytes)?,
            _ => out.write_all(&[0u8; DSK_TRACK_SIZE])?,
        }
    }
    Ok(())
}

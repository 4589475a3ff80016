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

    src/writers/v2d.rs

    .v2d/D5NI images: variable-length nibble tracks at whole and half track
    positions, each tagged with its quarter-track index.
*/

use std::io::{Seek, Write};

use binrw::{binrw, BinWrite};

use crate::{disk::EddDisk, EddError};

#[binrw]
#[brw(big, magic = b"D5NI")]
struct V2dHeader {
    track_count: u16,
}

#[binrw]
#[brw(big)]
struct V2dTrackHeader {
    quarter: u16,
    nibble_count: u16,
}

/// Write a v2d image: every whole and half track with a nonempty nibble
/// stream, preceded by the total payload size.
pub fn write_v2d<W: Write + Seek>(disk: &EddDisk, out: &mut W) -> Result<(), EddError> {
    let mut entries: Vec<(u16, &[u8])> = Vec::new();
    for track in &disk.tracks {
        if track.quarter % 2 != 0 {
            continue;
        }
        let Some(stream) = &track.nibble_stream else {
            continue;
        };
        if stream.track_nibbles.is_empty() {
            continue;
        }
        entries.push((track.quarter as u16, &stream.track_nibbles));
    }

    let total: u32 = entries.iter().map(|(_, n)| 4 + n.len() as u32).sum();
    total.write_be(out)?;
    V2dHeader {
        track_count: entries.len() as u16,
    }
    .write(out)?;
    for (quarter, nibbles) in entries {
        V2dTrackHeader {
            quarter,
            nibble_count: nibbles.len() as u16,
        }
        .write(out)?;
        out.write_all(nibbles)?;
    }
    Ok(())
}

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

    src/writers/fdi.rs

    FDI v2.0 images: a 512-byte header with 180 track descriptor pairs,
    followed by page-aligned raw GCR bitstream tracks.
*/

use std::io::{Seek, Write};

use binrw::{binrw, BinWrite};

use crate::{
    bits::BitSeq,
    config::TrackGranularity,
    disk::EddDisk,
    writers::CREATOR,
    EddError,
    EDD_TRACKS,
};

const SIGNATURE: &[u8; 27] = b"Formatted Disk Image file\n\r";
const DESCRIPTOR_PAIRS: usize = 180;
/// Raw GCR bitstream track, page based.
const TRACK_TYPE_GCR: u8 = 0xd2;

#[binrw]
#[brw(big)]
struct FdiHeader {
    signature: [u8; 27],
    creator: [u8; 30],
    creator_end: [u8; 2],
    comment: [u8; 81],
    version: u16,
    last_track: u16,
    last_head: u8,
    disk_type: u8,
    rotation_speed: u8,
    flags: u8,
    tpi: u8,
    head_width: u8,
    reserved: u16,
}

impl FdiHeader {
    fn new(write_protect: bool) -> FdiHeader {
        let mut creator = [b' '; 30];
        let text = CREATOR.as_bytes();
        creator[..text.len().min(30)].copy_from_slice(&text[..text.len().min(30)]);
        FdiHeader {
            signature: *SIGNATURE,
            creator,
            creator_end: *b"\n\r",
            comment: [0x1a; 81],
            version: 0x0200,
            last_track: 0x009f,
            last_head: 0,
            // 5.25" disk, 300 rpm (speed byte is rpm - 128).
            disk_type: 1,
            rotation_speed: 0xac,
            flags: write_protect as u8,
            tpi: 5,
            head_width: 5,
            reserved: 0,
        }
    }
}

/// Write an FDI image at the given track granularity. Each captured track
/// contributes its canonical revolution as a page-aligned bitstream;
/// positions between emitted tracks are stuffed with empty descriptors so
/// descriptor slots always advance in quarter tracks.
pub fn write_fdi<W: Write + Seek>(
    disk: &EddDisk,
    granularity: TrackGranularity,
    write_protect: bool,
    out: &mut W,
) -> Result<(), EddError> {
    let (step, stuffing) = match granularity {
        TrackGranularity::Whole => (4, 3),
        TrackGranularity::Half => (2, 1),
        TrackGranularity::Quarter => (1, 0),
    };

    let mut pairs: Vec<[u8; 2]> = Vec::new();
    let mut blobs: Vec<Vec<u8>> = Vec::new();
    for quarter in (0..EDD_TRACKS).step_by(step) {
        if pairs.len() >= DESCRIPTOR_PAIRS {
            break;
        }
        let track = disk
            .tracks
            .iter()
            .find(|t| t.quarter == quarter && t.track_length > 0);
        match track {
            Some(track) => {
                let bits = track.track_bits();
                let packed = BitSeq::from_bits(bits.to_vec()).to_bytes();
                let pages = (8 + packed.len()).div_ceil(256);
                let mut blob = Vec::with_capacity(pages * 256);
                blob.extend_from_slice(&(bits.len() as u32).to_be_bytes());
                // Index pulse offset; the cut already put it at bit 0.
                blob.extend_from_slice(&0u32.to_be_bytes());
                blob.extend_from_slice(&packed);
                blob.resize(pages * 256, 0);
                pairs.push([TRACK_TYPE_GCR, pages as u8]);
                blobs.push(blob);
            }
            None => pairs.push([0, 0]),
        }
        for _ in 0..stuffing {
            pairs.push([0, 0]);
        }
    }
    pairs.truncate(DESCRIPTOR_PAIRS);
    pairs.resize(DESCRIPTOR_PAIRS, [0, 0]);

    FdiHeader::new(write_protect).write(out)?;
    for pair in &pairs {
        out.write_all(pair)?;
    }
    for blob in &blobs {
        out.write_all(blob)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::Track;
    use std::io::Cursor;

    fn resolved_track(quarter: usize, bits: Vec<u8>) -> Track {
        let mut track = Track::new(quarter, bits.clone());
        track.track_length = bits.len();
        track.track_repeat = bits.len();
        track
    }

    #[test]
    fn fdi_header_and_descriptors() {
        let mut bits = vec![1, 0, 1, 1, 0, 1, 0, 0];
        bits.extend(vec![0; 12]);
        let disk = EddDisk {
            tracks: vec![resolved_track(0, bits)],
            ..EddDisk::default()
        };

        let mut cursor = Cursor::new(Vec::new());
        write_fdi(&disk, TrackGranularity::Whole, true, &mut cursor).unwrap();
        let out = cursor.into_inner();

        assert_eq!(&out[..27], SIGNATURE);
        assert_eq!(&out[27..33], b"eddfox");
        assert_eq!(&out[57..59], b"\n\r");
        assert_eq!(out[59], 0x1a);
        // Version, last track, head, type, speed, flags, tpi.
        assert_eq!(&out[140..150], &[2, 0, 0, 0x9f, 0, 1, 0xac, 1, 5, 5]);
        assert_eq!(&out[150..152], &[0, 0]);

        // Track 0 descriptor, then three stuffed empty quarter slots.
        assert_eq!(&out[152..154], &[0xd2, 1]);
        assert_eq!(&out[154..160], &[0; 6]);
        assert_eq!(out.len(), 512 + 256);

        // 20 bits, index offset 0, then the packed stream.
        assert_eq!(&out[512..516], &20u32.to_be_bytes());
        assert_eq!(&out[516..520], &[0; 4]);
        assert_eq!(&out[520..523], &[0b1011_0100, 0, 0]);
    }

    #[test]
    fn empty_disk_still_writes_a_full_header() {
        let disk = EddDisk::default();
        let mut cursor = Cursor::new(Vec::new());
        write_fdi(&disk, TrackGranularity::Quarter, false, &mut cursor).unwrap();
        let out = cursor.into_inner();
        assert_eq!(out.len(), 512);
        assert!(out[152..].iter().all(|b| *b == 0));
    }
}

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

    tests/writers.rs

    Output format tests over an analyzed synthetic capture.
*/

mod common;

use common::*;
use eddfox::{
    writers::{write_dsk, write_fdi, write_nib, write_po, write_v2d},
    AnalysisConfig,
    EddDisk,
    TrackGranularity,
    DSK_TRACKS,
    DSK_TRACK_SIZE,
    NIB_TRACK_SIZE,
};
use std::io::Cursor;

fn analyzed_disk() -> (EddDisk, Vec<u8>) {
    let data = sector_payload(1);
    let bits = capture_bits(&revolution_with_sector(0, &data));
    let mut disk = EddDisk::load(Cursor::new(edd_bytes(&bits))).unwrap();
    disk.analyze(&AnalysisConfig::default());
    (disk, data)
}

#[test]
fn dsk_and_po_images() {
    init();
    let (disk, data) = analyzed_disk();

    let mut dsk = Vec::new();
    write_dsk(&disk, &mut dsk).unwrap();
    assert_eq!(dsk.len(), DSK_TRACKS * DSK_TRACK_SIZE);
    assert_eq!(&dsk[..256], &data[..]);

    // Sector 0 sits at logical 0 under both skews.
    let mut po = Vec::new();
    write_po(&disk, &mut po).unwrap();
    assert_eq!(po.len(), DSK_TRACKS * DSK_TRACK_SIZE);
    assert_eq!(&po[..256], &data[..]);
}

#[test]
fn nib_image() {
    init();
    let (disk, _) = analyzed_disk();

    let mut nib = Vec::new();
    write_nib(&disk, &mut nib).unwrap();
    assert_eq!(nib.len(), DSK_TRACKS * NIB_TRACK_SIZE);
    // Track 0 leads with the capture's sync run.
    assert_eq!(&nib[..4], &[0xff, 0xff, 0xff, 0xff]);
    // Track 1 was never captured.
    assert!(nib[NIB_TRACK_SIZE..2 * NIB_TRACK_SIZE].iter().all(|b| *b == 0));
}

#[test]
fn v2d_image() {
    init();
    let (disk, _) = analyzed_disk();

    let mut cursor = Cursor::new(Vec::new());
    write_v2d(&disk, &mut cursor).unwrap();
    let out = cursor.into_inner();

    assert_eq!(&out[4..8], b"D5NI");
    assert_eq!(&out[8..10], &1u16.to_be_bytes());
    let nibble_count = u16::from_be_bytes([out[12], out[13]]) as usize;
    assert_eq!(
        u32::from_be_bytes([out[0], out[1], out[2], out[3]]) as usize,
        4 + nibble_count
    );
    assert_eq!(out.len(), 14 + nibble_count);
}

#[test]
fn fdi_image() {
    init();
    let (disk, _) = analyzed_disk();

    let mut cursor = Cursor::new(Vec::new());
    write_fdi(&disk, TrackGranularity::Whole, false, &mut cursor).unwrap();
    let out = cursor.into_inner();

    assert_eq!(&out[..25], b"Formatted Disk Image file");
    // Track 0: 50 000 bits is 6250 bytes plus the 8-byte track header, 25 pages.
    assert_eq!(&out[152..154], &[0xd2, 25]);
    assert_eq!(out.len(), 512 + 25 * 256);
    assert_eq!(&out[512..516], &50_000u32.to_be_bytes());
}

#[test]
fn writers_are_deterministic() {
    init();
    let (first, _) = analyzed_disk();
    let (second, _) = analyzed_disk();

    let mut a = Vec::new();
    let mut b = Vec::new();
    write_dsk(&first, &mut a).unwrap();
    write_dsk(&second, &mut b).unwrap();
    assert_eq!(compute_slice_hash(&a), compute_slice_hash(&b));

    let mut a = Cursor::new(Vec::new());
    let mut b = Cursor::new(Vec::new());
    write_fdi(&first, TrackGranularity::Whole, false, &mut a).unwrap();
    write_fdi(&second, TrackGranularity::Whole, false, &mut b).unwrap();
    assert_eq!(
        compute_slice_hash(&a.into_inner()),
        compute_slice_hash(&b.into_inner())
    );
}

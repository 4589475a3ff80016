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

    tests/common/mod.rs

    Common support routines for tests: synthetic EDD captures and hashing.
*/
#![allow(dead_code)]

use eddfox::{nibbles::push_nibble_bits, sector::encode_62, BitSeq, EDD_BUFFER_BITS};

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn compute_slice_hash(slice: &[u8]) -> String {
    sha1_smol::Sha1::from(slice).digest().to_string()
}

fn encode_44(value: u8) -> [u8; 2] {
    [(value >> 1) | 0xaa, value | 0xaa]
}

/// The nibbles of one complete 6-and-2 sector: address field, gap, data
/// field.
pub fn sector_field_nibbles(volume: u8, track: u8, sector: u8, data: &[u8]) -> Vec<u8> {
    let mut nibbles = vec![0xd5, 0xaa, 0x96];
    nibbles.extend_from_slice(&encode_44(volume));
    nibbles.extend_from_slice(&encode_44(track));
    nibbles.extend_from_slice(&encode_44(sector));
    nibbles.extend_from_slice(&encode_44(volume ^ track ^ sector));
    nibbles.extend_from_slice(&[0xde, 0xaa, 0xeb]);
    nibbles.extend_from_slice(&[0xff; 5]);
    nibbles.extend_from_slice(&[0xd5, 0xaa, 0xad]);
    nibbles.extend_from_slice(&encode_62(data));
    nibbles.extend_from_slice(&[0xde, 0xaa, 0xeb]);
    nibbles
}

pub fn sector_payload(seed: u32) -> Vec<u8> {
    (0..256u32)
        .map(|i| ((i * 7 + seed) % 251) as u8)
        .collect()
}

/// Aperiodic gap filler: 6-and-2 encoded pseudo-random bytes. Scans as
/// ordinary nibbles but repeats only with the revolution itself, so the
/// repeat distance stays unambiguous.
pub fn noise_nibbles(count: usize, mut seed: u32) -> Vec<u8> {
    let mut nibbles = Vec::with_capacity(count + 343);
    while nibbles.len() < count {
        let block: Vec<u8> = (0..256)
            .map(|_| {
                seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (seed >> 24) as u8
            })
            .collect();
        nibbles.extend_from_slice(&encode_62(&block));
    }
    nibbles.truncate(count);
    nibbles
}

/// One 50 000-bit revolution carrying a single valid sector, well past the
/// 500-nibble double-find window.
pub fn revolution_with_sector(sector_id: u8, data: &[u8]) -> Vec<u8> {
    let mut rev = Vec::new();
    for _ in 0..32 {
        push_nibble_bits(&mut rev, 0xff, 2);
    }
    for nibble in noise_nibbles(520, 0xedd0_0000 + sector_id as u32) {
        push_nibble_bits(&mut rev, nibble, 0);
    }
    for nibble in sector_field_nibbles(254, 0, sector_id, data) {
        push_nibble_bits(&mut rev, nibble, 0);
    }
    let fill = (50_000 - rev.len()) / 8;
    for nibble in noise_nibbles(fill, 0x5eed_0000 + sector_id as u32) {
        push_nibble_bits(&mut rev, nibble, 0);
    }
    assert_eq!(rev.len(), 50_000);
    rev
}

/// One 50 000-bit revolution carrying all sixteen sectors of a DOS 3.3
/// track, each with a valid checksum.
pub fn full_track_revolution(volume: u8, track: u8) -> Vec<u8> {
    let mut rev = Vec::new();
    for id in 0..16u8 {
        for _ in 0..16 {
            push_nibble_bits(&mut rev, 0xff, 2);
        }
        for nibble in sector_field_nibbles(volume, track, id, &sector_payload(id as u32)) {
            push_nibble_bits(&mut rev, nibble, 0);
        }
    }
    let fill = (50_000 - rev.len()) / 8;
    for nibble in noise_nibbles(fill, 0xedd0_f1f1) {
        push_nibble_bits(&mut rev, nibble, 0);
    }
    assert_eq!(rev.len(), 50_000);
    rev
}

/// Fill one capture buffer's worth of bits with repeats of a revolution.
pub fn capture_bits(rev: &[u8]) -> Vec<u8> {
    let mut bits = Vec::new();
    while bits.len() < EDD_BUFFER_BITS {
        bits.extend_from_slice(rev);
    }
    bits.truncate(EDD_BUFFER_BITS);
    bits
}

/// Pack capture bits into the raw EDD byte stream `EddDisk::load` expects.
pub fn edd_bytes(bits: &[u8]) -> Vec<u8> {
    BitSeq::from_bits(bits.to_vec()).to_bytes()
}

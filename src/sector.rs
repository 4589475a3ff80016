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

    src/sector.rs

    GCR sector layer. Scans a nibblized track for address and data fields,
    decodes 6-and-2 (16 sector) and 5-and-3 (13 sector) payloads, and
    consolidates sector copies into logical-order track bytes.
*/

use std::collections::BTreeMap;

use crate::config::SkewTable;

/// 6-bit value to disk nibble, 16-sector format.
pub static WRITE_62: [u8; 64] = [
    0x96, 0x97, 0x9a, 0x9b, 0x9d, 0x9e, 0x9f, 0xa6, 0xa7, 0xab, 0xac, 0xad, 0xae, 0xaf, 0xb2,
    0xb3, 0xb4, 0xb5, 0xb6, 0xb7, 0xb9, 0xba, 0xbb, 0xbc, 0xbd, 0xbe, 0xbf, 0xcb, 0xcd, 0xce,
    0xcf, 0xd3, 0xd6, 0xd7, 0xd9, 0xda, 0xdb, 0xdc, 0xdd, 0xde, 0xdf, 0xe5, 0xe6, 0xe7, 0xe9,
    0xea, 0xeb, 0xec, 0xed, 0xee, 0xef, 0xf2, 0xf3, 0xf4, 0xf5, 0xf6, 0xf7, 0xf9, 0xfa, 0xfb,
    0xfc, 0xfd, 0xfe, 0xff,
];

/// 5-bit value to disk nibble, 13-sector format.
pub static WRITE_53: [u8; 32] = [
    0xab, 0xad, 0xae, 0xaf, 0xb5, 0xb6, 0xb7, 0xba, 0xbb, 0xbd, 0xbe, 0xbf, 0xd6, 0xd7, 0xda,
    0xdb, 0xdd, 0xde, 0xdf, 0xea, 0xeb, 0xed, 0xee, 0xef, 0xf5, 0xf6, 0xf7, 0xfa, 0xfb, 0xfd,
    0xfe, 0xff,
];

const fn invert<const N: usize>(table: &[u8; N]) -> [u8; 256] {
    let mut read = [0u8; 256];
    let mut i = 0;
    while i < N {
        read[table[i] as usize] = i as u8;
        i += 1;
    }
    read
}

/// Disk nibble back to its 6-bit value. Nibbles outside the table decode
/// to zero.
pub static READ_62: [u8; 256] = invert(&WRITE_62);
/// Disk nibble back to its 5-bit value.
pub static READ_53: [u8; 256] = invert(&WRITE_53);

pub const DATA_62_LEN: usize = 343;
pub const DATA_53_LEN: usize = 411;

/// Decode a 343-nibble 6-and-2 data field. Returns the 256 data bytes and
/// the checksum residue, which is zero for an intact field.
pub fn decode_62(encoded: &[u8]) -> (Vec<u8>, u8) {
    let mut checksum = 0u8;
    let mut chain = Vec::with_capacity(86);
    for &nibble in &encoded[..86] {
        checksum ^= READ_62[nibble as usize];
        chain.push(checksum);
    }
    let mut data = Vec::with_capacity(256);
    for &nibble in &encoded[86..342] {
        checksum ^= READ_62[nibble as usize];
        data.push(checksum << 2);
    }
    let residue = READ_62[encoded[342] as usize] ^ checksum;

    // The secondary buffer holds the low two bits of each byte, with the
    // chain read back in reverse.
    for (o, &lo) in chain.iter().enumerate() {
        data[o] += ((lo & 1) << 1) + ((lo & 2) >> 1);
        data[o + 86] += ((lo & 4) >> 1) + ((lo & 8) >> 3);
        if o < 84 {
            data[o + 172] += ((lo & 0x10) >> 3) + ((lo & 0x20) >> 5);
        }
    }
    (data, residue)
}

/// Inverse of [`decode_62`]: 256 data bytes to 343 disk nibbles.
pub fn encode_62(data: &[u8]) -> Vec<u8> {
    let mut lo = [0u8; 86];
    for (o, slot) in lo.iter_mut().enumerate() {
        let mut v = ((data[o] & 1) << 1) | ((data[o] & 2) >> 1);
        v |= ((data[o + 86] & 1) << 3) | ((data[o + 86] & 2) << 1);
        if o < 84 {
            v |= ((data[o + 172] & 1) << 5) | ((data[o + 172] & 2) << 3);
        }
        *slot = v;
    }
    let mut encoded = Vec::with_capacity(DATA_62_LEN);
    let mut prev = 0u8;
    for &v in &lo {
        encoded.push(WRITE_62[(v ^ prev) as usize]);
        prev = v;
    }
    for &byte in &data[..256] {
        encoded.push(WRITE_62[((byte >> 2) ^ prev) as usize]);
        prev = byte >> 2;
    }
    encoded.push(WRITE_62[prev as usize]);
    encoded
}

/// Decode a 411-nibble 5-and-3 data field.
pub fn decode_53(encoded: &[u8]) -> (Vec<u8>, u8) {
    let mut checksum = 0u8;
    let mut chain = Vec::with_capacity(154);
    for &nibble in &encoded[..154] {
        checksum ^= READ_53[nibble as usize];
        chain.push(checksum);
    }
    let mut secondary = [0u8; 154];
    for (i, slot) in secondary.iter_mut().enumerate() {
        *slot = chain[153 - i];
    }
    let mut data = Vec::with_capacity(256);
    for &nibble in &encoded[154..410] {
        checksum ^= READ_53[nibble as usize];
        data.push(checksum << 3);
    }
    let residue = READ_53[encoded[410] as usize] ^ checksum;

    // Three 51-entry bands carry the top three of the five low bits; the
    // remaining two bits of each band member fill bytes 3 and 4 of each
    // five-byte group.
    for o in 0..0x33 {
        let sec = [
            secondary[o],
            secondary[0x33 + o],
            secondary[2 * 0x33 + o],
        ];
        for (band, &s) in sec.iter().enumerate() {
            data[o * 5 + band] |= s >> 2;
        }
        data[o * 5 + 3] |= ((sec[0] & 2) << 1) | (sec[1] & 2) | ((sec[2] & 2) >> 1);
        data[o * 5 + 4] |= ((sec[0] & 1) << 2) | ((sec[1] & 1) << 1) | (sec[2] & 1);
    }
    data[255] |= secondary[153] & 7;
    (data, residue)
}

/// Inverse of [`decode_53`]: 256 data bytes to 411 disk nibbles.
pub fn encode_53(data: &[u8]) -> Vec<u8> {
    let mut secondary = [0u8; 154];
    for o in 0..0x33 {
        for band in 0..3 {
            secondary[band * 0x33 + o] = ((data[o * 5 + band] & 7) << 2)
                | (((data[o * 5 + 3] >> (2 - band)) & 1) << 1)
                | ((data[o * 5 + 4] >> (2 - band)) & 1);
        }
    }
    secondary[153] = data[255] & 7;

    let mut encoded = Vec::with_capacity(DATA_53_LEN);
    let mut prev = 0u8;
    for i in 0..154 {
        let v = secondary[153 - i];
        encoded.push(WRITE_53[(v ^ prev) as usize]);
        prev = v;
    }
    for &byte in &data[..256] {
        encoded.push(WRITE_53[((byte >> 3) ^ prev) as usize]);
        prev = byte >> 3;
    }
    encoded.push(WRITE_53[prev as usize]);
    encoded
}

/// A decoded sector address field.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SectorAddress {
    pub volume: u8,
    pub track: u8,
    pub sector: u8,
    pub checksum: u8,
}

/// One sector copy as found on the track. A data field with no preceding
/// address field is kept with `address` unset.
#[derive(Clone, Debug)]
pub struct RawSector {
    pub address: Option<SectorAddress>,
    pub dos32: bool,
    pub addr_checksum_ok: bool,
    pub addr_epilogue_ok: bool,
    pub addr_epilogue_perfect: bool,
    pub data: Vec<u8>,
    pub data_checksum_ok: bool,
    pub data_epilogue_ok: bool,
    /// Nibble index of the address mark, used to measure the bit distance
    /// between copies of the same sector.
    pub offset_index: usize,
    /// Nibbles between the end of the previous field and this one's mark.
    pub gap: usize,
}

fn decode_44(hi: u8, lo: u8) -> u8 {
    ((hi << 1) + 1) & lo
}

/// Scan a track's nibbles for sectors. The scan wraps a thousand nibbles
/// past the end of the track so a sector straddling the cut is found once,
/// and stops five hundred past it so nothing is found twice.
pub fn locate_sectors(track_nibbles: &[u8]) -> Vec<RawSector> {
    let mut scan = track_nibbles.to_vec();
    let wrap = track_nibbles.len().min(1000);
    scan.extend_from_slice(&track_nibbles[..wrap]);
    let stop_scan = (track_nibbles.len() + 500).min(scan.len());

    let mut sectors = Vec::new();
    let mut pending: Option<RawSector> = None;
    let mut offset = 0;
    let mut field_end = 0;
    while offset + 3 <= stop_scan {
        let mark = &scan[offset..offset + 3];
        if mark[0] == 0xd5 && mark[1] == 0xaa && (mark[2] == 0x96 || mark[2] == 0xb5) {
            if offset + 14 > scan.len() {
                break;
            }
            let dos32 = mark[2] == 0xb5;
            let volume = decode_44(scan[offset + 3], scan[offset + 4]);
            let track = decode_44(scan[offset + 5], scan[offset + 6]);
            let sector = decode_44(scan[offset + 7], scan[offset + 8]);
            let checksum = decode_44(scan[offset + 9], scan[offset + 10]);
            let epilogue = &scan[offset + 11..offset + 14];
            if let Some(orphan) = pending.take() {
                log::debug!(
                    "locate_sectors(): address field at {} with no data field",
                    orphan.offset_index
                );
                sectors.push(orphan);
            }
            pending = Some(RawSector {
                address: Some(SectorAddress {
                    volume,
                    track,
                    sector,
                    checksum,
                }),
                dos32,
                addr_checksum_ok: checksum == volume ^ track ^ sector,
                addr_epilogue_ok: epilogue[0] == 0xde && epilogue[1] == 0xaa,
                addr_epilogue_perfect: epilogue == [0xde, 0xaa, 0xeb],
                data: Vec::new(),
                data_checksum_ok: false,
                data_epilogue_ok: false,
                offset_index: offset,
                gap: offset - field_end,
            });
            offset += 14;
            field_end = offset;
        }
        else if mark == [0xd5, 0xaa, 0xad] {
            let mut sector = pending.take().unwrap_or(RawSector {
                address: None,
                dos32: false,
                addr_checksum_ok: false,
                addr_epilogue_ok: false,
                addr_epilogue_perfect: false,
                data: Vec::new(),
                data_checksum_ok: false,
                data_epilogue_ok: false,
                offset_index: offset,
                gap: offset - field_end,
            });
            let data_length = if sector.dos32 { DATA_53_LEN } else { DATA_62_LEN };
            if offset + 3 + data_length + 3 > scan.len() {
                // Truncated data field at the end of the scan.
                offset += 1;
                continue;
            }
            let encoded = &scan[offset + 3..offset + 3 + data_length];
            let (data, residue) = if sector.dos32 {
                decode_53(encoded)
            }
            else {
                decode_62(encoded)
            };
            let epilogue = &scan[offset + 3 + data_length..offset + 6 + data_length];
            sector.data = data;
            sector.data_checksum_ok = residue == 0;
            sector.data_epilogue_ok = epilogue[0] == 0xde && epilogue[1] == 0xaa;
            sectors.push(sector);
            offset += 6 + data_length;
            field_end = offset;
        }
        else {
            offset += 1;
        }
    }
    if let Some(orphan) = pending {
        log::debug!(
            "locate_sectors(): address field at {} with no data field",
            orphan.offset_index
        );
        sectors.push(orphan);
    }
    sectors
}

/// A track's sectors consolidated into logical order.
#[derive(Clone, Debug, Default)]
pub struct ConsolidatedTrack {
    /// 16 sectors of 256 bytes, logical order.
    pub dsk_bytes: Vec<u8>,
    pub track_error: bool,
    pub dos32_mode: bool,
    /// Track length in bits as measured between two copies of the same
    /// sector, when a plausible pair exists.
    pub sector_track_bits: Option<usize>,
    pub first_offset: usize,
}

/// Consolidate sector copies into a 4096-byte logical track. `ends` maps
/// nibble indices to absolute bit offsets for distance measurement.
pub fn consolidate_sectors(
    sectors: &[RawSector],
    ends: &[usize],
    skew: SkewTable,
) -> ConsolidatedTrack {
    let mut copies: BTreeMap<u8, Vec<&RawSector>> = BTreeMap::new();
    let mut consolidated = ConsolidatedTrack::default();

    for sector in sectors {
        let Some(address) = sector.address else {
            continue;
        };
        if !sector.addr_checksum_ok {
            continue;
        }
        if sector.dos32 {
            consolidated.dos32_mode = true;
        }
        if consolidated.first_offset == 0 {
            if let Some(&end) = ends.get(sector.offset_index) {
                consolidated.first_offset = end;
            }
        }
        copies.entry(address.sector).or_default().push(sector);
    }

    for group in copies.values() {
        for pair in group.windows(2) {
            let (Some(&a), Some(&b)) = (
                ends.get(pair[0].offset_index),
                ends.get(pair[1].offset_index),
            )
            else {
                continue;
            };
            let distance = b.saturating_sub(a);
            if distance > 50_000 && distance < 53_000 {
                let best = consolidated.sector_track_bits.unwrap_or(0);
                if distance > best {
                    consolidated.sector_track_bits = Some(distance);
                }
            }
        }
    }

    for logical in 0..16u8 {
        // 13-sector tracks carry no software skew.
        let physical = if consolidated.dos32_mode {
            logical
        }
        else {
            skew.physical(logical as usize) as u8
        };
        let group = copies.get(&physical);
        let chosen = group.and_then(|g| {
            g.iter()
                .take(2)
                .find(|c| c.data_checksum_ok && !c.data.is_empty())
        });
        match chosen {
            Some(copy) => consolidated.dsk_bytes.extend_from_slice(&copy.data),
            None => {
                consolidated.dsk_bytes.extend_from_slice(&[0u8; 256]);
                consolidated.track_error = true;
            }
        }
    }
    consolidated
}

#[cfg(test)]
fn encode_44(value: u8) -> [u8; 2] {
    [(value >> 1) | 0xaa, value | 0xaa]
}

/// Build the nibbles of one complete 6-and-2 sector: address field, gap,
/// data field. Shared by pipeline tests.
#[cfg(test)]
pub(crate) fn sector_field_nibbles(volume: u8, track: u8, sector: u8, data: &[u8]) -> Vec<u8> {
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

/// Aperiodic gap filler for synthetic tracks: 6-and-2 encoded pseudo-random
/// bytes, so the filler scans as ordinary nibbles but repeats only with the
/// revolution itself.
#[cfg(test)]
pub(crate) fn noise_nibbles(count: usize, mut seed: u32) -> Vec<u8> {
    let mut nibbles = Vec::with_capacity(count + DATA_62_LEN);
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

#[cfg(test)]
mod tests {
    use super::*;

    fn test_payload(seed: u8) -> Vec<u8> {
        (0..256u32)
            .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
            .collect()
    }

    #[test]
    fn decode_62_inverts_encode_62() {
        let data = test_payload(7);
        let encoded = encode_62(&data);
        assert_eq!(encoded.len(), DATA_62_LEN);
        assert!(encoded.iter().all(|n| READ_62[*n as usize] != 0 || *n == 0x96));
        let (decoded, residue) = decode_62(&encoded);
        assert_eq!(decoded, data);
        assert_eq!(residue, 0);
    }

    #[test]
    fn decode_53_inverts_encode_53() {
        let data = test_payload(42);
        let encoded = encode_53(&data);
        assert_eq!(encoded.len(), DATA_53_LEN);
        let (decoded, residue) = decode_53(&encoded);
        assert_eq!(decoded, data);
        assert_eq!(residue, 0);
    }

    #[test]
    fn corrupt_nibble_sets_the_residue() {
        let data = test_payload(3);
        let mut encoded = encode_62(&data);
        encoded[200] = 0xff;
        let (_, residue) = decode_62(&encoded);
        assert_ne!(residue, 0);
    }

    #[test]
    fn locate_finds_a_sector_and_checks_the_address() {
        // Past nibble 500 so the wrap scan does not see the sector twice.
        let data = test_payload(9);
        let mut track = vec![0xff; 520];
        track.extend(sector_field_nibbles(254, 17, 5, &data));
        track.extend(vec![0xff; 40]);

        let sectors = locate_sectors(&track);
        assert_eq!(sectors.len(), 1);
        let sector = &sectors[0];
        let address = sector.address.unwrap();
        assert_eq!(address.volume, 254);
        assert_eq!(address.track, 17);
        assert_eq!(address.sector, 5);
        assert!(sector.addr_checksum_ok);
        assert!(sector.addr_epilogue_perfect);
        assert!(sector.data_checksum_ok);
        assert!(sector.data_epilogue_ok);
        assert_eq!(sector.data, data);
    }

    #[test]
    fn orphan_address_mark_is_kept() {
        // An address field whose data field never arrives still names a
        // sector on the track; it is kept with empty data, not dropped.
        let data = test_payload(13);
        let orphan_field = sector_field_nibbles(254, 17, 9, &data);
        let mut track = vec![0xff; 520];
        track.extend_from_slice(&orphan_field[..14]);
        track.extend(vec![0xff; 30]);
        track.extend(sector_field_nibbles(254, 17, 10, &data));
        track.extend(vec![0xff; 40]);

        let sectors = locate_sectors(&track);
        assert_eq!(sectors.len(), 2);
        let orphan = &sectors[0];
        assert_eq!(orphan.address.unwrap().sector, 9);
        assert!(orphan.addr_checksum_ok);
        assert!(orphan.data.is_empty());
        assert!(!orphan.data_checksum_ok);
        assert_eq!(orphan.gap, 520);
        assert_eq!(sectors[1].address.unwrap().sector, 10);
        assert_eq!(sectors[1].gap, 30);
    }

    #[test]
    fn locate_wraps_past_the_track_cut() {
        // The sector straddles the cut: the tail of its field opens the
        // track and its head closes it. Only the wrap reassembles it.
        let data = test_payload(11);
        let field = sector_field_nibbles(254, 1, 0, &data);
        let mut track = field[200..].to_vec();
        track.extend(vec![0xff; 600]);
        track.extend_from_slice(&field[..200]);

        let sectors = locate_sectors(&track);
        assert_eq!(sectors.len(), 1);
        assert!(sectors[0].data_checksum_ok);
        assert_eq!(sectors[0].data, data);

        // Without the wrap half there is nothing to find.
        let sectors = locate_sectors(&field[200..]);
        assert!(sectors.is_empty());
    }

    #[test]
    fn consolidate_places_sectors_by_skew() {
        // Logical sector 1 lives at physical 0xd under DOS 3.3 skew.
        let data = test_payload(21);
        let mut track = vec![0xff; 520];
        track.extend(sector_field_nibbles(254, 0, 0xd, &data));
        track.extend(vec![0xff; 20]);

        let sectors = locate_sectors(&track);
        let ends: Vec<usize> = (0..track.len()).map(|i| i * 8).collect();
        let consolidated = consolidate_sectors(&sectors, &ends, SkewTable::Dos33);
        assert_eq!(consolidated.dsk_bytes.len(), 4096);
        assert_eq!(&consolidated.dsk_bytes[256..512], &data[..]);
        // Every other logical sector is missing.
        assert!(consolidated.track_error);
        assert_eq!(&consolidated.dsk_bytes[..256], &[0u8; 256]);
    }

    #[test]
    fn copy_distance_measures_the_track() {
        let data = test_payload(5);
        let field = sector_field_nibbles(254, 0, 3, &data);
        let mut track = vec![0xff; 520];
        track.extend_from_slice(&field);
        track.extend(vec![0xff; 10]);
        track.extend_from_slice(&field);

        let sectors = locate_sectors(&track);
        assert_eq!(sectors.len(), 2);
        // Map the two address marks roughly 51 kbit apart.
        let first = sectors[0].offset_index;
        let second = sectors[1].offset_index;
        let mut ends = vec![0usize; track.len() + 1000];
        ends[first] = 1_000;
        ends[second] = 52_000;
        let consolidated = consolidate_sectors(&sectors, &ends, SkewTable::Dos33);
        assert_eq!(consolidated.sector_track_bits, Some(51_000));
    }
}

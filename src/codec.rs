//! RED (Range Encoded Differences) block codec.
//!
//! A block is a self-describing unit of compression: a fixed 32-byte header,
//! a 256-byte symbol frequency table, and a range-coded difference stream.
//! The difference stage encodes each sample relative to its predecessor
//! (one byte for small steps, an escape byte followed by the full 4-byte
//! sample for large ones), and the entropy stage is a byte-oriented
//! carryless range coder driven by the stored table, so every block can be
//! decoded without out-of-band state.

use crate::error::{MefError, Result};
use crate::header::CRC_BYTES;
use crate::utils::{crc_calculate, read_i64_le, read_u32_le};

pub const RED_BLOCK_HEADER_BYTES: usize = 32;
pub const RED_MODEL_BYTES: usize = 256;
/// Discontinuity bit in the block header flags.
pub const RED_DISCONTINUITY_FLAG: u8 = 0x01;

/// Escape byte in the difference stream: the full sample follows.
const RED_ESCAPE_BYTE: u8 = 0x80;

const RC_TOP: u32 = 1 << 24;
const RC_BOTTOM: u32 = 1 << 16;

/// Header fields of one RED block, populated by [`RedCodec::encode`].
#[derive(Debug, Clone, Default)]
pub struct RedBlockHeader {
    pub block_crc: u32,
    pub flags: u8,
    pub start_time: i64,
    pub number_of_samples: u32,
    pub difference_bytes: u32,
    pub block_bytes: u32,
}

impl RedBlockHeader {
    pub fn discontinuity(&self) -> bool {
        self.flags & RED_DISCONTINUITY_FLAG != 0
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < RED_BLOCK_HEADER_BYTES {
            return Err(MefError::CorruptData(
                "RED block shorter than its header".to_string(),
            ));
        }
        Ok(RedBlockHeader {
            block_crc: read_u32_le(buf, 0),
            flags: buf[4],
            start_time: read_i64_le(buf, 8),
            number_of_samples: read_u32_le(buf, 16),
            difference_bytes: read_u32_le(buf, 20),
            block_bytes: read_u32_le(buf, 24),
        })
    }
}

/// Per-channel RED compression state.
///
/// Owns the difference scratch and the compressed output buffer so that
/// channels never share mutable state; both are reused across blocks.
#[derive(Debug)]
pub struct RedCodec {
    difference_buffer: Vec<u8>,
    compressed: Vec<u8>,
    pub block_header: RedBlockHeader,
}

impl RedCodec {
    /// Allocates scratch sized for `max_samples` per block. Blocks larger
    /// than the hint still encode; the buffers simply grow.
    pub fn new(max_samples: usize) -> Self {
        let worst_case = max_samples.saturating_mul(5);
        RedCodec {
            difference_buffer: Vec::with_capacity(worst_case),
            compressed: Vec::with_capacity(
                RED_BLOCK_HEADER_BYTES + RED_MODEL_BYTES + worst_case + 16,
            ),
            block_header: RedBlockHeader::default(),
        }
    }

    /// Compresses `samples` into a RED block, populating `block_header` and
    /// the internal output buffer (see [`compressed_block`](Self::compressed_block)).
    ///
    /// `start_time` is written to the block header verbatim; any recording
    /// time offset must already be applied by the caller.
    pub fn encode(&mut self, samples: &[i32], start_time: i64, discontinuity: bool) -> Result<()> {
        if samples.is_empty() {
            return Err(MefError::InvalidFormat(
                "a RED block must hold at least one sample".to_string(),
            ));
        }

        // difference stage
        self.difference_buffer.clear();
        let mut prev: i32 = 0;
        for &s in samples {
            let diff = s as i64 - prev as i64;
            if (-127..=127).contains(&diff) {
                self.difference_buffer.push(diff as i8 as u8);
            } else {
                self.difference_buffer.push(RED_ESCAPE_BYTE);
                self.difference_buffer.extend_from_slice(&s.to_le_bytes());
            }
            prev = s;
        }

        // frequency model, quantized into the block so the decoder rebuilds
        // the identical table
        let mut raw = [0u32; RED_MODEL_BYTES];
        for &b in &self.difference_buffer {
            raw[b as usize] += 1;
        }
        let counts = scale_counts(&raw);
        let (cum, total) = cumulative(&counts);

        // assemble: header placeholder, model, coded stream
        self.compressed.clear();
        self.compressed.resize(RED_BLOCK_HEADER_BYTES, 0);
        self.compressed.extend_from_slice(&counts);
        {
            let mut enc = RangeEncoder::new(&mut self.compressed);
            for &b in &self.difference_buffer {
                enc.encode(cum[b as usize], counts[b as usize] as u32, total);
            }
            enc.finish();
        }

        let header = &mut self.block_header;
        header.flags = if discontinuity { RED_DISCONTINUITY_FLAG } else { 0 };
        header.start_time = start_time;
        header.number_of_samples = samples.len() as u32;
        header.difference_bytes = self.difference_buffer.len() as u32;
        header.block_bytes = self.compressed.len() as u32;

        self.compressed[4] = header.flags;
        self.compressed[8..16].copy_from_slice(&header.start_time.to_le_bytes());
        self.compressed[16..20].copy_from_slice(&header.number_of_samples.to_le_bytes());
        self.compressed[20..24].copy_from_slice(&header.difference_bytes.to_le_bytes());
        self.compressed[24..28].copy_from_slice(&header.block_bytes.to_le_bytes());
        header.block_crc = crc_calculate(&self.compressed[CRC_BYTES..]);
        self.compressed[0..4].copy_from_slice(&header.block_crc.to_le_bytes());

        Ok(())
    }

    /// The most recently encoded block.
    pub fn compressed_block(&self) -> &[u8] {
        &self.compressed
    }

    /// Decodes one complete RED block back into samples.
    pub fn decode(block: &[u8]) -> Result<(RedBlockHeader, Vec<i32>)> {
        if block.len() < RED_BLOCK_HEADER_BYTES + RED_MODEL_BYTES {
            return Err(MefError::CorruptData(
                "RED block shorter than header and model".to_string(),
            ));
        }
        let header = RedBlockHeader::decode(block)?;
        if header.block_bytes as usize != block.len() {
            return Err(MefError::CorruptData(format!(
                "RED block length {} disagrees with header block_bytes {}",
                block.len(),
                header.block_bytes
            )));
        }
        if crc_calculate(&block[CRC_BYTES..]) != header.block_crc {
            return Err(MefError::CorruptData("RED block CRC mismatch".to_string()));
        }

        let mut counts = [0u8; RED_MODEL_BYTES];
        counts.copy_from_slice(
            &block[RED_BLOCK_HEADER_BYTES..RED_BLOCK_HEADER_BYTES + RED_MODEL_BYTES],
        );
        let (cum, total) = cumulative(&counts);
        if total == 0 {
            return Err(MefError::CorruptData(
                "RED block carries an empty frequency table".to_string(),
            ));
        }

        // entropy stage
        let coded = &block[RED_BLOCK_HEADER_BYTES + RED_MODEL_BYTES..];
        let mut dec = RangeDecoder::new(coded);
        let mut differences = Vec::with_capacity(header.difference_bytes as usize);
        for _ in 0..header.difference_bytes {
            let f = dec.decode_freq(total);
            // last symbol whose cumulative count is <= f; zero-frequency
            // symbols collapse to equal cumulative entries and are skipped
            let sym = cum.partition_point(|&c| c <= f) - 1;
            dec.decode_update(cum[sym], counts[sym] as u32, total);
            differences.push(sym as u8);
        }

        // difference stage
        let mut samples = Vec::with_capacity(header.number_of_samples as usize);
        let mut prev: i32 = 0;
        let mut i = 0usize;
        while (samples.len() as u32) < header.number_of_samples {
            let Some(&b) = differences.get(i) else {
                return Err(MefError::CorruptData(
                    "RED difference stream truncated".to_string(),
                ));
            };
            i += 1;
            let s = if b == RED_ESCAPE_BYTE {
                if i + 4 > differences.len() {
                    return Err(MefError::CorruptData(
                        "RED escape sequence truncated".to_string(),
                    ));
                }
                let v = i32::from_le_bytes([
                    differences[i],
                    differences[i + 1],
                    differences[i + 2],
                    differences[i + 3],
                ]);
                i += 4;
                v
            } else {
                prev.wrapping_add((b as i8) as i32)
            };
            samples.push(s);
            prev = s;
        }
        Ok((header, samples))
    }

    /// Block extrema over an uncompressed sample vector.
    pub fn find_extrema(samples: &[i32]) -> (i32, i32) {
        let mut min = i32::MAX;
        let mut max = i32::MIN;
        for &s in samples {
            if s < min {
                min = s;
            }
            if s > max {
                max = s;
            }
        }
        (min, max)
    }
}

/// Quantizes raw byte counts into u8 so the table fits the block; every
/// present symbol keeps a count of at least 1, and the total stays below
/// 2^16 (256 * 255), which the range coder requires.
fn scale_counts(raw: &[u32; RED_MODEL_BYTES]) -> [u8; RED_MODEL_BYTES] {
    let mut scaled = [0u8; RED_MODEL_BYTES];
    let max = raw.iter().copied().max().unwrap_or(0);
    if max == 0 {
        return scaled;
    }
    for (i, &count) in raw.iter().enumerate() {
        if count == 0 {
            continue;
        }
        scaled[i] = if max <= 255 {
            count as u8
        } else {
            ((count as u64 * 255 / max as u64).max(1)) as u8
        };
    }
    scaled
}

fn cumulative(counts: &[u8; RED_MODEL_BYTES]) -> ([u32; RED_MODEL_BYTES + 1], u32) {
    let mut cum = [0u32; RED_MODEL_BYTES + 1];
    for i in 0..RED_MODEL_BYTES {
        cum[i + 1] = cum[i] + counts[i] as u32;
    }
    let total = cum[RED_MODEL_BYTES];
    (cum, total)
}

// Carryless byte-oriented range coder (Subbotin variant). The encoder and
// decoder renormalize under identical conditions, which is what makes the
// pair exactly inverse.
struct RangeEncoder<'a> {
    low: u32,
    range: u32,
    out: &'a mut Vec<u8>,
}

impl<'a> RangeEncoder<'a> {
    fn new(out: &'a mut Vec<u8>) -> Self {
        RangeEncoder {
            low: 0,
            range: u32::MAX,
            out,
        }
    }

    fn encode(&mut self, cum_freq: u32, freq: u32, total: u32) {
        let r = self.range / total;
        self.low = self.low.wrapping_add(r * cum_freq);
        self.range = r * freq;
        loop {
            if (self.low ^ self.low.wrapping_add(self.range)) >= RC_TOP {
                if self.range >= RC_BOTTOM {
                    break;
                }
                // underflow: pin the range inside the current bottom window
                self.range = self.low.wrapping_neg() & (RC_BOTTOM - 1);
            }
            self.out.push((self.low >> 24) as u8);
            self.low <<= 8;
            self.range <<= 8;
        }
    }

    fn finish(mut self) {
        for _ in 0..4 {
            self.out.push((self.low >> 24) as u8);
            self.low <<= 8;
        }
    }
}

struct RangeDecoder<'a> {
    low: u32,
    range: u32,
    code: u32,
    input: &'a [u8],
    pos: usize,
}

impl<'a> RangeDecoder<'a> {
    fn new(input: &'a [u8]) -> Self {
        let mut dec = RangeDecoder {
            low: 0,
            range: u32::MAX,
            code: 0,
            input,
            pos: 0,
        };
        for _ in 0..4 {
            dec.code = (dec.code << 8) | dec.next_byte() as u32;
        }
        dec
    }

    // reads past the stream as zeros; the encoder's four-byte flush keeps
    // every decision inside real data
    fn next_byte(&mut self) -> u8 {
        let b = self.input.get(self.pos).copied().unwrap_or(0);
        self.pos += 1;
        b
    }

    fn decode_freq(&mut self, total: u32) -> u32 {
        let r = self.range / total;
        (self.code.wrapping_sub(self.low) / r).min(total - 1)
    }

    fn decode_update(&mut self, cum_freq: u32, freq: u32, total: u32) {
        let r = self.range / total;
        self.low = self.low.wrapping_add(r * cum_freq);
        self.range = r * freq;
        loop {
            if (self.low ^ self.low.wrapping_add(self.range)) >= RC_TOP {
                if self.range >= RC_BOTTOM {
                    break;
                }
                self.range = self.low.wrapping_neg() & (RC_BOTTOM - 1);
            }
            self.code = (self.code << 8) | self.next_byte() as u32;
            self.low <<= 8;
            self.range <<= 8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(samples: &[i32]) -> RedBlockHeader {
        let mut codec = RedCodec::new(samples.len());
        codec.encode(samples, 946_684_800_000_000, true).unwrap();
        let block = codec.compressed_block().to_vec();
        let (header, decoded) = RedCodec::decode(&block).unwrap();
        assert_eq!(decoded, samples);
        header
    }

    #[test]
    fn test_round_trip_constant_signal() {
        let header = round_trip(&[20_000; 1000]);
        assert_eq!(header.number_of_samples, 1000);
        assert!(header.discontinuity());
        // escape (1 + 4 bytes) for the first sample, then single-byte zero diffs
        assert_eq!(header.difference_bytes, 5 + 999);
    }

    #[test]
    fn test_round_trip_sine() {
        let samples: Vec<i32> = (0..1000)
            .map(|i| {
                (20_000.0 * (2.0 * std::f64::consts::PI * 10.0 * i as f64 / 1000.0).sin()).floor()
                    as i32
            })
            .collect();
        let header = round_trip(&samples);
        assert_eq!(header.number_of_samples, 1000);
        // smooth signals should compress well below the raw 4 bytes/sample
        assert!((header.block_bytes as usize) < 4 * samples.len());
    }

    #[test]
    fn test_round_trip_extreme_jumps() {
        let samples = vec![
            0,
            i32::MAX,
            i32::MIN,
            -1,
            1,
            i32::MAX - 3,
            i32::MIN + 3,
            0,
            127,
            -127,
            128,
            -128,
        ];
        round_trip(&samples);
    }

    #[test]
    fn test_round_trip_single_sample() {
        let header = round_trip(&[-7]);
        assert_eq!(header.number_of_samples, 1);
        assert_eq!(header.difference_bytes, 1);
    }

    #[test]
    fn test_round_trip_pseudo_noise() {
        // deterministic LCG so the table has many distinct symbols
        let mut state: u32 = 0x1234_5678;
        let samples: Vec<i32> = (0..5000)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (state >> 8) as i32 - (1 << 23)
            })
            .collect();
        round_trip(&samples);
    }

    #[test]
    fn test_header_fields_and_flags() {
        let mut codec = RedCodec::new(16);
        codec.encode(&[1, 2, 3], -5_000, false).unwrap();
        let header = codec.block_header.clone();
        assert_eq!(header.start_time, -5_000);
        assert!(!header.discontinuity());
        assert_eq!(header.number_of_samples, 3);
        assert_eq!(
            header.block_bytes as usize,
            codec.compressed_block().len()
        );
    }

    #[test]
    fn test_empty_block_rejected() {
        let mut codec = RedCodec::new(16);
        assert!(codec.encode(&[], 0, false).is_err());
    }

    #[test]
    fn test_corrupt_block_detected() {
        let mut codec = RedCodec::new(16);
        codec.encode(&[10, 20, 30, 40], 0, true).unwrap();
        let mut block = codec.compressed_block().to_vec();
        let last = block.len() - 1;
        block[last] ^= 0xff;
        assert!(RedCodec::decode(&block).is_err());
    }

    #[test]
    fn test_find_extrema() {
        assert_eq!(RedCodec::find_extrema(&[3, -9, 12, 0]), (-9, 12));
        assert_eq!(RedCodec::find_extrema(&[5]), (5, 5));
    }
}

//! NNUE (Efficiently Updatable Neural Network) position evaluation.
//!
//! Architecture: (buckets*768 -> HIDDEN)x2 -> SCReLU -> output buckets -> 1
//!
//! - Input: king-bucketed 768 binary features per perspective, horizontally
//!   mirrored so every king lives on files a-d
//! - Feature transformer: 768 -> HIDDEN per perspective (i16 quantized)
//! - SCReLU activation: clamp(x, 0, QA)^2 on both accumulators
//! - Output: per-piece-count bucketed dot product with i16 weights
//!
//! The accumulator is maintained incrementally by make-move; see
//! `accumulator.rs`. Weight files are memory-mapped and validated before a
//! single byte is trusted.

pub mod accumulator;
pub mod features;

use crate::defs::Color;
use anyhow::{bail, Context, Result};
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

use self::accumulator::Accumulator;
use self::features::FEATURES_PER_BUCKET;

#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

// ============================================================================
// QUANTIZATION CONSTANTS
// ============================================================================

/// Accumulator quantization factor (clamp ceiling for SCReLU)
pub const QA: i32 = 255;

/// Output weight quantization factor
pub const QB: i32 = 64;

/// Centipawn scale: sigmoid(cp / SCALE) approximates win probability in
/// training; here it converts network units to centipawns
pub const SCALE: i32 = 400;

/// Hidden layer width. Weight files must match.
pub const HIDDEN: usize = 256;

/// Magic bytes for the weight file format
pub const NET_MAGIC: &[u8; 4] = b"OPNN";

/// Current weight format version
pub const NET_VERSION: u32 = 1;

/// Output biases in the file are padded to this many i16 lanes
const BIAS_PAD: usize = 16;

/// Header: magic, version, hidden, input buckets, output buckets, then the
/// 64-entry king-bucket table.
const HEADER_SIZE: usize = 4 + 4 + 4 + 4 + 4 + 64;

/// Highest plausible bucket counts, used only for header sanity checks.
const MAX_INPUT_BUCKETS: usize = 32;
const MAX_OUTPUT_BUCKETS: usize = 32;

// ============================================================================
// NETWORK
// ============================================================================

/// Quantized network weights, loaded from an OPNN binary.
pub struct Network {
    /// Feature transformer weights: [input_buckets * 768 * HIDDEN], row-major
    /// by feature (ft_weights[f * HIDDEN + lane])
    pub ft_weights: Vec<i16>,
    /// Feature transformer biases: [HIDDEN]
    pub ft_biases: [i16; HIDDEN],
    /// Output weights after transposition: [output_buckets * 2 * HIDDEN],
    /// row-major by bucket; first HIDDEN lanes are "us", the rest "them"
    pub output_weights: Vec<i16>,
    /// Output bias per bucket
    pub output_biases: Vec<i16>,
    pub input_buckets: usize,
    pub output_buckets: usize,
    /// King-bucket table, indexed by the perspective-transformed square
    pub king_buckets: [u8; 64],
}

/// Output bucket from the total piece count: counts 2..=32 are partitioned
/// linearly; the all-men corner case lands in the last bucket.
#[inline]
pub fn output_bucket(piece_count: u32, buckets: usize) -> usize {
    let divisor = (32 - 2) / buckets;
    (((piece_count as usize).saturating_sub(2)) / divisor).min(buckets - 1)
}

impl Network {
    /// Memory-map and parse a weight file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())
            .with_context(|| format!("failed to open {}", path.as_ref().display()))?;
        // Safety: the mapping is read-only and lives only for the parse
        let mmap = unsafe { Mmap::map(&file)? };
        Self::from_bytes(&mmap)
            .with_context(|| format!("invalid weight file {}", path.as_ref().display()))
    }

    /// Parse network weights from a byte buffer.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            bail!("file too small for header: {} bytes", data.len());
        }

        if &data[0..4] != NET_MAGIC {
            bail!("bad magic: expected {:?}, got {:?}", NET_MAGIC, &data[0..4]);
        }
        let version = u32::from_le_bytes(data[4..8].try_into()?);
        if version != NET_VERSION {
            bail!("unsupported version {} (expected {})", version, NET_VERSION);
        }
        let hidden = u32::from_le_bytes(data[8..12].try_into()?) as usize;
        if hidden != HIDDEN {
            bail!("hidden size {} does not match engine build ({})", hidden, HIDDEN);
        }
        let input_buckets = u32::from_le_bytes(data[12..16].try_into()?) as usize;
        let output_buckets = u32::from_le_bytes(data[16..20].try_into()?) as usize;
        if input_buckets == 0 || input_buckets > MAX_INPUT_BUCKETS {
            bail!("implausible input bucket count {}", input_buckets);
        }
        if output_buckets == 0
            || output_buckets > MAX_OUTPUT_BUCKETS
            || (32 - 2) % output_buckets != 0
        {
            bail!("implausible output bucket count {}", output_buckets);
        }

        let mut king_buckets = [0u8; 64];
        king_buckets.copy_from_slice(&data[20..84]);
        if king_buckets.iter().any(|&b| b as usize >= input_buckets) {
            bail!("king-bucket table references bucket out of range");
        }

        let ft_count = input_buckets * FEATURES_PER_BUCKET * HIDDEN;
        let out_count = output_buckets * 2 * HIDDEN;
        let bias_padded = (output_buckets + BIAS_PAD - 1) / BIAS_PAD * BIAS_PAD;
        let expected = 2 * (ft_count + HIDDEN + out_count + bias_padded);
        let payload = &data[HEADER_SIZE..];
        if payload.len() < expected {
            bail!(
                "payload truncated: {} bytes, expected at least {}",
                payload.len(),
                expected
            );
        }

        let mut cursor = 0usize;
        let mut read_i16s = |count: usize| -> Vec<i16> {
            let bytes = &payload[cursor..cursor + count * 2];
            cursor += count * 2;
            bytes
                .chunks_exact(2)
                .map(|c| i16::from_le_bytes([c[0], c[1]]))
                .collect()
        };

        let ft_weights = read_i16s(ft_count);
        let biases = read_i16s(HIDDEN);
        let out_col_major = read_i16s(out_count);
        let bias_block = read_i16s(bias_padded);

        let mut ft_biases = [0i16; HIDDEN];
        ft_biases.copy_from_slice(&biases);

        // The file stores output weights per-lane-across-buckets; transpose
        // to row-major per bucket for the forward pass.
        let mut output_weights = vec![0i16; out_count];
        for lane in 0..2 * HIDDEN {
            for b in 0..output_buckets {
                output_weights[b * 2 * HIDDEN + lane] = out_col_major[lane * output_buckets + b];
            }
        }

        Ok(Self {
            ft_weights,
            ft_biases,
            output_weights,
            output_biases: bias_block[..output_buckets].to_vec(),
            input_buckets,
            output_buckets,
            king_buckets,
        })
    }

    /// Serialize to the OPNN on-disk layout (column-major output weights,
    /// padded biases). Counterpart of `from_bytes`, used by tests and
    /// training export.
    pub fn to_bytes(&self) -> Vec<u8> {
        let bias_padded = (self.output_buckets + BIAS_PAD - 1) / BIAS_PAD * BIAS_PAD;
        let mut buf = Vec::new();
        buf.extend_from_slice(NET_MAGIC);
        buf.extend_from_slice(&NET_VERSION.to_le_bytes());
        buf.extend_from_slice(&(HIDDEN as u32).to_le_bytes());
        buf.extend_from_slice(&(self.input_buckets as u32).to_le_bytes());
        buf.extend_from_slice(&(self.output_buckets as u32).to_le_bytes());
        buf.extend_from_slice(&self.king_buckets);

        for &w in &self.ft_weights {
            buf.extend_from_slice(&w.to_le_bytes());
        }
        for &b in &self.ft_biases {
            buf.extend_from_slice(&b.to_le_bytes());
        }
        for lane in 0..2 * HIDDEN {
            for b in 0..self.output_buckets {
                let w = self.output_weights[b * 2 * HIDDEN + lane];
                buf.extend_from_slice(&w.to_le_bytes());
            }
        }
        for i in 0..bias_padded {
            let b = self.output_biases.get(i).copied().unwrap_or(0);
            buf.extend_from_slice(&b.to_le_bytes());
        }
        buf
    }

    /// Deterministic pseudo-random network for tests and bootstrapping.
    pub fn random(input_buckets: usize, output_buckets: usize) -> Self {
        let ft_count = input_buckets * FEATURES_PER_BUCKET * HIDDEN;
        let out_count = output_buckets * 2 * HIDDEN;
        let mut seed: u64 = 0xDEADBEEF;
        let mut small = || {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
            ((seed >> 48) as i16) / 256
        };

        let ft_weights = (0..ft_count).map(|_| small()).collect();
        let mut ft_biases = [0i16; HIDDEN];
        for b in ft_biases.iter_mut() {
            *b = small();
        }
        let output_weights = (0..out_count).map(|_| small()).collect();
        let output_biases = (0..output_buckets).map(|_| small()).collect();

        Self {
            ft_weights,
            ft_biases,
            output_weights,
            output_biases,
            input_buckets,
            output_buckets,
            king_buckets: features::DEFAULT_KING_BUCKETS,
        }
    }

    /// Evaluate from a computed accumulator pair.
    ///
    /// Returns the score in centipawns from the side-to-move's perspective.
    #[inline]
    pub fn evaluate(&self, acc: &Accumulator, stm: Color, piece_count: u32) -> i32 {
        debug_assert!(!acc.dirty[0] && !acc.dirty[1], "accumulator not refreshed");

        let bucket = output_bucket(piece_count, self.output_buckets);
        let us = &acc.vals[stm as usize];
        let them = &acc.vals[stm.opposite() as usize];
        let weights = &self.output_weights[bucket * 2 * HIDDEN..(bucket + 1) * 2 * HIDDEN];

        #[cfg(target_arch = "x86_64")]
        {
            if is_x86_feature_detected!("avx2") {
                let sum = unsafe { screlu_dot_avx2(us, them, weights) };
                return self.dequantize(sum, bucket);
            }
        }

        let sum = screlu_dot_scalar(us, them, weights);
        self.dequantize(sum, bucket)
    }

    #[inline]
    fn dequantize(&self, sum: i64, bucket: usize) -> i32 {
        // sum is in QA^2 * QB units; one QA divides out of the squares
        let cp = (sum / QA as i64 + self.output_biases[bucket] as i64) * SCALE as i64
            / (QA as i64 * QB as i64);
        // Keep evaluations clear of the mate-score band
        let bound = crate::constants::MATE_BOUND as i64 - 1;
        cp.clamp(-bound, bound) as i32
    }
}

/// Scalar SCReLU dot product: clamp, square, weight, accumulate.
fn screlu_dot_scalar(us: &[i16; HIDDEN], them: &[i16; HIDDEN], weights: &[i16]) -> i64 {
    let mut sum: i64 = 0;
    for i in 0..HIDDEN {
        let v = (us[i] as i32).clamp(0, QA);
        sum += (v * v) as i64 * weights[i] as i64;
    }
    for i in 0..HIDDEN {
        let v = (them[i] as i32).clamp(0, QA);
        sum += (v * v) as i64 * weights[HIDDEN + i] as i64;
    }
    sum
}

/// AVX2 SCReLU dot product.
///
/// Processes 16 i16 lanes per iteration. Strategy: clamp, multiply by
/// weight in i16 (safe because max(v*w) = QA * 127 < 32768), then
/// madd against the clamped value widening to i32 pairs.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn screlu_dot_avx2(us: &[i16; HIDDEN], them: &[i16; HIDDEN], weights: &[i16]) -> i64 {
    let zero = _mm256_setzero_si256();
    let qa_vec = _mm256_set1_epi16(QA as i16);

    let mut sum0 = _mm256_setzero_si256();
    let mut sum1 = _mm256_setzero_si256();

    let mut i = 0;
    while i < HIDDEN {
        let acc = _mm256_loadu_si256(us.as_ptr().add(i) as *const __m256i);
        let wgt = _mm256_loadu_si256(weights.as_ptr().add(i) as *const __m256i);
        let clamped = _mm256_min_epi16(_mm256_max_epi16(acc, zero), qa_vec);
        let vw = _mm256_mullo_epi16(clamped, wgt);
        sum0 = _mm256_add_epi32(sum0, _mm256_madd_epi16(vw, clamped));
        i += 16;
    }

    i = 0;
    while i < HIDDEN {
        let acc = _mm256_loadu_si256(them.as_ptr().add(i) as *const __m256i);
        let wgt = _mm256_loadu_si256(weights.as_ptr().add(HIDDEN + i) as *const __m256i);
        let clamped = _mm256_min_epi16(_mm256_max_epi16(acc, zero), qa_vec);
        let vw = _mm256_mullo_epi16(clamped, wgt);
        sum1 = _mm256_add_epi32(sum1, _mm256_madd_epi16(vw, clamped));
        i += 16;
    }

    // Horizontal reduction of 8 i32 lanes
    let combined = _mm256_add_epi32(sum0, sum1);
    let hi128 = _mm256_extracti128_si256(combined, 1);
    let lo128 = _mm256_castsi256_si128(combined);
    let sum128 = _mm_add_epi32(lo128, hi128);
    let hi64 = _mm_shuffle_epi32(sum128, 0b_01_00_11_10);
    let sum64 = _mm_add_epi32(sum128, hi64);
    let hi32 = _mm_shuffle_epi32(sum64, 0b_00_00_00_01);
    let total = _mm_add_epi32(sum64, hi32);
    _mm_cvtsi128_si32(total) as i64
}

//! NNUE feature indexing.
//!
//! Input features are (piece-color, piece-type, square) triples re-indexed
//! per perspective. For perspective P the board is rank-flipped when P is
//! Black, then horizontally mirrored when P's king sits on files e-h, so
//! every king lives on files a-d. The transformed king square selects a
//! king bucket; the bucket mapping is a property of the loaded weight file,
//! not of the engine.
//!
//! Feature index = bucket * 768 + (piece_color ^ P) * 384 + piece_type * 64
//!               + transformed_square

use crate::defs::{file_of, flip_file, flip_rank, Color, PieceType};
use crate::nnue::Network;

/// Feature count per king bucket: 2 colors x 6 piece types x 64 squares
pub const FEATURES_PER_BUCKET: usize = 768;

/// Maximum active features in any legal position (at most 32 pieces)
pub const MAX_ACTIVE: usize = 32;

/// King-bucket table used by `Network::random()` and expected from typical
/// weight files: 10 buckets, finer near the back rank where king placement
/// matters most. Indexed by the transformed square, so only files a-d are
/// ever hit; the e-h half mirrors a-d for completeness.
#[rustfmt::skip]
pub const DEFAULT_KING_BUCKETS: [u8; 64] = [
    0, 1, 2, 3, 3, 2, 1, 0, // rank 1
    4, 4, 5, 5, 5, 5, 4, 4, // rank 2
    6, 6, 6, 6, 6, 6, 6, 6, // rank 3
    7, 7, 7, 7, 7, 7, 7, 7, // rank 4
    8, 8, 8, 8, 8, 8, 8, 8, // rank 5
    8, 8, 8, 8, 8, 8, 8, 8, // rank 6
    9, 9, 9, 9, 9, 9, 9, 9, // rank 7
    9, 9, 9, 9, 9, 9, 9, 9, // rank 8
];

pub const DEFAULT_INPUT_BUCKETS: usize = 10;
pub const DEFAULT_OUTPUT_BUCKETS: usize = 6;

/// Identity of a king placement for one perspective: which bucket it maps
/// to and whether the half-board mirror is active. Two king squares in the
/// same class index the same feature subspace, so a king move within a
/// class is an ordinary incremental update.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct KingClass {
    pub bucket: u8,
    pub mirror: bool,
}

/// Classify a king square for perspective `persp`.
#[inline]
pub fn king_class(net: &Network, king_sq: u8, persp: Color) -> KingClass {
    let oriented = if persp == Color::Black {
        flip_rank(king_sq)
    } else {
        king_sq
    };
    let mirror = file_of(oriented) > 3;
    let transformed = if mirror { flip_file(oriented) } else { oriented };
    KingClass {
        bucket: net.king_buckets[transformed as usize],
        mirror,
    }
}

/// Full feature index for perspective `persp` whose king classifies as
/// `class`.
#[inline]
pub fn feature_index(
    class: KingClass,
    persp: Color,
    piece_color: Color,
    piece: PieceType,
    sq: u8,
) -> usize {
    let mut s = if persp == Color::Black { flip_rank(sq) } else { sq };
    if class.mirror {
        s = flip_file(s);
    }
    let c = (piece_color as usize) ^ (persp as usize);
    class.bucket as usize * FEATURES_PER_BUCKET
        + c * 384
        + piece as usize * 64
        + s as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defs::parse_square;
    use crate::nnue::Network;

    #[test]
    fn test_king_class_mirroring() {
        let net = Network::random(DEFAULT_INPUT_BUCKETS, DEFAULT_OUTPUT_BUCKETS);
        // White king a1: no mirror, bucket 0
        let a1 = king_class(&net, parse_square("a1").unwrap(), Color::White);
        assert_eq!(a1, KingClass { bucket: 0, mirror: false });
        // White king h1 mirrors onto a1's bucket
        let h1 = king_class(&net, parse_square("h1").unwrap(), Color::White);
        assert_eq!(h1, KingClass { bucket: 0, mirror: true });
        // Black king e8 flips to e1, mirrors to d1
        let e8 = king_class(&net, parse_square("e8").unwrap(), Color::Black);
        assert_eq!(e8, KingClass { bucket: 3, mirror: true });
    }

    #[test]
    fn test_feature_index_in_range() {
        let net = Network::random(DEFAULT_INPUT_BUCKETS, DEFAULT_OUTPUT_BUCKETS);
        let limit = DEFAULT_INPUT_BUCKETS * FEATURES_PER_BUCKET;
        for persp in [Color::White, Color::Black] {
            for ksq in 0..64u8 {
                let class = king_class(&net, ksq, persp);
                for color in [Color::White, Color::Black] {
                    for sq in [0u8, 7, 28, 63] {
                        let idx =
                            feature_index(class, persp, color, PieceType::Queen, sq);
                        assert!(idx < limit);
                    }
                }
            }
        }
    }

    #[test]
    fn test_perspective_symmetry() {
        // A white pawn seen by White indexes the same slot as a black pawn
        // on the flipped square seen by Black, for matching king classes.
        let net = Network::random(DEFAULT_INPUT_BUCKETS, DEFAULT_OUTPUT_BUCKETS);
        let wk = parse_square("e1").unwrap();
        let bk = parse_square("e8").unwrap();
        let w_class = king_class(&net, wk, Color::White);
        let b_class = king_class(&net, bk, Color::Black);
        assert_eq!(w_class, b_class);

        let sq = parse_square("d4").unwrap();
        let w_idx = feature_index(w_class, Color::White, Color::White, PieceType::Pawn, sq);
        let b_idx = feature_index(
            b_class,
            Color::Black,
            Color::Black,
            PieceType::Pawn,
            crate::defs::flip_rank(sq),
        );
        assert_eq!(w_idx, b_idx);
    }
}

//! Precomputed attack tables, built once at startup and shared process-wide.
//!
//! Leaper attacks (pawn/knight/king), magic slider tables, and the
//! geometry tables (between/line/ray/distance) the legality and evasion
//! code leans on. Immutable after init; deterministic across runs.

use crate::defs::{bb, Bitboard, EMPTY};
use crate::magic::{self, Magic, BISHOP_TABLE_SIZE, ROOK_TABLE_SIZE};

pub struct AttackTables {
    pub pawn: [[Bitboard; 64]; 2], // [color][sq]
    pub knight: [Bitboard; 64],
    pub king: [Bitboard; 64],
    /// Ring of squares at Chebyshev distance exactly 2
    pub outer: [Bitboard; 64],
    /// Squares strictly between two aligned squares
    pub between: [[Bitboard; 64]; 64],
    /// Full line through two aligned squares (edge to edge)
    pub line: [[Bitboard; 64]; 64],
    /// Ray from a through b to the board edge, excluding a
    pub ray: [[Bitboard; 64]; 64],
    pub distance: [[u8; 64]; 64],
    pub bishop_magics: [Magic; 64],
    pub rook_magics: [Magic; 64],
    bishop_table: Vec<Bitboard>,
    rook_table: Vec<Bitboard>,
}

lazy_static::lazy_static! {
    pub static ref ATTACKS: AttackTables = AttackTables::build();
}

impl AttackTables {
    fn build() -> Self {
        let mut t = AttackTables {
            pawn: [[EMPTY; 64]; 2],
            knight: [EMPTY; 64],
            king: [EMPTY; 64],
            outer: [EMPTY; 64],
            between: [[EMPTY; 64]; 64],
            line: [[EMPTY; 64]; 64],
            ray: [[EMPTY; 64]; 64],
            distance: [[0; 64]; 64],
            bishop_magics: [Magic { mask: 0, magic: 0, shift: 0, offset: 0 }; 64],
            rook_magics: [Magic { mask: 0, magic: 0, shift: 0, offset: 0 }; 64],
            bishop_table: vec![EMPTY; BISHOP_TABLE_SIZE],
            rook_table: vec![EMPTY; ROOK_TABLE_SIZE],
        };

        for sq in 0..64u8 {
            let f = (sq % 8) as i8;
            let r = (sq / 8) as i8;

            for (df, dr) in [(-2, -1), (-2, 1), (-1, -2), (-1, 2), (1, -2), (1, 2), (2, -1), (2, 1)] {
                let (nf, nr) = (f + df, r + dr);
                if (0..8).contains(&nf) && (0..8).contains(&nr) {
                    t.knight[sq as usize] |= 1u64 << (nr * 8 + nf);
                }
            }
            for df in -1..=1i8 {
                for dr in -1..=1i8 {
                    if df == 0 && dr == 0 {
                        continue;
                    }
                    let (nf, nr) = (f + df, r + dr);
                    if (0..8).contains(&nf) && (0..8).contains(&nr) {
                        t.king[sq as usize] |= 1u64 << (nr * 8 + nf);
                    }
                }
            }
            if r < 7 {
                if f > 0 {
                    t.pawn[0][sq as usize] |= bb(sq + 7);
                }
                if f < 7 {
                    t.pawn[0][sq as usize] |= bb(sq + 9);
                }
            }
            if r > 0 {
                if f > 0 {
                    t.pawn[1][sq as usize] |= bb(sq - 9);
                }
                if f < 7 {
                    t.pawn[1][sq as usize] |= bb(sq - 7);
                }
            }
        }

        t.bishop_magics = magic::build_slider(
            0x9E37_79B9_7F4A_7C15,
            magic::bishop_mask,
            magic::bishop_attacks_on_the_fly,
            &mut t.bishop_table,
        );
        t.rook_magics = magic::build_slider(
            0x2545_F491_4F6C_DD1D,
            magic::rook_mask,
            magic::rook_attacks_on_the_fly,
            &mut t.rook_table,
        );

        // Geometry tables, derived from empty-board slider attacks
        for a in 0..64u8 {
            let fa = (a % 8) as i8;
            let ra = (a / 8) as i8;
            for b in 0..64u8 {
                let fb = (b % 8) as i8;
                let rb = (b / 8) as i8;
                let (df, dr) = ((fb - fa).abs() as u8, (rb - ra).abs() as u8);
                t.distance[a as usize][b as usize] = df.max(dr);

                if a == b {
                    continue;
                }
                for attacks in [
                    magic::bishop_attacks_on_the_fly as fn(u8, Bitboard) -> Bitboard,
                    magic::rook_attacks_on_the_fly as fn(u8, Bitboard) -> Bitboard,
                ] {
                    if attacks(a, EMPTY) & bb(b) != 0 {
                        t.line[a as usize][b as usize] =
                            (attacks(a, EMPTY) & attacks(b, EMPTY)) | bb(a) | bb(b);
                        t.between[a as usize][b as usize] =
                            attacks(a, bb(b)) & attacks(b, bb(a));
                        // Directional: from a through b to the edge
                        let step_f = (fb - fa).signum();
                        let step_r = (rb - ra).signum();
                        let (mut f, mut r) = (fa + step_f, ra + step_r);
                        let mut ray = EMPTY;
                        while (0..8).contains(&f) && (0..8).contains(&r) {
                            ray |= bb((r * 8 + f) as u8);
                            f += step_f;
                            r += step_r;
                        }
                        t.ray[a as usize][b as usize] = ray;
                    }
                }
            }
            // Outer ring: king neighbourhood of the king neighbourhood
            let inner = t.king[a as usize];
            let mut ring = EMPTY;
            let mut n = inner;
            while n != 0 {
                let s = crate::defs::pop_lsb(&mut n);
                ring |= t.king[s as usize];
            }
            t.outer[a as usize] = ring & !inner & !bb(a);
        }

        t
    }

    #[inline]
    pub fn bishop_attacks(&self, occ: Bitboard, sq: u8) -> Bitboard {
        self.bishop_table[self.bishop_magics[sq as usize].index(occ)]
    }

    #[inline]
    pub fn rook_attacks(&self, occ: Bitboard, sq: u8) -> Bitboard {
        self.rook_table[self.rook_magics[sq as usize].index(occ)]
    }

    #[inline]
    pub fn queen_attacks(&self, occ: Bitboard, sq: u8) -> Bitboard {
        self.bishop_attacks(occ, sq) | self.rook_attacks(occ, sq)
    }

    /// Attacks of a non-pawn piece type from a square.
    #[inline]
    pub fn piece_attacks(&self, pt: crate::defs::PieceType, occ: Bitboard, sq: u8) -> Bitboard {
        use crate::defs::PieceType::*;
        match pt {
            Knight => self.knight[sq as usize],
            Bishop => self.bishop_attacks(occ, sq),
            Rook => self.rook_attacks(occ, sq),
            Queen => self.queen_attacks(occ, sq),
            King => self.king[sq as usize],
            Pawn => EMPTY,
        }
    }

    #[inline]
    pub fn between_bb(&self, a: u8, b: u8) -> Bitboard {
        self.between[a as usize][b as usize]
    }

    #[inline]
    pub fn line_bb(&self, a: u8, b: u8) -> Bitboard {
        self.line[a as usize][b as usize]
    }

    /// True when `c` lies on the line through `a` and `b`.
    #[inline]
    pub fn aligned(&self, a: u8, b: u8, c: u8) -> bool {
        self.line[a as usize][b as usize] & bb(c) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defs::square;

    /// Xorshift occupancy generator, fixed seed for reproducibility.
    fn rand_occ(seed: &mut u64) -> Bitboard {
        *seed ^= *seed << 13;
        *seed ^= *seed >> 7;
        *seed ^= *seed << 17;
        *seed & seed.rotate_left(31)
    }

    #[test]
    fn test_magic_sliders_match_reference() {
        let mut seed = 0x1234_5678_9ABC_DEF0u64;
        for _ in 0..2000 {
            let occ = rand_occ(&mut seed);
            for sq in 0..64u8 {
                assert_eq!(
                    ATTACKS.rook_attacks(occ, sq),
                    magic::rook_attacks_on_the_fly(sq, occ),
                    "rook mismatch sq {} occ {:#x}",
                    sq,
                    occ
                );
                assert_eq!(
                    ATTACKS.bishop_attacks(occ, sq),
                    magic::bishop_attacks_on_the_fly(sq, occ),
                    "bishop mismatch sq {} occ {:#x}",
                    sq,
                    occ
                );
            }
        }
    }

    #[test]
    fn test_between_subset_of_line() {
        for a in 0..64u8 {
            for b in 0..64u8 {
                if a == b {
                    continue;
                }
                let line = ATTACKS.line_bb(a, b);
                if line != EMPTY {
                    let with_end = ATTACKS.between_bb(a, b) | bb(b);
                    assert_eq!(with_end & !line, EMPTY, "between not within line {} {}", a, b);
                }
            }
        }
    }

    #[test]
    fn test_between_endpoints_excluded() {
        let a = square(0, 0);
        let b = square(0, 7);
        let between = ATTACKS.between_bb(a, b);
        assert_eq!(between.count_ones(), 6);
        assert_eq!(between & (bb(a) | bb(b)), EMPTY);
    }

    #[test]
    fn test_ray_is_directional() {
        let a1 = square(0, 0);
        let a4 = square(0, 3);
        let ray = ATTACKS.ray[a1 as usize][a4 as usize];
        // From a1 through a4 up to a8; a1 itself excluded
        assert_eq!(ray, crate::defs::FILE_A & !bb(a1));
        let down = ATTACKS.ray[a4 as usize][a1 as usize];
        assert_eq!(down, bb(square(0, 0)) | bb(square(0, 1)) | bb(square(0, 2)));
    }

    #[test]
    fn test_pawn_attacks_direction() {
        // White pawn on e4 attacks d5 and f5
        let e4 = square(4, 3);
        assert_eq!(
            ATTACKS.pawn[0][e4 as usize],
            bb(square(3, 4)) | bb(square(5, 4))
        );
        // Black pawn on e4 attacks d3 and f3
        assert_eq!(
            ATTACKS.pawn[1][e4 as usize],
            bb(square(3, 2)) | bb(square(5, 2))
        );
    }

    #[test]
    fn test_distance_and_outer_ring() {
        let e4 = square(4, 3);
        assert_eq!(ATTACKS.distance[e4 as usize][square(4, 3) as usize], 0);
        assert_eq!(ATTACKS.distance[e4 as usize][square(6, 5) as usize], 2);
        // every outer-ring square is at distance exactly 2
        let mut ring = ATTACKS.outer[e4 as usize];
        while ring != 0 {
            let s = crate::defs::pop_lsb(&mut ring);
            assert_eq!(ATTACKS.distance[e4 as usize][s as usize], 2);
        }
    }
}

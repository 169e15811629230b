//! Zobrist hashing keys.
//!
//! Keys are drawn from a xorshift generator with a fixed seed so that
//! hashes of identical positions match across runs and builds.

use crate::defs::{COLOR_COUNT, PIECE_TYPE_COUNT};

pub struct Zobrist {
    pub pieces: [[[u64; 64]; PIECE_TYPE_COUNT]; COLOR_COUNT],
    pub side: u64,
    pub castling: [u64; 16],
    pub en_passant: [u64; 8],
}

lazy_static::lazy_static! {
    pub static ref ZOBRIST: Zobrist = Zobrist::build();
}

const SEED: u64 = 0x9876_5432_10FE_DCBA;

impl Zobrist {
    fn build() -> Self {
        let mut keys = Zobrist {
            pieces: [[[0; 64]; PIECE_TYPE_COUNT]; COLOR_COUNT],
            side: 0,
            castling: [0; 16],
            en_passant: [0; 8],
        };

        let mut seed = SEED;
        let mut next_rand = || {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            seed
        };

        for c in 0..COLOR_COUNT {
            for p in 0..PIECE_TYPE_COUNT {
                for s in 0..64 {
                    keys.pieces[c][p][s] = next_rand();
                }
            }
        }

        keys.side = next_rand();

        // Key 0 stays zero so that "no rights" does not perturb the hash;
        // a composite rights mask XORs the keys of its set bits.
        let single: [u64; 4] = [next_rand(), next_rand(), next_rand(), next_rand()];
        for mask in 1..16usize {
            for (bit, key) in single.iter().enumerate() {
                if mask & (1 << bit) != 0 {
                    keys.castling[mask] ^= key;
                }
            }
        }

        for f in 0..8 {
            keys.en_passant[f] = next_rand();
        }

        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_deterministic() {
        let a = Zobrist::build();
        let b = Zobrist::build();
        assert_eq!(a.pieces[0][0][0], b.pieces[0][0][0]);
        assert_eq!(a.side, b.side);
        assert_eq!(a.castling, b.castling);
    }

    #[test]
    fn test_castling_keys_compose() {
        let z = Zobrist::build();
        assert_eq!(z.castling[0], 0);
        assert_eq!(z.castling[0b0011], z.castling[0b0001] ^ z.castling[0b0010]);
        assert_eq!(
            z.castling[0b1111],
            z.castling[0b0001] ^ z.castling[0b0010] ^ z.castling[0b0100] ^ z.castling[0b1000]
        );
    }

    #[test]
    fn test_no_trivial_collisions() {
        let z = Zobrist::build();
        assert_ne!(z.pieces[0][0][0], z.pieces[0][0][1]);
        assert_ne!(z.pieces[0][0][0], z.pieces[1][0][0]);
        assert_ne!(z.side, 0);
    }
}

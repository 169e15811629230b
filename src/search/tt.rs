//! Lock-free clustered transposition table.
//!
//! Three 16-byte entries per cluster, one cluster per cache line. Entries
//! are a pair of relaxed atomic words; a torn read is caught by the 16-bit
//! key check and simply becomes a miss. Replacement prefers the shallowest,
//! stalest slot, where staleness is measured against a 5-bit search age.
//!
//! Word layout:
//!   data: [eval:16][score:16][move:16][key:16]
//!   meta: [age:5][pv:1][flag:2][depth:8]

use crate::mv::Move;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

pub const CLUSTER_SIZE: usize = 3;
const AGE_CYCLE: u16 = 32;
const AGE_STEP: u8 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum TTFlag {
    None = 0,
    Exact = 1,
    LowerBound = 2,
    UpperBound = 3,
}

impl TTFlag {
    fn from_bits(bits: u8) -> TTFlag {
        match bits & 3 {
            1 => TTFlag::Exact,
            2 => TTFlag::LowerBound,
            3 => TTFlag::UpperBound,
            _ => TTFlag::None,
        }
    }
}

#[derive(Default)]
struct Entry {
    data: AtomicU64,
    meta: AtomicU64,
}

#[repr(align(64))]
#[derive(Default)]
struct Cluster {
    entries: [Entry; CLUSTER_SIZE],
    _pad: [u64; 2],
}

/// A successful probe.
#[derive(Clone, Copy, Debug)]
pub struct TTHit {
    pub score: i32,
    pub eval: i32,
    pub mv: Move,
    pub depth: u8,
    pub flag: TTFlag,
    pub pv: bool,
}

/// Handle to the slot a probe settled on; stores go back to it.
#[derive(Clone, Copy)]
pub struct TTSlot {
    cluster: usize,
    entry: usize,
}

pub struct TranspositionTable {
    clusters: Vec<Cluster>,
    age: AtomicU8,
}

#[inline]
fn pack_data(key: u16, mv: Move, score: i16, eval: i16) -> u64 {
    (key as u64)
        | ((mv.raw() as u64) << 16)
        | (((score as u16) as u64) << 32)
        | (((eval as u16) as u64) << 48)
}

#[inline]
fn pack_meta(depth: u8, flag: TTFlag, pv: bool, age: u8) -> u64 {
    (depth as u64) | (((flag as u64) | ((pv as u64) << 2) | ((age as u64) << 3)) << 8)
}

#[inline]
fn meta_fields(meta: u64) -> (u8, TTFlag, bool, u8) {
    let depth = (meta & 0xFF) as u8;
    let info = ((meta >> 8) & 0xFF) as u8;
    (depth, TTFlag::from_bits(info), info & 4 != 0, info >> 3)
}

impl TranspositionTable {
    pub fn new(size_mb: usize) -> Self {
        let mut tt = TranspositionTable {
            clusters: Vec::new(),
            age: AtomicU8::new(0),
        };
        tt.resize(size_mb);
        tt
    }

    /// Reallocate to the requested size. Existing entries are discarded.
    pub fn resize(&mut self, size_mb: usize) {
        let bytes = size_mb.max(1) * 1024 * 1024;
        let count = bytes / std::mem::size_of::<Cluster>();
        let mut clusters = Vec::with_capacity(count);
        clusters.resize_with(count, Cluster::default);
        self.clusters = clusters;
        self.age.store(0, Ordering::Relaxed);
    }

    pub fn clear(&self) {
        for cluster in &self.clusters {
            for entry in &cluster.entries {
                entry.data.store(0, Ordering::Relaxed);
                entry.meta.store(0, Ordering::Relaxed);
            }
        }
        self.age.store(0, Ordering::Relaxed);
    }

    pub fn size_mb(&self) -> usize {
        self.clusters.len() * std::mem::size_of::<Cluster>() / (1024 * 1024)
    }

    /// Advance the search age; called once per `go` and on `ucinewgame`.
    pub fn new_search(&self) {
        let age = self.age.load(Ordering::Relaxed);
        self.age
            .store((age + AGE_STEP) % AGE_CYCLE as u8, Ordering::Relaxed);
    }

    /// High-multiply mapping of the full hash onto the cluster array.
    #[inline]
    pub fn cluster_index(&self, hash: u64) -> usize {
        ((hash as u128 * self.clusters.len() as u128) >> 64) as usize
    }

    /// Look up a hash. Returns the hit (if any) and the slot to store back
    /// into: the matching or empty entry, else the replacement victim.
    pub fn probe(&self, hash: u64) -> (Option<TTHit>, TTSlot) {
        let ci = self.cluster_index(hash);
        let key = hash as u16;
        let cur_age = self.age.load(Ordering::Relaxed);
        let cluster = &self.clusters[ci];

        for (ei, entry) in cluster.entries.iter().enumerate() {
            let data = entry.data.load(Ordering::Relaxed);
            let meta = entry.meta.load(Ordering::Relaxed);
            let (depth, flag, pv, _age) = meta_fields(meta);

            if flag == TTFlag::None {
                // Empty slot: miss, and the natural place to write
                return (None, TTSlot { cluster: ci, entry: ei });
            }
            if data as u16 == key {
                // Refresh the age so the entry survives replacement longer
                entry
                    .meta
                    .store(pack_meta(depth, flag, pv, cur_age), Ordering::Relaxed);
                let hit = TTHit {
                    score: ((data >> 32) as u16 as i16) as i32,
                    eval: ((data >> 48) as u16 as i16) as i32,
                    mv: Move::from_raw((data >> 16) as u16),
                    depth,
                    flag,
                    pv,
                };
                return (Some(hit), TTSlot { cluster: ci, entry: ei });
            }
        }

        // Miss: pick the entry minimising depth minus staleness
        let mut victim = 0;
        let mut victim_value = i32::MAX;
        for (ei, entry) in cluster.entries.iter().enumerate() {
            let (depth, _, _, age) = meta_fields(entry.meta.load(Ordering::Relaxed));
            let staleness = (AGE_CYCLE + cur_age as u16 - age as u16) % AGE_CYCLE;
            let value = depth as i32 - staleness as i32;
            if value < victim_value {
                victim_value = value;
                victim = ei;
            }
        }
        (None, TTSlot { cluster: ci, entry: victim })
    }

    /// Write through the slot a probe returned.
    #[allow(clippy::too_many_arguments)]
    pub fn store(
        &self,
        slot: TTSlot,
        hash: u64,
        mut mv: Move,
        score: i32,
        eval: i32,
        depth: u8,
        flag: TTFlag,
        pv: bool,
    ) {
        let entry = &self.clusters[slot.cluster].entries[slot.entry];
        let key = hash as u16;
        let old_data = entry.data.load(Ordering::Relaxed);
        let (old_depth, old_flag, _, _) = meta_fields(entry.meta.load(Ordering::Relaxed));
        let same_key = old_flag != TTFlag::None && old_data as u16 == key;

        // A null incoming move must not wipe a known-good one
        if mv.is_none() && same_key {
            mv = Move::from_raw((old_data >> 16) as u16);
        }
        // Never replace an Exact entry by a shallower bound of itself
        if same_key && old_flag == TTFlag::Exact && flag != TTFlag::Exact && depth < old_depth {
            return;
        }

        let age = self.age.load(Ordering::Relaxed);
        let score = score.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
        let eval = eval.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
        entry
            .data
            .store(pack_data(key, mv, score, eval), Ordering::Relaxed);
        entry
            .meta
            .store(pack_meta(depth, flag, pv, age), Ordering::Relaxed);
    }

    /// Permille of sampled entries holding data from the current age.
    pub fn hashfull(&self) -> usize {
        let cur_age = self.age.load(Ordering::Relaxed);
        let sample = self.clusters.len().min(1000);
        let mut used = 0;
        for cluster in &self.clusters[..sample] {
            for entry in &cluster.entries {
                let (_, flag, _, age) = meta_fields(entry.meta.load(Ordering::Relaxed));
                if flag != TTFlag::None && age == cur_age {
                    used += 1;
                }
            }
        }
        used * 1000 / (sample.max(1) * CLUSTER_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_is_cache_line_sized() {
        assert_eq!(std::mem::size_of::<Cluster>(), 64);
    }

    #[test]
    fn test_cluster_index_in_bounds() {
        let tt = TranspositionTable::new(1);
        for hash in [0u64, 1, u64::MAX, 0xDEAD_BEEF_CAFE_BABE, 1 << 63] {
            assert!(tt.cluster_index(hash) < tt.clusters.len());
        }
    }

    #[test]
    fn test_probe_store_round_trip() {
        let tt = TranspositionTable::new(1);
        let hash = 0x1234_5678_9ABC_DEF0u64;
        let (hit, slot) = tt.probe(hash);
        assert!(hit.is_none());

        let mv = Move::new(12, 28);
        tt.store(slot, hash, mv, 42, -17, 9, TTFlag::Exact, true);

        let (hit, _) = tt.probe(hash);
        let hit = hit.expect("stored entry must be found");
        assert_eq!(hit.score, 42);
        assert_eq!(hit.eval, -17);
        assert_eq!(hit.mv, mv);
        assert_eq!(hit.depth, 9);
        assert_eq!(hit.flag, TTFlag::Exact);
        assert!(hit.pv);
    }

    #[test]
    fn test_negative_scores_survive_packing() {
        let tt = TranspositionTable::new(1);
        for &score in &[0i32, 100, -100, 29_900, -29_900, 32_000, -32_000] {
            let hash = 0x9999_0000u64.wrapping_add(score as u64);
            let (_, slot) = tt.probe(hash);
            tt.store(slot, hash, Move::NONE, score, -score, 3, TTFlag::LowerBound, false);
            let (hit, _) = tt.probe(hash);
            let hit = hit.unwrap();
            assert_eq!(hit.score, score.clamp(-32768, 32767));
            assert_eq!(hit.eval, (-score).clamp(-32768, 32767));
        }
    }

    #[test]
    fn test_null_move_preserves_existing() {
        let tt = TranspositionTable::new(1);
        let hash = 0xABCDu64;
        let mv = Move::new(6, 21);
        let (_, slot) = tt.probe(hash);
        tt.store(slot, hash, mv, 10, 0, 5, TTFlag::Exact, false);

        let (_, slot) = tt.probe(hash);
        tt.store(slot, hash, Move::NONE, 12, 0, 7, TTFlag::Exact, false);
        let (hit, _) = tt.probe(hash);
        assert_eq!(hit.unwrap().mv, mv);
    }

    #[test]
    fn test_exact_not_downgraded() {
        let tt = TranspositionTable::new(1);
        let hash = 0x7777u64;
        let (_, slot) = tt.probe(hash);
        tt.store(slot, hash, Move::new(1, 2), 50, 0, 10, TTFlag::Exact, true);

        // Shallower bound of the same position: refused
        let (_, slot) = tt.probe(hash);
        tt.store(slot, hash, Move::new(3, 4), -5, 0, 4, TTFlag::UpperBound, false);
        let (hit, _) = tt.probe(hash);
        let hit = hit.unwrap();
        assert_eq!(hit.depth, 10);
        assert_eq!(hit.flag, TTFlag::Exact);

        // Deeper bound replaces
        let (_, slot) = tt.probe(hash);
        tt.store(slot, hash, Move::new(3, 4), -5, 0, 12, TTFlag::UpperBound, false);
        let (hit, _) = tt.probe(hash);
        assert_eq!(hit.unwrap().depth, 12);
    }

    #[test]
    fn test_clear_empties_table() {
        let tt = TranspositionTable::new(1);
        let (_, slot) = tt.probe(0x42);
        tt.store(slot, 0x42, Move::new(0, 8), 1, 1, 1, TTFlag::Exact, false);
        tt.clear();
        let (hit, _) = tt.probe(0x42);
        assert!(hit.is_none());
    }

    #[test]
    fn test_aging_prefers_stale_victims() {
        let tt = TranspositionTable::new(1);
        let hash = 0x5555_5555_5555_5555u64;
        let ci = tt.cluster_index(hash);

        // Fill the cluster with old-age entries of varying depth
        for i in 0..CLUSTER_SIZE {
            let slot = TTSlot { cluster: ci, entry: i };
            tt.store(slot, hash ^ (i as u64), Move::NONE, 0, 0, (20 + i) as u8, TTFlag::LowerBound, false);
        }
        // Several searches pass
        for _ in 0..8 {
            tt.new_search();
        }
        // The victim for a fresh miss must be the shallowest stale entry
        let (hit, slot) = tt.probe(hash ^ 0xFFFF);
        assert!(hit.is_none());
        assert_eq!(slot.entry, 0);
    }
}

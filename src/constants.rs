//! Opal Core Constants
//!
//! Centralized constants for the chess engine to avoid magic numbers
//! and ensure consistency across modules.

/// Engine identification
pub const ENGINE_NAME: &str = "Opal";
pub const ENGINE_VERSION: &str = "1.0.0";
pub const ENGINE_AUTHOR: &str = "the Opal developers";

/// Default NNUE weight file probed at startup
pub const DEFAULT_NET_PATH: &str = "opal.nnue";

/// Search constants
pub const MATE_SCORE: i32 = 30000;
pub const INFINITY: i32 = 32000;
pub const DRAW_SCORE: i32 = 0;
pub const MAX_PLY: usize = 128;
/// Scores beyond this bound encode a mate distance
pub const MATE_BOUND: i32 = MATE_SCORE - MAX_PLY as i32;

/// State stack capacity: longest supported game plus search overshoot
pub const MAX_GAME_PLY: usize = 1024;

/// Default transposition table size in MB
pub const DEFAULT_TT_SIZE_MB: usize = 16;
/// Maximum TT size in MB
pub const MAX_TT_SIZE_MB: usize = 65536;

/// Default thread count
pub const DEFAULT_THREADS: usize = 1;
/// Maximum thread count
pub const MAX_THREADS: usize = 256;

/// Default move overhead in milliseconds
pub const DEFAULT_MOVE_OVERHEAD_MS: u64 = 30;
/// Maximum move overhead in milliseconds
pub const MAX_MOVE_OVERHEAD_MS: u64 = 5000;

/// MultiPV bounds
pub const DEFAULT_MULTIPV: usize = 1;
pub const MAX_MULTIPV: usize = 256;

/// Piece values used for material bookkeeping, MVV/LVA and pruning margins
pub const PIECE_VALUES: [i32; 6] = [100, 320, 330, 500, 900, 0];

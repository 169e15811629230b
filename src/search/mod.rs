//! Alpha-beta search: iterative deepening, aspiration windows, principal
//! variation search with the usual pruning and reduction family, and a
//! quiescence tail.
//!
//! One `Worker` per thread. Everything a worker touches besides the shared
//! transposition table, stop flag and node counter is thread-private.

pub mod lazy_smp;
pub mod time;
pub mod tt;

use crate::board::Board;
use crate::constants::*;
use crate::defs::PieceType;
use crate::movegen::{self, GenType};
use crate::mv::{Move, MoveList};
use crate::search::time::TimeManager;
use crate::search::tt::{TTFlag, TranspositionTable};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::Instant;

pub const MAX_DEPTH: i32 = 64;

/// Sentinel for "no static eval cached" (in-check nodes, empty TT slots).
pub const EVAL_NONE: i32 = i16::MIN as i32;

// Pruning and reduction tuning constants
const ASPIRATION_MIN_DEPTH: i32 = 4;
const ASPIRATION_BASE: i32 = 12;
const ASPIRATION_MARGIN: i32 = 4;
const RFP_MAX_DEPTH: i32 = 8;
const RFP_MARGIN: i32 = 75;
const RFP_IMPROVING: i32 = 50;
const RAZOR_MAX_DEPTH: i32 = 3;
const RAZOR_MARGIN: i32 = 250;
const NMP_MIN_DEPTH: i32 = 3;
const IID_MIN_DEPTH: i32 = 6;
const LMP_MAX_DEPTH: i32 = 8;
const FP_MAX_DEPTH: i32 = 6;
const FP_MARGIN: i32 = 120;
const LMR_MIN_DEPTH: i32 = 3;
const LMR_CHECK_DEPTH: i32 = 6;
const QS_DELTA_MARGIN: i32 = 200;
const HISTORY_MAX: i32 = 16384;

lazy_static::lazy_static! {
    /// Log-based reduction table indexed by [depth][move index].
    static ref REDUCTIONS: [[i32; 64]; 64] = {
        let mut table = [[0; 64]; 64];
        for d in 1..64 {
            for m in 1..64 {
                let r = 0.75 + (d as f64).ln() * (m as f64).ln() / 2.25;
                table[d][m] = r as i32;
            }
        }
        table
    };
}

#[inline]
fn lmp_threshold(depth: i32, improving: bool) -> usize {
    let base = 3 + depth as usize * depth as usize;
    if improving {
        base
    } else {
        base / 2
    }
}

/// History bonus for a move of the cutoff depth.
#[inline]
fn history_bonus(depth: i32) -> i32 {
    (350 * (depth + 1) - 550).min(1550)
}

/// Mate scores are stored in the TT relative to the storing node, so the
/// distance stays meaningful wherever the entry is found again.
#[inline]
fn score_to_tt(score: i32, ply: usize) -> i32 {
    if score >= MATE_BOUND {
        score + ply as i32
    } else if score <= -MATE_BOUND {
        score - ply as i32
    } else {
        score
    }
}

#[inline]
fn score_from_tt(score: i32, ply: usize) -> i32 {
    if score >= MATE_BOUND {
        score - ply as i32
    } else if score <= -MATE_BOUND {
        score + ply as i32
    } else {
        score
    }
}

/// Optional endgame-tablebase probe: `(wdl, score)` for positions the
/// tables cover, None otherwise. The probe itself lives outside the core;
/// search only consumes it.
pub type TbProbe = fn(&Board) -> Option<(i8, i32)>;

#[derive(Clone, Default, Debug)]
pub struct SearchLimits {
    pub depth: Option<i32>,
    pub nodes: Option<u64>,
    pub movetime: Option<u64>,
    pub wtime: Option<u64>,
    pub btime: Option<u64>,
    pub winc: Option<u64>,
    pub binc: Option<u64>,
    pub movestogo: Option<u32>,
    pub infinite: bool,
}

#[derive(Clone)]
pub struct RootMove {
    pub mv: Move,
    pub score: i32,
    pub prev_score: i32,
    pub pv: Vec<Move>,
}

/// What a thread hands back when the search ends.
#[derive(Clone)]
pub struct ThreadResult {
    pub best_move: Move,
    pub ponder: Move,
    pub score: i32,
    pub depth: i32,
}

impl Default for ThreadResult {
    fn default() -> Self {
        ThreadResult {
            best_move: Move::NONE,
            ponder: Move::NONE,
            score: -INFINITY,
            depth: 0,
        }
    }
}

pub struct Worker {
    pub id: usize,
    pub board: Board,
    pub tt: Arc<TranspositionTable>,
    pub stop: Arc<AtomicBool>,
    pub global_nodes: Arc<AtomicU64>,
    /// Only the main thread owns a time manager
    pub time: Option<Arc<TimeManager>>,
    pub limits: SearchLimits,
    pub multipv: usize,
    pub root_moves: Vec<RootMove>,
    pub tb_probe: Option<TbProbe>,

    nodes: u64,
    ply: usize,
    stopped: bool,
    killers: [[Move; 2]; MAX_PLY],
    history: [[[i32; 64]; 64]; 2],
    capture_history: [[[i32; 6]; 64]; 6],
    eval_stack: [i32; MAX_PLY],
    pv_table: Box<[[Move; MAX_PLY]; MAX_PLY]>,
    pv_len: [usize; MAX_PLY],
}

impl Worker {
    pub fn new(
        id: usize,
        board: Board,
        tt: Arc<TranspositionTable>,
        stop: Arc<AtomicBool>,
        global_nodes: Arc<AtomicU64>,
        time: Option<Arc<TimeManager>>,
        limits: SearchLimits,
        multipv: usize,
    ) -> Self {
        Worker {
            id,
            board,
            tt,
            stop,
            global_nodes,
            time,
            limits,
            multipv,
            root_moves: Vec::new(),
            tb_probe: None,
            nodes: 0,
            ply: 0,
            stopped: false,
            killers: [[Move::NONE; 2]; MAX_PLY],
            history: [[[0; 64]; 64]; 2],
            capture_history: [[[0; 6]; 64]; 6],
            eval_stack: [EVAL_NONE; MAX_PLY],
            pv_table: Box::new([[Move::NONE; MAX_PLY]; MAX_PLY]),
            pv_len: [0; MAX_PLY],
        }
    }

    /// Iterative deepening driver. Returns the deepest fully-completed
    /// iteration's result; partial iterations after a stop are discarded.
    pub fn iterative_deepening(
        &mut self,
        tx: Option<&Sender<String>>,
        started: Instant,
    ) -> ThreadResult {
        self.seed_root_moves();
        if self.root_moves.is_empty() {
            // Mated or stalemated at the root
            return ThreadResult {
                score: if self.board.in_check() { -MATE_SCORE } else { DRAW_SCORE },
                ..ThreadResult::default()
            };
        }

        let mut best = ThreadResult {
            best_move: self.root_moves[0].mv,
            ponder: Move::NONE,
            score: -INFINITY,
            depth: 0,
        };
        let max_depth = self.limits.depth.unwrap_or(MAX_DEPTH).clamp(1, MAX_DEPTH);
        let multipv = self.multipv.min(self.root_moves.len());
        let mut last_score = 0;

        // Helpers start with slightly different aspiration widths so the
        // pool explores alternate move orders
        let jitter = (self.id % 4) as i32 * 7;

        for depth in 1..=max_depth {
            for rm in self.root_moves.iter_mut() {
                rm.prev_score = rm.score;
            }

            for pv_idx in 0..multipv {
                let target = if pv_idx == 0 {
                    last_score
                } else {
                    self.root_moves[pv_idx].prev_score
                };

                let mut alpha = -INFINITY;
                let mut beta = INFINITY;
                if depth >= ASPIRATION_MIN_DEPTH {
                    let w = ASPIRATION_BASE + depth * ASPIRATION_MARGIN + jitter;
                    alpha = (target - w).max(-INFINITY);
                    beta = (target + w).min(INFINITY);
                }

                let score = self.search_root(alpha, beta, depth, pv_idx);
                if (score <= alpha || score >= beta) && !self.should_abort() {
                    // Fail outside the window: redo the whole depth wide
                    // open, node delta reset so it is not double-counted
                    self.flush_nodes();
                    self.search_root(-INFINITY, INFINITY, depth, pv_idx);
                }
                self.sort_root_moves(pv_idx);
                if self.should_abort() {
                    break;
                }
            }

            if self.should_abort() {
                break;
            }

            // Iteration completed: publish
            let changed = best.best_move != self.root_moves[0].mv;
            best = ThreadResult {
                best_move: self.root_moves[0].mv,
                ponder: self.root_moves[0].pv.get(1).copied().unwrap_or(Move::NONE),
                score: self.root_moves[0].score,
                depth,
            };
            last_score = best.score;

            if let Some(tx) = tx {
                self.report(tx, depth, multipv, started);
            }
            if let Some(tm) = &self.time {
                tm.update_iteration(depth as u32, changed);
                if tm.should_stop_soft() {
                    self.stop.store(true, Ordering::Relaxed);
                    break;
                }
            }
            if let Some(budget) = self.limits.nodes {
                if self.total_nodes() >= budget {
                    self.stop.store(true, Ordering::Relaxed);
                    break;
                }
            }
            // A found mate closer than the horizon cannot be improved upon
            if best.score.abs() >= MATE_SCORE - depth {
                break;
            }
        }

        self.flush_nodes();
        best
    }

    fn seed_root_moves(&mut self) {
        let mut list = MoveList::new();
        movegen::generate_legal(&self.board, &mut list);
        self.score_moves(&mut list, Move::NONE);
        self.root_moves = (0..list.count)
            .map(|i| {
                let mv = list.pick(i).expect("index in range");
                RootMove {
                    mv,
                    score: -INFINITY,
                    prev_score: -INFINITY,
                    pv: vec![mv],
                }
            })
            .collect();
    }

    /// Stable sort of the lines still in play this iteration; searched
    /// lines above `from` keep their slots.
    fn sort_root_moves(&mut self, from: usize) {
        self.root_moves[from..].sort_by(|a, b| b.score.cmp(&a.score));
    }

    fn search_root(&mut self, mut alpha: i32, beta: i32, depth: i32, pv_idx: usize) -> i32 {
        self.ply = 0;
        self.pv_len[0] = 0;
        for rm in self.root_moves[pv_idx..].iter_mut() {
            rm.score = -INFINITY;
        }

        let mut best_score = -INFINITY;
        let mut move_count = 0usize;

        for i in pv_idx..self.root_moves.len() {
            let m = self.root_moves[i].mv;
            self.board.make_move(m);
            self.ply = 1;
            move_count += 1;

            let mut score;
            if move_count == 1 {
                score = -self.alpha_beta(-beta, -alpha, depth - 1, false);
            } else {
                score = -self.alpha_beta(-alpha - 1, -alpha, depth - 1, true);
                if score > alpha && !self.stopped {
                    score = -self.alpha_beta(-beta, -alpha, depth - 1, false);
                }
            }

            self.ply = 0;
            self.board.unmake_move(m);
            if self.stopped {
                return best_score;
            }

            if move_count == 1 || score > alpha {
                self.root_moves[i].score = score;
                self.update_pv(0, m);
                self.root_moves[i].pv = self.pv_table[0][..self.pv_len[0]].to_vec();
            }

            if score > best_score {
                best_score = score;
            }
            if score > alpha {
                alpha = score;
                if score >= beta {
                    break;
                }
            }
        }

        best_score
    }

    /// The main alpha-beta node. `depth <= 0` falls into quiescence;
    /// `cut_node` marks expected fail-highs for reduction decisions.
    fn alpha_beta(&mut self, mut alpha: i32, mut beta: i32, mut depth: i32, cut_node: bool) -> i32 {
        let is_pv = beta - alpha > 1;
        let ply = self.ply;
        self.pv_len[ply] = 0;

        let in_check = self.board.in_check();
        // Worth one extra ply: forced lines resolve instead of being cut
        // off at the horizon
        if in_check {
            depth += 1;
        }

        if depth <= 0 {
            return self.quiescence(alpha, beta);
        }

        self.visit_node();
        if self.stopped {
            return 0;
        }

        if self.board.is_draw(ply) {
            return DRAW_SCORE;
        }
        if ply >= MAX_PLY - 1 {
            return if in_check { DRAW_SCORE } else { self.board.evaluate() };
        }

        // Tablebase hook: an exact result ends the subtree
        if let Some(probe) = self.tb_probe {
            if let Some((_wdl, score)) = probe(&self.board) {
                return score;
            }
        }

        // Mate distance pruning: no line from here can beat a mate already
        // proven closer to the root
        alpha = alpha.max(-MATE_SCORE + ply as i32);
        beta = beta.min(MATE_SCORE - ply as i32 - 1);
        if alpha >= beta {
            return alpha;
        }

        let hash = self.board.hash();
        let (tt_hit, tt_slot) = self.tt.probe(hash);
        let mut tt_move = Move::NONE;
        let mut tt_eval = EVAL_NONE;
        if let Some(hit) = &tt_hit {
            if self.board.is_pseudo_legal(hit.mv) {
                tt_move = hit.mv;
            }
            tt_eval = hit.eval;
            if !is_pv && hit.depth as i32 >= depth {
                let score = score_from_tt(hit.score, ply);
                match hit.flag {
                    TTFlag::Exact => return score,
                    TTFlag::LowerBound if score >= beta => return score,
                    TTFlag::UpperBound if score <= alpha => return score,
                    _ => {}
                }
            }
        }

        // Static eval; in check it stays unknown and the eval-based
        // prunings below are skipped
        let static_eval = if in_check {
            EVAL_NONE
        } else if tt_eval != EVAL_NONE {
            tt_eval
        } else {
            self.board.evaluate()
        };
        self.eval_stack[ply] = static_eval;
        let improving = !in_check
            && ply >= 2
            && (self.eval_stack[ply - 2] == EVAL_NONE || static_eval > self.eval_stack[ply - 2]);

        if !is_pv && !in_check {
            // Reverse futility: standing far enough above beta that a
            // shallow search will not come back down
            let rfp_margin = RFP_MARGIN * depth - if improving { RFP_IMPROVING } else { 0 };
            if depth <= RFP_MAX_DEPTH && static_eval - rfp_margin >= beta {
                return beta;
            }

            // Razoring: hopeless statics drop straight into quiescence
            if depth <= RAZOR_MAX_DEPTH && static_eval + RAZOR_MARGIN * depth <= alpha {
                let score = self.quiescence(alpha, beta);
                if score <= alpha {
                    return score;
                }
            }

            // Null move: hand over the turn; zugzwang guarded by the
            // non-pawn-material test and no back-to-back nulls
            if depth >= NMP_MIN_DEPTH
                && static_eval >= beta
                && self.board.st().plies_from_null > 0
                && self.board.has_non_pawn_material(self.board.side)
            {
                let r = 3 + depth / 4;
                self.board.make_null_move();
                self.ply += 1;
                let score = -self.alpha_beta(-beta, -beta + 1, depth - 1 - r, !cut_node);
                self.ply -= 1;
                self.board.unmake_null_move();
                if self.stopped {
                    return 0;
                }
                if score >= beta {
                    return beta;
                }
            }
        }

        // Internal iterative deepening: a PV node with no table move gets
        // a shallower pass first to find one
        if is_pv && tt_move.is_none() && depth >= IID_MIN_DEPTH {
            depth -= 2;
        }

        let mut list = MoveList::new();
        movegen::generate(
            &self.board,
            if in_check { GenType::Evasions } else { GenType::NonEvasions },
            &mut list,
        );
        self.score_moves(&mut list, tt_move);

        let mut best_score = -INFINITY;
        let mut best_move = Move::NONE;
        let mut move_count = 0usize;
        // Fixed-size scratch: no allocation inside the node loop
        let mut quiets_tried = [Move::NONE; 64];
        let mut n_quiets = 0usize;
        let mut captures_tried = [Move::NONE; 32];
        let mut n_captures = 0usize;

        for i in 0..list.count {
            let m = list.pick(i).expect("index in range");
            if !self.board.is_legal(m) {
                continue;
            }

            let is_capture = self.board.is_capture(m);
            let is_quiet = !is_capture && m.promotion_piece().is_none();
            let gives_check = self.board.gives_check(m);

            if !is_pv && !in_check && is_quiet && best_score > -MATE_BOUND {
                // Late-move pruning: enough quiets have failed already
                if depth <= LMP_MAX_DEPTH && move_count >= lmp_threshold(depth, improving) {
                    continue;
                }
                // Futility: the static eval cannot be pulled back to alpha
                if depth <= FP_MAX_DEPTH
                    && move_count > 0
                    && static_eval + FP_MARGIN * depth < alpha
                {
                    continue;
                }
            }

            let moved = self.board.piece_on(m.source()).expect("mover present");
            self.board.make_move(m);
            self.ply += 1;
            move_count += 1;

            let new_depth = depth - 1;
            let mut score;
            if move_count == 1 {
                score = -self.alpha_beta(-beta, -alpha, new_depth, false);
            } else {
                // Late-move reductions for quiets, from the log table with
                // the usual nudges
                let mut r = 0;
                if is_quiet && depth >= LMR_MIN_DEPTH && move_count > 1 + is_pv as usize {
                    r = REDUCTIONS[depth.min(63) as usize][move_count.min(63)];
                    if is_pv {
                        r -= 1;
                    }
                    if m == tt_move {
                        r -= 1;
                    }
                    if gives_check && depth >= LMR_CHECK_DEPTH {
                        r -= 1;
                    }
                    if in_check && moved == PieceType::King {
                        r -= 1;
                    }
                    if !improving {
                        r += 1;
                    }
                }
                let reduced = if r > 0 {
                    (new_depth - r).clamp(1, new_depth)
                } else {
                    new_depth
                };

                score = -self.alpha_beta(-alpha - 1, -alpha, reduced, true);
                if score > alpha && reduced < new_depth && !self.stopped {
                    score = -self.alpha_beta(-alpha - 1, -alpha, new_depth, !cut_node);
                }
                if is_pv && score > alpha && score < beta && !self.stopped {
                    score = -self.alpha_beta(-beta, -alpha, new_depth, false);
                }
            }

            self.ply -= 1;
            self.board.unmake_move(m);
            if self.stopped {
                return 0;
            }

            if score > best_score {
                best_score = score;
                if score > alpha {
                    best_move = m;
                    alpha = score;
                    if is_pv {
                        self.update_pv(ply, m);
                    }
                    if score >= beta {
                        break;
                    }
                }
            }

            if is_quiet && n_quiets < quiets_tried.len() {
                quiets_tried[n_quiets] = m;
                n_quiets += 1;
            } else if is_capture && n_captures < captures_tried.len() {
                captures_tried[n_captures] = m;
                n_captures += 1;
            }
        }

        if move_count == 0 {
            return if in_check {
                -MATE_SCORE + ply as i32
            } else {
                DRAW_SCORE
            };
        }

        if best_score >= beta {
            self.update_heuristics(
                best_move,
                depth,
                &quiets_tried[..n_quiets],
                &captures_tried[..n_captures],
            );
        }

        let flag = if best_score >= beta {
            TTFlag::LowerBound
        } else if !best_move.is_none() {
            TTFlag::Exact
        } else {
            TTFlag::UpperBound
        };
        self.tt.store(
            tt_slot,
            hash,
            best_move,
            score_to_tt(best_score, ply),
            static_eval,
            depth.clamp(0, 255) as u8,
            flag,
            is_pv,
        );

        best_score
    }

    /// Captures-only tail search. In check it widens to full evasions so
    /// mates at the horizon are not missed.
    fn quiescence(&mut self, mut alpha: i32, beta: i32) -> i32 {
        self.visit_node();
        if self.stopped {
            return 0;
        }

        let ply = self.ply;
        if self.board.is_draw(ply) {
            return DRAW_SCORE;
        }

        let in_check = self.board.in_check();
        if ply >= MAX_PLY - 1 {
            return if in_check { DRAW_SCORE } else { self.board.evaluate() };
        }

        let mut stand_pat = -INFINITY;
        if !in_check {
            stand_pat = self.board.evaluate();
            if stand_pat >= beta {
                return beta;
            }
            if stand_pat > alpha {
                alpha = stand_pat;
            }
        }

        let mut list = MoveList::new();
        movegen::generate(
            &self.board,
            if in_check { GenType::Evasions } else { GenType::Loud },
            &mut list,
        );
        self.score_moves(&mut list, Move::NONE);

        let mut move_count = 0usize;
        for i in 0..list.count {
            let m = list.pick(i).expect("index in range");
            if !self.board.is_legal(m) {
                continue;
            }

            // Delta pruning: even winning this piece cannot reach alpha
            if !in_check && m.promotion_piece().is_none() {
                if let Some(victim) = self.board.victim_of(m) {
                    if stand_pat + PIECE_VALUES[victim as usize] + QS_DELTA_MARGIN < alpha {
                        continue;
                    }
                }
            }

            self.board.make_move(m);
            self.ply += 1;
            move_count += 1;
            let score = -self.quiescence(-beta, -alpha);
            self.ply -= 1;
            self.board.unmake_move(m);
            if self.stopped {
                return 0;
            }

            if score >= beta {
                return beta;
            }
            if score > alpha {
                alpha = score;
            }
        }

        if in_check && move_count == 0 {
            return -MATE_SCORE + ply as i32;
        }

        alpha
    }

    // ------------------------------------------------------------------
    // Move ordering and heuristics
    // ------------------------------------------------------------------

    /// Score a pseudo-legal list: TT move, captures by MVV/LVA plus
    /// capture history, killers, then quiet history.
    fn score_moves(&self, list: &mut MoveList, tt_move: Move) {
        let side = self.board.side as usize;
        for i in 0..list.count {
            let m = list.moves[i];
            list.scores[i] = if m == tt_move {
                1_000_000
            } else if let Some(victim) = self.board.victim_of(m) {
                let attacker = self
                    .board
                    .piece_on(m.source())
                    .unwrap_or(PieceType::Pawn);
                200_000
                    + PIECE_VALUES[victim as usize] * 10
                    - PIECE_VALUES[attacker as usize] / 10
                    + self.capture_history[attacker as usize][m.target() as usize]
                        [victim as usize]
            } else if m.promotion_piece() == Some(PieceType::Queen) {
                150_000
            } else if m == self.killers[self.ply][0] {
                100_000
            } else if m == self.killers[self.ply][1] {
                90_000
            } else {
                self.history[side][m.source() as usize][m.target() as usize]
            };
        }
    }

    /// Killer and history updates after a fail-high: reward the cutoff
    /// move, tax the earlier tries of its own category.
    fn update_heuristics(
        &mut self,
        best: Move,
        depth: i32,
        quiets_tried: &[Move],
        captures_tried: &[Move],
    ) {
        let bonus = history_bonus(depth);
        let side = self.board.side as usize;

        if self.board.is_capture(best) || best.promotion_piece().is_some() {
            if let Some(victim) = self.board.victim_of(best) {
                let attacker = self.board.piece_on(best.source()).unwrap_or(PieceType::Pawn);
                let slot = &mut self.capture_history[attacker as usize][best.target() as usize]
                    [victim as usize];
                *slot += bonus - *slot * bonus / HISTORY_MAX;
            }
            for &m in captures_tried {
                if m == best {
                    continue;
                }
                if let Some(victim) = self.board.victim_of(m) {
                    let attacker =
                        self.board.piece_on(m.source()).unwrap_or(PieceType::Pawn);
                    let slot = &mut self.capture_history[attacker as usize]
                        [m.target() as usize][victim as usize];
                    *slot += -bonus - *slot * bonus / HISTORY_MAX;
                }
            }
        } else {
            if self.killers[self.ply][0] != best {
                self.killers[self.ply][1] = self.killers[self.ply][0];
                self.killers[self.ply][0] = best;
            }
            let slot =
                &mut self.history[side][best.source() as usize][best.target() as usize];
            *slot += bonus - *slot * bonus / HISTORY_MAX;

            for &m in quiets_tried {
                if m == best {
                    continue;
                }
                let slot = &mut self.history[side][m.source() as usize][m.target() as usize];
                *slot += -bonus - *slot * bonus / HISTORY_MAX;
            }
        }
    }

    fn update_pv(&mut self, ply: usize, m: Move) {
        let child_len = self.pv_len[ply + 1];
        let (head, tail) = self.pv_table.split_at_mut(ply + 1);
        head[ply][0] = m;
        head[ply][1..=child_len].copy_from_slice(&tail[0][..child_len]);
        self.pv_len[ply] = child_len + 1;
    }

    // ------------------------------------------------------------------
    // Bookkeeping
    // ------------------------------------------------------------------

    /// Per-node housekeeping: count, and every 4096 nodes consult the time
    /// manager / node budget / stop flag.
    #[inline]
    fn visit_node(&mut self) {
        self.nodes += 1;
        if self.nodes & 4095 == 0 {
            self.global_nodes.fetch_add(4096, Ordering::Relaxed);
            if let Some(tm) = &self.time {
                if tm.should_stop_hard() {
                    self.stop.store(true, Ordering::Relaxed);
                }
            }
            if let Some(budget) = self.limits.nodes {
                if self.global_nodes.load(Ordering::Relaxed) >= budget {
                    self.stop.store(true, Ordering::Relaxed);
                }
            }
            if self.stop.load(Ordering::Relaxed) {
                self.stopped = true;
            }
        }
    }

    fn flush_nodes(&mut self) {
        self.global_nodes
            .fetch_add(self.nodes & 4095, Ordering::Relaxed);
        self.nodes &= !4095;
    }

    #[inline]
    fn should_abort(&self) -> bool {
        self.stopped || self.stop.load(Ordering::Relaxed)
    }

    fn total_nodes(&self) -> u64 {
        self.global_nodes.load(Ordering::Relaxed) + (self.nodes & 4095)
    }

    /// One UCI info line per MultiPV slot.
    fn report(&self, tx: &Sender<String>, depth: i32, multipv: usize, started: Instant) {
        let nodes = self.total_nodes();
        let elapsed = started.elapsed();
        let ms = elapsed.as_millis().max(1) as u64;
        let nps = nodes * 1000 / ms;

        for (idx, rm) in self.root_moves.iter().take(multipv).enumerate() {
            let score = if rm.score.abs() >= MATE_BOUND {
                let mate_in = (MATE_SCORE - rm.score.abs() + 1) / 2;
                format!("mate {}", if rm.score > 0 { mate_in } else { -mate_in })
            } else {
                format!("cp {}", rm.score)
            };
            let pv: Vec<String> = rm
                .pv
                .iter()
                .map(|m| m.to_uci(self.board.chess960))
                .collect();
            let mut line = format!(
                "info depth {} multipv {} score {} nodes {} nps {} hashfull {} time {}",
                depth,
                idx + 1,
                score,
                nodes,
                nps,
                self.tt.hashfull(),
                ms
            );
            if !pv.is_empty() {
                line.push_str(" pv ");
                line.push_str(&pv.join(" "));
            }
            let _ = tx.send(line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_search(fen: &str, depth: i32) -> (ThreadResult, Worker) {
        let board = Board::from_fen(fen).unwrap();
        let tt = Arc::new(TranspositionTable::new(8));
        let limits = SearchLimits {
            depth: Some(depth),
            ..Default::default()
        };
        let mut worker = Worker::new(
            0,
            board,
            tt,
            Arc::new(AtomicBool::new(false)),
            Arc::new(AtomicU64::new(0)),
            None,
            limits,
            1,
        );
        let result = worker.iterative_deepening(None, Instant::now());
        (result, worker)
    }

    #[test]
    fn test_depth_one_returns_legal_move() {
        let (result, worker) = run_search(crate::board::START_FEN, 1);
        assert!(!result.best_move.is_none());
        let mut list = MoveList::new();
        movegen::generate_legal(&worker.board, &mut list);
        assert!(list.contains(result.best_move));
        assert_eq!(result.depth, 1);
    }

    #[test]
    fn test_finds_mate_in_one() {
        // Back-rank mate: Ra8#
        let (result, _) = run_search("6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1", 4);
        assert_eq!(result.best_move.to_uci(false), "a1a8");
        assert_eq!(result.score, MATE_SCORE - 1);
    }

    #[test]
    fn test_finds_mate_in_kq_vs_k() {
        // KQ vs K, strong side well placed: a forced mate within reach
        let (result, _) = run_search("8/8/8/8/8/2k5/2q5/K7 b - - 0 1", 6);
        assert!(result.score >= MATE_SCORE - 10, "score {}", result.score);
    }

    #[test]
    fn test_stalemate_scores_draw() {
        let (result, _) = run_search("k1K5/2Q5/8/8/8/8/8/8 b - - 0 1", 4);
        assert!(result.best_move.is_none());
        assert_eq!(result.score, DRAW_SCORE);
    }

    #[test]
    fn test_grabs_hanging_queen() {
        let (result, _) = run_search("4k3/8/8/3q4/4P3/8/8/4K3 w - - 0 1", 3);
        assert_eq!(result.best_move.to_uci(false), "e4d5");
    }

    #[test]
    fn test_mate_scores_relative_to_node() {
        assert_eq!(score_to_tt(MATE_SCORE - 5, 3), MATE_SCORE - 2);
        assert_eq!(score_from_tt(MATE_SCORE - 2, 3), MATE_SCORE - 5);
        assert_eq!(score_to_tt(-MATE_SCORE + 5, 3), -MATE_SCORE + 2);
        assert_eq!(score_from_tt(-MATE_SCORE + 2, 3), -MATE_SCORE + 5);
        assert_eq!(score_to_tt(123, 7), 123);
    }

    #[test]
    fn test_history_bonus_formula() {
        assert_eq!(history_bonus(1), 150);
        assert_eq!(history_bonus(5), 1550);
        assert_eq!(history_bonus(20), 1550);
    }

    #[test]
    fn test_node_budget_respected() {
        let board = Board::new();
        let tt = Arc::new(TranspositionTable::new(8));
        let limits = SearchLimits {
            nodes: Some(20_000),
            ..Default::default()
        };
        let mut worker = Worker::new(
            0,
            board,
            tt,
            Arc::new(AtomicBool::new(false)),
            Arc::new(AtomicU64::new(0)),
            None,
            limits,
            1,
        );
        let result = worker.iterative_deepening(None, Instant::now());
        assert!(!result.best_move.is_none());
        // Batched counting leaves at most one batch of overshoot
        assert!(worker.total_nodes() < 20_000 + 8192);
    }

    #[test]
    fn test_tb_probe_hook_is_consulted() {
        fn everything_is_drawn(_: &Board) -> Option<(i8, i32)> {
            Some((0, 0))
        }
        let board = Board::new();
        let tt = Arc::new(TranspositionTable::new(8));
        let limits = SearchLimits {
            depth: Some(4),
            ..Default::default()
        };
        let mut worker = Worker::new(
            0,
            board,
            tt,
            Arc::new(AtomicBool::new(false)),
            Arc::new(AtomicU64::new(0)),
            None,
            limits,
            1,
        );
        worker.tb_probe = Some(everything_is_drawn);
        let result = worker.iterative_deepening(None, Instant::now());
        assert_eq!(result.score, 0);
    }

    #[test]
    fn test_multipv_returns_distinct_lines() {
        let board = Board::new();
        let tt = Arc::new(TranspositionTable::new(8));
        let limits = SearchLimits {
            depth: Some(4),
            ..Default::default()
        };
        let mut worker = Worker::new(
            0,
            board,
            tt,
            Arc::new(AtomicBool::new(false)),
            Arc::new(AtomicU64::new(0)),
            None,
            limits,
            3,
        );
        let _ = worker.iterative_deepening(None, Instant::now());
        let first = worker.root_moves[0].mv;
        let second = worker.root_moves[1].mv;
        assert_ne!(first, second);
        assert!(worker.root_moves[0].score >= worker.root_moves[1].score);
        assert!(worker.root_moves[1].score >= worker.root_moves[2].score);
    }
}

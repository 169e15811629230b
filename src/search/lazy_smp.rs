//! Lazy-SMP thread pool.
//!
//! One main worker plus helpers, all probing and feeding the same
//! transposition table from their own copy of the position. The main
//! worker alone reports info lines and consults the time manager; helpers
//! differ only in their aspiration jitter. `bestmove` goes out once every
//! worker has joined, from the deepest result that is not clearly worse
//! than the rest.

use crate::board::Board;
use crate::search::time::TimeManager;
use crate::search::tt::TranspositionTable;
use crate::search::{SearchLimits, ThreadResult, Worker};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

/// Helpers must beat the main thread's score by this much (at equal depth)
/// to steal the bestmove. A deeper result only needs to not trail by it.
const SMP_SCORE_DELTA: i32 = 20;

pub struct Searcher {
    pub tt: Arc<TranspositionTable>,
    pub stop: Arc<AtomicBool>,
    pub nodes: Arc<AtomicU64>,
    pub threads: usize,
    pub multipv: usize,
    pub move_overhead: u64,
}

impl Searcher {
    pub fn new(tt: Arc<TranspositionTable>) -> Self {
        Searcher {
            tt,
            stop: Arc::new(AtomicBool::new(false)),
            nodes: Arc::new(AtomicU64::new(0)),
            threads: crate::constants::DEFAULT_THREADS,
            multipv: crate::constants::DEFAULT_MULTIPV,
            move_overhead: crate::constants::DEFAULT_MOVE_OVERHEAD_MS,
        }
    }

    /// Launch a search in the background. Info lines and the final
    /// bestmove are delivered through `tx`; the returned handle joins the
    /// whole pool.
    pub fn search_async(
        &self,
        board: Board,
        limits: SearchLimits,
        tx: Sender<String>,
    ) -> thread::JoinHandle<()> {
        let tt = Arc::clone(&self.tt);
        let stop = Arc::clone(&self.stop);
        let nodes = Arc::clone(&self.nodes);
        let threads = self.threads.max(1);
        let multipv = self.multipv;
        let overhead = self.move_overhead;
        let chess960 = board.chess960;

        stop.store(false, Ordering::Relaxed);
        nodes.store(0, Ordering::Relaxed);
        tt.new_search();

        thread::spawn(move || {
            let started = Instant::now();
            let is_white = board.side == crate::defs::Color::White;
            let time = TimeManager::from_limits(&limits, is_white, overhead).map(Arc::new);

            let results: Arc<Mutex<Vec<Option<ThreadResult>>>> =
                Arc::new(Mutex::new(vec![None; threads]));

            let mut handles = Vec::with_capacity(threads);
            for id in 0..threads {
                let board = board.clone();
                let tt = Arc::clone(&tt);
                let stop = Arc::clone(&stop);
                let nodes = Arc::clone(&nodes);
                let limits = limits.clone();
                let results = Arc::clone(&results);
                let tx_main = if id == 0 { Some(tx.clone()) } else { None };
                let time = if id == 0 { time.clone() } else { None };

                handles.push(thread::spawn(move || {
                    let mut worker =
                        Worker::new(id, board, tt, stop, nodes, time, limits, multipv);
                    let result = worker.iterative_deepening(tx_main.as_ref(), started);
                    results.lock()[id] = Some(result);
                }));
            }

            for h in handles {
                let _ = h.join();
            }
            // All workers have observed the stop flag; nothing is being
            // mutated anymore
            stop.store(true, Ordering::Relaxed);

            let results = results.lock();
            let best = pick_best(&results);
            let mut line = format!("bestmove {}", best.best_move.to_uci(chess960));
            if !best.ponder.is_none() {
                line.push_str(&format!(" ponder {}", best.ponder.to_uci(chess960)));
            }
            let _ = tx.send(line);
        })
    }
}

/// Deterministic cross-thread vote: the main thread's result stands unless
/// a helper went deeper without scoring clearly worse, or scored clearly
/// better at the same depth. Exact ties keep the earlier (main-most) thread.
fn pick_best(results: &[Option<ThreadResult>]) -> ThreadResult {
    let mut best = results[0].clone().unwrap_or_default();
    for r in results.iter().skip(1).flatten() {
        if r.best_move.is_none() {
            continue;
        }
        let deeper_not_worse = r.depth > best.depth && r.score > best.score - SMP_SCORE_DELTA;
        let clearly_better = r.depth == best.depth && r.score > best.score + SMP_SCORE_DELTA;
        if best.best_move.is_none() || deeper_not_worse || clearly_better {
            best = r.clone();
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mv::Move;
    use std::sync::mpsc;

    fn result(best: &str, score: i32, depth: i32) -> Option<ThreadResult> {
        let from = crate::defs::parse_square(&best[0..2]).unwrap();
        let to = crate::defs::parse_square(&best[2..4]).unwrap();
        Some(ThreadResult {
            best_move: Move::new(from, to),
            ponder: Move::NONE,
            score,
            depth,
        })
    }

    #[test]
    fn test_pick_best_prefers_main_on_ties() {
        let results = vec![result("e2e4", 30, 10), result("d2d4", 30, 10)];
        let best = pick_best(&results);
        assert_eq!(best.best_move.to_uci(false), "e2e4");
    }

    #[test]
    fn test_pick_best_takes_deeper_helper() {
        let results = vec![result("e2e4", 30, 10), result("d2d4", 25, 12)];
        let best = pick_best(&results);
        assert_eq!(best.best_move.to_uci(false), "d2d4");
    }

    #[test]
    fn test_pick_best_rejects_deeper_but_much_worse() {
        let results = vec![result("e2e4", 30, 10), result("d2d4", -50, 12)];
        let best = pick_best(&results);
        assert_eq!(best.best_move.to_uci(false), "e2e4");
    }

    #[test]
    fn test_search_async_emits_bestmove() {
        let tt = Arc::new(TranspositionTable::new(8));
        let searcher = Searcher::new(tt);
        let (tx, rx) = mpsc::channel();
        let limits = SearchLimits {
            depth: Some(3),
            ..Default::default()
        };
        let handle = searcher.search_async(Board::new(), limits, tx);
        handle.join().unwrap();

        let lines: Vec<String> = rx.try_iter().collect();
        assert!(lines.iter().any(|l| l.starts_with("info depth 1 ")));
        let best = lines.last().unwrap();
        assert!(best.starts_with("bestmove "), "last line was {}", best);
    }

    #[test]
    fn test_multithreaded_agrees_with_single() {
        let limits = SearchLimits {
            depth: Some(6),
            ..Default::default()
        };

        let run = |threads: usize| -> i32 {
            let tt = Arc::new(TranspositionTable::new(8));
            let mut searcher = Searcher::new(tt);
            searcher.threads = threads;
            let (tx, rx) = mpsc::channel();
            let handle = searcher.search_async(Board::new(), limits.clone(), tx);
            handle.join().unwrap();
            // Parse the score of the last info line
            rx.try_iter()
                .filter(|l| l.starts_with("info"))
                .last()
                .and_then(|l| {
                    let mut it = l.split_whitespace();
                    while let Some(tok) = it.next() {
                        if tok == "cp" {
                            return it.next().and_then(|v| v.parse().ok());
                        }
                    }
                    None
                })
                .unwrap_or(0)
        };

        let single = run(1);
        let multi = run(4);
        assert!(
            (single - multi).abs() <= 50,
            "1-thread {} vs 4-thread {}",
            single,
            multi
        );
    }
}

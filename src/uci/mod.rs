//! UCI protocol handler.
//!
//! A line-oriented loop: commands mutate a single current position and
//! drive the searcher. Engine output funnels through one printer thread so
//! info lines from the search never interleave mid-line with command
//! replies. Anything malformed is reported as `info string` and ignored;
//! the loop never dies on bad input.

use crate::board::Board;
use crate::constants::*;
use crate::movegen;
use crate::mv::{Move, MoveList};
use crate::nnue::Network;
use crate::search::lazy_smp::Searcher;
use crate::search::tt::TranspositionTable;
use crate::search::SearchLimits;
use std::io::{self, BufRead};
use std::sync::atomic::Ordering;
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;

pub struct UciHandler {
    searcher: Searcher,
    board: Board,
    net: Option<Arc<Network>>,
    chess960: bool,
    tx: mpsc::Sender<String>,
    search_handle: Option<JoinHandle<()>>,
}

/// Match a wire move against the legal moves of the position. Castling is
/// accepted in both the king-destination and king-takes-rook spellings.
pub fn parse_uci_move(board: &Board, s: &str) -> Option<Move> {
    let mut list = MoveList::new();
    movegen::generate_legal(board, &mut list);
    let found = list
        .iter()
        .find(|m| m.to_uci(board.chess960) == s || m.to_uci(!board.chess960) == s);
    found
}

impl UciHandler {
    pub fn new(net: Option<Arc<Network>>) -> Self {
        let (tx, rx) = mpsc::channel::<String>();
        std::thread::spawn(move || {
            while let Ok(msg) = rx.recv() {
                println!("{}", msg);
            }
        });

        let tt = Arc::new(TranspositionTable::new(DEFAULT_TT_SIZE_MB));
        let mut board = Board::new();
        board.set_network(net.clone());

        UciHandler {
            searcher: Searcher::new(tt),
            board,
            net,
            chess960: false,
            tx,
            search_handle: None,
        }
    }

    /// Blocking stdin loop; returns on EOF or `quit`.
    pub fn run(&mut self) {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(cmd) = line else { break };
            let cmd = cmd.trim();
            if cmd.is_empty() {
                continue;
            }
            if !self.handle_command(cmd) {
                break;
            }
        }
        self.stop_search();
    }

    /// Dispatch one command; false means quit.
    pub fn handle_command(&mut self, command: &str) -> bool {
        let parts: Vec<&str> = command.split_whitespace().collect();
        match parts.first().copied() {
            Some("uci") => {
                self.say(format!("id name {} {}", ENGINE_NAME, ENGINE_VERSION));
                self.say(format!("id author {}", ENGINE_AUTHOR));
                self.say(format!(
                    "option name Hash type spin default {} min 1 max {}",
                    DEFAULT_TT_SIZE_MB, MAX_TT_SIZE_MB
                ));
                self.say(format!(
                    "option name Threads type spin default {} min 1 max {}",
                    DEFAULT_THREADS, MAX_THREADS
                ));
                self.say(format!(
                    "option name MultiPV type spin default {} min 1 max {}",
                    DEFAULT_MULTIPV, MAX_MULTIPV
                ));
                self.say(format!(
                    "option name Move Overhead type spin default {} min 0 max {}",
                    DEFAULT_MOVE_OVERHEAD_MS, MAX_MOVE_OVERHEAD_MS
                ));
                self.say("option name UCI_Chess960 type check default false".to_string());
                self.say(format!(
                    "option name EvalFile type string default {}",
                    DEFAULT_NET_PATH
                ));
                self.say("uciok".to_string());
            }
            Some("isready") => {
                // Force the lazy tables so the first go has no init hiccup
                lazy_static::initialize(&crate::attacks::ATTACKS);
                lazy_static::initialize(&crate::zobrist::ZOBRIST);
                self.say("readyok".to_string());
            }
            Some("ucinewgame") => {
                self.stop_search();
                self.searcher.tt.new_search();
                self.set_position(Board::new());
            }
            Some("setoption") => self.handle_setoption(&parts[1..]),
            Some("position") => self.handle_position(&parts[1..]),
            Some("go") => self.handle_go(&parts[1..]),
            Some("stop") => self.stop_search(),
            Some("quit") => return false,
            // Extensions: board dump, static eval, perft, bare FEN
            Some("d") => self.board.print(),
            Some("eval") => {
                let score = self.board.evaluate();
                self.say(format!("info string static eval {} cp", score));
            }
            Some("perft") => {
                let depth = parts.get(1).and_then(|d| d.parse().ok()).unwrap_or(1);
                let start = std::time::Instant::now();
                let nodes = movegen::perft(&mut self.board, depth);
                let ms = start.elapsed().as_millis().max(1);
                self.say(format!(
                    "info string perft {} nodes {} time {} nps {}",
                    depth,
                    nodes,
                    ms,
                    nodes as u128 * 1000 / ms
                ));
            }
            Some(_) => match Board::from_fen(command) {
                Ok(board) => self.set_position(board),
                Err(_) => self.say(format!("info string unknown command: {}", command)),
            },
            None => {}
        }
        true
    }

    fn say(&self, msg: String) {
        let _ = self.tx.send(msg);
    }

    fn set_position(&mut self, mut board: Board) {
        board.chess960 |= self.chess960;
        board.set_network(self.net.clone());
        self.board = board;
    }

    fn handle_setoption(&mut self, parts: &[&str]) {
        let Some(value_idx) = parts.iter().position(|&p| p == "value") else {
            self.say("info string setoption needs a value".to_string());
            return;
        };
        if parts.first() != Some(&"name") || value_idx + 1 >= parts.len() {
            self.say("info string malformed setoption".to_string());
            return;
        }
        let name = parts[1..value_idx].join(" ").to_lowercase();
        let value = parts[value_idx + 1..].join(" ");

        match name.as_str() {
            "hash" => match value.parse::<usize>() {
                Ok(mb) if (1..=MAX_TT_SIZE_MB).contains(&mb) => {
                    self.stop_search();
                    self.searcher.tt = Arc::new(TranspositionTable::new(mb));
                }
                _ => self.say(format!("info string bad Hash value: {}", value)),
            },
            "threads" => match value.parse::<usize>() {
                Ok(n) if (1..=MAX_THREADS).contains(&n) => self.searcher.threads = n,
                _ => self.say(format!("info string bad Threads value: {}", value)),
            },
            "multipv" => match value.parse::<usize>() {
                Ok(k) if (1..=MAX_MULTIPV).contains(&k) => self.searcher.multipv = k,
                _ => self.say(format!("info string bad MultiPV value: {}", value)),
            },
            "move overhead" => match value.parse::<u64>() {
                Ok(ms) if ms <= MAX_MOVE_OVERHEAD_MS => self.searcher.move_overhead = ms,
                _ => self.say(format!("info string bad Move Overhead value: {}", value)),
            },
            "uci_chess960" => {
                self.chess960 = value == "true";
                self.board.chess960 = self.chess960 || self.board.chess960;
            }
            "evalfile" => match Network::load(&value) {
                Ok(net) => {
                    let net = Arc::new(net);
                    self.net = Some(Arc::clone(&net));
                    self.board.set_network(Some(net));
                    self.say(format!("info string loaded eval file {}", value));
                }
                Err(e) => self.say(format!("info string eval file rejected: {:#}", e)),
            },
            _ => self.say(format!("info string unknown option: {}", name)),
        }
    }

    fn handle_position(&mut self, parts: &[&str]) {
        let mut idx = 0;
        let board = match parts.first().copied() {
            Some("startpos") => {
                idx = 1;
                Ok(Board::new())
            }
            Some("fen") => {
                let end = parts
                    .iter()
                    .position(|&p| p == "moves")
                    .unwrap_or(parts.len());
                idx = end;
                Board::from_fen(&parts[1..end].join(" "))
            }
            _ => {
                self.say("info string position needs startpos or fen".to_string());
                return;
            }
        };

        let board = match board {
            Ok(b) => b,
            Err(e) => {
                self.say(format!("info string bad fen: {:#}", e));
                return;
            }
        };
        self.set_position(board);

        if parts.get(idx) == Some(&"moves") {
            for &token in &parts[idx + 1..] {
                match parse_uci_move(&self.board, token) {
                    Some(m) => self.board.make_move(m),
                    None => {
                        self.say(format!("info string illegal move: {}", token));
                        break;
                    }
                }
            }
        }
    }

    fn handle_go(&mut self, parts: &[&str]) {
        self.stop_search();

        let mut limits = SearchLimits::default();
        let mut it = parts.iter();
        while let Some(&tok) = it.next() {
            let arg = it.clone().next().copied();
            match tok {
                "depth" => limits.depth = arg.and_then(|v| v.parse().ok()),
                "nodes" => limits.nodes = arg.and_then(|v| v.parse().ok()),
                "movetime" => limits.movetime = arg.and_then(|v| v.parse().ok()),
                "wtime" => limits.wtime = arg.and_then(|v| v.parse().ok()),
                "btime" => limits.btime = arg.and_then(|v| v.parse().ok()),
                "winc" => limits.winc = arg.and_then(|v| v.parse().ok()),
                "binc" => limits.binc = arg.and_then(|v| v.parse().ok()),
                "movestogo" => limits.movestogo = arg.and_then(|v| v.parse().ok()),
                "infinite" => limits.infinite = true,
                _ => {}
            }
        }

        let handle = self
            .searcher
            .search_async(self.board.clone(), limits, self.tx.clone());
        self.search_handle = Some(handle);
    }

    /// Raise the stop flag and wait for the pool to finish, so bestmove
    /// ordering is preserved and no stale search mutates shared state.
    fn stop_search(&mut self) {
        if let Some(handle) = self.search_handle.take() {
            self.searcher.stop.store(true, Ordering::Relaxed);
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uci_moves() {
        let board = Board::new();
        let m = parse_uci_move(&board, "e2e4").unwrap();
        assert_eq!(m.to_uci(false), "e2e4");
        assert!(parse_uci_move(&board, "e2e5").is_none());
        assert!(parse_uci_move(&board, "nonsense").is_none());
    }

    #[test]
    fn test_castling_move_both_spellings() {
        let board = Board::from_fen(
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        )
        .unwrap();
        let classic = parse_uci_move(&board, "e1g1").unwrap();
        let frc_style = parse_uci_move(&board, "e1h1").unwrap();
        assert_eq!(classic, frc_style);
        assert_eq!(classic.kind(), crate::mv::MoveKind::Castling);
    }

    #[test]
    fn test_position_and_moves_replay() {
        let mut handler = UciHandler::new(None);
        handler.handle_command("position startpos moves e2e4 e7e5");
        assert_eq!(
            handler.board.to_fen(),
            "rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2"
        );
    }

    #[test]
    fn test_bad_input_keeps_state() {
        let mut handler = UciHandler::new(None);
        handler.handle_command("position startpos moves e2e4");
        let fen = handler.board.to_fen();
        handler.handle_command("position fen not a real fen");
        assert_eq!(handler.board.to_fen(), fen);
        handler.handle_command("position startpos moves e9e4");
        // failed replay leaves a legal position behind
        assert_eq!(handler.board.to_fen(), crate::board::START_FEN);
    }

    #[test]
    fn test_bare_fen_extension() {
        let mut handler = UciHandler::new(None);
        let kiwi = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
        handler.handle_command(kiwi);
        assert_eq!(handler.board.to_fen(), kiwi);
    }

    #[test]
    fn test_setoption_bounds() {
        let mut handler = UciHandler::new(None);
        handler.handle_command("setoption name Threads value 8");
        assert_eq!(handler.searcher.threads, 8);
        handler.handle_command("setoption name Threads value 0");
        assert_eq!(handler.searcher.threads, 8);
        handler.handle_command("setoption name MultiPV value 4");
        assert_eq!(handler.searcher.multipv, 4);
        handler.handle_command("setoption name Move Overhead value 100");
        assert_eq!(handler.searcher.move_overhead, 100);
    }

    #[test]
    fn test_go_and_stop_round_trip() {
        let mut handler = UciHandler::new(None);
        handler.handle_command("position startpos");
        handler.handle_command("go depth 2");
        handler.handle_command("stop");
        assert!(handler.search_handle.is_none());
    }

    #[test]
    fn test_ep_after_replay_matches_fen_load() {
        let mut handler = UciHandler::new(None);
        handler.handle_command("position startpos moves e2e4 g8f6 e4e5 d7d5");
        // d5 was a double push next to the e5 pawn: EP capture available
        let m = parse_uci_move(&handler.board, "e5d6").unwrap();
        assert_eq!(m.kind(), crate::mv::MoveKind::EnPassant);
    }
}

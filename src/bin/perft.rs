//! Perft driver: node counts per root move plus totals and speed.
//!
//! Usage: perft <depth> [fen...]

use opal::board::Board;
use opal::movegen::{self, generate_legal};
use opal::mv::MoveList;
use std::time::Instant;

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let depth: u32 = args
        .first()
        .and_then(|d| d.parse().ok())
        .unwrap_or(5)
        .max(1);
    let fen = if args.len() > 1 {
        args[1..].join(" ")
    } else {
        opal::board::START_FEN.to_string()
    };

    let mut board = match Board::from_fen(&fen) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("bad fen: {:#}", e);
            std::process::exit(1);
        }
    };

    let start = Instant::now();
    let mut total = 0u64;
    let mut list = MoveList::new();
    generate_legal(&board, &mut list);

    for m in list.iter().collect::<Vec<_>>() {
        board.make_move(m);
        let nodes = movegen::perft(&mut board, depth - 1);
        board.unmake_move(m);
        total += nodes;
        println!("{}: {}", m.to_uci(board.chess960), nodes);
    }

    let elapsed = start.elapsed();
    let nps = total as f64 / elapsed.as_secs_f64().max(1e-9);
    println!();
    println!("nodes {}", total);
    println!("time  {:.3}s", elapsed.as_secs_f64());
    println!("nps   {:.0}", nps);
}

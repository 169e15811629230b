//! Move-generator validation against published perft tables.

use opal::board::Board;
use opal::movegen::perft;

fn expect(fen: &str, depth: u32, nodes: u64) {
    let mut board = Board::from_fen(fen).unwrap();
    assert_eq!(
        perft(&mut board, depth),
        nodes,
        "perft({}) of {}",
        depth,
        fen
    );
}

const KIWIPETE: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";

#[test]
fn perft_startpos_shallow() {
    expect(opal::board::START_FEN, 1, 20);
    expect(opal::board::START_FEN, 2, 400);
    expect(opal::board::START_FEN, 3, 8_902);
    expect(opal::board::START_FEN, 4, 197_281);
}

#[test]
#[ignore = "slow: run with --ignored"]
fn perft_startpos_deep() {
    expect(opal::board::START_FEN, 5, 4_865_609);
    expect(opal::board::START_FEN, 6, 119_060_324);
}

#[test]
fn perft_kiwipete_shallow() {
    expect(KIWIPETE, 1, 48);
    expect(KIWIPETE, 2, 2_039);
    expect(KIWIPETE, 3, 97_862);
}

#[test]
#[ignore = "slow: run with --ignored"]
fn perft_kiwipete_deep() {
    expect(KIWIPETE, 4, 4_085_603);
}

// Positions exercising promotions, pins, en passant and castling edge
// cases (the usual suspects from the perft literature).

#[test]
fn perft_position3_en_passant_pins() {
    let fen = "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1";
    expect(fen, 1, 14);
    expect(fen, 2, 191);
    expect(fen, 3, 2_812);
    expect(fen, 4, 43_238);
}

#[test]
fn perft_position4_promotions() {
    let fen = "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1";
    expect(fen, 1, 6);
    expect(fen, 2, 264);
    expect(fen, 3, 9_467);
}

#[test]
fn perft_position5_castling_checks() {
    let fen = "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8";
    expect(fen, 1, 44);
    expect(fen, 2, 1_486);
    expect(fen, 3, 62_379);
}

#[test]
fn perft_talkchess_position6() {
    let fen = "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10";
    expect(fen, 1, 46);
    expect(fen, 2, 2_079);
    expect(fen, 3, 89_890);
}

#[test]
fn frc_position_loads_and_stays_consistent() {
    // Shredder-FEN castling letters force FRC handling
    let fen = "rkrbbnnq/pppppppp/8/8/8/8/PPPPPPPP/RKRBBNNQ w CAca - 0 1";
    let mut board = Board::from_fen(fen).unwrap();
    assert!(board.chess960);

    let mut list = opal::mv::MoveList::new();
    opal::movegen::generate_legal(&board, &mut list);
    assert!(list.count > 0);
    for m in list.iter().collect::<Vec<_>>() {
        board.make_move(m);
        assert_eq!(board.hash(), board.calculate_hash(), "after {}", m);
        board.unmake_move(m);
    }
}

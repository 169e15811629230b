//! The board: piece bitboards, a mailbox, and a preallocated per-ply state
//! stack driven by make/unmake.
//!
//! Every derived quantity a search node needs (hash, checkers, pin masks,
//! check squares, material, the NNUE accumulator, a static-eval slot) lives
//! in the ply's `State`, so unmake is a pointer decrement plus the piece
//! restoration. Nothing here allocates after construction.

use crate::attacks::ATTACKS;
use crate::constants::{MAX_GAME_PLY, PIECE_VALUES};
use crate::defs::*;
use crate::mv::{Move, MoveKind};
use crate::nnue::accumulator::Accumulator;
use crate::nnue::{features, Network};
use crate::zobrist::ZOBRIST;
use anyhow::{bail, Result};
use std::sync::Arc;

pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Per-ply record. Copied forward by make, restored wholesale by unmake.
#[derive(Clone)]
pub struct State {
    pub castling: u8,
    /// En-passant target, present only when actually capturable
    pub ep_square: Option<u8>,
    pub halfmove_clock: u16,
    pub plies_from_null: u16,
    pub captured: Option<PieceType>,
    pub king_sq: [u8; COLOR_COUNT],
    pub hash: u64,
    /// Enemy pieces giving check to the side to move
    pub checkers: Bitboard,
    /// blockers[c]: pieces (either color) that alone shield c's king from a slider
    pub blockers: [Bitboard; COLOR_COUNT],
    /// pinners[c]: sliders of color c pinning enemy pieces to the enemy king
    pub pinners: [Bitboard; COLOR_COUNT],
    /// xrayers[c]: sliders of color c whose own piece shields the enemy king
    pub xrayers: [Bitboard; COLOR_COUNT],
    /// check_squares[pt]: squares from which a side-to-move piece of type pt
    /// checks the enemy king
    pub check_squares: [Bitboard; PIECE_TYPE_COUNT],
    pub material: [i32; COLOR_COUNT],
    pub non_pawn_material: [i32; COLOR_COUNT],
    pub acc: Accumulator,
    pub eval: Option<i32>,
}

impl Default for State {
    fn default() -> Self {
        State {
            castling: 0,
            ep_square: None,
            halfmove_clock: 0,
            plies_from_null: 0,
            captured: None,
            king_sq: [0; COLOR_COUNT],
            hash: 0,
            checkers: EMPTY,
            blockers: [EMPTY; COLOR_COUNT],
            pinners: [EMPTY; COLOR_COUNT],
            xrayers: [EMPTY; COLOR_COUNT],
            check_squares: [EMPTY; PIECE_TYPE_COUNT],
            material: [0; COLOR_COUNT],
            non_pawn_material: [0; COLOR_COUNT],
            acc: Accumulator::new(),
            eval: None,
        }
    }
}

#[derive(Clone)]
pub struct Board {
    pub pieces: [[Bitboard; PIECE_TYPE_COUNT]; COLOR_COUNT],
    pub occupancy: [Bitboard; COLOR_COUNT],
    pub all_pieces: Bitboard,
    mailbox: [Option<PieceType>; 64],
    pub side: Color,
    pub fullmove: u16,
    pub chess960: bool,
    /// Rook origin squares per [color][0=king side, 1=queen side]; valid
    /// while the matching right survives
    pub castle_rooks: [[u8; 2]; COLOR_COUNT],
    /// Squares that must be empty for a castle, per [color][side]
    castle_path: [[Bitboard; 2]; COLOR_COUNT],
    /// Rights cleared when a move touches this square
    castle_rights_mask: [u8; 64],
    states: Vec<State>,
    sp: usize,
    pub net: Option<Arc<Network>>,
}

impl Board {
    /// Standard starting position.
    pub fn new() -> Self {
        Board::from_fen(START_FEN).expect("start position FEN is valid")
    }

    pub fn from_fen(fen: &str) -> Result<Self> {
        let fields: Vec<&str> = fen.split_whitespace().collect();
        if fields.len() < 4 {
            bail!("FEN needs at least 4 fields, got {}", fields.len());
        }

        let mut board = Board {
            pieces: [[EMPTY; PIECE_TYPE_COUNT]; COLOR_COUNT],
            occupancy: [EMPTY; COLOR_COUNT],
            all_pieces: EMPTY,
            mailbox: [None; 64],
            side: Color::White,
            fullmove: 1,
            chess960: false,
            castle_rooks: [[0; 2]; COLOR_COUNT],
            castle_path: [[EMPTY; 2]; COLOR_COUNT],
            castle_rights_mask: [0; 64],
            states: vec![State::default(); MAX_GAME_PLY],
            sp: 0,
            net: None,
        };

        // Field 1: piece placement, rank 8 first
        let mut rank = 7i32;
        let mut file = 0i32;
        for c in fields[0].chars() {
            match c {
                '/' => {
                    rank -= 1;
                    file = 0;
                }
                '1'..='8' => file += c as i32 - '0' as i32,
                _ => {
                    let Some(pt) = PieceType::from_char(c) else {
                        bail!("bad piece char '{}'", c);
                    };
                    if !(0..8).contains(&file) || !(0..8).contains(&rank) {
                        bail!("piece placement overflows the board");
                    }
                    let color = if c.is_ascii_uppercase() { Color::White } else { Color::Black };
                    board.put_piece(color, pt, square(file as u8, rank as u8));
                    file += 1;
                }
            }
        }

        for c in 0..COLOR_COUNT {
            let kings = board.pieces[c][PieceType::King as usize];
            if kings.count_ones() != 1 {
                bail!("side {} must have exactly one king", c);
            }
            board.states[0].king_sq[c] = lsb(kings);
        }

        // Field 2: side to move
        board.side = match fields[1] {
            "w" => Color::White,
            "b" => Color::Black,
            s => bail!("bad side-to-move field '{}'", s),
        };

        // Field 3: castling availability (standard, X-FEN or Shredder)
        if fields[2] != "-" {
            for c in fields[2].chars() {
                board.add_castling_right(c)?;
            }
        }
        board.rebuild_castle_tables();

        // Field 4: en passant, kept only when a capture is really available
        if fields[3] != "-" {
            let Some(ep) = parse_square(fields[3]) else {
                bail!("bad en-passant field '{}'", fields[3]);
            };
            let us = board.side;
            let them = !us;
            let capturable = ATTACKS.pawn[them as usize][ep as usize]
                & board.pieces[us as usize][PieceType::Pawn as usize]
                != 0
                && board.pieces[them as usize][PieceType::Pawn as usize] & bb(ep ^ 8) != 0;
            if capturable {
                board.states[0].ep_square = Some(ep);
            }
        }

        // Fields 5/6 are optional
        if let Some(hm) = fields.get(4) {
            board.states[0].halfmove_clock = hm.parse().unwrap_or(0);
        }
        if let Some(fm) = fields.get(5) {
            board.fullmove = fm.parse().unwrap_or(1);
        }

        for c in 0..COLOR_COUNT {
            let (mat, non_pawn) = board.count_material(Color::from_usize(c));
            board.states[0].material[c] = mat;
            board.states[0].non_pawn_material[c] = non_pawn;
        }

        board.states[0].hash = board.calculate_hash();
        board.update_check_info();

        // A position where the side not to move stands in check never
        // arises from legal play; refuse it here rather than corrupt search.
        let them = !board.side;
        let their_king = board.king_sq(them);
        if board.attackers_to(their_king, board.all_pieces) & board.occupancy[board.side as usize]
            != 0
        {
            bail!("side not to move is in check");
        }

        Ok(board)
    }

    fn add_castling_right(&mut self, c: char) -> Result<()> {
        let color = if c.is_ascii_uppercase() { Color::White } else { Color::Black };
        let ci = color as usize;
        let back_rank = if color == Color::White { 0u8 } else { 7u8 };
        let ksq = self.states[0].king_sq[ci];
        if rank_of(ksq) != back_rank {
            bail!("castling right '{}' with king off the back rank", c);
        }

        let rooks = self.pieces[ci][PieceType::Rook as usize] & RANKS[back_rank as usize];
        let rook_file = match c.to_ascii_uppercase() {
            'K' => {
                // outermost rook right of the king
                let candidates = rooks & !((bb(ksq) - 1) | bb(ksq));
                if candidates == 0 {
                    bail!("no rook for right '{}'", c);
                }
                file_of(msb(candidates))
            }
            'Q' => {
                let candidates = rooks & (bb(ksq) - 1);
                if candidates == 0 {
                    bail!("no rook for right '{}'", c);
                }
                file_of(lsb(candidates))
            }
            f @ 'A'..='H' => {
                self.chess960 = true;
                f as u8 - b'A'
            }
            _ => bail!("bad castling char '{}'", c),
        };

        let rook_sq = square(rook_file, back_rank);
        if self.mailbox[rook_sq as usize] != Some(PieceType::Rook)
            || self.occupancy[ci] & bb(rook_sq) == 0
        {
            bail!("no rook on {} for right '{}'", square_name(rook_sq), c);
        }

        let king_side = rook_file > file_of(ksq);
        let side = if king_side { 0 } else { 1 };
        self.castle_rooks[ci][side] = rook_sq;
        self.states[0].castling |= castle_right(ci, king_side);
        Ok(())
    }

    /// Recompute the per-square rights masks and the must-be-empty paths
    /// from the current rights and rook origins.
    fn rebuild_castle_tables(&mut self) {
        self.castle_rights_mask = [0; 64];
        self.castle_path = [[EMPTY; 2]; COLOR_COUNT];

        for ci in 0..COLOR_COUNT {
            let back_rank = if ci == 0 { 0u8 } else { 7u8 };
            let ksq = self.states[0].king_sq[ci];
            for side in 0..2 {
                let right = castle_right(ci, side == 0);
                if self.states[0].castling & right == 0 {
                    continue;
                }
                let rook_sq = self.castle_rooks[ci][side];
                self.castle_rights_mask[ksq as usize] |= right;
                self.castle_rights_mask[rook_sq as usize] |= right;

                let k_to = square(if side == 0 { 6 } else { 2 }, back_rank);
                let r_to = square(if side == 0 { 5 } else { 3 }, back_rank);
                let path = (ATTACKS.between_bb(ksq, k_to)
                    | ATTACKS.between_bb(rook_sq, r_to)
                    | bb(k_to)
                    | bb(r_to))
                    & !bb(ksq)
                    & !bb(rook_sq);
                self.castle_path[ci][side] = path;
            }
        }
    }

    fn count_material(&self, color: Color) -> (i32, i32) {
        let ci = color as usize;
        let mut total = 0;
        let mut non_pawn = 0;
        for p in 0..PIECE_TYPE_COUNT {
            let v = PIECE_VALUES[p] * self.pieces[ci][p].count_ones() as i32;
            total += v;
            if p != PieceType::Pawn as usize {
                non_pawn += v;
            }
        }
        (total, non_pawn)
    }

    /// Install (or clear) the evaluation network; accumulators are marked
    /// for refresh so the next evaluation rebuilds them.
    pub fn set_network(&mut self, net: Option<Arc<Network>>) {
        self.net = net;
        self.states[self.sp].acc.dirty = [true, true];
        self.states[self.sp].eval = None;
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    #[inline]
    pub fn st(&self) -> &State {
        &self.states[self.sp]
    }

    /// Plies made since this Board was created.
    #[inline]
    pub fn ply(&self) -> usize {
        self.sp
    }

    #[inline]
    pub fn king_sq(&self, color: Color) -> u8 {
        self.states[self.sp].king_sq[color as usize]
    }

    #[inline]
    pub fn piece_on(&self, sq: u8) -> Option<PieceType> {
        self.mailbox[sq as usize]
    }

    #[inline]
    pub fn color_on(&self, sq: u8) -> Option<Color> {
        if self.occupancy[0] & bb(sq) != 0 {
            Some(Color::White)
        } else if self.occupancy[1] & bb(sq) != 0 {
            Some(Color::Black)
        } else {
            None
        }
    }

    #[inline]
    pub fn hash(&self) -> u64 {
        self.states[self.sp].hash
    }

    #[inline]
    pub fn in_check(&self) -> bool {
        self.states[self.sp].checkers != EMPTY
    }

    #[inline]
    pub fn has_non_pawn_material(&self, color: Color) -> bool {
        self.states[self.sp].non_pawn_material[color as usize] > 0
    }

    #[inline]
    pub fn pieces_of(&self, color: Color, pt: PieceType) -> Bitboard {
        self.pieces[color as usize][pt as usize]
    }

    /// No pieces stand between king/rook and their castling destinations.
    #[inline]
    pub fn castle_path_clear(&self, color: Color, side: usize) -> bool {
        self.castle_path[color as usize][side] & self.all_pieces == EMPTY
    }

    /// Captures only; castling's king-takes-rook encoding is not one.
    #[inline]
    pub fn is_capture(&self, m: Move) -> bool {
        match m.kind() {
            MoveKind::EnPassant => true,
            MoveKind::Castling => false,
            _ => self.mailbox[m.target() as usize].is_some(),
        }
    }

    /// The piece removed by a capture.
    #[inline]
    pub fn victim_of(&self, m: Move) -> Option<PieceType> {
        match m.kind() {
            MoveKind::EnPassant => Some(PieceType::Pawn),
            MoveKind::Castling => None,
            _ => self.mailbox[m.target() as usize],
        }
    }

    /// Both-color attackers of a square under the given occupancy.
    pub fn attackers_to(&self, sq: u8, occ: Bitboard) -> Bitboard {
        let si = sq as usize;
        (ATTACKS.pawn[Color::Black as usize][si] & self.pieces[0][PieceType::Pawn as usize])
            | (ATTACKS.pawn[Color::White as usize][si] & self.pieces[1][PieceType::Pawn as usize])
            | (ATTACKS.knight[si]
                & (self.pieces[0][PieceType::Knight as usize]
                    | self.pieces[1][PieceType::Knight as usize]))
            | (ATTACKS.king[si]
                & (self.pieces[0][PieceType::King as usize]
                    | self.pieces[1][PieceType::King as usize]))
            | (ATTACKS.bishop_attacks(occ, sq) & self.diag_sliders())
            | (ATTACKS.rook_attacks(occ, sq) & self.orth_sliders())
    }

    #[inline]
    fn diag_sliders(&self) -> Bitboard {
        self.pieces[0][PieceType::Bishop as usize]
            | self.pieces[1][PieceType::Bishop as usize]
            | self.pieces[0][PieceType::Queen as usize]
            | self.pieces[1][PieceType::Queen as usize]
    }

    #[inline]
    fn orth_sliders(&self) -> Bitboard {
        self.pieces[0][PieceType::Rook as usize]
            | self.pieces[1][PieceType::Rook as usize]
            | self.pieces[0][PieceType::Queen as usize]
            | self.pieces[1][PieceType::Queen as usize]
    }

    #[inline]
    pub fn attacked_by(&self, sq: u8, attacker: Color, occ: Bitboard) -> bool {
        self.attackers_to(sq, occ) & self.occupancy[attacker as usize] != 0
    }

    /// Zobrist hash recomputed from scratch. The incremental hash must
    /// always agree with this.
    pub fn calculate_hash(&self) -> u64 {
        let mut h = 0u64;
        for c in 0..COLOR_COUNT {
            for p in 0..PIECE_TYPE_COUNT {
                let mut pieces = self.pieces[c][p];
                while pieces != 0 {
                    let sq = pop_lsb(&mut pieces);
                    h ^= ZOBRIST.pieces[c][p][sq as usize];
                }
            }
        }
        if self.side == Color::Black {
            h ^= ZOBRIST.side;
        }
        h ^= ZOBRIST.castling[self.states[self.sp].castling as usize];
        if let Some(ep) = self.states[self.sp].ep_square {
            h ^= ZOBRIST.en_passant[file_of(ep) as usize];
        }
        h
    }

    // ------------------------------------------------------------------
    // Piece movement primitives. Hash updates stay in make_move so that
    // unmake can restore pieces without touching keys.
    // ------------------------------------------------------------------

    #[inline]
    fn put_piece(&mut self, color: Color, pt: PieceType, sq: u8) {
        let b = bb(sq);
        self.pieces[color as usize][pt as usize] |= b;
        self.occupancy[color as usize] |= b;
        self.all_pieces |= b;
        self.mailbox[sq as usize] = Some(pt);
    }

    #[inline]
    fn remove_piece(&mut self, color: Color, pt: PieceType, sq: u8) {
        let b = bb(sq);
        self.pieces[color as usize][pt as usize] &= !b;
        self.occupancy[color as usize] &= !b;
        self.all_pieces &= !b;
        self.mailbox[sq as usize] = None;
    }

    #[inline]
    fn move_piece(&mut self, color: Color, pt: PieceType, from: u8, to: u8) {
        let b = bb(from) | bb(to);
        self.pieces[color as usize][pt as usize] ^= b;
        self.occupancy[color as usize] ^= b;
        self.all_pieces ^= b;
        self.mailbox[from as usize] = None;
        self.mailbox[to as usize] = Some(pt);
    }

    // ------------------------------------------------------------------
    // Make / unmake
    // ------------------------------------------------------------------

    /// Apply a legal move. Pushes a new state frame; `unmake_move` pops it.
    pub fn make_move(&mut self, m: Move) {
        debug_assert!(self.sp + 1 < self.states.len());
        debug_assert!(self.color_on(m.source()) == Some(self.side));

        // Copy the previous frame in place, no allocation
        let (head, tail) = self.states.split_at_mut(self.sp + 1);
        tail[0].clone_from(&head[self.sp]);
        self.sp += 1;

        let us = self.side;
        let them = !us;
        let ui = us as usize;
        let ti = them as usize;
        let from = m.source();
        let to = m.target();
        let pt = self.mailbox[from as usize].expect("mover present");

        let mut hash = self.states[self.sp].hash;
        // Feature delta collectors for the accumulator
        let mut removed = [(Color::White, PieceType::Pawn, 0u8); 2];
        let mut added = [(Color::White, PieceType::Pawn, 0u8); 2];
        let mut n_removed = 0usize;
        let mut n_added = 0usize;

        {
            let st = &mut self.states[self.sp];
            st.halfmove_clock += 1;
            st.plies_from_null += 1;
            st.captured = None;
            st.eval = None;

            // A vanished EP chance leaves the hash
            if let Some(ep) = st.ep_square.take() {
                hash ^= ZOBRIST.en_passant[file_of(ep) as usize];
            }
        }
        if us == Color::Black {
            self.fullmove += 1;
        }

        // Castling rights: any move touching a rights square clears them
        {
            let touched = self.castle_rights_mask[from as usize]
                | self.castle_rights_mask[to as usize];
            let st = &mut self.states[self.sp];
            if st.castling & touched != 0 {
                hash ^= ZOBRIST.castling[st.castling as usize];
                st.castling &= !touched;
                hash ^= ZOBRIST.castling[st.castling as usize];
            }
        }

        match m.kind() {
            MoveKind::Castling => {
                // to = rook origin (king-takes-rook encoding)
                let king_side = file_of(to) > file_of(from);
                let back = rank_of(from);
                let k_to = square(if king_side { 6 } else { 2 }, back);
                let r_to = square(if king_side { 5 } else { 3 }, back);

                // Remove both first: FRC king and rook may swap squares
                self.remove_piece(us, PieceType::King, from);
                self.remove_piece(us, PieceType::Rook, to);
                self.put_piece(us, PieceType::King, k_to);
                self.put_piece(us, PieceType::Rook, r_to);

                hash ^= ZOBRIST.pieces[ui][PieceType::King as usize][from as usize]
                    ^ ZOBRIST.pieces[ui][PieceType::King as usize][k_to as usize]
                    ^ ZOBRIST.pieces[ui][PieceType::Rook as usize][to as usize]
                    ^ ZOBRIST.pieces[ui][PieceType::Rook as usize][r_to as usize];

                self.states[self.sp].king_sq[ui] = k_to;

                removed[0] = (us, PieceType::King, from);
                removed[1] = (us, PieceType::Rook, to);
                added[0] = (us, PieceType::King, k_to);
                added[1] = (us, PieceType::Rook, r_to);
                n_removed = 2;
                n_added = 2;
            }
            kind => {
                // Capture (EP resolves the victim square behind the target)
                let victim_sq = if kind == MoveKind::EnPassant { to ^ 8 } else { to };
                let captured = if kind == MoveKind::EnPassant {
                    Some(PieceType::Pawn)
                } else {
                    self.mailbox[to as usize]
                };
                if let Some(cap) = captured {
                    self.remove_piece(them, cap, victim_sq);
                    hash ^= ZOBRIST.pieces[ti][cap as usize][victim_sq as usize];
                    let st = &mut self.states[self.sp];
                    st.captured = Some(cap);
                    st.halfmove_clock = 0;
                    st.material[ti] -= PIECE_VALUES[cap as usize];
                    if cap != PieceType::Pawn {
                        st.non_pawn_material[ti] -= PIECE_VALUES[cap as usize];
                    }
                    removed[n_removed] = (them, cap, victim_sq);
                    n_removed += 1;
                }

                self.move_piece(us, pt, from, to);
                hash ^= ZOBRIST.pieces[ui][pt as usize][from as usize]
                    ^ ZOBRIST.pieces[ui][pt as usize][to as usize];
                removed[n_removed] = (us, pt, from);
                n_removed += 1;

                if pt == PieceType::King {
                    self.states[self.sp].king_sq[ui] = to;
                }

                if pt == PieceType::Pawn {
                    self.states[self.sp].halfmove_clock = 0;

                    if kind == MoveKind::Promotion {
                        let promo = m.promotion_piece().expect("promotion piece");
                        self.remove_piece(us, PieceType::Pawn, to);
                        self.put_piece(us, promo, to);
                        hash ^= ZOBRIST.pieces[ui][PieceType::Pawn as usize][to as usize]
                            ^ ZOBRIST.pieces[ui][promo as usize][to as usize];
                        let st = &mut self.states[self.sp];
                        st.material[ui] +=
                            PIECE_VALUES[promo as usize] - PIECE_VALUES[PieceType::Pawn as usize];
                        st.non_pawn_material[ui] += PIECE_VALUES[promo as usize];
                        added[n_added] = (us, promo, to);
                        n_added += 1;
                    } else {
                        added[n_added] = (us, PieceType::Pawn, to);
                        n_added += 1;

                        // Double push: record EP only when an enemy pawn can
                        // actually take, so the hash reflects capturable EP
                        if to ^ from == 16 {
                            let ep = (from + to) / 2;
                            if ATTACKS.pawn[ui][ep as usize]
                                & self.pieces[ti][PieceType::Pawn as usize]
                                != 0
                            {
                                self.states[self.sp].ep_square = Some(ep);
                                hash ^= ZOBRIST.en_passant[file_of(ep) as usize];
                            }
                        }
                    }
                } else {
                    added[n_added] = (us, pt, to);
                    n_added += 1;
                }
            }
        }

        self.side = them;
        hash ^= ZOBRIST.side;
        self.states[self.sp].hash = hash;

        self.update_check_info();
        self.update_accumulator(&removed[..n_removed], &added[..n_added]);
    }

    /// Inverse of `make_move`. Restores every state field from the stack.
    pub fn unmake_move(&mut self, m: Move) {
        let them = self.side;
        let us = !them;
        let from = m.source();
        let to = m.target();

        self.side = us;
        if us == Color::Black {
            self.fullmove -= 1;
        }

        match m.kind() {
            MoveKind::Castling => {
                let king_side = file_of(to) > file_of(from);
                let back = rank_of(from);
                let k_to = square(if king_side { 6 } else { 2 }, back);
                let r_to = square(if king_side { 5 } else { 3 }, back);
                self.remove_piece(us, PieceType::King, k_to);
                self.remove_piece(us, PieceType::Rook, r_to);
                self.put_piece(us, PieceType::King, from);
                self.put_piece(us, PieceType::Rook, to);
            }
            MoveKind::EnPassant => {
                self.move_piece(us, PieceType::Pawn, to, from);
                self.put_piece(them, PieceType::Pawn, to ^ 8);
            }
            MoveKind::Promotion => {
                let promo = m.promotion_piece().expect("promotion piece");
                self.remove_piece(us, promo, to);
                self.put_piece(us, PieceType::Pawn, from);
                if let Some(cap) = self.states[self.sp].captured {
                    self.put_piece(them, cap, to);
                }
            }
            MoveKind::Normal => {
                let pt = self.mailbox[to as usize].expect("moved piece present");
                self.move_piece(us, pt, to, from);
                if let Some(cap) = self.states[self.sp].captured {
                    self.put_piece(them, cap, to);
                }
            }
        }

        self.sp -= 1;
    }

    /// Null move: pass the turn. Only the EP chance and the side key change.
    pub fn make_null_move(&mut self) {
        debug_assert!(!self.in_check());
        let (head, tail) = self.states.split_at_mut(self.sp + 1);
        tail[0].clone_from(&head[self.sp]);
        self.sp += 1;

        let st = &mut self.states[self.sp];
        let mut hash = st.hash;
        if let Some(ep) = st.ep_square.take() {
            hash ^= ZOBRIST.en_passant[file_of(ep) as usize];
        }
        st.plies_from_null = 0;
        st.captured = None;
        st.eval = None;
        hash ^= ZOBRIST.side;
        st.hash = hash;

        self.side = !self.side;
        self.update_check_info();
    }

    pub fn unmake_null_move(&mut self) {
        self.side = !self.side;
        self.sp -= 1;
    }

    /// Recompute checkers, pin masks and check squares for the side to move.
    fn update_check_info(&mut self) {
        let us = self.side;
        let them = !us;
        let ksq = self.states[self.sp].king_sq[us as usize];
        let eksq = self.states[self.sp].king_sq[them as usize];

        let checkers =
            self.attackers_to(ksq, self.all_pieces) & self.occupancy[them as usize];

        let mut blockers = [EMPTY; COLOR_COUNT];
        let mut pinners = [EMPTY; COLOR_COUNT];
        let mut xrayers = [EMPTY; COLOR_COUNT];
        for ci in 0..COLOR_COUNT {
            let king = self.states[self.sp].king_sq[ci];
            let enemy = ci ^ 1;
            let snipers = ((ATTACKS.rook_attacks(EMPTY, king)
                & (self.pieces[enemy][PieceType::Rook as usize]
                    | self.pieces[enemy][PieceType::Queen as usize]))
                | (ATTACKS.bishop_attacks(EMPTY, king)
                    & (self.pieces[enemy][PieceType::Bishop as usize]
                        | self.pieces[enemy][PieceType::Queen as usize])))
                & !bb(king);
            let mut rest = snipers;
            while rest != 0 {
                let sniper = pop_lsb(&mut rest);
                let shield = ATTACKS.between_bb(king, sniper) & self.all_pieces;
                if shield != EMPTY && !more_than_one(shield) {
                    blockers[ci] |= shield;
                    if shield & self.occupancy[ci] != 0 {
                        pinners[enemy] |= bb(sniper);
                    } else {
                        xrayers[enemy] |= bb(sniper);
                    }
                }
            }
        }

        let occ = self.all_pieces;
        let st = &mut self.states[self.sp];
        st.checkers = checkers;
        st.blockers = blockers;
        st.pinners = pinners;
        st.xrayers = xrayers;
        st.check_squares[PieceType::Pawn as usize] = ATTACKS.pawn[them as usize][eksq as usize];
        st.check_squares[PieceType::Knight as usize] = ATTACKS.knight[eksq as usize];
        st.check_squares[PieceType::Bishop as usize] = ATTACKS.bishop_attacks(occ, eksq);
        st.check_squares[PieceType::Rook as usize] = ATTACKS.rook_attacks(occ, eksq);
        st.check_squares[PieceType::Queen as usize] = st.check_squares
            [PieceType::Bishop as usize]
            | st.check_squares[PieceType::Rook as usize];
        st.check_squares[PieceType::King as usize] = EMPTY;
    }

    /// Apply accumulator deltas for the frame just pushed by make_move.
    /// A king that changed its (bucket, mirror) class invalidates its own
    /// perspective instead; the other side still updates incrementally.
    fn update_accumulator(
        &mut self,
        removed: &[(Color, PieceType, u8)],
        added: &[(Color, PieceType, u8)],
    ) {
        let Some(net) = self.net.clone() else {
            self.states[self.sp].acc.dirty = [true, true];
            return;
        };

        for persp in [Color::White, Color::Black] {
            let pi = persp as usize;
            if self.states[self.sp].acc.dirty[pi] {
                continue; // stays dirty until an evaluation refreshes it
            }
            let old_class =
                features::king_class(&net, self.states[self.sp - 1].king_sq[pi], persp);
            let new_class = features::king_class(&net, self.states[self.sp].king_sq[pi], persp);
            if old_class != new_class {
                self.states[self.sp].acc.dirty[pi] = true;
                continue;
            }

            let mut add_idx = [0usize; 2];
            let mut rem_idx = [0usize; 2];
            for (i, &(c, pt, sq)) in added.iter().enumerate() {
                add_idx[i] = features::feature_index(new_class, persp, c, pt, sq);
            }
            for (i, &(c, pt, sq)) in removed.iter().enumerate() {
                rem_idx[i] = features::feature_index(new_class, persp, c, pt, sq);
            }
            self.states[self.sp].acc.apply(
                &net,
                persp,
                &add_idx[..added.len()],
                &rem_idx[..removed.len()],
            );
        }
    }

    // ------------------------------------------------------------------
    // Evaluation entry point
    // ------------------------------------------------------------------

    /// Static evaluation from the side to move's point of view, cached per
    /// ply. Uses the network when loaded, refreshing stale accumulator
    /// halves first; otherwise the material/PST fallback.
    pub fn evaluate(&mut self) -> i32 {
        if let Some(score) = self.states[self.sp].eval {
            return score;
        }
        let score = if let Some(net) = self.net.clone() {
            let pieces_bb = self.pieces;
            for persp in [Color::White, Color::Black] {
                if self.states[self.sp].acc.dirty[persp as usize] {
                    let ksq = self.king_sq(persp);
                    self.states[self.sp].acc.refresh(&net, &pieces_bb, ksq, persp);
                }
            }
            net.evaluate(
                &self.states[self.sp].acc,
                self.side,
                popcount(self.all_pieces),
            )
        } else {
            crate::evaluate::evaluate(self)
        };
        self.states[self.sp].eval = Some(score);
        score
    }

    // ------------------------------------------------------------------
    // Legality
    // ------------------------------------------------------------------

    /// Full legality test for a pseudo-legal move of the side to move.
    pub fn is_legal(&self, m: Move) -> bool {
        let us = self.side;
        let them = !us;
        let ui = us as usize;
        let from = m.source();
        let to = m.target();
        let ksq = self.king_sq(us);
        let st = self.st();

        match m.kind() {
            MoveKind::EnPassant => {
                // Simulate with both pawns off the board and ours landed,
                // then require the king to be wholly out of check: a slider
                // may appear along the vacated rank or diagonal, and any
                // checker other than the captured pawn must still be dealt
                // with
                let ti = them as usize;
                let cap_sq = to ^ 8;
                let occ = (self.all_pieces ^ bb(from) ^ bb(cap_sq)) | bb(to);
                let checkers = (ATTACKS.pawn[ui][ksq as usize]
                    & (self.pieces[ti][PieceType::Pawn as usize] ^ bb(cap_sq)))
                    | (ATTACKS.knight[ksq as usize]
                        & self.pieces[ti][PieceType::Knight as usize])
                    | (ATTACKS.bishop_attacks(occ, ksq)
                        & (self.pieces[ti][PieceType::Bishop as usize]
                            | self.pieces[ti][PieceType::Queen as usize]))
                    | (ATTACKS.rook_attacks(occ, ksq)
                        & (self.pieces[ti][PieceType::Rook as usize]
                            | self.pieces[ti][PieceType::Queen as usize]));
                checkers == EMPTY
            }
            MoveKind::Castling => {
                if st.checkers != EMPTY {
                    return false;
                }
                let king_side = file_of(to) > file_of(from);
                let k_to = square(if king_side { 6 } else { 2 }, rank_of(from));
                // Every square the king crosses, from and to included
                let lo = from.min(k_to);
                let hi = from.max(k_to);
                for sq in lo..=hi {
                    if self.attacked_by(sq, them, self.all_pieces) {
                        return false;
                    }
                }
                // FRC: the castling rook may itself shield the king
                !(st.blockers[ui] & bb(to) != 0)
            }
            _ if self.mailbox[from as usize] == Some(PieceType::King) => {
                self.attackers_to(to, self.all_pieces ^ bb(from))
                    & self.occupancy[them as usize]
                    == EMPTY
            }
            _ => {
                if st.checkers != EMPTY {
                    // Double check admits king moves only
                    if more_than_one(st.checkers) {
                        return false;
                    }
                    let checker = lsb(st.checkers);
                    let mask = ATTACKS.between_bb(ksq, checker) | bb(checker);
                    if mask & bb(to) == EMPTY {
                        return false;
                    }
                }
                // A pinned piece may only slide along its pin line
                st.blockers[ui] & bb(from) == EMPTY || ATTACKS.aligned(from, to, ksq)
            }
        }
    }

    /// Does this move give check? Uses the cached check squares plus the
    /// discovered-check blockers; special kinds recompute attacks.
    pub fn gives_check(&self, m: Move) -> bool {
        let us = self.side;
        let them = !us;
        let st = self.st();
        let from = m.source();
        let to = m.target();
        let eksq = st.king_sq[them as usize];
        let pt = match self.mailbox[from as usize] {
            Some(p) => p,
            None => return false,
        };

        // Direct check from the destination square
        if m.kind() != MoveKind::Castling
            && st.check_squares[pt as usize] & bb(to) != EMPTY
        {
            return true;
        }

        // Discovered check: the mover shields the enemy king and steps off
        // the shared line
        if st.blockers[them as usize] & bb(from) != EMPTY
            && !ATTACKS.aligned(from, to, eksq)
        {
            return true;
        }

        match m.kind() {
            MoveKind::Promotion => {
                let promo = m.promotion_piece().expect("promotion piece");
                ATTACKS.piece_attacks(promo, self.all_pieces ^ bb(from), to) & bb(eksq) != EMPTY
            }
            MoveKind::EnPassant => {
                let cap_sq = to ^ 8;
                let occ = (self.all_pieces ^ bb(from) ^ bb(cap_sq)) | bb(to);
                let diag = ATTACKS.bishop_attacks(occ, eksq)
                    & (self.pieces[us as usize][PieceType::Bishop as usize]
                        | self.pieces[us as usize][PieceType::Queen as usize]);
                let orth = ATTACKS.rook_attacks(occ, eksq)
                    & (self.pieces[us as usize][PieceType::Rook as usize]
                        | self.pieces[us as usize][PieceType::Queen as usize]);
                diag != EMPTY || orth != EMPTY
            }
            MoveKind::Castling => {
                let king_side = file_of(to) > file_of(from);
                let back = rank_of(from);
                let k_to = square(if king_side { 6 } else { 2 }, back);
                let r_to = square(if king_side { 5 } else { 3 }, back);
                let occ = (self.all_pieces ^ bb(from) ^ bb(to)) | bb(k_to) | bb(r_to);
                ATTACKS.rook_attacks(occ, r_to) & bb(eksq) != EMPTY
            }
            MoveKind::Normal => false,
        }
    }

    /// Validate a move pulled from the TT or the killer slots before it is
    /// trusted: hash collisions can produce arbitrary garbage.
    pub fn is_pseudo_legal(&self, m: Move) -> bool {
        if m.is_none() {
            return false;
        }
        let us = self.side;
        let them = !us;
        let from = m.source();
        let to = m.target();
        let Some(pt) = self.mailbox[from as usize] else {
            return false;
        };
        if self.color_on(from) != Some(us) {
            return false;
        }

        match m.kind() {
            MoveKind::Castling => {
                // to = rook origin of ours, right intact, path clear
                if pt != PieceType::King || self.in_check() {
                    return false;
                }
                let ci = us as usize;
                let king_side = file_of(to) > file_of(from);
                let side = if king_side { 0 } else { 1 };
                let right = castle_right(ci, king_side);
                self.st().castling & right != 0
                    && self.castle_rooks[ci][side] == to
                    && self.castle_path[ci][side] & self.all_pieces == EMPTY
            }
            MoveKind::EnPassant => {
                pt == PieceType::Pawn
                    && self.st().ep_square == Some(to)
                    && ATTACKS.pawn[us as usize][from as usize] & bb(to) != EMPTY
            }
            MoveKind::Promotion | MoveKind::Normal => {
                if self.occupancy[us as usize] & bb(to) != 0 {
                    return false;
                }
                let back = if us == Color::White { 7 } else { 0 };
                if m.kind() == MoveKind::Promotion
                    && (pt != PieceType::Pawn || rank_of(to) != back)
                {
                    return false;
                }
                if pt == PieceType::Pawn {
                    if rank_of(to) == back && m.kind() != MoveKind::Promotion {
                        return false;
                    }
                    let capture = self.occupancy[them as usize] & bb(to) != 0;
                    if capture {
                        return ATTACKS.pawn[us as usize][from as usize] & bb(to) != EMPTY;
                    }
                    let push = pawn_push(us, bb(from));
                    if push & bb(to) != 0 {
                        return self.all_pieces & bb(to) == 0;
                    }
                    let start = if us == Color::White { RANK_2 } else { RANK_7 };
                    let double = pawn_push(us, push & !self.all_pieces);
                    bb(from) & start != 0
                        && double & bb(to) != 0
                        && self.all_pieces & bb(to) == 0
                } else {
                    ATTACKS.piece_attacks(pt, self.all_pieces, from) & bb(to) != EMPTY
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Draw detection
    // ------------------------------------------------------------------

    /// Draw by 50-move rule, repetition or dead material. `search_ply` is
    /// the distance from the search root: a single repetition inside the
    /// search tree already scores as a draw, while positions before the
    /// root need the full threefold.
    pub fn is_draw(&self, search_ply: usize) -> bool {
        let st = self.st();
        if st.halfmove_clock >= 100 {
            return true;
        }
        if self.is_repetition(search_ply) {
            return true;
        }
        self.insufficient_material()
    }

    fn is_repetition(&self, search_ply: usize) -> bool {
        let st = self.st();
        let window = st.halfmove_clock.min(st.plies_from_null) as usize;
        let cur = st.hash;
        let mut count = 0;
        let mut back = 4;
        while back <= window && back <= self.sp {
            if self.states[self.sp - back].hash == cur {
                if back <= search_ply {
                    return true;
                }
                count += 1;
                if count >= 2 {
                    return true;
                }
            }
            back += 2;
        }
        false
    }

    pub fn insufficient_material(&self) -> bool {
        let heavy = self.pieces[0][PieceType::Pawn as usize]
            | self.pieces[1][PieceType::Pawn as usize]
            | self.orth_sliders();
        if heavy != EMPTY {
            return false;
        }
        let w_minors = self.pieces[0][PieceType::Knight as usize]
            | self.pieces[0][PieceType::Bishop as usize];
        let b_minors = self.pieces[1][PieceType::Knight as usize]
            | self.pieces[1][PieceType::Bishop as usize];
        w_minors.count_ones() <= 1 && b_minors.count_ones() <= 1
    }

    // ------------------------------------------------------------------
    // Display / FEN export
    // ------------------------------------------------------------------

    pub fn to_fen(&self) -> String {
        let mut fen = String::new();
        for rank in (0..8u8).rev() {
            let mut empty = 0;
            for file in 0..8u8 {
                let sq = square(file, rank);
                match self.mailbox[sq as usize] {
                    None => empty += 1,
                    Some(pt) => {
                        if empty > 0 {
                            fen.push((b'0' + empty) as char);
                            empty = 0;
                        }
                        let c = pt.to_char();
                        fen.push(if self.color_on(sq) == Some(Color::White) {
                            c.to_ascii_uppercase()
                        } else {
                            c
                        });
                    }
                }
            }
            if empty > 0 {
                fen.push((b'0' + empty) as char);
            }
            if rank > 0 {
                fen.push('/');
            }
        }

        fen.push(' ');
        fen.push(if self.side == Color::White { 'w' } else { 'b' });
        fen.push(' ');

        let st = self.st();
        if st.castling == 0 {
            fen.push('-');
        } else {
            for (ci, upper) in [(0usize, true), (1usize, false)] {
                for side in 0..2 {
                    if st.castling & castle_right(ci, side == 0) == 0 {
                        continue;
                    }
                    let c = if self.chess960 {
                        (b'a' + file_of(self.castle_rooks[ci][side])) as char
                    } else if side == 0 {
                        'k'
                    } else {
                        'q'
                    };
                    fen.push(if upper { c.to_ascii_uppercase() } else { c });
                }
            }
        }

        fen.push(' ');
        match st.ep_square {
            Some(ep) => fen.push_str(&square_name(ep)),
            None => fen.push('-'),
        }
        fen.push_str(&format!(" {} {}", st.halfmove_clock, self.fullmove));
        fen
    }

    pub fn print(&self) {
        println!("  +---+---+---+---+---+---+---+---+");
        for rank in (0..8u8).rev() {
            print!("{} |", rank + 1);
            for file in 0..8u8 {
                let sq = square(file, rank);
                match self.mailbox[sq as usize] {
                    Some(pt) => {
                        let c = pt.to_char();
                        if self.color_on(sq) == Some(Color::White) {
                            print!(" {} |", c.to_ascii_uppercase());
                        } else {
                            print!(" {} |", c);
                        }
                    }
                    None => print!("   |"),
                }
            }
            println!("\n  +---+---+---+---+---+---+---+---+");
        }
        println!("    a   b   c   d   e   f   g   h");
        println!();
        println!("Fen: {}", self.to_fen());
        println!("Hash: {:016X}", self.hash());
        println!("Side to move: {:?}", self.side);
    }
}

impl Default for Board {
    fn default() -> Self {
        Board::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movegen;

    const KIWIPETE: &str =
        "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";

    fn parse_move(board: &Board, uci: &str) -> Move {
        let mut list = crate::mv::MoveList::new();
        movegen::generate_legal(board, &mut list);
        let found = list
            .iter()
            .find(|m| m.to_uci(board.chess960) == uci)
            .unwrap_or_else(|| panic!("move {} not legal here", uci));
        found
    }

    #[test]
    fn test_startpos_fields() {
        let board = Board::new();
        assert_eq!(board.side, Color::White);
        assert_eq!(board.st().castling, ALL_CASTLING);
        assert_eq!(board.st().ep_square, None);
        assert_eq!(board.all_pieces.count_ones(), 32);
        assert_eq!(board.king_sq(Color::White), 4);
        assert_eq!(board.king_sq(Color::Black), 60);
        assert_eq!(board.to_fen(), START_FEN);
    }

    #[test]
    fn test_fen_round_trip() {
        for fen in [
            START_FEN,
            KIWIPETE,
            "8/8/8/8/8/8/6k1/4K2R w K - 0 1",
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1",
        ] {
            let board = Board::from_fen(fen).unwrap();
            assert_eq!(board.to_fen(), fen, "round trip failed for {}", fen);
        }
    }

    #[test]
    fn test_illegal_fens_rejected() {
        // no black king
        assert!(Board::from_fen("8/8/8/8/8/8/8/4K3 w - - 0 1").is_err());
        // side not to move in check
        assert!(Board::from_fen("4k3/8/8/8/8/8/8/4KR2 b - - 0 1").is_ok());
        assert!(Board::from_fen("4k3/4R3/8/8/8/8/8/4K3 w - - 0 1").is_err());
        assert!(Board::from_fen("garbage").is_err());
    }

    #[test]
    fn test_ep_only_when_capturable() {
        // e4 played but no black pawn can take: ep square dropped
        let board =
            Board::from_fen("rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1")
                .unwrap();
        assert_eq!(board.st().ep_square, None);

        // with a black pawn on d4 the ep square is live
        let board =
            Board::from_fen("rnbqkbnr/ppp1pppp/8/8/3pP3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 2")
                .unwrap();
        assert_eq!(board.st().ep_square, crate::defs::parse_square("e3"));
    }

    #[test]
    fn test_make_unmake_restores_everything() {
        let mut board = Board::from_fen(KIWIPETE).unwrap();
        let fen_before = board.to_fen();
        let hash_before = board.hash();

        let mut list = crate::mv::MoveList::new();
        movegen::generate_legal(&board, &mut list);
        assert_eq!(list.count, 48);

        for m in list.iter().collect::<Vec<_>>() {
            board.make_move(m);
            assert_eq!(board.hash(), board.calculate_hash(), "incremental hash diverged after {}", m);
            board.unmake_move(m);
            assert_eq!(board.to_fen(), fen_before);
            assert_eq!(board.hash(), hash_before);
        }
    }

    #[test]
    fn test_mailbox_occupancy_consistency() {
        let mut board = Board::from_fen(KIWIPETE).unwrap();
        let moves = ["e2a6", "b4c3", "e5g6", "h3g2", "g6h8"];
        for uci in moves {
            let m = parse_move(&board, uci);
            board.make_move(m);
            assert_eq!(
                board.occupancy[0] & board.occupancy[1],
                EMPTY,
                "color boards overlap"
            );
            assert_eq!(board.occupancy[0] | board.occupancy[1], board.all_pieces);
            for sq in 0..64u8 {
                let in_occ = board.all_pieces & bb(sq) != 0;
                assert_eq!(board.piece_on(sq).is_some(), in_occ, "mailbox desync at {}", sq);
            }
        }
    }

    #[test]
    fn test_castling_updates_rook_and_rights() {
        let mut board = Board::from_fen(KIWIPETE).unwrap();
        let m = parse_move(&board, "e1g1");
        board.make_move(m);
        assert_eq!(board.piece_on(6), Some(PieceType::King));
        assert_eq!(board.piece_on(5), Some(PieceType::Rook));
        assert_eq!(board.piece_on(4), None);
        assert_eq!(board.piece_on(7), None);
        assert_eq!(board.st().castling & (WHITE_KING_SIDE | WHITE_QUEEN_SIDE), 0);
        board.unmake_move(m);
        assert_eq!(board.st().castling, ALL_CASTLING);
    }

    #[test]
    fn test_pin_and_xray_masks() {
        // White rook e2 behind white knight e5, black king e8: the knight
        // is a discovered-check candidate, not a pin
        let board = Board::from_fen("4k3/8/8/4N3/8/8/4R3/4K3 w - - 0 1").unwrap();
        let st = board.st();
        let e2 = parse_square("e2").unwrap();
        let e5 = parse_square("e5").unwrap();
        assert_ne!(st.blockers[Color::Black as usize] & bb(e5), EMPTY);
        assert_ne!(st.xrayers[Color::White as usize] & bb(e2), EMPTY);
        assert_eq!(st.pinners[Color::White as usize], EMPTY);

        // Black knight on e5 instead: now it is pinned
        let board = Board::from_fen("4k3/8/8/4n3/8/8/4R3/4K3 b - - 0 1").unwrap();
        let st = board.st();
        assert_ne!(st.pinners[Color::White as usize] & bb(e2), EMPTY);
        assert_eq!(st.xrayers[Color::White as usize], EMPTY);
        // The pinned knight may not leave the e-file
        let mut list = crate::mv::MoveList::new();
        movegen::generate_legal(&board, &mut list);
        assert!(list.iter().all(|m| m.source() != e5));
    }

    #[test]
    fn test_null_move_round_trip() {
        let mut board = Board::from_fen(KIWIPETE).unwrap();
        let hash = board.hash();
        board.make_null_move();
        assert_eq!(board.side, Color::Black);
        assert_ne!(board.hash(), hash);
        assert_eq!(board.hash(), board.calculate_hash());
        board.unmake_null_move();
        assert_eq!(board.hash(), hash);
        assert_eq!(board.side, Color::White);
    }

    #[test]
    fn test_repetition_detected() {
        let mut board = Board::new();
        for uci in ["g1f3", "g8f6", "f3g1", "f6g8", "g1f3", "g8f6", "f3g1", "f6g8"] {
            assert!(!board.is_draw(0));
            let m = parse_move(&board, uci);
            board.make_move(m);
        }
        // startpos has now occurred three times
        assert!(board.is_draw(0));
    }

    #[test]
    fn test_insufficient_material() {
        assert!(Board::from_fen("8/8/4k3/8/8/3K4/8/8 w - - 0 1").unwrap().is_draw(0));
        assert!(Board::from_fen("8/8/4k3/8/8/3KB3/8/8 w - - 0 1").unwrap().is_draw(0));
        assert!(!Board::from_fen("8/8/4k3/8/8/3K1R2/8/8 w - - 0 1").unwrap().is_draw(0));
        assert!(!Board::from_fen("8/8/4k3/8/8/3KP3/8/8 w - - 0 1").unwrap().is_draw(0));
    }

    #[test]
    fn test_fifty_move_rule() {
        let board = Board::from_fen("8/8/4k3/8/8/3K4/R7/8 w - - 100 80").unwrap();
        assert!(board.is_draw(0));
        let board = Board::from_fen("8/8/4k3/8/8/3K4/R7/8 w - - 99 80").unwrap();
        assert!(!board.is_draw(0));
    }
}

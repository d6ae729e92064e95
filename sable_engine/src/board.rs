
use crate::types::*;

use chess::MoveGen;

use std::str::FromStr;

/// Moved-piece / captured-piece record for one made move. Continuation and
/// counter-move lookups key off (piece, to) of the previous moves.
#[derive(Debug,Eq,PartialEq,Clone,Copy)]
pub struct MoveInfo {
    pub mv:       ChessMove,
    pub piece:    Piece,
    pub capture:  Option<Piece>,
}

#[derive(Debug,Clone,Copy)]
struct Undo {
    board:     Board,
    halfmove:  u16,
    info:      Option<MoveInfo>, // None for a null move
}

/// Stack-disciplined position: the rules library underneath is copy-make,
/// make/unmake here push and pop full snapshots. Tracks what the library
/// does not: halfmove clock, repetition history, prior-move info.
#[derive(Debug,Clone)]
pub struct Pos {
    board:     Board,
    halfmove:  u16,
    undo:      Vec<Undo>,
    hashes:    Vec<u64>,
}

/// Construction
impl Pos {

    pub fn startpos() -> Self {
        Self::from_board(Board::default(), 0)
    }

    /// Requires all 6 FEN fields; the halfmove clock is kept here because
    /// the rules library drops it.
    pub fn from_fen(fen: &str) -> Option<Self> {
        let fields: Vec<&str> = fen.split_whitespace().collect();
        if fields.len() != 6 {
            return None;
        }
        let board = Board::from_str(fen).ok()?;
        let halfmove = fields[4].parse::<u16>().ok()?;
        Some(Self::from_board(board, halfmove))
    }

    fn from_board(board: Board, halfmove: u16) -> Self {
        Self {
            board,
            halfmove,
            undo:      Vec::with_capacity(MAX_PLY as usize + 64),
            hashes:    Vec::with_capacity(MAX_PLY as usize + 64),
        }
    }

}

/// Queries
impl Pos {

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn side_to_move(&self) -> Color {
        self.board.side_to_move()
    }

    pub fn hash(&self) -> u64 {
        self.board.get_hash()
    }

    pub fn in_check(&self) -> bool {
        *self.board.checkers() != EMPTY
    }

    pub fn halfmove_clock(&self) -> u16 {
        self.halfmove
    }

    pub fn legal_moves(&self) -> Vec<ChessMove> {
        MoveGen::new_legal(&self.board).collect()
    }

    pub fn has_legal_moves(&self) -> bool {
        MoveGen::new_legal(&self.board).len() > 0
    }

    pub fn is_legal(&self, mv: ChessMove) -> bool {
        self.board.legal(mv)
    }

    pub fn moved_piece(&self, mv: ChessMove) -> Option<Piece> {
        self.board.piece_on(mv.get_source())
    }

    /// Captured piece, en passant included (the destination square of an
    /// en passant capture is empty).
    pub fn captured_piece(&self, mv: ChessMove) -> Option<Piece> {
        if let Some(pc) = self.board.piece_on(mv.get_dest()) {
            return Some(pc);
        }
        if self.board.piece_on(mv.get_source()) == Some(Pawn)
            && mv.get_source().get_file() != mv.get_dest().get_file()
        {
            return Some(Pawn);
        }
        None
    }

    pub fn is_capture(&self, mv: ChessMove) -> bool {
        self.captured_piece(mv).is_some()
    }

    pub fn is_quiet(&self, mv: ChessMove) -> bool {
        !self.is_capture(mv) && mv.get_promotion().is_none()
    }

    pub fn gives_check(&self, mv: ChessMove) -> bool {
        let b2 = self.board.make_move_new(mv);
        *b2.checkers() != EMPTY
    }

    /// Any piece besides pawns and the king, for the null-move gate.
    pub fn has_non_pawn_material(&self, side: Color) -> bool {
        let own = self.board.color_combined(side);
        let minors_majors = self.board.pieces(Knight)
            | self.board.pieces(Bishop)
            | self.board.pieces(Rook)
            | self.board.pieces(Queen);
        (own & &minors_majors) != EMPTY
    }

    /// Info for the move made k plies ago, None at a null-move boundary.
    pub fn prev_move(&self, k: usize) -> Option<MoveInfo> {
        if k == 0 || k > self.undo.len() {
            return None;
        }
        self.undo[self.undo.len() - k].info
    }

}

/// Make / unmake
impl Pos {

    pub fn make_move(&mut self, mv: ChessMove) {
        let piece = match self.moved_piece(mv) {
            Some(pc) => pc,
            None     => return,
        };
        let capture = self.captured_piece(mv);

        self.undo.push(Undo {
            board:    self.board,
            halfmove: self.halfmove,
            info:     Some(MoveInfo { mv, piece, capture }),
        });
        self.hashes.push(self.board.get_hash());

        self.board = self.board.make_move_new(mv);
        if piece == Pawn || capture.is_some() {
            self.halfmove = 0;
        } else {
            self.halfmove += 1;
        }
    }

    pub fn unmake_move(&mut self) {
        if let Some(u) = self.undo.pop() {
            self.board = u.board;
            self.halfmove = u.halfmove;
            self.hashes.pop();
        }
    }

    pub fn make_null(&mut self) -> bool {
        let b2 = match self.board.null_move() {
            Some(b) => b,
            None    => return false,
        };
        self.undo.push(Undo {
            board:    self.board,
            halfmove: self.halfmove,
            info:     None,
        });
        self.hashes.push(self.board.get_hash());
        self.board = b2;
        self.halfmove += 1;
        true
    }

    pub fn unmake_null(&mut self) {
        self.unmake_move();
    }

}

/// Draw predicates
impl Pos {

    /// Twofold repetition: the current position occurred before, within the
    /// window bounded by the last irreversible move.
    pub fn is_repetition(&self) -> bool {
        let h = self.board.get_hash();
        let window = (self.halfmove as usize).min(self.hashes.len());
        self.hashes[self.hashes.len() - window..]
            .iter()
            .rev()
            .skip(1)
            .step_by(2)
            .any(|&x| x == h)
    }

    pub fn is_fifty_move_draw(&self) -> bool {
        self.halfmove >= 100 && self.has_legal_moves()
    }

    /// KK, KNK and KBK only.
    pub fn insufficient_material(&self) -> bool {
        let occ = *self.board.combined();
        if occ.popcnt() > 3 {
            return false;
        }
        let majors_pawns = self.board.pieces(Pawn)
            | self.board.pieces(Rook)
            | self.board.pieces(Queen);
        majors_pawns == EMPTY
    }

}

/// Hash keys
impl Pos {

    /// Pawn-structure key for the correction history. The rules library has
    /// no incremental pawn hash, so mix the two pawn bitboards directly.
    pub fn pawn_key(&self) -> u64 {
        let wp = (self.board.pieces(Pawn) & self.board.color_combined(White)).0;
        let bp = (self.board.pieces(Pawn) & self.board.color_combined(Black)).0;
        splitmix64(wp ^ splitmix64(bp))
    }

}

#[inline]
fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9e37_79b9_7f4a_7c15);
    x = (x ^ (x >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    x ^ (x >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KIWIPETE: &str = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";

    #[test]
    fn fen_requires_six_fields() {
        assert!(Pos::from_fen("8/8/8/8/8/8/8/k6K w -").is_none());
        assert!(Pos::from_fen(KIWIPETE).is_some());
    }

    #[test]
    fn make_unmake_restores_hash_and_clock() {
        let mut pos = Pos::from_fen(KIWIPETE).unwrap();
        let h0 = pos.hash();
        let moves = pos.legal_moves();
        for &mv in moves.iter().take(8) {
            pos.make_move(mv);
            pos.unmake_move();
            assert_eq!(pos.hash(), h0);
            assert_eq!(pos.halfmove_clock(), 0);
        }
    }

    #[test]
    fn en_passant_counts_as_pawn_capture() {
        let mut pos = Pos::from_fen("4k3/8/8/8/4p3/8/3P4/4K3 w - - 0 1").unwrap();
        let d4: ChessMove = "d2d4".parse().unwrap();
        pos.make_move(d4);
        let ep: ChessMove = "e4d3".parse().unwrap();
        assert!(pos.is_legal(ep));
        assert_eq!(pos.captured_piece(ep), Some(Pawn));
        assert!(!pos.is_quiet(ep));
    }

    #[test]
    fn repetition_detected_after_shuffle() {
        let mut pos = Pos::startpos();
        for mv in ["g1f3", "g8f6", "f3g1", "f6g8"] {
            let mv: ChessMove = mv.parse().unwrap();
            pos.make_move(mv);
        }
        // back at the start position for the second time
        assert!(pos.is_repetition());
    }

    #[test]
    fn null_move_flips_side_and_undoes() {
        let mut pos = Pos::startpos();
        let h0 = pos.hash();
        assert!(pos.make_null());
        assert_eq!(pos.side_to_move(), Black);
        assert_ne!(pos.hash(), h0);
        pos.unmake_null();
        assert_eq!(pos.hash(), h0);
    }

    #[test]
    fn insufficient_material_kk() {
        let pos = Pos::from_fen("8/8/8/8/8/8/8/k6K w - - 0 1").unwrap();
        assert!(pos.insufficient_material());
        let pos = Pos::from_fen("8/8/8/8/8/8/r7/k6K w - - 0 1").unwrap();
        assert!(!pos.insufficient_material());
    }

    #[test]
    fn random_playouts_restore_state_on_unmake() {
        use rand::rngs::StdRng;
        use rand::seq::SliceRandom;
        use rand::SeedableRng;

        let mut rng = StdRng::seed_from_u64(0xC0FFEE);
        for _ in 0..20 {
            let mut pos = Pos::startpos();
            let mut hashes = vec![pos.hash()];
            for _ in 0..60 {
                let moves = pos.legal_moves();
                let mv = match moves.choose(&mut rng) {
                    Some(&mv) => mv,
                    None      => break,
                };
                pos.make_move(mv);
                hashes.push(pos.hash());
            }
            while hashes.len() > 1 {
                pos.unmake_move();
                hashes.pop();
                assert_eq!(pos.hash(), *hashes.last().unwrap());
            }
        }
    }

    #[test]
    fn pawn_key_tracks_pawn_structure_only() {
        let a = Pos::from_fen("4k3/8/8/8/8/8/4P3/4K3 w - - 0 1").unwrap();
        let b = Pos::from_fen("3k4/8/8/8/8/8/4P3/3K4 w - - 0 1").unwrap();
        assert_eq!(a.pawn_key(), b.pawn_key());
        let c = Pos::from_fen("4k3/8/8/8/8/4P3/8/4K3 w - - 0 1").unwrap();
        assert_ne!(a.pawn_key(), c.pawn_key());
    }
}

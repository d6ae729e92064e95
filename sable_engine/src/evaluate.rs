
use crate::board::Pos;
use crate::options::EngineConfig;
use crate::types::*;

use chess::ALL_PIECES;

#[inline]
fn pawns_to_cp(pawns: f64) -> Score {
    (pawns * 100.0).round() as Score
}

/// Piece-square tables, written visually with rank 8 on the first row.
/// Index with sq^56 for White and sq for Black.
#[rustfmt::skip]
const PST_PAWN: [Score; 64] = [
     0,  0,  0,  0,  0,  0,  0,  0,
    50, 50, 50, 50, 50, 50, 50, 50,
    10, 10, 20, 30, 30, 20, 10, 10,
     5,  5, 10, 25, 25, 10,  5,  5,
     0,  0,  0, 20, 20,  0,  0,  0,
     5, -5,-10,  0,  0,-10, -5,  5,
     5, 10, 10,-20,-20, 10, 10,  5,
     0,  0,  0,  0,  0,  0,  0,  0,
];

#[rustfmt::skip]
const PST_KNIGHT: [Score; 64] = [
   -50,-40,-30,-30,-30,-30,-40,-50,
   -40,-20,  0,  0,  0,  0,-20,-40,
   -30,  0, 10, 15, 15, 10,  0,-30,
   -30,  5, 15, 20, 20, 15,  5,-30,
   -30,  0, 15, 20, 20, 15,  0,-30,
   -30,  5, 10, 15, 15, 10,  5,-30,
   -40,-20,  0,  5,  5,  0,-20,-40,
   -50,-40,-30,-30,-30,-30,-40,-50,
];

#[rustfmt::skip]
const PST_BISHOP: [Score; 64] = [
   -20,-10,-10,-10,-10,-10,-10,-20,
   -10,  0,  0,  0,  0,  0,  0,-10,
   -10,  0,  5, 10, 10,  5,  0,-10,
   -10,  5,  5, 10, 10,  5,  5,-10,
   -10,  0, 10, 10, 10, 10,  0,-10,
   -10, 10, 10, 10, 10, 10, 10,-10,
   -10,  5,  0,  0,  0,  0,  5,-10,
   -20,-10,-10,-10,-10,-10,-10,-20,
];

#[rustfmt::skip]
const PST_ROOK: [Score; 64] = [
     0,  0,  0,  0,  0,  0,  0,  0,
     5, 10, 10, 10, 10, 10, 10,  5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
     0,  0,  0,  5,  5,  0,  0,  0,
];

#[rustfmt::skip]
const PST_QUEEN: [Score; 64] = [
   -20,-10,-10, -5, -5,-10,-10,-20,
   -10,  0,  0,  0,  0,  0,  0,-10,
   -10,  0,  5,  5,  5,  5,  0,-10,
    -5,  0,  5,  5,  5,  5,  0, -5,
     0,  0,  5,  5,  5,  5,  0, -5,
   -10,  5,  5,  5,  5,  5,  0,-10,
   -10,  0,  5,  0,  0,  0,  0,-10,
   -20,-10,-10, -5, -5,-10,-10,-20,
];

#[rustfmt::skip]
const PST_KING: [Score; 64] = [
   -30,-40,-40,-50,-50,-40,-40,-30,
   -30,-40,-40,-50,-50,-40,-40,-30,
   -30,-40,-40,-50,-50,-40,-40,-30,
   -30,-40,-40,-50,-50,-40,-40,-30,
   -20,-30,-30,-40,-40,-30,-30,-20,
   -10,-20,-20,-20,-20,-20,-20,-10,
    20, 20,  0,  0,  0,  0, 20, 20,
    20, 30, 10,  0,  0, 10, 30, 20,
];

fn pst(pc: Piece) -> &'static [Score; 64] {
    match pc {
        Pawn   => &PST_PAWN,
        Knight => &PST_KNIGHT,
        Bishop => &PST_BISHOP,
        Rook   => &PST_ROOK,
        Queen  => &PST_QUEEN,
        King   => &PST_KING,
    }
}

/// Mobility weight per piece, centipawns per reachable square.
const MOBILITY_WEIGHTS: [Score; 6] = [0, 4, 3, 2, 1, 0];

const BISHOP_PAIR_CP: Score = 30;
const PAWN_THREAT_CP: Score = 15;
const MINOR_THREAT_CP: Score = 10;
const XRAY_CP: Score = 12;
const KING_PRESSURE_CP: Score = 12;

/// Small probe-style cache for the full evaluation. One slot per index,
/// tagged with the position hash, always-replace.
#[derive(Debug,Clone)]
pub struct EvalCache {
    buf: Vec<(u64, Score)>,
}

const EVAL_CACHE_BITS: usize = 15;

impl Default for EvalCache {
    fn default() -> Self {
        Self { buf: vec![(0, 0); 1 << EVAL_CACHE_BITS] }
    }
}

impl EvalCache {

    pub fn clear(&mut self) {
        for e in self.buf.iter_mut() {
            *e = (0, 0);
        }
    }

    fn probe(&self, hash: u64) -> Option<Score> {
        let (tag, score) = self.buf[hash as usize & ((1 << EVAL_CACHE_BITS) - 1)];
        if tag == hash { Some(score) } else { None }
    }

    fn store(&mut self, hash: u64, score: Score) {
        self.buf[hash as usize & ((1 << EVAL_CACHE_BITS) - 1)] = (hash, score);
    }

}

/// Static evaluation, centipawns from the side to move's point of view.
/// Every term is color-symmetric: eval_stm(B) == -eval_stm(flip(B)).
pub fn evaluate(pos: &Pos, cfg: &EngineConfig, cache: Option<&mut EvalCache>) -> Score {
    let hash = pos.hash();

    if let Some(cache) = &cache {
        if let Some(white_pov) = cache.probe(hash) {
            return stm_pov(white_pov, pos.side_to_move());
        }
    }

    let board = pos.board();
    let white_pov = eval_side(board, White, cfg) - eval_side(board, Black, cfg);

    if let Some(cache) = cache {
        cache.store(hash, white_pov);
    }
    stm_pov(white_pov, pos.side_to_move())
}

#[inline]
fn stm_pov(white_pov: Score, stm: Color) -> Score {
    if stm == White { white_pov } else { -white_pov }
}

fn eval_side(board: &Board, side: Color, cfg: &EngineConfig) -> Score {
    let own = board.color_combined(side);
    let occ = *board.combined();

    let mut material = 0;
    let mut pst_sum = 0;

    for pc in ALL_PIECES {
        let bb = board.pieces(pc) & own;
        material += piece_value(pc) * bb.popcnt() as Score;
        if cfg.use_stock_pst {
            let table = pst(pc);
            for sq in bb {
                let idx = if side == White {
                    sq.to_index() ^ 56
                } else {
                    sq.to_index()
                };
                pst_sum += table[idx];
            }
        }
    }

    let mut score = material;
    score += (pst_sum as f64 * cfg.pst_scale) as Score;

    if (board.pieces(Bishop) & own).popcnt() >= 2 {
        score += BISHOP_PAIR_CP;
    }

    if cfg.mobility_scale != 0.0 {
        score += (mobility(board, side, occ) as f64 * cfg.mobility_scale) as Score;
    }
    if cfg.threat_term != 0.0 {
        score += (threats(board, side) as f64 * cfg.threat_term) as Score;
    }
    if cfg.xray_scale != 0.0 {
        score += (xrays(board, side, occ) as f64 * cfg.xray_scale) as Score;
    }
    if cfg.king_crowding_scale != 0.0 {
        score -= (king_pressure(board, side) as f64 * cfg.king_crowding_scale) as Score;
    }

    score
}

fn mobility(board: &Board, side: Color, occ: BitBoard) -> Score {
    let own = board.color_combined(side);
    let mut total = 0;
    for pc in [Knight, Bishop, Rook, Queen] {
        let w = MOBILITY_WEIGHTS[pc.to_index()];
        for sq in board.pieces(pc) & own {
            let att = match pc {
                Knight => chess::get_knight_moves(sq),
                Bishop => chess::get_bishop_moves(sq, occ),
                Rook   => chess::get_rook_moves(sq, occ),
                _      => chess::get_bishop_moves(sq, occ) | chess::get_rook_moves(sq, occ),
            };
            total += w * (att & !*own).popcnt() as Score;
        }
    }
    total
}

/// Threats by `side`: pawns hitting enemy pieces, minors hitting majors.
fn threats(board: &Board, side: Color) -> Score {
    let them = board.color_combined(!side);
    let enemy_pieces = (board.pieces(Knight)
        | board.pieces(Bishop)
        | board.pieces(Rook)
        | board.pieces(Queen))
        & them;
    let enemy_majors = (board.pieces(Rook) | board.pieces(Queen)) & them;
    let occ = *board.combined();

    let mut total = 0;

    for sq in board.pieces(Pawn) & board.color_combined(side) {
        let att = chess::get_pawn_attacks(sq, side, enemy_pieces);
        total += PAWN_THREAT_CP * att.popcnt() as Score;
    }

    for sq in board.pieces(Knight) & board.color_combined(side) {
        total += MINOR_THREAT_CP * (chess::get_knight_moves(sq) & enemy_majors).popcnt() as Score;
    }
    for sq in board.pieces(Bishop) & board.color_combined(side) {
        total += MINOR_THREAT_CP
            * (chess::get_bishop_moves(sq, occ) & enemy_majors).popcnt() as Score;
    }

    total
}

/// Sliders of `side` x-raying the enemy king or queen through one blocker.
fn xrays(board: &Board, side: Color, occ: BitBoard) -> Score {
    let own = board.color_combined(side);
    let targets = (board.pieces(King) | board.pieces(Queen)) & board.color_combined(!side);
    let mut total = 0;

    for pc in [Bishop, Rook, Queen] {
        for sq in board.pieces(pc) & own {
            let direct = match pc {
                Bishop => chess::get_bishop_moves(sq, occ),
                Rook   => chess::get_rook_moves(sq, occ),
                _      => chess::get_bishop_moves(sq, occ) | chess::get_rook_moves(sq, occ),
            };
            let blockers = direct & occ;
            let behind = match pc {
                Bishop => chess::get_bishop_moves(sq, occ ^ blockers),
                Rook   => chess::get_rook_moves(sq, occ ^ blockers),
                _      => {
                    chess::get_bishop_moves(sq, occ ^ blockers)
                        | chess::get_rook_moves(sq, occ ^ blockers)
                },
            };
            total += XRAY_CP * ((behind & !direct) & targets).popcnt() as Score;
        }
    }
    total
}

/// Enemy pieces bearing on the ring around `side`'s king.
fn king_pressure(board: &Board, side: Color) -> Score {
    let ksq = board.king_square(side);
    let ring = chess::get_king_moves(ksq) | BitBoard::from_square(ksq);
    let them = board.color_combined(!side);
    let occ = *board.combined();

    let mut count = 0;
    for sq in board.pieces(Knight) & them {
        if (chess::get_knight_moves(sq) & ring) != EMPTY {
            count += 1;
        }
    }
    for sq in (board.pieces(Bishop) | board.pieces(Queen)) & them {
        if (chess::get_bishop_moves(sq, occ) & ring) != EMPTY {
            count += 1;
        }
    }
    for sq in (board.pieces(Rook) | board.pieces(Queen)) & them {
        if (chess::get_rook_moves(sq, occ) & ring) != EMPTY {
            count += 1;
        }
    }
    count * KING_PRESSURE_CP
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::flip_fen;

    #[test]
    fn eval_is_invariant_under_color_mirror() {
        // mirroring the board and the side to move leaves the mover's
        // view of the position unchanged
        let cfg = EngineConfig::default();
        let fens = [
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "4k3/4P3/4K3/8/8/8/8/8 w - - 0 1",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
        ];
        for fen in fens {
            let pos = Pos::from_fen(fen).unwrap();
            let flipped = Pos::from_fen(&flip_fen(fen).unwrap()).unwrap();
            assert_eq!(
                evaluate(&pos, &cfg, None),
                evaluate(&flipped, &cfg, None),
                "asymmetric eval for {}", fen,
            );
        }
    }

    #[test]
    fn eval_negates_when_only_the_mover_changes() {
        let cfg = EngineConfig::default();
        // same placement, no check, no en passant: legal for either mover
        let w = Pos::from_fen("4k3/8/8/3b4/8/8/3R4/4K3 w - - 0 1").unwrap();
        let b = Pos::from_fen("4k3/8/8/3b4/8/8/3R4/4K3 b - - 0 1").unwrap();
        assert_eq!(evaluate(&w, &cfg, None), -evaluate(&b, &cfg, None));
    }

    #[test]
    fn startpos_is_balanced() {
        let cfg = EngineConfig::default();
        let pos = Pos::startpos();
        assert_eq!(evaluate(&pos, &cfg, None), 0);
    }

    #[test]
    fn extra_pawn_is_positive_for_the_side_owning_it() {
        let cfg = EngineConfig::default();
        let pos = Pos::from_fen("4k3/4P3/4K3/8/8/8/8/8 w - - 0 1").unwrap();
        assert!(evaluate(&pos, &cfg, None) > 0);
    }

    #[test]
    fn cache_returns_the_computed_score() {
        let cfg = EngineConfig::default();
        let pos = Pos::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1").unwrap();
        let mut cache = EvalCache::default();
        let a = evaluate(&pos, &cfg, Some(&mut cache));
        let b = evaluate(&pos, &cfg, Some(&mut cache));
        assert_eq!(a, b);
        assert_eq!(a, evaluate(&pos, &cfg, None));
    }
}

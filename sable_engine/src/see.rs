
use crate::types::*;

use chess::ALL_PIECES;

/// All pieces of either color attacking `sq` under occupancy `occ`.
pub fn attackers_to(board: &Board, sq: Square, occ: BitBoard) -> BitBoard {
    let rq = board.pieces(Rook) | board.pieces(Queen);
    let bq = board.pieces(Bishop) | board.pieces(Queen);
    let wp = board.pieces(Pawn) & board.color_combined(White);
    let bp = board.pieces(Pawn) & board.color_combined(Black);

    let mut att = chess::get_knight_moves(sq) & board.pieces(Knight);
    att |= chess::get_king_moves(sq) & board.pieces(King);
    att |= chess::get_rook_moves(sq, occ) & rq;
    att |= chess::get_bishop_moves(sq, occ) & bq;
    // a white pawn attacks sq iff sq attacks it as a black pawn
    att |= chess::get_pawn_attacks(sq, Black, wp);
    att |= chess::get_pawn_attacks(sq, White, bp);
    att & occ
}

fn least_valuable(board: &Board, set: BitBoard) -> Option<(Piece, BitBoard)> {
    for pc in ALL_PIECES {
        let subset = set & board.pieces(pc);
        if subset != EMPTY {
            return Some((pc, BitBoard::from_square(subset.to_square())));
        }
    }
    None
}

/// Static exchange evaluation of a capture: material outcome in centipawns
/// of the full exchange sequence on the destination square, from the view
/// of the capturing side. Deterministic per position and move.
///
/// The swap enumerates attackers in piece-value order, hides each capturer
/// from the occupancy, and re-scans the rook/bishop rays so that sliders
/// stacked behind the capturer join the exchange.
pub fn see(board: &Board, mv: ChessMove) -> Score {
    let from = mv.get_source();
    let to = mv.get_dest();

    let victim = match board.piece_on(to) {
        Some(pc) => pc,
        // en passant: value of pawn takes pawn is a wash
        None     => return 0,
    };

    let mut pc = match board.piece_on(from) {
        Some(pc) => pc,
        None     => return 0,
    };

    let may_xray = board.pieces(Pawn)
        | board.pieces(Bishop)
        | board.pieces(Rook)
        | board.pieces(Queen);
    let rq = board.pieces(Rook) | board.pieces(Queen);
    let bq = board.pieces(Bishop) | board.pieces(Queen);

    let mut occ = *board.combined();
    let mut from_set = BitBoard::from_square(from);
    let mut attackers = attackers_to(board, to, occ);

    let mut gain = [0 as Score; 32];
    let mut d: usize = 0;
    gain[0] = see_value(victim);

    let mut side = board.side_to_move();

    loop {
        // the last capturer becomes the new target on `to`
        occ ^= from_set;
        attackers &= !from_set;
        if (from_set & may_xray) != EMPTY {
            attackers |= (chess::get_rook_moves(to, occ) & rq)
                | (chess::get_bishop_moves(to, occ) & bq);
            attackers &= occ;
        }

        side = !side;
        let own = attackers & board.color_combined(side);
        let (next_pc, next_from) = match least_valuable(board, own) {
            Some(x) => x,
            None    => break,
        };

        if d + 1 >= gain.len() {
            break;
        }
        d += 1;
        gain[d] = see_value(pc) - gain[d - 1];

        pc = next_pc;
        from_set = next_from;
    }

    // negamax the gain list backwards: either side may stand pat
    while d > 0 {
        gain[d - 1] = -Score::max(-gain[d - 1], gain[d]);
        d -= 1;
    }
    gain[0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Pos;

    fn see_str(fen: &str, mv: &str) -> Score {
        let pos = Pos::from_fen(fen).unwrap();
        let mv: ChessMove = mv.parse().unwrap();
        see(pos.board(), mv)
    }

    #[test]
    fn undefended_pawn_is_free() {
        assert_eq!(see_str("4k3/8/8/3p4/8/8/8/3RK3 w - - 0 1", "d1d5"), 100);
    }

    #[test]
    fn defended_pawn_loses_the_rook() {
        assert_eq!(
            see_str("4k3/4p3/3p4/8/8/8/8/3RK3 w - - 0 1", "d1d6"),
            100 - 500,
        );
    }

    #[test]
    fn equal_trade_is_zero() {
        assert_eq!(see_str("4k3/8/8/3n4/8/4N3/8/4K3 w - - 0 1", "e3d5"), 320);
        // defended: the recapture wins the knight back
        assert_eq!(
            see_str("4k3/3r4/8/3n4/8/4N3/8/4K3 w - - 0 1", "e3d5"),
            320 - 320,
        );
        // defended, but a backup rook makes recapturing a mistake
        assert_eq!(
            see_str("4k3/3r4/8/3n4/8/4N3/8/3RK3 w - - 0 1", "e3d5"),
            320,
        );
    }

    #[test]
    fn xray_slider_joins_the_exchange() {
        // Rd1 behind Rd3; taking on d5 is backed up by the second rook.
        let s = see_str("3rk3/8/8/3p4/8/3R4/8/3RK3 w - - 0 1", "d3d5");
        assert_eq!(s, 100);
    }

    #[test]
    fn deterministic() {
        let fen = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
        let pos = Pos::from_fen(fen).unwrap();
        for mv in pos.legal_moves() {
            if pos.is_capture(mv) {
                assert_eq!(see(pos.board(), mv), see(pos.board(), mv));
            }
        }
    }

    use crate::util::{flip_fen, flip_move};

    #[test]
    fn see_is_color_symmetric() {
        let fens = [
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "4k3/3r4/8/3n4/8/4N3/8/3RK3 w - - 0 1",
            "3rk3/8/8/3p4/8/3R4/8/3RK3 w - - 0 1",
            "rnbqkbnr/ppp1pppp/8/3p4/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2",
        ];
        for fen in fens {
            let pos = Pos::from_fen(fen).unwrap();
            let flipped = Pos::from_fen(&flip_fen(fen).unwrap()).unwrap();
            for mv in pos.legal_moves() {
                if !pos.is_capture(mv) {
                    continue;
                }
                let fmv = flip_move(mv);
                assert!(flipped.is_legal(fmv), "flip of {} illegal", mv);
                assert_eq!(
                    see(pos.board(), mv),
                    see(flipped.board(), fmv),
                    "SEE asymmetry for {} in {}", mv, fen,
                );
            }
        }
    }
}

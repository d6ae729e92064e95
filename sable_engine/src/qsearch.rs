
use crate::board::Pos;
use crate::explore::ExHelper;
use crate::movepick::{MovePicker, Stage};
use crate::trans_table::Node;
use crate::types::*;

/// Quiescence
impl<'a> ExHelper<'a> {

    /// Tactical-only search at the horizon. In check: full evasions, no
    /// stand-pat. Otherwise: stand-pat, then captures and promotions with
    /// SEE-losing captures pruned.
    pub fn qsearch(
        &mut self,
        pos:         &mut Pos,
        ply:         Depth,
        mut alpha:   Score,
        beta:        Score,
        pv_node:     bool,
    ) -> Score {
        self.stats.qt_nodes += 1;
        self.stats.inc_max_ply(ply);

        self.checkpoint();
        if self.stopped {
            return 0;
        }

        let in_check = pos.in_check();

        if ply >= MAX_PLY {
            return if in_check { DRAW_SCORE } else { self.static_eval(pos) };
        }

        // depth-0 TT probe: early cutoff at non-PV nodes, ordering otherwise
        let mut tt_move = None;
        if let Some(e) = self.check_tt(pos.hash(), ply) {
            tt_move = e.best_move;
            if !pv_node {
                match e.node_type {
                    Node::Exact                     => return e.score,
                    Node::Lower if e.score >= beta  => return e.score,
                    Node::Upper if e.score <= alpha => return e.score,
                    _                               => {},
                }
            }
        }

        let mut best_score = -SCORE_INF;

        if !in_check {
            let stand_pat = self.static_eval(pos);
            if stand_pat >= beta {
                self.tt.store(pos.hash(), 0, Node::Lower, stand_pat, ply, None);
                return beta; // fail hard
            }
            if stand_pat > alpha {
                alpha = stand_pat;
            }
            best_score = stand_pat;
        }

        let mut picker = MovePicker::new_qsearch(pos, tt_move);
        let mut best_move = None;
        let mut moves_tried = 0;
        let mut raised = false;

        loop {
            let mv = match picker.next(pos, self.heur, self.cfg, &mut self.stats) {
                Some(mv) => mv,
                None     => break,
            };
            // losing captures never resolve the horizon in our favor
            if !in_check && picker.stage() == Stage::BadCaptures {
                break;
            }

            pos.make_move(mv);
            moves_tried += 1;
            let score = -self.qsearch(pos, ply + 1, -beta, -alpha, pv_node);
            pos.unmake_move();
            if self.stopped {
                return 0;
            }

            if score > best_score {
                best_score = score;
                if score > alpha {
                    best_move = Some(mv);
                    raised = true;
                    alpha = score;
                    if alpha >= beta {
                        self.tt.store(pos.hash(), 0, Node::Lower, best_score, ply, best_move);
                        return beta; // fail hard
                    }
                }
            }
        }

        // an evasion exists iff the king is not mated
        if in_check && moves_tried == 0 {
            self.stats.checkmates += 1;
            return mated_in(ply);
        }

        let bound = if raised { Node::Exact } else { Node::Upper };
        self.tt.store(pos.hash(), 0, bound, best_score, ply, best_move);

        alpha
    }

}

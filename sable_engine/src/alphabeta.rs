
use crate::board::Pos;
use crate::explore::ExHelper;
use crate::movepick::{MovePicker, Stage};
use crate::trans_table::Node;
use crate::tuning::*;
use crate::types::*;

use arrayvec::ArrayVec;

/// Negamax core
impl<'a> ExHelper<'a> {

    /// depth = remaining plies, ply = distance from root. Returns a score
    /// from the side to move's point of view; garbage once `self.stopped`
    /// is set (callers discard the aborted iteration).
    pub fn negamax(
        &mut self,
        pos:         &mut Pos,
        depth:       Depth,
        ply:         Depth,
        mut alpha:   Score,
        mut beta:    Score,
        pv_node:     bool,
        allow_null:  bool,
    ) -> Score {
        self.stats.nodes += 1;
        self.stats.inc_max_ply(ply);

        self.checkpoint();
        if self.stopped {
            return 0;
        }

        // draws never propagate out of the rules library
        if pos.is_repetition() || pos.is_fifty_move_draw() {
            return self.draw_score(pos);
        }
        if pos.insufficient_material() {
            return DRAW_SCORE;
        }

        if depth <= 0 {
            if self.cfg.use_quiescence {
                return self.qsearch(pos, ply, alpha, beta, pv_node);
            }
            return self.static_eval(pos);
        }

        if ply >= MAX_PLY {
            return self.static_eval(pos);
        }

        // mate-distance pruning
        alpha = alpha.max(mated_in(ply));
        beta = beta.min(mate_in(ply + 1));
        if alpha >= beta {
            return alpha;
        }

        let stm = pos.side_to_move();
        let in_check = pos.in_check();

        let mut tt_move = None;
        if let Some(e) = self.check_tt(pos.hash(), ply) {
            tt_move = e.best_move;
            self.stack.with(ply, |st| st.tt_hit = true);
            if !pv_node && e.depth >= depth {
                match e.node_type {
                    Node::Exact                     => return e.score,
                    Node::Lower if e.score >= beta  => return e.score,
                    Node::Upper if e.score <= alpha => return e.score,
                    _                               => {},
                }
            }
        }

        let static_eval = if in_check { None } else { Some(self.static_eval(pos)) };
        // the pruning gates below consume the corrected eval, never the raw one
        let eval_for_gates = static_eval.map(|e| self.corrected_eval(pos, e));
        self.stack.with(ply, |st| {
            st.in_check = in_check;
            st.static_eval = static_eval;
            st.current_move = None;
        });

        // razoring: hopeless shallow nodes drop straight to quiescence
        if self.cfg.use_razoring
            && !pv_node
            && !in_check
            && (RAZOR_MIN_DEPTH..=RAZOR_MAX_DEPTH).contains(&depth)
            && !is_mate_score(alpha)
        {
            if let Some(eval) = eval_for_gates {
                let margin = if depth == 2 {
                    self.cfg.razor_margin_d2
                } else {
                    self.cfg.razor_margin_d3
                };
                if eval + margin <= alpha {
                    self.stats.razor_attempts += 1;
                    let v = self.qsearch(pos, ply, alpha - 1, alpha, false);
                    if self.stopped {
                        return 0;
                    }
                    if v < alpha {
                        self.stats.razor_cutoffs += 1;
                        return v;
                    }
                }
            }
        }

        // null move: hand over the move and search reduced; a fail-high
        // from a position strong enough to skip a turn prunes the node
        if self.cfg.use_null_move_pruning
            && !pv_node
            && !in_check
            && allow_null
            && depth >= NULL_MOVE_MIN_DEPTH
            && beta < MATE_BOUND
            && pos.has_non_pawn_material(stm)
            && pos.make_null()
        {
            let r = null_move_reduction(depth);
            let v = -self.negamax(pos, depth - 1 - r, ply + 1, -beta, -beta + 1, false, false);
            pos.unmake_null();
            if self.stopped {
                return 0;
            }
            if v >= beta {
                self.stats.null_prunes += 1;
                return beta;
            }
        }

        // internal iterative deepening populates a TT move for ordering
        if self.cfg.use_iid && pv_node && tt_move.is_none() && depth >= IID_MIN_DEPTH {
            self.negamax(pos, depth - IID_REDUCTION, ply, alpha, beta, true, false);
            if self.stopped {
                return 0;
            }
            if let Some(e) = self.tt.probe(pos.hash(), ply) {
                tt_move = e.best_move;
            }
        }

        let killers = self.heur.killers.get(ply);
        let counter = pos
            .prev_move(1)
            .and_then(|prev| self.heur.counter_moves.get(stm, prev));

        let mut picker = MovePicker::new(pos, tt_move, [killers.0, killers.1], counter, depth);

        let mut quiets_tried: ArrayVec<ChessMove, 64> = ArrayVec::new();
        let mut caps_tried: ArrayVec<ChessMove, 64> = ArrayVec::new();
        let mut moves_tried: usize = 0;
        let mut best_score = -SCORE_INF;
        let mut best_move = None;
        let mut raised = false;

        loop {
            let mv = match picker.next(pos, self.heur, self.cfg, &mut self.stats) {
                Some(mv) => mv,
                None     => break,
            };
            let is_quiet = pos.is_quiet(mv);

            // move-count pruning: shallow late quiets are not worth a node
            if self.cfg.use_move_count_pruning
                && !pv_node
                && !in_check
                && is_quiet
                && best_score > -MATE_BOUND
                && moves_tried >= MOVE_COUNT_MIN_TRIED
                && moves_tried >= move_count_limit(depth)
            {
                self.stats.movecount_prunes += 1;
                continue;
            }

            let gives_check = pos.gives_check(mv);
            let from_badcap = picker.stage() == Stage::BadCaptures;

            pos.make_move(mv);
            let made = pos.prev_move(1);
            self.stack.with(ply, |st| st.current_move = made);

            if from_badcap {
                self.stats.badcap_searched += 1;
            }
            if is_quiet && depth >= 10 {
                self.stats.quiet_searched_ge10 += 1;
            }

            let new_depth = depth - 1;
            let mut score;

            if moves_tried == 0 {
                score = -self.negamax(pos, new_depth, ply + 1, -beta, -alpha, pv_node, true);
            } else {
                // late quiets get a reduced null-window look first
                let mut reduction = 0;
                if is_quiet
                    && !in_check
                    && !gives_check
                    && Some(mv) != tt_move
                    && depth >= LMR_MIN_DEPTH
                    && moves_tried >= LMR_MIN_MOVES
                {
                    let hist = self.heur.history.get(stm, mv);
                    reduction = (lmr_reduction(depth, moves_tried)
                        - (hist / 8192) as Depth)
                        .clamp(0, new_depth - 1);
                }

                if reduction > 0 {
                    self.stats.lmrs.0 += 1;
                    score = -self.negamax(
                        pos, new_depth - reduction, ply + 1, -alpha - 1, -alpha, false, true,
                    );
                    if score > alpha && !self.stopped {
                        self.stats.lmrs.1 += 1;
                        if is_quiet && depth >= 10 {
                            self.stats.quiet_researched_ge10 += 1;
                        }
                        score = -self.negamax(
                            pos, new_depth, ply + 1, -alpha - 1, -alpha, false, true,
                        );
                    }
                } else {
                    score = -self.negamax(
                        pos, new_depth, ply + 1, -alpha - 1, -alpha, false, true,
                    );
                }

                // PVS re-search on fail-high inside a PV node
                if pv_node && score > alpha && score < beta && !self.stopped {
                    score = -self.negamax(pos, new_depth, ply + 1, -beta, -alpha, true, true);
                }
            }

            pos.unmake_move();
            if self.stopped {
                return 0;
            }

            moves_tried += 1;
            if is_quiet {
                let _ = quiets_tried.try_push(mv);
            } else {
                let _ = caps_tried.try_push(mv);
            }

            if score > best_score {
                best_score = score;
                best_move = Some(mv);
                if score > alpha {
                    alpha = score;
                    raised = true;
                    if alpha >= beta {
                        self.on_beta_cutoff(pos, depth, ply, mv, is_quiet, &quiets_tried);
                        break;
                    }
                }
            }
        }

        if moves_tried == 0 {
            if in_check {
                self.stats.checkmates += 1;
                return mated_in(ply);
            }
            self.stats.stalemates += 1;
            return DRAW_SCORE;
        }

        // teach the correction history how far static eval missed
        if self.cfg.use_correction_history && !in_check && !is_mate_score(best_score) {
            if let Some(e) = static_eval {
                let lower_ok = best_score > e || best_score < beta;
                let upper_ok = best_score < e || raised;
                if lower_ok && upper_ok {
                    self.heur
                        .correction
                        .update(stm, pos.pawn_key(), depth, best_score - e);
                }
            }
        }

        let bound = if best_score >= beta {
            Node::Lower
        } else if raised {
            Node::Exact
        } else {
            Node::Upper
        };
        self.tt.store(pos.hash(), depth, bound, best_score, ply, best_move);

        best_score
    }

    /// Cutoff bookkeeping: killers, butterfly bonus/malus, continuation
    /// bonus, counter move, capture history.
    fn on_beta_cutoff(
        &mut self,
        pos:           &Pos,
        depth:         Depth,
        ply:           Depth,
        mv:            ChessMove,
        is_quiet:      bool,
        quiets_tried:  &[ChessMove],
    ) {
        let stm = pos.side_to_move();
        let bonus = stat_bonus(depth);

        if is_quiet {
            self.heur.killers.store(ply, mv);

            if self.cfg.use_history_heuristic {
                self.heur.history.update(stm, mv, bonus);
                for &q in quiets_tried.iter().filter(|&&q| q != mv) {
                    self.heur.history.update(stm, q, -bonus);
                }
            }

            if let Some(pc) = pos.moved_piece(mv) {
                if self.cfg.use_continuation_history {
                    for k in 0..2 {
                        if let Some(prev) = pos.prev_move(k + 1) {
                            self.heur.continuation[k].update(prev, pc, mv.get_dest(), bonus);
                        }
                    }
                }
            }

            if let Some(prev) = pos.prev_move(1) {
                self.heur.counter_moves.store(stm, prev, mv);
            }
        } else if self.cfg.use_capture_history {
            if let (Some(pc), Some(victim)) = (pos.moved_piece(mv), pos.captured_piece(mv)) {
                self.heur.capture_history.update(pc, mv.get_dest(), victim, bonus);
            }
        }
    }

}

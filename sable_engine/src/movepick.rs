
use crate::board::{MoveInfo, Pos};
use crate::heuristics::Heuristics;
use crate::options::EngineConfig;
use crate::searchstats::SearchStats;
use crate::see::see;
use crate::types::*;

use arrayvec::ArrayVec;
use chess::MoveGen;

#[derive(Debug,Eq,PartialEq,Ord,PartialOrd,Clone,Copy)]
pub enum Stage {
    TTMove,
    GenCaptures,
    GoodCaptures,
    Killer1,
    Killer2,
    CounterMove,
    GenQuiets,
    Quiets,
    BadCaptures,
    GenEvasions,
    Evasions,
    Done,
}

type ScoredMoves<const N: usize> = ArrayVec<(ChessMove, Score), N>;

/// Lazy staged move enumerator. Yields the TT move before generating
/// anything, then captures by SEE + capture history, killers, the counter
/// move, history-ordered quiets, and finally the deferred bad captures.
/// In check it degenerates to TT move + ordered evasions.
pub struct MovePicker {
    stage:          Stage,
    tt_move:        Option<ChessMove>,
    killers:        [Option<ChessMove>; 2],
    counter:        Option<ChessMove>,
    depth:          Depth,
    qsearch:        bool,
    prev:           [Option<MoveInfo>; 2],
    captures:       ScoredMoves<128>,
    bad_captures:   ScoredMoves<128>,
    quiets:         ScoredMoves<256>,
    badcap_node_counted: bool,
}

/// New
impl MovePicker {

    pub fn new(
        pos:      &Pos,
        tt_move:  Option<ChessMove>,
        killers:  [Option<ChessMove>; 2],
        counter:  Option<ChessMove>,
        depth:    Depth,
    ) -> Self {
        Self {
            stage:     Stage::TTMove,
            tt_move,
            killers,
            counter,
            depth,
            qsearch:   false,
            prev:      [pos.prev_move(1), pos.prev_move(2)],
            captures:      ArrayVec::new(),
            bad_captures:  ArrayVec::new(),
            quiets:        ArrayVec::new(),
            badcap_node_counted: false,
        }
    }

    /// Tactical-only enumeration: TT move (if tactical), captures and
    /// promotions. The caller stops at the bad-capture stage.
    pub fn new_qsearch(pos: &Pos, tt_move: Option<ChessMove>) -> Self {
        let mut picker = Self::new(pos, tt_move, [None; 2], None, 0);
        picker.qsearch = true;
        picker
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

}

/// Stage machine
impl MovePicker {

    pub fn next(
        &mut self,
        pos:    &Pos,
        heur:   &Heuristics,
        cfg:    &EngineConfig,
        stats:  &mut SearchStats,
    ) -> Option<ChessMove> {
        loop {
            match self.stage {

                Stage::TTMove => {
                    self.stage = if pos.in_check() {
                        Stage::GenEvasions
                    } else {
                        Stage::GenCaptures
                    };
                    if let Some(tt) = self.tt_move {
                        let tactical_ok = !self.qsearch || !pos.is_quiet(tt) || pos.in_check();
                        if tactical_ok && pos.is_legal(tt) {
                            return Some(tt);
                        }
                    }
                },

                Stage::GenCaptures => {
                    self.gen_captures(pos, heur, cfg);
                    if !self.bad_captures.is_empty() {
                        stats.badcap_gen_nodes += 1;
                        stats.badcap_generated += self.bad_captures.len() as u64;
                    }
                    self.stage = Stage::GoodCaptures;
                },

                Stage::GoodCaptures => {
                    if let Some(mv) = pick_best(&mut self.captures) {
                        return Some(mv);
                    }
                    self.stage = if self.qsearch {
                        Stage::BadCaptures
                    } else {
                        Stage::Killer1
                    };
                },

                Stage::Killer1 => {
                    self.stage = Stage::Killer2;
                    if let Some(mv) = self.killer_candidate(pos, self.killers[0]) {
                        return Some(mv);
                    }
                },

                Stage::Killer2 => {
                    self.stage = Stage::CounterMove;
                    if let Some(mv) = self.killer_candidate(pos, self.killers[1]) {
                        return Some(mv);
                    }
                },

                Stage::CounterMove => {
                    self.stage = Stage::GenQuiets;
                    if let Some(cm) = self.counter {
                        if Some(cm) != self.tt_move
                            && Some(cm) != self.killers[0]
                            && Some(cm) != self.killers[1]
                            && pos.is_quiet(cm)
                            && pos.is_legal(cm)
                        {
                            return Some(cm);
                        }
                    }
                },

                Stage::GenQuiets => {
                    self.gen_quiets(pos, heur, cfg);
                    self.stage = Stage::Quiets;
                },

                Stage::Quiets => {
                    if let Some(mv) = pick_best(&mut self.quiets) {
                        return Some(mv);
                    }
                    self.stage = Stage::BadCaptures;
                },

                Stage::BadCaptures => {
                    if !self.bad_captures.is_empty() && !self.badcap_node_counted {
                        self.badcap_node_counted = true;
                        stats.badcap_nodes += 1;
                    }
                    if let Some(mv) = pick_best(&mut self.bad_captures) {
                        stats.badcap_picked += 1;
                        return Some(mv);
                    }
                    self.stage = Stage::Done;
                },

                Stage::GenEvasions => {
                    self.gen_evasions(pos, heur, cfg);
                    self.stage = Stage::Evasions;
                },

                Stage::Evasions => {
                    if let Some(mv) = pick_best(&mut self.captures) {
                        return Some(mv);
                    }
                    self.stage = Stage::Done;
                },

                Stage::Done => return None,
            }
        }
    }

    fn killer_candidate(&self, pos: &Pos, killer: Option<ChessMove>) -> Option<ChessMove> {
        let k = killer?;
        if Some(k) == self.tt_move {
            return None;
        }
        if !pos.is_quiet(k) || !pos.is_legal(k) {
            return None;
        }
        Some(k)
    }

}

/// Generation + scoring
impl MovePicker {

    fn gen_captures(&mut self, pos: &Pos, heur: &Heuristics, cfg: &EngineConfig) {
        let board = pos.board();
        let stm = pos.side_to_move();

        // SEE threshold for the good/bad split; shallow nodes demand +1cp.
        // qsearch keeps the plain SEE >= 0 split so equal trades survive.
        let threshold = if self.qsearch {
            0
        } else {
            cfg.good_capture_see_threshold_cp + if self.depth <= 2 { 1 } else { 0 }
        };

        let mut cap_mask = *board.color_combined(!stm);
        if let Some(ep) = board.en_passant() {
            // the rules library reports the double-moved pawn's square;
            // the capture lands one step past it
            let dest = match ep.get_rank() {
                Rank::Fourth | Rank::Fifth => ep.forward(stm),
                _                          => Some(ep),
            };
            if let Some(d) = dest {
                cap_mask |= BitBoard::from_square(d);
            }
        }

        let mut mg = MoveGen::new_legal(board);
        mg.set_iterator_mask(cap_mask);
        for mv in &mut mg {
            self.push_capture(pos, heur, cfg, mv, threshold);
        }

        // quiet promotions belong to the tactical stage too
        let promo_ranks = chess::get_rank(Rank::First) | chess::get_rank(Rank::Eighth);
        let promo_mask = promo_ranks & !*board.combined();
        let mut mg = MoveGen::new_legal(board);
        mg.set_iterator_mask(promo_mask);
        for mv in &mut mg {
            if mv.get_promotion().is_some() {
                self.push_capture(pos, heur, cfg, mv, threshold);
            }
        }
    }

    fn push_capture(
        &mut self,
        pos:        &Pos,
        heur:       &Heuristics,
        cfg:        &EngineConfig,
        mv:         ChessMove,
        threshold:  Score,
    ) {
        if Some(mv) == self.tt_move {
            return;
        }
        let see_score = see(pos.board(), mv);

        let mut score = 16 * see_score;
        if let Some(victim) = pos.captured_piece(mv) {
            score += piece_value(victim);
        }
        if let Some(promo) = mv.get_promotion() {
            score += piece_value(promo);
        }
        if cfg.use_capture_history {
            if let (Some(pc), Some(victim)) = (pos.moved_piece(mv), pos.captured_piece(mv)) {
                score += cfg.capture_history_ordering_mult
                    * heur.capture_history.get(pc, mv.get_dest(), victim);
            }
        }

        if see_score >= threshold {
            let _ = self.captures.try_push((mv, score));
        } else {
            score -= 16 * cfg.bad_capture_penalty_cp;
            let _ = self.bad_captures.try_push((mv, score));
        }
    }

    fn gen_quiets(&mut self, pos: &Pos, heur: &Heuristics, cfg: &EngineConfig) {
        let board = pos.board();
        let mut mg = MoveGen::new_legal(board);
        mg.set_iterator_mask(!EMPTY);
        for mv in &mut mg {
            if !pos.is_quiet(mv) {
                continue;
            }
            if Some(mv) == self.tt_move
                || Some(mv) == self.killers[0]
                || Some(mv) == self.killers[1]
                || Some(mv) == self.counter
            {
                continue;
            }
            let score = self.quiet_score(pos, heur, cfg, mv);
            let _ = self.quiets.try_push((mv, score));
        }
    }

    fn quiet_score(
        &self,
        pos:   &Pos,
        heur:  &Heuristics,
        cfg:   &EngineConfig,
        mv:    ChessMove,
    ) -> Score {
        let mut score = 0;
        if cfg.use_history_heuristic {
            let h = heur.history.get(pos.side_to_move(), mv);
            score += (h as f64 * cfg.history_ordering_mult) as Score;
        }
        if cfg.use_continuation_history {
            if let Some(pc) = pos.moved_piece(mv) {
                let to = mv.get_dest();
                for (i, prev) in self.prev.iter().enumerate() {
                    if let Some(prev) = prev {
                        let c = heur.continuation[i].get(*prev, pc, to);
                        score += (c as f64 * cfg.continuation_ordering_mult) as Score;
                    }
                }
            }
        }
        score
    }

    /// In check every legal move is an evasion; captures first by value,
    /// quiets by history.
    fn gen_evasions(&mut self, pos: &Pos, heur: &Heuristics, cfg: &EngineConfig) {
        let board = pos.board();
        for mv in MoveGen::new_legal(board) {
            if Some(mv) == self.tt_move {
                continue;
            }
            let score = if let Some(victim) = pos.captured_piece(mv) {
                1_000_000 + 16 * see(board, mv) + piece_value(victim)
            } else {
                self.quiet_score(pos, heur, cfg, mv)
            };
            let _ = self.captures.try_push((mv, score));
        }
    }

}

/// Partial selection sort: find the max, swap-remove it.
fn pick_best<const N: usize>(list: &mut ScoredMoves<N>) -> Option<ChessMove> {
    if list.is_empty() {
        return None;
    }
    let mut best = 0;
    for i in 1..list.len() {
        if list[i].1 > list[best].1 {
            best = i;
        }
    }
    Some(list.swap_remove(best).0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristics::Heuristics;

    fn drain(pos: &Pos, picker: &mut MovePicker) -> Vec<ChessMove> {
        let heur = Heuristics::default();
        let cfg = EngineConfig::default();
        let mut stats = SearchStats::default();
        let mut out = vec![];
        while let Some(mv) = picker.next(pos, &heur, &cfg, &mut stats) {
            out.push(mv);
        }
        out
    }

    #[test]
    fn yields_every_legal_move_exactly_once() {
        let pos = Pos::from_fen(
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
        ).unwrap();
        let mut picker = MovePicker::new(&pos, None, [None; 2], None, 4);
        let mut yielded = drain(&pos, &mut picker);
        let mut legal = pos.legal_moves();
        yielded.sort_by_key(|m| m.to_string());
        legal.sort_by_key(|m| m.to_string());
        assert_eq!(yielded, legal);
    }

    #[test]
    fn tt_move_comes_first() {
        let pos = Pos::startpos();
        let tt: ChessMove = "e2e4".parse().unwrap();
        let mut picker = MovePicker::new(&pos, Some(tt), [None; 2], None, 4);
        let yielded = drain(&pos, &mut picker);
        assert_eq!(yielded[0], tt);
        assert_eq!(yielded.iter().filter(|&&m| m == tt).count(), 1);
    }

    #[test]
    fn winning_capture_before_losing_capture() {
        // Qxd5 (defended pawn, SEE < 0) must come after Rxh5 (free rook)
        let pos = Pos::from_fen("4k3/8/2p5/3p3r/8/8/Q6R/4K3 w - - 0 1").unwrap();
        let mut picker = MovePicker::new(&pos, None, [None; 2], None, 4);
        let yielded = drain(&pos, &mut picker);
        let good: ChessMove = "h2h5".parse().unwrap();
        let bad: ChessMove = "a2d5".parse().unwrap();
        let gi = yielded.iter().position(|&m| m == good).unwrap();
        let bi = yielded.iter().position(|&m| m == bad).unwrap();
        assert!(gi < bi);
    }

    #[test]
    fn killers_precede_unscored_quiets() {
        let pos = Pos::startpos();
        let killer: ChessMove = "b1c3".parse().unwrap();
        let mut picker = MovePicker::new(&pos, None, [Some(killer), None], None, 4);
        let yielded = drain(&pos, &mut picker);
        assert_eq!(yielded[0], killer);
        assert_eq!(yielded.iter().filter(|&&m| m == killer).count(), 1);
    }

    #[test]
    fn qsearch_yields_tactical_moves_only() {
        let pos = Pos::from_fen("4k3/8/2p5/3p3r/8/8/Q6R/4K3 w - - 0 1").unwrap();
        let mut picker = MovePicker::new_qsearch(&pos, None);
        let heur = Heuristics::default();
        let cfg = EngineConfig::default();
        let mut stats = SearchStats::default();
        while let Some(mv) = picker.next(&pos, &heur, &cfg, &mut stats) {
            if picker.stage() == Stage::BadCaptures {
                break;
            }
            assert!(!pos.is_quiet(mv), "{} is quiet", mv);
        }
    }

    #[test]
    fn in_check_yields_all_evasions() {
        let pos = Pos::from_fen("4k3/8/8/8/7b/8/3P4/4K3 w - - 0 1").unwrap();
        assert!(pos.in_check());
        let mut picker = MovePicker::new(&pos, None, [None; 2], None, 4);
        let mut yielded = drain(&pos, &mut picker);
        let mut legal = pos.legal_moves();
        yielded.sort_by_key(|m| m.to_string());
        legal.sort_by_key(|m| m.to_string());
        assert_eq!(yielded, legal);
    }

    #[test]
    fn records_bad_capture_generation_stats() {
        // only capture available loses material
        let pos = Pos::from_fen("4k3/8/2p5/3p4/8/8/Q7/4K3 w - - 0 1").unwrap();
        let mut picker = MovePicker::new(&pos, None, [None; 2], None, 4);
        let heur = Heuristics::default();
        let cfg = EngineConfig::default();
        let mut stats = SearchStats::default();
        while picker.next(&pos, &heur, &cfg, &mut stats).is_some() {}
        assert!(stats.badcap_generated >= 1);
        assert!(stats.badcap_picked >= 1);
        assert_eq!(stats.badcap_nodes, 1);
    }
}

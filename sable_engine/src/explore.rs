
use crate::board::Pos;
use crate::evaluate::{evaluate, EvalCache};
use crate::heuristics::Heuristics;
use crate::options::EngineConfig;
use crate::searchstats::SearchStats;
use crate::stack::ABStack;
use crate::timer::{compute_time_budget, SearchControl, SearchLimits, SoftDeadlineTuner};
use crate::trans_table::TransTable;
use crate::tuning::*;
use crate::types::*;

use derive_new::new;
use log::trace;
use rustc_hash::FxHashSet;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Absolute depth ceiling for infinite/ponder searches; matches the UCI
/// option maximum and the internal ply guards.
const ABS_MAX_DEPTH: Depth = 128;

/// Root move kept across iterations, reordered by the previous score.
#[derive(Debug,PartialEq,Clone,Copy,new)]
pub struct RootMove {
    pub mv:          ChessMove,
    pub last_score:  Score,
}

/// Final outcome of one `go`.
#[derive(Debug,Default,Clone)]
pub struct SearchResult {
    pub best_move:        Option<ChessMove>,
    pub score:            Score,

    pub nodes:            u64,
    pub depth_requested:  Depth,
    pub depth_reached:    Depth,
    pub time_seconds:     f64,
    pub nps:              f64,

    pub tt_hits:          u64,
    pub tt_misses:        u64,
    pub tt_hit_rate:      f64,

    pub is_mate:          bool,
    pub is_draw:          bool,

    /// Diagnostics carried to the stderr report.
    pub stats:                      SearchStats,
    pub pv_firstmove_changes_ge10:  u64,
    pub pv_last_change_depth:       Depth,
}

/// Per-completed-iteration report for UCI `info` lines.
#[derive(Debug,Default,Clone)]
pub struct IterationInfo {
    pub depth:         Depth,
    pub score:         Score,
    pub best_move:     Option<ChessMove>,
    pub nodes:         u64,
    pub time_seconds:  f64,
    pub nps:           f64,
    pub tt_hits:       u64,
    pub tt_misses:     u64,
    pub is_mate:       bool,
    pub is_draw:       bool,
    pub pv:            Vec<ChessMove>,
}

/// Search-local view of the engine state: one per aspiration attempt,
/// single-threaded by the worker contract.
pub struct ExHelper<'a> {
    pub cfg:         &'a EngineConfig,
    pub tt:          &'a mut TransTable,
    pub heur:        &'a mut Heuristics,
    pub eval_cache:  &'a mut EvalCache,
    pub control:     &'a SearchControl,
    pub stack:       ABStack,
    pub stats:       SearchStats,
    pub stopped:     bool,
    tick:            u64,
}

/// Checkpoints, eval, TT, draws
impl<'a> ExHelper<'a> {

    /// Deadline and stop-flag poll, every CHECKPOINT_NODES nodes.
    pub(crate) fn checkpoint(&mut self) {
        self.tick += 1;
        if self.tick >= CHECKPOINT_NODES {
            self.tick = 0;
            if self.control.stop_requested() || self.control.hard_expired() {
                self.stopped = true;
            }
        }
    }

    pub(crate) fn static_eval(&mut self, pos: &Pos) -> Score {
        evaluate(pos, self.cfg, Some(self.eval_cache))
    }

    /// Static eval plus the learned pawn-structure correction; consumed
    /// only by forward-pruning gates.
    pub(crate) fn corrected_eval(&mut self, pos: &Pos, eval: Score) -> Score {
        if !self.cfg.use_correction_history {
            return eval;
        }
        let corr = self.heur.correction.get(pos.side_to_move(), pos.pawn_key());
        eval + ((corr as f64 * self.cfg.correction_history_scale) as Score) / 4
    }

    pub(crate) fn check_tt(&mut self, key: u64, ply: Depth) -> Option<crate::trans_table::TTEntry> {
        // a stop request must also interrupt TT-heavy subtrees
        if self.control.stop_requested() {
            self.stopped = true;
            return None;
        }
        match self.tt.probe(key, ply) {
            Some(e) => {
                self.stats.tt_hits += 1;
                Some(e)
            },
            None => {
                self.stats.tt_misses += 1;
                None
            },
        }
    }

    /// Repetition / 50-move draws lean away from the stronger side.
    /// Insufficient material is always dead equal and handled elsewhere.
    pub(crate) fn draw_score(&mut self, pos: &Pos) -> Score {
        let mut score = DRAW_SCORE;

        let eval = self.static_eval(pos);
        let threshold = (self.cfg.draw_contempt_threshold * 100.0) as Score;
        if eval.abs() >= threshold && threshold > 0 {
            let cap = (self.cfg.draw_contempt_max * 100.0) as Score;
            let c = ((eval.abs() as f64 * self.cfg.draw_contempt_scale) as Score).min(cap);
            score = if eval > 0 { -c } else { c };
        }

        if self.cfg.draw_noise != 0.0 {
            let amp = (self.cfg.draw_noise * 100.0) as i64;
            if amp > 0 {
                let n = (pos.hash() % (2 * amp as u64 + 1)) as i64 - amp;
                score += n as Score;
            }
        }

        score
    }

}

/// Root search
impl<'a> ExHelper<'a> {

    /// One pass over the ordered root moves: PVS after the first move,
    /// wobble tracked in `stats.best_move_changes`. Returns the best
    /// (move, score) found before any stop.
    pub(crate) fn ab_root(
        &mut self,
        pos:         &mut Pos,
        depth:       Depth,
        mut alpha:   Score,
        beta:        Score,
        root_moves:  &mut [RootMove],
    ) -> Option<(ChessMove, Score)> {
        self.stats.root_branching_factor = root_moves.len();
        self.stats.depth_requested = depth;

        let mut best: Option<(ChessMove, Score)> = None;

        for i in 0..root_moves.len() {
            let mv = root_moves[i].mv;
            pos.make_move(mv);
            let score = if i == 0 {
                -self.negamax(pos, depth - 1, 1, -beta, -alpha, true, true)
            } else {
                let mut s = -self.negamax(pos, depth - 1, 1, -alpha - 1, -alpha, false, true);
                if s > alpha && s < beta && !self.stopped {
                    s = -self.negamax(pos, depth - 1, 1, -beta, -alpha, true, true);
                }
                s
            };
            pos.unmake_move();

            if self.stopped {
                self.stats.stopped = true;
                return best;
            }

            root_moves[i].last_score = score;

            let replace = match best {
                Some((_, bs)) => score > bs,
                None          => true,
            };
            if replace {
                if best.is_some() {
                    self.stats.best_move_changes += 1;
                }
                best = Some((mv, score));
                if score > alpha {
                    alpha = score;
                    if alpha >= beta {
                        break;
                    }
                }
            }
        }

        self.stats.depth_reached = depth;
        best
    }

}

/// The engine object: owns config, TT, heuristic tables and the eval
/// cache. All searches run through it, one at a time.
#[derive(Debug)]
pub struct Explorer {
    pub cfg:      EngineConfig,
    tt:           TransTable,
    heuristics:   Heuristics,
    eval_cache:   EvalCache,
}

/// New / lifecycle
impl Explorer {

    pub fn new(cfg: EngineConfig) -> Self {
        let hash_mb = cfg.hash_mb.max(1);
        Self {
            cfg,
            tt:          TransTable::new_mb(hash_mb),
            heuristics:  Heuristics::default(),
            eval_cache:  EvalCache::default(),
        }
    }

    pub fn set_config(&mut self, cfg: EngineConfig) {
        self.cfg = cfg;
    }

    pub fn resize_tt_mb(&mut self, mb: usize) {
        self.cfg.hash_mb = mb.max(1);
        self.tt.resize_mb(mb);
    }

    pub fn clear_tt(&mut self) {
        self.tt.clear();
    }

    /// `ucinewgame`: generation-bump the TT, wipe ordering state and the
    /// evaluation cache.
    pub fn new_game(&mut self) {
        self.tt.clear();
        self.heuristics.reset();
        self.eval_cache.clear();
    }

    pub fn hashfull(&self) -> usize {
        self.tt.hashfull()
    }

}

/// Search entry points
impl Explorer {

    /// Depth-limited search; an external stop is still honored.
    pub fn search_position_depth(
        &mut self,
        pos:      &Pos,
        depth:    Depth,
        stop:     Option<Arc<AtomicBool>>,
        on_iter:  Option<&mut dyn FnMut(&IterationInfo)>,
    ) -> SearchResult {
        let max_depth = if depth > 0 { depth } else { self.cfg.search_depth };
        let control = SearchControl::new_depth_only(stop);
        self.search_impl(pos, max_depth, control, None, false, on_iter)
    }

    /// Time-managed (UCI limits) search.
    pub fn search_position(
        &mut self,
        pos:      &Pos,
        limits:   &SearchLimits,
        stop:     Option<Arc<AtomicBool>>,
        on_iter:  Option<&mut dyn FnMut(&IterationInfo)>,
    ) -> SearchResult {
        // explicit depth always wins
        if limits.depth > 0 {
            return self.search_position_depth(pos, limits.depth, stop, on_iter);
        }

        // infinite / ponder: search to the depth ceiling, then idle until
        // stopped instead of re-spamming the last depth
        if limits.infinite || limits.ponder {
            let keep = stop.is_some();
            let control = SearchControl::new_depth_only(stop);
            return self.search_impl(pos, ABS_MAX_DEPTH, control, None, keep, on_iter);
        }

        let budget = compute_time_budget(limits, pos.side_to_move(), &self.cfg);
        if !budget.enabled {
            return self.search_position_depth(pos, self.cfg.search_depth, stop, on_iter);
        }

        let max_depth = if self.cfg.max_depth_timed > 0 {
            self.cfg.max_depth_timed
        } else {
            self.cfg.search_depth
        };
        let tuner = SoftDeadlineTuner::new(&budget);
        let control = SearchControl::new_timed(&budget, stop);
        self.search_impl(pos, max_depth, control, Some(tuner), false, on_iter)
    }

    pub fn search_position_fen(&mut self, fen: &str, depth: Depth) -> Option<SearchResult> {
        let pos = Pos::from_fen(fen)?;
        Some(self.search_position_depth(&pos, depth, None, None))
    }

}

/// Iterative deepening + aspiration
impl Explorer {

    fn run_attempt(
        &mut self,
        pos:         &mut Pos,
        depth:       Depth,
        alpha:       Score,
        beta:        Score,
        control:     &SearchControl,
        root_moves:  &mut [RootMove],
    ) -> (Option<(ChessMove, Score)>, SearchStats) {
        let mut helper = ExHelper {
            cfg:         &self.cfg,
            tt:          &mut self.tt,
            heur:        &mut self.heuristics,
            eval_cache:  &mut self.eval_cache,
            control,
            stack:       ABStack::new(),
            stats:       SearchStats::default(),
            stopped:     false,
            tick:        0,
        };
        let res = helper.ab_root(pos, depth, alpha, beta, root_moves);
        let mut stats = helper.stats;
        stats.stopped = stats.stopped || helper.stopped;
        (res, stats)
    }

    fn search_impl(
        &mut self,
        pos:          &Pos,
        max_depth:    Depth,
        mut control:  SearchControl,
        mut tuner:    Option<SoftDeadlineTuner>,
        keep_at_max:  bool,
        mut on_iter:  Option<&mut dyn FnMut(&IterationInfo)>,
    ) -> SearchResult {
        let mut pos = pos.clone();
        let mut total = SearchStats::default();
        let mut best: Option<(ChessMove, Score)> = None;

        let mut root_moves: Vec<RootMove> = pos
            .legal_moves()
            .into_iter()
            .map(|mv| RootMove::new(mv, -SCORE_INF))
            .collect();

        if root_moves.is_empty() {
            total.is_mate = pos.in_check();
            total.is_draw = !pos.in_check();
            return self.finish(&control, total, None, 0, 0);
        }

        // terminal draws at the root are reported even though we still
        // search for the move to play
        if pos.insufficient_material() || pos.is_fifty_move_draw() || pos.is_repetition() {
            total.is_draw = true;
        }

        let mut have_prev = false;
        let mut prev_score: Score = 0;

        // late PV wobble diagnostics
        let mut pv_changes_ge10: u64 = 0;
        let mut pv_last_change_depth: Depth = 0;
        let mut prev_best_ge10: Option<ChessMove> = None;
        let mut prev_depth_ge10: Depth = 0;

        let mut cur_depth: Depth = 1;
        loop {
            if !keep_at_max && cur_depth > max_depth {
                break;
            }
            if control.hard_expired() {
                break;
            }
            if best.is_some() && control.soft_expired() && cur_depth > 2 {
                break;
            }
            if control.stop_requested() {
                break;
            }

            let depth_to_search = cur_depth.min(max_depth);

            let mut alpha = -SCORE_INF;
            let mut beta = SCORE_INF;
            let mut window = ASPIRATION_WINDOW;
            if have_prev && prev_score.abs() < MATE_BOUND {
                alpha = prev_score - window;
                beta = prev_score + window;
            }

            let mut iter_best: Option<(ChessMove, Score)> = None;
            let mut ok = false;
            let mut in_window = false;
            let mut last_stats = SearchStats::default();

            for _tries in 0..ASPIRATION_MAX_RETRIES {
                let (res, stats) =
                    self.run_attempt(&mut pos, depth_to_search, alpha, beta, &control, &mut root_moves);
                total += stats;
                last_stats = stats;

                ok = res.is_some() && !stats.stopped;
                if let Some(r) = res {
                    iter_best = Some(r);
                }
                if !ok {
                    break;
                }

                let score = iter_best.map(|(_, s)| s).unwrap_or(0);
                if score <= alpha || score >= beta {
                    // widen and retry on either failure direction
                    window *= 2;
                    trace!(
                        "aspiration fail at depth {}: score {}, window {}",
                        depth_to_search, score, window
                    );
                    alpha = if have_prev { prev_score - window } else { -SCORE_INF };
                    beta = if have_prev { prev_score + window } else { SCORE_INF };
                    continue;
                }

                in_window = true;
                break;
            }

            // accepting a bound as exact would poison the next window;
            // one forced full-width pass settles it
            if ok && !in_window {
                let (res, stats) = self.run_attempt(
                    &mut pos, depth_to_search, -SCORE_INF, SCORE_INF, &control, &mut root_moves,
                );
                total += stats;
                last_stats = stats;
                ok = res.is_some() && !stats.stopped;
                if let Some(r) = res {
                    iter_best = Some(r);
                }
            }

            if !ok {
                // keep the result of the last completed iteration
                break;
            }

            let (bm, bs) = match iter_best {
                Some(x) => x,
                None    => break,
            };

            if depth_to_search >= 10
                && prev_depth_ge10 >= 10
                && prev_best_ge10.is_some()
                && prev_best_ge10 != Some(bm)
            {
                pv_changes_ge10 += 1;
                pv_last_change_depth = depth_to_search;
            }
            if depth_to_search >= 10 {
                prev_best_ge10 = Some(bm);
                prev_depth_ge10 = depth_to_search;
            }

            best = Some((bm, bs));

            // cutoff statistics decay between iterations
            self.heuristics.age();

            if let Some(t) = tuner.as_mut() {
                t.update(
                    &mut control,
                    depth_to_search,
                    bm,
                    last_stats.best_move_changes,
                    last_stats.root_branching_factor == 1,
                );
            }

            if let Some(cb) = on_iter.as_mut() {
                let elapsed = control.elapsed().as_secs_f64();
                let nps = if elapsed > 0.0 { total.nodes as f64 / elapsed } else { 0.0 };
                let ii = IterationInfo {
                    depth:         depth_to_search,
                    score:         bs,
                    best_move:     Some(bm),
                    nodes:         total.nodes,
                    time_seconds:  elapsed,
                    nps,
                    tt_hits:       total.tt_hits,
                    tt_misses:     total.tt_misses,
                    is_mate:       total.is_mate,
                    is_draw:       total.is_draw,
                    pv:            self.build_pv(&pos, bm),
                };
                cb(&ii);
            }

            have_prev = true;
            prev_score = bs;

            // next iteration starts from the most promising root moves
            root_moves.sort_by_key(|rm| std::cmp::Reverse(rm.last_score));

            if control.soft_expired() {
                break;
            }

            // infinite/ponder at the ceiling: idle until stopped rather
            // than re-searching the same depth in a hot loop
            if keep_at_max && cur_depth >= max_depth {
                while !control.stop_requested() {
                    std::thread::sleep(std::time::Duration::from_millis(1));
                }
                break;
            }

            if cur_depth < max_depth {
                cur_depth += 1;
            } else {
                break;
            }
        }

        self.finish(&control, total, best, pv_changes_ge10, pv_last_change_depth)
    }

    fn finish(
        &self,
        control:               &SearchControl,
        total:                 SearchStats,
        best:                  Option<(ChessMove, Score)>,
        pv_changes_ge10:       u64,
        pv_last_change_depth:  Depth,
    ) -> SearchResult {
        let elapsed = control.elapsed().as_secs_f64();
        let nps = if elapsed > 0.0 { total.nodes as f64 / elapsed } else { 0.0 };
        SearchResult {
            best_move:        best.map(|(mv, _)| mv),
            score:            best.map(|(_, s)| s).unwrap_or(0),
            nodes:            total.nodes,
            depth_requested:  total.depth_requested,
            depth_reached:    total.depth_reached,
            time_seconds:     elapsed,
            nps,
            tt_hits:          total.tt_hits,
            tt_misses:        total.tt_misses,
            tt_hit_rate:      total.tt_hit_rate(),
            is_mate:          total.is_mate,
            is_draw:          total.is_draw,
            stats:            total,
            pv_firstmove_changes_ge10: pv_changes_ge10,
            pv_last_change_depth,
        }
    }

    /// Best-effort PV from the TT: legality-checked, capped at 16 plies,
    /// with a seen-hash guard so cyclic entries cannot loop it.
    fn build_pv(&self, root: &Pos, first: ChessMove) -> Vec<ChessMove> {
        let mut pv = Vec::with_capacity(PV_MAX_LEN);
        let mut pos = root.clone();
        if !pos.is_legal(first) {
            return pv;
        }
        pv.push(first);
        pos.make_move(first);

        let mut seen: FxHashSet<u64> = FxHashSet::default();
        seen.insert(pos.hash());

        while pv.len() < PV_MAX_LEN {
            let entry = match self.tt.probe(pos.hash(), 0) {
                Some(e) => e,
                None    => break,
            };
            let mv = match entry.best_move {
                Some(m) => m,
                None    => break,
            };
            if !pos.is_legal(mv) {
                break;
            }
            pos.make_move(mv);
            if !seen.insert(pos.hash()) {
                break;
            }
            pv.push(mv);
        }
        pv
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    fn explorer() -> Explorer {
        // small hash keeps the parallel test runner lean
        Explorer::new(EngineConfig { hash_mb: 8, ..EngineConfig::default() })
    }

    fn search_fen(fen: &str, depth: Depth) -> SearchResult {
        explorer().search_position_fen(fen, depth).unwrap()
    }

    #[test]
    fn s1_startpos_returns_a_legal_move() {
        let pos = Pos::startpos();
        let r = explorer().search_position_depth(&pos, 1, None, None);
        let mv = r.best_move.expect("startpos has moves");
        assert!(pos.is_legal(mv));
        assert!(!r.is_mate);
        assert!(!r.is_draw);
        assert!(r.nodes > 0);
    }

    #[test]
    fn s2_trivial_promotion_is_winning() {
        let r = search_fen("4k3/4P3/4K3/8/8/8/8/8 w - - 0 1", 6);
        assert!(r.best_move.is_some());
        assert!(r.score >= 500, "score = {}", r.score);
    }

    #[test]
    fn s3_checkmated_root_has_no_move() {
        let r = search_fen(
            "r1bqkbnr/pppp1Qpp/2n5/4p3/2B1P3/8/PPPP1PPP/RNB1K1NR b KQkq - 0 3",
            1,
        );
        assert!(r.best_move.is_none());
        assert!(r.is_mate);
    }

    #[test]
    fn s4_bare_kings_is_a_dead_draw() {
        let r = search_fen("8/8/8/8/8/8/8/k6K w - - 0 1", 4);
        assert!(r.is_draw);
        assert_eq!(r.score, 0);
    }

    #[test]
    fn s5_mate_in_one_is_found_and_encoded() {
        let fen = "6k1/8/6K1/8/8/8/8/1Q6 w - - 0 1";
        let r = search_fen(fen, 2);
        assert!(r.score >= MATE_BOUND, "score = {}", r.score);
        assert_eq!(r.score, mate_in(1));
        // the move must actually deliver mate
        let mut pos = Pos::from_fen(fen).unwrap();
        pos.make_move(r.best_move.unwrap());
        assert!(pos.in_check());
        assert!(!pos.has_legal_moves());
    }

    #[test]
    fn s6_movetime_is_respected() {
        let pos = Pos::startpos();
        let limits = SearchLimits {
            movetime_ms: 100,
            ..SearchLimits::default()
        };
        let mut ex = explorer();
        let t0 = std::time::Instant::now();
        let r = ex.search_position(&pos, &limits, None, None);
        let elapsed = t0.elapsed().as_millis() as i64;
        assert!(r.best_move.is_some());
        assert!(
            elapsed <= 100 + ex.cfg.move_overhead_ms + 150,
            "took {}ms", elapsed
        );
    }

    #[test]
    fn search_is_deterministic_from_a_cold_state() {
        let fen = "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1";
        let a = search_fen(fen, 4);
        let b = search_fen(fen, 4);
        assert_eq!(a.best_move, b.best_move);
        assert_eq!(a.score, b.score);
        assert_eq!(a.nodes, b.nodes);
    }

    #[test]
    fn score_does_not_depend_on_tt_size() {
        let fen = "r1bqkb1r/pppp1ppp/2n2n2/4p3/2B1P3/5N2/PPPP1PPP/RNBQK2R w KQkq - 4 4";
        let mut small = Explorer::new(EngineConfig { hash_mb: 1, ..EngineConfig::default() });
        let mut large = Explorer::new(EngineConfig { hash_mb: 16, ..EngineConfig::default() });
        let pos = Pos::from_fen(fen).unwrap();
        let a = small.search_position_depth(&pos, 3, None, None);
        let b = large.search_position_depth(&pos, 3, None, None);
        assert_eq!(a.score, b.score);
    }

    #[test]
    fn deeper_search_keeps_returning_legal_moves() {
        let fens = [
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
        ];
        for fen in fens {
            let pos = Pos::from_fen(fen).unwrap();
            let r = explorer().search_position_depth(&pos, 5, None, None);
            let mv = r.best_move.expect("position is not terminal");
            assert!(pos.is_legal(mv), "illegal best move {} in {}", mv, fen);
        }
    }

    #[test]
    fn iteration_callback_reports_increasing_depth_and_a_pv() {
        let pos = Pos::startpos();
        let mut depths = vec![];
        let mut last_pv_len = 0;
        {
            let mut cb = |ii: &IterationInfo| {
                depths.push(ii.depth);
                last_pv_len = ii.pv.len();
                assert!(ii.nodes > 0);
            };
            explorer().search_position_depth(&pos, 4, None, Some(&mut cb));
        }
        assert_eq!(depths, vec![1, 2, 3, 4]);
        assert!(last_pv_len >= 1);
        assert!(last_pv_len <= PV_MAX_LEN);
    }

    #[test]
    fn external_stop_aborts_quickly_and_keeps_a_move() {
        use std::sync::atomic::Ordering;

        let pos = Pos::startpos();
        let stop = Arc::new(AtomicBool::new(false));
        let stop2 = stop.clone();
        // stop after the first completed iteration
        let mut cb = move |_: &IterationInfo| {
            stop2.store(true, Ordering::Relaxed);
        };
        let r = explorer().search_position_depth(&pos, 64, Some(stop), Some(&mut cb));
        assert!(r.best_move.is_some());
        assert!(r.depth_reached < 64);
    }

    #[test]
    fn mate_score_prefers_the_shorter_mate() {
        // mate in 1 available; deeper search must not report a longer one
        let r = search_fen("3k4/8/3K4/8/8/8/8/7R w - - 0 1", 5);
        assert_eq!(r.score, mate_in(1), "score = {}", r.score);
    }
}

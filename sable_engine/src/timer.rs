
use crate::options::EngineConfig;
use crate::types::*;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// UCI "go" constraints. Times are milliseconds; -1 means "not given".
#[derive(Debug,PartialEq,Clone,Copy)]
pub struct SearchLimits {
    pub depth:        Depth,
    pub movetime_ms:  i64,
    pub wtime_ms:     i64,
    pub btime_ms:     i64,
    pub winc_ms:      i64,
    pub binc_ms:      i64,
    pub movestogo:    i64,
    pub infinite:     bool,
    pub ponder:       bool,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            depth:        0,
            movetime_ms:  -1,
            wtime_ms:     -1,
            btime_ms:     -1,
            winc_ms:      0,
            binc_ms:      0,
            movestogo:    -1,
            infinite:     false,
            ponder:       false,
        }
    }
}

/// Computed budget for the current move.
#[derive(Debug,Default,PartialEq,Clone,Copy)]
pub struct TimeBudget {
    pub enabled:      bool,
    pub soft_ms:      i64,
    pub hard_ms:      i64,
    pub overhead_ms:  i64,
}

/// Soft = preferred stop (iteration boundaries), hard = absolute cutoff
/// (polled inside the tree). Movetime overrides the clock math.
pub fn compute_time_budget(
    limits: &SearchLimits,
    side_to_move: Color,
    cfg: &EngineConfig,
) -> TimeBudget {
    let mut tb = TimeBudget {
        overhead_ms: cfg.move_overhead_ms.max(0),
        ..TimeBudget::default()
    };

    if limits.movetime_ms >= 0 {
        tb.enabled = true;
        let available = (limits.movetime_ms - tb.overhead_ms).max(0);
        tb.hard_ms = available;
        tb.soft_ms = available * 95 / 100;
        return tb;
    }

    let my_time_raw = if side_to_move == White { limits.wtime_ms } else { limits.btime_ms };
    if my_time_raw < 0 {
        // no clock data: pure depth search
        return tb;
    }
    tb.enabled = true;

    let my_time = my_time_raw.max(0);
    let my_inc = if side_to_move == White { limits.winc_ms } else { limits.binc_ms }.max(0);
    let available = (my_time - tb.overhead_ms).max(0);

    // unknown moves-to-go biases high so the early game stays conservative
    let mtg = if limits.movestogo > 0 { limits.movestogo } else { 64 };

    let mut soft = available / (mtg + 1) + my_inc * 6 / 10;

    let mut hard = soft * 2;
    hard = hard.min(available);
    hard = hard.min(my_time / 4);
    hard = hard.min(soft * 4);

    hard = hard.max(0);
    soft = soft.max(0).min(hard);

    tb.soft_ms = soft;
    tb.hard_ms = hard;
    tb
}

/// Runtime stop / deadline state shared down the search stack. The soft
/// deadline moves between iterations; the hard deadline never does.
#[derive(Debug,Clone)]
pub struct SearchControl {
    pub time_enabled:   bool,
    pub start:          Instant,
    pub soft_deadline:  Instant,
    pub hard_deadline:  Instant,
    pub stop:           Option<Arc<AtomicBool>>,
}

impl SearchControl {

    pub fn new_depth_only(stop: Option<Arc<AtomicBool>>) -> Self {
        let now = Instant::now();
        Self {
            time_enabled:   false,
            start:          now,
            soft_deadline:  now,
            hard_deadline:  now,
            stop,
        }
    }

    pub fn new_timed(budget: &TimeBudget, stop: Option<Arc<AtomicBool>>) -> Self {
        let now = Instant::now();
        Self {
            time_enabled:   true,
            start:          now,
            soft_deadline:  now + Duration::from_millis(budget.soft_ms.max(0) as u64),
            hard_deadline:  now + Duration::from_millis(budget.hard_ms.max(0) as u64),
            stop,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn soft_expired(&self) -> bool {
        self.time_enabled && Instant::now() >= self.soft_deadline
    }

    pub fn hard_expired(&self) -> bool {
        self.time_enabled && Instant::now() >= self.hard_deadline
    }

    pub fn stop_requested(&self) -> bool {
        self.stop
            .as_ref()
            .map(|s| s.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

}

/// Iteration-to-iteration soft-deadline adaptation. Carries the root
/// stability state across completed depths.
#[derive(Debug,Clone)]
pub struct SoftDeadlineTuner {
    base_soft_ms:   i64,
    base_hard_ms:   i64,
    prev_best:      Option<ChessMove>,
    last_change_depth:  Depth,
    prev_reduction: f64,
}

impl SoftDeadlineTuner {

    pub fn new(budget: &TimeBudget) -> Self {
        Self {
            base_soft_ms:       budget.soft_ms,
            base_hard_ms:       budget.hard_ms,
            prev_best:          None,
            last_change_depth:  0,
            prev_reduction:     1.0,
        }
    }

    /// A stable best move shrinks the target, root wobble grows it. The
    /// result stays within a moderate band around the initial optimum.
    pub fn update(
        &mut self,
        control:            &mut SearchControl,
        completed_depth:    Depth,
        best_move:          ChessMove,
        best_move_changes:  u64,
        single_reply:       bool,
    ) {
        if !control.time_enabled || self.base_soft_ms <= 0 || self.base_hard_ms <= 0 {
            return;
        }

        if let Some(prev) = self.prev_best {
            if prev != best_move {
                self.last_change_depth = completed_depth;
            }
        }
        self.prev_best = Some(best_move);

        let time_reduction = if self.last_change_depth + 4 < completed_depth {
            1.6857
        } else {
            0.9
        };
        let reduction = (1.4540 + self.prev_reduction) / (2.1593 * time_reduction);

        let instability =
            (0.9929 + 1.8519 * best_move_changes as f64).clamp(0.50, 3.00);

        let mut target_ms = self.base_soft_ms as f64 * reduction * instability;

        if single_reply {
            target_ms = target_ms.min(500.0);
        }

        let min_ms = (self.base_soft_ms as f64 * 0.60).max(1.0);
        let max_ms = (self.base_hard_ms as f64).min(self.base_soft_ms as f64 * 1.15);
        target_ms = target_ms.clamp(min_ms, max_ms);

        control.soft_deadline = control.start + Duration::from_millis(target_ms as u64);
        self.prev_reduction = time_reduction;
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> EngineConfig {
        EngineConfig::default()
    }

    #[test]
    fn movetime_overrides_the_clock() {
        let limits = SearchLimits {
            movetime_ms: 1000,
            wtime_ms: 60_000,
            btime_ms: 60_000,
            ..SearchLimits::default()
        };
        let tb = compute_time_budget(&limits, White, &cfg());
        assert!(tb.enabled);
        assert_eq!(tb.hard_ms, 1000 - cfg().move_overhead_ms);
        assert_eq!(tb.soft_ms, tb.hard_ms * 95 / 100);
    }

    #[test]
    fn no_clock_means_no_budget() {
        let tb = compute_time_budget(&SearchLimits::default(), White, &cfg());
        assert!(!tb.enabled);
    }

    #[test]
    fn budget_uses_the_movers_clock() {
        let limits = SearchLimits {
            wtime_ms: 60_000,
            btime_ms: 1_000,
            winc_ms: 1_000,
            ..SearchLimits::default()
        };
        let w = compute_time_budget(&limits, White, &cfg());
        let b = compute_time_budget(&limits, Black, &cfg());
        assert!(w.soft_ms > b.soft_ms);
        assert!(w.soft_ms <= w.hard_ms);
        assert!(b.soft_ms <= b.hard_ms);
    }

    #[test]
    fn hard_budget_is_capped_by_remaining_time() {
        let limits = SearchLimits {
            wtime_ms: 800,
            ..SearchLimits::default()
        };
        let tb = compute_time_budget(&limits, White, &cfg());
        assert!(tb.hard_ms <= 800 / 4);
        assert!(tb.soft_ms <= tb.hard_ms);
    }

    #[test]
    fn movestogo_splits_the_remaining_time() {
        let few = SearchLimits {
            wtime_ms: 10_000,
            movestogo: 2,
            ..SearchLimits::default()
        };
        let many = SearchLimits {
            wtime_ms: 10_000,
            movestogo: 40,
            ..SearchLimits::default()
        };
        let a = compute_time_budget(&few, White, &cfg());
        let b = compute_time_budget(&many, White, &cfg());
        assert!(a.soft_ms > b.soft_ms);
    }

    #[test]
    fn soft_deadline_stays_within_the_band() {
        let budget = TimeBudget {
            enabled: true,
            soft_ms: 1000,
            hard_ms: 2000,
            overhead_ms: 20,
        };
        let mut control = SearchControl::new_timed(&budget, None);
        let mut tuner = SoftDeadlineTuner::new(&budget);
        let mv: ChessMove = "e2e4".parse().unwrap();

        // wild instability cannot push past hard or 1.15x soft
        tuner.update(&mut control, 6, mv, 50, false);
        let target = control.soft_deadline - control.start;
        assert!(target <= Duration::from_millis(1150));

        // long stability cannot shrink below 0.60x soft
        for d in 7..20 {
            tuner.update(&mut control, d, mv, 0, false);
        }
        let target = control.soft_deadline - control.start;
        assert!(target >= Duration::from_millis(600));
    }

    #[test]
    fn single_reply_caps_the_target() {
        let budget = TimeBudget {
            enabled: true,
            soft_ms: 5000,
            hard_ms: 10_000,
            overhead_ms: 20,
        };
        let mut control = SearchControl::new_timed(&budget, None);
        let mut tuner = SoftDeadlineTuner::new(&budget);
        let mv: ChessMove = "e2e4".parse().unwrap();
        tuner.update(&mut control, 3, mv, 0, true);
        let target = control.soft_deadline - control.start;
        // clamped to the band floor, but never above the 500ms cap + floor
        assert!(target <= Duration::from_millis(3000));
    }
}


use crate::types::*;

use std::time::Duration;

use log::debug;

use crate::util::pretty_print_si;

/// Counters for one search attempt; the deepener aggregates them across
/// iterations and re-searches. Everything here is diagnostic except
/// `stopped` (result of an interrupted attempt must be discarded) and the
/// root terminal flags.
#[derive(Debug,Default,PartialEq,Clone,Copy)]
pub struct SearchStats {
    pub nodes:          u64,
    pub qt_nodes:       u64,
    pub max_ply:        u8,

    pub depth_requested:    Depth,
    pub depth_reached:      Depth,

    pub tt_hits:        u64,
    pub tt_misses:      u64,

    pub checkmates:     u64,
    pub stalemates:     u64,

    pub null_prunes:    u64,
    pub movecount_prunes: u64,
    /// (reductions taken, re-searches after a reduced fail-high)
    pub lmrs:           (u64, u64),

    pub razor_attempts: u64,
    pub razor_cutoffs:  u64,

    /// Quiet moves searched / re-searched at nodes with depth >= 10,
    /// to correlate slow positions with ordering pathologies.
    pub quiet_searched_ge10:   u64,
    pub quiet_researched_ge10: u64,

    /// MovePicker bad-capture flow: nodes that reached the stage, moves
    /// yielded from it, moves actually searched.
    pub badcap_nodes:      u64,
    pub badcap_picked:     u64,
    pub badcap_searched:   u64,
    pub badcap_gen_nodes:  u64,
    pub badcap_generated:  u64,

    /// Root best-move replacements within a single iteration.
    pub best_move_changes: u64,
    pub root_branching_factor: usize,

    pub is_mate:    bool,
    pub is_draw:    bool,
    pub stopped:    bool,
}

impl SearchStats {

    pub fn inc_max_ply(&mut self, ply: Depth) {
        self.max_ply = self.max_ply.max(ply.clamp(0, 255) as u8);
    }

    pub fn tt_hit_rate(&self) -> f64 {
        let total = self.tt_hits + self.tt_misses;
        if total == 0 {
            return 0.0;
        }
        100.0 * self.tt_hits as f64 / total as f64
    }

    /// End-of-search summary on stderr, never stdout.
    pub fn log_summary(&self, dt: Duration) {
        let secs = dt.as_secs_f64();
        let nps = if secs > 0.0 { self.nodes as f64 / secs } else { 0.0 };
        let branch = if self.depth_reached > 0 && self.nodes > 1 {
            (self.nodes as f64).powf(1.0 / self.depth_reached as f64)
        } else {
            0.0
        };
        debug!(
            "depth={} nodes={} qnodes={} time={:.3}s nps={} branch={:.2} \
             tt_hit_rate={:.1}% seldepth={}",
            self.depth_reached,
            pretty_print_si(self.nodes as i64),
            pretty_print_si(self.qt_nodes as i64),
            secs,
            pretty_print_si(nps as i64),
            branch,
            self.tt_hit_rate(),
            self.max_ply,
        );
        debug!(
            "null_prunes={} movecount_prunes={} lmrs={:?} razor={}:{} \
             q10={} q10r={} badcapN={} badcapP={} badcapS={} badcapGN={} badcapG={}",
            self.null_prunes,
            self.movecount_prunes,
            self.lmrs,
            self.razor_attempts,
            self.razor_cutoffs,
            self.quiet_searched_ge10,
            self.quiet_researched_ge10,
            self.badcap_nodes,
            self.badcap_picked,
            self.badcap_searched,
            self.badcap_gen_nodes,
            self.badcap_generated,
        );
    }

}

impl std::ops::Add for SearchStats {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            nodes:              self.nodes + other.nodes,
            qt_nodes:           self.qt_nodes + other.qt_nodes,
            max_ply:            self.max_ply.max(other.max_ply),
            depth_requested:    self.depth_requested.max(other.depth_requested),
            depth_reached:      self.depth_reached.max(other.depth_reached),
            tt_hits:            self.tt_hits + other.tt_hits,
            tt_misses:          self.tt_misses + other.tt_misses,
            checkmates:         self.checkmates + other.checkmates,
            stalemates:         self.stalemates + other.stalemates,
            null_prunes:        self.null_prunes + other.null_prunes,
            movecount_prunes:   self.movecount_prunes + other.movecount_prunes,
            lmrs:               (self.lmrs.0 + other.lmrs.0, self.lmrs.1 + other.lmrs.1),
            razor_attempts:     self.razor_attempts + other.razor_attempts,
            razor_cutoffs:      self.razor_cutoffs + other.razor_cutoffs,
            quiet_searched_ge10:   self.quiet_searched_ge10 + other.quiet_searched_ge10,
            quiet_researched_ge10: self.quiet_researched_ge10 + other.quiet_researched_ge10,
            badcap_nodes:       self.badcap_nodes + other.badcap_nodes,
            badcap_picked:      self.badcap_picked + other.badcap_picked,
            badcap_searched:    self.badcap_searched + other.badcap_searched,
            badcap_gen_nodes:   self.badcap_gen_nodes + other.badcap_gen_nodes,
            badcap_generated:   self.badcap_generated + other.badcap_generated,
            best_move_changes:  self.best_move_changes + other.best_move_changes,
            root_branching_factor: if self.root_branching_factor != 0 {
                self.root_branching_factor
            } else {
                other.root_branching_factor
            },
            is_mate:            self.is_mate || other.is_mate,
            is_draw:            self.is_draw || other.is_draw,
            stopped:            self.stopped || other.stopped,
        }
    }
}

impl std::ops::AddAssign for SearchStats {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl std::iter::Sum<Self> for SearchStats {
    fn sum<I>(iter: I) -> Self
    where
        I: Iterator<Item = Self>,
    {
        iter.fold(Self::default(), |a, b| a + b)
    }
}


use crate::types::*;

use serde::{Serialize,Deserialize};

/// Every UCI-visible knob. The UCI layer owns clamping to the documented
/// ranges; the engine consumes the struct as-is.
#[derive(Debug,PartialEq,Clone,Serialize,Deserialize)]
pub struct EngineConfig {
    pub search_depth:                   Depth,
    pub use_quiescence:                 bool,

    /// Ordering / pruning toggles, kept independent for A/B isolation.
    pub use_history_heuristic:          bool,
    pub use_capture_history:            bool,
    pub use_continuation_history:       bool,
    pub use_probcut:                    bool,
    pub use_iid:                        bool,

    /// SEE at or above this is a "good" capture. +1cp is added at
    /// depth_remaining <= 2 so shallow nodes stay a bit stricter.
    pub good_capture_see_threshold_cp:  Score,
    /// Ordering penalty for captures below the threshold, scaled by 16
    /// internally to match the SEE weighting.
    pub bad_capture_penalty_cp:         Score,

    pub history_ordering_mult:          f64,
    pub continuation_ordering_mult:     f64,
    pub capture_history_ordering_mult:  i32,

    pub killer_bonus_1:                 i32,
    pub killer_bonus_2:                 i32,
    pub counter_move_bonus:             i32,

    pub use_null_move_pruning:          bool,

    pub use_razoring:                   bool,
    pub razor_margin_d2:                Score,
    pub razor_margin_d3:                Score,

    pub use_move_count_pruning:         bool,

    /// Learned static-eval delta consumed only by the pruning gates.
    pub use_correction_history:         bool,
    pub correction_history_scale:       f64,

    /// Depth cap under time control, separate from SearchDepth.
    pub max_depth_timed:                Depth,
    pub move_overhead_ms:               i64,
    pub ponder:                         bool,

    /// Evaluation term scales, in pawns.
    pub king_crowding_scale:            f64,
    pub mobility_scale:                 f64,
    pub xray_scale:                     f64,
    pub pst_scale:                      f64,
    pub use_stock_pst:                  bool,
    pub threat_term:                    f64,

    /// Contempt applies to repetition and 50-move draws only.
    pub draw_contempt_scale:            f64,
    pub draw_contempt_max:              f64,
    pub draw_contempt_threshold:        f64,
    /// Deterministic draw noise keyed from the position hash, in pawns.
    pub draw_noise:                     f64,

    pub hash_mb:                        usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            search_depth:                   3,
            use_quiescence:                 true,

            use_history_heuristic:          true,
            use_capture_history:            true,
            use_continuation_history:       true,
            use_probcut:                    true,
            use_iid:                        true,

            good_capture_see_threshold_cp:  0,
            bad_capture_penalty_cp:         0,

            history_ordering_mult:          0.96,
            continuation_ordering_mult:     1.52,
            capture_history_ordering_mult:  1,

            killer_bonus_1:                 90_000,
            killer_bonus_2:                 80_000,
            counter_move_bonus:             10_000,

            use_null_move_pruning:          true,

            use_razoring:                   true,
            razor_margin_d2:                250,
            razor_margin_d3:                500,

            use_move_count_pruning:         true,

            use_correction_history:         true,
            correction_history_scale:       0.5,

            max_depth_timed:                64,
            move_overhead_ms:               20,
            ponder:                         false,

            king_crowding_scale:            0.1,
            mobility_scale:                 0.5,
            xray_scale:                     0.0,
            pst_scale:                      0.5,
            use_stock_pst:                  true,
            threat_term:                    0.5,

            draw_contempt_scale:            0.20,
            draw_contempt_max:              0.80,
            draw_contempt_threshold:        0.30,
            draw_noise:                     0.0,

            hash_mb:                        256,
        }
    }
}

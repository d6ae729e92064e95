
use crate::types::*;

use once_cell::sync::Lazy;

pub static ASPIRATION_WINDOW: Score = 50;
pub static ASPIRATION_MAX_RETRIES: usize = 5;

pub static NULL_MOVE_MIN_DEPTH: Depth = 2;

pub static RAZOR_MIN_DEPTH: Depth = 2;
pub static RAZOR_MAX_DEPTH: Depth = 3;

pub static LMR_MIN_DEPTH: Depth = 3;
pub static LMR_MIN_MOVES: usize = 3;

pub static IID_MIN_DEPTH: Depth = 5;
pub static IID_REDUCTION: Depth = 2;

pub static MOVE_COUNT_MIN_TRIED: usize = 3;

/// How many nodes between deadline / stop-flag polls.
pub static CHECKPOINT_NODES: u64 = 1024;

/// Plies of PV reconstructed from the TT for info output.
pub static PV_MAX_LEN: usize = 16;

#[inline]
pub fn null_move_reduction(depth: Depth) -> Depth {
    2 + depth / 4
}

/// Quiets past this index get skipped entirely at shallow depth.
#[inline]
pub fn move_count_limit(depth: Depth) -> usize {
    let d = depth.max(0) as usize;
    3 + d * d
}

/// History bonuses grow with the square of the remaining depth.
#[inline]
pub fn stat_bonus(depth: Depth) -> Score {
    let d = depth.max(0) as Score;
    Score::min(2500, d * d)
}

static LMR_TABLE: Lazy<[[u8; 64]; 64]> = Lazy::new(|| {
    let mut t = [[0u8; 64]; 64];
    for (d, row) in t.iter_mut().enumerate().skip(1) {
        for (m, r) in row.iter_mut().enumerate().skip(1) {
            let v = 0.75 + (d as f64).ln() * (m as f64).ln() / 2.25;
            *r = v as u8;
        }
    }
    t
});

/// Base late-move reduction, before the history adjustment.
#[inline]
pub fn lmr_reduction(depth: Depth, move_index: usize) -> Depth {
    let d = (depth.max(0) as usize).min(63);
    let m = move_index.min(63);
    LMR_TABLE[d][m] as Depth
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lmr_grows_with_depth_and_move_index() {
        assert_eq!(lmr_reduction(1, 1), 0);
        assert!(lmr_reduction(20, 30) >= lmr_reduction(4, 4));
        assert!(lmr_reduction(12, 40) >= lmr_reduction(12, 6));
    }

    #[test]
    fn stat_bonus_is_capped() {
        assert!(stat_bonus(64) <= 2500);
        assert!(stat_bonus(3) > 0);
    }
}

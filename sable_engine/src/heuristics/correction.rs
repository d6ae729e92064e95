
use crate::heuristics::{CorrectionHistory, CORRECTION_MAX, CORRECTION_SIZE};
use crate::types::*;

impl Default for CorrectionHistory {
    fn default() -> Self {
        Self {
            buf:      Box::new([[0; CORRECTION_SIZE]; 2]),
        }
    }
}

impl CorrectionHistory {

    pub fn get(&self, side: Color, pawn_key: u64) -> Score {
        self.buf[side.to_index()][pawn_key as usize % CORRECTION_SIZE]
    }

    /// `diff` = search value - static eval; deeper observations weigh more.
    pub fn update(&mut self, side: Color, pawn_key: u64, depth: Depth, diff: Score) {
        let e = &mut self.buf[side.to_index()][pawn_key as usize % CORRECTION_SIZE];
        let bonus = (diff * depth as Score).clamp(-CORRECTION_MAX / 4, CORRECTION_MAX / 4);
        let new = *e + bonus - *e * bonus.abs() / CORRECTION_MAX;
        *e = new.clamp(-CORRECTION_MAX, CORRECTION_MAX);
    }

    /// Recent games matter more than old ones.
    pub fn age(&mut self) {
        for side in self.buf.iter_mut() {
            for e in side.iter_mut() {
                *e /= 2;
            }
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correction_follows_the_observed_diff() {
        let mut t = CorrectionHistory::default();
        let key = 0xdead_beefu64;
        assert_eq!(t.get(White, key), 0);
        t.update(White, key, 6, 80);
        assert!(t.get(White, key) > 0);
        assert_eq!(t.get(Black, key), 0);
        for _ in 0..1000 {
            t.update(White, key, 10, 500);
        }
        assert!(t.get(White, key) <= CORRECTION_MAX);
    }
}


use crate::heuristics::{decay, gravity, ButterflyHistory};
use crate::types::*;

impl Default for ButterflyHistory {
    fn default() -> Self {
        Self {
            buf:      Box::new([[[0; 64]; 64]; 2]),
        }
    }
}

impl ButterflyHistory {

    pub fn get(&self, side: Color, mv: ChessMove) -> Score {
        self.buf[side.to_index()][mv.get_source().to_index()][mv.get_dest().to_index()]
    }

    pub fn update(&mut self, side: Color, mv: ChessMove, bonus: Score) {
        let e = &mut self.buf[side.to_index()]
            [mv.get_source().to_index()]
            [mv.get_dest().to_index()];
        gravity(e, bonus);
    }

    pub fn age(&mut self) {
        for side in self.buf.iter_mut() {
            for from in side.iter_mut() {
                for e in from.iter_mut() {
                    decay(e);
                }
            }
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bonus_then_malus_moves_the_entry_both_ways() {
        let mut h = ButterflyHistory::default();
        let mv: ChessMove = "g1f3".parse().unwrap();
        h.update(White, mv, 400);
        assert!(h.get(White, mv) > 0);
        assert_eq!(h.get(Black, mv), 0);
        h.update(White, mv, -800);
        assert!(h.get(White, mv) < 400);
    }
}

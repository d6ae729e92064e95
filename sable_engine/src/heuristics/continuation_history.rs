
use crate::board::MoveInfo;
use crate::heuristics::{decay, gravity, ContinuationHistory};
use crate::types::*;

impl Default for ContinuationHistory {
    fn default() -> Self {
        Self {
            buf:      Box::new([[[[0; 64]; 6]; 64]; 6]),
        }
    }
}

impl ContinuationHistory {

    pub fn get(&self, prev: MoveInfo, pc: Piece, to: Square) -> Score {
        self.buf[prev.piece.to_index()][prev.mv.get_dest().to_index()]
            [pc.to_index()][to.to_index()]
    }

    pub fn update(&mut self, prev: MoveInfo, pc: Piece, to: Square, bonus: Score) {
        let e = &mut self.buf[prev.piece.to_index()][prev.mv.get_dest().to_index()]
            [pc.to_index()][to.to_index()];
        gravity(e, bonus);
    }

    pub fn age(&mut self) {
        for a in self.buf.iter_mut() {
            for b in a.iter_mut() {
                for c in b.iter_mut() {
                    for e in c.iter_mut() {
                        decay(e);
                    }
                }
            }
        }
    }

}

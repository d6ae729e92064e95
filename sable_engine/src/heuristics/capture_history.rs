
use crate::heuristics::{decay, gravity, CaptureHistory};
use crate::types::*;

impl Default for CaptureHistory {
    fn default() -> Self {
        Self { buf: [[[0; 5]; 64]; 6] }
    }
}

impl CaptureHistory {

    /// [Piece][To][CapturedPieceType]; kings are never captured.
    pub fn get(&self, pc: Piece, to: Square, victim: Piece) -> Score {
        self.buf[pc.to_index()][to.to_index()][victim.to_index().min(4)]
    }

    pub fn update(&mut self, pc: Piece, to: Square, victim: Piece, bonus: Score) {
        let e = &mut self.buf[pc.to_index()][to.to_index()][victim.to_index().min(4)];
        gravity(e, bonus);
    }

    pub fn age(&mut self) {
        for pc in self.buf.iter_mut() {
            for to in pc.iter_mut() {
                for e in to.iter_mut() {
                    decay(e);
                }
            }
        }
    }

}

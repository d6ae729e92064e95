
use crate::board::MoveInfo;
use crate::heuristics::CounterMoves;
use crate::types::*;

impl Default for CounterMoves {
    fn default() -> Self {
        Self { buf: [[[None; 64]; 6]; 2] }
    }
}

impl CounterMoves {

    pub fn store(&mut self, side: Color, prev: MoveInfo, mv: ChessMove) {
        self.buf[side.to_index()][prev.piece.to_index()][prev.mv.get_dest().to_index()] =
            Some(mv);
    }

    pub fn get(&self, side: Color, prev: MoveInfo) -> Option<ChessMove> {
        self.buf[side.to_index()][prev.piece.to_index()][prev.mv.get_dest().to_index()]
    }

}


use crate::heuristics::KillerMoves;
use crate::types::*;

impl Default for KillerMoves {
    fn default() -> Self {
        Self {
            primary:    [None; MAX_PLY as usize],
            secondary:  [None; MAX_PLY as usize],
        }
    }
}

impl KillerMoves {

    pub fn get(&self, ply: Depth) -> (Option<ChessMove>, Option<ChessMove>) {
        let ply = ply as usize;
        if ply >= MAX_PLY as usize {
            return (None, None);
        }
        (self.primary[ply], self.secondary[ply])
    }

    /// New killer shifts the old primary into the secondary slot.
    pub fn store(&mut self, ply: Depth, mv: ChessMove) {
        let ply = ply as usize;
        if ply >= MAX_PLY as usize {
            return;
        }
        if self.primary[ply] != Some(mv) {
            self.secondary[ply] = self.primary[ply];
            self.primary[ply] = Some(mv);
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_shifts_primary_to_secondary() {
        let mut k = KillerMoves::default();
        let a: ChessMove = "e2e4".parse().unwrap();
        let b: ChessMove = "d2d4".parse().unwrap();
        k.store(3, a);
        k.store(3, b);
        assert_eq!(k.get(3), (Some(b), Some(a)));
        // re-storing the primary must not duplicate it into both slots
        k.store(3, b);
        assert_eq!(k.get(3), (Some(b), Some(a)));
    }
}

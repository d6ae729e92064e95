
use crate::board::MoveInfo;
use crate::types::*;

/// One frame per ply of the search stack.
#[derive(Debug,Clone,Copy)]
pub struct ABStackPly {
    pub current_move:   Option<MoveInfo>,
    pub static_eval:    Option<Score>,
    pub in_check:       bool,
    pub tt_hit:         bool,
    /// Reserved for singular-extension searches.
    pub excluded:       Option<ChessMove>,
}

impl Default for ABStackPly {
    fn default() -> Self {
        Self {
            current_move:   None,
            static_eval:    None,
            in_check:       false,
            tt_hit:         false,
            excluded:       None,
        }
    }
}

#[derive(Debug,Clone)]
pub struct ABStack {
    stacks:     Vec<ABStackPly>,
}

/// New
impl ABStack {
    pub fn new() -> Self {
        Self {
            stacks:     vec![ABStackPly::default(); MAX_PLY as usize + 2],
        }
    }
}

impl Default for ABStack {
    fn default() -> Self {
        Self::new()
    }
}

/// Get, with
impl ABStack {

    pub fn at(&self, ply: Depth) -> &ABStackPly {
        &self.stacks[ply as usize]
    }

    pub fn at_mut(&mut self, ply: Depth) -> &mut ABStackPly {
        &mut self.stacks[ply as usize]
    }

    pub fn with<F>(&mut self, ply: Depth, mut f: F)
        where F: FnMut(&mut ABStackPly)
    {
        if let Some(st) = self.stacks.get_mut(ply as usize) {
            f(st);
        }
    }

}

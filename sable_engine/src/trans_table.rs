
use crate::types::*;

use derive_new::new;

pub const ENTRIES_PER_BUCKET: usize = 4;

const MEGABYTE: usize = 1024 * 1024;

/// PV / All / Cut in TT terms.
#[derive(Debug,Eq,PartialEq,Clone,Copy)]
pub enum Node {
    Exact,
    Lower,
    Upper,
}

impl Node {
    fn to_u8(self) -> u8 {
        match self {
            Node::Exact => 0,
            Node::Lower => 1,
            Node::Upper => 2,
        }
    }
    fn from_u8(x: u8) -> Self {
        match x {
            1 => Node::Lower,
            2 => Node::Upper,
            _ => Node::Exact,
        }
    }
}

/// Logical entry handed back from probe; `score` is already re-relativized
/// to the probing ply.
#[derive(Debug,Eq,PartialEq,Clone,Copy,new)]
pub struct TTEntry {
    pub depth:       Depth,
    pub node_type:   Node,
    pub score:       Score,
    pub best_move:   Option<ChessMove>,
}

/// What actually lives in the table. depth == -1 marks an empty slot.
#[derive(Debug,Eq,PartialEq,Clone,Copy)]
#[repr(C)]
struct PackedEntry {
    value_cp:   i32,
    key16:      u16,
    move16:     u16,
    depth:      i8,
    flag:       u8,
    gen:        u8,
    has_move:   u8,
}

const _: () = assert!(std::mem::size_of::<PackedEntry>() == 12);

impl PackedEntry {
    const fn empty() -> Self {
        Self {
            value_cp:  0,
            key16:     0,
            move16:    0,
            depth:     -1,
            flag:      0,
            gen:       0,
            has_move:  0,
        }
    }
}

#[derive(Debug,Clone,Copy)]
struct Bucket {
    e: [PackedEntry; ENTRIES_PER_BUCKET],
}

impl Bucket {
    const fn empty() -> Self {
        Self { e: [PackedEntry::empty(); ENTRIES_PER_BUCKET] }
    }
}

/// Fixed-size set-associative transposition table. Generation aging makes
/// `clear` O(1); probe never returns a stale-generation entry.
#[derive(Debug,Clone)]
pub struct TransTable {
    table:    Vec<Bucket>,
    mask:     usize,
    gen:      u8,
}

#[inline]
fn key_signature(key: u64) -> u16 {
    (key >> 48) as u16
}

fn pack_move(mv: ChessMove) -> u16 {
    let promo = match mv.get_promotion() {
        None         => 0u16,
        Some(Knight) => 1,
        Some(Bishop) => 2,
        Some(Rook)   => 3,
        Some(Queen)  => 4,
        Some(_)      => 0,
    };
    mv.get_source().to_index() as u16
        | ((mv.get_dest().to_index() as u16) << 6)
        | (promo << 12)
}

fn unpack_move(m: u16) -> ChessMove {
    let sq = |idx: usize| {
        Square::make_square(Rank::from_index(idx >> 3), File::from_index(idx & 7))
    };
    let promo = match (m >> 12) & 7 {
        1 => Some(Knight),
        2 => Some(Bishop),
        3 => Some(Rook),
        4 => Some(Queen),
        _ => None,
    };
    ChessMove::new(sq((m & 63) as usize), sq(((m >> 6) & 63) as usize), promo)
}

/// New / resize
impl TransTable {

    pub fn new_mb(mb: usize) -> Self {
        let mut tt = Self {
            table:  Vec::new(),
            mask:   0,
            gen:    1,
        };
        tt.resize_mb(mb);
        tt
    }

    /// Rounds the bucket count down to a power of two so the table never
    /// exceeds the requested size. Hash 0 is clamped to 1 MB.
    pub fn resize_mb(&mut self, mb: usize) {
        let mb = mb.max(1);
        let buckets = (mb * MEGABYTE) / std::mem::size_of::<Bucket>();
        let buckets = prev_pow2(buckets.max(1));
        self.table = vec![Bucket::empty(); buckets];
        self.mask = buckets - 1;
        self.gen = 1;
    }

    pub fn num_buckets(&self) -> usize {
        self.table.len()
    }

    pub fn num_entries(&self) -> usize {
        self.table.len() * ENTRIES_PER_BUCKET
    }

}

fn prev_pow2(x: usize) -> usize {
    if x.is_power_of_two() {
        x
    } else {
        x.next_power_of_two() >> 1
    }
}

/// Clear
impl TransTable {

    /// O(1): advance the generation, old entries become invisible. A wrap
    /// through 0 pays for a physical wipe once every 255 clears.
    pub fn clear(&mut self) {
        self.gen = self.gen.wrapping_add(1);
        if self.gen == 0 {
            self.gen = 1;
            for b in self.table.iter_mut() {
                *b = Bucket::empty();
            }
        }
    }

}

/// Probe / store
impl TransTable {

    pub fn probe(&self, key: u64, ply: Depth) -> Option<TTEntry> {
        if self.table.is_empty() {
            return None;
        }
        let b = &self.table[key as usize & self.mask];
        let sig = key_signature(key);

        for pe in b.e.iter() {
            if pe.gen != self.gen || pe.depth < 0 || pe.key16 != sig {
                continue;
            }
            let best_move = if pe.has_move != 0 {
                Some(unpack_move(pe.move16))
            } else {
                None
            };
            return Some(TTEntry {
                depth:      pe.depth as Depth,
                node_type:  Node::from_u8(pe.flag),
                score:      value_from_tt(pe.value_cp, ply),
                best_move,
            });
        }
        None
    }

    pub fn store(
        &mut self,
        key:        u64,
        depth:      Depth,
        node_type:  Node,
        value:      Score,
        ply:        Depth,
        best_move:  Option<ChessMove>,
    ) {
        if self.table.is_empty() {
            return;
        }
        let gen = self.gen;
        let sig = key_signature(key);
        let vcp = value_to_tt(value, ply);
        let b = &mut self.table[key as usize & self.mask];

        let write = |pe: &mut PackedEntry| {
            pe.gen = gen;
            pe.key16 = sig;
            pe.depth = depth.clamp(0, 127) as i8;
            pe.flag = node_type.to_u8();
            pe.value_cp = vcp;
            pe.has_move = best_move.is_some() as u8;
            pe.move16 = best_move.map(pack_move).unwrap_or(0);
        };

        // same signature in the current generation: keep the deeper or
        // more exact result, but always fill in a missing best move
        for pe in b.e.iter_mut() {
            if pe.gen != gen || pe.depth < 0 || pe.key16 != sig {
                continue;
            }
            let replace = depth > pe.depth as Depth
                || (depth == pe.depth as Depth
                    && node_type == Node::Exact
                    && pe.flag != Node::Exact.to_u8());
            if replace {
                write(pe);
            } else if best_move.is_some() && pe.has_move == 0 {
                pe.has_move = 1;
                pe.move16 = best_move.map(pack_move).unwrap_or(0);
            }
            return;
        }

        // empty or stale slot first
        for pe in b.e.iter_mut() {
            if pe.gen != gen || pe.depth < 0 {
                write(pe);
                return;
            }
        }

        // bucket full: evict the lowest-quality entry
        let quality = |pe: &PackedEntry| -> i32 {
            if pe.depth < 0 {
                return -1_000_000;
            }
            let mut q = pe.depth as i32 * 4;
            if pe.flag == Node::Exact.to_u8() {
                q += 2;
            }
            if pe.has_move != 0 {
                q += 1;
            }
            if pe.gen != gen {
                q -= 1000;
            }
            q
        };

        let mut victim = 0;
        let mut victim_q = quality(&b.e[0]);
        for (i, pe) in b.e.iter().enumerate().skip(1) {
            let q = quality(pe);
            if q < victim_q {
                victim_q = q;
                victim = i;
            }
        }
        write(&mut b.e[victim]);
    }

}

/// Diagnostics
impl TransTable {

    /// Permille of live entries, sampled over the first buckets.
    pub fn hashfull(&self) -> usize {
        let sample = self.table.len().min(250);
        if sample == 0 {
            return 0;
        }
        let mut live = 0;
        for b in self.table.iter().take(sample) {
            for pe in b.e.iter() {
                if pe.gen == self.gen && pe.depth >= 0 {
                    live += 1;
                }
            }
        }
        live * 1000 / (sample * ENTRIES_PER_BUCKET)
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    fn mv(s: &str) -> ChessMove {
        s.parse().unwrap()
    }

    #[test]
    fn packed_entry_is_twelve_bytes() {
        assert_eq!(std::mem::size_of::<PackedEntry>(), 12);
    }

    #[test]
    fn move_packing_round_trips() {
        for m in [mv("e2e4"), mv("a1h8"), mv("e7e8q"), mv("b7a8n"), mv("h2h1r")] {
            assert_eq!(unpack_move(pack_move(m)), m);
        }
    }

    #[test]
    fn store_then_probe_round_trips() {
        let mut tt = TransTable::new_mb(1);
        let key = 0x1234_5678_9abc_def0u64;
        tt.store(key, 7, Node::Exact, 42, 3, Some(mv("e2e4")));
        let e = tt.probe(key, 3).unwrap();
        assert_eq!(e.depth, 7);
        assert_eq!(e.node_type, Node::Exact);
        assert_eq!(e.score, 42);
        assert_eq!(e.best_move, Some(mv("e2e4")));
    }

    #[test]
    fn mate_scores_are_ply_normalized_across_the_table() {
        let mut tt = TransTable::new_mb(1);
        let key = 0x9999_1111_2222_3333u64;
        // mate in 2 plies seen at ply 5: stored relative to the root
        tt.store(key, 10, Node::Exact, mate_in(7), 5, None);
        // probing at a different ply re-relativizes the distance
        let e = tt.probe(key, 3).unwrap();
        assert_eq!(e.score, mate_in(5));
    }

    #[test]
    fn clear_hides_all_entries() {
        let mut tt = TransTable::new_mb(1);
        let key = 0xaaaa_bbbb_cccc_ddddu64;
        tt.store(key, 4, Node::Lower, 10, 0, None);
        assert!(tt.probe(key, 0).is_some());
        tt.clear();
        assert!(tt.probe(key, 0).is_none());
    }

    #[test]
    fn generation_wrap_wipes_physically() {
        let mut tt = TransTable::new_mb(1);
        let key = 0x5555_6666_7777_8888u64;
        tt.store(key, 4, Node::Upper, -30, 0, None);
        for _ in 0..255 {
            tt.clear();
        }
        assert!(tt.probe(key, 0).is_none());
    }

    #[test]
    fn shallower_result_does_not_replace_deeper_one() {
        let mut tt = TransTable::new_mb(1);
        let key = 0x0f0f_0f0f_0f0f_0f0fu64;
        tt.store(key, 9, Node::Exact, 100, 0, None);
        tt.store(key, 3, Node::Exact, -100, 0, Some(mv("d2d4")));
        let e = tt.probe(key, 0).unwrap();
        assert_eq!(e.depth, 9);
        assert_eq!(e.score, 100);
        // but the missing best move was filled in
        assert_eq!(e.best_move, Some(mv("d2d4")));
    }

    #[test]
    fn equal_depth_exact_beats_bound() {
        let mut tt = TransTable::new_mb(1);
        let key = 0x1111_2222_3333_4444u64;
        tt.store(key, 5, Node::Lower, 77, 0, None);
        tt.store(key, 5, Node::Exact, 55, 0, None);
        let e = tt.probe(key, 0).unwrap();
        assert_eq!(e.node_type, Node::Exact);
        assert_eq!(e.score, 55);
    }

    #[test]
    fn stale_entries_are_evicted_before_live_ones() {
        let mut tt = TransTable::new_mb(1);
        // same bucket (low bits), distinct signatures (high bits)
        let key = |i: u64| ((0x1000 + i) << 48) | 0x42;
        // fill one bucket in gen 1, then age it
        for i in 0..ENTRIES_PER_BUCKET as u64 {
            tt.store(key(i), 20, Node::Exact, 1, 0, None);
        }
        tt.clear();
        // a shallow new entry must land despite the deep stale residents
        tt.store(key(9), 1, Node::Upper, 5, 0, None);
        assert!(tt.probe(key(9), 0).is_some());
    }

    #[test]
    fn size_budget_is_respected() {
        for mb in [1usize, 2, 7, 16] {
            let tt = TransTable::new_mb(mb);
            assert!(tt.num_buckets().is_power_of_two());
            assert!(tt.num_buckets() * std::mem::size_of::<Bucket>() <= mb * MEGABYTE);
        }
    }
}

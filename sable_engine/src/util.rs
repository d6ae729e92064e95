
use crate::types::*;

pub fn pretty_print_si(x: i64) -> String {
    if x.abs() > 1_000_000 {
        format!("{:.1}M", x as f64 / 1_000_000.)
    } else if x.abs() > 1000 {
        format!("{:.1}k", x as f64 / 1000.)
    } else {
        format!("{}", x)
    }
}

/// Mirror a FEN vertically and swap colors: ranks reversed, piece case
/// swapped, side/castling/en-passant flipped. Used by the symmetry tests
/// (eval and SEE must be invariant under this transform, up to sign).
pub fn flip_fen(fen: &str) -> Option<String> {
    let fields: Vec<&str> = fen.split_whitespace().collect();
    if fields.len() != 6 {
        return None;
    }

    let swap_case = |c: char| {
        if c.is_ascii_uppercase() {
            c.to_ascii_lowercase()
        } else if c.is_ascii_lowercase() {
            c.to_ascii_uppercase()
        } else {
            c
        }
    };

    let ranks: Vec<String> = fields[0]
        .split('/')
        .rev()
        .map(|r| r.chars().map(swap_case).collect())
        .collect();

    let stm = if fields[1] == "w" { "b" } else { "w" };

    let castle: String = if fields[2] == "-" {
        "-".to_string()
    } else {
        let mut s: Vec<char> = fields[2].chars().map(swap_case).collect();
        s.sort_by_key(|c| match c {
            'K' => 0,
            'Q' => 1,
            'k' => 2,
            'q' => 3,
            _   => 4,
        });
        s.into_iter().collect()
    };

    let ep: String = if fields[3] == "-" {
        "-".to_string()
    } else {
        let mut cs = fields[3].chars();
        let file = cs.next()?;
        let rank = match cs.next()? {
            '3' => '6',
            '6' => '3',
            r   => r,
        };
        format!("{}{}", file, rank)
    };

    Some(format!(
        "{} {} {} {} {} {}",
        ranks.join("/"),
        stm,
        castle,
        ep,
        fields[4],
        fields[5]
    ))
}

/// Companion to [`flip_fen`]: the same move on the mirrored board.
pub fn flip_move(mv: ChessMove) -> ChessMove {
    let flip_sq = |sq: Square| {
        Square::make_square(
            Rank::from_index(7 - sq.get_rank().to_index()),
            sq.get_file(),
        )
    };
    ChessMove::new(
        flip_sq(mv.get_source()),
        flip_sq(mv.get_dest()),
        mv.get_promotion(),
    )
}

//! FEN string surgery — position edits outside the rules engine.
//!
//! The parser and editor lean on shakmaty for legal play; this module
//! covers what shakmaty will not touch: patching single squares, null
//! moves, and moves that are not chess-legal. Everything here is pure
//! string manipulation over the six-field FEN format and never fails;
//! malformed input is caller error and yields a best-effort result.

use shakmaty::{Color, Piece, Square};

pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

struct Fields<'a> {
    placement: &'a str,
    side: &'a str,
    castling: &'a str,
    en_passant: &'a str,
    halfmove: &'a str,
    fullmove: &'a str,
}

fn fields(fen: &str) -> Fields<'_> {
    let mut it = fen.split_whitespace();
    Fields {
        placement: it.next().unwrap_or(""),
        side: it.next().unwrap_or("w"),
        castling: it.next().unwrap_or("-"),
        en_passant: it.next().unwrap_or("-"),
        halfmove: it.next().unwrap_or("0"),
        fullmove: it.next().unwrap_or("1"),
    }
}

fn with_placement(placement: &str, f: &Fields<'_>) -> String {
    format!(
        "{} {} {} {} {} {}",
        placement, f.side, f.castling, f.en_passant, f.halfmove, f.fullmove
    )
}

/// Rewrite run-length digits in the placement field as one `1` per empty
/// square, leaving the other five fields untouched.
pub fn expand(fen: &str) -> String {
    let f = fields(fen);
    let mut placement = String::with_capacity(71);
    for c in f.placement.chars() {
        match c.to_digit(10) {
            Some(n) => {
                for _ in 0..n {
                    placement.push('1');
                }
            }
            None => placement.push(c),
        }
    }
    with_placement(&placement, &f)
}

/// Inverse of [`expand`]: collapse runs of single-square-empty markers
/// into the shortest run-length digits, largest run first, so the output
/// is canonical. `compress(expand(p)) == p` for every valid `p`.
pub fn compress(fen: &str) -> String {
    let f = fields(fen);
    let mut placement = f.placement.to_string();
    for run in (2..=8).rev() {
        placement = placement.replace(&"1".repeat(run), &run.to_string());
    }
    with_placement(&placement, &f)
}

/// The piece on `square`, if any. Ranks are read 8-down-to-1 and
/// reversed so the flattened index `rank*8 + file` puts a1 at 0.
pub fn occupation_at(fen: &str, square: Square) -> Option<Piece> {
    let expanded = expand(fen);
    let f = fields(&expanded);
    let mut ranks: Vec<&str> = f.placement.split('/').collect();
    ranks.reverse();
    let row = ranks.get(square.rank() as usize)?;
    let c = *row.as_bytes().get(square.file() as usize)?;
    Piece::from_char(c as char)
}

fn patch(fen: &str, square: Square, mark: char) -> String {
    let expanded = expand(fen);
    let f = fields(&expanded);
    let mut ranks: Vec<String> = f.placement.split('/').map(str::to_string).collect();
    // rank 8 comes first in the placement field
    if let Some(idx) = ranks.len().checked_sub(1 + square.rank() as usize) {
        if let Some(row) = ranks.get_mut(idx) {
            let file = square.file() as usize;
            if file < row.len() {
                row.replace_range(file..file + 1, &mark.to_string());
            }
        }
    }
    let placement = ranks.join("/");
    compress(&with_placement(&placement, &f))
}

/// Put `occupation` on `square`. An empty occupation is a no-op
/// returning the input unchanged.
pub fn place(fen: &str, occupation: Option<Piece>, square: Square) -> String {
    match occupation {
        Some(piece) => patch(fen, square, piece.char()),
        None => fen.to_string(),
    }
}

/// Empty `square`.
pub fn clear(fen: &str, square: Square) -> String {
    patch(fen, square, '1')
}

/// Pass: flip the side to move, clear the en-passant target, bump the
/// half-move clock, and bump the full-move number when black was to move.
pub fn apply_null_move(fen: &str) -> String {
    let f = fields(fen);
    let black = f.side == "b";
    let halfmove = f.halfmove.parse::<u32>().unwrap_or(0) + 1;
    let fullmove = f.fullmove.parse::<u32>().unwrap_or(1) + u32::from(black);
    format!(
        "{} {} {} - {} {}",
        f.placement,
        if black { "w" } else { "b" },
        f.castling,
        halfmove,
        fullmove
    )
}

/// Move whatever sits on `from` to `to` with no legality check, flip the
/// side to move, reset the half-move clock, and bump the full-move number
/// when black was to move. Returns the input unchanged when `from` is
/// empty. Promotion is deliberately not handled: a pawn patched onto the
/// last rank stays a pawn. Callers that need promotion must go through a
/// legal insertion.
pub fn apply_unchecked_move(fen: &str, from: Square, to: Square) -> String {
    let Some(piece) = occupation_at(fen, from) else {
        return fen.to_string();
    };
    let patched = place(&clear(fen, from), Some(piece), to);
    let f = fields(&patched);
    let black = f.side == "b";
    let fullmove = f.fullmove.parse::<u32>().unwrap_or(1) + u32::from(black);
    format!(
        "{} {} {} {} 0 {}",
        f.placement,
        if black { "w" } else { "b" },
        f.castling,
        f.en_passant,
        fullmove
    )
}

/// Which side the position says is to move. Anything but `b` reads as
/// white.
pub fn side_to_move(fen: &str) -> Color {
    if fields(fen).side == "b" {
        Color::Black
    } else {
        Color::White
    }
}

/// Reformat a FEN-ish tag value into the canonical six-field form,
/// defaulting the side to `w` and castling/en-passant to `-` when absent.
pub fn canonical_fen(raw: &str) -> String {
    let f = fields(raw);
    with_placement(f.placement, &f)
}

use pgn_core::{MoveNode, MovePath, PathStep, Variation};

/// Annotated fixture exercising tags, comments, suffix glyphs, a
/// side-line, and board marks.
pub const ANNOTATED_GAME: &str = r#"[Event "Casual Game"]
[White "Anderssen"]
[Black "Kieseritzky"]
[Result "1-0"]

{The Immortal Game.} 1. e4 e5 2. f4!? exf4 3. Bc4 Qh4+ (3... d5 4. Bxd5 {[%cal Gd5f7]} Nf6) 4. Kf1 1-0"#;

/// Build an address from (branch-index, ply-index) pairs.
pub fn path(steps: &[(usize, usize)]) -> MovePath {
    MovePath::new(steps.iter().map(|&(l, p)| PathStep::new(l, p)).collect())
}

/// The displayed notation of every move in a line, in order.
pub fn sans(line: &Variation) -> Vec<&str> {
    line.moves.iter().map(MoveNode::notation).collect()
}

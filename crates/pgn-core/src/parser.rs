//! Recursive-descent parser: game text → move tree.
//!
//! The scanner walks the move text left to right; annotations and
//! side-lines always attach to the most recently flushed move, so the
//! scan order is load-bearing. A side-line branches from the position
//! *before* the move it is attached to — it is an alternative to that
//! move, not a continuation after it.

use std::collections::HashMap;

use regex::Regex;
use shakmaty::fen::Fen;
use shakmaty::san::SanPlus;
use shakmaty::{CastlingMode, Chess, EnPassantMode, File, Move, Position, Square};

use crate::database::split_games;
use crate::error::PgnError;
use crate::fen::{self, START_FEN};
use crate::path::MovePath;
use crate::tree::{
    assign_paths, Annotation, AnnotationColor, Game, GameResult, MoveKind, MoveNode, Variation,
};

/// Parse every game in a multi-game database. A failing game yields an
/// `Err` entry without aborting the rest of the batch.
pub fn parse_games(text: &str) -> impl Iterator<Item = Result<Game, PgnError>> + '_ {
    split_games(text).map(|game| parse_game(&game))
}

/// Parse one game's tag section and move text into a [`Game`]. Fatal on
/// the first unresolvable move; no partial game is returned.
pub fn parse_game(text: &str) -> Result<Game, PgnError> {
    let (tag_section, movetext) = split_sections(text);
    let meta = parse_tags(&tag_section);

    let start_fen = meta
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("fen"))
        .map(|(_, v)| fen::canonical_fen(v));
    let start = start_fen.clone().unwrap_or_else(|| START_FEN.to_string());
    position_from_fen(&start)?;

    let mut result = None;
    let scanner = Movetext::new(&movetext);
    let (mainline, _) = scanner.parse_line(0, &start, &mut result)?;

    let mut game = Game {
        meta,
        start_fen,
        result: result.unwrap_or_default(),
        mainline,
    };
    assign_paths(&mut game.mainline, &MovePath::root());
    Ok(game)
}

/// Separate leading `[Key "Value"]` lines from the move text.
fn split_sections(text: &str) -> (String, String) {
    let mut tags = String::new();
    let mut moves = String::new();
    let mut in_moves = false;
    for line in text.lines() {
        let trimmed = line.trim();
        if !in_moves && trimmed.starts_with('[') {
            tags.push_str(trimmed);
            tags.push('\n');
        } else if !in_moves && trimmed.is_empty() {
            continue;
        } else {
            in_moves = true;
            if !moves.is_empty() {
                moves.push(' ');
            }
            moves.push_str(line);
        }
    }
    (tags, moves)
}

fn parse_tags(tag_section: &str) -> HashMap<String, String> {
    let tag_re = Regex::new(r#"\[(\w+)\s+"([^"]*)"\]"#).unwrap();
    let mut meta = HashMap::new();
    for line in tag_section.lines() {
        match tag_re.captures(line) {
            Some(cap) => {
                meta.insert(cap[1].to_string(), cap[2].to_string());
            }
            None => {
                // Some exporters emit malformed SetUp/CurrentPosition
                // tags; drop them instead of failing the game.
                if line.starts_with("[SetUp") || line.starts_with("[CurrentPosition") {
                    tracing::debug!(tag = line, "dropping malformed tag");
                }
            }
        }
    }
    meta
}

pub(crate) fn position_from_fen(fen_str: &str) -> Result<Chess, PgnError> {
    let setup: Fen = fen_str
        .parse()
        .map_err(|_| PgnError::InvalidFen(fen_str.to_string()))?;
    setup
        .into_position(CastlingMode::Standard)
        .map_err(|_| PgnError::InvalidFen(fen_str.to_string()))
}

/// Origin and destination for display. Castling reads as the king move.
fn move_endpoints(mv: &Move) -> (Square, Square) {
    match mv {
        Move::Castle { king, rook } => {
            let file = if rook.file() > king.file() { 6 } else { 2 };
            (*king, Square::from_coords(File::new(file), king.rank()))
        }
        _ => (mv.from().unwrap_or_else(|| mv.to()), mv.to()),
    }
}

/// Play `mv` on `pos` and record it as a tree node, leaving `pos` at
/// the resulting position.
pub(crate) fn play_move(pos: &mut Chess, mv: Move) -> MoveNode {
    let side = pos.turn();
    let notation = SanPlus::from_move(pos.clone(), mv).to_string();
    let (from_sq, to_sq) = move_endpoints(&mv);
    pos.play_unchecked(mv);
    MoveNode {
        side,
        kind: MoveKind::Normal {
            san: notation,
            from: from_sq,
            to: to_sq,
            promotion: mv.promotion(),
        },
        fen: Fen::from_position(&*pos, EnPassantMode::Legal).to_string(),
        path: MovePath::default(),
        annotations: Vec::new(),
        variations: Vec::new(),
    }
}

/// Normalize a `!`/`?` suffix glyph to its numeric annotation code.
fn suffix_nag(glyph: &str) -> i32 {
    match glyph {
        "!" => 1,
        "?" => 2,
        "!!" => 3,
        "??" => 4,
        "!?" => 5,
        "?!" => 6,
        _ => -1,
    }
}

/// Strip a leading move number (`3.`, `3...`) glued to a token. `None`
/// means the token was only a move number.
fn strip_move_number(token: &str) -> Option<&str> {
    let digits = token.len() - token.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    if digits == 0 {
        return Some(token);
    }
    let rest = &token[digits..];
    if rest.is_empty() {
        return None;
    }
    let undotted = rest.trim_start_matches('.');
    if undotted.is_empty() {
        return None;
    }
    if undotted.len() != rest.len() {
        Some(undotted)
    } else {
        Some(token)
    }
}

fn attach_annotations(line: &mut Variation, annotations: Vec<Annotation>) {
    match line.moves.last_mut() {
        Some(node) => node.annotations.extend(annotations),
        // comment before any move: prefix annotation of this line
        None => line.prefix_annotations.extend(annotations),
    }
}

fn attach_nag(line: &mut Variation, code: i32) {
    match line.moves.last_mut() {
        Some(node) => node.annotations.push(Annotation::Nag { code }),
        None => tracing::debug!(code, "dropping annotation with no move to attach to"),
    }
}

fn parse_mark(entry: &str, arrow: bool) -> Option<Annotation> {
    let mut chars = entry.chars();
    let color = AnnotationColor::from_code(chars.next()?)?;
    let squares = chars.as_str();
    if arrow {
        if squares.len() != 4 {
            return None;
        }
        Some(Annotation::Arrow {
            from: squares[..2].parse().ok()?,
            to: squares[2..].parse().ok()?,
            color,
        })
    } else {
        if squares.len() != 2 {
            return None;
        }
        Some(Annotation::Highlight {
            square: squares.parse().ok()?,
            color,
        })
    }
}

struct Movetext<'a> {
    text: &'a str,
    bytes: &'a [u8],
    trailing_number: Regex,
    board_tag: Regex,
}

impl<'a> Movetext<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
            trailing_number: Regex::new(r"[^a-h]\d+\.?\.?\.?\s?$").unwrap(),
            board_tag: Regex::new(r"\[%(cal|csl)\s+([^\]]*)\]").unwrap(),
        }
    }

    /// Parse one line (main line or side-line) starting at byte offset
    /// `start`, from position `start_fen`. Returns the variation and the
    /// offset just past the closing `)` or the end of input.
    fn parse_line(
        &self,
        start: usize,
        start_fen: &str,
        result: &mut Option<GameResult>,
    ) -> Result<(Variation, usize), PgnError> {
        let mut line = Variation::default();
        let mut fen = start_fen.to_string();
        // position before the last flushed move; side-lines branch here
        let mut fen_before = start_fen.to_string();
        let mut pending = start;
        let mut i = start;

        while i < self.bytes.len() {
            match self.bytes[i] {
                b'{' => {
                    self.flush(pending, i, &mut line, &mut fen, &mut fen_before, result)?;
                    let close = self.text[i + 1..]
                        .find('}')
                        .map(|off| i + 1 + off)
                        .ok_or(PgnError::UnterminatedComment)?;
                    let annotations = self.comment_annotations(&self.text[i + 1..close]);
                    attach_annotations(&mut line, annotations);
                    i = close + 1;
                    pending = i;
                }
                b'(' => {
                    self.flush(pending, i, &mut line, &mut fen, &mut fen_before, result)?;
                    if line.moves.is_empty() {
                        return Err(PgnError::DanglingVariation);
                    }
                    let (variation, next) = self.parse_line(i + 1, &fen_before, result)?;
                    if let Some(owner) = line.moves.last_mut() {
                        owner.variations.push(variation);
                    }
                    i = next;
                    pending = i;
                }
                b')' => {
                    self.flush(pending, i, &mut line, &mut fen, &mut fen_before, result)?;
                    return Ok((line, i + 1));
                }
                b'$' => {
                    self.flush(pending, i, &mut line, &mut fen, &mut fen_before, result)?;
                    let mut j = i + 1;
                    while j < self.bytes.len() && self.bytes[j].is_ascii_digit() {
                        j += 1;
                    }
                    attach_nag(&mut line, self.text[i + 1..j].parse().unwrap_or(-1));
                    i = j;
                    pending = i;
                }
                b'!' | b'?' => {
                    self.flush(pending, i, &mut line, &mut fen, &mut fen_before, result)?;
                    let mut j = i + 1;
                    while j < self.bytes.len() && j - i < 2 && matches!(self.bytes[j], b'!' | b'?')
                    {
                        j += 1;
                    }
                    attach_nag(&mut line, suffix_nag(&self.text[i..j]));
                    i = j;
                    pending = i;
                }
                b'-' if self.bytes.get(i + 1) == Some(&b'-') => {
                    self.flush(pending, i, &mut line, &mut fen, &mut fen_before, result)?;
                    let side = fen::side_to_move(&fen);
                    let after = fen::apply_null_move(&fen);
                    fen_before = fen.clone();
                    line.moves.push(MoveNode {
                        side,
                        kind: MoveKind::Null,
                        fen: after.clone(),
                        path: MovePath::default(),
                        annotations: Vec::new(),
                        variations: Vec::new(),
                    });
                    fen = after;
                    i += 2;
                    pending = i;
                }
                _ => {
                    i += 1;
                }
            }
        }

        self.flush(pending, self.bytes.len(), &mut line, &mut fen, &mut fen_before, result)?;
        Ok((line, self.bytes.len()))
    }

    /// Resolve the pending move-text span into zero or more moves played
    /// from the running position. A non-empty span that cannot be played
    /// is fatal to the game.
    fn flush(
        &self,
        from: usize,
        to: usize,
        line: &mut Variation,
        fen: &mut String,
        fen_before: &mut String,
        result: &mut Option<GameResult>,
    ) -> Result<(), PgnError> {
        let raw = &self.text[from..to];
        if raw.trim().is_empty() {
            return Ok(());
        }
        let trimmed = self.trailing_number.replace(raw, "");
        let mut pos = position_from_fen(fen)?;

        for token in trimmed.split_whitespace() {
            if let Some(r) = GameResult::from_token(token) {
                *result = Some(r);
                continue;
            }
            let Some(body) = strip_move_number(token) else {
                continue;
            };
            let invalid = || PgnError::InvalidMove {
                text: token.to_string(),
                fen: fen.clone(),
            };
            let san: SanPlus = body.parse().map_err(|_| invalid())?;
            let mv = san.san.to_move(&pos).map_err(|_| invalid())?;

            *fen_before = fen.clone();
            let node = play_move(&mut pos, mv);
            *fen = node.fen.clone();
            line.moves.push(node);
        }
        Ok(())
    }

    /// Split a `{...}` body into board marks (`[%cal ...]`, `[%csl ...]`)
    /// and remaining comment text. Other `[%...]` extensions stay in the
    /// text verbatim.
    fn comment_annotations(&self, body: &str) -> Vec<Annotation> {
        let mut marks = Vec::new();
        let stripped = self.board_tag.replace_all(body, |caps: &regex::Captures<'_>| {
            let arrows = &caps[1] == "cal";
            for entry in caps[2].split(',') {
                let entry = entry.trim();
                if entry.is_empty() {
                    continue;
                }
                match parse_mark(entry, arrows) {
                    Some(mark) => marks.push(mark),
                    None => tracing::debug!(entry, "skipping malformed board mark"),
                }
            }
            String::new()
        });

        let mut annotations = Vec::new();
        let text = stripped.trim();
        if !text.is_empty() {
            annotations.push(Annotation::Comment {
                text: text.to_string(),
            });
        }
        annotations.extend(marks);
        annotations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::PathStep;
    use shakmaty::Color;

    fn path(steps: &[(usize, usize)]) -> MovePath {
        MovePath::new(steps.iter().map(|&(l, p)| PathStep::new(l, p)).collect())
    }

    fn san_of(node: &MoveNode) -> &str {
        match &node.kind {
            MoveKind::Normal { san, .. } => san,
            MoveKind::Null => "--",
            MoveKind::Unchecked { notation, .. } => notation,
        }
    }

    #[test]
    fn test_parse_simple_game() {
        let game = parse_game("1. e4 e5 2. Nf3 Nc6 3. Bc4 Bc5 *").unwrap();
        let moves = &game.mainline.moves;
        assert_eq!(moves.len(), 6);
        assert_eq!(game.result, GameResult::Unknown);
        for (i, mv) in moves.iter().enumerate() {
            assert_eq!(mv.path, path(&[(0, i)]));
            let expected = if i % 2 == 0 { Color::White } else { Color::Black };
            assert_eq!(mv.side, expected);
        }
        assert_eq!(san_of(&moves[0]), "e4");
        assert_eq!(san_of(&moves[5]), "Bc5");
        assert!(moves[5].fen.contains(" w "));
    }

    #[test]
    fn test_parse_tags_and_result() {
        let game = parse_game(
            "[White \"Player1\"]\n[Black \"Player2\"]\n[Result \"1-0\"]\n\n1. e4 e5 2. Nf3 Nc6 1-0",
        )
        .unwrap();
        assert_eq!(game.meta.get("White").map(String::as_str), Some("Player1"));
        assert_eq!(game.meta.get("Black").map(String::as_str), Some("Player2"));
        assert_eq!(game.result, GameResult::WhiteWins);
        assert_eq!(game.mainline.moves.len(), 4);
    }

    #[test]
    fn test_malformed_setup_tag_is_filtered() {
        let game =
            parse_game("[SetUp 1]\n[Event \"Casual\"]\n\n1. e4 *").unwrap();
        assert!(!game.meta.contains_key("SetUp"));
        assert_eq!(game.meta.get("Event").map(String::as_str), Some("Casual"));
    }

    #[test]
    fn test_side_line_branches_before_owning_move() {
        let game = parse_game("1. e4 e5 (1... e6 2. d4 d5) 2. Nf3 *").unwrap();
        let moves = &game.mainline.moves;
        assert_eq!(moves.len(), 3);
        assert_eq!(moves[1].variations.len(), 1);

        let side = &moves[1].variations[0];
        assert_eq!(side.moves.len(), 3);
        assert_eq!(san_of(&side.moves[0]), "e6");
        // alternative to e5: black to move in the branch start
        assert_eq!(side.moves[0].side, Color::Black);
        assert_eq!(side.moves[0].path, path(&[(0, 1), (0, 0)]));
        assert_eq!(side.moves[2].path, path(&[(0, 1), (0, 2)]));
    }

    #[test]
    fn test_nested_side_lines_and_branch_indexes() {
        let game = parse_game("1. e4 c5 (1... e6) (1... c6 2. d4 d5 (2... g6)) *").unwrap();
        let c5 = &game.mainline.moves[1];
        assert_eq!(c5.variations.len(), 2);
        assert_eq!(c5.variations[0].moves[0].path, path(&[(0, 1), (0, 0)]));
        assert_eq!(c5.variations[1].moves[0].path, path(&[(0, 1), (1, 0)]));

        let caro = &c5.variations[1];
        let d5 = &caro.moves[2];
        assert_eq!(d5.variations.len(), 1);
        assert_eq!(d5.variations[0].moves[0].path, path(&[(0, 1), (1, 2), (0, 0)]));
        assert_eq!(san_of(&d5.variations[0].moves[0]), "g6");
    }

    #[test]
    fn test_comment_attachment_and_prefix() {
        let game = parse_game("{Annotated game.} 1. e4 {best by test} e5 *").unwrap();
        assert_eq!(
            game.prefix_annotations(),
            &[Annotation::Comment {
                text: "Annotated game.".to_string()
            }]
        );
        assert_eq!(
            game.mainline.moves[0].annotations,
            vec![Annotation::Comment {
                text: "best by test".to_string()
            }]
        );
        assert!(game.mainline.moves[1].annotations.is_empty());
    }

    #[test]
    fn test_prefix_comment_in_side_line() {
        let game = parse_game("1. e4 e5 ({Sharper is} 1... c5) *").unwrap();
        let side = &game.mainline.moves[1].variations[0];
        assert_eq!(
            side.prefix_annotations,
            vec![Annotation::Comment {
                text: "Sharper is".to_string()
            }]
        );
    }

    #[test]
    fn test_nag_and_suffix_glyphs() {
        let game = parse_game("1. e4! e5 $14 2. Nf3?! Nc6?? *").unwrap();
        let moves = &game.mainline.moves;
        assert_eq!(moves[0].annotations, vec![Annotation::Nag { code: 1 }]);
        assert_eq!(moves[1].annotations, vec![Annotation::Nag { code: 14 }]);
        assert_eq!(moves[2].annotations, vec![Annotation::Nag { code: 6 }]);
        assert_eq!(moves[3].annotations, vec![Annotation::Nag { code: 4 }]);
    }

    #[test]
    fn test_nag_before_any_move_is_dropped() {
        let game = parse_game("$5 1. e4 *").unwrap();
        assert!(game.prefix_annotations().is_empty());
        assert!(game.mainline.moves[0].annotations.is_empty());
    }

    #[test]
    fn test_null_move() {
        let game = parse_game("1. e4 -- 2. d4 *").unwrap();
        let moves = &game.mainline.moves;
        assert_eq!(moves.len(), 3);
        assert_eq!(moves[1].kind, MoveKind::Null);
        assert_eq!(moves[1].side, Color::Black);
        // the pass still flips the side and bumps the counters
        assert!(moves[1].fen.contains(" w "));
        assert!(moves[1].fen.ends_with(" 1 2"));
        assert_eq!(san_of(&moves[2]), "d4");
    }

    #[test]
    fn test_board_mark_annotations() {
        let game = parse_game("1. e4 {[%cal Ge2e4,Rd1h5][%csl Gd4] with ideas} *").unwrap();
        let anns = &game.mainline.moves[0].annotations;
        assert_eq!(
            anns,
            &vec![
                Annotation::Comment {
                    text: "with ideas".to_string()
                },
                Annotation::Arrow {
                    from: Square::E2,
                    to: Square::E4,
                    color: AnnotationColor::Green,
                },
                Annotation::Arrow {
                    from: Square::D1,
                    to: Square::H5,
                    color: AnnotationColor::Red,
                },
                Annotation::Highlight {
                    square: Square::D4,
                    color: AnnotationColor::Green,
                },
            ]
        );
    }

    #[test]
    fn test_fen_tag_case_insensitive_and_canonicalized() {
        let game = parse_game(
            "[fen \"r1bqkbnr/pppp1ppp/2n5/1B2p3/4P3/5N2/PPPP1PPP/RNBQK2R b KQkq - 3 3\"]\n\n3... a6 4. Ba4 Nf6 *",
        )
        .unwrap();
        assert_eq!(
            game.start_fen.as_deref(),
            Some("r1bqkbnr/pppp1ppp/2n5/1B2p3/4P3/5N2/PPPP1PPP/RNBQK2R b KQkq - 3 3")
        );
        assert_eq!(game.mainline.moves.len(), 3);
        assert_eq!(game.mainline.moves[0].side, Color::Black);
    }

    #[test]
    fn test_fen_tag_missing_fields_defaulted() {
        let game = parse_game("[FEN \"8/8/8/8/8/8/8/K6k w\"]\n\n1. Kb1 *").unwrap();
        assert_eq!(
            game.start_fen.as_deref(),
            Some("8/8/8/8/8/8/8/K6k w - - 0 1")
        );
        assert_eq!(game.mainline.moves.len(), 1);
    }

    #[test]
    fn test_parse_error_surfaces_text_and_position() {
        let err = parse_game("1. e4 e9 *").unwrap_err();
        match err {
            PgnError::InvalidMove { text, fen } => {
                assert_eq!(text, "e9");
                assert!(fen.starts_with("rnbqkbnr/pppppppp/8/8/4P3/"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_illegal_move_is_fatal() {
        assert!(parse_game("1. e4 e5 2. Ke2 *").is_err());
    }

    #[test]
    fn test_variation_before_any_move_is_an_error() {
        assert!(matches!(
            parse_game("(1. e4) *"),
            Err(PgnError::DanglingVariation)
        ));
    }

    #[test]
    fn test_dangling_move_number_is_trimmed() {
        let game = parse_game("1. e4 e5 2.").unwrap();
        assert_eq!(game.mainline.moves.len(), 2);
        assert_eq!(game.result, GameResult::Unknown);
    }

    #[test]
    fn test_parse_games_batch_with_one_failure() {
        let db = "1. e4 e5 1-0\n\n1. e4 e9 0-1\n\n1. d4 d5 1/2-1/2";
        let parsed: Vec<_> = parse_games(db).collect();
        assert_eq!(parsed.len(), 3);
        assert!(parsed[0].is_ok());
        assert!(parsed[1].is_err());
        assert!(parsed[2].is_ok());
        assert_eq!(parsed[2].as_ref().unwrap().result, GameResult::Draw);
    }

    #[test]
    fn test_castling_endpoints() {
        let game = parse_game("1. e4 e5 2. Nf3 Nc6 3. Bc4 Bc5 4. O-O *").unwrap();
        let castle = &game.mainline.moves[6];
        match &castle.kind {
            MoveKind::Normal { san, from, to, .. } => {
                assert_eq!(san, "O-O");
                assert_eq!(*from, Square::E1);
                assert_eq!(*to, Square::G1);
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn test_promotion_is_recorded() {
        let game = parse_game("[FEN \"8/4P2k/8/8/8/8/8/4K3 w - - 0 1\"]\n\n1. e8=Q *").unwrap();
        match &game.mainline.moves[0].kind {
            MoveKind::Normal { promotion, .. } => {
                assert_eq!(*promotion, Some(shakmaty::Role::Queen));
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }
}

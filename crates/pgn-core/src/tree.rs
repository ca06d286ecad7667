//! Game record data model: annotations, moves, variations, games.
//!
//! The tree is fully owned — every side-line lives inside the move it is
//! an alternative to, and there are no parent back-pointers. Addresses
//! are derived data, recomputed top-down by [`assign_paths`] after any
//! structural change rather than maintained incrementally.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use shakmaty::{Color, Role, Square};

use crate::fen::START_FEN;
use crate::path::{MovePath, PathStep};

mod square_str {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use shakmaty::Square;

    pub fn serialize<S: Serializer>(square: &Square, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(square)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Square, D::Error> {
        let raw = String::deserialize(d)?;
        raw.parse().map_err(de::Error::custom)
    }
}

mod color_str {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use shakmaty::Color;

    pub fn serialize<S: Serializer>(color: &Color, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(if color.is_white() { "w" } else { "b" })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Color, D::Error> {
        match String::deserialize(d)?.as_str() {
            "w" => Ok(Color::White),
            "b" => Ok(Color::Black),
            other => Err(de::Error::custom(format!("invalid side '{other}'"))),
        }
    }
}

mod role_opt {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use shakmaty::Role;

    pub fn serialize<S: Serializer>(role: &Option<Role>, s: S) -> Result<S::Ok, S::Error> {
        match role {
            Some(r) => s.serialize_some(&r.char().to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Role>, D::Error> {
        match Option::<String>::deserialize(d)? {
            None => Ok(None),
            Some(raw) => {
                let c = raw
                    .chars()
                    .next()
                    .ok_or_else(|| de::Error::custom("empty promotion role"))?;
                Role::from_char(c)
                    .map(Some)
                    .ok_or_else(|| de::Error::custom(format!("invalid promotion role '{raw}'")))
            }
        }
    }
}

/// Board-marking colors used by `%cal`/`%csl` comment tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationColor {
    Green,
    Red,
    Yellow,
    Blue,
}

impl AnnotationColor {
    pub fn from_code(c: char) -> Option<Self> {
        match c {
            'G' => Some(Self::Green),
            'R' => Some(Self::Red),
            'Y' => Some(Self::Yellow),
            'B' => Some(Self::Blue),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Annotation {
    /// Free-text comment. Attached after a move, or as a prefix
    /// annotation of a variation when it precedes the first move.
    Comment { text: String },
    /// Numeric annotation glyph. Symbolic suffixes are normalized to the
    /// standard codes (`!` 1, `?` 2, `!!` 3, `??` 4, `!?` 5, `?!` 6);
    /// unrecognized glyphs map to -1.
    Nag { code: i32 },
    Arrow {
        #[serde(with = "square_str")]
        from: Square,
        #[serde(with = "square_str")]
        to: Square,
        color: AnnotationColor,
    },
    Highlight {
        #[serde(with = "square_str")]
        square: Square,
        color: AnnotationColor,
    },
}

/// What kind of move a node records. Every consumer matches exhaustively,
/// so adding a kind is a compile-checked change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveKind {
    /// A legal move resolved by the rules engine.
    Normal {
        san: String,
        #[serde(with = "square_str")]
        from: Square,
        #[serde(with = "square_str")]
        to: Square,
        #[serde(with = "role_opt")]
        promotion: Option<Role>,
    },
    /// A pass. No origin or destination, but the side to move and the
    /// move counters still advance.
    Null,
    /// A move accepted without rules validation; its position was
    /// computed by direct square patching.
    Unchecked {
        notation: String,
        #[serde(with = "square_str")]
        from: Square,
        #[serde(with = "square_str")]
        to: Square,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveNode {
    /// The side that played this move.
    #[serde(with = "color_str")]
    pub side: Color,
    pub kind: MoveKind,
    /// Position after the move, as a six-field FEN.
    pub fen: String,
    /// Current address in the tree; regenerated after every edit.
    pub path: MovePath,
    pub annotations: Vec<Annotation>,
    /// Side-lines: alternatives to this move, not continuations after it.
    pub variations: Vec<Variation>,
}

impl MoveNode {
    /// Display text for the move.
    pub fn notation(&self) -> &str {
        match &self.kind {
            MoveKind::Normal { san, .. } => san,
            MoveKind::Null => "--",
            MoveKind::Unchecked { notation, .. } => notation,
        }
    }
}

/// An ordered line of moves; insertion order is ply order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Variation {
    /// Comments seen before the first move of this line.
    pub prefix_annotations: Vec<Annotation>,
    pub moves: Vec<MoveNode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameResult {
    #[serde(rename = "1-0")]
    WhiteWins,
    #[serde(rename = "0-1")]
    BlackWins,
    #[serde(rename = "1/2-1/2")]
    Draw,
    #[serde(rename = "*")]
    Unknown,
}

impl GameResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WhiteWins => "1-0",
            Self::BlackWins => "0-1",
            Self::Draw => "1/2-1/2",
            Self::Unknown => "*",
        }
    }

    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "1-0" => Some(Self::WhiteWins),
            "0-1" => Some(Self::BlackWins),
            "1/2-1/2" => Some(Self::Draw),
            "*" => Some(Self::Unknown),
            _ => None,
        }
    }
}

impl Default for GameResult {
    fn default() -> Self {
        Self::Unknown
    }
}

impl fmt::Display for GameResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Game {
    /// Tag-pair metadata, verbatim from the notation's tag section.
    pub meta: HashMap<String, String>,
    /// Starting position from a FEN tag; `None` means the standard
    /// initial position.
    pub start_fen: Option<String>,
    pub result: GameResult,
    pub mainline: Variation,
}

impl Game {
    pub fn starting_position(&self) -> &str {
        self.start_fen.as_deref().unwrap_or(START_FEN)
    }

    /// Annotations rendered before the first main-line move.
    pub fn prefix_annotations(&self) -> &[Annotation] {
        &self.mainline.prefix_annotations
    }
}

/// Rebuild every address in `variation`: move `i` gets `base` with its
/// ply offset by `i`, and side-line `b` of a move at path `p` is rebuilt
/// with base `p + (b, 0)`. The editor re-runs this over the whole main
/// line (base [`MovePath::root`]) after every structural edit — total
/// recomputation, O(tree size) per edit, which is what keeps the
/// addressing invariant true.
pub fn assign_paths(variation: &mut Variation, base: &MovePath) {
    for (ply, node) in variation.moves.iter_mut().enumerate() {
        node.path = base.shift(ply as isize);
        for (line, side_line) in node.variations.iter_mut().enumerate() {
            let mut child_base = node.path.clone();
            child_base.push(PathStep::new(line, 0));
            assign_paths(side_line, &child_base);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(san: &str, side: Color) -> MoveNode {
        MoveNode {
            side,
            kind: MoveKind::Normal {
                san: san.to_string(),
                from: Square::E2,
                to: Square::E4,
                promotion: None,
            },
            fen: START_FEN.to_string(),
            path: MovePath::default(),
            annotations: Vec::new(),
            variations: Vec::new(),
        }
    }

    fn path(steps: &[(usize, usize)]) -> MovePath {
        MovePath::new(steps.iter().map(|&(l, p)| PathStep::new(l, p)).collect())
    }

    #[test]
    fn test_assign_paths_mainline() {
        let mut line = Variation {
            prefix_annotations: Vec::new(),
            moves: vec![
                node("e4", Color::White),
                node("e5", Color::Black),
                node("Nf3", Color::White),
            ],
        };
        assign_paths(&mut line, &MovePath::root());
        assert_eq!(line.moves[0].path, path(&[(0, 0)]));
        assert_eq!(line.moves[1].path, path(&[(0, 1)]));
        assert_eq!(line.moves[2].path, path(&[(0, 2)]));
    }

    #[test]
    fn test_assign_paths_nested_side_lines() {
        let mut inner = node("c5", Color::Black);
        inner.variations.push(Variation {
            prefix_annotations: Vec::new(),
            moves: vec![node("e6", Color::Black), node("d4", Color::White)],
        });
        let mut line = Variation {
            prefix_annotations: Vec::new(),
            moves: vec![node("e4", Color::White), inner],
        };
        // second move also owns a second side-line
        line.moves[1].variations.push(Variation {
            prefix_annotations: Vec::new(),
            moves: vec![node("c6", Color::Black)],
        });
        assign_paths(&mut line, &MovePath::root());

        let c5 = &line.moves[1];
        assert_eq!(c5.path, path(&[(0, 1)]));
        assert_eq!(c5.variations[0].moves[0].path, path(&[(0, 1), (0, 0)]));
        assert_eq!(c5.variations[0].moves[1].path, path(&[(0, 1), (0, 1)]));
        assert_eq!(c5.variations[1].moves[0].path, path(&[(0, 1), (1, 0)]));
    }

    #[test]
    fn test_assign_paths_overwrites_stale_addresses() {
        let mut line = Variation {
            prefix_annotations: Vec::new(),
            moves: vec![node("e4", Color::White), node("e5", Color::Black)],
        };
        line.moves[0].path = path(&[(7, 7), (7, 7)]);
        assign_paths(&mut line, &MovePath::root());
        assert_eq!(line.moves[0].path, path(&[(0, 0)]));
    }

    #[test]
    fn test_game_result_tokens() {
        assert_eq!(GameResult::from_token("1-0"), Some(GameResult::WhiteWins));
        assert_eq!(GameResult::from_token("1/2-1/2"), Some(GameResult::Draw));
        assert_eq!(GameResult::from_token("2-0"), None);
        assert_eq!(GameResult::Draw.to_string(), "1/2-1/2");
    }

    #[test]
    fn test_move_node_serialization_round_trip() {
        let mut mv = node("e4", Color::White);
        mv.annotations.push(Annotation::Arrow {
            from: Square::E2,
            to: Square::E4,
            color: AnnotationColor::Green,
        });
        let json = serde_json::to_string(&mv).unwrap();
        assert!(json.contains("\"e2\""));
        assert!(json.contains("\"w\""));
        let back: MoveNode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mv);
    }

    #[test]
    fn test_notation_per_kind() {
        let normal = node("Nf3", Color::White);
        assert_eq!(normal.notation(), "Nf3");
        let null = MoveNode {
            kind: MoveKind::Null,
            ..node("x", Color::Black)
        };
        assert_eq!(null.notation(), "--");
        let unchecked = MoveNode {
            kind: MoveKind::Unchecked {
                notation: "e2e5".to_string(),
                from: Square::E2,
                to: Square::E5,
            },
            ..node("x", Color::White)
        };
        assert_eq!(unchecked.notation(), "e2e5");
    }
}

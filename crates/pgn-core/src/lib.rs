//! Chess game-notation engine: parse annotated game text into an
//! addressable move tree and edit it in place.
//!
//! The pipeline is [`split_games`] over a multi-game database,
//! [`parse_game`] per game, and [`GameEditor`] for mutation. Every move
//! carries a [`MovePath`] address that is regenerated after each
//! structural edit, so addresses always reflect the current tree shape.

pub mod database;
pub mod editor;
pub mod error;
pub mod fen;
pub mod parser;
pub mod path;
pub mod tree;

pub use database::split_games;
pub use editor::{GameEditor, MoveInput};
pub use error::PgnError;
pub use parser::{parse_game, parse_games};
pub use path::{MovePath, PathStep};
pub use tree::{
    assign_paths, Annotation, AnnotationColor, Game, GameResult, MoveKind, MoveNode, Variation,
};

//! Engine error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PgnError {
    /// A move-text buffer could not be resolved against the running
    /// position. Fatal to the enclosing game parse; no partial game is
    /// returned. Carries the offending text and the position it was
    /// attempted against so callers can show a useful diagnostic.
    #[error("unparsable move text '{text}' at position {fen}")]
    InvalidMove { text: String, fen: String },

    #[error("unterminated comment in move text")]
    UnterminatedComment,

    #[error("variation opened before any move")]
    DanglingVariation,

    #[error("invalid FEN: {0}")]
    InvalidFen(String),
}

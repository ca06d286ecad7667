//! Tree addresses for moves.
//!
//! A move's address is an ordered list of (branch-index, ply-index)
//! steps: the first step locates a ply on the main line, each further
//! step descends into a numbered side-line of the move above it.
//! Addresses are not stable identities — the editor regenerates every
//! address after each structural edit, so an address always reflects a
//! node's current position in the tree.

use serde::{Deserialize, Serialize};

/// One (branch-index, ply-index) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathStep {
    pub line: usize,
    pub ply: usize,
}

impl PathStep {
    pub fn new(line: usize, ply: usize) -> Self {
        Self { line, ply }
    }
}

/// Address of a move in the game tree. Two paths are equal iff their
/// step sequences are pointwise equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovePath(Vec<PathStep>);

impl MovePath {
    pub fn new(steps: Vec<PathStep>) -> Self {
        Self(steps)
    }

    /// Address of the first main-line move.
    pub fn root() -> Self {
        Self(vec![PathStep::new(0, 0)])
    }

    pub fn steps(&self) -> &[PathStep] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn last(&self) -> Option<PathStep> {
        self.0.last().copied()
    }

    /// The address with the last step removed: the move owning the
    /// side-line this address points into.
    pub fn parent(&self) -> Self {
        let mut steps = self.0.clone();
        steps.pop();
        Self(steps)
    }

    pub fn push(&mut self, step: PathStep) {
        self.0.push(step);
    }

    /// The single addressing primitive: replace only the ply-index of the
    /// last step with `last.ply + offset`, copying everything else. Next
    /// is `shift(1)`, previous is `shift(-1)`, advancing by `k` plies is
    /// `shift(k)`. Underflow saturates at ply 0; valid call sites never
    /// shift below the first ply of a line.
    pub fn shift(&self, offset: isize) -> Self {
        let mut steps = self.0.clone();
        if let Some(last) = steps.last_mut() {
            last.ply = last.ply.checked_add_signed(offset).unwrap_or(0);
        }
        Self(steps)
    }
}

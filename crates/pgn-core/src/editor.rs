//! Stateful game editing: navigation, insertion, deletion, promotion.
//!
//! The editor owns a defensive copy of one [`Game`] and a nullable
//! cursor. Every structural mutation finishes with a full address
//! rebuild over the main line; addresses are never patched in place.
//! Out-of-range addresses make an operation a silent no-op, they are
//! normal navigation conditions rather than errors.

use std::mem;

use shakmaty::{Chess, File, Move, Position, Role, Square};

use crate::fen;
use crate::parser;
use crate::path::{MovePath, PathStep};
use crate::tree::{assign_paths, Annotation, Game, MoveKind, MoveNode, Variation};

/// A move request by coordinates, before rules resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveInput {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<Role>,
}

impl MoveInput {
    pub fn new(from: Square, to: Square, promotion: Option<Role>) -> Self {
        Self {
            from,
            to,
            promotion,
        }
    }
}

/// Mutable editing session over one game tree.
pub struct GameEditor {
    game: Game,
    cursor: Option<MovePath>,
}

impl GameEditor {
    /// Editor over an empty game.
    pub fn new() -> Self {
        Self {
            game: Game::default(),
            cursor: None,
        }
    }

    /// Load a copy of `game`, regenerating every address. Input paths
    /// are untrusted and discarded.
    pub fn load(game: &Game) -> Self {
        let mut game = game.clone();
        assign_paths(&mut game.mainline, &MovePath::root());
        Self { game, cursor: None }
    }

    /// Snapshot of the edited game. Callers never see the live tree.
    pub fn game(&self) -> Game {
        self.game.clone()
    }

    pub fn into_game(self) -> Game {
        self.game
    }

    pub fn current_path(&self) -> Option<&MovePath> {
        self.cursor.as_ref()
    }

    /// Position at the cursor, or the game's starting position when the
    /// cursor is unset or stale.
    pub fn current_fen(&self) -> String {
        self.cursor
            .as_ref()
            .and_then(|path| self.fen_at(path))
            .unwrap_or_else(|| self.game.starting_position().to_string())
    }

    pub fn fen_at(&self, path: &MovePath) -> Option<String> {
        self.move_at(path).map(|node| node.fen.clone())
    }

    /// Descend the tree following `path`. `None` if any segment is out
    /// of range.
    pub fn move_at(&self, path: &MovePath) -> Option<&MoveNode> {
        let mut steps = path.steps().iter();
        let first = steps.next()?;
        let mut node = self.game.mainline.moves.get(first.ply)?;
        for step in steps {
            let line = node.variations.get(step.line)?;
            node = line.moves.get(step.ply)?;
        }
        Some(node)
    }

    fn move_at_mut(&mut self, path: &MovePath) -> Option<&mut MoveNode> {
        let mut steps = path.steps().iter();
        let first = steps.next()?;
        let mut node = self.game.mainline.moves.get_mut(first.ply)?;
        for step in steps {
            let line = node.variations.get_mut(step.line)?;
            node = line.moves.get_mut(step.ply)?;
        }
        Some(node)
    }

    /// The variation containing the move at `path`; the main line for
    /// addresses of fewer than two segments.
    pub fn variation_at(&self, path: &MovePath) -> Option<&Variation> {
        if path.depth() < 2 {
            return Some(&self.game.mainline);
        }
        let last = path.last()?;
        self.move_at(&path.parent())
            .and_then(|owner| owner.variations.get(last.line))
    }

    fn variation_at_mut(&mut self, path: &MovePath) -> Option<&mut Variation> {
        if path.depth() < 2 {
            return Some(&mut self.game.mainline);
        }
        let last = path.last()?;
        self.move_at_mut(&path.parent())
            .and_then(|owner| owner.variations.get_mut(last.line))
    }

    /// Play `input` from the position at the cursor. The move extends
    /// the current line when the following slot is free, otherwise it
    /// opens a new side-line on the move occupying that slot. With
    /// `allow_unchecked`, a move the rules engine rejects degrades to an
    /// unchecked square patch instead of failing.
    ///
    /// Returns the inserted move with its final address, and leaves the
    /// cursor on it. `None` means nothing was inserted.
    pub fn insert_move(&mut self, input: &MoveInput, allow_unchecked: bool) -> Option<MoveNode> {
        let cur_fen = self.current_fen();
        let legal = parser::position_from_fen(&cur_fen)
            .ok()
            .and_then(|mut pos| {
                let mv = resolve_legal(&pos, input)?;
                Some(parser::play_move(&mut pos, mv))
            });
        let node = match legal {
            Some(node) => node,
            None if allow_unchecked && fen::occupation_at(&cur_fen, input.from).is_some() => {
                if input.promotion.is_some() {
                    tracing::debug!("dropping promotion on unchecked move");
                }
                MoveNode {
                    side: fen::side_to_move(&cur_fen),
                    kind: MoveKind::Unchecked {
                        notation: format!("{}{}", input.from, input.to),
                        from: input.from,
                        to: input.to,
                    },
                    fen: fen::apply_unchecked_move(&cur_fen, input.from, input.to),
                    path: MovePath::default(),
                    annotations: Vec::new(),
                    variations: Vec::new(),
                }
            }
            None => return None,
        };

        let next = match &self.cursor {
            Some(path) => path.shift(1),
            None => MovePath::root(),
        };
        let inserted = if self.move_at(&next).is_none() {
            // slot after the cursor is free: extend the current line
            let line = match self.cursor.clone() {
                Some(path) => self.variation_at_mut(&path)?,
                None => &mut self.game.mainline,
            };
            line.moves.push(node);
            next
        } else {
            let owner = self.move_at_mut(&next)?;
            let branch = owner.variations.len();
            owner.variations.push(Variation {
                prefix_annotations: Vec::new(),
                moves: vec![node],
            });
            let mut path = next;
            path.push(PathStep::new(branch, 0));
            path
        };
        self.rebuild();
        self.cursor = Some(inserted.clone());
        self.move_at(&inserted).cloned()
    }

    /// Delete the variation containing `path`. On the main line this
    /// clears the whole tree; on a side-line it detaches that side-line
    /// and moves the cursor to the owning move's parent.
    pub fn delete_at(&mut self, path: &MovePath) {
        if path.depth() <= 1 {
            self.game.mainline.moves.clear();
            self.cursor = None;
            self.rebuild();
            return;
        }
        let Some(last) = path.last() else { return };
        let owner_path = path.parent();
        let mut first_path = owner_path.clone();
        first_path.push(PathStep::new(last.line, 0));

        let Some(owner) = self.move_at_mut(&owner_path) else {
            return;
        };
        let before = owner.variations.len();
        owner
            .variations
            .retain(|line| line.moves.first().map_or(true, |m| m.path != first_path));
        if owner.variations.len() == before {
            return;
        }
        self.cursor = parent_move_path(&owner_path);
        self.rebuild();
    }

    /// Make the side-line containing `path` the continuation of its
    /// parent line. The displaced continuation is demoted to the first
    /// side-line of the promoted move; the branching move's remaining
    /// side-lines follow the promoted move's own. No-op on the main
    /// line or an unresolvable address.
    pub fn promote_at(&mut self, path: &MovePath) {
        if path.depth() <= 1 {
            return;
        }
        let Some(last) = path.last() else { return };
        let line_idx = last.line;
        let branch_path = path.parent();
        let Some(branch_ply) = branch_path.last().map(|step| step.ply) else {
            return;
        };
        let valid = self.move_at(&branch_path).map_or(false, |owner| {
            owner
                .variations
                .get(line_idx)
                .map_or(false, |line| !line.moves.is_empty())
        });
        if !valid {
            return;
        }
        let Some(parent_var) = self.variation_at_mut(&branch_path) else {
            return;
        };

        let mut tail = parent_var.moves.split_off(branch_ply);
        let mut promoted = tail[0].variations.remove(line_idx);
        let others = mem::take(&mut tail[0].variations);
        if !promoted.prefix_annotations.is_empty() {
            tracing::debug!("dropping prefix annotations of promoted side-line");
        }

        let mut sidelines = Vec::with_capacity(others.len() + 1);
        sidelines.push(Variation {
            prefix_annotations: Vec::new(),
            moves: tail,
        });
        let first = &mut promoted.moves[0];
        sidelines.extend(mem::take(&mut first.variations));
        sidelines.extend(others);
        first.variations = sidelines;
        parent_var.moves.append(&mut promoted.moves);

        self.rebuild();
        self.cursor = Some(branch_path);
    }

    /// Step one ply forward along the current line; from a null cursor,
    /// to the first move of the main line. No-op at the end of a line.
    pub fn next(&mut self) -> Option<&MoveNode> {
        let target = match &self.cursor {
            Some(path) => path.shift(1),
            None => MovePath::root(),
        };
        self.move_at(&target)?;
        self.cursor = Some(target.clone());
        self.move_at(&target)
    }

    /// Step one ply back; from the first ply of a side-line, to the
    /// side-line's parent move. At the head of the main line the cursor
    /// goes back to null.
    pub fn prev(&mut self) -> Option<&MoveNode> {
        let cur = self.cursor.take()?;
        let parent = parent_move_path(&cur)?;
        self.cursor = Some(parent.clone());
        self.move_at(&parent)
    }

    /// Replace the annotations of the move at `path`, or the game's
    /// prefix annotations when `path` is `None`.
    pub fn set_annotations_at(&mut self, path: Option<&MovePath>, annotations: Vec<Annotation>) {
        match path {
            Some(path) => {
                if let Some(node) = self.move_at_mut(path) {
                    node.annotations = annotations;
                }
            }
            None => self.game.mainline.prefix_annotations = annotations,
        }
    }

    fn rebuild(&mut self) {
        assign_paths(&mut self.game.mainline, &MovePath::root());
    }
}

impl Default for GameEditor {
    fn default() -> Self {
        Self::new()
    }
}

/// Address of the move one ply before `path`, descending out of a
/// side-line at its first ply. `None` at the head of the main line.
fn parent_move_path(path: &MovePath) -> Option<MovePath> {
    let last = path.last()?;
    if last.ply > 0 {
        Some(path.shift(-1))
    } else if path.depth() > 1 {
        Some(path.parent())
    } else {
        None
    }
}

/// Match a coordinate request against the legal moves of `pos`.
/// Castling accepts both the two-square king move and king-takes-rook.
fn resolve_legal(pos: &Chess, input: &MoveInput) -> Option<Move> {
    pos.legal_moves().into_iter().find(|mv| match mv {
        Move::Castle { king, rook } => {
            let file = if rook.file() > king.file() { 6 } else { 2 };
            let dest = Square::from_coords(File::new(file), king.rank());
            input.from == *king && (input.to == dest || input.to == *rook)
        }
        _ => {
            mv.from() == Some(input.from)
                && mv.to() == input.to
                && mv.promotion() == input.promotion
        }
    })
}

use crate::model::node::FlattenedNode;

/// Why a proposed move is not allowed. `Display` is the user-facing reason.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoveRejection {
    #[error("node not found")]
    NodeNotFound,
    #[error("a node cannot become its own parent")]
    SelfParent,
    #[error("cannot move a node into its own descendant")]
    Descendant,
    /// A domain rule supplied by an injected validator
    #[error("{0}")]
    Rule(String),
    /// The persistence layer refused the move
    #[error("move rejected: {0}")]
    Persistence(String),
}

/// The verdict of a move validator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveCheck {
    pub can_move: bool,
    pub reason: Option<MoveRejection>,
}

impl MoveCheck {
    pub fn allow() -> Self {
        MoveCheck {
            can_move: true,
            reason: None,
        }
    }

    pub fn deny(reason: MoveRejection) -> Self {
        MoveCheck {
            can_move: false,
            reason: Some(reason),
        }
    }
}

/// Decides whether `active` may be placed under `parent_id`.
///
/// `parent` is the resolved parent row, or `None` at root level (or when the
/// id is not among the rows being projected over).
pub trait MoveValidator<T> {
    fn validate(
        &self,
        active: &FlattenedNode<T>,
        parent: Option<&FlattenedNode<T>>,
        parent_id: Option<&str>,
    ) -> MoveCheck;
}

impl<T, F> MoveValidator<T> for F
where
    F: Fn(&FlattenedNode<T>, Option<&FlattenedNode<T>>, Option<&str>) -> MoveCheck,
{
    fn validate(
        &self,
        active: &FlattenedNode<T>,
        parent: Option<&FlattenedNode<T>>,
        parent_id: Option<&str>,
    ) -> MoveCheck {
        self(active, parent, parent_id)
    }
}

/// Structural checks only: no self-parenting, no moving into a descendant.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralValidator;

impl<T> MoveValidator<T> for StructuralValidator {
    fn validate(
        &self,
        active: &FlattenedNode<T>,
        parent: Option<&FlattenedNode<T>>,
        parent_id: Option<&str>,
    ) -> MoveCheck {
        let Some(parent_id) = parent_id else {
            return MoveCheck::allow();
        };
        if parent_id == active.id() {
            return MoveCheck::deny(MoveRejection::SelfParent);
        }
        if parent.is_some_and(|p| p.has_ancestor(active.id())) {
            return MoveCheck::deny(MoveRejection::Descendant);
        }
        MoveCheck::allow()
    }
}

/// Runs `first`, then `second` only if `first` allowed the move.
pub struct Both<A, B> {
    first: A,
    second: B,
}

pub fn both<A, B>(first: A, second: B) -> Both<A, B> {
    Both { first, second }
}

impl<T, A, B> MoveValidator<T> for Both<A, B>
where
    A: MoveValidator<T>,
    B: MoveValidator<T>,
{
    fn validate(
        &self,
        active: &FlattenedNode<T>,
        parent: Option<&FlattenedNode<T>>,
        parent_id: Option<&str>,
    ) -> MoveCheck {
        let check = self.first.validate(active, parent, parent_id);
        if !check.can_move {
            return check;
        }
        self.second.validate(active, parent, parent_id)
    }
}

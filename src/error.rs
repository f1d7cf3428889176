//! Error types for the rules engine

use thiserror::Error;

/// The kind of rule that rejected an action.
///
/// Carried inside [`RulesError::IllegalAction`] so hosts can present a
/// structured rejection to the player without string matching.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IllegalActionKind {
    #[error("wrong zone")]
    WrongZone,
    #[error("wrong timing")]
    WrongTiming,
    #[error("insufficient mana")]
    InsufficientMana,
    #[error("cost cannot be paid")]
    UnpayableCost,
    #[error("illegal target")]
    IllegalTarget,
    #[error("illegal mode choice")]
    IllegalMode,
    #[error("casting restriction")]
    Restricted,
    #[error("illegal attack")]
    IllegalAttack,
    #[error("illegal block")]
    IllegalBlock,
    #[error("action not available")]
    NotAvailable,
}

#[derive(Error, Debug)]
pub enum RulesError {
    /// The caller requested something the rules forbid. Recoverable: the
    /// state is unchanged and the error is returned to the controller.
    #[error("illegal action ({kind}): {message}")]
    IllegalAction {
        kind: IllegalActionKind,
        message: String,
    },

    /// Engine state is inconsistent. Fatal: the game instance must be
    /// aborted. Should never occur with correct inputs.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// A game object id did not resolve. Fatal, a bug upstream.
    #[error("object not found: {0}")]
    ObjectNotFound(u32),

    /// A card definition is malformed or references an unknown capability.
    /// Surfaced at load time; the card is unplayable.
    #[error("definition error for '{card}': {message}")]
    DefinitionError { card: String, message: String },

    /// A controller returned an invalid choice. The engine re-prompts; after
    /// the configured retry count this is converted to an IllegalAction.
    #[error("invalid controller decision: {0}")]
    DecisionError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),
}

impl RulesError {
    pub fn illegal(kind: IllegalActionKind, message: impl Into<String>) -> Self {
        RulesError::IllegalAction {
            kind,
            message: message.into(),
        }
    }

    /// True for errors the casting/action boundary recovers from.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RulesError::IllegalAction { .. } | RulesError::DecisionError(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, RulesError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverability() {
        let e = RulesError::illegal(IllegalActionKind::WrongTiming, "sorcery during combat");
        assert!(e.is_recoverable());

        let e = RulesError::ObjectNotFound(17);
        assert!(!e.is_recoverable());

        let e = RulesError::InvariantViolation("phase table".to_string());
        assert!(!e.is_recoverable());
    }

    #[test]
    fn test_display() {
        let e = RulesError::illegal(IllegalActionKind::InsufficientMana, "need {1}{G}");
        assert_eq!(
            e.to_string(),
            "illegal action (insufficient mana): need {1}{G}"
        );
    }
}

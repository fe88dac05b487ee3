//! Frontier entry state definitions
//!
//! Each identity popped from the frontier moves through these states in
//! order. `Visited` is only reachable from `Persisting`.
use std::fmt;

/// Represents the processing state of one frontier entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryState {
    /// Popped from the frontier and not yet visited
    Dequeued,

    /// Looking up the entity record (store, then API)
    ResolvingEntity,

    /// Collecting relation lists (store, then API)
    ResolvingRelations,

    /// Writing new entities and relation edges
    Persisting,

    /// Entity and relations are durably recorded
    Visited,
}

impl EntryState {
    /// Returns true if moving from `self` to `next` is allowed
    ///
    /// The resolving states may fall back to `Dequeued` when a shutdown
    /// interrupts them and the entry is put back on the frontier.
    pub fn can_transition_to(&self, next: EntryState) -> bool {
        matches!(
            (self, next),
            (Self::Dequeued, Self::ResolvingEntity)
                | (Self::ResolvingEntity, Self::ResolvingRelations)
                | (Self::ResolvingEntity, Self::Persisting)
                | (Self::ResolvingRelations, Self::Persisting)
                | (Self::Persisting, Self::Visited)
                | (Self::ResolvingEntity, Self::Dequeued)
                | (Self::ResolvingRelations, Self::Dequeued)
        )
    }

    /// Moves to `next`, or reports the invalid transition
    pub fn advance(self, next: EntryState) -> Result<EntryState, crate::CrawlError> {
        if self.can_transition_to(next) {
            tracing::trace!("Entry state {} -> {}", self, next);
            Ok(next)
        } else {
            Err(crate::CrawlError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dequeued => "dequeued",
            Self::ResolvingEntity => "resolving_entity",
            Self::ResolvingRelations => "resolving_relations",
            Self::Persisting => "persisting",
            Self::Visited => "visited",
        }
    }
}

impl fmt::Display for EntryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let state = EntryState::Dequeued
            .advance(EntryState::ResolvingEntity)
            .and_then(|s| s.advance(EntryState::ResolvingRelations))
            .and_then(|s| s.advance(EntryState::Persisting))
            .and_then(|s| s.advance(EntryState::Visited))
            .unwrap();
        assert_eq!(state, EntryState::Visited);
    }

    #[test]
    fn test_visited_only_after_persisting() {
        assert!(!EntryState::Dequeued.can_transition_to(EntryState::Visited));
        assert!(!EntryState::ResolvingEntity.can_transition_to(EntryState::Visited));
        assert!(!EntryState::ResolvingRelations.can_transition_to(EntryState::Visited));
        assert!(EntryState::Persisting.can_transition_to(EntryState::Visited));
    }

    #[test]
    fn test_persisting_cannot_be_requeued() {
        assert!(EntryState::ResolvingEntity.can_transition_to(EntryState::Dequeued));
        assert!(EntryState::ResolvingRelations.can_transition_to(EntryState::Dequeued));
        assert!(!EntryState::Persisting.can_transition_to(EntryState::Dequeued));
    }

    #[test]
    fn test_invalid_transition_error() {
        let err = EntryState::Visited
            .advance(EntryState::Persisting)
            .unwrap_err();
        assert!(matches!(
            err,
            crate::CrawlError::InvalidTransition {
                from: EntryState::Visited,
                to: EntryState::Persisting
            }
        ));
    }

    #[test]
    fn test_visited_is_final() {
        for next in [
            EntryState::Dequeued,
            EntryState::ResolvingEntity,
            EntryState::ResolvingRelations,
            EntryState::Persisting,
            EntryState::Visited,
        ] {
            assert!(!EntryState::Visited.can_transition_to(next));
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", EntryState::Dequeued), "dequeued");
        assert_eq!(
            format!("{}", EntryState::ResolvingRelations),
            "resolving_relations"
        );
    }
}

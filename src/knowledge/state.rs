//! Knowledge-collection state machine: where a keyword is in its Q&A.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Per-keyword knowledge-collection status.
///
/// NeedsKnowledge → AwaitingAnswers → Ready | Skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionStatus {
    NeedsKnowledge,
    AwaitingAnswers,
    Ready,
    Skipped,
}

impl CollectionStatus {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: CollectionStatus) -> bool {
        use CollectionStatus::*;
        matches!(
            (self, target),
            (NeedsKnowledge, AwaitingAnswers) | (AwaitingAnswers, Ready) | (AwaitingAnswers, Skipped)
        )
    }

    /// Whether the keyword's knowledge is final and it can be generated from now.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Ready | Self::Skipped)
    }
}

impl Default for CollectionStatus {
    fn default() -> Self {
        Self::NeedsKnowledge
    }
}

impl fmt::Display for CollectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NeedsKnowledge => "needs_knowledge",
            Self::AwaitingAnswers => "awaiting_answers",
            Self::Ready => "ready",
            Self::Skipped => "skipped",
        };
        write!(f, "{s}")
    }
}

impl FromStr for CollectionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "needs_knowledge" => Ok(Self::NeedsKnowledge),
            "awaiting_answers" => Ok(Self::AwaitingAnswers),
            "ready" => Ok(Self::Ready),
            "skipped" => Ok(Self::Skipped),
            other => Err(format!("unknown collection status: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_transitions() {
        use CollectionStatus::*;
        for (from, to) in [
            (NeedsKnowledge, AwaitingAnswers),
            (AwaitingAnswers, Ready),
            (AwaitingAnswers, Skipped),
        ] {
            assert!(from.can_transition_to(to), "{from} should transition to {to}");
        }
    }

    #[test]
    fn invalid_transitions() {
        use CollectionStatus::*;
        assert!(!NeedsKnowledge.can_transition_to(Ready));
        assert!(!NeedsKnowledge.can_transition_to(Skipped));
        assert!(!Ready.can_transition_to(AwaitingAnswers));
        assert!(!Skipped.can_transition_to(Ready));
        assert!(!AwaitingAnswers.can_transition_to(AwaitingAnswers));
        assert!(!AwaitingAnswers.can_transition_to(NeedsKnowledge));
    }

    #[test]
    fn settled_states() {
        use CollectionStatus::*;
        assert!(Ready.is_settled());
        assert!(Skipped.is_settled());
        assert!(!NeedsKnowledge.is_settled());
        assert!(!AwaitingAnswers.is_settled());
    }

    #[test]
    fn display_matches_serde() {
        use CollectionStatus::*;
        for status in [NeedsKnowledge, AwaitingAnswers, Ready, Skipped] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(format!("\"{status}\""), json);
            assert_eq!(status.to_string().parse::<CollectionStatus>().unwrap(), status);
        }
    }

    #[test]
    fn default_is_needs_knowledge() {
        assert_eq!(CollectionStatus::default(), CollectionStatus::NeedsKnowledge);
    }
}

//! Per-file pipeline state.

use serde::{Deserialize, Serialize};

/// Stage a file has reached in the pipeline.
///
/// States advance strictly in declaration order; `Failed` may follow any
/// non-terminal state. `Archived` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Received,
    Stabilizing,
    TextExtracted,
    StructuredExtracted,
    Named,
    Composed,
    Written,
    Uploaded,
    Archived,
    Failed,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Stabilizing => "stabilizing",
            Self::TextExtracted => "text_extracted",
            Self::StructuredExtracted => "structured_extracted",
            Self::Named => "named",
            Self::Composed => "composed",
            Self::Written => "written",
            Self::Uploaded => "uploaded",
            Self::Archived => "archived",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "received" => Some(Self::Received),
            "stabilizing" => Some(Self::Stabilizing),
            "text_extracted" => Some(Self::TextExtracted),
            "structured_extracted" => Some(Self::StructuredExtracted),
            "named" => Some(Self::Named),
            "composed" => Some(Self::Composed),
            "written" => Some(Self::Written),
            "uploaded" => Some(Self::Uploaded),
            "archived" => Some(Self::Archived),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Archived | Self::Failed)
    }

    /// The state that follows on success, `None` for terminal states.
    pub fn next(&self) -> Option<Self> {
        match self {
            Self::Received => Some(Self::Stabilizing),
            Self::Stabilizing => Some(Self::TextExtracted),
            Self::TextExtracted => Some(Self::StructuredExtracted),
            Self::StructuredExtracted => Some(Self::Named),
            Self::Named => Some(Self::Composed),
            Self::Composed => Some(Self::Written),
            Self::Written => Some(Self::Uploaded),
            Self::Uploaded => Some(Self::Archived),
            Self::Archived | Self::Failed => None,
        }
    }

    /// Whether moving from `self` to `to` is a legal transition.
    pub fn can_transition_to(&self, to: PipelineState) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == Self::Failed || self.next() == Some(to)
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_walks_every_state() {
        let mut state = PipelineState::Received;
        let mut visited = vec![state];
        while let Some(next) = state.next() {
            assert!(state.can_transition_to(next));
            state = next;
            visited.push(state);
        }
        assert_eq!(state, PipelineState::Archived);
        assert_eq!(visited.len(), 9);
    }

    #[test]
    fn test_failed_reachable_from_non_terminal_only() {
        assert!(PipelineState::Written.can_transition_to(PipelineState::Failed));
        assert!(PipelineState::Received.can_transition_to(PipelineState::Failed));
        assert!(!PipelineState::Archived.can_transition_to(PipelineState::Failed));
        assert!(!PipelineState::Failed.can_transition_to(PipelineState::Archived));
    }

    #[test]
    fn test_no_skipping_states() {
        assert!(!PipelineState::TextExtracted.can_transition_to(PipelineState::Written));
    }

    #[test]
    fn test_str_roundtrip() {
        for state in [PipelineState::StructuredExtracted, PipelineState::Uploaded] {
            assert_eq!(PipelineState::from_str(state.as_str()), Some(state));
        }
        assert_eq!(PipelineState::from_str("bogus"), None);
    }
}

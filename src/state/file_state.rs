/// Lifecycle of one input file
///
/// A file moves from `Idle` to `Running` when its pipeline starts, and ends in
/// exactly one of the terminal states once the sink has been finalized.
use std::fmt;

/// Represents the current state of an input file in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileState {
    /// Pipeline constructed, nothing read yet
    Idle,

    /// Producer and consumer are both active
    Running,

    // ===== Terminal States =====
    /// Every record was handed to the sink and the sink finalized cleanly
    Completed,

    /// The sink failed to open, write or finalize
    Failed,
}

impl FileState {
    /// Returns true if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if `next` is a legal successor of this state
    pub fn can_transition_to(&self, next: FileState) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Running)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
        )
    }

    /// Lowercase name used in logs and summaries
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [FileState; 4] = [
        FileState::Idle,
        FileState::Running,
        FileState::Completed,
        FileState::Failed,
    ];

    #[test]
    fn test_is_terminal() {
        assert!(!FileState::Idle.is_terminal());
        assert!(!FileState::Running.is_terminal());
        assert!(FileState::Completed.is_terminal());
        assert!(FileState::Failed.is_terminal());
    }

    #[test]
    fn test_legal_transitions() {
        assert!(FileState::Idle.can_transition_to(FileState::Running));
        assert!(FileState::Running.can_transition_to(FileState::Completed));
        assert!(FileState::Running.can_transition_to(FileState::Failed));
    }

    #[test]
    fn test_terminal_states_have_no_successor() {
        for from in [FileState::Completed, FileState::Failed] {
            for to in ALL {
                assert!(!from.can_transition_to(to), "{} -> {}", from, to);
            }
        }
    }

    #[test]
    fn test_idle_cannot_skip_running() {
        assert!(!FileState::Idle.can_transition_to(FileState::Completed));
        assert!(!FileState::Idle.can_transition_to(FileState::Failed));
        assert!(!FileState::Idle.can_transition_to(FileState::Idle));
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", FileState::Running), "running");
        assert_eq!(format!("{}", FileState::Completed), "completed");
    }
}

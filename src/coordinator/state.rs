use std::fmt;

/// Lifecycle of one configuration attempt.
///
/// `Idle -> Registering -> AwaitingPeers -> Rendering -> Succeeded`; any
/// non-terminal state may fall to `Failed`. A restart goes `Registering -> Succeeded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Idle,
    Registering,
    AwaitingPeers,
    Rendering,
    Succeeded,
    Failed,
}

impl State {
    pub fn is_terminal(self) -> bool {
        matches!(self, State::Succeeded | State::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            State::Idle => "idle",
            State::Registering => "registering",
            State::AwaitingPeers => "awaiting_peers",
            State::Rendering => "rendering",
            State::Succeeded => "succeeded",
            State::Failed => "failed",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of one task across all of its attempts.
///
/// `Dispatched -> (Completed | Retrying -> Dispatched) -> terminal`, or
/// `Cancelled` from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskState {
    /// A transport operation is running for the current handle.
    #[default]
    Dispatched,

    /// The last attempt failed and the request is being re-issued.
    Retrying,

    /// A result has been handed to the completion callback.
    Completed,

    /// Removed from the registry by an explicit cancel.
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Cancelled)
    }

    /// Whether moving from `self` to `next` is a legal step.
    pub fn can_transition_to(self, next: TaskState) -> bool {
        match (self, next) {
            (TaskState::Dispatched, TaskState::Retrying)
            | (TaskState::Dispatched, TaskState::Completed)
            | (TaskState::Retrying, TaskState::Dispatched)
            | (TaskState::Retrying, TaskState::Completed) => true,
            (from, TaskState::Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }
}

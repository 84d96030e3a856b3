/// Session state definitions for tracking crawl progress
///
/// This module defines every state a crawl session passes through and the legal moves
/// between them.
use std::fmt;

/// Represents the current state of a crawl session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    // ===== Setup =====
    /// Visited set loaded, sinks opening, metadata started
    Init,

    /// Fetching the ordered post list for the strategy
    Listing,

    // ===== Per-post loop =====
    /// Deciding whether the next listed post needs work
    ProcessingPost,

    /// Fetching and fully expanding a post's reply tree
    ExpandingComments,

    /// Applying the language gates to a post's comments
    Filtering,

    // ===== Teardown =====
    /// Writing buffered records to the line sink
    Flushing,

    /// Snapshot materialization, visited persist, metadata
    Finalizing,

    // ===== Terminal States =====
    /// Every listed post was handled or the cap was reached
    Done,

    /// Stopped at a post boundary by a cancellation signal
    Interrupted,

    /// Session-fatal failure (listing or persistence)
    Error,
}

impl SessionState {
    /// Returns true if this is a terminal state (no further transitions)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Interrupted | Self::Error)
    }

    /// Returns true if the session is inside the per-post loop
    pub fn is_processing(&self) -> bool {
        matches!(
            self,
            Self::ProcessingPost | Self::ExpandingComments | Self::Filtering
        )
    }

    /// Checks whether moving from `self` to `next` is allowed
    ///
    /// Any live state may fail into `Error` or drain into `Flushing`. A threshold flush
    /// returns to `ProcessingPost`; the final flush moves on to `Finalizing`.
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        if self.is_terminal() {
            return false;
        }
        if matches!(next, Self::Error | Self::Flushing) {
            return true;
        }

        match self {
            Self::Init => matches!(next, Self::Listing),
            Self::Listing => matches!(next, Self::ProcessingPost),
            Self::ProcessingPost => matches!(next, Self::ProcessingPost | Self::ExpandingComments),
            Self::ExpandingComments => matches!(next, Self::Filtering | Self::ProcessingPost),
            Self::Filtering => matches!(next, Self::ProcessingPost),
            Self::Flushing => matches!(next, Self::ProcessingPost | Self::Finalizing),
            Self::Finalizing => matches!(next, Self::Done | Self::Interrupted),
            Self::Done | Self::Interrupted | Self::Error => false,
        }
    }

    /// Snake-case name used in log lines
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Listing => "listing",
            Self::ProcessingPost => "processing_post",
            Self::ExpandingComments => "expanding_comments",
            Self::Filtering => "filtering",
            Self::Flushing => "flushing",
            Self::Finalizing => "finalizing",
            Self::Done => "done",
            Self::Interrupted => "interrupted",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

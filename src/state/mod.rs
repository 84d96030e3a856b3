//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `SessionState`: the crawl session state machine (init, listing, per-post loop, teardown)
//! - `CancellationFlag`: cooperative cancellation observed between posts and combos

mod cancel;
mod session_state;

// Re-export main types
pub use cancel::CancellationFlag;
pub use session_state::SessionState;

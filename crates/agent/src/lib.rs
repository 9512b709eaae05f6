//! The foreground reasoning loop of the ironhive runtime.
//!
//! One episode takes a user query to a final answer (or a terminal failure)
//! by interleaving model calls with tool dispatch, under step, request, and
//! token budgets. The action grammar lives in [`parser`], prompt assembly in
//! [`prompt`], and the loop itself in [`engine`].

pub mod engine;
pub mod loop_detector;
pub mod parser;
pub mod prompt;
#[cfg(any(test, feature = "test-support"))]
pub mod test_helpers;

pub use engine::{EpisodeOutcome, EpisodeRequest, EpisodeStatus, ReactEngine};
pub use parser::{parse_output, ParseError, ParsedAction};
pub use prompt::build_system_prompt;

mod progress;
mod service;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use progress::SessionProgress;
pub use service::{QuizSession, SessionQuestion, SessionStep};
pub use workflow::{QuizLoopService, SessionAdvance, SessionFinish};

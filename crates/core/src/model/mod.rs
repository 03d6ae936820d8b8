mod catalogue;
mod ids;
mod progression;
mod promo;
mod question;
mod session;
mod stats;

pub use ids::{AttemptId, ParseIdError, ProfileId, UnitId, UserId};

pub use catalogue::{Catalogue, QuizUnit};
pub use progression::{
    ProgressionError, ProgressionState, Roadmap, STARTING_CARROTS, UnlockOutcome,
};
pub use promo::{DEFAULT_PROMO_SECS, PromoGrant, UnlockCosts};
pub use question::{AnswerKey, OptionLabel, Question, QuestionError};
pub use session::{ParseModeError, QuizMode, SessionResult, SessionResultError};
pub use stats::UserStats;

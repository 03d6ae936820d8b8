use chrono::{DateTime, Utc};
use rand::rng;
use rand::seq::SliceRandom;
use std::collections::BTreeSet;
use std::fmt;

use quiz_core::model::{
    AnswerKey, AttemptId, OptionLabel, Question, QuizMode, Roadmap, SessionResult, UnitId,
};

use super::progress::SessionProgress;
use crate::error::SessionError;

//
// ─── SESSION QUESTION ──────────────────────────────────────────────────────────
//

/// One question as a session displays it: the validated question plus the
/// display order of its options, which shuffled sessions randomise. Labels
/// ride inside the option text, so grading is untouched by reordering.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionQuestion {
    question: Question,
    options: Vec<String>,
}

impl SessionQuestion {
    fn from_question(question: Question) -> Self {
        let options = question.options().to_vec();
        Self { question, options }
    }

    fn shuffle_options(&mut self, rng: &mut impl rand::Rng) {
        self.options.as_mut_slice().shuffle(rng);
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        self.question.prompt()
    }

    /// Options in display order.
    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    /// Labels of the options in display order. Validation at catalogue load
    /// guarantees every option carries one.
    #[must_use]
    pub fn labels(&self) -> Vec<OptionLabel> {
        self.options
            .iter()
            .enumerate()
            .filter_map(|(index, text)| OptionLabel::from_option_text(text, index).ok())
            .collect()
    }

    /// True when the label is part of the answer key. Learn mode renders
    /// its always-visible answers from this.
    #[must_use]
    pub fn is_correct(&self, label: OptionLabel) -> bool {
        self.question.answer().contains(label)
    }

    #[must_use]
    pub fn is_multi_answer(&self) -> bool {
        self.question.is_multi_answer()
    }

    #[must_use]
    pub fn answer(&self) -> &AnswerKey {
        self.question.answer()
    }

    #[must_use]
    pub fn solution(&self) -> Option<&str> {
        self.question.solution()
    }

    #[must_use]
    pub fn question(&self) -> &Question {
        &self.question
    }
}

//
// ─── STEP ──────────────────────────────────────────────────────────────────────
//

/// Where the session landed after advancing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStep {
    /// Now on the question at this index.
    Question(usize),
    /// The last question was passed; the session is complete.
    Finished,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// In-memory quiz run over one unit's questions.
///
/// Steps strictly forward through its questions. Scored modes require a
/// select-confirm-advance cycle per question; learn mode walks freely with
/// answers on display. Counters only move inside `confirm`, so they always
/// sum to the number of confirmed questions.
pub struct QuizSession {
    unit: UnitId,
    mode: QuizMode,
    questions: Vec<SessionQuestion>,
    current: usize,
    selected: BTreeSet<OptionLabel>,
    confirmed: bool,
    correct_count: u32,
    incorrect_count: u32,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    attempt_id: Option<AttemptId>,
}

impl QuizSession {
    /// Creates a session over the given questions.
    ///
    /// Shuffle mode and the ultimate unit randomise both question order and
    /// each question's option order.
    ///
    /// `started_at` should come from the services layer clock to keep time
    /// deterministic.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoQuestions` if no questions are provided.
    pub fn new(
        unit: UnitId,
        mode: QuizMode,
        questions: Vec<Question>,
        roadmap: &Roadmap,
        started_at: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        if questions.is_empty() {
            return Err(SessionError::NoQuestions);
        }

        let mut questions: Vec<SessionQuestion> = questions
            .into_iter()
            .map(SessionQuestion::from_question)
            .collect();

        if mode.shuffles() || roadmap.is_ultimate(unit) {
            let mut rng = rng();
            questions.as_mut_slice().shuffle(&mut rng);
            for question in &mut questions {
                question.shuffle_options(&mut rng);
            }
        }

        Ok(Self {
            unit,
            mode,
            questions,
            current: 0,
            selected: BTreeSet::new(),
            confirmed: false,
            correct_count: 0,
            incorrect_count: 0,
            started_at,
            completed_at: None,
            attempt_id: None,
        })
    }

    #[must_use]
    pub fn unit(&self) -> UnitId {
        self.unit
    }

    #[must_use]
    pub fn mode(&self) -> QuizMode {
        self.mode
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    /// Storage id of the committed attempt, once one exists.
    #[must_use]
    pub fn attempt_id(&self) -> Option<&AttemptId> {
        self.attempt_id.as_ref()
    }

    pub(crate) fn set_attempt_id(&mut self, id: AttemptId) {
        self.attempt_id = Some(id);
    }

    /// Total number of questions in this session.
    #[must_use]
    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    /// Number of questions already confirmed.
    #[must_use]
    pub fn answered_count(&self) -> usize {
        usize::try_from(self.correct_count + self.incorrect_count).unwrap_or(usize::MAX)
    }

    /// Number of questions not yet passed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.questions.len().saturating_sub(self.current)
    }

    #[must_use]
    pub fn correct_count(&self) -> u32 {
        self.correct_count
    }

    #[must_use]
    pub fn incorrect_count(&self) -> u32 {
        self.incorrect_count
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Returns a summary of the current session progress.
    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        SessionProgress {
            total: self.total_questions(),
            answered: self.answered_count(),
            remaining: self.remaining(),
            is_complete: self.is_complete(),
        }
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&SessionQuestion> {
        self.questions.get(self.current)
    }

    /// Labels currently selected on the open question.
    #[must_use]
    pub fn selected(&self) -> &BTreeSet<OptionLabel> {
        &self.selected
    }

    /// True once the open question's selection has been confirmed.
    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }

    /// Selects or deselects an option on the open question.
    ///
    /// Single-answer questions replace the selection; multi-answer questions
    /// toggle the label. Ignored in learn mode, after confirmation, after
    /// completion, and for labels the question does not offer.
    pub fn select(&mut self, label: OptionLabel) {
        if self.is_complete() || self.confirmed || !self.mode.is_scored() {
            return;
        }
        let Some(question) = self.questions.get(self.current) else {
            return;
        };
        if !question.question().option_labels().contains(&label) {
            return;
        }

        if question.is_multi_answer() {
            if !self.selected.remove(&label) {
                self.selected.insert(label);
            }
        } else {
            self.selected.clear();
            self.selected.insert(label);
        }
    }

    /// Grades the open question against the current selection.
    ///
    /// Correct means exact set equality with the answer key. Exactly one
    /// counter moves, exactly once per question.
    ///
    /// # Errors
    ///
    /// Returns `Completed` after the session finished, `NotScorable` in
    /// learn mode, `AlreadyConfirmed` on a second confirm, and
    /// `NothingSelected` when no option is chosen.
    pub fn confirm(&mut self) -> Result<bool, SessionError> {
        if self.is_complete() {
            return Err(SessionError::Completed);
        }
        if !self.mode.is_scored() {
            return Err(SessionError::NotScorable);
        }
        if self.confirmed {
            return Err(SessionError::AlreadyConfirmed);
        }
        if self.selected.is_empty() {
            return Err(SessionError::NothingSelected);
        }
        let Some(question) = self.questions.get(self.current) else {
            return Err(SessionError::Completed);
        };

        let is_correct = question.answer().matches(&self.selected);
        if is_correct {
            self.correct_count += 1;
        } else {
            self.incorrect_count += 1;
        }
        self.confirmed = true;
        Ok(is_correct)
    }

    /// Moves to the next question, or completes the session past the last
    /// one. Scored modes demand a confirmed answer first; learn mode walks
    /// freely.
    ///
    /// `now` should come from the services layer clock.
    ///
    /// # Errors
    ///
    /// Returns `Completed` if the session already finished and
    /// `NotConfirmed` when a scored question was not confirmed.
    pub fn advance(&mut self, now: DateTime<Utc>) -> Result<SessionStep, SessionError> {
        if self.is_complete() {
            return Err(SessionError::Completed);
        }
        if self.mode.is_scored() && !self.confirmed {
            return Err(SessionError::NotConfirmed);
        }

        self.current += 1;
        self.selected.clear();
        self.confirmed = false;

        if self.current >= self.questions.len() {
            self.completed_at = Some(now);
            Ok(SessionStep::Finished)
        } else {
            Ok(SessionStep::Question(self.current))
        }
    }

    /// The scored outcome of a completed session.
    ///
    /// `Ok(None)` for learn mode and for sessions still in progress.
    ///
    /// # Errors
    ///
    /// Propagates `SessionResultError` when the final counters are
    /// inconsistent, which would indicate a bug in this state machine.
    pub fn result(&self) -> Result<Option<SessionResult>, SessionError> {
        if !self.mode.is_scored() {
            return Ok(None);
        }
        let Some(completed_at) = self.completed_at else {
            return Ok(None);
        };

        let elapsed = completed_at - self.started_at;
        let time_taken_secs = u64::try_from(elapsed.num_seconds()).unwrap_or(0);
        let total = u32::try_from(self.questions.len()).unwrap_or(u32::MAX);

        let result = SessionResult::new(
            self.unit,
            self.mode,
            total,
            self.correct_count,
            self.incorrect_count,
            time_taken_secs,
        )?;
        Ok(Some(result))
    }
}

impl fmt::Debug for QuizSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuizSession")
            .field("unit", &self.unit)
            .field("mode", &self.mode)
            .field("questions_len", &self.questions.len())
            .field("current", &self.current)
            .field("correct", &self.correct_count)
            .field("incorrect", &self.incorrect_count)
            .field("started_at", &self.started_at)
            .field("completed_at", &self.completed_at)
            .field("attempt_id", &self.attempt_id)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

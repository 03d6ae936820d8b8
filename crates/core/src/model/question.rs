use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

//
// ─── QUESTION ERRORS ───────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QuestionError {
    #[error("question prompt must not be empty")]
    EmptyPrompt,

    #[error("question must offer at least one option")]
    NoOptions,

    #[error("option {index} is blank")]
    BlankOption { index: usize },

    #[error("option {index} does not start with a letter")]
    UnlabeledOption { index: usize },

    #[error("duplicate option label '{0}'")]
    DuplicateOptionLabel(OptionLabel),

    #[error("answer string must not be empty")]
    EmptyAnswer,

    #[error("answer token '{0}' is not a single letter")]
    InvalidAnswerToken(String),

    #[error("answer letter '{0}' has no matching option")]
    AnswerWithoutOption(OptionLabel),
}

//
// ─── OPTION LABEL ──────────────────────────────────────────────────────────────
//

/// A single answer-option label: one lowercase ASCII letter.
///
/// Option display text carries its own label as the first character
/// (`"a) Paris"` → `a`), and answer strings refer to options by these
/// letters, so labels survive any reordering of the displayed options.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OptionLabel(char);

impl OptionLabel {
    /// Builds a label from a raw character, case-folding to lowercase.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::InvalidAnswerToken` when the character is not
    /// an ASCII letter.
    pub fn new(c: char) -> Result<Self, QuestionError> {
        if c.is_ascii_alphabetic() {
            Ok(Self(c.to_ascii_lowercase()))
        } else {
            Err(QuestionError::InvalidAnswerToken(c.to_string()))
        }
    }

    /// Extracts the label from option display text (its first character).
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::BlankOption` for empty text and
    /// `QuestionError::UnlabeledOption` when the first character is not a
    /// letter. The caller supplies the option's index for the error.
    pub fn from_option_text(text: &str, index: usize) -> Result<Self, QuestionError> {
        let first = text
            .chars()
            .next()
            .ok_or(QuestionError::BlankOption { index })?;
        Self::new(first).map_err(|_| QuestionError::UnlabeledOption { index })
    }

    /// Returns the underlying character.
    #[must_use]
    pub fn as_char(&self) -> char {
        self.0
    }
}

impl fmt::Debug for OptionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OptionLabel({})", self.0)
    }
}

impl fmt::Display for OptionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//
// ─── ANSWER KEY ────────────────────────────────────────────────────────────────
//

/// The set of option labels that together form the correct answer.
///
/// Parsed from the catalogue's answer string: comma-separated letters,
/// case-insensitive, whitespace-tolerant (`"A, c"` → `{a, c}`). Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerKey(BTreeSet<OptionLabel>);

impl AnswerKey {
    /// Parses a raw answer string.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::EmptyAnswer` when no letters remain after
    /// trimming, or `QuestionError::InvalidAnswerToken` for any token that is
    /// not a single ASCII letter.
    pub fn parse(raw: &str) -> Result<Self, QuestionError> {
        let mut labels = BTreeSet::new();
        for token in raw.split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            let mut chars = token.chars();
            let (first, rest) = (chars.next(), chars.next());
            match (first, rest) {
                (Some(c), None) => {
                    labels.insert(
                        OptionLabel::new(c)
                            .map_err(|_| QuestionError::InvalidAnswerToken(token.to_string()))?,
                    );
                }
                _ => return Err(QuestionError::InvalidAnswerToken(token.to_string())),
            }
        }
        if labels.is_empty() {
            return Err(QuestionError::EmptyAnswer);
        }
        Ok(Self(labels))
    }

    /// True when the answer requires more than one option.
    #[must_use]
    pub fn is_multi(&self) -> bool {
        self.0.len() > 1
    }

    /// Number of labels in the key.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// An answer key is never empty; kept for completeness.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Grades a selection: exact set equality, order-independent.
    /// Supersets and subsets of the key are both wrong.
    #[must_use]
    pub fn matches(&self, selected: &BTreeSet<OptionLabel>) -> bool {
        self.0 == *selected
    }

    /// True when the given label is part of the correct answer.
    #[must_use]
    pub fn contains(&self, label: OptionLabel) -> bool {
        self.0.contains(&label)
    }

    /// The labels in ascending order.
    #[must_use]
    pub fn labels(&self) -> &BTreeSet<OptionLabel> {
        &self.0
    }
}

impl fmt::Display for AnswerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for label in &self.0 {
            if !first {
                write!(f, ",")?;
            }
            write!(f, "{label}")?;
            first = false;
        }
        Ok(())
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// One multiple-choice question, validated at catalogue load.
///
/// Construction is the single integrity gate: a `Question` that exists is
/// guaranteed to have a non-blank prompt, labeled options, and an answer key
/// whose every letter matches an option. Malformed catalogue entries are
/// rejected here instead of surfacing later during scoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    prompt: String,
    options: Vec<String>,
    answer: AnswerKey,
    solution: Option<String>,
}

impl Question {
    /// Validates and builds a question from raw catalogue fields.
    ///
    /// # Errors
    ///
    /// Returns a `QuestionError` describing the first defect found: blank
    /// prompt, missing/blank/unlabeled options, duplicate option labels, an
    /// unparseable answer string, or an answer letter with no matching
    /// option.
    pub fn new(
        prompt: impl Into<String>,
        options: Vec<String>,
        answer: &str,
        solution: Option<String>,
    ) -> Result<Self, QuestionError> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(QuestionError::EmptyPrompt);
        }
        if options.is_empty() {
            return Err(QuestionError::NoOptions);
        }

        let mut seen = BTreeSet::new();
        for (index, text) in options.iter().enumerate() {
            if text.trim().is_empty() {
                return Err(QuestionError::BlankOption { index });
            }
            let label = OptionLabel::from_option_text(text, index)?;
            if !seen.insert(label) {
                return Err(QuestionError::DuplicateOptionLabel(label));
            }
        }

        let answer = AnswerKey::parse(answer)?;
        for label in answer.labels() {
            if !seen.contains(label) {
                return Err(QuestionError::AnswerWithoutOption(*label));
            }
        }

        Ok(Self {
            prompt,
            options,
            answer,
            solution: solution.filter(|s| !s.trim().is_empty()),
        })
    }

    /// The question text.
    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Option display strings in their original catalogue order.
    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    /// Labels of all options, in catalogue order.
    #[must_use]
    pub fn option_labels(&self) -> Vec<OptionLabel> {
        self.options
            .iter()
            .enumerate()
            .filter_map(|(index, text)| OptionLabel::from_option_text(text, index).ok())
            .collect()
    }

    /// The correct answer.
    #[must_use]
    pub fn answer(&self) -> &AnswerKey {
        &self.answer
    }

    /// Optional worked solution shown after confirming.
    #[must_use]
    pub fn solution(&self) -> Option<&str> {
        self.solution.as_deref()
    }

    /// True when more than one option must be selected.
    #[must_use]
    pub fn is_multi_answer(&self) -> bool {
        self.answer.is_multi()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

use crate::model::ids::UnitId;
use crate::model::question::Question;

//
// ─── QUIZ UNIT ─────────────────────────────────────────────────────────────────
//

/// One week's worth of quiz content. Immutable after catalogue load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizUnit {
    id: UnitId,
    questions: Vec<Question>,
}

impl QuizUnit {
    /// Creates a unit. Questions arrive already validated; a unit with zero
    /// questions is representable (the evaluator refuses to start on it).
    #[must_use]
    pub fn new(id: UnitId, questions: Vec<Question>) -> Self {
        Self { id, questions }
    }

    /// The unit's identifier.
    #[must_use]
    pub fn id(&self) -> UnitId {
        self.id
    }

    /// The unit's questions in catalogue order.
    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Number of questions in the unit.
    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// True when the unit has no questions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

//
// ─── CATALOGUE ─────────────────────────────────────────────────────────────────
//

/// The loaded question catalogue: every unit in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalogue {
    units: Vec<QuizUnit>,
}

impl Catalogue {
    /// Builds a catalogue from units in their document order.
    #[must_use]
    pub fn new(units: Vec<QuizUnit>) -> Self {
        Self { units }
    }

    /// A catalogue with no units, the degraded shape served when the source
    /// cannot be fetched.
    #[must_use]
    pub fn empty() -> Self {
        Self { units: Vec::new() }
    }

    /// Units in document order.
    #[must_use]
    pub fn units(&self) -> &[QuizUnit] {
        &self.units
    }

    /// Number of units.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// True when no units are loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Looks up a unit by id.
    #[must_use]
    pub fn unit(&self, id: UnitId) -> Option<&QuizUnit> {
        self.units.iter().find(|unit| unit.id() == id)
    }

    /// Looks up a unit by id, falling back to the FIRST unit when the id is
    /// unknown and the catalogue is non-empty.
    ///
    /// Long-standing behavior: an out-of-range unit link lands on week 1
    /// rather than an empty screen. Callers that need a strict lookup use
    /// [`Catalogue::unit`].
    #[must_use]
    pub fn unit_or_first(&self, id: UnitId) -> Option<&QuizUnit> {
        self.unit(id).or_else(|| self.units.first())
    }

    /// Questions for a unit via the first-unit fallback; empty slice when
    /// the catalogue itself is empty.
    #[must_use]
    pub fn questions_for(&self, id: UnitId) -> &[Question] {
        self.unit_or_first(id)
            .map_or(&[] as &[Question], QuizUnit::questions)
    }

    /// Every question of every unit, concatenated in catalogue order.
    /// This is the question pool of the ultimate unit.
    #[must_use]
    pub fn all_questions(&self) -> Vec<Question> {
        self.units
            .iter()
            .flat_map(|unit| unit.questions().iter().cloned())
            .collect()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

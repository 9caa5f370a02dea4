use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl DifficultyLevel {
    pub const ALL: [DifficultyLevel; 3] = [
        DifficultyLevel::Beginner,
        DifficultyLevel::Intermediate,
        DifficultyLevel::Advanced,
    ];

    /// Seconds a student gets to answer an exercise of this level.
    pub fn time_limit_secs(self) -> u32 {
        match self {
            DifficultyLevel::Beginner => 30,
            DifficultyLevel::Intermediate => 45,
            DifficultyLevel::Advanced => 60,
        }
    }

    /// Exercise kinds that are generated for this level.
    pub fn exercise_types(self) -> &'static [ExerciseType] {
        match self {
            DifficultyLevel::Beginner => &[
                ExerciseType::LetterRecognition,
                ExerciseType::SyllableFormation,
            ],
            DifficultyLevel::Intermediate => &[
                ExerciseType::SyllableFormation,
                ExerciseType::WordCompletion,
            ],
            DifficultyLevel::Advanced => &[
                ExerciseType::SentenceFormation,
                ExerciseType::TextComprehension,
            ],
        }
    }
}

impl std::fmt::Display for DifficultyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DifficultyLevel::Beginner => write!(f, "beginner"),
            DifficultyLevel::Intermediate => write!(f, "intermediate"),
            DifficultyLevel::Advanced => write!(f, "advanced"),
        }
    }
}

impl std::str::FromStr for DifficultyLevel {
    type Err = crate::LexioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(DifficultyLevel::Beginner),
            "intermediate" => Ok(DifficultyLevel::Intermediate),
            "advanced" => Ok(DifficultyLevel::Advanced),
            other => Err(crate::LexioError::InvalidInput(format!(
                "unknown difficulty level: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseType {
    LetterRecognition,
    SyllableFormation,
    WordCompletion,
    SentenceFormation,
    TextComprehension,
}

impl std::fmt::Display for ExerciseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExerciseType::LetterRecognition => write!(f, "letter_recognition"),
            ExerciseType::SyllableFormation => write!(f, "syllable_formation"),
            ExerciseType::WordCompletion => write!(f, "word_completion"),
            ExerciseType::SentenceFormation => write!(f, "sentence_formation"),
            ExerciseType::TextComprehension => write!(f, "text_comprehension"),
        }
    }
}

/// Stored exercise definition, including the expected answer.
///
/// Templates are read-only once loaded and may be read concurrently
/// without coordination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseTemplate {
    pub id: String,
    pub level: DifficultyLevel,
    pub kind: ExerciseType,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    pub correct_answer: String,
}

impl ExerciseTemplate {
    pub fn new(
        id: impl Into<String>,
        level: DifficultyLevel,
        kind: ExerciseType,
        content: impl Into<String>,
        correct_answer: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            level,
            kind,
            content: content.into(),
            options: Vec::new(),
            correct_answer: correct_answer.into(),
        }
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }
}

/// An exercise instance handed to students.
///
/// Carries no answer: grading always goes back to the template by
/// `template_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    pub id: Uuid,
    pub template_id: String,
    pub kind: ExerciseType,
    pub level: DifficultyLevel,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    pub time_limit_secs: u32,
}

impl Exercise {
    /// Instantiate a fresh exercise from a template.
    pub fn from_template(template: &ExerciseTemplate) -> Self {
        Self {
            id: Uuid::new_v4(),
            template_id: template.id.clone(),
            kind: template.kind,
            level: template.level,
            content: template.content.clone(),
            options: template.options.clone(),
            time_limit_secs: template.level.time_limit_secs(),
        }
    }
}

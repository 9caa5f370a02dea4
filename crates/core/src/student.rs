use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::LexioError;

/// A student's answer to one exercise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentResponse {
    pub student_id: String,
    /// Id of the template the answered exercise was built from.
    pub exercise_id: String,
    pub answer: String,
    #[serde(default)]
    pub response_time_ms: u64,
    pub submitted_at: DateTime<Utc>,
}

impl StudentResponse {
    pub fn new(
        student_id: impl Into<String>,
        exercise_id: impl Into<String>,
        answer: impl Into<String>,
    ) -> Self {
        Self {
            student_id: student_id.into(),
            exercise_id: exercise_id.into(),
            answer: answer.into(),
            response_time_ms: 0,
            submitted_at: Utc::now(),
        }
    }

    pub fn with_response_time(mut self, millis: u64) -> Self {
        self.response_time_ms = millis;
        self
    }

    /// Reject payloads that cannot be graded or attributed.
    pub fn validate(&self) -> Result<(), LexioError> {
        if self.student_id.trim().is_empty() {
            return Err(LexioError::InvalidInput("missing student id".into()));
        }
        if self.exercise_id.trim().is_empty() {
            return Err(LexioError::InvalidInput("missing exercise id".into()));
        }
        Ok(())
    }
}

/// Outcome of grading one [`StudentResponse`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub student_id: String,
    pub exercise_id: String,
    pub is_correct: bool,
    pub feedback: String,
    pub evaluated_at: DateTime<Utc>,
}

/// Per-student running totals.
///
/// Mutated only by whoever holds the student's key lock; the store that
/// persists it offers no atomicity of its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentAggregate {
    pub student_id: String,
    pub attempts: u64,
    pub correct: u64,
    pub incorrect: u64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl StudentAggregate {
    pub fn new(student_id: impl Into<String>) -> Self {
        Self {
            student_id: student_id.into(),
            attempts: 0,
            correct: 0,
            incorrect: 0,
            updated_at: None,
        }
    }

    /// Count one graded attempt.
    pub fn record(&mut self, is_correct: bool) {
        self.attempts += 1;
        if is_correct {
            self.correct += 1;
        } else {
            self.incorrect += 1;
        }
        self.updated_at = Some(Utc::now());
    }

    /// Fraction of attempts answered correctly (0.0 when nothing recorded yet).
    pub fn accuracy(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.correct as f64 / self.attempts as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_blank_ids() {
        assert!(StudentResponse::new("s1", "ex-1", "ma").validate().is_ok());
        assert!(matches!(
            StudentResponse::new("  ", "ex-1", "ma").validate(),
            Err(LexioError::InvalidInput(_))
        ));
        assert!(matches!(
            StudentResponse::new("s1", "", "ma").validate(),
            Err(LexioError::InvalidInput(_))
        ));
    }

    #[test]
    fn aggregate_counts_attempts() {
        let mut agg = StudentAggregate::new("s1");
        agg.record(true);
        agg.record(false);
        agg.record(true);
        assert_eq!(agg.attempts, 3);
        assert_eq!(agg.correct, 2);
        assert_eq!(agg.incorrect, 1);
        assert!(agg.updated_at.is_some());
        assert!((agg.accuracy() - 2.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_aggregate_has_zero_accuracy() {
        assert_eq!(StudentAggregate::new("s1").accuracy(), 0.0);
    }
}

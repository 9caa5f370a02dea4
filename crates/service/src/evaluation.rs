//! Grading of student responses on the worker pool.

use std::sync::Arc;

use chrono::Utc;
use lexio_core::config::{EvaluationConfig, PoolConfig};
use lexio_core::{answers_match, EvaluationResult, LexioError, Result, StudentResponse};
use lexio_pool::{PoolStats, TaskHandler, WorkerPool};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::store::TemplateStore;

pub const FEEDBACK_CORRECT: &str = "Correct answer!";
pub const FEEDBACK_MISSING_TEMPLATE: &str = "Could not load the exercise details to evaluate.";

/// Receiving end of [`EvaluationService::results`]. Ends once the service is
/// dropped.
pub type ResultFeed = mpsc::Receiver<EvaluationResult>;

/// What a worker compares: the stored answer against the submitted one.
#[derive(Debug, Clone)]
pub struct AnswerCheck {
    pub expected: String,
    pub given: String,
}

/// Worker-side grader: case- and whitespace-insensitive comparison.
#[derive(Debug, Default)]
pub struct AnswerEvaluator;

impl TaskHandler for AnswerEvaluator {
    type Input = AnswerCheck;
    type Output = bool;

    fn handle(&mut self, check: AnswerCheck) -> std::result::Result<bool, String> {
        Ok(answers_match(&check.expected, &check.given))
    }
}

/// Single entry point for grading. Hides the worker pool behind
/// [`submit_evaluation`](Self::submit_evaluation) and delivers every
/// result to each subscribed [`ResultFeed`].
///
/// Feeds are bounded and lossless: when a subscriber falls `result_buffer`
/// results behind, grading waits for it. A subscriber must keep reading its
/// feed or drop it.
pub struct EvaluationService<H = AnswerEvaluator>
where
    H: TaskHandler<Input = AnswerCheck, Output = bool>,
{
    templates: Arc<dyn TemplateStore>,
    pool: WorkerPool<H>,
    subscribers: parking_lot::Mutex<Vec<mpsc::Sender<EvaluationResult>>>,
    result_buffer: usize,
}

impl EvaluationService<AnswerEvaluator> {
    /// Start a pool of [`AnswerEvaluator`] workers and wrap it.
    pub fn start(
        templates: Arc<dyn TemplateStore>,
        pool: &PoolConfig,
        config: &EvaluationConfig,
    ) -> Result<Self> {
        let pool = WorkerPool::start(pool, || AnswerEvaluator)?;
        Ok(Self::with_pool(templates, pool, config))
    }
}

impl<H> EvaluationService<H>
where
    H: TaskHandler<Input = AnswerCheck, Output = bool>,
{
    pub fn with_pool(
        templates: Arc<dyn TemplateStore>,
        pool: WorkerPool<H>,
        config: &EvaluationConfig,
    ) -> Self {
        Self {
            templates,
            pool,
            subscribers: parking_lot::Mutex::new(Vec::new()),
            result_buffer: config.result_buffer.max(1),
        }
    }

    /// Grade one response.
    ///
    /// An unknown exercise id yields a negative result. Failures of the
    /// grading machinery itself surface as errors and are never reported as
    /// an incorrect answer.
    pub async fn submit_evaluation(&self, response: StudentResponse) -> Result<EvaluationResult> {
        response.validate()?;
        debug!(
            student_id = %response.student_id,
            exercise_id = %response.exercise_id,
            "evaluating response"
        );

        let Some(template) = self.templates.find_by_id(&response.exercise_id).await? else {
            let err = LexioError::TemplateNotFound(response.exercise_id.clone());
            warn!(error = %err, "grading as incorrect");
            return Ok(self
                .publish(verdict(&response, false, FEEDBACK_MISSING_TEMPLATE.into()))
                .await);
        };

        let check = AnswerCheck {
            expected: template.correct_answer.clone(),
            given: response.answer.clone(),
        };
        let is_correct = self.pool.submit(check).await.map_err(|err| {
            error!(exercise_id = %response.exercise_id, error = %err, "evaluation failed");
            LexioError::from(err)
        })?;

        let feedback = if is_correct {
            FEEDBACK_CORRECT.to_string()
        } else {
            format!("The correct answer was: {}", template.correct_answer)
        };
        Ok(self.publish(verdict(&response, is_correct, feedback)).await)
    }

    /// Subscribe to every result produced from now on.
    pub fn results(&self) -> ResultFeed {
        let (tx, rx) = mpsc::channel(self.result_buffer);
        self.subscribers.lock().push(tx);
        rx
    }

    pub async fn pool_stats(&self) -> PoolStats {
        self.pool.stats().await
    }

    /// Stop the worker pool. Later evaluations fail with `WorkerFault`.
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }

    async fn publish(&self, result: EvaluationResult) -> EvaluationResult {
        let subscribers = self.subscribers.lock().clone();
        let mut dropped = false;
        for subscriber in subscribers {
            if subscriber.send(result.clone()).await.is_err() {
                dropped = true;
            }
        }
        if dropped {
            self.subscribers.lock().retain(|tx| !tx.is_closed());
            debug!("result subscriber went away");
        }
        result
    }
}

fn verdict(response: &StudentResponse, is_correct: bool, feedback: String) -> EvaluationResult {
    EvaluationResult {
        student_id: response.student_id.clone(),
        exercise_id: response.exercise_id.clone(),
        is_correct,
        feedback,
        evaluated_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluator_ignores_case_and_spacing() {
        let mut evaluator = AnswerEvaluator;
        let check = |expected: &str, given: &str| AnswerCheck {
            expected: expected.into(),
            given: given.into(),
        };
        assert_eq!(evaluator.handle(check("MA", " ma ")), Ok(true));
        assert_eq!(
            evaluator.handle(check("El gato duerme en el sofá", "el  gato duerme en el SOFÁ")),
            Ok(true)
        );
        assert_eq!(evaluator.handle(check("MA", "la")), Ok(false));
    }
}

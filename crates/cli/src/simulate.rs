//! Simulated classroom: students pull exercises from the shared queue,
//! answer them and have their progress tracked.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use futures::StreamExt;
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

use lexio_core::config::Config;
use lexio_core::{DifficultyLevel, StudentAggregate, StudentResponse};
use lexio_pool::PoolStats;
use lexio_service::{
    EvaluationService, ExerciseGenerator, ExerciseQueue, InMemoryAggregateStore,
    InMemoryTemplateStore, ProgressionService, TemplateStore,
};

#[derive(Debug, Clone)]
pub struct Plan {
    pub students: usize,
    pub level: DifficultyLevel,
    pub exercises_per_student: usize,
    /// Chance in [0, 1] that a student answers correctly.
    pub accuracy: f64,
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub level: DifficultyLevel,
    pub evaluated: usize,
    pub correct: usize,
    pub elapsed_ms: u128,
    pub pool: PoolStats,
    pub students: Vec<StudentAggregate>,
}

pub async fn run(config: &Config, plan: &Plan) -> Result<Report> {
    let started = Instant::now();
    let students = plan.students.max(1);
    let total = students * plan.exercises_per_student;
    let accuracy = plan.accuracy.clamp(0.0, 1.0);

    let templates = Arc::new(InMemoryTemplateStore::seeded(&config.store));
    let queue = Arc::new(ExerciseQueue::new(&config.queue));
    let generator = ExerciseGenerator::new(templates.clone(), queue.clone());
    let evaluation = Arc::new(
        EvaluationService::start(templates.clone(), &config.pool, &config.evaluation)
            .context("failed to start evaluation workers")?,
    );
    let progression = Arc::new(ProgressionService::new(Arc::new(
        InMemoryAggregateStore::new(&config.store),
    )));
    let listener = progression.clone().spawn_listener(evaluation.results());

    info!(students, total, difficulty = %plan.level, "starting simulation");

    // Each student subscribes to the same queue; every exercise goes to
    // whichever student pulls it first.
    let mut handles = Vec::with_capacity(students);
    for n in 0..students {
        let student_id = format!("student-{}", n + 1);
        let mut exercises = queue.subscribe();
        let templates = templates.clone();
        let evaluation = evaluation.clone();
        handles.push(tokio::spawn(async move {
            let mut answered = Vec::new();
            while let Some(exercise) = exercises.next().await {
                let template = templates
                    .find_by_id(&exercise.template_id)
                    .await?
                    .with_context(|| format!("template {} vanished", exercise.template_id))?;
                let knows_it = rand::thread_rng().gen_bool(accuracy);
                let answer = if knows_it {
                    template.correct_answer
                } else {
                    wrong_answer(&template.options, &template.correct_answer)
                };
                let response = StudentResponse::new(&student_id, exercise.template_id, answer);
                let result = evaluation.submit_evaluation(response).await?;
                debug!(%student_id, correct = result.is_correct, "answered");
                answered.push(result.is_correct);
            }
            anyhow::Ok(answered)
        }));
    }

    let generated = generator.generate_batch(plan.level, total).await;
    queue.close().await;
    generated.context("exercise generation failed")?;

    let mut evaluated = 0;
    let mut correct = 0;
    for handle in handles {
        let answered = handle.await.context("student task panicked")??;
        evaluated += answered.len();
        correct += answered.iter().filter(|c| **c).count();
    }

    let pool = evaluation.pool_stats().await;
    evaluation.shutdown().await;
    // Dropping the last handle closes the result feed and ends the listener.
    drop(evaluation);
    listener.await.context("progression listener panicked")?;

    Ok(Report {
        level: plan.level,
        evaluated,
        correct,
        elapsed_ms: started.elapsed().as_millis(),
        pool,
        students: progression.all_progress().await?,
    })
}

/// A plausible wrong answer: another option if there is one.
fn wrong_answer(options: &[String], correct: &str) -> String {
    options
        .iter()
        .find(|o| o.as_str() != correct)
        .cloned()
        .unwrap_or_else(|| "no sé".to_string())
}

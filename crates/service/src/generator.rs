//! Builds exercises from templates and feeds them into the queue.

use std::sync::Arc;

use futures::future::try_join_all;
use lexio_core::{DifficultyLevel, Exercise, ExerciseType, LexioError, Result};
use lexio_sync::KeyedMutexRegistry;
use rand::seq::SliceRandom;
use tracing::{error, info};
use uuid::Uuid;

use crate::exercise_queue::ExerciseQueue;
use crate::store::TemplateStore;

pub struct ExerciseGenerator {
    templates: Arc<dyn TemplateStore>,
    queue: Arc<ExerciseQueue>,
    /// One batch at a time per level.
    levels: KeyedMutexRegistry<DifficultyLevel>,
}

impl ExerciseGenerator {
    pub fn new(templates: Arc<dyn TemplateStore>, queue: Arc<ExerciseQueue>) -> Self {
        Self {
            templates,
            queue,
            levels: KeyedMutexRegistry::new(),
        }
    }

    /// Generate `count` exercises for `level` concurrently and enqueue them.
    ///
    /// Returns the ids of the enqueued exercises. Waits while the queue is
    /// full, so a consumer must be draining it for large batches.
    pub async fn generate_batch(&self, level: DifficultyLevel, count: usize) -> Result<Vec<Uuid>> {
        self.levels
            .with_lock(level, || async {
                info!(difficulty = %level, count, "generating exercise batch");
                try_join_all((0..count).map(|_| self.generate_one(level))).await
            })
            .await
    }

    async fn generate_one(&self, level: DifficultyLevel) -> Result<Uuid> {
        let kind = pick_kind(level)?;
        let candidates = self.templates.templates_for(level, kind).await?;
        let template = candidates
            .choose(&mut rand::thread_rng())
            .ok_or_else(|| {
                let err = LexioError::TemplateNotFound(format!("no templates for {level}/{kind}"));
                error!(error = %err, "exercise generation failed");
                err
            })?;

        let exercise = Exercise::from_template(template);
        let id = exercise.id;
        self.queue.enqueue(exercise).await?;
        Ok(id)
    }
}

fn pick_kind(level: DifficultyLevel) -> Result<ExerciseType> {
    level
        .exercise_types()
        .choose(&mut rand::thread_rng())
        .copied()
        .ok_or_else(|| LexioError::InvalidInput(format!("no exercise types for level {level}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryTemplateStore;
    use futures::StreamExt;
    use lexio_core::config::{QueueConfig, StoreConfig};

    fn generator(capacity: usize) -> (ExerciseGenerator, Arc<ExerciseQueue>) {
        let templates = Arc::new(InMemoryTemplateStore::seeded(&StoreConfig::no_latency()));
        let queue = Arc::new(ExerciseQueue::new(&QueueConfig {
            capacity,
            producer_permits: 4,
        }));
        (ExerciseGenerator::new(templates, queue.clone()), queue)
    }

    #[tokio::test]
    async fn batch_matches_level_rules() {
        let (generator, queue) = generator(16);
        let ids = generator
            .generate_batch(DifficultyLevel::Advanced, 6)
            .await
            .unwrap();
        assert_eq!(ids.len(), 6);
        queue.close().await;

        let exercises: Vec<_> = queue.subscribe().collect().await;
        assert_eq!(exercises.len(), 6);
        for exercise in &exercises {
            assert_eq!(exercise.level, DifficultyLevel::Advanced);
            assert_eq!(exercise.time_limit_secs, 60);
            assert!(DifficultyLevel::Advanced.exercise_types().contains(&exercise.kind));
            assert!(ids.contains(&exercise.id));
        }
    }

    #[tokio::test]
    async fn batch_larger_than_queue_completes_with_a_consumer() {
        let (generator, queue) = generator(2);
        let consumer = {
            let mut stream = queue.subscribe();
            tokio::spawn(async move {
                let mut seen = 0;
                while stream.next().await.is_some() {
                    seen += 1;
                }
                seen
            })
        };

        generator
            .generate_batch(DifficultyLevel::Beginner, 10)
            .await
            .unwrap();
        queue.close().await;
        assert_eq!(consumer.await.unwrap(), 10);
    }

    #[tokio::test]
    async fn missing_templates_fail_the_batch() {
        let templates = Arc::new(InMemoryTemplateStore::empty(&StoreConfig::no_latency()));
        let queue = Arc::new(ExerciseQueue::new(&QueueConfig::default()));
        let generator = ExerciseGenerator::new(templates, queue);

        let err = generator
            .generate_batch(DifficultyLevel::Intermediate, 3)
            .await
            .unwrap_err();
        assert!(matches!(err, LexioError::TemplateNotFound(_)));
    }
}

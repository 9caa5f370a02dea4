//! Per-student progress tracking.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use lexio_core::{EvaluationResult, LexioError, Result, StudentAggregate};
use lexio_sync::KeyedMutexRegistry;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::evaluation::ResultFeed;
use crate::store::AggregateStore;

pub struct ProgressionService {
    store: Arc<dyn AggregateStore>,
    students: KeyedMutexRegistry<String>,
}

impl ProgressionService {
    pub fn new(store: Arc<dyn AggregateStore>) -> Self {
        Self {
            store,
            students: KeyedMutexRegistry::new(),
        }
    }

    /// Fold one evaluation result into the student's aggregate.
    ///
    /// Load, update and store run under the student's key lock, so
    /// concurrent results for the same student are never lost.
    pub async fn record_result(&self, result: &EvaluationResult) -> Result<StudentAggregate> {
        let student_id = result.student_id.clone();
        self.students
            .with_lock(student_id.clone(), || async {
                let mut aggregate = self
                    .store
                    .get(&student_id)
                    .await?
                    .unwrap_or_else(|| StudentAggregate::new(student_id.clone()));
                aggregate.record(result.is_correct);
                self.store.put(aggregate.clone()).await?;
                debug!(
                    %student_id,
                    attempts = aggregate.attempts,
                    correct = aggregate.correct,
                    "progress updated"
                );
                Ok::<_, LexioError>(aggregate)
            })
            .await
    }

    pub async fn student_progress(&self, student_id: &str) -> Result<Option<StudentAggregate>> {
        self.store.get(student_id).await
    }

    pub async fn all_progress(&self) -> Result<Vec<StudentAggregate>> {
        self.store.all().await
    }

    /// Apply every result from an evaluation feed until the feed closes.
    ///
    /// Results are applied concurrently; only results for the same student
    /// queue behind each other, on that student's key lock. The returned
    /// task finishes once the feed has ended and every update is stored.
    pub fn spawn_listener(self: Arc<Self>, results: ResultFeed) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("progression listener started");
            let recorded = AtomicUsize::new(0);
            let feed = futures::stream::unfold(results, |mut rx| async move {
                rx.recv().await.map(|result| (result, rx))
            });
            feed.for_each_concurrent(None, |result| {
                let service = &self;
                let recorded = &recorded;
                async move {
                    match service.record_result(&result).await {
                        Ok(_) => {
                            recorded.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(err) => {
                            error!(student_id = %result.student_id, error = %err, "failed to record result");
                        }
                    }
                }
            })
            .await;
            info!(
                recorded = recorded.load(Ordering::Relaxed),
                "progression listener stopped"
            );
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryAggregateStore;
    use chrono::Utc;
    use lexio_core::config::StoreConfig;
    use tokio::sync::mpsc;
    use tokio::time::{Duration, Instant};

    fn result(student: &str, is_correct: bool) -> EvaluationResult {
        EvaluationResult {
            student_id: student.into(),
            exercise_id: "ex-1".into(),
            is_correct,
            feedback: String::new(),
            evaluated_at: Utc::now(),
        }
    }

    fn slow_store() -> Arc<InMemoryAggregateStore> {
        Arc::new(InMemoryAggregateStore::new(&StoreConfig {
            template_latency_ms: 0,
            student_read_latency_ms: 10,
            student_write_latency_ms: 10,
        }))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_results_for_one_student_are_all_counted() {
        let service = Arc::new(ProgressionService::new(slow_store()));

        let updates = (0..10).map(|i| {
            let service = service.clone();
            tokio::spawn(async move { service.record_result(&result("s1", i % 2 == 0)).await })
        });
        for update in futures::future::join_all(updates).await {
            update.unwrap().unwrap();
        }

        let progress = service.student_progress("s1").await.unwrap().unwrap();
        assert_eq!(progress.attempts, 10);
        assert_eq!(progress.correct, 5);
        assert_eq!(progress.incorrect, 5);
    }

    #[tokio::test]
    async fn listener_applies_feed_until_closed() {
        let service = Arc::new(ProgressionService::new(slow_store()));
        let (feed, receiver) = mpsc::channel(16);
        let listener = service.clone().spawn_listener(receiver);

        feed.send(result("s1", true)).await.unwrap();
        feed.send(result("s2", false)).await.unwrap();
        feed.send(result("s1", false)).await.unwrap();
        drop(feed);
        listener.await.unwrap();

        let all = service.all_progress().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!((all[0].student_id.as_str(), all[0].attempts), ("s1", 2));
        assert_eq!((all[1].student_id.as_str(), all[1].incorrect), ("s2", 1));
    }

    #[tokio::test]
    async fn listener_keeps_every_result_of_a_small_feed() {
        let service = Arc::new(ProgressionService::new(slow_store()));
        let (feed, receiver) = mpsc::channel(2);
        let listener = service.clone().spawn_listener(receiver);

        // Far more results than the feed holds at once.
        for i in 0..40 {
            let student = format!("s{}", i % 4);
            feed.send(result(&student, i % 3 == 0)).await.unwrap();
        }
        drop(feed);
        listener.await.unwrap();

        let all = service.all_progress().await.unwrap();
        assert_eq!(all.len(), 4);
        assert_eq!(all.iter().map(|s| s.attempts).sum::<u64>(), 40);
        assert_eq!(all.iter().map(|s| s.correct).sum::<u64>(), 14);
    }

    #[tokio::test(start_paused = true)]
    async fn listener_updates_distinct_students_in_parallel() {
        // 10ms read + 10ms write per update.
        let service = Arc::new(ProgressionService::new(slow_store()));
        let (feed, receiver) = mpsc::channel(32);
        for i in 0..10 {
            feed.send(result(&format!("s{i}"), true)).await.unwrap();
        }
        drop(feed);

        let started = Instant::now();
        service.clone().spawn_listener(receiver).await.unwrap();
        // One at a time would take 200ms.
        assert!(started.elapsed() < Duration::from_millis(100));
        assert_eq!(service.all_progress().await.unwrap().len(), 10);
    }
}

//! Persistence collaborators consumed by the services.

mod students;
mod templates;

use std::time::Duration;

use async_trait::async_trait;
use lexio_core::{DifficultyLevel, ExerciseTemplate, ExerciseType, Result, StudentAggregate};

pub use students::InMemoryAggregateStore;
pub use templates::InMemoryTemplateStore;

/// Read-only exercise catalogue. Safe under unbounded concurrent reads.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<ExerciseTemplate>>;

    async fn templates_for(
        &self,
        level: DifficultyLevel,
        kind: ExerciseType,
    ) -> Result<Vec<ExerciseTemplate>>;

    async fn all(&self) -> Result<Vec<ExerciseTemplate>>;
}

/// Student aggregate persistence.
///
/// `get` and `put` are independent calls with no atomicity between them.
/// Callers serialise read-modify-write per student themselves.
#[async_trait]
pub trait AggregateStore: Send + Sync {
    async fn get(&self, student_id: &str) -> Result<Option<StudentAggregate>>;

    async fn put(&self, aggregate: StudentAggregate) -> Result<()>;

    async fn all(&self) -> Result<Vec<StudentAggregate>>;
}

async fn simulate_latency(millis: u64) {
    if millis > 0 {
        tokio::time::sleep(Duration::from_millis(millis)).await;
    }
}

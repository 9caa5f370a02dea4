use std::collections::HashMap;

use async_trait::async_trait;
use lexio_core::config::StoreConfig;
use lexio_core::{Result, StudentAggregate};
use parking_lot::RwLock;
use tracing::debug;

use super::{simulate_latency, AggregateStore};

/// Aggregate store held in memory.
///
/// Reads and writes each pause for their configured latency, which leaves
/// a window between a `get` and the following `put` of the same student.
pub struct InMemoryAggregateStore {
    students: RwLock<HashMap<String, StudentAggregate>>,
    read_latency_ms: u64,
    write_latency_ms: u64,
}

impl InMemoryAggregateStore {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            students: RwLock::new(HashMap::new()),
            read_latency_ms: config.student_read_latency_ms,
            write_latency_ms: config.student_write_latency_ms,
        }
    }
}

#[async_trait]
impl AggregateStore for InMemoryAggregateStore {
    async fn get(&self, student_id: &str) -> Result<Option<StudentAggregate>> {
        simulate_latency(self.read_latency_ms).await;
        Ok(self.students.read().get(student_id).cloned())
    }

    async fn put(&self, aggregate: StudentAggregate) -> Result<()> {
        simulate_latency(self.write_latency_ms).await;
        debug!(student_id = %aggregate.student_id, attempts = aggregate.attempts, "student updated");
        self.students
            .write()
            .insert(aggregate.student_id.clone(), aggregate);
        Ok(())
    }

    async fn all(&self) -> Result<Vec<StudentAggregate>> {
        simulate_latency(self.read_latency_ms).await;
        let mut all: Vec<_> = self.students.read().values().cloned().collect();
        all.sort_by(|a, b| a.student_id.cmp(&b.student_id));
        Ok(all)
    }
}

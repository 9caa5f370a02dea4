use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::thread::JoinHandle;

use lexio_core::config::PoolConfig;
use lexio_sync::Mutex;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::PoolError;
use crate::worker::{TaskHandler, WorkerCommand, WorkerEvent, WorkerHandle};

type Reply<O> = oneshot::Sender<Result<O, PoolError>>;
type Factory<H> = Arc<dyn Fn() -> H + Send + Sync>;

/// Point-in-time view of the pool, for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Live worker threads.
    pub workers: usize,
    pub busy: usize,
    /// Submitted tasks waiting for an idle worker.
    pub queued: usize,
    pub in_flight: usize,
    pub completed: u64,
    pub failed: u64,
    pub restarts: u64,
}

struct PendingTask<I, O> {
    task_id: Uuid,
    input: I,
    reply: Reply<O>,
}

struct InFlight<O> {
    worker: usize,
    reply: Reply<O>,
}

struct WorkerSlot<I> {
    handle: Option<WorkerHandle<I>>,
    /// Task currently assigned; `Some` iff the worker is busy.
    current: Option<Uuid>,
}

impl<I> WorkerSlot<I> {
    fn is_idle(&self) -> bool {
        self.handle.is_some() && self.current.is_none()
    }
}

/// Everything the dispatcher mutates. Only touched under `Shared::state`.
struct PoolState<H: TaskHandler> {
    slots: Vec<WorkerSlot<H::Input>>,
    queue: VecDeque<PendingTask<H::Input, H::Output>>,
    in_flight: HashMap<Uuid, InFlight<H::Output>>,
    /// Sender handed to (re)spawned workers; dropped on shutdown so the
    /// supervisor loop can end.
    events: Option<mpsc::UnboundedSender<WorkerEvent<H::Output>>>,
    shut_down: bool,
    completed: u64,
    failed: u64,
    restarts: u64,
}

struct Shared<H: TaskHandler> {
    state: Mutex<PoolState<H>>,
    factory: Factory<H>,
}

/// Fixed-size pool of worker threads running `H`.
pub struct WorkerPool<H: TaskHandler> {
    shared: Arc<Shared<H>>,
    supervisor: parking_lot::Mutex<Option<task::JoinHandle<()>>>,
}

impl<H: TaskHandler> WorkerPool<H> {
    /// Spawn `config.workers` threads, each with a handler from `factory`.
    ///
    /// Must be called from within a tokio runtime; the supervisor runs as a
    /// task on it.
    pub fn start<F>(config: &PoolConfig, factory: F) -> Result<Self, PoolError>
    where
        F: Fn() -> H + Send + Sync + 'static,
    {
        let size = config.workers.max(1);
        let factory: Factory<H> = Arc::new(factory);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let mut slots = Vec::with_capacity(size);
        for slot in 0..size {
            let handle = WorkerHandle::spawn(slot, factory(), events_tx.clone())?;
            slots.push(WorkerSlot {
                handle: Some(handle),
                current: None,
            });
        }

        let shared = Arc::new(Shared {
            state: Mutex::new(PoolState {
                slots,
                queue: VecDeque::new(),
                in_flight: HashMap::new(),
                events: Some(events_tx),
                shut_down: false,
                completed: 0,
                failed: 0,
                restarts: 0,
            }),
            factory,
        });

        let supervisor = tokio::spawn(supervise(Arc::clone(&shared), events_rx));
        info!(workers = size, "worker pool started");

        Ok(Self {
            shared,
            supervisor: parking_lot::Mutex::new(Some(supervisor)),
        })
    }

    /// Run `input` on the next idle worker and wait for its own result.
    ///
    /// Dropping the returned future does not cancel the task; its result
    /// is discarded when it arrives.
    pub async fn submit(&self, input: H::Input) -> Result<H::Output, PoolError> {
        let task_id = Uuid::new_v4();
        let (reply, result) = oneshot::channel();
        {
            let mut state = self.shared.state.lock().await;
            if state.shut_down {
                return Err(PoolError::ShutDown);
            }
            if state.live_workers() == 0 {
                return Err(PoolError::NoWorkers);
            }
            state.queue.push_back(PendingTask {
                task_id,
                input,
                reply,
            });
            debug!(%task_id, queued = state.queue.len(), "task submitted");
            state.dispatch(&self.shared.factory);
        }
        result.await.unwrap_or(Err(PoolError::ShutDown))
    }

    pub async fn stats(&self) -> PoolStats {
        let state = self.shared.state.lock().await;
        PoolStats {
            workers: state.live_workers(),
            busy: state.slots.iter().filter(|s| s.current.is_some()).count(),
            queued: state.queue.len(),
            in_flight: state.in_flight.len(),
            completed: state.completed,
            failed: state.failed,
            restarts: state.restarts,
        }
    }

    /// Number of live workers.
    pub async fn size(&self) -> usize {
        self.shared.state.lock().await.live_workers()
    }

    /// Stop the pool.
    ///
    /// Queued tasks are rejected with [`PoolError::ShutDown`]. Tasks already
    /// running finish and resolve normally before their workers exit.
    pub async fn shutdown(&self) {
        let threads = {
            let mut state = self.shared.state.lock().await;
            if state.shut_down {
                return;
            }
            state.shut_down = true;
            state.events = None;

            let rejected = state.queue.len();
            for task in state.queue.drain(..) {
                let _ = task.reply.send(Err(PoolError::ShutDown));
            }
            info!(rejected, in_flight = state.in_flight.len(), "worker pool shutting down");

            state
                .slots
                .iter_mut()
                .filter_map(|slot| slot.handle.take())
                .map(WorkerHandle::terminate)
                .collect::<Vec<_>>()
        };

        for thread in threads {
            join_worker(thread).await;
        }

        let supervisor = self.supervisor.lock().take();
        if let Some(supervisor) = supervisor {
            if let Err(err) = supervisor.await {
                error!(error = %err, "pool supervisor ended abnormally");
            }
        }
        info!("worker pool stopped");
    }
}

impl<H: TaskHandler> Drop for WorkerPool<H> {
    fn drop(&mut self) {
        // Without the supervisor nothing holds the worker command senders, so
        // idle threads see their inbox close and exit.
        if let Some(supervisor) = self.supervisor.get_mut().take() {
            supervisor.abort();
        }
    }
}

impl<H: TaskHandler> PoolState<H> {
    fn live_workers(&self) -> usize {
        self.slots.iter().filter(|s| s.handle.is_some()).count()
    }

    /// Assign queued tasks to idle workers, oldest task first.
    fn dispatch(&mut self, factory: &Factory<H>) {
        while !self.queue.is_empty() {
            let Some(worker) = self.slots.iter().position(WorkerSlot::is_idle) else {
                break;
            };
            let Some(task) = self.queue.pop_front() else {
                break;
            };

            let slot = &mut self.slots[worker];
            let Some(handle) = slot.handle.as_ref() else {
                self.queue.push_front(task);
                break;
            };
            let command = WorkerCommand::Run {
                task_id: task.task_id,
                input: task.input,
            };
            match handle.send(command) {
                Ok(()) => {
                    slot.current = Some(task.task_id);
                    self.in_flight.insert(
                        task.task_id,
                        InFlight {
                            worker,
                            reply: task.reply,
                        },
                    );
                    debug!(task_id = %task.task_id, worker, "task dispatched");
                }
                Err(command) => {
                    // Thread is gone without reporting a fault: requeue the
                    // task and put a fresh worker in the slot.
                    warn!(worker, "worker inbox closed, requeueing task");
                    slot.handle = None;
                    if let WorkerCommand::Run { task_id, input } = command {
                        self.queue.push_front(PendingTask {
                            task_id,
                            input,
                            reply: task.reply,
                        });
                    }
                    if self.respawn(worker, factory) {
                        self.restarts += 1;
                    } else {
                        self.reject_if_unstaffed();
                    }
                }
            }
        }
    }
}

async fn supervise<H: TaskHandler>(
    shared: Arc<Shared<H>>,
    mut events: mpsc::UnboundedReceiver<WorkerEvent<H::Output>>,
) {
    while let Some(event) = events.recv().await {
        let mut state = shared.state.lock().await;
        match event {
            WorkerEvent::Completed {
                worker,
                task_id,
                output,
            } => {
                state.finish(worker, task_id, Ok(output));
            }
            WorkerEvent::Failed {
                worker,
                task_id,
                reason,
            } => {
                warn!(worker, %task_id, %reason, "task failed");
                state.finish(worker, task_id, Err(PoolError::Task { task_id, reason }));
            }
            WorkerEvent::Fault {
                worker,
                task_id,
                reason,
            } => {
                error!(worker, %task_id, %reason, "worker fault");
                state.finish(
                    worker,
                    task_id,
                    Err(PoolError::WorkerFault {
                        worker,
                        task_id,
                        reason,
                    }),
                );
                state.restart(worker, &shared.factory);
            }
        }
        state.dispatch(&shared.factory);
    }
    debug!("pool supervisor finished");
}

impl<H: TaskHandler> PoolState<H> {
    /// Resolve the task by its id and free the worker it ran on.
    fn finish(&mut self, worker: usize, task_id: Uuid, result: Result<H::Output, PoolError>) {
        if let Some(slot) = self.slots.get_mut(worker) {
            if slot.current == Some(task_id) {
                slot.current = None;
            } else {
                warn!(worker, %task_id, "result for a task the worker was not assigned");
            }
        }

        let Some(flight) = self.in_flight.remove(&task_id) else {
            warn!(worker, %task_id, "result for unknown task");
            return;
        };
        if flight.worker != worker {
            warn!(worker, assigned = flight.worker, %task_id, "task resolved by another worker");
        }

        if result.is_ok() {
            self.completed += 1;
        } else {
            self.failed += 1;
        }
        if flight.reply.send(result).is_err() {
            debug!(%task_id, "submitter gone, result discarded");
        }
    }

    /// Replace the worker in `worker`'s slot with a fresh thread.
    fn restart(&mut self, worker: usize, factory: &Factory<H>) {
        if let Some(old) = self.slots.get_mut(worker).and_then(|s| s.handle.take()) {
            task::spawn(join_worker(old.terminate()));
        }
        if self.shut_down {
            return;
        }
        if self.respawn(worker, factory) {
            self.restarts += 1;
            warn!(worker, restarts = self.restarts, "worker restarted");
        } else {
            self.reject_if_unstaffed();
        }
    }

    /// With every slot empty nothing would ever run the queue, so fail it.
    fn reject_if_unstaffed(&mut self) {
        if self.shut_down || self.live_workers() > 0 {
            return;
        }
        let rejected = self.queue.len();
        for task in self.queue.drain(..) {
            let _ = task.reply.send(Err(PoolError::NoWorkers));
        }
        error!(rejected, "no live workers left, rejecting queued tasks");
    }

    fn respawn(&mut self, worker: usize, factory: &Factory<H>) -> bool {
        let Some(events) = self.events.clone() else {
            return false;
        };
        let Some(slot) = self.slots.get_mut(worker) else {
            return false;
        };
        match WorkerHandle::spawn(worker, factory(), events) {
            Ok(handle) => {
                slot.handle = Some(handle);
                slot.current = None;
                true
            }
            Err(err) => {
                error!(worker, error = %err, "failed to respawn worker");
                false
            }
        }
    }
}

async fn join_worker(thread: JoinHandle<()>) {
    match task::spawn_blocking(move || thread.join()).await {
        Ok(Ok(())) => {}
        Ok(Err(_)) => warn!("worker thread panicked outside a task"),
        Err(err) => warn!(error = %err, "failed to join worker thread"),
    }
}

//! Worker threads and the messages they exchange with the supervisor.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::PoolError;

/// Logic run inside a worker thread.
///
/// Each worker owns its own handler. Returning `Err` fails only the current
/// task; panicking counts as a worker fault and gets the worker replaced.
pub trait TaskHandler: Send + 'static {
    type Input: Send + 'static;
    type Output: Send + 'static;

    fn handle(&mut self, input: Self::Input) -> Result<Self::Output, String>;
}

/// Supervisor -> worker.
#[derive(Debug)]
pub enum WorkerCommand<I> {
    Run { task_id: Uuid, input: I },
    Terminate,
}

/// Worker -> supervisor.
#[derive(Debug)]
pub enum WorkerEvent<O> {
    Completed {
        worker: usize,
        task_id: Uuid,
        output: O,
    },
    Failed {
        worker: usize,
        task_id: Uuid,
        reason: String,
    },
    /// The handler panicked. The thread exits right after sending this.
    Fault {
        worker: usize,
        task_id: Uuid,
        reason: String,
    },
}

/// Supervisor-side handle to one running worker thread.
pub(crate) struct WorkerHandle<I> {
    commands: mpsc::UnboundedSender<WorkerCommand<I>>,
    thread: JoinHandle<()>,
}

impl<I: Send + 'static> WorkerHandle<I> {
    pub(crate) fn spawn<H>(
        slot: usize,
        handler: H,
        events: mpsc::UnboundedSender<WorkerEvent<H::Output>>,
    ) -> Result<Self, PoolError>
    where
        H: TaskHandler<Input = I>,
    {
        let (commands, inbox) = mpsc::unbounded_channel();
        let thread = thread::Builder::new()
            .name(format!("lexio-worker-{slot}"))
            .spawn(move || run_worker(slot, handler, inbox, events))?;
        Ok(Self { commands, thread })
    }

    /// Hand a task to the thread. Gives the command back if the thread is gone.
    pub(crate) fn send(&self, command: WorkerCommand<I>) -> Result<(), WorkerCommand<I>> {
        self.commands.send(command).map_err(|err| err.0)
    }

    /// Ask the thread to stop once its current task is done.
    pub(crate) fn terminate(self) -> JoinHandle<()> {
        let _ = self.commands.send(WorkerCommand::Terminate);
        self.thread
    }
}

fn run_worker<H: TaskHandler>(
    slot: usize,
    mut handler: H,
    mut inbox: mpsc::UnboundedReceiver<WorkerCommand<H::Input>>,
    events: mpsc::UnboundedSender<WorkerEvent<H::Output>>,
) {
    debug!(worker = slot, "worker started");
    while let Some(command) = inbox.blocking_recv() {
        let (task_id, input) = match command {
            WorkerCommand::Run { task_id, input } => (task_id, input),
            WorkerCommand::Terminate => break,
        };

        let event = match panic::catch_unwind(AssertUnwindSafe(|| handler.handle(input))) {
            Ok(Ok(output)) => WorkerEvent::Completed {
                worker: slot,
                task_id,
                output,
            },
            Ok(Err(reason)) => WorkerEvent::Failed {
                worker: slot,
                task_id,
                reason,
            },
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                let _ = events.send(WorkerEvent::Fault {
                    worker: slot,
                    task_id,
                    reason,
                });
                return;
            }
        };

        if events.send(event).is_err() {
            warn!(worker = slot, "supervisor gone, stopping worker");
            return;
        }
    }
    debug!(worker = slot, "worker stopped");
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "worker panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Doubler;

    impl TaskHandler for Doubler {
        type Input = i64;
        type Output = i64;

        fn handle(&mut self, input: i64) -> Result<i64, String> {
            match input {
                i if i < 0 => Err(format!("negative input {i}")),
                0 => panic!("zero is not allowed"),
                i => Ok(i * 2),
            }
        }
    }

    #[test]
    fn panic_message_reads_str_and_string_payloads() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");

        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(payload.as_ref()), "worker panicked");
    }

    #[test]
    fn worker_reports_each_outcome() {
        let (events_tx, mut events) = mpsc::unbounded_channel();
        let handle = WorkerHandle::spawn(7, Doubler, events_tx).unwrap();

        let ok = Uuid::new_v4();
        let bad = Uuid::new_v4();
        handle.send(WorkerCommand::Run { task_id: ok, input: 21 }).unwrap();
        handle.send(WorkerCommand::Run { task_id: bad, input: -1 }).unwrap();

        match events.blocking_recv() {
            Some(WorkerEvent::Completed { worker, task_id, output }) => {
                assert_eq!((worker, task_id, output), (7, ok, 42));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        match events.blocking_recv() {
            Some(WorkerEvent::Failed { task_id, reason, .. }) => {
                assert_eq!(task_id, bad);
                assert!(reason.contains("negative"));
            }
            other => panic!("unexpected event: {other:?}"),
        }

        handle.terminate().join().unwrap();
        assert!(events.blocking_recv().is_none());
    }

    #[test]
    fn panicking_handler_reports_fault_and_exits() {
        let (events_tx, mut events) = mpsc::unbounded_channel();
        let handle = WorkerHandle::spawn(0, Doubler, events_tx).unwrap();

        let task_id = Uuid::new_v4();
        handle.send(WorkerCommand::Run { task_id, input: 0 }).unwrap();

        match events.blocking_recv() {
            Some(WorkerEvent::Fault { worker, task_id: id, reason }) => {
                assert_eq!((worker, id), (0, task_id));
                assert!(reason.contains("zero"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        handle.terminate().join().unwrap();
    }
}

//! # Task Queue and Worker
//!
//! Plans are queued by the telecommand server and executed strictly in
//! order by a single background worker, the only thread commanding the arm
//! during normal operation.
//!
//! Worker states: `Idle -> Homing -> ExecutingPlan -> Homing -> Idle`, with
//! `ExecutingPlan -> Stopped -> Homing` whenever a stop is observed. The arm
//! is always sent home after a plan, however the plan ended.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::tc::Step;
use log::{debug, error, info, warn};
use serde::Serialize;
use std::{
    io,
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        mpsc::{channel, Receiver, RecvTimeoutError, Sender},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::{
    arm_ctrl::{ArmCtrl, ArmCtrlError, StepOutcome},
    safety::StopFlag,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A plan accepted into the queue. Never modified once queued.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plan {
    /// Sequence number assigned on enqueue.
    pub id: u64,

    pub steps: Vec<Step>,
}

/// Producer side of the queue. Enqueueing never blocks.
#[derive(Clone)]
pub struct PlanSender {
    sender: Arc<Mutex<Option<Sender<Plan>>>>,

    queued: Arc<AtomicUsize>,

    next_id: Arc<AtomicU64>,

    closed: Arc<AtomicBool>,
}

/// Consumer side of the queue, owned by the worker.
pub struct PlanReceiver {
    receiver: Receiver<Plan>,

    queued: Arc<AtomicUsize>,

    closed: Arc<AtomicBool>,
}

/// Executes queued plans on the arm.
pub struct Worker {
    arm: Arc<ArmCtrl>,

    stop: StopFlag,

    queue: PlanReceiver,

    poll_period: Duration,

    state: WorkerState,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum QueueError {
    #[error("A plan must contain at least one step")]
    EmptyPlan,

    #[error("The plan queue has been closed")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Homing,
    ExecutingPlan,
    Stopped,
}

/// How a plan ended.
#[derive(Debug)]
pub enum PlanOutcome {
    /// Every step was executed.
    Completed,

    /// A stop was observed during step `at_step`, it and every later step
    /// were abandoned.
    Aborted { at_step: usize },

    /// Step `at_step` could not be executed. The plan is dropped, never
    /// retried.
    Failed { at_step: usize, error: ArmCtrlError },
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Create a new unbounded plan queue.
pub fn plan_queue() -> (PlanSender, PlanReceiver) {
    let (tx, rx) = channel();
    let queued = Arc::new(AtomicUsize::new(0));
    let closed = Arc::new(AtomicBool::new(false));

    (
        PlanSender {
            sender: Arc::new(Mutex::new(Some(tx))),
            queued: queued.clone(),
            next_id: Arc::new(AtomicU64::new(0)),
            closed: closed.clone(),
        },
        PlanReceiver {
            receiver: rx,
            queued,
            closed,
        },
    )
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl PlanSender {
    /// Add a plan to the back of the queue, returning it.
    pub fn enqueue(&self, steps: Vec<Step>) -> Result<Plan, QueueError> {
        if steps.is_empty() {
            return Err(QueueError::EmptyPlan);
        }

        let guard = self.sender.lock().map_err(|_| QueueError::Closed)?;
        let sender = guard.as_ref().ok_or(QueueError::Closed)?;

        let plan = Plan {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            steps,
        };

        // Count first so the worker can never decrement below zero
        self.queued.fetch_add(1, Ordering::SeqCst);
        if sender.send(plan.clone()).is_err() {
            self.queued.fetch_sub(1, Ordering::SeqCst);
            return Err(QueueError::Closed);
        }

        Ok(plan)
    }

    /// Number of plans waiting to be executed.
    pub fn len(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Close the queue. No more plans are accepted, and plans still waiting
    /// are dropped the next time the worker polls.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);

        if let Ok(mut guard) = self.sender.lock() {
            guard.take();
        }
    }
}

impl PlanReceiver {
    /// Wait up to `timeout` for the next plan.
    ///
    /// Returns `Ok(None)` on timeout and `Err(QueueError::Closed)` once the
    /// queue is closed. Plans still waiting when the queue closes are
    /// dropped.
    pub fn poll(&self, timeout: Duration) -> Result<Option<Plan>, QueueError> {
        if self.closed.load(Ordering::SeqCst) {
            let dropped = self.receiver.try_iter().count();
            self.queued.fetch_sub(dropped, Ordering::SeqCst);

            if dropped > 0 {
                warn!("Plan queue closed, dropped {} waiting plan(s)", dropped);
            }

            return Err(QueueError::Closed);
        }

        match self.receiver.recv_timeout(timeout) {
            Ok(plan) => {
                self.queued.fetch_sub(1, Ordering::SeqCst);
                Ok(Some(plan))
            }
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(QueueError::Closed),
        }
    }
}

impl Worker {
    pub fn new(arm: Arc<ArmCtrl>, stop: StopFlag, queue: PlanReceiver, poll_period: Duration) -> Self {
        Self {
            arm,
            stop,
            queue,
            poll_period,
            state: WorkerState::Idle,
        }
    }

    /// Run the worker on its own thread.
    pub fn spawn(self) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(String::from("arm_worker"))
            .spawn(move || self.run())
    }

    /// Home the arm, then execute plans until the queue is closed.
    pub fn run(mut self) {
        info!("Worker started");

        self.go_home();
        self.set_state(WorkerState::Idle);

        loop {
            let plan = match self.queue.poll(self.poll_period) {
                Ok(Some(p)) => p,
                Ok(None) => continue,
                Err(_) => break,
            };

            match self.exec_plan(&plan) {
                PlanOutcome::Completed => info!("Plan {} complete", plan.id),
                PlanOutcome::Aborted { at_step } => {
                    warn!("Plan {} abandoned at step {}", plan.id, at_step)
                }
                PlanOutcome::Failed { at_step, error } => error!(
                    "Plan {} dropped after step {} failed: {}",
                    plan.id, at_step, error
                ),
            }
        }

        info!("Plan queue closed, worker exiting");
    }

    /// Execute every step of a plan in order, then home the arm.
    ///
    /// Execution stops at the first step that is aborted or fails.
    pub fn exec_plan(&mut self, plan: &Plan) -> PlanOutcome {
        info!("Executing plan {} ({} steps)", plan.id, plan.steps.len());
        self.set_state(WorkerState::ExecutingPlan);

        let mut outcome = PlanOutcome::Completed;

        for (index, step) in plan.steps.iter().enumerate() {
            if self.stop.is_stopped() {
                outcome = PlanOutcome::Aborted { at_step: index };
                break;
            }

            match self.arm.exec_step(step, &self.stop) {
                Ok(StepOutcome::Completed) => (),
                Ok(StepOutcome::Aborted) => {
                    outcome = PlanOutcome::Aborted { at_step: index };
                    break;
                }
                Err(error) => {
                    outcome = PlanOutcome::Failed {
                        at_step: index,
                        error,
                    };
                    break;
                }
            }
        }

        if let PlanOutcome::Aborted { .. } = outcome {
            self.set_state(WorkerState::Stopped);
        }

        self.go_home();
        self.set_state(WorkerState::Idle);

        outcome
    }

    /// Best effort homing, a failure is logged and not retried.
    fn go_home(&mut self) -> bool {
        self.set_state(WorkerState::Homing);

        match self.arm.home() {
            Ok(()) => true,
            Err(e) => {
                error!("Could not home the arm: {}", e);
                false
            }
        }
    }

    fn set_state(&mut self, state: WorkerState) {
        if state != self.state {
            debug!("Worker {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::tc::Action;

    #[test]
    fn test_queue_fifo() {
        let (tx, rx) = plan_queue();

        for x in 0..5 {
            tx.enqueue(vec![Step::new(Action::Pick, x as f64, 20.0)])
                .unwrap();
        }
        assert_eq!(tx.len(), 5);

        for x in 0..5 {
            let plan = rx.poll(Duration::from_millis(10)).unwrap().unwrap();
            assert_eq!(plan.id, x);
            assert_eq!(plan.steps[0].x, Some(x as f64));
        }
        assert!(tx.is_empty());
        assert_eq!(rx.poll(Duration::from_millis(1)), Ok(None));
    }

    #[test]
    fn test_queue_rejects_empty_and_closed() {
        let (tx, rx) = plan_queue();

        assert_eq!(tx.enqueue(Vec::new()), Err(QueueError::EmptyPlan));

        tx.enqueue(vec![Step::new(Action::Give, 0.0, 20.0)]).unwrap();
        tx.close();
        assert_eq!(
            tx.enqueue(vec![Step::new(Action::Give, 0.0, 20.0)]),
            Err(QueueError::Closed)
        );

        // Waiting plans are dropped once the queue is closed
        assert_eq!(rx.poll(Duration::from_millis(10)), Err(QueueError::Closed));
        assert!(tx.is_empty());
    }
}

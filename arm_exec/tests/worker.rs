//! Plan execution through the worker, against a recording port.

use arm_lib::{
    arm_ctrl::{solve_angles_deg, ArmCtrl, ArmCtrlError, ArmParams},
    safety::SafetyCtrl,
    serial_link::{LinkPort, SerialLink},
    task_queue::{plan_queue, Plan, PlanOutcome, PlanSender, Worker},
};
use comms_if::{
    eqpt::arm::JointDem,
    tc::{Action, SafetyState, Step},
};
use std::{
    io,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    thread,
    time::{Duration, Instant},
};

// ------------------------------------------------------------------------------------------------
// HELPERS
// ------------------------------------------------------------------------------------------------

type FrameHook = Box<dyn FnMut() + Send>;

/// Records every frame written to it.
///
/// A hook can be run once a given number of frames have been recorded, and
/// writes can be made to fail once or for good.
#[derive(Clone, Default)]
struct RecordingPort {
    frames: Arc<Mutex<Vec<JointDem>>>,
    hook: Arc<Mutex<Option<(usize, FrameHook)>>>,
    fail_at: Arc<Mutex<Option<usize>>>,
    dead: Arc<AtomicBool>,
    attempts: Arc<AtomicUsize>,
}

impl LinkPort for RecordingPort {
    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if self.dead.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"));
        }

        let mut frames = self.frames.lock().unwrap();

        let mut fail_at = self.fail_at.lock().unwrap();
        if *fail_at == Some(frames.len()) {
            *fail_at = None;
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged"));
        }

        frames.push(std::str::from_utf8(frame).unwrap().parse().unwrap());

        if let Some((n, hook)) = &mut *self.hook.lock().unwrap() {
            if frames.len() == *n {
                hook();
            }
        }

        Ok(())
    }
}

impl RecordingPort {
    fn take(&self) -> Vec<JointDem> {
        std::mem::take(&mut *self.frames.lock().unwrap())
    }

    fn on_frame<F: FnMut() + Send + 'static>(&self, n: usize, hook: F) {
        *self.hook.lock().unwrap() = Some((n, Box::new(hook)));
    }

    /// Block until `n` frames have been recorded.
    fn wait_for(&self, n: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while self.frames.lock().unwrap().len() < n {
            assert!(Instant::now() < deadline, "Timed out waiting for {} frames", n);
            thread::sleep(Duration::from_millis(1));
        }
    }
}

struct Rig {
    arm: Arc<ArmCtrl>,
    safety: SafetyCtrl,
    port: RecordingPort,
    queue: PlanSender,
    worker: Worker,
}

fn rig() -> Rig {
    let port = RecordingPort::default();
    let link = Arc::new(SerialLink::from_port("test".into(), port.clone()));
    let arm = Arc::new(ArmCtrl::new(ArmParams::default().without_delays(), link).unwrap());
    let safety = SafetyCtrl::new(arm.clone());
    let (queue, rx) = plan_queue();
    let worker = Worker::new(arm.clone(), safety.flag(), rx, Duration::from_millis(1));

    Rig {
        arm,
        safety,
        port,
        queue,
        worker,
    }
}

fn home() -> Vec<JointDem> {
    vec![
        JointDem::new(4, 40),
        JointDem::new(3, -70),
        JointDem::new(2, 150),
        JointDem::new(1, 0),
        JointDem::new(0, 0),
    ]
}

fn ik(arm: &ArmCtrl, x: f64, z: f64) -> Vec<JointDem> {
    solve_angles_deg(arm.params(), z, x)
        .unwrap()
        .joint_dems()
        .collect()
}

/// Lift, descend, lift.
fn step_frames(arm: &ArmCtrl, x: f64, z: f64) -> Vec<JointDem> {
    let safe = arm.params().safe_height_cm;
    [ik(arm, x, safe), ik(arm, x, z), ik(arm, x, safe)].concat()
}

fn plan(id: u64, steps: Vec<Step>) -> Plan {
    Plan { id, steps }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[test]
fn test_pick_then_place_homes_before_and_after() {
    let r = rig();
    let worker = r.worker.spawn().unwrap();

    r.queue
        .enqueue(vec![
            Step::new(Action::Pick, 10.0, 20.0),
            Step::new(Action::Place, -10.0, 25.0),
        ])
        .unwrap();

    let safe = r.arm.params().safe_height_cm;
    let expected = [
        home(),
        // Pick: lift, descend, lift
        ik(&r.arm, 10.0, safe),
        ik(&r.arm, 10.0, 20.0),
        ik(&r.arm, 10.0, safe),
        // Place: lift, descend, lift
        ik(&r.arm, -10.0, safe),
        ik(&r.arm, -10.0, 25.0),
        ik(&r.arm, -10.0, safe),
        home(),
    ]
    .concat();

    r.port.wait_for(expected.len());
    r.queue.close();
    worker.join().unwrap();

    assert_eq!(r.port.take(), expected);
}

#[test]
fn test_plans_run_in_submission_order() {
    let r = rig();
    let worker = r.worker.spawn().unwrap();

    r.queue
        .enqueue(vec![Step::new(Action::Pick, -5.0, 15.0)])
        .unwrap();
    r.queue
        .enqueue(vec![Step::new(Action::Pick, 5.0, 15.0)])
        .unwrap();

    let expected = [
        home(),
        step_frames(&r.arm, -5.0, 15.0),
        home(),
        step_frames(&r.arm, 5.0, 15.0),
        home(),
    ]
    .concat();

    r.port.wait_for(expected.len());
    r.queue.close();
    worker.join().unwrap();

    assert_eq!(r.port.take(), expected);
}

#[test]
fn test_close_finishes_current_plan_and_drops_the_rest() {
    let r = rig();

    for x in [-5.0, 0.0, 5.0].iter() {
        r.queue
            .enqueue(vec![Step::new(Action::Pick, *x, 15.0)])
            .unwrap();
    }

    // Close two frames into the first plan
    let queue = r.queue.clone();
    r.port.on_frame(5 + 2, move || queue.close());

    r.worker.spawn().unwrap().join().unwrap();

    let expected = [home(), step_frames(&r.arm, -5.0, 15.0), home()].concat();

    assert_eq!(r.port.take(), expected);
    assert!(r.queue.is_empty());
}

#[test]
fn test_stop_mid_plan_finishes_segment_then_homes() {
    let r = rig();

    // Startup home, the whole pick, then two frames into the place lift
    let flag = r.safety.flag();
    r.port.on_frame(5 + 12 + 2, move || flag.set());

    let worker = r.worker.spawn().unwrap();

    r.queue
        .enqueue(vec![
            Step::new(Action::Pick, 5.0, 15.0),
            Step::new(Action::Place, -5.0, 25.0),
        ])
        .unwrap();

    let safe = r.arm.params().safe_height_cm;
    let expected = [
        home(),
        step_frames(&r.arm, 5.0, 15.0),
        ik(&r.arm, -5.0, safe),
        home(),
    ]
    .concat();

    r.port.wait_for(expected.len());
    r.queue.close();
    worker.join().unwrap();

    assert_eq!(r.port.take(), expected);
    assert_eq!(r.safety.state(), SafetyState::Stopped);
}

#[test]
fn test_stop_persists_until_reset() {
    let mut r = rig();

    r.safety.stop().unwrap();
    assert_eq!(r.port.take(), home());

    let outcome = r
        .worker
        .exec_plan(&plan(0, vec![Step::new(Action::Pick, 0.0, 15.0)]));
    assert!(matches!(outcome, PlanOutcome::Aborted { at_step: 0 }));
    assert_eq!(r.port.take(), home());

    assert_eq!(r.safety.reset(), SafetyState::Stopped);

    let outcome = r
        .worker
        .exec_plan(&plan(1, vec![Step::new(Action::Pick, 0.0, 15.0)]));
    assert!(matches!(outcome, PlanOutcome::Completed));
    assert_eq!(
        r.port.take(),
        [step_frames(&r.arm, 0.0, 15.0), home()].concat()
    );
}

#[test]
fn test_transport_failure_drops_plan_and_worker_continues() {
    let mut r = rig();

    // Second frame of the first step fails
    *r.port.fail_at.lock().unwrap() = Some(1);

    let outcome = r.worker.exec_plan(&plan(
        0,
        vec![
            Step::new(Action::Pick, 0.0, 15.0),
            Step::new(Action::Place, 0.0, 25.0),
        ],
    ));

    match outcome {
        PlanOutcome::Failed { at_step, error } => {
            assert_eq!(at_step, 0);
            assert!(matches!(error, ArmCtrlError::Link(_)));
        }
        o => panic!("Expected failure, got {:?}", o),
    }

    // One frame made it before the failure, then the arm was homed
    let sent = r.port.take();
    assert_eq!(sent.len(), 1 + 5);
    assert_eq!(sent[1..], home()[..]);

    let outcome = r
        .worker
        .exec_plan(&plan(1, vec![Step::new(Action::Pick, 0.0, 15.0)]));
    assert!(matches!(outcome, PlanOutcome::Completed));
    assert_eq!(
        r.port.take(),
        [step_frames(&r.arm, 0.0, 15.0), home()].concat()
    );
}

#[test]
fn test_dead_link_homing_attempted_once() {
    let mut r = rig();
    r.port.dead.store(true, Ordering::SeqCst);

    let outcome = r
        .worker
        .exec_plan(&plan(0, vec![Step::new(Action::Pick, 0.0, 15.0)]));
    assert!(matches!(
        outcome,
        PlanOutcome::Failed {
            at_step: 0,
            error: ArmCtrlError::Link(_)
        }
    ));

    // The failed lift, then a single homing attempt which fails on its first
    // frame
    assert_eq!(r.port.attempts.load(Ordering::SeqCst), 2);

    let outcome = r
        .worker
        .exec_plan(&plan(1, vec![Step::new(Action::Pick, 0.0, 15.0)]));
    assert!(matches!(outcome, PlanOutcome::Failed { at_step: 0, .. }));
    assert_eq!(r.port.attempts.load(Ordering::SeqCst), 4);
    assert!(r.port.take().is_empty());
}

#[test]
fn test_worker_keeps_polling_with_dead_link() {
    let r = rig();
    r.port.dead.store(true, Ordering::SeqCst);

    let worker = r.worker.spawn().unwrap();

    r.queue
        .enqueue(vec![Step::new(Action::Pick, 0.0, 15.0)])
        .unwrap();

    // Startup homing, then the plan's lift and its homing, one write each
    let deadline = Instant::now() + Duration::from_secs(5);
    while r.port.attempts.load(Ordering::SeqCst) < 3 {
        assert!(Instant::now() < deadline, "Worker stopped polling");
        thread::sleep(Duration::from_millis(1));
    }

    r.queue.close();
    worker.join().unwrap();

    assert_eq!(r.port.attempts.load(Ordering::SeqCst), 3);
    assert!(r.queue.is_empty());
}

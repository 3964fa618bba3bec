use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use super::{recorder, ExecLog};
use crate::{Kernel, KernelConfig, TaskId, TaskLogic, TaskState};

const DEFERRED: KernelConfig = KernelConfig::new().run_immediately(false);

fn identity(state: TaskState) -> TaskState {
    state
}

#[test]
fn late_poll_releases_once() {
    let log = ExecLog::new();
    let kernel: Kernel<4> = Kernel::new(DEFERRED);
    kernel.init(1);
    let id = kernel.add_task(0, 2, recorder(0, &log)).unwrap();

    // Seven ticks cross the deadline three times without a poll.
    for _ in 0..7 {
        kernel.tick_isr();
    }
    assert_eq!(kernel.ready_set().len(), 1);
    assert_eq!(kernel.task(id).unwrap().elapsed, 7);

    kernel.poll();
    assert_eq!(log.events().len(), 1);
    assert_eq!(kernel.task(id).unwrap().elapsed, 0);

    // Next deadline is measured from the dispatch, not the missed one.
    kernel.tick_isr();
    kernel.poll();
    assert_eq!(log.events().len(), 1);

    kernel.tick_isr();
    kernel.poll();
    assert_eq!(log.events().len(), 2);
}

#[test]
fn poll_without_ready_tasks_is_a_no_op() {
    let log = ExecLog::new();
    let kernel: Kernel<4> = Kernel::new(DEFERRED);
    kernel.init(1);
    kernel.add_task(0, 10, recorder(0, &log)).unwrap();

    kernel.poll();
    kernel.tick_isr();
    kernel.poll();

    assert!(log.events().is_empty());
}

/// Simulates timer interrupts that fire while the task itself is executing
struct Reentrant {
    kernel: &'static Kernel<4>,
    id: TaskId,
    runs: AtomicU32,
    was_running: AtomicBool,
}

impl TaskLogic for Reentrant {
    fn tick(&self, state: TaskState) -> TaskState {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let info = self.kernel.task(self.id).unwrap();
        self.was_running.store(info.running, Ordering::SeqCst);

        for _ in 0..3 {
            self.kernel.tick_isr();
        }
        assert!(!self.kernel.ready_set().contains(self.id));
        state
    }
}

#[test]
fn running_task_is_not_marked_ready() {
    let kernel: &'static Kernel<4> = Box::leak(Box::new(Kernel::<4>::new(DEFERRED)));
    kernel.init(1);

    let logic: &'static Reentrant = Box::leak(Box::new(Reentrant {
        kernel,
        id: TaskId::new(0),
        runs: AtomicU32::new(0),
        was_running: AtomicBool::new(false),
    }));
    let id = kernel.add_task(0, 1, Some(logic)).unwrap();
    assert_eq!(id, TaskId::new(0));

    kernel.tick_isr();
    kernel.poll();

    assert_eq!(logic.runs.load(Ordering::SeqCst), 1);
    assert!(logic.was_running.load(Ordering::SeqCst));
    assert!(!kernel.task(id).unwrap().running);
    assert!(kernel.ready_set().is_empty());

    // Ticks seen while running still count toward the next release.
    assert_eq!(kernel.task(id).unwrap().elapsed, 3);
    kernel.tick_isr();
    assert!(kernel.ready_set().contains(id));
}

/// Low-priority task whose run makes a higher-priority task ready
struct Raiser {
    kernel: &'static Kernel<4>,
    log: Arc<ExecLog>,
}

impl TaskLogic for Raiser {
    fn tick(&self, state: TaskState) -> TaskState {
        self.log.record(1);
        self.kernel.tick_isr();
        state
    }
}

#[test]
fn higher_priority_ready_mid_drain_runs_in_same_poll() {
    let log = ExecLog::new();
    let kernel: &'static Kernel<4> = Box::leak(Box::new(Kernel::<4>::new(DEFERRED)));
    kernel.init(1);

    let high = kernel.add_task(0, 2, recorder(0, &log)).unwrap();
    let raiser: &'static Raiser = Box::leak(Box::new(Raiser {
        kernel,
        log: Arc::clone(&log),
    }));
    let low = kernel.add_task(0, 1, Some(raiser)).unwrap();

    kernel.tick_isr();
    assert!(!kernel.ready_set().contains(high));
    assert!(kernel.ready_set().contains(low));

    kernel.poll();

    assert_eq!(log.order(), vec![1, 0]);
    assert!(kernel.ready_set().is_empty());
}

#[test]
fn elapsed_saturates() {
    let kernel: Kernel<4> = Kernel::new(DEFERRED.saturate_elapsed(true));
    kernel.init(1);
    let id = kernel.add_task(0, u32::MAX, Some(&identity)).unwrap();

    kernel.set_elapsed(id, u32::MAX - 1);
    kernel.tick_isr();
    assert_eq!(kernel.task(id).unwrap().elapsed, u32::MAX);
    assert!(kernel.ready_set().contains(id));

    kernel.tick_isr();
    kernel.tick_isr();
    assert_eq!(kernel.task(id).unwrap().elapsed, u32::MAX);
    assert_eq!(kernel.ready_set().len(), 1);
}

#[test]
fn elapsed_wraps_when_not_saturating() {
    let kernel: Kernel<4> = Kernel::new(DEFERRED.saturate_elapsed(false));
    kernel.init(1);
    let id = kernel.add_task(0, 5, Some(&identity)).unwrap();

    kernel.set_elapsed(id, u32::MAX);
    kernel.tick_isr();

    assert_eq!(kernel.task(id).unwrap().elapsed, 0);
    assert!(!kernel.ready_set().contains(id));
}

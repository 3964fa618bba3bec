use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::{Kernel, TaskLogic, TaskState};

mod dispatch;

/// Dispatch log shared by the recording tasks of one test
#[derive(Default)]
struct ExecLog {
    now: AtomicU32,
    events: Mutex<Vec<(u32, u8)>>,
}

impl ExecLog {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn record(&self, task: u8) {
        let tick = self.now.load(Ordering::SeqCst);
        self.events.lock().unwrap().push((tick, task));
    }

    fn events(&self) -> Vec<(u32, u8)> {
        self.events.lock().unwrap().clone()
    }

    fn order(&self) -> Vec<u8> {
        self.events().into_iter().map(|(_, task)| task).collect()
    }
}

struct Recorder {
    task: u8,
    log: Arc<ExecLog>,
}

impl TaskLogic for Recorder {
    fn tick(&self, state: TaskState) -> TaskState {
        self.log.record(self.task);
        state + 1
    }
}

fn recorder(task: u8, log: &Arc<ExecLog>) -> Option<&'static dyn TaskLogic> {
    let logic: &'static Recorder = Box::leak(Box::new(Recorder {
        task,
        log: Arc::clone(log),
    }));
    Some(logic)
}

/// Emulate the timer interrupt followed by the main-loop poll
fn drive<const N: usize>(kernel: &Kernel<N>, log: &ExecLog, ticks: u32) {
    for i in 0..ticks {
        log.now.store(i + 1, Ordering::SeqCst);
        kernel.tick_isr();
        kernel.poll();
    }
}

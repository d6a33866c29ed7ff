//! Cooperative per-tick job scheduler.
//!
//! Jobs are named closures invoked once per simulation tick until they
//! return `false`. Names are unique: registering under a live name replaces
//! the previous job. The host loop drives the scheduler through
//! [`Scheduler::tick`], once per frame for the default phase and once per
//! physics step for the `Physics` phase.
//!
//! Reentrancy rules: jobs registered from inside a running closure are
//! deferred to the next tick; cancellation takes effect immediately, even
//! for a job later in the current tick's order. A panicking closure is
//! caught at the job boundary, logged, and removed without disturbing the
//! other jobs.

use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};

use smallvec::SmallVec;

use crate::config::SimConfig;
use crate::context::SimTime;
use crate::events::EventBus;
use crate::grab::GrabManager;
use crate::host::{BehaviorGraph, HostWorld};
use crate::store::EntityStore;

/// Which host tick source a job runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdatePhase {
    #[default]
    Update,
    Physics,
}

/// Everything a job closure may touch. Scheduler mutations made through
/// `jobs` are deferred per the reentrancy rules above.
pub struct JobCtx<'a> {
    pub store: &'a mut EntityStore,
    pub grabs: &'a mut GrabManager,
    pub host: &'a mut dyn HostWorld,
    pub graph: &'a mut dyn BehaviorGraph,
    pub config: &'a SimConfig,
    pub time: &'a SimTime,
    pub events: &'a mut EventBus,
    pub jobs: &'a mut SchedulerQueue,
}

/// Borrowed collaborators handed to [`Scheduler::tick`] each frame.
pub struct TickData<'a> {
    pub store: &'a mut EntityStore,
    pub grabs: &'a mut GrabManager,
    pub host: &'a mut dyn HostWorld,
    pub graph: &'a mut dyn BehaviorGraph,
    pub config: &'a SimConfig,
    pub time: &'a SimTime,
    pub events: &'a mut EventBus,
}

pub type JobClosure = Box<dyn FnMut(&mut JobCtx) -> bool>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobEnd {
    Completed,
    Cancelled,
    Expired,
    Panicked,
}

struct Job {
    name: String,
    phase: UpdatePhase,
    once: bool,
    /// Absolute simulation-time deadline for `run_for` jobs.
    expires_at: Option<f64>,
    finished: Option<JobEnd>,
    closure: JobClosure,
}

enum QueueOp {
    Register(Job),
    Cancel(String),
    SetPhase(String, UpdatePhase),
}

/// Deferred command surface exposed to running closures. Operations are
/// applied after the current tick finishes iterating, except that a
/// cancelled name is suppressed for the remainder of the tick.
#[derive(Default)]
pub struct SchedulerQueue {
    ops: SmallVec<[QueueOp; 4]>,
    suppressed: HashSet<String>,
    now: f64,
}

impl SchedulerQueue {
    pub fn run(&mut self, name: impl Into<String>, closure: impl FnMut(&mut JobCtx) -> bool + 'static) {
        let name = name.into();
        // The previous holder of the name must not run again this tick.
        self.suppressed.insert(name.clone());
        self.ops.push(QueueOp::Register(Job::recurring(name, Box::new(closure))));
    }

    pub fn run_once(&mut self, name: impl Into<String>, closure: impl FnMut(&mut JobCtx) -> bool + 'static) {
        let name = name.into();
        self.suppressed.insert(name.clone());
        let mut job = Job::recurring(name, Box::new(closure));
        job.once = true;
        self.ops.push(QueueOp::Register(job));
    }

    pub fn run_for(
        &mut self,
        name: impl Into<String>,
        duration_seconds: f64,
        closure: impl FnMut(&mut JobCtx) -> bool + 'static,
    ) {
        let name = name.into();
        self.suppressed.insert(name.clone());
        let mut job = Job::recurring(name, Box::new(closure));
        job.expires_at = Some(self.now + duration_seconds);
        self.ops.push(QueueOp::Register(job));
    }

    pub fn cancel(&mut self, name: &str) {
        self.suppressed.insert(name.to_string());
        self.ops.push(QueueOp::Cancel(name.to_string()));
    }

    pub fn set_update_phase(&mut self, name: &str, phase: UpdatePhase) {
        self.ops.push(QueueOp::SetPhase(name.to_string(), phase));
    }
}

impl Job {
    fn recurring(name: String, closure: JobClosure) -> Self {
        Self { name, phase: UpdatePhase::default(), once: false, expires_at: None, finished: None, closure }
    }
}

#[derive(Default)]
pub struct Scheduler {
    jobs: Vec<Job>,
    queue: SchedulerQueue,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a recurring job on the default phase. Replaces any live job
    /// under the same name.
    pub fn run(&mut self, name: impl Into<String>, closure: impl FnMut(&mut JobCtx) -> bool + 'static) {
        let name = name.into();
        self.remove(&name, JobEnd::Cancelled);
        self.queue.suppressed.remove(&name);
        self.jobs.push(Job::recurring(name, Box::new(closure)));
    }

    /// Like [`Scheduler::run`], but the closure is invoked at most once.
    pub fn run_once(&mut self, name: impl Into<String>, closure: impl FnMut(&mut JobCtx) -> bool + 'static) {
        let name = name.into();
        self.remove(&name, JobEnd::Cancelled);
        self.queue.suppressed.remove(&name);
        let mut job = Job::recurring(name, Box::new(closure));
        job.once = true;
        self.jobs.push(job);
    }

    /// Like [`Scheduler::run`], but force-terminated once elapsed simulation
    /// time exceeds `duration_seconds`, whatever the closure returns. The
    /// deadline is captured at registration.
    pub fn run_for(
        &mut self,
        name: impl Into<String>,
        duration_seconds: f64,
        closure: impl FnMut(&mut JobCtx) -> bool + 'static,
    ) {
        let name = name.into();
        self.remove(&name, JobEnd::Cancelled);
        self.queue.suppressed.remove(&name);
        let mut job = Job::recurring(name, Box::new(closure));
        job.expires_at = Some(self.queue.now + duration_seconds);
        self.jobs.push(job);
    }

    /// Idempotent removal; a cancelled job never runs again.
    pub fn cancel(&mut self, name: &str) {
        self.remove(name, JobEnd::Cancelled);
        self.queue.suppressed.insert(name.to_string());
        self.queue.ops.retain(|op| !matches!(op, QueueOp::Register(job) if job.name == name));
    }

    /// Move a job to another tick source. Scheduling channel only; no other
    /// semantics change.
    pub fn set_update_phase(&mut self, name: &str, phase: UpdatePhase) {
        for job in &mut self.jobs {
            if job.name == name {
                job.phase = phase;
            }
        }
        for op in &mut self.queue.ops {
            if let QueueOp::Register(job) = op {
                if job.name == name {
                    job.phase = phase;
                }
            }
        }
    }

    pub fn is_scheduled(&self, name: &str) -> bool {
        let mut live = self.jobs.iter().any(|job| job.name == name && job.finished.is_none())
            && !self.queue.suppressed.contains(name);
        for op in &self.queue.ops {
            match op {
                QueueOp::Register(job) if job.name == name => live = true,
                QueueOp::Cancel(cancelled) if cancelled == name => live = false,
                _ => {}
            }
        }
        live
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    pub fn clear(&mut self) {
        self.jobs.clear();
        self.queue.ops.clear();
        self.queue.suppressed.clear();
    }

    /// Run every job of `phase` that was registered before this tick began.
    pub fn tick(&mut self, phase: UpdatePhase, data: TickData) {
        self.queue.now = data.time.elapsed;
        self.apply_queue();

        let TickData { store, grabs, host, graph, config, time, events } = data;
        let queue = &mut self.queue;
        let snapshot = self.jobs.len();
        for job in self.jobs.iter_mut().take(snapshot) {
            if job.phase != phase || job.finished.is_some() {
                continue;
            }
            if queue.suppressed.contains(&job.name) {
                continue;
            }
            if let Some(deadline) = job.expires_at {
                if time.elapsed > deadline {
                    job.finished = Some(JobEnd::Expired);
                    continue;
                }
            }
            let mut ctx = JobCtx {
                store: &mut *store,
                grabs: &mut *grabs,
                host: &mut *host,
                graph: &mut *graph,
                config,
                time,
                events: &mut *events,
                jobs: &mut *queue,
            };
            match catch_unwind(AssertUnwindSafe(|| (job.closure)(&mut ctx))) {
                Ok(keep_running) => {
                    if job.once || !keep_running {
                        job.finished = Some(JobEnd::Completed);
                    }
                }
                Err(_) => {
                    log::warn!("job '{}' panicked; terminating it", job.name);
                    job.finished = Some(JobEnd::Panicked);
                }
            }
        }

        self.reap();
        self.apply_queue();
    }

    fn remove(&mut self, name: &str, end: JobEnd) {
        self.jobs.retain(|job| {
            if job.name == name {
                log::debug!("job '{}' ended: {:?}", job.name, end);
                false
            } else {
                true
            }
        });
    }

    fn reap(&mut self) {
        self.jobs.retain(|job| match job.finished {
            Some(end) => {
                log::debug!("job '{}' ended: {:?}", job.name, end);
                false
            }
            None => true,
        });
    }

    fn apply_queue(&mut self) {
        let ops = std::mem::take(&mut self.queue.ops);
        for op in ops {
            match op {
                QueueOp::Register(job) => {
                    self.remove(&job.name, JobEnd::Cancelled);
                    self.jobs.push(job);
                }
                QueueOp::Cancel(name) => self.remove(&name, JobEnd::Cancelled),
                QueueOp::SetPhase(name, phase) => {
                    for job in &mut self.jobs {
                        if job.name == name {
                            job.phase = phase;
                        }
                    }
                }
            }
        }
        self.queue.suppressed.clear();
    }
}

//! Burn worker pool
//!
//! Each worker is an OS thread that is either parked on its [`Handoff`]
//! (idle, no CPU) or spinning on [`burn_once`] while its active flag is
//! set. The controller fans `start_burn` / `stop_burn` out to every worker;
//! nothing it does ever waits on worker progress except `shutdown`.

use crate::burn::burn_once;
use crate::error::{Error, Result};
use crate::handoff::Handoff;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// What a worker is doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    /// Spawned, not yet in its run loop
    Starting = 0,
    /// Parked on its handoff
    Idle = 1,
    /// Spinning on burn slices
    Burning = 2,
    /// Run loop exited
    Terminated = 3,
}

impl WorkerState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => WorkerState::Idle,
            2 => WorkerState::Burning,
            3 => WorkerState::Terminated,
            _ => WorkerState::Starting,
        }
    }
}

/// Point-in-time counters for one worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerStats {
    pub index: usize,
    pub state: WorkerState,
    /// Burn slices executed since the pool started
    pub slices: u64,
    /// Wall time spent in completed burn phases
    pub busy: Duration,
    /// CPU time consumed by the worker thread, when the platform exposes it
    pub cpu_time: Option<Duration>,
}

/// State shared between the controller and one worker.
///
/// `active` and `terminate` are written only by the controller.
struct WorkerShared {
    active: AtomicBool,
    terminate: AtomicBool,
    handoff: Handoff,
    state: AtomicU8,
    slices: AtomicU64,
    busy_nanos: AtomicU64,
    /// Final thread CPU time, recorded by the worker on exit
    exit_cpu_nanos: AtomicU64,
}

impl WorkerShared {
    fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
            terminate: AtomicBool::new(false),
            handoff: Handoff::new(),
            state: AtomicU8::new(WorkerState::Starting as u8),
            slices: AtomicU64::new(0),
            busy_nanos: AtomicU64::new(0),
            exit_cpu_nanos: AtomicU64::new(u64::MAX),
        }
    }

    #[inline]
    fn set_state(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }
}

struct Worker {
    shared: Arc<WorkerShared>,
    handle: Option<JoinHandle<()>>,
}

/// Fixed-size pool of burn workers
pub struct WorkerPool {
    workers: Vec<Worker>,
}

impl WorkerPool {
    /// Spawn `size` workers and wait until every one of them is parked in
    /// its run loop.
    ///
    /// A pool that cannot reach full size is torn down and reported as an
    /// error; there is no partially started pool.
    pub fn new(size: usize) -> Result<Self> {
        Self::with_entry(size, run_worker)
    }

    fn with_entry(size: usize, entry: WorkerEntry) -> Result<Self> {
        if size == 0 {
            return Err(Error::EmptyPool);
        }

        let (ready_tx, ready_rx) = mpsc::channel();
        let mut pool = WorkerPool {
            workers: Vec::with_capacity(size),
        };

        for index in 0..size {
            let shared = Arc::new(WorkerShared::new());
            let worker_shared = Arc::clone(&shared);
            let ready = ready_tx.clone();

            let handle = thread::Builder::new()
                .name(format!("toaster-worker-{}", index))
                .spawn(move || entry(index, &worker_shared, ready))
                .map_err(|source| Error::WorkerSpawn { index, source })?;

            pool.workers.push(Worker {
                shared,
                handle: Some(handle),
            });
        }
        drop(ready_tx);

        // every worker drops its sender after reporting, so a dead worker
        // ends the recv loop instead of hanging it
        let mut ready = 0;
        while ready < size {
            match ready_rx.recv() {
                Ok(index) => {
                    debug!("worker {} ready", index);
                    ready += 1;
                }
                Err(_) => {
                    return Err(Error::WorkerStartup {
                        ready,
                        expected: size,
                    })
                }
            }
        }

        info!("started {} burn worker(s)", size);
        Ok(pool)
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Set every worker's active flag and wake it. Does not wait for the
    /// workers to actually start burning.
    pub fn start_burn(&self) {
        for worker in &self.workers {
            worker.shared.active.store(true, Ordering::Relaxed);
            worker.shared.handoff.post();
        }
    }

    /// Clear every worker's active flag. Workers notice within one slice.
    pub fn stop_burn(&self) {
        for worker in &self.workers {
            worker.shared.active.store(false, Ordering::Relaxed);
        }
    }

    /// Number of workers currently parked
    pub fn idle_count(&self) -> usize {
        self.workers
            .iter()
            .filter(|w| w.shared.state() == WorkerState::Idle)
            .count()
    }

    /// Snapshot of every worker's counters, CPU time read live
    pub fn stats(&self) -> Vec<WorkerStats> {
        self.workers
            .iter()
            .enumerate()
            .map(|(index, worker)| {
                let cpu_time = worker
                    .handle
                    .as_ref()
                    .and_then(live_cpu_time)
                    .or_else(|| exit_cpu_time(&worker.shared));
                snapshot(index, &worker.shared, cpu_time)
            })
            .collect()
    }

    /// Terminate and join every worker, returning their final counters.
    ///
    /// Safe whether or not a burn is in progress: active flags are cleared
    /// before the wake, so a burning worker falls out of its spin loop,
    /// consumes the wake and exits.
    pub fn shutdown(mut self) -> Vec<WorkerStats> {
        self.terminate();
        self.workers
            .iter()
            .enumerate()
            .map(|(index, worker)| snapshot(index, &worker.shared, exit_cpu_time(&worker.shared)))
            .collect()
    }

    fn terminate(&mut self) {
        for worker in &self.workers {
            worker.shared.terminate.store(true, Ordering::Release);
            worker.shared.active.store(false, Ordering::Relaxed);
            worker.shared.handoff.post();
        }

        let mut joined = 0;
        for (index, worker) in self.workers.iter_mut().enumerate() {
            if let Some(handle) = worker.handle.take() {
                if handle.join().is_err() {
                    warn!("worker {} panicked", index);
                }
                joined += 1;
            }
        }
        if joined > 0 {
            info!("stopped {} burn worker(s)", joined);
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Body of a worker thread: report ready on the sender, then run
type WorkerEntry = fn(usize, &WorkerShared, Sender<usize>);

fn run_worker(index: usize, shared: &WorkerShared, ready: Sender<usize>) {
    shared.set_state(WorkerState::Idle);
    let _ = ready.send(index);
    drop(ready);

    loop {
        shared.handoff.wait();

        if shared.terminate.load(Ordering::Acquire) {
            break;
        }
        // permit left over from a start that raced with the previous stop
        if !shared.active.load(Ordering::Relaxed) {
            continue;
        }

        shared.set_state(WorkerState::Burning);
        let started = Instant::now();
        while shared.active.load(Ordering::Relaxed) {
            burn_once();
            shared.slices.fetch_add(1, Ordering::Relaxed);
        }
        let busy = started.elapsed().as_nanos() as u64;
        shared.busy_nanos.fetch_add(busy, Ordering::Relaxed);
        shared.set_state(WorkerState::Idle);
    }

    if let Some(cpu) = thread_cpu_time() {
        shared
            .exit_cpu_nanos
            .store(cpu.as_nanos() as u64, Ordering::Relaxed);
    }
    shared.set_state(WorkerState::Terminated);
}

fn snapshot(index: usize, shared: &WorkerShared, cpu_time: Option<Duration>) -> WorkerStats {
    WorkerStats {
        index,
        state: shared.state(),
        slices: shared.slices.load(Ordering::Relaxed),
        busy: Duration::from_nanos(shared.busy_nanos.load(Ordering::Relaxed)),
        cpu_time,
    }
}

fn exit_cpu_time(shared: &WorkerShared) -> Option<Duration> {
    match shared.exit_cpu_nanos.load(Ordering::Relaxed) {
        u64::MAX => None,
        nanos => Some(Duration::from_nanos(nanos)),
    }
}

fn timespec_to_duration(ts: &libc::timespec) -> Duration {
    Duration::new(ts.tv_sec as u64, ts.tv_nsec as u32)
}

/// CPU time of the calling thread
fn thread_cpu_time() -> Option<Duration> {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // SAFETY: ts is a valid, writable timespec
    let rc = unsafe { libc::clock_gettime(libc::CLOCK_THREAD_CPUTIME_ID, &mut ts) };
    (rc == 0).then(|| timespec_to_duration(&ts))
}

/// CPU time of a running worker, read from the controller thread
#[cfg(target_os = "linux")]
fn live_cpu_time(handle: &JoinHandle<()>) -> Option<Duration> {
    use std::os::unix::thread::JoinHandleExt;

    if handle.is_finished() {
        return None;
    }
    let mut clock: libc::clockid_t = 0;
    // SAFETY: the thread has not been joined, so its pthread_t is valid
    let rc = unsafe { libc::pthread_getcpuclockid(handle.as_pthread_t(), &mut clock) };
    if rc != 0 {
        return None;
    }
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // SAFETY: ts is a valid, writable timespec
    let rc = unsafe { libc::clock_gettime(clock, &mut ts) };
    (rc == 0).then(|| timespec_to_duration(&ts))
}

#[cfg(not(target_os = "linux"))]
fn live_cpu_time(_handle: &JoinHandle<()>) -> Option<Duration> {
    None
}

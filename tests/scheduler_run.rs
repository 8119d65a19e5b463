//! End-to-end wait/burn runs.

use std::io::{self, Write};
use std::thread;
use std::time::{Duration, Instant};
use toaster::{
    BurnScheduler, EntropyError, EntropySource, Error, IntervalSpec, PhaseKind, PhaseWriter,
    RandomIntervalGenerator, SchedulerConfig, StopCondition, StopToken, WorkerPool,
};

fn fixed(wait: u64, burn: u64, stop: StopCondition) -> SchedulerConfig {
    SchedulerConfig {
        wait: IntervalSpec::fixed(wait),
        burn: IntervalSpec::fixed(burn),
        stop,
    }
}

#[test]
fn three_fixed_iterations() {
    let pool = WorkerPool::new(2).unwrap();
    let mut scheduler =
        BurnScheduler::new(fixed(0, 100, StopCondition::Iterations(3)), StopToken::new())
            .unwrap();

    let mut seen = Vec::new();
    let summary = scheduler
        .run(&pool, |phase| seen.push((*phase, Instant::now())))
        .unwrap();
    let finished = Instant::now();

    let lines: Vec<String> = seen
        .iter()
        .map(|(p, _)| {
            let line = p.to_string();
            line.split_once(' ').unwrap().1.to_string()
        })
        .collect();
    assert_eq!(lines, ["W 0", "B 100", "W 0", "B 100", "W 0", "B 100"]);

    // each burn lasts until the next phase starts, or the run returns
    for (i, (phase, at)) in seen.iter().enumerate() {
        if phase.kind != PhaseKind::Burn {
            continue;
        }
        let end = seen.get(i + 1).map(|(_, t)| *t).unwrap_or(finished);
        assert!(end - *at >= Duration::from_millis(100));
    }

    for pair in seen.windows(2) {
        assert!(pair[0].0.timestamp <= pair[1].0.timestamp);
    }

    assert_eq!(summary.iterations, 3);
    assert_eq!(summary.waited_ms, 0);
    assert_eq!(summary.burned_ms, 300);
    assert!(!summary.cancelled);

    for s in pool.stats() {
        assert!(s.slices > 0, "worker {} never burned", s.index);
    }
}

#[test]
fn random_durations_stay_in_range() {
    let pool = WorkerPool::new(1).unwrap();
    let config = SchedulerConfig {
        wait: IntervalSpec::new(0, 5).unwrap(),
        burn: IntervalSpec::new(1, 20).unwrap(),
        stop: StopCondition::Iterations(5),
    };
    let mut scheduler = BurnScheduler::new(config, StopToken::new()).unwrap();

    let mut phases = Vec::new();
    scheduler.run(&pool, |p| phases.push(*p)).unwrap();

    assert_eq!(phases.len(), 10);
    for p in &phases {
        match p.kind {
            PhaseKind::Wait => assert!(p.duration_ms <= 5),
            PhaseKind::Burn => assert!((1..=20).contains(&p.duration_ms)),
        }
    }
}

#[test]
fn cancel_interrupts_a_long_burn() {
    let pool = WorkerPool::new(2).unwrap();
    let stop = StopToken::new();
    let mut scheduler =
        BurnScheduler::new(fixed(0, 60_000, StopCondition::Forever), stop.clone()).unwrap();

    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(100));
        stop.cancel();
    });

    let start = Instant::now();
    let summary = scheduler.run(&pool, |_| {}).unwrap();
    assert!(start.elapsed() < Duration::from_secs(5));
    assert!(summary.cancelled);
    assert_eq!(summary.iterations, 0);
    canceller.join().unwrap();

    // the interrupted burn was still stopped
    let deadline = Instant::now() + Duration::from_secs(2);
    while pool.idle_count() < pool.size() {
        assert!(Instant::now() < deadline, "workers left burning");
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn cancel_interrupts_a_long_wait() {
    let pool = WorkerPool::new(1).unwrap();
    let stop = StopToken::new();
    let mut scheduler =
        BurnScheduler::new(fixed(60_000, 10, StopCondition::Forever), stop.clone()).unwrap();

    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        stop.cancel();
    });

    let mut phases = Vec::new();
    let summary = scheduler.run(&pool, |p| phases.push(p.kind)).unwrap();
    canceller.join().unwrap();

    assert!(summary.cancelled);
    assert_eq!(phases, [PhaseKind::Wait]);
    assert_eq!(pool.stats()[0].slices, 0);
}

/// Hands out one word for the startup draw, then fails for good
struct DiesAfterFirstDraw {
    drawn: bool,
}

impl EntropySource for DiesAfterFirstDraw {
    fn next_word(&mut self) -> Result<u64, EntropyError> {
        if self.drawn {
            return Err(EntropyError::Permanent("device removed".into()));
        }
        self.drawn = true;
        Ok(42)
    }
}

#[test]
fn entropy_loss_aborts_the_run() {
    let pool = WorkerPool::new(1).unwrap();
    let generator = RandomIntervalGenerator::with_source(DiesAfterFirstDraw { drawn: false }).unwrap();
    let config = SchedulerConfig {
        wait: IntervalSpec::new(0, 10).unwrap(),
        burn: IntervalSpec::new(0, 10).unwrap(),
        stop: StopCondition::Forever,
    };
    let mut scheduler = BurnScheduler::with_generator(config, generator, StopToken::new());

    let mut phases = 0;
    let result = scheduler.run(&pool, |_| phases += 1);
    assert!(matches!(result, Err(Error::Entropy(_))));
    assert_eq!(phases, 0);
}

/// Output whose reader has gone away
struct BrokenPipe;

impl Write for BrokenPipe {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::from(io::ErrorKind::BrokenPipe))
    }

    fn flush(&mut self) -> io::Result<()> {
        Err(io::Error::from(io::ErrorKind::BrokenPipe))
    }
}

#[test]
fn closed_output_ends_the_run() {
    let pool = WorkerPool::new(1).unwrap();
    let stop = StopToken::new();
    let on_failure = stop.clone();
    let mut scheduler =
        BurnScheduler::new(fixed(10_000, 10_000, StopCondition::Forever), stop).unwrap();

    let mut output = PhaseWriter::new(BrokenPipe);
    let start = Instant::now();
    let summary = scheduler
        .run(&pool, |phase| {
            if !output.write(phase) {
                on_failure.cancel();
            }
        })
        .unwrap();

    assert!(start.elapsed() < Duration::from_secs(5));
    assert!(summary.cancelled);
    assert_eq!(summary.iterations, 0);
    assert!(output.failed());
    assert_eq!(pool.stats()[0].slices, 0);
}

//! Property-based tests for throttling, task generation and persistence.

use proptest::prelude::*;
use std::time::Duration;
use tokio::time::Instant;

use pc_profiler::profiler::config::{TargetConfig, TaskMode};
use pc_profiler::profiler::log::{ExecutionLog, ExecutionSample};
use pc_profiler::profiler::persist::{read_samples, CsvPersister, LogPersister};
use pc_profiler::profiler::task::{Cycle, TaskGenerator, SUBJECT_NAME_LENGTH};
use pc_profiler::profiler::throttle::{Admission, ThrottleWindow, WINDOW};

fn admitted_times(max_ops: u32, gaps_ms: &[u64]) -> Vec<(Instant, Instant)> {
    let origin = Instant::now();
    let mut throttle = ThrottleWindow::new(max_ops, origin);
    let mut now = origin;
    let mut admitted = Vec::new();
    for gap in gaps_ms {
        now += Duration::from_millis(*gap);
        if throttle.try_admit(now) == Admission::Admitted {
            admitted.push((throttle.window_start(), now));
        }
    }
    admitted
}

proptest! {
    /// No window ever admits more than `max_ops` cycles, and every
    /// admission falls inside the window it was counted against.
    #[test]
    fn throttle_never_exceeds_cap_per_window(
        max_ops in 1u32..8,
        gaps_ms in prop::collection::vec(0u64..400, 1..200),
    ) {
        let admitted = admitted_times(max_ops, &gaps_ms);
        let mut i = 0;
        while i < admitted.len() {
            let window_start = admitted[i].0;
            let in_window = admitted[i..]
                .iter()
                .take_while(|(start, _)| *start == window_start)
                .count();
            prop_assert!(in_window as u32 <= max_ops);
            for (_, at) in &admitted[i..i + in_window] {
                prop_assert!(*at >= window_start);
                prop_assert!(*at < window_start + WINDOW);
            }
            i += in_window;
        }
    }

    /// Any one-second span sees at most two windows' worth of admissions.
    #[test]
    fn throttle_sliding_second_bound(
        max_ops in 1u32..8,
        gaps_ms in prop::collection::vec(0u64..400, 1..200),
    ) {
        let admitted = admitted_times(max_ops, &gaps_ms);
        for (_, from) in &admitted {
            let in_span = admitted
                .iter()
                .filter(|(_, at)| *at >= *from && *at < *from + WINDOW)
                .count();
            prop_assert!(in_span as u32 <= 2 * max_ops);
        }
    }

    /// A full window defers the next caller to exactly one window later.
    #[test]
    fn throttle_defers_to_window_end(max_ops in 1u32..20, offset_ms in 0u64..1000) {
        let origin = Instant::now();
        let mut throttle = ThrottleWindow::new(max_ops, origin);
        for _ in 0..max_ops {
            prop_assert_eq!(throttle.try_admit(origin), Admission::Admitted);
        }
        let later = origin + Duration::from_millis(offset_ms);
        prop_assert_eq!(throttle.try_admit(later), Admission::WaitUntil(origin + WINDOW));
    }

    /// Composite legs share their subject; pinned subjects are always used;
    /// generated subjects are 20 lowercase letters.
    #[test]
    fn generator_subject_invariants(
        mode in prop::sample::select(TaskMode::ALL.to_vec()),
        pinned in prop::option::of("[a-zA-Z]{1,12}"),
        cycles in 1usize..20,
    ) {
        let mut generator = TaskGenerator::new(TargetConfig {
            mode,
            subject_name: pinned.clone(),
            ..TargetConfig::default()
        });
        for _ in 0..cycles {
            let cycle = generator.next_cycle();
            if let Cycle::Composite { register, invoke } = &cycle {
                prop_assert_eq!(&register.subject_name, &invoke.subject_name);
            } else {
                prop_assert!(mode != TaskMode::RegisterAndInvoke);
            }
            for task in cycle.tasks() {
                match &pinned {
                    Some(name) => {
                        prop_assert_eq!(&task.subject_name, name);
                    }
                    None => {
                        prop_assert_eq!(task.subject_name.len(), SUBJECT_NAME_LENGTH);
                        prop_assert!(task.subject_name.chars().all(|c| c.is_ascii_lowercase()));
                    }
                }
            }
        }
        prop_assert_eq!(generator.cycles(), cycles as u64);
    }

    /// Rows read back from disk match the samples written, in order.
    #[test]
    fn persisted_rows_match_appends(latencies_ms in prop::collection::vec(0u64..120_000, 0..60)) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let log = ExecutionLog::new();
        for ms in &latencies_ms {
            prop_assert!(log.append(ExecutionSample::completed_now(Duration::from_millis(*ms))));
        }

        let persister = CsvPersister::new(&path);
        log.seal_and_flush(&persister).unwrap();

        let read = read_samples(&path).unwrap();
        prop_assert_eq!(read.len(), latencies_ms.len());
        for (sample, ms) in read.iter().zip(&latencies_ms) {
            let expected = Duration::from_millis(*ms);
            let diff = sample.response_time.abs_diff(expected);
            prop_assert!(diff <= Duration::from_micros(1), "{:?} vs {:?}", sample.response_time, expected);
        }
        prop_assert_eq!(persister.location(), path.display().to_string());
    }
}

#[test]
fn concurrent_appends_all_reach_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.csv");
    let log = ExecutionLog::new();

    let handles: Vec<_> = (0..16)
        .map(|t| {
            let log = log.clone();
            std::thread::spawn(move || {
                for i in 0..100 {
                    log.append(ExecutionSample::completed_now(Duration::from_micros(t * 1000 + i)));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    log.seal_and_flush(&CsvPersister::new(&path)).unwrap();
    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content.lines().next(), Some("Timestamp,ResponseTime"));
    assert_eq!(content.lines().count(), 1 + 1600);
}

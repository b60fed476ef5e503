//! Reading recorded metrics back in tests.
//!
//! Shared by the crate's unit tests and by `tests/common`, so it only depends
//! on `metrics`, `metrics-util` and std.
#![allow(dead_code)]

use std::collections::HashMap;

use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};

/// Run `register` against a private recorder and return a way to read it back.
pub fn recorded_with<T>(register: impl FnOnce() -> T) -> (T, Snapshotter) {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    let registered = metrics::with_local_recorder(&recorder, register);
    (registered, snapshotter)
}

/// Point-in-time view of recorded values.
///
/// `counter` sums across labels; `labeled_counter` picks one label value.
/// Taking a snapshot drains histogram samples from the recorder.
#[derive(Debug, Default)]
pub struct MetricsSnapshot {
    counters: HashMap<String, u64>,
    labeled: HashMap<(String, String, String), u64>,
    histograms: HashMap<String, usize>,
}

impl MetricsSnapshot {
    pub fn take(snapshotter: &Snapshotter) -> Self {
        let mut snapshot = Self::default();
        for (key, _, _, value) in snapshotter.snapshot().into_vec() {
            let name = key.key().name().to_string();
            match value {
                DebugValue::Counter(v) => {
                    for label in key.key().labels() {
                        let entry = (name.clone(), label.key().to_string(), label.value().to_string());
                        *snapshot.labeled.entry(entry).or_default() += v;
                    }
                    *snapshot.counters.entry(name).or_default() += v;
                }
                DebugValue::Histogram(samples) => {
                    *snapshot.histograms.entry(name).or_default() += samples.len()
                }
                DebugValue::Gauge(_) => {}
            }
        }
        snapshot
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    pub fn labeled_counter(&self, name: &str, label: &str, value: &str) -> u64 {
        self.labeled
            .get(&(name.to_string(), label.to_string(), value.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn histogram_samples(&self, name: &str) -> usize {
        self.histograms.get(name).copied().unwrap_or(0)
    }
}

//! Tick-based golden snapshot harness.
//!
//! Steps a small simulation for a fixed number of ticks, snapshots selected
//! state after each step and compares the report against a golden JSON file
//! (or rewrites it when `EMBER_UPDATE_SNAPSHOTS=1` is set).

use crate::snapshot::assert_json_snapshot;
use anyhow::Result;
use ember_core::SimTick;
use serde::Serialize;
use std::path::PathBuf;

/// Configuration for a tick snapshot test.
#[derive(Debug, Clone)]
pub struct TickSnapshotConfig {
    /// Name written into the report.
    pub name: String,
    /// Number of ticks to step (report includes the initial snapshot at tick 0).
    pub ticks: u64,
    /// Path to the golden JSON file.
    pub snapshot_path: PathBuf,
}

/// Single snapshot frame captured at a given tick.
#[derive(Debug, Clone, Serialize)]
pub struct TickFrame<S> {
    /// Tick number.
    pub tick: u64,
    /// Snapshot payload.
    pub snapshot: S,
}

/// Frames of one run, as written to the golden file.
#[derive(Debug, Clone, Serialize)]
pub struct TickReport<S> {
    /// Test name.
    pub name: String,
    /// One frame per tick, starting at tick 0.
    pub frames: Vec<TickFrame<S>>,
}

/// Step `state` and collect `ticks + 1` frames without touching disk.
pub fn record_ticks<State, Snapshot, StepFn, SnapFn>(
    name: impl Into<String>,
    ticks: u64,
    state: &mut State,
    mut step: StepFn,
    mut snapshot: SnapFn,
) -> TickReport<Snapshot>
where
    StepFn: FnMut(SimTick, &mut State),
    SnapFn: FnMut(SimTick, &State) -> Snapshot,
{
    let mut frames = Vec::with_capacity(ticks as usize + 1);

    let mut tick = SimTick::ZERO;
    frames.push(TickFrame {
        tick: tick.0,
        snapshot: snapshot(tick, state),
    });

    for _ in 0..ticks {
        step(tick, state);
        tick = tick.advance(1);
        frames.push(TickFrame {
            tick: tick.0,
            snapshot: snapshot(tick, state),
        });
    }

    TickReport {
        name: name.into(),
        frames,
    }
}

/// Run a tick snapshot test and assert (or update) the golden file.
pub fn run_tick_snapshot<State, Snapshot, StepFn, SnapFn>(
    config: TickSnapshotConfig,
    mut state: State,
    step: StepFn,
    snapshot: SnapFn,
) -> Result<()>
where
    Snapshot: Serialize,
    StepFn: FnMut(SimTick, &mut State),
    SnapFn: FnMut(SimTick, &State) -> Snapshot,
{
    let report = record_ticks(config.name, config.ticks, &mut state, step, snapshot);
    assert_json_snapshot(config.snapshot_path, &report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_initial_frame_plus_one_per_tick() {
        let mut counter = 0u32;
        let report = record_ticks("counter", 3, &mut counter, |_, c| *c += 2, |_, c| *c);
        let values: Vec<_> = report.frames.iter().map(|f| (f.tick, f.snapshot)).collect();
        assert_eq!(values, [(0, 0), (1, 2), (2, 4), (3, 6)]);
    }
}

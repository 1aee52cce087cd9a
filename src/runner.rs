//! Phase state machine for one (test, pass) pair.
//!
//! `Calibrating → Warmup → Benchmarking → [Profiling] → Completing → Done`.
//! Every call to [`TestRunner::step`] performs at most one body invocation
//! and hands the runner back to the scheduler as a continuation, so control
//! returns to the driver between iterations.

use std::{fs, time::Instant};

use crate::{
    BenchError,
    body::TestBody,
    config::SuiteConfig,
    logger::Logger,
    profiler::Profiler,
    report::{CurrentResult, TestRecord},
    stats::{self, Field, FieldDiffs, PassMeasurement, SampleWindow},
    store::{ResultStore, StoredResult, sanitize_name},
};

/// Collaborators a runner borrows for the duration of one step.
pub struct Harness<'a> {
    pub config: &'a SuiteConfig,
    pub logger: &'a dyn Logger,
    pub profiler: &'a mut dyn Profiler,
    pub store: &'a ResultStore,
}

impl Harness<'_> {
    fn log(&self, line: &str) {
        self.logger.log(line);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PhaseKind {
    Calibrating,
    Warmup,
    Benchmarking,
    Profiling,
    Completing,
    Done,
}

#[derive(Debug)]
enum Phase {
    Calibrating,
    Warmup {
        iterations: u64,
        remaining: u64,
        elapsed: f64,
    },
    Benchmarking {
        cycles: u64,
        started: Instant,
        window: SampleWindow,
    },
    Profiling {
        remaining: u64,
        current: PassMeasurement,
    },
    Completing {
        current: PassMeasurement,
    },
}

/// Result of one finished (test, pass) run.
#[derive(Clone, Debug, PartialEq)]
pub struct RunOutcome {
    pub name: String,
    pub pass: u32,
    /// This pass alone, before merging.
    pub measured: PassMeasurement,
    /// Best-so-far measurement after merging this pass.
    pub measurement: PassMeasurement,
    /// Present only for the final pass.
    pub record: Option<TestRecord>,
}

#[derive(Debug)]
pub enum Transition {
    Continue(TestRunner),
    Finished(RunOutcome),
}

#[derive(Debug)]
pub struct TestRunner {
    name: String,
    full_name: String,
    pass: u32,
    final_pass: bool,
    previous: Option<PassMeasurement>,
    measured: PassMeasurement,
    phase: Phase,
}

impl TestRunner {
    pub fn new(
        suite_name: &str,
        test_name: &str,
        pass: u32,
        final_pass: bool,
        previous: Option<PassMeasurement>,
    ) -> Self {
        Self {
            name: test_name.to_string(),
            full_name: format!("{suite_name}/{test_name}"),
            pass,
            final_pass,
            previous,
            measured: PassMeasurement::default(),
            phase: Phase::Calibrating,
        }
    }

    pub fn phase(&self) -> PhaseKind {
        match self.phase {
            Phase::Calibrating => PhaseKind::Calibrating,
            Phase::Warmup { .. } => PhaseKind::Warmup,
            Phase::Benchmarking { .. } => PhaseKind::Benchmarking,
            Phase::Profiling { .. } => PhaseKind::Profiling,
            Phase::Completing { .. } => PhaseKind::Completing,
        }
    }

    pub fn step(
        mut self,
        body: &mut TestBody,
        h: &mut Harness<'_>,
    ) -> Result<Transition, BenchError> {
        let timeout = h.config.stall_timeout;
        let budget = h.config.budget_seconds;
        let phase = std::mem::replace(&mut self.phase, Phase::Calibrating);
        self.phase = match phase {
            Phase::Calibrating => {
                h.log("---");
                h.log(&format!("Test {}", self.full_name));
                h.log("Calibrating...");
                let t0 = body.invoke(&self.full_name, timeout)?;
                let cycles = stats::cycles_for(budget, t0);
                h.log(&format!(
                    "Calibration result: {:.3}Hz, {cycles} cycles",
                    stats::hz(t0)
                ));
                h.log("Warming up...");
                let iterations = stats::scaled_cycles(cycles, h.config.warmup_ratio);
                Phase::Warmup {
                    iterations,
                    remaining: iterations,
                    elapsed: 0.0,
                }
            }
            Phase::Warmup {
                iterations,
                remaining,
                elapsed,
            } => {
                let elapsed = elapsed + body.invoke(&self.full_name, timeout)?;
                let remaining = remaining - 1;
                if remaining > 0 {
                    Phase::Warmup {
                        iterations,
                        remaining,
                        elapsed,
                    }
                } else {
                    let t1 = elapsed / iterations as f64;
                    let cycles = stats::cycles_for(budget, t1);
                    h.log(&format!(
                        "Re-calibration result: {:.3}Hz, {cycles} cycles",
                        stats::hz(t1)
                    ));
                    h.log("Benchmarking...");
                    Phase::Benchmarking {
                        cycles,
                        started: Instant::now(),
                        window: SampleWindow::new(),
                    }
                }
            }
            Phase::Benchmarking {
                cycles,
                started,
                mut window,
            } => {
                window.record(body.invoke(&self.full_name, timeout)?);
                if window.len() < cycles {
                    Phase::Benchmarking {
                        cycles,
                        started,
                        window,
                    }
                } else {
                    let bench_time = started.elapsed().as_secs_f64();
                    let measured = window.finish(bench_time, h.config.zero_samples);
                    let current = stats::merge_into(self.previous, measured);
                    self.measured = measured;
                    tracing::debug!(test = %self.full_name, pass = self.pass, "{}", measured.summary());
                    if self.final_pass {
                        log_measurement(h, &current);
                    } else {
                        h.log("Deferred result, not the last pass.");
                    }
                    self.begin_profiling(h, cycles, current)
                }
            }
            Phase::Profiling { remaining, current } => {
                body.invoke(&self.full_name, timeout)?;
                let remaining = remaining - 1;
                if remaining > 0 {
                    Phase::Profiling { remaining, current }
                } else {
                    self.finish_profiling(h);
                    Phase::Completing { current }
                }
            }
            Phase::Completing { current } => {
                let record = if self.final_pass {
                    Some(self.complete(h, current)?)
                } else {
                    None
                };
                return Ok(Transition::Finished(RunOutcome {
                    name: self.name,
                    pass: self.pass,
                    measured: self.measured,
                    measurement: current,
                    record,
                }));
            }
        };
        Ok(Transition::Continue(self))
    }

    fn begin_profiling(&self, h: &mut Harness<'_>, cycles: u64, current: PassMeasurement) -> Phase {
        if !h.config.do_profile {
            return Phase::Completing { current };
        }
        h.log("Profiling...");
        match h.profiler.start(&self.full_name) {
            Ok(()) => Phase::Profiling {
                remaining: stats::scaled_cycles(cycles, h.config.profile_ratio),
                current,
            },
            Err(err) => {
                tracing::warn!(test = %self.full_name, error = %err, "profiler failed to start");
                h.log(&format!("Profiling skipped: {err}"));
                Phase::Completing { current }
            }
        }
    }

    fn finish_profiling(&self, h: &mut Harness<'_>) {
        let exported = h
            .profiler
            .stop(&self.full_name)
            .and_then(|data| h.profiler.export(&data).map(|bytes| (data.format, bytes)));
        let (format, bytes) = match exported {
            Ok(exported) => exported,
            Err(err) => {
                tracing::warn!(test = %self.full_name, error = %err, "profile export failed");
                h.log(&format!("Profiling skipped: {err}"));
                return;
            }
        };
        let path = h.config.profile_dir.join(format!(
            "prof-{}.{format}",
            sanitize_name(&self.full_name)
        ));
        match fs::write(&path, bytes) {
            Ok(()) => tracing::debug!(path = %path.display(), "profile written"),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "profile write failed");
                h.log(&format!("Profiling skipped: {err}"));
            }
        }
    }

    fn complete(
        &self,
        h: &mut Harness<'_>,
        measurement: PassMeasurement,
    ) -> Result<TestRecord, BenchError> {
        let mut stored = h.store.load(&self.name);
        let mut current = CurrentResult::new(measurement);
        match stored.base {
            None => {
                stored = StoredResult {
                    base: Some(measurement),
                    best: Some(measurement),
                };
                h.log("No results to compare yet.");
            }
            Some(base) => {
                let best = stats::merge_into(stored.best, measurement);
                stored.best = Some(best);
                let diff_base = stats::compare(&measurement, &base);
                let diff_best = stats::compare(&measurement, &best);
                h.log("Comparison to base:");
                log_diffs(h, &diff_base);
                h.log("Comparison to best:");
                log_diffs(h, &diff_best);
                current.diff_base = Some(diff_base);
                current.diff_best = Some(diff_best);
            }
        }
        h.store.save(&self.name, &stored)?;
        h.log("");
        Ok(TestRecord { stored, current })
    }
}

fn log_measurement(h: &Harness<'_>, m: &PassMeasurement) {
    h.log("Benchmark result:");
    for field in Field::ALL {
        h.log(&format!(
            "  {}:    {}s    {:.3}Hz",
            field.as_str(),
            field.seconds(m),
            field.hz(m)
        ));
    }
}

fn log_diffs(h: &Harness<'_>, diffs: &FieldDiffs) {
    for field in Field::ALL {
        let d = diffs.get(field);
        h.log(&format!(
            "  {}:    {:.3}%    {}s    {:.3}Hz",
            field.as_str(),
            d.diff_pct,
            d.diff_abs,
            d.diff_hz
        ));
    }
}

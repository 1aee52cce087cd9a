//! Micro-benchmark harness with per-host result history.
//! Register tests on a [`Suite`], run it in an optimized build with `OPTIBENCH_ENV=production`,
//! and inspect the stored history under the configured result directory.

pub mod body;
pub mod config;
pub mod errors;
pub mod logger;
pub mod profiler;
pub mod report;
pub mod runner;
pub mod scheduler;
pub mod stats;
pub mod store;
pub mod suite;

pub use crate::body::{Completion, TestBody};
pub use crate::config::SuiteConfig;
pub use crate::errors::{BenchError, BodyError, ProfilerError};
pub use crate::logger::{CaptureLogger, Logger, SilentLogger, TracingLogger};
pub use crate::profiler::{NoopProfiler, ProfileData, Profiler};
pub use crate::report::{CurrentResult, Report, Reporter, TestRecord};
pub use crate::runner::RunOutcome;
pub use crate::stats::{Diff, Field, FieldDiffs, PassMeasurement, ZeroSamplePolicy};
pub use crate::store::{ResultStore, StoredResult};
pub use crate::suite::{Suite, TestDefinition};

//! Suite configuration and its environment overlay.
//!
//! [`SuiteConfig`] is a plain struct: construct it with [`SuiteConfig::new`]
//! and override fields with struct update syntax, or start from
//! [`SuiteConfig::from_env`] to pick up the `OPTIBENCH_*` variables.
//!
//! ```rust
//! use optibench::SuiteConfig;
//!
//! let cfg = SuiteConfig {
//!     budget_seconds: 0.5,
//!     pass_count: 1,
//!     require_production_mode: false,
//!     ..SuiteConfig::new("parsers")
//! };
//! assert!(cfg.validate().is_ok());
//! ```

use std::{env, path::PathBuf, time::Duration};

use ahash::AHashSet;

use crate::{BenchError, stats::ZeroSamplePolicy};

pub const ENV_MODE: &str = "OPTIBENCH_ENV";
pub const ENV_FILTER: &str = "OPTIBENCH_FILTER";
pub const ENV_RESULT_DIR: &str = "OPTIBENCH_RESULT_DIR";
pub const ENV_REPORT: &str = "OPTIBENCH_REPORT";
pub const ENV_BUDGET: &str = "OPTIBENCH_BUDGET";
pub const ENV_PASSES: &str = "OPTIBENCH_PASSES";
pub const ENV_PROFILE: &str = "OPTIBENCH_PROFILE";
pub const ENV_STALL_TIMEOUT: &str = "OPTIBENCH_STALL_TIMEOUT";

/// Value of [`ENV_MODE`] that marks a production run.
pub const PRODUCTION: &str = "production";

pub const DEFAULT_RESULT_DIR: &str = "test/results";
pub const DEFAULT_BUDGET_SECONDS: f64 = 5.0;
pub const DEFAULT_PASS_COUNT: u32 = 2;

#[derive(Clone, Debug, PartialEq)]
pub struct SuiteConfig {
    /// Suite name, used as the prefix of every fully-qualified test name.
    pub name: String,

    /// Root of the per-fingerprint history directories.
    ///
    /// **Default:** `test/results`
    pub result_dir: PathBuf,

    /// Wall-clock target for the warm-up and benchmark stages, in seconds.
    ///
    /// **Default:** `5.0`
    pub budget_seconds: f64,

    /// Fraction of the calibrated cycle count spent warming up.
    ///
    /// **Default:** `1.0`
    pub warmup_ratio: f64,

    /// Fraction of the benchmark cycle count run under the profiler.
    ///
    /// **Default:** `0.1`
    pub profile_ratio: f64,

    /// **Default:** `false`
    pub do_profile: bool,

    /// Directory receiving `prof-<suite>_<test>.<ext>` exports.
    ///
    /// **Default:** `.`
    pub profile_dir: PathBuf,

    /// Refuse to construct a suite unless `production_mode` is set.
    ///
    /// **Default:** `true`. Numbers from unoptimized builds are not worth keeping.
    pub require_production_mode: bool,

    /// Production marker; [`SuiteConfig::from_env`] sets it from `OPTIBENCH_ENV`.
    pub production_mode: bool,

    /// Where the aggregate JSON report is written, if anywhere.
    pub report_file: Option<PathBuf>,

    /// Number of repetitions of the whole queue; only the last one is recorded.
    ///
    /// **Default:** `2`
    pub pass_count: u32,

    /// Allow-list of test names. `None` registers everything.
    pub filter: Option<Vec<String>>,

    pub zero_samples: ZeroSamplePolicy,

    /// Upper bound on waiting for an async body to signal completion.
    ///
    /// **Default:** `None` (wait indefinitely)
    pub stall_timeout: Option<Duration>,
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            result_dir: PathBuf::from(DEFAULT_RESULT_DIR),
            budget_seconds: DEFAULT_BUDGET_SECONDS,
            warmup_ratio: 1.0,
            profile_ratio: 0.1,
            do_profile: false,
            profile_dir: PathBuf::from("."),
            require_production_mode: true,
            production_mode: false,
            report_file: None,
            pass_count: DEFAULT_PASS_COUNT,
            filter: None,
            zero_samples: ZeroSamplePolicy::default(),
            stall_timeout: None,
        }
    }
}

impl SuiteConfig {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn from_env<S: Into<String>>(name: S) -> Result<Self, BenchError> {
        Self::from_vars(name, |key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable lookup.
    pub fn from_vars<S, F>(name: S, lookup: F) -> Result<Self, BenchError>
    where
        S: Into<String>,
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::new(name);
        cfg.production_mode = lookup(ENV_MODE).as_deref() == Some(PRODUCTION);
        cfg.filter = lookup(ENV_FILTER).and_then(|raw| parse_filter(&raw));
        if let Some(dir) = lookup(ENV_RESULT_DIR) {
            cfg.result_dir = PathBuf::from(dir);
        }
        if let Some(path) = lookup(ENV_REPORT).filter(|p| !p.is_empty()) {
            cfg.report_file = Some(PathBuf::from(path));
        }
        if let Some(raw) = lookup(ENV_BUDGET) {
            cfg.budget_seconds = raw
                .trim()
                .parse()
                .map_err(|_| BenchError::config(format!("{ENV_BUDGET}={raw} is not a number")))?;
        }
        if let Some(raw) = lookup(ENV_PASSES) {
            cfg.pass_count = raw.trim().parse().map_err(|_| {
                BenchError::config(format!("{ENV_PASSES}={raw} is not a pass count"))
            })?;
        }
        if let Some(raw) = lookup(ENV_PROFILE) {
            cfg.do_profile = parse_bool(ENV_PROFILE, &raw)?;
        }
        if let Some(raw) = lookup(ENV_STALL_TIMEOUT) {
            let seconds: f64 = raw.trim().parse().map_err(|_| {
                BenchError::config(format!("{ENV_STALL_TIMEOUT}={raw} is not a number"))
            })?;
            if !(seconds.is_finite() && seconds > 0.0) {
                return Err(BenchError::config(format!(
                    "{ENV_STALL_TIMEOUT} must be positive"
                )));
            }
            cfg.stall_timeout = Some(Duration::from_secs_f64(seconds));
        }
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), BenchError> {
        if self.name.trim().is_empty() {
            return Err(BenchError::config("suite name must not be empty"));
        }
        if self.pass_count == 0 {
            return Err(BenchError::config("pass_count must be at least 1"));
        }
        if !(self.budget_seconds.is_finite() && self.budget_seconds > 0.0) {
            return Err(BenchError::config(format!(
                "budget_seconds must be positive, got {}",
                self.budget_seconds
            )));
        }
        for (label, ratio) in [
            ("warmup_ratio", self.warmup_ratio),
            ("profile_ratio", self.profile_ratio),
        ] {
            if !(ratio.is_finite() && ratio >= 0.0) {
                return Err(BenchError::config(format!(
                    "{label} must be a non-negative number, got {ratio}"
                )));
            }
        }
        if self.require_production_mode && !self.production_mode {
            return Err(BenchError::ProductionModeRequired);
        }
        Ok(())
    }

    pub(crate) fn filter_set(&self) -> Option<AHashSet<String>> {
        self.filter
            .as_ref()
            .map(|names| names.iter().cloned().collect())
    }
}

/// Splits a comma-separated allow-list; blank input means "no filter".
pub fn parse_filter(raw: &str) -> Option<Vec<String>> {
    let names: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();
    if names.is_empty() { None } else { Some(names) }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, BenchError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(BenchError::config(format!("{key}={other} is not a boolean"))),
    }
}

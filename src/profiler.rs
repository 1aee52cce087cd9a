//! Narrow start/stop/export contract for CPU profiling backends.

use crate::errors::ProfilerError;

/// Captured profile for one labelled session.
#[derive(Clone, Debug, PartialEq)]
pub struct ProfileData {
    pub label: String,
    /// File extension for the exported bytes, without the dot.
    pub format: &'static str,
    pub payload: Vec<u8>,
}

pub trait Profiler {
    fn start(&mut self, label: &str) -> Result<(), ProfilerError>;
    fn stop(&mut self, label: &str) -> Result<ProfileData, ProfilerError>;
    fn export(&self, data: &ProfileData) -> Result<Vec<u8>, ProfilerError>;
}

/// Reports every call as unavailable.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopProfiler;

impl Profiler for NoopProfiler {
    fn start(&mut self, _label: &str) -> Result<(), ProfilerError> {
        Err(ProfilerError::Unavailable)
    }

    fn stop(&mut self, _label: &str) -> Result<ProfileData, ProfilerError> {
        Err(ProfilerError::Unavailable)
    }

    fn export(&self, _data: &ProfileData) -> Result<Vec<u8>, ProfilerError> {
        Err(ProfilerError::Unavailable)
    }
}

/// The profiler a suite uses unless one is supplied.
pub fn default_profiler() -> Box<dyn Profiler> {
    #[cfg(feature = "pprof")]
    {
        Box::new(pprof_backend::PprofProfiler::default())
    }
    #[cfg(not(feature = "pprof"))]
    {
        Box::new(NoopProfiler)
    }
}

#[cfg(feature = "pprof")]
pub use pprof_backend::PprofProfiler;

#[cfg(feature = "pprof")]
mod pprof_backend {
    use pprof::{ProfilerGuard, ProfilerGuardBuilder};

    use super::{ProfileData, Profiler};
    use crate::errors::ProfilerError;

    const DEFAULT_FREQUENCY: i32 = 997;

    /// Sampling profiler exporting flamegraph SVGs.
    pub struct PprofProfiler {
        frequency: i32,
        session: Option<(String, ProfilerGuard<'static>)>,
    }

    impl Default for PprofProfiler {
        fn default() -> Self {
            Self::with_frequency(DEFAULT_FREQUENCY)
        }
    }

    impl PprofProfiler {
        pub fn with_frequency(frequency: i32) -> Self {
            Self {
                frequency,
                session: None,
            }
        }
    }

    impl Profiler for PprofProfiler {
        fn start(&mut self, label: &str) -> Result<(), ProfilerError> {
            if self.session.is_some() {
                return Err(ProfilerError::session("a session is already active"));
            }
            let guard = ProfilerGuardBuilder::default()
                .frequency(self.frequency)
                .blocklist(&["libc", "libgcc", "pthread", "vdso"])
                .build()
                .map_err(|e| ProfilerError::session(e.to_string()))?;
            self.session = Some((label.to_string(), guard));
            Ok(())
        }

        fn stop(&mut self, label: &str) -> Result<ProfileData, ProfilerError> {
            let (active, guard) = self
                .session
                .take()
                .ok_or_else(|| ProfilerError::session("no active session"))?;
            if active != label {
                return Err(ProfilerError::session(format!(
                    "active session is {active}, not {label}"
                )));
            }
            let report = guard
                .report()
                .build()
                .map_err(|e| ProfilerError::session(e.to_string()))?;
            let mut payload = Vec::new();
            report
                .flamegraph(&mut payload)
                .map_err(|e| ProfilerError::export(e.to_string()))?;
            Ok(ProfileData {
                label: active,
                format: "svg",
                payload,
            })
        }

        fn export(&self, data: &ProfileData) -> Result<Vec<u8>, ProfilerError> {
            Ok(data.payload.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_profiler_is_unavailable() {
        let mut profiler = NoopProfiler;
        assert!(matches!(
            profiler.start("x"),
            Err(ProfilerError::Unavailable)
        ));
        assert!(matches!(profiler.stop("x"), Err(ProfilerError::Unavailable)));
    }
}

use std::time::Duration;

use thiserror::Error;

/// Error type carried by test bodies, either returned directly or delivered
/// through a [`Completion`](crate::body::Completion).
pub type BodyError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum BenchError {
    #[error("duplicate test name: {0}")]
    DuplicateTestName(String),
    #[error("production mode required: set OPTIBENCH_ENV=production")]
    ProductionModeRequired,
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("test {test} failed: {source}")]
    Body {
        test: String,
        #[source]
        source: BodyError,
    },
    #[error("test {0} dropped its completion without signalling")]
    CompletionDropped(String),
    #[error("test {test} did not complete within {timeout:?}")]
    Stalled { test: String, timeout: Duration },
    #[error("persist error: {0}")]
    Persist(String),
    #[error("serialize error: {0}")]
    Serialize(String),
}

impl BenchError {
    pub fn config<T: Into<String>>(msg: T) -> Self {
        BenchError::InvalidConfig(msg.into())
    }

    pub fn persist<T: Into<String>>(msg: T) -> Self {
        BenchError::Persist(msg.into())
    }

    pub fn serialize<T: Into<String>>(msg: T) -> Self {
        BenchError::Serialize(msg.into())
    }

    pub fn body<T: Into<String>>(test: T, source: BodyError) -> Self {
        BenchError::Body {
            test: test.into(),
            source,
        }
    }
}

/// Failures of the profiling collaborator. These never abort a run.
#[derive(Debug, Error)]
pub enum ProfilerError {
    #[error("profiler unavailable")]
    Unavailable,
    #[error("profiling session error: {0}")]
    Session(String),
    #[error("profile export error: {0}")]
    Export(String),
}

impl ProfilerError {
    pub fn session<T: Into<String>>(msg: T) -> Self {
        ProfilerError::Session(msg.into())
    }

    pub fn export<T: Into<String>>(msg: T) -> Self {
        ProfilerError::Export(msg.into())
    }
}

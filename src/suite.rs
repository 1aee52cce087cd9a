use std::fmt;

use ahash::AHashSet;

use crate::{
    BenchError,
    body::{Completion, TestBody},
    config::SuiteConfig,
    logger::{Logger, TracingLogger},
    profiler::{Profiler, default_profiler},
    report::{Report, Reporter},
    runner::{Harness, RunOutcome, TestRunner, Transition},
    scheduler::{ExecutionPlan, PlanEntry, Work, WorkQueue},
    stats::PassMeasurement,
    store::ResultStore,
};

pub const PASS_SEPARATOR: &str = "======= REPEAT =======";

type PassObserver = Box<dyn FnMut(&RunOutcome)>;

#[derive(Debug)]
pub struct TestDefinition {
    pub name: String,
    pub body: TestBody,
}

/// Registry of tests plus the multi-pass driver.
///
/// Tests run one phase at a time on the calling thread, in registration
/// order, for `pass_count` passes. Only the last pass compares against and
/// updates the stored history.
pub struct Suite {
    config: SuiteConfig,
    filter: Option<AHashSet<String>>,
    names: AHashSet<String>,
    tests: Vec<TestDefinition>,
    logger: Box<dyn Logger>,
    profiler: Box<dyn Profiler>,
    store: ResultStore,
    on_pass: Option<PassObserver>,
}

impl fmt::Debug for Suite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Suite")
            .field("config", &self.config)
            .field("tests", &self.tests)
            .field("fingerprint", &self.store.fingerprint())
            .finish_non_exhaustive()
    }
}

impl Suite {
    pub fn new(config: SuiteConfig) -> Result<Self, BenchError> {
        config.validate()?;
        let store = ResultStore::for_host(config.result_dir.clone());
        tracing::debug!(suite = %config.name, fingerprint = %store.fingerprint(), "suite created");
        Ok(Self {
            filter: config.filter_set(),
            names: AHashSet::new(),
            tests: Vec::new(),
            logger: Box::new(TracingLogger),
            profiler: default_profiler(),
            store,
            config,
            on_pass: None,
        })
    }

    pub fn with_logger<L: Logger + 'static>(mut self, logger: L) -> Self {
        self.logger = Box::new(logger);
        self
    }

    pub fn with_profiler<P: Profiler + 'static>(mut self, profiler: P) -> Self {
        self.profiler = Box::new(profiler);
        self
    }

    /// Called after every (test, pass) run, including non-final passes.
    pub fn on_pass<F: FnMut(&RunOutcome) + 'static>(mut self, observer: F) -> Self {
        self.on_pass = Some(Box::new(observer));
        self
    }

    /// Overrides the host fingerprint that partitions stored history.
    pub fn with_fingerprint<S: Into<String>>(mut self, fingerprint: S) -> Self {
        self.store = ResultStore::new(self.config.result_dir.clone(), fingerprint);
        self
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    pub fn test_names(&self) -> Vec<&str> {
        self.tests.iter().map(|t| t.name.as_str()).collect()
    }

    /// Adds a test. Names outside the allow-list are skipped without error.
    pub fn register<S: Into<String>>(
        &mut self,
        name: S,
        body: TestBody,
    ) -> Result<&mut Self, BenchError> {
        let name = name.into();
        if let Some(filter) = &self.filter
            && !filter.contains(&name)
        {
            tracing::debug!(test = %name, "test filtered out");
            return Ok(self);
        }
        if !self.names.insert(name.clone()) {
            return Err(BenchError::DuplicateTestName(name));
        }
        self.tests.push(TestDefinition { name, body });
        Ok(self)
    }

    pub fn test<S, F>(&mut self, name: S, body: F) -> Result<&mut Self, BenchError>
    where
        S: Into<String>,
        F: FnMut() + 'static,
    {
        self.register(name, TestBody::sync(body))
    }

    pub fn test_async<S, F>(&mut self, name: S, body: F) -> Result<&mut Self, BenchError>
    where
        S: Into<String>,
        F: FnMut(Completion) + 'static,
    {
        self.register(name, TestBody::asynchronous(body))
    }

    pub fn run(self) -> Result<Report, BenchError> {
        self.start(|_| {})
    }

    /// Runs every pass, then hands the report to `on_complete` exactly once.
    ///
    /// The first body failure aborts the run and is returned; `on_complete`
    /// is not called in that case.
    pub fn start<F>(self, on_complete: F) -> Result<Report, BenchError>
    where
        F: FnOnce(&Report),
    {
        let Suite {
            config,
            mut tests,
            logger,
            mut profiler,
            store,
            mut on_pass,
            ..
        } = self;
        let plan = ExecutionPlan::build(tests.len(), config.pass_count);
        let mut queue: WorkQueue<(usize, TestRunner)> = WorkQueue::new(plan);
        let mut best: Vec<Option<PassMeasurement>> = vec![None; tests.len()];
        let mut reporter = Reporter::new(
            config.name.as_str(),
            store.fingerprint(),
            config.report_file.clone(),
        );
        let mut harness = Harness {
            config: &config,
            logger: &*logger,
            profiler: &mut *profiler,
            store: &store,
        };
        tracing::info!(
            suite = %config.name,
            tests = tests.len(),
            passes = config.pass_count,
            "suite started"
        );

        while let Some(work) = queue.next() {
            let (index, runner) = match work {
                Work::Resume(continuation) => continuation,
                Work::Start(PlanEntry::Separator { pass }) => {
                    harness.logger.log(PASS_SEPARATOR);
                    tracing::debug!(pass, "pass started");
                    continue;
                }
                Work::Start(PlanEntry::Run {
                    pass,
                    test,
                    final_pass,
                }) => {
                    let runner =
                        TestRunner::new(&config.name, &tests[test].name, pass, final_pass, best[test]);
                    (test, runner)
                }
            };
            match runner.step(&mut tests[index].body, &mut harness)? {
                Transition::Continue(next) => queue.push((index, next)),
                Transition::Finished(outcome) => {
                    best[index] = Some(outcome.measurement);
                    if let Some(observer) = on_pass.as_mut() {
                        observer(&outcome);
                    }
                    if let Some(record) = outcome.record {
                        reporter.record(&outcome.name, record);
                    }
                }
            }
        }

        let report = reporter.finish()?;
        tracing::info!(suite = %config.name, recorded = report.tests.len(), "suite finished");
        on_complete(&report);
        Ok(report)
    }
}

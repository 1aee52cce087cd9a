use std::{env, hint::black_box, process, thread, time::Duration};

use ahash::AHashMap;
use optibench::{BenchError, Report, Suite, SuiteConfig, config};
use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing_subscriber::EnvFilter;

const SUITE_NAME: &str = "optibench";
const SORT_SEED: u64 = 0x50F7;
const MAP_SEED: u64 = 0x4A5E;
const SORT_LEN: usize = 10_000;
const MAP_LEN: usize = 4_096;
const SLEEP: Duration = Duration::from_millis(1);

const WORKLOADS: [&str; 3] = ["sort-u64", "hash-map-build", "async-sleep"];

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        println!("{}", help());
        return;
    }
    if args.iter().any(|arg| arg == "--list") {
        for name in WORKLOADS {
            println!("{name}");
        }
        return;
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let cfg = match SuiteConfig::from_env(SUITE_NAME) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("error: {err}");
            process::exit(2);
        }
    };
    let report_file = cfg.report_file.clone();
    let suite = match build_suite(cfg) {
        Ok(suite) => suite,
        Err(err) => {
            eprintln!("error: {err}");
            process::exit(2);
        }
    };

    let result = suite.start(|report| {
        println!("\nSummary\n=======");
        for (name, avg, hz) in collect_results(report) {
            println!("{name:<20}{avg:>14.9}s{hz:>16.3}Hz");
        }
        if let Some(path) = &report_file {
            println!("\nreport: {}", path.display());
        }
    });
    if let Err(err) = result {
        eprintln!("benchmark failed: {err}");
        process::exit(1);
    }
}

fn help() -> String {
    format!(
        "bench_driver: run the bundled workloads\n\n\
         Usage: bench_driver [--list] [--help]\n\n\
         Environment:\n  \
         {}=production   required marker for optimized builds\n  \
         {}=a,b          only register the named workloads\n  \
         {}=<dir>        history root (default {})\n  \
         {}=<file>       write the JSON report here\n  \
         {}=<seconds>    per-test budget (default {})\n  \
         {}=<n>          passes (default {})\n  \
         {}=1            capture a profile per test\n  \
         {}=<seconds>    abort when an async test stalls",
        config::ENV_MODE,
        config::ENV_FILTER,
        config::ENV_RESULT_DIR,
        config::DEFAULT_RESULT_DIR,
        config::ENV_REPORT,
        config::ENV_BUDGET,
        config::DEFAULT_BUDGET_SECONDS,
        config::ENV_PASSES,
        config::DEFAULT_PASS_COUNT,
        config::ENV_PROFILE,
        config::ENV_STALL_TIMEOUT,
    )
}

fn build_suite(cfg: SuiteConfig) -> Result<Suite, BenchError> {
    let mut suite = Suite::new(cfg)?;

    let mut rng = StdRng::seed_from_u64(SORT_SEED);
    let unsorted: Vec<u64> = (0..SORT_LEN).map(|_| rng.r#gen()).collect();
    suite.test(WORKLOADS[0], move || {
        let mut data = unsorted.clone();
        data.sort_unstable();
        black_box(data);
    })?;

    let mut rng = StdRng::seed_from_u64(MAP_SEED);
    let keys: Vec<u64> = (0..MAP_LEN).map(|_| rng.r#gen()).collect();
    suite.test(WORKLOADS[1], move || {
        let map: AHashMap<u64, usize> = keys.iter().enumerate().map(|(i, k)| (*k, i)).collect();
        black_box(map);
    })?;

    suite.test_async(WORKLOADS[2], |done| {
        thread::spawn(move || {
            thread::sleep(SLEEP);
            done.complete();
        });
    })?;

    Ok(suite)
}

fn collect_results(report: &Report) -> Vec<(&str, f64, f64)> {
    report
        .tests
        .iter()
        .map(|(name, record)| {
            let m = &record.current.measurement;
            (name, m.avg, m.avg_hz)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use optibench::{CurrentResult, PassMeasurement, Reporter, StoredResult, TestRecord};

    fn record(avg: f64) -> TestRecord {
        let m = PassMeasurement {
            avg,
            avg_hz: 1.0 / avg,
            ..PassMeasurement::default()
        };
        TestRecord {
            stored: StoredResult::default(),
            current: CurrentResult::new(m),
        }
    }

    #[test]
    fn test_collect_results_preserves_order() {
        let mut reporter = Reporter::new("s", "fp", None);
        reporter.record("b", record(0.5));
        reporter.record("a", record(0.25));
        let report = reporter.finish().expect("finish");
        let results = collect_results(&report);
        assert_eq!(results, vec![("b", 0.5, 2.0), ("a", 0.25, 4.0)]);
    }

    #[test]
    fn test_help_mentions_every_variable() {
        let text = help();
        for key in [
            config::ENV_MODE,
            config::ENV_FILTER,
            config::ENV_RESULT_DIR,
            config::ENV_REPORT,
            config::ENV_BUDGET,
            config::ENV_PASSES,
            config::ENV_PROFILE,
            config::ENV_STALL_TIMEOUT,
        ] {
            assert!(text.contains(key), "{key} missing from help");
        }
    }
}

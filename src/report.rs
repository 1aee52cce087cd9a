use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::ser::PrettyFormatter;

use crate::{
    BenchError,
    stats::{FieldDiffs, PassMeasurement},
    store::{StoredResult, write_atomic},
};

/// Final-pass measurement plus its drift against the stored history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurrentResult {
    #[serde(flatten)]
    pub measurement: PassMeasurement,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_base: Option<FieldDiffs>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_best: Option<FieldDiffs>,
}

impl CurrentResult {
    pub fn new(measurement: PassMeasurement) -> Self {
        Self {
            measurement,
            diff_base: None,
            diff_best: None,
        }
    }

    pub fn has_diffs(&self) -> bool {
        self.diff_base.is_some() && self.diff_best.is_some()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TestRecord {
    pub stored: StoredResult,
    pub current: CurrentResult,
}

/// Per-test records in registration order, serialized as a JSON object.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TestRecords(Vec<(String, TestRecord)>);

impl TestRecords {
    pub fn get(&self, name: &str) -> Option<&TestRecord> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, r)| r)
    }

    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TestRecord)> {
        self.0.iter().map(|(n, r)| (n.as_str(), r))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn upsert(&mut self, name: &str, record: TestRecord) {
        match self.0.iter_mut().find(|(n, _)| n == name) {
            Some((_, slot)) => *slot = record,
            None => self.0.push((name.to_string(), record)),
        }
    }
}

impl Serialize for TestRecords {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(n, r)| (n, r)))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Report {
    pub suite_name: String,
    pub fingerprint: String,
    pub date: String,
    pub tests: TestRecords,
}

/// Collects final-pass records for one run and writes the report once.
#[derive(Debug)]
pub struct Reporter {
    report: Report,
    output: Option<PathBuf>,
}

impl Reporter {
    pub fn new<S, F>(suite_name: S, fingerprint: F, output: Option<PathBuf>) -> Self
    where
        S: Into<String>,
        F: Into<String>,
    {
        Self {
            report: Report {
                suite_name: suite_name.into(),
                fingerprint: fingerprint.into(),
                date: Utc::now().to_rfc3339(),
                tests: TestRecords::default(),
            },
            output,
        }
    }

    pub fn record(&mut self, name: &str, record: TestRecord) {
        self.report.tests.upsert(name, record);
    }

    pub fn finish(self) -> Result<Report, BenchError> {
        if let Some(path) = &self.output {
            write_report(&self.report, path)?;
            tracing::debug!(path = %path.display(), tests = self.report.tests.len(), "report written");
        }
        Ok(self.report)
    }
}

/// Pretty-prints `report` with four-space indentation, replacing `path`.
pub fn write_report(report: &Report, path: &Path) -> Result<(), BenchError> {
    let mut data = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut data, PrettyFormatter::with_indent(b"    "));
    report
        .serialize(&mut serializer)
        .map_err(|e| BenchError::serialize(e.to_string()))?;
    write_atomic(path, &data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::{self, SampleWindow, ZeroSamplePolicy};

    fn record(avg: f64) -> TestRecord {
        let mut window = SampleWindow::new();
        window.record(avg);
        let m = window.finish(avg, ZeroSamplePolicy::MinMaxOnly);
        TestRecord {
            stored: StoredResult {
                base: Some(m),
                best: Some(m),
            },
            current: CurrentResult::new(m),
        }
    }

    #[test]
    fn test_records_keep_insertion_order() {
        let mut reporter = Reporter::new("suite", "fp", None);
        reporter.record("zeta", record(1.0));
        reporter.record("alpha", record(2.0));
        reporter.record("zeta", record(3.0));
        let report = reporter.finish().expect("finish");
        assert_eq!(report.tests.names(), vec!["zeta", "alpha"]);
        assert_eq!(report.tests.get("zeta").unwrap().current.measurement.avg, 3.0);

        let json = serde_json::to_string(&report).expect("json");
        assert!(json.find("\"zeta\"").unwrap() < json.find("\"alpha\"").unwrap());
    }

    #[test]
    fn test_current_result_flattens_measurement() {
        let mut current = record(2.0).current;
        let value = serde_json::to_value(&current).expect("value");
        assert_eq!(value["avg"], 2.0);
        assert!(value.get("diff_base").is_none());

        let reference = record(4.0).current.measurement;
        current.diff_base = Some(stats::compare(&current.measurement, &reference));
        current.diff_best = Some(stats::compare(&current.measurement, &reference));
        let value = serde_json::to_value(&current).expect("value");
        assert_eq!(value["diff_base"]["avg"]["diff_pct"], -50.0);
        let back: CurrentResult = serde_json::from_value(value).expect("back");
        assert_eq!(back, current);
    }
}

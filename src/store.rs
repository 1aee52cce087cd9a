use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{BenchError, stats::PassMeasurement};

/// Persisted history for one test on one hardware class.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredResult {
    pub base: Option<PassMeasurement>,
    pub best: Option<PassMeasurement>,
}

impl StoredResult {
    pub fn has_history(&self) -> bool {
        self.base.is_some()
    }
}

/// Reads and writes `<root>/<fingerprint>/<sanitized-name>.json`.
#[derive(Clone, Debug)]
pub struct ResultStore {
    root: PathBuf,
    fingerprint: String,
}

impl ResultStore {
    pub fn new<P: Into<PathBuf>, S: Into<String>>(root: P, fingerprint: S) -> Self {
        Self {
            root: root.into(),
            fingerprint: fingerprint.into(),
        }
    }

    pub fn for_host<P: Into<PathBuf>>(root: P) -> Self {
        Self::new(root, host_fingerprint())
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn dir(&self) -> PathBuf {
        self.root.join(&self.fingerprint)
    }

    pub fn path_for(&self, test_name: &str) -> PathBuf {
        self.dir().join(format!("{}.json", sanitize_name(test_name)))
    }

    /// Missing or unreadable history is reported as "no history".
    pub fn load(&self, test_name: &str) -> StoredResult {
        let path = self.path_for(test_name);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(_) => return StoredResult::default(),
        };
        match serde_json::from_slice(&data) {
            Ok(stored) => stored,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "ignoring malformed history file");
                StoredResult::default()
            }
        }
    }

    pub fn save(&self, test_name: &str, stored: &StoredResult) -> Result<(), BenchError> {
        let dir = self.dir();
        create_private_dir(&self.root)?;
        create_private_dir(&dir)?;
        let path = self.path_for(test_name);
        let data =
            serde_json::to_vec_pretty(stored).map_err(|e| BenchError::serialize(e.to_string()))?;
        write_atomic(&path, &data)?;
        tracing::debug!(path = %path.display(), "history saved");
        Ok(())
    }
}

/// Replaces whitespace and path-unsafe characters with `_`.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_whitespace() || c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// SHA-256 of the host CPU model, hex encoded.
pub fn host_fingerprint() -> String {
    fingerprint_of(&cpu_model())
}

pub fn fingerprint_of(cpu_model: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(cpu_model.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn cpu_model() -> String {
    #[cfg(target_os = "linux")]
    {
        fs::read_to_string("/proc/cpuinfo")
            .ok()
            .and_then(|info| {
                info.lines()
                    .find(|l| l.starts_with("model name") || l.starts_with("Model"))
                    .and_then(|l| l.split(':').nth(1))
                    .map(|s| s.trim().to_owned())
            })
            .unwrap_or_else(|| std::env::consts::ARCH.to_owned())
    }
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("sysctl")
            .args(["-n", "machdep.cpu.brand_string"])
            .output()
            .ok()
            .and_then(|out| String::from_utf8(out.stdout).ok())
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| std::env::consts::ARCH.to_owned())
    }
    #[cfg(target_os = "windows")]
    {
        std::env::var("PROCESSOR_IDENTIFIER")
            .unwrap_or_else(|_| std::env::consts::ARCH.to_owned())
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        std::env::consts::ARCH.to_owned()
    }
}

fn create_private_dir(dir: &Path) -> Result<(), BenchError> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o750);
    }
    builder
        .create(dir)
        .map_err(|e| BenchError::persist(format!("{}: {e}", dir.display())))
}

/// Writes to a sibling temporary file and renames it over `path`.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> Result<(), BenchError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{file_name}.{}.tmp", std::process::id()));
    fs::write(&tmp, data).map_err(|e| BenchError::persist(format!("{}: {e}", tmp.display())))?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        BenchError::persist(format!("{}: {e}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_replaces_unsafe_characters() {
        assert_eq!(sanitize_name("Test A"), "Test_A");
        assert_eq!(sanitize_name("Suite/Test B"), "Suite_Test_B");
        assert_eq!(sanitize_name("a\\b:c*d"), "a_b_c_d");
        assert_eq!(sanitize_name("plain-name.v2"), "plain-name.v2");
    }

    #[test]
    fn test_fingerprint_is_stable_sha256_hex() {
        let a = fingerprint_of("Example CPU @ 3.00GHz");
        let b = fingerprint_of("Example CPU @ 3.00GHz");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, fingerprint_of("Other CPU"));
    }

    #[test]
    fn test_host_fingerprint_matches_cpu_model() {
        assert_eq!(host_fingerprint(), fingerprint_of(&cpu_model()));
    }

    #[test]
    fn test_path_layout() {
        let store = ResultStore::new("/tmp/results", "abc");
        assert_eq!(
            store.path_for("Test A"),
            PathBuf::from("/tmp/results/abc/Test_A.json")
        );
    }
}

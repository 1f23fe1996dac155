#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};

/// Returns the absolute path to a fixture under `tests/data`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}

/// Reads a comma-delimited output file into its header and rows.
pub fn read_output(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .expect("open output");
    let headers = reader
        .headers()
        .expect("headers")
        .iter()
        .map(|h| h.to_string())
        .collect();
    let rows = reader
        .records()
        .map(|r| r.expect("record").iter().map(|f| f.to_string()).collect())
        .collect();
    (headers, rows)
}

/// Builds a claims extract with `rows` rows where `premium(i)` sets each premium.
pub fn synthetic_claims<F>(rows: usize, premium: F) -> String
where
    F: Fn(usize) -> f64,
{
    let mut out = String::from("PolicyID|Gender|TransactionMonth|TotalPremium|TotalClaims\n");
    for i in 0..rows {
        out.push_str(&format!(
            "{i}|{}|2015-0{}-01|{}|{}\n",
            if i % 2 == 0 { "Male" } else { "Female" },
            (i % 9) + 1,
            premium(i),
            if i % 7 == 0 { 10.0 } else { 0.0 }
        ));
    }
    out
}

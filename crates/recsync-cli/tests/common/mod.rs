use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;
use url::Url;

/// An isolated service directory and pending-queue directory.
pub struct Env {
    pub service: TempDir,
    pub data: TempDir,
}

impl Env {
    pub fn new() -> Self {
        Self {
            service: TempDir::new().expect("Failed to create service dir"),
            data: TempDir::new().expect("Failed to create data dir"),
        }
    }

    pub fn service_url(&self) -> String {
        Url::from_directory_path(self.service.path())
            .expect("Failed to build file URL")
            .to_string()
    }

    pub fn data_dir(&self) -> &Path {
        self.data.path()
    }

    /// Run the CLI binary against this environment.
    pub fn run(&self, args: &[&str]) -> Output {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_recsync"));
        cmd.args(args);
        cmd.env("RECSYNC_SERVICE", self.service_url());
        cmd.env("RECSYNC_DATA_DIR", self.data_dir());
        cmd.env("NO_COLOR", "1");
        cmd.env_remove("RUST_LOG");
        cmd.output().expect("Failed to execute CLI")
    }

    /// Run the CLI and expect success, returning stdout.
    pub fn run_success(&self, args: &[&str]) -> String {
        let output = self.run(args);
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            panic!("CLI command failed: {:?}\nstderr: {}", args, stderr);
        }
        String::from_utf8_lossy(&output.stdout).to_string()
    }
}

/// Parse one JSON document per stdout line.
pub fn json_lines(stdout: &str) -> Vec<serde_json::Value> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).expect("Expected a JSON line"))
        .collect()
}

/// The ids of fetched records, in output order.
pub fn ids(stdout: &str) -> Vec<String> {
    json_lines(stdout)
        .iter()
        .map(|r| r["id"].as_str().expect("record id").to_string())
        .collect()
}

//! Ordered batch report: one entry per submission, rendered as text or JSON.

use std::fmt;

use serde::Serialize;

use crate::error::Error;

const SEPARATOR: &str =
    "================================================================================";

/// Terminal state of one batch entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// External command ran to completion; `code` is `None` when it was
    /// terminated by a signal.
    Exited { code: Option<i32> },
    /// In-process callable returned normally.
    Returned,
    /// Launch (or invocation) failed.
    Failed { reason: String },
    /// The host allow-list excluded this machine; never executed.
    Skipped { host: String },
}

impl Outcome {
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Outcome::Exited { code } => *code,
            Outcome::Returned => Some(0),
            Outcome::Failed { .. } | Outcome::Skipped { .. } => None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code() == Some(0)
    }

    /// Short form for progress lines and tables.
    pub fn label(&self) -> String {
        match self {
            Outcome::Exited { code: Some(c) } => format!("exit {c}"),
            Outcome::Exited { code: None } => "signal".to_string(),
            Outcome::Returned => "returned".to_string(),
            Outcome::Failed { .. } => "failed".to_string(),
            Outcome::Skipped { .. } => "skipped".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    /// 0-based submission index.
    pub index: usize,
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    pub host: String,
    pub entries: Vec<ReportEntry>,
}

impl Report {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exit codes in submission order.
    pub fn exit_codes(&self) -> Vec<Option<i32>> {
        self.entries.iter().map(|e| e.outcome.exit_code()).collect()
    }

    pub fn all_succeeded(&self) -> bool {
        self.entries.iter().all(|e| e.outcome.is_success())
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self)
            .unwrap_or_else(|_| serde_json::json!({ "note": "unable to serialize report" }));
        if let serde_json::Value::Object(ref mut map) = value {
            map.insert(
                "exit_codes".to_string(),
                serde_json::to_value(self.exit_codes()).unwrap_or_default(),
            );
        }
        value
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(f, "{SEPARATOR}")?;
            writeln!(f, "[{}] {}", entry.index + 1, entry.command.trim())?;
            match &entry.outcome {
                Outcome::Exited { .. } | Outcome::Returned => {
                    writeln!(f, "Stdout:\n{}\n", entry.stdout.trim_end())?;
                    writeln!(f, "Stderr:\n{}\n", entry.stderr.trim_end())?;
                    match entry.outcome.exit_code() {
                        Some(code) => writeln!(f, "Return code: {code}")?,
                        None => writeln!(f, "Return code: terminated by signal")?,
                    }
                }
                Outcome::Failed { reason } => writeln!(f, "Error: {reason}")?,
                Outcome::Skipped { host } => {
                    let skipped = Error::HostSkipped { host: host.clone() };
                    writeln!(f, "Skipped: {skipped}")?;
                }
            }
        }
        writeln!(f, "{SEPARATOR}")
    }
}

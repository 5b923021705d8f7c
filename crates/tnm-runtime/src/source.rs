//! Findings sources: where findings records come from.
//!
//! The extraction stage that turns a report into findings lives outside
//! this workspace. A [`FindingsSource`] is the seam the orchestrator pulls
//! findings through; it must complete (or time out) before staging begins.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tnm_core::ClinicalFindings;

/// Trait for upstream findings providers.
///
/// # Contract
/// - Returns a fully validated `ClinicalFindings` or an error
/// - MUST NOT return partially extracted findings
/// - May be called concurrently for different reports
#[async_trait]
pub trait FindingsSource: Send + Sync {
    /// Fetch the findings for one report.
    async fn fetch(&self, report_id: &str) -> anyhow::Result<ClinicalFindings>;

    /// Source name for logging.
    fn name(&self) -> &str;
}

/// Reads `<report_id>.yaml`, `<report_id>.yml` or `<report_id>.json` from a
/// directory.
pub struct FileFindingsSource {
    root: PathBuf,
}

impl FileFindingsSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn locate(&self, report_id: &str) -> anyhow::Result<PathBuf> {
        if report_id.is_empty()
            || report_id.contains(['/', '\\'])
            || report_id.starts_with('.')
        {
            return Err(anyhow!("Invalid report id '{}'", report_id));
        }

        for ext in ["yaml", "yml", "json"] {
            let path = self.root.join(format!("{}.{}", report_id, ext));
            let is_file = tokio::fs::metadata(&path)
                .await
                .map(|metadata| metadata.is_file())
                .unwrap_or(false);
            if is_file {
                return Ok(path);
            }
        }

        Err(anyhow!(
            "No findings document for report '{}' in {}",
            report_id,
            self.root.display()
        ))
    }
}

#[async_trait]
impl FindingsSource for FileFindingsSource {
    async fn fetch(&self, report_id: &str) -> anyhow::Result<ClinicalFindings> {
        let path = self.locate(report_id).await?;
        let contents = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
        let findings = if is_json {
            ClinicalFindings::from_json(&contents)
        } else {
            ClinicalFindings::from_yaml(&contents)
        }
        .with_context(|| format!("Invalid findings in {}", path.display()))?;

        Ok(findings)
    }

    fn name(&self) -> &str {
        "file"
    }
}

/// Findings held in memory, keyed by report id.
#[derive(Default)]
pub struct InMemoryFindingsSource {
    reports: BTreeMap<String, ClinicalFindings>,
}

impl InMemoryFindingsSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a findings record.
    pub fn insert(&mut self, report_id: impl Into<String>, findings: ClinicalFindings) {
        self.reports.insert(report_id.into(), findings);
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with_report(mut self, report_id: impl Into<String>, findings: ClinicalFindings) -> Self {
        self.insert(report_id, findings);
        self
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}

#[async_trait]
impl FindingsSource for InMemoryFindingsSource {
    async fn fetch(&self, report_id: &str) -> anyhow::Result<ClinicalFindings> {
        let findings = self
            .reports
            .get(report_id)
            .cloned()
            .ok_or_else(|| anyhow!("Unknown report '{}'", report_id))?;

        findings.validate()?;
        Ok(findings)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

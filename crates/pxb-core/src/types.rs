use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{engine::progress_percent, ids::*, model::*};

/// One analyzable unit reported by the hypervisor.
///
/// `config` is carried through untouched: the core never inspects it, it is only
/// persisted and written out as `config.json`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ResourceDescriptor {
    pub id: String,
    pub name: String,
    pub kind: ResourceKind,
    pub location: String,
    pub status: String,
    #[serde(default)]
    pub config: Value,
}

/// Cluster-wide context handed to per-resource analysis and the final summary.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ClusterContext {
    #[serde(default)]
    pub status: Value,
    #[serde(default)]
    pub resources: Value,
    #[serde(default)]
    pub nodes: Vec<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Artifacts {
    pub analysis: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_review: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimization_recommendations: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub infra_template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_template: Option<String>,
}

impl Artifacts {
    pub fn analysis_only(analysis: impl Into<String>) -> Self {
        Self {
            analysis: analysis.into(),
            ..Self::default()
        }
    }

    /// Returns the artifact text, treating empty strings as absent.
    pub fn get(&self, kind: ArtifactKind) -> Option<&str> {
        let value = match kind {
            ArtifactKind::Analysis => Some(self.analysis.as_str()),
            ArtifactKind::SecurityReview => self.security_review.as_deref(),
            ArtifactKind::OptimizationRecommendations => self.optimization_recommendations.as_deref(),
            ArtifactKind::InfraTemplate => self.infra_template.as_deref(),
            ArtifactKind::ConfigTemplate => self.config_template.as_deref(),
        };
        value.filter(|s| !s.trim().is_empty())
    }

    pub fn set(&mut self, kind: ArtifactKind, text: String) {
        match kind {
            ArtifactKind::Analysis => self.analysis = text,
            ArtifactKind::SecurityReview => self.security_review = Some(text),
            ArtifactKind::OptimizationRecommendations => self.optimization_recommendations = Some(text),
            ArtifactKind::InfraTemplate => self.infra_template = Some(text),
            ArtifactKind::ConfigTemplate => self.config_template = Some(text),
        }
    }
}

/// Outcome of analyzing one resource.
///
/// Fields are private so an error-flagged result can only be built through
/// [`AnalysisResult::failed`], which leaves every artifact except `analysis` empty.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct AnalysisResult {
    #[serde(flatten)]
    resource: ResourceDescriptor,
    #[serde(flatten)]
    artifacts: Artifacts,
    error: bool,
}

impl AnalysisResult {
    pub fn success(resource: ResourceDescriptor, artifacts: Artifacts) -> Self {
        Self {
            resource,
            artifacts,
            error: false,
        }
    }

    pub fn failed(resource: ResourceDescriptor, message: impl Into<String>) -> Self {
        Self {
            resource,
            artifacts: Artifacts::analysis_only(message),
            error: true,
        }
    }

    /// Rebuild a result loaded from storage.
    pub fn restore(resource: ResourceDescriptor, artifacts: Artifacts, error: bool) -> Self {
        if error {
            Self::failed(resource, artifacts.analysis)
        } else {
            Self::success(resource, artifacts)
        }
    }

    pub fn resource(&self) -> &ResourceDescriptor {
        &self.resource
    }

    pub fn resource_id(&self) -> &str {
        &self.resource.id
    }

    pub fn artifacts(&self) -> &Artifacts {
        &self.artifacts
    }

    pub fn is_error(&self) -> bool {
        self.error
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BatchJob {
    pub job_id: JobId,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: JobStatus,
    pub total_resources: usize,
    pub processed_resources: usize,
    pub error_message: Option<String>,
}

impl BatchJob {
    pub fn progress_percent(&self) -> f64 {
        progress_percent(self.processed_resources, self.total_resources)
    }
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct AnalysisRecord {
    pub job_id: JobId,
    #[serde(flatten)]
    pub result: AnalysisResult,
    pub analyzed_at: DateTime<Utc>,
}

/// Named text blob attached to a job. Append-only.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct InfrastructureReport {
    pub job_id: JobId,
    pub report_type: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

pub const SUMMARY_REPORT: &str = "summary";

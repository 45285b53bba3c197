use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    #[serde(rename = "qemu")]
    Vm,
    #[serde(rename = "lxc")]
    Container,
}

impl ResourceKind {
    /// Hypervisor type tag, also used as the directory prefix in the output tree.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Vm => "qemu",
            ResourceKind::Container => "lxc",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "qemu" => Some(ResourceKind::Vm),
            "lxc" => Some(ResourceKind::Container),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(JobStatus::Running),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }

    /// Only RUNNING -> COMPLETED and RUNNING -> FAILED are legal.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Running, JobStatus::Completed) | (JobStatus::Running, JobStatus::Failed)
        )
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Analysis,
    SecurityReview,
    OptimizationRecommendations,
    InfraTemplate,
    ConfigTemplate,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 5] = [
        ArtifactKind::Analysis,
        ArtifactKind::SecurityReview,
        ArtifactKind::OptimizationRecommendations,
        ArtifactKind::InfraTemplate,
        ArtifactKind::ConfigTemplate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Analysis => "analysis",
            ArtifactKind::SecurityReview => "security_review",
            ArtifactKind::OptimizationRecommendations => "optimization_recommendations",
            ArtifactKind::InfraTemplate => "infra_template",
            ArtifactKind::ConfigTemplate => "config_template",
        }
    }

    /// Human label used in embedded error strings.
    pub fn label(&self) -> &'static str {
        match self {
            ArtifactKind::Analysis => "analysis",
            ArtifactKind::SecurityReview => "security review",
            ArtifactKind::OptimizationRecommendations => "optimization recommendations",
            ArtifactKind::InfraTemplate => "Terraform",
            ArtifactKind::ConfigTemplate => "Ansible",
        }
    }
}

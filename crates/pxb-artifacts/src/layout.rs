use pxb_core::{ArtifactKind, JobId, ResourceDescriptor};

pub const CONFIG_FILE: &str = "config.json";
pub const SUMMARY_FILE: &str = "infrastructure_summary.md";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const TERRAFORM_DIR: &str = "terraform";
pub const ANSIBLE_DIR: &str = "ansible";
pub const PLAYBOOKS_DIR: &str = "playbooks";

/// Replace characters that would split or escape a path component.
///
/// This is not collision-proof: "web app" and "web/app" both become "web_app".
pub fn sanitize_component(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c if c.is_whitespace() || c.is_control() => '_',
            c => c,
        })
        .collect()
}

pub fn job_dir_name(job_id: JobId) -> String {
    format!("job_{job_id}")
}

/// `<kind>_<name>_<id>`, e.g. `qemu_web_app_1_100`.
pub fn resource_dir_name(resource: &ResourceDescriptor) -> String {
    format!(
        "{}_{}_{}",
        resource.kind.as_str(),
        sanitize_component(&resource.name),
        sanitize_component(&resource.id)
    )
}

pub fn playbook_file_name(resource: &ResourceDescriptor) -> String {
    format!("{}_{}.yml", sanitize_component(&resource.name), sanitize_component(&resource.id))
}

pub fn artifact_file_name(kind: ArtifactKind) -> &'static str {
    match kind {
        ArtifactKind::Analysis => "analysis.md",
        ArtifactKind::SecurityReview => "security_review.md",
        ArtifactKind::OptimizationRecommendations => "optimization_recommendations.md",
        ArtifactKind::InfraTemplate => "main.tf",
        ArtifactKind::ConfigTemplate => "playbook.yml",
    }
}

use pxb_core::{
    AnalysisResult, ArtifactKind, Artifacts, BatchError, JobId, JobStatus, ResourceAnalysisError,
    ResourceDescriptor, ResourceKind, RunOutcome,
};
use serde_json::json;

fn descriptor(id: &str) -> ResourceDescriptor {
    ResourceDescriptor {
        id: id.to_string(),
        name: format!("web-{id}"),
        kind: ResourceKind::Vm,
        location: "pve1".to_string(),
        status: "running".to_string(),
        config: json!({"cores": 2, "memory": 2048}),
    }
}

#[test]
fn test_failed_result_only_carries_analysis() {
    let r = AnalysisResult::failed(descriptor("100"), "Error: boom");
    assert!(r.is_error());
    assert_eq!(r.artifacts().analysis, "Error: boom");
    assert_eq!(r.artifacts().security_review, None);
    assert_eq!(r.artifacts().infra_template, None);
}

#[test]
fn test_restore_normalizes_error_rows() {
    let mut artifacts = Artifacts::analysis_only("Error: timeout");
    artifacts.security_review = Some("stale".into());
    let r = AnalysisResult::restore(descriptor("101"), artifacts, true);
    assert!(r.is_error());
    assert_eq!(r.artifacts().security_review, None);
}

#[test]
fn test_artifact_get_treats_empty_as_absent() {
    let mut a = Artifacts::analysis_only("doc");
    a.set(ArtifactKind::InfraTemplate, "   ".into());
    a.set(ArtifactKind::ConfigTemplate, "- hosts: all".into());
    assert_eq!(a.get(ArtifactKind::Analysis), Some("doc"));
    assert_eq!(a.get(ArtifactKind::InfraTemplate), None);
    assert_eq!(a.get(ArtifactKind::ConfigTemplate), Some("- hosts: all"));
    assert_eq!(a.get(ArtifactKind::SecurityReview), None);
}

#[test]
fn test_result_serializes_flat() {
    let r = AnalysisResult::success(descriptor("102"), Artifacts::analysis_only("ok"));
    let v = serde_json::to_value(&r).unwrap();
    assert_eq!(v["id"], "102");
    assert_eq!(v["kind"], "qemu");
    assert_eq!(v["analysis"], "ok");
    assert_eq!(v["error"], false);
    assert!(v.get("security_review").is_none());
}

#[test]
fn test_status_transitions() {
    assert!(JobStatus::Running.can_transition_to(JobStatus::Completed));
    assert!(JobStatus::Running.can_transition_to(JobStatus::Failed));
    assert!(!JobStatus::Completed.can_transition_to(JobStatus::Failed));
    assert!(!JobStatus::Failed.can_transition_to(JobStatus::Running));
    assert!(!JobStatus::Running.can_transition_to(JobStatus::Running));
}

#[test]
fn test_kind_round_trip_tags() {
    assert_eq!(ResourceKind::parse("lxc"), Some(ResourceKind::Container));
    assert_eq!(ResourceKind::Vm.as_str(), "qemu");
    assert_eq!(ResourceKind::parse("storage"), None);
}

#[test]
fn test_job_id_parse_and_display() {
    let id: JobId = " 42 ".parse().unwrap();
    assert_eq!(id, JobId::new(42));
    assert_eq!(id.to_string(), "42");
}

#[test]
fn test_error_messages() {
    let e = ResourceAnalysisError::new("100", anyhow::anyhow!("rate limited"));
    assert_eq!(e.to_string(), "Error: rate limited");

    let e = BatchError::DroppedLimit { dropped: 3, limit: 1 };
    assert!(e.to_string().contains("3 analysis task(s)"));

    let e = BatchError::Provider(anyhow::anyhow!("refused").context("list nodes"));
    assert_eq!(e.to_string(), "resource provider error: list nodes: refused");
}

#[test]
fn test_run_outcome_job_id() {
    assert_eq!(RunOutcome::Completed(JobId(7)).job_id(), Some(JobId(7)));
    assert_eq!(RunOutcome::NoWork.job_id(), None);
}

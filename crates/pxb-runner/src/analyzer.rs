use std::sync::Arc;

use pxb_core::{AnalysisResult, ArtifactKind, Artifacts, ClusterContext, ResourceAnalysisError, ResourceDescriptor};
use pxb_providers::AnalysisProvider;
use tracing::{debug, warn};

/// Which optional artifacts are generated after the mandatory analysis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArtifactToggles {
    pub security_review: bool,
    pub optimization: bool,
    pub infra_templates: bool,
    pub config_templates: bool,
}

impl Default for ArtifactToggles {
    fn default() -> Self {
        Self {
            security_review: true,
            optimization: true,
            infra_templates: true,
            config_templates: true,
        }
    }
}

impl ArtifactToggles {
    pub fn enabled(&self) -> Vec<ArtifactKind> {
        [
            (ArtifactKind::SecurityReview, self.security_review),
            (ArtifactKind::OptimizationRecommendations, self.optimization),
            (ArtifactKind::InfraTemplate, self.infra_templates),
            (ArtifactKind::ConfigTemplate, self.config_templates),
        ]
        .into_iter()
        .filter_map(|(kind, on)| on.then_some(kind))
        .collect()
    }
}

/// Text stored in place of an optional artifact whose generation failed. Template
/// kinds get a leading `#` so the file still parses as HCL / YAML.
pub fn embedded_error(kind: ArtifactKind, err: &anyhow::Error) -> String {
    match kind {
        ArtifactKind::InfraTemplate | ArtifactKind::ConfigTemplate => {
            format!("# Error generating {}: {err:#}", kind.label())
        }
        _ => format!("Error generating {}: {err:#}", kind.label()),
    }
}

/// Per-resource analysis with failure containment: no error escapes [`ResourceAnalyzer::analyze`].
#[derive(Clone)]
pub struct ResourceAnalyzer {
    provider: Arc<dyn AnalysisProvider>,
    toggles: ArtifactToggles,
}

impl ResourceAnalyzer {
    pub fn new(provider: Arc<dyn AnalysisProvider>, toggles: ArtifactToggles) -> Self {
        Self { provider, toggles }
    }

    pub fn provider(&self) -> &Arc<dyn AnalysisProvider> {
        &self.provider
    }

    pub async fn analyze(&self, resource: &ResourceDescriptor, context: Option<&ClusterContext>) -> AnalysisResult {
        let analysis = match self.provider.analyze(resource, context).await {
            Ok(text) => text,
            Err(e) => {
                let err = ResourceAnalysisError::new(&resource.id, e);
                warn!(resource_id = %err.resource_id, error = %err, "resource analysis failed");
                return AnalysisResult::failed(resource.clone(), err.to_string());
            }
        };

        let mut artifacts = Artifacts::analysis_only(analysis);
        for kind in self.toggles.enabled() {
            let outcome = match kind {
                ArtifactKind::SecurityReview => self.provider.security_review(resource).await,
                ArtifactKind::OptimizationRecommendations => self.provider.optimization_review(resource).await,
                ArtifactKind::InfraTemplate => self.provider.infra_template(resource).await,
                ArtifactKind::ConfigTemplate => self.provider.config_template(resource).await,
                ArtifactKind::Analysis => continue,
            };
            let text = match outcome {
                Ok(text) => text,
                Err(e) => {
                    warn!(resource_id = %resource.id, artifact = kind.as_str(), error = %format!("{e:#}"), "artifact generation failed");
                    embedded_error(kind, &e)
                }
            };
            artifacts.set(kind, text);
        }
        debug!(resource_id = %resource.id, "resource analyzed");
        AnalysisResult::success(resource.clone(), artifacts)
    }
}

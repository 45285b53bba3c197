use anyhow::Result;
use async_trait::async_trait;
use pxb_core::{AnalysisResult, ClusterContext, ResourceDescriptor};

/// Read-only view of the hypervisor inventory.
#[async_trait]
pub trait ResourceProvider: Send + Sync {
    async fn list_nodes(&self) -> Result<Vec<String>>;

    /// All VMs and containers across every node. Per-node failures are logged by the
    /// implementation and produce a partial listing instead of an error.
    async fn list_resources(&self) -> Result<Vec<ResourceDescriptor>>;

    async fn cluster_context(&self) -> Result<ClusterContext>;
}

/// Text generation for one resource or for the whole cluster.
///
/// Every call is independently fallible; callers decide how failures are recorded.
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    async fn analyze(&self, resource: &ResourceDescriptor, context: Option<&ClusterContext>) -> Result<String>;
    async fn security_review(&self, resource: &ResourceDescriptor) -> Result<String>;
    async fn optimization_review(&self, resource: &ResourceDescriptor) -> Result<String>;
    async fn infra_template(&self, resource: &ResourceDescriptor) -> Result<String>;
    async fn config_template(&self, resource: &ResourceDescriptor) -> Result<String>;
    async fn summarize(&self, results: &[AnalysisResult], context: &ClusterContext) -> Result<String>;
}

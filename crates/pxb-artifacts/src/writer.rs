use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use pxb_core::{AnalysisResult, ArtifactKind, JobId};
use tracing::{debug, warn};

use crate::layout::*;
use crate::manifest::{ManifestEntry, OutputManifest};
use crate::templates;

/// Materializes the output tree of one job.
///
/// Implementations must be deterministic in `(job_id, results, summary)`: running twice
/// overwrites the same files with the same bytes.
pub trait ArtifactWriter: Send + Sync {
    fn write_job(&self, job_id: JobId, results: &[AnalysisResult], summary: &str) -> Result<WriteReport>;
}

/// Which consolidated directories are produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WriterOptions {
    pub infra_templates: bool,
    pub config_templates: bool,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            infra_templates: true,
            config_templates: true,
        }
    }
}

#[derive(Clone, Debug)]
pub struct WriteReport {
    pub job_dir: PathBuf,
    pub manifest: OutputManifest,
}

#[derive(Clone)]
pub struct FsArtifactWriter {
    pub root: PathBuf,
    pub options: WriterOptions,
}

impl FsArtifactWriter {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            options: WriterOptions::default(),
        }
    }

    pub fn with_options(mut self, options: WriterOptions) -> Self {
        self.options = options;
        self
    }

    pub fn job_dir(&self, job_id: JobId) -> PathBuf {
        self.root.join(job_dir_name(job_id))
    }

    fn create_dir(path: &Path) -> Result<()> {
        std::fs::create_dir_all(path).with_context(|| format!("create dir {}", path.display()))
    }

    fn write_file(path: &Path, contents: &str) -> Result<()> {
        std::fs::write(path, contents).with_context(|| format!("write {}", path.display()))
    }

    fn write_resource(&self, job_dir: &Path, result: &AnalysisResult) -> Result<ManifestEntry> {
        let resource = result.resource();
        let dir_name = resource_dir_name(resource);
        let dir = job_dir.join(&dir_name);
        Self::create_dir(&dir)?;

        let mut files = vec![];
        for kind in ArtifactKind::ALL {
            if let Some(text) = result.artifacts().get(kind) {
                let name = artifact_file_name(kind);
                Self::write_file(&dir.join(name), text)?;
                files.push(name.to_string());
            }
        }

        let config = serde_json::to_string_pretty(&resource.config)
            .with_context(|| format!("serialize config of resource {}", resource.id))?;
        Self::write_file(&dir.join(CONFIG_FILE), &config)?;
        files.push(CONFIG_FILE.to_string());

        Ok(ManifestEntry {
            resource_id: resource.id.clone(),
            kind: resource.kind.as_str().to_string(),
            directory: dir_name,
            files,
            error: result.is_error(),
        })
    }

    fn write_terraform(&self, job_dir: &Path, results: &[AnalysisResult]) -> Result<Vec<String>> {
        let dir = job_dir.join(TERRAFORM_DIR);
        Self::create_dir(&dir)?;

        let mut main_tf = String::from(templates::TERRAFORM_HEADER);
        for result in results {
            if let Some(tf) = result.artifacts().get(ArtifactKind::InfraTemplate) {
                let r = result.resource();
                main_tf.push('\n');
                main_tf.push_str(&templates::section_label(&r.name, &r.id));
                main_tf.push('\n');
                main_tf.push_str(tf.trim_end());
                main_tf.push('\n');
            }
        }
        Self::write_file(&dir.join("main.tf"), &main_tf)?;
        Self::write_file(&dir.join("variables.tf"), templates::TERRAFORM_VARIABLES)?;
        Self::write_file(&dir.join("README.md"), templates::TERRAFORM_README)?;

        Ok(["main.tf", "variables.tf", "README.md"]
            .iter()
            .map(|f| format!("{TERRAFORM_DIR}/{f}"))
            .collect())
    }

    fn write_ansible(&self, job_dir: &Path, results: &[AnalysisResult]) -> Result<Vec<String>> {
        let dir = job_dir.join(ANSIBLE_DIR);
        let playbooks = dir.join(PLAYBOOKS_DIR);
        Self::create_dir(&playbooks)?;

        let mut written = vec![];
        let mut site = String::from(templates::ANSIBLE_SITE_HEADER);
        for result in results {
            if let Some(playbook) = result.artifacts().get(ArtifactKind::ConfigTemplate) {
                let r = result.resource();
                let file = playbook_file_name(r);
                Self::write_file(&playbooks.join(&file), playbook)?;
                site.push('\n');
                site.push_str(&templates::section_label(&r.name, &r.id));
                site.push_str(&format!("\n- import_playbook: {PLAYBOOKS_DIR}/{file}\n"));
                written.push(format!("{ANSIBLE_DIR}/{PLAYBOOKS_DIR}/{file}"));
            }
        }
        Self::write_file(&dir.join("site.yml"), &site)?;
        Self::write_file(&dir.join("README.md"), templates::ANSIBLE_README)?;

        let mut files = vec![format!("{ANSIBLE_DIR}/site.yml"), format!("{ANSIBLE_DIR}/README.md")];
        files.extend(written);
        Ok(files)
    }
}

impl ArtifactWriter for FsArtifactWriter {
    fn write_job(&self, job_id: JobId, results: &[AnalysisResult], summary: &str) -> Result<WriteReport> {
        let job_dir = self.job_dir(job_id);
        Self::create_dir(&job_dir)?;

        let mut manifest = OutputManifest {
            job_id: job_id.get(),
            ..OutputManifest::default()
        };

        let mut seen = HashSet::new();
        for result in results {
            let entry = self.write_resource(&job_dir, result)?;
            if !seen.insert(entry.directory.clone()) {
                warn!(job_id = %job_id, directory = %entry.directory, "resource directory collision, later resource overwrites earlier files");
            }
            manifest.resources.push(entry);
        }

        Self::write_file(&job_dir.join(SUMMARY_FILE), summary)?;
        manifest.consolidated.push(SUMMARY_FILE.to_string());

        if self.options.infra_templates {
            manifest.consolidated.extend(self.write_terraform(&job_dir, results)?);
        }
        if self.options.config_templates {
            manifest.consolidated.extend(self.write_ansible(&job_dir, results)?);
        }

        let bytes = serde_json::to_vec_pretty(&manifest)?;
        let manifest_path = job_dir.join(MANIFEST_FILE);
        std::fs::write(&manifest_path, bytes).with_context(|| format!("write manifest {}", manifest_path.display()))?;

        debug!(job_id = %job_id, resources = results.len(), dir = %job_dir.display(), "artifacts written");
        Ok(WriteReport { job_dir, manifest })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pxb_core::{Artifacts, ResourceDescriptor, ResourceKind};
    use serde_json::json;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn resource(id: &str, name: &str, kind: ResourceKind) -> ResourceDescriptor {
        ResourceDescriptor {
            id: id.into(),
            name: name.into(),
            kind,
            location: "pve1".into(),
            status: "running".into(),
            config: json!({"memory": 1024, "name": name}),
        }
    }

    fn full(id: &str, name: &str) -> AnalysisResult {
        AnalysisResult::success(
            resource(id, name, ResourceKind::Vm),
            Artifacts {
                analysis: format!("{name} serves HTTP"),
                security_review: Some("no firewall".into()),
                optimization_recommendations: Some("reduce memory".into()),
                infra_template: Some(format!("resource \"proxmox_vm_qemu\" \"vm_{id}\" {{}}")),
                config_template: Some("- hosts: all\n  tasks: []\n".into()),
            },
        )
    }

    fn results() -> Vec<AnalysisResult> {
        vec![
            full("100", "web/app 1"),
            AnalysisResult::failed(resource("101", "db", ResourceKind::Container), "Error: timeout"),
            full("102", "cache"),
        ]
    }

    fn snapshot(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
        let mut out = BTreeMap::new();
        let mut stack = vec![dir.to_path_buf()];
        while let Some(d) = stack.pop() {
            for entry in std::fs::read_dir(&d).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    stack.push(path);
                } else {
                    out.insert(path.strip_prefix(dir).unwrap().to_path_buf(), std::fs::read(&path).unwrap());
                }
            }
        }
        out
    }

    #[test]
    fn writes_per_resource_files() {
        let dir = tempdir().unwrap();
        let writer = FsArtifactWriter::new(dir.path().to_path_buf());
        let report = writer.write_job(JobId(1), &results(), "two VMs, one container").unwrap();

        let vm_dir = report.job_dir.join("qemu_web_app_1_100");
        for f in ["analysis.md", "security_review.md", "optimization_recommendations.md", "main.tf", "playbook.yml", "config.json"] {
            assert!(vm_dir.join(f).exists(), "missing {f}");
        }

        let failed_dir = report.job_dir.join("lxc_db_101");
        assert_eq!(std::fs::read_to_string(failed_dir.join("analysis.md")).unwrap(), "Error: timeout");
        assert!(failed_dir.join("config.json").exists());
        assert!(!failed_dir.join("main.tf").exists());

        let config: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(vm_dir.join("config.json")).unwrap()).unwrap();
        assert_eq!(config["memory"], 1024);

        let summary = std::fs::read_to_string(report.job_dir.join(SUMMARY_FILE)).unwrap();
        assert_eq!(summary, "two VMs, one container");
    }

    #[test]
    fn consolidated_terraform_has_section_per_template_in_order() {
        let dir = tempdir().unwrap();
        let writer = FsArtifactWriter::new(dir.path().to_path_buf());
        let report = writer.write_job(JobId(2), &results(), "s").unwrap();

        let main_tf = std::fs::read_to_string(report.job_dir.join("terraform/main.tf")).unwrap();
        assert!(main_tf.starts_with(templates::TERRAFORM_HEADER));
        let first = main_tf.find("# web/app 1 (100)").unwrap();
        let second = main_tf.find("# cache (102)").unwrap();
        assert!(first < second);
        assert!(!main_tf.contains("(101)"));
        assert!(report.job_dir.join("terraform/variables.tf").exists());
        assert!(report.job_dir.join("terraform/README.md").exists());
    }

    #[test]
    fn consolidated_ansible_imports_each_playbook() {
        let dir = tempdir().unwrap();
        let writer = FsArtifactWriter::new(dir.path().to_path_buf());
        let report = writer.write_job(JobId(3), &results(), "s").unwrap();

        let site = std::fs::read_to_string(report.job_dir.join("ansible/site.yml")).unwrap();
        assert!(site.contains("- import_playbook: playbooks/web_app_1_100.yml"));
        assert!(site.contains("- import_playbook: playbooks/cache_102.yml"));
        assert!(report.job_dir.join("ansible/playbooks/cache_102.yml").exists());
        assert!(!report.job_dir.join("ansible/playbooks/db_101.yml").exists());
    }

    #[test]
    fn disabled_categories_are_skipped() {
        let dir = tempdir().unwrap();
        let writer = FsArtifactWriter::new(dir.path().to_path_buf()).with_options(WriterOptions {
            infra_templates: false,
            config_templates: false,
        });
        let report = writer.write_job(JobId(4), &results(), "s").unwrap();
        assert!(!report.job_dir.join(TERRAFORM_DIR).exists());
        assert!(!report.job_dir.join(ANSIBLE_DIR).exists());
        assert_eq!(report.manifest.consolidated, vec![SUMMARY_FILE.to_string()]);
    }

    #[test]
    fn rewriting_is_byte_identical() {
        let dir = tempdir().unwrap();
        let writer = FsArtifactWriter::new(dir.path().to_path_buf());
        let first = writer.write_job(JobId(5), &results(), "summary").unwrap();
        let before = snapshot(&first.job_dir);
        let second = writer.write_job(JobId(5), &results(), "summary").unwrap();
        assert_eq!(before, snapshot(&second.job_dir));
    }

    #[test]
    fn shrunk_rerun_keeps_stale_dirs_but_manifest_lists_current() {
        let dir = tempdir().unwrap();
        let writer = FsArtifactWriter::new(dir.path().to_path_buf());
        writer.write_job(JobId(6), &results(), "s").unwrap();
        let report = writer.write_job(JobId(6), &results()[..1], "s").unwrap();

        assert!(report.job_dir.join("qemu_cache_102").exists());
        let dirs: Vec<_> = report.manifest.resources.iter().map(|e| e.directory.as_str()).collect();
        assert_eq!(dirs, vec!["qemu_web_app_1_100"]);
        let on_disk: OutputManifest =
            serde_json::from_slice(&std::fs::read(report.job_dir.join(MANIFEST_FILE)).unwrap()).unwrap();
        assert_eq!(on_disk, report.manifest);
    }
}

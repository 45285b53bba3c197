//! Prompt text for each artifact kind.

use pxb_core::{AnalysisResult, ClusterContext, ResourceDescriptor, ResourceKind};

const EXCERPT_CHARS: usize = 400;

fn pretty(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn header(resource: &ResourceDescriptor) -> String {
    format!(
        "Resource:\n- ID: {}\n- Name: {}\n- Type: {}\n- Node: {}\n- Status: {}\n\nConfiguration:\n{}\n",
        resource.id,
        resource.name,
        resource.kind.as_str(),
        resource.location,
        resource.status,
        pretty(&resource.config)
    )
}

fn kind_label(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Vm => "virtual machine",
        ResourceKind::Container => "LXC container",
    }
}

pub fn analysis(resource: &ResourceDescriptor, context: Option<&ClusterContext>) -> String {
    let context = match context {
        Some(ctx) => serde_json::to_string_pretty(ctx).unwrap_or_default(),
        None => "No cluster context available.".to_string(),
    };
    format!(
        "You are auditing a Proxmox {} as part of an infrastructure inventory.\n\n{}\nCluster context:\n{}\n\n\
         Document this resource in two or three paragraphs covering its likely purpose, \
         how CPU, memory, disk and network are allocated, the services it appears to run, \
         what it probably depends on, and how closely its configuration follows good practice.",
        kind_label(resource.kind),
        header(resource),
        context
    )
}

pub fn security_review(resource: &ResourceDescriptor) -> String {
    format!(
        "Review the security posture of this Proxmox {}.\n\n{}\n\
         List concrete findings with a severity (critical, high, medium, low) each. \
         Consider network exposure, privilege settings (for containers: unprivileged flag and nesting), \
         firewall configuration, backups, and anything else visible in the configuration. \
         Finish with prioritized remediation steps.",
        kind_label(resource.kind),
        header(resource)
    )
}

pub fn optimization(resource: &ResourceDescriptor) -> String {
    format!(
        "Suggest optimizations for this Proxmox {}.\n\n{}\n\
         Cover CPU and memory sizing, storage format and cache settings, network model, \
         and high-availability or backup options. Give each suggestion an expected impact.",
        kind_label(resource.kind),
        header(resource)
    )
}

pub fn terraform(resource: &ResourceDescriptor) -> String {
    let resource_type = match resource.kind {
        ResourceKind::Vm => "proxmox_vm_qemu",
        ResourceKind::Container => "proxmox_lxc",
    };
    format!(
        "Write a Terraform resource block that reproduces this Proxmox {} using the Telmate/proxmox provider \
         resource type `{}`.\n\n{}\n\
         Output only HCL. Do not include provider or terraform blocks; they are defined elsewhere. \
         Use variables for secrets and add short comments where a value needs review.",
        kind_label(resource.kind),
        resource_type,
        header(resource)
    )
}

pub fn ansible(resource: &ResourceDescriptor) -> String {
    let module = match resource.kind {
        ResourceKind::Vm => "community.general.proxmox_kvm",
        ResourceKind::Container => "community.general.proxmox",
    };
    format!(
        "Write an Ansible playbook that provisions this Proxmox {} with the `{}` module.\n\n{}\n\
         Output only YAML. Read API credentials from variables and keep the playbook idempotent.",
        kind_label(resource.kind),
        module,
        header(resource)
    )
}

fn excerpt(text: &str) -> String {
    if text.chars().count() <= EXCERPT_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(EXCERPT_CHARS).collect();
    format!("{cut}...")
}

pub fn summary(results: &[AnalysisResult], context: &ClusterContext) -> String {
    let vms = results.iter().filter(|r| r.resource().kind == ResourceKind::Vm).count();
    let containers = results.len() - vms;
    let failed = results.iter().filter(|r| r.is_error()).count();

    let mut sections = String::new();
    for r in results {
        let res = r.resource();
        sections.push_str(&format!(
            "\n## {} ({}, {}, node {})\n{}\n",
            res.name,
            res.id,
            res.kind.as_str(),
            res.location,
            excerpt(&r.artifacts().analysis)
        ));
    }

    format!(
        "Write an executive summary of this Proxmox cluster.\n\n\
         Totals: {} resources ({} VMs, {} containers), {} could not be analyzed.\n\
         Nodes: {}\n\nPer-resource findings:\n{}\n\
         Summarize the overall architecture, shared risks, capacity concerns and the most \
         valuable next steps. Use Markdown headings.",
        results.len(),
        vms,
        containers,
        failed,
        context.nodes.join(", "),
        sections
    )
}

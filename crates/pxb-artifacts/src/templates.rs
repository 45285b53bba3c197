//! Static text for the consolidated Terraform and Ansible directories.

pub const TERRAFORM_HEADER: &str = r#"# Proxmox infrastructure generated by pxb

terraform {
  required_providers {
    proxmox = {
      source  = "Telmate/proxmox"
      version = "~> 2.9"
    }
  }
}

provider "proxmox" {
  pm_api_url          = var.proxmox_api_url
  pm_api_token_id     = var.proxmox_api_token_id
  pm_api_token_secret = var.proxmox_api_token_secret
  pm_tls_insecure     = true
}
"#;

pub const TERRAFORM_VARIABLES: &str = r#"variable "proxmox_api_url" {
  description = "Proxmox API URL, e.g. https://pve.example:8006/api2/json"
  type        = string
}

variable "proxmox_api_token_id" {
  description = "Proxmox API token id (user@realm!token)"
  type        = string
}

variable "proxmox_api_token_secret" {
  description = "Proxmox API token secret"
  type        = string
  sensitive   = true
}
"#;

pub const TERRAFORM_README: &str = r#"# Terraform

Generated Terraform definitions for the analyzed Proxmox resources.
Review every resource block before applying.

## Usage

```bash
terraform init
terraform plan
terraform apply
```

## Variables

Provide these through `terraform.tfvars` or `TF_VAR_*` environment variables:

- `proxmox_api_url`
- `proxmox_api_token_id`
- `proxmox_api_token_secret`
"#;

pub const ANSIBLE_SITE_HEADER: &str = r#"---
# Proxmox infrastructure generated by pxb
# Each entry imports the playbook generated for one resource.
"#;

pub const ANSIBLE_README: &str = r#"# Ansible

Generated playbooks for the analyzed Proxmox resources.

## Usage

```bash
ansible-galaxy collection install community.general
ansible-playbook -i inventory/hosts.yml site.yml
```

Run a single resource with `ansible-playbook -i inventory/hosts.yml playbooks/<name>_<id>.yml`.

## Layout

- `site.yml` imports every generated playbook
- `playbooks/` holds one playbook per VM or container
"#;

/// Label placed above each resource's section in consolidated files.
pub fn section_label(name: &str, id: &str) -> String {
    format!("# {name} ({id})")
}

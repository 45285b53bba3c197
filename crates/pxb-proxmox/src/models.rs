//! Wire shapes of the Proxmox VE API responses this crate reads.

use std::fmt;

use pxb_core::{ResourceDescriptor, ResourceKind};
use serde::Deserialize;
use serde_json::Value;

/// Every PVE response wraps its payload in `{"data": ...}`.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeEntry {
    pub node: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// `vmid` is a number for QEMU guests but some PVE releases return a string for LXC.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum GuestId {
    Num(u64),
    Text(String),
}

impl fmt::Display for GuestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuestId::Num(n) => write!(f, "{n}"),
            GuestId::Text(s) => f.write_str(s),
        }
    }
}

/// One row of `GET /nodes/{node}/qemu` or `/nodes/{node}/lxc`.
#[derive(Debug, Clone, Deserialize)]
pub struct GuestEntry {
    pub vmid: GuestId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TicketData {
    pub ticket: String,
    #[serde(rename = "CSRFPreventionToken")]
    pub csrf_token: String,
}

pub fn default_name(kind: ResourceKind, id: &str) -> String {
    match kind {
        ResourceKind::Vm => format!("VM-{id}"),
        ResourceKind::Container => format!("LXC-{id}"),
    }
}

pub fn to_descriptor(node: &str, kind: ResourceKind, guest: GuestEntry, config: Value) -> ResourceDescriptor {
    let id = guest.vmid.to_string();
    let name = guest
        .name
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| default_name(kind, &id));
    ResourceDescriptor {
        name,
        id,
        kind,
        location: node.to_string(),
        status: guest.status.unwrap_or_else(|| "unknown".to_string()),
        config,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn guest_id_accepts_number_or_string() {
        let rows: Envelope<Vec<GuestEntry>> = serde_json::from_value(json!({
            "data": [
                {"vmid": 100, "name": "web", "status": "running"},
                {"vmid": "101", "status": "stopped"}
            ]
        }))
        .unwrap();
        assert_eq!(rows.data[0].vmid.to_string(), "100");
        assert_eq!(rows.data[1].vmid, GuestId::Text("101".into()));
    }

    #[test]
    fn descriptor_defaults() {
        let guest = GuestEntry {
            vmid: GuestId::Num(105),
            name: None,
            status: None,
        };
        let d = to_descriptor("pve2", ResourceKind::Container, guest, json!({}));
        assert_eq!(d.name, "LXC-105");
        assert_eq!(d.status, "unknown");
        assert_eq!(d.location, "pve2");
        assert_eq!(d.kind, ResourceKind::Container);
    }

    #[test]
    fn ticket_parses_csrf_field() {
        let t: Envelope<TicketData> = serde_json::from_value(json!({
            "data": {"ticket": "PVE:root@pam:ABC", "CSRFPreventionToken": "tok", "username": "root@pam"}
        }))
        .unwrap();
        assert_eq!(t.data.csrf_token, "tok");
    }
}

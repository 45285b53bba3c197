use serde::{Deserialize, Serialize};

/// Listing of what one writer pass produced under a job directory.
///
/// Deliberately free of timestamps so repeated passes over the same input produce
/// identical bytes.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutputManifest {
    pub job_id: i64,
    pub resources: Vec<ManifestEntry>,
    pub consolidated: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestEntry {
    pub resource_id: String,
    pub kind: String,
    pub directory: String,
    pub files: Vec<String>,
    pub error: bool,
}

use crate::ids::JobId;

/// Result of a full-analysis run that did not fail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(JobId),
    /// Inventory was empty; no job was created.
    NoWork,
}

impl RunOutcome {
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            RunOutcome::Completed(id) => Some(*id),
            RunOutcome::NoWork => None,
        }
    }
}

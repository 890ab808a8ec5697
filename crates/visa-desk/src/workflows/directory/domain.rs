use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier wrapper for registered applicants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApplicantId(pub String);

impl fmt::Display for ApplicantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub String);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Person requesting visa processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Applicant {
    pub id: ApplicantId,
    pub name: String,
    pub email: Option<String>,
    pub national_id: Option<String>,
    pub visa_type: Option<String>,
}

impl Applicant {
    /// Address notifications are delivered to.
    pub fn contact(&self) -> &str {
        self.email
            .as_deref()
            .filter(|email| !email.trim().is_empty())
            .unwrap_or(&self.name)
    }

    /// Top-level folder for the applicant's stored documents.
    pub fn storage_owner(&self) -> &str {
        self.national_id
            .as_deref()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or(&self.id.0)
    }
}

/// Intake payload for a new applicant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewApplicant {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub national_id: Option<String>,
}

/// Staff member who services appointments and reviews documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub active: bool,
}

/// Deterministic agent ordering: by name, then id.
pub fn sort_agents(agents: &mut [Agent]) {
    agents.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
}

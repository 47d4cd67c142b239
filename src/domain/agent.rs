use serde::{Deserialize, Serialize};

/// An agent the signed-in user is allowed to configure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSummary {
    pub id: String,
    pub name: String,
    pub organization_id: Option<String>,
    pub role: Option<String>,
}

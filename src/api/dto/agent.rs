use crate::domain::agent::AgentSummary;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AgentDto {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ManageableAgentsResponse {
    pub agents: Vec<AgentDto>,
}

impl From<AgentDto> for AgentSummary {
    fn from(dto: AgentDto) -> Self {
        Self { id: dto.id, name: dto.name, organization_id: dto.organization_id, role: dto.role }
    }
}

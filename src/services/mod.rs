pub mod agent_service;
pub mod auth_service;
pub mod realtime;
pub mod refresh;

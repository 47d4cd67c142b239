pub mod agent;
pub mod claims;
pub mod session;
pub mod user;

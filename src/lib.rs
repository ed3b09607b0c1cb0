pub mod deapi;
pub mod mcp_server;
pub mod store;
pub mod tools;

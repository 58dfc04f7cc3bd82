// Switch web-management API
//
// JSON endpoints under `/data/` on TP-Link managed switches. `SwitchClient`
// is stateless; `DeviceSession` (one level up) owns the session token.

pub mod auth;
pub mod client;
pub mod endpoint;
pub mod models;

pub use client::SwitchClient;
pub use endpoint::Endpoint;

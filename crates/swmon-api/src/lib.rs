// swmon-api: Async clients for TP-Link managed switches and InfluxDB v2

pub mod auth;
pub mod error;
pub mod influx;
pub mod session;
pub mod switch;
pub mod transport;

pub use auth::{Credentials, SessionPhase, SessionToken, TokenPlacement};
pub use error::Error;
pub use influx::{InfluxClient, InfluxConfig, LineValue, Point};
pub use session::DeviceSession;
pub use switch::{Endpoint, SwitchClient};
pub use transport::{TlsMode, TransportConfig};

// InfluxDB v2 write API

pub mod client;
pub mod line_protocol;

pub use client::{InfluxClient, InfluxConfig};
pub use line_protocol::{LineValue, Point};

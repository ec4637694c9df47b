//! Probe transport and snapshot sink used by the health prober.

pub mod http_probe;
pub mod json_sink;

pub use http_probe::HttpProbe;
pub use json_sink::JsonFileSink;

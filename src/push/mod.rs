//! Low-latency push channel: outbound video frames, inbound partial
//! telemetry updates.

pub mod channel;

pub use channel::{push_channel, PushChannel, PushError, PushHandle};

//! Telemetry fusion and alerting core of the fatigue monitoring dashboard.
//!
//! ```text
//! backend ──poll──▶ telemetry::Reconciler ◀──push── push::PushChannel ◀── frames::FramePipeline
//!                         │
//!                         ├──▶ risk::classify ──▶ alarm::AlarmStateMachine
//!                         └──▶ pose::AnimationLoop
//! ```

pub mod alarm;
pub mod app;
pub mod config;
pub mod filter;
pub mod frames;
pub mod pose;
pub mod push;
pub mod risk;
pub mod session;
pub mod telemetry;

//! Audible HIGH-risk alarm.
//!
//! [`AlarmStateMachine`] decides *when* to sound; an [`AlarmSink`] decides
//! *how*.  The production sink is [`ToneAlarm`], a cpal output stream.

pub mod machine;
pub mod sink;

pub use machine::{AlarmEvent, AlarmPhase, AlarmState, AlarmStateMachine};
pub use sink::{AlarmError, AlarmSink, ToneAlarm};

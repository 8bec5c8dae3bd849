//! Session: the async half of the dashboard and its shared status.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use fatigue_dashboard::config::AppConfig;
//! use fatigue_dashboard::session::{Session, SessionCommand};
//! use fatigue_dashboard::telemetry::lock;
//!
//! let config = AppConfig::default();
//! let mut session = Session::start(&config).unwrap();
//!
//! let snapshot = lock(&session.reconciler()).current();
//! println!("{}", snapshot.system_status.label());
//!
//! session.send(SessionCommand::Recalibrate);
//! session.shutdown();
//! ```

pub mod runner;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use runner::{command_loop, frame_loop, poll_loop, Session};
pub use state::{lock_status, new_shared_status, SessionCommand, SessionStatus, SharedStatus};

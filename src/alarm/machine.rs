//! Alarm state machine — edge-triggered playback with a mute latch.
//!
//! ```text
//! Idle ──unlock()──▶ Armed ──rising edge into HIGH──▶ Sounding
//!                      ▲                                 │
//!                      └──── falling edge out of HIGH ───┤
//!                                                        └─ mute ──▶ Muted
//! ```
//!
//! * A rising edge (previous level ≠ HIGH, new level = HIGH) starts playback
//!   once, unless muted.
//! * A falling edge stops playback unconditionally and rewinds the sound.
//! * Muting stops playback immediately; level tracking carries on, so the
//!   next rising edge while still muted stays silent.  Unmuting never starts
//!   playback by itself.
//!
//! The sink is acquired when the machine is created and released on
//! [`AlarmStateMachine::release`] or drop, whichever comes first.

use crate::risk::RiskTier;

use super::sink::AlarmSink;

// ---------------------------------------------------------------------------
// AlarmState
// ---------------------------------------------------------------------------

/// Observable alarm state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AlarmState {
    /// Level of the most recent classification.
    pub level: RiskTier,
    /// The audio resource has been primed by a user interaction.
    pub armed: bool,
    pub muted: bool,
    pub playing: bool,
}

/// Coarse phase derived from [`AlarmState`], for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmPhase {
    Idle,
    Armed,
    Sounding,
    Muted,
}

impl AlarmPhase {
    pub fn label(&self) -> &'static str {
        match self {
            AlarmPhase::Idle => "Idle",
            AlarmPhase::Armed => "Armed",
            AlarmPhase::Sounding => "Sounding",
            AlarmPhase::Muted => "Muted",
        }
    }
}

/// What a classification did to the alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmEvent {
    /// Rising edge; playback started.
    Started,
    /// Rising edge while muted (or the sink refused); nothing plays.
    Suppressed,
    /// Falling edge; playback stopped.
    Stopped,
    Unchanged,
}

// ---------------------------------------------------------------------------
// AlarmStateMachine
// ---------------------------------------------------------------------------

pub struct AlarmStateMachine<S: AlarmSink> {
    sink: S,
    state: AlarmState,
    released: bool,
}

impl<S: AlarmSink> AlarmStateMachine<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            state: AlarmState::default(),
            released: false,
        }
    }

    /// Feed the level of a new classification.
    pub fn on_classification(&mut self, level: RiskTier) -> AlarmEvent {
        let previous = self.state.level;
        self.state.level = level;

        if self.released {
            return AlarmEvent::Unchanged;
        }

        let rising = previous != RiskTier::High && level == RiskTier::High;
        let falling = previous == RiskTier::High && level != RiskTier::High;

        if rising {
            if self.state.muted {
                log::info!("alarm: HIGH risk while muted; staying silent");
                return AlarmEvent::Suppressed;
            }
            match self.sink.play() {
                Ok(()) => {
                    log::info!("alarm: HIGH risk; sounding");
                    self.state.playing = true;
                    AlarmEvent::Started
                }
                Err(e) => {
                    log::warn!("alarm: could not start playback: {e}");
                    AlarmEvent::Suppressed
                }
            }
        } else if falling {
            self.sink.stop();
            self.state.playing = false;
            log::info!("alarm: risk dropped to {}; stopped", level.label());
            AlarmEvent::Stopped
        } else {
            AlarmEvent::Unchanged
        }
    }

    /// Set the mute latch.  Muting stops playback at once.
    pub fn set_muted(&mut self, muted: bool) {
        if muted && self.state.playing {
            self.sink.stop();
            self.state.playing = false;
        }
        if self.state.muted != muted {
            log::info!("alarm: {}", if muted { "muted" } else { "unmuted" });
        }
        self.state.muted = muted;
    }

    /// Flip the mute latch; returns the new value.
    pub fn toggle_mute(&mut self) -> bool {
        let muted = !self.state.muted;
        self.set_muted(muted);
        muted
    }

    /// Prime the audio resource from a user interaction.  Safe to call any
    /// number of times; a failure leaves the alarm unprimed without error.
    ///
    /// A HIGH level that could not sound before the audio was primed starts
    /// sounding here, unless muted.
    pub fn unlock(&mut self) {
        if self.released || self.state.armed {
            return;
        }
        match self.sink.prime() {
            Ok(()) => {
                log::debug!("alarm: audio primed");
                self.state.armed = true;
            }
            Err(e) => {
                log::debug!("alarm: audio not available: {e}");
                return;
            }
        }

        if self.state.level == RiskTier::High && !self.state.muted && !self.state.playing {
            match self.sink.play() {
                Ok(()) => {
                    log::info!("alarm: HIGH risk pending since before unlock; sounding");
                    self.state.playing = true;
                }
                Err(e) => log::warn!("alarm: could not start playback: {e}"),
            }
        }
    }

    /// Stop and release the audio resource.  Idempotent.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.sink.stop();
        self.sink.release();
        self.state.playing = false;
        self.state.armed = false;
        self.released = true;
        log::debug!("alarm: released");
    }

    pub fn state(&self) -> AlarmState {
        self.state
    }

    pub fn phase(&self) -> AlarmPhase {
        if self.state.muted {
            AlarmPhase::Muted
        } else if self.state.playing {
            AlarmPhase::Sounding
        } else if self.state.armed {
            AlarmPhase::Armed
        } else {
            AlarmPhase::Idle
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

impl<S: AlarmSink> Drop for AlarmStateMachine<S> {
    fn drop(&mut self) {
        self.release();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Frame scheduling for the pose animator.
//!
//! The UI framework owns the redraw loop; [`AnimationLoop`] is the handle
//! the panel holds to start, drive and cancel the animation.  While
//! running it asks for a repaint every [`FRAME_INTERVAL`]; once cancelled
//! it stops ticking and stops requesting frames.

use std::time::Duration;

use super::animator::{DisplayPose, PoseAnimator, PoseTarget};
use crate::config::PoseConfig;

/// Target redraw period (~60 fps).
pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);

pub struct AnimationLoop {
    animator: PoseAnimator,
    running: bool,
    frames: u64,
}

impl AnimationLoop {
    pub fn new(config: PoseConfig) -> Self {
        Self {
            animator: PoseAnimator::new(config),
            running: false,
            frames: 0,
        }
    }

    pub fn start(&mut self) {
        if !self.running {
            log::debug!("pose animation started");
        }
        self.running = true;
    }

    /// Stop ticking.  The animator keeps its last pose.
    pub fn cancel(&mut self) {
        if self.running {
            log::debug!("pose animation cancelled after {} frames", self.frames);
        }
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Run one animation frame.  Returns a new display pose when one should
    /// be rendered; `None` when cancelled or nothing moved.
    pub fn frame(&mut self, target: PoseTarget) -> Option<DisplayPose> {
        if !self.running {
            return None;
        }
        self.frames += 1;
        self.animator.tick(target)
    }

    /// When the next frame should be scheduled, if at all.
    pub fn next_frame_in(&self) -> Option<Duration> {
        self.running.then_some(FRAME_INTERVAL)
    }

    /// Pose to draw this frame.
    pub fn display(&self) -> DisplayPose {
        self.animator.display()
    }

    pub fn animator(&self) -> &PoseAnimator {
        &self.animator
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Drop for AnimationLoop {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nod() -> PoseTarget {
        PoseTarget {
            pitch: 20.0,
            ..PoseTarget::default()
        }
    }

    #[test]
    fn idle_until_started() {
        let mut l = AnimationLoop::new(PoseConfig::default());
        assert!(l.frame(nod()).is_none());
        assert_eq!(l.next_frame_in(), None);
        assert_eq!(l.frames(), 0);
    }

    #[test]
    fn running_loop_ticks_and_schedules() {
        let mut l = AnimationLoop::new(PoseConfig::default());
        l.start();
        l.start();
        assert!(l.frame(nod()).is_some());
        assert_eq!(l.next_frame_in(), Some(FRAME_INTERVAL));
        assert_eq!(l.frames(), 1);
        assert!((l.display().pitch - 2.0).abs() < 1e-9);
    }

    #[test]
    fn cancel_freezes_pose() {
        let mut l = AnimationLoop::new(PoseConfig::default());
        l.start();
        l.frame(nod());
        l.cancel();
        let frozen = l.display();
        assert!(l.frame(nod()).is_none());
        assert_eq!(l.display(), frozen);
        assert!(!l.is_running());
        assert_eq!(l.animator().state().filtered_target_x, 20.0);
    }
}

//! Head-pose animation: smoothing ([`PoseAnimator`]) and its frame handle
//! ([`AnimationLoop`]).

pub mod animator;
pub mod schedule;

pub use animator::{DisplayPose, PoseAnimationState, PoseAnimator, PoseTarget};
pub use schedule::{AnimationLoop, FRAME_INTERVAL};

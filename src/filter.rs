//! Stateless smoothing primitives shared by the pose and jaw-openness signals.
//!
//! None of these functions keep state between calls; the caller owns the
//! "last accepted" / "current" values and feeds them back in.
//!
//! ```
//! use fatigue_dashboard::filter::{clamp, deadzone, lerp};
//!
//! assert_eq!(clamp(55.0, -40.0, 40.0), 40.0);
//! assert_eq!(deadzone(10.4, 10.0, 1.0), 10.0);
//! assert_eq!(deadzone(12.0, 10.0, 1.0), 12.0);
//! assert_eq!(lerp(0.0, 10.0, 0.5, 0.01), 5.0);
//! ```

/// Restrict `value` to `[min, max]`.
pub fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}

/// Returns `candidate` when it moved more than `threshold` away from
/// `last_accepted`, otherwise `last_accepted` unchanged.
pub fn deadzone(candidate: f64, last_accepted: f64, threshold: f64) -> f64 {
    if (candidate - last_accepted).abs() > threshold {
        candidate
    } else {
        last_accepted
    }
}

/// One exponential-interpolation step from `current` toward `target`.
///
/// When the step lands within `settle_epsilon` of `target` the result is
/// `target` exactly, so repeated application terminates instead of creeping
/// asymptotically.
pub fn lerp(current: f64, target: f64, alpha: f64, settle_epsilon: f64) -> f64 {
    let next = current + (target - current) * alpha;
    if (next - target).abs() < settle_epsilon {
        target
    } else {
        next
    }
}

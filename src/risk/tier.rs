//! Risk tiers and the classifier's output types.

// ---------------------------------------------------------------------------
// RiskTier
// ---------------------------------------------------------------------------

/// Discrete fatigue risk, totally ordered `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum RiskTier {
    #[default]
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub fn label(&self) -> &'static str {
        match self {
            RiskTier::Low => "LOW",
            RiskTier::Medium => "MEDIUM",
            RiskTier::High => "HIGH",
        }
    }
}

// ---------------------------------------------------------------------------
// Classification / Assessment
// ---------------------------------------------------------------------------

/// A classified snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub level: RiskTier,
    /// The rule that set `level`.
    pub reason: String,
    /// Every rule that fired in the pass, in evaluation order.
    pub factors: Vec<String>,
}

/// Outcome of classifying one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum Assessment {
    /// No face in frame; nothing was classified.
    Searching,
    Classified(Classification),
}

impl Assessment {
    /// Tier the alarm acts on.  `Searching` counts as `Low`.
    pub fn alarm_level(&self) -> RiskTier {
        match self {
            Assessment::Searching => RiskTier::Low,
            Assessment::Classified(c) => c.level,
        }
    }

    pub fn classification(&self) -> Option<&Classification> {
        match self {
            Assessment::Searching => None,
            Assessment::Classified(c) => Some(c),
        }
    }

    /// Headline for the status card.
    pub fn label(&self) -> &'static str {
        match self {
            Assessment::Searching => "SEARCHING",
            Assessment::Classified(c) => c.level.label(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_are_ordered() {
        assert!(RiskTier::Low < RiskTier::Medium);
        assert!(RiskTier::Medium < RiskTier::High);
        assert_eq!(RiskTier::High.max(RiskTier::Medium), RiskTier::High);
        assert_eq!(RiskTier::default(), RiskTier::Low);
    }

    #[test]
    fn searching_alarms_as_low() {
        assert_eq!(Assessment::Searching.alarm_level(), RiskTier::Low);
        assert_eq!(Assessment::Searching.label(), "SEARCHING");
        assert!(Assessment::Searching.classification().is_none());
    }

    #[test]
    fn classified_alarms_at_its_level() {
        let a = Assessment::Classified(Classification {
            level: RiskTier::High,
            reason: "Eyes closed".into(),
            factors: vec!["Eyes closed".into()],
        });
        assert_eq!(a.alarm_level(), RiskTier::High);
        assert_eq!(a.label(), "HIGH");
    }
}

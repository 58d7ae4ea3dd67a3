/// Badge tiers derived from burn percentage
///
/// The dashboard owns the canonical thresholds; this ladder is the local
/// default consumed by the ledger when publishing aggregates.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeTier {
    /// Under 25% burned - fees mostly extracted
    Arsonist,
    /// 25% to under 50% burned
    Ember,
    /// 50% to under 75% burned
    Flame,
    /// 75% and up
    Inferno,
}

impl BadgeTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            BadgeTier::Arsonist => "arsonist",
            BadgeTier::Ember => "ember",
            BadgeTier::Flame => "flame",
            BadgeTier::Inferno => "inferno",
        }
    }
}

impl std::fmt::Display for BadgeTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Map a burn percentage in [0, 100] to its badge tier
pub fn tier(burn_percentage: f64) -> BadgeTier {
    if burn_percentage >= 75.0 {
        BadgeTier::Inferno
    } else if burn_percentage >= 50.0 {
        BadgeTier::Flame
    } else if burn_percentage >= 25.0 {
        BadgeTier::Ember
    } else {
        BadgeTier::Arsonist
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(tier(0.0), BadgeTier::Arsonist);
        assert_eq!(tier(24.99), BadgeTier::Arsonist);
        assert_eq!(tier(25.0), BadgeTier::Ember);
        assert_eq!(tier(50.0), BadgeTier::Flame);
        assert_eq!(tier(75.0), BadgeTier::Inferno);
        assert_eq!(tier(100.0), BadgeTier::Inferno);
    }
}

//! AI-generated analysis types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::fingerprint::Fingerprint;
use crate::time::Timestamp;

/// Voting recommendation vocabulary used by analysis providers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    Approve,
    Reject,
    Abstain,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "APPROVE",
            Self::Reject => "REJECT",
            Self::Abstain => "ABSTAIN",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Three-level risk scale, used both for a subscriber's declared tolerance
/// and for an analysis' risk assessment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The structured output of one provider call, before the cache stamps it
/// with a fingerprint and TTL.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// Tag of the provider that produced this verdict (`primary`, `fast`,
    /// `local`, or `fallback`).
    pub provider: String,
    pub recommendation: Recommendation,
    /// Confidence in `[0, 1]`; `0.0` for the deterministic fallback.
    pub confidence: f64,
    pub reasoning: String,
    pub risk_assessment: RiskLevel,
    /// Optional free-form sections (SWOT, PESTEL, stakeholder impact,
    /// implementation assessment), keyed by section name.
    #[serde(default)]
    pub sections: BTreeMap<String, String>,
}

impl Verdict {
    /// The deterministic analysis emitted when every provider fails.
    pub fn fallback() -> Self {
        Self {
            provider: "fallback".to_string(),
            recommendation: Recommendation::Abstain,
            confidence: 0.0,
            reasoning: "no provider available".to_string(),
            risk_assessment: RiskLevel::High,
            sections: BTreeMap::new(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.provider == "fallback"
    }
}

/// A cached analysis: one per fingerprint, the latest wins.
///
/// Invariants: `expires_at > created_at`; recommendation and confidence are
/// always set together (they arrive in one [`Verdict`]).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub fingerprint: Fingerprint,
    pub verdict: Verdict,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
}

impl Analysis {
    /// Whether the cache may still serve this entry at `now`.
    pub fn is_fresh(&self, now: Timestamp) -> bool {
        now < self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_verdict_matches_the_contract() {
        let v = Verdict::fallback();
        assert_eq!(v.recommendation, Recommendation::Abstain);
        assert_eq!(v.confidence, 0.0);
        assert_eq!(v.reasoning, "no provider available");
        assert_eq!(v.risk_assessment, RiskLevel::High);
        assert!(v.is_fallback());
    }

    #[test]
    fn recommendation_serializes_screaming_snake() {
        let json = serde_json::to_string(&Recommendation::Approve).unwrap();
        assert_eq!(json, "\"APPROVE\"");
        let back: Recommendation = serde_json::from_str("\"REJECT\"").unwrap();
        assert_eq!(back, Recommendation::Reject);
    }

    #[test]
    fn freshness_is_exclusive_at_expiry() {
        let a = Analysis {
            fingerprint: Fingerprint::new([0u8; 16]),
            verdict: Verdict::fallback(),
            created_at: Timestamp::new(100),
            expires_at: Timestamp::new(200),
        };
        assert!(a.is_fresh(Timestamp::new(199)));
        assert!(!a.is_fresh(Timestamp::new(200)));
    }
}

//! Advice rendering: one analysis plus one subscriber policy in, one
//! notification-ready advice out.
//!
//! Pure functions; given identical analysis and policy inputs the rendered
//! fields are byte-identical except `created_at`.

use govwatch_types::{Advice, Analysis, Decision, Proposal, RiskLevel, Subscriber, Timestamp};

/// One-line policy-alignment statement for the top of the rationale.
fn alignment_line(tolerance: RiskLevel, assessment: RiskLevel) -> String {
    if assessment <= tolerance {
        format!(
            "Assessed risk {assessment} is within your declared {tolerance} risk tolerance."
        )
    } else {
        format!(
            "Assessed risk {assessment} exceeds your declared {tolerance} risk tolerance; \
             weigh this recommendation with extra caution."
        )
    }
}

/// Materialize the advice for one `(proposal, subscriber)` pair.
///
/// The fallback analysis skips the alignment preamble so its rationale
/// starts with the fallback reasoning itself.
pub fn render_advice(
    proposal: &Proposal,
    analysis: &Analysis,
    subscriber: &Subscriber,
    now: Timestamp,
) -> Advice {
    let verdict = &analysis.verdict;
    let rationale = if verdict.is_fallback() {
        verdict.reasoning.clone()
    } else {
        format!(
            "{}\n{}",
            alignment_line(subscriber.policy.risk_tolerance, verdict.risk_assessment),
            verdict.reasoning
        )
    };

    Advice {
        chain_id: proposal.chain_id.clone(),
        proposal_id: proposal.proposal_id,
        subscriber_id: subscriber.subscriber_id.clone(),
        decision: Decision::from(verdict.recommendation),
        rationale,
        confidence: verdict.confidence,
        created_at: now,
    }
}

/// Notification subject: `[<ChainName>] Proposal #<id>: <title>`.
pub fn subject_line(chain_name: &str, proposal: &Proposal) -> String {
    format!(
        "[{chain_name}] Proposal #{}: {}",
        proposal.proposal_id, proposal.title
    )
}

/// Plain-text notification body.
pub fn render_body(proposal: &Proposal, advice: &Advice) -> String {
    format!(
        "Recommendation: {}\nConfidence: {:.2}\nStatus: {}\n\n{}\n",
        advice.decision, advice.confidence, proposal.status, advice.rationale
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use govwatch_types::{
        ChainId, Fingerprint, Policy, ProposalStatus, Recommendation, SubscriberId, Verdict,
    };
    use std::collections::BTreeSet;

    fn proposal() -> Proposal {
        Proposal {
            chain_id: ChainId::new("osmosis-1"),
            proposal_id: 848,
            title: "Increase taker fees".to_string(),
            description: "body".to_string(),
            status: ProposalStatus::Voting,
            submit_time: Timestamp::new(0),
            voting_start: None,
            voting_end: None,
            proposer: String::new(),
            proposal_type: String::new(),
        }
    }

    fn subscriber(tolerance: RiskLevel) -> Subscriber {
        Subscriber {
            subscriber_id: SubscriberId::new("sub-A"),
            address: "govops@example.com".to_string(),
            chains: BTreeSet::from([ChainId::new("osmosis-1")]),
            policy: Policy {
                risk_tolerance: tolerance,
                ..Policy::default()
            },
            active: true,
            active_until: Timestamp::new(2_000_000_000),
        }
    }

    fn analysis(verdict: Verdict) -> Analysis {
        Analysis {
            fingerprint: Fingerprint::of(&proposal()),
            verdict,
            created_at: Timestamp::new(1_000),
            expires_at: Timestamp::new(90_000),
        }
    }

    fn approve_verdict() -> Verdict {
        Verdict {
            provider: "primary".to_string(),
            recommendation: Recommendation::Approve,
            confidence: 0.85,
            reasoning: "Economically sound".to_string(),
            risk_assessment: RiskLevel::Low,
            sections: Default::default(),
        }
    }

    #[test]
    fn approve_maps_to_yes_with_alignment_preamble() {
        let advice = render_advice(
            &proposal(),
            &analysis(approve_verdict()),
            &subscriber(RiskLevel::Low),
            Timestamp::new(2_000),
        );
        assert_eq!(advice.decision, Decision::Yes);
        assert_eq!(advice.confidence, 0.85);
        assert!(advice.rationale.starts_with("Assessed risk LOW is within"));
        assert!(advice.rationale.ends_with("Economically sound"));
    }

    #[test]
    fn risk_above_tolerance_changes_the_preamble() {
        let mut verdict = approve_verdict();
        verdict.risk_assessment = RiskLevel::High;
        let advice = render_advice(
            &proposal(),
            &analysis(verdict),
            &subscriber(RiskLevel::Low),
            Timestamp::new(2_000),
        );
        assert!(advice.rationale.contains("exceeds your declared LOW"));
    }

    #[test]
    fn fallback_rationale_starts_with_the_fallback_reasoning() {
        let advice = render_advice(
            &proposal(),
            &analysis(Verdict::fallback()),
            &subscriber(RiskLevel::Low),
            Timestamp::new(2_000),
        );
        assert_eq!(advice.decision, Decision::Abstain);
        assert_eq!(advice.confidence, 0.0);
        assert!(advice.rationale.starts_with("no provider available"));
    }

    #[test]
    fn regeneration_is_deterministic_except_created_at() {
        let a = render_advice(
            &proposal(),
            &analysis(approve_verdict()),
            &subscriber(RiskLevel::Medium),
            Timestamp::new(2_000),
        );
        let b = render_advice(
            &proposal(),
            &analysis(approve_verdict()),
            &subscriber(RiskLevel::Medium),
            Timestamp::new(3_000),
        );
        assert_eq!(a.decision, b.decision);
        assert_eq!(a.rationale, b.rationale);
        assert_eq!(a.confidence, b.confidence);
        assert_ne!(a.created_at, b.created_at);
    }

    #[test]
    fn subject_follows_the_template() {
        assert_eq!(
            subject_line("Osmosis", &proposal()),
            "[Osmosis] Proposal #848: Increase taker fees"
        );
    }
}

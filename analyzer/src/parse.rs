//! Strict parsing of provider output into a [`Verdict`].

use std::collections::BTreeMap;

use serde::Deserialize;

use govwatch_types::{Recommendation, RiskLevel, Verdict};

#[derive(Debug, Deserialize)]
struct RawVerdict {
    recommendation: String,
    confidence: f64,
    reasoning: String,
    risk_assessment: String,
    #[serde(default)]
    sections: BTreeMap<String, String>,
}

/// Strip a leading/trailing markdown code fence if the model wrapped its
/// JSON in one.
fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.trim_start_matches('\n')
        .strip_suffix("```")
        .unwrap_or(rest)
        .trim()
}

/// Parse one provider response strictly.
///
/// Missing required fields, out-of-range confidence, or unknown
/// recommendation/risk values are all rejected; the caller decides whether
/// a repair round is still available.
pub fn parse_verdict(raw: &str, provider: &str) -> Result<Verdict, String> {
    let body = strip_fences(raw);
    let parsed: RawVerdict =
        serde_json::from_str(body).map_err(|e| format!("not a verdict object: {e}"))?;

    let recommendation = match parsed.recommendation.as_str() {
        "APPROVE" => Recommendation::Approve,
        "REJECT" => Recommendation::Reject,
        "ABSTAIN" => Recommendation::Abstain,
        other => return Err(format!("unknown recommendation '{other}'")),
    };
    let risk_assessment = match parsed.risk_assessment.as_str() {
        "LOW" => RiskLevel::Low,
        "MEDIUM" => RiskLevel::Medium,
        "HIGH" => RiskLevel::High,
        other => return Err(format!("unknown risk assessment '{other}'")),
    };
    if !(0.0..=1.0).contains(&parsed.confidence) || parsed.confidence.is_nan() {
        return Err(format!("confidence {} out of range", parsed.confidence));
    }
    if parsed.reasoning.trim().is_empty() {
        return Err("empty reasoning".to_string());
    }

    Ok(Verdict {
        provider: provider.to_string(),
        recommendation,
        confidence: parsed.confidence,
        reasoning: parsed.reasoning,
        risk_assessment,
        sections: parsed.sections,
    })
}

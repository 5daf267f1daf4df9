//! Deterministic prompt construction.
//!
//! The prompt has three layers: a fixed system preamble with the output
//! schema, a category/chain block, and the proposal plus policy verbatim.
//! Identical `(proposal, policy)` inputs produce byte-identical prompts.

use std::fmt::Write as _;

use govwatch_types::{Policy, Proposal};

/// Proposal category chosen by keyword matching.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Category {
    ParameterChange,
    CommunityPoolSpend,
    Upgrade,
    Ibc,
    Text,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ParameterChange => "PARAMETER_CHANGE",
            Self::CommunityPoolSpend => "COMMUNITY_POOL_SPEND",
            Self::Upgrade => "UPGRADE",
            Self::Ibc => "IBC",
            Self::Text => "TEXT",
            Self::Other => "OTHER",
        }
    }
}

/// Keyword table, checked in fixed order; the first category with a hit
/// wins.
const CATEGORY_KEYWORDS: &[(Category, &[&str])] = &[
    (
        Category::ParameterChange,
        &["parameter", "param change", "fee", "deposit amount", "quorum", "threshold"],
    ),
    (
        Category::CommunityPoolSpend,
        &["community pool", "community spend", "funding", "grant", "treasury"],
    ),
    (
        Category::Upgrade,
        &["upgrade", "software version", "halt height", "binary"],
    ),
    (Category::Ibc, &["ibc", "interchain", "channel", "relayer", "client update"]),
    (Category::Text, &["signaling", "text proposal", "sentiment"]),
];

/// Classify a proposal by keyword matching over lowercased title plus
/// description.
pub fn classify(title: &str, description: &str) -> Category {
    let haystack = format!("{} {}", title.to_lowercase(), description.to_lowercase());
    for (category, keywords) in CATEGORY_KEYWORDS {
        if keywords.iter().any(|k| haystack.contains(k)) {
            return *category;
        }
    }
    Category::Other
}

/// Static background injected per chain; unknown chains get the generic
/// block.
fn chain_context(chain_id: &str) -> &'static str {
    match chain_id {
        "cosmoshub-4" => {
            "Cosmos Hub is the economic center of the Cosmos ecosystem; ATOM \
             holders are conservative about inflation and security-budget changes."
        }
        "osmosis-1" => {
            "Osmosis is the largest Cosmos DEX; fee, incentive, and liquidity \
             parameters directly affect trading volume and LP returns."
        }
        "juno-1" => {
            "Juno is a permissionless CosmWasm smart-contract platform; contract \
             and developer-incentive proposals are common."
        }
        _ => {
            "A Cosmos-SDK chain; weigh proposals on validator economics, \
             security, and ecosystem impact."
        }
    }
}

/// A fully rendered prompt.
#[derive(Clone, Debug, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    pub category: Category,
}

const SYSTEM_PREAMBLE: &str = "\
You are a governance analyst producing voting recommendations on Cosmos \
chain proposals for enterprise subscribers. Respond with exactly one JSON \
object and nothing else, using this schema:
{
  \"recommendation\": \"APPROVE\" | \"REJECT\" | \"ABSTAIN\",
  \"confidence\": <number between 0.0 and 1.0>,
  \"reasoning\": \"<concise justification>\",
  \"risk_assessment\": \"LOW\" | \"MEDIUM\" | \"HIGH\",
  \"sections\": { \"<section name>\": \"<free-form text>\", ... }
}
The sections map is optional and may include SWOT, PESTEL, stakeholder \
impact, and implementation assessment entries.";

/// Build the deterministic prompt for one `(proposal, policy)` pair.
pub fn build_prompt(proposal: &Proposal, policy: &Policy) -> Prompt {
    let category = classify(&proposal.title, &proposal.description);

    let mut user = String::new();
    let _ = writeln!(user, "Proposal category: {}", category.as_str());
    let _ = writeln!(user, "Chain context: {}", chain_context(proposal.chain_id.as_str()));
    let _ = writeln!(user);
    let _ = writeln!(user, "Chain: {}", proposal.chain_id);
    let _ = writeln!(user, "Proposal #{}: {}", proposal.proposal_id, proposal.title);
    let _ = writeln!(user, "Status: {}", proposal.status);
    let _ = writeln!(user, "Type: {}", proposal.proposal_type);
    let _ = writeln!(user);
    let _ = writeln!(user, "Description:");
    let _ = writeln!(user, "{}", proposal.description);
    let _ = writeln!(user);
    let _ = writeln!(user, "Subscriber policy:");
    let _ = writeln!(user, "- risk tolerance: {}", policy.risk_tolerance);
    // BTreeMap iteration is sorted, keeping the rendering deterministic.
    for (criterion, weight) in &policy.criteria {
        let _ = writeln!(user, "- criterion '{criterion}' weight {weight:.2}");
    }
    for blurb in &policy.blurbs {
        let _ = writeln!(user, "- policy statement: {blurb}");
    }

    Prompt {
        system: SYSTEM_PREAMBLE.to_string(),
        user,
        category,
    }
}

//! Cosmos gov v1beta1 REST response models and their conversion into the
//! pipeline's domain types.

use chrono::DateTime;
use serde::Deserialize;

use govwatch_types::{ChainId, Proposal, ProposalStatus, ProposalSummary, Timestamp};

use crate::ChainError;

/// Sentinel the SDK emits for unset timestamps.
const NULL_TIME: &str = "0001-01-01T00:00:00Z";

#[derive(Debug, Deserialize)]
pub(crate) struct ProposalsResponse {
    #[serde(default)]
    pub proposals: Vec<GovProposal>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProposalResponse {
    pub proposal: GovProposal,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GovProposal {
    pub proposal_id: String,
    #[serde(default)]
    pub content: Option<ProposalContent>,
    pub status: String,
    #[serde(default)]
    pub submit_time: Option<String>,
    #[serde(default)]
    pub voting_start_time: Option<String>,
    #[serde(default)]
    pub voting_end_time: Option<String>,
    /// Present on gov v1 gateways; v1beta1 omits it.
    #[serde(default)]
    pub proposer: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProposalContent {
    #[serde(rename = "@type", default)]
    pub type_url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

pub(crate) fn parse_status(s: &str, endpoint: &str) -> Result<ProposalStatus, ChainError> {
    match s {
        "PROPOSAL_STATUS_DEPOSIT_PERIOD" => Ok(ProposalStatus::Deposit),
        "PROPOSAL_STATUS_VOTING_PERIOD" => Ok(ProposalStatus::Voting),
        "PROPOSAL_STATUS_PASSED" => Ok(ProposalStatus::Passed),
        "PROPOSAL_STATUS_REJECTED" => Ok(ProposalStatus::Rejected),
        "PROPOSAL_STATUS_FAILED" => Ok(ProposalStatus::Failed),
        other => Err(ChainError::Decode {
            endpoint: endpoint.to_string(),
            message: format!("unknown proposal status '{other}'"),
        }),
    }
}

/// RFC3339 → Timestamp; the SDK's year-one sentinel and absent fields both
/// map to `None`.
pub(crate) fn parse_time(
    value: &Option<String>,
    endpoint: &str,
) -> Result<Option<Timestamp>, ChainError> {
    let Some(raw) = value else { return Ok(None) };
    if raw == NULL_TIME {
        return Ok(None);
    }
    let parsed = DateTime::parse_from_rfc3339(raw).map_err(|e| ChainError::Decode {
        endpoint: endpoint.to_string(),
        message: format!("bad timestamp '{raw}': {e}"),
    })?;
    let secs = parsed.timestamp();
    if secs < 0 {
        return Ok(None);
    }
    Ok(Some(Timestamp::new(secs as u64)))
}

impl GovProposal {
    pub(crate) fn proposal_id(&self, endpoint: &str) -> Result<u64, ChainError> {
        self.proposal_id.parse().map_err(|_| ChainError::Decode {
            endpoint: endpoint.to_string(),
            message: format!("bad proposal id '{}'", self.proposal_id),
        })
    }

    pub(crate) fn to_summary(&self, endpoint: &str) -> Result<ProposalSummary, ChainError> {
        Ok(ProposalSummary {
            proposal_id: self.proposal_id(endpoint)?,
            status: parse_status(&self.status, endpoint)?,
        })
    }

    pub(crate) fn into_proposal(
        self,
        chain_id: &ChainId,
        endpoint: &str,
    ) -> Result<Proposal, ChainError> {
        let proposal_id = self.proposal_id(endpoint)?;
        let status = parse_status(&self.status, endpoint)?;
        let submit_time = parse_time(&self.submit_time, endpoint)?.unwrap_or(Timestamp::EPOCH);
        let voting_start = parse_time(&self.voting_start_time, endpoint)?;
        let voting_end = parse_time(&self.voting_end_time, endpoint)?;

        let (title, description, proposal_type) = match self.content {
            Some(c) => (
                c.title.unwrap_or_default(),
                c.description.unwrap_or_default(),
                c.type_url.unwrap_or_default(),
            ),
            None => (String::new(), String::new(), String::new()),
        };

        Ok(Proposal {
            chain_id: chain_id.clone(),
            proposal_id,
            title,
            description,
            status,
            submit_time,
            voting_start,
            voting_end,
            proposer: self.proposer.unwrap_or_default(),
            proposal_type,
        })
    }
}

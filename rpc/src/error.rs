//! RPC error types and their HTTP mapping.

use axum::{
    extract::rejection::JsonRejection,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use liquid_governance::GovernanceError;
use liquid_types::ProposalId;

pub type RpcResult<T> = Result<T, RpcError>;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("{source}")]
    Governance {
        proposal: Option<ProposalId>,
        source: GovernanceError,
    },

    #[error("proposal {proposal} has no {what} yet")]
    NotFound {
        proposal: ProposalId,
        what: &'static str,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("metrics error: {0}")]
    Metrics(String),

    #[error("server error: {0}")]
    Server(String),
}

impl RpcError {
    /// Attach `proposal` to a governance error raised while serving it.
    pub fn at(proposal: ProposalId) -> impl FnOnce(GovernanceError) -> RpcError {
        move |source| RpcError::Governance {
            proposal: Some(proposal),
            source,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            RpcError::Governance { source, .. } => governance_status(source),
            RpcError::NotFound { .. } => StatusCode::NOT_FOUND,
            RpcError::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            RpcError::Metrics(_) | RpcError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable error name returned in the `error` field.
    pub fn kind(&self) -> &'static str {
        match self {
            RpcError::Governance { source, .. } => source.kind(),
            RpcError::NotFound { what: "tally", .. } => "TallyNotFound",
            RpcError::NotFound { what: "audit", .. } => "AuditNotFound",
            RpcError::NotFound { .. } => "NotFound",
            RpcError::InvalidRequest(_) => "InvalidRequest",
            RpcError::Metrics(_) => "MetricsUnavailable",
            RpcError::Server(_) => "ServerError",
        }
    }

    fn proposal(&self) -> Option<ProposalId> {
        match self {
            RpcError::Governance { proposal, .. } => *proposal,
            RpcError::NotFound { proposal, .. } => Some(*proposal),
            _ => None,
        }
    }
}

fn governance_status(e: &GovernanceError) -> StatusCode {
    match e {
        GovernanceError::ProposalNotFound(_) => StatusCode::NOT_FOUND,
        GovernanceError::AlreadyResolved(_)
        | GovernanceError::ConcurrentResolutionInProgress(_)
        | GovernanceError::ParticipantExists(_)
        | GovernanceError::ProposalStillOpen { .. }
        | GovernanceError::VotingClosed(_) => StatusCode::CONFLICT,
        GovernanceError::InvalidDelegationTarget { .. }
        | GovernanceError::NotAMember(_)
        | GovernanceError::InvalidOption { .. }
        | GovernanceError::ChainTooLong { .. }
        | GovernanceError::Action(_)
        | GovernanceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        GovernanceError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        GovernanceError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl From<GovernanceError> for RpcError {
    fn from(source: GovernanceError) -> Self {
        RpcError::Governance {
            proposal: None,
            source,
        }
    }
}

impl From<JsonRejection> for RpcError {
    fn from(rejection: JsonRejection) -> Self {
        RpcError::InvalidRequest(rejection.body_text())
    }
}

impl From<prometheus::Error> for RpcError {
    fn from(e: prometheus::Error) -> Self {
        RpcError::Metrics(e.to_string())
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(kind = self.kind(), error = %self, "rpc request failed");
        }

        let body = Json(json!({
            "error": self.kind(),
            "proposal": self.proposal().map(|p| p.as_u64()),
            "message": self.to_string(),
        }));
        let mut response = (status, body).into_response();

        if let RpcError::Governance {
            source: GovernanceError::RateLimited { retry_after_secs },
            ..
        } = &self
        {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn governance_errors_map_to_expected_statuses() {
        let p = ProposalId::new(1);
        let cases = [
            (GovernanceError::ProposalNotFound(p), StatusCode::NOT_FOUND),
            (GovernanceError::AlreadyResolved(p), StatusCode::CONFLICT),
            (GovernanceError::ConcurrentResolutionInProgress(p), StatusCode::CONFLICT),
            (GovernanceError::NotAMember("a".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (GovernanceError::RateLimited { retry_after_secs: 5 }, StatusCode::TOO_MANY_REQUESTS),
            (GovernanceError::StoreUnavailable("down".into()), StatusCode::SERVICE_UNAVAILABLE),
        ];
        for (err, status) in cases {
            assert_eq!(RpcError::from(err).status(), status);
        }
    }

    #[test]
    fn missing_tally_has_its_own_kind() {
        let err = RpcError::NotFound {
            proposal: ProposalId::new(3),
            what: "tally",
        };
        assert_eq!(err.kind(), "TallyNotFound");
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn rate_limit_sets_retry_after() {
        let response = RpcError::at(ProposalId::new(1))(GovernanceError::RateLimited {
            retry_after_secs: 12,
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "12");
    }
}

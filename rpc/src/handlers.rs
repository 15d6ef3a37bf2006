//! RPC request handlers.

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use liquid_governance::{AuditRecord, AuditStatus, TallyResult};
use liquid_node::{tracing_spans, ActionReceipt, ResolveRequest};
use liquid_store::BackupSnapshot;
use liquid_types::{OrganizationId, Participant, ParticipantId, Proposal, ProposalId, Timestamp, VoteAction};

use crate::error::{RpcError, RpcResult};
use crate::state::RpcState;

// ── Participants ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterParticipantRequest {
    pub participant: ParticipantId,
    pub organization: OrganizationId,
}

pub async fn register_participant(
    State(state): State<RpcState>,
    body: Result<Json<RegisterParticipantRequest>, JsonRejection>,
) -> RpcResult<(StatusCode, Json<Participant>)> {
    let Json(request) = body?;
    let participant = state
        .voting
        .register_participant(request.participant, request.organization)
        .instrument(tracing_spans::rpc_span("register_participant"))
        .await?;
    Ok((StatusCode::CREATED, Json(participant)))
}

// ── Proposals ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateProposalRequest {
    pub organization: OrganizationId,
    pub title: String,
    pub options: Vec<String>,
    /// Unix seconds.
    pub deadline: u64,
}

pub async fn create_proposal(
    State(state): State<RpcState>,
    body: Result<Json<CreateProposalRequest>, JsonRejection>,
) -> RpcResult<(StatusCode, Json<Proposal>)> {
    let Json(request) = body?;
    let proposal = state
        .voting
        .create_proposal(
            request.organization,
            request.title,
            request.options,
            Timestamp::new(request.deadline),
        )
        .instrument(tracing_spans::rpc_span("create_proposal"))
        .await?;
    Ok((StatusCode::CREATED, Json(proposal)))
}

pub async fn list_proposals(State(state): State<RpcState>) -> RpcResult<Json<Vec<Proposal>>> {
    Ok(Json(state.voting.proposals().await?))
}

pub async fn get_proposal(
    State(state): State<RpcState>,
    Path(id): Path<u64>,
) -> RpcResult<Json<Proposal>> {
    let id = ProposalId::new(id);
    let proposal = state.voting.proposal(id).await.map_err(RpcError::at(id))?;
    Ok(Json(proposal))
}

// ── Actions ──────────────────────────────────────────────────────────────

pub async fn submit_action(
    State(state): State<RpcState>,
    Path(id): Path<u64>,
    body: Result<Json<VoteAction>, JsonRejection>,
) -> RpcResult<(StatusCode, Json<ActionReceipt>)> {
    let id = ProposalId::new(id);
    let Json(action) = body?;
    let receipt = state
        .voting
        .submit(id, action)
        .instrument(tracing_spans::rpc_span("submit_action"))
        .await
        .map_err(RpcError::at(id))?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

// ── Resolution ───────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ResolveBody {
    #[serde(default)]
    pub force: bool,
}

impl ResolveBody {
    /// An empty body means an unforced run.
    fn parse(raw: &[u8]) -> Result<Self, RpcError> {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(raw).map_err(|e| RpcError::InvalidRequest(e.to_string()))
    }
}

#[derive(Debug, Serialize)]
pub struct ResolveResponse {
    pub proposal: ProposalId,
    pub status: AuditStatus,
    pub forced: bool,
    pub duration_ms: u64,
    pub tally: TallyResult,
}

pub async fn resolve(
    State(state): State<RpcState>,
    Path(id): Path<u64>,
    body: Bytes,
) -> RpcResult<Json<ResolveResponse>> {
    let id = ProposalId::new(id);
    let body = ResolveBody::parse(&body)?;
    let outcome = state
        .resolution
        .resolve(id, ResolveRequest::admin(body.force))
        .instrument(tracing_spans::rpc_span("resolve"))
        .await
        .map_err(RpcError::at(id))?;
    Ok(Json(ResolveResponse {
        proposal: id,
        status: outcome.audit.status,
        forced: outcome.audit.forced,
        duration_ms: outcome.audit.duration_ms,
        tally: outcome.tally,
    }))
}

pub async fn get_tally(
    State(state): State<RpcState>,
    Path(id): Path<u64>,
) -> RpcResult<Json<TallyResult>> {
    let id = ProposalId::new(id);
    state
        .resolution
        .tally(id)
        .await
        .map_err(RpcError::at(id))?
        .map(Json)
        .ok_or(RpcError::NotFound { proposal: id, what: "tally" })
}

pub async fn get_audit(
    State(state): State<RpcState>,
    Path(id): Path<u64>,
) -> RpcResult<Json<AuditRecord>> {
    let id = ProposalId::new(id);
    state
        .resolution
        .audit(id)
        .await
        .map_err(RpcError::at(id))?
        .map(Json)
        .ok_or(RpcError::NotFound { proposal: id, what: "audit" })
}

// ── Snapshots ────────────────────────────────────────────────────────────

pub async fn take_snapshot(
    State(state): State<RpcState>,
    Path(id): Path<u64>,
) -> RpcResult<(StatusCode, Json<BackupSnapshot>)> {
    let id = ProposalId::new(id);
    let snapshot = state
        .backup
        .manual(id)
        .instrument(tracing_spans::rpc_span("take_snapshot"))
        .await
        .map_err(RpcError::at(id))?;
    Ok((StatusCode::CREATED, Json(snapshot)))
}

pub async fn list_snapshots(
    State(state): State<RpcState>,
    Path(id): Path<u64>,
) -> RpcResult<Json<Vec<BackupSnapshot>>> {
    let id = ProposalId::new(id);
    Ok(Json(state.backup.list(id).await.map_err(RpcError::at(id))?))
}

// ── Telemetry ────────────────────────────────────────────────────────────

pub async fn metrics(State(state): State<RpcState>) -> RpcResult<impl IntoResponse> {
    let text = state.metrics.encode_text()?;
    Ok((
        [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
        text,
    ))
}

pub async fn health() -> &'static str {
    "ok"
}

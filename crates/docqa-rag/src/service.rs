//! Request/response boundary for transport layers.
//!
//! Internal errors never reach the payload: each is logged with its kind and
//! the caller receives only a generic failure message.

use serde::{Deserialize, Serialize};

use docqa_core::{IngestReport, QueryAnswer, Result};

use crate::pipeline::RagPipeline;

pub const GENERIC_FAILURE: &str = "request failed";

fn default_top_k() -> usize { 20 }

fn default_score_threshold() -> f32 { 0.1 }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestRequest {
    pub source_identifier: String,
    pub raw_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskRequest {
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ServiceResponse<T> {
    Ok { data: T },
    Error { error: String },
}

impl<T> ServiceResponse<T> {
    pub fn is_ok(&self) -> bool { matches!(self, ServiceResponse::Ok { .. }) }

    pub fn data(self) -> Option<T> {
        match self {
            ServiceResponse::Ok { data } => Some(data),
            ServiceResponse::Error { .. } => None,
        }
    }
}

fn respond<T>(op: &str, result: Result<T>) -> ServiceResponse<T> {
    match result {
        Ok(data) => ServiceResponse::Ok { data },
        Err(e) => {
            tracing::error!(op, kind = e.kind(), error = %e, "request failed");
            ServiceResponse::Error { error: GENERIC_FAILURE.to_string() }
        }
    }
}

pub async fn handle_query(pipeline: &RagPipeline, req: QueryRequest) -> ServiceResponse<QueryAnswer> {
    tracing::info!(query = %req.query, top_k = req.top_k, "query request");
    respond("query", pipeline.query(&req.query, req.top_k, req.score_threshold).await)
}

pub async fn handle_ingest(pipeline: &RagPipeline, req: IngestRequest) -> ServiceResponse<IngestReport> {
    tracing::info!(source = %req.source_identifier, "ingest request");
    respond("ingest", pipeline.ingest(&req.source_identifier, &req.raw_text).await)
}

pub async fn handle_ask(pipeline: &RagPipeline, req: AskRequest) -> ServiceResponse<AskResponse> {
    respond("ask", pipeline.ask(&req.query).await.map(|answer| AskResponse { answer }))
}

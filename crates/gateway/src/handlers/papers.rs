//! Paper metadata read handlers
//!
//! Backend faults on these routes are reported inside a 200 body with
//! `success: false`; only malformed parameters are rejected with 4xx.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{de, Deserialize, Deserializer, Serialize};
use std::time::Instant;
use validator::Validate;

use crate::AppState;
use papervault_common::{
    db::{models::Paper, PaperQuery, SortField, SortOrder, DEFAULT_LIMIT},
    errors::{AppError, Result},
    metrics,
};

const PAPER_NOT_FOUND: &str = "Paper not found";

/// Query parameters for `GET /search`
#[derive(Debug, Deserialize, Validate)]
pub struct SearchParams {
    /// Free text matched against title, authors, keywords, journal, department
    pub q: Option<String>,

    pub department: Option<String>,

    pub journal: Option<String>,

    #[serde(default, deserialize_with = "blank_as_none")]
    #[validate(range(min = 1000, max = 9999))]
    pub year: Option<i32>,

    #[serde(default)]
    pub sort_by: SortField,

    #[serde(default)]
    pub sort_order: SortOrder,

    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 1000))]
    pub limit: u64,
}

/// Query parameters for `GET /papers`
#[derive(Debug, Deserialize, Validate)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 1000))]
    pub limit: u64,

    #[serde(default)]
    pub offset: u64,
}

fn default_limit() -> u64 { DEFAULT_LIMIT }

/// `?year=` is treated like an omitted year
fn blank_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    match non_blank(Option::<String>::deserialize(deserializer)?) {
        Some(value) => value.parse().map(Some).map_err(de::Error::custom),
        None => Ok(None),
    }
}

/// Blank strings count as absent
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl From<SearchParams> for PaperQuery {
    fn from(params: SearchParams) -> Self {
        PaperQuery {
            text: non_blank(params.q),
            department: non_blank(params.department),
            journal: non_blank(params.journal),
            year: params.year,
            sort_by: params.sort_by,
            sort_order: params.sort_order,
            limit: params.limit,
        }
    }
}

/// Response for search and list
#[derive(Debug, Serialize, Deserialize)]
pub struct PapersResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub papers: Vec<Paper>,
    pub count: usize,
}

impl PapersResponse {
    fn found(papers: Vec<Paper>) -> Self {
        Self {
            success: true,
            error: None,
            count: papers.len(),
            papers,
        }
    }

    fn failed(error: &AppError) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            papers: Vec::new(),
            count: 0,
        }
    }
}

/// Response for a single paper lookup
#[derive(Debug, Serialize, Deserialize)]
pub struct PaperResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paper: Option<Paper>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn validation_error(e: validator::ValidationErrors) -> AppError {
    let field = e.field_errors().keys().next().map(|k| k.to_string());
    AppError::Validation {
        message: e.to_string(),
        field,
    }
}

/// Search papers by free text, filters and sort
pub async fn search_papers(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<PapersResponse>> {
    params.validate().map_err(validation_error)?;

    let query = PaperQuery::from(params);
    let start = Instant::now();
    let result = state.metadata.search(&query).await;
    let elapsed = start.elapsed();

    let response = match result {
        Ok(papers) => {
            tracing::info!(
                query = ?query.text,
                department = ?query.department,
                journal = ?query.journal,
                year = ?query.year,
                sort_by = %query.sort_by,
                sort_order = %query.sort_order,
                results = papers.len(),
                latency_ms = elapsed.as_millis() as u64,
                "Search completed"
            );
            PapersResponse::found(papers)
        }
        Err(e) => {
            tracing::error!(error = %e, "Search failed");
            PapersResponse::failed(&e)
        }
    };

    metrics::record_query("search", elapsed.as_secs_f64(), response.count, response.success);

    Ok(Json(response))
}

/// List papers, newest publication first
pub async fn list_papers(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<PapersResponse>> {
    params.validate().map_err(validation_error)?;

    let start = Instant::now();
    let result = state.metadata.list(params.offset, params.limit).await;
    let elapsed = start.elapsed();

    let response = match result {
        Ok(papers) => PapersResponse::found(papers),
        Err(e) => {
            tracing::error!(
                error = %e,
                offset = params.offset,
                limit = params.limit,
                "Listing papers failed"
            );
            PapersResponse::failed(&e)
        }
    };

    metrics::record_query("list", elapsed.as_secs_f64(), response.count, response.success);

    Ok(Json(response))
}

/// Get a paper by ID
pub async fn get_paper(
    State(state): State<AppState>,
    Path(paper_id): Path<i64>,
) -> Json<PaperResponse> {
    let start = Instant::now();
    let result = state.metadata.find_by_id(paper_id).await;
    let backend_ok = result.is_ok();

    let response = match result {
        Ok(Some(paper)) => PaperResponse {
            success: true,
            paper: Some(paper),
            error: None,
        },
        Ok(None) => {
            tracing::debug!(paper_id, "Paper not found");
            PaperResponse {
                success: false,
                paper: None,
                error: Some(PAPER_NOT_FOUND.to_string()),
            }
        }
        Err(e) => {
            tracing::error!(error = %e, paper_id, "Paper lookup failed");
            PaperResponse {
                success: false,
                paper: None,
                error: Some(e.to_string()),
            }
        }
    };

    metrics::record_query(
        "get",
        start.elapsed().as_secs_f64(),
        usize::from(response.paper.is_some()),
        backend_ok,
    );

    Json(response)
}

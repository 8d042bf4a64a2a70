use crate::aggregation::Aggregator;
use crate::config::Config;
use crate::customer_registry::CustomerRegistry;
use crate::endpoints::{EndpointCatalogue, EndpointInfo, EndpointsList};
use crate::errors::AppError;
use crate::models::{
    mask_subject, AggregateResponse, BankConfig, BankResult, ConcurrencyMode,
};
use axum::{extract::State, http::StatusCode, Json};
use chrono::{Months, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Multi-bank aggregation pipeline.
    pub aggregator: Aggregator,
    /// Customer-relation registry resolver.
    pub registry: CustomerRegistry,
    /// Cached bank endpoint catalogue.
    pub catalogue: EndpointCatalogue,
}

/// Body of the aggregation request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateRequest {
    /// National identity number of the subject.
    pub subject: String,
    /// Defaults to three months ago.
    pub from_date: Option<NaiveDate>,
    /// Defaults to today.
    pub to_date: Option<NaiveDate>,
    /// Defaults to true.
    pub include_transactions: Option<bool>,
    /// Bypass the customer registry and query all implemented banks.
    pub skip_registry: Option<bool>,
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "bank-aggregator-api",
            "version": "0.1.0"
        })),
    )
}

/// POST /api/v1/accounts
///
/// Aggregates account and transaction data for one subject across every
/// bank the subject has a relationship with. Individual bank or account
/// failures never fail this endpoint; they are reported through the
/// `hasErrors` and `isImplemented` flags in the payload.
pub async fn aggregate_accounts(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AggregateRequest>,
) -> Result<Json<AggregateResponse>, AppError> {
    if request.subject.trim().is_empty() {
        return Err(AppError::BadRequest("subject is required".to_string()));
    }

    let reference_id = Uuid::new_v4();
    let today = Utc::now().date_naive();
    let from_date = request.from_date.unwrap_or_else(|| {
        today
            .checked_sub_months(Months::new(3))
            .unwrap_or(today)
    });
    let to_date = request.to_date.unwrap_or(today);
    if from_date > to_date {
        return Err(AppError::BadRequest(
            "fromDate must not be after toDate".to_string(),
        ));
    }

    let include_transactions = request.include_transactions.unwrap_or(true);
    let skip_registry =
        request.skip_registry.unwrap_or(false) || state.config.skip_customer_registry;

    tracing::info!(
        "Aggregation request for subject {} from {} to {}, reference id {}",
        mask_subject(&request.subject),
        from_date,
        to_date,
        reference_id
    );

    let relations = state
        .registry
        .banks_for_customer(&request.subject, today, reference_id, skip_registry)
        .await?;

    if relations.is_empty() {
        tracing::info!(
            "No customer relations for subject {}, reference id {}",
            mask_subject(&request.subject),
            reference_id
        );
        return Ok(Json(AggregateResponse {
            bank_accounts: Vec::new(),
        }));
    }

    let endpoints = state.catalogue.supported_endpoints().await?;

    // Banks the subject relates to but which have no usable endpoint are
    // reported as not implemented rather than silently dropped.
    let mut bank_configs = Vec::new();
    let mut unimplemented = Vec::new();
    for relation in &relations {
        match endpoints.iter().find(|e| e.org_no == relation.organization_id) {
            Some(endpoint) => bank_configs.push(bank_config(&state.config, relation_name(relation), endpoint)),
            None => {
                tracing::info!(
                    "Bank {} ({}) has no supported endpoint, marking as not implemented",
                    relation.bank_name,
                    relation.organization_id
                );
                unimplemented.push(BankResult {
                    bank_name: relation.bank_name.clone(),
                    is_implemented: false,
                    accounts: Vec::new(),
                    has_errors: false,
                });
            }
        }
    }

    let mut response = state
        .aggregator
        .aggregate(
            &request.subject,
            bank_configs,
            from_date,
            to_date,
            include_transactions,
            reference_id,
            skip_registry,
        )
        .await?;
    response.bank_accounts.extend(unimplemented);

    Ok(Json(response))
}

fn relation_name(relation: &crate::customer_registry::CustomerRelation) -> String {
    if relation.bank_name.is_empty() {
        relation.organization_id.clone()
    } else {
        relation.bank_name.clone()
    }
}

fn bank_config(config: &Config, name: String, endpoint: &EndpointInfo) -> BankConfig {
    let concurrency = if config.serial_banks.contains(&endpoint.org_no) {
        ConcurrencyMode::Sequential
    } else {
        ConcurrencyMode::Parallel
    };
    BankConfig {
        name,
        org_no: endpoint.org_no.clone(),
        base_url: endpoint.url.clone(),
        api_version: endpoint.version.clone(),
        audience: endpoint.url.clone(),
        maskinporten_env: config.maskinporten_env.clone(),
        concurrency,
    }
}

/// GET /api/v1/endpoints
///
/// Serves the cached endpoint catalogue.
pub async fn list_endpoints(
    State(state): State<Arc<AppState>>,
) -> Result<Json<EndpointsList>, AppError> {
    let endpoints = state.catalogue.endpoints().await?;
    Ok(Json(EndpointsList {
        total: endpoints.len(),
        endpoints: endpoints.as_ref().clone(),
    }))
}

/// POST /api/v1/endpoints/refresh
///
/// Forces a re-read of the hosted catalogue file and replaces the cache.
pub async fn refresh_endpoints(
    State(state): State<Arc<AppState>>,
) -> Result<Json<EndpointsList>, AppError> {
    let endpoints = state.catalogue.refresh().await?;
    Ok(Json(EndpointsList {
        total: endpoints.len(),
        endpoints: endpoints.as_ref().clone(),
    }))
}

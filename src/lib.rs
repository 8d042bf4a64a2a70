//! Bank Account Aggregation API Library
//!
//! Aggregates financial account and transaction data for a single subject
//! across an open set of banks. Each bank exposes a REST endpoint returning
//! JOSE/JWE-encrypted payloads; responses are decrypted, normalized into one
//! internal model, and merged into a single response that distinguishes
//! bank-level and account-level failures from successful data.
//!
//! # Modules
//!
//! - `aggregation`: Worker-per-bank fan-out and result merging.
//! - `bank_client`: Single-bank fetch sequence with failure isolation.
//! - `config`: Configuration management.
//! - `customer_registry`: Subject-to-banks relation lookup.
//! - `decryption`: JWE envelope decryption interceptor.
//! - `endpoints`: Cached bank endpoint catalogue.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers.
//! - `mapper`: Wire-schema to internal-model mapping and balance math.
//! - `models`: Core data models.
//! - `token_provider`: Per-audience access token acquisition.

pub mod aggregation;
pub mod bank_client;
pub mod config;
pub mod customer_registry;
pub mod decryption;
pub mod endpoints;
pub mod errors;
pub mod handlers;
pub mod mapper;
pub mod models;
pub mod token_provider;

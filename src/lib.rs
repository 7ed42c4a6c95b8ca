//! WarmeLeads Core API Library
//!
//! Backend for the WarmeLeads lead-generation portal: tiered pricing with
//! Dutch VAT, order/invoice identifier generation, the blob-store-backed
//! merge-write CRM persistence, payment webhook intake, and transactional
//! notification dispatch.
//!
//! # Modules
//!
//! - `blob_client`: HTTP client for the key-addressed blob store.
//! - `circuit_breaker`: Circuit breaker for outbound providers.
//! - `config`: Configuration management.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers.
//! - `identifiers`: Order and invoice number generation.
//! - `models`: Core data models.
//! - `notifications`: Order confirmation / admin alert dispatch.
//! - `pricing`: Pricing catalog and tier resolution.
//! - `record_store`: Read-merge-write persistence over the blob store.
//! - `vat`: VAT breakdown calculator.
//! - `webhook_handler`: Payment provider webhook handler.
//! - `webhook_models`: Webhook payload models.

pub mod blob_client;
pub mod circuit_breaker;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod identifiers;
pub mod models;
pub mod notifications;
pub mod pricing;
pub mod record_store;
pub mod vat;
pub mod webhook_handler;
pub mod webhook_models;

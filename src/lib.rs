//! Core of the Gateway spin-to-win promotion service: eligibility checks,
//! weighted prize allocation with win caps, and coupon issuance, all backed
//! by a transactional ledger.

pub mod codegen;
pub mod config;
pub mod eligibility;
pub mod engine;
pub mod entities;
pub mod http;
pub mod identity;
pub mod models;
pub mod schedule;
pub mod selector;
pub mod state;

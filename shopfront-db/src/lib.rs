//! Shopfront DB - PostgreSQL Provider and Service Wiring
//!
//! Implements the relational provider traits of `shopfront-storage` over a
//! deadpool-postgres pool and wires the resulting [`Storefront`] to Redis.
//! The `shopfront-warm` binary uses [`StorefrontServices`] to bring every
//! cache family in line with the database.
//!
//! [`Storefront`]: shopfront_storage::Storefront

#[macro_use]
pub mod db;

pub mod addresses;
pub mod catalog;
pub mod commerce;
pub mod config;
pub mod error;
pub mod services;
pub mod telemetry;

pub use config::{DbConfig, ShopfrontConfig};
pub use db::DbClient;
pub use error::{DbError, DbResult};
pub use services::{warm, StorefrontServices, WarmReport};
pub use telemetry::{init_tracing, LogFormat, TelemetryConfig, TelemetryError};

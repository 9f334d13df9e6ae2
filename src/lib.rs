//! legacy-bridge library
//!
//! Moves records from a legacy desktop database (and a public company
//! registry) into a normalized relational target store. Every run is a dry
//! run unless explicitly made live, and every run produces a JSON report.
//!
//! The pipeline is: [`legacy`] or [`fetch`] + [`extract`] produce raw
//! records, [`mapping`] turns them into target entities, [`db::idmap`]
//! resolves foreign keys, and [`upsert`] writes them in batches through a
//! [`db::TargetStore`]. [`orchestrator`] sequences the stages and fills in
//! a [`report::RunReport`].

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod inspect;
pub mod legacy;
pub mod logging;
pub mod mapping;
pub mod orchestrator;
pub mod record;
pub mod report;
pub mod upsert;

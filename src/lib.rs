//! Bird observation catalog: a query layer over a materialized bird
//! collection, fed by either a flat JSON file or a relational SQLite store.
//!
//! Layering, from the bottom: `storage`/`db` persist, `repository` exposes
//! CRUD, `query` transforms in memory, `service` orchestrates and validates,
//! `controller` turns commands into responses for the `ui` and the CLI.
pub mod config;
pub mod controller;
pub mod db;
pub mod error;
pub mod models;
pub mod query;
pub mod repository;
pub mod service;
pub mod storage;
pub mod ui;
pub mod validation;

pub use config::{Config, StorageMode};
pub use controller::{Command, Controller, Notice, Response, Severity};
pub use error::CatalogError;
pub use models::{Bird, Species};
pub use service::BirdService;
pub use ui::{run_app, App};

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Orion entity service.
//!
//! Reads run through ownership scoping, role checks and row projection;
//! writes go through the [`domain::WriteOrchestrator`] before any statement
//! is executed. [`wiring`] assembles the whole graph from an
//! [`OrionConfig`].

pub mod config;
pub mod domain;
pub mod infra;
pub mod wiring;

pub use config::OrionConfig;
pub use domain::{
    AssetStorage, AssetUpload, DomainError, EntityService, ErrorSink, ListRequest, Page,
    PasswordHasher, ServiceConfig,
};
pub use wiring::{Collaborators, HookRegistration, Orion, build, build_schema, wire};

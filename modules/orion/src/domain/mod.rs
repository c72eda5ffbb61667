pub mod access;
pub mod error;
pub mod orchestrator;
pub mod ports;
pub mod projection;
pub mod service;

pub use error::DomainError;
pub use orchestrator::{WriteOrchestrator, WritePlan};
pub use ports::{AssetStorage, ErrorSink, PasswordHasher};
pub use service::{AssetUpload, EntityService, ListRequest, Page, ServiceConfig};

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
pub mod access_mode;
pub mod context;
pub mod roles;

pub use access_mode::AccessMode;
pub use context::{RequestContext, RequestContextBuilder};
pub use roles::intersects;

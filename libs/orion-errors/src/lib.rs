//! Orion's outward error vocabulary: the [`ErrorKind`] catalog and the
//! [`Problem`] body each kind renders to.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod catalog;
pub mod problem;

pub use catalog::{ErrDef, ErrorKind};
pub use problem::{Problem, ValidationViolation};

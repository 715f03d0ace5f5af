//! Library error type.

pub type Result<T> = std::result::Result<T, Error>;

use thiserror::Error;

use crate::package::PackageId;
use crate::load_order::Cycle;

#[derive(Debug, Error)]
pub enum Error {
	#[error("IO error: {0}")]
	IO(#[from] std::io::Error),
	#[error("JSON error: {0}")]
	SerdeJSON(#[from] serde_json::Error),
	#[error("parsing error: {0}")]
	Parse(String),
	#[error("validation error: {0}")]
	Validation(String),
	#[error("package `{0}` appears more than once in the active list")]
	DuplicatePackage(PackageId),
	/// The constraint graph contains cycles, no order was produced.
	#[error("{} circular constraint(s) found: {}", .0.len(), crate::load_order::describe_cycles(.0))]
	CircularConstraint(Vec<Cycle>),
	/// A result was computed from a snapshot that has since been superseded.
	#[error("snapshot revision {found} is stale, current revision is {expected}")]
	StaleSnapshot { expected: u64, found: u64 },
}

//! Various helper functions for testing
//! 
//! Builders here panic on bad input since every caller is a test.

use modorder::{ActiveSet, Catalog, Package, RuleDocument, RuleSource};
use modorder::rules::{RuleEntry, RuleField};

/// Enables logging output for the running test, safe to call more than once.
pub fn init_logging() {
	let _ = env_logger::builder().is_test(true).try_init();
}

/// A catalog of plain packages named after their identifiers.
pub fn catalog(ids: &[&str]) -> Catalog {
	ids.iter().map(|id| Package::new(*id, id.to_uppercase())).collect()
}

pub fn active(ids: &[&str]) -> ActiveSet {
	ActiveSet::new(ids.iter().copied()).expect("active list has duplicates")
}

/// A document holding one `field` rule per `(package, targets)` pair.
pub fn document(source: RuleSource, field: RuleField, rules: &[(&str, &[&str])]) -> RuleDocument {
	rules.iter().fold(RuleDocument::new(source, source.to_string()), |doc, (id, targets)| {
		let entry = doc.get(&(*id).into()).cloned().unwrap_or_default()
			.with_ids(field, targets.iter().copied());
		doc.with_entry(*id, entry)
	})
}

/// Shorthand for a [`RuleSource::User`] document of `loadAfter` rules.
pub fn load_after(rules: &[(&str, &[&str])]) -> RuleDocument {
	document(RuleSource::User, RuleField::LoadAfter, rules)
}

pub fn entry() -> RuleEntry {
	RuleEntry::default()
}

/// Writes `value` as JSON into a new temporary file.
///
/// The file is removed when the returned handle drops.
pub fn json_fixture(value: &serde_json::Value) -> tempfile::NamedTempFile {
	let file = tempfile::NamedTempFile::new().expect("failed to create fixture file");
	serde_json::to_writer_pretty(file.as_file(), value).expect("failed to write fixture");
	file
}

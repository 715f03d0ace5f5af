//! Reading rule documents from JSON.
//!
//! Parsing fails soft per entry. A malformed entry becomes one [`RuleParseError`] and is skipped,
//! the rest of the document is still read. Only a document that isn't a JSON object at all is an `Err`.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use serde::{Serialize, Deserialize};
use serde_json::Value;

use super::*;

/// A rule entry that was rejected while parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{document}: entry `{}`{}: {reason}", .package.as_deref().unwrap_or("?"), .field.map(|f| format!(" field `{}`", f)).unwrap_or_default())]
pub struct RuleParseError {
	pub document: String,
	/// Key of the rejected entry as written in the document.
	pub package: Option<String>,
	pub field: Option<RuleField>,
	pub reason: String,
}

impl RuleParseError {
	pub(crate) fn new(document: &str, package: Option<&str>, field: Option<RuleField>, reason: impl Into<String>) -> Self {
		Self {
			document: document.to_string(),
			package: package.map(str::to_string),
			field,
			reason: reason.into(),
		}
	}
}

/// Field level failure, the entry key is attached by the caller.
pub(crate) struct FieldError(pub Option<RuleField>, pub String);

fn package_id_regex() -> &'static regex::Regex {
	static RE: OnceLock<regex::Regex> = OnceLock::new();
	RE.get_or_init(|| regex::Regex::new(r"^[a-z0-9][a-z0-9._\-]*$").expect("package id pattern should compile."))
}

/// Normalizes and validates a package identifier.
pub(crate) fn parse_package_id(s: &str) -> Result<PackageId, String> {
	let id = PackageId::new(s);
	if package_id_regex().is_match(id.as_str()) {
		Ok(id)
	} else {
		Err(format!("`{}` is not a valid package identifier", s))
	}
}

fn parse_id_list(field: RuleField, value: &Value) -> Result<IdSet, FieldError> {
	match value {
		Value::Null => Ok(IdSet::new()),
		/* A lone identifier is accepted as a list of one */
		Value::String(s) => Ok([parse_package_id(s).map_err(|e| FieldError(Some(field), e))?].into()),
		Value::Array(items) => {
			let mut ids = IdSet::new();
			for item in items {
				let s = item.as_str().ok_or_else(|| FieldError(Some(field), format!("expected an identifier, found `{}`", item)))?;
				ids.insert(parse_package_id(s).map_err(|e| FieldError(Some(field), e))?);
			}
			Ok(ids)
		},
		_ => Err(FieldError(Some(field), format!("expected a list of identifiers, found `{}`", value))),
	}
}

fn parse_position(field: RuleField, value: &Value) -> Result<ForcePosition, FieldError> {
	match value {
		Value::Null => Ok(ForcePosition::None),
		Value::String(s) => match s.trim().to_lowercase().as_str() {
			"" | "none" => Ok(ForcePosition::None),
			"top" => Ok(ForcePosition::Top),
			"bottom" => Ok(ForcePosition::Bottom),
			_ => Err(FieldError(Some(field), format!("unknown position `{}`", s))),
		},
		_ => Err(FieldError(Some(field), format!("expected \"none\", \"top\" or \"bottom\", found `{}`", value))),
	}
}

/// Reads either the plain form of a field or the `{ "base": .., "byVersion": { .. } }` form.
fn parse_value<T: RuleContent + Default>(field: RuleField, value: &Value, parse: fn(RuleField, &Value) -> Result<T, FieldError>) -> Result<RuleValue<T>, FieldError> {
	let Value::Object(map) = value else {
		return Ok(RuleValue { base: parse(field, value)?, by_version: Default::default() })
	};

	let base = match map.get("base") {
		Some(v) => parse(field, v)?,
		None => T::default(),
	};
	let mut by_version = BTreeMap::new();
	match map.get("byVersion") {
		None | Some(Value::Null) => {},
		Some(Value::Object(versions)) => {
			for (version, v) in versions {
				by_version.insert(version.trim().to_string(), parse(field, v)?);
			}
		},
		Some(other) => return Err(FieldError(Some(field), format!("`byVersion` must be an object, found `{}`", other))),
	}
	Ok(RuleValue { base, by_version })
}

/// Parses the body of one entry.
pub(crate) fn parse_entry(value: &Value) -> Result<RuleEntry, FieldError> {
	let Value::Object(map) = value else {
		return Err(FieldError(None, format!("entry must be an object, found `{}`", value)))
	};

	let mut entry = RuleEntry {
		comment: match map.get("comment") {
			None | Some(Value::Null) => None,
			Some(Value::String(s)) => Some(s.clone()),
			Some(Value::Array(lines)) => Some(lines.iter().filter_map(Value::as_str).collect::<Vec<_>>().join("\n")),
			Some(other) => return Err(FieldError(None, format!("comment must be text, found `{}`", other))),
		},
		..Default::default()
	};

	for field in RuleField::ID_LISTS {
		if let Some(v) = map.get(field.key()) {
			let parsed = parse_value(field, v, parse_id_list)?;
			if let Some(slot) = entry.ids_mut(field) {
				*slot = parsed;
			}
		}
	}
	if let Some(v) = map.get(RuleField::ForceLoadPosition.key()) {
		entry.force_load_position = parse_value(RuleField::ForceLoadPosition, v, parse_position)?;
	}

	Ok(entry)
}

impl RuleDocument {
	/// Parses a community or user rule document.
	///
	/// The entries may be at the root of the object or wrapped in a `"rules"` object.
	///
	/// # Errors
	/// - [`SerdeJSON`](crate::Error::SerdeJSON) when the text isn't JSON.
	/// - [`Parse`](crate::Error::Parse) when the document root isn't an object.
	pub fn from_json_str(source: RuleSource, label: impl Into<String>, json: &str) -> crate::Result<Self> {
		let value: Value = serde_json::from_str(json)?;
		Self::from_json_value(source, label, &value)
	}

	/// See [`RuleDocument::from_json_str()`].
	pub fn from_json_value(source: RuleSource, label: impl Into<String>, value: &Value) -> crate::Result<Self> {
		let mut document = RuleDocument::new(source, label);

		let Value::Object(root) = value else {
			return Err(crate::Error::Parse(format!("{}: rule document must be an object", document.label)))
		};
		let entries = match root.get("rules") {
			Some(Value::Object(rules)) if root.len() == 1 => rules,
			_ => root,
		};

		for (key, v) in entries {
			let id = match parse_package_id(key) {
				Ok(id) => id,
				Err(e) => {
					document.errors.push(RuleParseError::new(&document.label, Some(key), None, e));
					continue;
				}
			};
			if document.entries.contains_key(&id) {
				document.errors.push(RuleParseError::new(&document.label, Some(key), None, format!("duplicate entry for `{}`", id)));
				continue;
			}
			match parse_entry(v) {
				Ok(entry) => { document.entries.insert(id, entry); },
				Err(FieldError(field, reason)) => document.errors.push(RuleParseError::new(&document.label, Some(key), field, reason)),
			}
		}

		for e in &document.errors {
			log::warn!("skipping rule entry: {}", e);
		}
		log::debug!("read {} rule entries from {} ({})", document.entries.len(), document.label, document.source);

		Ok(document)
	}

	/// Reads a rule document from disk, the path is used as the label.
	pub fn load_from_path(source: RuleSource, path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
		let path = path.as_ref();
		let json = std::fs::read_to_string(path)?;
		Self::from_json_str(source, path.display().to_string(), &json)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn reads_plain_and_versioned_fields() {
		let doc = RuleDocument::from_json_str(RuleSource::Community, "community.json", r#"{
			"rules": {
				"Author.ModA": {
					"comment": "needs harmony",
					"loadAfter": ["brrainz.harmony"],
					"loadBefore": { "base": ["x.y"], "byVersion": { "1.4": ["x.z"] } },
					"forceLoadPosition": "Bottom"
				}
			}
		}"#).unwrap();

		assert!(doc.errors.is_empty());
		let entry = doc.get(&PackageId::new("author.moda")).unwrap();
		assert_eq!(entry.comment.as_deref(), Some("needs harmony"));
		assert!(entry.load_after.base.contains(&PackageId::new("brrainz.harmony")));
		assert!(entry.load_before.by_version["1.4"].contains(&PackageId::new("x.z")));
		assert_eq!(entry.force_load_position.base, ForcePosition::Bottom);
	}

	#[test]
	fn bad_entries_are_collected_not_fatal() {
		let doc = RuleDocument::from_json_str(RuleSource::User, "user.json", r#"{
			"good.mod": { "loadAfter": ["other.mod"] },
			"bad.list": { "loadAfter": [1, 2] },
			"bad.position": { "forceLoadPosition": "middle" },
			"not an id!": {},
			"bad.shape": "loadAfter"
		}"#).unwrap();

		assert_eq!(doc.entries.len(), 1);
		assert_eq!(doc.errors.len(), 4);
		let position = doc.errors.iter().find(|e| e.package.as_deref() == Some("bad.position")).unwrap();
		assert_eq!(position.field, Some(RuleField::ForceLoadPosition));
	}

	#[test]
	fn duplicate_keys_after_normalizing_are_rejected() {
		let doc = RuleDocument::from_json_str(RuleSource::User, "user.json", r#"{
			"Some.Mod": { "loadAfter": ["a.mod"] },
			"some.mod": { "loadAfter": ["b.mod"] }
		}"#).unwrap();
		assert_eq!(doc.entries.len(), 1);
		assert_eq!(doc.errors.len(), 1);
	}

	#[test]
	fn non_object_document_fails() {
		assert!(matches!(
			RuleDocument::from_json_str(RuleSource::User, "user.json", "[1, 2]"),
			Err(crate::Error::Parse(_))
		));
	}
}

//! The full set of known packages, active or not.

use std::collections::BTreeMap;

use serde::{Serialize, Deserialize};
use serde_json::Value;

use super::*;
use crate::rules::{RuleDocument, RuleParseError, RuleSource};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
	packages: BTreeMap<PackageId, Package>,
}

impl Catalog {
	pub fn new() -> Self {
		Default::default()
	}

	/// Adds `package`, replacing and returning any package with the same identifier.
	pub fn insert(&mut self, package: Package) -> Option<Package> {
		self.packages.insert(package.id.clone(), package)
	}

	pub fn get(&self, id: &PackageId) -> Option<&Package> {
		self.packages.get(id)
	}

	pub fn contains(&self, id: &PackageId) -> bool {
		self.packages.contains_key(id)
	}

	pub fn len(&self) -> usize {
		self.packages.len()
	}

	pub fn is_empty(&self) -> bool {
		self.packages.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &Package> {
		self.packages.values()
	}

	/// Identifiers that can stand in for `id` when satisfying a dependency.
	pub fn alternatives_of(&self, id: &PackageId) -> impl Iterator<Item = &PackageId> {
		self.get(id).into_iter().flat_map(|p| p.alternative_ids.iter())
	}

	/// Collects every package's manifest rules into the [`RuleSource::Manifest`] document.
	pub fn manifest_document(&self) -> RuleDocument {
		let mut document = RuleDocument::new(RuleSource::Manifest, "manifests");
		for package in self.iter().filter(|p| !p.manifest_rules.is_unset()) {
			document.entries.insert(package.id.clone(), package.manifest_rules.clone());
		}
		document
	}

	/// Parses a catalog document, `{ "packages": [ { "packageId": .., .. }, .. ] }`.
	///
	/// Like rule documents this fails soft per package, rejected packages are returned as errors
	/// labelled with `label`.
	///
	/// # Errors
	/// - [`SerdeJSON`](crate::Error::SerdeJSON) when the text isn't JSON.
	/// - [`Parse`](crate::Error::Parse) when there is no `packages` list.
	pub fn from_json_str(label: &str, json: &str) -> crate::Result<(Self, Vec<RuleParseError>)> {
		let value: Value = serde_json::from_str(json)?;
		let Some(Value::Array(packages)) = value.get("packages") else {
			return Err(crate::Error::Parse(format!("{}: catalog must contain a `packages` list", label)))
		};

		let mut catalog = Catalog::new();
		let mut errors = Vec::new();
		for (i, v) in packages.iter().enumerate() {
			match parse_package(v) {
				Ok(package) => {
					if catalog.contains(&package.id) {
						errors.push(RuleParseError::new(label, Some(package.id.as_str()), None, "package listed twice"));
						continue;
					}
					catalog.insert(package);
				},
				Err((key, field, reason)) => {
					let key = key.unwrap_or_else(|| format!("#{}", i));
					errors.push(RuleParseError::new(label, Some(&key), field, reason));
				},
			}
		}

		for e in &errors {
			log::warn!("skipping catalog entry: {}", e);
		}
		log::debug!("read {} packages from {}", catalog.len(), label);

		Ok((catalog, errors))
	}

	/// Reads a catalog from disk, the path is used as the label.
	pub fn load_from_path(path: impl AsRef<std::path::Path>) -> crate::Result<(Self, Vec<RuleParseError>)> {
		let path = path.as_ref();
		let json = std::fs::read_to_string(path)?;
		Self::from_json_str(&path.display().to_string(), &json)
	}
}

type PackageError = (Option<String>, Option<crate::rules::RuleField>, String);

fn parse_package(v: &Value) -> Result<Package, PackageError> {
	use crate::rules::parse::{parse_entry, parse_package_id, FieldError};

	let Some(raw_id) = v.get("packageId").and_then(Value::as_str) else {
		return Err((None, None, "missing `packageId`".to_string()))
	};
	let key = Some(raw_id.to_string());
	let id = parse_package_id(raw_id).map_err(|e| (key.clone(), None, e))?;

	let strings = |name: &str| -> Result<Vec<String>, PackageError> {
		match v.get(name) {
			None | Some(Value::Null) => Ok(Vec::new()),
			Some(Value::Array(items)) => items.iter()
				.map(|i| i.as_str().map(str::to_string).ok_or_else(|| (key.clone(), None, format!("`{}` must only hold strings", name))))
				.collect(),
			Some(_) => Err((key.clone(), None, format!("`{}` must be a list", name))),
		}
	};

	let alternative_ids = strings("alternativePackageIds")?
		.iter()
		.map(|s| parse_package_id(s).map_err(|e| (key.clone(), None, e)))
		.collect::<Result<Vec<_>, _>>()?;

	let provenance = match v.get("provenance") {
		None | Some(Value::Null) => Provenance::default(),
		Some(p) => serde_json::from_value::<Provenance>(p.clone()).map_err(|e| (key.clone(), None, format!("bad provenance: {}", e)))?,
	};

	let manifest_rules = match v.get("rules") {
		None | Some(Value::Null) => Default::default(),
		Some(rules) => parse_entry(rules).map_err(|FieldError(field, reason)| (key.clone(), field, reason))?,
	};

	let name = v.get("name").and_then(Value::as_str).unwrap_or(raw_id).to_string();

	Ok(Package::new(id, name)
		.supported_versions(strings("supportedVersions")?)
		.alternative_ids(alternative_ids)
		.provenance(provenance)
		.manifest_rules(manifest_rules))
}

impl FromIterator<Package> for Catalog {
	fn from_iter<T: IntoIterator<Item = Package>>(iter: T) -> Self {
		let mut catalog = Catalog::new();
		for package in iter {
			catalog.insert(package);
		}
		catalog
	}
}

//! Game version numbers and the target version rule variants are selected with.
//!
//! # Version Keys
//!
//! Rule documents key their per-version variants by strings such as `"1.4"`. A target version of
//! `1.4.3901` should still select the `"1.4"` variant so keys are compared with
//! [`GameVersion::is_compatible_with()`] when no key matches the target string exactly.

use serde::*;
use try_map::FallibleMapExt;

/// Represents a specific game version.
///
/// # Format
///
/// `MAJOR`.`MINOR`.`PATCH`.`BUILD`, for example `1.4.3901`.
///
/// `MAJOR` and `MINOR` are required whereas `PATCH` and `BUILD` are optional.
///
/// # Eq & Ord
///
/// The `build` number is not considered in Eq and Ord, `1.4.3 == 1.4.3.3901`.
#[derive(Debug, Clone, Eq, Serialize, Deserialize)]
pub struct GameVersion {
	major: u32,
	minor: u32,
	patch: Option<u32>,
	build: Option<u32>,
}

impl GameVersion {
	/// Create a new [`GameVersion`] from a version string.
	///
	/// # Errors
	/// This function will return a [`Parse`](crate::Error::Parse) error in the following cases.
	/// - Input doesn't include a minor version.
	/// - Input has more components than the `MAJOR`.`MINOR`.`PATCH`.`BUILD` format.
	/// - The components of the version can't be parsed as integers.
	pub fn new(s: impl AsRef<str>) -> crate::Result<Self> {
		use crate::Error::Parse;
		let s = s.as_ref().trim();
		let components = s.split('.').collect::<Vec<_>>();
		if components.len() < 2 || components.len() > 4 { return Err(Parse(format!("`{}` has too many/few version components", s))) }

		let major = components[0].parse::<u32>().map_err(|_| Parse(format!("major version of `{}` can't be parsed", s)))?;
		let minor = components[1].parse::<u32>().map_err(|_| Parse(format!("minor version of `{}` can't be parsed", s)))?;
		let patch = components.get(2).try_map(|v| v.parse::<u32>().map_err(|_| Parse(format!("patch of `{}` can't be parsed", s))))?;
		let build = components.get(3).try_map(|v| v.parse::<u32>().map_err(|_| Parse(format!("build of `{}` can't be parsed", s))))?;

		Ok(GameVersion { major, minor, patch, build })
	}

	/// Checks general compatibility between two versions.
	///
	/// # How This Is Defined
	/// 1. `major` and `minor` must match.
	/// 1. If `patch` is present in both, `self <= other`.
	/// any other combination of patch options is considered compatible.
	pub fn is_compatible_with(&self, other: &Self) -> bool {
		if self.major == other.major && self.minor == other.minor {
			match (self.patch, other.patch) {
				(Some(lhs), Some(rhs)) => lhs <= rhs,
				_ => true,
			}
		} else {
			false
		}
	}

	pub fn major(&self) -> u32 { self.major }
	pub fn minor(&self) -> u32 { self.minor }
	pub fn patch(&self) -> Option<u32> { self.patch }
	pub fn build(&self) -> Option<u32> { self.build }
}

impl TryFrom<&str> for GameVersion {
	type Error = crate::Error;

	fn try_from(value: &str) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}

impl PartialEq for GameVersion {
	fn eq(&self, other: &Self) -> bool {
		self.major == other.major &&
		self.minor == other.minor &&
		self.patch == other.patch
	}
}

impl Ord for GameVersion {
	fn cmp(&self, other: &Self) -> std::cmp::Ordering {
		/* Build is ignored, see the type documentation. */
		(self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch))
	}
}

impl PartialOrd for GameVersion {
	fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> { Some(self.cmp(other)) }
}

impl std::fmt::Display for GameVersion {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}.{}", self.major, self.minor)?;
		if let Some(patch) = self.patch { write!(f, ".{}", patch)?; }
		if let Some(build) = self.build { write!(f, ".{}", build)?; }
		Ok(())
	}
}

/// The version context used to select version specific rule variants.
///
/// Targets that don't parse as a [`GameVersion`] can still select variants by exact key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct TargetVersion {
	raw: String,
	parsed: Option<GameVersion>,
}

impl TargetVersion {
	pub fn new(raw: impl AsRef<str>) -> Self {
		let raw = raw.as_ref().trim().to_string();
		let parsed = match GameVersion::new(&raw) {
			Ok(v) => Some(v),
			Err(e) => {
				log::debug!("target version `{}` is not numeric, only exact variant keys will match: {}", raw, e);
				None
			}
		};
		Self { raw, parsed }
	}

	pub fn as_str(&self) -> &str {
		&self.raw
	}

	pub fn parsed(&self) -> Option<&GameVersion> {
		self.parsed.as_ref()
	}

	/// Does a variant or supported version key apply to this target.
	pub fn matches_key(&self, key: &str) -> bool {
		let key = key.trim();
		if key == self.raw {
			return true
		}
		match GameVersion::new(key) {
			Ok(key) => self.applies(&key),
			Err(_) => false,
		}
	}

	/// A key naming a patch only applies to targets that name one too, and then only up to the target's patch.
	fn applies(&self, key: &GameVersion) -> bool {
		match &self.parsed {
			Some(target) => key.is_compatible_with(target) && (key.patch().is_none() || target.patch().is_some()),
			None => false,
		}
	}

	/// Picks the key of `keys` that best applies to this target.
	///
	/// An exact match wins, after that the highest compatible key.
	pub fn select_key<'k>(&self, keys: impl IntoIterator<Item = &'k str>) -> Option<&'k str> {
		let mut best: Option<(&'k str, GameVersion)> = None;
		for key in keys {
			if key.trim() == self.raw {
				return Some(key)
			}
			let Ok(version) = GameVersion::new(key) else { continue };
			if !self.applies(&version) {
				continue;
			}
			let better = match &best {
				Some((_, current)) => version > *current,
				None => true,
			};
			if better {
				best = Some((key, version));
			}
		}
		best.map(|(key, _)| key)
	}
}

impl From<String> for TargetVersion {
	fn from(value: String) -> Self {
		Self::new(value)
	}
}

impl From<&str> for TargetVersion {
	fn from(value: &str) -> Self {
		Self::new(value)
	}
}

impl From<TargetVersion> for String {
	fn from(value: TargetVersion) -> Self {
		value.raw
	}
}

impl std::fmt::Display for TargetVersion {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.raw)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test] fn game_version_compares_as_ints() { assert!(GameVersion::new("1.9").unwrap() < GameVersion::new("1.10").unwrap()) }
	#[test] fn game_version_short_version_is_lt() { assert!(GameVersion::new("1.4").unwrap() < GameVersion::new("1.4.1").unwrap()) }
	#[test] fn game_version_build_has_no_effect() { assert!(GameVersion::new("1.4.1").unwrap() == GameVersion::new("1.4.1.3901").unwrap()) }
	#[test] fn game_version_rejects_single_component() { assert!(GameVersion::new("1").is_err()) }
	#[test] fn game_version_rejects_words() { assert!(GameVersion::new("1.x").is_err()) }

	#[test]
	fn target_matches_short_key() {
		let target = TargetVersion::new("1.4.3901");
		assert!(target.matches_key("1.4"));
		assert!(!target.matches_key("1.3"));
	}

	#[test]
	fn target_prefers_exact_key() {
		let target = TargetVersion::new("1.4");
		assert_eq!(target.select_key(["1.4.0", "1.4", "1.5"]), Some("1.4"));
	}

	#[test]
	fn target_picks_most_specific_compatible_key() {
		let target = TargetVersion::new("1.4.3901");
		assert_eq!(target.select_key(["1.3", "1.4", "1.4.2000"]), Some("1.4.2000"));
	}

	#[test]
	fn patch_key_needs_a_patch_target() {
		assert_eq!(TargetVersion::new("1.4").select_key(["1.4.5"]), None);
		assert_eq!(TargetVersion::new("1.4.2").select_key(["1.4.5"]), None);
		assert_eq!(TargetVersion::new("1.4.7").select_key(["1.4.5"]), Some("1.4.5"));
		assert!(!TargetVersion::new("1.4").matches_key("1.4.5"));
		assert!(TargetVersion::new("1.4.5").matches_key("1.4"));
	}

	#[test]
	fn non_numeric_target_matches_exactly() {
		let target = TargetVersion::new("unstable");
		assert!(target.matches_key("unstable"));
		assert!(!target.matches_key("1.4"));
		assert_eq!(target.select_key(["1.4"]), None);
	}
}

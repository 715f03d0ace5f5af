use std::collections::HashMap;

use super::PackageId;

/// The ordered list of packages the caller wants loaded.
///
/// The order is used by the sorter as the tie break for unconstrained packages.
/// An identifier can only appear once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveSet {
	ids: Vec<PackageId>,
	positions: HashMap<PackageId, usize>,
}

impl ActiveSet {
	/// # Errors
	/// - [`DuplicatePackage`](crate::Error::DuplicatePackage) when an identifier is given twice.
	pub fn new(ids: impl IntoIterator<Item = impl Into<PackageId>>) -> crate::Result<Self> {
		let mut set = Self::default();
		for id in ids {
			let id = id.into();
			if set.contains(&id) {
				return Err(crate::Error::DuplicatePackage(id))
			}
			set.push(id);
		}
		Ok(set)
	}

	fn push(&mut self, id: PackageId) {
		self.positions.insert(id.clone(), self.ids.len());
		self.ids.push(id);
	}

	fn reindex(&mut self) {
		self.positions = self.ids.iter().cloned().enumerate().map(|(i, id)| (id, i)).collect();
	}

	pub fn contains(&self, id: &PackageId) -> bool {
		self.positions.contains_key(id)
	}

	/// Position of `id` in the original order.
	pub fn position(&self, id: &PackageId) -> Option<usize> {
		self.positions.get(id).copied()
	}

	pub fn len(&self) -> usize {
		self.ids.len()
	}

	pub fn is_empty(&self) -> bool {
		self.ids.is_empty()
	}

	pub fn iter(&self) -> std::slice::Iter<'_, PackageId> {
		self.ids.iter()
	}

	pub fn as_slice(&self) -> &[PackageId] {
		&self.ids
	}

	/// Appends `id`, returns false if it was already active.
	pub fn activate(&mut self, id: PackageId) -> bool {
		if self.contains(&id) {
			return false
		}
		self.push(id);
		true
	}

	/// Removes `id`, returns false if it wasn't active.
	pub fn deactivate(&mut self, id: &PackageId) -> bool {
		let Some(position) = self.position(id) else { return false };
		self.ids.remove(position);
		self.reindex();
		true
	}

	/// Moves `id` to `index`, clamped to the end of the list.
	///
	/// Returns false if `id` isn't active or is already at `index`.
	pub fn move_to(&mut self, id: &PackageId, index: usize) -> bool {
		let Some(position) = self.position(id) else { return false };
		let index = index.min(self.ids.len() - 1);
		if index == position {
			return false
		}
		let id = self.ids.remove(position);
		self.ids.insert(index, id);
		self.reindex();
		true
	}
}

impl<'a> IntoIterator for &'a ActiveSet {
	type Item = &'a PackageId;
	type IntoIter = std::slice::Iter<'a, PackageId>;

	fn into_iter(self) -> Self::IntoIter {
		self.ids.iter()
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn duplicates_are_rejected() {
		let err = ActiveSet::new(["a", "B", "b"]).unwrap_err();
		assert!(matches!(err, crate::Error::DuplicatePackage(id) if id.as_str() == "b"));
	}

	#[test]
	fn positions_follow_edits() {
		let mut set = ActiveSet::new(["a", "b", "c"]).unwrap();
		assert!(set.move_to(&"c".into(), 0));
		assert_eq!(set.position(&"c".into()), Some(0));
		assert_eq!(set.position(&"a".into()), Some(1));
		assert!(set.deactivate(&"a".into()));
		assert_eq!(set.position(&"b".into()), Some(1));
		assert!(!set.activate("b".into()));
		assert!(set.activate("d".into()));
		assert_eq!(set.position(&"d".into()), Some(2));
	}

	#[test]
	fn moving_in_place_is_not_a_change() {
		let mut set = ActiveSet::new(["a", "b", "c"]).unwrap();
		assert!(!set.move_to(&"b".into(), 1));
		assert!(!set.move_to(&"c".into(), 10));
		assert!(set.move_to(&"a".into(), 10));
		assert_eq!(set.as_slice(), ["b", "c", "a"].map(PackageId::new));
	}
}

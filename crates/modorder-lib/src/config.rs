//! Settings shared by the pipeline and its callers.

use serde::{Serialize, Deserialize};

/// How packages without a constraint between them are ordered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortMode {
	/// Keep the order of the active list.
	#[default] Topological,
	/// Order by package identifier.
	Alphabetical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
	data_dir: std::path::PathBuf,
	target_version: Option<String>,
	sort_mode: SortMode,
	community_rules: Option<std::path::PathBuf>,
	user_rules: Option<std::path::PathBuf>,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			data_dir: default_data_dir(),
			target_version: None,
			sort_mode: Default::default(),
			community_rules: None,
			user_rules: None,
		}
	}
}

fn default_data_dir() -> std::path::PathBuf {
	#[cfg(target_os = "windows")]
	let path = std::env::var("APPDATA").map(std::path::PathBuf::from).unwrap_or_else(|_| std::env::temp_dir());

	#[cfg(not(target_os = "windows"))]
	let path = if let Ok(e) = std::env::var("XDG_DATA_HOME") {
		std::path::PathBuf::from(e)
	} else if let Ok(home) = std::env::var("HOME") {
		std::path::PathBuf::from(home).join(".local/share")
	} else {
		std::env::temp_dir()
	};

	path.join("modorder")
}

impl Config {
	const FILE_NAME: &'static str = "config.json";

	/// Loads the config from the default data directory.
	///
	/// # Errors
	/// - [`IO`](crate::Error::IO) with [`NotFound`](std::io::ErrorKind::NotFound) when no config has been saved yet.
	/// - [`SerdeJSON`](crate::Error::SerdeJSON) when the file is malformed.
	pub fn load_from_disk() -> crate::Result<Self> {
		Self::load_from_path(default_data_dir().join(Self::FILE_NAME))
	}

	pub fn load_from_path(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
		let path = path.as_ref();
		log::debug!("reading config from {}", path.display());
		let file = std::fs::File::open(path)?;
		Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
	}

	/// Saves the config into its data directory, creating the directory if needed.
	pub fn save_to_disk(&self) -> crate::Result<()> {
		std::fs::create_dir_all(&self.data_dir)?;
		self.save_to_path(self.data_dir.join(Self::FILE_NAME))
	}

	pub fn save_to_path(&self, path: impl AsRef<std::path::Path>) -> crate::Result<()> {
		let path = path.as_ref();
		log::debug!("writing config to {}", path.display());
		let file = std::fs::File::create(path)?;
		serde_json::to_writer_pretty(file, self)?;
		Ok(())
	}

	pub fn data_dir(&self) -> &std::path::Path {
		&self.data_dir
	}
	/// returns if the directory is valid or not.
	pub fn set_data_dir(&mut self, data_dir: std::path::PathBuf) -> bool {
		if data_dir.is_dir() {
			self.data_dir = data_dir;
			true
		} else {
			false
		}
	}

	pub fn target_version(&self) -> Option<&str> {
		self.target_version.as_deref()
	}
	pub fn set_target_version(&mut self, target_version: Option<String>) {
		self.target_version = target_version;
	}

	pub fn sort_mode(&self) -> SortMode {
		self.sort_mode
	}
	pub fn set_sort_mode(&mut self, sort_mode: SortMode) {
		self.sort_mode = sort_mode;
	}

	pub fn community_rules(&self) -> Option<&std::path::Path> {
		self.community_rules.as_deref()
	}
	pub fn set_community_rules(&mut self, path: Option<std::path::PathBuf>) {
		self.community_rules = path;
	}

	pub fn user_rules(&self) -> Option<&std::path::Path> {
		self.user_rules.as_deref()
	}
	pub fn set_user_rules(&mut self, path: Option<std::path::PathBuf>) {
		self.user_rules = path;
	}
}

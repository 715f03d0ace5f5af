pub mod error;
pub use error::Result;
pub use error::Error;

pub mod config;
pub use config::Config;
pub use config::SortMode;

pub mod package;
pub use package::PackageId;
pub use package::Package;
pub use package::Catalog;
pub use package::ActiveSet;
pub use package::TargetVersion;

pub mod rules;
pub use rules::RuleSource;
pub use rules::RuleDocument;

pub mod load_order;
pub use load_order::SortResult;
pub use load_order::SortReport;

pub mod dependency_completer;
pub use dependency_completer::DependencyReport;

pub mod mod_list;
pub use mod_list::ModList;
pub use mod_list::Snapshot;
pub use mod_list::Plan;

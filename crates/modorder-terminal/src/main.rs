use std::sync::Arc;

use modorder::{ActiveSet, Catalog, ModList, Plan, RuleDocument, RuleSource, SortMode, SortResult, TargetVersion};
use modorder::dependency_completer::Availability;

#[tokio::main]
async fn main() {
	let opts = options();

	/* Parse console input */ 
	let parsed_options = {
		let args: Vec<String> = std::env::args().collect();

		let parsed_options = match parse_args(&opts, &args[1..]) {
			Ok(m)  => { m }
			Err(e) => { eprintln!("{}", e); std::process::exit(e.exit_code()) }
		};
		
		if parsed_options.opt_present("h") {
			eprintln!("{}", opts.usage("Usage: modorder-terminal [options] [sort|deps|plan]"));
			return;
		}

		parsed_options
	};

	let mut logger = env_logger::Builder::from_default_env();
	if parsed_options.opt_present("v") {
		logger.filter_level(log::LevelFilter::Debug);
	}
	logger.init();

	let config = modorder::Config::load_from_disk().unwrap_or_else(|e| {
		log::warn!("Failed to read config file: {}", e);
		log::warn!("Using default config.");
		modorder::Config::default()
	});

	let command = match parsed_options.free.first().map(String::as_str) {
		None | Some("plan") => Command::Plan,
		Some("sort") => Command::Sort,
		Some("deps") => Command::Deps,
		Some(other) => { log::error!("Unknown command `{}`.", other); std::process::exit(2) },
	};

	let mut list = match load_mod_list(&config, &parsed_options) {
		Ok(list) => list,
		Err(e) => { log::error!("Failed to load mod list: {}", e); std::process::exit(e.exit_code()) },
	};

	let json = parsed_options.opt_present("json");
	let mut plan = match run(&mut list).await {
		Ok(plan) => plan,
		Err(e) => { log::error!("{}", e); std::process::exit(e.exit_code()) },
	};

	if parsed_options.opt_present("activate-missing") {
		let activated = list.activate_available(&plan.dependencies);
		if !activated.is_empty() {
			log::info!("Activated {} package(s), running again.", activated.len());
			plan = match run(&mut list).await {
				Ok(plan) => plan,
				Err(e) => { log::error!("{}", e); std::process::exit(e.exit_code()) },
			};
		}
	}

	let output = match command {
		Command::Sort => print_sort(&plan, json),
		Command::Deps => print_dependencies(&plan, json),
		Command::Plan => print_sort(&plan, json).and_then(|_| print_dependencies(&plan, json)),
	};
	if let Err(e) = output {
		log::error!("Failed to write output: {}", e);
		std::process::exit(e.exit_code())
	}

	for e in &plan.parse_errors {
		log::warn!("{}", e);
	}

	if let SortResult::CyclesFound(_) = plan.sort.result {
		std::process::exit(1)
	}
}

fn options() -> getopts::Options {
	let mut opts = getopts::Options::new();
	opts.optflag( "h", "help",             "Show help");
	opts.optflag( "v", "verbose",          "Increased vebosity");
	opts.optopt(  "c", "catalog",          "Catalog of known packages", "FILE");
	opts.optopt(  "a", "active",           "JSON list of active package identifiers", "FILE");
	opts.optopt(  "r", "community",        "Community rule document", "FILE");
	opts.optopt(  "u", "user",             "User rule document", "FILE");
	opts.optopt(  "t", "target",           "Target game version", "VERSION");
	opts.optflag( "",  "alphabetical",     "Break ties alphabetically instead of by active order");
	opts.optflag( "",  "activate-missing", "Activate dependencies available in the catalog and run again");
	opts.optflag( "",  "json",             "Print results as JSON");
	opts.parsing_style(getopts::ParsingStyle::FloatingFrees);
	opts
}

fn parse_args(opts: &getopts::Options, args: &[String]) -> Result<getopts::Matches, Error> {
	opts.parse(args).map_err(Error::Options)
}

enum Command {
	Sort,
	Deps,
	Plan,
}

fn load_mod_list(config: &modorder::Config, options: &getopts::Matches) -> Result<ModList, Error> {
	let path_opt = |name: &str, fallback: Option<&std::path::Path>| -> Option<std::path::PathBuf> {
		options.opt_str(name).map(std::path::PathBuf::from).or_else(|| fallback.map(|p| p.to_path_buf()))
	};

	let catalog_path = options.opt_str("c").ok_or(Error::MissingArgument("catalog"))?;
	let (catalog, catalog_errors) = Catalog::load_from_path(&catalog_path)?;
	for e in &catalog_errors {
		log::warn!("{}", e);
	}

	let active = match options.opt_str("a") {
		Some(path) => {
			let ids: Vec<String> = serde_json::from_str(&std::fs::read_to_string(path)?)?;
			ActiveSet::new(ids)?
		},
		None => {
			log::info!("No active list given, activating the whole catalog.");
			ActiveSet::new(catalog.iter().map(|p| p.id.clone()))?
		},
	};

	let target = options.opt_str("t")
		.or_else(|| config.target_version().map(str::to_string))
		.ok_or(Error::MissingArgument("target"))?;

	let mut documents = Vec::new();
	if let Some(path) = path_opt("r", config.community_rules()) {
		documents.push(RuleDocument::load_from_path(RuleSource::Community, path)?);
	}
	if let Some(path) = path_opt("u", config.user_rules()) {
		documents.push(RuleDocument::load_from_path(RuleSource::User, path)?);
	}

	let mut list = ModList::new(catalog, active, TargetVersion::new(target));
	list.set_rule_documents(documents);
	list.set_sort_mode(if options.opt_present("alphabetical") { SortMode::Alphabetical } else { config.sort_mode() });
	Ok(list)
}

/// Runs the sort and the dependency completer side by side on one snapshot.
async fn run(list: &mut ModList) -> Result<Plan, Error> {
	let snapshot = list.snapshot();

	let aggregation = {
		let snapshot = snapshot.clone();
		Arc::new(tokio::task::spawn_blocking(move || snapshot.aggregate()).await?)
	};

	let sort = {
		let (snapshot, aggregation) = (snapshot.clone(), aggregation.clone());
		tokio::task::spawn_blocking(move || snapshot.sort(&aggregation))
	};
	let dependencies = {
		let (snapshot, aggregation) = (snapshot.clone(), aggregation.clone());
		tokio::task::spawn_blocking(move || snapshot.complete(&aggregation))
	};
	let (sort, dependencies) = tokio::join!(sort, dependencies);

	let plan = Plan {
		revision: snapshot.revision(),
		sort: sort?,
		dependencies: dependencies?,
		parse_errors: aggregation.errors.clone(),
	};
	Ok(list.accept(plan)?)
}

fn print_sort(plan: &Plan, json: bool) -> Result<(), Error> {
	if json {
		println!("{}", serde_json::to_string_pretty(&plan.sort)?);
		return Ok(())
	}

	match &plan.sort.result {
		SortResult::Ordered(order) => {
			println!("Load order:");
			for (i, id) in order.iter().enumerate() {
				println!("\t{:>3} {}", i + 1, id);
			}
		},
		SortResult::CyclesFound(cycles) => {
			println!("No load order, {} circular constraint(s):", cycles.len());
			for cycle in cycles {
				println!("\t{}", cycle);
			}
		},
	}
	for conflict in &plan.sort.conflicts {
		match conflict.source {
			Some(source) => println!("Incompatible: {} and {} ({})", conflict.declared_by, conflict.conflicts_with, source),
			None => println!("Incompatible: {} and {}", conflict.declared_by, conflict.conflicts_with),
		}
	}
	for unknown in &plan.sort.unknown_targets {
		println!("Unknown package `{}` in {} of {}", unknown.target, unknown.field, unknown.declared_by);
	}
	Ok(())
}

fn print_dependencies(plan: &Plan, json: bool) -> Result<(), Error> {
	if json {
		println!("{}", serde_json::to_string_pretty(&plan.dependencies)?);
		return Ok(())
	}

	if plan.dependencies.entries.is_empty() {
		println!("All dependencies are active.");
	}
	for status in plan.dependencies.entries.values() {
		let required_by = status.required_by.iter().map(|id| id.as_str()).collect::<Vec<_>>().join(", ");
		match &status.availability {
			Availability::SatisfiedByAlternative(alt) => println!("{} satisfied by {} (required by {})", status.dependency, alt, required_by),
			Availability::AvailableLocally(candidates) => {
				let names = candidates.iter().map(|c| c.id.as_str()).collect::<Vec<_>>().join(", ");
				println!("{} missing, available locally: {} (required by {})", status.dependency, names, required_by)
			},
			Availability::RequiresAcquisition => println!("{} missing, must be acquired (required by {})", status.dependency, required_by),
		}
	}
	for id in &plan.dependencies.unsupported_version {
		println!("{} does not support the target version", id);
	}
	Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("modorder error: {0}")]
	ModOrder(#[from] modorder::Error),
	#[error("IO error: {0}")]
	IO(#[from] std::io::Error),
	#[error("JSON error: {0}")]
	SerdeJSON(#[from] serde_json::Error),
	#[error("Missing argument: {0}")]
	MissingArgument(&'static str),
	#[error("Background task failed: {0}")]
	Task(#[from] tokio::task::JoinError),
	#[error("Unable to parse options: {0}")]
	Options(getopts::Fail),
}

impl Error {
	/// Process exit status for the error, every error here is an input or usage error.
	pub fn exit_code(&self) -> i32 {
		2
	}
}

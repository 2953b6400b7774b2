use std::path::Path;
use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use idlforge_cli::CliError;
use owo_colors::OwoColorize;
use owo_colors::Stream;

#[derive(Parser, Debug)]
#[command(
	name = "idlforge",
	version,
	about = "Transform program interface descriptions and render client bindings"
)]
struct Cli {
	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Run the pipeline and render the configured targets.
	Generate {
		/// Pipeline configuration file.
		#[arg(short, long)]
		config: PathBuf,

		/// Render only this target. Repeat to render a subset.
		#[arg(short, long = "target")]
		targets: Vec<String>,
	},
	/// Print the tree after a pipeline stage as JSON.
	Inspect {
		/// Pipeline configuration file.
		#[arg(short, long)]
		config: PathBuf,

		/// Stage to print: `0` is the loaded tree, `n` the tree after the
		/// n-th operation. Defaults to the final tree.
		#[arg(short, long)]
		stage: Option<usize>,

		/// Output file. Writes to stdout when omitted.
		#[arg(short, long)]
		output: Option<PathBuf>,
	},
	/// Run the pipeline without rendering and list each instruction's
	/// builder inputs.
	Check {
		/// Pipeline configuration file.
		#[arg(short, long)]
		config: PathBuf,
	},
}

fn main() {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
	let cli = Cli::parse();

	let result = match cli.command {
		Commands::Generate { config, targets } => run_generate(&config, &targets),
		Commands::Inspect {
			config,
			stage,
			output,
		} => run_inspect(&config, stage, output.as_deref()),
		Commands::Check { config } => run_check(&config),
	};

	if let Err(error) = result {
		eprintln!(
			"{} {error}",
			"Error:".if_supports_color(Stream::Stderr, |text| text.red())
		);
		std::process::exit(1);
	}
}

fn run_generate(config: &Path, targets: &[String]) -> Result<(), CliError> {
	let outcomes = idlforge_cli::generate(config, targets)?;
	let mut failed = 0;

	for outcome in &outcomes {
		match &outcome.result {
			Ok(summary) => {
				println!(
					"{} {} -> {}: {} written, {} unchanged, {} removed",
					"ok".if_supports_color(Stream::Stdout, |text| text.green()),
					outcome.target,
					outcome.output.display(),
					summary.written.len(),
					summary.unchanged.len(),
					summary.removed.len()
				);
			}
			Err(error) => {
				failed += 1;
				eprintln!(
					"{} {} -> {}: {error}",
					"failed".if_supports_color(Stream::Stderr, |text| text.red()),
					outcome.target,
					outcome.output.display()
				);
			}
		}
	}

	if failed > 0 {
		return Err(CliError::TargetsFailed {
			failed,
			total: outcomes.len(),
		});
	}
	Ok(())
}

fn run_inspect(config: &Path, stage: Option<usize>, output: Option<&Path>) -> Result<(), CliError> {
	let json = idlforge_cli::inspect(config, stage)?;

	if let Some(output) = output {
		std::fs::write(output, &json).map_err(|source| {
			CliError::Write {
				path: output.to_path_buf(),
				source,
			}
		})?;
		println!("Wrote {}", output.display());
	} else {
		print!("{json}");
	}
	Ok(())
}

fn run_check(config: &Path) -> Result<(), CliError> {
	let table = idlforge_cli::check(config)?;
	println!("{table}");
	Ok(())
}

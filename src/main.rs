use clap::{Parser, Subcommand};
use doctool::pipeline::{Generator, GeneratorOptions, Stage};
use doctool::{config, output, utility};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "doctool")]
#[command(about = "Staged documentation generator: markdown tree in, HTML site out")]
#[command(long_about = "\
Staged documentation generator: markdown tree in, HTML site out

Every target is a documentation root. Its markdown files are extracted,
arranged into a tree, given index pages where missing, rendered through
page templates and written to one or more output directories.

Source structure:

  docs/
  ├── docs.yaml                  # Config (optional; pyproject.toml also works)
  ├── getting-started.md         # title: header, then markdown body
  ├── guide/
  │   ├── README.md              # Promoted to guide/index.html
  │   └── install.md
  └── site/                      # Default output; never scanned

Metadata header (first lines up to a blank line):
  title: Getting Started
  destination_dirs: [a/, b/]     # Fan out to several directories
  template: wide.html            # Page template for this document

Run 'doctool gen-config' to print a documented docs.yaml.")]
#[command(version)]
struct Cli {
    /// Master config layered below every target's own config
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override a setting (dotted keys nest; values parse as JSON when valid)
    #[arg(short = 's', long = "set", value_name = "KEY=VALUE", global = true)]
    overrides: Vec<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline and write the site
    Build {
        /// Documentation roots or config files (default: current directory)
        targets: Vec<PathBuf>,
    },
    /// Plan the site without rendering or writing
    Check {
        /// Documentation roots or config files (default: current directory)
        targets: Vec<PathBuf>,
    },
    /// Print a stock docs.yaml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Build { targets } => {
            let options = generator_options(targets, cli.config, cli.overrides)?;
            let summaries = Generator::collect(options)?.run()?;

            println!("==> Build complete");
            for summary in &summaries {
                output::print_summary(summary);
            }
            if summaries.iter().any(|s| s.has_failures()) {
                std::process::exit(1);
            }
        }
        Command::Check { targets } => {
            let options = generator_options(targets, cli.config, cli.overrides)?;
            let mut generator = Generator::collect(options)?;
            generator.run_through(Stage::BuildIndexes)?;

            for unit in generator.units() {
                let narrated = unit
                    .utility_names()
                    .iter()
                    .any(|n| utility::resolve(n) == Some("printer"));
                if !narrated {
                    println!("==> Checking {}", unit.state.config.name());
                    output::print_plug_actions(&unit.state.plug_actions);
                    output::print_tree(&unit.state.tree);
                }
            }
            println!("==> Content is valid");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_yaml());
        }
    }

    Ok(())
}

fn generator_options(
    targets: Vec<PathBuf>,
    master_config: Option<PathBuf>,
    overrides: Vec<String>,
) -> std::io::Result<GeneratorOptions> {
    let mut options = GeneratorOptions::new(std::env::current_dir()?);
    options.targets = targets;
    options.master_config = master_config;
    options.overrides = overrides;
    Ok(options)
}

/// Diagnostics go to stderr; stdout carries the narration.
fn init_tracing(verbose: u8) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match verbose {
        0 => "doctool=warn",
        1 => "doctool=debug",
        _ => "doctool=trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

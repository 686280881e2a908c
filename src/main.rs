//! sem-rewrite CLI: rewrite annotated documents into ontology-level clauses.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use sem_rewrite::cnf::Cnf;
use sem_rewrite::config::RewriteConfig;
use sem_rewrite::pipeline::Pipeline;
use sem_rewrite::render;
use sem_rewrite::rules::RuleSet;

#[derive(Parser)]
#[command(name = "sem-rewrite", version, about = "Semantic rewriting engine")]
struct Cli {
    /// TOML config file (see `init-config`).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite every sentence of an annotated JSON document.
    Rewrite {
        /// Rule file.
        #[arg(long)]
        rules: PathBuf,

        /// Annotated document (JSON).
        #[arg(long)]
        document: PathBuf,

        /// Taxonomy (TOML) answering guard queries.
        #[arg(long)]
        ontology: Option<PathBuf>,

        /// Print the full outcome as JSON.
        #[arg(long)]
        json: bool,

        /// Process sentences in parallel.
        #[arg(long)]
        parallel: bool,

        /// List every rule application.
        #[arg(long)]
        trace: bool,
    },

    /// Load a rule file and summarize it.
    Check {
        /// Rule file.
        #[arg(long)]
        rules: PathBuf,
    },

    /// Rewrite a raw clause list such as "nsubj(ran-2,John-1), det(dog-4,the-3)".
    Clauses {
        /// Rule file.
        #[arg(long)]
        rules: PathBuf,

        /// Taxonomy (TOML) answering guard queries.
        #[arg(long)]
        ontology: Option<PathBuf>,

        /// Clause list to rewrite.
        clauses: String,
    },

    /// Write the default config to a TOML file.
    InitConfig {
        /// Destination path.
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => RewriteConfig::load(path)?,
        None => RewriteConfig::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Rewrite {
            rules,
            document,
            ontology,
            json,
            parallel,
            trace,
        } => {
            let pipeline = Pipeline::from_files(&rules, ontology.as_deref(), config)?;
            let outcome = pipeline.process_file(&document, parallel)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome).into_diagnostic()?);
            } else {
                print!("{}", render::report(&outcome, trace));
            }
        }

        Commands::Check { rules } => {
            let set = RuleSet::from_file(&rules)?;
            println!("Rule set \"{}\" ({}):", set.name, set.source);
            println!("  {} rules, {} permanent facts", set.len(), set.facts().len());
            for rule in set.rules() {
                println!("  {:>4}  {:<24} priority {}", rule.line, rule.name, rule.priority);
            }
        }

        Commands::Clauses {
            rules,
            ontology,
            clauses,
        } => {
            let pipeline = Pipeline::from_files(&rules, ontology.as_deref(), config)?;
            let input: Cnf = clauses.parse()?;
            let outcome = pipeline.interpreter().rewrite(&input);

            for fired in &outcome.fired {
                println!("fired {fired}");
            }
            for line in render::canonical(&outcome.cnf) {
                println!("{line}");
            }
            for formula in &outcome.formulas {
                println!("formula {formula}");
            }
            for warning in &outcome.warnings {
                println!("warning: {warning}");
            }
        }

        Commands::InitConfig { path } => {
            config.save(&path)?;
            println!("Wrote default config to {}", path.display());
        }
    }

    Ok(())
}

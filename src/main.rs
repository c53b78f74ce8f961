use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use resolvent::config::ReasonerConfig;
use resolvent::interface::Session;
use resolvent::parser::parse_query;
use resolvent::schema::MemorySchema;
use resolvent::Result;

/// Expands a match query against the rules of a schema file.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Arguments {
    /// Schema definition file (toml, json or yaml).
    schema: PathBuf,

    /// Query text, or a file holding it.
    query: String,

    /// Print the expanded query together with its statistics as JSON.
    #[arg(long)]
    json: bool,

    /// Reasoner settings file.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn run(arguments: Arguments, config: ReasonerConfig) -> Result<()> {
    let schema = MemorySchema::load(&arguments.schema)?;
    info!(
        schema = %arguments.schema.display(),
        types = schema.type_count(),
        rules = schema.rule_count(),
        "schema loaded"
    );
    let text = match std::fs::read_to_string(Path::new(&arguments.query)) {
        Ok(contents) => contents,
        Err(_) => arguments.query.clone(),
    };
    let query = parse_query(&text)?;
    let session = Session::new(Arc::new(schema), config);
    let expansion = session.expand(&query)?;
    if arguments.json {
        let output = serde_json::json!({
            "query": expansion.query().to_string(),
            "stats": expansion.stats(),
        });
        println!("{}", output);
    } else {
        println!("{}", expansion.query());
    }
    Ok(())
}

fn main() {
    let arguments = Arguments::parse();
    let config = match ReasonerConfig::load(arguments.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(arguments, config) {
        error!(error = %e, "expansion failed");
        std::process::exit(1);
    }
}

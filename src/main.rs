use clap::{Parser, Subcommand};
use std::process;

use scribe_predict::{app, registry_from_config, ModelCatalog, ScribeConfig};

#[derive(Parser)]
#[command(name = "scribe")]
#[command(version)]
#[command(about = "Next-word and sentence suggestions for the Scribe editor", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the prediction HTTP server
    Serve,
    /// Suggest the next word for a text
    Predict {
        model: String,
        #[arg(trailing_var_arg = true)]
        text: Vec<String>,
    },
    /// Complete the current sentence of a text
    Complete {
        model: String,
        #[arg(trailing_var_arg = true)]
        text: Vec<String>,
    },
    /// List the catalog models
    #[command(alias = "ls")]
    Models,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = ScribeConfig::from_env();

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Serve => app::serve(config).await,
        Commands::Predict { model, text } => suggest(config, model, text.join(" "), false).await,
        Commands::Complete { model, text } => suggest(config, model, text.join(" "), true).await,
        Commands::Models => {
            list_models();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn suggest(config: ScribeConfig, model: String, text: String, sentence: bool) -> anyhow::Result<()> {
    let prediction = tokio::task::spawn_blocking(move || -> anyhow::Result<String> {
        let registry = registry_from_config(&config)?;
        let (id, _) = registry.catalog().resolve(&model)?;
        if sentence {
            let id = registry.catalog().sentence_model_for(id).unwrap_or(id);
            Ok(registry.instance_of(id)?.get_full_prediction(&text)?)
        } else {
            Ok(registry.instance_of(id)?.get_prediction(&text))
        }
    })
    .await??;

    println!("{}", prediction);
    Ok(())
}

fn list_models() {
    println!("{:<12} {:<34} {}", "NAME", "PRETRAINED", "STRATEGY");
    for (id, spec) in ModelCatalog::builtin().iter() {
        let strategy = if spec.needs_mask { "mask-fill" } else { "next-token" };
        println!("{:<12} {:<34} {}", id.name(), spec.pretrained, strategy);
    }
}

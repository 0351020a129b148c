use clap::Parser;
use clap::Subcommand;
use edurag::config::AppConfig;
use edurag::ChatEngine;
use edurag::Result;
use tracing::info;

#[derive(Parser)]
#[command(name = "edurag")]
#[command(about = "Retrieval-backed chat over institutional school documents")]
#[command(version)]
struct Cli {
    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a single question
    Ask {
        /// Question text
        query: String,
        /// Conversation thread id
        #[arg(short, long, default_value = "cli")]
        thread: String,
        /// Print the full result as JSON instead of plain text
        #[arg(long)]
        json: bool,
    },
    /// Interactive chat session on one thread
    Chat {
        /// Conversation thread id
        #[arg(short, long, default_value = "cli")]
        thread: String,
    },
    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load()?;
    if cli.verbose {
        let mut verbose_config = config.clone();
        verbose_config.logging.level = "debug".to_string();
        edurag::logging::init_logging_with_config(Some(&verbose_config))?;
    } else {
        edurag::logging::init_logging_with_config(Some(&config))?;
    }
    info!("Configuration loaded successfully");

    match cli.command {
        Commands::Ask { query, thread, json } => {
            let engine = ChatEngine::new(&config)?;
            let result = engine.process_query(&thread, &query).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_result(&result);
            }
        }
        Commands::Chat { thread } => {
            let engine = ChatEngine::new(&config)?;
            run_chat(&engine, &thread).await?;
        }
        Commands::Config => {
            println!("Embedding endpoint: {}", config.embedding_endpoint());
            println!("Embedding model:    {}", config.embedding_model());
            println!("Vector endpoint:    {}", config.vector_endpoint());
            println!("Vector timeout:     {}s", config.vector_timeout_secs());
            println!("LLM endpoint:       {}", config.llm_endpoint());
            println!("LLM model:          {}", config.llm_model());
            println!("LLM timeout:        {}s", config.llm_timeout_secs());
            println!("Default namespace:  {}", config.retrieval.default_namespace);
        }
    }

    Ok(())
}

async fn run_chat(engine: &ChatEngine, thread: &str) -> Result<()> {
    use std::io::BufRead;
    use std::io::Write;

    println!("Chat session on thread '{thread}'. Empty line or Ctrl-D to exit.");
    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let query = line.trim();
        if query.is_empty() {
            break;
        }
        let result = engine.process_query(thread, query).await;
        print_result(&result);
    }
    println!("Session ended.");
    Ok(())
}

fn print_result(result: &edurag::models::SynthesisResult) {
    println!("{}", result.answer);
    if !result.sources.is_empty() {
        println!("\nSources:");
        for source in &result.sources {
            let download = if source.download_available {
                " (downloadable)"
            } else {
                ""
            };
            println!("  - {} [{:.2}]{}", source.filename, source.score, download);
        }
    }
    if result.confidence > 0.0 {
        println!("\nConfidence: {:.2}", result.confidence);
    }
}

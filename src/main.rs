use std::io::Read;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::BufReader;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use tfox::cli::{chat::run_chat, Commands};
use tfox::{AssistantDefinition, ClassificationOutcome, Container, ContainerConfig};

#[derive(Parser)]
#[command(name = "tfox")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Answer from an in-process scripted assistant instead of the API
    #[arg(long, global = true)]
    mock_assistant: bool,

    /// Keep documents in memory instead of DuckDB
    #[arg(long, global = true)]
    memory_storage: bool,

    /// Overrides BUYER_OR_SELLER_ASSISTANT_ID
    #[arg(long, global = true)]
    assistant_id: Option<String>,

    /// Overrides DATABASE_URL
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Overrides DATABASE_NAME
    #[arg(long, global = true)]
    database_name: Option<String>,

    /// Overrides TFOX_RUN_TIMEOUT_SECS
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = ContainerConfig::from_env();
    config.mock_assistant = cli.mock_assistant;
    config.memory_storage = cli.memory_storage;
    if let Some(id) = cli.assistant_id {
        config.classifier_assistant_id = Some(id);
    }
    if let Some(url) = cli.database_url {
        config.database_url = url;
    }
    if let Some(name) = cli.database_name {
        config.database_name = name;
    }
    if let Some(secs) = cli.timeout_secs {
        config.run_timeout = Some(Duration::from_secs(secs));
    }

    let container = Container::new(config)?;

    match cli.command {
        Commands::Classify { text, validate } => {
            let text = match text {
                Some(text) => text,
                None => {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf)?;
                    buf
                }
            };
            let use_case = container.classify_use_case()?;

            if validate {
                match use_case.classify_validated(&text).await? {
                    ClassificationOutcome::Valid(result) => {
                        println!("{}", serde_json::to_string_pretty(&result)?);
                    }
                    ClassificationOutcome::Invalid { reason, raw } => {
                        println!("{}", serde_json::to_string_pretty(&raw)?);
                        anyhow::bail!("classification rejected: {}", reason);
                    }
                }
            } else {
                let value = use_case.execute(&text).await?;
                println!("{}", serde_json::to_string_pretty(&value)?);
            }
        }

        Commands::Chat { opening } => {
            let lifecycle = container.lifecycle();
            let assistant_id = container.chat_assistant_id()?.to_string();
            let session = lifecycle.connect_assistant(&assistant_id).await?;
            let mut session = lifecycle.create_thread(&session).await?;

            if let Some(opening) = opening {
                let (next, response) = lifecycle.process_message(&session, &opening).await?;
                session = next;
                println!(
                    "Assistant: {}",
                    response.as_deref().unwrap_or("(no response)")
                );
            }

            let stdin = BufReader::new(tokio::io::stdin());
            let mut stdout = tokio::io::stdout();
            run_chat(&lifecycle, session, stdin, &mut stdout).await?;
        }

        Commands::Analyze {
            collection,
            text_field,
            analysis_field,
        } => {
            let use_case = container
                .analyze_use_case(&collection)?
                .with_text_field(text_field)
                .with_analysis_field(analysis_field)
                .with_progress(true);

            let report = use_case.execute().await?;
            println!(
                "Analyzed {} of {} documents ({} skipped)",
                report.analyzed, report.examined, report.skipped
            );
        }

        Commands::CreateAssistant {
            name,
            instructions,
            model,
            file_id,
        } => {
            let instructions = match instructions.strip_prefix('@') {
                Some(path) => std::fs::read_to_string(path)
                    .with_context(|| format!("reading instructions from {}", path))?,
                None => instructions,
            };
            let mut definition =
                AssistantDefinition::new(name, instructions).with_file_ids(file_id);
            if let Some(model) = model {
                definition = definition.with_model(model);
            }

            let session = container.lifecycle().create_assistant(&definition).await?;
            if let Some(assistant) = session.assistant() {
                info!("Assistant model: {}", assistant.model());
                println!("{}", assistant.id());
            }
        }

        Commands::UploadFile { path } => {
            let file_id = container.lifecycle().upload_file(&path).await?;
            println!("{}", file_id);
        }
    }

    Ok(())
}

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use conversation_tree::{LlmMetadata, Role, TreeView};
use discussion_service::{DiscussionService, FileDiscussionRepository, ServiceConfig};
use serde_json::json;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "discussion-cli")]
#[command(about = "Branching discussions stored as message trees")]
#[command(version)]
struct Cli {
    /// Directory holding discussion files
    #[arg(long, env = "TREECHAT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    lock_timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a discussion rooted at a system prompt
    Create {
        #[arg(long)]
        system_prompt: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        owner: Option<String>,
    },
    /// Append a message under the current node, or under --parent
    Append {
        discussion: Uuid,
        #[arg(long)]
        role: Role,
        #[arg(long)]
        content: String,
        #[arg(long)]
        parent: Option<Uuid>,
        /// Model that produced the message
        #[arg(long)]
        model: Option<String>,
        #[arg(long, requires = "model")]
        provider: Option<String>,
    },
    /// Move the current pointer to a node
    Select { discussion: Uuid, node: Uuid },
    /// Move the current pointer to the newest message
    Latest { discussion: Uuid },
    /// Point at the last user message so the next reply is a new branch
    Retry { discussion: Uuid },
    /// Print the root-to-node path (current node by default)
    Path {
        discussion: Uuid,
        #[arg(long)]
        node: Option<Uuid>,
    },
    /// Print the whole tree as nested JSON
    Tree { discussion: Uuid },
    /// Search message content
    Search { discussion: Uuid, query: String },
    /// List discussions, most recently updated first
    List {
        #[arg(long)]
        owner: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    /// Set the title; an empty title clears it
    Rename { discussion: Uuid, title: String },
    /// Delete a discussion
    Delete { discussion: Uuid },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = ServiceConfig::load(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(timeout) = cli.lock_timeout_ms {
        config.lock_timeout_ms = timeout;
    }

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str())),
        )
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_line_number(true)
                .with_file(false),
        )
        .init();

    let repository = FileDiscussionRepository::new(&config.data_dir);
    repository
        .init()
        .await
        .with_context(|| format!("cannot create {}", config.data_dir.display()))?;
    let service = DiscussionService::new(repository, &config);

    tracing::debug!(data_dir = %config.data_dir.display(), "Discussion CLI started");

    let output = run(&service, cli.command).await?;
    let mut stdout = std::io::stdout().lock();
    match output {
        Output::Json(value) => serde_json::to_writer_pretty(&mut stdout, &value)?,
        Output::View(view) => view.write_json_pretty(&mut stdout)?,
    }
    writeln!(stdout)?;
    Ok(())
}

enum Output {
    Json(serde_json::Value),
    /// Written straight from the view; it can be far deeper than a
    /// `serde_json::Value` handles.
    View(TreeView),
}

async fn run(
    service: &DiscussionService<FileDiscussionRepository>,
    command: Commands,
) -> anyhow::Result<Output> {
    let output = match command {
        Commands::Create {
            system_prompt,
            title,
            owner,
        } => {
            let created = service
                .create_discussion(owner, title, system_prompt)
                .await?;
            serde_json::to_value(created)?
        }
        Commands::Append {
            discussion,
            role,
            content,
            parent,
            model,
            provider,
        } => {
            let metadata = model.map(|model| LlmMetadata {
                model: Some(model),
                provider,
                ..LlmMetadata::default()
            });
            let node_id = match parent {
                Some(parent) => {
                    service
                        .append_message_at(discussion, parent, role, content, metadata)
                        .await?
                }
                None => {
                    service
                        .append_message(discussion, role, content, metadata)
                        .await?
                }
            };
            json!({ "node_id": node_id })
        }
        Commands::Select { discussion, node } => {
            service.select(discussion, node).await?;
            json!({ "current_node_id": node })
        }
        Commands::Latest { discussion } => {
            let node = service.select_latest(discussion).await?;
            json!({ "current_node_id": node })
        }
        Commands::Retry { discussion } => {
            serde_json::to_value(service.prepare_retry(discussion).await?)?
        }
        Commands::Path { discussion, node } => {
            serde_json::to_value(service.get_path(discussion, node).await?)?
        }
        Commands::Tree { discussion } => {
            return Ok(Output::View(service.get_tree(discussion).await?));
        }
        Commands::Search { discussion, query } => {
            serde_json::to_value(service.search(discussion, &query).await?)?
        }
        Commands::List {
            owner,
            limit,
            offset,
        } => serde_json::to_value(service.list(owner.as_deref(), limit, offset).await?)?,
        Commands::Rename { discussion, title } => {
            service.rename(discussion, Some(title)).await?;
            json!({ "renamed": discussion })
        }
        Commands::Delete { discussion } => {
            service.delete(discussion).await?;
            json!({ "deleted": discussion })
        }
    };
    Ok(Output::Json(output))
}

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use tokio::io::BufReader;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use gworkspace_google::Service;
use gworkspace_mcp::config::Settings;
use gworkspace_mcp::initialize::server_name;
use gworkspace_mcp::install::{absolute_token_dir, default_config_path, install, server_entry};
use gworkspace_mcp::server::McpServer;
use gworkspace_mcp::tools::ToolRegistry;

#[derive(Parser, Debug)]
#[command(name = "gworkspace-mcp", version, about = "MCP servers for Google Drive, Gmail, Calendar and Tasks")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct TokenArgs {
    /// Directory holding one token file per service
    #[arg(long, env = "GWORKSPACE_MCP_TOKEN_DIR")]
    token_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct AuthArgs {
    /// OAuth client secrets downloaded from the Google Cloud Console
    #[arg(long, env = "GWORKSPACE_MCP_CREDENTIALS")]
    credentials: PathBuf,
    #[command(flatten)]
    tokens: TokenArgs,
    /// Print the consent URL instead of opening a browser
    #[arg(long)]
    no_browser: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the MCP server for one service on stdio
    Serve {
        service: Service,
        #[command(flatten)]
        auth: AuthArgs,
        #[arg(long, default_value = "stdio")]
        transport: String,
    },
    /// Run the OAuth consent flow now and store the token
    Auth {
        service: Service,
        #[command(flatten)]
        auth: AuthArgs,
    },
    /// Revoke and delete the stored token
    Logout {
        service: Service,
        /// Used to reach Google's revocation endpoint; without it only the local file is removed
        #[arg(long, env = "GWORKSPACE_MCP_CREDENTIALS")]
        credentials: Option<PathBuf>,
        #[command(flatten)]
        tokens: TokenArgs,
    },
    /// Register the server in an MCP host's config (Claude Desktop by default)
    Install {
        service: Service,
        #[arg(long, env = "GWORKSPACE_MCP_CREDENTIALS")]
        credentials: PathBuf,
        /// Host config file to edit
        #[arg(long)]
        config: Option<PathBuf>,
        /// Entry name under mcpServers (default gworkspace-<service>)
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        tokens: TokenArgs,
    },
}

fn init_tracing() {
    // stdout carries the protocol
    let filter = EnvFilter::try_from_env("GWORKSPACE_MCP_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { service, auth, transport } => {
            if transport != "stdio" {
                bail!("only stdio transport is supported");
            }
            let settings = Settings::new(service, Some(auth.credentials), auth.tokens.token_dir, auth.no_browser)?;
            let registry = ToolRegistry::new(service, settings.google_client()?);
            info!("Starting {} ({} tools)", server_name(service), registry.tools().len());

            let server = McpServer::new(registry);
            server
                .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
                .await?;
        }
        Command::Auth { service, auth } => {
            let settings = Settings::new(service, Some(auth.credentials), auth.tokens.token_dir, auth.no_browser)?;
            let manager = settings.token_manager(false)?;
            let account = manager.authorize(settings.prompt).await?;
            match account {
                Some(email) => println!("Authorized {} for {}", service.display_name(), email),
                None => println!("Authorized {}", service.display_name()),
            }
            println!("Token saved to {}", manager.store().path().display());
        }
        Command::Logout { service, credentials, tokens } => {
            let settings = Settings::new(service, credentials, tokens.token_dir, true)?;
            let removed = if settings.credentials.is_some() {
                settings.token_manager(false)?.revoke().await?
            } else {
                warn!("No client secrets given; removing the local token without revoking it");
                settings.token_store().remove()?
            };
            if removed {
                println!("Logged out of {}", service.display_name());
            } else {
                println!("No stored token for {}", service.display_name());
            }
        }
        Command::Install { service, credentials, config, name, tokens } => {
            let credentials = std::fs::canonicalize(&credentials)
                .with_context(|| format!("credentials file {}", credentials.display()))?;
            let exe = std::env::current_exe().context("locating the gworkspace-mcp binary")?;
            let config_path = match config {
                Some(path) => path,
                None => default_config_path().context("could not determine the host config location; pass --config")?,
            };
            let name = name.unwrap_or_else(|| server_name(service));

            let token_dir = tokens.token_dir.as_deref().map(absolute_token_dir).transpose()?;
            let entry = server_entry(&exe, service, &credentials, token_dir.as_deref());
            let outcome = install(&config_path, &name, entry)?;
            if let Some(backup) = outcome.backup {
                println!("Backed up {} to {}", config_path.display(), backup.display());
            }
            println!(
                "{} '{}' in {}. Restart the host application to pick it up.",
                if outcome.replaced { "Updated" } else { "Installed" },
                name,
                config_path.display()
            );
        }
    }

    Ok(())
}

//! wavebot - demo chat bot
//!
//! Connects to the gateway and answers a handful of prefix commands.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use wavebot::gateway::events::{MESSAGE_CREATE, READY};
use wavebot::{ClientConfig, Command, GatewayClient, Intents, User};

#[derive(Parser)]
#[command(name = "wavebot")]
#[command(about = "Demo chat bot built on the wavebot gateway client")]
#[command(version)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and run the bot until Ctrl-C or disconnect
    Run {
        /// Path to a TOML config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Bot token (overrides the config file)
        #[arg(long, env = "WAVEBOT_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// Command prefix (overrides the config file)
        #[arg(long)]
        prefix: Option<char>,
    },

    /// Write a sample config file
    InitConfig {
        /// Path to write config
        #[arg(short, long, default_value = "wavebot.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json)?;

    match cli.command {
        Commands::Run {
            config,
            token,
            prefix,
        } => run_bot(config, token, prefix).await?,
        Commands::InitConfig { output, force } => init_config(&output, force)?,
    }

    Ok(())
}

fn init_tracing(json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("wavebot=info".parse()?);
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
    Ok(())
}

fn load_config(
    path: Option<PathBuf>,
    token: Option<String>,
    prefix: Option<char>,
) -> anyhow::Result<ClientConfig> {
    let mut config = match path {
        Some(path) => ClientConfig::from_file(&path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ClientConfig::default(),
    };
    if let Some(token) = token {
        config = config.with_token(token);
    }
    if let Some(prefix) = prefix {
        config = config.with_command_prefix(prefix);
    }
    config.validate()?;
    config.require_token()?;
    Ok(config)
}

async fn run_bot(
    path: Option<PathBuf>,
    token: Option<String>,
    prefix: Option<char>,
) -> anyhow::Result<()> {
    let config = load_config(path, token, prefix)?;
    info!(
        intents = ?config.intents,
        prefix = %config.command_prefix,
        "starting wavebot"
    );

    let client = build_bot(config);
    let shutdown = client.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, shutting down");
            shutdown.shutdown();
        }
    });

    if let Err(e) = client.run().await {
        error!(error = %e, "bot stopped");
        return Err(e.into());
    }
    info!("bot stopped");
    Ok(())
}

fn build_bot(config: ClientConfig) -> GatewayClient {
    GatewayClient::new(config)
        .with_event_handler(READY, |ctx, _event| async move {
            if let Some(user) = ctx.current_user() {
                info!(user = %user.username, user_id = %user.id, "bot is running");
            }
            Ok(())
        })
        .with_event_handler(MESSAGE_CREATE, |ctx, event| async move {
            let Some(message) = event.as_message() else {
                return Ok(());
            };
            let own_id = ctx.current_user().map(|u| u.id);
            let author = message.author.as_ref();
            if author.is_none_or(|a| Some(&a.id) == own_id.as_ref()) {
                return Ok(());
            }

            info!(
                author = %author.map_or("", |a| a.username.as_str()),
                content = %message.content,
                "message received"
            );
            if message.content.to_lowercase().contains("hello bot") {
                let greeting = format!(
                    "Hello there! Try using my commands with the {} prefix.",
                    ctx.command_prefix()
                );
                ctx.reply(message, greeting).await?;
            }
            Ok(())
        })
        .with_command("ping", "Checks that the bot is responsive", |ctx, message, _args| async move {
            ctx.reply(&message, "Pong!").await?;
            Ok(())
        })
        .with_command("echo", "Repeats your message back to you", |ctx, message, args| async move {
            ctx.reply(&message, echo_reply(&args)).await?;
            Ok(())
        })
        .with_command("help", "Shows the list of available commands", |ctx, message, _args| async move {
            let text = help_text(ctx.command_prefix(), ctx.commands());
            ctx.reply(&message, text).await?;
            Ok(())
        })
        .with_command("userinfo", "Shows information about you", |ctx, message, _args| async move {
            let text = message
                .author
                .as_ref()
                .map_or_else(|| "No author on this message.".to_string(), user_info);
            ctx.reply(&message, text).await?;
            Ok(())
        })
}

fn echo_reply(args: &str) -> String {
    if args.trim().is_empty() {
        "You didn't provide anything for me to echo!".to_string()
    } else {
        format!("Echo: {args}")
    }
}

fn help_text<'a>(prefix: char, commands: impl Iterator<Item = &'a Command>) -> String {
    let mut text = String::from("**Available Commands:**");
    for command in commands {
        text.push_str(&format!("\n{prefix}{} - {}", command.name, command.description));
    }
    text
}

fn user_info(user: &User) -> String {
    let mut text = format!(
        "**User Information**\nUsername: {}\nID: {}",
        user.username, user.id
    );
    if user.bot {
        text.push_str("\nBot account");
    }
    text
}

fn init_config(output: &Path, force: bool) -> anyhow::Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            output.display()
        );
    }

    let config = ClientConfig::default()
        .with_intents(Intents::GUILDS | Intents::MESSAGES | Intents::MESSAGE_CONTENT);
    config.save(output)?;

    println!("Config written to {}", output.display());
    println!("Set WAVEBOT_TOKEN or add `token = \"...\"` before running.");
    Ok(())
}

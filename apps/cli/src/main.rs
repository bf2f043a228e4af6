//! discord-export CLI - Export a Discord channel's history to JSON
//!
//! Finds Discord sessions in local browser profiles (or takes a token),
//! lets the user pick a server/DM and channel, then writes every message
//! of that channel to a JSON file.
//!
//! Usage:
//!   discord-export [--token T] [--server-id S] [--channel-id C] [--output FILE]
//!   discord-export accounts   - List accounts found in browser profiles
//!   discord-export whoami     - Show the user a token belongs to

use anyhow::Result;
use chrono::Local;
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use dialoguer::{theme::ColorfulTheme, Select};
use discord_export_core::{export, AccountFinder, Channel, Config, Credential, Discord};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

/// discord-export - Export Discord channel history using a browser session
#[derive(Parser)]
#[command(name = "discord-export")]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    export: ExportArgs,

    /// Log level
    #[arg(long, value_enum, default_value_t = LogLevel::Info, global = true)]
    log: LogLevel,

    /// Config file (default: ~/.config/discord-export/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Export the messages of a channel (default command)
    Export(ExportArgs),

    /// List Discord accounts found in browser profiles
    Accounts,

    /// Show the user an authentication token belongs to
    Whoami {
        /// Authentication token (default: pick a discovered account)
        #[arg(long)]
        token: Option<String>,
    },
}

#[derive(Args, Default)]
struct ExportArgs {
    /// Authentication token
    #[arg(long)]
    token: Option<String>,

    /// Server ID, leave empty for direct messages
    #[arg(long)]
    server_id: Option<String>,

    /// Channel ID
    #[arg(long)]
    channel_id: Option<String>,

    /// Path to the output file
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Quiet,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
            Self::Quiet => "off",
        }
    }
}

/// Where the channel to export lives.
#[derive(Clone, Copy, PartialEq, Eq)]
enum ChannelType {
    Server,
    Discussion,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.log)?;

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };

    match cli.command {
        Some(Commands::Export(args)) => cmd_export(args, &config),
        Some(Commands::Accounts) => cmd_accounts(),
        Some(Commands::Whoami { token }) => cmd_whoami(token, &config),
        None => cmd_export(cli.export, &config),
    }
}

fn init_logging(level: LogLevel) -> Result<()> {
    let directive = level.directive();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("discord_export={}", directive).parse()?)
                .add_directive(format!("discord_export_core={}", directive).parse()?),
        )
        .with_target(false)
        .init();
    Ok(())
}

// ============ SELECTION ============

/// Show a menu; `None` when there is nothing to pick or the user cancels.
fn choose(prompt: &str, items: &[String]) -> Result<Option<usize>> {
    if items.is_empty() {
        return Ok(None);
    }
    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .items(items)
        .default(0)
        .interact_opt()?;
    Ok(selection)
}

/// Use the given token, or let the user pick a discovered account.
fn resolve_token(token: Option<String>) -> Result<Option<String>> {
    if let Some(token) = token.filter(|t| !t.is_empty()) {
        return Ok(Some(token));
    }

    let accounts: Vec<Credential> = AccountFinder::new()?.find_accounts().into_iter().collect();
    if accounts.is_empty() {
        warn!("No Discord account found in browser profiles");
        return Ok(None);
    }

    let labels: Vec<String> = accounts.iter().map(Credential::display_label).collect();
    Ok(choose("Please select an account", &labels)?.map(|i| accounts[i].token.clone()))
}

fn choose_channel_type() -> Result<Option<ChannelType>> {
    let options = ["Server".to_string(), "Discussion Channel".to_string()];
    let choice = choose(
        "Do you want to export messages from a server or a discussion channel?",
        &options,
    )?;
    Ok(choice.map(|i| {
        if i == 0 {
            ChannelType::Server
        } else {
            ChannelType::Discussion
        }
    }))
}

fn choose_server(discord: &Discord) -> Result<Option<String>> {
    let servers = discord.guilds();
    let names: Vec<String> = servers.iter().map(|g| g.name.clone()).collect();
    Ok(choose("Select a server", &names)?.map(|i| servers[i].uid.clone()))
}

fn choose_channel(prompt: &str, channels: &[Channel]) -> Result<Option<String>> {
    let names: Vec<String> = channels.iter().map(|c| c.name.clone()).collect();
    Ok(choose(prompt, &names)?.map(|i| channels[i].uid.clone()))
}

// ============ EXPORT COMMAND ============

fn cmd_export(args: ExportArgs, config: &Config) -> Result<()> {
    let Some(token) = resolve_token(args.token)? else {
        error!("No token provided");
        return Ok(());
    };
    let discord = Discord::new(&token, config)?;

    let channel_id = match args.channel_id.filter(|id| !id.is_empty()) {
        Some(id) => id,
        None => {
            let server_id = match args.server_id.filter(|id| !id.is_empty()) {
                Some(id) => Some(id),
                None => match choose_channel_type()? {
                    None => {
                        error!("No channel type provided");
                        return Ok(());
                    }
                    Some(ChannelType::Server) => match choose_server(&discord)? {
                        Some(id) => Some(id),
                        None => {
                            error!("No server ID provided");
                            return Ok(());
                        }
                    },
                    Some(ChannelType::Discussion) => None,
                },
            };

            let channel = match server_id {
                Some(id) => choose_channel("Select a channel", &discord.guild_channels(&id))?,
                None => choose_channel("Select a discussion channel", &discord.channels())?,
            };
            match channel {
                Some(id) => id,
                None => {
                    error!("No channel ID provided");
                    return Ok(());
                }
            }
        }
    };

    export_channel(&discord, &channel_id, args.output.as_deref(), config)
}

fn export_channel(
    discord: &Discord,
    channel_id: &str,
    output: Option<&Path>,
    config: &Config,
) -> Result<()> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(format!("Fetching messages of channel {}...", channel_id));

    let messages = discord.messages_with_progress(channel_id, |count| {
        spinner.set_message(format!("Fetched {} messages...", count));
    });
    spinner.finish_and_clear();

    if messages.is_empty() {
        warn!("No messages fetched: the channel is empty or the API could not be reached");
    }

    let output_path = export::resolve_output_path(
        output,
        config.output_dir.as_deref(),
        channel_id,
        &Local::now(),
    );
    info!("Writing messages to {}", output_path.display());
    export::write_messages(&output_path, &messages)?;

    println!(
        "{} Exported {} messages to {}",
        "✓".green(),
        messages.len().to_string().cyan(),
        output_path.display()
    );
    Ok(())
}

// ============ ACCOUNTS COMMAND ============

fn cmd_accounts() -> Result<()> {
    println!("{}", "Scanning browser profiles...".cyan());

    let accounts = AccountFinder::new()?.find_accounts();
    if accounts.is_empty() {
        println!("{}", "No Discord accounts found.".yellow());
        return Ok(());
    }

    println!(
        "\n{} {} account(s):\n",
        "Found".green(),
        accounts.len().to_string().green().bold()
    );
    for (idx, account) in accounts.iter().enumerate() {
        println!(
            "  {}. {} [{}]",
            (idx + 1).to_string().cyan(),
            account.email.white().bold(),
            account.source.dimmed()
        );
    }
    println!();
    Ok(())
}

// ============ WHOAMI COMMAND ============

fn cmd_whoami(token: Option<String>, config: &Config) -> Result<()> {
    let Some(token) = resolve_token(token)? else {
        error!("No token provided");
        return Ok(());
    };

    match Discord::new(&token, config)?.me() {
        Some(user) => println!("{} {} ({})", "✓".green(), user.name.bold(), user.uid.dimmed()),
        None => error!("Cannot fetch the current user: invalid token or API unreachable"),
    }
    Ok(())
}

mod broadcast;
mod commands;
mod conversation;
mod fault;
mod gateway;
mod init;
mod registry;
mod shell;
mod state;

#[cfg(test)]
mod testutil;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use gavel_channels::DiscordChannel;
use gavel_core::config::{self, shellexpand};
use gavel_core::traits::Channel;
use gavel_store::Store;
use tracing_subscriber::fmt::writer::MakeWriterExt;

#[derive(Parser)]
#[command(
    name = "gavel",
    version,
    about = "Club assistant bot for Discord: attendance, meetings, announcements"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot.
    Start,
    /// Print config summary and store counts.
    Status,
    /// Interactive first-time setup.
    Init,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start => {
            let cfg = config::load(&cli.config)?;
            let _guard = init_tracing(&cfg)?;

            if cfg.discord.bot_token.is_empty() {
                anyhow::bail!(
                    "Discord bot token is empty. Set [discord] bot_token in {} \
                     or run `gavel init`.",
                    cli.config
                );
            }

            let store = Store::new(&cfg.store).await?;
            let channel: Arc<dyn Channel> = Arc::new(DiscordChannel::new(cfg.discord.clone()));

            let gw = Arc::new(gateway::Gateway::new(channel, store, cfg));
            gw.run().await?;
        }
        Commands::Status => {
            let cfg = config::load(&cli.config)?;
            println!("gavel status\n");
            println!("Config: {}", cli.config);
            println!("Club: {}", cfg.club.name);
            println!("Data dir: {}", cfg.gavel.data_dir);
            println!(
                "Bot token: {}",
                if cfg.discord.bot_token.is_empty() {
                    "missing"
                } else {
                    "configured"
                }
            );
            println!(
                "Guild: {}",
                if cfg.discord.guild_id.is_empty() {
                    "not set"
                } else {
                    cfg.discord.guild_id.as_str()
                }
            );
            println!(
                "Admins: {} | Server admins: {} | Maintainer: {}",
                cfg.club.admins.len(),
                cfg.club.server_admins.len(),
                if cfg.club.maintainer.is_empty() {
                    "not set"
                } else {
                    "set"
                }
            );

            let store = Store::new(&cfg.store).await?;
            println!();
            println!("Members: {}", store.member_count().await?);
            println!("Attendance records: {}", store.attendance_count().await?);
        }
        Commands::Init => init::run(&cli.config)?,
    }

    Ok(())
}

/// Log to stdout and a daily-rolling file under `{data_dir}/logs`. The
/// returned guard must stay alive for the file writer to flush.
fn init_tracing(
    cfg: &config::Config,
) -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    let log_dir = std::path::Path::new(&shellexpand(&cfg.gavel.data_dir)).join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(&log_dir, "gavel.log"));

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.gavel.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(file_writer.and(std::io::stdout))
        .with_ansi(false)
        .init();

    Ok(guard)
}

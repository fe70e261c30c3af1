//! Console Bot Demo
//!
//! Runs the Herald dispatcher against the in-memory transport, with stdin as
//! the chat. Each input line is either a raw JSON event or plain text, which
//! is sent as a direct message from `U_CONSOLE`. Everything the bot sends is
//! printed to stdout.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package console-bot -- --help-command
//! > ping
//! [D_CONSOLE] pong
//! > {"type": "message", "user": "U2", "channel": "C1", "text": "<@UHERALD> echo hi"}
//! [C1] hi
//! > {"type": "invalid_auth"}
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use herald::prelude::*;
use herald_transport::{MemoryHandle, MemoryTransport};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

const CONSOLE_USER: &str = "U_CONSOLE";
const CONSOLE_CHANNEL: &str = "D_CONSOLE";

#[derive(Parser)]
#[command(name = "console-bot")]
#[command(about = "Herald dispatcher driven from stdin", long_about = None)]
struct Cli {
    /// Configuration file (defaults to searching for herald.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// The bot's user id; mention it as <@ID>.
    #[arg(long, default_value = "UHERALD")]
    bot_id: String,

    /// Log per-event diagnostics at info level.
    #[arg(long)]
    debug: bool,

    /// Register the built-in help command.
    #[arg(long)]
    help_command: bool,
}

// ============================================================================
// Handlers
// ============================================================================

async fn deploy(ctx: DispatchContext, args: CommandArgs) -> SendResult<()> {
    let env = args.get_or("env", "staging").to_string();
    if env == "prod" && !ctx.is_direct() {
        return ctx.report_error("production deploys must be requested in a DM").await;
    }

    let options = ReplyOptions::new()
        .attachment(
            Attachment::new(format!("Deploying to {env}"))
                .title("Deploy")
                .color("good")
                .field("Environment", env.as_str(), true),
        )
        .block(Block::Divider);
    ctx.reply_with(format!("Deploy to *{env}* started"), options).await
}

async fn add(_ctx: DispatchContext, args: CommandArgs) -> Result<String> {
    let a: i64 = args.parse("a").ok_or_else(|| anyhow::anyhow!("<a> must be a number"))?;
    let b: i64 = args.parse("b").ok_or_else(|| anyhow::anyhow!("<b> must be a number"))?;
    Ok(format!("{a} + {b} = {}", a + b))
}

async fn countdown(ctx: DispatchContext, args: CommandArgs) -> SendResult<()> {
    let seconds: u64 = args.positional().first().and_then(|s| s.parse().ok()).unwrap_or(3);
    for remaining in (1..=seconds).rev() {
        ctx.reply(remaining.to_string()).await?;
        tokio::select! {
            _ = ctx.cancelled() => return Ok(()),
            _ = tokio::time::sleep(std::time::Duration::from_secs(1)) => {}
        }
    }
    ctx.reply("liftoff").await
}

// ============================================================================
// Console plumbing
// ============================================================================

fn to_event(line: &str) -> Value {
    serde_json::from_str(line).unwrap_or_else(|_| {
        json!({
            "type": "message",
            "user": CONSOLE_USER,
            "channel": CONSOLE_CHANNEL,
            "text": line,
        })
    })
}

async fn read_stdin(handle: Arc<MemoryHandle>) -> Result<()> {
    handle.push_json(json!({"type": "hello"}));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if !line.is_empty() {
            handle.push_json(to_event(line));
        }
    }

    handle.end();
    Ok(())
}

async fn print_sent(handle: Arc<MemoryHandle>) {
    while let Some(sent) = handle.next_sent().await {
        println!("[{}] {}", sent.channel, sent.message.text);
        for attachment in &sent.message.attachments {
            if let Some(text) = attachment.text.as_deref().or(attachment.fallback.as_deref()) {
                println!("    | {text}");
            }
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.file(path);
    }
    if cli.debug {
        loader = loader.set("dispatcher.debug", true);
    }
    if cli.help_command {
        loader = loader.set("dispatcher.help_command", true);
    }
    let config = loader.load()?;
    init_logging(&config);

    let bot = BotIdentity::new(cli.bot_id).with_name("herald");
    let (transport, handle) = MemoryTransport::pair(bot);
    let handle = Arc::new(handle);

    let dispatcher = Dispatcher::builder(Arc::new(transport))
        .with_config(&config)
        .command("ping", |_ctx, _args| async { "pong" })?
        .command("echo *", |_ctx, args: CommandArgs| async move {
            args.rest().unwrap_or_default().to_string()
        })?
        .command("add <a> <b>", add)?
        .command("deploy <env>", deploy)?
        .command("countdown *", countdown)?
        .fallback(|ctx: DispatchContext, args: CommandArgs| async move {
            let text = args.rest().unwrap_or_default().to_string();
            ctx.reply(format!("I don't know how to `{text}`")).await
        })
        .on_init(|ctx: DispatchContext| async move {
            info!(bot = %ctx.bot().user_id, "Connected, type a command");
        })
        .on_error(|_ctx, message: String| async move {
            warn!(%message, "Transport reported an error");
        })
        .on_unrecognized(|_ctx, raw: RawEvent| async move {
            info!(%raw, "Ignoring unrecognized event");
        })
        .build();

    // Nothing else owns this task; it ends with stdin.
    tokio::spawn({
        let handle = Arc::clone(&handle);
        async move {
            if let Err(e) = read_stdin(handle).await {
                error!(error = %e, "Failed to read stdin");
            }
        }
    });
    tokio::spawn(print_sent(Arc::clone(&handle)));

    let reason = dispatcher.run_until_signal().await?;
    info!(?reason, "Console bot finished");
    Ok(())
}

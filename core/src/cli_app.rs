use crate::client::Client;
use crate::conversation_store::{relative_time, ConversationFilter};
use crate::media_catalog::{MediaFilter, MediaKind, SortKey};
use crate::message_thread::MessageStatus;
use crate::notifier::{EventBus, LogNotifier};
use crate::onboarding::{OnboardingSequencer, Transition};
use crate::seed::SeedSnapshot;
use crate::session_store::SessionStore;
use colored::*;
use std::path::PathBuf;
use std::sync::Arc;

/// Offline CLI: runs the core in-process against a seed snapshot.
pub fn run(args: Vec<String>) -> anyhow::Result<()> {
    let bin = args
        .first()
        .map(|s| s.as_str())
        .unwrap_or("whisperly-cli")
        .to_string();

    let opts = match CliArgs::parse(&args[1.min(args.len())..]) {
        Ok(o) => o,
        Err(msg) => {
            eprintln!("{} {}", "✗".red().bold(), msg.red());
            print_usage(&bin);
            return Ok(());
        }
    };
    let Some(command) = opts.positional.first().cloned() else {
        print_usage(&bin);
        return Ok(());
    };

    if command == "onboarding" {
        show_onboarding();
        return Ok(());
    }

    let seed = match &opts.seed {
        Some(path) => SeedSnapshot::load(path).map_err(|e| anyhow::anyhow!("{}", e))?,
        None => SeedSnapshot::builtin(),
    };

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    rt.block_on(run_command(&bin, &command, &opts, seed))
}

async fn run_command(
    bin: &str,
    command: &str,
    opts: &CliArgs,
    seed: SeedSnapshot,
) -> anyhow::Result<()> {
    let session = SessionStore::temporary().map_err(|e| anyhow::anyhow!("{}", e))?;
    let client = Client::with_notifier(seed, session, "me", EventBus::new(), Arc::new(LogNotifier))
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    while client
        .advance_onboarding()
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?
        != Transition::Completed
    {}

    let query = opts.positional.get(1).cloned().unwrap_or_default();
    match command {
        "inbox" => show_inbox(&client, &query, opts).await,
        "thread" => {
            if query.is_empty() {
                eprintln!("{}", format!("Usage: {} thread <conversation_id>", bin).yellow());
                return Ok(());
            }
            show_thread(&client, &query).await
        }
        "media" => show_media(&client, &query, opts).await,
        "settings" => {
            show_settings(&client).await;
            Ok(())
        }
        _ => {
            eprintln!("{} Unknown command: {}", "✗".red().bold(), command.red());
            print_usage(bin);
            Ok(())
        }
    }
}

#[derive(Debug, Default)]
struct CliArgs {
    positional: Vec<String>,
    filter: Option<String>,
    sort: Option<String>,
    seed: Option<PathBuf>,
}

impl CliArgs {
    fn parse(args: &[String]) -> Result<Self, String> {
        let mut out = CliArgs::default();
        let mut i = 0;
        while i < args.len() {
            let value = || {
                args.get(i + 1)
                    .cloned()
                    .ok_or_else(|| format!("{} requires a value", args[i]))
            };
            match args[i].as_str() {
                "--filter" => {
                    out.filter = Some(value()?);
                    i += 2;
                }
                "--sort" => {
                    out.sort = Some(value()?);
                    i += 2;
                }
                "--seed" => {
                    out.seed = Some(PathBuf::from(value()?));
                    i += 2;
                }
                other => {
                    out.positional.push(other.to_string());
                    i += 1;
                }
            }
        }
        Ok(out)
    }
}

fn print_usage(bin: &str) {
    println!("{}", "🔐 Whisperly CLI".bright_cyan().bold());
    println!();
    println!("{}", "Usage:".bright_white().bold());
    println!("  {} <command> [args] [--seed <file>]", bin.cyan());
    println!();
    println!("{}", "Commands:".bright_white().bold());
    println!(
        "  {} [query] [--filter all|unread|pinned|groups]   List conversations",
        "inbox".cyan()
    );
    println!("  {} <id>                                        Show a thread", "thread".cyan());
    println!(
        "  {} [query] [--filter f] [--sort date|name|size]  List media",
        "media".cyan()
    );
    println!("  {}                                         Walk the welcome steps", "onboarding".cyan());
    println!("  {}                                           Devices and preferences", "settings".cyan());
}

fn show_onboarding() {
    let mut seq = OnboardingSequencer::new();
    loop {
        let step = seq.current();
        println!(
            "{} {}",
            format!("[{}/{}]", seq.cursor() + 1, seq.len()).dimmed(),
            step.title.bright_white().bold()
        );
        println!("      {}", step.subtitle.cyan());
        println!("      {}", step.body);
        println!();
        if seq.advance() == Transition::Completed {
            break;
        }
    }
    println!("{}", "✓ Get Started".green().bold());
}

async fn show_inbox(client: &Client, query: &str, opts: &CliArgs) -> anyhow::Result<()> {
    let filter: ConversationFilter = opts
        .filter
        .as_deref()
        .unwrap_or("all")
        .parse()
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    let convs = client
        .conversations(query, filter)
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    if convs.is_empty() {
        println!("{}", "No conversations found".yellow());
        return Ok(());
    }
    let now = chrono::Utc::now();
    println!("{}", format!("Conversations ({})", convs.len()).bright_cyan().bold());
    println!("{}", "─".repeat(60).dimmed());
    for c in convs {
        let mut name = c.name.bright_white().bold().to_string();
        if c.is_pinned {
            name.push_str(&format!(" {}", "★".yellow()));
        }
        if c.is_online && !c.is_group() {
            name.push_str(&format!(" {}", "●".green()));
        }
        let unread = if c.unread_count > 0 {
            format!(" ({})", c.unread_count).cyan().bold().to_string()
        } else {
            String::new()
        };
        println!(
            "  {} [{}] {}{}  {}",
            c.id.dimmed(),
            c.avatar_label.cyan(),
            name,
            unread,
            relative_time(c.last_timestamp, now).dimmed()
        );
        match c.member_count {
            Some(n) => println!("      {}  {}", c.last_message_preview, format!("{} members", n).dimmed()),
            None => println!("      {}", c.last_message_preview),
        }
    }
    Ok(())
}

async fn show_thread(client: &Client, id: &str) -> anyhow::Result<()> {
    let view = match client
        .open_thread(id)
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?
    {
        Some(v) => v,
        None => {
            eprintln!("{} Chat not found: {}", "✗".red().bold(), id.red());
            return Ok(());
        }
    };

    println!(
        "{} {}",
        view.conversation.name.bright_cyan().bold(),
        if view.conversation.is_online {
            "Active now".green()
        } else {
            "offline".dimmed()
        }
    );
    println!("{}", "─".repeat(60).dimmed());
    if view.messages.is_empty() {
        println!("{}", "No messages yet".yellow());
    }
    for msg in &view.messages {
        if let Some(preview) = client.reply_preview(id, &msg.id).await {
            println!("      {} {}", "↳ Replying to:".dimmed(), preview.dimmed());
        }
        let time = msg.timestamp.format("%H:%M").to_string();
        if msg.is_sent() {
            let tick = match msg.status {
                MessageStatus::Read => "✓✓".cyan(),
                MessageStatus::Delivered => "✓✓".normal(),
                MessageStatus::Sent => "✓".normal(),
                MessageStatus::Sending => "…".dimmed(),
            };
            println!("  {} {} {} {}", time.dimmed(), "You:".green().bold(), msg.content, tick);
        } else {
            println!(
                "  {} {} {}",
                time.dimmed(),
                format!("{}:", msg.sender_id).bright_white().bold(),
                msg.content
            );
        }
        for r in &msg.reactions {
            println!("        {} {}", r.emoji, r.count());
        }
    }
    println!("{}", "─".repeat(60).dimmed());
    println!("{} {}", "Quick replies:".dimmed(), view.quick_replies.join(" | "));
    Ok(())
}

async fn show_media(client: &Client, query: &str, opts: &CliArgs) -> anyhow::Result<()> {
    let filter: MediaFilter = opts
        .filter
        .as_deref()
        .unwrap_or("all")
        .parse()
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    let sort: SortKey = opts
        .sort
        .as_deref()
        .unwrap_or("date")
        .parse()
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    let counts = client.media_counts().await;
    println!(
        "{}  {} images  {} videos  {} documents",
        "Media Hub".bright_cyan().bold(),
        counts.images.to_string().green(),
        counts.videos.to_string().blue(),
        counts.documents.to_string().yellow()
    );
    println!("{}", "─".repeat(60).dimmed());

    let files = client
        .media(query, filter, sort)
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    if files.is_empty() {
        println!("{}", "No files found".yellow());
        return Ok(());
    }
    for f in files {
        let name = match f.kind {
            MediaKind::Image => f.name.green(),
            MediaKind::Video => f.name.blue(),
            MediaKind::Document => f.name.yellow(),
        };
        println!(
            "  {:<24} {:>9}  {}  {}",
            name,
            f.size_display(),
            f.created_at.format("%Y-%m-%d").to_string().dimmed(),
            f.sender_name.dimmed()
        );
    }
    Ok(())
}

async fn show_settings(client: &Client) {
    let prefs = client.preferences().await;
    let flag = |on: bool| if on { "on".green() } else { "off".red() };

    println!("{}", "Privacy & Security".bright_cyan().bold());
    println!("  End-to-End Encryption  {}", "Enabled".green());
    println!("  Read Receipts          {}", flag(prefs.read_receipts));
    println!("  Online Status          {}", flag(prefs.online_status));
    println!("  Push Notifications     {}", flag(prefs.notifications));
    println!();
    println!("{}", "Linked Devices".bright_cyan().bold());
    for d in client.devices().await {
        let verified = if d.verified { "✓".green() } else { "⚠".yellow() };
        let current = if d.is_current {
            " (this device)".cyan().to_string()
        } else {
            String::new()
        };
        println!(
            "  {} {}{}  {}",
            verified,
            d.name.bright_white(),
            current,
            format!("{} • {}", d.platform, d.last_active).dimmed()
        );
    }
}

use anyhow::Context;
use assetforge_client::{HubConfig, NotificationHub, TransportKind};
use assetforge_sdk::NotificationQuery;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod console;
mod prefs_commands;

#[derive(Parser)]
#[command(name = "assetforge-cli")]
#[command(about = "Assetforge notification client")]
struct Cli {
    /// Server base URL (overrides ASSETFORGE_SERVER)
    #[arg(short, long)]
    server: Option<String>,

    /// Bearer token (overrides ASSETFORGE_TOKEN)
    #[arg(long)]
    token: Option<String>,

    /// Stream transport: ws or sse (overrides ASSETFORGE_TRANSPORT)
    #[arg(long)]
    transport: Option<TransportKind>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Listen for live notifications
    Listen {
        /// User to receive notifications for
        user: String,
        /// Skip popups and sound, only print events
        #[arg(long)]
        quiet: bool,
    },
    /// List notifications
    Notifications {
        #[arg(long, default_value = "1")]
        page: u32,
        #[arg(long, default_value = "20")]
        limit: u32,
        /// Only unread notifications
        #[arg(long)]
        unread_only: bool,
    },
    /// Show the unread count
    Unread,
    /// Mark notifications as read
    MarkRead {
        /// Notification ids
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Mark every notification as read
    MarkAllRead,
    /// Notification preferences
    Prefs {
        #[command(subcommand)]
        action: prefs_commands::PrefsAction,
    },
}

impl Cli {
    fn config(&self) -> anyhow::Result<HubConfig> {
        let mut config = HubConfig::from_env().context("failed to read configuration")?;
        if let Some(server) = &self.server {
            config.server = server.clone();
        }
        if let Some(token) = &self.token {
            config.token = Some(token.clone());
        }
        if let Some(transport) = self.transport {
            config.transport = transport;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.config()?;
    let quiet = matches!(cli.command, Commands::Listen { quiet: true, .. });
    let hub = NotificationHub::create(config.hub_deps(console::capabilities(quiet)));

    match cli.command {
        Commands::Listen { user, .. } => listen(&hub, &user).await?,
        Commands::Notifications {
            page,
            limit,
            unread_only,
        } => {
            let query = NotificationQuery {
                page,
                limit,
                unread_only,
            };
            match hub.fetch_notifications(&query).await {
                Ok(result) => {
                    println!(
                        "📬 Notifications (page {}, {} of {} total):",
                        result.page,
                        result.items.len(),
                        result.total
                    );
                    for (i, notification) in result.items.iter().enumerate() {
                        println!("  {}. {}", i + 1, console::format_notification(notification));
                    }
                }
                Err(e) => {
                    eprintln!("❌ Failed to get notifications: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Commands::Unread => match hub.fetch_unread_count().await {
            Ok(count) => println!("📮 Unread notifications: {}", count),
            Err(e) => {
                eprintln!("❌ Failed to get unread count: {}", e);
                std::process::exit(1);
            }
        },
        Commands::MarkRead { ids } => match hub.mark_as_read(&ids).await {
            Ok(()) => println!("✅ Marked {} notification(s) as read", ids.len()),
            Err(e) => {
                eprintln!("❌ Failed to mark as read: {}", e);
                std::process::exit(1);
            }
        },
        Commands::MarkAllRead => match hub.mark_all_as_read().await {
            Ok(()) => println!("✅ All notifications marked as read"),
            Err(e) => {
                eprintln!("❌ Failed to mark all as read: {}", e);
                std::process::exit(1);
            }
        },
        Commands::Prefs { action } => {
            prefs_commands::handle_prefs_command(&hub, action).await?;
        }
    }

    hub.dispose();
    Ok(())
}

async fn listen(hub: &NotificationHub, user: &str) -> anyhow::Result<()> {
    hub.on_notification(|notification| {
        println!("🔔 {}", console::format_notification(notification));
    });
    hub.on_unread_count(|update| {
        println!("{}", console::format_unread(&update));
    });

    if !hub.initialize(user) {
        println!("🔕 In-app notifications are disabled for this device");
        println!("   Enable them with: assetforge-cli prefs set --in-app true");
        return Ok(());
    }

    println!("🎧 Listening for notifications as {}...", user);
    println!("   Press Ctrl+C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("failed to wait for Ctrl+C")?;
    info!(user, "stopping listener");
    Ok(())
}

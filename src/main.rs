//! Vincy CLI
//!
//! Command-line front end for the Vincy wellness platform:
//! - Sign in and out, inspect the stored token
//! - Show current, upcoming and recorded live sessions
//! - Read and change therapy device settings
//! - Generate and inspect configuration

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vincy::api::decode_claims;
use vincy::config::{generate_default_config, Config, LoggingConfig};
use vincy::credentials::{CredentialStore, FileCredentialStore, SessionFlags};
use vincy::devices::{DeviceControls, DeviceKind, DevicePoller, DeviceSetting, DeviceStates};
use vincy::live::{
    embed_url, LivePollConfig, LiveSession, LiveSessionPoller, LiveSessionService,
    LiveSessionState, PastSession, DEFAULT_PAST_LIMIT,
};
use vincy::notify::{NoticeLevel, Notifier, Route};
use vincy::session::{SessionManager, User};

#[derive(Parser)]
#[command(name = "vincy")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Command-line client for the Vincy wellness platform")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: platform config dir, then ./config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Backend URL, overriding config and VINCY_API_URL
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in with email and password
    Login {
        email: String,
        /// Password (prompted on stdin when omitted)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Sign in through the admin endpoint
    AdminLogin {
        email: String,
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Forget the stored token
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Decode the stored token and show when it expires
    TokenStatus,

    /// Live sessions
    Sessions {
        #[command(subcommand)]
        command: SessionCommands,
    },

    /// Therapy devices
    Devices {
        #[command(subcommand)]
        command: DeviceCommands,
    },

    /// Configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum SessionCommands {
    /// The live session, or the next one scheduled
    Current,
    /// Every session
    List,
    /// Recorded sessions, most recent first
    Past {
        #[arg(short, long, default_value_t = DEFAULT_PAST_LIMIT)]
        limit: usize,
    },
    /// Follow the current session with a live countdown
    Watch,
}

#[derive(Subcommand)]
pub enum DeviceCommands {
    /// Latest value of every device
    Latest,
    /// Change one device, e.g. `set temp-tank 37.5` or `set sound on`
    Set { device: String, value: String },
    /// Stored history of one device
    History { device: String },
    /// Poll device states until interrupted
    Watch,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write a default config file
    Init {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
}

/// Prints notices to stderr; navigation has no meaning on a terminal
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notice(&self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Error => eprintln!("error: {}", message),
            NoticeLevel::Success | NoticeLevel::Info => eprintln!("{}", message),
        }
    }

    fn navigate(&self, route: Route) {
        tracing::debug!(%route, "Navigation requested");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Discovery messages are held until the subscriber exists
    let (mut config, discovered) = match &cli.config {
        Some(path) => (Config::load_with_env(path)?, None),
        None => {
            let loaded = Config::discover();
            (loaded.config.clone(), Some(loaded))
        }
    };
    if let Some(url) = &cli.api_url {
        config.api.base_url = url.clone();
    }

    init_logging(&config.logging);
    if let Some(loaded) = &discovered {
        loaded.log();
    }
    tracing::debug!(api = %config.api.normalized_base_url(), "Vincy CLI v{}", env!("CARGO_PKG_VERSION"));

    let json = cli.format == "json";

    let store = Arc::new(FileCredentialStore::new(&config.storage.credentials_path));
    let flags = Arc::new(SessionFlags::new());
    let session = SessionManager::new(
        &config.api,
        store.clone(),
        Arc::new(ConsoleNotifier),
        flags.clone(),
    )?;

    match cli.command {
        Commands::Login { email, password } => {
            let password = password_or_prompt(password)?;
            let user = session.login(&email, &password).await?;
            print_user(&user, json)?;
        }

        Commands::AdminLogin { email, password } => {
            let password = password_or_prompt(password)?;
            let user = session.admin_login(&email, &password).await?;
            print_user(&user, json)?;
        }

        Commands::Logout => {
            session.logout();
            println!("Logged out");
        }

        Commands::Whoami => match session.bootstrap().await {
            Some(user) => print_user(&user, json)?,
            None => bail!("Not logged in"),
        },

        Commands::TokenStatus => {
            let Some(credential) = store.get() else {
                bail!("No token stored at {}", store.path().display());
            };
            let claims = decode_claims(&credential.token).context("Stored token is malformed")?;
            let expired = vincy::is_token_expired(&credential.token);

            if json {
                let status = serde_json::json!({
                    "subject": &claims.sub,
                    "expires_at": claims.expires_at(),
                    "expired": expired,
                    "has_refresh_token": credential.refresh_token.is_some(),
                });
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!("Subject:       {}", claims.sub.as_deref().unwrap_or("-"));
                match claims.expires_at() {
                    Some(at) => println!("Expires:       {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
                    None => println!("Expires:       -"),
                }
                println!("Expired:       {}", if expired { "yes" } else { "no" });
                println!(
                    "Refresh token: {}",
                    if credential.refresh_token.is_some() { "yes" } else { "no" }
                );
            }
        }

        Commands::Sessions { command } => {
            require_session(&session).await?;
            let service = LiveSessionService::new(session.api().clone());

            match command {
                SessionCommands::Current => match service.get_current_live_session().await? {
                    Some(current) if json => {
                        println!("{}", serde_json::to_string_pretty(&current)?)
                    }
                    Some(current) => {
                        let state = LiveSessionState::derive(
                            std::slice::from_ref(&current),
                            chrono::Utc::now(),
                        );
                        print_session_banner(&state);
                    }
                    None => println!("No live or upcoming sessions"),
                },

                SessionCommands::List => {
                    let sessions = service.get_all_live_sessions().await?;
                    if json {
                        println!("{}", serde_json::to_string_pretty(&sessions)?);
                    } else {
                        print_sessions(&sessions);
                    }
                }

                SessionCommands::Past { limit } => {
                    let past: Vec<PastSession> = service
                        .get_past_live_sessions(limit)
                        .await?
                        .iter()
                        .map(PastSession::from)
                        .collect();

                    if json {
                        println!("{}", serde_json::to_string_pretty(&past)?);
                    } else if past.is_empty() {
                        println!("No recordings yet");
                    } else {
                        for recording in past {
                            println!(
                                "{}  {:<40} {:>4} min  {}",
                                recording.date.format("%Y-%m-%d"),
                                recording.title,
                                recording.duration,
                                recording.video_url
                            );
                        }
                    }
                }

                SessionCommands::Watch => {
                    flags.set_live_view_active(true);
                    let poller = LiveSessionPoller::with_flags(
                        Arc::new(service),
                        LivePollConfig::from(&config.polling),
                        flags.clone(),
                    );
                    let mut rx = poller.subscribe();
                    let mut handle = poller.start();

                    loop {
                        tokio::select! {
                            changed = rx.changed() => {
                                if changed.is_err() {
                                    break;
                                }
                                let state = rx.borrow_and_update().clone();
                                if !state.loading {
                                    print_session_banner(&state);
                                }
                            }
                            _ = tokio::signal::ctrl_c() => break,
                        }
                    }

                    flags.set_live_view_active(false);
                    handle.stop();
                }
            }
        }

        Commands::Devices { command } => {
            require_session(&session).await?;
            let controls = DeviceControls::new(session.api().clone());

            match command {
                DeviceCommands::Latest => {
                    let states = controls.latest().await?;
                    if json {
                        println!("{}", serde_json::to_string_pretty(&states)?);
                    } else {
                        print_devices(&states);
                    }
                }

                DeviceCommands::Set { device, value } => {
                    let kind: DeviceKind = device.parse()?;
                    let setting = DeviceSetting::parse(kind, &value)?;
                    controls.set(&setting).await?;
                    println!("{} set to {}", kind.title(), setting.value());
                }

                DeviceCommands::History { device } => {
                    let kind: DeviceKind = device.parse()?;
                    let records = controls.history(kind).await?;
                    if json {
                        println!("{}", serde_json::to_string_pretty(&records)?);
                    } else if records.is_empty() {
                        println!("No history for {}", kind.title());
                    } else {
                        println!("{:<28} {}", "Recorded", "Value");
                        println!("{}", "-".repeat(40));
                        for record in records {
                            println!(
                                "{:<28} {}",
                                record.created_at().unwrap_or("-"),
                                record
                                    .value(kind)
                                    .map(|v| v.to_string())
                                    .unwrap_or_else(|| "-".to_string())
                            );
                        }
                    }
                }

                DeviceCommands::Watch => {
                    let poller =
                        DevicePoller::new(Arc::new(controls), config.polling.device_refresh());
                    let mut rx = poller.subscribe();
                    let mut handle = poller.start();

                    loop {
                        tokio::select! {
                            changed = rx.changed() => {
                                if changed.is_err() {
                                    break;
                                }
                                let state = rx.borrow_and_update().clone();
                                if let Some(error) = &state.error {
                                    eprintln!("error: {}", error);
                                } else if !state.loading {
                                    print_devices(&state.states);
                                    println!();
                                }
                            }
                            _ = tokio::signal::ctrl_c() => break,
                        }
                    }

                    handle.stop();
                }
            }
        }

        Commands::Config { command } => run_config(&command, &config)?,
    }

    Ok(())
}

fn init_logging(config: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("vincy={}", config.level).into());
    let registry = tracing_subscriber::registry().with(filter);

    if config.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn run_config(command: &ConfigCommands, config: &Config) -> anyhow::Result<()> {
    match command {
        ConfigCommands::Init { output, force } => {
            let content = generate_default_config();

            match output {
                Some(path) => {
                    if path.exists() && !force {
                        bail!("{} already exists (use --force to overwrite)", path.display());
                    }
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(path, &content)?;
                    println!("Config written to {:?}", path);
                }
                None => print!("{}", content),
            }
        }
        ConfigCommands::Show => {
            print!("{}", toml::to_string_pretty(config)?);
        }
    }
    Ok(())
}

/// Restore the stored session and refuse to continue without one
async fn require_session(session: &SessionManager) -> anyhow::Result<User> {
    session.bootstrap().await;
    session
        .require_auth()
        .await
        .context("Not logged in; run `vincy login <email>` first")
}

fn password_or_prompt(password: Option<String>) -> anyhow::Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }

    eprint!("Password: ");
    std::io::stderr().flush()?;

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("A password is required");
    }
    Ok(password)
}

fn print_user(user: &User, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(user)?);
        return Ok(());
    }

    println!("Name:   {}", user.display_name());
    println!("Email:  {}", user.email);
    println!("Role:   {}", if user.is_admin() { "admin" } else { "user" });
    println!("Id:     {}", user.id);
    Ok(())
}

fn print_session_banner(state: &LiveSessionState) {
    let Some(current) = &state.current else {
        println!("No live or upcoming sessions");
        return;
    };

    println!(
        "{}: {} with {} ({})",
        state.badge(),
        current.session_title,
        current.host,
        current.date_time.format("%Y-%m-%d %H:%M UTC")
    );
    if state.is_live {
        if let Some(link) = current.youtube_link.as_deref() {
            println!("  Watch: {}", embed_url(link));
        }
    }
}

fn print_sessions(sessions: &[LiveSession]) {
    if sessions.is_empty() {
        println!("No sessions scheduled");
        return;
    }

    println!(
        "{:<18} {:<36} {:<20} {:>5}  {}",
        "Date (UTC)", "Title", "Host", "Min", "Status"
    );
    println!("{}", "-".repeat(90));

    let now = chrono::Utc::now();
    for session in sessions {
        let status = if session.livestatus {
            "live"
        } else if session.is_in_progress(now) {
            "in progress"
        } else if session.date_time > now {
            "upcoming"
        } else if session.has_recording() {
            "recorded"
        } else {
            "ended"
        };
        println!(
            "{:<18} {:<36} {:<20} {:>5}  {}",
            session.date_time.format("%Y-%m-%d %H:%M"),
            session.session_title,
            session.host,
            session.duration_minutes,
            status
        );
    }
}

fn print_devices(states: &DeviceStates) {
    println!("{:<20} {}", "Device", "Value");
    println!("{}", "-".repeat(32));

    for kind in DeviceKind::ALL {
        let value = states
            .value(kind)
            .map(|v| v.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("{:<20} {}", kind.title(), value);
    }
}

//! CloudCtl CLI
//!
//! Command-line interface for managing AWS sessions: role assumption with
//! MFA, encrypted local storage, silent refresh, console federation, and
//! the shared credentials file synchronizer.
//!
//! # Usage
//!
//! ```bash
//! # Assume a role and store the session
//! cloudctl login --source default --profile prod-admin \
//!     --role arn:aws:iam::123456789012:role/AdminRole
//!
//! # Export it into the current shell
//! eval $(cloudctl switch prod-admin)
//!
//! # Keep everything fresh in the background
//! cloudctl daemon start
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;
mod release;
mod ui;

#[derive(Parser)]
#[command(name = "cloudctl")]
#[command(about = "Securely manage AWS sessions with MFA and role chaining")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assume an AWS role and store the session locally (supports MFA)
    Login(commands::login::LoginArgs),

    /// Get an MFA session token to reuse across role assumptions
    MfaLogin(commands::mfa_login::MfaLoginArgs),

    /// Smart refresh or restore stored sessions
    Refresh(commands::refresh::RefreshArgs),

    /// Export a profile's credentials for eval
    Switch(commands::switch::SwitchArgs),

    /// Show all stored sessions with expiration and status
    Status(commands::status::StatusArgs),

    /// Generate an AWS console sign-in URL from a stored session
    Console(commands::console::ConsoleArgs),

    /// Sync stored sessions to ~/.aws/credentials
    Sync(commands::sync::SyncArgs),

    /// Remove stored credentials for one or all profiles
    Logout(commands::logout::LogoutArgs),

    /// List stored profile names
    List,

    /// Manage IAM role aliases
    Role {
        #[command(subcommand)]
        command: commands::role::RoleCommand,
    },

    /// Manage MFA device aliases
    Mfa {
        #[command(subcommand)]
        command: commands::mfa::MfaCommand,
    },

    /// Manage the encryption secret
    Secret {
        #[command(subcommand)]
        command: commands::secret::SecretCommand,
    },

    /// Manage the background auto-refresh daemon
    Daemon {
        #[command(subcommand)]
        command: commands::daemon::DaemonCommand,
    },

    /// Session indicator for shell prompts
    Prompt(commands::prompt::PromptArgs),

    /// Emit shell integration code
    Init,

    /// Show version information and check for updates
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // Commands whose stdout or prompt output is machine-consumed skip the
    // upgrade notice.
    if !matches!(cli.command, Commands::Switch(_) | Commands::Prompt(_)) {
        release::cached_notice();
    }

    match cli.command {
        Commands::Login(args) => commands::login::run(args).await,
        Commands::MfaLogin(args) => commands::mfa_login::run(args).await,
        Commands::Refresh(args) => commands::refresh::run(args).await,
        Commands::Switch(args) => commands::switch::run(args).await,
        Commands::Status(args) => commands::status::run(args).await,
        Commands::Console(args) => commands::console::run(args).await,
        Commands::Sync(args) => commands::sync::run(args).await,
        Commands::Logout(args) => commands::logout::run(args).await,
        Commands::List => commands::list::run().await,
        Commands::Role { command } => commands::role::run(command).await,
        Commands::Mfa { command } => commands::mfa::run(command).await,
        Commands::Secret { command } => commands::secret::run(command).await,
        Commands::Daemon { command } => commands::daemon::run(command).await,
        Commands::Prompt(args) => commands::prompt::run(args).await,
        Commands::Init => commands::init::run().await,
        Commands::Version => release::run_version().await,
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

//! IAM session CLI - log in against the identity service and issue
//! authenticated requests with the persisted session.

mod commands;
mod output;

use auth_session::{Method, SessionLifecycleController};
use clap::{Parser, Subcommand};
use session_config_and_utils::{init_logging, Config, LogFormat, Paths};
use tracing::debug;

/// IAM session CLI - Manage your identity service session.
#[derive(Parser)]
#[command(name = "iam")]
#[command(about = "IAM CLI for authentication and protected requests")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error). Defaults to the configured level.
    #[arg(long, global = true, env = "IAM_SESSION_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log line format (compact or json)
    #[arg(long, default_value = "compact", global = true)]
    log_format: LogFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Login with username and password
    Login {
        /// Username (prompted when omitted)
        #[arg(short, long)]
        username: Option<String>,
    },

    /// Create an account and log in
    Signup {
        /// Username
        #[arg(short, long)]
        username: String,
        /// Email address
        #[arg(short, long)]
        email: String,
        /// First name
        #[arg(long, default_value = "")]
        first_name: String,
        /// Last name
        #[arg(long, default_value = "")]
        last_name: String,
    },

    /// Logout and clear the stored session
    Logout,

    /// Check authentication status
    Status,

    /// Send a request with the session's access token
    Fetch {
        /// Absolute URL, or a path relative to the identity service
        url: String,
        /// HTTP method
        #[arg(short = 'X', long, default_value = "GET")]
        method: Method,
        /// JSON request body
        #[arg(short, long)]
        data: Option<String>,
    },
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let paths = Paths::new()?;
    let config = Config::load(&paths)?;

    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    init_logging(level, cli.log_format);

    let controller = SessionLifecycleController::from_config(&config, &paths)?;
    let status = controller.initialize().await;
    debug!(status = ?status, base_url = %config.identity_base_url, "Session initialized");

    match cli.command {
        Commands::Login { username } => {
            commands::login(&controller, username.as_deref(), &cli.format).await
        }
        Commands::Signup {
            username,
            email,
            first_name,
            last_name,
        } => {
            let profile = commands::SignupArgs {
                username,
                email,
                first_name,
                last_name,
            };
            commands::signup(&controller, profile, &cli.format).await
        }
        Commands::Logout => commands::logout(&controller, &cli.format),
        Commands::Status => commands::status(&controller, &cli.format),
        Commands::Fetch { url, method, data } => {
            commands::fetch(&controller, &url, method, data.as_deref(), &cli.format).await
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let format = cli.format;

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e), &format);
        std::process::exit(1);
    }
}

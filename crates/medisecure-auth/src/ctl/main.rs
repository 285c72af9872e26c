use std::fs;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;
use tracing::{debug, info, warn};

use medisecure_auth::auth::PasswordHasher;
use medisecure_auth::db::Database;
use medisecure_auth::user::{InMemoryCredentialStore, SqliteCredentialStore};
use medisecure_auth::{AuthConfig, AuthService, CredentialStore};

const APP_NAME: &str = "medisecure";
const ENV_PREFIX: &str = "MEDISECURE";

fn main() {
    if let Err(err) = try_main() {
        let _ = writeln!(io::stderr(), "{err:?}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();

    let ctx = RuntimeContext::new(cli.common.clone())?;
    ctx.init_logging();
    debug!("resolved paths: {:#?}", ctx.paths);

    match cli.command {
        Command::HashSecret(cmd) => block_on(handle_hash_secret(&ctx, cmd)),
        Command::VerifySecret(cmd) => handle_verify_secret(cmd),
        Command::GenerateSecret => handle_generate_secret(),
        Command::IssueToken(cmd) => block_on(handle_issue_token(&ctx, cmd)),
        Command::VerifyToken(cmd) => handle_verify_token(&ctx, cmd),
        Command::Login(cmd) => block_on(handle_login(&ctx, cmd)),
        Command::Config { command } => handle_config(&ctx, command),
    }
}

fn block_on<F>(future: F) -> Result<()>
where
    F: std::future::Future<Output = Result<()>>,
{
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting tokio runtime")?
        .block_on(future)
}

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "MediSecure authentication tooling: hashes, secrets and tokens.",
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Args)]
struct CommonOpts {
    /// Override the config file path
    #[arg(long, value_name = "PATH", env = "MEDISECURE_CONFIG", global = true)]
    config: Option<PathBuf>,
    /// Reduce output to only errors
    #[arg(short, long, action = clap::ArgAction::SetTrue, global = true)]
    quiet: bool,
    /// Increase logging verbosity (stackable)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Enable debug logging (equivalent to -vv)
    #[arg(long, global = true)]
    debug: bool,
    /// Enable trace logging (overrides other levels)
    #[arg(long, global = true)]
    trace: bool,
    /// Output machine readable JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Hash a secret with bcrypt (reads stdin when no secret is given)
    HashSecret(HashSecretCommand),
    /// Check a secret against a bcrypt hash
    VerifySecret(VerifySecretCommand),
    /// Print a fresh random JWT signing secret
    GenerateSecret,
    /// Issue a token for an account in the credential database
    IssueToken(IssueTokenCommand),
    /// Verify a token and print its claims
    VerifyToken(VerifyTokenCommand),
    /// Authenticate against the credential database (password on stdin)
    Login(LoginCommand),
    /// Inspect and manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Debug, Args)]
struct HashSecretCommand {
    /// Secret to hash
    secret: Option<String>,
    /// Override the configured bcrypt cost
    #[arg(long, value_name = "COST")]
    cost: Option<u32>,
}

#[derive(Debug, Args)]
struct VerifySecretCommand {
    /// bcrypt hash to check against
    hash: String,
    /// Secret to check (reads stdin when omitted)
    secret: Option<String>,
}

#[derive(Debug, Args)]
struct IssueTokenCommand {
    /// Account email
    email: String,
    /// Token lifetime in minutes (defaults to the configured lifetime)
    #[arg(long, value_name = "MINUTES")]
    ttl_minutes: Option<u64>,
    /// Credential database path
    #[arg(long, value_name = "PATH")]
    database: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct VerifyTokenCommand {
    /// Compact token or a full "Bearer <token>" header value
    token: String,
}

#[derive(Debug, Args)]
struct LoginCommand {
    /// Account email
    email: String,
    /// Credential database path
    #[arg(long, value_name = "PATH")]
    database: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Output the effective configuration (secrets masked)
    Show,
    /// Print the resolved config file path
    Path,
    /// Validate the effective configuration
    Check,
    /// Write a default configuration file with a generated secret
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
struct AppConfig {
    auth: AuthConfig,
    logging: LoggingConfig,
    database: DatabaseConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct LoggingConfig {
    /// Level used when no verbosity flag is given
    level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
struct DatabaseConfig {
    /// Credential database path. Defaults to the data directory.
    path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
struct AppPaths {
    config_file: PathBuf,
    data_dir: PathBuf,
}

impl AppPaths {
    fn discover(override_path: Option<&Path>) -> Result<Self> {
        let config_file = match override_path {
            Some(path) => path.to_path_buf(),
            None => dirs::config_dir()
                .ok_or_else(|| anyhow!("unable to determine config directory"))?
                .join(APP_NAME)
                .join("config.toml"),
        };
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow!("unable to determine data directory"))?
            .join(APP_NAME);

        Ok(Self {
            config_file,
            data_dir,
        })
    }
}

struct RuntimeContext {
    common: CommonOpts,
    paths: AppPaths,
    config: AppConfig,
}

impl RuntimeContext {
    fn new(common: CommonOpts) -> Result<Self> {
        let paths = AppPaths::discover(common.config.as_deref())?;
        let config = load_config(&paths.config_file)?;
        Ok(Self {
            common,
            paths,
            config,
        })
    }

    fn init_logging(&self) {
        use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

        let level = self.effective_log_level();
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("medisecure_auth={level},medisecure_authctl={level}"))
        });

        // Logs go to stderr; stdout carries command output.
        if self.common.json {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(io::stderr),
                )
                .try_init()
                .ok();
        } else {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(io::stderr().is_terminal())
                        .with_writer(io::stderr),
                )
                .try_init()
                .ok();
        }
    }

    fn effective_log_level(&self) -> LevelFilter {
        if self.common.quiet {
            LevelFilter::ERROR
        } else if self.common.trace {
            LevelFilter::TRACE
        } else if self.common.debug {
            LevelFilter::DEBUG
        } else {
            match self.common.verbose {
                0 => self
                    .config
                    .logging
                    .level
                    .parse()
                    .unwrap_or(LevelFilter::INFO),
                1 => LevelFilter::DEBUG,
                _ => LevelFilter::TRACE,
            }
        }
    }

    fn database_path(&self, override_path: Option<&Path>) -> PathBuf {
        override_path
            .map(Path::to_path_buf)
            .or_else(|| self.config.database.path.clone())
            .unwrap_or_else(|| self.paths.data_dir.join("auth.db"))
    }

    fn auth_service(&self, store: Arc<dyn CredentialStore>) -> Result<AuthService> {
        AuthService::new(self.config.auth.clone(), store)
            .context("building authentication service from configuration")
    }

    async fn sqlite_service(
        &self,
        override_path: Option<&Path>,
    ) -> Result<(AuthService, SqliteCredentialStore)> {
        let path = self.database_path(override_path);
        let db = Database::new(&path).await?;
        let store = SqliteCredentialStore::new(db.pool().clone());
        let service = self.auth_service(Arc::new(store.clone()))?;
        Ok((service, store))
    }

    fn print_json<T: Serialize>(&self, value: &T) -> Result<()> {
        println!(
            "{}",
            serde_json::to_string_pretty(value).context("serializing output to JSON")?
        );
        Ok(())
    }
}

fn load_config(config_file: &Path) -> Result<AppConfig> {
    let built = Config::builder()
        .add_source(
            File::from(config_file)
                .format(FileFormat::Toml)
                .required(false),
        )
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .with_context(|| format!("loading configuration from {}", config_file.display()))?;

    built
        .try_deserialize()
        .context("deserializing configuration")
}

fn write_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating config directory {parent:?}"))?;
    }

    let mut config = AppConfig::default();
    config.auth.jwt_secret = Some(AuthConfig::generate_jwt_secret());

    let toml = toml::to_string_pretty(&config).context("serializing default config to TOML")?;
    let mut body = String::new();
    body.push_str("# Configuration for ");
    body.push_str(APP_NAME);
    body.push_str("\n# File: ");
    body.push_str(&path.display().to_string());
    body.push_str("\n\n");
    body.push_str(&toml);

    fs::write(path, body).with_context(|| format!("writing config file to {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("restricting permissions on {}", path.display()))?;
    }

    Ok(())
}

/// Use the argument when present, otherwise read one line from stdin.
fn secret_from_arg_or_stdin(arg: Option<String>, prompt: &str) -> Result<String> {
    if let Some(secret) = arg {
        return Ok(secret);
    }

    let stdin = io::stdin();
    if stdin.is_terminal() {
        eprint!("{prompt}: ");
        io::stderr().flush().ok();
    }

    let mut line = String::new();
    stdin
        .lock()
        .read_line(&mut line)
        .context("reading secret from stdin")?;
    let secret = line.trim_end_matches(['\r', '\n']).to_string();
    if secret.is_empty() {
        bail!("no secret provided");
    }
    Ok(secret)
}

async fn handle_hash_secret(ctx: &RuntimeContext, cmd: HashSecretCommand) -> Result<()> {
    let cost = cmd.cost.unwrap_or(ctx.config.auth.bcrypt_cost);
    let hasher = PasswordHasher::new(cost)?;
    let secret = secret_from_arg_or_stdin(cmd.secret, "Secret")?;

    let hash = hasher.hash_blocking(secret).await?;
    println!("{hash}");
    Ok(())
}

fn handle_verify_secret(cmd: VerifySecretCommand) -> Result<()> {
    let secret = secret_from_arg_or_stdin(cmd.secret, "Secret")?;
    if PasswordHasher::verify(&secret, &cmd.hash) {
        println!("ok");
        Ok(())
    } else {
        bail!("secret does not match hash")
    }
}

fn handle_generate_secret() -> Result<()> {
    println!("{}", AuthConfig::generate_jwt_secret());
    Ok(())
}

async fn handle_issue_token(ctx: &RuntimeContext, cmd: IssueTokenCommand) -> Result<()> {
    let (service, store) = ctx.sqlite_service(cmd.database.as_deref()).await?;

    let account = store
        .lookup_by_identifier(&cmd.email)
        .await?
        .ok_or_else(|| anyhow!("no account for {}", cmd.email))?;
    if !account.is_active {
        warn!(email = %account.email, "issuing token for an inactive account");
    }

    let ttl = cmd.ttl_minutes.map(|m| Duration::from_secs(m.saturating_mul(60)));
    let issued = service.issue_token(&account, ttl)?;
    info!(email = %account.email, expires_at = %issued.expires_at, "token issued");

    if ctx.common.json {
        ctx.print_json(&issued)
    } else {
        println!("{}", issued.access_token);
        Ok(())
    }
}

fn handle_verify_token(ctx: &RuntimeContext, cmd: VerifyTokenCommand) -> Result<()> {
    // Verification never touches the store.
    let service = ctx.auth_service(Arc::new(InMemoryCredentialStore::new()))?;

    let token = medisecure_auth::auth::bearer_token_from_header(&cmd.token)
        .unwrap_or(cmd.token.trim());
    let claims = service.verify_token(token).context("token rejected")?;
    info!(
        subject = %claims.display_name(),
        role = %claims.role,
        admin = claims.is_admin(),
        expires_at = ?claims.expires_at(),
        "token valid"
    );

    ctx.print_json(&claims)
}

async fn handle_login(ctx: &RuntimeContext, cmd: LoginCommand) -> Result<()> {
    let (service, _) = ctx.sqlite_service(cmd.database.as_deref()).await?;
    let password = secret_from_arg_or_stdin(None, "Password")?;

    let response = service
        .login(&cmd.email, &password)
        .await
        .context("login failed")?;

    ctx.print_json(&response)
}

fn handle_config(ctx: &RuntimeContext, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            let redacted = AppConfig {
                auth: ctx.config.auth.redacted(),
                ..ctx.config.clone()
            };
            if ctx.common.json {
                ctx.print_json(&redacted)
            } else {
                let toml =
                    toml::to_string_pretty(&redacted).context("serializing config to TOML")?;
                print!("{toml}");
                Ok(())
            }
        }
        ConfigCommand::Path => {
            println!("{}", ctx.paths.config_file.display());
            Ok(())
        }
        ConfigCommand::Check => {
            ctx.config
                .auth
                .validate()
                .context("authentication configuration is invalid")?;
            if ctx.config.auth.dev_fallback_permitted() {
                warn!(
                    mode = %ctx.config.auth.deployment_mode,
                    "development fallback credential is enabled"
                );
            }
            println!("configuration ok");
            Ok(())
        }
        ConfigCommand::Init { force } => {
            let path = &ctx.paths.config_file;
            if path.exists() && !force {
                bail!(
                    "config file already exists at {} (use --force to overwrite)",
                    path.display()
                );
            }
            write_default_config(path)?;
            info!("wrote default config to {}", path.display());
            println!("{}", path.display());
            Ok(())
        }
    }
}

//! wip-alerts CLI: `wipa` command.
//!
//! Administers a wip-alerts home directory: token keys, accounts, the
//! token and renewal grants, API keys, alerts and heartbeats.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

use wip_alerts::auth::gate::{self, RequestContext};
use wip_alerts::config::{self, ServiceConfig};
use wip_alerts::crypto::keys::MIN_RSA_BITS;
use wip_alerts::model::{account, alert, apikey, device, heartbeat, renewal, token};
use wip_alerts::{
    Account, Alert, AlertPriority, AlertStatus, ApiKey, ApiKeyStatus, Device, Heartbeat,
    ObjectStore, TokenIssuer, TokenKeys,
};

// ── Time formatting helpers ───────────────────────────────────────────────────

fn fmt_time(t: &DateTime<Utc>) -> String {
    t.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

// ── CLI structure ─────────────────────────────────────────────────────────────

/// wip-alerts CLI: manage token keys, accounts, tokens and alerts.
#[derive(Parser, Debug)]
#[command(
    name = "wipa",
    about = "wip-alerts CLI",
    version,
    long_about = "wipa: wip-alerts CLI\n\nManage token keys, accounts, access and refresh tokens, renewals,\nAPI keys, alerts and heartbeats."
)]
struct Cli {
    /// Home directory holding data/ and keys.json (default: ~/.wip-alerts)
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate token keys and create the data directory
    Init {
        /// RSA modulus size for the refresh key pair
        #[arg(long, default_value_t = MIN_RSA_BITS)]
        rsa_bits: usize,

        /// Overwrite an existing key file
        #[arg(long)]
        force: bool,
    },

    /// Manage accounts
    Account {
        #[command(subcommand)]
        subcommand: AccountCommands,
    },

    /// Issue and list tokens
    Token {
        #[command(subcommand)]
        subcommand: TokenCommands,
    },

    /// Create and list renewals
    Renewal {
        #[command(subcommand)]
        subcommand: RenewalCommands,
    },

    /// Manage API keys
    Apikey {
        #[command(subcommand)]
        subcommand: ApikeyCommands,
    },

    /// Check an Authorization header against a role or capability
    Authorize {
        /// Full Authorization header value, e.g. "Bearer <token>"
        #[arg(long)]
        header: String,

        /// Required role
        #[arg(long, conflicts_with = "capability")]
        role: Option<String>,

        /// Required capability
        #[arg(long)]
        capability: Option<String>,
    },

    /// Raise and review alerts
    Alert {
        #[command(subcommand)]
        subcommand: AlertCommands,
    },

    /// Send and inspect heartbeats
    Heartbeat {
        #[command(subcommand)]
        subcommand: HeartbeatCommands,
    },
}

#[derive(Subcommand, Debug)]
enum AccountCommands {
    /// Create an account, optionally registering its first device
    Create {
        /// Identifier reported by the device
        #[arg(long, requires = "device_type")]
        device_id: Option<String>,

        /// Device type (e.g. ios, android)
        #[arg(long, requires = "device_id")]
        device_type: Option<String>,

        /// Device description as a JSON document
        #[arg(long, default_value = "{}")]
        device_info: String,
    },
    /// List all accounts
    List,
}

#[derive(Subcommand, Debug)]
enum TokenCommands {
    /// Issue the refresh/access token pair for an account
    Issue {
        #[arg(long)]
        account: String,
    },
    /// Redeem a renewal for a new access token
    Renew {
        #[arg(long)]
        renewal: String,
    },
    /// List every issued token
    List {
        /// Also print the compact token strings
        #[arg(long)]
        raw: bool,
    },
}

#[derive(Subcommand, Debug)]
enum RenewalCommands {
    /// Exchange a refresh token for a renewal
    Create {
        #[arg(long)]
        refresh_token: String,
    },
    /// List every renewal
    List,
}

#[derive(Subcommand, Debug)]
enum ApikeyCommands {
    /// Create an active API key for an account
    Create {
        #[arg(long)]
        account: String,

        #[arg(long, default_value = "")]
        description: String,
    },
    /// List an account's API keys
    List {
        #[arg(long)]
        account: String,
    },
    /// Deactivate an API key
    Deactivate {
        #[arg(long)]
        account: String,

        #[arg(long)]
        id: String,
    },
    /// Check an API key as the API-key gate would
    Check {
        /// Value of the APIKey header
        #[arg(long)]
        header: Option<String>,

        /// Value of the apiKey query parameter
        #[arg(long)]
        query: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum AlertCommands {
    /// Raise an alert as the holder of an API key
    Create {
        #[arg(long)]
        api_key: String,

        #[arg(long)]
        title: String,

        #[arg(long, default_value = "")]
        short: String,

        #[arg(long, default_value = "")]
        long: String,

        /// high, normal or low
        #[arg(long, default_value = "normal")]
        priority: String,
    },
    /// List an account's alerts
    List {
        #[arg(long)]
        account: String,

        /// Include archived alerts
        #[arg(long)]
        all: bool,
    },
    /// Move an alert to a new status (seen, archived)
    Status {
        #[arg(long)]
        account: String,

        #[arg(long)]
        id: String,

        #[arg(long)]
        to: String,
    },
}

#[derive(Subcommand, Debug)]
enum HeartbeatCommands {
    /// Record a heartbeat as the holder of an API key
    Send {
        #[arg(long)]
        api_key: String,
    },
    /// Show the latest heartbeat of each API key of an account
    Latest {
        #[arg(long)]
        account: String,
    },
}

// ── Main ──────────────────────────────────────────────────────────────────────

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let verbose = cli.verbose;

    let result = service_config(cli.home).and_then(|config| match cli.command {
        Commands::Init { rsa_bits, force } => cmd_init(&config, rsa_bits, force),
        Commands::Account { subcommand } => match subcommand {
            AccountCommands::Create {
                device_id,
                device_type,
                device_info,
            } => cmd_account_create(&config, device_id, device_type, &device_info),
            AccountCommands::List => cmd_account_list(&config, verbose),
        },
        Commands::Token { subcommand } => match subcommand {
            TokenCommands::Issue { account } => cmd_token_issue(&config, &account),
            TokenCommands::Renew { renewal } => cmd_token_renew(&config, &renewal),
            TokenCommands::List { raw } => cmd_token_list(&config, raw),
        },
        Commands::Renewal { subcommand } => match subcommand {
            RenewalCommands::Create { refresh_token } => cmd_renewal_create(&config, &refresh_token),
            RenewalCommands::List => cmd_renewal_list(&config),
        },
        Commands::Apikey { subcommand } => match subcommand {
            ApikeyCommands::Create {
                account,
                description,
            } => cmd_apikey_create(&config, &account, &description),
            ApikeyCommands::List { account } => cmd_apikey_list(&config, &account),
            ApikeyCommands::Deactivate { account, id } => {
                cmd_apikey_deactivate(&config, &account, &id)
            }
            ApikeyCommands::Check { header, query } => {
                cmd_apikey_check(&config, header.as_deref(), query.as_deref())
            }
        },
        Commands::Authorize {
            header,
            role,
            capability,
        } => cmd_authorize(&config, &header, role, capability),
        Commands::Alert { subcommand } => match subcommand {
            AlertCommands::Create {
                api_key,
                title,
                short,
                long,
                priority,
            } => cmd_alert_create(&config, &api_key, &title, &short, &long, &priority),
            AlertCommands::List { account, all } => cmd_alert_list(&config, &account, all, verbose),
            AlertCommands::Status { account, id, to } => {
                cmd_alert_status(&config, &account, &id, &to)
            }
        },
        Commands::Heartbeat { subcommand } => match subcommand {
            HeartbeatCommands::Send { api_key } => cmd_heartbeat_send(&config, &api_key),
            HeartbeatCommands::Latest { account } => cmd_heartbeat_latest(&config, &account),
        },
    });

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

// ── Shared helpers ────────────────────────────────────────────────────────────

fn service_config(home: Option<PathBuf>) -> Result<ServiceConfig> {
    match home {
        Some(home) => Ok(ServiceConfig::with_home(home)),
        None => ServiceConfig::from_home().context("failed to locate home directory"),
    }
}

fn open_store(config: &ServiceConfig) -> Result<ObjectStore> {
    log::debug!("opening store at {}", config.data_dir.display());
    config
        .open_store()
        .with_context(|| format!("failed to open store at {}", config.data_dir.display()))
}

fn load_keys(config: &ServiceConfig) -> Result<TokenKeys> {
    config.load_keys().with_context(|| {
        format!(
            "failed to load keys from {} (run `wipa init` first)",
            config.key_file.display()
        )
    })
}

fn require_account(store: &ObjectStore, account_id: &str) -> Result<Account> {
    account::get_account(store, account_id)?.ok_or_else(|| anyhow!("account '{account_id}' not found"))
}

// ── Command implementations ───────────────────────────────────────────────────

/// `wipa init [--rsa-bits N] [--force]`
fn cmd_init(config: &ServiceConfig, rsa_bits: usize, force: bool) -> Result<()> {
    if config.key_file.exists() && !force {
        return Err(anyhow!(
            "key file already exists at {} (use --force to replace it)",
            config.key_file.display()
        ));
    }

    let keys = TokenKeys::generate(rsa_bits).context("failed to generate token keys")?;
    config::save_keys(&keys, &config.key_file).context("failed to save token keys")?;
    open_store(config)?;

    println!("Initialized wip-alerts home");
    println!("  Keys: {}", config.key_file.display());
    println!("  Data: {}", config.data_dir.display());
    println!("  RSA:  {} bits", keys.refresh.bits());
    Ok(())
}

/// `wipa account create [--device-id ID --device-type T [--device-info JSON]]`
fn cmd_account_create(
    config: &ServiceConfig,
    device_id: Option<String>,
    device_type: Option<String>,
    device_info: &str,
) -> Result<()> {
    serde_json::from_str::<serde_json::Value>(device_info)
        .context("--device-info must be a JSON document")?;

    let store = open_store(config)?;
    let account = Account::new();
    account.save(&store).context("failed to save account")?;

    println!("Created account");
    println!("  ID: {}", account.id);

    if let (Some(device_id), Some(device_type)) = (device_id, device_type) {
        let device = Device::new(device_id, device_type, device_info);
        device::save_devices(&store, &account.id, [&device]).context("failed to save device")?;
        println!("  Device: {} ({})", device.device_id, device.device_type);
    }
    Ok(())
}

/// `wipa account list`
fn cmd_account_list(config: &ServiceConfig, verbose: bool) -> Result<()> {
    let store = open_store(config)?;
    let mut accounts: Vec<Account> = account::list_accounts(&store)?.into_values().collect();
    accounts.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    if accounts.is_empty() {
        println!("No accounts found");
        return Ok(());
    }

    for account in &accounts {
        let devices = account.devices(&store)?;
        println!(
            "{}  created {}  devices: {}",
            account.id,
            fmt_time(&account.created_at),
            devices.len()
        );
        if verbose {
            for device in devices.values() {
                println!("    {} {} {}", device.device_type, device.device_id, device.device_info);
            }
        }
    }
    Ok(())
}

/// `wipa token issue --account ID`
fn cmd_token_issue(config: &ServiceConfig, account_id: &str) -> Result<()> {
    let store = open_store(config)?;
    let keys = load_keys(config)?;
    let pair = TokenIssuer::new(&store, &keys)
        .issue_from_account(account_id)
        .context("account grant failed")?;

    println!("Issued token pair for account {account_id}");
    println!("  Refresh: {}", pair.refresh_token);
    println!("  Access:  {}", pair.access_token);
    Ok(())
}

/// `wipa token renew --renewal ID`
fn cmd_token_renew(config: &ServiceConfig, renewal_id: &str) -> Result<()> {
    let store = open_store(config)?;
    let keys = load_keys(config)?;
    let redemption = TokenIssuer::new(&store, &keys)
        .issue_from_renewal(renewal_id)
        .context("renewal grant failed")?;

    println!("Redeemed renewal {renewal_id}");
    println!("  Access:  {}", redemption.access_token);

    // The token is valid either way; report the marking failure after it.
    if let Some(e) = redemption.mark_error {
        return Err(anyhow!("renewal '{renewal_id}' could not be marked used: {e}"));
    }
    Ok(())
}

/// `wipa token list [--raw]`
fn cmd_token_list(config: &ServiceConfig, raw: bool) -> Result<()> {
    let store = open_store(config)?;
    let tokens = token::list_all_tokens(&store)?;

    if tokens.is_empty() {
        println!("No tokens found");
        return Ok(());
    }

    let mut accounts: Vec<_> = tokens.into_iter().collect();
    accounts.sort_by(|a, b| a.0.cmp(&b.0));
    for (account_id, mut tokens) in accounts {
        tokens.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        println!("Account {account_id}:");
        for token in tokens {
            println!(
                "  {}  {:<13}  issued {}",
                token.id,
                token.token_type.as_str(),
                fmt_time(&token.issue_time)
            );
            if raw {
                println!("    {}", token.raw_string);
            }
        }
    }
    Ok(())
}

/// `wipa renewal create --refresh-token TOKEN`
fn cmd_renewal_create(config: &ServiceConfig, refresh_token: &str) -> Result<()> {
    let store = open_store(config)?;
    let keys = load_keys(config)?;
    let renewal_id = TokenIssuer::new(&store, &keys)
        .create_renewal(refresh_token.trim())
        .context("failed to create renewal")?;

    println!("Created renewal");
    println!("  ID: {renewal_id}");
    Ok(())
}

/// `wipa renewal list`
fn cmd_renewal_list(config: &ServiceConfig) -> Result<()> {
    let store = open_store(config)?;
    let renewals = renewal::list_all_renewals(&store)?;

    if renewals.is_empty() {
        println!("No renewals found");
        return Ok(());
    }

    for (account_id, renewals) in renewals {
        println!("Account {account_id}:");
        for renewal in renewals {
            let used = renewal
                .used_at
                .map(|t| format!("used {}", fmt_time(&t)))
                .unwrap_or_else(|| "unused".to_string());
            println!(
                "  {}  refresh token {}  {used}",
                renewal.id, renewal.refresh_token_id
            );
        }
    }
    Ok(())
}

/// `wipa apikey create --account ID [--description TEXT]`
fn cmd_apikey_create(config: &ServiceConfig, account_id: &str, description: &str) -> Result<()> {
    let store = open_store(config)?;
    let account = require_account(&store, account_id)?;

    let key = ApiKey::new(description);
    key.save(&store, &account.id).context("failed to save api key")?;

    println!("Created API key for account {}", account.id);
    println!("  ID: {}", key.id);
    Ok(())
}

/// `wipa apikey list --account ID`
fn cmd_apikey_list(config: &ServiceConfig, account_id: &str) -> Result<()> {
    let store = open_store(config)?;
    let account = require_account(&store, account_id)?;
    let keys = account.api_keys(&store)?;

    if keys.is_empty() {
        println!("No API keys found");
        return Ok(());
    }
    for key in keys.values() {
        println!("{}  {:<8}  {}", key.id, key.status.as_str(), key.description);
    }
    Ok(())
}

/// `wipa apikey deactivate --account ID --id KEY`
fn cmd_apikey_deactivate(config: &ServiceConfig, account_id: &str, api_key_id: &str) -> Result<()> {
    let store = open_store(config)?;
    let key = apikey::set_api_key_status(&store, account_id, api_key_id, ApiKeyStatus::Inactive)?;
    println!("Deactivated API key {}", key.id);
    Ok(())
}

/// `wipa apikey check [--header KEY] [--query KEY]`
fn cmd_apikey_check(config: &ServiceConfig, header: Option<&str>, query: Option<&str>) -> Result<()> {
    let store = open_store(config)?;
    let mut ctx = RequestContext::new();
    let (api_key_id, account_id) = gate::validate_api_key(&store, header, query, &mut ctx)?;

    let source = if header.is_some_and(|h| !h.is_empty()) {
        format!("{} header", gate::API_KEY_HEADER)
    } else {
        format!("{} query parameter", gate::API_KEY_QUERY_PARAM)
    };

    println!("API key accepted");
    println!("  Key:     {api_key_id}");
    println!("  Account: {account_id}");
    println!("  Via:     {source}");
    Ok(())
}

/// `wipa authorize --header "Bearer TOKEN" [--role R | --capability C]`
fn cmd_authorize(
    config: &ServiceConfig,
    header: &str,
    role: Option<String>,
    capability: Option<String>,
) -> Result<()> {
    let keys = load_keys(config)?;
    let mut ctx = RequestContext::new();

    let claims = match (role, capability) {
        (_, Some(capability)) => {
            gate::authorize(Some(header), &keys, gate::has_capability(capability), &mut ctx)?
        }
        (role, None) => gate::authorize(
            Some(header),
            &keys,
            gate::has_role(role.as_deref().unwrap_or("user")),
            &mut ctx,
        )?,
    };

    println!("Access granted");
    println!("  Account: {}", ctx.account_id.as_deref().unwrap_or(&claims.sub));
    println!("  Token:   {}", claims.jti);
    if let Some(issued) = claims.issued_at() {
        println!("  Issued:  {}", fmt_time(&issued));
    }
    let roles: Vec<&str> = claims.scope.roles.iter().map(String::as_str).collect();
    println!("  Roles:   {}", roles.join(","));
    Ok(())
}

/// `wipa alert create --api-key KEY --title T [--short S] [--long L] [--priority P]`
fn cmd_alert_create(
    config: &ServiceConfig,
    api_key: &str,
    title: &str,
    short: &str,
    long: &str,
    priority: &str,
) -> Result<()> {
    let priority = AlertPriority::parse(priority)
        .ok_or_else(|| anyhow!("unknown priority '{priority}' (expected high, normal or low)"))?;

    let store = open_store(config)?;
    let mut ctx = RequestContext::new();
    let (api_key_id, account_id) = gate::validate_api_key(&store, Some(api_key), None, &mut ctx)?;

    let alert = Alert::new(api_key_id, title, short, long, priority, Utc::now());
    alert.save(&store, &account_id).context("failed to save alert")?;

    println!("Raised alert for account {account_id}");
    println!("  ID: {}", alert.id);
    Ok(())
}

/// `wipa alert list --account ID [--all]`
fn cmd_alert_list(config: &ServiceConfig, account_id: &str, all: bool, verbose: bool) -> Result<()> {
    let store = open_store(config)?;
    let alerts = if all {
        alert::list_alerts(&store, account_id)?
    } else {
        alert::list_non_archived_alerts(&store, account_id)?
    };

    if alerts.is_empty() {
        println!("No alerts found");
        return Ok(());
    }

    let mut alerts: Vec<Alert> = alerts.into_values().collect();
    alerts.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at));
    for alert in alerts {
        println!(
            "{}  {:<8}  {:<6}  {}  {}",
            alert.id,
            alert.status.as_str(),
            alert.priority.as_str(),
            fmt_time(&alert.triggered_at),
            alert.title
        );
        if verbose && !alert.short_description.is_empty() {
            println!("    {}", alert.short_description);
        }
    }
    Ok(())
}

/// `wipa alert status --account ID --id ALERT --to STATUS`
fn cmd_alert_status(config: &ServiceConfig, account_id: &str, alert_id: &str, to: &str) -> Result<()> {
    let status = AlertStatus::parse(to)
        .ok_or_else(|| anyhow!("unknown status '{to}' (expected new, seen or archived)"))?;

    let store = open_store(config)?;
    let alert = alert::update_alert_status(&store, account_id, alert_id, status)?;
    println!("Alert {} is now {}", alert.id, alert.status);
    Ok(())
}

/// `wipa heartbeat send --api-key KEY`
fn cmd_heartbeat_send(config: &ServiceConfig, api_key: &str) -> Result<()> {
    let store = open_store(config)?;
    let mut ctx = RequestContext::new();
    let (api_key_id, account_id) = gate::validate_api_key(&store, Some(api_key), None, &mut ctx)?;

    let heartbeat = Heartbeat::new(api_key_id, Utc::now());
    heartbeat.save(&store, &account_id).context("failed to save heartbeat")?;

    println!("Recorded heartbeat");
    println!("  ID: {}", heartbeat.id);
    Ok(())
}

/// `wipa heartbeat latest --account ID`
fn cmd_heartbeat_latest(config: &ServiceConfig, account_id: &str) -> Result<()> {
    let store = open_store(config)?;
    let latest = heartbeat::latest_heartbeat_per_api_key(&store, account_id)?;

    if latest.is_empty() {
        println!("No heartbeats found");
        return Ok(());
    }

    let mut latest: Vec<Heartbeat> = latest.into_values().collect();
    latest.sort_by(|a, b| a.api_key_id.cmp(&b.api_key_id));
    for hb in latest {
        println!("{}  last seen {}", hb.api_key_id, fmt_time(&hb.executed_at));
    }
    Ok(())
}

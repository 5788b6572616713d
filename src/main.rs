use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use dtrackctl::config::{Config, API_KEY_ENV};
use dtrackctl::dtrack::client::format_api_error;
use dtrackctl::dtrack::models::RepositoryType;
use dtrackctl::dtrack::DtrackClient;
use dtrackctl::resource::{
    Applier, ApplyError, ConfigPropertyHandler, HandlerError, Manifest, OidcGroupHandler,
    OidcGroupSpec, RepositoryHandler, TeamHandler, TeamSpec,
};
use dtrackctl::sync::SyncError;
use dtrackctl::VERSION;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Declarative configuration for Dependency-Track
#[derive(Parser, Debug)]
#[command(name = "dtrackctl", version, about, long_about = None)]
struct Args {
    /// Dependency-Track URL (defaults to DEPENDENCYTRACK_HOST, then the saved config)
    #[arg(long, global = true)]
    host: Option<String>,

    /// Log level for debugging
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List objects of one kind
    List {
        #[arg(value_enum)]
        kind: ListKind,

        #[arg(short, long, value_enum, default_value = "yaml")]
        output: OutputFormat,
    },

    /// Converge the server onto a manifest
    Apply {
        manifest: PathBuf,

        /// Print the changes without making them
        #[arg(long)]
        dry_run: bool,

        #[arg(short, long, value_enum, default_value = "text")]
        output: ReportFormat,
    },

    /// Write the server's current state as a manifest
    Export {
        #[arg(short, long, value_enum, default_value = "yaml")]
        output: OutputFormat,
    },

    /// Delete one object by its key
    Delete {
        #[arg(value_enum)]
        kind: DeleteKind,

        /// Name, or TYPE/identifier for repositories
        key: String,
    },

    /// Rename a team or OIDC group, keeping its relations
    Rename {
        #[arg(value_enum)]
        kind: RenameKind,

        from: String,
        to: String,
    },

    /// Save connection defaults
    Config {
        #[arg(long)]
        page_size: Option<usize>,

        /// Request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ListKind {
    Teams,
    Permissions,
    OidcGroups,
    Repositories,
    ConfigProperties,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DeleteKind {
    Team,
    OidcGroup,
    Repository,
    ConfigProperty,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RenameKind {
    Team,
    OidcGroup,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ReportFormat {
    Text,
    Json,
    Yaml,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new().create(true).append(true).open(&log_path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Warning: cannot open log file {}: {}", log_path.display(), e);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("dtrackctl {} started with log level: {:?}", VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("dtrackctl").join("dtrackctl.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".dtrackctl").join("dtrackctl.log");
    }
    PathBuf::from("dtrackctl.log")
}

fn print<T: Serialize + ?Sized>(value: &T, format: OutputFormat) -> Result<()> {
    let out = match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
    };
    println!("{}", out.trim_end());
    Ok(())
}

fn connect(config: &Config, host: Option<&str>) -> Result<DtrackClient> {
    let host = config.effective_host(host);
    let api_key = Config::api_key().with_context(|| format!("{} is not set", API_KEY_ENV))?;
    tracing::info!("Using Dependency-Track at {}", host);
    DtrackClient::with_options(
        &host,
        &api_key,
        config.effective_page_size(),
        config.effective_timeout(),
    )
}

async fn list(client: &DtrackClient, kind: ListKind, format: OutputFormat) -> Result<()> {
    match kind {
        ListKind::Teams => {
            let mut teams = TeamHandler::new(client).list().await?;
            teams.sort_by(|a, b| a.name.cmp(&b.name));
            print(&teams, format)
        }
        ListKind::Permissions => {
            let mut permissions: Vec<_> = TeamHandler::new(client)
                .permission_universe()
                .await?
                .into_values()
                .collect();
            permissions.sort_by(|a, b| a.name.cmp(&b.name));
            print(&permissions, format)
        }
        ListKind::OidcGroups => {
            let mut groups = OidcGroupHandler::new(client).list().await?;
            groups.sort_by(|a, b| a.name.cmp(&b.name));
            print(&groups, format)
        }
        ListKind::Repositories => {
            let mut repositories = RepositoryHandler::new(client).list().await?;
            repositories.sort_by_key(|r| r.key());
            print(&repositories, format)
        }
        ListKind::ConfigProperties => {
            let mut properties = ConfigPropertyHandler::new(client).list().await?;
            properties.sort_by_key(|p| p.id());
            print(&properties, format)
        }
    }
}

async fn apply(client: &DtrackClient, path: &Path, dry_run: bool, format: ReportFormat) -> Result<()> {
    let manifest = Manifest::load(path)?;
    let report = Applier::new(client).dry_run(dry_run).apply(&manifest).await?;

    match format {
        ReportFormat::Json => print(&report, OutputFormat::Json),
        ReportFormat::Yaml => print(&report, OutputFormat::Yaml),
        ReportFormat::Text => {
            for change in &report.changes {
                println!("{}", change);
            }
            let verb = if report.dry_run { "planned" } else { "applied" };
            println!("{} changes {}", report.changes.len(), verb);
            Ok(())
        }
    }
}

async fn delete(client: &DtrackClient, kind: DeleteKind, key: &str) -> Result<()> {
    let not_found = |kind: &'static str| HandlerError::NotFound {
        kind,
        key: key.to_string(),
    };

    match kind {
        DeleteKind::Team => {
            let handler = TeamHandler::new(client);
            let team = handler.find_by_name(key).await?.ok_or_else(|| not_found("team"))?;
            handler.delete(team.uuid).await
        }
        DeleteKind::OidcGroup => {
            let handler = OidcGroupHandler::new(client);
            let group = handler
                .list_by_name()
                .await?
                .remove(key)
                .ok_or_else(|| not_found("OIDC group"))?;
            handler.delete(group.uuid).await
        }
        DeleteKind::Repository => {
            let (repo_type, identifier) = key
                .split_once('/')
                .with_context(|| format!("Repository key {:?} must look like TYPE/identifier", key))?;
            let repo_type: RepositoryType = repo_type.parse()?;
            let handler = RepositoryHandler::new(client);
            let repository = handler
                .find(repo_type, identifier)
                .await?
                .ok_or_else(|| not_found("repository"))?;
            handler.delete(repository.uuid).await
        }
        DeleteKind::ConfigProperty => ConfigPropertyHandler::new(client).delete(key),
    }
}

async fn rename(client: &DtrackClient, kind: RenameKind, from: &str, to: &str) -> Result<()> {
    let not_found = |kind: &'static str| HandlerError::NotFound {
        kind,
        key: from.to_string(),
    };

    match kind {
        RenameKind::Team => {
            let handler = TeamHandler::new(client);
            let team = handler.find_by_name(from).await?.ok_or_else(|| not_found("team"))?;
            let spec = TeamSpec {
                name: to.to_string(),
                ..TeamSpec::from(&team)
            };
            let (team, _) = handler.update(team.uuid, &spec).await?;
            println!("~ team {} -> {}", from, team.name);
        }
        RenameKind::OidcGroup => {
            let handler = OidcGroupHandler::new(client);
            let group = handler
                .list_by_name()
                .await?
                .remove(from)
                .ok_or_else(|| not_found("OIDC group"))?;
            let mut teams: Vec<String> = handler.current_mappings(group.uuid).await?.into_keys().collect();
            teams.sort();
            let spec = OidcGroupSpec {
                name: to.to_string(),
                teams,
            };
            let (group, _) = handler.update(group.uuid, &spec).await?;
            println!("~ OIDC group {} -> {}", from, group.name);
        }
    }
    Ok(())
}

fn save_config(mut config: Config, host: Option<String>, page_size: Option<usize>, timeout: Option<u64>) -> Result<()> {
    if host.is_some() {
        config.host = host;
    }
    if page_size.is_some() {
        config.page_size = page_size;
    }
    if timeout.is_some() {
        config.timeout_secs = timeout;
    }
    config.save()?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

async fn run(args: Args) -> Result<()> {
    let config = Config::load();
    let host = args.host.as_deref();

    match args.command {
        Command::Config { page_size, timeout } => {
            save_config(config, host.map(str::to_string), page_size, timeout)
        }
        Command::List { kind, output } => list(&connect(&config, host)?, kind, output).await,
        Command::Apply {
            manifest,
            dry_run,
            output,
        } => apply(&connect(&config, host)?, &manifest, dry_run, output).await,
        Command::Export { output } => {
            let manifest = Manifest::export(&connect(&config, host)?).await?;
            print(&manifest, output)
        }
        Command::Delete { kind, key } => delete(&connect(&config, host)?, kind, &key).await,
        Command::Rename { kind, from, to } => rename(&connect(&config, host)?, kind, &from, &to).await,
    }
}

fn report_error(err: &anyhow::Error) {
    let partial = err.downcast_ref::<ApplyError>();
    let cause = partial.map_or(err, |e| &e.source);
    eprintln!("Error: {}", format_api_error(cause));

    if let Some(apply) = partial {
        eprintln!("Changes applied before the failure:");
        for change in &apply.applied {
            eprintln!("  {}", change);
        }
    }

    if let Some(SyncError::Mutation { progress, .. }) = cause.downcast_ref::<SyncError>() {
        for edit in &progress.applied {
            eprintln!("  applied        {}", edit);
        }
        for edit in &progress.not_attempted {
            eprintln!("  not attempted  {}", edit);
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{:#}", err);
            report_error(&err);
            ExitCode::FAILURE
        }
    }
}

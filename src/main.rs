use anyhow::{Context, Result as AnyhowResult};
use clap::{CommandFactory, Parser};
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use vitrine::{
    config::Config,
    display::HeadlessHost,
    geometry::StateStore,
    model::ContentEntry,
    server::daemon::{Handoff, Spawner},
    server::ipc::{self, AddressMode, SocketPaths},
    server::{Command, DisplayInstance, InstanceConfig},
    services::{log_dirs, tracing_setup},
};

/// Show HTML content in a window that later invocations keep feeding
#[derive(Parser, Debug)]
#[command(name = "vitrine")]
#[command(version)]
#[command(after_help = concat!(
    "Commands (use --cmd):\n",
    "  config show               Print effective configuration\n",
    "  config schema             Print the JSON Schema of the config file\n",
    "  config paths              Show directories used by vitrine\n",
    "  list                      List running display instances\n",
    "\n",
    "Examples:\n",
    "  vitrine -p report.html                 Show a file (grouped with other recent ones)\n",
    "  cat page.html | vitrine -n Page        Show piped content\n",
    "  vitrine --id new -p log.html           Open a named window, print its id\n",
    "  vitrine --id ID -p log.html            Replace the content of window ID\n",
))]
struct Cli {
    /// Run a command instead of showing content
    /// Commands: config (show|schema|paths), list
    #[arg(long, num_args = 1.., value_name = "COMMAND")]
    cmd: Vec<String>,

    /// File to show. Without it, content is read from stdin when piped
    #[arg(short = 'p', long, value_name = "PATH")]
    path: Option<PathBuf>,

    /// Display name (defaults to the file name, or "stdin")
    #[arg(short = 'n', long, value_name = "NAME")]
    name: Option<String>,

    /// Address a named window. Use "new" to create one and print its id
    #[arg(long, value_name = "ID")]
    id: Option<String>,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Path to log file for display instance diagnostics
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    // === Hidden internal flags ===
    /// Run as the detached display instance (internal)
    #[arg(long, hide = true)]
    display_host: bool,

    /// Delete the --path file after reading it (internal)
    #[arg(long, hide = true, requires = "path")]
    temp_file: bool,
}

fn main() -> AnyhowResult<()> {
    let cli = Cli::parse();

    if cli.display_host {
        return run_display_host(&cli);
    }

    match &cli.log_file {
        Some(path) => tracing_setup::init_instance(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?,
        None => tracing_setup::init_cli(),
    }

    if !cli.cmd.is_empty() {
        return run_command(&cli);
    }

    let Some(entry) = load_entry(&cli)? else {
        Cli::command().print_help()?;
        return Ok(());
    };
    let mode = resolve_mode(cli.id.as_deref())?;
    deliver(&cli, entry, &mode)
}

/// Content for this invocation: the --path file, or piped stdin.
fn load_entry(cli: &Cli) -> AnyhowResult<Option<ContentEntry>> {
    let name = cli.name.as_deref();

    if let Some(path) = &cli.path {
        if cli.temp_file {
            let entry = std::fs::File::open(path)
                .and_then(|file| ContentEntry::from_reader(file, name))
                .with_context(|| format!("Failed to read {}", path.display()));
            if let Err(e) = std::fs::remove_file(path) {
                tracing::warn!("Failed to remove temporary file {:?}: {}", path, e);
            }
            return entry.map(Some);
        }
        let entry = ContentEntry::from_file(path, name)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        return Ok(Some(entry));
    }

    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }
    let entry = ContentEntry::from_reader(stdin.lock(), name).context("Failed to read stdin")?;
    Ok(Some(entry))
}

/// Grouping without --id; a fresh named window for `--id new`.
fn resolve_mode(id: Option<&str>) -> AnyhowResult<AddressMode> {
    match id {
        None => Ok(AddressMode::Grouping),
        Some("new") => {
            let handle = uuid::Uuid::new_v4().to_string();
            println!("{}", handle);
            Ok(AddressMode::Named(handle))
        }
        Some(id) => {
            uuid::Uuid::parse_str(id)
                .with_context(|| format!("Invalid window id '{}': expected a UUID or 'new'", id))?;
            Ok(AddressMode::Named(id.to_string()))
        }
    }
}

/// Hand the entry to a running instance, or start one that shows it.
fn deliver(cli: &Cli, entry: ContentEntry, mode: &AddressMode) -> AnyhowResult<()> {
    let paths = SocketPaths::from_environment().context("Failed to determine runtime directory")?;
    let socket_path = paths.resolve(mode);
    let command = match mode {
        AddressMode::Grouping => Command::add(entry.clone()),
        AddressMode::Named(_) => Command::replace(entry.clone()),
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create async runtime")?;
    if runtime.block_on(ipc::try_send(&socket_path, &command)) {
        tracing::debug!("Delivered '{}' to {:?}", entry.name, socket_path);
        return Ok(());
    }

    let handoff = Handoff::prepare(&entry, cli.name.as_deref(), mode)
        .context("Failed to prepare content for the display instance")?
        .with_config_path(cli.config.clone());
    let pid = Spawner::current_exe()
        .context("Failed to locate the vitrine executable")?
        .spawn_and_await_ready(&handoff, &socket_path)
        .context("Failed to start display instance")?;
    tracing::debug!("Display instance {} now shows '{}'", pid, entry.name);
    Ok(())
}

/// Run as the detached display instance
fn run_display_host(cli: &Cli) -> AnyhowResult<()> {
    let log_path = cli
        .log_file
        .clone()
        .unwrap_or_else(log_dirs::instance_log_path);
    tracing_setup::init_instance(&log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;
    log_dirs::cleanup_stale_logs();

    let entry = load_entry(cli)?.context("Display instance started without content")?;
    let mode = match cli.id.as_deref() {
        Some(handle) => AddressMode::Named(handle.to_string()),
        None => AddressMode::Grouping,
    };
    let paths = SocketPaths::from_environment().context("Failed to determine runtime directory")?;

    let mut instance_config = InstanceConfig::new(entry, mode.clone(), paths)
        .with_config(Config::load_or_default(cli.config.as_deref()))
        // Nobody can close a headless window, so grouping instances end
        // with their dispatcher
        .exit_on_dispatcher_close(mode == AddressMode::Grouping);
    if let Some(store) = StateStore::from_system() {
        instance_config = instance_config.with_state_store(store);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create async runtime")?;
    runtime.block_on(async move {
        let instance = DisplayInstance::new(instance_config, HeadlessHost::new())
            .context("Failed to bind display instance socket")?;
        instance.run(shutdown_signal()).await?;
        Ok::<(), anyhow::Error>(())
    })
}

/// Resolves on SIGINT or SIGTERM
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(terminate) => terminate,
        Err(e) => {
            tracing::warn!("Failed to install SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

fn run_command(cli: &Cli) -> AnyhowResult<()> {
    let words: Vec<&str> = cli.cmd.iter().map(String::as_str).collect();
    match words.as_slice() {
        ["config", "show"] => {
            let config = match &cli.config {
                Some(path) => Config::load_from_file(path)
                    .with_context(|| format!("Failed to load config from {}", path.display()))?,
                None => Config::load_or_default(None),
            };
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ["config", "schema"] => {
            println!("{}", serde_json::to_string_pretty(&Config::schema())?);
        }
        ["config", "paths"] => print_paths(cli.config.as_deref())?,
        ["list"] => list_command()?,
        _ => anyhow::bail!(
            "Unknown command: {}\nAvailable commands: config (show|schema|paths), list",
            cli.cmd.join(" ")
        ),
    }
    Ok(())
}

fn print_paths(config_override: Option<&Path>) -> AnyhowResult<()> {
    let config_file = config_override
        .map(Path::to_path_buf)
        .or_else(Config::default_path);
    let state_file = StateStore::from_system().map(|store| store.path().to_path_buf());

    let show = |path: Option<PathBuf>| {
        path.map(|p| p.display().to_string())
            .unwrap_or_else(|| "(unavailable)".to_string())
    };
    println!("Config file:       {}", show(config_file));
    println!("State file:        {}", show(state_file));
    println!("Log directory:     {}", log_dirs::log_dir().display());
    println!("Runtime directory: {}", SocketPaths::runtime_dir()?.display());
    Ok(())
}

/// List live display instances, cleaning up stale sockets
fn list_command() -> AnyhowResult<()> {
    let paths = SocketPaths::from_environment().context("Failed to determine runtime directory")?;

    let grouping = ipc::is_listening(&paths.resolve(&AddressMode::Grouping));
    let (named, stale) = paths
        .live_named_instances()
        .context("Failed to read the runtime directory")?;

    if stale > 0 {
        eprintln!("Cleaned up {} stale socket(s).", stale);
    }
    if grouping {
        println!("Grouping instance is running.");
    }
    if named.is_empty() {
        println!("No named instances.");
    } else {
        println!("Named instances:");
        for handle in named {
            println!("  {}", handle);
        }
    }
    Ok(())
}

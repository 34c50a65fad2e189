#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level as TraceLevel};
use tracing_subscriber::FmtSubscriber;

use sports_overlay::auth::{self, TokenAuth};
use sports_overlay::config::Config;
use sports_overlay::constants::storage::IMAGES_DIR;
use sports_overlay::embed::to_embed_url;
use sports_overlay::persistence::{FileSnapshotStore, Scope, SnapshotStore};
use sports_overlay::render::Frame;
use sports_overlay::session::{self, EditCommand, EditSession};
use sports_overlay::store::ResourceStore;
use sports_overlay::sync::{open_channel, SyncChannel};
use sports_overlay::templates;
use sports_overlay::viewer::{Surface, Viewer};

#[derive(Parser)]
#[command(name = "sports-overlay", version, about = "Edit and serve sports broadcast overlays")]
struct Cli {
    /// Game the overlay belongs to (scopes storage when scope_by_game is set)
    #[arg(long, global = true)]
    game: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the saved layers
    List,
    #[command(flatten)]
    Edit(EditCommand),
    /// List built-in templates
    Templates,
    /// Keep one store open and read editing commands from stdin until EOF
    ///
    /// Accepts every editing command plus reset, select, clear, press, drag,
    /// list and save. Unsaved changes are saved at EOF.
    Session,
    /// Follow saved updates as a passive viewer until interrupted
    Watch {
        /// Rewrite this HTML page on every update
        #[arg(long)]
        html: Option<PathBuf>,
        /// Background video page for a preview surface
        #[arg(long)]
        preview_url: Option<String>,
        /// Host the Twitch player is embedded under
        #[arg(long, default_value = "localhost")]
        parent: String,
    },
}

fn init_logging(config_level: &str) -> Result<()> {
    // LOG_LEVEL wins over the config file
    let log_level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| config_level.to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).context("Failed to install log subscriber")?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, config_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };
    init_logging(&config.log_level)?;
    if let Some(e) = config_error {
        warn!(error = %format!("{e:#}"), "Using default config");
    }

    let scope = Scope::for_route(cli.game.as_deref(), config.scope_by_game);
    let data_dir = config.data_dir();
    let persistence: Arc<dyn SnapshotStore> = Arc::new(FileSnapshotStore::new(&data_dir, &scope));
    info!(scope = ?scope, data_dir = %data_dir.display(), "Starting");

    match cli.command {
        Command::List => {
            let layers = persistence.read()?.unwrap_or_else(templates::sample_snapshot);
            for layer in &layers {
                println!("{}", session::format_layer(layer));
            }
            Ok(())
        }
        Command::Templates => {
            for template in templates::all() {
                println!("{:<14} {:<14} {}", template.id, template.name, template.description);
            }
            Ok(())
        }
        Command::Watch {
            html,
            preview_url,
            parent,
        } => {
            let channel = open_sync(&config, &scope, &persistence);
            let surface = match preview_url {
                Some(url) => Surface::Preview {
                    background: to_embed_url(&url, &parent),
                },
                None => Surface::Overlay,
            };
            run_watch(surface, &*persistence, channel, html.as_deref())
        }
        Command::Edit(command) => {
            let mut store = open_store(&config, &scope, &persistence)?;
            if let Some(id) = session::apply(&mut store, command, &data_dir.join(IMAGES_DIR))? {
                println!("{id}");
            }
            session::save(&mut store)?;
            store.close();
            Ok(())
        }
        Command::Session => {
            let store = open_store(&config, &scope, &persistence)?;
            let session = EditSession::new(store, data_dir.join(IMAGES_DIR));
            session.run(std::io::stdin().lock(), &mut std::io::stdout().lock())
        }
    }
}

/// Load the editor's store once the caller is allowed to edit
fn open_store(config: &Config, scope: &Scope, persistence: &Arc<dyn SnapshotStore>) -> Result<ResourceStore> {
    auth::require(&TokenAuth::from_env())?;
    let channel = open_sync(config, scope, persistence);
    let store = ResourceStore::load(persistence.clone(), channel, config.locale);
    if let Some(e) = store.last_error() {
        anyhow::bail!("{e}; refusing to overwrite the stored layers");
    }
    Ok(store)
}

fn open_sync(config: &Config, scope: &Scope, persistence: &Arc<dyn SnapshotStore>) -> Box<dyn SyncChannel> {
    open_channel(
        config.sync_mode,
        config.runtime_dir().as_deref(),
        scope,
        persistence.clone(),
        config.poll_interval(),
    )
}

fn run_watch(
    surface: Surface,
    persistence: &dyn SnapshotStore,
    channel: Box<dyn SyncChannel>,
    html: Option<&Path>,
) -> Result<()> {
    let shutdown = Arc::new(AtomicBool::new(false));
    #[cfg(unix)]
    {
        use signal_hook::consts::{SIGINT, SIGTERM};
        signal_hook::flag::register(SIGINT, shutdown.clone()).context("Failed to install SIGINT handler")?;
        signal_hook::flag::register(SIGTERM, shutdown.clone()).context("Failed to install SIGTERM handler")?;
    }

    let (mut viewer, frames) = Viewer::mount(surface, persistence, channel)?;
    info!("Watching for overlay updates (Ctrl+C to stop)");

    while !shutdown.load(Ordering::Relaxed) {
        match frames.recv_timeout(Duration::from_millis(200)) {
            Ok(frame) => {
                info!(layers = frame.len(), "Overlay updated");
                if let Some(path) = html {
                    write_html(path, &frame, viewer.surface())?;
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    info!("Shutting down viewer");
    viewer.close();
    Ok(())
}

fn write_html(path: &Path, frame: &Frame, surface: &Surface) -> Result<()> {
    let tmp = path.with_extension("html.tmp");
    std::fs::write(&tmp, frame.to_html(surface.background()))
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path).with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

use crate::config::constants;
use crate::config::manifest::{Environment, Manifest};
use crate::config::tokens::TokenTable;
use crate::error::{ForgeError, Result};
use crate::runner::run_build;
use crate::serve;
use crate::watch::watch_and_rebuild;
use clap::{Parser, Subcommand};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;
use tracing::{debug, error, info};

#[derive(Subcommand)]
#[command(version, about, long_about = None)]
pub enum Commands {
    /// Run every task once
    Build {
        /// Only run the named tasks
        tasks: Vec<String>,
        /// Manifest file
        #[clap(short = 'c', long, default_value = constants::MANIFEST_FILE)]
        manifest: PathBuf,
        /// Force production mode
        #[clap(short, long)]
        production: bool,
    },

    /// Build once, then rebuild affected tasks on change
    Watch {
        /// Manifest file
        #[clap(short = 'c', long, default_value = constants::MANIFEST_FILE)]
        manifest: PathBuf,
        /// Force production mode
        #[clap(short, long)]
        production: bool,
    },

    /// Serve the site root with live reload
    Serve {
        /// Manifest file
        #[clap(short = 'c', long, default_value = constants::MANIFEST_FILE)]
        manifest: PathBuf,
        /// Port to listen on
        #[clap(short = 'p', long)]
        port: Option<u16>,
        /// Serve this directory instead of the manifest's site root
        #[clap(long)]
        root: Option<PathBuf>,
    },

    /// Watch and serve together
    Dev {
        /// Manifest file
        #[clap(short = 'c', long, default_value = constants::MANIFEST_FILE)]
        manifest: PathBuf,
        /// Port to listen on
        #[clap(short = 'p', long)]
        port: Option<u16>,
        /// Force production mode
        #[clap(short, long)]
        production: bool,
    },

    /// Production build (environment forced to production)
    Dist {
        /// Manifest file
        #[clap(short = 'c', long, default_value = constants::MANIFEST_FILE)]
        manifest: PathBuf,
    },
}

/// webforge command
#[derive(Parser)]
#[command(about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Commands,
}

pub fn environment(production: bool) -> Environment {
    if production {
        Environment::Production
    } else {
        Environment::Development
    }
}

/// The `dist` command always builds for production
pub fn dist_environment() -> Environment {
    Environment::Production
}

/// One-shot build of all (or the selected) tasks. Non-zero exit when any
/// task fails.
pub async fn build_command(
    manifest_path: &Path,
    tasks: &[String],
    env: Environment,
) -> Result<()> {
    debug!("Starting build command");
    debug!("Manifest: {:?}", manifest_path);
    debug!("Environment: {}", env);

    let manifest = Manifest::load(manifest_path)?;
    let tokens = TokenTable::load(&manifest, env)?;

    let only = selection(&manifest, tasks)?;
    let report = run_build(&manifest, &tokens, env, only.as_ref()).await?;

    let failed = report.failed();
    if failed.is_empty() {
        info!("Build completed: {} task(s)", report.outcomes.len());
        Ok(())
    } else {
        Err(ForgeError::TasksFailed(failed.len()))
    }
}

/// Build, then watch and rebuild affected tasks until terminated
pub async fn watch_command(manifest_path: &Path, env: Environment) -> Result<()> {
    let manifest = Manifest::load(manifest_path)?;
    let tokens = TokenTable::load(&manifest, env)?;

    initial_build(&manifest, &tokens, env).await;

    info!("Entering watch mode...");
    let (reload, _idle) = broadcast::channel(16);
    watch_and_rebuild(manifest, env, reload).await
}

/// Static file server over the manifest's site root
pub async fn serve_command(
    manifest_path: &Path,
    port: Option<u16>,
    root: Option<PathBuf>,
) -> Result<()> {
    let root = match root {
        Some(root) => root,
        None => Manifest::load(manifest_path)?.site_root(),
    };
    let (reload, _idle) = broadcast::channel(16);
    serve::serve(root, port.unwrap_or(constants::DEFAULT_PORT), reload).await
}

/// Watch + serve composed: the development loop
pub async fn dev_command(
    manifest_path: &Path,
    port: Option<u16>,
    env: Environment,
) -> Result<()> {
    let manifest = Manifest::load(manifest_path)?;
    let tokens = TokenTable::load(&manifest, env)?;

    initial_build(&manifest, &tokens, env).await;

    let (reload, _idle) = broadcast::channel(16);
    let root = manifest.site_root();
    let server_reload = reload.clone();
    let server_port = port.unwrap_or(constants::DEFAULT_PORT);
    tokio::spawn(async move {
        if let Err(e) = serve::serve(root, server_port, server_reload).await {
            error!("Server stopped: {}", e);
        }
    });

    info!("Entering watch mode...");
    watch_and_rebuild(manifest, env, reload).await
}

/// The initial full build of a long-running mode: failures are reported but
/// do not terminate the loop
async fn initial_build(manifest: &Manifest, tokens: &TokenTable, env: Environment) {
    match run_build(manifest, tokens, env, None).await {
        Ok(report) if report.is_success() => {
            info!("Initial build completed: {} task(s)", report.outcomes.len());
        }
        Ok(report) => {
            error!(
                "Initial build finished with failed task(s): {:?}",
                report.failed()
            );
        }
        Err(e) => {
            error!("Initial build failed: {}", e);
        }
    }
}

fn selection(manifest: &Manifest, tasks: &[String]) -> Result<Option<HashSet<String>>> {
    if tasks.is_empty() {
        return Ok(None);
    }
    for name in tasks {
        if manifest.task(name).is_none() {
            return Err(ForgeError::invalid_manifest(format!(
                "unknown task '{name}'"
            )));
        }
    }
    Ok(Some(tasks.iter().cloned().collect()))
}

use clap::Parser;
use tracing::error;
use webforge::cli::{
    Cli, Commands, build_command, dev_command, dist_environment, serve_command, watch_command,
};

#[tokio::main]
async fn main() {
    if let Err(e) = webforge::logging::init() {
        eprintln!("Failed to initialize logging: {e}");
        std::process::exit(1);
    }

    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> webforge::error::Result<()> {
    let args = Cli::parse();
    match args.cmd {
        Commands::Build {
            tasks,
            manifest,
            production,
        } => {
            build_command(&manifest, &tasks, webforge::cli::environment(production)).await?;
        }
        Commands::Watch {
            manifest,
            production,
        } => {
            watch_command(&manifest, webforge::cli::environment(production)).await?;
        }
        Commands::Serve {
            manifest,
            port,
            root,
        } => {
            serve_command(&manifest, port, root).await?;
        }
        Commands::Dev {
            manifest,
            port,
            production,
        } => {
            dev_command(&manifest, port, webforge::cli::environment(production)).await?;
        }
        Commands::Dist { manifest } => {
            build_command(&manifest, &[], dist_environment()).await?;
        }
    }
    Ok(())
}

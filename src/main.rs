use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info};

use ctlauncher::core::downloader::TracingSink;
use ctlauncher::core::launch::AssetFailurePolicy;
use ctlauncher::core::state::{default_data_dir, LauncherConfig, LauncherPaths};
use ctlauncher::core::version::VersionGroup;
use ctlauncher::{LaunchCoordinator, LaunchRequest, LauncherResult};

#[derive(Parser)]
#[command(name = "ctlauncher", version, about = "Acquire and launch game versions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List versions from the remote index
    Versions {
        #[arg(long, value_enum, default_value_t = KindArg::Release)]
        kind: KindArg,
    },
    /// Prepare a version and start it
    Launch {
        id: String,
        #[arg(long, default_value = ctlauncher::core::auth::DEFAULT_USERNAME)]
        username: String,
        /// Maximum heap in MiB
        #[arg(long)]
        memory: Option<u32>,
        /// Start even if some assets failed to download
        #[arg(long)]
        allow_missing_assets: bool,
        /// Print the launch plan instead of spawning
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Release,
    Snapshot,
    Legacy,
    All,
}

impl From<KindArg> for VersionGroup {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Release => VersionGroup::Release,
            KindArg::Snapshot => VersionGroup::Snapshot,
            KindArg::Legacy => VersionGroup::Legacy,
            KindArg::All => VersionGroup::All,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    ctlauncher::init_logging();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{} ({:?})", e, e.kind());
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> LauncherResult<ExitCode> {
    let data_dir = default_data_dir();
    let config = LauncherConfig::load(&data_dir).await?;
    let paths = LauncherPaths::new(data_dir);
    let mut coordinator = LaunchCoordinator::from_config(config, paths, Arc::new(TracingSink))?;

    match cli.command {
        Commands::Versions { kind } => {
            let index = coordinator.versions().await?;
            for entry in index.group(kind.into()) {
                println!(
                    "{}\t{:?}\t{}",
                    entry.id,
                    entry.version_type,
                    entry.release_time.format("%Y-%m-%d")
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Launch {
            id,
            username,
            memory,
            allow_missing_assets,
            dry_run,
        } => {
            let request = LaunchRequest {
                username,
                memory_mb: memory,
                asset_policy: if allow_missing_assets {
                    AssetFailurePolicy::Continue
                } else {
                    AssetFailurePolicy::Abort
                },
                ..LaunchRequest::new(id)
            };

            let abort = request.abort.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Interrupt received, aborting launch");
                    abort.abort();
                }
            });

            if dry_run {
                let plan = coordinator.prepare(&request).await?;
                println!("{}", serde_json::to_string_pretty(&plan)?);
                return Ok(ExitCode::SUCCESS);
            }

            let (_plan, mut child) = coordinator.launch(&request).await?;
            let status = child
                .wait()
                .await
                .map_err(|e| ctlauncher::LauncherError::Spawn(e.to_string()))?;
            info!("Game exited with {}", status);
            Ok(if status.success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

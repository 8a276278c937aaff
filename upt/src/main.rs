use anyhow::Context;
use upt::config::SyncConfig;
use upt::sync::{close_store, rebuild_manifest, update_with_params};
use upt_core::DiskClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CliMode {
    Run,
    RebuildManifest,
    Help,
}

fn parse_cli_mode<I>(args: I) -> anyhow::Result<CliMode>
where
    I: IntoIterator<Item = String>,
{
    let mut mode = CliMode::Run;
    for arg in args.into_iter().skip(1) {
        match arg.as_str() {
            "--rebuild-manifest" => mode = CliMode::RebuildManifest,
            "--help" | "-h" => mode = CliMode::Help,
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }
    Ok(mode)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let mode = parse_cli_mode(std::env::args())?;
    if mode == CliMode::Help {
        println!("Usage: upt [--rebuild-manifest]");
        println!("  --rebuild-manifest   Record the local tree as synced without uploading");
        println!();
        println!("Environment: UPT_LOCAL_DIR, UPT_TOKEN, UPT_REMOTE_ROOT, UPT_API_URL,");
        println!("             UPT_TIMEOUT_SECS, UPT_CHANGE_DETECTION (size | size-and-mtime)");
        return Ok(());
    }

    upt::logging::init();
    let config = SyncConfig::from_env()?;
    let params = config.connection_params();

    match mode {
        CliMode::RebuildManifest => {
            let client = DiskClient::connect(&params)?;
            let result = rebuild_manifest(
                &client,
                None,
                &config.local_dir,
                &config.remote_root,
                config.sync_options(),
            )
            .await;
            close_store(&client).await;
            result.context("manifest rebuild failed")?;
        }
        CliMode::Run => {
            let changes = update_with_params(
                &params,
                &config.local_dir,
                &config.remote_root,
                config.sync_options(),
            )
            .await
            .with_context(|| {
                format!(
                    "sync of {} to {} failed",
                    config.local_dir.display(),
                    config.remote_root
                )
            })?;
            println!("{changes}");
        }
        CliMode::Help => {}
    }
    Ok(())
}

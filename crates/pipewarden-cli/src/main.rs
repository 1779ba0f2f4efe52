// pipewarden entry point

use anyhow::{Context, Result};
use pipewarden_cli::{logging, output::OutputStyle, runner, RunConfig};

#[tokio::main]
async fn main() {
    match try_main().await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            let style = OutputStyle::default();
            eprintln!("{}", style.error(&format!("{:#}", e)));
            std::process::exit(1);
        }
    }
}

async fn try_main() -> Result<i32> {
    let config = RunConfig::load()
        .map_err(|e| anyhow::anyhow!(e.user_message()))
        .context("Failed to load run configuration")?;

    logging::init_logging(&config.log_level);
    tracing::info!(command = %config.command, "Starting pipewarden");

    let style = OutputStyle::with_colors(config.color);
    let outcome = runner::run(
        &config,
        &style,
        &mut std::io::stdout(),
        &mut std::io::stderr(),
    )
    .await
    .map_err(|e| anyhow::anyhow!(e.user_message()))
    .with_context(|| format!("Failed to run `{}`", config.command))?;

    eprintln!("{}", style.outcome(&outcome));
    Ok(runner::exit_code(&outcome))
}

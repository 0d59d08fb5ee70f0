use tracing_subscriber::{EnvFilter, fmt};
use tracing::info;

use quiver::cli::{self, connectivity::ClientContext};
use quiver::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (flags, cmd) = match cli::parse_args(&args) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("{}\n\n{}", e, cli::usage("quiver"));
            std::process::exit(e.exit_code());
        }
    };

    let mut config = Config::from_env()?;
    flags.apply(&mut config);

    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "quiver",
        "quiver starting: RUST_LOG='{}', api='{}', state='{}', redirect_window_ms={}",
        rust_log, config.api_base, config.state_file.display(), config.redirect_window.as_millis()
    );

    let ctx = ClientContext::connect(config)?;
    match cli::run(&ctx, cmd).await {
        Ok(0) => Ok(()),
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

//! aariv – terminal chat client for the Aariv assistant backend.
//!
//! Startup order:
//! 1. Initialise file-based tracing (the terminal belongs to the TUI).
//! 2. Load the config file and resolve the backend URL.
//! 3. Put the terminal into raw mode and run the event loop.
//! 4. Restore the terminal, even when the loop errors.

use anyhow::Result;
use tracing::info;

mod api;
mod app;
mod config;
mod handler;
mod tui;
mod ui;

use app::App;
use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let config = Config::load().unwrap_or_else(|_| Config::new());
    let mut app = App::new(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        server = %app.api.base_url(),
        "aariv starting"
    );

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();

    let result = run(&mut app, &mut terminal, &mut events).await;

    tui::restore()?;
    info!("aariv stopped");
    result
}

async fn run(app: &mut App, terminal: &mut tui::Tui, events: &mut tui::EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event).await?,
            None => break,
        }
    }
    Ok(())
}

/// Logs go to a file next to the config. Logging failure is not fatal; the
/// app just runs quiet.
fn init_logging() {
    let Ok(path) = Config::log_path() else {
        return;
    };
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let Ok(file) = std::fs::File::options().create(true).append(true).open(&path) else {
        return;
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::sync::Arc::new(file))
        .with_ansi(false)
        .init();
}

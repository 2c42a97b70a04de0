mod cli;
mod content;
mod daemon;
mod selection;

use cli::Cli;
use content::Content;
use daemon::Role;
use selection::state::Timeouts;
use selection::x11::{CLIPBOARD_SELECTION, X11Selection};
use tracing_subscriber::EnvFilter;

fn main() {
    // Wrong argument count is reported by exit code alone.
    let Some(cli) = Cli::from_args(std::env::args_os()) else {
        std::process::exit(1);
    };

    // Silent unless RUST_LOG asks otherwise; the worker runs detached.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("off")),
        )
        .with_writer(std::io::stderr)
        .init();

    let content = match Content::load(&cli.file) {
        Ok(content) => content,
        Err(e) => {
            tracing::error!(error = %e, path = %cli.file.display(), "load failed");
            std::process::exit(1);
        }
    };
    tracing::debug!(bytes = content.len(), empty = content.is_empty(), "content loaded");

    match daemon::detach() {
        Ok(Role::Parent { child }) => {
            tracing::debug!(%child, "worker detached");
            std::process::exit(0);
        }
        Ok(Role::Worker) => {}
        Err(e) => {
            tracing::error!(error = %e, "detach failed");
            std::process::exit(1);
        }
    }

    let mut backend = match X11Selection::connect(CLIPBOARD_SELECTION) {
        Ok(backend) => backend,
        Err(e) => {
            tracing::error!(error = %e, "selection setup failed");
            std::process::exit(1);
        }
    };

    let result = selection::serve(&mut backend, &content, Timeouts::default());
    // Release the ownership window before exiting; `exit` skips drops.
    drop(backend);
    drop(content);

    match result {
        Ok(reason) => tracing::debug!(%reason, "done"),
        Err(e) => {
            tracing::error!(error = %e, "selection failed");
            std::process::exit(1);
        }
    }
}

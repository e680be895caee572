mod api_client; mod history; mod storage; mod ui;

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;
use history::HistoryStore;
use storage::Storage;
use ui::{run_loop, UiEvent};

// Logs go to a file: stderr belongs to the terminal UI.
fn init_logging() -> anyhow::Result<()> {
    let log_path = match directories::ProjectDirs::from("com", "shopscope", "shopscope") {
        Some(proj) => {
            std::fs::create_dir_all(proj.data_dir())?;
            proj.data_dir().join("shopscope.log")
        }
        None => PathBuf::from("shopscope.log"),
    };
    let log_file = OpenOptions::new().append(true).create(true).open(log_path)?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(Arc::new(log_file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    init_logging()?;

    let api_url = std::env::var("SHOPSCOPE_API_URL").unwrap_or("http://127.0.0.1:8000".into());
    let max_pages: u32 = std::env::var("SHOPSCOPE_MAX_PAGES")
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(1);

    let rt = Arc::new(Runtime::new()?);
    let (tx, rx) = mpsc::channel::<UiEvent>();

    // One history store for the whole process, handed to the UI.
    let history = HistoryStore::new(Storage::open_default());

    // Run TUI; searches are spawned on the runtime and report back over tx
    run_loop(rx, history, move |keyword: String| {
        let api_url = api_url.clone();
        let tx = tx.clone();
        rt.spawn(async move {
            match api_client::search_products(&api_url, &keyword, max_pages).await {
                Ok(products) => {
                    let _ = tx.send(UiEvent::Results { keyword, products });
                }
                Err(e) => {
                    let _ = tx.send(UiEvent::SearchFailed { keyword, error: e.to_string() });
                }
            }
        });
    })
}

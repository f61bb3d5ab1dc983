use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use env_logger::{Builder, Env, Target};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use lmdbview::layout::preview;
use lmdbview::scanner::{self, display_key};
use lmdbview::session::{Session, SessionOptions};
use lmdbview::settings::{ConnectionConfig, Settings};
use lmdbview::store::{Connector, KvStore, LmdbConnector, MemoryStore};
use lmdbview::ui::App;
use lmdbview::value::format_for_editing;

#[derive(Parser)]
#[command(name = "lmdbview")]
#[command(about = "A terminal browser for LMDB key/value databases", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to settings file
    #[arg(short = 'c', long)]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the interactive TUI
    Browse,
    /// Launch the TUI over an in-memory sample database
    Demo,
    /// List configured connections
    Connections,
    /// Count the keys carrying a prefix
    Count {
        /// Connection name
        connection: String,
        /// Key prefix (empty counts every key)
        #[arg(short, long, default_value = "")]
        prefix: String,
    },
    /// Print one page of keys and values
    Page {
        /// Connection name
        connection: String,
        /// Key prefix (empty matches every key)
        #[arg(short, long, default_value = "")]
        prefix: String,
        /// Page number, starting at 1
        #[arg(long, default_value_t = 1)]
        page: usize,
        /// Rows per page
        #[arg(long, default_value_t = 20)]
        page_size: usize,
        /// Strip the prefix from displayed keys
        #[arg(long)]
        hide_prefix: bool,
    },
    /// Print the value stored under a key
    Get { connection: String, key: String },
    /// Insert or overwrite a key
    Put {
        connection: String,
        key: String,
        value: String,
    },
    /// Delete a key
    Delete { connection: String, key: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings_path = if let Some(config) = &cli.config {
        PathBuf::from(shellexpand::tilde(config).to_string())
    } else {
        Settings::default_path()
    };

    match cli.command {
        None | Some(Commands::Browse) => {
            init_tui_logging(&settings_path)?;
            let settings = Settings::load(&settings_path).context("Failed to load settings")?;
            let session = Session::new(Box::new(LmdbConnector), SessionOptions::from(&settings.ui))?;

            let mut app = App::new(session, settings, Some(settings_path));
            app.run().await?;
        }
        Some(Commands::Demo) => {
            init_tui_logging(&settings_path)?;
            let settings = Settings {
                connections: vec![demo_connection()],
                ..Settings::default()
            };
            let session =
                Session::new(Box::new(demo_store()), SessionOptions::from(&settings.ui))?;

            let mut app = App::new(session, settings, None);
            app.connect(demo_connection());
            app.run().await?;
        }
        Some(Commands::Connections) => {
            init_cli_logging();
            let settings = Settings::load(&settings_path).context("Failed to load settings")?;
            if settings.connections.is_empty() {
                println!(
                    "No connections configured. Add one from the TUI or in {}",
                    settings_path.display()
                );
            } else {
                println!("{:<20} {:<50} {:>8}", "Name", "Path", "Map (GB)");
                println!("{}", "-".repeat(80));
                for c in &settings.connections {
                    println!("{:<20} {:<50} {:>8}", c.name, c.database_path, c.map_size_gb);
                }
            }
        }
        Some(Commands::Count { connection, prefix }) => {
            init_cli_logging();
            let store = open_connection(&settings_path, &connection)?;

            let mut total = 0;
            store.read(&mut |view| {
                total = scanner::count_matching(view, prefix.as_bytes())?;
                Ok(())
            })?;
            store.close()?;

            println!("{}", total);
        }
        Some(Commands::Page {
            connection,
            prefix,
            page,
            page_size,
            hide_prefix,
        }) => {
            init_cli_logging();
            if page_size == 0 {
                bail!("Page size must be positive");
            }
            let store = open_connection(&settings_path, &connection)?;

            let mut total = 0;
            let mut entries = Vec::new();
            store.read(&mut |view| {
                total = scanner::count_matching(view, prefix.as_bytes())?;
                entries = scanner::fetch_page(view, prefix.as_bytes(), page, page_size)?;
                Ok(())
            })?;
            store.close()?;

            let pages = scanner::total_pages(total, page_size);
            if page < 1 || page > pages {
                bail!("Invalid page number {} (1-{})", page, pages);
            }

            println!("Page {}/{} ({} records)", page, pages, total);
            for entry in &entries {
                println!(
                    "{}\t{}",
                    display_key(&entry.key, &prefix, hide_prefix),
                    preview(&entry.value)
                );
            }
        }
        Some(Commands::Get { connection, key }) => {
            init_cli_logging();
            let store = open_connection(&settings_path, &connection)?;
            let value = store.get(key.as_bytes());
            store.close()?;

            match value? {
                Some(value) => println!("{}", format_for_editing(&value)),
                None => bail!("Key {} not found", key),
            }
        }
        Some(Commands::Put {
            connection,
            key,
            value,
        }) => {
            init_cli_logging();
            if key.is_empty() {
                bail!("Key cannot be empty");
            }
            let store = open_connection(&settings_path, &connection)?;
            let result = store.put(key.as_bytes(), value.as_bytes());
            store.close()?;
            result?;

            println!("Stored {}", key);
        }
        Some(Commands::Delete { connection, key }) => {
            init_cli_logging();
            let store = open_connection(&settings_path, &connection)?;
            let deleted = store.delete(key.as_bytes());
            store.close()?;

            if deleted? {
                println!("Deleted {}", key);
            } else {
                bail!("Key {} not found", key);
            }
        }
    }

    Ok(())
}

fn init_cli_logging() {
    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

/// The TUI owns the terminal, so logs go to a file next to the settings.
fn init_tui_logging(settings_path: &Path) -> Result<()> {
    let log_path = settings_path
        .parent()
        .map(|dir| dir.join("lmdbview.log"))
        .unwrap_or_else(|| PathBuf::from("lmdbview.log"));
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .target(Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

fn open_connection(settings_path: &Path, name: &str) -> Result<Box<dyn KvStore>> {
    let settings = Settings::load(settings_path).context("Failed to load settings")?;
    let Some(config) = settings.find_connection(name) else {
        bail!(
            "No connection named {} in {}",
            name,
            settings_path.display()
        );
    };
    LmdbConnector
        .open(config)
        .with_context(|| format!("Error opening LMDB database {}", config.database_path))
}

fn demo_connection() -> ConnectionConfig {
    ConnectionConfig {
        name: "demo".to_string(),
        database_path: "(in memory)".to_string(),
        map_size_gb: 1,
    }
}

fn demo_store() -> MemoryStore {
    let mut entries: Vec<(String, String)> = Vec::new();

    let names = ["ada", "grace", "alan", "edsger", "barbara", "ken", "dennis"];
    for i in 0..60 {
        let name = names[i % names.len()];
        entries.push((
            format!("users:{:04}", i),
            format!(
                r#"{{"id":{},"name":"{}","email":"{}{}@example.com","active":{}}}"#,
                i,
                name,
                name,
                i,
                i % 3 != 0
            ),
        ));
    }

    for (key, value) in [
        ("config:cache.ttl", "300"),
        ("config:cache.size", "1048576"),
        ("config:feature.search", "enabled"),
        ("config:feature.export", "disabled"),
        ("config:motd", "Welcome!\nMaintenance window is Sunday 02:00-04:00 UTC."),
    ] {
        entries.push((key.to_string(), value.to_string()));
    }

    for i in 0..45 {
        entries.push((
            format!("logs:2024-03-{:02}:{:03}", 1 + i / 15, i),
            format!(
                "request handled in {}ms path=/api/v1/items/{} status=200 {}",
                10 + i * 7,
                i,
                "trace ".repeat(i % 20)
            ),
        ));
    }

    MemoryStore::from_entries(entries)
}

use anyhow::{Context, Result};
use clap::Parser;
use fonoteca_server::document::DocumentDb;
use fonoteca_server::relational::{SqlBackend, SqlIdentity};
use fonoteca_server::server::{run_server, ServerState};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to the SQLite catalog database file.
    #[clap(value_parser = parse_path)]
    pub catalog_db: PathBuf,

    /// Path to the directory holding the document-store collections.
    #[clap(value_parser = parse_path)]
    pub document_store_dir: PathBuf,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// Password assigned to the bootstrapped admin user when no admin
    /// exists yet.
    #[clap(long, default_value = "changeme")]
    pub admin_password: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    info!("Opening SQLite catalog database at {:?}...", cli_args.catalog_db);
    let sql_backend = SqlBackend::open(&cli_args.catalog_db)?;

    info!(
        "Opening document store at {:?}...",
        cli_args.document_store_dir
    );
    let doc_db = Arc::new(DocumentDb::open(&cli_args.document_store_dir)?);

    SqlIdentity::new(sql_backend.clone()).ensure_admin(&cli_args.admin_password)?;
    doc_db.ensure_admin(&cli_args.admin_password)?;

    let state = ServerState::new(sql_backend, doc_db);

    info!("Ready to serve at port {}!", cli_args.port);
    run_server(state, cli_args.port).await
}

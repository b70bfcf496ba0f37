use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use jobtracker::{
    auth::jwt::JwtService,
    client::ApiClient,
    config::AppConfig,
    db,
    geo::{Coordinates, DistanceAnnotator},
    models::{JobStatus, Role},
    realtime::RemoteFeed,
    BoardFilter, BoardMode, BoardSession, DataStore, PgStore,
};

#[derive(Parser, Debug)]
#[command(name = "board")]
#[command(about = "Operate the job board from a terminal")]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print a worker's board
    Jobs {
        #[arg(long)]
        user: Uuid,
        /// `mine` or `all`
        #[arg(long, default_value = "mine")]
        mode: BoardMode,
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Origin latitude; annotates driving distances together with --lng
        #[arg(long, requires = "lng")]
        lat: Option<f64>,
        #[arg(long, requires = "lat")]
        lng: Option<f64>,
    },

    /// Change a job's status as the token's owner
    Status {
        #[arg(long, default_value = "http://127.0.0.1:3000")]
        server: String,
        #[arg(long)]
        token: String,
        #[arg(long)]
        job: Uuid,
        #[arg(long)]
        status: JobStatus,
        /// Assign the worker when they are not on the job yet
        #[arg(long)]
        confirm: bool,
    },

    /// Extract jobs from a text file and optionally save them all
    Import {
        file: PathBuf,
        #[arg(long, default_value = "http://127.0.0.1:3000")]
        server: String,
        /// Admin token; approved jobs are recorded as created by its owner
        #[arg(long)]
        token: String,
        #[arg(long)]
        approve_all: bool,
    },

    /// Follow live job changes from a running server
    Watch {
        #[arg(long, default_value = "http://127.0.0.1:3000")]
        server: String,
        #[arg(long)]
        token: String,
        /// Keep this worker's board in sync and print it after each change
        #[arg(long)]
        user: Option<Uuid>,
    },

    /// Issue an access token
    Token {
        #[arg(long)]
        user: Uuid,
        #[arg(long, default_value = "employee")]
        role: Role,
        #[arg(long)]
        email: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let args = Args::parse();
    let config = AppConfig::from_env()?;

    match args.command {
        Commands::Jobs {
            user,
            mode,
            date,
            lat,
            lng,
        } => {
            let store = open_store(&config)?;
            let mut session =
                BoardSession::open(store.as_ref(), user, BoardFilter { mode, date }).await?;
            if let (Some(lat), Some(lng)) = (lat, lng) {
                let annotator = DistanceAnnotator::from_config(http_client(&config)?, &config.geo);
                session.annotate(&annotator, Coordinates::new(lat, lng)).await;
            }
            print_json(&session.jobs())?;
        }
        Commands::Status {
            server,
            token,
            job,
            status,
            confirm,
        } => {
            let api = ApiClient::new(http_client(&config)?, &server, token);
            let outcome = api.set_status(job, status, confirm).await?;
            print_json(&outcome)?;
        }
        Commands::Import {
            file,
            server,
            token,
            approve_all,
        } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            if text.trim().is_empty() {
                bail!("{} is empty", file.display());
            }
            let api = ApiClient::new(http_client(&config)?, &server, token);
            let batch = api.extract(&text, "file").await?;
            tracing::info!(batch_id = %batch.batch_id, count = batch.count, "jobs extracted");

            if approve_all && !batch.drafts.is_empty() {
                let jobs = batch.drafts.into_iter().map(|draft| draft.fields).collect();
                print_json(&api.approve_all(jobs).await?)?;
            } else {
                print_json(&batch.drafts)?;
            }
        }
        Commands::Watch {
            server,
            token,
            user,
        } => {
            let mut board = match user {
                Some(user) => {
                    let store = open_store(&config)?;
                    let session =
                        BoardSession::open(store.as_ref(), user, BoardFilter::default()).await?;
                    Some((store, session))
                }
                None => None,
            };

            let feed = RemoteFeed::new(http_client(&config)?, &server, token);
            let mut changes = feed.connect().await?;
            tracing::info!(server = %server, "watching job changes");
            while let Some(change) = changes.next().await? {
                print_json(&change)?;
                if let Some((store, session)) = board.as_mut() {
                    let action = session.sync(&change, store.as_ref()).await?;
                    tracing::info!(job_id = %change.job_id(), ?action, "board synced");
                    print_json(&session.jobs())?;
                }
            }
            tracing::info!("change stream closed");
        }
        Commands::Token { user, role, email } => {
            let jwt = JwtService::from_config(&config)?;
            println!("{}", jwt.generate_token(user, email.as_deref(), role)?);
        }
    }

    Ok(())
}

fn open_store(config: &AppConfig) -> Result<Arc<dyn DataStore>> {
    let pool = db::init_pool_with_size(&config.database_url, 2)?;
    Ok(Arc::new(PgStore::new(pool)))
}

fn http_client(config: &AppConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(config.geo.geocoder_user_agent.clone())
        .build()
        .context("failed to build HTTP client")
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr)
        .init();
}

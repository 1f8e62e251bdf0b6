use clap::{Parser, Subcommand};
use meme_sync::{
    aws_clients::AwsServices,
    config::Config,
    describe::DescriptionGenerator,
    domain::{FileStorage, MemeRepository},
    drivers::{run_sync, DescriptionBackfill, LocalUpload, StorageIndex, UrlDownload},
    errors::AppError,
    fetch::HttpFetcher,
    inspect,
    openai::OpenAiTextGenerator,
    pacing::Pacer,
    reconciler::{run_batch, BatchSummary},
    startup,
};
use std::{path::PathBuf, process::ExitCode, sync::Arc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Batch jobs keeping a meme folder, bucket and table in step
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload local images missing from the bucket and insert a row for each
    Upload {
        /// Directory to read images from
        #[arg(long, env = "MEMES_INPUT_DIR")]
        dir: Option<PathBuf>,
        /// Generate descriptions for the new rows immediately
        #[arg(long)]
        describe: bool,
    },
    /// Insert a described row for every bucket object without one
    Index,
    /// Generate descriptions for rows that have none
    Backfill,
    /// Backfill descriptions, then index new bucket objects
    Sync,
    /// Download listed URLs missing from the output directory
    Download {
        /// Newline-separated URL list
        #[arg(long, env = "MEMES_URL_LIST")]
        urls: Option<PathBuf>,
        /// Output directory
        #[arg(long, env = "MEMES_OUTPUT_DIR")]
        out: Option<PathBuf>,
    },
    /// List the buckets visible to the configured credentials
    Buckets,
    /// Upload a single file to check the storage path
    Probe {
        file: PathBuf,
        #[arg(long, default_value = "test.jpg")]
        key: String,
    },
    /// Create the table and bucket if they are missing
    Provision,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "meme_sync=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match dotenvy::dotenv() {
        Ok(path) => tracing::info!(".env file loaded from path: {}", path.display()),
        Err(_) => tracing::info!(".env file not found, relying on environment variables"),
    };

    let cli = Cli::parse();
    match run(cli.command).await {
        Ok(Some(summary)) if !summary.is_clean() => {
            tracing::warn!(failed_keys = ?summary.failed_keys, "Batch finished with failures: {}", summary);
            ExitCode::from(2)
        }
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Run aborted");
            ExitCode::FAILURE
        }
    }
}

fn describer(config: &Config) -> Result<DescriptionGenerator, AppError> {
    let generator = OpenAiTextGenerator::new(&config.openai)?;
    Ok(DescriptionGenerator::new(Arc::new(generator)))
}

async fn run(command: Command) -> Result<Option<BatchSummary>, AppError> {
    let config = Config::load()?;
    tracing::debug!(?config, "Configuration loaded");
    let mut pacer = Pacer::new(config.action_delay, config.max_action_delay);

    let summary = match command {
        Command::Upload { dir, describe } => {
            let aws = AwsServices::connect(&config).await;
            let storage: Arc<dyn FileStorage> = aws.storage;
            let repo: Arc<dyn MemeRepository> = aws.repo;
            let mut job = LocalUpload::new(dir.unwrap_or_else(|| config.input_dir.clone()), storage, repo);
            if describe {
                job = job.with_describer(describer(&config)?);
            }
            run_batch(&job, &mut pacer).await?
        }
        Command::Index => {
            let describer = describer(&config)?;
            let aws = AwsServices::connect(&config).await;
            let job = StorageIndex::new(aws.storage, aws.repo, describer);
            run_batch(&job, &mut pacer).await?
        }
        Command::Backfill => {
            let describer = describer(&config)?;
            let aws = AwsServices::connect(&config).await;
            let job = DescriptionBackfill::new(aws.repo, describer);
            run_batch(&job, &mut pacer).await?
        }
        Command::Sync => {
            let describer = describer(&config)?;
            let aws = AwsServices::connect(&config).await;
            let backfill = DescriptionBackfill::new(aws.repo.clone(), describer.clone());
            let index = StorageIndex::new(aws.storage, aws.repo, describer);
            run_sync(&backfill, &index, &mut pacer).await?
        }
        Command::Download { urls, out } => {
            let fetcher = HttpFetcher::new(config.download_timeout)
                .map_err(|e| AppError::InitError(format!("Failed to build HTTP client: {}", e)))?;
            let job = UrlDownload::new(
                urls.unwrap_or_else(|| config.url_list.clone()),
                out.unwrap_or_else(|| config.output_dir.clone()),
                Arc::new(fetcher),
            );
            run_batch(&job, &mut pacer).await?
        }
        Command::Buckets => {
            let aws = AwsServices::connect(&config).await;
            let buckets = inspect::list_buckets(&aws.s3_client).await?;
            tracing::info!("Available buckets: {}", buckets.len());
            for bucket in buckets {
                println!("- {}", bucket);
            }
            return Ok(None);
        }
        Command::Probe { file, key } => {
            let aws = AwsServices::connect(&config).await;
            let url = inspect::probe_upload(aws.storage.as_ref(), &file, &key).await?;
            println!("{}", url);
            return Ok(None);
        }
        Command::Provision => {
            let aws = AwsServices::connect(&config).await;
            startup::provision(
                &aws.db_client,
                &aws.s3_client,
                &config.memes_table,
                &config.meme_bucket_name,
                &config.aws_region,
            )
            .await?;
            return Ok(None);
        }
    };

    Ok(Some(summary))
}

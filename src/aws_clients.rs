use crate::{
    config::Config,
    repositories::DynamoDbMemeRepository,
    storage::{public_url_base, S3FileStorage},
};
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_dynamodb::Client as DynamoDbClient;
use aws_sdk_s3::Client as S3Client;
use std::sync::Arc;
use tracing;

/// Raw clients plus the adapters the batch jobs run against.
pub struct AwsServices {
    pub storage: Arc<S3FileStorage>,
    pub repo: Arc<DynamoDbMemeRepository>,
    pub s3_client: S3Client,
    pub db_client: DynamoDbClient,
}

impl AwsServices {
    /// Resolves credentials through the default provider chain and wires both adapters.
    pub async fn connect(config: &Config) -> Self {
        let sdk_config = load_sdk_config(&config.aws_region, config.localstack_endpoint.as_deref()).await;

        // Path-style addressing: S3-compatible endpoints rarely resolve bucket subdomains.
        let s3_client = S3Client::from_conf(
            aws_sdk_s3::config::Builder::from(&sdk_config)
                .force_path_style(true)
                .build(),
        );
        let db_client = DynamoDbClient::new(&sdk_config);

        let url_base = public_url_base(
            config.public_url_base.as_deref(),
            config.localstack_endpoint.as_deref(),
            &config.aws_region,
            &config.meme_bucket_name,
        );
        AwsServices {
            storage: Arc::new(S3FileStorage::new(
                s3_client.clone(),
                config.meme_bucket_name.clone(),
                url_base,
            )),
            repo: Arc::new(DynamoDbMemeRepository::new(db_client.clone(), config.memes_table.clone())),
            s3_client,
            db_client,
        }
    }
}

async fn load_sdk_config(region: &str, endpoint: Option<&str>) -> SdkConfig {
    let loader = aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.to_string()));
    let loader = match endpoint {
        Some(endpoint_url) => {
            tracing::info!(sdk_region = %region, %endpoint_url, "AWS: Using endpoint override");
            loader.endpoint_url(endpoint_url)
        }
        None => {
            tracing::info!(sdk_region = %region, "AWS: Using default endpoints");
            loader
        }
    };
    loader.load().await
}

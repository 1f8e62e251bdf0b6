use crate::errors::AppError;
use aws_sdk_dynamodb::{
    error::SdkError as DynamoSdkError,
    types::{AttributeDefinition, BillingMode, KeySchemaElement, KeyType, ScalarAttributeType},
    Client as DynamoDbClient,
};
use aws_sdk_s3::{
    error::SdkError as S3SdkError,
    types::{BucketLocationConstraint, CreateBucketConfiguration},
    Client as S3Client,
};
use std::fmt;
use tracing;

/// S3 error codes meaning the bucket is already there.
const BUCKET_EXISTS_CODES: [&str; 2] = ["BucketAlreadyOwnedByYou", "BucketAlreadyExists"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisioned {
    Created,
    AlreadyPresent,
}

impl fmt::Display for Provisioned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provisioned::Created => f.write_str("created"),
            Provisioned::AlreadyPresent => f.write_str("already present"),
        }
    }
}

/// Table keyed on the string attribute `id`, billed per request.
async fn ensure_table(client: &DynamoDbClient, table_name: &str) -> Result<Provisioned, AppError> {
    let id_attribute = AttributeDefinition::builder()
        .attribute_name("id")
        .attribute_type(ScalarAttributeType::S)
        .build()?;
    let id_key = KeySchemaElement::builder()
        .attribute_name("id")
        .key_type(KeyType::Hash)
        .build()?;

    client
        .create_table()
        .table_name(table_name)
        .attribute_definitions(id_attribute)
        .key_schema(id_key)
        .billing_mode(BillingMode::PayPerRequest)
        .send()
        .await
        .map(|_| Provisioned::Created)
        .or_else(|sdk_err| match &sdk_err {
            DynamoSdkError::ServiceError(service_err) if service_err.err().is_resource_in_use_exception() => {
                Ok(Provisioned::AlreadyPresent)
            }
            _ => Err(AppError::InitError(format!(
                "Provision: cannot create table '{}': {}",
                table_name, sdk_err
            ))),
        })
}

/// us-east-1 rejects an explicit location constraint, every other region needs one.
async fn ensure_bucket(client: &S3Client, bucket_name: &str, region: &str) -> Result<Provisioned, AppError> {
    let location = (region != "us-east-1").then(|| {
        CreateBucketConfiguration::builder()
            .location_constraint(BucketLocationConstraint::from(region))
            .build()
    });

    client
        .create_bucket()
        .bucket(bucket_name)
        .set_create_bucket_configuration(location)
        .send()
        .await
        .map(|_| Provisioned::Created)
        .or_else(|sdk_err| {
            let code = match &sdk_err {
                S3SdkError::ServiceError(service_err) => service_err.err().meta().code(),
                _ => None,
            };
            if code.is_some_and(|c| BUCKET_EXISTS_CODES.contains(&c)) {
                Ok(Provisioned::AlreadyPresent)
            } else {
                Err(AppError::InitError(format!(
                    "Provision: cannot create bucket '{}': {}",
                    bucket_name, sdk_err
                )))
            }
        })
}

/// Creates the table and bucket the batch jobs expect (LocalStack development).
pub async fn provision(
    db_client: &DynamoDbClient,
    s3_client: &S3Client,
    table_name: &str,
    bucket_name: &str,
    region: &str,
) -> Result<(), AppError> {
    let table = ensure_table(db_client, table_name)
        .await
        .inspect_err(|e| tracing::error!(error = %e, "Provision failed"))?;
    tracing::info!(%table_name, "Provision: table {}", table);

    let bucket = ensure_bucket(s3_client, bucket_name, region)
        .await
        .inspect_err(|e| tracing::error!(error = %e, "Provision failed"))?;
    tracing::info!(%bucket_name, "Provision: bucket {}", bucket);
    Ok(())
}

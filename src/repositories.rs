use crate::{
    domain::MemeRepository,
    errors::RepoError,
    models::{MemePatch, MemeRecord, RecordFilter},
};
use anyhow::Context;
use async_trait::async_trait;
use aws_sdk_dynamodb::{
    error::SdkError,
    operation::scan::builders::ScanFluentBuilder,
    types::AttributeValue,
    Client as DynamoDbClient,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::collections::HashMap;
use tracing::{self, info};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct DynamoDbMemeRepository {
    client: DynamoDbClient,
    table_name: String, // Store the table name
}

impl DynamoDbMemeRepository {
    /// Creates a new repository instance configured for a specific table.
    pub fn new(client: DynamoDbClient, table_name: String) -> Self {
        info!(%table_name, "Initializing DynamoDbMemeRepository");
        Self { client, table_name }
    }

    fn scan_request(&self, filter: &RecordFilter) -> ScanFluentBuilder {
        let request = self.client.scan().table_name(&self.table_name);
        match filter {
            RecordFilter::All => request,
            RecordFilter::MissingDescription => request
                .filter_expression("attribute_not_exists(description) OR description = :empty OR attribute_type(description, :null)")
                .expression_attribute_values(":empty", AttributeValue::S(String::new()))
                .expression_attribute_values(":null", AttributeValue::S("NULL".to_string())),
        }
    }
}

#[async_trait]
impl MemeRepository for DynamoDbMemeRepository {
    /// Stores a record with PutItem, refusing to overwrite an existing id.
    async fn insert(&self, record: &MemeRecord) -> Result<(), RepoError> {
        let result = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(record_to_item(record)))
            .condition_expression("attribute_not_exists(id)")
            .send()
            .await;

        match result {
            Ok(_) => {
                tracing::debug!(meme_id = %record.id, name = %record.name, table_name = %self.table_name, "DynamoDB: Row inserted");
                Ok(())
            }
            Err(SdkError::ServiceError(service_err))
                if service_err.err().is_conditional_check_failed_exception() =>
            {
                Err(RepoError::Duplicate(record.id))
            }
            Err(e) => Err(RepoError::BackendError(anyhow::Error::new(e).context(format!(
                "DynamoDB (table: {}): Failed to put meme (id: {})",
                self.table_name, record.id
            )))),
        }
    }

    /// Scans the table for matching rows. Handles pagination.
    async fn select(&self, filter: &RecordFilter) -> Result<Vec<MemeRecord>, RepoError> {
        tracing::debug!(?filter, "DynamoDB: Scanning table '{}'", self.table_name);
        let mut records: Vec<MemeRecord> = Vec::new();
        let mut last_evaluated_key: Option<HashMap<String, AttributeValue>> = None;

        loop {
            let resp = self
                .scan_request(filter)
                .set_exclusive_start_key(last_evaluated_key.take())
                .send()
                .await
                .context(format!("DynamoDB: Failed to scan table '{}'", self.table_name))?;

            for item in resp.items() {
                match item_to_record(item) {
                    Some(record) => records.push(record),
                    None => {
                        let item_id = item.get("id").and_then(|v| v.as_s().ok());
                        tracing::error!(item.id = ?item_id, table_name = %self.table_name, "DynamoDB: Failed to parse item from scan into MemeRecord");
                        return Err(RepoError::DataCorruption(format!(
                            "DynamoDB: Failed to parse item {:?} during scan of table '{}'",
                            item_id, self.table_name
                        )));
                    }
                }
            }

            last_evaluated_key = resp.last_evaluated_key;
            if last_evaluated_key.is_none() {
                break;
            }
            tracing::debug!("DynamoDB Scan (table: {}): Continuing with LastEvaluatedKey...", self.table_name);
        }

        // Server-side expressions cannot see whitespace-only descriptions.
        records.retain(|record| filter.matches(record));
        tracing::info!("DynamoDB (table: {}): Selected {} rows", self.table_name, records.len());
        Ok(records)
    }

    /// Applies a patch with UpdateItem. The row must already exist.
    async fn update(&self, id: Uuid, patch: &MemePatch) -> Result<(), RepoError> {
        let Some(description) = &patch.description else {
            tracing::debug!(meme_id = %id, "DynamoDB: Empty patch, nothing to update");
            return Ok(());
        };

        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("id", AttributeValue::S(id.to_string()))
            .update_expression("SET description = :description")
            .condition_expression("attribute_exists(id)")
            .expression_attribute_values(":description", AttributeValue::S(description.clone()))
            .send()
            .await;

        match result {
            Ok(_) => {
                tracing::debug!(meme_id = %id, table_name = %self.table_name, "DynamoDB: Row updated");
                Ok(())
            }
            Err(SdkError::ServiceError(service_err))
                if service_err.err().is_conditional_check_failed_exception() =>
            {
                Err(RepoError::NotFound(id))
            }
            Err(e) => Err(RepoError::BackendError(anyhow::Error::new(e).context(format!(
                "DynamoDB (table: {}): Failed to update meme (id: {})",
                self.table_name, id
            )))),
        }
    }
}

fn record_to_item(record: &MemeRecord) -> HashMap<String, AttributeValue> {
    let mut item = HashMap::from([
        ("id".to_string(), AttributeValue::S(record.id.to_string())),
        ("name".to_string(), AttributeValue::S(record.name.clone())),
        ("file_name".to_string(), AttributeValue::S(record.file_name.clone())),
        ("extension".to_string(), AttributeValue::S(record.extension.clone())),
        ("storage_path".to_string(), AttributeValue::S(record.storage_path.clone())),
        ("mime_type".to_string(), AttributeValue::S(record.mime_type.clone())),
        ("public_url".to_string(), AttributeValue::S(record.public_url.clone())),
        ("created_at".to_string(), AttributeValue::S(record.created_at.to_rfc3339())),
    ]);
    if let Some(description) = &record.description {
        item.insert("description".to_string(), AttributeValue::S(description.clone()));
    }
    item
}

/// RFC 3339, or an offset-less ISO 8601 timestamp taken as UTC.
fn parse_created_at(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|t| t.and_utc())
        })
}

// Rows written by older tooling may lack the file columns and carry naive
// timestamps; only id, name and created_at are mandatory.
fn item_to_record(item: &HashMap<String, AttributeValue>) -> Option<MemeRecord> {
    let string_attr = |name: &str| item.get(name).and_then(|v| v.as_s().ok()).cloned();

    let id = Uuid::parse_str(item.get("id")?.as_s().ok()?).ok()?;
    let name = string_attr("name")?;
    let created_at = parse_created_at(item.get("created_at")?.as_s().ok()?)?;
    let file_name = string_attr("file_name").unwrap_or_default();
    let storage_path = string_attr("storage_path").unwrap_or_else(|| file_name.clone());

    Some(MemeRecord {
        id,
        name,
        extension: string_attr("extension").unwrap_or_default(),
        mime_type: string_attr("mime_type").unwrap_or_default(),
        public_url: string_attr("public_url")
            .or_else(|| string_attr("url"))
            .unwrap_or_default(),
        description: string_attr("description"),
        created_at,
        file_name,
        storage_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn items_round_trip_through_the_table_layout() {
        let record = MemeRecord::new("Doge.jpg", "https://cdn/memes/Doge.jpg".into(), None);
        let item = record_to_item(&record);
        assert!(!item.contains_key("description"));
        assert_eq!(item.get("id").and_then(|v| v.as_s().ok()), Some(&record.id.to_string()));

        let parsed = item_to_record(&item).expect("item should parse");
        assert_eq!(parsed, record);
    }

    #[test]
    fn legacy_rows_without_file_columns_still_parse() {
        let item = HashMap::from([
            ("id".to_string(), AttributeValue::S(Uuid::new_v4().to_string())),
            ("name".to_string(), AttributeValue::S("Doge".into())),
            ("created_at".to_string(), AttributeValue::S("2024-03-01T12:00:00.123456".into())),
            ("url".to_string(), AttributeValue::S("https://cdn/memes/Doge.jpg".into())),
            ("description".to_string(), AttributeValue::S(String::new())),
        ]);
        let record = item_to_record(&item).expect("legacy item should parse");
        assert_eq!(record.public_url, "https://cdn/memes/Doge.jpg");
        assert_eq!(record.storage_path, "");
        assert!(!record.has_description());
        assert_eq!(record.created_at.to_rfc3339(), "2024-03-01T12:00:00.123456+00:00");
    }

    #[test]
    fn timestamps_parse_with_or_without_offset() {
        let expected = "2024-03-01T12:00:00+00:00";
        for raw in ["2024-03-01T12:00:00Z", "2024-03-01T13:00:00+01:00", "2024-03-01T12:00:00"] {
            let parsed = parse_created_at(raw).expect("timestamp should parse");
            assert_eq!(parsed.to_rfc3339(), expected, "{raw}");
        }
        assert!(parse_created_at("yesterday").is_none());
    }

    #[test]
    fn items_without_valid_id_are_rejected() {
        let item = HashMap::from([
            ("id".to_string(), AttributeValue::S("not-a-uuid".into())),
            ("name".to_string(), AttributeValue::S("Doge".into())),
            ("created_at".to_string(), AttributeValue::S("2024-03-01T12:00:00+00:00".into())),
        ]);
        assert!(item_to_record(&item).is_none());
    }
}

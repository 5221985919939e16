//! S3-compatible implementation of [`ObjectStore`] (AWS S3, Minio, etc.)

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketLifecycleConfiguration, ExpirationStatus, LifecycleRule, LifecycleRuleFilter, Transition, TransitionStorageClass,
};
use bytes::Bytes;

use crate::config::{StorageConfig, TargetStorageClass};
use crate::storage::{LifecyclePolicy, ObjectStore, StorageError, StorageResult};

/// Object store backed by an S3 bucket.
///
/// Holds a shared SDK client handle; cloning the handle is cheap and the
/// store carries no request-scoped state, so a single instance is shared
/// across all requests.
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Create from an existing AWS SDK client
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Create from storage configuration, building the SDK client.
    ///
    /// Credentials come from `access_key_id`/`secret_access_key` when set in
    /// the config, otherwise from the ambient AWS credential chain
    /// (environment, profile, instance metadata). An `endpoint_url` override
    /// switches to path-style addressing for S3-compatible services.
    pub async fn from_config(config: &StorageConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region.clone()));

        if let (Some(access_key), Some(secret_key)) = (&config.access_key_id, &config.secret_access_key) {
            loader = loader.credentials_provider(Credentials::new(access_key, secret_key, None, None, "icebox-config"));
        }

        let shared_config = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared_config);

        if let Some(endpoint) = &config.endpoint_url {
            // Path-style is required for Minio and most S3-compatible services
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self::new(Client::from_conf(builder.build()), &config.bucket)
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_object(&self, key: &str, data: Bytes) -> StorageResult<()> {
        let size = data.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| StorageError::Upload {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        tracing::info!(bucket = %self.bucket, key = %key, size_bytes = size, "Uploaded object");
        Ok(())
    }

    async fn apply_lifecycle(&self, key: &str, policy: &LifecyclePolicy) -> StorageResult<()> {
        // The lifecycle API replaces the bucket's whole configuration, so
        // read the current rules first and splice ours in. A bucket with no
        // configuration yet reports NoSuchLifecycleConfiguration.
        let existing = match self.client.get_bucket_lifecycle_configuration().bucket(&self.bucket).send().await {
            Ok(output) => output.rules.unwrap_or_default(),
            Err(e) if e.code() == Some("NoSuchLifecycleConfiguration") => Vec::new(),
            Err(e) => {
                return Err(StorageError::Lifecycle {
                    key: key.to_string(),
                    message: e.to_string(),
                });
            }
        };

        let rule = transition_rule(key, policy).map_err(|e| StorageError::Lifecycle {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        let rules = merge_rules(existing, rule);

        if rules.len() >= RULE_COUNT_WARN_THRESHOLD {
            tracing::warn!(
                bucket = %self.bucket,
                rule_count = rules.len(),
                "Bucket lifecycle configuration is nearing the 1000-rule cap; uploads will fail once it is reached"
            );
        }

        let configuration = BucketLifecycleConfiguration::builder()
            .set_rules(Some(rules))
            .build()
            .map_err(|e| StorageError::Lifecycle {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        self.client
            .put_bucket_lifecycle_configuration()
            .bucket(&self.bucket)
            .lifecycle_configuration(configuration)
            .send()
            .await
            .map_err(|e| StorageError::Lifecycle {
                key: key.to_string(),
                message: e.to_string(),
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            transition_days = policy.transition_days,
            target_class = ?policy.target_class,
            "Applied lifecycle transition rule"
        );
        Ok(())
    }
}

/// S3 caps lifecycle configurations at 1000 rules per bucket. Warn well
/// before that, since each distinct filename claims one rule slot.
const RULE_COUNT_WARN_THRESHOLD: usize = 900;

/// Lifecycle rule id for a given object key. One rule per key; re-uploading
/// the same key replaces its rule rather than accumulating duplicates.
fn rule_id(key: &str) -> String {
    format!("icebox-transition-{key}")
}

fn transition_storage_class(target: TargetStorageClass) -> TransitionStorageClass {
    match target {
        TargetStorageClass::Glacier => TransitionStorageClass::Glacier,
        TargetStorageClass::GlacierIr => TransitionStorageClass::GlacierIr,
        TargetStorageClass::DeepArchive => TransitionStorageClass::DeepArchive,
    }
}

/// Build the lifecycle rule requesting the transition for a single key.
///
/// S3 lifecycle filters only support prefix matching, not exact keys, so the
/// rule also covers any longer key sharing the filename as a prefix
/// (`data.csv` matches `data.csv.bak`). Distinct filenames each hold one of
/// the bucket's 1000 rule slots until removed out of band.
fn transition_rule(key: &str, policy: &LifecyclePolicy) -> Result<LifecycleRule, aws_sdk_s3::error::BuildError> {
    LifecycleRule::builder()
        .id(rule_id(key))
        .filter(LifecycleRuleFilter::builder().prefix(key).build())
        .status(ExpirationStatus::Enabled)
        .transitions(
            Transition::builder()
                .days(policy.transition_days)
                .storage_class(transition_storage_class(policy.target_class))
                .build(),
        )
        .build()
}

/// Replace any rule with the same id, keeping all other rules intact.
fn merge_rules(existing: Vec<LifecycleRule>, rule: LifecycleRule) -> Vec<LifecycleRule> {
    let mut rules: Vec<LifecycleRule> = existing.into_iter().filter(|r| r.id() != rule.id()).collect();
    rules.push(rule);
    rules
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(days: i32) -> LifecyclePolicy {
        LifecyclePolicy {
            transition_days: days,
            target_class: TargetStorageClass::Glacier,
        }
    }

    #[test]
    fn test_transition_rule_targets_single_key() {
        let rule = transition_rule("data.csv", &policy(30)).unwrap();

        assert_eq!(rule.id(), Some("icebox-transition-data.csv"));
        assert_eq!(rule.status(), &ExpirationStatus::Enabled);
        assert_eq!(rule.filter().and_then(|f| f.prefix()), Some("data.csv"));

        let transition = &rule.transitions()[0];
        assert_eq!(transition.days(), Some(30));
        assert_eq!(transition.storage_class(), Some(&TransitionStorageClass::Glacier));
    }

    #[test]
    fn test_merge_rules_replaces_same_key_rule() {
        let first = transition_rule("data.csv", &policy(30)).unwrap();
        let other = transition_rule("other.csv", &policy(30)).unwrap();

        let updated = transition_rule("data.csv", &policy(7)).unwrap();
        let merged = merge_rules(vec![first, other], updated);

        assert_eq!(merged.len(), 2);
        let data_rules: Vec<_> = merged.iter().filter(|r| r.id() == Some("icebox-transition-data.csv")).collect();
        assert_eq!(data_rules.len(), 1);
        assert_eq!(data_rules[0].transitions()[0].days(), Some(7));
    }

    #[test]
    fn test_merge_rules_holds_one_slot_per_distinct_key() {
        let mut rules = Vec::new();
        for i in 0..5 {
            rules = merge_rules(rules, transition_rule(&format!("file-{i}.csv"), &policy(30)).unwrap());
        }
        assert_eq!(rules.len(), 5);

        // Re-uploading an existing filename replaces its rule instead of
        // consuming another of the bucket's rule slots
        rules = merge_rules(rules, transition_rule("file-0.csv", &policy(7)).unwrap());
        assert_eq!(rules.len(), 5);
    }

    #[test]
    fn test_storage_class_mapping() {
        assert_eq!(
            transition_storage_class(TargetStorageClass::DeepArchive),
            TransitionStorageClass::DeepArchive
        );
        assert_eq!(transition_storage_class(TargetStorageClass::GlacierIr), TransitionStorageClass::GlacierIr);
    }
}

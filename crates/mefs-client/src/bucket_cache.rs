//! In-memory bucket to region map

use crate::error::ErrorResponse;
use crate::retry::is_region_error;
use crate::Result;
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::HashMap;

/// Region assumed when nothing better is known
pub const DEFAULT_REGION: &str = "us-east-1";

/// Remembers which region each bucket lives in.
///
/// Shared by every clone of a client; readers never block each other.
#[derive(Debug, Default)]
pub struct BucketLocationCache {
    items: RwLock<HashMap<String, String>>,
}

impl BucketLocationCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached region of a bucket
    pub fn get(&self, bucket: &str) -> Option<String> {
        self.items.read().get(bucket).cloned()
    }

    /// Record the region of a bucket, replacing any previous value
    pub fn set(&self, bucket: impl Into<String>, region: impl Into<String>) {
        self.items.write().insert(bucket.into(), region.into());
    }

    /// Forget a bucket
    pub fn delete(&self, bucket: &str) {
        self.items.write().remove(bucket);
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

/// Region carried by a region-mismatch error, if any.
///
/// `AccessDenied` without a hint may come from an anonymous request, so it
/// resolves to the default region rather than failing.
pub fn location_from_error(err: &ErrorResponse) -> Option<String> {
    if !is_region_error(&err.code) {
        return None;
    }
    if err.region.is_empty() {
        Some(DEFAULT_REGION.to_string())
    } else {
        Some(err.region.clone())
    }
}

#[derive(Debug, Deserialize)]
struct LocationConstraint {
    #[serde(rename = "$text", default)]
    value: String,
}

/// Parse a `<LocationConstraint>` document into a region name
pub fn parse_location_constraint(xml: &str) -> Result<String> {
    let location = if xml.trim().is_empty() {
        String::new()
    } else {
        quick_xml::de::from_str::<LocationConstraint>(xml)?.value
    };
    Ok(match location.trim() {
        "" => DEFAULT_REGION.to_string(),
        "EU" => "eu-west-1".to_string(),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;

    #[test]
    fn test_get_set_delete() {
        let cache = BucketLocationCache::new();
        assert_eq!(cache.get("photos"), None);

        cache.set("photos", "eu-west-1");
        assert_eq!(cache.get("photos").as_deref(), Some("eu-west-1"));

        cache.set("photos", "us-west-2");
        assert_eq!(cache.get("photos").as_deref(), Some("us-west-2"));

        cache.delete("photos");
        assert_eq!(cache.get("photos"), None);
        cache.delete("photos");
    }

    #[test]
    fn test_parse_location_constraint() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<LocationConstraint xmlns="http://s3.amazonaws.com/doc/2006-03-01/">ap-south-1</LocationConstraint>"#;
        assert_eq!(parse_location_constraint(xml).unwrap(), "ap-south-1");
        assert_eq!(
            parse_location_constraint("<LocationConstraint></LocationConstraint>").unwrap(),
            DEFAULT_REGION
        );
        assert_eq!(
            parse_location_constraint("<LocationConstraint>EU</LocationConstraint>").unwrap(),
            "eu-west-1"
        );
        assert_eq!(parse_location_constraint("").unwrap(), DEFAULT_REGION);
    }

    #[test]
    fn test_location_from_error() {
        let mut err = ErrorResponse {
            code: "AuthorizationHeaderMalformed".into(),
            region: "eu-central-1".into(),
            ..Default::default()
        };
        assert_eq!(location_from_error(&err).as_deref(), Some("eu-central-1"));

        err.code = "AccessDenied".into();
        err.region.clear();
        assert_eq!(location_from_error(&err).as_deref(), Some(DEFAULT_REGION));

        err.code = "NoSuchBucket".into();
        assert_eq!(location_from_error(&err), None);
    }

    #[test]
    fn test_concurrent_readers_and_writers() {
        let cache = Arc::new(BucketLocationCache::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for j in 0..200 {
                        let bucket = format!("bucket-{}", j % 10);
                        if i % 2 == 0 {
                            cache.set(bucket, format!("region-{}", i));
                        } else if let Some(region) = cache.get(&bucket) {
                            assert!(region.starts_with("region-"));
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        for j in 0..10 {
            assert!(cache.get(&format!("bucket-{}", j)).is_some());
        }
    }

    proptest! {
        #[test]
        fn prop_set_is_idempotent(bucket in "[a-z0-9-]{3,20}", region in "[a-z0-9-]{1,16}") {
            let cache = BucketLocationCache::new();
            cache.set(bucket.clone(), region.clone());
            let once = cache.get(&bucket);
            cache.set(bucket.clone(), region.clone());
            prop_assert_eq!(once, cache.get(&bucket));
            prop_assert_eq!(cache.get(&bucket), Some(region));
        }

        #[test]
        fn prop_delete_removes(bucket in "[a-z0-9-]{3,20}", region in "[a-z0-9-]{1,16}") {
            let cache = BucketLocationCache::new();
            cache.set(bucket.clone(), region);
            cache.delete(&bucket);
            prop_assert_eq!(cache.get(&bucket), None);
        }
    }
}

//! Bucket region lookup

use crate::bucket_cache::{location_from_error, parse_location_constraint};
use crate::context::Context;
use crate::metadata::RequestMetadata;
use crate::s3utils::check_valid_bucket_name;
use crate::{Client, ClientError, Result};
use reqwest::Method;
use tracing::{debug, instrument};

impl Client {
    /// Region a bucket lives in.
    ///
    /// A configured region wins; otherwise the cache is consulted before
    /// asking the gateway, and the answer is cached.
    #[instrument(skip(self))]
    pub async fn get_bucket_location(&self, bucket: &str) -> Result<String> {
        check_valid_bucket_name(bucket)?;
        if let Some(region) = &self.config.region {
            return Ok(region.clone());
        }
        if let Some(region) = self.location_cache.get(bucket) {
            return Ok(region);
        }

        let metadata = RequestMetadata::new().bucket(bucket).query("location", "");
        let location = match self.execute(&Context::background(), Method::GET, metadata).await {
            Ok(resp) => parse_location_constraint(&resp.text().await?)?,
            Err(ClientError::Gateway(err)) => match location_from_error(&err) {
                Some(region) => region,
                None => return Err(ClientError::Gateway(err)),
            },
            Err(e) => return Err(e),
        };

        debug!(%location, "caching bucket location");
        self.location_cache.set(bucket, location.clone());
        Ok(location)
    }
}

#[cfg(test)]
mod tests {
    use crate::credentials::Credentials;
    use crate::{Client, Config};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_location_is_fetched_once_and_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/photos/"))
            .and(query_param("location", ""))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<LocationConstraint>EU</LocationConstraint>"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = Client::new(Config::new(server.uri()), Credentials::anonymous()).unwrap();
        assert_eq!(client.get_bucket_location("photos").await.unwrap(), "eu-west-1");
        assert_eq!(client.get_bucket_location("photos").await.unwrap(), "eu-west-1");
        assert_eq!(client.location_cache().get("photos").as_deref(), Some("eu-west-1"));
    }

    #[tokio::test]
    async fn test_access_denied_falls_back_to_default_region() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/private/"))
            .respond_with(ResponseTemplate::new(403).set_body_string(
                "<Error><Code>AccessDenied</Code><Message>Access Denied</Message></Error>",
            ))
            .mount(&server)
            .await;

        let client = Client::new(Config::new(server.uri()), Credentials::anonymous()).unwrap();
        assert_eq!(client.get_bucket_location("private").await.unwrap(), "us-east-1");
    }

    #[tokio::test]
    async fn test_configured_region_skips_lookup() {
        let client = Client::new(
            Config::new("127.0.0.1:1").with_region("ap-east-1"),
            Credentials::anonymous(),
        )
        .unwrap();
        assert_eq!(client.get_bucket_location("photos").await.unwrap(), "ap-east-1");
    }
}

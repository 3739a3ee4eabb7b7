//! Storage (`lfs/*`) and account commands

use crate::body::{RequestBody, Response};
use crate::bucket_cache::DEFAULT_REGION;
use crate::context::Context;
use crate::request::RequestBuilder;
use crate::s3utils::{check_valid_bucket_name, check_valid_object_name};
use crate::types::{
    BucketInfo, Buckets, ObjectInfo, Objects, PeerList, QueryEvent, StringList, UserPrivMessage,
};
use crate::{Client, Result};
use tracing::instrument;

/// Optional parameters shared by storage commands
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LfsOptions {
    pub address: Option<String>,
    pub object_name: Option<String>,
    pub prefix: Option<String>,
    /// Redundancy policy: erasure coding or multi-replica
    pub policy: Option<i32>,
    pub data_count: Option<i32>,
    pub parity_count: Option<i32>,
    /// Ask for availability times in the reply
    pub avail_time: Option<bool>,
    pub secret_key: Option<String>,
    pub password: Option<String>,
    pub force_flush: Option<bool>,
}

impl LfsOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Act on behalf of another account
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn object_name(mut self, name: impl Into<String>) -> Self {
        self.object_name = Some(name.into());
        self
    }

    /// Only list entries starting with `prefix`
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn policy(mut self, policy: i32) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn data_count(mut self, count: i32) -> Self {
        self.data_count = Some(count);
        self
    }

    pub fn parity_count(mut self, count: i32) -> Self {
        self.parity_count = Some(count);
        self
    }

    pub fn avail_time(mut self, enabled: bool) -> Self {
        self.avail_time = Some(enabled);
        self
    }

    pub fn secret_key(mut self, sk: impl Into<String>) -> Self {
        self.secret_key = Some(sk.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn force_flush(mut self, enabled: bool) -> Self {
        self.force_flush = Some(enabled);
        self
    }

    /// Add the set options to a request
    pub fn apply<'a>(&self, mut rb: RequestBuilder<'a>) -> RequestBuilder<'a> {
        if let Some(v) = &self.address {
            rb = rb.option("address", v);
        }
        if let Some(v) = &self.object_name {
            rb = rb.option("objectname", v);
        }
        if let Some(v) = &self.prefix {
            rb = rb.option("prefix", v);
        }
        if let Some(v) = self.policy {
            rb = rb.option("policy", v);
        }
        if let Some(v) = self.data_count {
            rb = rb.option("datacount", v);
        }
        if let Some(v) = self.parity_count {
            rb = rb.option("paritycount", v);
        }
        if let Some(v) = self.avail_time {
            rb = rb.option("Avail", v);
        }
        // wire name as the gateway spells it
        if let Some(v) = &self.secret_key {
            rb = rb.option("secretekey", v);
        }
        if let Some(v) = &self.password {
            rb = rb.option("password", v);
        }
        if let Some(v) = self.force_flush {
            rb = rb.option("force", v);
        }
        rb
    }
}

impl Client {
    // ==================== Account Operations ====================

    /// Create a new account on the gateway
    #[instrument(skip(self, options))]
    pub async fn create_user(&self, options: &LfsOptions) -> Result<UserPrivMessage> {
        options
            .apply(self.request("create", Vec::<String>::new()))
            .exec(&Context::background())
            .await
    }

    /// Start the storage service for an account
    #[instrument(skip(self, options))]
    pub async fn start_user(&self, address: &str, options: &LfsOptions) -> Result<StringList> {
        options
            .apply(self.request("lfs/start", [address]))
            .exec(&Context::background())
            .await
    }

    /// Flush pending metadata to the keepers
    #[instrument(skip(self, options))]
    pub async fn fsync(&self, options: &LfsOptions) -> Result<StringList> {
        options
            .apply(self.request("lfs/fsync", Vec::<String>::new()))
            .exec(&Context::background())
            .await
    }

    /// Storage used by the account, as reported by the gateway
    #[instrument(skip(self, options))]
    pub async fn show_storage(&self, options: &LfsOptions) -> Result<String> {
        options
            .apply(self.request("lfs/show_storage", Vec::<String>::new()))
            .exec(&Context::background())
            .await
    }

    /// Keepers serving this account and whether they are connected
    #[instrument(skip(self, options))]
    pub async fn list_keepers(&self, options: &LfsOptions) -> Result<PeerList> {
        let keepers: Option<PeerList> = options
            .apply(self.request("lfs/list_keepers", Vec::<String>::new()))
            .exec(&Context::background())
            .await?;
        Ok(keepers.unwrap_or_default())
    }

    /// Ask a keeper to answer a storage challenge
    #[instrument(skip(self, options))]
    pub async fn challenge_test(&self, key: &str, to: &str, options: &LfsOptions) -> Result<String> {
        options
            .apply(self.request("dht/challengeTest", [key, to]))
            .exec(&Context::background())
            .await
    }

    /// Look up a DHT value held by a specific peer
    #[instrument(skip(self, options))]
    pub async fn get_from(&self, key: &str, id: &str, options: &LfsOptions) -> Result<QueryEvent> {
        let event: Option<QueryEvent> = options
            .apply(self.request("dht/getfrom", [key, id]))
            .exec(&Context::background())
            .await?;
        Ok(event.unwrap_or_default())
    }

    /// Fetch a block from a specific peer
    #[instrument(skip(self, options))]
    pub async fn get_block_from(&self, key: &str, id: &str, options: &LfsOptions) -> Result<String> {
        options
            .apply(self.request("block/getfrom", [key, id]))
            .exec(&Context::background())
            .await
    }

    // ==================== Bucket Operations ====================

    /// Create a bucket
    #[instrument(skip(self, options))]
    pub async fn make_bucket(&self, bucket: &str, options: &LfsOptions) -> Result<BucketInfo> {
        check_valid_bucket_name(bucket)?;
        let reply: Buckets = options
            .apply(self.request("lfs/create_bucket", [bucket]))
            .bucket(bucket)
            .exec(&Context::background())
            .await?;

        let region = self.config.region.as_deref().unwrap_or(DEFAULT_REGION);
        self.location_cache.set(bucket, region);
        Ok(reply
            .buckets
            .first()
            .map(BucketInfo::from)
            .unwrap_or_else(|| BucketInfo {
                name: bucket.to_string(),
                creation_date: None,
            }))
    }

    /// Delete a bucket
    #[instrument(skip(self, options))]
    pub async fn remove_bucket(&self, bucket: &str, options: &LfsOptions) -> Result<()> {
        check_valid_bucket_name(bucket)?;
        options
            .apply(self.request("lfs/delete_bucket", [bucket]))
            .bucket(bucket)
            .exec_discard(&Context::background())
            .await?;
        self.location_cache.delete(bucket);
        Ok(())
    }

    /// List all buckets of the account
    #[instrument(skip(self, options))]
    pub async fn list_buckets(&self, options: &LfsOptions) -> Result<Vec<BucketInfo>> {
        let reply: Buckets = options
            .apply(self.request("lfs/list_buckets", Vec::<String>::new()))
            .exec(&Context::background())
            .await?;
        Ok(reply.buckets.iter().map(BucketInfo::from).collect())
    }

    // ==================== Object Operations ====================

    /// Upload an object.
    ///
    /// A [`RequestBody::Seekable`] body (a file) is retried on transient
    /// failures; a [`RequestBody::Stream`] body gets a single attempt.
    #[instrument(skip(self, body, options))]
    pub async fn put_object(
        &self,
        bucket: &str,
        object: &str,
        body: impl Into<RequestBody>,
        options: &LfsOptions,
    ) -> Result<ObjectInfo> {
        check_valid_bucket_name(bucket)?;
        check_valid_object_name(object)?;
        let reply: Objects = options
            .apply(self.request("lfs/put_object", [bucket, object]))
            .bucket(bucket)
            .object(object)
            .body(body)
            .exec(&Context::background())
            .await?;
        Ok(reply.objects.first().map(ObjectInfo::from).unwrap_or_else(|| ObjectInfo {
            key: object.to_string(),
            ..Default::default()
        }))
    }

    /// Download an object; the body streams from the returned response
    #[instrument(skip(self, options))]
    pub async fn get_object(&self, bucket: &str, object: &str, options: &LfsOptions) -> Result<Response> {
        check_valid_bucket_name(bucket)?;
        check_valid_object_name(object)?;
        options
            .apply(self.request("lfs/get_object", [bucket, object]))
            .bucket(bucket)
            .object(object)
            .send(&Context::background())
            .await
    }

    /// Delete an object
    #[instrument(skip(self, options))]
    pub async fn remove_object(&self, bucket: &str, object: &str, options: &LfsOptions) -> Result<()> {
        check_valid_bucket_name(bucket)?;
        check_valid_object_name(object)?;
        options
            .apply(self.request("lfs/delete_object", [bucket, object]))
            .bucket(bucket)
            .object(object)
            .exec_discard(&Context::background())
            .await
    }

    /// List objects of a bucket, optionally filtered by [`LfsOptions::prefix`]
    #[instrument(skip(self, options))]
    pub async fn list_objects(&self, bucket: &str, options: &LfsOptions) -> Result<Vec<ObjectInfo>> {
        check_valid_bucket_name(bucket)?;
        let reply: Objects = options
            .apply(self.request("lfs/list_objects", [bucket]))
            .bucket(bucket)
            .exec(&Context::background())
            .await?;
        Ok(reply.objects.iter().map(ObjectInfo::from).collect())
    }
}

//! Bucket and object existence checks

use crate::context::Context;
use crate::s3utils::{check_valid_bucket_name, check_valid_object_name};
use crate::types::{Buckets, ObjectInfo, Objects};
use crate::{Client, ClientError, Result};
use tracing::instrument;

impl Client {
    /// Check whether a bucket exists and is visible to this account
    #[instrument(skip(self))]
    pub async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        check_valid_bucket_name(bucket)?;
        let address = self.credentials.get()?.access_key_id;

        let reply = self
            .request("lfs/head_Bucket", [bucket])
            .option("address", address)
            .bucket(bucket)
            .exec::<Buckets>(&Context::background())
            .await;
        match reply {
            Ok(_) => Ok(true),
            Err(e) if e.code() == Some("NoSuchBucket") => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Fetch object metadata
    #[instrument(skip(self))]
    pub async fn stat_object(&self, bucket: &str, object: &str) -> Result<ObjectInfo> {
        self.stat_object_with_context(&Context::background(), bucket, object)
            .await
    }

    /// Fetch object metadata under a caller supplied context
    #[instrument(skip(self, ctx))]
    pub async fn stat_object_with_context(&self, ctx: &Context, bucket: &str, object: &str) -> Result<ObjectInfo> {
        check_valid_bucket_name(bucket)?;
        check_valid_object_name(object)?;
        let address = self.credentials.get()?.access_key_id;

        let objs: Objects = self
            .request("lfs/head_object", [bucket, object])
            .option("address", address)
            .bucket(bucket)
            .object(object)
            .exec(ctx)
            .await?;

        objs.objects
            .first()
            .map(ObjectInfo::from)
            .ok_or_else(|| ClientError::InvalidResponse(format!("no stat returned for {}/{}", bucket, object)))
    }
}

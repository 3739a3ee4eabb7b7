//! Command API request builder

use crate::body::{RequestBody, Response};
use crate::context::Context;
use crate::metadata::RequestMetadata;
use crate::{Client, Result};
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Method;
use serde::de::DeserializeOwned;
use tracing::debug;

/// One call to the gateway's command API.
///
/// Positional arguments are sent as repeated `arg` parameters, options as
/// named parameters, all on a `POST /api/v0/<command>`.
#[derive(Debug)]
pub struct RequestBuilder<'a> {
    client: &'a Client,
    command: String,
    args: Vec<String>,
    options: Vec<(String, String)>,
    metadata: RequestMetadata,
}

impl Client {
    /// Start a command API request
    pub fn request<I, S>(&self, command: &str, args: I) -> RequestBuilder<'_>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RequestBuilder {
            client: self,
            command: command.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            options: Vec::new(),
            metadata: RequestMetadata::command(command),
        }
    }
}

impl<'a> RequestBuilder<'a> {
    /// Append positional arguments
    pub fn arguments<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set a named option, replacing an earlier value for the same key
    pub fn option(mut self, key: &str, value: impl ToString) -> Self {
        let value = value.to_string();
        match self.options.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.options.push((key.to_string(), value)),
        }
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.metadata.headers.insert(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.metadata.body = Some(body.into());
        self
    }

    /// Bucket the command acts on, used in error reports and region lookup
    pub fn bucket(mut self, bucket: &str) -> Self {
        self.metadata.bucket_name = bucket.to_string();
        self
    }

    /// Object the command acts on, used in error reports
    pub fn object(mut self, object: &str) -> Self {
        self.metadata.object_name = object.to_string();
        self
    }

    fn into_metadata(self) -> (&'a Client, RequestMetadata) {
        let mut metadata = self.metadata;
        metadata.query = self
            .args
            .into_iter()
            .map(|arg| ("arg".to_string(), arg))
            .chain(self.options)
            .chain([
                ("encoding".to_string(), "json".to_string()),
                ("stream-channels".to_string(), "true".to_string()),
            ])
            .collect();
        (self.client, metadata)
    }

    /// Send and return the raw response
    pub async fn send(self, ctx: &Context) -> Result<Response> {
        debug!(command = %self.command, args = self.args.len(), "command request");
        let (client, metadata) = self.into_metadata();
        client.execute(ctx, Method::POST, metadata).await
    }

    /// Send and decode the JSON reply; an empty reply decodes as `null`
    pub async fn exec<T: DeserializeOwned>(self, ctx: &Context) -> Result<T> {
        let body = self.send(ctx).await?.bytes().await?;
        let body: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
            b"null"
        } else {
            &body
        };
        Ok(serde_json::from_slice(body)?)
    }

    /// Send and drop the reply
    pub async fn exec_discard(self, ctx: &Context) -> Result<()> {
        self.send(ctx).await?.discard().await
    }
}

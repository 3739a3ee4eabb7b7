//! Node, DHT, block and swarm commands

use crate::body::FormFile;
use crate::context::Context;
use crate::types::{BlockStat, IdOutput, PeerInfo, SwarmConnInfos};
use crate::{Client, ClientError, Result};
use bytes::Bytes;
use serde::Deserialize;
use tracing::instrument;

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FindPeerReply {
    #[serde(default)]
    responses: Option<Vec<PeerInfo>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PathReply {
    path: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct VersionReply {
    version: String,
    #[serde(default)]
    commit: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct KeyReply {
    key: String,
}

impl Client {
    /// Identity of a peer, or of the gateway's own node when `peer` is `None`
    #[instrument(skip(self))]
    pub async fn id(&self, peer: Option<&str>) -> Result<IdOutput> {
        self.request("id", peer)
            .exec(&Context::background())
            .await
    }

    /// Addresses of a peer found through the DHT
    #[instrument(skip(self))]
    pub async fn find_peer(&self, peer: &str) -> Result<PeerInfo> {
        let reply: FindPeerReply = self
            .request("dht/findpeer", [peer])
            .exec(&Context::background())
            .await?;
        reply
            .responses
            .and_then(|r| r.into_iter().next())
            .ok_or_else(|| ClientError::InvalidResponse(format!("peer {} not found", peer)))
    }

    /// Resolve a name to a content path, without the `/ipfs/` prefix
    #[instrument(skip(self))]
    pub async fn resolve_path(&self, path: &str) -> Result<String> {
        let reply: PathReply = self
            .request("resolve", [path])
            .exec(&Context::background())
            .await?;
        Ok(reply
            .path
            .strip_prefix("/ipfs/")
            .unwrap_or(&reply.path)
            .to_string())
    }

    /// Gateway version and commit
    #[instrument(skip(self))]
    pub async fn version(&self) -> Result<(String, String)> {
        let reply: VersionReply = self
            .request("version", Vec::<String>::new())
            .exec(&Context::background())
            .await?;
        Ok((reply.version, reply.commit))
    }

    /// Whether the gateway answers at all
    pub async fn is_up(&self) -> bool {
        self.version().await.is_ok()
    }

    #[instrument(skip(self))]
    pub async fn block_stat(&self, path: &str) -> Result<BlockStat> {
        self.request("block/stat", [path])
            .exec(&Context::background())
            .await
    }

    /// Raw block content
    #[instrument(skip(self))]
    pub async fn block_get(&self, path: &str) -> Result<Bytes> {
        self.request("block/get", [path])
            .send(&Context::background())
            .await?
            .bytes()
            .await
    }

    /// Store a block and return its key
    #[instrument(skip(self, block), fields(len = block.len()))]
    pub async fn block_put(&self, block: &[u8], format: &str, mhtype: &str, mhlen: i32) -> Result<String> {
        let reply: KeyReply = self
            .request("block/put", Vec::<String>::new())
            .option("mhtype", mhtype)
            .option("format", format)
            .option("mhlen", mhlen)
            .body(FormFile::new("file", Bytes::copy_from_slice(block)))
            .exec(&Context::background())
            .await?;
        Ok(reply.key)
    }

    /// Open swarm connections
    #[instrument(skip(self, ctx))]
    pub async fn swarm_peers(&self, ctx: &Context) -> Result<SwarmConnInfos> {
        let peers: Option<SwarmConnInfos> = self
            .request("swarm/peers", Vec::<String>::new())
            .exec(ctx)
            .await?;
        Ok(peers.unwrap_or_default())
    }

    /// Connect to the given multiaddrs
    #[instrument(skip(self, ctx))]
    pub async fn swarm_connect(&self, ctx: &Context, addrs: &[&str]) -> Result<()> {
        self.request("swarm/connect", addrs.iter().copied())
            .exec_discard(ctx)
            .await
    }
}

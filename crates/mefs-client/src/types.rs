//! Types for gateway requests and replies

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Timestamp layout used by the gateway, e.g. `2024-03-01 Fri 10:20:30 CST`
pub const SHOW_TIME_FORMAT: &str = "%Y-%m-%d %a %H:%M:%S";

/// Parse a gateway timestamp.
///
/// The trailing zone abbreviation is ambiguous and is ignored; the time is
/// read as UTC.
pub fn parse_show_time(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    let without_zone = match value.rsplit_once(' ') {
        Some((rest, zone)) if zone.chars().all(|c| c.is_ascii_alphabetic()) && zone.len() <= 5 => rest,
        _ => value,
    };
    NaiveDateTime::parse_from_str(without_zone, SHOW_TIME_FORMAT)
        .ok()
        .map(|dt| dt.and_utc())
}

/// Treat a JSON `null` like a missing field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Bucket summary
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketInfo {
    pub name: String,
    pub creation_date: Option<DateTime<Utc>>,
}

/// Object metadata
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectInfo {
    /// MD5 of the object content
    pub etag: String,
    #[serde(rename = "name")]
    pub key: String,
    pub last_modified: Option<DateTime<Utc>>,
    pub size: i64,
    pub content_type: String,
}

impl From<&ObjectStat> for ObjectInfo {
    fn from(stat: &ObjectStat) -> Self {
        Self {
            etag: stat.md5.clone(),
            key: stat.object_name.clone(),
            last_modified: parse_show_time(&stat.ctime),
            size: stat.object_size,
            content_type: String::new(),
        }
    }
}

impl From<&BucketStat> for BucketInfo {
    fn from(stat: &BucketStat) -> Self {
        Self {
            name: stat.bucket_name.clone(),
            creation_date: parse_show_time(&stat.ctime),
        }
    }
}

/// Object entry as reported by `lfs/*` commands
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ObjectStat {
    pub object_name: String,
    pub object_size: i64,
    #[serde(rename = "MD5")]
    pub md5: String,
    pub ctime: String,
    pub dir: bool,
    pub latest_chal_time: String,
}

/// Reply of object commands
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Objects {
    pub method: String,
    #[serde(deserialize_with = "null_as_default")]
    pub objects: Vec<ObjectStat>,
}

/// Bucket entry as reported by `lfs/*` commands
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct BucketStat {
    pub bucket_name: String,
    #[serde(rename = "BucketID")]
    pub bucket_id: i32,
    pub ctime: String,
    /// Redundancy policy
    pub policy: i32,
    pub data_count: i32,
    pub parity_count: i32,
}

/// Reply of bucket commands
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Buckets {
    pub method: String,
    #[serde(deserialize_with = "null_as_default")]
    pub buckets: Vec<BucketStat>,
}

/// Account created by the gateway
#[derive(Clone, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UserPrivMessage {
    pub address: String,
    pub sk: String,
}

impl fmt::Debug for UserPrivMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserPrivMessage")
            .field("address", &self.address)
            .field("sk", &"[redacted]")
            .finish()
    }
}

/// One value per line when displayed
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct StringList {
    #[serde(deserialize_with = "null_as_default")]
    pub child_lists: Vec<String>,
}

impl fmt::Display for StringList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for item in &self.child_lists {
            writeln!(f, "{}", item)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct IntList {
    #[serde(deserialize_with = "null_as_default")]
    pub child_lists: Vec<i64>,
}

impl fmt::Display for IntList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for item in &self.child_lists {
            writeln!(f, "{}", item)?;
        }
        Ok(())
    }
}

/// Connection state of a keeper
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase", default)]
pub struct PeerState {
    #[serde(rename = "PeerID")]
    pub peer_id: String,
    pub connected: bool,
}

impl fmt::Display for PeerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.connected { "connected" } else { "unconnected" };
        write!(f, "{} {}", self.peer_id, state)
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PeerList {
    #[serde(deserialize_with = "null_as_default")]
    pub peers: Vec<PeerState>,
}

impl fmt::Display for PeerList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for peer in &self.peers {
            writeln!(f, "{}", peer)?;
        }
        Ok(())
    }
}

/// Kind of a DHT query event
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum QueryEventType {
    #[default]
    SendingQuery,
    PeerResponse,
    FinalPeer,
    QueryError,
    Provider,
    Value,
    AddingPeer,
    DialingPeer,
}

impl TryFrom<u8> for QueryEventType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::SendingQuery,
            1 => Self::PeerResponse,
            2 => Self::FinalPeer,
            3 => Self::QueryError,
            4 => Self::Provider,
            5 => Self::Value,
            6 => Self::AddingPeer,
            7 => Self::DialingPeer,
            other => return Err(format!("unknown query event type {}", other)),
        })
    }
}

impl From<QueryEventType> for u8 {
    fn from(value: QueryEventType) -> Self {
        value as u8
    }
}

/// Peer and its known addresses
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AddrInfo {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub addrs: Vec<String>,
}

/// DHT query progress event
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct QueryEvent {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Type")]
    pub kind: QueryEventType,
    #[serde(deserialize_with = "null_as_default")]
    pub responses: Vec<AddrInfo>,
    pub extra: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct GetBlockResult {
    pub is_exist: bool,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase", default)]
pub struct BlockStat {
    pub key: String,
    pub size: u64,
}

/// Node identity
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct IdOutput {
    #[serde(rename = "ID")]
    pub id: String,
    pub public_key: String,
    #[serde(deserialize_with = "null_as_default")]
    pub addresses: Vec<String>,
    pub agent_version: String,
    pub protocol_version: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PeerInfo {
    #[serde(deserialize_with = "null_as_default")]
    pub addrs: Vec<String>,
    #[serde(rename = "ID")]
    pub id: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SwarmStreamInfo {
    pub protocol: String,
}

/// One open swarm connection
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SwarmConnInfo {
    pub addr: String,
    pub peer: String,
    pub latency: String,
    pub muxer: String,
    #[serde(deserialize_with = "null_as_default")]
    pub streams: Vec<SwarmStreamInfo>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SwarmConnInfos {
    #[serde(deserialize_with = "null_as_default")]
    pub peers: Vec<SwarmConnInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_show_time() {
        let t = parse_show_time("2024-03-01 Fri 10:20:30 CST").unwrap();
        assert_eq!((t.year(), t.month(), t.day()), (2024, 3, 1));
        assert_eq!((t.hour(), t.minute(), t.second()), (10, 20, 30));

        assert!(parse_show_time("2024-03-01 Fri 10:20:30").is_some());
        assert!(parse_show_time("yesterday").is_none());
        assert!(parse_show_time("").is_none());
    }

    #[test]
    fn test_objects_decode() {
        let json = r#"{
            "Method": "Head Object",
            "Objects": [{
                "ObjectName": "cat.png",
                "ObjectSize": 1024,
                "MD5": "d41d8cd98f00b204e9800998ecf8427e",
                "Ctime": "2024-03-01 Fri 10:20:30 CST",
                "Dir": false,
                "LatestChalTime": ""
            }]
        }"#;
        let objs: Objects = serde_json::from_str(json).unwrap();
        let info = ObjectInfo::from(&objs.objects[0]);
        assert_eq!(info.key, "cat.png");
        assert_eq!(info.size, 1024);
        assert_eq!(info.etag, "d41d8cd98f00b204e9800998ecf8427e");
        assert!(info.last_modified.is_some());
    }

    #[test]
    fn test_null_lists_decode_empty() {
        let objs: Objects = serde_json::from_str(r#"{"Method":"List","Objects":null}"#).unwrap();
        assert!(objs.objects.is_empty());
        let peers: PeerList = serde_json::from_str(r#"{"Peers":null}"#).unwrap();
        assert!(peers.peers.is_empty());
    }

    #[test]
    fn test_peer_list_display() {
        let list: PeerList = serde_json::from_str(
            r#"{"Peers":[{"PeerID":"8MGx","Connected":true},{"PeerID":"8MHy","Connected":false}]}"#,
        )
        .unwrap();
        assert_eq!(list.to_string(), "8MGx connected\n8MHy unconnected\n");
    }

    #[test]
    fn test_query_event_type() {
        let event: QueryEvent =
            serde_json::from_str(r#"{"ID":"8MGx","Type":2,"Responses":null,"Extra":""}"#).unwrap();
        assert_eq!(event.kind, QueryEventType::FinalPeer);
        assert!(serde_json::from_str::<QueryEvent>(r#"{"Type":9}"#).is_err());
    }

    #[test]
    fn test_string_list_display() {
        let list = StringList {
            child_lists: vec!["a".into(), "b".into()],
        };
        assert_eq!(list.to_string(), "a\nb\n");
    }
}

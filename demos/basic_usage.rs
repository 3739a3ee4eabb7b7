//! Basic usage of the MEFS client
//!
//! Run with: cargo run --example basic_usage
//!
//! Expects a gateway on 127.0.0.1:4608 (override with MEFS_ENDPOINT) and an
//! account in MEFS_ACCESS_KEY / MEFS_SECRET_KEY.

use bytes::Bytes;
use mefs_client::{Client, Config, Credentials, EnvProvider, LfsOptions};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let endpoint = std::env::var("MEFS_ENDPOINT").unwrap_or_else(|_| "/ip4/127.0.0.1/tcp/4608".into());
    let mut client = Client::new(Config::new(endpoint), Credentials::new(EnvProvider))?;
    client.set_app_info("basic-usage", "0.1.0");

    println!("=== MEFS Client Demo ===\n");

    let (version, commit) = client.version().await?;
    println!("Gateway version {} ({})", version, commit);

    let bucket = "bucket01";
    if !client.bucket_exists(bucket).await? {
        let info = client.make_bucket(bucket, &LfsOptions::new()).await?;
        println!("Created bucket {}", info.name);
    }

    let payload = Bytes::from_static(b"Hello from the MEFS Rust client!");
    let info = client
        .put_object(bucket, "hello.txt", payload.clone(), &LfsOptions::new())
        .await?;
    println!("Uploaded {} ({} bytes, etag {})", info.key, info.size, info.etag);

    let stat = client.stat_object(bucket, "hello.txt").await?;
    println!("Stat: {} bytes, modified {:?}", stat.size, stat.last_modified);

    let data = client
        .get_object(bucket, "hello.txt", &LfsOptions::new())
        .await?
        .bytes()
        .await?;
    assert_eq!(data, payload);
    println!("Downloaded: {}", String::from_utf8_lossy(&data));

    println!("\nKeepers:");
    print!("{}", client.list_keepers(&LfsOptions::new()).await?);

    Ok(())
}

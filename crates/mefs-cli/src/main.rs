//! mefs - command-line driver for the MEFS gateway client

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use futures::StreamExt;
use mefs_client::{Client, Config, Credentials, LfsOptions, RequestBody};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "mefs")]
#[command(about = "Talk to a MEFS storage gateway")]
#[command(version)]
struct Args {
    /// Gateway address: host:port, URL or multiaddr
    #[arg(short, long, default_value = "127.0.0.1:4608", env = "MEFS_ENDPOINT")]
    endpoint: String,

    /// Account address (access key)
    #[arg(long, env = "MEFS_ACCESS_KEY", default_value = "")]
    access_key: String,

    /// Account secret
    #[arg(long, env = "MEFS_SECRET_KEY", default_value = "", hide_env_values = true)]
    secret_key: String,

    /// Use https
    #[arg(long, env = "MEFS_SECURE")]
    secure: bool,

    /// Fixed region; "local" reads the endpoint from $MEFS_PATH/api
    #[arg(long, env = "MEFS_REGION")]
    region: Option<String>,

    /// Attempts per request
    #[arg(long, default_value = "5", env = "MEFS_MAX_RETRIES")]
    max_retries: u32,

    /// Request timeout in seconds
    #[arg(long, default_value = "60", env = "MEFS_TIMEOUT")]
    timeout: u64,

    /// Enable debug logging
    #[arg(short, long, env = "MEFS_DEBUG")]
    debug: bool,

    /// Log every HTTP exchange
    #[arg(long)]
    trace: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the identity of the gateway node or another peer
    Id { peer: Option<String> },
    /// Show the gateway version
    Version,
    /// Create a bucket
    MakeBucket {
        bucket: String,
        /// Redundancy policy
        #[arg(long)]
        policy: Option<i32>,
        #[arg(long)]
        data_count: Option<i32>,
        #[arg(long)]
        parity_count: Option<i32>,
    },
    /// Delete a bucket
    RemoveBucket { bucket: String },
    /// List buckets
    ListBuckets,
    /// Check whether a bucket exists
    BucketExists { bucket: String },
    /// Show the region of a bucket
    Location { bucket: String },
    /// Upload a file; "-" reads stdin
    Put {
        bucket: String,
        object: String,
        file: PathBuf,
    },
    /// Download an object to a file, or stdout when no file is given
    Get {
        bucket: String,
        object: String,
        file: Option<PathBuf>,
    },
    /// Show object metadata
    Stat { bucket: String, object: String },
    /// List objects in a bucket
    Ls {
        bucket: String,
        #[arg(long)]
        prefix: Option<String>,
    },
    /// List keepers serving this account
    ListKeepers,
    /// Create a new account
    CreateUser {
        #[arg(long)]
        password: Option<String>,
    },
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Setup logging
    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("mefs={0},mefs_client={0}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = Config::new(&args.endpoint)
        .with_secure(args.secure)
        .with_max_retries(args.max_retries)
        .with_timeout(Duration::from_secs(args.timeout))
        .with_app_info("mefs", env!("CARGO_PKG_VERSION"));
    if let Some(region) = &args.region {
        config = config.with_region(region);
    }

    let credentials = Credentials::new_static_v4(&args.access_key, &args.secret_key, "");
    let client = Client::new(config, credentials).context("failed to create client")?;
    if args.trace {
        client.trace_on();
    }
    tracing::debug!(endpoint = %client.endpoint_url(), "client ready");

    let none = LfsOptions::new();
    match args.command {
        Command::Id { peer } => print_json(&client.id(peer.as_deref()).await?)?,
        Command::Version => {
            let (version, commit) = client.version().await?;
            println!("{} {}", version, commit);
        }
        Command::MakeBucket {
            bucket,
            policy,
            data_count,
            parity_count,
        } => {
            let mut opts = LfsOptions::new();
            opts.policy = policy;
            opts.data_count = data_count;
            opts.parity_count = parity_count;
            print_json(&client.make_bucket(&bucket, &opts).await?)?;
        }
        Command::RemoveBucket { bucket } => client.remove_bucket(&bucket, &none).await?,
        Command::ListBuckets => print_json(&client.list_buckets(&none).await?)?,
        Command::BucketExists { bucket } => println!("{}", client.bucket_exists(&bucket).await?),
        Command::Location { bucket } => println!("{}", client.get_bucket_location(&bucket).await?),
        Command::Put { bucket, object, file } => {
            let body = if file.as_os_str() == "-" {
                RequestBody::stream(tokio::io::stdin())
            } else {
                let f = tokio::fs::File::open(&file)
                    .await
                    .with_context(|| format!("cannot open {}", file.display()))?;
                RequestBody::seekable(f)
            };
            print_json(&client.put_object(&bucket, &object, body, &none).await?)?;
        }
        Command::Get { bucket, object, file } => {
            let resp = client.get_object(&bucket, &object, &none).await?;
            let mut out: Box<dyn tokio::io::AsyncWrite + Unpin> = match &file {
                Some(path) => Box::new(
                    tokio::fs::File::create(path)
                        .await
                        .with_context(|| format!("cannot create {}", path.display()))?,
                ),
                None => Box::new(tokio::io::stdout()),
            };
            let mut stream = resp.into_stream();
            while let Some(chunk) = stream.next().await {
                out.write_all(&chunk?).await?;
            }
            out.flush().await?;
        }
        Command::Stat { bucket, object } => print_json(&client.stat_object(&bucket, &object).await?)?,
        Command::Ls { bucket, prefix } => {
            let mut opts = LfsOptions::new();
            opts.prefix = prefix;
            print_json(&client.list_objects(&bucket, &opts).await?)?;
        }
        Command::ListKeepers => print!("{}", client.list_keepers(&none).await?),
        Command::CreateUser { password } => {
            let mut opts = LfsOptions::new();
            opts.password = password;
            let user = client.create_user(&opts).await?;
            println!("address: {}", user.address);
            println!("secret key: {}", user.sk);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_put_from_stdin_parses() {
        let args = Args::try_parse_from(["mefs", "--endpoint", "/ip4/127.0.0.1/tcp/4608", "put", "photos", "cat.png", "-"])
            .unwrap();
        match args.command {
            Command::Put { file, .. } => assert_eq!(file, PathBuf::from("-")),
            other => panic!("unexpected command {other:?}"),
        }
    }
}

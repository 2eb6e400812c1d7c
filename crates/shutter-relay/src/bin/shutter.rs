//! Shutter CLI
//!
//! Runs the relay and performs the administrative key operations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use shutter_core::{
    address_matches, recover_record_signer, CameraIdentity, PhotoDigest, RecordSignature,
    ReplayCounter,
};
use shutter_relay::{
    log_rejection, run_events, HttpRelay, NotaryOutcome, RelayConfig, StdioBroker, Trigger,
};
use shutter_store::{JsonKeyStore, KeyStore, KeyStoreExt};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shutter")]
#[command(about = "Camera authentication and photo notarization relay", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the camera identity for a MAC and fuse id
    Identity {
        #[arg(long)]
        mac: String,

        #[arg(long)]
        efuse: String,
    },

    /// Run the relay: events as JSON lines on stdin, commands on stdout
    Run {
        #[arg(short, long)]
        config: PathBuf,

        /// Motion sensor line device (or any file of sensor lines)
        #[arg(long)]
        trigger_device: Option<PathBuf>,
    },

    /// Process a single event file
    Notarize {
        #[arg(short, long)]
        config: PathBuf,

        /// Capture event JSON
        event: PathBuf,
    },

    /// Manage camera keys
    Keys {
        #[command(subcommand)]
        action: KeysAction,
    },

    /// Recover the signer of a record signature
    Verify {
        /// Photo digest (hex)
        #[arg(long)]
        digest: String,

        #[arg(long)]
        location: String,

        #[arg(long)]
        metadata: String,

        /// Replay counter the record was signed with
        #[arg(long)]
        counter: u64,

        /// 65-byte signature (hex)
        #[arg(long)]
        signature: String,

        /// Fail unless the signer is this address
        #[arg(long)]
        expect: Option<String>,
    },
}

#[derive(Subcommand)]
enum KeysAction {
    /// Generate a key for a camera that has none
    Generate {
        #[arg(short, long)]
        config: PathBuf,

        #[command(flatten)]
        camera: CameraArgs,
    },

    /// Import an existing key (read from stdin if --key is omitted)
    Import {
        #[arg(short, long)]
        config: PathBuf,

        #[command(flatten)]
        camera: CameraArgs,

        #[arg(long)]
        key: Option<String>,

        /// Wallet the key must control
        #[arg(long)]
        wallet: Option<String>,
    },

    /// Encrypt every plaintext key record
    Migrate {
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Show the stored record for a camera (key material is never shown)
    Show {
        #[arg(short, long)]
        config: PathBuf,

        #[command(flatten)]
        camera: CameraArgs,
    },
}

/// Selects a camera by identity or by hardware fields.
#[derive(Args)]
struct CameraArgs {
    /// Camera identity (0x-prefixed hex)
    #[arg(long, conflicts_with_all = ["mac", "efuse"])]
    camera_id: Option<String>,

    #[arg(long, requires = "efuse")]
    mac: Option<String>,

    #[arg(long, requires = "mac")]
    efuse: Option<String>,
}

impl CameraArgs {
    fn identity(&self) -> Result<CameraIdentity> {
        match (&self.camera_id, &self.mac, &self.efuse) {
            (Some(id), _, _) => {
                CameraIdentity::from_hex(id).with_context(|| format!("invalid camera id {id}"))
            }
            (None, Some(mac), Some(efuse)) => Ok(CameraIdentity::derive(mac, efuse)),
            _ => bail!("pass --camera-id or both --mac and --efuse"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Identity { mac, efuse } => {
            println!("{}", CameraIdentity::derive(&mac, &efuse));
        }
        Commands::Run {
            config,
            trigger_device,
        } => run(&config, trigger_device).await?,
        Commands::Notarize { config, event } => notarize(&config, &event).await?,
        Commands::Keys { action } => keys(action).await?,
        Commands::Verify {
            digest,
            location,
            metadata,
            counter,
            signature,
            expect,
        } => {
            let digest = PhotoDigest::from_hex(&digest)?;
            let signature = RecordSignature::from_hex(&signature)?;
            let signer = recover_record_signer(
                &digest,
                &location,
                &metadata,
                ReplayCounter(counter),
                &signature,
            )?;
            println!("{}", signer.to_checksum(None));
            if let Some(expected) = expect {
                if !address_matches(&expected, &signer) {
                    bail!("signature was made by {signer}, not {expected}");
                }
            }
        }
    }

    Ok(())
}

async fn run(config_path: &Path, trigger_device: Option<PathBuf>) -> Result<()> {
    let config = RelayConfig::from_file(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let relay = Arc::new(HttpRelay::from_config(&config)?);
    let broker = Arc::new(StdioBroker::stdio(config.broker.events_topic.clone()));
    let (stop_tx, stop_rx) = watch::channel(false);

    let trigger = match trigger_device {
        Some(path) => {
            let device = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("opening trigger device {}", path.display()))?;
            let trigger = Trigger::from_config(broker.clone(), &config.broker, &config.trigger);
            info!(device = %path.display(), "trigger started");
            Some(tokio::spawn(trigger.run(BufReader::new(device), stop_rx.clone())))
        }
        None => None,
    };

    let stop_tx = Arc::new(stop_tx);
    let signal_tx = stop_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received");
            let _ = signal_tx.send(true);
        }
    });

    info!(topic = %config.broker.events_topic, "relay started");
    let stats = run_events(relay, broker, stop_rx).await?;
    let _ = stop_tx.send(true);
    if let Some(trigger) = trigger {
        trigger.await.context("trigger task")??;
    }

    eprintln!(
        "received {} notarized {} already notarized {} failed {}",
        stats.received, stats.notarized, stats.already_notarized, stats.failed
    );
    Ok(())
}

async fn notarize(config_path: &Path, event_path: &Path) -> Result<()> {
    let config = RelayConfig::from_file(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let relay = HttpRelay::from_config(&config)?;
    let payload = tokio::fs::read(event_path)
        .await
        .with_context(|| format!("reading {}", event_path.display()))?;

    let processed = match relay.process(&payload).await {
        Ok(processed) => processed,
        Err(e) => {
            log_rejection(&e);
            return Err(e.into());
        }
    };

    println!("event     {}", processed.event_id);
    println!("camera    {}", processed.camera);
    println!("sha256    {}", processed.digest);
    println!("cid       {}", processed.locator.cid);
    println!("evidence  {}", processed.evidence.locator.display());
    match processed.outcome {
        NotaryOutcome::Notarized { counter, attempts } => {
            println!("outcome   notarized (counter {counter}, attempts {attempts})")
        }
        NotaryOutcome::AlreadyNotarized => println!("outcome   already notarized"),
    }
    Ok(())
}

fn open_keys(config_path: &Path) -> Result<JsonKeyStore> {
    let config = RelayConfig::from_file(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    Ok(JsonKeyStore::open(config.keys.path.clone(), config.master_key()?))
}

async fn keys(action: KeysAction) -> Result<()> {
    match action {
        KeysAction::Generate { config, camera } => {
            let identity = camera.identity()?;
            let store = open_keys(&config)?;
            let record = store.generate_key(&identity).await?;
            println!("camera   {identity}");
            println!("address  {}", record.address);
        }
        KeysAction::Import {
            config,
            camera,
            key,
            wallet,
        } => {
            let identity = camera.identity()?;
            let store = open_keys(&config)?;
            let key = match key {
                Some(key) => zeroize::Zeroizing::new(key),
                None => {
                    let mut line = String::new();
                    BufReader::new(tokio::io::stdin())
                        .read_line(&mut line)
                        .await
                        .context("reading key from stdin")?;
                    zeroize::Zeroizing::new(line.trim().to_string())
                }
            };
            let record = store
                .import_key(&identity, key.as_str(), wallet.as_deref())
                .await?;
            println!("camera   {identity}");
            println!("address  {}", record.address);
        }
        KeysAction::Migrate { config } => {
            let store = open_keys(&config)?;
            let changed = store.migrate_plaintext().await?;
            println!("encrypted {changed} record(s)");
        }
        KeysAction::Show { config, camera } => {
            let identity = camera.identity()?;
            let store = open_keys(&config)?;
            let Some(record) = store.get(&identity).await? else {
                bail!("no key record for {identity}");
            };
            println!("camera     {identity}");
            println!("address    {}", record.address);
            println!("encrypted  {}", record.is_encrypted());
            println!("created    {}", record.created_at);
            let loaded = store.load(&identity).await?;
            println!("derived    {}", loaded.signer.address().to_checksum(None));
        }
    }
    Ok(())
}

//! `sbg`: command-line front end for the Seven Bridges platform.

mod config;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use sbg_client::{SevenBridges, TransferEvent, UploadInfo};
use sbg_protocol::ListOptions;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sbg", version, about = "Seven Bridges platform client")]
struct Cli {
    /// Configuration file (defaults to the per-user location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the authenticated user
    Me,
    /// Upload a local file into a project
    Upload {
        path: PathBuf,
        /// Destination project (`owner/project`)
        #[arg(long)]
        project: String,
        /// Remote file name (defaults to the local file name)
        #[arg(long)]
        name: Option<String>,
        /// Replace a remote file with the same name
        #[arg(long)]
        overwrite: bool,
    },
    /// Download a file by ID
    Download { file_id: String, destination: PathBuf },
    /// List the files of a project
    Files {
        project: String,
        #[arg(long, default_value_t = 50)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// Manage multipart upload sessions
    Uploads {
        #[command(subcommand)]
        action: UploadsAction,
    },
}

#[derive(Subcommand)]
enum UploadsAction {
    /// List unfinished uploads
    List,
    /// Abort an upload session
    Abort { upload_id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref())?;
    if config.token.is_empty() {
        anyhow::bail!(
            "no auth token configured; set {} or add `token` to the config file",
            config::TOKEN_ENV
        );
    }
    let client = SevenBridges::new(config)?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, cancelling");
                cancel.cancel();
            }
        });
    }

    match cli.command {
        Command::Me => {
            let (user, response) = client.users().me().await?;
            println!("{} <{}>", user.username, user.email);
            tracing::debug!(remaining = response.rate.remaining, "rate limit");
        }
        Command::Upload {
            path,
            project,
            name,
            overwrite,
        } => upload(&client, path, project, name, overwrite, &cancel).await?,
        Command::Download {
            file_id,
            destination,
        } => download(&client, &file_id, &destination, &cancel).await?,
        Command::Files {
            project,
            limit,
            offset,
        } => {
            let options = ListOptions {
                limit,
                offset,
                fields: Vec::new(),
            };
            let (files, response) = client.files().list(&project, &options).await?;
            for file in &files {
                println!("{}\t{}\t{}", file.id, file.size, file.name);
            }
            if response.page.has_next_page() {
                eprintln!(
                    "{} of {} shown; use --offset {} for more",
                    files.len(),
                    response.page.total_matching_query,
                    offset + limit
                );
            }
        }
        Command::Uploads { action } => match action {
            UploadsAction::List => {
                let (uploads, _) = client.uploads().list(&ListOptions::default()).await?;
                for upload in &uploads {
                    println!("{}\t{}\t{}", upload.upload_id, upload.project, upload.name);
                }
            }
            UploadsAction::Abort { upload_id } => {
                client.uploads().abort(&upload_id).await?;
                println!("aborted {upload_id}");
            }
        },
    }

    Ok(())
}

async fn upload(
    client: &SevenBridges,
    path: PathBuf,
    project: String,
    name: Option<String>,
    overwrite: bool,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let size = std::fs::metadata(&path)
        .with_context(|| format!("reading {}", path.display()))?
        .len();
    let mut info = UploadInfo::new(path, project);
    info.name = name;
    info.overwrite = overwrite;

    let (events, progress) = progress(size, "uploading");
    let result = client.uploads().with_events(events).upload(&info, cancel).await;
    finish(progress).await;

    let summary = result?;
    println!("{}\t{}", summary.upload_id, summary.name);
    Ok(())
}

async fn download(
    client: &SevenBridges,
    file_id: &str,
    destination: &Path,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let (file, _) = client.files().get(file_id).await?;

    let (events, progress) = progress(file.size, "downloading");
    let result = client
        .downloads()
        .with_events(events)
        .download(file_id, destination, cancel)
        .await;
    finish(progress).await;

    let summary = result?;
    println!("{}\t{}", summary.destination.display(), summary.size);
    Ok(())
}

/// Spawns a task that drives a byte progress bar from transfer events.
///
/// The task ends once every sender has been dropped.
fn progress(total: u64, label: &'static str) -> (mpsc::Sender<TransferEvent>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel(64);
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::with_template("{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
    );
    bar.set_message(label);

    let handle = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                TransferEvent::RangeCompleted { bytes, .. } => bar.inc(bytes),
                TransferEvent::RangeRetrying {
                    sequence,
                    attempt,
                    error,
                    ..
                } => {
                    bar.suspend(|| {
                        tracing::warn!(sequence, attempt, %error, "retrying range");
                    });
                }
            }
        }
        bar.finish_and_clear();
    });
    (tx, handle)
}

async fn finish(progress: JoinHandle<()>) {
    if let Err(e) = progress.await {
        tracing::debug!(error = %e, "progress task ended abnormally");
    }
}

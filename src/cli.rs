// src/cli.rs
// Command-line front end - one-shot commands plus an interactive editor

use crate::config::ClientSettings;
use crate::error::DeskError;
use crate::gateway::CancellationToken;
use crate::segments::{SegmentField, TableView};
use crate::session::Session;
use crate::sync::PollOutcome;
use crate::view::{EventHub, TracingSink, UiSink, UiUpdate};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[derive(Parser)]
#[command(name = "dubbing-desk")]
#[command(about = "Edit segments and follow jobs on a video translation server")]
pub struct Cli {
    /// Server base URL (overrides DESK_SERVER_URL)
    #[arg(long, global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show or change the server configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Upload a local video file
    Upload { video: PathBuf },
    /// Start the translation pipeline
    Process {
        /// Keep polling until the job ends
        #[arg(long)]
        watch: bool,
    },
    /// Print the current job status
    Status,
    /// Print the segment table
    Segments,
    /// Change one cell of the segment table
    Edit {
        sequence: u32,
        field: String,
        text: String,
    },
    /// Ask the server to re-synthesize one segment
    Regenerate { sequence: u32 },
    /// Import subtitles from a local SRT file
    ImportSrt { file: PathBuf },
    /// Save the translated subtitles as SRT
    ExportSrt {
        #[arg(long, default_value = ".")]
        dir: PathBuf,
        /// Format the local table instead of asking the server
        #[arg(long)]
        offline: bool,
    },
    /// Download the translated video
    Download {
        #[arg(long, default_value = "translated_video.mp4")]
        output: PathBuf,
    },
    /// Fetch the translated video preview
    Preview,
    /// List model availability on the server
    Models,
    /// Print or clear the server log
    Logs {
        #[arg(long)]
        clear: bool,
        /// Keep printing new entries until Ctrl-C
        #[arg(long)]
        follow: bool,
    },
    /// Interactive editing session
    Run,
}

#[derive(Subcommand)]
enum ConfigAction {
    Show,
    Set { key: String, value: String },
}

/// Prints what a UI would show onto the terminal.
struct ConsoleSink {
    show_server_log: bool,
}

impl UiSink for ConsoleSink {
    fn emit(&self, update: UiUpdate) {
        match update {
            UiUpdate::Progress { percent, step } => println!("[{:>3}%] {}", percent, step),
            UiUpdate::Notify(n) => println!("{}: {}", n.level, n.message),
            UiUpdate::Waveform { role, state } => {
                tracing::debug!("waveform {} -> {:?}", role, state)
            }
            UiUpdate::VideoPreview { bytes } => println!("Video preview ready ({} bytes)", bytes),
            UiUpdate::ServerLog(entry) if self.show_server_log => {
                println!("{} {:<7} {}", entry.timestamp, entry.level, entry.message)
            }
            UiUpdate::ServerLogCleared if self.show_server_log => println!("--- log cleared ---"),
            _ => {}
        }
    }
}

pub async fn execute(cli: Cli) -> Result<(), DeskError> {
    let mut settings = ClientSettings::from_env();
    if let Some(url) = cli.server.as_deref() {
        settings = settings.with_server_url(url);
    }

    let show_server_log = matches!(cli.command, Commands::Logs { .. } | Commands::Run);
    let sink: Arc<dyn UiSink> = Arc::new(
        EventHub::new()
            .with(Arc::new(TracingSink))
            .with(Arc::new(ConsoleSink { show_server_log })),
    );
    let session = Session::connect(settings, sink)?;
    tracing::info!("Using server {}", session.settings().server_url);

    let result = dispatch(&session, cli.command).await;
    session.shutdown();
    result
}

async fn dispatch(session: &Session, command: Commands) -> Result<(), DeskError> {
    match command {
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                let config = session.config().load().await?;
                println!("{}", serde_json::to_string_pretty(&config.redacted())?);
            }
            ConfigAction::Set { key, value } => {
                session.config().load().await?;
                let config = session.config().update(&key, &value).await?;
                session.config().save_now().await?;
                println!("{}", serde_json::to_string_pretty(&config.redacted())?);
            }
        },
        Commands::Upload { video } => {
            let token = cancel_on_ctrl_c();
            let receipt = session.upload_video(&video, &token).await?;
            println!("Uploaded {}", receipt.filename);
        }
        Commands::Process { watch } => {
            session.start_processing(&cancel_on_ctrl_c()).await?;
            if watch {
                tokio::select! {
                    _ = session.synchronizer().wait() => {}
                    _ = tokio::signal::ctrl_c() => {
                        println!("Stopped watching; the job keeps running on the server");
                    }
                }
            }
        }
        Commands::Status => match session.refresh().await {
            PollOutcome::Finished(status) => println!("Job {}", status),
            PollOutcome::Continue => {}
        },
        Commands::Segments => {
            session.refresh().await;
            print_table(session).await;
        }
        Commands::Edit {
            sequence,
            field,
            text,
        } => {
            session.refresh().await;
            let field: SegmentField = field.parse()?;
            let value = session.edit_cell(sequence, field, &text).await?;
            println!("Segment {} {} = {:?}", sequence, field, value);
        }
        Commands::Regenerate { sequence } => {
            session.refresh().await;
            session.regenerate(sequence).await?;
        }
        Commands::ImportSrt { file } => {
            let count = session.import_srt(&file).await?;
            println!("{} segments", count);
        }
        Commands::ExportSrt { dir, offline } => {
            if offline {
                session.refresh().await;
            }
            let target = session.export_srt(&dir, offline).await?;
            println!("{}", target.display());
        }
        Commands::Download { output } => {
            let bytes = session.download_video(&output).await?;
            println!("{} ({} bytes)", output.display(), bytes);
        }
        Commands::Preview => {
            session.preview_video().await?;
        }
        Commands::Models => {
            let status = session.models().await?;
            println!("Server: {}", status.status);
            for (name, info) in &status.models {
                let mark = if info.available { "ok" } else { "missing" };
                println!("  {:<20} {:<8} {}", name, mark, info.description);
            }
        }
        Commands::Logs { clear, follow } => {
            if clear {
                session.clear_logs().await?;
            }
            if follow {
                session.log_poller().start();
                let _ = tokio::signal::ctrl_c().await;
            } else if !clear {
                session
                    .log_poller()
                    .poll_once()
                    .await
                    .map_err(crate::session::SessionError::from)?;
            }
        }
        Commands::Run => interactive(session).await?,
    }
    Ok(())
}

/// Token that cancels when the user presses Ctrl-C.
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let watcher = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            watcher.cancel();
        }
    });
    token
}

async fn print_table(session: &Session) {
    match session.store().lock().await.render() {
        TableView::Placeholder(text) => println!("{}", text),
        TableView::Rows(rows) => {
            for row in rows {
                let cells: Vec<String> = row
                    .cells
                    .iter()
                    .filter(|cell| cell.field != SegmentField::Sequence)
                    .map(|cell| cell.text.replace('\n', " / "))
                    .collect();
                let band = row
                    .ratio_band
                    .map(|band| format!(" [{:?}]", band))
                    .unwrap_or_default();
                println!("{:>4} | {}{}", row.sequence, cells.join(" | "), band);
            }
        }
    }
}

const HELP: &str = "\
commands:
  status | segments
  edit <seq> <field> <text>
  insert [after-seq]
  delete <seq>
  regen <seq>
  start
  upload <path>
  import <path> | export [dir]
  reset
  quit";

async fn interactive(session: &Session) -> Result<(), DeskError> {
    session.log_poller().start();
    session.refresh().await;
    print_table(session).await;
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        let mut parts = line.trim().splitn(4, ' ');
        let command = parts.next().unwrap_or_default();
        let args: Vec<&str> = parts.collect();
        let outcome = match (command, args.as_slice()) {
            ("", _) => Ok(()),
            ("quit" | "exit", _) => break,
            ("help", _) => {
                println!("{}", HELP);
                Ok(())
            }
            ("status" | "segments", _) => {
                session.refresh().await;
                print_table(session).await;
                Ok(())
            }
            ("edit", [sequence, field, text]) => edit(session, sequence, field, text).await,
            ("insert", rest) => {
                let after = rest.first().and_then(|s| s.parse().ok());
                session
                    .insert_row(after)
                    .await
                    .map(|sequence| println!("Inserted segment {}", sequence))
                    .map_err(DeskError::from)
            }
            ("delete", [sequence]) => delete(session, sequence, &mut lines).await,
            ("regen", [sequence]) => match sequence.parse() {
                Ok(sequence) => session
                    .regenerate(sequence)
                    .await
                    .map(|_| ())
                    .map_err(DeskError::from),
                Err(_) => Err(DeskError::Usage(format!("not a sequence: {}", sequence))),
            },
            ("start", _) => session
                .start_processing(&CancellationToken::new())
                .await
                .map(|_| ())
                .map_err(DeskError::from),
            ("upload", [path]) => session
                .upload_video(Path::new(path), &CancellationToken::new())
                .await
                .map(|_| ())
                .map_err(DeskError::from),
            ("import", [path]) => session
                .import_srt(Path::new(path))
                .await
                .map(|_| ())
                .map_err(DeskError::from),
            ("export", rest) => {
                let dir = rest.first().copied().unwrap_or(".");
                session
                    .export_srt(Path::new(dir), false)
                    .await
                    .map(|_| ())
                    .map_err(DeskError::from)
            }
            ("reset", _) => {
                session.reset().await;
                Ok(())
            }
            _ => Err(DeskError::Usage(format!("unknown command: {}", line.trim()))),
        };

        if let Err(e) = outcome {
            println!("error: {}", e);
        }
    }

    Ok(())
}

async fn edit(session: &Session, sequence: &str, field: &str, text: &str) -> Result<(), DeskError> {
    let sequence: u32 = sequence
        .parse()
        .map_err(|_| DeskError::Usage(format!("not a sequence: {}", sequence)))?;
    let field: SegmentField = field.parse()?;
    // Literal "\n" in the REPL stands for a line break in multi-line cells
    let text = text.replace("\\n", "\n");
    session.edit_cell(sequence, field, &text).await?;
    Ok(())
}

async fn delete<R>(
    session: &Session,
    sequence: &str,
    lines: &mut tokio::io::Lines<R>,
) -> Result<(), DeskError>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    let sequence: u32 = sequence
        .parse()
        .map_err(|_| DeskError::Usage(format!("not a sequence: {}", sequence)))?;

    println!("Delete segment {}? [y/N]", sequence);
    let answer = lines.next_line().await?.unwrap_or_default();
    let confirmed = matches!(answer.trim(), "y" | "Y" | "yes");
    let gate = move |_: &str| confirmed;

    if session.delete_row(sequence, &gate).await? {
        println!("Deleted segment {}", sequence);
    }
    Ok(())
}

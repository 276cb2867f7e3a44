//! EchoNote CLI
//!
//! Reads a conversation transcript line by line (from a file or stdin) and
//! keeps an up-to-date list of tasks, appointments, places and deadlines.

use clap::Parser;
use echonote::config::{echonote_home, ExtractorConfig};
use echonote::render::{render_fact_set, FactSummary};
use echonote::{
    EchoNoteConfig, EchoNoteError, Extractor, KeywordExtractor, LlmExtractor, MemoryStore,
    ProcessOutcome,
};
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// EchoNote - turn conversation into tasks, appointments and deadlines
#[derive(Parser, Debug)]
#[command(name = "echonote")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Use the offline keyword extractor instead of the hosted model
    #[arg(long)]
    offline: bool,

    /// Path to config.toml (default: ~/.echonote/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the extraction model
    #[arg(long)]
    model: Option<String>,

    /// Override the API base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Print the fact set as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output: show merge reports and debug logs
    #[arg(short, long)]
    verbose: bool,

    /// Transcript file to read; stdin when omitted
    file: Option<PathBuf>,
}

/// Commands recognised on their own input line
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Quit,
    Reset,
    Show,
    Retry,
    Speech(String),
}

impl Command {
    fn parse(line: &str) -> Option<Self> {
        let trimmed = line.trim();
        match trimmed {
            "" => None,
            "/quit" | "/exit" => Some(Self::Quit),
            "/reset" | "/clear" => Some(Self::Reset),
            "/show" => Some(Self::Show),
            "/retry" => Some(Self::Retry),
            _ => Some(Self::Speech(trimmed.to_string())),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let mut config = EchoNoteConfig::new(echonote_home()?)
        .with_offline(cli.offline)
        .with_json_output(cli.json)
        .with_verbose(cli.verbose);
    if let Some(path) = cli.config.clone() {
        config = config.with_config_file(path);
    }
    info!(
        "EchoNote home: {}, config: {}",
        config.home.display(),
        config.config_file.display()
    );

    let extractor = build_extractor(&cli, &config).await?;
    let store = MemoryStore::new(extractor);

    let (line_tx, line_rx) = mpsc::channel::<String>(32);
    spawn_reader(cli.file.clone(), line_tx);

    run(store, &config, line_rx).await
}

async fn build_extractor(cli: &Cli, config: &EchoNoteConfig) -> anyhow::Result<Arc<dyn Extractor>> {
    if config.offline {
        info!("Using offline keyword extractor");
        return Ok(Arc::new(KeywordExtractor::new()));
    }

    let mut extractor_config = ExtractorConfig::load(&config.config_file).await?;
    if let Some(model) = &cli.model {
        extractor_config = extractor_config.with_model(model);
    }
    if let Some(base_url) = &cli.base_url {
        extractor_config = extractor_config.with_base_url(base_url);
    }

    Ok(Arc::new(LlmExtractor::new(&extractor_config)?))
}

/// Read transcript lines on a blocking thread
fn spawn_reader(file: Option<PathBuf>, tx: mpsc::Sender<String>) {
    std::thread::spawn(move || {
        let reader: Box<dyn BufRead> = match file {
            Some(path) => match std::fs::File::open(&path) {
                Ok(f) => Box::new(BufReader::new(f)),
                Err(e) => {
                    eprintln!("Error opening {}: {}", path.display(), e);
                    return;
                }
            },
            None => Box::new(io::stdin().lock()),
        };

        for line in reader.lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    eprintln!("Error reading input: {}", e);
                    break;
                }
            }
        }
    });
}

/// Append a spoken line to the accumulated transcript
fn append_line(transcript: &mut String, line: &str) {
    if !transcript.is_empty() {
        transcript.push(' ');
    }
    transcript.push_str(line);
}

async fn run(
    store: MemoryStore,
    config: &EchoNoteConfig,
    mut line_rx: mpsc::Receiver<String>,
) -> anyhow::Result<()> {
    let mut transcript = String::new();

    while let Some(line) = line_rx.recv().await {
        let Some(command) = Command::parse(&line) else {
            continue;
        };

        match command {
            Command::Quit => break,
            Command::Reset => {
                store.reset().await;
                transcript.clear();
                print_status(&status_line("Cleared all notes", false))?;
                continue;
            }
            Command::Show => {
                print_facts(&store, config, &transcript).await?;
                continue;
            }
            Command::Retry => {}
            Command::Speech(text) => append_line(&mut transcript, &text),
        }

        match store.process(&transcript).await {
            Ok(ProcessOutcome::Skipped) => {}
            Ok(ProcessOutcome::Discarded) => {
                warn!("Extraction result discarded after reset");
            }
            Ok(ProcessOutcome::Incremental(report)) => {
                if config.verbose {
                    info!("Merge report: {:?}", report);
                }
                if !report.is_noop() {
                    print_facts(&store, config, &transcript).await?;
                }
            }
            Ok(ProcessOutcome::Full { .. }) => {
                print_facts(&store, config, &transcript).await?;
            }
            Err(EchoNoteError::Busy) => {
                warn!("Still processing previous input");
            }
            Err(e) => {
                error!("{}", e);
                let pending = store.has_pending(&transcript).await;
                print_status(&status_line("Extraction failed", pending))?;
            }
        }
    }

    Ok(())
}

/// Timestamped status line, flagged when transcript text is still unprocessed
fn status_line(message: &str, pending: bool) -> String {
    let mut line = format!("-- {} | {}", chrono::Local::now().format("%H:%M:%S"), message);
    if pending {
        line.push_str(" | updates pending; type /retry or keep talking to try again");
    }
    line
}

async fn print_facts(
    store: &MemoryStore,
    config: &EchoNoteConfig,
    transcript: &str,
) -> anyhow::Result<()> {
    let facts = store.facts().await;
    let pending = store.has_pending(transcript).await;
    let mut out = io::stdout().lock();
    if config.json_output {
        writeln!(out, "{}", serde_json::to_string_pretty(&facts)?)?;
    } else {
        let rendered = render_fact_set(&facts);
        if rendered.is_empty() {
            writeln!(out, "(nothing noted yet)")?;
        } else {
            writeln!(out, "{}", rendered)?;
        }
        writeln!(out, "{}", status_line(&FactSummary::of(&facts).to_string(), pending))?;
    }
    out.flush()?;
    Ok(())
}

fn print_status(line: &str) -> anyhow::Result<()> {
    let mut out = io::stdout().lock();
    writeln!(out, "{}", line)?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse() {
        let cli = Cli::try_parse_from([
            "echonote",
            "--offline",
            "--model",
            "llama3.1",
            "-v",
            "notes.txt",
        ])
        .unwrap();
        assert!(cli.offline);
        assert!(cli.verbose);
        assert_eq!(cli.model.as_deref(), Some("llama3.1"));
        assert_eq!(cli.file, Some(PathBuf::from("notes.txt")));
    }

    #[test]
    fn test_command_parse() {
        assert_eq!(Command::parse("   "), None);
        assert_eq!(Command::parse("/reset"), Some(Command::Reset));
        assert_eq!(Command::parse(" /quit "), Some(Command::Quit));
        assert_eq!(
            Command::parse("  I need to buy milk. "),
            Some(Command::Speech("I need to buy milk.".to_string()))
        );
    }

    #[test]
    fn test_append_line() {
        let mut transcript = String::new();
        append_line(&mut transcript, "I need to buy milk tomorrow.");
        append_line(&mut transcript, "I bought the milk.");
        assert_eq!(transcript, "I need to buy milk tomorrow. I bought the milk.");
    }

    #[test]
    fn test_status_line_marks_pending() {
        let idle = status_line("1 open tasks", false);
        assert!(idle.ends_with("| 1 open tasks"));
        assert!(!idle.contains("pending"));

        let pending = status_line("Extraction failed", true);
        assert!(pending.contains("| Extraction failed | updates pending"));
    }

    /// Fails every incremental call
    struct FlakyExtractor;

    #[async_trait::async_trait]
    impl Extractor for FlakyExtractor {
        async fn extract(&self, transcript: &str) -> echonote::Result<echonote::FactBundle> {
            KeywordExtractor::new().extract(transcript).await
        }

        async fn extract_incremental(
            &self,
            _delta: &str,
            _existing: &echonote::FactSet,
        ) -> echonote::Result<echonote::IncrementalUpdate> {
            Err(EchoNoteError::ExtractionFailed("connection reset".to_string()))
        }
    }

    #[tokio::test]
    async fn test_run_failure_leaves_delta_pending() {
        let store = MemoryStore::new(Arc::new(FlakyExtractor));
        let config = EchoNoteConfig::new(PathBuf::from("/tmp/echonote"));
        let (tx, rx) = mpsc::channel(8);
        tx.send("I need to buy milk tomorrow.".to_string()).await.unwrap();
        tx.send("I bought the milk.".to_string()).await.unwrap();
        drop(tx);

        run(store.clone(), &config, rx).await.unwrap();

        let transcript = "I need to buy milk tomorrow. I bought the milk.";
        assert!(store.has_pending(transcript).await);
        assert!(!store.facts().await.tasks[0].completed);
    }

    #[tokio::test]
    async fn test_run_offline_session() {
        let store = MemoryStore::new(Arc::new(KeywordExtractor::new()));
        let config = EchoNoteConfig::new(PathBuf::from("/tmp/echonote")).with_offline(true);
        let (tx, rx) = mpsc::channel(8);
        tx.send("I need to buy milk tomorrow.".to_string()).await.unwrap();
        tx.send("I bought the milk.".to_string()).await.unwrap();
        drop(tx);

        run(store.clone(), &config, rx).await.unwrap();

        let facts = store.facts().await;
        assert_eq!(facts.tasks.len(), 1);
        assert!(facts.tasks[0].completed);
    }
}

//! CLI entry point for `ezarc`.

use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};

use ezarc::engine::ArchiveEngine;
use ezarc::error::ArchiveError;
use ezarc::model::message::{Message, WantContents};
use ezarc::model::page::{PaginationSpec, SortOrder};

#[derive(Parser)]
#[command(
    name = "ezarc",
    version,
    about = "Query ezmlm-idx mailing list archives from the terminal",
    long_about = "Browse, thread and search the flat-file archives written by ezmlm-idx.\n\
                  Queries read the archive files directly; no database or index is built."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a config file (overrides $EZARC_CONFIG and defaults)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Lists root directory (overrides the configured one)
    #[arg(long, global = true, value_name = "DIR")]
    lists_root: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, ValueEnum)]
enum ContentsArg {
    None,
    Abstract,
    Full,
}

impl From<ContentsArg> for WantContents {
    fn from(arg: ContentsArg) -> Self {
        match arg {
            ContentsArg::None => WantContents::None,
            ContentsArg::Abstract => WantContents::Abstract,
            ContentsArg::Full => WantContents::Full,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List archived messages
    Messages {
        list: String,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long)]
        limit: Option<usize>,
        /// Newest first
        #[arg(long)]
        desc: bool,
        #[arg(long, value_enum, default_value = "none")]
        contents: ContentsArg,
        #[arg(long)]
        json: bool,
    },
    /// Show the latest messages, newest first
    Latest {
        list: String,
        /// How many (defaults to the configured limit)
        count: Option<usize>,
        #[arg(long, value_enum, default_value = "abstract")]
        contents: ContentsArg,
        #[arg(long)]
        json: bool,
    },
    /// Show a single message
    Message {
        list: String,
        id: u64,
        #[arg(long, value_enum, default_value = "full")]
        contents: ContentsArg,
        /// Show the following message instead
        #[arg(long, conflicts_with = "previous")]
        next: bool,
        /// Show the preceding message instead
        #[arg(long)]
        previous: bool,
        #[arg(long)]
        json: bool,
    },
    /// List discussion threads
    Threads {
        list: String,
        /// Wildcard subject filter, e.g. '*orchid*'
        #[arg(long)]
        pattern: Option<String>,
        /// Resolve first/last messages and thread author
        #[arg(long)]
        details: bool,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long)]
        limit: Option<usize>,
        /// Oldest activity first
        #[arg(long)]
        asc: bool,
        #[arg(long)]
        json: bool,
    },
    /// Show a single thread by subject hash
    Thread {
        list: String,
        hash: String,
        #[arg(long)]
        details: bool,
        #[arg(long)]
        json: bool,
    },
    /// Full-text search across message bodies
    Search {
        list: String,
        pattern: String,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long)]
        limit: Option<usize>,
        /// Newest first
        #[arg(long)]
        desc: bool,
        #[arg(long, value_enum, default_value = "none")]
        contents: ContentsArg,
        #[arg(long)]
        json: bool,
    },
    /// List the messages of one calendar month (YYYYMM)
    Month {
        list: String,
        month: String,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        desc: bool,
        #[arg(long)]
        json: bool,
    },
    /// Message counts per year and month
    Calendar {
        list: String,
        #[arg(long)]
        json: bool,
    },
    /// Show an author's posting history by author hash
    Author {
        list: String,
        hash: String,
        #[arg(long)]
        json: bool,
    },
    /// Extract an attachment into the cache and print its path
    Attachment {
        list: String,
        id: u64,
        filename: String,
        /// Re-extract even if already cached
        #[arg(long)]
        force: bool,
        /// Copy the extracted file here as well
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show archive statistics
    Stats {
        list: String,
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => ezarc::config::load_config_from(path)?,
        None => ezarc::config::load_config(),
    };
    if let Some(root) = &cli.lists_root {
        config.general.lists_root = root.clone();
    }

    // Configure logging: stderr + log file in the cache dir
    let log_level = match cli.verbose {
        0 => config.general.log_level.clone(),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    setup_logging(&log_level, &config);

    match cli.command {
        Commands::Messages {
            list,
            offset,
            limit,
            desc,
            contents,
            json,
        } => {
            let engine = ArchiveEngine::new(&config, &list);
            let spec = PaginationSpec {
                sort: sort_of(desc),
                offset,
                limit,
            };
            let result = engine.get_all_messages(&spec, contents.into())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!();
                println!("  {} message(s) archived, showing {}", result.total, result.data.len());
                print_message_table(&result.data);
            }
            Ok(())
        }
        Commands::Latest {
            list,
            count,
            contents,
            json,
        } => {
            let engine = ArchiveEngine::new(&config, &list);
            let messages = engine.get_latest_messages(count, contents.into())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&messages)?);
            } else {
                print_message_table(&messages);
            }
            Ok(())
        }
        Commands::Message {
            list,
            id,
            contents,
            next,
            previous,
            json,
        } => {
            let engine = ArchiveEngine::new(&config, &list);
            let message = if next {
                engine.next_message(id, contents.into())?
            } else if previous {
                engine.previous_message(id, contents.into())?
            } else {
                engine.get_message(id, contents.into())?
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&message)?);
            } else {
                print_message_detail(&message);
            }
            Ok(())
        }
        Commands::Threads {
            list,
            pattern,
            details,
            offset,
            limit,
            asc,
            json,
        } => {
            let engine = ArchiveEngine::new(&config, &list);
            let spec = PaginationSpec {
                sort: if asc {
                    SortOrder::Ascending
                } else {
                    SortOrder::Descending
                },
                offset,
                limit,
            };
            let result = engine.list_threads(pattern.as_deref(), &spec, details)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!();
                println!("  {} thread(s), showing {}", result.total, result.data.len());
                println!();
                println!("  {:<22} {:>6} {:>6} {:<6} Subject", "Hash", "First", "Last", "Msgs");
                println!("  {}", "-".repeat(78));
                for t in &result.data {
                    println!(
                        "  {:<22} {:>6} {:>6} {:<6} {}",
                        t.subject_hash,
                        t.first_message_id,
                        t.last_message_id,
                        t.message_count,
                        truncate(&t.subject, 38)
                    );
                }
                println!();
            }
            Ok(())
        }
        Commands::Thread {
            list,
            hash,
            details,
            json,
        } => {
            let engine = ArchiveEngine::new(&config, &list);
            let thread = engine.get_thread(&hash, details)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&thread)?);
            } else {
                println!();
                println!("  Subject      {}", thread.subject);
                println!("  Hash         {}", thread.subject_hash);
                println!("  Messages     {}", thread.message_count);
                println!(
                    "  Range        {} .. {}",
                    thread.first_message_id, thread.last_message_id
                );
                if let Some(author) = &thread.author {
                    println!("  Started by   {author}");
                }
                println!();
            }
            Ok(())
        }
        Commands::Search {
            list,
            pattern,
            offset,
            limit,
            desc,
            contents,
            json,
        } => {
            let engine = ArchiveEngine::new(&config, &list);
            let spec = PaginationSpec {
                sort: sort_of(desc),
                offset,
                limit,
            };

            let pb = ProgressBar::new(0);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} Verifying [{bar:40.cyan/blue}] {pos}/{len}")
                    .expect("valid template")
                    .progress_chars("#>-"),
            );
            let progress = |done: usize, total: usize| {
                pb.set_length(total as u64);
                pb.set_position(done as u64);
                true
            };

            let result =
                engine.search_messages(&pattern, &spec, contents.into(), Some(&progress))?;
            pb.finish_and_clear();

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!();
                println!("  {} match(es), showing {}", result.total, result.data.len());
                print_message_table(&result.data);
            }
            Ok(())
        }
        Commands::Month {
            list,
            month,
            offset,
            limit,
            desc,
            json,
        } => {
            let engine = ArchiveEngine::new(&config, &list);
            let spec = PaginationSpec {
                sort: sort_of(desc),
                offset,
                limit,
            };
            let messages = engine.month_messages(&month, &spec, WantContents::None)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&messages)?);
            } else {
                print_message_table(&messages);
            }
            Ok(())
        }
        Commands::Calendar { list, json } => {
            let engine = ArchiveEngine::new(&config, &list);
            let cal = engine.calendar()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&cal)?);
            } else {
                println!();
                println!(
                    "  Year   Jan   Feb   Mar   Apr   May   Jun   Jul   Aug   Sep   Oct   Nov   Dec"
                );
                println!("  {}", "-".repeat(78));
                for (year, by_month) in cal.iter().rev() {
                    print!("  {year}");
                    for m in 1..=12u32 {
                        match by_month.get(&m) {
                            Some(count) => print!("{count:>6}"),
                            None => print!("{:>6}", "."),
                        }
                    }
                    println!();
                }
                println!();
            }
            Ok(())
        }
        Commands::Author { list, hash, json } => {
            let engine = ArchiveEngine::new(&config, &list);
            let listing = engine.author_messages(&hash)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&listing)?);
            } else {
                println!();
                println!("  {} ({})", listing.author_name, listing.author_hash);
                println!();
                for m in &listing.messages {
                    println!(
                        "  {:>6}  {}  {}",
                        m.message_id,
                        m.year_month,
                        truncate(&m.subject, 56)
                    );
                }
                println!();
            }
            Ok(())
        }
        Commands::Attachment {
            list,
            id,
            filename,
            force,
            output,
        } => {
            let engine = ArchiveEngine::new(&config, &list);
            let cached = engine.get_attachment(id, &filename, force)?;
            println!("{}", cached.display());
            if let Some(out) = output {
                std::fs::copy(&cached, &out)?;
                println!("{}", out.display());
            }
            Ok(())
        }
        Commands::Stats { list, json } => {
            let engine = ArchiveEngine::new(&config, &list);
            cmd_stats(&engine, json)
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "ezarc", &mut std::io::stdout());
            Ok(())
        }
        Commands::Manpage => {
            let cmd = Cli::command();
            let man = clap_mangen::Man::new(cmd);
            let mut buf = Vec::new();
            man.render(&mut buf)?;
            std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
            Ok(())
        }
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &ezarc::config::Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = ezarc::config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "ezarc.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

fn sort_of(desc: bool) -> SortOrder {
    if desc {
        SortOrder::Descending
    } else {
        SortOrder::Ascending
    }
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Print a compact message table.
fn print_message_table(messages: &[Message]) {
    println!();
    if messages.is_empty() {
        println!("  (no messages)");
        println!();
        return;
    }
    println!(
        "  {:>6} {:<17} {:<24} Subject",
        "Id", "Date", "From"
    );
    println!("  {}", "-".repeat(78));
    for m in messages {
        let date = m
            .date
            .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        let from = if m.author_name.is_empty() {
            &m.author_email
        } else {
            &m.author_name
        };
        println!(
            "  {:>6} {:<17} {:<24} {}",
            m.id,
            date,
            truncate(from, 24),
            truncate(&m.subject, 30)
        );
    }
    println!();
}

/// Print one message with its contents.
fn print_message_detail(m: &Message) {
    println!();
    println!("  Message      {}", m.id);
    println!("  Subject      {}", m.subject);
    let date = m
        .date
        .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string());
    println!("  Date         {date}");
    if m.author_email.is_empty() {
        println!("  From         {}", m.author_name);
    } else {
        println!("  From         {} <{}>", m.author_name, m.author_email);
    }
    if !m.attachments.is_empty() {
        println!("  Attachments");
        for a in &m.attachments {
            println!("    - {} ({})", a.filename, a.content_type);
        }
    }
    if let Some(contents) = &m.contents {
        if let Some(text) = &contents.text {
            println!();
            for line in text.lines() {
                println!("  {line}");
            }
        }
    }
    println!();
}

/// Show archive statistics.
fn cmd_stats(engine: &ArchiveEngine, json: bool) -> anyhow::Result<()> {
    use humansize::{format_size, BINARY};

    let count = engine.count_all_messages()?;
    let layout = engine.layout();
    let subfolders = match layout.numbered_subfolders() {
        Ok(s) => s,
        Err(ArchiveError::ArchiveNotFound(_)) => Vec::new(),
        Err(e) => return Err(e.into()),
    };
    let archive_bytes = dir_size(&layout.archive_dir());
    let calendar = engine.calendar().unwrap_or_default();
    let years: Vec<i32> = calendar.keys().copied().collect();

    if json {
        let stats = serde_json::json!({
            "list": engine.list_name(),
            "message_count": count,
            "subfolders": subfolders.len(),
            "archive_size": archive_bytes,
            "years": years,
        });
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!();
        println!("  {:<20} {}", "List", engine.list_name());
        println!("  {:<20} {}", "Messages", count);
        println!("  {:<20} {}", "Subfolders", subfolders.len());
        println!(
            "  {:<20} {}",
            "Archive size",
            format_size(archive_bytes, BINARY)
        );
        if let (Some(first), Some(last)) = (years.first(), years.last()) {
            println!("  {:<20} {first} — {last}", "Active years");
        }
        println!();
    }
    Ok(())
}

/// Recursive directory size in bytes; unreadable entries count as zero.
fn dir_size(dir: &Path) -> u64 {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    let mut total = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            total += dir_size(&path);
        } else if let Ok(meta) = entry.metadata() {
            total += meta.len();
        }
    }
    total
}

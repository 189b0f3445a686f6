use anyhow::Result;
use appctl::{AppManager, ApplicationEntry, load_config};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file to use instead of the platform default
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the application catalog
    Discover {
        /// Ignore the cache and rescan every source
        #[arg(long)]
        refresh: bool,
    },
    /// List catalog entries by name
    List {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Show ranked matches for a name
    Find {
        query: String,
        #[arg(short, long)]
        threshold: Option<u8>,
    },
    /// Show everything known about the best match
    Info { query: String },
    /// Start the best match
    Launch {
        query: String,
        #[arg(short, long)]
        threshold: Option<u8>,
    },
    /// Stop running instances of an application
    Close {
        query: String,
        #[arg(short, long)]
        threshold: Option<u8>,
    },
}

#[derive(Serialize)]
struct Hit<'a> {
    id: String,
    score: u8,
    matched: &'a str,
    #[serde(flatten)]
    entry: &'a ApplicationEntry,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_entry(entry: &ApplicationEntry) {
    println!("{} ({})", entry.display_name, entry.kind);
    println!("  name:     {}", entry.name);
    println!("  path:     {}", entry.path);
    println!("  command:  {}", entry.launch_command);
    for (label, value) in [
        ("desc", &entry.description),
        ("location", &entry.install_location),
        ("publisher", &entry.publisher),
        ("version", &entry.version),
        ("icon", &entry.icon_path),
    ] {
        if !value.is_empty() {
            println!("  {label:<9} {value}");
        }
    }
}

fn run(args: Args) -> Result<bool> {
    let config = load_config(args.config)?;
    let mut manager = AppManager::new(config);

    if let Command::Discover { refresh: true } = args.command {
        manager.refresh();
    } else {
        manager.discover();
    }

    match args.command {
        Command::Discover { .. } => {
            let catalog = manager.catalog();
            if args.json {
                print_json(&catalog.entries())?;
            } else {
                println!("{} applications", catalog.len());
            }
        }
        Command::List { limit } => {
            let entries = manager.list(limit);
            if args.json {
                print_json(&entries)?;
            } else {
                for entry in entries {
                    println!("{:<40} {:<14} {}", entry.display_name, entry.kind.to_string(), entry.path);
                }
            }
        }
        Command::Find { query, threshold } => {
            let hits = manager.resolve(&query, threshold);
            if hits.is_empty() {
                let suggestions = manager.suggestions(&query);
                if args.json {
                    print_json(&suggestions)?;
                } else {
                    println!("No application found matching '{query}'");
                    for s in suggestions {
                        println!("  did you mean {} ({})?", s.name, s.score);
                    }
                }
                return Ok(false);
            }
            if args.json {
                let hits: Vec<Hit> = hits
                    .iter()
                    .map(|h| Hit { id: h.id.to_string(), score: h.score, matched: &h.matched, entry: h.entry })
                    .collect();
                print_json(&hits)?;
            } else {
                for hit in hits {
                    println!("{:>3}  {:<40} {}", hit.score, hit.entry.display_name, hit.entry.path);
                }
            }
        }
        Command::Info { query } => match manager.info(&query) {
            Some(entry) if args.json => print_json(entry)?,
            Some(entry) => print_entry(entry),
            None => {
                println!("No application found matching '{query}'");
                return Ok(false);
            }
        },
        Command::Launch { query, threshold } => {
            let result = manager.launch_by_name(&query, threshold);
            if args.json {
                print_json(&result)?;
            } else {
                println!("{}", result.message);
                for s in &result.suggestions {
                    println!("  did you mean {} ({})?", s.name, s.score);
                }
            }
            return Ok(result.success);
        }
        Command::Close { query, threshold } => {
            let result = manager.close_by_name(&query, threshold);
            if args.json {
                print_json(&result)?;
            } else {
                println!("{}", result.message);
            }
            return Ok(result.success);
        }
    }
    Ok(true)
}

fn main() -> Result<ExitCode> {
    env_logger::init();
    let args = Args::parse();

    let ok = run(args)?;
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

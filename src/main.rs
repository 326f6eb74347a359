use clap::{Parser, Subcommand, ValueEnum};
use qsf::container::{Container, ParseMode};
use qsf::discover::{self, ListOptions};
use qsf::extract::extract_line;
use qsf::format::NAME_LEN;
use qsf::writer::ContainerBuilder;
use std::fs::File;
use std::path::PathBuf;
use tracing::Level;

#[derive(Parser)]
#[command(name = "qsf", about = "The QSF section-container CLI", version)]
struct Cli {
    /// Log verbosity on stderr
    #[arg(long, value_enum, default_value_t = LogLevel::Warn, global = true)]
    log_level: LogLevel,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a container and print its section table
    Parse {
        input: PathBuf,
        /// Emit the report as JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Print one line of a section, counting lines from the section's end
    Extract {
        input: PathBuf,
        /// Section number as shown by `parse` (1-based)
        #[arg(short, long)]
        section: usize,
        /// Line number; line 1 is the last line of the section
        #[arg(short, long)]
        line: u32,
    },
    /// List directory entries, with optional permission and size filters
    List {
        root: PathBuf,
        /// Descend into subdirectories
        #[arg(short, long)]
        recursive: bool,
        /// Keep entries whose mode equals this mask (e.g. rwxr-xr-x)
        #[arg(short, long)]
        permissions: Option<String>,
        /// Keep regular files larger than this many bytes
        #[arg(long)]
        size_greater: Option<u64>,
    },
    /// Recursively find container files under a directory
    Findall {
        root: PathBuf,
        /// Emit the paths as JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Pack files into a new container, one section per input
    Pack {
        #[arg(short, long)]
        output: PathBuf,
        /// Version stamp for the new container (88-166)
        #[arg(long, default_value = "88")]
        version: u8,
        /// Section type code applied to every input (38, 60, 67, 72 or 75)
        #[arg(short = 't', long = "type", default_value = "72")]
        kind: u16,
        #[arg(short, long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(Level::from(cli.log_level))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {

        // ── Parse ────────────────────────────────────────────────────────────
        Commands::Parse { input, json } => {
            let mut file = File::open(&input)?;
            let container = Container::parse(&mut file, ParseMode::Strict)?;
            let report = container.report();
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("── QSF Container ────────────────────────────────────────");
                println!("  Path      {}", input.display());
                println!("  Version   {}", report.version);
                println!("  Sections  {}", report.section_count);
                println!("  Payload   {} bytes", container.payload_bytes());
                println!("{:>3}  {:<13} {:>5} {:>10} {:>10}", "#", "Name", "Type", "Offset", "Size");
                for s in &report.sections {
                    println!("{:>3}  {:<13} {:>5} {:>10} {:>10}", s.index, s.name, s.kind, s.offset, s.size);
                }
            }
        }

        // ── Extract ──────────────────────────────────────────────────────────
        Commands::Extract { input, section, line } => {
            let mut file = File::open(&input)?;
            let container = Container::parse(&mut file, ParseMode::Strict)?;
            let (offset, size) = container.locate(section)?;
            let bytes = extract_line(&mut file, offset, size, line)?;
            println!("{}", String::from_utf8_lossy(&bytes));
        }

        // ── List ─────────────────────────────────────────────────────────────
        Commands::List { root, recursive, permissions, size_greater } => {
            let permissions = match permissions.as_deref() {
                Some(s) => Some(discover::parse_permissions(s).ok_or_else(|| {
                    format!("invalid permission string '{s}' (expected e.g. rwxr-xr-x)")
                })?),
                None => None,
            };
            let opts = ListOptions { recursive, permissions, size_greater };
            for path in discover::list_entries(&root, &opts)? {
                println!("{}", path.display());
            }
        }

        // ── Findall ──────────────────────────────────────────────────────────
        Commands::Findall { root, json } => {
            let found = discover::find_containers(&root)?;
            if json {
                let paths: Vec<String> = found.iter().map(|p| p.display().to_string()).collect();
                println!("{}", serde_json::to_string_pretty(&paths)?);
            } else {
                for path in &found {
                    println!("{}", path.display());
                }
                println!("{} container file(s) found", found.len());
            }
        }

        // ── Pack ─────────────────────────────────────────────────────────────
        Commands::Pack { output, version, kind, input } => {
            let mut builder = ContainerBuilder::new(version);
            for path in &input {
                let data = std::fs::read(path)?;
                let name = path.file_name().unwrap().to_string_lossy();
                builder.add_section(truncate_name(&name), kind, &data)?;
                println!("  packed  {}", path.display());
            }
            builder.write_to_path(&output)?;
            println!("Created: {} ({} sections)", output.display(), builder.section_count());
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

/// Clip a file name to the 13 bytes a section name can hold, respecting
/// char boundaries.
fn truncate_name(name: &str) -> &str {
    if name.len() <= NAME_LEN {
        return name;
    }
    let mut end = NAME_LEN;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

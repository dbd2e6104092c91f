use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use lakehouse_kb::config::Settings;
use lakehouse_kb::io::LocalWorkbook;
use lakehouse_kb::loader::{LoadResult, Severity};
use lakehouse_kb::model::LakeEntry;
use lakehouse_kb::sync::KnowledgeBase;
use lakehouse_kb::views::{self, NoteSegment};
use lakehouse_kb::{KbError, Result};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    if let Err(error) = run(cli) {
        eprintln!("error: {error}");
        if let Some(remedy) = error.remedy() {
            eprintln!("hint: {remedy}");
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    init_logging(cli.verbose)?;

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(path) = cli.local_path {
        settings.local_path = path;
    }
    if cli.offline {
        settings.remote_enabled = false;
    }

    let session = || KnowledgeBase::from_settings(&settings);
    match cli.command {
        Command::Load => {
            let loaded = load(&mut session()?);
            print_summary(&loaded);
        }
        Command::Lakes => {
            let lakes = load(&mut session()?).lakes.unwrap_or_default();
            for summary in views::lake_summaries(&lakes) {
                match summary.description {
                    Some(description) => println!("{}\t{}", summary.name, description),
                    None => println!("{}", summary.name),
                }
            }
        }
        Command::Show { lake } => {
            let lakes = load(&mut session()?).lakes.unwrap_or_default();
            show_lake(&lakes, &lake)?;
        }
        Command::Reports => {
            let reports = load(&mut session()?).reports.unwrap_or_default();
            for report in reports.report_entries() {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    report.name,
                    report.workspace.unwrap_or_default(),
                    report.owner.unwrap_or_default(),
                    report.lake.unwrap_or_default(),
                    report.status.unwrap_or_default(),
                );
            }
        }
        Command::Analyze => {
            let lakes = load(&mut session()?).lakes.unwrap_or_default();
            let analysis = views::analyze(&lakes);
            println!("rows: {}", analysis.row_count);
            println!("columns: {}", analysis.columns.len());
            println!("missing values: {}", analysis.total_missing());
            for (column, count) in analysis.columns_with_gaps() {
                println!("  {column}: {count} missing");
            }
        }
        Command::Export { dir } => {
            let path = session()?.export_lakes(&dir)?;
            println!("exported {}", path.display());
        }
        Command::Add(args) => {
            let backend = session()?.add_lake_entry(&args.into_entry())?;
            println!("saved to {backend}");
        }
        Command::Push { csv } => {
            let backend = session()?.replace_lakes_from_csv(&csv)?;
            println!("saved to {backend}");
        }
        Command::Import { workbook } => {
            LocalWorkbook::new(&settings.local_path).import_from(&workbook)?;
            println!("imported {} into {}", workbook.display(), settings.local_path.display());
        }
    }
    Ok(())
}

fn init_logging(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| KbError::Logging(err.to_string()))
}

fn load(kb: &mut KnowledgeBase) -> LoadResult {
    let loaded = kb.load();
    for diagnostic in &loaded.diagnostics {
        let label = match diagnostic.severity {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        eprintln!("{label}: {diagnostic}");
    }
    loaded
}

fn print_summary(loaded: &LoadResult) {
    match loaded.backend {
        Some(backend) => println!("source: {backend}"),
        None => println!("source: none"),
    }
    println!("lakes: {}", loaded.lake_names.len());
    for name in &loaded.lake_names {
        println!("  {name}");
    }
    println!("reports: {}", loaded.report_names.len());
    for name in &loaded.report_names {
        println!("  {name}");
    }
}

fn show_lake(lakes: &lakehouse_kb::model::Table, lake: &str) -> Result<()> {
    let rows = views::find_lake(lakes, lake)?;
    println!("{lake}");
    if let Some(description) = rows.first().and_then(|row| row.description.as_ref()) {
        println!("{description}");
    }
    for folder in views::folders(&rows) {
        println!();
        println!("[{}] ({} linked)", folder.name, folder.link_count());
        for element in &folder.elements {
            match &element.url {
                Some(url) => println!("  - {} <{}>", element.name, url),
                None => println!("  - {}", element.name),
            }
        }
        if let Some(notes) = &folder.change_notes {
            for segment in views::note_segments(notes) {
                match segment {
                    NoteSegment::Text(text) => println!("  {}", text.trim()),
                    NoteSegment::Image(location) => println!("  [image] {location}"),
                }
            }
        }
    }
    Ok(())
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Browse and edit the LakeHouse / Report knowledge base."
)]
struct Cli {
    /// Settings file (defaults to ./lakehouse-kb.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the local fallback workbook.
    #[arg(long, global = true)]
    local_path: Option<PathBuf>,

    /// Never contact the remote spreadsheet.
    #[arg(long, global = true)]
    offline: bool,

    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load both tables and print where they came from.
    Load,
    /// List every lake with its description.
    Lakes,
    /// Show the folders, elements and change notes of one lake.
    Show { lake: String },
    /// List the reports.
    Reports,
    /// Print column statistics of the Lakes table.
    Analyze,
    /// Export the Lakes table as a date-stamped CSV file.
    Export {
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
    /// Append a record to the Lakes table and save it.
    Add(AddArgs),
    /// Replace the Lakes table with a CSV file and save it.
    Push { csv: PathBuf },
    /// Copy an Excel workbook over the local fallback workbook.
    Import { workbook: PathBuf },
}

#[derive(Args)]
struct AddArgs {
    #[arg(long)]
    lake: String,
    #[arg(long)]
    folder: String,
    #[arg(long)]
    element: String,
    #[arg(long)]
    url: Option<String>,
    /// Lake-level description.
    #[arg(long)]
    info: Option<String>,
    /// Folder-level change notes; may contain [IMAGE:...] markers.
    #[arg(long)]
    changes: Option<String>,
}

impl AddArgs {
    fn into_entry(self) -> LakeEntry {
        LakeEntry {
            folder: Some(self.folder),
            element: Some(self.element),
            url: self.url,
            description: self.info,
            change_notes: self.changes,
            ..LakeEntry::new(self.lake)
        }
    }
}

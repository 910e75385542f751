use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use xlsxide_pdf::{CompositionMode, Config, ErrorPolicy, convert_xlsx_to_zip};

/// Render one PDF per spreadsheet row and bundle them into a ZIP.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Input workbook (.xlsx); the first worksheet is used
    input: PathBuf,

    /// Output ZIP path [default: projetos_pdfs.zip next to the input]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also write each PDF individually into this directory
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Title printed at the top of every document
    #[arg(long)]
    title: Option<String>,

    /// Group columns into bordered sections, each starting at a column with this prefix
    #[arg(long, value_name = "MARKER")]
    sections: Option<String>,

    /// Skip records that fail to render instead of aborting the batch
    #[arg(long)]
    skip_errors: bool,

    /// TrueType font for body text (overrides XLSXIDE_FONT)
    #[arg(long)]
    font: Option<PathBuf>,

    /// TrueType font for labels and title (overrides XLSXIDE_FONT_BOLD)
    #[arg(long)]
    bold_font: Option<PathBuf>,

    /// Log progress (info level) unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

fn build_config(args: &Args) -> Result<Config, xlsxide_pdf::Error> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(title) = &args.title {
        config.title = title.clone();
    }
    if let Some(marker) = &args.sections {
        config.mode = CompositionMode::Sections {
            marker: marker.clone(),
        };
    }
    if args.font.is_some() {
        config.fonts.regular = args.font.clone();
    }
    if args.bold_font.is_some() {
        config.fonts.bold = args.bold_font.clone();
    }
    config.fonts = config.fonts.with_env();
    Ok(config)
}

fn main() -> ExitCode {
    let args = Args::parse();
    let default_level = if args.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();

    let config = match build_config(&args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let output = args.output.clone().unwrap_or_else(|| {
        args.input
            .parent()
            .map(|p| p.join("projetos_pdfs.zip"))
            .unwrap_or_else(|| PathBuf::from("projetos_pdfs.zip"))
    });
    let policy = if args.skip_errors {
        ErrorPolicy::Skip
    } else {
        ErrorPolicy::Abort
    };

    let archive = match convert_xlsx_to_zip(&args.input, &output, &config, policy) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(dir) = &args.out_dir
        && let Err(e) = archive.write_dir(dir)
    {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    println!("{} projects found", archive.len() + archive.skipped().len());
    for entry in archive.entries() {
        println!("  {} ({} page(s))", entry.file_name, entry.page_count);
    }
    for skipped in archive.skipped() {
        println!("  skipped {}: {}", skipped.name, skipped.error);
    }
    println!("Wrote {}", output.display());
    ExitCode::SUCCESS
}

use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};

use sitephoto_meta::exif::LittleExifWriter;
use sitephoto_meta::photo::PhotoInfo;
use sitephoto_meta::{config, exif, pipeline, xmp};

#[derive(Parser, Debug)]
#[command(
    name = "sitephoto-cli",
    version,
    about = "Embed EXIF tags and construction photo XMP metadata into JPEG files"
)]
struct Cli {
    /// JPEG files or directories to process
    #[arg(value_name = "PATH")]
    paths: Vec<PathBuf>,

    /// Photo info JSON to embed as XMP
    #[arg(long = "photo-info", value_name = "FILE")]
    photo_info: Option<PathBuf>,

    /// EXIF ImageDescription (overrides config)
    #[arg(long)]
    description: Option<String>,

    /// EXIF Model (overrides config)
    #[arg(long)]
    model: Option<String>,

    /// EXIF Software (overrides config)
    #[arg(long)]
    software: Option<String>,

    /// Path to config file (default: config.json next to binary)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Initialize a default config.json and exit
    #[arg(long)]
    init: bool,

    /// Preview changes without writing to files
    #[arg(long)]
    dry_run: bool,

    /// Output results as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Display the EXIF tags and embedded XMP packet and exit
    #[arg(long)]
    show: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Handle --init
    if cli.init {
        let config = config::Config::default();
        let path = cli.config.as_deref();
        config.save(path)?;
        let save_path = match path {
            Some(p) => p.to_path_buf(),
            None => config::Config::config_path()?,
        };
        println!("Default config written to {}", save_path.display());
        return Ok(());
    }

    if cli.paths.is_empty() {
        anyhow::bail!("No input files or directories specified. Use --help for usage.");
    }

    let images = pipeline::collect_images(&cli.paths);
    if images.is_empty() {
        anyhow::bail!("No JPEG files found in the specified paths.");
    }

    // Handle --show
    if cli.show {
        for image_path in &images {
            print_metadata(image_path)?;
        }
        return Ok(());
    }

    let mut config = config::Config::load(cli.config.as_deref())?;
    if cli.dry_run {
        config.output.dry_run = true;
    }
    if let Some(description) = cli.description {
        config.exif_tags.image_description = description;
    }
    if let Some(model) = cli.model {
        config.exif_tags.model = model;
    }
    if let Some(software) = cli.software {
        config.exif_tags.software = software;
    }

    let photo_info = cli
        .photo_info
        .as_deref()
        .map(PhotoInfo::load)
        .transpose()?;

    log::info!("Found {} image(s) to process", images.len());
    if config.output.dry_run {
        log::info!("DRY RUN, no files will be modified");
    }
    if photo_info.is_none() {
        log::info!("No --photo-info given, writing EXIF tags only");
    }

    let writer = LittleExifWriter;
    let mut results = Vec::new();
    let total = images.len();

    for (i, image_path) in images.iter().enumerate() {
        log::info!("[{}/{}] Processing: {}", i + 1, total, image_path.display());

        let result = pipeline::process_image(image_path, photo_info.as_ref(), &config, &writer);

        if let Some(ref err) = result.error {
            log::error!("  Error: {err}");
        } else if result.dry_run {
            let planned = if photo_info.is_some() { "exif, xmp" } else { "exif" };
            log::info!("  Would write: {planned}");
        } else {
            let mut written = Vec::new();
            if result.exif_written {
                written.push("exif");
            }
            if result.xmp_written {
                written.push("xmp");
            }
            log::info!("  Wrote: {}", written.join(", "));
            if let Some(ref backup) = result.backup_path {
                log::debug!("  Backup: {}", backup.display());
            }
        }

        results.push(result);
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    }

    let success = results.iter().filter(|r| r.error.is_none()).count();
    let failed = total - success;
    log::info!("Done: {success} succeeded, {failed} failed out of {total} images");

    Ok(())
}

// ANSI color codes
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

/// Max width for the value column before wrapping.
const VAL_WIDTH: usize = 46;
/// Indent for continuation lines (tag column width + " : " = 25 chars + 2 leading spaces).
const INDENT: &str = "                           ";

/// Print the EXIF tags this tool writes and the embedded XMP packet.
fn print_metadata(path: &Path) -> Result<()> {
    let data = exif::read_exif(path)?;

    println!();
    println!("{BOLD}File:{RESET} {}", path.display());
    println!("{DIM}{}{RESET}", "═".repeat(72));

    println!("  {BOLD}EXIF{RESET}");
    println!("  {DIM}{}{RESET}", "─".repeat(70));
    if data.is_empty() {
        println!("  {DIM}(no EXIF metadata found){RESET}");
    } else {
        let fields = [
            ("ImageDescription", data.image_description.as_deref()),
            ("Model", data.model.as_deref()),
            ("Software", data.software.as_deref()),
            ("DateTimeOriginal", data.date_time_original.as_deref()),
        ];
        for (tag, val) in fields {
            if let Some(v) = val {
                print_row(tag, v);
            }
        }
    }
    println!();

    println!("  {BOLD}XMP{RESET}");
    println!("  {DIM}{}{RESET}", "─".repeat(70));
    let bytes = std::fs::read(path)?;
    match xmp::extract_payload(&bytes) {
        Some(payload) => {
            for line in String::from_utf8_lossy(payload).lines() {
                println!("  {line}");
            }
        }
        None => println!("  {DIM}(no XMP packet found){RESET}"),
    }
    println!();

    Ok(())
}

/// Print a single row in the EXIF display table.
fn print_row(tag: &str, val: &str) {
    let tag_col = format!("{:<22}", tag);
    let lines = wrap_text(val, VAL_WIDTH);
    for (i, line) in lines.iter().enumerate() {
        if i == 0 {
            println!("  {tag_col} : {line}");
        } else {
            println!("  {INDENT}{line}");
        }
    }
}

/// Wrap text at word boundaries to fit within max_width.
fn wrap_text(s: &str, max_width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current_line = String::new();

    for word in s.split_whitespace() {
        if current_line.is_empty() {
            current_line = word.to_string();
        } else if current_line.len() + 1 + word.len() <= max_width {
            current_line.push(' ');
            current_line.push_str(word);
        } else {
            lines.push(current_line);
            current_line = word.to_string();
        }
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(s.to_string());
    }

    lines
}

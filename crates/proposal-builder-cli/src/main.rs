//! Proposal PDF CLI - fill, merge, render and convert PDFs from the command line.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use proposal_builder_core::{
    AppConfig, DocxConverter, FieldAnchor, FieldFiller, MatchMode, Placement, TextColor,
    merge_files, pdf::rasterize_file, pdf::encode_png,
};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PlacementOption {
    Inline,
    Below,
    Replace,
}

impl From<PlacementOption> for Placement {
    fn from(opt: PlacementOption) -> Self {
        match opt {
            PlacementOption::Inline => Self::Inline,
            PlacementOption::Below => Self::Below,
            PlacementOption::Replace => Self::Replace,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "proposal-pdf")]
#[command(author, version, about = "Fill, merge and render proposal PDFs", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Draw text next to anchor strings on one page
    Fill {
        /// Source PDF
        source: PathBuf,

        /// Output PDF
        #[arg(short, long)]
        output: PathBuf,

        /// Page to fill (1-based)
        #[arg(long, default_value_t = 1)]
        page: usize,

        /// Field as "Anchor=Text" (repeatable)
        #[arg(long = "field", required = true)]
        fields: Vec<String>,

        /// Where to draw the text relative to the anchor
        #[arg(long, value_enum, default_value = "inline")]
        placement: PlacementOption,

        /// Only fill the first occurrence of each anchor
        #[arg(long)]
        first: bool,

        /// Font size in points (estimated from the anchor when omitted)
        #[arg(long)]
        font_size: Option<f32>,

        /// Text color (black, dark-blue, dark-gray)
        #[arg(long)]
        color: Option<String>,
    },

    /// Concatenate PDFs in the given order
    Merge {
        /// Input PDFs
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output PDF
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Rasterize pages to PNG
    Render {
        /// Source PDF
        source: PathBuf,

        /// Pages to render (e.g., "1-5" or "1,3,5")
        #[arg(long, default_value = "1")]
        pages: String,

        /// Resolution (defaults to the configured preview DPI)
        #[arg(long)]
        dpi: Option<f32>,

        /// Output PNG; with several pages, "-<page>" is added to the stem
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Convert a PDF to Word with LibreOffice
    Convert {
        /// Source PDF
        pdf: PathBuf,

        /// Directory for the .docx (default: next to the PDF)
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
}

fn parse_field(field: &str) -> Result<(&str, &str)> {
    let Some((anchor, text)) = field.split_once('=') else {
        bail!("Invalid field {field:?}, expected \"Anchor=Text\"");
    };
    if anchor.is_empty() {
        bail!("Invalid field {field:?}, anchor is empty");
    }
    Ok((anchor, text))
}

fn parse_page_range(pages: &str) -> Result<Vec<usize>> {
    let mut result = Vec::new();

    for part in pages.split(',') {
        let part = part.trim();
        if let Some((start, end)) = part.split_once('-') {
            let start: usize = start.trim().parse().context("Invalid page range start")?;
            let end: usize = end.trim().parse().context("Invalid page range end")?;
            result.extend((start.max(1)..=end).map(|p| p - 1));
        } else {
            let page: usize = part.parse().context("Invalid page number")?;
            if page == 0 {
                bail!("Pages are numbered from 1");
            }
            result.push(page - 1);
        }
    }

    result.sort_unstable();
    result.dedup();
    Ok(result)
}

fn page_output(output: &Path, page: usize, several: bool) -> PathBuf {
    if !several {
        return output.to_path_buf();
    }
    let stem = output.file_stem().and_then(|s| s.to_str()).unwrap_or("page");
    output.with_file_name(format!("{stem}-{}.png", page + 1))
}

#[allow(clippy::print_stdout)]
async fn run(command: Command, config: AppConfig) -> Result<()> {
    match command {
        Command::Fill {
            source,
            output,
            page,
            fields,
            placement,
            first,
            font_size,
            color,
        } => {
            let mode = if first { MatchMode::First } else { MatchMode::All };
            let anchors = fields
                .iter()
                .map(|f| {
                    parse_field(f).map(|(anchor, text)| {
                        FieldAnchor::new(anchor, text)
                            .placement(placement.into())
                            .match_mode(mode)
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            let mut options = config.fill;
            if font_size.is_some() {
                options.font_size = font_size;
            }
            if let Some(name) = color {
                options.text_color =
                    TextColor::from_name(&name).with_context(|| format!("Unknown color {name:?}"))?;
            }

            let page = page.checked_sub(1).context("Pages are numbered from 1")?;
            let report = FieldFiller::new(options)
                .fill_file(&source, page, &anchors, &output)
                .with_context(|| format!("Failed to fill {}", source.display()))?;

            for missing in report.missing() {
                println!("Anchor not found: {missing:?}");
            }
            println!(
                "Filled {} field(s) on page {} of {}, saved to: {}",
                report.total_drawn(),
                page + 1,
                report.page_count,
                output.display()
            );
        }

        Command::Merge { inputs, output } => {
            let pages = merge_files(&inputs, &output).context("Failed to merge PDFs")?;
            println!("Merged {} file(s), {pages} page(s), saved to: {}", inputs.len(), output.display());
        }

        Command::Render {
            source,
            pages,
            dpi,
            output,
        } => {
            let dpi = dpi.unwrap_or(config.render.preview_dpi);
            let pages = parse_page_range(&pages)?;
            if pages.is_empty() {
                bail!("No pages to render");
            }
            let several = pages.len() > 1;

            for page in pages {
                let image = rasterize_file(&source, page, dpi)
                    .with_context(|| format!("Failed to render page {}", page + 1))?;
                let png = encode_png(&image).map_err(anyhow::Error::msg)?;
                let target = page_output(&output, page, several);
                std::fs::write(&target, png)
                    .with_context(|| format!("Failed to write output: {}", target.display()))?;
                info!("Rendered page {} at {dpi} dpi", page + 1);
                println!("Saved page {} to: {}", page + 1, target.display());
            }
        }

        Command::Convert { pdf, out_dir } => {
            let out_dir = match out_dir {
                Some(dir) => dir,
                None => pdf
                    .parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .map_or_else(|| PathBuf::from("."), Path::to_path_buf),
            };
            let docx = DocxConverter::from_config(&config.convert)
                .convert(&pdf, &out_dir)
                .await
                .with_context(|| format!("Failed to convert {}", pdf.display()))?;
            println!("Word document saved to: {}", docx.display());
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before parsing args so env vars are available)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let default_level = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    let config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path).context("Failed to load config file")?
    } else {
        AppConfig::load().context("Failed to load configuration")?
    };

    run(args.command, config).await
}

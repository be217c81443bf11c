//! `bannerswap` command-line editor.

use anyhow::{Context, Result, bail};
use bannerswap_app::{AppConfig, Controller};
use bannerswap_core::{DocumentLoader, LayerTrait, LoadedDocument};
use bannerswap_render::ExportFormat;
use clap::{Parser, Subcommand};
use kurbo::Point;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How long the CLI waits for a decode before giving up.
const LOAD_WAIT: Duration = Duration::from_secs(120);

#[derive(Parser, Debug)]
#[command(name = "bannerswap", version, about = "Replace banners on listing images and PDFs")]
struct Cli {
    /// Config file (JSON). Defaults to the user config directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Print the kind, size and page count of a listing file.
    Info { file: PathBuf },

    /// Place banners on a listing file and export the result.
    Edit {
        /// Listing image (JPG/PNG) or PDF.
        file: PathBuf,

        /// Banner image to place; repeat for several.
        #[arg(short, long = "banner", required = true)]
        banners: Vec<PathBuf>,

        /// PDF page to edit.
        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Top-left corner for the banners, as X,Y canvas pixels.
        #[arg(long, value_parser = parse_point)]
        at: Option<Point>,

        /// Extra scale applied to each placed banner.
        #[arg(long)]
        scale: Option<f64>,

        /// Output format: png, jpg or pdf.
        #[arg(short, long, default_value = "png")]
        format: String,

        /// Output directory.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

fn parse_point(s: &str) -> Result<Point, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y but got {s:?}"))?;
    let x: f64 = x.trim().parse().map_err(|e| format!("bad X: {e}"))?;
    let y: f64 = y.trim().parse().map_err(|e| format!("bad Y: {e}"))?;
    Ok(Point::new(x, y))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
    log::info!("Starting BannerSwap");

    let config = AppConfig::load_or_default(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        CliCommand::Info { file } => info(&config, &file),
        CliCommand::Edit {
            file,
            banners,
            page,
            at,
            scale,
            format,
            out,
        } => {
            let format = ExportFormat::from_name(&format)
                .with_context(|| format!("Unsupported output format {format:?}; use png, jpg or pdf"))?;
            let out = out
                .or_else(|| config.output_dir.clone())
                .unwrap_or_else(|| PathBuf::from("."));
            edit(config, &file, &banners, page, at, scale, format, &out)
        }
    }
}

#[cfg(feature = "pdfium")]
fn document_loader(config: &AppConfig) -> DocumentLoader {
    use bannerswap_core::PdfiumBackend;
    use std::sync::Arc;
    DocumentLoader::with_pdf_backend(Arc::new(PdfiumBackend::new(config.pdfium_library_path.clone())))
}

#[cfg(not(feature = "pdfium"))]
fn document_loader(_config: &AppConfig) -> DocumentLoader {
    log::warn!("Built without PDF support");
    DocumentLoader::images_only()
}

fn read_upload(path: &Path) -> Result<(String, Vec<u8>)> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .with_context(|| format!("{} is not a file", path.display()))?;
    Ok((filename, bytes))
}

fn info(config: &AppConfig, path: &Path) -> Result<()> {
    let (filename, bytes) = read_upload(path)?;
    let document = document_loader(config)
        .load(&filename, bytes)
        .with_context(|| format!("Failed to load {filename}"))?;
    match &document {
        LoadedDocument::Image { surface, .. } => {
            println!("{filename}: image, {}x{} px", surface.width(), surface.height());
        }
        LoadedDocument::Pdf(pdf) => {
            let first = pdf.get_page(1).context("Failed to read page 1")?;
            println!(
                "{filename}: PDF, {} page(s), page 1 is {:.0}x{:.0} pt",
                pdf.page_count(),
                first.size.width,
                first.size.height
            );
        }
    }
    Ok(())
}

/// Print notices raised by the controller.
fn report(controller: &mut Controller) {
    for notice in controller.take_notices() {
        eprintln!("{notice}");
    }
}

fn wait(controller: &mut Controller) -> Result<()> {
    let idle = controller.wait_idle(LOAD_WAIT);
    for timeout in controller.take_timeouts() {
        log::warn!("{timeout}");
    }
    report(controller);
    if !idle {
        bail!("Timed out waiting for the upload to decode");
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn edit(
    config: AppConfig,
    path: &Path,
    banners: &[PathBuf],
    page: u32,
    at: Option<Point>,
    scale: Option<f64>,
    format: ExportFormat,
    out: &Path,
) -> Result<()> {
    let loader = document_loader(&config);
    let mut controller = Controller::new(config, loader);

    let (filename, bytes) = read_upload(path)?;
    let result = controller.upload_document(&filename, bytes);
    report(&mut controller);
    result.with_context(|| format!("Failed to load {filename}"))?;
    wait(&mut controller)?;
    if controller.document().is_none() {
        bail!("Failed to load {filename}");
    }

    if page != 1 {
        let result = controller.go_to_page(page);
        report(&mut controller);
        result.with_context(|| format!("Failed to show page {page}"))?;
    }

    for banner_path in banners {
        let (banner_name, bytes) = read_upload(banner_path)?;
        let before = controller.gallery().len();
        let result = controller.upload_banner(&banner_name, bytes);
        report(&mut controller);
        result.with_context(|| format!("Failed to load banner {banner_name}"))?;
        wait(&mut controller)?;

        let banner_id = match controller.gallery().latest() {
            Some(banner) if controller.gallery().len() > before => banner.id.clone(),
            _ => bail!("Failed to load banner {banner_name}"),
        };
        let id = controller.place_banner(&banner_id)?;

        if let Some(factor) = scale {
            controller.scale_selected(factor)?;
        }
        if let Some(target) = at {
            let origin = controller
                .session()
                .document()
                .get_layer(id)
                .map(|layer| layer.bounds().origin())
                .unwrap_or(target);
            controller.move_selected(target - origin)?;
        }
    }

    let result = controller.export(format);
    report(&mut controller);
    let output = result.context("Export failed")?;

    std::fs::create_dir_all(out).with_context(|| format!("Failed to create {}", out.display()))?;
    let target = out.join(&output.filename);
    std::fs::write(&target, &output.bytes).with_context(|| format!("Failed to write {}", target.display()))?;
    println!("Saved {} ({}x{})", target.display(), output.width, output.height);
    Ok(())
}

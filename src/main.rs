use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser};
use form_ocr::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "form-ocr",
    version,
    about = "OCR fixed fields of a scanned form and preview the result"
)]
struct Cli {
    /// Path to the input image
    #[arg(short = 'i', long = "image", required_unless_present = "show_languages")]
    image: Option<PathBuf>,

    /// Region catalog (TOML or JSON) replacing the built-in field layout
    #[arg(short = 'c', long = "catalog")]
    catalog: Option<PathBuf>,

    /// Also write the annotated image to this path (png, jpg, bmp, gif, webp, tiff)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Output format for the extracted fields
    #[arg(short = 'f', long = "format", value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<PathBuf>,

    /// Do not open the preview images
    #[arg(long = "no-display")]
    no_display: bool,

    /// Show languages installed for tesseract and exit
    #[arg(long = "show-languages")]
    show_languages: bool,

    /// Enable logging on stderr (repeat for more detail)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    form_ocr::logging::init(cli.verbose)?;
    form_ocr::run(form_ocr::Config {
        image: cli.image,
        catalog_path: cli.catalog,
        output: cli.output,
        format: cli.format,
        settings_path: cli.read_settings,
        no_display: cli.no_display,
        show_languages: cli.show_languages,
    })
}

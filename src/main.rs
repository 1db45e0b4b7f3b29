//! edv - Experiment Display Visualizer
//!
//! Places a screenshot of an experiment display onto a photo of the
//! physical setup. The display is perspective-warped onto the four corners
//! a template defines, blended through the template's mask and then saved
//! or shown.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use edv::config::{Config, Quad};
use edv::error::EdvError;
use edv::template::{self, Template};
use edv::{composite, output, transform};

/// edv - place an experiment display into a setup photo
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Template to be used
    #[arg(short, long, required_unless_present = "list")]
    template: Option<String>,

    /// Display image to be transformed onto the base image
    #[arg(short, long, required_unless_present = "list")]
    display: Option<PathBuf>,

    /// Brightness adjustment; 0 is full black, values larger than one increase brightness
    #[arg(short, long)]
    brightness: Option<f64>,

    /// Output filename; defaults to the display filename with the configured prefix
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Show the image instead of saving it
    #[arg(short, long)]
    show: bool,

    /// Directory containing the templates (overrides the config file)
    #[arg(long)]
    templates_dir: Option<PathBuf>,

    /// Configuration file path
    #[arg(short, long, default_value = "edv.toml")]
    config: PathBuf,

    /// Print the solved transform coefficients as JSON
    #[arg(long)]
    print_coeffs: bool,

    /// List the available templates and exit
    #[arg(long)]
    list: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if args.verbose { "debug" } else { "info" }));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    debug!("edv v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&args) {
        error!("{:#}", e);
        return Err(e);
    }
    Ok(())
}

fn run(args: &Args) -> Result<()> {
    let config = Config::load_or_default(&args.config)?;
    let templates_dir = args
        .templates_dir
        .clone()
        .unwrap_or_else(|| config.templates.dir.clone());

    if args.list {
        let names = template::list_templates(&templates_dir)
            .with_context(|| format!("Failed to list templates in {:?}", templates_dir))?;
        for name in names {
            println!("{}", name);
        }
        return Ok(());
    }

    let (Some(template_name), Some(display_path)) = (&args.template, &args.display) else {
        bail!("both --template and --display are required");
    };

    let display_img = load_display(display_path)?;
    let (width, height) = display_img.dimensions();
    info!("Display {:?} ({}x{})", display_path, width, height);

    let template = Template::load(&templates_dir, template_name)
        .with_context(|| format!("Failed to load template {:?}", template_name))?;

    // Source corners cover the whole display
    let source = Quad::from_size(width, height);
    let coeffs = transform::solve(&source, template.target())
        .with_context(|| format!("Template {:?} has unusable corners", template_name))?;

    if args.print_coeffs {
        println!("{}", serde_json::to_string(&coeffs)?);
    }

    let result = composite::composite(&display_img, &template, &coeffs, args.brightness)?;

    if args.show {
        output::show(&result, config.output.viewer.as_deref()).context("Failed to show image")?;
    } else {
        let out = match &args.out {
            Some(path) => path.clone(),
            None => output::default_output_path(display_path, &config.output.prefix)?,
        };
        output::save(&result, &out).with_context(|| format!("Failed to save {:?}", out))?;
    }

    Ok(())
}

fn load_display(path: &Path) -> Result<image::RgbaImage> {
    if !path.exists() {
        return Err(EdvError::not_found(path).into());
    }
    let display = image::open(path)
        .map_err(EdvError::from)
        .with_context(|| format!("Failed to read display {:?}", path))?;
    Ok(display.to_rgba8())
}

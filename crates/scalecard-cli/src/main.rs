//! scalecard CLI — create card templates and detect them in target images.

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

use scalecard::{locate_reference, LocateConfig, ReferenceTemplate};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "scalecard")]
#[command(about = "Locate a scale reference card in specimen photographs and derive px/mm ratios")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crop a card template from a calibration photo and compute its px/mm
    /// ratio from a measured distance.
    CreateTemplate(CreateTemplateArgs),

    /// Detect the reference card in a target image.
    Detect(DetectArgs),
}

#[derive(Debug, Clone, Args)]
struct CreateTemplateArgs {
    /// Calibration photo containing the card.
    #[arg(long)]
    image: PathBuf,

    /// Left edge of the card crop (pixels).
    #[arg(long)]
    crop_x: u32,
    /// Top edge of the card crop (pixels).
    #[arg(long)]
    crop_y: u32,
    /// Crop width (pixels).
    #[arg(long)]
    crop_width: u32,
    /// Crop height (pixels).
    #[arg(long)]
    crop_height: u32,

    /// First measured point x, in crop coordinates.
    #[arg(long)]
    p1_x: f64,
    /// First measured point y, in crop coordinates.
    #[arg(long)]
    p1_y: f64,
    /// Second measured point x, in crop coordinates.
    #[arg(long)]
    p2_x: f64,
    /// Second measured point y, in crop coordinates.
    #[arg(long)]
    p2_y: f64,
    /// Physical distance between the two points in millimeters.
    #[arg(long)]
    distance_mm: f64,

    /// Path for the template PNG; a JSON manifest is written alongside.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Debug, Clone, Args)]
struct DetectArgs {
    /// Template image (from create-template).
    #[arg(long)]
    template: PathBuf,

    /// Template px/mm ratio. When omitted, the manifest next to the
    /// template is read instead.
    #[arg(long)]
    px_mm_ratio: Option<f64>,

    /// Target image to calibrate.
    #[arg(long)]
    image: PathBuf,

    /// Path to write the detection result (JSON).
    #[arg(long)]
    out: PathBuf,

    /// Minimum keypoint matches for a detection.
    #[arg(long, default_value = "10")]
    min_matches: usize,

    /// Uniform target resize factor (1.0 = auto-downscale large images).
    #[arg(long, default_value = "1.0")]
    resize: f64,

    /// Histogram-match the target to the template on success.
    #[arg(long)]
    equalize: bool,

    /// Path to write the equalized image (implies --equalize).
    #[arg(long)]
    equalized_out: Option<PathBuf>,

    /// Skip the card exclusion polygon.
    #[arg(long)]
    no_mask: bool,

    /// Lowe ratio-test threshold.
    #[arg(long, default_value = "0.7")]
    lowe_ratio: f32,

    /// RANSAC inlier threshold in pixels.
    #[arg(long, default_value = "5.0")]
    ransac_thresh_px: f64,

    /// Maximum RANSAC iterations.
    #[arg(long, default_value = "2000")]
    ransac_iters: usize,

    /// FAST-9 corner threshold.
    #[arg(long, default_value = "20")]
    fast_threshold: u8,
}

/// Sidecar manifest written next to the template PNG.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct TemplateManifest {
    px_mm_ratio: f64,
    /// Template dimensions [width, height].
    size: [u32; 2],
}

fn manifest_path(template: &Path) -> PathBuf {
    template.with_extension("json")
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::CreateTemplate(args) => run_create_template(&args),
        Commands::Detect(args) => run_detect(&args),
    }
}

// ── create-template ────────────────────────────────────────────────────

fn run_create_template(args: &CreateTemplateArgs) -> CliResult<()> {
    let photo = image::open(&args.image)
        .map_err(|e| -> CliError {
            format!("failed to open image {}: {}", args.image.display(), e).into()
        })?
        .to_rgb8();

    let (w, h) = photo.dimensions();
    if args.crop_width == 0
        || args.crop_height == 0
        || args.crop_x + args.crop_width > w
        || args.crop_y + args.crop_height > h
    {
        return Err(format!(
            "crop {}x{}+{}+{} does not fit the {}x{} image",
            args.crop_width, args.crop_height, args.crop_x, args.crop_y, w, h
        )
        .into());
    }

    let crop = image::imageops::crop_imm(
        &photo,
        args.crop_x,
        args.crop_y,
        args.crop_width,
        args.crop_height,
    )
    .to_image();

    let template = ReferenceTemplate::from_measurement(
        crop,
        [args.p1_x, args.p1_y],
        [args.p2_x, args.p2_y],
        args.distance_mm,
    )?;

    template.image().save(&args.out)?;
    let manifest = TemplateManifest {
        px_mm_ratio: template.px_mm_ratio(),
        size: template.size(),
    };
    let manifest_out = manifest_path(&args.out);
    std::fs::write(&manifest_out, serde_json::to_string_pretty(&manifest)?)?;

    tracing::info!(
        "template written to {} ({:.3} px/mm, manifest {})",
        args.out.display(),
        template.px_mm_ratio(),
        manifest_out.display()
    );
    Ok(())
}

// ── detect ─────────────────────────────────────────────────────────────

fn load_template(args: &DetectArgs) -> CliResult<ReferenceTemplate> {
    let image = image::open(&args.template)
        .map_err(|e| -> CliError {
            format!("failed to open template {}: {}", args.template.display(), e).into()
        })?
        .to_rgb8();

    let px_mm_ratio = match args.px_mm_ratio {
        Some(r) => r,
        None => {
            let path = manifest_path(&args.template);
            let raw = std::fs::read_to_string(&path).map_err(|e| -> CliError {
                format!(
                    "no --px-mm-ratio given and manifest {} unreadable: {}",
                    path.display(),
                    e
                )
                .into()
            })?;
            let manifest: TemplateManifest = serde_json::from_str(&raw)?;
            manifest.px_mm_ratio
        }
    };

    Ok(ReferenceTemplate::new(image, px_mm_ratio)?)
}

fn run_detect(args: &DetectArgs) -> CliResult<()> {
    let template = load_template(args)?;
    let target = image::open(&args.image)
        .map_err(|e| -> CliError {
            format!("failed to open image {}: {}", args.image.display(), e).into()
        })?
        .to_rgb8();

    tracing::info!(
        "detecting {}x{} template in {}x{} target",
        template.size()[0],
        template.size()[1],
        target.width(),
        target.height()
    );

    let mut config = LocateConfig {
        min_matches: args.min_matches,
        resize: args.resize,
        equalize: args.equalize || args.equalized_out.is_some(),
        mask: !args.no_mask,
        lowe_ratio: args.lowe_ratio,
        ..LocateConfig::default()
    };
    config.ransac.inlier_threshold = args.ransac_thresh_px;
    config.ransac.max_iters = args.ransac_iters;
    config.features.fast_threshold = args.fast_threshold;

    let result = locate_reference(&template, &target, &config)?;

    match result.detected_px_mm_ratio {
        Some(ratio) => tracing::info!("detected ratio: {:.1} px/mm", ratio),
        None => tracing::info!(
            "reference not found ({} good matches, min {})",
            result.stats.n_good_matches,
            args.min_matches
        ),
    }

    if let Some(path) = &args.equalized_out {
        match &result.equalized {
            Some(img) => {
                img.save(path)?;
                tracing::info!("equalized image written to {}", path.display());
            }
            None => tracing::warn!("no equalized image to write (detection failed)"),
        }
    }

    std::fs::write(&args.out, serde_json::to_string_pretty(&result)?)?;
    tracing::info!("result written to {}", args.out.display());
    Ok(())
}

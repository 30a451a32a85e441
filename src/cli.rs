// ============================================================================
// GenFill CLI — headless mask painting and edit submission
// ============================================================================
//
// Usage examples:
//   genfill --input photo.png --stroke "120,80;300,90" --prompt "a hot air balloon"
//   genfill -i photo.jpg --rect 10,10,200,120 --dry-run --output-dir out/
//   genfill -i photo.png --stroke "40,40;60,60" --mock-dir fixtures/ -n 3
//
// Coordinates are in the input image's own pixel space. Strokes and
// rectangles are replayed through the same edit session the GUI uses, so
// the mask sent is exactly what painting them by hand would produce.
// Everything runs synchronously on the current thread.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use eframe::egui::Pos2;

use crate::canvas::Point;
use crate::error::{EditError, Result};
use crate::io::{load_image, save_png};
use crate::ops::brush::{BrushMode, BrushStyle};
use crate::ops::edit_api::{EditService, HttpEditService, MockEditService};
use crate::session::{EditSession, SubmitOutcome};
use crate::settings::{EditorSettings, MAX_CANDIDATES};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// GenFill headless mask painter.
///
/// Paint a mask onto an image and ask the edit service to regenerate it.
#[derive(Parser, Debug)]
#[command(
    name = "genfill",
    about = "GenFill headless generative fill",
    long_about = "Paint a mask with strokes and rectangles, then send the image and mask\n\
                  to the image-edit service and save every returned candidate.\n\n\
                  Example:\n  \
                  genfill --input photo.png --stroke \"120,80;300,90\" --prompt \"a balloon\"\n  \
                  genfill -i photo.png --rect 10,10,200,120 --dry-run --output-dir out/"
)]
pub struct CliArgs {
    /// Image to edit.
    #[arg(short, long, value_name = "IMAGE")]
    pub input: PathBuf,

    /// What to paint into the masked region. Empty means "fill in".
    #[arg(short, long, default_value = "")]
    pub prompt: String,

    /// Brush stroke as `x,y;x,y;...`. Repeat for several strokes.
    #[arg(short, long = "stroke", value_name = "x,y;x,y")]
    pub strokes: Vec<String>,

    /// Rectangle selection as `x,y,w,h`. Repeat for several rectangles.
    #[arg(short, long = "rect", value_name = "x,y,w,h")]
    pub rects: Vec<String>,

    /// Brush diameter in input-image pixels.
    #[arg(short = 'w', long, value_name = "PX")]
    pub brush_width: Option<f32>,

    /// Where outputs are written.
    #[arg(short, long, default_value = ".", value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Write the submission image and mask instead of calling the service.
    #[arg(long)]
    pub dry_run: bool,

    /// Serve candidates from the images in this directory instead of the network.
    #[arg(long, value_name = "DIR")]
    pub mock_dir: Option<PathBuf>,

    /// Number of candidates to request.
    #[arg(short = 'n', long, value_name = "N")]
    pub candidates: Option<u32>,

    /// Settings file to use instead of the default location.
    #[arg(long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Print per-step timing information.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Returns `true` when any CLI-mode flag is present in the real process arguments.
    /// Used by `main()` to route before creating an eframe window.
    pub fn is_cli_mode() -> bool {
        std::env::args().any(|a| a == "--input" || a == "-i" || a.starts_with("--input="))
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run the CLI and return an OS exit code.
/// `0` = outputs written, `1` = anything failed.
pub fn run(args: CliArgs) -> ExitCode {
    let start = Instant::now();
    match run_inner(&args) {
        Ok(written) => {
            for path in &written {
                println!("{}", path.display());
            }
            if args.verbose {
                println!(
                    "  done in {:.0}ms",
                    start.elapsed().as_secs_f64() * 1000.0
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            log_err!("CLI run failed: {}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

// ============================================================================
// Pipeline
// ============================================================================

fn run_inner(args: &CliArgs) -> Result<Vec<PathBuf>> {
    // Parse everything up front so bad arguments fail before any work
    let strokes = args
        .strokes
        .iter()
        .map(|s| parse_stroke(s))
        .collect::<Result<Vec<_>>>()?;
    let rects = args
        .rects
        .iter()
        .map(|s| parse_rect(s))
        .collect::<Result<Vec<_>>>()?;

    let settings = resolve_settings(args);

    // -- Step 1: Load ----------------------------------------------------
    let image = load_image(&args.input)?;
    let (source_width, source_height) = (image.width().max(1), image.height().max(1));
    for point in strokes.iter().flatten() {
        check_reach(*point, source_width, source_height)?;
    }
    for &(corner, size) in &rects {
        check_reach(corner, source_width, source_height)?;
        check_reach(corner + size.to_vec2(), source_width, source_height)?;
    }
    let mut session = EditSession::new(settings.clone());
    session.load_image(image);
    let padding = session.padding().ok_or(EditError::NoImage)?;
    let factor = padding.img_width as f32 / source_width as f32;
    if args.verbose {
        println!(
            "  loaded {} as {}x{} (factor {:.3})",
            args.input.display(),
            padding.img_width,
            padding.img_height,
            factor
        );
    }

    // -- Step 2: Paint ---------------------------------------------------
    if let Some(width) = args.brush_width {
        session.set_brush_width(width * factor);
    }
    let to_canvas = |p: Point| Pos2::new(p.x * factor, p.y * factor);

    session.set_style(BrushStyle::Brush(BrushMode::Add));
    for stroke in &strokes {
        replay_stroke(&mut session, stroke.iter().map(|p| to_canvas(*p)));
    }
    session.set_style(BrushStyle::Marquee);
    for &(corner, size) in &rects {
        let far = Pos2::new(corner.x + size.x, corner.y + size.y);
        replay_stroke(&mut session, [to_canvas(corner), to_canvas(far)].into_iter());
    }

    std::fs::create_dir_all(&args.output_dir)?;

    // -- Step 3: Submit or dump ------------------------------------------
    if args.dry_run {
        let ticket = session.begin_submit(&args.prompt)?;
        let image_path = args.output_dir.join("submission.png");
        let mask_path = args.output_dir.join("mask.png");
        std::fs::write(&image_path, &ticket.request.image_png)?;
        std::fs::write(&mask_path, &ticket.request.mask_png)?;
        if args.verbose {
            println!(
                "  prompt: {:?} (size {})",
                ticket.request.prompt, ticket.request.size
            );
        }
        return Ok(vec![image_path, mask_path]);
    }

    let service: Box<dyn EditService> = match &args.mock_dir {
        Some(dir) => Box::new(MockEditService::from_dir(dir)?),
        None => Box::new(HttpEditService::from_settings(&settings)?),
    };

    match session.submit_blocking(service.as_ref(), &args.prompt)? {
        SubmitOutcome::Applied { .. } => write_candidates(session.results(), &args.output_dir),
        SubmitOutcome::Failed(message) => Err(EditError::EditFailed(message)),
        SubmitOutcome::Discarded => {
            Err(EditError::EditFailed("response was discarded".to_string()))
        }
    }
}

/// Settings file plus command-line overrides.
fn resolve_settings(args: &CliArgs) -> EditorSettings {
    let mut settings = match &args.settings {
        Some(path) => EditorSettings::load_from(path),
        None => EditorSettings::load(),
    };
    // Canvas and screen coincide in headless mode
    settings.initial_scale = 1.0;
    if let Some(n) = args.candidates {
        settings.candidate_count = n.clamp(1, MAX_CANDIDATES);
    }
    settings
}

/// Points may lie off the image (a stroke can start outside it) but no
/// further than one image size away.
fn check_reach(point: Point, width: u32, height: u32) -> Result<()> {
    let (w, h) = (width as f32, height as f32);
    if point.x < -w || point.x > 2.0 * w || point.y < -h || point.y > 2.0 * h {
        return Err(EditError::InvalidArgument(format!(
            "point {},{} is too far outside the {}x{} image",
            point.x, point.y, width, height
        )));
    }
    Ok(())
}

/// Feed a polyline through the session as one pointer gesture.
fn replay_stroke(session: &mut EditSession, mut points: impl Iterator<Item = Point>) {
    let Some(first) = points.next() else { return };
    session.pointer_down(Pos2::ZERO, first);
    for p in points {
        session.pointer_move(Pos2::ZERO, p);
    }
    session.pointer_up();
}

fn write_candidates(results: &[image::RgbaImage], dir: &Path) -> Result<Vec<PathBuf>> {
    results
        .iter()
        .enumerate()
        .map(|(i, img)| {
            let path = dir.join(format!("candidate_{i}.png"));
            save_png(img, &path)?;
            Ok(path)
        })
        .collect()
}

// ============================================================================
// Argument parsing helpers
// ============================================================================

fn parse_number(s: &str, whole: &str) -> Result<f32> {
    s.trim()
        .parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| EditError::InvalidArgument(format!("bad number {s:?} in {whole:?}")))
}

/// `x,y` → point.
pub fn parse_point(s: &str) -> Result<Point> {
    let Some((x, y)) = s.split_once(',') else {
        return Err(EditError::InvalidArgument(format!("expected x,y but got {s:?}")));
    };
    Ok(Pos2::new(parse_number(x, s)?, parse_number(y, s)?))
}

/// `x,y;x,y;...` → polyline. A single point is a valid stroke (one dab).
pub fn parse_stroke(s: &str) -> Result<Vec<Point>> {
    let points = s
        .split(';')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(parse_point)
        .collect::<Result<Vec<_>>>()?;
    if points.is_empty() {
        return Err(EditError::InvalidArgument("empty stroke".to_string()));
    }
    Ok(points)
}

/// `x,y,w,h` → (top-left, size). Width and height must be positive.
pub fn parse_rect(s: &str) -> Result<(Point, Point)> {
    let parts: Vec<&str> = s.split(',').collect();
    let [x, y, w, h] = parts.as_slice() else {
        return Err(EditError::InvalidArgument(format!("expected x,y,w,h but got {s:?}")));
    };
    let (w, h) = (parse_number(w, s)?, parse_number(h, s)?);
    if w <= 0.0 || h <= 0.0 {
        return Err(EditError::InvalidArgument(format!("rectangle {s:?} has no area")));
    }
    Ok((Pos2::new(parse_number(x, s)?, parse_number(y, s)?), Pos2::new(w, h)))
}

//! Command-line surface of `pdfbands`

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{debug, error, info, warn};
use serde::Serialize;

use crate::export::{ExportProgress, LopdfEditor, spawn_export};
use crate::geometry::{CropRegion, PageGeometry};
use crate::segments::SegmentColor;
use crate::session::{Command, EditSession};
use crate::settings::{Settings, load_settings};

/// Split a single PDF page into horizontal bands, one output page per band
#[derive(Debug, Parser)]
#[command(name = "pdfbands")]
#[command(author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the settings file
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Write a debug log to this file instead of logging to stderr
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Write one output page per band
    Split {
        input: PathBuf,

        #[command(flatten)]
        layout: LayoutArgs,

        /// Output file, defaults to `{name}-split.pdf` next to the input
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// Show the bands and their crop regions without writing anything
    Plan {
        input: PathBuf,

        #[command(flatten)]
        layout: LayoutArgs,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Render page 1 with the bands highlighted to a PNG
    #[cfg(feature = "render")]
    Preview {
        input: PathBuf,

        #[command(flatten)]
        layout: LayoutArgs,

        /// Output file, defaults to `{name}-preview.png` next to the input
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,

        /// Pixels per PDF point, defaults to `preview_scale` from settings
        #[arg(long, value_name = "SCALE")]
        scale: Option<f64>,
    },
}

/// Where to cut. Without `--preset` or `--at` the configured default preset is used.
#[derive(Clone, Debug, Default, Args)]
pub struct LayoutArgs {
    /// Cut into N equal bands
    #[arg(short, long, value_name = "N", conflicts_with = "at")]
    pub preset: Option<usize>,

    /// Add split lines at these ratios from the top (0 to 1), comma separated
    #[arg(long, value_delimiter = ',', value_name = "RATIO")]
    pub at: Vec<f64>,

    /// Rename a band, 1-based (format: INDEX=NAME, can be repeated)
    #[arg(short, long = "name", value_name = "INDEX=NAME", value_parser = parse_segment_name)]
    pub names: Vec<(usize, String)>,
}

impl LayoutArgs {
    fn apply_to(&self, session: &mut EditSession) -> Result<()> {
        if let Some(parts) = self.preset {
            session
                .apply(Command::ApplyPreset(parts))
                .with_context(|| format!("Cannot split into {parts} bands"))?;
        } else if !self.at.is_empty() {
            session.apply(Command::ApplyPreset(1))?;
            for &ratio in &self.at {
                session.apply(Command::AddLine(ratio))?;
            }
        }

        for (index, name) in &self.names {
            session
                .apply(Command::RenameSegment {
                    index: *index,
                    name: name.clone(),
                })
                .with_context(|| format!("Cannot rename band {index}"))?;
        }
        Ok(())
    }
}

fn parse_segment_name(s: &str) -> Result<(usize, String), String> {
    let (index, name) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid INDEX=NAME: no `=` found in `{s}`"))?;
    let index = index
        .trim()
        .parse::<usize>()
        .map_err(|e| format!("invalid band index `{index}`: {e}"))?;
    Ok((index, name.to_string()))
}

/// One band of a [`PlanReport`]
#[derive(Debug, Serialize)]
pub struct BandReport {
    pub index: usize,
    pub name: String,
    pub start_ratio: f64,
    pub end_ratio: f64,
    pub color: SegmentColor,
    pub crop: CropRegion,
}

#[derive(Debug, Serialize)]
pub struct PlanReport {
    pub source: String,
    pub output: String,
    pub page: PageGeometry,
    pub bands: Vec<BandReport>,
}

impl PlanReport {
    pub fn from_session(session: &EditSession, source: &Path) -> Result<Self> {
        let crops = session.crop_plan()?;
        let bands = session
            .segments()
            .iter()
            .zip(crops)
            .map(|(segment, crop)| BandReport {
                index: segment.index,
                name: segment.name.clone(),
                start_ratio: segment.start_ratio,
                end_ratio: segment.end_ratio,
                color: segment.color,
                crop,
            })
            .collect();

        Ok(Self {
            source: source.display().to_string(),
            output: session.output_file_name().unwrap_or_default(),
            page: session.geometry().context("No document loaded")?,
            bands,
        })
    }

    #[must_use]
    pub fn to_table(&self) -> String {
        let mut out = format!(
            "{}: {} x {} pt -> {}\n",
            self.source, self.page.width_native, self.page.height_native, self.output
        );
        out.push_str(&format!(
            "{:>3}  {:<20} {:>7} {:>7} {:>9} {:>9}  {}\n",
            "#", "NAME", "START", "END", "BOTTOM", "HEIGHT", "COLOR"
        ));
        for band in &self.bands {
            out.push_str(&format!(
                "{:>3}  {:<20} {:>7.4} {:>7.4} {:>9.2} {:>9.2}  {}\n",
                band.index,
                band.name,
                band.start_ratio,
                band.end_ratio,
                band.crop.bottom,
                band.crop.height,
                band.color.hex()
            ));
        }
        out
    }
}

pub fn run(cli: Cli) -> Result<()> {
    let settings = load_settings(cli.config.as_deref());
    debug!("Using settings {settings:?}");

    match cli.command {
        Commands::Split {
            input,
            layout,
            output,
        } => {
            let written = split(&settings, &input, &layout, output)?;
            println!("{}", written.display());
        }

        Commands::Plan {
            input,
            layout,
            json,
        } => {
            let session = open_session(&settings, &input, &layout)?;
            let report = PlanReport::from_session(&session, &input)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report.to_table());
            }
        }

        #[cfg(feature = "render")]
        Commands::Preview {
            input,
            layout,
            output,
            scale,
        } => {
            let written = preview(&settings, &input, &layout, output, scale)?;
            println!("{}", written.display());
        }
    }
    Ok(())
}

/// Load `input` and apply the layout flags
pub fn open_session(settings: &Settings, input: &Path, layout: &LayoutArgs) -> Result<EditSession> {
    let bytes = fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let file_name = input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut session = EditSession::new(settings.clone());
    session
        .load_pdf(&LopdfEditor::new(), bytes, &file_name)
        .with_context(|| format!("Failed to open {}", input.display()))?;
    layout.apply_to(&mut session)?;
    Ok(session)
}

/// Split `input` and return the path written
pub fn split(
    settings: &Settings,
    input: &Path,
    layout: &LayoutArgs,
    output: Option<PathBuf>,
) -> Result<PathBuf> {
    let session = open_session(settings, input, layout)?;
    let output = match output {
        Some(path) => path,
        None => input.with_file_name(
            session
                .output_file_name()
                .context("No document loaded")?,
        ),
    };

    let job = session.export_job(LopdfEditor::new())?;
    let bytes = spawn_export(job)
        .wait(|progress| match progress {
            ExportProgress::Started { total } => info!("Writing {total} bands"),
            ExportProgress::PageAppended { index, total } => debug!("Band {index}/{total} done"),
            ExportProgress::Serializing => debug!("Serializing output"),
        })
        .inspect_err(|err| {
            if err.is_internal() {
                error!("Export stopped on an internal error: {err}");
            } else {
                warn!("Export failed: {err}");
            }
        })
        .with_context(|| format!("Failed to split {}", input.display()))?;

    fs::write(&output, &bytes)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    info!(
        "Wrote {} bands ({} bytes) to {}",
        session.segments().len(),
        bytes.len(),
        output.display()
    );
    Ok(output)
}

/// Render the highlighted preview of `input` and return the path written
#[cfg(feature = "render")]
pub fn preview(
    settings: &Settings,
    input: &Path,
    layout: &LayoutArgs,
    output: Option<PathBuf>,
    scale: Option<f64>,
) -> Result<PathBuf> {
    use crate::export::SOURCE_PAGE;
    use crate::export::filename::{base_name, sanitize_filename};
    use crate::preview::{render_preview, write_png};
    use crate::render::{MupdfRenderer, PageRenderer};

    let session = open_session(settings, input, layout)?;
    let scale = scale
        .filter(|s| s.is_finite() && *s > 0.0)
        .unwrap_or(settings.preview_scale);
    let output = output.unwrap_or_else(|| {
        let name = input
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        input.with_file_name(format!(
            "{}-preview.png",
            sanitize_filename(&base_name(&name))
        ))
    });

    let renderer = MupdfRenderer::new();
    let bytes = session.source_bytes().context("No document loaded")?;
    let document = renderer
        .decode(bytes)
        .with_context(|| format!("Failed to render {}", input.display()))?;
    let (width, height) = renderer.page_size(&document, SOURCE_PAGE, scale)?;
    debug!("Rendering preview at {width:.0}x{height:.0} px");
    let raster = renderer.render(&document, SOURCE_PAGE, scale)?;

    let image = render_preview(&raster, session.segments(), session.lines())?;
    write_png(&image, &output).with_context(|| format!("Failed to write {}", output.display()))?;
    Ok(output)
}

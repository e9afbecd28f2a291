//! Edit session for one source document
//!
//! The session is the single owner of everything the user edits: the split
//! lines, the segments derived from them, renamed segments and the loaded
//! source. Every change goes through [`EditSession::apply`], which returns
//! the effects an adapter has to act on.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use log::{debug, info};
use serde::Serialize;
use thiserror::Error;

use crate::crop::{CropError, plan_crops};
use crate::export::exporter::{
    DocumentEditor, ExportError, ExportProgress, SOURCE_PAGE, export_document,
};
use crate::export::filename;
use crate::export::worker::{ExportJob, ExportSlot};
use crate::geometry::{CropRegion, PageGeometry};
use crate::segments::{Segment, SegmentError, derive_segments};
use crate::settings::Settings;
use crate::split_lines::{LineId, PresetError, SplitLine, SplitLineRegistry};

/// Identity of a segment across rebuilds: the lines above and below it.
///
/// `None` stands for the page edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct SegmentKey {
    pub upper: Option<LineId>,
    pub lower: Option<LineId>,
}

/// Commands that modify the session
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Insert a split line near a ratio
    AddLine(f64),
    /// Start dragging a line
    BeginDrag(LineId),
    /// Move the dragged line to a ratio, without re-sorting
    DragTo { id: LineId, ratio: f64 },
    /// Move the dragged line to a preview pixel offset
    DragToPixel { id: LineId, y: f64 },
    /// Finish the drag and re-sort
    EndDrag,
    /// Move a line in one step
    MoveLine { id: LineId, ratio: f64 },
    /// Remove a line
    DeleteLine(LineId),
    /// Replace all lines with an even split into `n` parts
    ApplyPreset(usize),
    /// Rename the segment at a 1-based index
    RenameSegment { index: usize, name: String },
    /// Drop every renamed segment back to its default name
    ResetNames,
    /// Unload the document and clear everything
    Reset,
}

/// Effects produced by state changes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Split lines moved, appeared or disappeared
    LinesChanged,
    /// Segment list was rebuilt
    SegmentsChanged,
    /// Only segment names changed
    NamesChanged,
    /// Session went back to the empty state
    Cleared,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no document loaded")]
    NotLoaded,

    #[error("failed to load document: {0}")]
    Load(String),

    #[error("page size {width} x {height} is not usable")]
    InvalidPage { width: f64, height: f64 },

    #[error("no segment {0}")]
    UnknownSegment(usize),

    #[error("an export is already in progress")]
    ExportInProgress,

    #[error(transparent)]
    Preset(#[from] PresetError),

    #[error(transparent)]
    Segments(#[from] SegmentError),

    #[error(transparent)]
    Crop(#[from] CropError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

#[derive(Debug)]
struct SourceDocument {
    bytes: Arc<Vec<u8>>,
    file_name: String,
    geometry: PageGeometry,
}

#[derive(Debug, Default)]
pub struct EditSession {
    settings: Settings,
    source: Option<SourceDocument>,
    registry: SplitLineRegistry,
    segments: Vec<Segment>,
    keys: Vec<SegmentKey>,
    names: HashMap<SegmentKey, String>,
    export_flag: Arc<AtomicBool>,
}

impl EditSession {
    #[must_use]
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: settings.sanitized(),
            ..Self::default()
        }
    }

    /// Take ownership of a source document with known page geometry.
    ///
    /// Replaces any previous document and applies the default preset.
    pub fn load(
        &mut self,
        bytes: Vec<u8>,
        file_name: &str,
        geometry: PageGeometry,
    ) -> Result<Vec<Effect>, SessionError> {
        if !geometry.is_valid() {
            return Err(SessionError::InvalidPage {
                width: geometry.width_native,
                height: geometry.height_native,
            });
        }

        self.clear();
        info!(
            "Loaded {file_name:?}: {} x {} pt, preview height {} px",
            geometry.width_native, geometry.height_native, geometry.height_pixels
        );
        self.source = Some(SourceDocument {
            bytes: Arc::new(bytes),
            file_name: file_name.to_string(),
            geometry,
        });
        self.registry.apply_preset(self.settings.default_preset)?;
        self.rebuild()?;

        Ok(vec![
            Effect::Cleared,
            Effect::LinesChanged,
            Effect::SegmentsChanged,
        ])
    }

    /// Parse `bytes` with `editor` to find the page size, then [`Self::load`].
    ///
    /// On failure the session is left exactly as it was.
    pub fn load_pdf<E: DocumentEditor>(
        &mut self,
        editor: &E,
        bytes: Vec<u8>,
        file_name: &str,
    ) -> Result<Vec<Effect>, SessionError> {
        let document = editor
            .load(&bytes)
            .map_err(|e| SessionError::Load(e.to_string()))?;
        let (width, height) = editor
            .page_size(&document, SOURCE_PAGE)
            .map_err(|e| SessionError::Load(e.to_string()))?;
        let geometry = PageGeometry::with_preview_scale(width, height, self.settings.preview_scale);
        self.load(bytes, file_name, geometry)
    }

    /// Apply a command and return resulting effects
    pub fn apply(&mut self, command: Command) -> Result<Vec<Effect>, SessionError> {
        if command == Command::Reset {
            self.clear();
            return Ok(vec![Effect::Cleared]);
        }
        let geometry = self.geometry().ok_or(SessionError::NotLoaded)?;

        let structural = vec![Effect::LinesChanged, Effect::SegmentsChanged];
        let effects = match command {
            Command::AddLine(ratio) => {
                self.registry.add_line(ratio);
                structural
            }

            Command::BeginDrag(id) => {
                self.registry.begin_drag(id);
                vec![]
            }

            Command::DragTo { id, ratio } => match self.registry.drag_to(id, ratio) {
                Some(_) => structural,
                None => vec![],
            },

            Command::DragToPixel { id, y } => {
                match self.registry.drag_to_pixel(id, y, geometry.height_pixels) {
                    Some(_) => structural,
                    None => vec![],
                }
            }

            Command::EndDrag => match self.registry.end_drag() {
                Some(_) => structural,
                None => vec![],
            },

            Command::MoveLine { id, ratio } => match self.registry.move_line(id, ratio) {
                Some(_) => structural,
                None => vec![],
            },

            Command::DeleteLine(id) => {
                if self.registry.delete_line(id) {
                    structural
                } else {
                    vec![]
                }
            }

            Command::ApplyPreset(parts) => {
                self.registry.apply_preset(parts)?;
                structural
            }

            Command::RenameSegment { index, name } => {
                self.rename_segment(index, name)?;
                return Ok(vec![Effect::NamesChanged]);
            }

            Command::ResetNames => {
                if self.names.is_empty() {
                    return Ok(vec![]);
                }
                self.names.clear();
                self.rebuild()?;
                return Ok(vec![Effect::NamesChanged]);
            }

            Command::Reset => unreachable!("handled above"),
        };

        if !effects.is_empty() {
            self.rebuild()?;
        }
        Ok(effects)
    }

    fn rename_segment(&mut self, index: usize, name: String) -> Result<(), SessionError> {
        let position = index
            .checked_sub(1)
            .filter(|&i| i < self.segments.len())
            .ok_or(SessionError::UnknownSegment(index))?;

        debug!("Renaming segment {index} to {name:?}");
        self.names.insert(self.keys[position], name.clone());
        self.segments[position].name = name;
        Ok(())
    }

    /// Re-derive segments from the current lines and re-apply renamed segments
    fn rebuild(&mut self) -> Result<(), SegmentError> {
        let mut ordered: Vec<SplitLine> = self.registry.lines().to_vec();
        ordered.sort_by(|a, b| a.position.total_cmp(&b.position));
        ordered.dedup_by(|line, previous| line.position == previous.position);

        let positions: Vec<f64> = ordered.iter().map(|line| line.position).collect();
        let mut segments = derive_segments(&positions)?;
        let keys = segment_keys(&ordered);
        debug_assert_eq!(segments.len(), keys.len());

        for (segment, key) in segments.iter_mut().zip(&keys) {
            if let Some(name) = self.names.get(key) {
                segment.name.clone_from(name);
            }
        }

        // Keep names of segments that only disappear transiently mid-drag
        if !self.registry.is_dragging() {
            let before = self.names.len();
            self.names.retain(|key, _| keys.contains(key));
            if self.names.len() != before {
                debug!("Dropped {} segment names", before - self.names.len());
            }
        }

        debug!("Rebuilt {} segments", segments.len());
        self.segments = segments;
        self.keys = keys;
        Ok(())
    }

    fn clear(&mut self) {
        self.source = None;
        self.registry.reset();
        self.segments.clear();
        self.keys.clear();
        self.names.clear();
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.source.is_some()
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    #[must_use]
    pub fn segment_keys(&self) -> &[SegmentKey] {
        &self.keys
    }

    #[must_use]
    pub fn lines(&self) -> &[SplitLine] {
        self.registry.lines()
    }

    #[must_use]
    pub fn registry(&self) -> &SplitLineRegistry {
        &self.registry
    }

    #[must_use]
    pub fn geometry(&self) -> Option<PageGeometry> {
        self.source.as_ref().map(|source| source.geometry)
    }

    #[must_use]
    pub fn source_bytes(&self) -> Option<&[u8]> {
        self.source.as_ref().map(|source| source.bytes.as_slice())
    }

    /// Name of the split document, e.g. `report-split.pdf`
    #[must_use]
    pub fn output_file_name(&self) -> Option<String> {
        self.source.as_ref().map(|source| {
            filename::output_file_name(&source.file_name, &self.settings.output_suffix)
        })
    }

    pub fn crop_plan(&self) -> Result<Vec<CropRegion>, SessionError> {
        let geometry = self.geometry().ok_or(SessionError::NotLoaded)?;
        Ok(plan_crops(&self.segments, &geometry)?)
    }

    /// Claim the export slot. Only one export may be in flight per session.
    pub fn begin_export(&self) -> Result<ExportSlot, SessionError> {
        ExportSlot::try_claim(&self.export_flag).ok_or(SessionError::ExportInProgress)
    }

    /// Run an export on the calling thread
    pub fn export<E: DocumentEditor>(
        &self,
        editor: &E,
        progress: Option<&mut dyn FnMut(ExportProgress)>,
    ) -> Result<Vec<u8>, SessionError> {
        let source = self.source.as_ref().ok_or(SessionError::NotLoaded)?;
        let _slot = self.begin_export()?;
        let plan = self.crop_plan()?;
        let bytes = export_document(editor, &source.bytes, &self.segments, &plan, progress)?;
        Ok(bytes)
    }

    /// Snapshot everything needed to export on another thread.
    ///
    /// The returned job holds the export slot until it is dropped.
    pub fn export_job<E: DocumentEditor>(&self, editor: E) -> Result<ExportJob<E>, SessionError> {
        let source = self.source.as_ref().ok_or(SessionError::NotLoaded)?;
        let slot = self.begin_export()?;
        let crop_plan = self.crop_plan()?;
        Ok(ExportJob {
            editor,
            source: Arc::clone(&source.bytes),
            segments: self.segments.clone(),
            crop_plan,
            slot,
        })
    }
}

fn segment_keys(ordered: &[SplitLine]) -> Vec<SegmentKey> {
    let mut bounds: Vec<Option<LineId>> = Vec::with_capacity(ordered.len() + 2);
    bounds.push(None);
    bounds.extend(ordered.iter().map(|line| Some(line.id)));
    bounds.push(None);

    bounds
        .windows(2)
        .map(|pair| SegmentKey {
            upper: pair[0],
            lower: pair[1],
        })
        .collect()
}

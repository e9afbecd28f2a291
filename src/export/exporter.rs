//! Export orchestration: one cropped copy of the source page per segment
//!
//! The PDF engine sits behind [`DocumentEditor`] so the page ordering and
//! error mapping here can be tested without a real document.

use log::{debug, error, info};
use thiserror::Error;

use crate::geometry::CropRegion;
use crate::segments::Segment;

/// Document-mutation collaborator used by the exporter.
///
/// Handles are owned by the caller; the editor itself carries no per-document
/// state so one instance can serve any number of exports.
pub trait DocumentEditor {
    type Document;
    type Page;
    type Error: std::error::Error;

    fn load(&self, bytes: &[u8]) -> Result<Self::Document, Self::Error>;

    fn create_empty(&self) -> Self::Document;

    /// Copy `page_index` of `source` into `target` without attaching it to the page tree
    fn copy_page(
        &self,
        target: &mut Self::Document,
        source: &Self::Document,
        page_index: usize,
    ) -> Result<Self::Page, Self::Error>;

    /// Set media, crop, bleed and trim boxes of `page` to `region`
    fn set_crop_region(
        &self,
        target: &mut Self::Document,
        page: &Self::Page,
        region: CropRegion,
    ) -> Result<(), Self::Error>;

    fn append_page(
        &self,
        target: &mut Self::Document,
        page: Self::Page,
    ) -> Result<(), Self::Error>;

    fn serialize(&self, target: &mut Self::Document) -> Result<Vec<u8>, Self::Error>;

    /// Width and height of `page_index` in native units
    fn page_size(
        &self,
        document: &Self::Document,
        page_index: usize,
    ) -> Result<(f64, f64), Self::Error>;
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("at least one segment is required to export")]
    NoSegments,

    #[error("crop plan has {plan} regions for {segments} segments")]
    PlanMismatch { segments: usize, plan: usize },

    #[error("failed to read source document: {0}")]
    Load(String),

    #[error("failed to build output document: {0}")]
    Engine(String),
}

impl ExportError {
    /// True for defects rather than user or engine problems
    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(self, ExportError::PlanMismatch { .. })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportProgress {
    Started { total: usize },
    PageAppended { index: usize, total: usize },
    Serializing,
}

/// Source page every segment is cut from
pub const SOURCE_PAGE: usize = 0;

/// Build one output page per segment, in segment order, and serialize the result.
///
/// The source bytes are only read. Nothing is returned unless every page was
/// built and serialization succeeded.
pub fn export_document<E: DocumentEditor>(
    editor: &E,
    source_bytes: &[u8],
    segments: &[Segment],
    crop_plan: &[CropRegion],
    mut progress: Option<&mut dyn FnMut(ExportProgress)>,
) -> Result<Vec<u8>, ExportError> {
    if segments.is_empty() {
        return Err(ExportError::NoSegments);
    }
    if segments.len() != crop_plan.len() {
        error!(
            "Crop plan length {} does not match {} segments",
            crop_plan.len(),
            segments.len()
        );
        return Err(ExportError::PlanMismatch {
            segments: segments.len(),
            plan: crop_plan.len(),
        });
    }

    let total = segments.len();
    info!("Exporting {total} segments from {} source bytes", source_bytes.len());
    emit(&mut progress, ExportProgress::Started { total });

    let source = editor
        .load(source_bytes)
        .map_err(|e| ExportError::Load(e.to_string()))?;
    let mut output = editor.create_empty();

    let mut order: Vec<(&Segment, &CropRegion)> = segments.iter().zip(crop_plan).collect();
    order.sort_by_key(|(segment, _)| segment.index);

    for (segment, region) in order {
        let page = editor
            .copy_page(&mut output, &source, SOURCE_PAGE)
            .map_err(engine_error)?;
        editor
            .set_crop_region(&mut output, &page, *region)
            .map_err(engine_error)?;
        editor
            .append_page(&mut output, page)
            .map_err(engine_error)?;
        debug!(
            "Appended segment {} ({:?}) as page {}",
            segment.index, segment.name, segment.index
        );
        emit(
            &mut progress,
            ExportProgress::PageAppended {
                index: segment.index,
                total,
            },
        );
    }

    emit(&mut progress, ExportProgress::Serializing);
    let bytes = editor.serialize(&mut output).map_err(engine_error)?;
    info!("Export produced {} bytes", bytes.len());
    Ok(bytes)
}

fn engine_error<E: std::error::Error>(err: E) -> ExportError {
    ExportError::Engine(err.to_string())
}

fn emit(callback: &mut Option<&mut dyn FnMut(ExportProgress)>, event: ExportProgress) {
    if let Some(listener) = callback.as_mut() {
        listener(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PageGeometry;
    use crate::segments::derive_segments;
    use std::cell::RefCell;

    /// Records every call so tests can check the orchestration order
    #[derive(Default)]
    struct RecordingEditor {
        calls: RefCell<Vec<String>>,
        fail_serialize: bool,
    }

    #[derive(Debug, Error)]
    #[error("{0}")]
    struct FakeError(String);

    #[derive(Default)]
    struct FakeDoc {
        pages: Vec<CropRegion>,
    }

    impl DocumentEditor for RecordingEditor {
        type Document = FakeDoc;
        type Page = usize;
        type Error = FakeError;

        fn load(&self, bytes: &[u8]) -> Result<FakeDoc, FakeError> {
            self.calls.borrow_mut().push("load".into());
            if bytes.starts_with(b"%PDF") {
                Ok(FakeDoc::default())
            } else {
                Err(FakeError("not a pdf".into()))
            }
        }

        fn create_empty(&self) -> FakeDoc {
            self.calls.borrow_mut().push("create".into());
            FakeDoc::default()
        }

        fn copy_page(
            &self,
            target: &mut FakeDoc,
            _source: &FakeDoc,
            page_index: usize,
        ) -> Result<usize, FakeError> {
            self.calls.borrow_mut().push(format!("copy {page_index}"));
            Ok(target.pages.len())
        }

        fn set_crop_region(
            &self,
            _target: &mut FakeDoc,
            page: &usize,
            region: CropRegion,
        ) -> Result<(), FakeError> {
            self.calls
                .borrow_mut()
                .push(format!("crop {page} {}", region.bottom));
            Ok(())
        }

        fn append_page(&self, target: &mut FakeDoc, page: usize) -> Result<(), FakeError> {
            self.calls.borrow_mut().push(format!("append {page}"));
            target.pages.push(CropRegion {
                left: 0.0,
                bottom: 0.0,
                width: 0.0,
                height: 0.0,
            });
            Ok(())
        }

        fn serialize(&self, target: &mut FakeDoc) -> Result<Vec<u8>, FakeError> {
            self.calls.borrow_mut().push("serialize".into());
            if self.fail_serialize {
                return Err(FakeError("disk full".into()));
            }
            Ok(vec![target.pages.len() as u8])
        }

        fn page_size(&self, _document: &FakeDoc, _page_index: usize) -> Result<(f64, f64), FakeError> {
            Ok((100.0, 300.0))
        }
    }

    fn thirds() -> (Vec<Segment>, Vec<CropRegion>) {
        let segments = derive_segments(&[1.0 / 3.0, 2.0 / 3.0]).unwrap();
        let geometry = PageGeometry::new(100.0, 300.0, 300.0);
        let plan = crate::crop::plan_crops(&segments, &geometry).unwrap();
        (segments, plan)
    }

    #[test]
    fn zero_segments_is_configuration_error() {
        let editor = RecordingEditor::default();
        let result = export_document(&editor, b"%PDF", &[], &[], None);
        assert!(matches!(result, Err(ExportError::NoSegments)));
        assert!(editor.calls.borrow().is_empty());
    }

    #[test]
    fn pages_are_built_in_segment_order() {
        let editor = RecordingEditor::default();
        let (segments, plan) = thirds();
        let bytes = export_document(&editor, b"%PDF", &segments, &plan, None).unwrap();
        assert_eq!(bytes, vec![3]);

        let calls = editor.calls.borrow();
        assert_eq!(calls[0], "load");
        assert_eq!(calls[1], "create");
        assert_eq!(calls[2], "copy 0");
        assert!(calls[3].starts_with("crop 0 200"));
        assert_eq!(calls[4], "append 0");
        assert!(calls[9].starts_with("crop 2 0"));
        assert_eq!(calls.last().unwrap(), "serialize");
    }

    #[test]
    fn unreadable_source_is_load_error() {
        let editor = RecordingEditor::default();
        let (segments, plan) = thirds();
        let result = export_document(&editor, b"garbage", &segments, &plan, None);
        assert!(matches!(result, Err(ExportError::Load(msg)) if msg == "not a pdf"));
    }

    #[test]
    fn engine_failure_keeps_reason() {
        let editor = RecordingEditor {
            fail_serialize: true,
            ..Default::default()
        };
        let (segments, plan) = thirds();
        let err = export_document(&editor, b"%PDF", &segments, &plan, None).unwrap_err();
        assert_eq!(err.to_string(), "failed to build output document: disk full");
    }

    #[test]
    fn mismatched_plan_is_internal() {
        let editor = RecordingEditor::default();
        let (segments, plan) = thirds();
        let err = export_document(&editor, b"%PDF", &segments, &plan[..1], None).unwrap_err();
        assert!(err.is_internal());
    }

    #[test]
    fn progress_reports_each_page() {
        let editor = RecordingEditor::default();
        let (segments, plan) = thirds();
        let mut events = Vec::new();
        let mut listener = |event: ExportProgress| events.push(event);
        export_document(&editor, b"%PDF", &segments, &plan, Some(&mut listener)).unwrap();

        assert_eq!(events.first(), Some(&ExportProgress::Started { total: 3 }));
        assert_eq!(
            events[3],
            ExportProgress::PageAppended { index: 3, total: 3 }
        );
        assert_eq!(events.last(), Some(&ExportProgress::Serializing));
    }
}

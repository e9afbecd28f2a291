//! Background export - runs one export on a dedicated thread

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use flume::{Receiver, Sender};
use log::{error, info};

use super::exporter::{DocumentEditor, ExportError, ExportProgress, export_document};
use crate::geometry::CropRegion;
use crate::segments::Segment;

/// Claim on the single export slot of a session.
///
/// The slot is released when this value is dropped, whether the export
/// finished, failed or panicked.
#[derive(Debug)]
pub struct ExportSlot {
    flag: Arc<AtomicBool>,
}

impl ExportSlot {
    /// Try to claim `flag`. Fails if an export already holds it.
    #[must_use]
    pub fn try_claim(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                flag: Arc::clone(flag),
            })
    }
}

impl Drop for ExportSlot {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Everything an export needs, detached from the session
pub struct ExportJob<E> {
    pub editor: E,
    pub source: Arc<Vec<u8>>,
    pub segments: Vec<Segment>,
    pub crop_plan: Vec<CropRegion>,
    pub slot: ExportSlot,
}

/// Messages sent from the export thread
#[derive(Debug)]
pub enum ExportEvent {
    Progress(ExportProgress),
    Finished(Vec<u8>),
    Failed(ExportError),
}

pub struct ExportHandle {
    events: Receiver<ExportEvent>,
    thread: Option<JoinHandle<()>>,
}

impl ExportHandle {
    #[must_use]
    pub fn events(&self) -> &Receiver<ExportEvent> {
        &self.events
    }

    /// Block until the export ends, forwarding progress to `on_progress`
    pub fn wait(
        mut self,
        mut on_progress: impl FnMut(ExportProgress),
    ) -> Result<Vec<u8>, ExportError> {
        let mut outcome = Err(ExportError::Engine(
            "export worker exited without a result".to_string(),
        ));

        for event in self.events.iter() {
            match event {
                ExportEvent::Progress(progress) => on_progress(progress),
                ExportEvent::Finished(bytes) => {
                    outcome = Ok(bytes);
                    break;
                }
                ExportEvent::Failed(err) => {
                    outcome = Err(err);
                    break;
                }
            }
        }

        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Export worker panicked");
            }
        }
        outcome
    }
}

/// Run `job` on a new thread.
///
/// The thread sends any number of `Progress` events followed by exactly one
/// `Finished` or `Failed`.
pub fn spawn_export<E>(job: ExportJob<E>) -> ExportHandle
where
    E: DocumentEditor + Send + 'static,
{
    let (tx, rx) = flume::unbounded();
    let thread = std::thread::spawn(move || export_worker(job, tx));
    ExportHandle {
        events: rx,
        thread: Some(thread),
    }
}

fn export_worker<E: DocumentEditor>(job: ExportJob<E>, events: Sender<ExportEvent>) {
    let ExportJob {
        editor,
        source,
        segments,
        crop_plan,
        slot,
    } = job;

    let mut forward = |progress: ExportProgress| {
        let _ = events.send(ExportEvent::Progress(progress));
    };
    let result = export_document(
        &editor,
        &source,
        &segments,
        &crop_plan,
        Some(&mut forward),
    );

    // Release before reporting so a listener can start the next export right away
    drop(slot);

    let _ = match result {
        Ok(bytes) => {
            info!("Background export finished");
            events.send(ExportEvent::Finished(bytes))
        }
        Err(err) => {
            error!("Background export failed: {err}");
            events.send(ExportEvent::Failed(err))
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crop::plan_crops;
    use crate::export::pdf_editor::LopdfEditor;
    use crate::geometry::PageGeometry;
    use crate::segments::derive_segments;
    use crate::test_utils::pdf_fixtures::single_page_pdf;

    fn job(source: Vec<u8>, flag: &Arc<AtomicBool>) -> ExportJob<LopdfEditor> {
        let segments = derive_segments(&[0.5]).unwrap();
        let geometry = PageGeometry::new(612.0, 792.0, 792.0);
        let crop_plan = plan_crops(&segments, &geometry).unwrap();
        ExportJob {
            editor: LopdfEditor::new(),
            source: Arc::new(source),
            segments,
            crop_plan,
            slot: ExportSlot::try_claim(flag).unwrap(),
        }
    }

    #[test]
    fn slot_is_exclusive_until_dropped() {
        let flag = Arc::new(AtomicBool::new(false));
        let slot = ExportSlot::try_claim(&flag).unwrap();
        assert!(ExportSlot::try_claim(&flag).is_none());
        drop(slot);
        assert!(ExportSlot::try_claim(&flag).is_some());
    }

    #[test]
    fn worker_reports_progress_then_bytes() {
        let flag = Arc::new(AtomicBool::new(false));
        let handle = spawn_export(job(single_page_pdf(612.0, 792.0), &flag));

        let mut progress = Vec::new();
        let bytes = handle.wait(|p| progress.push(p)).unwrap();

        assert!(bytes.starts_with(b"%PDF"));
        assert_eq!(progress.first(), Some(&ExportProgress::Started { total: 2 }));
        assert_eq!(progress.last(), Some(&ExportProgress::Serializing));
        assert!(!flag.load(Ordering::Acquire));
    }

    #[test]
    fn worker_reports_failure_and_releases_slot() {
        let flag = Arc::new(AtomicBool::new(false));
        let handle = spawn_export(job(b"not a pdf".to_vec(), &flag));

        let err = handle.wait(|_| {}).unwrap_err();
        assert!(matches!(err, ExportError::Load(_)), "{err}");
        assert!(!flag.load(Ordering::Acquire));
    }
}

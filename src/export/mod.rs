pub mod exporter;
pub mod filename;
pub mod pdf_editor;
pub mod worker;

pub use exporter::{
    DocumentEditor, ExportError, ExportProgress, SOURCE_PAGE, export_document,
};
pub use filename::{output_file_name, sanitize_filename};
pub use pdf_editor::{LopdfEditor, PdfDocument, PdfEditError, PdfPage};
pub use worker::{ExportEvent, ExportHandle, ExportJob, ExportSlot, spawn_export};

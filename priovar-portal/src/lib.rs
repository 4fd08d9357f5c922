//! Requested-patients view of the PrioVar clinical-genomics portal.
//!
//! The crate is UI-agnostic: it models the backend's patient/file records,
//! derives what each table row shows, and drives the backend calls behind
//! the row actions. Front-ends render [`table::TableSnapshot`]s and forward
//! user intent to [`table::PatientTable`].
//!
//! - [`record`]: wire types (`PatientRecord`, `FileRecord`, `FileStatus`, ...)
//! - [`status`]: status derivation, status badges and the per-row analysis control
//! - [`routes`]: client routes a row action can navigate to
//! - [`api`]: the [`api::PortalApi`] seam and its HTTP implementation
//! - [`session`]: explicit session context (health center, selected patient)
//! - [`sequencer`]: ordering of overlapping list refetches
//! - [`notes`]: the clinician note editor
//! - [`table`]: the table controller tying it all together
pub mod api;
pub mod error;
pub mod notes;
pub mod record;
pub mod routes;
pub mod sequencer;
pub mod session;
pub mod status;
pub mod table;

pub use api::{HttpPortalApi, PortalApi};
pub use error::{PortalError, Result};
pub use notes::{NoteEditor, NoteMode};
pub use record::{
    AnnotationConfig, FileRecord, FileRef, FileStatus, MedicalCenter, PatientRecord, RecordId,
    StageInfo,
};
pub use routes::{Navigation, Route};
pub use session::{SelectedPatient, SessionContext, SessionStore};
pub use status::{ControlAction, DerivedStatus, RowControl, StatusBadge, Tone, derive_status};
pub use table::{
    LoadState, Modal, PatientScope, PatientTable, RefreshOutcome, TableRow, TableSnapshot,
};

//! The patient table: rows, modals, and the backend calls behind them.
//!
//! [`PatientTable`] is shared between whichever tasks issue calls. State sits
//! behind a plain mutex that is never held across an `.await`; list fetches
//! are ordered by a [`RefetchSequencer`] so a slow, older response can never
//! overwrite a newer one.
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use priovar_common::time::format_date_time;
use tracing::{debug, info, warn};

use crate::api::PortalApi;
use crate::error::{PortalError, Result};
use crate::notes::NoteEditor;
use crate::record::{AnnotationConfig, FileRef, PatientRecord, RecordId};
use crate::routes::{Navigation, Route};
use crate::sequencer::{RefetchSequencer, Ticket};
use crate::session::{SessionContext, SessionStore};
use crate::status::{ControlAction, RowControl, StatusBadge, derive_status};

pub const DELETE_WARNING: &str =
    "This will delete the file and all associated analyses. This action cannot be undone.";
pub const NOT_FINISHED: &str = "Not Finished";

/// Which list the table shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PatientScope {
    /// Cross-clinic patients this center was granted access to.
    #[default]
    Requested,
    /// The center's own patients.
    Clinic,
}

impl PatientScope {
    pub fn title(self, center_name: Option<&str>) -> String {
        let name = center_name.filter(|n| !n.is_empty()).unwrap_or("...");
        match self {
            PatientScope::Requested => {
                format!("Cross-Clinic Accessed Patients by {name} Health Center")
            }
            PatientScope::Clinic => format!("Patients of {name} Health Center"),
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            PatientScope::Requested => PatientScope::Clinic,
            PatientScope::Clinic => PatientScope::Requested,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PatientScope::Requested => "requested",
            PatientScope::Clinic => "clinic",
        }
    }
}

impl fmt::Display for PatientScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PatientScope {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "requested" => Ok(PatientScope::Requested),
            "clinic" => Ok(PatientScope::Clinic),
            other => Err(format!("unknown scope '{other}' (expected requested|clinic)")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Ready,
    Failed(String),
}

/// Result of a list fetch that completed without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Applied(usize),
    /// A newer fetch already landed; this response was dropped.
    Stale,
}

/// A row as displayed. Cells of a row without a file are blank.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub record: PatientRecord,
    pub uploaded_at: String,
    pub completed_at: String,
    pub clinician_name: String,
    pub comments: Vec<String>,
    pub badge: Option<StatusBadge>,
    pub derived_status: Option<String>,
    pub details: Option<Route>,
    pub control: Option<RowControl>,
}

impl TableRow {
    pub fn from_record(record: PatientRecord) -> Self {
        let Some(file) = record.file.as_ref() else {
            return Self {
                record,
                uploaded_at: String::new(),
                completed_at: String::new(),
                clinician_name: String::new(),
                comments: Vec::new(),
                badge: None,
                derived_status: None,
                details: None,
                control: None,
            };
        };

        let uploaded_at = match file.created_at() {
            Some(ts) => format_date_time(&ts),
            None => file.created_at.clone().unwrap_or_default(),
        };
        let completed_at = file
            .finished_at()
            .map(|ts| format_date_time(&ts))
            .unwrap_or_else(|| NOT_FINISHED.to_string());
        let clinician_name = file.clinician_name.clone().unwrap_or_default();
        let comments = file
            .clinician_comments
            .iter()
            .map(|c| format!("{clinician_name}: {c}"))
            .collect();
        let details = file
            .file_ref()
            .map(|f| Route::patient_details(record.patient_id.clone(), f.id().clone()));

        Self {
            uploaded_at,
            completed_at,
            comments,
            badge: Some(StatusBadge::for_status(&file.file_status)),
            derived_status: derive_status(file).label(),
            details,
            control: RowControl::for_file(file),
            clinician_name,
            record,
        }
    }

    pub fn patient_name(&self) -> &str {
        &self.record.patient_name
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Modal {
    ConfirmDelete {
        patient_id: RecordId,
        patient_name: String,
    },
    ConfirmAnnotation {
        patient_id: RecordId,
        file: FileRef,
    },
    Note(NoteEditor),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableSnapshot {
    pub title: String,
    pub scope: PatientScope,
    pub load: LoadState,
    pub rows: Vec<TableRow>,
    pub modal: Option<Modal>,
}

#[derive(Debug, Default)]
struct TableState {
    scope: PatientScope,
    rows: Vec<PatientRecord>,
    load: LoadState,
    modal: Option<Modal>,
    center_name: Option<String>,
    session: SessionContext,
}

pub struct PatientTable {
    api: Arc<dyn PortalApi>,
    store: SessionStore,
    sequencer: RefetchSequencer,
    state: Mutex<TableState>,
}

impl fmt::Debug for PatientTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatientTable")
            .field("store", &self.store)
            .field("sequencer", &self.sequencer)
            .finish_non_exhaustive()
    }
}

impl PatientTable {
    pub fn new(
        api: Arc<dyn PortalApi>,
        store: SessionStore,
        session: SessionContext,
        scope: PatientScope,
    ) -> Self {
        Self {
            api,
            store,
            sequencer: RefetchSequencer::new(),
            state: Mutex::new(TableState {
                scope,
                session,
                ..Default::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TableState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn scope(&self) -> PatientScope {
        self.lock().scope
    }

    /// Switches lists. The caller refreshes afterwards.
    pub fn set_scope(&self, scope: PatientScope) {
        self.lock().scope = scope;
    }

    pub fn session(&self) -> SessionContext {
        self.lock().session.clone()
    }

    fn center_id(&self) -> Result<RecordId> {
        self.lock()
            .session
            .health_center_id()
            .cloned()
            .ok_or(PortalError::NoHealthCenter)
    }

    pub fn snapshot(&self) -> TableSnapshot {
        let st = self.lock();
        TableSnapshot {
            title: st.scope.title(st.center_name.as_deref()),
            scope: st.scope,
            load: st.load.clone(),
            rows: st.rows.iter().cloned().map(TableRow::from_record).collect(),
            modal: st.modal.clone(),
        }
    }

    pub fn records(&self) -> Vec<PatientRecord> {
        self.lock().rows.clone()
    }

    pub fn index_of_patient(&self, patient_id: &RecordId) -> Option<usize> {
        self.lock()
            .rows
            .iter()
            .position(|r| &r.patient_id == patient_id)
    }

    pub fn patient(&self, patient_id: &RecordId) -> Option<PatientRecord> {
        self.lock()
            .rows
            .iter()
            .find(|r| &r.patient_id == patient_id)
            .cloned()
    }

    /// Rows are addressed by patient id, so a refetch that reorders the list
    /// between selection and action cannot redirect it.
    fn row(&self, patient_id: &RecordId) -> Result<PatientRecord> {
        self.patient(patient_id)
            .ok_or_else(|| PortalError::UnknownPatient(patient_id.clone()))
    }

    /// Fetches the health center name used in the title.
    pub async fn load_title(&self) -> Result<String> {
        let center = self.center_id()?;
        match self.api.medical_center(&center).await {
            Ok(mc) => {
                let mut st = self.lock();
                st.center_name = Some(mc.name);
                Ok(st.scope.title(st.center_name.as_deref()))
            }
            Err(e) => {
                warn!(center = %center, error = %e, "portal.table.title_failed");
                Err(e)
            }
        }
    }

    /// Refetches the current list. Rows are replaced only when this response
    /// is newer than the last one applied; on failure the previous rows stay.
    pub async fn refresh(&self) -> Result<RefreshOutcome> {
        let center = match self.center_id() {
            Ok(c) => c,
            Err(e) => {
                self.lock().load = LoadState::Failed(e.to_string());
                return Err(e);
            }
        };
        let ticket = self.sequencer.issue();
        let scope = {
            let mut st = self.lock();
            st.load = LoadState::Loading;
            st.scope
        };
        debug!(ticket = ticket.value(), %scope, center = %center, "portal.table.refresh");

        let fetched = self.api.patients(scope, &center).await;
        self.apply(ticket, fetched)
    }

    fn apply(
        &self,
        ticket: Ticket,
        fetched: Result<Vec<PatientRecord>>,
    ) -> Result<RefreshOutcome> {
        match fetched {
            Ok(mut rows) => {
                if !self.sequencer.accept(ticket) {
                    debug!(ticket = ticket.value(), "portal.table.refresh.stale");
                    return Ok(RefreshOutcome::Stale);
                }
                sort_newest_first(&mut rows);
                let n = rows.len();
                let mut st = self.lock();
                st.rows = rows;
                if self.sequencer.is_latest(ticket) {
                    st.load = LoadState::Ready;
                }
                info!(ticket = ticket.value(), rows = n, "portal.table.refresh.applied");
                Ok(RefreshOutcome::Applied(n))
            }
            Err(e) => {
                warn!(ticket = ticket.value(), error = %e, "portal.table.refresh.failed");
                if self.sequencer.is_latest(ticket) {
                    self.lock().load = LoadState::Failed(e.to_string());
                }
                Err(e)
            }
        }
    }

    pub fn dismiss_modal(&self) {
        self.lock().modal = None;
    }

    pub fn request_delete(&self, patient_id: &RecordId) -> Result<()> {
        let row = self.row(patient_id)?;
        self.lock().modal = Some(Modal::ConfirmDelete {
            patient_id: row.patient_id,
            patient_name: row.patient_name,
        });
        Ok(())
    }

    pub fn cancel_delete(&self) {
        let mut st = self.lock();
        if matches!(st.modal, Some(Modal::ConfirmDelete { .. })) {
            st.modal = None;
        }
    }

    /// Deletes the patient awaiting confirmation, then refetches once.
    pub async fn confirm_delete(&self) -> Result<RefreshOutcome> {
        let patient_id = {
            let mut st = self.lock();
            match st.modal.take() {
                Some(Modal::ConfirmDelete { patient_id, .. }) => patient_id,
                other => {
                    st.modal = other;
                    return Err(PortalError::NothingPending("delete"));
                }
            }
        };
        if let Err(e) = self.api.delete_patient(&patient_id).await {
            warn!(patient = %patient_id, error = %e, "portal.table.delete_failed");
            return Err(e);
        }
        info!(patient = %patient_id, "portal.table.patient_deleted");
        self.refresh().await
    }

    /// Runs the row's analysis control. "View" yields a navigation; "Analysis
    /// Not Started" opens the annotation confirmation; anything else is inert.
    pub fn activate_control(&self, patient_id: &RecordId) -> Result<Option<Navigation>> {
        let row = self.row(patient_id)?;
        let Some(file) = row.file.as_ref() else {
            return Ok(None);
        };
        let Some(control) = RowControl::for_file(file) else {
            return Ok(None);
        };
        if !control.enabled {
            return Ok(None);
        }
        match control.action {
            ControlAction::Navigate(route) => Ok(Some(Navigation::to(route))),
            ControlAction::ConfirmAnnotation => {
                let file = file
                    .file_ref()
                    .ok_or_else(|| PortalError::MissingFileId(row.patient_id.clone()))?;
                self.lock().modal = Some(Modal::ConfirmAnnotation {
                    patient_id: row.patient_id,
                    file,
                });
                Ok(None)
            }
            ControlAction::None => Ok(None),
        }
    }

    pub fn cancel_annotation(&self) {
        let mut st = self.lock();
        if matches!(st.modal, Some(Modal::ConfirmAnnotation { .. })) {
            st.modal = None;
        }
    }

    /// Submits the default annotation for the selected file, then refetches.
    pub async fn confirm_annotation(&self) -> Result<RefreshOutcome> {
        let file = {
            let mut st = self.lock();
            match st.modal.take() {
                Some(Modal::ConfirmAnnotation { file, .. }) => file,
                other => {
                    st.modal = other;
                    return Err(PortalError::NothingPending("annotation"));
                }
            }
        };
        self.annotate(file).await
    }

    /// Submits the default annotation for the row's file without a modal.
    pub async fn annotate_row(&self, patient_id: &RecordId) -> Result<RefreshOutcome> {
        let row = self.row(patient_id)?;
        self.annotate(file_ref_of(&row)?).await
    }

    async fn annotate(&self, file: FileRef) -> Result<RefreshOutcome> {
        let config = AnnotationConfig::default();
        if let Err(e) = self.api.annotate_file(&file, &config).await {
            warn!(file = %file, error = %e, "portal.table.annotate_failed");
            return Err(e);
        }
        info!(file = %file, "portal.table.annotation_submitted");
        self.refresh().await
    }

    pub fn open_note(&self, patient_id: &RecordId) -> Result<()> {
        let row = self.row(patient_id)?;
        let editor = NoteEditor::open(&row)?;
        self.lock().modal = Some(Modal::Note(editor));
        Ok(())
    }

    fn with_note<T>(&self, f: impl FnOnce(&mut NoteEditor) -> T) -> Result<T> {
        match self.lock().modal.as_mut() {
            Some(Modal::Note(editor)) => Ok(f(editor)),
            _ => Err(PortalError::NothingPending("note")),
        }
    }

    pub fn edit_note(&self) -> Result<()> {
        self.with_note(NoteEditor::edit)
    }

    pub fn set_note_text(&self, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        self.with_note(|ed| ed.set_text(text))
    }

    pub fn note_push(&self, c: char) -> Result<()> {
        self.with_note(|ed| ed.push_char(c))
    }

    pub fn note_pop(&self) -> Result<()> {
        self.with_note(NoteEditor::pop_char)
    }

    /// Submits the full note text, returns the editor to display mode and
    /// refetches.
    pub async fn save_note(&self) -> Result<RefreshOutcome> {
        let (file, text) = self.with_note(|ed| ed.save().map(|text| (ed.file().clone(), text)))??;
        if let Err(e) = self.api.update_file_notes(file.id(), &text).await {
            warn!(file = %file, error = %e, "portal.table.note_failed");
            return Err(e);
        }
        info!(file = %file, "portal.table.note_saved");
        self.refresh().await
    }

    /// Records the row's analysis as finished, then refetches.
    pub async fn mark_finished(&self, patient_id: &RecordId) -> Result<RefreshOutcome> {
        let row = self.row(patient_id)?;
        let file = file_ref_of(&row)?;
        if let Err(e) = self.api.update_finish_info(file.id()).await {
            warn!(file = %file, error = %e, "portal.table.finish_failed");
            return Err(e);
        }
        info!(file = %file, "portal.table.finish_info_updated");
        self.refresh().await
    }

    pub fn patient_details(&self, patient_id: &RecordId) -> Result<Navigation> {
        let row = self.row(patient_id)?;
        let file = file_ref_of(&row)?;
        Ok(Navigation::to(Route::patient_details(
            row.patient_id,
            file.id().clone(),
        )))
    }

    /// Selects the row's patient in the session and navigates to the
    /// similar-patients view with the row as state.
    pub async fn see_similar_patients(&self, patient_id: &RecordId) -> Result<Navigation> {
        let row = self.row(patient_id)?;
        let session = {
            let mut st = self.lock();
            st.session
                .select_patient(row.patient_id.clone(), row.patient_name.clone());
            st.session.clone()
        };
        self.store.save(&session).await?;
        debug!(patient = %row.patient_id, "portal.table.similar_patients");
        Ok(Navigation::with_state(Route::SimilarPatients, row))
    }
}

fn file_ref_of(row: &PatientRecord) -> Result<FileRef> {
    row.file
        .as_ref()
        .ok_or_else(|| PortalError::MissingFile(row.patient_id.clone()))?
        .file_ref()
        .ok_or_else(|| PortalError::MissingFileId(row.patient_id.clone()))
}

/// `createdAt` descending; rows without a parseable timestamp go last.
fn sort_newest_first(rows: &mut [PatientRecord]) {
    rows.sort_by(|a, b| {
        let ta = a.file.as_ref().and_then(|f| f.created_at());
        let tb = b.file.as_ref().and_then(|f| f.created_at());
        match (ta, tb) {
            (Some(a), Some(b)) => b.cmp(&a),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    });
}

//! Clinician note editor for one file.
use chrono::NaiveDateTime;
use priovar_common::time::format_date_time;

use crate::error::{PortalError, Result};
use crate::record::{FileRef, PatientRecord, RecordId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteMode {
    Display,
    Editing,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NoteEditor {
    patient_id: RecordId,
    file: FileRef,
    mode: NoteMode,
    text: String,
    comments: Vec<String>,
    clinician: Option<String>,
    date: Option<NaiveDateTime>,
}

impl NoteEditor {
    /// Opens the editor in display mode on the row's latest note.
    pub fn open(row: &PatientRecord) -> Result<Self> {
        let file = row
            .file
            .as_ref()
            .ok_or_else(|| PortalError::MissingFile(row.patient_id.clone()))?;
        let file_ref = file
            .file_ref()
            .ok_or_else(|| PortalError::MissingFileId(row.patient_id.clone()))?;
        Ok(Self {
            patient_id: row.patient_id.clone(),
            file: file_ref,
            mode: NoteMode::Display,
            text: file.latest_note().unwrap_or_default().to_string(),
            comments: file.clinician_comments.clone(),
            clinician: file.clinician_name.clone().filter(|n| !n.is_empty()),
            date: file.finished_at(),
        })
    }

    pub fn patient_id(&self) -> &RecordId {
        &self.patient_id
    }

    pub fn file(&self) -> &FileRef {
        &self.file
    }

    pub fn mode(&self) -> NoteMode {
        self.mode
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Every comment rendered as `"<clinician>: <comment>"`.
    pub fn history(&self) -> Vec<String> {
        let who = self.clinician.as_deref().unwrap_or("");
        self.comments
            .iter()
            .map(|c| format!("{who}: {c}"))
            .collect()
    }

    /// `"<date> by <person>"`, only when both are known. The date is the
    /// file's finish time; the portal keeps no timestamp per comment.
    pub fn caption(&self) -> Option<String> {
        match (&self.date, &self.clinician) {
            (Some(date), Some(person)) => {
                Some(format!("{} by {person}", format_date_time(date)))
            }
            _ => None,
        }
    }

    pub fn edit(&mut self) {
        self.mode = NoteMode::Editing;
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        if self.mode == NoteMode::Editing {
            self.text = text.into();
        }
    }

    pub fn push_char(&mut self, c: char) {
        if self.mode == NoteMode::Editing {
            self.text.push(c);
        }
    }

    pub fn pop_char(&mut self) {
        if self.mode == NoteMode::Editing {
            self.text.pop();
        }
    }

    /// Leaves edit mode and hands back the full text to submit.
    pub fn save(&mut self) -> Result<String> {
        if self.mode != NoteMode::Editing {
            return Err(PortalError::NothingPending("note edit"));
        }
        self.mode = NoteMode::Display;
        Ok(self.text.clone())
    }
}

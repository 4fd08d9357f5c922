//! Backend calls behind the patient table.
use async_trait::async_trait;
use priovar_http::{HttpClient, RequestOpts};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::Result;
use crate::record::{AnnotationConfig, FileRef, MedicalCenter, PatientRecord, RecordId};
use crate::table::PatientScope;

/// The portal endpoints the table consumes. Implemented over HTTP by
/// [`HttpPortalApi`]; tests substitute their own.
#[async_trait]
pub trait PortalApi: Send + Sync {
    /// Patients of other clinics this center was granted access to.
    async fn requested_patients(&self, center: &RecordId) -> Result<Vec<PatientRecord>>;

    /// The center's own patients.
    async fn clinic_patients(&self, center: &RecordId) -> Result<Vec<PatientRecord>>;

    async fn medical_center(&self, center: &RecordId) -> Result<MedicalCenter>;

    async fn update_file_notes(&self, file_id: &RecordId, notes: &str) -> Result<()>;

    async fn annotate_file(&self, file: &FileRef, config: &AnnotationConfig) -> Result<()>;

    /// Removes the patient's file and every analysis attached to it.
    async fn delete_patient(&self, patient_id: &RecordId) -> Result<()>;

    async fn update_finish_info(&self, file_id: &RecordId) -> Result<()>;

    async fn patients(&self, scope: PatientScope, center: &RecordId) -> Result<Vec<PatientRecord>> {
        match scope {
            PatientScope::Requested => self.requested_patients(center).await,
            PatientScope::Clinic => self.clinic_patients(center).await,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpPortalApi {
    client: HttpClient,
}

#[derive(Serialize)]
struct NotesBody<'a> {
    notes: &'a str,
}

impl HttpPortalApi {
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    async fn patient_list(&self, center: &RecordId, list: &'static str) -> Result<Vec<PatientRecord>> {
        let raw: Vec<Value> = self
            .client
            .get_json(&["medicalCenter", center.as_str(), list], RequestOpts::default())
            .await?;
        let rows = decode_rows(raw);
        debug!(rows = rows.len(), list, "portal.api.patients");
        Ok(rows)
    }
}

/// Decodes each row on its own; rows that still fail are logged and left out.
fn decode_rows(raw: Vec<Value>) -> Vec<PatientRecord> {
    raw.into_iter()
        .enumerate()
        .filter_map(|(i, v)| match serde_json::from_value::<PatientRecord>(v) {
            Ok(row) => Some(row),
            Err(e) => {
                warn!(row = i, error = %e, "portal.api.row_skipped");
                None
            }
        })
        .collect()
}

#[async_trait]
impl PortalApi for HttpPortalApi {
    async fn requested_patients(&self, center: &RecordId) -> Result<Vec<PatientRecord>> {
        self.patient_list(center, "requestedPatients").await
    }

    async fn clinic_patients(&self, center: &RecordId) -> Result<Vec<PatientRecord>> {
        self.patient_list(center, "patients").await
    }

    async fn medical_center(&self, center: &RecordId) -> Result<MedicalCenter> {
        Ok(self
            .client
            .get_json(&["medicalCenter", center.as_str()], RequestOpts::default())
            .await?)
    }

    async fn update_file_notes(&self, file_id: &RecordId, notes: &str) -> Result<()> {
        self.client
            .post_ack(
                &["file", file_id.as_str(), "notes"],
                Some(&NotesBody { notes }),
                RequestOpts::default(),
            )
            .await?;
        debug!(file = %file_id, "portal.api.notes_updated");
        Ok(())
    }

    async fn annotate_file(&self, file: &FileRef, config: &AnnotationConfig) -> Result<()> {
        self.client
            .post_ack(
                &["file", file.path_segment(), file.id().as_str(), "annotate"],
                Some(config),
                RequestOpts::default(),
            )
            .await?;
        debug!(file = %file, "portal.api.annotation_submitted");
        Ok(())
    }

    async fn delete_patient(&self, patient_id: &RecordId) -> Result<()> {
        self.client
            .delete_ack(&["patient", patient_id.as_str()], RequestOpts::default())
            .await?;
        debug!(patient = %patient_id, "portal.api.patient_deleted");
        Ok(())
    }

    async fn update_finish_info(&self, file_id: &RecordId) -> Result<()> {
        self.client
            .post_ack::<()>(&["file", file_id.as_str(), "finish"], None, RequestOpts::default())
            .await?;
        debug!(file = %file_id, "portal.api.finish_info_updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn one_bad_row_does_not_drop_the_list() {
        let rows = decode_rows(vec![
            json!({ "patientId": 1, "file": { "vcfFileId": 2, "fileStatus": null } }),
            json!({ "patientName": "no id" }),
            json!({ "patientId": 3, "file": "not an object" }),
            json!({ "patientId": 4 }),
        ]);
        let ids: Vec<&str> = rows.iter().map(|r| r.patient_id.as_str()).collect();
        assert_eq!(ids, ["1", "4"]);
    }
}

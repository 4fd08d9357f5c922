#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use priovar_common::observability::{LogConfig, LogFormat};
use priovar_http::HttpError;
use priovar_portal::{
    AnnotationConfig, FileRecord, FileRef, FileStatus, MedicalCenter, PatientRecord,
    PatientScope, PatientTable, PortalApi, PortalError, RecordId, Result, SessionContext,
    SessionStore, StageInfo,
};
use tokio::sync::oneshot;

static INIT_PATH: OnceLock<std::path::PathBuf> = OnceLock::new();

pub fn init_test_tracing() {
    let _ = INIT_PATH.get_or_init(|| {
        let config = LogConfig {
            app_name: "priovar-tests",
            log_dir: Some(std::env::temp_dir().join("priovar-tests")),
            format: LogFormat::Text,
            default_filter: "debug".into(),
            ..LogConfig::default()
        };
        priovar_common::observability::init_logging(config).unwrap_or_default()
    });
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    List(PatientScope, RecordId),
    Center(RecordId),
    Notes(RecordId, String),
    Annotate(FileRef, AnnotationConfig),
    Delete(RecordId),
    Finish(RecordId),
}

/// One scripted list response, optionally held back until released.
pub struct Scripted {
    gate: Option<oneshot::Receiver<()>>,
    result: std::result::Result<Vec<PatientRecord>, Duration>,
}

impl Scripted {
    pub fn rows(rows: Vec<PatientRecord>) -> Self {
        Self {
            gate: None,
            result: Ok(rows),
        }
    }

    pub fn gated(gate: oneshot::Receiver<()>, rows: Vec<PatientRecord>) -> Self {
        Self {
            gate: Some(gate),
            result: Ok(rows),
        }
    }

    pub fn timeout() -> Self {
        Self {
            gate: None,
            result: Err(Duration::from_secs(15)),
        }
    }
}

/// In-memory backend recording every call it receives. Once the script runs
/// out, list calls return `fallback`.
#[derive(Default)]
pub struct MockApi {
    calls: Mutex<Vec<Call>>,
    script: Mutex<VecDeque<Scripted>>,
    fallback: Mutex<Vec<PatientRecord>>,
    fail_mutations: Mutex<bool>,
}

impl MockApi {
    pub fn with_rows(rows: Vec<PatientRecord>) -> Arc<Self> {
        let api = Self::default();
        *api.fallback.lock().unwrap() = rows;
        Arc::new(api)
    }

    pub fn script(&self, items: Vec<Scripted>) {
        self.script.lock().unwrap().extend(items);
    }

    pub fn fail_mutations(&self) {
        *self.fail_mutations.lock().unwrap() = true;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    pub fn list_calls(&self) -> usize {
        self.count(|c| matches!(c, Call::List(..)))
    }

    pub async fn wait_for_calls(&self, n: usize) {
        while self.calls.lock().unwrap().len() < n {
            tokio::task::yield_now().await;
        }
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn mutation(&self) -> Result<()> {
        if *self.fail_mutations.lock().unwrap() {
            return Err(PortalError::Http(HttpError::Timeout(Duration::from_secs(15))));
        }
        Ok(())
    }

    async fn list(&self, scope: PatientScope, center: &RecordId) -> Result<Vec<PatientRecord>> {
        self.record(Call::List(scope, center.clone()));
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Scripted { gate, result }) => {
                if let Some(gate) = gate {
                    let _ = gate.await;
                }
                result.map_err(|d| PortalError::Http(HttpError::Timeout(d)))
            }
            None => Ok(self.fallback.lock().unwrap().clone()),
        }
    }
}

#[async_trait]
impl PortalApi for MockApi {
    async fn requested_patients(&self, center: &RecordId) -> Result<Vec<PatientRecord>> {
        self.list(PatientScope::Requested, center).await
    }

    async fn clinic_patients(&self, center: &RecordId) -> Result<Vec<PatientRecord>> {
        self.list(PatientScope::Clinic, center).await
    }

    async fn medical_center(&self, center: &RecordId) -> Result<MedicalCenter> {
        self.record(Call::Center(center.clone()));
        Ok(MedicalCenter {
            name: "Hacettepe".into(),
        })
    }

    async fn update_file_notes(&self, file_id: &RecordId, notes: &str) -> Result<()> {
        self.record(Call::Notes(file_id.clone(), notes.to_string()));
        self.mutation()
    }

    async fn annotate_file(&self, file: &FileRef, config: &AnnotationConfig) -> Result<()> {
        self.record(Call::Annotate(file.clone(), config.clone()));
        self.mutation()
    }

    async fn delete_patient(&self, patient_id: &RecordId) -> Result<()> {
        self.record(Call::Delete(patient_id.clone()));
        self.mutation()
    }

    async fn update_finish_info(&self, file_id: &RecordId) -> Result<()> {
        self.record(Call::Finish(file_id.clone()));
        self.mutation()
    }
}

pub fn patient(id: &str, status: FileStatus) -> PatientRecord {
    PatientRecord {
        patient_id: id.into(),
        patient_name: format!("Patient {id}"),
        file: Some(FileRecord {
            vcf_id: Some(format!("vcf-{id}").into()),
            file_name: Some(format!("sample-{id}.vcf")),
            file_status: status,
            created_at: Some("2024-01-15T09:00:00".into()),
            clinician_name: Some("Dr. Kaya".into()),
            is_annotated: true,
            annotations: Some(StageInfo::new("DONE")),
            analyses: Some(StageInfo::new("DONE")),
            ..Default::default()
        }),
    }
}

pub fn fastq_patient(id: &str, status: FileStatus) -> PatientRecord {
    let mut p = patient(id, status);
    if let Some(f) = p.file.as_mut() {
        f.vcf_id = None;
        f.fastq_pair_id = Some(format!("fq-{id}").into());
    }
    p
}

pub fn table(api: Arc<MockApi>) -> PatientTable {
    init_test_tracing();
    PatientTable::new(
        api,
        SessionStore::in_memory(),
        SessionContext::new(Some("7".into())),
        PatientScope::Requested,
    )
}

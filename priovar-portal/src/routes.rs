//! Client routes a row action can lead to.
use std::fmt;

use crate::record::{PatientRecord, RecordId};

pub const SAMPLE_PREFIX: &str = "/priovar/sample/";
pub const PATIENT_DETAILS_TEMPLATE: &str = "/priovar/patient-details/:patientId/:fileId";
pub const SIMILAR_PATIENTS: &str = "/priovar/similar-patients";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Sample { file_name: String },
    PatientDetails { patient_id: RecordId, file_id: RecordId },
    SimilarPatients,
}

impl Route {
    pub fn sample(file_name: impl Into<String>) -> Self {
        Route::Sample {
            file_name: file_name.into(),
        }
    }

    pub fn patient_details(patient_id: RecordId, file_id: RecordId) -> Self {
        Route::PatientDetails {
            patient_id,
            file_id,
        }
    }

    pub fn path(&self) -> String {
        match self {
            Route::Sample { file_name } => format!("{SAMPLE_PREFIX}{file_name}"),
            Route::PatientDetails {
                patient_id,
                file_id,
            } => PATIENT_DETAILS_TEMPLATE
                .replace(":patientId", patient_id.as_str())
                .replace(":fileId", file_id.as_str()),
            Route::SimilarPatients => SIMILAR_PATIENTS.to_string(),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// A route plus the state handed to the destination.
#[derive(Debug, Clone, PartialEq)]
pub struct Navigation {
    pub route: Route,
    pub state: Option<PatientRecord>,
}

impl Navigation {
    pub fn to(route: Route) -> Self {
        Self { route, state: None }
    }

    pub fn with_state(route: Route, row: PatientRecord) -> Self {
        Self {
            route,
            state: Some(row),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths() {
        assert_eq!(Route::sample("s-41.vcf").path(), "/priovar/sample/s-41.vcf");
        assert_eq!(
            Route::patient_details("41".into(), "1201".into()).path(),
            "/priovar/patient-details/41/1201"
        );
        assert_eq!(Route::SimilarPatients.to_string(), "/priovar/similar-patients");
    }
}

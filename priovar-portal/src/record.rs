//! Wire types of the patient list endpoints.
//!
//! The backend mixes camelCase and snake_case keys (`vcfFileId` next to
//! `vcf_id`, `isAnnotated` next to `is_annotated`) and sends ids either as
//! numbers or strings, so decoding is deliberately lenient.
use chrono::NaiveDateTime;
use priovar_common::time::parse_timestamp;
use serde::{Deserialize, Deserializer, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Opaque backend identifier, kept as text whatever its JSON type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl FromStr for RecordId {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().to_string()))
    }
}

impl From<u64> for RecordId {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(de: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Unsigned(u64),
            Signed(i64),
        }
        Ok(match Raw::deserialize(de)? {
            Raw::Text(s) => RecordId(s),
            Raw::Unsigned(n) => RecordId(n.to_string()),
            Raw::Signed(n) => RecordId(n.to_string()),
        })
    }
}

/// Server-reported lifecycle of an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FileStatus {
    FileWaiting,
    FileAnnotated,
    AnalysisInProgress,
    AnalysisDone,
    Unknown(String),
}

impl FileStatus {
    pub fn as_str(&self) -> &str {
        match self {
            FileStatus::FileWaiting => "FILE_WAITING",
            FileStatus::FileAnnotated => "FILE_ANNOTATED",
            FileStatus::AnalysisInProgress => "ANALYSIS_IN_PROGRESS",
            FileStatus::AnalysisDone => "ANALYSIS_DONE",
            FileStatus::Unknown(raw) => raw,
        }
    }
}

impl From<String> for FileStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "FILE_WAITING" => FileStatus::FileWaiting,
            "FILE_ANNOTATED" => FileStatus::FileAnnotated,
            "ANALYSIS_IN_PROGRESS" => FileStatus::AnalysisInProgress,
            "ANALYSIS_DONE" => FileStatus::AnalysisDone,
            _ => FileStatus::Unknown(s),
        }
    }
}

impl From<&str> for FileStatus {
    fn from(s: &str) -> Self {
        FileStatus::from(s.to_string())
    }
}

impl From<FileStatus> for String {
    fn from(s: FileStatus) -> Self {
        s.as_str().to_string()
    }
}

impl Default for FileStatus {
    fn default() -> Self {
        FileStatus::Unknown(String::new())
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of one processing stage (annotation or analysis).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageInfo {
    #[serde(default)]
    pub status: Option<String>,
}

impl StageInfo {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
        }
    }

    /// The status, with an empty string treated as absent.
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref().filter(|s| !s.is_empty())
    }
}

/// Which id space a file lives in, and its id there.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FileRef {
    Vcf(RecordId),
    Fastq(RecordId),
}

impl FileRef {
    pub fn id(&self) -> &RecordId {
        match self {
            FileRef::Vcf(id) | FileRef::Fastq(id) => id,
        }
    }

    /// The `type` argument of the annotate call.
    pub fn kind(&self) -> &'static str {
        match self {
            FileRef::Vcf(_) => "VCF",
            FileRef::Fastq(_) => "FASTQ",
        }
    }

    /// Path segment of the annotate endpoint.
    pub fn path_segment(&self) -> &'static str {
        match self {
            FileRef::Vcf(_) => "vcf",
            FileRef::Fastq(_) => "fastq",
        }
    }
}

impl fmt::Display for FileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.id())
    }
}

/// One uploaded genomic file (a VCF or a FASTQ pair).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "WireFileRecord")]
pub struct FileRecord {
    #[serde(rename = "vcfFileId")]
    pub vcf_id: Option<RecordId>,
    pub fastq_pair_id: Option<RecordId>,
    pub file_name: Option<String>,
    pub file_status: FileStatus,
    pub created_at: Option<String>,
    pub finished_at: Option<String>,
    pub clinician_name: Option<String>,
    pub clinician_comments: Vec<String>,
    pub is_annotated: bool,
    pub annotations: Option<StageInfo>,
    pub analyses: Option<StageInfo>,
}

/// `FileRecord` as the backend sends it. Every spelling of a key is its own
/// field and every value may be null, so one odd row never fails the list.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireFileRecord {
    #[serde(default)]
    vcf_file_id: Option<RecordId>,
    #[serde(default)]
    vcf_id: Option<RecordId>,
    #[serde(default, rename = "vcf_id")]
    vcf_id_snake: Option<RecordId>,
    #[serde(default)]
    fastq_pair_id: Option<RecordId>,
    #[serde(default, rename = "fastq_pair_id")]
    fastq_pair_id_snake: Option<RecordId>,
    #[serde(default)]
    file_name: Option<String>,
    #[serde(default)]
    file_status: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    finished_at: Option<String>,
    #[serde(default)]
    clinician_name: Option<String>,
    #[serde(default)]
    clinician_comments: Option<Vec<Option<String>>>,
    #[serde(default)]
    is_annotated: Option<bool>,
    #[serde(default, rename = "is_annotated")]
    is_annotated_snake: Option<bool>,
    #[serde(default)]
    annotations: Option<StageInfo>,
    #[serde(default)]
    analyses: Option<StageInfo>,
}

impl From<WireFileRecord> for FileRecord {
    fn from(w: WireFileRecord) -> Self {
        Self {
            vcf_id: w.vcf_file_id.or(w.vcf_id).or(w.vcf_id_snake),
            fastq_pair_id: w.fastq_pair_id.or(w.fastq_pair_id_snake),
            file_name: w.file_name,
            file_status: w.file_status.map(FileStatus::from).unwrap_or_default(),
            created_at: w.created_at,
            finished_at: w.finished_at,
            clinician_name: w.clinician_name,
            clinician_comments: w
                .clinician_comments
                .unwrap_or_default()
                .into_iter()
                .flatten()
                .collect(),
            is_annotated: w.is_annotated.or(w.is_annotated_snake).unwrap_or(false),
            annotations: w.annotations,
            analyses: w.analyses,
        }
    }
}

fn null_as_default<'de, D, T>(de: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(de)?.unwrap_or_default())
}

impl FileRecord {
    /// The file's id and type. The VCF id wins when present; otherwise the
    /// FASTQ pair id; a record with neither has no usable reference.
    pub fn file_ref(&self) -> Option<FileRef> {
        match (&self.vcf_id, &self.fastq_pair_id) {
            (Some(vcf), _) => Some(FileRef::Vcf(vcf.clone())),
            (None, Some(fastq)) => Some(FileRef::Fastq(fastq.clone())),
            (None, None) => None,
        }
    }

    pub fn created_at(&self) -> Option<NaiveDateTime> {
        self.created_at.as_deref().and_then(parse_timestamp)
    }

    pub fn finished_at(&self) -> Option<NaiveDateTime> {
        self.finished_at.as_deref().and_then(parse_timestamp)
    }

    /// Most recent clinician comment.
    pub fn latest_note(&self) -> Option<&str> {
        self.clinician_comments.last().map(String::as_str)
    }
}

/// A table row: a patient and the file under review.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientRecord {
    pub patient_id: RecordId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub patient_name: String,
    #[serde(default)]
    pub file: Option<FileRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MedicalCenter {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

/// Parameters submitted with an annotation request.
///
/// Only [`AnnotationConfig::default`] is ever sent; values are not validated
/// client side.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationConfig {
    #[serde(rename = "type")]
    pub kind: String,
    pub machine: String,
    pub kit: u32,
    pub panel: String,
    pub germline: bool,
    pub alignment: String,
    pub reference: String,
    pub is_snp: bool,
    pub is_cnv: bool,
    pub cnv_analysis: String,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            kind: "Exome".into(),
            machine: "Illumina".into(),
            kit: 0,
            panel: String::new(),
            germline: true,
            alignment: "BWA".into(),
            reference: "GRCh38".into(),
            is_snp: false,
            is_cnv: false,
            cnv_analysis: "xhmm+decont".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_mixed_case_row() {
        let row: PatientRecord = serde_json::from_value(json!({
            "patientId": 41,
            "patientName": "Ayşe Y.",
            "file": {
                "vcf_id": 1201,
                "fileName": "sample-41.vcf",
                "fileStatus": "ANALYSIS_DONE",
                "createdAt": "2024-02-01T10:00:00",
                "finishedAt": null,
                "clinicianName": "Dr. Kaya",
                "clinicianComments": null,
                "is_annotated": true,
                "annotations": { "status": "DONE" },
                "analyses": { "status": "DONE" }
            }
        }))
        .unwrap();

        assert_eq!(row.patient_id.as_str(), "41");
        let file = row.file.unwrap();
        assert_eq!(file.vcf_id, Some(RecordId::from("1201")));
        assert_eq!(file.file_status, FileStatus::AnalysisDone);
        assert!(file.is_annotated);
        assert!(file.clinician_comments.is_empty());
        assert!(file.finished_at().is_none());
        assert!(file.created_at().is_some());
    }

    #[test]
    fn null_status_decodes_as_unknown() {
        let row: PatientRecord = serde_json::from_value(json!({
            "patientId": 1,
            "patientName": null,
            "file": { "vcfFileId": 2, "fileStatus": null }
        }))
        .unwrap();
        let file = row.file.unwrap();
        assert_eq!(file.file_status, FileStatus::Unknown(String::new()));
        assert_eq!(row.patient_name, "");
    }

    #[test]
    fn null_annotated_flag_is_false() {
        let row: PatientRecord = serde_json::from_value(json!({
            "patientId": 1,
            "file": { "vcfFileId": 2, "fileStatus": "FILE_WAITING", "isAnnotated": null }
        }))
        .unwrap();
        assert!(!row.file.unwrap().is_annotated);
    }

    #[test]
    fn both_vcf_id_spellings_are_accepted() {
        let row: PatientRecord = serde_json::from_value(json!({
            "patientId": 1,
            "file": {
                "vcfFileId": 2,
                "vcf_id": 3,
                "isAnnotated": true,
                "is_annotated": false,
                "clinicianComments": ["a", null, "b"]
            }
        }))
        .unwrap();
        let file = row.file.unwrap();
        assert_eq!(file.file_ref(), Some(FileRef::Vcf("2".into())));
        assert!(file.is_annotated);
        assert_eq!(file.clinician_comments, vec!["a", "b"]);
    }

    #[test]
    fn encoded_rows_decode_again() {
        let file = FileRecord {
            vcf_id: Some("9".into()),
            file_status: FileStatus::AnalysisDone,
            is_annotated: true,
            clinician_comments: vec!["ok".into()],
            ..Default::default()
        };
        let back: FileRecord =
            serde_json::from_value(serde_json::to_value(&file).unwrap()).unwrap();
        assert_eq!(back, file);
    }

    #[test]
    fn unknown_statuses_round_trip() {
        let s: FileStatus = serde_json::from_value(json!("QUEUED")).unwrap();
        assert_eq!(s, FileStatus::Unknown("QUEUED".into()));
        assert_eq!(serde_json::to_value(&s).unwrap(), json!("QUEUED"));
    }

    #[test]
    fn vcf_id_takes_precedence_over_fastq() {
        let both = FileRecord {
            vcf_id: Some("v1".into()),
            fastq_pair_id: Some("f1".into()),
            ..Default::default()
        };
        assert_eq!(both.file_ref(), Some(FileRef::Vcf("v1".into())));

        let fastq = FileRecord {
            fastq_pair_id: Some("f2".into()),
            ..Default::default()
        };
        let r = fastq.file_ref().unwrap();
        assert_eq!(r.kind(), "FASTQ");
        assert_eq!(r.path_segment(), "fastq");
        assert_eq!(r.id().as_str(), "f2");

        assert_eq!(FileRecord::default().file_ref(), None);
    }

    #[test]
    fn default_annotation_config_wire_shape() {
        let v = serde_json::to_value(AnnotationConfig::default()).unwrap();
        assert_eq!(
            v,
            json!({
                "type": "Exome",
                "machine": "Illumina",
                "kit": 0,
                "panel": "",
                "germline": true,
                "alignment": "BWA",
                "reference": "GRCh38",
                "isSnp": false,
                "isCnv": false,
                "cnvAnalysis": "xhmm+decont"
            })
        );
    }

    #[test]
    fn empty_stage_status_counts_as_absent() {
        assert_eq!(StageInfo::new("").status(), None);
        assert_eq!(StageInfo::new("RUNNING").status(), Some("RUNNING"));
    }
}

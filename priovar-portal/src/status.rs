//! What a row shows: derived status label, status badge, analysis control.
use std::fmt;

use crate::record::{FileRecord, FileStatus};
use crate::routes::Route;

/// Effective status of a file for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DerivedStatus {
    /// The file has not been annotated yet.
    Waiting,
    /// Annotation is still going; carries the annotation status.
    Annotation(String),
    /// Annotation finished (or was never tracked); carries the analysis status.
    Analysis(Option<String>),
}

impl DerivedStatus {
    /// Text shown in the table, `None` when the analysis status is absent.
    pub fn label(&self) -> Option<String> {
        match self {
            DerivedStatus::Waiting => Some("WAITING".to_string()),
            DerivedStatus::Annotation(s) => Some(format!("ANNO_{s}")),
            DerivedStatus::Analysis(s) => s.clone(),
        }
    }
}

impl fmt::Display for DerivedStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label().as_deref().unwrap_or(""))
    }
}

/// Annotation incompleteness masks the analysis status entirely.
pub fn derive_status(file: &FileRecord) -> DerivedStatus {
    if !file.is_annotated {
        return DerivedStatus::Waiting;
    }
    let annotation = file.annotations.as_ref().and_then(|a| a.status());
    match annotation {
        None | Some("DONE") => DerivedStatus::Analysis(
            file.analyses
                .as_ref()
                .and_then(|a| a.status())
                .map(str::to_string),
        ),
        Some(other) => DerivedStatus::Annotation(other.to_string()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Error,
    Secondary,
    Warning,
    Success,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusBadge {
    pub label: &'static str,
    pub tone: Tone,
}

impl StatusBadge {
    pub fn for_status(status: &FileStatus) -> Self {
        let (label, tone) = match status {
            FileStatus::FileWaiting => ("File Not Found", Tone::Error),
            FileStatus::FileAnnotated => ("Analysis Waiting", Tone::Secondary),
            FileStatus::AnalysisInProgress => ("Analysis Running", Tone::Warning),
            FileStatus::AnalysisDone => ("Analysis Done", Tone::Success),
            FileStatus::Unknown(_) => ("...", Tone::Neutral),
        };
        StatusBadge { label, tone }
    }
}

/// What activating a row control does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlAction {
    Navigate(Route),
    ConfirmAnnotation,
    None,
}

/// The per-row analysis button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowControl {
    pub label: &'static str,
    pub enabled: bool,
    pub spinner: bool,
    pub action: ControlAction,
}

impl RowControl {
    /// Keyed on the raw server status only; `None` means nothing is rendered.
    pub fn for_status(status: &FileStatus, file_name: &str) -> Option<Self> {
        match status {
            FileStatus::AnalysisDone => Some(RowControl {
                label: "View",
                enabled: true,
                spinner: false,
                action: ControlAction::Navigate(Route::sample(file_name)),
            }),
            FileStatus::AnalysisInProgress => Some(RowControl {
                label: "Running",
                enabled: false,
                spinner: true,
                action: ControlAction::None,
            }),
            FileStatus::FileAnnotated => Some(RowControl {
                label: "Analysis Not Started",
                enabled: true,
                spinner: false,
                action: ControlAction::ConfirmAnnotation,
            }),
            FileStatus::FileWaiting | FileStatus::Unknown(_) => None,
        }
    }

    pub fn for_file(file: &FileRecord) -> Option<Self> {
        Self::for_status(&file.file_status, file.file_name.as_deref().unwrap_or(""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::StageInfo;

    fn file(annotated: bool, anno: Option<&str>, analysis: Option<&str>) -> FileRecord {
        FileRecord {
            is_annotated: annotated,
            annotations: anno.map(StageInfo::new),
            analyses: analysis.map(StageInfo::new),
            ..Default::default()
        }
    }

    #[test]
    fn unannotated_is_waiting_whatever_else_is_set() {
        for f in [
            file(false, None, None),
            file(false, Some("RUNNING"), Some("DONE")),
            file(false, Some("DONE"), Some("ANALYSIS_DONE")),
        ] {
            assert_eq!(derive_status(&f), DerivedStatus::Waiting);
            assert_eq!(derive_status(&f).label().as_deref(), Some("WAITING"));
        }
    }

    #[test]
    fn unfinished_annotation_masks_analysis() {
        let f = file(true, Some("RUNNING"), Some("DONE"));
        assert_eq!(derive_status(&f).label().as_deref(), Some("ANNO_RUNNING"));
    }

    #[test]
    fn finished_or_missing_annotation_yields_analysis_status() {
        assert_eq!(
            derive_status(&file(true, Some("DONE"), Some("IN_PROGRESS"))),
            DerivedStatus::Analysis(Some("IN_PROGRESS".into()))
        );
        assert_eq!(
            derive_status(&file(true, None, Some("DONE"))).label().as_deref(),
            Some("DONE")
        );
        assert_eq!(derive_status(&file(true, None, None)).label(), None);
        assert_eq!(derive_status(&file(true, Some(""), None)), DerivedStatus::Analysis(None));
    }

    #[test]
    fn control_table() {
        let done = RowControl::for_status(&FileStatus::AnalysisDone, "s1.vcf").unwrap();
        assert_eq!(done.label, "View");
        assert!(done.enabled && !done.spinner);
        assert_eq!(done.action, ControlAction::Navigate(Route::sample("s1.vcf")));

        let running = RowControl::for_status(&FileStatus::AnalysisInProgress, "s1.vcf").unwrap();
        assert_eq!(running.label, "Running");
        assert!(!running.enabled && running.spinner);
        assert_eq!(running.action, ControlAction::None);

        let annotated = RowControl::for_status(&FileStatus::FileAnnotated, "s1.vcf").unwrap();
        assert_eq!(annotated.label, "Analysis Not Started");
        assert_eq!(annotated.action, ControlAction::ConfirmAnnotation);

        assert!(RowControl::for_status(&FileStatus::FileWaiting, "s1.vcf").is_none());
        assert!(RowControl::for_status(&"SOMETHING".into(), "s1.vcf").is_none());
    }

    #[test]
    fn file_waiting_fixture_has_badge_but_no_control() {
        let f = FileRecord {
            file_status: FileStatus::FileWaiting,
            file_name: Some("lost.vcf".into()),
            ..Default::default()
        };
        assert!(RowControl::for_file(&f).is_none());
        assert_eq!(derive_status(&f), DerivedStatus::Waiting);
        let badge = StatusBadge::for_status(&f.file_status);
        assert_eq!(badge.label, "File Not Found");
        assert_eq!(badge.tone, Tone::Error);
    }

    #[test]
    fn unknown_status_gets_neutral_badge() {
        let badge = StatusBadge::for_status(&"QUEUED".into());
        assert_eq!(badge, StatusBadge { label: "...", tone: Tone::Neutral });
    }
}

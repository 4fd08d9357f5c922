//! One-shot CLI operations. Each one loads the current list, finds the row by
//! patient id and drives the same table operations the TUI uses.
use anyhow::{Context, Result, bail};
use priovar_portal::{
    PatientScope, PatientTable, RecordId, RefreshOutcome, TableRow, table::DELETE_WARNING,
};
use std::io::{self, BufRead, Write};

pub async fn list(table: &PatientTable, scope: Option<PatientScope>, json: bool) -> Result<()> {
    if let Some(scope) = scope {
        table.set_scope(scope);
    }
    let title = match table.load_title().await {
        Ok(title) => title,
        Err(e) => {
            tracing::warn!(error = %e, "app.list.title_failed");
            table.scope().title(None)
        }
    };
    table.refresh().await.context("fetching patients")?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if json {
        serde_json::to_writer_pretty(&mut out, &table.records())?;
        writeln!(out)?;
        return Ok(());
    }

    writeln!(out, "{title}")?;
    for row in table.snapshot().rows {
        writeln!(out, "{}", describe(&row))?;
    }
    Ok(())
}

fn describe(row: &TableRow) -> String {
    let mut cells = vec![
        row.record.patient_id.to_string(),
        row.patient_name().to_string(),
    ];
    if row.record.file.is_some() {
        cells.push(row.uploaded_at.clone());
        cells.push(row.completed_at.clone());
        cells.push(row.badge.as_ref().map(|b| b.label.to_string()).unwrap_or_default());
        cells.push(row.derived_status.clone().unwrap_or_default());
        if let Some(control) = &row.control {
            cells.push(format!("[{}]", control.label));
        }
    }
    cells.join("\t")
}

async fn locate(table: &PatientTable, patient: &RecordId) -> Result<()> {
    table.refresh().await.context("fetching patients")?;
    if table.patient(patient).is_none() {
        bail!(
            "patient {patient} is not in the {} list",
            table.scope().as_str()
        );
    }
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    eprint!("{prompt} [y/N] ");
    io::stderr().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn report(what: &str, outcome: RefreshOutcome) {
    match outcome {
        RefreshOutcome::Applied(n) => println!("{what}; {n} patient(s) listed"),
        RefreshOutcome::Stale => println!("{what}"),
    }
}

pub async fn delete(table: &PatientTable, patient: &RecordId, yes: bool) -> Result<()> {
    locate(table, patient).await?;
    table.request_delete(patient)?;
    if !yes {
        eprintln!("{DELETE_WARNING}");
        if !confirm(&format!("Delete patient {patient}?"))? {
            table.cancel_delete();
            println!("cancelled");
            return Ok(());
        }
    }
    let outcome = table.confirm_delete().await?;
    report(&format!("deleted patient {patient}"), outcome);
    Ok(())
}

pub async fn annotate(table: &PatientTable, patient: &RecordId) -> Result<()> {
    locate(table, patient).await?;
    let outcome = table.annotate_row(patient).await?;
    report(&format!("annotation started for patient {patient}"), outcome);
    Ok(())
}

pub async fn note(table: &PatientTable, patient: &RecordId, text: &str) -> Result<()> {
    locate(table, patient).await?;
    table.open_note(patient)?;
    table.edit_note()?;
    table.set_note_text(text)?;
    let outcome = table.save_note().await?;
    table.dismiss_modal();
    report(&format!("note saved for patient {patient}"), outcome);
    Ok(())
}

pub async fn finish(table: &PatientTable, patient: &RecordId) -> Result<()> {
    locate(table, patient).await?;
    let outcome = table.mark_finished(patient).await?;
    report(&format!("analysis of patient {patient} marked finished"), outcome);
    Ok(())
}

pub async fn similar(table: &PatientTable, patient: &RecordId) -> Result<()> {
    locate(table, patient).await?;
    let nav = table.see_similar_patients(patient).await?;
    println!("{}", nav.route.path());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use priovar_http::HttpClient;
    use priovar_portal::{HttpPortalApi, SessionContext, SessionStore};
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn rows() -> serde_json::Value {
        json!([
            {
                "patientId": 41,
                "patientName": "Ada",
                "file": {
                    "vcfFileId": 1201,
                    "fileName": "ada.vcf",
                    "fileStatus": "FILE_ANNOTATED",
                    "createdAt": "2024-03-01T10:00:00",
                    "clinicianName": "Dr. Kaya",
                    "clinicianComments": ["check BRCA2"]
                }
            },
            { "patientId": 42, "patientName": "Lin" }
        ])
    }

    async fn setup(dir: &tempfile::TempDir) -> (MockServer, PatientTable) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/medicalCenter/7/requestedPatients"))
            .respond_with(ResponseTemplate::new(200).set_body_json(rows()))
            .mount(&server)
            .await;
        let client = HttpClient::new(&format!("{}/", server.uri())).unwrap();
        let table = PatientTable::new(
            Arc::new(HttpPortalApi::new(client)),
            SessionStore::at(dir.path().join("session.json")),
            SessionContext::new(Some(RecordId::from("7"))),
            PatientScope::Requested,
        );
        (server, table)
    }

    #[tokio::test]
    async fn unknown_patient_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let (_server, table) = setup(&dir).await;
        let err = finish(&table, &RecordId::from("99")).await.unwrap_err();
        assert!(err.to_string().contains("patient 99"));
    }

    #[tokio::test]
    async fn delete_with_yes_skips_the_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let (server, table) = setup(&dir).await;
        Mock::given(method("DELETE"))
            .and(path("/patient/41"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        delete(&table, &RecordId::from("41"), true).await.unwrap();
        assert!(table.snapshot().modal.is_none());
    }

    #[tokio::test]
    async fn note_posts_the_full_text() {
        let dir = tempfile::tempdir().unwrap();
        let (server, table) = setup(&dir).await;
        Mock::given(method("POST"))
            .and(path("/file/1201/notes"))
            .and(body_json(json!({ "notes": "re-run with panel" })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        note(&table, &RecordId::from("41"), "re-run with panel")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn finish_without_a_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let (_server, table) = setup(&dir).await;
        assert!(finish(&table, &RecordId::from("42")).await.is_err());
    }

    #[test]
    fn fileless_rows_only_show_identity() {
        let row = TableRow::from_record(priovar_portal::PatientRecord {
            patient_id: RecordId::from("42"),
            patient_name: "Lin".into(),
            file: None,
        });
        assert_eq!(describe(&row), "42\tLin");
    }
}

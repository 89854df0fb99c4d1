use crate::import::{
    self, EssayImportRequest, ImportFormat, ImportReport, ParsedRecord, ReferenceTables,
    TestImportRequest,
};
use crate::ipc::error::{err, ok};
use crate::ipc::handlers::{now_rfc3339, opt_str, require_db, require_str};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

fn parse_format(req: &Request) -> Result<ImportFormat, serde_json::Value> {
    match req.params.get("format").and_then(|v| v.as_str()) {
        Some("pipe") => Ok(ImportFormat::PlainDelimited),
        Some("csv") => Ok(ImportFormat::HeaderedCsv),
        _ => Err(err(
            &req.id,
            "bad_params",
            "params.format must be \"pipe\" or \"csv\"",
            None,
        )),
    }
}

/// One insert per accepted record. Deliberately no surrounding transaction:
/// partial success is a normal outcome of a bulk import, and the report
/// carries the per-line failures.
fn insert_record(conn: &Connection, record: &ParsedRecord) -> anyhow::Result<()> {
    match record {
        ParsedRecord::MultipleChoice {
            question,
            alternatives,
            correct_index,
            justification,
            subject_id,
            series_id,
            theme_id,
            teacher_id,
        } => {
            conn.execute(
                "INSERT INTO questions(id, subject_id, series_id, theme_id, teacher_id,
                                       question, alternatives, correct_index, justification, created_at)
                 VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                (
                    Uuid::new_v4().to_string(),
                    subject_id,
                    series_id,
                    theme_id.as_deref(),
                    teacher_id,
                    question,
                    alternatives.join(";"),
                    *correct_index as i64,
                    justification,
                    now_rfc3339(),
                ),
            )?;
        }
        ParsedRecord::Essay {
            statement,
            expected_answer,
            subject_id,
            series_id,
            theme_id,
            teacher_id,
        } => {
            conn.execute(
                "INSERT INTO essay_questions(id, subject_id, series_id, theme_id, teacher_id,
                                             statement, expected_answer, created_at)
                 VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
                (
                    Uuid::new_v4().to_string(),
                    subject_id,
                    series_id,
                    theme_id.as_deref(),
                    teacher_id,
                    statement,
                    expected_answer,
                    now_rfc3339(),
                ),
            )?;
        }
    }
    Ok(())
}

fn report_json(id: &str, report: &ImportReport) -> serde_json::Value {
    let errors: Vec<serde_json::Value> = report
        .errors
        .iter()
        .map(|e| json!({ "line": e.line, "message": e.message }))
        .collect();
    ok(
        id,
        json!({
            "imported": report.success_count,
            "failed": report.errors.len(),
            "errors": errors
        }),
    )
}

fn load_reference_tables(conn: &Connection) -> anyhow::Result<ReferenceTables> {
    let mut tables = ReferenceTables::default();

    let mut stmt = conn.prepare("SELECT name, id FROM subjects")?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(0)?;
        let id: String = row.get(1)?;
        tables.add_subject(&name, &id);
    }

    let mut stmt = conn.prepare("SELECT name, id FROM series")?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(0)?;
        let id: String = row.get(1)?;
        tables.add_series(&name, &id);
    }

    let mut stmt = conn.prepare("SELECT name, id FROM themes")?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(0)?;
        let id: String = row.get(1)?;
        tables.add_theme(&name, &id);
    }

    let mut stmt = conn.prepare(
        "SELECT email, first_name, last_name, id FROM users
         WHERE role IN ('professor', 'admin') AND active = 1",
    )?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let email: String = row.get(0)?;
        let first: String = row.get(1)?;
        let last: String = row.get(2)?;
        let id: String = row.get(3)?;
        tables.add_teacher(&email, &first, &last, &id);
    }

    Ok(tables)
}

fn handle_questions_import_bulk(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let raw_text = match require_str(req, "rawText") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let format = match parse_format(req) {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    let subject_id = match require_str(req, "subjectId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let series_id = match require_str(req, "seriesId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let teacher_id = match require_str(req, "teacherId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let import_req = TestImportRequest {
        raw_text,
        format,
        subject_id,
        series_id,
        theme_id: opt_str(req, "themeId"),
        teacher_id,
    };
    let report = import::run_test_import(&import_req, &mut |record| insert_record(conn, record));
    report_json(&req.id, &report)
}

fn handle_essays_import_bulk(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let raw_text = match require_str(req, "rawText") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let format = match parse_format(req) {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    let default_teacher_id = match require_str(req, "defaultTeacherId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let tables = match load_reference_tables(conn) {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let import_req = EssayImportRequest {
        raw_text,
        format,
        tables: &tables,
        default_teacher_id,
    };
    let report = import::run_essay_import(&import_req, &mut |record| insert_record(conn, record));
    report_json(&req.id, &report)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "questions.importBulk" => Some(handle_questions_import_bulk(state, req)),
        "essays.importBulk" => Some(handle_essays_import_bulk(state, req)),
        _ => None,
    }
}

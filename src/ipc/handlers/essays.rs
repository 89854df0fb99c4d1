use crate::ipc::error::{err, ok};
use crate::ipc::handlers::{now_rfc3339, opt_str, require_db, require_str};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use uuid::Uuid;

fn handle_essays_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let statement = match require_str(req, "statement") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let expected_answer = match require_str(req, "expectedAnswer") {
        Ok(v) => v,
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
    let theme_id = opt_str(req, "themeId");

    let essay_id = Uuid::new_v4().to_string();
    let res = conn.execute(
        "INSERT INTO essay_questions(id, subject_id, series_id, theme_id, teacher_id,
                                     statement, expected_answer, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &essay_id,
            subject_id,
            series_id,
            theme_id,
            teacher_id,
            statement,
            expected_answer,
            now_rfc3339(),
        ),
    );
    match res {
        Ok(_) => ok(&req.id, json!({ "essayId": essay_id })),
        Err(e) => err(&req.id, "db_insert_failed", e.to_string(), None),
    }
}

fn handle_essays_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let mut sql = String::from(
        "SELECT id, subject_id, series_id, theme_id, teacher_id, statement, expected_answer
         FROM essay_questions WHERE 1 = 1",
    );
    let mut args: Vec<String> = Vec::new();
    if let Some(sid) = opt_str(req, "subjectId") {
        sql.push_str(" AND subject_id = ?");
        args.push(sid.to_string());
    }
    if let Some(sid) = opt_str(req, "seriesId") {
        sql.push_str(" AND series_id = ?");
        args.push(sid.to_string());
    }
    sql.push_str(" ORDER BY created_at, id");

    let mut stmt = match conn.prepare(&sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map(rusqlite::params_from_iter(args.iter()), |row| {
            let id: String = row.get(0)?;
            let subject_id: String = row.get(1)?;
            let series_id: String = row.get(2)?;
            let theme_id: Option<String> = row.get(3)?;
            let teacher_id: String = row.get(4)?;
            let statement: String = row.get(5)?;
            let expected_answer: String = row.get(6)?;
            Ok(json!({
                "id": id,
                "subjectId": subject_id,
                "seriesId": series_id,
                "themeId": theme_id,
                "teacherId": teacher_id,
                "statement": statement,
                "expectedAnswer": expected_answer
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match rows {
        Ok(essays) => ok(&req.id, json!({ "essays": essays })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_essays_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let essay_id = match require_str(req, "essayId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if let Err(e) = conn.execute(
        "DELETE FROM essay_submissions WHERE essay_question_id = ?",
        [essay_id],
    ) {
        return err(&req.id, "db_delete_failed", e.to_string(), None);
    }
    match conn.execute("DELETE FROM essay_questions WHERE id = ?", [essay_id]) {
        Ok(0) => err(&req.id, "not_found", "essay question not found", None),
        Ok(_) => ok(&req.id, json!({ "deleted": true })),
        Err(e) => err(&req.id, "db_delete_failed", e.to_string(), None),
    }
}

fn handle_essays_submit(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let essay_id = match require_str(req, "essayId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let student_id = match require_str(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let answer_text = match require_str(req, "answerText") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    // Storage itself is external; the path is kept as opaque text.
    let attachment_path = opt_str(req, "attachmentPath");

    let submission_id = Uuid::new_v4().to_string();
    let res = conn.execute(
        "INSERT INTO essay_submissions(id, essay_question_id, student_id, answer_text,
                                       attachment_path, submitted_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &submission_id,
            essay_id,
            student_id,
            answer_text,
            attachment_path,
            now_rfc3339(),
        ),
    );
    match res {
        Ok(_) => ok(&req.id, json!({ "submissionId": submission_id })),
        Err(e) => err(&req.id, "db_insert_failed", e.to_string(), None),
    }
}

fn handle_essays_correct(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let submission_id = match require_str(req, "submissionId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(grade) = req.params.get("grade").and_then(|v| v.as_f64()) else {
        return err(&req.id, "bad_params", "missing params.grade", None);
    };
    if !(0.0..=10.0).contains(&grade) {
        return err(&req.id, "bad_params", "grade must be between 0 and 10", None);
    }
    let correction = opt_str(req, "correction").unwrap_or("");

    let res = conn.execute(
        "UPDATE essay_submissions SET grade = ?, correction = ?, corrected_at = ?
         WHERE id = ?",
        (grade, correction, now_rfc3339(), submission_id),
    );
    match res {
        Ok(0) => err(&req.id, "not_found", "submission not found", None),
        Ok(_) => ok(&req.id, json!({ "submissionId": submission_id })),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_essays_submissions(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let mut sql = String::from(
        "SELECT id, essay_question_id, student_id, answer_text, attachment_path,
                grade, correction, submitted_at, corrected_at
         FROM essay_submissions WHERE 1 = 1",
    );
    let mut args: Vec<String> = Vec::new();
    if let Some(eid) = opt_str(req, "essayId") {
        sql.push_str(" AND essay_question_id = ?");
        args.push(eid.to_string());
    }
    if let Some(sid) = opt_str(req, "studentId") {
        sql.push_str(" AND student_id = ?");
        args.push(sid.to_string());
    }
    sql.push_str(" ORDER BY submitted_at");

    let mut stmt = match conn.prepare(&sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map(rusqlite::params_from_iter(args.iter()), |row| {
            let id: String = row.get(0)?;
            let essay_id: String = row.get(1)?;
            let student_id: String = row.get(2)?;
            let answer_text: String = row.get(3)?;
            let attachment_path: Option<String> = row.get(4)?;
            let grade: Option<f64> = row.get(5)?;
            let correction: Option<String> = row.get(6)?;
            let submitted_at: String = row.get(7)?;
            let corrected_at: Option<String> = row.get(8)?;
            Ok(json!({
                "id": id,
                "essayId": essay_id,
                "studentId": student_id,
                "answerText": answer_text,
                "attachmentPath": attachment_path,
                "grade": grade,
                "correction": correction,
                "submittedAt": submitted_at,
                "correctedAt": corrected_at
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match rows {
        Ok(submissions) => ok(&req.id, json!({ "submissions": submissions })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "essays.create" => Some(handle_essays_create(state, req)),
        "essays.list" => Some(handle_essays_list(state, req)),
        "essays.delete" => Some(handle_essays_delete(state, req)),
        "essays.submit" => Some(handle_essays_submit(state, req)),
        "essays.correct" => Some(handle_essays_correct(state, req)),
        "essays.submissions" => Some(handle_essays_submissions(state, req)),
        _ => None,
    }
}

use crate::ipc::error::{err, ok};
use crate::ipc::handlers::{now_rfc3339, opt_str, require_db, require_str};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use uuid::Uuid;

fn handle_lists_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let title = match require_str(req, "title") {
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
    let attachment_path = opt_str(req, "attachmentPath");

    let list_id = Uuid::new_v4().to_string();
    let res = conn.execute(
        "INSERT INTO exercise_lists(id, title, subject_id, series_id, teacher_id,
                                    attachment_path, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &list_id,
            title,
            subject_id,
            series_id,
            teacher_id,
            attachment_path,
            now_rfc3339(),
        ),
    );
    match res {
        Ok(_) => ok(&req.id, json!({ "listId": list_id })),
        Err(e) => err(&req.id, "db_insert_failed", e.to_string(), None),
    }
}

fn handle_lists_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let mut sql = String::from(
        "SELECT id, title, subject_id, series_id, teacher_id, attachment_path
         FROM exercise_lists WHERE 1 = 1",
    );
    let mut args: Vec<String> = Vec::new();
    if let Some(sid) = opt_str(req, "seriesId") {
        sql.push_str(" AND series_id = ?");
        args.push(sid.to_string());
    }
    sql.push_str(" ORDER BY created_at");

    let mut stmt = match conn.prepare(&sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map(rusqlite::params_from_iter(args.iter()), |row| {
            let id: String = row.get(0)?;
            let title: String = row.get(1)?;
            let subject_id: String = row.get(2)?;
            let series_id: String = row.get(3)?;
            let teacher_id: String = row.get(4)?;
            let attachment_path: Option<String> = row.get(5)?;
            Ok(json!({
                "id": id,
                "title": title,
                "subjectId": subject_id,
                "seriesId": series_id,
                "teacherId": teacher_id,
                "attachmentPath": attachment_path
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match rows {
        Ok(lists) => ok(&req.id, json!({ "lists": lists })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_lists_assign(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let list_id = match require_str(req, "listId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let student_ids: Vec<String> = req
        .params
        .get("studentIds")
        .and_then(|v| v.as_array())
        .map(|a| {
            a.iter()
                .filter_map(|v| v.as_str())
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default();
    if student_ids.is_empty() {
        return err(&req.id, "bad_params", "missing params.studentIds", None);
    }

    let now = now_rfc3339();
    let mut assigned = 0usize;
    for student_id in &student_ids {
        let res = conn.execute(
            "INSERT INTO exercise_list_assignments(id, list_id, student_id, assigned_at, completed)
             VALUES(?, ?, ?, ?, 0)
             ON CONFLICT(list_id, student_id) DO NOTHING",
            (Uuid::new_v4().to_string(), list_id, student_id, &now),
        );
        match res {
            Ok(n) => assigned += n,
            Err(e) => return err(&req.id, "db_insert_failed", e.to_string(), None),
        }
    }
    ok(&req.id, json!({ "assigned": assigned }))
}

fn handle_lists_assignments(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let mut sql = String::from(
        "SELECT id, list_id, student_id, assigned_at, completed
         FROM exercise_list_assignments WHERE 1 = 1",
    );
    let mut args: Vec<String> = Vec::new();
    if let Some(lid) = opt_str(req, "listId") {
        sql.push_str(" AND list_id = ?");
        args.push(lid.to_string());
    }
    if let Some(sid) = opt_str(req, "studentId") {
        sql.push_str(" AND student_id = ?");
        args.push(sid.to_string());
    }
    sql.push_str(" ORDER BY assigned_at");

    let mut stmt = match conn.prepare(&sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map(rusqlite::params_from_iter(args.iter()), |row| {
            let id: String = row.get(0)?;
            let list_id: String = row.get(1)?;
            let student_id: String = row.get(2)?;
            let assigned_at: String = row.get(3)?;
            let completed: i64 = row.get(4)?;
            Ok(json!({
                "id": id,
                "listId": list_id,
                "studentId": student_id,
                "assignedAt": assigned_at,
                "completed": completed != 0
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match rows {
        Ok(assignments) => ok(&req.id, json!({ "assignments": assignments })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_lists_complete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let assignment_id = match require_str(req, "assignmentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match conn.execute(
        "UPDATE exercise_list_assignments SET completed = 1 WHERE id = ?",
        [assignment_id],
    ) {
        Ok(0) => err(&req.id, "not_found", "assignment not found", None),
        Ok(_) => ok(&req.id, json!({ "assignmentId": assignment_id })),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "exerciseLists.create" => Some(handle_lists_create(state, req)),
        "exerciseLists.list" => Some(handle_lists_list(state, req)),
        "exerciseLists.assign" => Some(handle_lists_assign(state, req)),
        "exerciseLists.assignments" => Some(handle_lists_assignments(state, req)),
        "exerciseLists.complete" => Some(handle_lists_complete(state, req)),
        _ => None,
    }
}

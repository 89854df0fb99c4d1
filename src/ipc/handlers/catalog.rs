use crate::ipc::error::{err, ok};
use crate::ipc::handlers::{opt_str, require_db, require_str};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use uuid::Uuid;

fn handle_named_create(
    state: &mut AppState,
    req: &Request,
    table: &str,
    id_key: &str,
) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let name = match require_str(req, "name") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let id = Uuid::new_v4().to_string();
    let sql = format!("INSERT INTO {}(id, name) VALUES(?, ?)", table);
    match conn.execute(&sql, (&id, name)) {
        Ok(_) => ok(&req.id, json!({ id_key: id })),
        Err(e) => err(&req.id, "db_insert_failed", e.to_string(), None),
    }
}

fn handle_named_list(state: &mut AppState, req: &Request, table: &str) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let sql = format!("SELECT id, name FROM {} ORDER BY name", table);
    let mut stmt = match conn.prepare(&sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([], |row| {
            let id: String = row.get(0)?;
            let name: String = row.get(1)?;
            Ok(json!({ "id": id, "name": name }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match rows {
        Ok(items) => ok(&req.id, json!({ "items": items })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_named_delete(
    state: &mut AppState,
    req: &Request,
    table: &str,
    id_param: &str,
) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let id = match require_str(req, id_param) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let sql = format!("DELETE FROM {} WHERE id = ?", table);
    match conn.execute(&sql, [id]) {
        Ok(0) => err(&req.id, "not_found", format!("{} not found", table), None),
        Ok(_) => ok(&req.id, json!({ "deleted": true })),
        Err(e) => err(&req.id, "db_delete_failed", e.to_string(), None),
    }
}

fn handle_themes_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let subject_id = match require_str(req, "subjectId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let name = match require_str(req, "name") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let id = Uuid::new_v4().to_string();
    match conn.execute(
        "INSERT INTO themes(id, subject_id, name) VALUES(?, ?, ?)",
        (&id, subject_id, name),
    ) {
        Ok(_) => ok(&req.id, json!({ "themeId": id })),
        Err(e) => err(&req.id, "db_insert_failed", e.to_string(), None),
    }
}

fn handle_themes_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let subject_id = opt_str(req, "subjectId");

    let mut sql =
        String::from("SELECT id, subject_id, name FROM themes WHERE 1 = 1");
    let mut args: Vec<String> = Vec::new();
    if let Some(sid) = subject_id {
        sql.push_str(" AND subject_id = ?");
        args.push(sid.to_string());
    }
    sql.push_str(" ORDER BY name");

    let mut stmt = match conn.prepare(&sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map(rusqlite::params_from_iter(args.iter()), |row| {
            let id: String = row.get(0)?;
            let subject_id: String = row.get(1)?;
            let name: String = row.get(2)?;
            Ok(json!({ "id": id, "subjectId": subject_id, "name": name }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match rows {
        Ok(items) => ok(&req.id, json!({ "items": items })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "subjects.create" => Some(handle_named_create(state, req, "subjects", "subjectId")),
        "subjects.list" => Some(handle_named_list(state, req, "subjects")),
        "subjects.delete" => Some(handle_named_delete(state, req, "subjects", "subjectId")),
        "series.create" => Some(handle_named_create(state, req, "series", "seriesId")),
        "series.list" => Some(handle_named_list(state, req, "series")),
        "series.delete" => Some(handle_named_delete(state, req, "series", "seriesId")),
        "themes.create" => Some(handle_themes_create(state, req)),
        "themes.list" => Some(handle_themes_list(state, req)),
        "themes.delete" => Some(handle_named_delete(state, req, "themes", "themeId")),
        _ => None,
    }
}

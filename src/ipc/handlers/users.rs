use crate::ipc::error::{err, ok};
use crate::ipc::handlers::{now_rfc3339, opt_str, require_db, require_str};
use crate::ipc::types::{AppState, Request};
use rusqlite::OptionalExtension;
use serde_json::json;
use uuid::Uuid;

const ROLES: [&str; 3] = ["admin", "professor", "student"];

fn handle_users_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let first_name = match require_str(req, "firstName") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let last_name = match require_str(req, "lastName") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let email = match require_str(req, "email") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let role = match require_str(req, "role") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if !ROLES.contains(&role) {
        return err(
            &req.id,
            "bad_params",
            format!("role must be one of {:?}", ROLES),
            None,
        );
    }
    let series_id = opt_str(req, "seriesId");

    let user_id = Uuid::new_v4().to_string();
    let res = conn.execute(
        "INSERT INTO users(id, first_name, last_name, email, role, series_id, active, created_at)
         VALUES(?, ?, ?, ?, ?, ?, 1, ?)",
        (
            &user_id,
            first_name,
            last_name,
            &email.to_lowercase(),
            role,
            series_id,
            now_rfc3339(),
        ),
    );
    match res {
        Ok(_) => ok(&req.id, json!({ "userId": user_id })),
        Err(e) => err(&req.id, "db_insert_failed", e.to_string(), None),
    }
}

fn handle_users_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let role = opt_str(req, "role");
    let include_inactive = req
        .params
        .get("includeInactive")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    let mut sql = String::from(
        "SELECT id, first_name, last_name, email, role, series_id, active
         FROM users WHERE 1 = 1",
    );
    let mut args: Vec<String> = Vec::new();
    if let Some(role) = role {
        sql.push_str(" AND role = ?");
        args.push(role.to_string());
    }
    if !include_inactive {
        sql.push_str(" AND active = 1");
    }
    sql.push_str(" ORDER BY last_name, first_name");

    let mut stmt = match conn.prepare(&sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map(rusqlite::params_from_iter(args.iter()), |row| {
            let id: String = row.get(0)?;
            let first: String = row.get(1)?;
            let last: String = row.get(2)?;
            let email: String = row.get(3)?;
            let role: String = row.get(4)?;
            let series_id: Option<String> = row.get(5)?;
            let active: i64 = row.get(6)?;
            Ok(json!({
                "id": id,
                "firstName": first,
                "lastName": last,
                "email": email,
                "role": role,
                "seriesId": series_id,
                "active": active != 0
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(users) => ok(&req.id, json!({ "users": users })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_users_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let user_id = match require_str(req, "userId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let existing: Option<(String, String, String, String, Option<String>)> = match conn
        .query_row(
            "SELECT first_name, last_name, email, role, series_id FROM users WHERE id = ?",
            [user_id],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?)),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let Some((first, last, email, role, series_id)) = existing else {
        return err(&req.id, "not_found", "user not found", None);
    };

    let new_role = opt_str(req, "role").unwrap_or(&role);
    if !ROLES.contains(&new_role) {
        return err(
            &req.id,
            "bad_params",
            format!("role must be one of {:?}", ROLES),
            None,
        );
    }
    let new_email = opt_str(req, "email")
        .map(|e| e.to_lowercase())
        .unwrap_or(email);
    let new_series = opt_str(req, "seriesId")
        .map(|s| s.to_string())
        .or(series_id);

    let res = conn.execute(
        "UPDATE users SET first_name = ?, last_name = ?, email = ?, role = ?, series_id = ?
         WHERE id = ?",
        (
            opt_str(req, "firstName").unwrap_or(&first),
            opt_str(req, "lastName").unwrap_or(&last),
            &new_email,
            new_role,
            new_series.as_deref(),
            user_id,
        ),
    );
    match res {
        Ok(_) => ok(&req.id, json!({ "userId": user_id })),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_users_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let user_id = match require_str(req, "userId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    // Soft delete: historical results and messages keep referencing the row.
    match conn.execute("UPDATE users SET active = 0 WHERE id = ?", [user_id]) {
        Ok(0) => err(&req.id, "not_found", "user not found", None),
        Ok(_) => ok(&req.id, json!({ "userId": user_id })),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "users.create" => Some(handle_users_create(state, req)),
        "users.list" => Some(handle_users_list(state, req)),
        "users.update" => Some(handle_users_update(state, req)),
        "users.delete" => Some(handle_users_delete(state, req)),
        _ => None,
    }
}

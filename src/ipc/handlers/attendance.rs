use crate::ipc::error::{err, ok};
use crate::ipc::handlers::{opt_str, require_db, require_str};
use crate::ipc::types::{AppState, Request};
use crate::stats;
use chrono::NaiveDate;
use serde_json::json;
use uuid::Uuid;

fn parse_date(req: &Request, key: &str, value: &str) -> Result<NaiveDate, serde_json::Value> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        err(
            &req.id,
            "bad_params",
            format!("params.{} must be an ISO date (YYYY-MM-DD)", key),
            None,
        )
    })
}

/// Optional from/to range; both bounds inclusive when present.
fn parse_range(req: &Request) -> Result<(Option<NaiveDate>, Option<NaiveDate>), serde_json::Value> {
    let from = match opt_str(req, "from") {
        Some(v) => Some(parse_date(req, "from", v)?),
        None => None,
    };
    let to = match opt_str(req, "to") {
        Some(v) => Some(parse_date(req, "to", v)?),
        None => None,
    };
    Ok((from, to))
}

fn handle_attendance_record(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let student_id = match require_str(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let date = match require_str(req, "date") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if let Err(resp) = parse_date(req, "date", date) {
        return resp;
    }
    let Some(present) = req.params.get("present").and_then(|v| v.as_bool()) else {
        return err(&req.id, "bad_params", "missing params.present", None);
    };
    let note = opt_str(req, "note");

    // One row per student per day; re-recording a day overwrites it.
    let record_id = Uuid::new_v4().to_string();
    let res = conn.execute(
        "INSERT INTO attendance_records(id, student_id, date, present, note)
         VALUES(?, ?, ?, ?, ?)
         ON CONFLICT(student_id, date) DO UPDATE SET
           present = excluded.present,
           note = excluded.note",
        (
            &record_id,
            student_id,
            date,
            if present { 1 } else { 0 },
            note,
        ),
    );
    match res {
        Ok(_) => ok(&req.id, json!({ "studentId": student_id, "date": date })),
        Err(e) => err(&req.id, "db_insert_failed", e.to_string(), None),
    }
}

fn handle_attendance_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let student_id = match require_str(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let mut stmt = match conn.prepare(
        "SELECT date, present, note FROM attendance_records
         WHERE student_id = ? ORDER BY date",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([student_id], |row| {
            let date: String = row.get(0)?;
            let present: i64 = row.get(1)?;
            let note: Option<String> = row.get(2)?;
            Ok(json!({ "date": date, "present": present != 0, "note": note }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match rows {
        Ok(records) => ok(&req.id, json!({ "records": records })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_attendance_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let student_id = match require_str(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let (from, to) = match parse_range(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let mut stmt = match conn.prepare(
        "SELECT date, present FROM attendance_records WHERE student_id = ?",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let records: Vec<(NaiveDate, bool)> = match stmt
        .query_map([student_id], |row| {
            let date: String = row.get(0)?;
            let present: i64 = row.get(1)?;
            Ok((date, present != 0))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
    {
        Ok(rows) => rows
            .into_iter()
            .filter_map(|(d, p)| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok().map(|d| (d, p)))
            .collect(),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let s = stats::summarize_attendance(&records, from, to);
    ok(
        &req.id,
        json!({ "present": s.present, "absent": s.absent, "rate": s.rate }),
    )
}

fn handle_payments_record(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let student_id = match require_str(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let date = match require_str(req, "date") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if let Err(resp) = parse_date(req, "date", date) {
        return resp;
    }
    let Some(amount) = req.params.get("amount").and_then(|v| v.as_f64()) else {
        return err(&req.id, "bad_params", "missing params.amount", None);
    };
    if amount <= 0.0 {
        return err(&req.id, "bad_params", "amount must be positive", None);
    }
    let note = opt_str(req, "note");

    let payment_id = Uuid::new_v4().to_string();
    let res = conn.execute(
        "INSERT INTO payments(id, student_id, date, amount, note) VALUES(?, ?, ?, ?, ?)",
        (&payment_id, student_id, date, amount, note),
    );
    match res {
        Ok(_) => ok(&req.id, json!({ "paymentId": payment_id })),
        Err(e) => err(&req.id, "db_insert_failed", e.to_string(), None),
    }
}

fn handle_payments_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let student_id = match require_str(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let mut stmt = match conn.prepare(
        "SELECT id, date, amount, note FROM payments WHERE student_id = ? ORDER BY date",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([student_id], |row| {
            let id: String = row.get(0)?;
            let date: String = row.get(1)?;
            let amount: f64 = row.get(2)?;
            let note: Option<String> = row.get(3)?;
            Ok(json!({ "id": id, "date": date, "amount": amount, "note": note }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match rows {
        Ok(payments) => ok(&req.id, json!({ "payments": payments })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_payments_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let student_id = match require_str(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let (from, to) = match parse_range(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let mut stmt = match conn.prepare("SELECT date, amount FROM payments WHERE student_id = ?") {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let records: Vec<(NaiveDate, f64)> = match stmt
        .query_map([student_id], |row| {
            let date: String = row.get(0)?;
            let amount: f64 = row.get(1)?;
            Ok((date, amount))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
    {
        Ok(rows) => rows
            .into_iter()
            .filter_map(|(d, a)| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok().map(|d| (d, a)))
            .collect(),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let s = stats::summarize_payments(&records, from, to);
    ok(&req.id, json!({ "total": s.total, "count": s.count }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.record" => Some(handle_attendance_record(state, req)),
        "attendance.list" => Some(handle_attendance_list(state, req)),
        "attendance.summary" => Some(handle_attendance_summary(state, req)),
        "payments.record" => Some(handle_payments_record(state, req)),
        "payments.list" => Some(handle_payments_list(state, req)),
        "payments.summary" => Some(handle_payments_summary(state, req)),
        _ => None,
    }
}

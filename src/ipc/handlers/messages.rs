use crate::ipc::error::{err, ok};
use crate::ipc::handlers::{now_rfc3339, require_db, require_str};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use uuid::Uuid;

fn handle_messages_send(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let sender_id = match require_str(req, "senderId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let recipient_id = match require_str(req, "recipientId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let subject = match require_str(req, "subject") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let body = match require_str(req, "body") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let message_id = Uuid::new_v4().to_string();
    let res = conn.execute(
        "INSERT INTO messages(id, sender_id, recipient_id, subject, body, read, created_at)
         VALUES(?, ?, ?, ?, ?, 0, ?)",
        (
            &message_id,
            sender_id,
            recipient_id,
            subject,
            body,
            now_rfc3339(),
        ),
    );
    match res {
        Ok(_) => ok(&req.id, json!({ "messageId": message_id })),
        Err(e) => err(&req.id, "db_insert_failed", e.to_string(), None),
    }
}

fn handle_messages_inbox(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let recipient_id = match require_str(req, "recipientId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let mut stmt = match conn.prepare(
        "SELECT id, sender_id, subject, body, read, created_at
         FROM messages WHERE recipient_id = ?
         ORDER BY read, created_at DESC",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([recipient_id], |row| {
            let id: String = row.get(0)?;
            let sender_id: String = row.get(1)?;
            let subject: String = row.get(2)?;
            let body: String = row.get(3)?;
            let read: i64 = row.get(4)?;
            let created_at: String = row.get(5)?;
            Ok(json!({
                "id": id,
                "senderId": sender_id,
                "subject": subject,
                "body": body,
                "read": read != 0,
                "createdAt": created_at
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match rows {
        Ok(messages) => ok(&req.id, json!({ "messages": messages })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_messages_mark_read(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let message_id = match require_str(req, "messageId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match conn.execute("UPDATE messages SET read = 1 WHERE id = ?", [message_id]) {
        Ok(0) => err(&req.id, "not_found", "message not found", None),
        Ok(_) => ok(&req.id, json!({ "messageId": message_id })),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_messages_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match require_db(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let message_id = match require_str(req, "messageId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match conn.execute("DELETE FROM messages WHERE id = ?", [message_id]) {
        Ok(0) => err(&req.id, "not_found", "message not found", None),
        Ok(_) => ok(&req.id, json!({ "deleted": true })),
        Err(e) => err(&req.id, "db_delete_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "messages.send" => Some(handle_messages_send(state, req)),
        "messages.inbox" => Some(handle_messages_inbox(state, req)),
        "messages.markRead" => Some(handle_messages_mark_read(state, req)),
        "messages.delete" => Some(handle_messages_delete(state, req)),
        _ => None,
    }
}

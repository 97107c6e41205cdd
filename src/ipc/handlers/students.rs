use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use std::collections::HashSet;
use uuid::Uuid;

struct HandlerErr {
    code: &'static str,
    message: String,
    details: Option<serde_json::Value>,
}

impl HandlerErr {
    fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

fn db_err(e: impl std::fmt::Display) -> HandlerErr {
    HandlerErr {
        code: "db_query_failed",
        message: e.to_string(),
        details: None,
    }
}

fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr {
            code: "bad_params",
            message: format!("missing {}", key),
            details: None,
        })
}

fn get_opt_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

fn class_exists(conn: &Connection, class_id: &str) -> Result<bool, HandlerErr> {
    conn.query_row("SELECT 1 FROM classes WHERE id = ?", [class_id], |r| {
        r.get::<_, i64>(0)
    })
    .optional()
    .map(|v| v.is_some())
    .map_err(db_err)
}

fn student_add(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let name = get_required_str(params, "name")?;
    let roll = params
        .get("roll")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| HandlerErr {
            code: "bad_params",
            message: "missing roll".to_string(),
            details: None,
        })?;
    if roll < 1 {
        return Err(HandlerErr {
            code: "bad_params",
            message: "roll must be positive".to_string(),
            details: None,
        });
    }

    if !class_exists(conn, &class_id)? {
        return Err(HandlerErr {
            code: "not_found",
            message: "class not found".to_string(),
            details: None,
        });
    }

    let taken = conn
        .query_row(
            "SELECT 1 FROM students WHERE class_id = ? AND roll = ? AND active = 1",
            (&class_id, roll),
            |r| r.get::<_, i64>(0),
        )
        .optional()
        .map_err(db_err)?
        .is_some();
    if taken {
        return Err(HandlerErr {
            code: "conflict",
            message: format!("roll {} is already assigned in this class", roll),
            details: Some(json!({ "roll": roll })),
        });
    }

    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO students(id, class_id, name, father_name, mother_name, gender, dob, roll, active, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, 1, ?)",
        (
            &id,
            &class_id,
            &name,
            get_opt_str(params, "fatherName"),
            get_opt_str(params, "motherName"),
            get_opt_str(params, "gender"),
            get_opt_str(params, "dob"),
            roll,
            &now,
        ),
    )
    .map_err(|e| HandlerErr {
        code: "db_update_failed",
        message: e.to_string(),
        details: Some(json!({ "table": "students" })),
    })?;
    Ok(json!({ "studentId": id, "roll": roll }))
}

fn student_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let mut stmt = conn
        .prepare(
            "SELECT id, name, father_name, gender, dob, roll, active
             FROM students
             WHERE class_id = ?
             ORDER BY roll",
        )
        .map_err(db_err)?;
    let students = stmt
        .query_map([&class_id], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "name": r.get::<_, String>(1)?,
                "fatherName": r.get::<_, Option<String>>(2)?,
                "gender": r.get::<_, Option<String>>(3)?,
                "dob": r.get::<_, Option<String>>(4)?,
                "roll": r.get::<_, i64>(5)?,
                "active": r.get::<_, i64>(6)? != 0,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(db_err)?;
    Ok(json!({ "students": students }))
}

/// Gap-filling roll allocation: the holes in 1..=max plus the next
/// fresh roll. A class with no rolls yet starts at 1 with no gaps.
fn roll_suggest(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    if !class_exists(conn, &class_id)? {
        return Err(HandlerErr {
            code: "not_found",
            message: "class not found".to_string(),
            details: None,
        });
    }

    let mut stmt = conn
        .prepare(
            "SELECT roll FROM students
             WHERE class_id = ? AND active = 1
             ORDER BY roll",
        )
        .map_err(db_err)?;
    let rolls: Vec<i64> = stmt
        .query_map([&class_id], |r| r.get(0))
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(db_err)?;

    let Some(&max_roll) = rolls.iter().max() else {
        return Ok(json!({ "gappedRolls": [], "nextRoll": 1 }));
    };

    let existing: HashSet<i64> = rolls.iter().copied().collect();
    let gapped: Vec<i64> = (1..=max_roll).filter(|r| !existing.contains(r)).collect();

    Ok(json!({ "gappedRolls": gapped, "nextRoll": max_roll + 1 }))
}

fn with_db<F>(state: &mut AppState, req: &Request, f: F) -> serde_json::Value
where
    F: FnOnce(&Connection, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>,
{
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match f(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "student.add" => Some(with_db(state, req, student_add)),
        "student.list" => Some(with_db(state, req, student_list)),
        "roll.suggest" => Some(with_db(state, req, roll_suggest)),
        _ => None,
    }
}

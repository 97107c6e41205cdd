use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use chrono::Utc;
use rusqlite::{types::Value as SqlValue, Connection, OptionalExtension};
use serde_json::json;
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

/// Raw score as stored: numbers stay numbers, text stays text ("AB" for
/// absent is a legitimate entry), null clears the cell.
fn score_value(params: &serde_json::Value) -> Result<SqlValue, HandlerErr> {
    match params.get("score") {
        None | Some(serde_json::Value::Null) => Ok(SqlValue::Null),
        Some(serde_json::Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                Ok(SqlValue::Integer(i))
            } else {
                Ok(SqlValue::Real(n.as_f64().unwrap_or(0.0)))
            }
        }
        Some(serde_json::Value::String(s)) => Ok(SqlValue::Text(s.clone())),
        Some(_) => Err(HandlerErr {
            code: "bad_params",
            message: "score must be a number, string or null".to_string(),
            details: None,
        }),
    }
}

fn exam_lock_state(conn: &Connection, exam_id: &str) -> Result<bool, HandlerErr> {
    let enabled: Option<i64> = conn
        .query_row(
            "SELECT is_enabled FROM exams WHERE id = ?",
            [exam_id],
            |r| r.get(0),
        )
        .optional()
        .map_err(db_err)?;
    match enabled {
        Some(v) => Ok(v != 0),
        None => Err(HandlerErr {
            code: "not_found",
            message: "exam not found".to_string(),
            details: None,
        }),
    }
}

fn marks_fill(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let exam_id = get_required_str(params, "examId")?;
    let subject = get_required_str(params, "subject")?;
    let subject_order = params
        .get("subjectOrder")
        .and_then(|v| v.as_i64())
        .unwrap_or(0);
    let allow_locked = params
        .get("allowLocked")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let score = score_value(params)?;

    // Disabled exams are locked for entry; the caller decides who may
    // override, the daemon only enforces the flag.
    if !exam_lock_state(conn, &exam_id)? && !allow_locked {
        return Err(HandlerErr {
            code: "exam_locked",
            message: "this exam is disabled for marks entry".to_string(),
            details: Some(json!({ "examId": exam_id })),
        });
    }

    let student_exists = conn
        .query_row("SELECT 1 FROM students WHERE id = ?", [&student_id], |r| {
            r.get::<_, i64>(0)
        })
        .optional()
        .map_err(db_err)?
        .is_some();
    if !student_exists {
        return Err(HandlerErr {
            code: "not_found",
            message: "student not found".to_string(),
            details: None,
        });
    }

    let now = Utc::now().to_rfc3339();
    let new_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO marks(id, student_id, exam_id, subject, subject_order, score, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(student_id, exam_id, subject) DO UPDATE SET
           score = excluded.score,
           subject_order = excluded.subject_order,
           updated_at = excluded.updated_at",
        (
            &new_id,
            &student_id,
            &exam_id,
            &subject,
            subject_order,
            &score,
            &now,
        ),
    )
    .map_err(|e| HandlerErr {
        code: "db_update_failed",
        message: e.to_string(),
        details: Some(json!({ "table": "marks" })),
    })?;

    let marks_id: String = conn
        .query_row(
            "SELECT id FROM marks WHERE student_id = ? AND exam_id = ? AND subject = ?",
            (&student_id, &exam_id, &subject),
            |r| r.get(0),
        )
        .map_err(db_err)?;
    Ok(json!({ "marksId": marks_id }))
}

fn marks_grid(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let exam_id = get_required_str(params, "examId")?;
    let subject = get_required_str(params, "subject")?;

    let exam: Option<(String, f64, i64)> = conn
        .query_row(
            "SELECT name, weightage, is_enabled FROM exams WHERE id = ?",
            [&exam_id],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .optional()
        .map_err(db_err)?;
    let Some((exam_name, weightage, enabled)) = exam else {
        return Err(HandlerErr {
            code: "not_found",
            message: "exam not found".to_string(),
            details: None,
        });
    };

    let mut stmt = conn
        .prepare(
            "SELECT s.id, s.name, s.roll, m.id, m.score
             FROM students s
             LEFT JOIN marks m
               ON m.student_id = s.id AND m.exam_id = ? AND m.subject = ?
             WHERE s.class_id = ? AND s.active = 1
             ORDER BY s.roll",
        )
        .map_err(db_err)?;
    let rows = stmt
        .query_map((&exam_id, &subject, &class_id), |r| {
            let score: SqlValue = r.get(4)?;
            let score_json = match score {
                SqlValue::Null => serde_json::Value::Null,
                SqlValue::Integer(n) => json!(n),
                SqlValue::Real(f) => json!(f),
                SqlValue::Text(s) => json!(s),
                SqlValue::Blob(_) => serde_json::Value::Null,
            };
            Ok(json!({
                "studentId": r.get::<_, String>(0)?,
                "name": r.get::<_, String>(1)?,
                "roll": r.get::<_, i64>(2)?,
                "marksId": r.get::<_, Option<String>>(3)?,
                "score": score_json,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(db_err)?;

    Ok(json!({
        "examName": exam_name,
        "weightage": weightage,
        "enabled": enabled != 0,
        "subject": subject,
        "rows": rows,
    }))
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
        "marks.fill" => Some(with_db(state, req, marks_fill)),
        "marks.grid" => Some(with_db(state, req, marks_grid)),
        _ => None,
    }
}

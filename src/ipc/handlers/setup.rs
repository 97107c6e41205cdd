use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::query;
use rusqlite::{Connection, OptionalExtension};
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

fn class_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_str(params, "name")?;
    let name = name.trim().to_string();
    if name.is_empty() {
        return Err(HandlerErr {
            code: "bad_params",
            message: "class name must not be empty".to_string(),
            details: None,
        });
    }

    let exists = conn
        .query_row("SELECT 1 FROM classes WHERE name = ?", [&name], |r| {
            r.get::<_, i64>(0)
        })
        .optional()
        .map_err(db_err)?
        .is_some();
    if exists {
        return Err(HandlerErr {
            code: "conflict",
            message: format!("class {} already exists", name),
            details: None,
        });
    }

    let id = Uuid::new_v4().to_string();
    conn.execute("INSERT INTO classes(id, name) VALUES(?, ?)", (&id, &name))
        .map_err(|e| HandlerErr {
            code: "db_update_failed",
            message: e.to_string(),
            details: Some(json!({ "table": "classes" })),
        })?;
    Ok(json!({ "classId": id, "name": name }))
}

fn class_list(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    let mut stmt = conn
        .prepare("SELECT id, name FROM classes ORDER BY name")
        .map_err(db_err)?;
    let classes = stmt
        .query_map([], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "name": r.get::<_, String>(1)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(db_err)?;
    Ok(json!({ "classes": classes }))
}

fn exam_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_str(params, "name")?;
    let display_order = params
        .get("displayOrder")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| HandlerErr {
            code: "bad_params",
            message: "missing displayOrder".to_string(),
            details: None,
        })?;
    let weightage = params
        .get("weightage")
        .and_then(|v| v.as_f64())
        .ok_or_else(|| HandlerErr {
            code: "bad_params",
            message: "missing weightage".to_string(),
            details: None,
        })?;
    let term = params
        .get("term")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    let enabled = params
        .get("enabled")
        .and_then(|v| v.as_bool())
        .unwrap_or(true);

    let taken: Option<String> = conn
        .query_row(
            "SELECT name FROM exams WHERE name = ? OR display_order = ?",
            (&name, display_order),
            |r| r.get(0),
        )
        .optional()
        .map_err(db_err)?;
    if let Some(existing) = taken {
        return Err(HandlerErr {
            code: "conflict",
            message: format!("exam name or display order already used by {}", existing),
            details: None,
        });
    }

    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO exams(id, name, term, display_order, weightage, is_enabled)
         VALUES(?, ?, ?, ?, ?, ?)",
        (&id, &name, &term, display_order, weightage, enabled as i64),
    )
    .map_err(|e| HandlerErr {
        code: "db_update_failed",
        message: e.to_string(),
        details: Some(json!({ "table": "exams" })),
    })?;
    Ok(json!({ "examId": id }))
}

fn exam_list(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    let mut stmt = conn
        .prepare(
            "SELECT id, name, term, display_order, weightage, is_enabled
             FROM exams
             ORDER BY display_order",
        )
        .map_err(db_err)?;
    let exams = stmt
        .query_map([], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "name": r.get::<_, String>(1)?,
                "term": r.get::<_, Option<String>>(2)?,
                "displayOrder": r.get::<_, i64>(3)?,
                "weightage": r.get::<_, f64>(4)?,
                "enabled": r.get::<_, i64>(5)? != 0,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(db_err)?;
    Ok(json!({ "exams": exams }))
}

fn exam_set_enabled(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let exam_id = get_required_str(params, "examId")?;
    let enabled = params
        .get("enabled")
        .and_then(|v| v.as_bool())
        .ok_or_else(|| HandlerErr {
            code: "bad_params",
            message: "missing enabled".to_string(),
            details: None,
        })?;
    let changed = conn
        .execute(
            "UPDATE exams SET is_enabled = ? WHERE id = ?",
            (enabled as i64, &exam_id),
        )
        .map_err(|e| HandlerErr {
            code: "db_update_failed",
            message: e.to_string(),
            details: Some(json!({ "table": "exams" })),
        })?;
    if changed == 0 {
        return Err(HandlerErr {
            code: "not_found",
            message: "exam not found".to_string(),
            details: None,
        });
    }
    Ok(json!({ "ok": true }))
}

fn grade_scale_set(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let Some(bands) = params.get("bands").and_then(|v| v.as_array()) else {
        return Err(HandlerErr {
            code: "bad_params",
            message: "missing bands".to_string(),
            details: None,
        });
    };
    if bands.is_empty() {
        return Err(HandlerErr {
            code: "bad_params",
            message: "bands must not be empty".to_string(),
            details: None,
        });
    }

    let mut parsed = Vec::with_capacity(bands.len());
    for band in bands {
        let min_percent = band
            .get("minPercent")
            .and_then(|v| v.as_f64())
            .ok_or_else(|| HandlerErr {
                code: "bad_params",
                message: "band minPercent must be a number".to_string(),
                details: None,
            })?;
        let letter = band
            .get("letter")
            .and_then(|v| v.as_str())
            .ok_or_else(|| HandlerErr {
                code: "bad_params",
                message: "band letter must be a string".to_string(),
                details: None,
            })?
            .to_string();
        let remark = band
            .get("remark")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        parsed.push((min_percent, letter, remark));
    }

    let tx = conn.unchecked_transaction().map_err(|e| HandlerErr {
        code: "db_tx_failed",
        message: e.to_string(),
        details: None,
    })?;
    tx.execute("DELETE FROM grade_bands", []).map_err(db_err)?;
    for (min_percent, letter, remark) in &parsed {
        tx.execute(
            "INSERT INTO grade_bands(id, min_percent, letter, remark) VALUES(?, ?, ?, ?)",
            (Uuid::new_v4().to_string(), min_percent, letter, remark),
        )
        .map_err(|e| HandlerErr {
            code: "db_update_failed",
            message: e.to_string(),
            details: Some(json!({ "table": "grade_bands" })),
        })?;
    }
    tx.commit().map_err(|e| HandlerErr {
        code: "db_commit_failed",
        message: e.to_string(),
        details: None,
    })?;
    Ok(json!({ "bandCount": parsed.len() }))
}

fn grade_scale_get(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    let configured: i64 = conn
        .query_row("SELECT COUNT(*) FROM grade_bands", [], |r| r.get(0))
        .map_err(db_err)?;
    let scale = query::grade_scale(conn).map_err(db_err)?;
    let bands: Vec<serde_json::Value> = scale
        .bands()
        .iter()
        .map(|b| {
            json!({
                "minPercent": b.min_percent,
                "letter": b.letter,
                "remark": b.remark,
            })
        })
        .collect();
    Ok(json!({ "bands": bands, "isDefault": configured == 0 }))
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
        "class.create" => Some(with_db(state, req, class_create)),
        "class.list" => Some(with_db(state, req, |c, _| class_list(c))),
        "exam.create" => Some(with_db(state, req, exam_create)),
        "exam.list" => Some(with_db(state, req, |c, _| exam_list(c))),
        "exam.setEnabled" => Some(with_db(state, req, exam_set_enabled)),
        "gradeScale.set" => Some(with_db(state, req, grade_scale_set)),
        "gradeScale.get" => Some(with_db(state, req, |c, _| grade_scale_get(c))),
        _ => None,
    }
}

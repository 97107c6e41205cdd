use crate::export;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::process;
use crate::query;
use rusqlite::Connection;
use serde_json::json;
use std::path::PathBuf;

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

fn get_flag(params: &serde_json::Value, key: &str, default: bool) -> bool {
    params.get(key).and_then(|v| v.as_bool()).unwrap_or(default)
}

fn student_ids_filter(params: &serde_json::Value) -> Result<Option<Vec<String>>, HandlerErr> {
    let Some(raw) = params.get("studentIds") else {
        return Ok(None);
    };
    if raw.is_null() {
        return Ok(None);
    }
    let Some(arr) = raw.as_array() else {
        return Err(HandlerErr {
            code: "bad_params",
            message: "studentIds must be an array of ids".to_string(),
            details: None,
        });
    };
    let ids: Vec<String> = arr
        .iter()
        .filter_map(|v| v.as_str().map(|s| s.to_string()))
        .collect();
    Ok(Some(ids))
}

fn computed_results(
    conn: &Connection,
    params: &serde_json::Value,
    add_grades: bool,
    add_grand_total: bool,
) -> Result<Vec<process::StudentResult>, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    if query::class_name(conn, &class_id).map_err(db_err)?.is_none() {
        return Err(HandlerErr {
            code: "not_found",
            message: "class not found".to_string(),
            details: None,
        });
    }

    let ids = student_ids_filter(params)?;
    let rows = query::result_rows(conn, &class_id, ids.as_deref()).map_err(db_err)?;
    if rows.is_empty() {
        return Err(HandlerErr {
            code: "no_data",
            message: "no marks on file for this selection".to_string(),
            details: None,
        });
    }

    let scale = query::grade_scale(conn).map_err(db_err)?;
    Ok(process::process(rows, &scale, add_grades, add_grand_total))
}

fn results_to_value(results: Vec<process::StudentResult>) -> serde_json::Value {
    serde_json::to_value(&results).unwrap_or_else(|_| json!([]))
}

fn results_get(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let add_grades = get_flag(params, "addGrades", true);
    let add_grand_total = get_flag(params, "addGrandTotal", true);
    let results = computed_results(conn, params, add_grades, add_grand_total)?;
    Ok(json!({ "results": results_to_value(results) }))
}

// The class marks sheet shows raw totals only: grand total on, grade
// letters off.
fn marks_sheet(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let results = computed_results(conn, params, false, true)?;
    Ok(json!({ "results": results_to_value(results) }))
}

fn results_export_bundle(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let out_path = PathBuf::from(get_required_str(params, "outPath")?);
    let results = computed_results(conn, params, true, true)?;

    let summary = export::export_results_bundle(&out_path, &results).map_err(|e| HandlerErr {
        code: "export_failed",
        message: format!("{e:?}"),
        details: None,
    })?;
    Ok(json!({
        "outPath": out_path.to_string_lossy(),
        "bundleFormat": summary.bundle_format,
        "entryCount": summary.entry_count,
        "studentCount": results.len(),
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
        "results.get" => Some(with_db(state, req, results_get)),
        "marks.sheet" => Some(with_db(state, req, marks_sheet)),
        "results.exportBundle" => Some(with_db(state, req, results_export_bundle)),
        _ => None,
    }
}

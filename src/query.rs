use chrono::NaiveDate;
use rusqlite::{types::Value as SqlValue, Connection, OptionalExtension};
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::process::{GradeBand, GradeScale, ScoreRecord};

#[derive(Debug, Clone)]
struct StudentRow {
    id: String,
    name: String,
    father_name: Option<String>,
    mother_name: Option<String>,
    gender: Option<String>,
    dob: Option<String>,
    roll: i64,
}

#[derive(Debug, Clone)]
struct ExamRow {
    id: String,
    name: String,
    term: Option<String>,
    display_order: i64,
    weightage: f64,
}

/// Report-card date format: "Mon, 05 Jan 2015". Unparseable stored
/// values pass through untouched.
fn display_dob(raw: &str) -> String {
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(d) => d.format("%a, %d %b %Y").to_string(),
        Err(_) => raw.to_string(),
    }
}

pub fn class_name(conn: &Connection, class_id: &str) -> anyhow::Result<Option<String>> {
    let name = conn
        .query_row("SELECT name FROM classes WHERE id = ?", [class_id], |r| {
            r.get(0)
        })
        .optional()?;
    Ok(name)
}

/// Joined flat rows for one class: one `ScoreRecord` per student x exam
/// that has at least one mark on file. Subjects inside a record keep
/// their configured entry order; exams come out in display order, which
/// also fixes first-seen subject order across the whole row set.
pub fn result_rows(
    conn: &Connection,
    class_id: &str,
    student_ids: Option<&[String]>,
) -> anyhow::Result<Vec<ScoreRecord>> {
    let Some(class) = class_name(conn, class_id)? else {
        return Ok(Vec::new());
    };

    let mut students_stmt = conn.prepare(
        "SELECT id, name, father_name, mother_name, gender, dob, roll
         FROM students
         WHERE class_id = ? AND active = 1
         ORDER BY roll",
    )?;
    let mut students: Vec<StudentRow> = students_stmt
        .query_map([class_id], |r| {
            Ok(StudentRow {
                id: r.get(0)?,
                name: r.get(1)?,
                father_name: r.get(2)?,
                mother_name: r.get(3)?,
                gender: r.get(4)?,
                dob: r.get(5)?,
                roll: r.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    if let Some(ids) = student_ids {
        students.retain(|s| ids.iter().any(|id| id == &s.id));
    }
    if students.is_empty() {
        return Ok(Vec::new());
    }

    let mut exams_stmt = conn.prepare(
        "SELECT id, name, term, display_order, weightage
         FROM exams
         ORDER BY display_order",
    )?;
    let exams: Vec<ExamRow> = exams_stmt
        .query_map([], |r| {
            Ok(ExamRow {
                id: r.get(0)?,
                name: r.get(1)?,
                term: r.get(2)?,
                display_order: r.get(3)?,
                weightage: r.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    // (student, exam) -> subject -> raw score, subjects in entry order.
    let mut by_pair: HashMap<(String, String), Map<String, Value>> = HashMap::new();
    let mut marks_stmt = conn.prepare(
        "SELECT m.student_id, m.exam_id, m.subject, m.score
         FROM marks m
         JOIN students s ON s.id = m.student_id
         WHERE s.class_id = ?
         ORDER BY m.subject_order, m.subject",
    )?;
    let mark_rows = marks_stmt
        .query_map([class_id], |r| {
            let score: SqlValue = r.get(3)?;
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
                score,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    for (student_id, exam_id, subject, score) in mark_rows {
        let value = match score {
            SqlValue::Null => Value::Null,
            SqlValue::Integer(n) => Value::from(n),
            SqlValue::Real(f) => Value::from(f),
            SqlValue::Text(s) => Value::from(s),
            SqlValue::Blob(_) => Value::Null,
        };
        by_pair
            .entry((student_id, exam_id))
            .or_default()
            .insert(subject, value);
    }

    let mut records: Vec<ScoreRecord> = Vec::new();
    for student in &students {
        let mut extra = Map::new();
        extra.insert("studentName".to_string(), Value::from(student.name.clone()));
        extra.insert(
            "fathersName".to_string(),
            student
                .father_name
                .clone()
                .map(Value::from)
                .unwrap_or(Value::Null),
        );
        extra.insert(
            "mothersName".to_string(),
            student
                .mother_name
                .clone()
                .map(Value::from)
                .unwrap_or(Value::Null),
        );
        extra.insert(
            "gender".to_string(),
            student.gender.clone().map(Value::from).unwrap_or(Value::Null),
        );
        extra.insert(
            "dob".to_string(),
            student
                .dob
                .as_deref()
                .map(|d| Value::from(display_dob(d)))
                .unwrap_or(Value::Null),
        );

        for exam in &exams {
            let Some(subject_marks) = by_pair.get(&(student.id.clone(), exam.id.clone())) else {
                continue;
            };
            records.push(ScoreRecord {
                student_id: student.id.clone(),
                class_name: class.clone(),
                roll: student.roll,
                exam_name: exam.name.clone(),
                exam_display_order: Some(exam.display_order),
                exam_term: exam.term.clone(),
                weightage: Value::from(exam.weightage),
                subject_marks: subject_marks.clone(),
                extra: extra.clone(),
            });
        }
    }

    Ok(records)
}

/// Configured grading scale, falling back to the built-in default when
/// no bands have been stored yet.
pub fn grade_scale(conn: &Connection) -> anyhow::Result<GradeScale> {
    let mut stmt = conn.prepare(
        "SELECT min_percent, letter, remark
         FROM grade_bands
         ORDER BY min_percent DESC",
    )?;
    let bands: Vec<GradeBand> = stmt
        .query_map([], |r| {
            Ok(GradeBand {
                min_percent: r.get(0)?,
                letter: r.get(1)?,
                remark: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    if bands.is_empty() {
        return Ok(GradeScale::default());
    }
    Ok(GradeScale::new(bands))
}

use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};
use zip::ZipArchive;

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_resultsd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn resultsd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

#[test]
fn bundle_holds_one_entry_per_student_with_checksums() {
    let workspace = temp_dir("resultsd-export");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "w",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let class_id = request_ok(
        &mut stdin,
        &mut reader,
        "c",
        "class.create",
        json!({ "name": "5A" }),
    )["classId"]
        .as_str()
        .expect("classId")
        .to_string();
    let exam_id = request_ok(
        &mut stdin,
        &mut reader,
        "e",
        "exam.create",
        json!({ "name": "Mid Term", "term": "Term 1", "displayOrder": 1, "weightage": 100.0 }),
    )["examId"]
        .as_str()
        .expect("examId")
        .to_string();

    for (i, (name, roll, score)) in [("Heena Gupta", 1_i64, 82), ("Ishan Mehta", 2, 74)]
        .iter()
        .enumerate()
    {
        let student_id = request_ok(
            &mut stdin,
            &mut reader,
            &format!("s{}", i),
            "student.add",
            json!({ "classId": class_id, "name": name, "roll": roll }),
        )["studentId"]
            .as_str()
            .expect("studentId")
            .to_string();
        request_ok(
            &mut stdin,
            &mut reader,
            &format!("m{}", i),
            "marks.fill",
            json!({ "studentId": student_id, "examId": exam_id, "subject": "Math", "score": score }),
        );
    }

    let out_path = workspace.join("bundle/results-5a.zip");
    let res = request_ok(
        &mut stdin,
        &mut reader,
        "x",
        "results.exportBundle",
        json!({ "classId": class_id, "outPath": out_path.to_string_lossy() }),
    );
    assert_eq!(res["bundleFormat"], json!("resultsd-results-v1"));
    assert_eq!(res["studentCount"], json!(2));
    // Two student entries plus the manifest.
    assert_eq!(res["entryCount"], json!(3));

    let file = File::open(&out_path).expect("open bundle");
    let mut archive = ZipArchive::new(file).expect("read zip");

    let mut manifest_text = String::new();
    archive
        .by_name("manifest.json")
        .expect("manifest entry")
        .read_to_string(&mut manifest_text)
        .expect("read manifest");
    let manifest: serde_json::Value = serde_json::from_str(&manifest_text).expect("parse manifest");
    assert_eq!(manifest["format"], json!("resultsd-results-v1"));
    let files = manifest["files"].as_array().expect("files array");
    assert_eq!(files.len(), 2);
    assert_eq!(files[0]["path"], json!("results/5A-1.json"));
    assert_eq!(files[1]["path"], json!("results/5A-2.json"));

    // Checksums in the manifest match the entry bytes.
    for entry in files {
        let path = entry["path"].as_str().expect("entry path");
        let expected = entry["sha256"].as_str().expect("entry sha256");
        let mut body = Vec::new();
        archive
            .by_name(path)
            .expect("student entry")
            .read_to_end(&mut body)
            .expect("read student entry");
        let digest = format!("{:x}", Sha256::digest(&body));
        assert_eq!(digest, expected);

        let parsed: serde_json::Value = serde_json::from_slice(&body).expect("parse student json");
        assert!(parsed["marks"]["G. Total"].is_object());
        assert!(parsed["marks"]["Grades"].is_object());
    }

    let _ = child.kill();
}

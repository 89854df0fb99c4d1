use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

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
    let exe = env!("CARGO_BIN_EXE_edualld");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn edualld");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
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
    if value.get("ok").and_then(|v| v.as_bool()) == Some(false) {
        let code = value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        assert_ne!(
            code, "not_implemented",
            "unexpected unknown method for {}",
            method
        );
    }
    value
}

fn result_str(value: &serde_json::Value, key: &str) -> String {
    value
        .get("result")
        .and_then(|v| v.get(key))
        .and_then(|v| v.as_str())
        .unwrap_or_else(|| panic!("missing result.{} in {}", key, value))
        .to_string()
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("edualld-router-smoke");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request(&mut stdin, &mut reader, "1", "health", json!({}));
    let _ = request(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let prof = request(
        &mut stdin,
        &mut reader,
        "3",
        "users.create",
        json!({
            "firstName": "Diogo",
            "lastName": "Spera",
            "email": "diogo@eduall.test",
            "role": "professor"
        }),
    );
    let prof_id = result_str(&prof, "userId");
    let student = request(
        &mut stdin,
        &mut reader,
        "4",
        "users.create",
        json!({
            "firstName": "Maria",
            "lastName": "Lima",
            "email": "maria@eduall.test",
            "role": "student"
        }),
    );
    let student_id = result_str(&student, "userId");
    let _ = request(
        &mut stdin,
        &mut reader,
        "5",
        "users.list",
        json!({ "role": "student" }),
    );

    let subject = request(
        &mut stdin,
        &mut reader,
        "6",
        "subjects.create",
        json!({ "name": "Matemática" }),
    );
    let subject_id = result_str(&subject, "subjectId");
    let series = request(
        &mut stdin,
        &mut reader,
        "7",
        "series.create",
        json!({ "name": "5º ano" }),
    );
    let series_id = result_str(&series, "seriesId");
    let _ = request(
        &mut stdin,
        &mut reader,
        "8",
        "themes.create",
        json!({ "subjectId": subject_id, "name": "Frações" }),
    );
    let _ = request(&mut stdin, &mut reader, "9", "subjects.list", json!({}));
    let _ = request(
        &mut stdin,
        &mut reader,
        "10",
        "themes.list",
        json!({ "subjectId": subject_id }),
    );

    let question = request(
        &mut stdin,
        &mut reader,
        "11",
        "questions.create",
        json!({
            "question": "2+2=?",
            "alternatives": ["3", "4", "5"],
            "correctIndex": 2,
            "justification": "Basic addition",
            "subjectId": subject_id,
            "seriesId": series_id,
            "teacherId": prof_id
        }),
    );
    let question_id = result_str(&question, "questionId");
    let test = request(
        &mut stdin,
        &mut reader,
        "12",
        "tests.create",
        json!({
            "title": "Prova 1",
            "subjectId": subject_id,
            "seriesId": series_id,
            "teacherId": prof_id,
            "questionIds": [question_id]
        }),
    );
    let test_id = result_str(&test, "testId");
    let _ = request(&mut stdin, &mut reader, "13", "tests.list", json!({}));
    let _ = request(
        &mut stdin,
        &mut reader,
        "14",
        "tests.grade",
        json!({ "testId": test_id, "studentId": student_id, "answers": [2] }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "15",
        "tests.answerDistribution",
        json!({ "testId": test_id }),
    );

    let essay = request(
        &mut stdin,
        &mut reader,
        "16",
        "essays.create",
        json!({
            "statement": "Explique frações",
            "expectedAnswer": "Parte de um todo",
            "subjectId": subject_id,
            "seriesId": series_id,
            "teacherId": prof_id
        }),
    );
    let essay_id = result_str(&essay, "essayId");
    let submission = request(
        &mut stdin,
        &mut reader,
        "17",
        "essays.submit",
        json!({
            "essayId": essay_id,
            "studentId": student_id,
            "answerText": "Uma fração representa parte de um todo."
        }),
    );
    let submission_id = result_str(&submission, "submissionId");
    let _ = request(
        &mut stdin,
        &mut reader,
        "18",
        "essays.correct",
        json!({ "submissionId": submission_id, "grade": 9.0, "correction": "Boa resposta" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "19",
        "essays.submissions",
        json!({ "essayId": essay_id }),
    );

    let _ = request(
        &mut stdin,
        &mut reader,
        "20",
        "questions.importBulk",
        json!({
            "rawText": "3+3=?|5;6;7|2|Soma simples",
            "format": "pipe",
            "subjectId": subject_id,
            "seriesId": series_id,
            "teacherId": prof_id
        }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "21",
        "essays.importBulk",
        json!({
            "rawText": "enunciado,resposta,disciplina,serie\nO que é um número primo?,Divisível só por 1 e por ele,Matemática,5º ano\n",
            "format": "csv",
            "defaultTeacherId": prof_id
        }),
    );

    let _ = request(
        &mut stdin,
        &mut reader,
        "22",
        "messages.send",
        json!({
            "senderId": prof_id,
            "recipientId": student_id,
            "subject": "Aviso",
            "body": "Prova na sexta."
        }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "23",
        "messages.inbox",
        json!({ "recipientId": student_id }),
    );

    let _ = request(
        &mut stdin,
        &mut reader,
        "24",
        "attendance.record",
        json!({ "studentId": student_id, "date": "2026-03-02", "present": true }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "25",
        "attendance.summary",
        json!({ "studentId": student_id }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "26",
        "payments.record",
        json!({ "studentId": student_id, "date": "2026-03-05", "amount": 150.0 }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "27",
        "payments.summary",
        json!({ "studentId": student_id }),
    );

    let list = request(
        &mut stdin,
        &mut reader,
        "28",
        "exerciseLists.create",
        json!({
            "title": "Lista 1",
            "subjectId": subject_id,
            "seriesId": series_id,
            "teacherId": prof_id
        }),
    );
    let list_id = result_str(&list, "listId");
    let _ = request(
        &mut stdin,
        &mut reader,
        "29",
        "exerciseLists.assign",
        json!({ "listId": list_id, "studentIds": [student_id] }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "30",
        "exerciseLists.assignments",
        json!({ "listId": list_id }),
    );

    let payload = json!({ "id": "31", "method": "nonsense.method", "params": {} });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let unknown: serde_json::Value =
        serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(unknown.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        unknown
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str()),
        Some("not_implemented")
    );

    drop(stdin);
    let _ = child.wait();
}

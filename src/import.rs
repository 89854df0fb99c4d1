use std::collections::HashMap;

use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ImportFormat {
    /// One record per line, fields separated by `|`.
    PlainDelimited,
    /// First non-blank line is a header row; `;` or `,` delimited,
    /// double-quote enclosed fields with `""` escapes.
    HeaderedCsv,
}

/// Name-to-id lookup tables, fully materialized by the caller before a batch
/// runs. Keys are lowercased labels; values already shaped like ids pass
/// through the resolver without a lookup.
#[derive(Default)]
pub struct ReferenceTables {
    pub subjects: HashMap<String, String>,
    pub series: HashMap<String, String>,
    pub themes: HashMap<String, String>,
    pub teachers_by_email: HashMap<String, String>,
    pub teachers_by_name: HashMap<String, String>,
}

impl ReferenceTables {
    pub fn add_subject(&mut self, name: &str, id: &str) {
        self.subjects
            .insert(name.trim().to_lowercase(), id.to_string());
    }

    pub fn add_series(&mut self, name: &str, id: &str) {
        self.series
            .insert(name.trim().to_lowercase(), id.to_string());
    }

    pub fn add_theme(&mut self, name: &str, id: &str) {
        self.themes
            .insert(name.trim().to_lowercase(), id.to_string());
    }

    pub fn add_teacher(&mut self, email: &str, first_name: &str, last_name: &str, id: &str) {
        let email = email.trim().to_lowercase();
        if !email.is_empty() {
            self.teachers_by_email.insert(email, id.to_string());
        }
        let full = format!("{} {}", first_name.trim(), last_name.trim())
            .trim()
            .to_lowercase();
        if !full.is_empty() {
            self.teachers_by_name.insert(full, id.to_string());
        }
    }
}

/// Multiple-choice import: subject/series/theme/teacher are selected once for
/// the whole file, lines carry only question data.
pub struct TestImportRequest<'a> {
    pub raw_text: &'a str,
    pub format: ImportFormat,
    pub subject_id: &'a str,
    pub series_id: &'a str,
    pub theme_id: Option<&'a str>,
    pub teacher_id: &'a str,
}

/// Essay import: subject/series come per line, theme and teacher columns are
/// optional. A blank teacher column falls back to `default_teacher_id`.
pub struct EssayImportRequest<'a> {
    pub raw_text: &'a str,
    pub format: ImportFormat,
    pub tables: &'a ReferenceTables,
    pub default_teacher_id: &'a str,
}

/// A fully validated record. Invalid lines never construct one of these;
/// they produce an `ImportError` instead.
#[derive(Clone, Debug, PartialEq)]
pub enum ParsedRecord {
    MultipleChoice {
        question: String,
        alternatives: Vec<String>,
        /// 1-based, always within `1..=alternatives.len()`.
        correct_index: usize,
        justification: String,
        subject_id: String,
        series_id: String,
        theme_id: Option<String>,
        teacher_id: String,
    },
    Essay {
        statement: String,
        expected_answer: String,
        subject_id: String,
        series_id: String,
        theme_id: Option<String>,
        teacher_id: String,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct ImportError {
    /// 1-based physical line number in the full file, header row included.
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct ImportReport {
    pub success_count: usize,
    pub errors: Vec<ImportError>,
}

pub type PersistFn<'a> = dyn FnMut(&ParsedRecord) -> anyhow::Result<()> + 'a;

const MIN_TEST_FIELDS: usize = 4;
const MIN_ESSAY_FIELDS: usize = 4;

pub fn run_test_import(req: &TestImportRequest, persist: &mut PersistFn) -> ImportReport {
    let lines = tokenize(req.raw_text, req.format, &TEST_COLUMNS);
    let mut report = ImportReport::default();
    for line in lines {
        match parse_test_line(&line, req) {
            Ok(record) => persist_record(&record, line.index, persist, &mut report),
            Err(e) => report.errors.push(e),
        }
    }
    report
}

pub fn run_essay_import(req: &EssayImportRequest, persist: &mut PersistFn) -> ImportReport {
    let lines = tokenize(req.raw_text, req.format, &ESSAY_COLUMNS);
    let mut report = ImportReport::default();
    for line in lines {
        match parse_essay_line(&line, req) {
            Ok(record) => persist_record(&record, line.index, persist, &mut report),
            Err(e) => report.errors.push(e),
        }
    }
    report
}

fn persist_record(
    record: &ParsedRecord,
    line: usize,
    persist: &mut PersistFn,
    report: &mut ImportReport,
) {
    match persist(record) {
        Ok(()) => report.success_count += 1,
        Err(e) => report.errors.push(ImportError {
            line,
            message: format!("Line {}: database save error - {}", line, e),
        }),
    }
}

// ---- tokenizer ----

struct RawLine {
    index: usize,
    fields: Vec<String>,
}

/// Accepted header names per logical column, matched case-insensitively.
/// A column maps to the position of the first header cell matching any of
/// its synonyms; absent columns read as empty strings.
struct ColumnSpec {
    columns: &'static [&'static [&'static str]],
}

const TEST_COLUMNS: ColumnSpec = ColumnSpec {
    columns: &[
        &["enunciado"],
        &["alternativas"],
        &["resposta_correta", "correta"],
        &["justificativa", "comentario"],
    ],
};

const ESSAY_COLUMNS: ColumnSpec = ColumnSpec {
    columns: &[
        &["enunciado"],
        &["resposta_esperada", "resposta"],
        &["disciplina", "materia"],
        &["serie", "ano"],
        &["tema", "conteudo"],
        &["professor", "professor_responsavel"],
    ],
};

/// Splits raw text into logical records. Line indexes are 1-based physical
/// positions in the full file; blank lines (and the CSV header row) keep
/// their position but produce no record.
fn tokenize(text: &str, format: ImportFormat, spec: &ColumnSpec) -> Vec<RawLine> {
    let physical: Vec<(usize, &str)> = text
        .split('\n')
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim_end_matches('\r')))
        .filter(|(_, l)| !l.trim().is_empty())
        .collect();

    match format {
        ImportFormat::PlainDelimited => physical
            .into_iter()
            .map(|(index, l)| RawLine {
                index,
                fields: l.split('|').map(|f| f.trim().to_string()).collect(),
            })
            .collect(),
        ImportFormat::HeaderedCsv => {
            let Some(((_, header), data)) = physical.split_first() else {
                return Vec::new();
            };
            let delim = if header.contains(';') { ';' } else { ',' };
            let header_cells: Vec<String> = split_quoted(header, delim)
                .into_iter()
                .map(|c| c.to_lowercase())
                .collect();
            let positions: Vec<Option<usize>> = spec
                .columns
                .iter()
                .map(|synonyms| {
                    header_cells
                        .iter()
                        .position(|cell| synonyms.iter().any(|s| cell == s))
                })
                .collect();

            data.iter()
                .map(|(index, l)| {
                    let cells = split_quoted(l, delim);
                    let fields = positions
                        .iter()
                        .map(|pos| {
                            pos.and_then(|i| cells.get(i).cloned())
                                .unwrap_or_default()
                        })
                        .collect();
                    RawLine {
                        index: *index,
                        fields,
                    }
                })
                .collect()
        }
    }
}

/// Character-by-character field split honoring double-quote enclosure. The
/// delimiter is literal inside quotes; `""` inside quotes decodes to one `"`.
fn split_quoted(line: &str, delim: char) -> Vec<String> {
    let mut fields = Vec::new();
    let mut cur = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '"' {
            if in_quotes && chars.peek() == Some(&'"') {
                cur.push('"');
                chars.next();
            } else {
                in_quotes = !in_quotes;
            }
        } else if c == delim && !in_quotes {
            fields.push(cur.trim().to_string());
            cur.clear();
        } else {
            cur.push(c);
        }
    }
    fields.push(cur.trim().to_string());
    fields
}

// ---- per-line validation ----

fn parse_test_line(line: &RawLine, req: &TestImportRequest) -> Result<ParsedRecord, ImportError> {
    if req.format == ImportFormat::PlainDelimited && line.fields.len() < MIN_TEST_FIELDS {
        return Err(format_error(line.index, MIN_TEST_FIELDS));
    }

    let question = field(line, 0);
    let alternatives_raw = field(line, 1);
    let correct_raw = field(line, 2);
    let justification = field(line, 3);

    if !has_text(&question) || !has_text(&alternatives_raw) {
        return Err(line_error(line.index, "required fields missing"));
    }

    let alternatives: Vec<String> = alternatives_raw
        .split(';')
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .collect();
    if alternatives.len() < 2 {
        return Err(line_error(line.index, "minimum of 2 alternatives required"));
    }

    let correct_index = match correct_raw.trim().parse::<i64>() {
        Ok(n) if n >= 1 && n as usize <= alternatives.len() => n as usize,
        _ => {
            return Err(line_error(
                line.index,
                format!("answer must be a number between 1 and {}", alternatives.len()),
            ))
        }
    };

    Ok(ParsedRecord::MultipleChoice {
        question: question.trim().to_string(),
        alternatives,
        correct_index,
        justification: justification.trim().to_string(),
        subject_id: req.subject_id.to_string(),
        series_id: req.series_id.to_string(),
        theme_id: req.theme_id.map(|t| t.to_string()),
        teacher_id: req.teacher_id.to_string(),
    })
}

fn parse_essay_line(line: &RawLine, req: &EssayImportRequest) -> Result<ParsedRecord, ImportError> {
    if req.format == ImportFormat::PlainDelimited && line.fields.len() < MIN_ESSAY_FIELDS {
        return Err(format_error(line.index, MIN_ESSAY_FIELDS));
    }

    let statement = field(line, 0);
    let expected_answer = field(line, 1);
    let subject_raw = field(line, 2);
    let series_raw = field(line, 3);
    let theme_raw = field(line, 4);
    let teacher_raw = field(line, 5);

    if !has_text(&statement) || !has_text(&expected_answer) {
        return Err(line_error(line.index, "required fields missing"));
    }

    let subject_id = resolve(&subject_raw, &req.tables.subjects)
        .ok_or_else(|| resolution_error(line.index, "subject", &subject_raw))?;
    let series_id = resolve(&series_raw, &req.tables.series)
        .ok_or_else(|| resolution_error(line.index, "series", &series_raw))?;

    let theme_id = if theme_raw.trim().is_empty() {
        None
    } else {
        Some(
            resolve(&theme_raw, &req.tables.themes)
                .ok_or_else(|| resolution_error(line.index, "theme", &theme_raw))?,
        )
    };

    let teacher_id = resolve_teacher(&teacher_raw, req.tables, req.default_teacher_id)
        .ok_or_else(|| resolution_error(line.index, "teacher", &teacher_raw))?;

    Ok(ParsedRecord::Essay {
        statement: statement.trim().to_string(),
        expected_answer: expected_answer.trim().to_string(),
        subject_id,
        series_id,
        theme_id,
        teacher_id,
    })
}

fn field(line: &RawLine, idx: usize) -> String {
    line.fields.get(idx).cloned().unwrap_or_default()
}

fn line_error(line: usize, message: impl AsRef<str>) -> ImportError {
    ImportError {
        line,
        message: format!("Line {}: {}", line, message.as_ref()),
    }
}

fn format_error(line: usize, min: usize) -> ImportError {
    line_error(
        line,
        format!(
            "invalid format, expected at least {} pipe-separated fields",
            min
        ),
    )
}

fn resolution_error(line: usize, what: &str, value: &str) -> ImportError {
    line_error(line, format!("invalid {} \"{}\"", what, value.trim()))
}

/// Non-empty after stripping markup and surrounding whitespace.
fn has_text(s: &str) -> bool {
    !strip_tags(s).trim().is_empty()
}

fn strip_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for c in s.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

// ---- reference resolution ----

/// An identifier-shaped value is used verbatim without a lookup.
fn is_id_shaped(value: &str) -> bool {
    Uuid::parse_str(value).is_ok()
}

fn resolve(value: &str, table: &HashMap<String, String>) -> Option<String> {
    let v = value.trim();
    if is_id_shaped(v) {
        return Some(v.to_string());
    }
    table.get(&v.to_lowercase()).cloned()
}

/// Teacher lookup order: id pass-through, email, full name. A blank value
/// falls back to the batch default; a non-blank miss is a failure.
fn resolve_teacher(value: &str, tables: &ReferenceTables, default_id: &str) -> Option<String> {
    let v = value.trim();
    if v.is_empty() {
        return Some(default_id.to_string());
    }
    if is_id_shaped(v) {
        return Some(v.to_string());
    }
    let key = v.to_lowercase();
    tables
        .teachers_by_email
        .get(&key)
        .or_else(|| tables.teachers_by_name.get(&key))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUBJECT_ID: &str = "00000000-0000-0000-0000-000000000001";
    const SERIES_ID: &str = "00000000-0000-0000-0000-000000000002";
    const TEACHER_ID: &str = "00000000-0000-0000-0000-000000000003";

    fn test_request(raw_text: &str) -> TestImportRequest<'_> {
        TestImportRequest {
            raw_text,
            format: ImportFormat::PlainDelimited,
            subject_id: SUBJECT_ID,
            series_id: SERIES_ID,
            theme_id: None,
            teacher_id: TEACHER_ID,
        }
    }

    fn collect_test(req: &TestImportRequest) -> (ImportReport, Vec<ParsedRecord>) {
        let mut persisted = Vec::new();
        let report = run_test_import(req, &mut |r| {
            persisted.push(r.clone());
            Ok(())
        });
        (report, persisted)
    }

    fn collect_essay(req: &EssayImportRequest) -> (ImportReport, Vec<ParsedRecord>) {
        let mut persisted = Vec::new();
        let report = run_essay_import(req, &mut |r| {
            persisted.push(r.clone());
            Ok(())
        });
        (report, persisted)
    }

    fn essay_tables() -> ReferenceTables {
        let mut t = ReferenceTables::default();
        t.add_subject("Matemática", "id-mat-1");
        t.add_series("5ºano", "id-serie-1");
        t.add_theme("Frações", "id-tema-1");
        t.add_teacher("ana@escola.com", "Ana", "Souza", "id-prof-ana");
        t
    }

    #[test]
    fn pipe_test_import_accepts_minimal_line() {
        let req = test_request("2+2=?|3;4;5|2|Basic addition");
        let (report, persisted) = collect_test(&req);
        assert_eq!(report.success_count, 1);
        assert!(report.errors.is_empty());
        assert_eq!(
            persisted[0],
            ParsedRecord::MultipleChoice {
                question: "2+2=?".into(),
                alternatives: vec!["3".into(), "4".into(), "5".into()],
                correct_index: 2,
                justification: "Basic addition".into(),
                subject_id: SUBJECT_ID.into(),
                series_id: SERIES_ID.into(),
                theme_id: None,
                teacher_id: TEACHER_ID.into(),
            }
        );
    }

    #[test]
    fn pipe_test_import_rejects_short_line() {
        let req = test_request("Only one field");
        let (report, persisted) = collect_test(&req);
        assert_eq!(report.success_count, 0);
        assert!(persisted.is_empty());
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].line, 1);
        assert!(report.errors[0].message.contains("invalid format"));
        assert!(report.errors[0].message.contains("at least 4"));
    }

    #[test]
    fn pipe_test_import_requires_two_alternatives() {
        let req = test_request("Q|OnlyOneAlt|1|J");
        let (report, _) = collect_test(&req);
        assert_eq!(report.success_count, 0);
        assert!(report.errors[0]
            .message
            .contains("minimum of 2 alternatives"));
    }

    #[test]
    fn pipe_test_import_rejects_out_of_range_answer() {
        let req = test_request("Q|A;B|5|J");
        let (report, _) = collect_test(&req);
        assert_eq!(report.success_count, 0);
        assert!(report.errors[0].message.contains("between 1 and 2"));
    }

    #[test]
    fn pipe_test_import_rejects_non_numeric_answer() {
        let req = test_request("Q|A;B;C|two|J");
        let (report, _) = collect_test(&req);
        assert_eq!(report.success_count, 0);
        assert!(report.errors[0].message.contains("between 1 and 3"));
    }

    #[test]
    fn markup_only_question_counts_as_missing() {
        let req = test_request("<p> </p>|A;B|1|J");
        let (report, _) = collect_test(&req);
        assert!(report.errors[0].message.contains("required fields missing"));
    }

    #[test]
    fn empty_alternatives_are_dropped_before_counting() {
        // Trailing separators must not manufacture alternatives.
        let req = test_request("Q|A;;B;|2|J");
        let (report, persisted) = collect_test(&req);
        assert_eq!(report.success_count, 1);
        match &persisted[0] {
            ParsedRecord::MultipleChoice {
                alternatives,
                correct_index,
                ..
            } => {
                assert_eq!(alternatives, &vec!["A".to_string(), "B".to_string()]);
                assert_eq!(*correct_index, 2);
            }
            other => panic!("unexpected record: {:?}", other),
        }
    }

    #[test]
    fn batch_keeps_going_after_bad_lines_and_preserves_order() {
        let raw = "Q1|A;B|1|ok\n\nbroken\nQ2|A;B|9|bad index\nQ3|A;B;C|3|ok\n";
        let req = test_request(raw);
        let (report, persisted) = collect_test(&req);
        assert_eq!(report.success_count, 2);
        assert_eq!(persisted.len(), 2);
        let lines: Vec<usize> = report.errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![3, 4]);
        // Conservation: blank line 2 counts toward neither bucket.
        assert_eq!(report.success_count + report.errors.len(), 4);
    }

    #[test]
    fn persistence_failure_is_reported_verbatim_and_does_not_abort() {
        let req = test_request("Q1|A;B|1|j\nQ2|A;B|2|j\nQ3|A;B|1|j");
        let mut calls = 0;
        let report = run_test_import(&req, &mut |_| {
            calls += 1;
            if calls == 2 {
                anyhow::bail!("UNIQUE constraint failed: questions.id");
            }
            Ok(())
        });
        assert_eq!(report.success_count, 2);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].line, 2);
        assert_eq!(
            report.errors[0].message,
            "Line 2: database save error - UNIQUE constraint failed: questions.id"
        );
    }

    #[test]
    fn essay_csv_import_resolves_names_and_defaults_teacher() {
        let raw = "enunciado,resposta,disciplina,serie\nQual é 2+2?,É 4,Matemática,5ºano\n";
        let tables = essay_tables();
        let req = EssayImportRequest {
            raw_text: raw,
            format: ImportFormat::HeaderedCsv,
            tables: &tables,
            default_teacher_id: "id-prof-default",
        };
        let (report, persisted) = collect_essay(&req);
        assert_eq!(report.success_count, 1);
        assert!(report.errors.is_empty());
        assert_eq!(
            persisted[0],
            ParsedRecord::Essay {
                statement: "Qual é 2+2?".into(),
                expected_answer: "É 4".into(),
                subject_id: "id-mat-1".into(),
                series_id: "id-serie-1".into(),
                theme_id: None,
                teacher_id: "id-prof-default".into(),
            }
        );
    }

    #[test]
    fn essay_csv_unknown_subject_reports_physical_line_two() {
        let raw = "enunciado,resposta,disciplina,serie\nQual é 2+2?,É 4,Desconhecida,5ºano\n";
        let tables = essay_tables();
        let req = EssayImportRequest {
            raw_text: raw,
            format: ImportFormat::HeaderedCsv,
            tables: &tables,
            default_teacher_id: "id-prof-default",
        };
        let (report, persisted) = collect_essay(&req);
        assert_eq!(report.success_count, 0);
        assert!(persisted.is_empty());
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].line, 2);
        assert!(report.errors[0].message.contains("invalid subject"));
    }

    #[test]
    fn csv_quoted_fields_decode_embedded_delimiters_and_quotes() {
        let raw =
            "enunciado,resposta,disciplina,serie\n\"a,b\"\"c\",\"É, sim\",Matemática,5ºano\n";
        let tables = essay_tables();
        let req = EssayImportRequest {
            raw_text: raw,
            format: ImportFormat::HeaderedCsv,
            tables: &tables,
            default_teacher_id: "id-prof-default",
        };
        let (report, persisted) = collect_essay(&req);
        assert_eq!(report.success_count, 1, "errors: {:?}", report.errors);
        match &persisted[0] {
            ParsedRecord::Essay {
                statement,
                expected_answer,
                ..
            } => {
                assert_eq!(statement, "a,b\"c");
                assert_eq!(expected_answer, "É, sim");
            }
            other => panic!("unexpected record: {:?}", other),
        }
    }

    #[test]
    fn csv_semicolon_header_switches_delimiter() {
        let raw = "enunciado;resposta;materia;ano\nPergunta, com vírgula;Resposta;Matemática;5ºano\n";
        let tables = essay_tables();
        let req = EssayImportRequest {
            raw_text: raw,
            format: ImportFormat::HeaderedCsv,
            tables: &tables,
            default_teacher_id: "id-prof-default",
        };
        let (report, persisted) = collect_essay(&req);
        assert_eq!(report.success_count, 1, "errors: {:?}", report.errors);
        match &persisted[0] {
            ParsedRecord::Essay { statement, .. } => {
                assert_eq!(statement, "Pergunta, com vírgula");
            }
            other => panic!("unexpected record: {:?}", other),
        }
    }

    #[test]
    fn csv_headers_match_case_insensitively() {
        let raw = "ENUNCIADO,Resposta_Esperada,Disciplina,Serie\nQ,R,Matemática,5ºano\n";
        let tables = essay_tables();
        let req = EssayImportRequest {
            raw_text: raw,
            format: ImportFormat::HeaderedCsv,
            tables: &tables,
            default_teacher_id: "id-prof-default",
        };
        let (report, _) = collect_essay(&req);
        assert_eq!(report.success_count, 1, "errors: {:?}", report.errors);
    }

    #[test]
    fn essay_pipe_optional_theme_and_teacher_columns() {
        let tables = essay_tables();
        let raw = "Q1|R1|Matemática|5ºano\n\
                   Q2|R2|Matemática|5ºano|Frações\n\
                   Q3|R3|Matemática|5ºano|Frações|ana@escola.com\n\
                   Q4|R4|Matemática|5ºano||Ana Souza\n";
        let req = EssayImportRequest {
            raw_text: raw,
            format: ImportFormat::PlainDelimited,
            tables: &tables,
            default_teacher_id: "id-prof-default",
        };
        let (report, persisted) = collect_essay(&req);
        assert_eq!(report.success_count, 4, "errors: {:?}", report.errors);
        let refs: Vec<(Option<&str>, &str)> = persisted
            .iter()
            .map(|r| match r {
                ParsedRecord::Essay {
                    theme_id,
                    teacher_id,
                    ..
                } => (theme_id.as_deref(), teacher_id.as_str()),
                other => panic!("unexpected record: {:?}", other),
            })
            .collect();
        assert_eq!(
            refs,
            vec![
                (None, "id-prof-default"),
                (Some("id-tema-1"), "id-prof-default"),
                (Some("id-tema-1"), "id-prof-ana"),
                (None, "id-prof-ana"),
            ]
        );
    }

    #[test]
    fn unknown_non_blank_teacher_is_an_error_not_a_default() {
        let tables = essay_tables();
        let raw = "Q|R|Matemática|5ºano||Carlos Silva";
        let req = EssayImportRequest {
            raw_text: raw,
            format: ImportFormat::PlainDelimited,
            tables: &tables,
            default_teacher_id: "id-prof-default",
        };
        let (report, _) = collect_essay(&req);
        assert_eq!(report.success_count, 0);
        assert!(report.errors[0].message.contains("invalid teacher"));
    }

    #[test]
    fn id_shaped_subject_bypasses_lookup() {
        // No table contains this id; pass-through must still accept it.
        let mut tables = ReferenceTables::default();
        tables.add_series("5ºano", "id-serie-1");
        let raw = format!("Q|R|{}|5ºano", SUBJECT_ID);
        let req = EssayImportRequest {
            raw_text: &raw,
            format: ImportFormat::PlainDelimited,
            tables: &tables,
            default_teacher_id: "id-prof-default",
        };
        let (report, persisted) = collect_essay(&req);
        assert_eq!(report.success_count, 1, "errors: {:?}", report.errors);
        match &persisted[0] {
            ParsedRecord::Essay { subject_id, .. } => assert_eq!(subject_id, SUBJECT_ID),
            other => panic!("unexpected record: {:?}", other),
        }
    }

    #[test]
    fn lookups_are_case_insensitive() {
        let tables = essay_tables();
        let raw = "Q|R|MATEMÁTICA|5ºAno";
        let req = EssayImportRequest {
            raw_text: raw,
            format: ImportFormat::PlainDelimited,
            tables: &tables,
            default_teacher_id: "id-prof-default",
        };
        let (report, _) = collect_essay(&req);
        assert_eq!(report.success_count, 1, "errors: {:?}", report.errors);
    }

    #[test]
    fn validation_stops_at_first_failing_check() {
        // Missing question and a bad answer index: only the missing-fields
        // message may be reported, and only once.
        let req = test_request("|A|9|J");
        let (report, _) = collect_test(&req);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].message.contains("required fields missing"));
    }

    #[test]
    fn empty_input_yields_empty_report() {
        let req = test_request("");
        let (report, persisted) = collect_test(&req);
        assert_eq!(report.success_count, 0);
        assert!(report.errors.is_empty());
        assert!(persisted.is_empty());
    }

    #[test]
    fn csv_header_only_yields_empty_report() {
        let tables = essay_tables();
        let req = EssayImportRequest {
            raw_text: "enunciado,resposta,disciplina,serie\n",
            format: ImportFormat::HeaderedCsv,
            tables: &tables,
            default_teacher_id: "id-prof-default",
        };
        let (report, _) = collect_essay(&req);
        assert_eq!(report.success_count, 0);
        assert!(report.errors.is_empty());
    }
}

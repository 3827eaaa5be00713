use crate::calc;
use crate::model::{AppData, Cycle, ReportKey, Subject};
use anyhow::Context;
use std::path::{Path, PathBuf};

/// One flat export row: ordered column/value pairs. Absent columns render empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CsvRecord {
    fields: Vec<(String, String)>,
}

impl CsvRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    fn get(&self, column: &str) -> &str {
        self.fields
            .iter()
            .find(|(k, _)| k == column)
            .map(|(_, v)| v.as_str())
            .unwrap_or("")
    }
}

fn finish(writer: csv::Writer<Vec<u8>>) -> anyhow::Result<String> {
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("failed to flush csv writer: {}", e.error()))?;
    String::from_utf8(bytes).context("csv output is not utf-8")
}

/// Renders records as CSV text.
///
/// The header is the first record's columns joined by commas; every data field
/// is quoted with inner quotes doubled. Rows are separated by `\n` with no
/// trailing newline. Returns `None` for an empty input.
pub fn to_csv(records: &[CsvRecord]) -> anyhow::Result<Option<String>> {
    let Some(first) = records.first() else {
        return Ok(None);
    };
    let headers: Vec<&str> = first.columns().collect();

    let mut header = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Never)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    header
        .write_record(&headers)
        .context("failed to write csv header")?;

    let mut body = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    for (i, rec) in records.iter().enumerate() {
        body.write_record(headers.iter().map(|h| rec.get(h)))
            .with_context(|| format!("failed to write csv row {i}"))?;
    }

    let mut out = finish(header)?;
    out.push_str(&finish(body)?);
    if out.ends_with('\n') {
        out.pop();
    }
    Ok(Some(out))
}

/// Writes `<dir>/<stem>.csv`. Nothing is written for an empty input.
pub fn write_csv_file(
    dir: &Path,
    stem: &str,
    records: &[CsvRecord],
) -> anyhow::Result<Option<(PathBuf, String)>> {
    let Some(content) = to_csv(records)? else {
        return Ok(None);
    };
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create directory {}", dir.to_string_lossy()))?;
    let path = dir.join(format!("{stem}.csv"));
    std::fs::write(&path, &content)
        .with_context(|| format!("failed to write {}", path.to_string_lossy()))?;
    Ok(Some((path, content)))
}

pub fn synthesis_file_stem(cycle: Cycle) -> String {
    format!("synthese-1MA-trimestre-{cycle}")
}

/// Export rows for the synthesis dashboard, in student collection order.
pub fn synthesis_records(data: &AppData, cycle: Cycle) -> Vec<CsvRecord> {
    data.students
        .iter()
        .map(|student| {
            let report = data.report(&ReportKey {
                student_id: student.id.clone(),
                cycle,
            });
            let mut rec = CsvRecord::new()
                .field("Élève", student.display_name())
                .field(
                    "Moyenne Globale",
                    calc::global_average(data, &student.id)
                        .map(|v| v.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                )
                .field(
                    "Commentaire Global IA",
                    report
                        .map(|r| r.content.as_str())
                        .filter(|c| !c.is_empty())
                        .unwrap_or("Non généré"),
                );
            for subject in Subject::ALL {
                let cell = calc::student_average(data, &student.id, Some(subject))
                    .map(|v| format!("{v}/10"))
                    .unwrap_or_else(|| "-".to_string());
                rec = rec.field(subject.label(), cell);
            }
            rec
        })
        .collect()
}

//! Re-readers for the emitted formats.
//!
//! The validator reads back what the emitter wrote using the standard
//! parsers for each format, not the emitter's own code paths; a bug that
//! corrupts a file on the way out shows up here instead of cancelling out.

use std::path::Path;

use calamine::{open_workbook, Reader as XlsxReader, Xlsx};
use quick_xml::events::Event;
use quick_xml::Reader as XmlReader;

use lexfuse_project::{FieldMap, ProjectionSpec};

use crate::ValidateError;

/// One structured record as read back from disk: the source's own ID value
/// plus every foreign-key value, keyed by its field mapping.
#[derive(Debug)]
pub struct RawRecord {
    pub id: Option<String>,
    pub fks: Vec<(&'static FieldMap, String)>,
}

fn fk_fields(spec: &'static ProjectionSpec) -> Vec<&'static FieldMap> {
    spec.fields
        .iter()
        .filter(|f| matches!(f.role, lexfuse_project::FieldRole::ForeignKey(_)))
        .collect()
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> ValidateError + '_ {
    move |source| ValidateError::Io {
        path: path.to_path_buf(),
        source,
    }
}

pub fn read_csv(path: &Path, spec: &'static ProjectionSpec) -> Result<Vec<RawRecord>, ValidateError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| ValidateError::Csv(e.to_string()))?;
    let headers = reader
        .headers()
        .map_err(|e| ValidateError::Csv(e.to_string()))?
        .clone();
    let column = |name: &str| -> Result<usize, ValidateError> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| ValidateError::MissingColumn {
                src: spec.source,
                column: name.to_string(),
            })
    };

    let id_col = column(spec.id_field().target)?;
    let fk_cols: Vec<(&'static FieldMap, usize)> = fk_fields(spec)
        .into_iter()
        .map(|f| Ok((f, column(f.target)?)))
        .collect::<Result<_, ValidateError>>()?;

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| ValidateError::Csv(e.to_string()))?;
        records.push(RawRecord {
            id: row.get(id_col).map(str::to_string),
            fks: fk_cols
                .iter()
                .map(|(f, col)| (*f, row.get(*col).unwrap_or_default().to_string()))
                .collect(),
        });
    }
    Ok(records)
}

/// Dot-notation lookup into a parsed JSON value.
fn json_path<'a>(value: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    path.split('.').try_fold(value, |node, key| node.get(key))
}

fn json_str(value: &serde_json::Value, path: &str) -> Option<String> {
    json_path(value, path).and_then(|v| v.as_str()).map(str::to_string)
}

fn record_from_json(value: &serde_json::Value, spec: &'static ProjectionSpec) -> RawRecord {
    RawRecord {
        id: json_str(value, spec.id_field().target),
        fks: fk_fields(spec)
            .into_iter()
            .map(|f| (f, json_str(value, f.target).unwrap_or_default()))
            .collect(),
    }
}

pub fn read_json(path: &Path, spec: &'static ProjectionSpec) -> Result<Vec<RawRecord>, ValidateError> {
    let bytes = std::fs::read(path).map_err(io_err(path))?;
    let parsed: serde_json::Value = serde_json::from_slice(&bytes)?;
    let array = parsed
        .as_array()
        .ok_or_else(|| ValidateError::Shape {
            src: spec.source,
            detail: "top-level JSON value is not an array".to_string(),
        })?;
    Ok(array.iter().map(|v| record_from_json(v, spec)).collect())
}

/// JSONL: structured fields per line, plus each line's free-text `body` for
/// token scanning.
pub fn read_jsonl(
    path: &Path,
    spec: &'static ProjectionSpec,
) -> Result<Vec<(RawRecord, String)>, ValidateError> {
    let text = std::fs::read_to_string(path).map_err(io_err(path))?;
    let mut records = Vec::new();
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        let parsed: serde_json::Value = serde_json::from_str(line)?;
        let body = json_str(&parsed, "body").unwrap_or_default();
        records.push((record_from_json(&parsed, spec), body));
    }
    Ok(records)
}

/// XML: one record per `<Entity>` element, ID taken from its attribute.
pub fn read_xml(path: &Path, spec: &'static ProjectionSpec) -> Result<Vec<RawRecord>, ValidateError> {
    let mut reader = XmlReader::from_file(path)?;
    let id_name = spec.id_field().target.as_bytes();

    let mut records = Vec::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.name().as_ref() == b"Entity" => {
                let mut id = None;
                for attr in e.attributes() {
                    let attr = attr.map_err(quick_xml::Error::from)?;
                    if attr.key.as_ref() == id_name {
                        id = Some(attr.decode_and_unescape_value(&reader)?.into_owned());
                    }
                }
                // The client XML source carries no foreign keys.
                records.push(RawRecord { id, fks: Vec::new() });
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(records)
}

pub fn read_xlsx(path: &Path, spec: &'static ProjectionSpec) -> Result<Vec<RawRecord>, ValidateError> {
    let mut workbook: Xlsx<_> =
        open_workbook(path).map_err(|e: calamine::XlsxError| ValidateError::Xlsx(e.to_string()))?;
    let range = workbook
        .worksheet_range("Clients")
        .map_err(|e| ValidateError::Xlsx(e.to_string()))?;

    let mut rows = range.rows();
    let header: Vec<String> = rows
        .next()
        .ok_or_else(|| ValidateError::Shape {
            src: spec.source,
            detail: "worksheet has no header row".to_string(),
        })?
        .iter()
        .map(|c| c.to_string())
        .collect();
    let column = |name: &str| -> Result<usize, ValidateError> {
        header
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| ValidateError::MissingColumn {
                src: spec.source,
                column: name.to_string(),
            })
    };
    let id_col = column(spec.id_field().target)?;
    let fk_cols: Vec<(&'static FieldMap, usize)> = fk_fields(spec)
        .into_iter()
        .map(|f| Ok((f, column(f.target)?)))
        .collect::<Result<_, ValidateError>>()?;

    Ok(rows
        .map(|row| RawRecord {
            id: row.get(id_col).map(|c| c.to_string()),
            fks: fk_cols
                .iter()
                .map(|(f, col)| {
                    (*f, row.get(*col).map(|c| c.to_string()).unwrap_or_default())
                })
                .collect(),
        })
        .collect())
}

/// The text of every `.txt` file under `dir`, sorted by file name so the
/// report order is stable.
pub fn read_text_dir(dir: &Path) -> Result<Vec<(String, String)>, ValidateError> {
    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .map_err(io_err(dir))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_err(dir))?
        .into_iter()
        .map(|entry| entry.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "txt"))
        .collect();
    paths.sort();

    paths
        .into_iter()
        .map(|path| {
            let text = std::fs::read_to_string(&path).map_err(io_err(&path))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            Ok((name, text))
        })
        .collect()
}

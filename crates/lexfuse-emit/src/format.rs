//! Per-format byte renderers.
//!
//! Every renderer takes projected records and returns the full file body as
//! bytes; the driver owns the filesystem. Rendering is deterministic, so two
//! runs with the same graph and config produce byte-identical files.

use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer as XmlWriter;
use rust_xlsxwriter::{Format, Workbook};

use lexfuse_core::EncodedValue;
use lexfuse_project::{Projected, ProjectionSpec};

use crate::EmitError;

/// CSV body: header row in spec order, then one row per record. Missing
/// values render as empty cells.
pub fn csv_bytes(spec: &ProjectionSpec, records: &[Projected]) -> Result<Vec<u8>, EmitError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(spec.headers())?;
    for record in records {
        let row: Vec<String> = record
            .flat_values(spec)
            .iter()
            .map(EncodedValue::render)
            .collect();
        writer.write_record(&row)?;
    }
    writer
        .into_inner()
        .map_err(|e| EmitError::Csv(e.to_string()))
}

/// JSON body: a pretty-printed array of objects, field order following the
/// spec (nested paths become nested objects).
pub fn json_bytes(records: &[Projected]) -> Result<Vec<u8>, EmitError> {
    let values: Vec<serde_json::Value> = records.iter().map(Projected::to_json).collect();
    let mut bytes = serde_json::to_vec_pretty(&values)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// JSONL body: one object per line, each with a free-text `body` appended
/// after the structured fields.
pub fn jsonl_bytes(records: &[(Projected, String)]) -> Result<Vec<u8>, EmitError> {
    let mut bytes = Vec::new();
    for (record, body) in records {
        let mut value = record.to_json();
        if let serde_json::Value::Object(map) = &mut value {
            map.insert("body".to_string(), serde_json::Value::String(body.clone()));
        }
        serde_json::to_writer(&mut bytes, &value)?;
        bytes.push(b'\n');
    }
    Ok(bytes)
}

/// XML body: a root element wrapping one `<Entity>` per record. The primary
/// key rides as an attribute on `<Entity>`; every other field becomes a child
/// element.
pub fn xml_bytes(spec: &ProjectionSpec, records: &[Projected]) -> Result<Vec<u8>, EmitError> {
    let id_field = spec.id_field();
    let mut writer = XmlWriter::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new("Clients")))?;

    for record in records {
        let id = record
            .leaf(id_field.target)
            .map(EncodedValue::render)
            .unwrap_or_default();
        let mut entity = BytesStart::new("Entity");
        entity.push_attribute((id_field.target, id.as_str()));
        writer.write_event(Event::Start(entity))?;

        for field in spec.fields.iter().filter(|f| f.included && f.target != id_field.target) {
            let text = record
                .leaf(field.target)
                .map(EncodedValue::render)
                .unwrap_or_default();
            writer.write_event(Event::Start(BytesStart::new(field.target)))?;
            writer.write_event(Event::Text(BytesText::new(&text)))?;
            writer.write_event(Event::End(BytesEnd::new(field.target)))?;
        }

        writer.write_event(Event::End(BytesEnd::new("Entity")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("Clients")))?;
    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    Ok(bytes)
}

/// XLSX body: a single `Clients` worksheet, bold header row, then one row
/// per record. Int/Float cells are written as numbers so spreadsheet tooling
/// sees real numeric types.
pub fn xlsx_bytes(spec: &ProjectionSpec, records: &[Projected]) -> Result<Vec<u8>, EmitError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Clients")?;

    for (col, header) in spec.headers().iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *header, &bold)?;
    }
    for (row, record) in records.iter().enumerate() {
        let row = row as u32 + 1;
        for (col, value) in record.flat_values(spec).iter().enumerate() {
            let col = col as u16;
            match value {
                EncodedValue::Int(n) => sheet.write_number(row, col, *n as f64)?,
                EncodedValue::Float(f) => sheet.write_number(row, col, *f)?,
                EncodedValue::Text(s) => sheet.write_string(row, col, s)?,
                EncodedValue::Missing => sheet.write_string(row, col, "")?,
            };
        }
    }

    Ok(workbook.save_to_buffer()?)
}

/// Write one file, retrying once on a transient I/O failure.
pub fn write_file_with_retry(path: &Path, bytes: &[u8]) -> Result<(), EmitError> {
    if let Err(first) = std::fs::write(path, bytes) {
        tracing::warn!(path = %path.display(), error = %first, "write failed, retrying once");
        std::fs::write(path, bytes).map_err(|source| EmitError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexfuse_core::{CanonicalGraph, EntityKind, GeneratorConfig};
    use lexfuse_project::{inventory, Projector};

    fn small_pack() -> (CanonicalGraph, GeneratorConfig) {
        let mut cfg = GeneratorConfig::default();
        cfg.counts.clients = 5;
        cfg.counts.matters = 8;
        cfg.counts.billing_entries = 20;
        cfg.counts.documents = 8;
        let graph = CanonicalGraph::build(&cfg).unwrap();
        (graph, cfg)
    }

    fn project_all(
        graph: &CanonicalGraph,
        cfg: &GeneratorConfig,
        source: &str,
    ) -> (&'static ProjectionSpec, Vec<Projected>) {
        let spec = inventory::spec(source).unwrap();
        let projector = Projector::new(graph, cfg);
        let records = graph
            .entities(spec.kind)
            .iter()
            .map(|e| projector.project(e, spec))
            .collect();
        (spec, records)
    }

    #[test]
    fn csv_has_header_plus_one_row_per_record() {
        let (graph, cfg) = small_pack();
        let (spec, records) = project_all(&graph, &cfg, "clients_a");
        let bytes = csv_bytes(spec, &records).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text.lines().count(), 1 + records.len());
        assert!(text.starts_with("client_id,company_name,industry"));
    }

    #[test]
    fn json_preserves_spec_field_order() {
        let (graph, cfg) = small_pack();
        let (_, records) = project_all(&graph, &cfg, "clients_b");
        let bytes = json_bytes(&records).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let id_pos = text.find("\"id\"").unwrap();
        let name_pos = text.find("\"custFullNm\"").unwrap();
        let fin_pos = text.find("\"financials\"").unwrap();
        assert!(id_pos < name_pos && name_pos < fin_pos);
        assert!(text.contains("\"currency\": \"USD\""));
    }

    #[test]
    fn xml_puts_the_id_on_the_entity_attribute() {
        let (graph, cfg) = small_pack();
        let (spec, records) = project_all(&graph, &cfg, "clients_c");
        let bytes = xml_bytes(spec, &records).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let first = &graph.entities(EntityKind::Client)[0];
        assert!(text.contains(&format!("<Entity cid=\"{}\">", first.canonical_id)));
        assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
    }

    #[test]
    fn xlsx_renders_without_error_and_is_deterministic() {
        let (graph, cfg) = small_pack();
        let (spec, records) = project_all(&graph, &cfg, "clients_d");
        let a = xlsx_bytes(spec, &records).unwrap();
        let b = xlsx_bytes(spec, &records).unwrap();
        assert!(!a.is_empty());
        assert_eq!(a, b);
    }

    #[test]
    fn jsonl_appends_the_body_last() {
        let (graph, cfg) = small_pack();
        let (spec, _) = project_all(&graph, &cfg, "emails");
        let projector = Projector::new(&graph, &cfg);
        let docs = inventory::email_documents(&graph);
        let records: Vec<(Projected, String)> = docs
            .iter()
            .map(|d| (projector.project(d, spec), "hello".to_string()))
            .collect();
        let bytes = jsonl_bytes(&records).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text.lines().count(), records.len());
        for line in text.lines() {
            assert!(line.trim_end().ends_with("\"body\":\"hello\"}"));
        }
    }
}

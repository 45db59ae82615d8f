//! Parquet table I/O for the four core relations and the `locators` extension
//! (§3, §4.5). Every writer sorts by the table's primary key before writing
//! so two compiles of the same candidate set are byte-identical, and writes
//! a single row group with zstd compression.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, Int16Array, Int32Array, Int64Array, Int8Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

use crate::errors::{VeritasError, VeritasResult};
use crate::model::v1::{ClaimRow, EntityRow, LocatorRow, ObjectType, ProvenanceRow, SpanRow};

fn writer_properties() -> WriterProperties {
    WriterProperties::builder()
        .set_compression(Compression::ZSTD(Default::default()))
        .build()
}

fn open_writer(path: &Path, schema: Arc<Schema>) -> VeritasResult<ArrowWriter<File>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    ArrowWriter::try_new(file, schema, Some(writer_properties()))
        .map_err(|e| VeritasError::serialization(format!("opening parquet writer: {e}")))
}

fn finish_single_batch(mut writer: ArrowWriter<File>, batch: RecordBatch) -> VeritasResult<()> {
    writer
        .write(&batch)
        .map_err(|e| VeritasError::serialization(format!("writing parquet batch: {e}")))?;
    writer
        .close()
        .map_err(|e| VeritasError::serialization(format!("closing parquet writer: {e}")))?;
    Ok(())
}

fn read_all_batches(path: &Path) -> VeritasResult<Vec<RecordBatch>> {
    let file = File::open(path)
        .map_err(|e| VeritasError::io(format!("opening {}: {e}", path.display())))?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| VeritasError::serialization(format!("reading parquet metadata: {e}")))?
        .build()
        .map_err(|e| VeritasError::serialization(format!("building parquet reader: {e}")))?;
    reader
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| VeritasError::serialization(format!("reading parquet batch: {e}")))
}

pub fn entities_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("entity_id", DataType::Utf8, false),
        Field::new("namespace", DataType::Utf8, false),
        Field::new("label", DataType::Utf8, false),
        Field::new("entity_type", DataType::Utf8, false),
    ]))
}

pub fn write_entities(path: &Path, rows: &mut [EntityRow]) -> VeritasResult<()> {
    rows.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
    let schema = entities_schema();
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.entity_id.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.namespace.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.label.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.entity_type.as_str()),
            )),
        ],
    )
    .map_err(|e| VeritasError::serialization(format!("building entities batch: {e}")))?;
    finish_single_batch(open_writer(path, schema)?, batch)
}

pub fn read_entities(path: &Path) -> VeritasResult<Vec<EntityRow>> {
    let mut out = Vec::new();
    for batch in read_all_batches(path)? {
        let entity_id = str_col(&batch, 0)?;
        let namespace = str_col(&batch, 1)?;
        let label = str_col(&batch, 2)?;
        let entity_type = str_col(&batch, 3)?;
        for i in 0..batch.num_rows() {
            out.push(EntityRow {
                entity_id: entity_id.value(i).to_string(),
                namespace: namespace.value(i).to_string(),
                label: label.value(i).to_string(),
                entity_type: entity_type.value(i).to_string(),
            });
        }
    }
    Ok(out)
}

pub fn claims_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("claim_id", DataType::Utf8, false),
        Field::new("subject", DataType::Utf8, false),
        Field::new("predicate", DataType::Utf8, false),
        Field::new("object", DataType::Utf8, false),
        Field::new("object_type", DataType::Utf8, false),
        Field::new("tier", DataType::Int8, false),
    ]))
}

pub fn write_claims(path: &Path, rows: &mut [ClaimRow]) -> VeritasResult<()> {
    rows.sort_by(|a, b| a.claim_id.cmp(&b.claim_id));
    let schema = claims_schema();
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.claim_id.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.subject.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.predicate.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.object.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.object_type.as_str()),
            )),
            Arc::new(Int8Array::from_iter_values(
                rows.iter().map(|r| r.tier as i8),
            )),
        ],
    )
    .map_err(|e| VeritasError::serialization(format!("building claims batch: {e}")))?;
    finish_single_batch(open_writer(path, schema)?, batch)
}

pub fn read_claims(path: &Path) -> VeritasResult<Vec<ClaimRow>> {
    let mut out = Vec::new();
    for batch in read_all_batches(path)? {
        let claim_id = str_col(&batch, 0)?;
        let subject = str_col(&batch, 1)?;
        let predicate = str_col(&batch, 2)?;
        let object = str_col(&batch, 3)?;
        let object_type = str_col(&batch, 4)?;
        let tier = batch
            .column(5)
            .as_any()
            .downcast_ref::<Int8Array>()
            .ok_or_else(|| VeritasError::serialization("claims.tier: expected int8 column"))?;
        for i in 0..batch.num_rows() {
            out.push(ClaimRow {
                claim_id: claim_id.value(i).to_string(),
                subject: subject.value(i).to_string(),
                predicate: predicate.value(i).to_string(),
                object: object.value(i).to_string(),
                object_type: ObjectType::parse(object_type.value(i))?,
                tier: tier.value(i) as u8,
            });
        }
    }
    Ok(out)
}

pub fn provenance_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("provenance_id", DataType::Utf8, false),
        Field::new("claim_id", DataType::Utf8, false),
        Field::new("source_hash", DataType::Utf8, false),
        Field::new("byte_start", DataType::Int64, false),
        Field::new("byte_end", DataType::Int64, false),
    ]))
}

pub fn write_provenance(path: &Path, rows: &mut [ProvenanceRow]) -> VeritasResult<()> {
    rows.sort_by(|a, b| a.provenance_id.cmp(&b.provenance_id));
    let schema = provenance_schema();
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.provenance_id.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.claim_id.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.source_hash.as_str()),
            )),
            Arc::new(Int64Array::from_iter_values(
                rows.iter().map(|r| r.byte_start),
            )),
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.byte_end))),
        ],
    )
    .map_err(|e| VeritasError::serialization(format!("building provenance batch: {e}")))?;
    finish_single_batch(open_writer(path, schema)?, batch)
}

pub fn read_provenance(path: &Path) -> VeritasResult<Vec<ProvenanceRow>> {
    let mut out = Vec::new();
    for batch in read_all_batches(path)? {
        let provenance_id = str_col(&batch, 0)?;
        let claim_id = str_col(&batch, 1)?;
        let source_hash = str_col(&batch, 2)?;
        let byte_start = i64_col(&batch, 3)?;
        let byte_end = i64_col(&batch, 4)?;
        for i in 0..batch.num_rows() {
            out.push(ProvenanceRow {
                provenance_id: provenance_id.value(i).to_string(),
                claim_id: claim_id.value(i).to_string(),
                source_hash: source_hash.value(i).to_string(),
                byte_start: byte_start.value(i),
                byte_end: byte_end.value(i),
            });
        }
    }
    Ok(out)
}

pub fn spans_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("span_id", DataType::Utf8, false),
        Field::new("source_hash", DataType::Utf8, false),
        Field::new("byte_start", DataType::Int64, false),
        Field::new("byte_end", DataType::Int64, false),
        Field::new("text", DataType::Utf8, false),
    ]))
}

pub fn write_spans(path: &Path, rows: &mut [SpanRow]) -> VeritasResult<()> {
    rows.sort_by(|a, b| a.span_id.cmp(&b.span_id));
    let schema = spans_schema();
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.span_id.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.source_hash.as_str()),
            )),
            Arc::new(Int64Array::from_iter_values(
                rows.iter().map(|r| r.byte_start),
            )),
            Arc::new(Int64Array::from_iter_values(rows.iter().map(|r| r.byte_end))),
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.text.as_str()),
            )),
        ],
    )
    .map_err(|e| VeritasError::serialization(format!("building spans batch: {e}")))?;
    finish_single_batch(open_writer(path, schema)?, batch)
}

pub fn read_spans(path: &Path) -> VeritasResult<Vec<SpanRow>> {
    let mut out = Vec::new();
    for batch in read_all_batches(path)? {
        let span_id = str_col(&batch, 0)?;
        let source_hash = str_col(&batch, 1)?;
        let byte_start = i64_col(&batch, 2)?;
        let byte_end = i64_col(&batch, 3)?;
        let text = str_col(&batch, 4)?;
        for i in 0..batch.num_rows() {
            out.push(SpanRow {
                span_id: span_id.value(i).to_string(),
                source_hash: source_hash.value(i).to_string(),
                byte_start: byte_start.value(i),
                byte_end: byte_end.value(i),
                text: text.value(i).to_string(),
            });
        }
    }
    Ok(out)
}

/// `ext/locators.parquet` — versioned `locators@1` extension (nullable
/// `page_index`/`paragraph_index`/`block_id`/`file_path`, joined on
/// `evidence_addr`).
pub fn locators_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("evidence_addr", DataType::Utf8, false),
        Field::new("span_id", DataType::Utf8, false),
        Field::new("source_hash", DataType::Utf8, false),
        Field::new("kind", DataType::Utf8, false),
        Field::new("page_index", DataType::Int16, true),
        Field::new("paragraph_index", DataType::Int32, true),
        Field::new("block_id", DataType::Utf8, true),
        Field::new("file_path", DataType::Utf8, true),
    ]))
}

pub fn write_locators(path: &Path, rows: &mut [LocatorRow]) -> VeritasResult<()> {
    rows.sort_by(|a, b| a.evidence_addr.cmp(&b.evidence_addr));
    let schema = locators_schema();
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.evidence_addr.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.span_id.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.source_hash.as_str()),
            )),
            Arc::new(StringArray::from_iter_values(
                rows.iter().map(|r| r.kind.as_str()),
            )),
            Arc::new(Int16Array::from_iter(rows.iter().map(|r| r.page_index))),
            Arc::new(Int32Array::from_iter(
                rows.iter().map(|r| r.paragraph_index),
            )),
            Arc::new(StringArray::from_iter(
                rows.iter()
                    .map(|r| if r.block_id.is_empty() { None } else { Some(r.block_id.as_str()) }),
            )),
            Arc::new(StringArray::from_iter(rows.iter().map(|r| {
                if r.file_path.is_empty() {
                    None
                } else {
                    Some(r.file_path.as_str())
                }
            }))),
        ],
    )
    .map_err(|e| VeritasError::serialization(format!("building locators batch: {e}")))?;
    finish_single_batch(open_writer(path, schema)?, batch)
}

pub fn read_locators(path: &Path) -> VeritasResult<Vec<LocatorRow>> {
    let mut out = Vec::new();
    for batch in read_all_batches(path)? {
        let evidence_addr = str_col(&batch, 0)?;
        let span_id = str_col(&batch, 1)?;
        let source_hash = str_col(&batch, 2)?;
        let kind = str_col(&batch, 3)?;
        let page_index = batch
            .column(4)
            .as_any()
            .downcast_ref::<Int16Array>()
            .ok_or_else(|| VeritasError::serialization("locators.page_index: expected int16"))?;
        let paragraph_index = batch
            .column(5)
            .as_any()
            .downcast_ref::<Int32Array>()
            .ok_or_else(|| {
                VeritasError::serialization("locators.paragraph_index: expected int32")
            })?;
        let block_id = str_col(&batch, 6)?;
        let file_path = str_col(&batch, 7)?;
        for i in 0..batch.num_rows() {
            out.push(LocatorRow {
                evidence_addr: evidence_addr.value(i).to_string(),
                span_id: span_id.value(i).to_string(),
                source_hash: source_hash.value(i).to_string(),
                kind: kind.value(i).to_string(),
                page_index: (!page_index.is_null(i)).then(|| page_index.value(i)),
                paragraph_index: (!paragraph_index.is_null(i)).then(|| paragraph_index.value(i)),
                block_id: if block_id.is_null(i) {
                    String::new()
                } else {
                    block_id.value(i).to_string()
                },
                file_path: if file_path.is_null(i) {
                    String::new()
                } else {
                    file_path.value(i).to_string()
                },
            });
        }
    }
    Ok(out)
}

fn str_col(batch: &RecordBatch, idx: usize) -> VeritasResult<&StringArray> {
    batch
        .column(idx)
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| VeritasError::serialization(format!("column {idx}: expected utf8 string")))
}

fn i64_col(batch: &RecordBatch, idx: usize) -> VeritasResult<&Int64Array> {
    batch
        .column(idx)
        .as_any()
        .downcast_ref::<Int64Array>()
        .ok_or_else(|| VeritasError::serialization(format!("column {idx}: expected int64")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn entities_round_trip_sorted_by_primary_key() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("entities.parquet");
        let mut rows = vec![
            EntityRow {
                entity_id: "e_b".to_string(),
                namespace: "ns".to_string(),
                label: "B".to_string(),
                entity_type: "concept".to_string(),
            },
            EntityRow {
                entity_id: "e_a".to_string(),
                namespace: "ns".to_string(),
                label: "A".to_string(),
                entity_type: "concept".to_string(),
            },
        ];
        write_entities(&path, &mut rows).unwrap();
        let back = read_entities(&path).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back[0].entity_id, "e_a");
        assert_eq!(back[1].entity_id, "e_b");
    }

    #[test]
    fn claims_round_trip_preserves_object_type_and_tier() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("claims.parquet");
        let mut rows = vec![ClaimRow {
            claim_id: "c_1".to_string(),
            subject: "e_a".to_string(),
            predicate: "treats".to_string(),
            object: "e_b".to_string(),
            object_type: ObjectType::Entity,
            tier: 3,
        }];
        write_claims(&path, &mut rows).unwrap();
        let back = read_claims(&path).unwrap();
        assert_eq!(back[0].object_type, ObjectType::Entity);
        assert_eq!(back[0].tier, 3);
    }

    #[test]
    fn locators_round_trip_nullable_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("locators.parquet");
        let mut rows = vec![LocatorRow {
            evidence_addr: "ev_1".to_string(),
            span_id: "s_1".to_string(),
            source_hash: "h".to_string(),
            kind: "pdf".to_string(),
            page_index: Some(2),
            paragraph_index: None,
            block_id: String::new(),
            file_path: "doc.pdf".to_string(),
        }];
        write_locators(&path, &mut rows).unwrap();
        let back = read_locators(&path).unwrap();
        assert_eq!(back[0].page_index, Some(2));
        assert_eq!(back[0].paragraph_index, None);
        assert_eq!(back[0].block_id, "");
    }
}

//! Table and schema encoding using the arrow IPC stream format.
use std::io::Cursor;

use bytes::Bytes;
use datafusion::arrow::datatypes::{Schema, SchemaRef};
use datafusion::arrow::ipc::CompressionType;
use datafusion::arrow::ipc::reader::StreamReader;
use datafusion::arrow::ipc::writer::{IpcWriteOptions, StreamWriter};
use datafusion::arrow::record_batch::RecordBatch;

use crate::errors::Result;
use crate::table::Table;

fn write_options() -> Result<IpcWriteOptions> {
    Ok(IpcWriteOptions::default().try_with_compression(Some(CompressionType::LZ4_FRAME))?)
}

fn write_stream(schema: &Schema, batches: &[RecordBatch]) -> Result<Bytes> {
    let mut buf = Vec::new();
    let mut writer = StreamWriter::try_new_with_options(&mut buf, schema, write_options()?)?;
    for batch in batches {
        writer.write(batch)?;
    }
    writer.finish()?;
    drop(writer);

    Ok(Bytes::from(buf))
}

/// Encode a table as an LZ4 compressed IPC stream.
pub fn encode_table(table: &Table) -> Result<Bytes> {
    write_stream(table.schema(), table.batches())
}

/// Decode an IPC stream produced by [`encode_table`].
pub fn decode_table(buf: &[u8]) -> Result<Table> {
    let reader = StreamReader::try_new(Cursor::new(buf), None)?;
    let schema = reader.schema();
    let batches = reader.into_iter().collect::<Result<Vec<_>, _>>()?;
    Table::try_new(schema, batches)
}

/// Encode only the schema header.
pub fn encode_schema(schema: &Schema) -> Result<Bytes> {
    write_stream(schema, &[])
}

pub fn decode_schema(buf: &[u8]) -> Result<SchemaRef> {
    let reader = StreamReader::try_new(Cursor::new(buf), None)?;
    Ok(reader.schema())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::table::testutil::*;

    #[test]
    fn table_roundtrip_any_chunking() {
        let table = cost_table();
        for max_rows in [1, 3, 10] {
            let chunked = table.rechunk(max_rows).unwrap();
            let buf = encode_table(&chunked).unwrap();
            let got = decode_table(&buf).unwrap();
            assert_eq!(table, got, "max_rows: {max_rows}");
        }
    }

    #[test]
    fn empty_table_keeps_schema() {
        let table = Table::empty(cost_schema());
        let got = decode_table(&encode_table(&table).unwrap()).unwrap();
        assert_eq!(0, got.num_rows());
        assert_eq!(cost_schema(), *got.schema());
    }

    #[test]
    fn schema_with_metadata() {
        let schema = Schema::new_with_metadata(
            cost_schema().fields().clone(),
            HashMap::from([("origin".to_string(), "unit-test".to_string())]),
        );
        let got = decode_schema(&encode_schema(&schema).unwrap()).unwrap();
        assert_eq!(schema, *got);
    }

    #[test]
    fn decode_truncated() {
        let table = cost_table();
        let buf = encode_table(&table).unwrap();
        if let Ok(got) = decode_table(&buf[..buf.len() / 2]) {
            assert_ne!(table, got);
        }
        decode_schema(&[1, 2, 3]).unwrap_err();
    }
}

//! Arrow IPC streaming for matrix results
//!
//! Matrix batches map one-to-one onto Arrow record batches so results can
//! be handed to analytics tools (DuckDB, Polars, pyarrow, etc.) without a
//! row-by-row conversion.
//!
//! ## Schema
//!
//! ```text
//! from_idx: Int32      // source index
//! to_idx: Int32        // destination index
//! distance_m: Float64
//! duration_s: Float64
//! ```

use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int32Array};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::ipc::writer::StreamWriter;
use arrow::record_batch::RecordBatch;
use bytes::Bytes;

use super::{MatrixBatch, MatrixStream};

/// Content type for Arrow IPC stream
pub const ARROW_STREAM_CONTENT_TYPE: &str = "application/vnd.apache.arrow.stream";

/// Arrow schema for matrix rows
pub fn matrix_schema() -> Schema {
    Schema::new(vec![
        Field::new("from_idx", DataType::Int32, false),
        Field::new("to_idx", DataType::Int32, false),
        Field::new("distance_m", DataType::Float64, false),
        Field::new("duration_s", DataType::Float64, false),
    ])
}

/// Convert a matrix batch to an Arrow RecordBatch
pub fn to_record_batch(batch: &MatrixBatch) -> anyhow::Result<RecordBatch> {
    let schema = Arc::new(matrix_schema());

    let from: ArrayRef = Arc::new(Int32Array::from(batch.from_index.clone()));
    let to: ArrayRef = Arc::new(Int32Array::from(batch.to_index.clone()));
    let distance: ArrayRef = Arc::new(Float64Array::from(batch.distance_m.clone()));
    let duration: ArrayRef = Arc::new(Float64Array::from(batch.duration_s.clone()));

    Ok(RecordBatch::try_new(schema, vec![from, to, distance, duration])?)
}

/// Arrow IPC stream writer for matrix batches
pub struct ArrowMatrixWriter<W: std::io::Write> {
    writer: StreamWriter<W>,
    batches_written: usize,
    rows_written: usize,
}

impl<W: std::io::Write> ArrowMatrixWriter<W> {
    /// Create a writer and emit the schema
    pub fn new(inner: W) -> anyhow::Result<Self> {
        let schema: SchemaRef = Arc::new(matrix_schema());
        let writer = StreamWriter::try_new(inner, &schema)?;

        Ok(Self {
            writer,
            batches_written: 0,
            rows_written: 0,
        })
    }

    /// Write one batch. Empty batches are skipped.
    pub fn write_batch(&mut self, batch: &MatrixBatch) -> anyhow::Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        self.writer.write(&to_record_batch(batch)?)?;
        self.batches_written += 1;
        self.rows_written += batch.len();
        Ok(())
    }

    /// Drain a whole stream
    pub fn write_stream(&mut self, stream: MatrixStream) -> anyhow::Result<()> {
        for batch in stream {
            self.write_batch(&batch)?;
        }
        Ok(())
    }

    /// Finish writing and close the stream, returning (batches, rows)
    pub fn finish(mut self) -> anyhow::Result<(usize, usize)> {
        self.writer.finish()?;
        Ok((self.batches_written, self.rows_written))
    }

    pub fn stats(&self) -> (usize, usize) {
        (self.batches_written, self.rows_written)
    }
}

/// Serialize a single batch as a complete IPC stream
pub fn batch_to_bytes(batch: &MatrixBatch) -> anyhow::Result<Bytes> {
    let mut buf = Vec::new();
    {
        let mut writer = ArrowMatrixWriter::new(&mut buf)?;
        writer.write_batch(batch)?;
        writer.finish()?;
    }
    Ok(Bytes::from(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::ipc::reader::StreamReader;

    fn sample() -> MatrixBatch {
        MatrixBatch {
            from_index: vec![0, 0, 1],
            to_index: vec![0, 1, 1],
            distance_m: vec![10.0, 20.0, 30.0],
            duration_s: vec![1.0, 2.0, 3.0],
        }
    }

    #[test]
    fn test_record_batch_columns() {
        let batch = to_record_batch(&sample()).unwrap();
        assert_eq!(batch.num_rows(), 3);
        assert_eq!(batch.num_columns(), 4);
        assert_eq!(batch.schema().field(0).name(), "from_idx");
        assert_eq!(batch.schema().field(3).name(), "duration_s");

        let to = batch
            .column(1)
            .as_any()
            .downcast_ref::<Int32Array>()
            .unwrap();
        assert_eq!(to.value(2), 1);
    }

    #[test]
    fn test_ipc_stream_reads_back() {
        let bytes = batch_to_bytes(&sample()).unwrap();
        let reader = StreamReader::try_new(std::io::Cursor::new(bytes.to_vec()), None).unwrap();

        let batches: Vec<RecordBatch> = reader.map(|b| b.unwrap()).collect();
        assert_eq!(batches.len(), 1);
        let distance = batches[0]
            .column(2)
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert_eq!(distance.value(1), 20.0);
    }

    #[test]
    fn test_empty_batch_skipped() {
        let mut buf = Vec::new();
        let mut writer = ArrowMatrixWriter::new(&mut buf).unwrap();
        writer.write_batch(&MatrixBatch::default()).unwrap();
        assert_eq!(writer.finish().unwrap(), (0, 0));
        assert!(!buf.is_empty()); // schema still written
    }
}

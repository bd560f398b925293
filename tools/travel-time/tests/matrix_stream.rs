use std::io::{Cursor, Write};

use arrow::array::{Float64Array, Int32Array};
use arrow::ipc::reader::StreamReader;
use tempfile::NamedTempFile;
use travel_time::engine::mock::MockEngine;
use travel_time::engine::straight_line::StraightLineEngine;
use travel_time::matrix::arrow_stream::{ArrowMatrixWriter, ARROW_STREAM_CONTENT_TYPE};
use travel_time::{Error, Settings, TravelTime};

fn straight_line() -> (NamedTempFile, TravelTime<StraightLineEngine>) {
    let mut config = NamedTempFile::new().unwrap();
    write!(config, "{{}}").unwrap();

    let mut settings = Settings::default();
    settings.engine.config_path = Some(config.path().to_path_buf());
    settings.limits.matrix_batch_size = 4;
    let tt = TravelTime::start(StraightLineEngine, settings).unwrap();
    (config, tt)
}

#[test]
fn test_two_by_three_partial() {
    let engine = MockEngine::new();
    engine.omit_pair(1, 0);
    let tt = TravelTime::new(engine, Settings::default());
    tt.load_config(&[Some("a.json")]).unwrap();

    let stream = tt
        .matrix(
            vec![50.85, 51.22],
            vec![4.35, 4.40],
            vec![48.85, 50.63, 51.05],
            vec![2.35, 5.57, 3.72],
            "auto",
        )
        .unwrap();

    assert_eq!(stream.len(), 5);
    for entry in stream.entries() {
        assert!((0..2).contains(&entry.from_index));
        assert!((0..3).contains(&entry.to_index));
    }
    assert!(!stream
        .entries()
        .iter()
        .any(|e| e.from_index == 1 && e.to_index == 0));
}

#[test]
fn test_mismatched_lengths_rejected_before_engine() {
    let engine = MockEngine::new();
    let tt = TravelTime::new(engine.clone(), Settings::default());
    tt.load_config(&[Some("a.json")]).unwrap();
    engine.clear_calls();

    let err = tt
        .matrix(vec![1.0], vec![1.0], vec![1.0, 2.0], vec![1.0], "auto")
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert!(engine.calls().is_empty());
}

#[test]
fn test_straight_line_matrix_batches() {
    let (_config, tt) = straight_line();

    // 3 × 3 = 9 rows, batch size 4
    let stream = tt
        .matrix(
            vec![50.85, 51.22, 50.63],
            vec![4.35, 4.40, 5.57],
            vec![50.85, 48.85, 51.05],
            vec![4.35, 2.35, 3.72],
            "auto",
        )
        .unwrap();
    assert_eq!(stream.batch_size(), 4);

    let batches: Vec<_> = stream.collect();
    assert_eq!(
        batches.iter().map(|b| b.len()).collect::<Vec<_>>(),
        vec![4, 4, 1]
    );

    // Source 0 to destination 0 is the same point
    assert_eq!(batches[0].from_index[0], 0);
    assert_eq!(batches[0].to_index[0], 0);
    assert_eq!(batches[0].distance_m[0], 0.0);
    assert!(batches[0].duration_s[1] > 0.0);
}

#[test]
fn test_arrow_ipc_output() {
    let (_config, tt) = straight_line();
    let stream = tt
        .matrix(
            vec![50.85, 51.22],
            vec![4.35, 4.40],
            vec![48.85, 50.63, 51.05],
            vec![2.35, 5.57, 3.72],
            "bicycle",
        )
        .unwrap();

    let mut buf = Vec::new();
    let mut writer = ArrowMatrixWriter::new(&mut buf).unwrap();
    writer.write_stream(stream).unwrap();
    assert_eq!(writer.finish().unwrap(), (2, 6));
    assert_eq!(ARROW_STREAM_CONTENT_TYPE, "application/vnd.apache.arrow.stream");

    let reader = StreamReader::try_new(Cursor::new(buf), None).unwrap();
    let mut rows = 0;
    for batch in reader {
        let batch = batch.unwrap();
        let to = batch
            .column(1)
            .as_any()
            .downcast_ref::<Int32Array>()
            .unwrap();
        let duration = batch
            .column(3)
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        for i in 0..batch.num_rows() {
            assert!((0..3).contains(&to.value(i)));
            assert!(duration.value(i) > 0.0);
        }
        rows += batch.num_rows();
    }
    assert_eq!(rows, 6);
}

//! Integration tests for streaming Parquet reads.

use arrow::array::{AsArray, RecordBatch};
use arrow::datatypes::Int64Type;
use ironmat::error::ReadError;
use ironmat::testing::*;
use ironmat::{ColumnarReader, ReaderOptions};
use std::fs;

fn driver_ids(batches: &[RecordBatch]) -> Vec<i64> {
    batches
        .iter()
        .flat_map(|b| {
            b.column_by_name("driver_id")
                .expect("driver_id column")
                .as_primitive::<Int64Type>()
                .values()
                .to_vec()
        })
        .collect()
}

fn read_all(path: &str, batch_size: usize) -> anyhow::Result<Vec<RecordBatch>> {
    let reader = ColumnarReader::open(path, ReaderOptions { batch_size })?;
    Ok(reader.collect::<Result<Vec<_>, _>>()?)
}

#[test]
fn single_file_is_read_in_bounded_batches() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let path = dir.file_path("part-0.parquet");
    write_parquet_rows(&path, &driver_stats_rows(2500))?;

    let batches = read_all(&path.display().to_string(), 1000)?;
    let sizes: Vec<usize> = batches.iter().map(RecordBatch::num_rows).collect();
    assert_eq!(sizes, vec![1000, 1000, 500]);

    let expected: Vec<i64> = driver_stats_rows(2500).iter().map(|r| r.driver_id).collect();
    assert_eq!(driver_ids(&batches), expected);
    Ok(())
}

#[test]
fn directory_is_read_in_file_order_skipping_markers() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let dataset = dir.file_path("dataset");
    let rows = driver_stats_rows(30);
    let partitions = [rows[..10].to_vec(), rows[10..25].to_vec(), rows[25..].to_vec()];
    write_partitioned_dataset(&dataset, &partitions)?;
    fs::write(dataset.join("_SUCCESS"), b"")?;
    fs::write(dataset.join(".part-00000.parquet.crc"), b"crc")?;

    let reader = ColumnarReader::open(&dataset.display().to_string(), ReaderOptions::default())?;
    assert_eq!(reader.fragments().len(), 3);

    let batches = reader.collect::<Result<Vec<_>, _>>()?;
    let expected: Vec<i64> = rows.iter().map(|r| r.driver_id).collect();
    assert_eq!(driver_ids(&batches), expected);
    Ok(())
}

#[test]
fn glob_pattern_reads_matching_files_in_order() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let rows = driver_stats_rows(20);
    write_parquet_rows(dir.file_path("b.parquet"), &rows[10..])?;
    write_parquet_rows(dir.file_path("a.parquet"), &rows[..10])?;
    fs::write(dir.file_path("notes.txt"), b"not data")?;

    let pattern = format!("{}/*.parquet", dir.path().display());
    let batches = read_all(&pattern, 4)?;
    assert!(batches.iter().all(|b| b.num_rows() <= 4));

    let expected: Vec<i64> = rows.iter().map(|r| r.driver_id).collect();
    assert_eq!(driver_ids(&batches), expected);
    Ok(())
}

#[test]
fn file_uri_is_accepted() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let path = dir.file_path("part-0.parquet");
    write_parquet_rows(&path, &driver_stats_rows(5))?;

    let uri = format!("file://{}", path.display());
    let reader = ColumnarReader::open(&uri, ReaderOptions::default())?;
    assert_eq!(reader.source(), uri);
    assert_eq!(reader.fragments(), [path.clone()]);

    let batches = reader.collect::<Result<Vec<_>, _>>()?;
    assert_eq!(driver_ids(&batches).len(), 5);
    Ok(())
}

#[test]
fn missing_path_fails_to_open() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let missing = dir.path_string("does-not-exist.parquet");
    assert!(matches!(
        ColumnarReader::open(&missing, ReaderOptions::default()),
        Err(ReadError::Resolve { .. })
    ));
    Ok(())
}

#[test]
fn glob_without_matches_and_empty_directory_have_no_fragments() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let empty = dir.file_path("empty");
    fs::create_dir(&empty)?;

    assert!(matches!(
        ColumnarReader::open(&empty.display().to_string(), ReaderOptions::default()),
        Err(ReadError::NoFragments { .. })
    ));
    let pattern = format!("{}/*.parquet", dir.path().display());
    assert!(matches!(
        ColumnarReader::open(&pattern, ReaderOptions::default()),
        Err(ReadError::NoFragments { .. })
    ));
    Ok(())
}

#[test]
fn corrupt_file_fails_on_first_batch_and_ends_the_stream() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let path = dir.file_path("broken.parquet");
    fs::write(&path, b"definitely not parquet")?;

    let mut reader = ColumnarReader::open(&path.display().to_string(), ReaderOptions::default())?;
    assert!(matches!(reader.next(), Some(Err(ReadError::Parquet { .. }))));
    assert!(reader.next().is_none());
    Ok(())
}

#[test]
fn empty_file_yields_no_rows() -> anyhow::Result<()> {
    let dir = TempDirPath::new()?;
    let path = dir.file_path("empty.parquet");
    write_parquet_rows::<DriverStatsRow>(&path, &[])?;

    let batches = read_all(&path.display().to_string(), 10)?;
    assert_eq!(batches.iter().map(RecordBatch::num_rows).sum::<usize>(), 0);
    Ok(())
}

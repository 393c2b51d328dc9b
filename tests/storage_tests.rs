use chrono::NaiveDate;
use datafusion::arrow::array::Int32Array;
use datafusion::arrow::datatypes::{DataType, Field, Schema};
use datafusion::arrow::record_batch::RecordBatch;
use lakeloader::datafetch::MockExecutor;
use lakeloader::extract::{ExtractionEngine, FixedClock};
use lakeloader::plan::LoadPlan;
use lakeloader::storage::{FilesystemStorage, StorageGateway};
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn filesystem_put_writes_under_bucket_dir() {
    let temp = TempDir::new().unwrap();
    let storage = FilesystemStorage::new(temp.path().to_str().unwrap(), "raw");

    storage
        .put_object("sales/orders/latest/20240307.parquet", b"test data".to_vec(), "")
        .await
        .unwrap();

    let path = temp
        .path()
        .join("raw/sales/orders/latest/20240307.parquet");
    assert_eq!(std::fs::read(path).unwrap(), b"test data");
}

#[tokio::test]
async fn filesystem_put_replaces_existing_object() {
    let temp = TempDir::new().unwrap();
    let storage = FilesystemStorage::new(temp.path().to_str().unwrap(), "raw");
    let key = "sales/orders/latest/20240307.parquet";

    storage.put_object(key, b"first".to_vec(), "").await.unwrap();
    storage.put_object(key, b"second".to_vec(), "").await.unwrap();

    assert_eq!(std::fs::read(storage.root().join(key)).unwrap(), b"second");
    assert_eq!(storage.list_objects("sales/").await.unwrap().len(), 1);
}

#[tokio::test]
async fn filesystem_list_missing_prefix_is_empty() {
    let temp = TempDir::new().unwrap();
    let storage = FilesystemStorage::new(temp.path().to_str().unwrap(), "raw");

    assert!(storage.list_objects("sales/orders/latest/").await.unwrap().is_empty());
    assert!(!storage.has_objects("sales/orders/latest/").await.unwrap());
}

#[tokio::test]
async fn filesystem_list_does_not_cross_table_prefixes() {
    let temp = TempDir::new().unwrap();
    let storage = FilesystemStorage::new(temp.path().to_str().unwrap(), "raw");

    storage
        .put_object("sales/orders_archive/latest/20240307_0.parquet", vec![1], "")
        .await
        .unwrap();

    assert!(!storage.has_objects("sales/orders/latest/").await.unwrap());
}

#[tokio::test]
async fn filesystem_backs_a_full_run() {
    let temp = TempDir::new().unwrap();
    let storage = Arc::new(FilesystemStorage::new(temp.path().to_str().unwrap(), "raw"));

    let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int32, true)]));
    let batch =
        RecordBatch::try_new(schema, vec![Arc::new(Int32Array::from(vec![1, 2, 3]))]).unwrap();
    let executor = Arc::new(MockExecutor::new());
    executor.set_result("SELECT * FROM sales.regions", batch);

    let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
    let engine = ExtractionEngine::new(executor, storage.clone())
        .with_clock(Arc::new(FixedClock(date)))
        .with_chunk_size(2);
    engine
        .run(&[LoadPlan {
            object_path: "sales/regions/latest/".to_string(),
            table_query: "sales.regions".to_string(),
            incremental: false,
        }])
        .await
        .unwrap();

    assert_eq!(
        storage.list_objects("sales/regions/latest/").await.unwrap(),
        vec![
            "sales/regions/latest/20240307_0.parquet",
            "sales/regions/latest/20240307_1.parquet",
        ]
    );
    assert!(storage
        .root()
        .join("sales/regions/latest/20240307_1.parquet")
        .is_file());
}

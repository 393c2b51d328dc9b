//! S3 storage integration tests using MinIO via testcontainers.
//!
//! These tests automatically start a MinIO container, no manual setup required.
//!
//! Run these tests with: cargo test --test s3_storage_tests -- --ignored

use chrono::NaiveDate;
use datafusion::arrow::array::Int64Array;
use datafusion::arrow::datatypes::{DataType, Field, Schema};
use datafusion::arrow::record_batch::RecordBatch;
use lakeloader::datafetch::{MockExecutor, TableMetadata, PARQUET_CONTENT_TYPE};
use lakeloader::extract::{ExtractOptions, ExtractionEngine, FixedClock, TableLoadKind};
use lakeloader::storage::{S3Storage, StorageGateway};
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;
use testcontainers::{runners::AsyncRunner, ContainerAsync};
use testcontainers_modules::minio::MinIO;

/// MinIO default credentials
const MINIO_ROOT_USER: &str = "minioadmin";
const MINIO_ROOT_PASSWORD: &str = "minioadmin";
const MINIO_BUCKET: &str = "landing";
const MINIO_REGION: &str = "us-east-1";

/// Create a bucket in MinIO using the mc (MinIO Client) via Docker
async fn create_minio_bucket(endpoint: &str, bucket: &str) {
    // MC_HOST format: http(s)://<ACCESS_KEY>:<SECRET_KEY>@<HOST>:<PORT>
    let mc_host = format!(
        "http://{}:{}@{}",
        MINIO_ROOT_USER,
        MINIO_ROOT_PASSWORD,
        endpoint.trim_start_matches("http://")
    );

    let output = Command::new("docker")
        .args([
            "run",
            "--rm",
            "--network=host",
            "-e",
            &format!("MC_HOST_minio={}", mc_host),
            "minio/mc",
            "mb",
            "--ignore-existing",
            &format!("minio/{}", bucket),
        ])
        .output()
        .expect("Failed to run docker mc command - is Docker running?");

    if !output.status.success() {
        eprintln!(
            "Warning: mc mb command failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }

    // Give MinIO time to process
    tokio::time::sleep(Duration::from_millis(500)).await;
}

/// Test infrastructure that manages MinIO container lifecycle
struct MinioTestInfra {
    #[allow(dead_code)]
    minio: ContainerAsync<MinIO>,
    storage: Arc<S3Storage>,
}

impl MinioTestInfra {
    async fn start() -> Self {
        let minio = MinIO::default()
            .start()
            .await
            .expect("Failed to start MinIO");

        let minio_host_port = minio.get_host_port_ipv4(9000).await.unwrap();
        let minio_host = minio.get_host().await.unwrap();
        let minio_endpoint = format!("http://{}:{}", minio_host, minio_host_port);

        // Create the test bucket
        create_minio_bucket(&minio_endpoint, MINIO_BUCKET).await;

        let storage = S3Storage::new_with_endpoint(
            MINIO_BUCKET,
            &format!("{}:{}", minio_host, minio_host_port),
            MINIO_ROOT_USER,
            MINIO_ROOT_PASSWORD,
            MINIO_REGION,
            false,
        )
        .expect("Failed to create S3Storage");

        Self {
            minio,
            storage: Arc::new(storage),
        }
    }
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn s3_storage_put_and_list() {
    let infra = MinioTestInfra::start().await;
    let storage = &infra.storage;

    assert!(!storage.has_objects("sales/orders/latest/").await.unwrap());

    storage
        .put_object(
            "sales/orders/latest/20240307_0.parquet",
            b"test data".to_vec(),
            PARQUET_CONTENT_TYPE,
        )
        .await
        .unwrap();
    storage
        .put_object(
            "sales/orders_archive/latest/20240307_0.parquet",
            b"other".to_vec(),
            PARQUET_CONTENT_TYPE,
        )
        .await
        .unwrap();

    let keys = storage.list_objects("sales/orders/latest/").await.unwrap();
    assert_eq!(keys, vec!["sales/orders/latest/20240307_0.parquet"]);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn s3_storage_backs_incremental_runs() {
    let infra = MinioTestInfra::start().await;

    let schema = Arc::new(Schema::new(vec![Field::new("id", DataType::Int64, true)]));
    let batch = |n: i64| {
        RecordBatch::try_new(
            schema.clone(),
            vec![Arc::new(Int64Array::from((0..n).collect::<Vec<_>>()))],
        )
        .unwrap()
    };

    let executor = Arc::new(MockExecutor::new());
    executor.add_table(
        TableMetadata::new(None, "sales", "orders")
            .with_column("id", "bigint")
            .with_column("created_at", "timestamp")
            .with_column("updated_at", "timestamp")
            .with_column("deleted_at", "timestamp"),
    );
    executor.set_result("SELECT * FROM sales.orders", batch(5));
    executor.set_result(
        "SELECT * FROM sales.orders WHERE updated_at >= '2024-03-08'",
        batch(1),
    );

    let engine = |d: u32| {
        let today = NaiveDate::from_ymd_opt(2024, 3, d).unwrap();
        ExtractionEngine::new(executor.clone(), infra.storage.clone())
            .with_clock(Arc::new(FixedClock(today)))
    };

    let first = engine(7).extract(&ExtractOptions::default()).await.unwrap();
    assert_eq!(first.tables[0].kind, TableLoadKind::FullFallback);

    let second = engine(8).extract(&ExtractOptions::default()).await.unwrap();
    assert_eq!(second.tables[0].kind, TableLoadKind::Incremental);

    let mut keys = infra
        .storage
        .list_objects("sales/orders/latest/")
        .await
        .unwrap();
    keys.sort();
    assert_eq!(
        keys,
        vec![
            "sales/orders/latest/20240307_0.parquet",
            "sales/orders/latest/20240308.parquet",
        ]
    );
}

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use super::clock::{Clock, SystemClock};
use super::full::FullLoader;
use super::incremental::IncrementalLoader;
use super::{RunReport, FULL_LOAD_CHUNK_SIZE};
use crate::datafetch::QueryExecutor;
use crate::plan::{classify, group_by_schema, plan_all, LoadMode, LoadPlan};
use crate::storage::StorageGateway;

/// What to extract in a run.
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Restrict discovery to one schema (MySQL: database).
    pub schema_filter: Option<String>,
    /// Prefix object paths with the database name when the driver reports one.
    pub include_database_in_path: bool,
}

/// Orchestrates a run: discover -> classify -> plan -> load each table in turn.
#[derive(Debug)]
pub struct ExtractionEngine {
    executor: Arc<dyn QueryExecutor>,
    storage: Arc<dyn StorageGateway>,
    clock: Arc<dyn Clock>,
    chunk_size: usize,
}

impl ExtractionEngine {
    pub fn new(executor: Arc<dyn QueryExecutor>, storage: Arc<dyn StorageGateway>) -> Self {
        Self {
            executor,
            storage,
            clock: Arc::new(SystemClock),
            chunk_size: FULL_LOAD_CHUNK_SIZE,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Override the full-load chunk size. Values below 1 are treated as 1.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn full_loader(&self) -> FullLoader {
        FullLoader::new(
            self.executor.clone(),
            self.storage.clone(),
            self.clock.clone(),
            self.chunk_size,
        )
    }

    pub fn incremental_loader(&self) -> IncrementalLoader {
        IncrementalLoader::new(
            self.executor.clone(),
            self.storage.clone(),
            self.clock.clone(),
            self.full_loader(),
        )
    }

    /// Discover, classify and plan every table without loading anything.
    #[tracing::instrument(
        name = "plan",
        skip(self, options),
        fields(
            lakeloader.schema_filter = ?options.schema_filter,
            lakeloader.tables = tracing::field::Empty,
        )
    )]
    pub async fn plan(&self, options: &ExtractOptions) -> Result<Vec<LoadPlan>> {
        let tables = self
            .executor
            .discover_tables(options.schema_filter.as_deref())
            .await
            .context("Failed to discover source tables")?;

        let groups = group_by_schema(tables, options.include_database_in_path);
        let plans = plan_all(&classify(groups));

        tracing::Span::current().record("lakeloader.tables", plans.len());
        info!("Planned {} tables", plans.len());
        Ok(plans)
    }

    /// Load each plan in order. The first failure aborts the run.
    #[tracing::instrument(
        name = "run",
        skip(self, plans),
        fields(
            lakeloader.bucket = %self.storage.bucket(),
            lakeloader.plans = plans.len(),
        )
    )]
    pub async fn run(&self, plans: &[LoadPlan]) -> Result<RunReport> {
        let full = self.full_loader();
        let incremental = self.incremental_loader();
        let mut report = RunReport::default();

        for plan in plans {
            info!(table = %plan.table_query, mode = %plan.mode(), "Loading table");
            let load = match plan.mode() {
                LoadMode::Incremental => {
                    incremental
                        .load_incremental(&plan.object_path, &plan.table_query)
                        .await?
                }
                LoadMode::Full => full.load_all(&plan.object_path, &plan.table_query).await?,
            };
            report.tables.push(load);
        }

        info!(
            tables = report.tables.len(),
            objects = report.object_count(),
            rows = report.row_count(),
            "Run complete"
        );
        Ok(report)
    }

    /// Plan and run in one step.
    pub async fn extract(&self, options: &ExtractOptions) -> Result<RunReport> {
        let plans = self.plan(options).await?;
        self.run(&plans).await
    }
}

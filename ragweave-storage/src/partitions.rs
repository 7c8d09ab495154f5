//! Partition management
//!
//! Collections may be partitioned by user, year-month, or language.
//! Partition-scoped searches eliminate rows outside the target partitions
//! before ANN probing; date-range searches fan a query across the month
//! partitions in the range.

use chrono::{Datelike, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use ragweave_core::error::{RagError, Result};

use crate::store::VectorStore;
use crate::types::{FilterExpr, PartitionStats, ScoredRow};

/// Partition name for a user
#[must_use]
pub fn user_partition(user_id: &str) -> String {
    format!("user_{user_id}")
}

/// Partition name for a year-month
#[must_use]
pub fn date_partition(year: i32, month: u32) -> String {
    format!("date_{year}_{month:02}")
}

/// Partition name for a language code
#[must_use]
pub fn language_partition(language: &str) -> String {
    format!("lang_{language}")
}

/// Inclusive list of year-months between two bounds
#[must_use]
pub fn months_in_range(start: (i32, u32), end: (i32, u32)) -> Vec<(i32, u32)> {
    let (mut year, mut month) = start;
    let mut months = Vec::new();
    while (year, month) <= end {
        months.push((year, month));
        month += 1;
        if month > 12 {
            month = 1;
            year += 1;
        }
    }
    months
}

impl VectorStore {
    /// Create a user partition; returns its name
    pub async fn create_user_partition(
        &self,
        user_id: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let name = user_partition(user_id);
        self.create_named_partition(&name, cancel).await?;
        Ok(name)
    }

    /// Create a year-month partition; returns its name
    pub async fn create_date_partition(
        &self,
        year: i32,
        month: u32,
        cancel: &CancellationToken,
    ) -> Result<String> {
        if !(1..=12).contains(&month) {
            return Err(RagError::invalid_argument(format!(
                "month must be in 1..=12, got {month}"
            )));
        }
        let name = date_partition(year, month);
        self.create_named_partition(&name, cancel).await?;
        Ok(name)
    }

    /// Create a language partition; returns its name
    pub async fn create_language_partition(
        &self,
        language: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let name = language_partition(language);
        self.create_named_partition(&name, cancel).await?;
        Ok(name)
    }

    async fn create_named_partition(&self, name: &str, cancel: &CancellationToken) -> Result<()> {
        let client = self.pool().checkout(cancel).await?;
        client.create_partition(self.collection(), name).await?;
        debug!(partition = name, collection = self.collection(), "partition ready");
        Ok(())
    }

    /// Search restricted to one partition
    pub async fn search_in_partition(
        &self,
        embedding: &[f32],
        partition: &str,
        top_k: usize,
        query_complexity: f32,
        filter: Option<&FilterExpr>,
        cancel: &CancellationToken,
    ) -> Result<Vec<ScoredRow>> {
        self.search(
            embedding,
            top_k,
            query_complexity,
            filter,
            &[partition.to_string()],
            cancel,
        )
        .await
    }

    /// Search across the month partitions in an inclusive range
    ///
    /// Partitions that do not exist yet are simply absent from the target
    /// set; the search covers whatever months have data.
    pub async fn search_in_date_range(
        &self,
        embedding: &[f32],
        start: (i32, u32),
        end: (i32, u32),
        top_k: usize,
        query_complexity: f32,
        cancel: &CancellationToken,
    ) -> Result<Vec<ScoredRow>> {
        if start > end {
            return Err(RagError::invalid_argument(
                "date range start must not be after end",
            ));
        }
        let partitions: Vec<String> = months_in_range(start, end)
            .into_iter()
            .map(|(y, m)| date_partition(y, m))
            .collect();
        debug!(
            partitions = partitions.len(),
            "date-range search across month partitions"
        );
        self.search(embedding, top_k, query_complexity, None, &partitions, cancel)
            .await
    }

    /// List partitions of this store's collection
    pub async fn list_partitions(&self, cancel: &CancellationToken) -> Result<Vec<String>> {
        let client = self.pool().checkout(cancel).await?;
        client.list_partitions(self.collection()).await
    }

    /// Per-partition entity counts
    pub async fn partition_stats(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<PartitionStats>> {
        let client = self.pool().checkout(cancel).await?;
        client.partition_stats(self.collection()).await
    }

    /// Drop date partitions older than `months` months; returns how many
    /// partitions were removed
    pub async fn cleanup_old_partitions(
        &self,
        months: u32,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        let now = Utc::now();
        let mut cutoff_year = now.year();
        let mut cutoff_month = now.month() as i64 - i64::from(months);
        while cutoff_month < 1 {
            cutoff_month += 12;
            cutoff_year -= 1;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let cutoff = (cutoff_year, cutoff_month as u32);

        let client = self.pool().checkout(cancel).await?;
        let partitions = client.list_partitions(self.collection()).await?;
        let mut dropped = 0;
        for partition in partitions {
            let Some(year_month) = parse_date_partition(&partition) else {
                continue;
            };
            if year_month < cutoff {
                let rows = client.drop_partition(self.collection(), &partition).await?;
                info!(partition, rows, "dropped expired date partition");
                dropped += 1;
            }
        }
        Ok(dropped)
    }
}

/// Parse `date_YYYY_MM` back into a year-month
fn parse_date_partition(name: &str) -> Option<(i32, u32)> {
    let rest = name.strip_prefix("date_")?;
    let (year, month) = rest.split_once('_')?;
    Some((year.parse().ok()?, month.parse().ok()?))
}

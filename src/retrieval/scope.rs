//! Scope resolution: data source × memory scope → partition filter.
//!
//! The resulting [`PartitionFilter`] is handed unchanged to both fetchers so
//! vector and lexical candidates always come from the same partitions.

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::error::RetrievalError;
use crate::retrieval::types::{DataSource, MemoryRecord, MemoryScope, Partition};

/// Partition restriction applied at the index boundary, before any fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionFilter {
    pub data_source: DataSource,
    /// Non-empty, sorted, without duplicates.
    pub partitions: Vec<Partition>,
    /// Constrains rows of the personal partition.
    pub user_id: Option<String>,
    /// Constrains rows of the group partition.
    pub group_id: Option<String>,
    /// Lower bound on record timestamps (inclusive).
    pub since: DateTime<Utc>,
}

impl PartitionFilter {
    pub fn includes(&self, partition: Partition) -> bool {
        self.partitions.contains(&partition)
    }

    /// Whether `record` lies inside this filter.
    ///
    /// Index implementations that cannot push the filter into a query can use
    /// this to post-filter; SQL backends express the same predicate directly.
    pub fn admits(&self, record: &MemoryRecord) -> bool {
        if record.data_source != self.data_source
            || !self.includes(record.partition)
            || record.timestamp < self.since
        {
            return false;
        }
        let (constraint, owner) = match record.partition {
            Partition::Personal => (&self.user_id, &record.user_id),
            Partition::Group => (&self.group_id, &record.group_id),
        };
        match constraint {
            Some(wanted) => owner.as_deref() == Some(wanted.as_str()),
            None => true,
        }
    }
}

/// Resolve a data source and memory scope into a [`PartitionFilter`].
///
/// `time_range_days` must already be validated as positive.
pub fn resolve(
    data_source: &str,
    memory_scope: &str,
    user_id: Option<&str>,
    group_id: Option<&str>,
    time_range_days: u32,
    now: DateTime<Utc>,
) -> Result<PartitionFilter, RetrievalError> {
    let data_source: DataSource = data_source.parse().map_err(RetrievalError::Configuration)?;
    let memory_scope: MemoryScope =
        memory_scope.parse().map_err(RetrievalError::Configuration)?;

    let partitions = match memory_scope {
        MemoryScope::All => vec![Partition::Personal, Partition::Group],
        MemoryScope::Personal => vec![Partition::Personal],
        MemoryScope::Group => vec![Partition::Group],
    };

    Ok(PartitionFilter {
        data_source,
        partitions,
        user_id: non_blank(user_id),
        group_id: non_blank(group_id),
        since: lower_bound(now, time_range_days),
    })
}

/// `now - days`, floored at the start of year 1 so huge ranges stay representable.
fn lower_bound(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    let floor = NaiveDate::from_ymd_opt(1, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    now.checked_sub_signed(Duration::days(i64::from(days)))
        .map_or(floor, |since| since.max(floor))
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

//! Cross-source validation
//!
//! Reports only. Nothing here changes a merged value.

use super::consensus::WaitSample;
use crate::types::OperatingHours;
use chrono::Duration;
use parkfan_common::time::within_window;
use tracing::warn;

/// Wait times for one entity that disagree beyond the threshold
#[derive(Debug, Clone, PartialEq)]
pub struct WaitDiscrepancy {
    pub entity_name: String,
    pub spread_minutes: u32,
    /// (source, wait) for every sample inside the comparison window
    pub values: Vec<(String, u32)>,
}

/// Operating hours of a lower-priority source that differ from the kept ones
#[derive(Debug, Clone, PartialEq)]
pub struct HoursDiscrepancy {
    pub kept_source: String,
    pub other_source: String,
    pub kept: OperatingHours,
    pub other: OperatingHours,
}

/// Check one entity's samples for a wait-time spread above `threshold_minutes`
///
/// Only samples observed within `window` of the newest sample are compared.
pub fn check_wait_times(
    entity_name: &str,
    samples: &[WaitSample],
    window: Duration,
    threshold_minutes: u32,
) -> Option<WaitDiscrepancy> {
    let newest = samples.iter().map(|s| s.observed_at).max()?;
    let recent: Vec<&WaitSample> = samples
        .iter()
        .filter(|s| within_window(newest, s.observed_at, window))
        .collect();
    if recent.len() < 2 {
        return None;
    }

    let min = recent.iter().map(|s| s.wait_time).min()?;
    let max = recent.iter().map(|s| s.wait_time).max()?;
    let spread = max - min;
    if spread <= threshold_minutes {
        return None;
    }

    let values: Vec<(String, u32)> = recent
        .iter()
        .map(|s| (s.source.clone(), s.wait_time))
        .collect();
    warn!(
        entity = entity_name,
        spread_minutes = spread,
        values = ?values,
        "Wait-time discrepancy across sources"
    );

    Some(WaitDiscrepancy {
        entity_name: entity_name.to_string(),
        spread_minutes: spread,
        values,
    })
}

/// Compare the first entry of two hours lists
pub fn check_hours(
    kept_source: &str,
    kept: &[OperatingHours],
    other_source: &str,
    other: &[OperatingHours],
) -> Option<HoursDiscrepancy> {
    let (first_kept, first_other) = (kept.first()?, other.first()?);
    if first_kept.opening_time == first_other.opening_time
        && first_kept.closing_time == first_other.closing_time
    {
        return None;
    }

    warn!(
        kept_source,
        other_source,
        kept_open = %first_kept.opening_time,
        kept_close = %first_kept.closing_time,
        other_open = %first_other.opening_time,
        other_close = %first_other.closing_time,
        "Operating hours differ between sources, keeping higher priority"
    );

    Some(HoursDiscrepancy {
        kept_source: kept_source.to_string(),
        other_source: other_source.to_string(),
        kept: first_kept.clone(),
        other: first_other.clone(),
    })
}

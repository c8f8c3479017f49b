use std::{collections::BTreeMap, time::Duration};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Outcome of a single named, bounded-duration probe.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthCheck {
    pub name: String,
    #[serde(rename = "type")]
    pub check_type: String,
    pub healthy: bool,
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub last_run: OffsetDateTime,
    pub duration: Duration,
    #[serde(default)]
    pub details: BTreeMap<String, String>,
}

impl HealthCheck {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        check_type: impl Into<String>,
        healthy: bool,
        message: impl Into<String>,
        duration: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            check_type: check_type.into(),
            healthy,
            message: message.into(),
            last_run: OffsetDateTime::now_utc(),
            duration,
            details: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

/// Measure the wall-clock duration of an async probe body.
pub async fn timed<T, F>(probe: F) -> (T, Duration)
where
    F: std::future::Future<Output = T>,
{
    let started = std::time::Instant::now();
    let value = probe.await;
    (value, started.elapsed())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn details_are_attached_in_order() {
        let check = HealthCheck::new("pods", "kubernetes", true, "ok", Duration::from_millis(12))
            .with_detail("namespace", "kube-system")
            .with_detail("pods", "3");
        assert_eq!(check.details.len(), 2);
        assert_eq!(check.details["namespace"], "kube-system");
    }
}

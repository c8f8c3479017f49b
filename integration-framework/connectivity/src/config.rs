use std::{fmt, str::FromStr};

use integration_framework_core::ComponentState;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

/// Connectivity mechanisms the plane can install.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityKind {
    Kubernetes,
    Istio,
    Linkerd,
    Manual,
}

impl ConnectivityKind {
    /// Tag used in the `connectivity-type` label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Kubernetes => "kubernetes",
            Self::Istio => "istio",
            Self::Linkerd => "linkerd",
            Self::Manual => "manual",
        }
    }

    #[must_use]
    pub const fn all() -> [Self; 4] {
        [Self::Kubernetes, Self::Istio, Self::Linkerd, Self::Manual]
    }
}

impl fmt::Display for ConnectivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectivityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kubernetes" => Ok(Self::Kubernetes),
            "istio" => Ok(Self::Istio),
            "linkerd" => Ok(Self::Linkerd),
            "manual" => Ok(Self::Manual),
            other => Err(format!("unknown connectivity kind `{other}`")),
        }
    }
}

/// Point-in-time state of one connectivity installation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectivityStatus {
    #[serde(rename = "type")]
    pub provider_type: ConnectivityKind,
    pub state: ComponentState,
    pub healthy: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub policies: u32,
    pub services: u32,
    pub endpoints: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConnectivityStatus {
    #[must_use]
    pub fn not_configured(provider_type: ConnectivityKind) -> Self {
        Self {
            provider_type,
            state: ComponentState::NotConfigured,
            healthy: false,
            timestamp: OffsetDateTime::now_utc(),
            policies: 0,
            services: 0,
            endpoints: 0,
            error: None,
        }
    }
}

/// Named bundle of a connectivity kind, defaults, and a description.
#[derive(Clone, Debug)]
pub struct ConnectivityTemplate {
    pub kind: ConnectivityKind,
    pub description: String,
    pub config: Value,
}

/// Shallow merge with recursive descent into nested maps; overrides win on
/// every non-map leaf.
#[must_use]
pub fn merge_config(base: &Value, overrides: &Value) -> Value {
    match (base, overrides) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged = base_map.clone();
            for (key, override_value) in override_map {
                let entry = match merged.get(key) {
                    Some(base_value) => merge_config(base_value, override_value),
                    None => override_value.clone(),
                };
                merged.insert(key.clone(), entry);
            }
            Value::Object(merged)
        }
        (_, overriding) => overriding.clone(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn merge_descends_into_nested_maps() {
        let base = json!({
            "allowCidrs": ["10.0.0.0/8"],
            "dns": { "nameservers": ["10.96.0.10"], "ttl": 30 }
        });
        let overrides = json!({
            "dns": { "ttl": 5 },
            "enableNetworkPolicies": false
        });

        let merged = merge_config(&base, &overrides);
        assert_eq!(merged["allowCidrs"][0], "10.0.0.0/8");
        assert_eq!(merged["dns"]["nameservers"][0], "10.96.0.10");
        assert_eq!(merged["dns"]["ttl"], 5);
        assert_eq!(merged["enableNetworkPolicies"], false);
    }

    #[test]
    fn merge_replaces_non_map_leaves_wholesale() {
        let base = json!({ "allowCidrs": ["10.0.0.0/8", "192.168.0.0/16"] });
        let overrides = json!({ "allowCidrs": ["172.16.0.0/12"] });
        let merged = merge_config(&base, &overrides);
        assert_eq!(merged["allowCidrs"], json!(["172.16.0.0/12"]));
    }

    #[test]
    fn kind_tags_round_trip() {
        for kind in ConnectivityKind::all() {
            assert_eq!(kind.as_str().parse::<ConnectivityKind>(), Ok(kind));
        }
    }
}

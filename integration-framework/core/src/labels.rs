use std::collections::BTreeMap;

use integration_framework_config::constants::{
    CONNECTIVITY_PLANE_LABEL, CONNECTIVITY_TYPE_LABEL, DISCOVERY_PLANE_LABEL, DISCOVERY_TYPE_LABEL,
    MANAGED_BY_LABEL, MANAGED_BY_VALUE,
};

/// Label set stamped on every connectivity-plane resource.
#[must_use]
pub fn connectivity_labels(provider_type: &str) -> BTreeMap<String, String> {
    let mut labels = managed_by_labels();
    labels.insert(CONNECTIVITY_PLANE_LABEL.to_owned(), "true".to_owned());
    labels.insert(CONNECTIVITY_TYPE_LABEL.to_owned(), provider_type.to_owned());
    labels
}

/// Label set stamped on every service-discovery resource.
#[must_use]
pub fn discovery_labels(provider_type: &str) -> BTreeMap<String, String> {
    let mut labels = managed_by_labels();
    labels.insert(DISCOVERY_PLANE_LABEL.to_owned(), "true".to_owned());
    labels.insert(DISCOVERY_TYPE_LABEL.to_owned(), provider_type.to_owned());
    labels
}

/// Selector matching exactly the connectivity resources of one provider.
#[must_use]
pub fn connectivity_selector(provider_type: &str) -> String {
    format!(
        "{MANAGED_BY_LABEL}={MANAGED_BY_VALUE},{CONNECTIVITY_PLANE_LABEL}=true,{CONNECTIVITY_TYPE_LABEL}={provider_type}"
    )
}

/// Selector matching exactly the discovery resources of one provider.
#[must_use]
pub fn discovery_selector(provider_type: &str) -> String {
    format!(
        "{MANAGED_BY_LABEL}={MANAGED_BY_VALUE},{DISCOVERY_PLANE_LABEL}=true,{DISCOVERY_TYPE_LABEL}={provider_type}"
    )
}

fn managed_by_labels() -> BTreeMap<String, String> {
    BTreeMap::from([(MANAGED_BY_LABEL.to_owned(), MANAGED_BY_VALUE.to_owned())])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connectivity_labels_carry_the_full_set() {
        let labels = connectivity_labels("istio");
        assert_eq!(labels[MANAGED_BY_LABEL], MANAGED_BY_VALUE);
        assert_eq!(labels[CONNECTIVITY_PLANE_LABEL], "true");
        assert_eq!(labels[CONNECTIVITY_TYPE_LABEL], "istio");
    }

    #[test]
    fn selectors_pin_all_three_labels() {
        let selector = discovery_selector("dns");
        assert!(selector.contains("app.kubernetes.io/managed-by=kiali-integration-framework"));
        assert!(selector.contains("service-discovery=true"));
        assert!(selector.contains("discovery-type=dns"));
    }
}

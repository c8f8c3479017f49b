use serde::Deserialize;
use tracing::debug;

/// Host/component states as reported by `minikube status -o json`.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct ProfileStatus {
    #[serde(default, rename = "Name")]
    pub name: String,
    #[serde(default, rename = "Host")]
    pub host: String,
    #[serde(default, rename = "Kubelet")]
    pub kubelet: String,
    #[serde(default, rename = "APIServer")]
    pub api_server: String,
    #[serde(default, rename = "Kubeconfig")]
    pub kubeconfig: String,
}

/// Shape of `minikube profile list -o json`.
#[derive(Debug, Deserialize)]
pub struct ProfileList {
    #[serde(default)]
    pub valid: Vec<ProfileEntry>,
    #[serde(default)]
    pub invalid: Vec<ProfileEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ProfileEntry {
    #[serde(rename = "Name")]
    pub name: String,
}

impl ProfileList {
    pub fn contains(&self, name: &str) -> bool {
        self.valid
            .iter()
            .chain(self.invalid.iter())
            .any(|profile| profile.name == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.valid
            .iter()
            .chain(self.invalid.iter())
            .map(|profile| profile.name.clone())
            .collect()
    }
}

/// Coarse host state after both parsing strategies ran.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostState {
    Running,
    Stopped,
    Unknown,
}

/// Distilled result of a status interrogation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedStatus {
    pub host: HostState,
    /// False when the node agent or API server sub-status is not `Running`.
    pub components_running: bool,
}

/// Parse the status blob: strict JSON first, permissive text fallback.
///
/// Parse errors never escape this function; the worst case is
/// `Unknown`/components-down, which callers map to an unhealthy status.
pub fn parse_status(raw: &str) -> ParsedStatus {
    match parse_status_strict(raw) {
        Ok(parsed) => parsed,
        Err(err) => {
            debug!(error = %err, "strict status parse failed; falling back to text scan");
            parse_status_lenient(raw)
        }
    }
}

fn parse_status_strict(raw: &str) -> Result<ParsedStatus, serde_json::Error> {
    // Multi-node profiles report an array; single-node profiles an object.
    let statuses: Vec<ProfileStatus> = if raw.trim_start().starts_with('[') {
        serde_json::from_str(raw)?
    } else {
        vec![serde_json::from_str(raw)?]
    };

    let first = statuses.first();
    let host = match first.map(|status| status.host.as_str()) {
        Some("Running") => HostState::Running,
        Some("Stopped") => HostState::Stopped,
        _ => HostState::Unknown,
    };

    let components_running = statuses.iter().all(|status| {
        component_ok(&status.kubelet) && component_ok(&status.api_server)
    });

    Ok(ParsedStatus {
        host,
        components_running,
    })
}

// Worker nodes report an empty API server field; only an explicit non-running
// value counts against health.
fn component_ok(value: &str) -> bool {
    value.is_empty() || value == "Running" || value == "Configured"
}

fn parse_status_lenient(raw: &str) -> ParsedStatus {
    let host = if raw.contains("Running") {
        HostState::Running
    } else if raw.contains("Stopped") {
        HostState::Stopped
    } else {
        HostState::Unknown
    };

    ParsedStatus {
        host,
        components_running: matches!(host, HostState::Running),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RUNNING: &str = r#"{"Name":"t1","Host":"Running","Kubelet":"Running","APIServer":"Running","Kubeconfig":"Configured"}"#;

    #[test]
    fn strict_path_maps_running_profile() {
        let parsed = parse_status(RUNNING);
        assert_eq!(parsed.host, HostState::Running);
        assert!(parsed.components_running);
    }

    #[test]
    fn stopped_components_mark_the_profile_down() {
        let raw = r#"{"Name":"t1","Host":"Running","Kubelet":"Stopped","APIServer":"Running","Kubeconfig":"Configured"}"#;
        let parsed = parse_status(raw);
        assert_eq!(parsed.host, HostState::Running);
        assert!(!parsed.components_running);
    }

    #[test]
    fn multi_node_array_is_accepted() {
        let raw = r#"[
            {"Name":"t1","Host":"Running","Kubelet":"Running","APIServer":"Running","Kubeconfig":"Configured"},
            {"Name":"t1-m02","Host":"Running","Kubelet":"Running","APIServer":"","Kubeconfig":""}
        ]"#;
        let parsed = parse_status(raw);
        assert_eq!(parsed.host, HostState::Running);
        assert!(parsed.components_running);
    }

    #[test]
    fn malformed_json_falls_back_to_text_scan() {
        let parsed = parse_status("host: Running, kubelet fine");
        assert_eq!(parsed.host, HostState::Running);

        let parsed = parse_status("profile is Stopped");
        assert_eq!(parsed.host, HostState::Stopped);
    }

    #[test]
    fn garbage_never_errors() {
        let parsed = parse_status("%%% not a status at all %%%");
        assert_eq!(parsed.host, HostState::Unknown);
        assert!(!parsed.components_running);
    }

    #[test]
    fn profile_list_membership() {
        let raw = r#"{"invalid":[{"Name":"broken"}],"valid":[{"Name":"t1"},{"Name":"t2"}]}"#;
        let list: ProfileList = serde_json::from_str(raw).unwrap();
        assert!(list.contains("t1"));
        assert!(list.contains("broken"));
        assert!(!list.contains("t3"));
        assert_eq!(list.names().len(), 3);
    }
}

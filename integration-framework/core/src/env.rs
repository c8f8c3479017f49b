use std::{env, path::PathBuf};

#[must_use]
pub fn kubeconfig() -> Option<String> {
    env::var("KUBECONFIG").ok().filter(|value| !value.is_empty())
}

#[must_use]
pub fn home_dir() -> Option<PathBuf> {
    env::var("HOME")
        .ok()
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

/// Dump provider tool output at debug level when set.
#[must_use]
pub fn debug_commands() -> bool {
    env::var("ITF_DEBUG_COMMANDS").is_ok()
}

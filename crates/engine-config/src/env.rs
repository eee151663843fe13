use std::collections::HashMap;

/// Snapshot of environment variables consulted for setting overrides.
#[derive(Debug, Clone)]
pub struct EnvContext {
    vars: HashMap<String, String>,
}

impl EnvContext {
    /// Captures the process environment.
    pub fn new() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }
}

impl Default for EnvContext {
    fn default() -> Self {
        Self::new()
    }
}

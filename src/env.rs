//! Environment variable access that tests can replace.
//!
//! [`Env::real()`] reads the process environment. [`Env::mock()`] serves
//! values from a map, so config tests never touch `std::env::set_var`
//! (which is `unsafe` in edition 2024).

use std::collections::HashMap;

/// Environment variable reader.
#[derive(Clone, Debug, Default)]
pub struct Env {
    overrides: Option<HashMap<String, String>>,
}

impl Env {
    /// Read from the real process environment.
    pub fn real() -> Self {
        Self { overrides: None }
    }

    /// Serve lookups from the given key-value pairs only.
    pub fn mock(vars: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>) -> Self {
        Self {
            overrides: Some(
                vars.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    /// Look up a variable. Empty values count as unset.
    pub fn get(&self, name: &str) -> Option<String> {
        let value = match &self.overrides {
            Some(map) => map.get(name).cloned(),
            None => std::env::var(name).ok(),
        }?;
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    }

    /// Look up the first variable that is set among `names`.
    pub fn first_of(&self, names: &[&str]) -> Option<String> {
        names.iter().find_map(|name| self.get(name))
    }

    /// Parse a variable with [`std::str::FromStr`].
    ///
    /// Returns `None` when unset; a value that fails to parse is reported
    /// through `Err` with the raw text so callers can warn about it.
    pub fn parse<T: std::str::FromStr>(&self, name: &str) -> Option<Result<T, String>> {
        self.get(name)
            .map(|raw| raw.trim().parse::<T>().map_err(|_| raw))
    }
}

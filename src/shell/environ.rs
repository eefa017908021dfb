//! Conversions between `KEY=VALUE` environment lists and maps, and scoped
//! overrides of the current process environment.

use std::{
    collections::{HashMap, HashSet},
    ffi::{OsStr, OsString},
};

/// Converts an OS-style environment list to a map.
///
/// Entries without `=` or with an empty key are skipped. When
/// `filter_prefix` is not empty, only keys starting with it are kept, prefix
/// included. Only the first `=` separates key from value.
///
/// # Examples
///
/// ```rust
/// use tcrm_shell::shell::environ::unmarshal_environ;
///
/// let env = unmarshal_environ(["APP_K1=v1", "APP_K2=v2=x", "K3=v3"], "APP_");
/// assert_eq!(env.len(), 2);
/// assert_eq!(env["APP_K2"], "v2=x");
/// ```
pub fn unmarshal_environ<I, S>(environ: I, filter_prefix: &str) -> HashMap<String, String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    environ
        .into_iter()
        .filter_map(|entry| {
            let (key, value) = entry.as_ref().split_once('=')?;
            if key.is_empty() || !key.starts_with(filter_prefix) {
                return None;
            }
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

/// Converts an environment map to an OS-style list. Order is unspecified.
pub fn marshal_environ(env: &HashMap<String, String>) -> Vec<String> {
    env.iter().map(|(k, v)| format!("{}={}", k, v)).collect()
}

/// Overlays `overrides` onto `base`, keeping the order of `base`.
///
/// A key present in both keeps its position and takes the override's value;
/// keys only in `overrides` are appended in sorted order.
pub fn merge_environ<I>(base: I, overrides: &HashMap<String, String>) -> Vec<String>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut seen = Vec::new();
    let mut merged: Vec<String> = base
        .into_iter()
        .map(|(k, v)| match overrides.get(&k) {
            Some(value) => {
                let entry = format!("{}={}", k, value);
                seen.push(k);
                entry
            }
            None => format!("{}={}", k, v),
        })
        .collect();

    let mut extra: Vec<_> = overrides
        .iter()
        .filter(|(k, _)| !seen.contains(k))
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();
    extra.sort();
    merged.extend(extra);
    merged
}

/// Current process environment with `overrides` applied on top, as
/// `KEY=VALUE` entries in the order of [`merge_environ`].
///
/// Inherited variables are passed through as raw OS strings, so names and
/// values that are not valid unicode reach the child unchanged.
pub fn ambient_environ(overrides: &HashMap<String, String>) -> Vec<OsString> {
    let mut seen = HashSet::new();
    let mut merged: Vec<OsString> = std::env::vars_os()
        .map(|(key, value)| match key.to_str().and_then(|k| overrides.get_key_value(k)) {
            Some((k, v)) => {
                seen.insert(k.as_str());
                environ_entry(&key, OsStr::new(v))
            }
            None => environ_entry(&key, &value),
        })
        .collect();

    let mut extra: Vec<_> = overrides
        .iter()
        .filter(|(k, _)| !seen.contains(k.as_str()))
        .map(|(k, v)| environ_entry(OsStr::new(k), OsStr::new(v)))
        .collect();
    extra.sort();
    merged.extend(extra);
    merged
}

fn environ_entry(key: &OsStr, value: &OsStr) -> OsString {
    let mut entry = OsString::with_capacity(key.len() + value.len() + 1);
    entry.push(key);
    entry.push("=");
    entry.push(value);
    entry
}

/// Splits a `KEY=VALUE` entry at its first `=`. Entries without `=` or with
/// an empty key yield `None`.
pub(crate) fn split_environ_entry(entry: &OsStr) -> Option<(&OsStr, &OsStr)> {
    #[cfg(unix)]
    let (key, value) = {
        use std::os::unix::ffi::OsStrExt;

        let bytes = entry.as_bytes();
        let at = bytes.iter().position(|&b| b == b'=')?;
        (OsStr::from_bytes(&bytes[..at]), OsStr::from_bytes(&bytes[at + 1..]))
    };

    #[cfg(not(unix))]
    let (key, value) = {
        let (key, value) = entry.to_str()?.split_once('=')?;
        (OsStr::new(key), OsStr::new(value))
    };

    if key.is_empty() {
        return None;
    }
    Some((key, value))
}

/// Restores the overridden variables of the current process when dropped.
///
/// Created by [`EnvGuard::apply`]. Each key goes back to the value it had
/// before, or is removed again if it was absent.
#[derive(Debug)]
#[must_use = "the environment is restored as soon as the guard is dropped"]
pub struct EnvGuard {
    saved: Vec<(String, Option<OsString>)>,
}

impl EnvGuard {
    /// Sets every variable in `env` on the current process.
    ///
    /// # Panics
    ///
    /// Panics if a key is empty or contains `=` or a NUL byte, or a value
    /// contains a NUL byte.
    pub fn apply(env: &HashMap<String, String>) -> Self {
        let mut guard = EnvGuard {
            saved: Vec::with_capacity(env.len()),
        };

        for (key, value) in env {
            guard.saved.push((key.clone(), std::env::var_os(key)));
            // SAFETY: the environment is process-global. Callers override
            // variables only in setup code or tests that do not read them
            // concurrently through libc.
            unsafe { std::env::set_var(key, value) };
        }

        guard
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, original) in self.saved.drain(..).rev() {
            // SAFETY: see `EnvGuard::apply`.
            unsafe {
                match original {
                    Some(value) => std::env::set_var(&key, value),
                    None => std::env::remove_var(&key),
                }
            }
        }
    }
}

/// Runs `f` with `env` applied to the current process environment.
///
/// Every overridden variable is restored afterwards, also when `f` panics.
///
/// # Examples
///
/// ```rust
/// use std::collections::HashMap;
/// use tcrm_shell::shell::environ::with_env;
///
/// let env = HashMap::from([("TCRM_DOC_KEY".to_string(), "v".to_string())]);
/// with_env(&env, || assert_eq!(std::env::var("TCRM_DOC_KEY").unwrap(), "v"));
/// assert!(std::env::var_os("TCRM_DOC_KEY").is_none());
/// ```
pub fn with_env<F, R>(env: &HashMap<String, String>, f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = EnvGuard::apply(env);
    f()
}

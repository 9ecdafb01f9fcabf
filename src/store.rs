//! The monitored endpoint list shared between the reload path and scrapes.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

/// A host monitored for certificate expiry, always probed on port 443.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Endpoint(String);

impl Endpoint {
    pub fn new(host: impl Into<String>) -> Self {
        Endpoint(host.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Endpoint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Endpoint {
    fn from(s: &str) -> Self {
        Endpoint(s.to_string())
    }
}

impl From<String> for Endpoint {
    fn from(s: String) -> Self {
        Endpoint(s)
    }
}

/// Ordered endpoint list. Duplicates are allowed and probed twice.
pub type EndpointSet = Vec<Endpoint>;

/// Joins endpoint names with `,` for logs and the reload response.
pub fn describe(endpoints: &[Endpoint]) -> String {
    endpoints
        .iter()
        .map(Endpoint::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

/// Single source of truth for the endpoint list.
///
/// The list is only ever swapped whole, so a reader sees either the old or
/// the new list in full. Both operations hold the lock for the length of a
/// clone or a pointer swap.
#[derive(Debug, Default)]
pub struct EndpointStore {
    endpoints: Mutex<EndpointSet>,
}

impl EndpointStore {
    pub fn new(initial: EndpointSet) -> Self {
        EndpointStore {
            endpoints: Mutex::new(initial),
        }
    }

    /// Atomically swaps the stored list for `new_set`.
    pub fn replace(&self, new_set: EndpointSet) {
        let previous = std::mem::replace(&mut *self.lock(), new_set);
        drop(previous);
    }

    /// Returns a copy of the current list, safe to iterate while a
    /// concurrent `replace` runs.
    pub fn snapshot(&self) -> EndpointSet {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // The guarded value is only replaced whole, so a poisoned lock still
    // holds a complete list.
    fn lock(&self) -> MutexGuard<'_, EndpointSet> {
        self.endpoints.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

use serde::{Deserialize, Serialize};

use super::SpdzShare;

/// Partially opened value together with the local MAC share that authenticates it.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenedValue<T> {
    pub value: T,
    pub mac: T,
}

impl<T> OpenedValue<T> {
    /// Record opening of `share` to the public `value`.
    pub fn new(value: T, share: SpdzShare<T>) -> Self {
        Self {
            value,
            mac: share.mac,
        }
    }
}

/// Values opened since the last successful MAC check.
#[derive(Clone, Debug, Default)]
pub struct OpenedValueStore<T> {
    values: Vec<OpenedValue<T>>,
}

impl<T: Copy> OpenedValueStore<T> {
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    pub fn append(&mut self, value: OpenedValue<T>) {
        self.values.push(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Copy of all values, in the order they were opened.
    pub fn snapshot(&self) -> Vec<OpenedValue<T>> {
        self.values.clone()
    }

    /// Drop all values. Only valid once they passed a MAC check.
    pub fn clear(&mut self) {
        self.values.clear();
    }
}

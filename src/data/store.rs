use crate::error::InvalidVariableName;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// Name → value mapping mutated by `SetVariable` and read by `GetVariable`.
///
/// Scopes own their store. Branches and loops work on a clone and the caller
/// adopts the clone afterwards, so writes only ever propagate forward.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableStore {
    values: AHashMap<String, String>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks a name against `[A-Za-z_][A-Za-z0-9_]*`.
    pub fn is_valid_name(name: &str) -> bool {
        let mut chars = name.chars();
        match chars.next() {
            Some(first) if first.is_ascii_alphabetic() || first == '_' => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
            }
            _ => false,
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Writes `value` under `name`, replacing any previous value.
    pub fn set(
        &mut self,
        name: &str,
        value: impl Into<String>,
    ) -> Result<(), InvalidVariableName> {
        if !Self::is_valid_name(name) {
            return Err(InvalidVariableName(name.to_string()));
        }
        self.values.insert(name.to_string(), value.into());
        Ok(())
    }

    /// Overlays every entry of `other` onto this store.
    pub fn merge(&mut self, other: VariableStore) {
        self.values.extend(other.values);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for VariableStore {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// The state threaded through a sequence: the current data value and the variable store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    pub data: String,
    pub variables: VariableStore,
}

impl Scope {
    pub fn new(data: impl Into<String>, variables: VariableStore) -> Self {
        Self {
            data: data.into(),
            variables,
        }
    }
}

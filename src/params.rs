//! Parameter binding: caller arguments to the engine's name → value mapping.

use std::collections::BTreeMap;

use crate::codec::encode_value;
use crate::engine::EngineValue;
use crate::error::LedgerSqlError;
use crate::types::RowValues;

const POSITIONAL_PREFIX: &str = "param";

/// Synthetic name given to the positional argument with this ordinal.
#[must_use]
pub fn positional_name(ordinal: usize) -> String {
    format!("{POSITIONAL_PREFIX}{ordinal}")
}

/// One statement argument: explicitly named, or positional with a 1-based ordinal.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Option<String>,
    pub ordinal: usize,
    pub value: RowValues,
}

impl Param {
    #[must_use]
    pub fn positional(ordinal: usize, value: RowValues) -> Self {
        Self {
            name: None,
            ordinal,
            value,
        }
    }

    #[must_use]
    pub fn named(name: impl Into<String>, ordinal: usize, value: RowValues) -> Self {
        Self {
            name: Some(name.into()),
            ordinal,
            value,
        }
    }

    /// Positional parameters numbered 1..=n in slice order.
    #[must_use]
    pub fn positional_list(values: &[RowValues]) -> Vec<Param> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Param::positional(i + 1, v.clone()))
            .collect()
    }

    #[must_use]
    pub fn is_positional(&self) -> bool {
        self.name.as_deref().is_none_or(str::is_empty)
    }

    /// The name this parameter is bound under.
    #[must_use]
    pub fn bound_name(&self) -> String {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name.to_owned(),
            _ => positional_name(self.ordinal),
        }
    }
}

/// Parameter set in the form the engine accepts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamedParams(BTreeMap<String, EngineValue>);

impl NamedParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&EngineValue> {
        self.0.get(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EngineValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.0.keys().map(String::as_str).collect()
    }
}

/// Bind one statement's (or one merged batch's) arguments.
///
/// Cross-statement collisions are the batch merger's concern; a collision here
/// means the caller bound the same name twice within one call.
///
/// # Errors
/// Returns `ParameterError` on a duplicate bound name or a value the engine
/// cannot represent.
pub fn bind(params: &[Param]) -> Result<NamedParams, LedgerSqlError> {
    let mut bound = BTreeMap::new();
    for param in params {
        let name = param.bound_name();
        let value = encode_value(&param.value)?;
        if bound.insert(name.clone(), value).is_some() {
            return Err(LedgerSqlError::ParameterError(format!(
                "parameter {name} is bound more than once"
            )));
        }
    }
    Ok(NamedParams(bound))
}

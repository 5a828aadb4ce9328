//! Named, typed algorithm parameters.
//!
//! A [`ParameterSet`] is the startup configuration record handed to the
//! algorithm factory. Lookups are strict: a missing name or a value of the
//! wrong type is a [`ConfigError`], never a silent default. Optional
//! parameters go through the `*_or` accessors.

use crate::error::ConfigError;
use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single parameter value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(untagged))]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    Doubles(Vec<f64>),
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<Vec<f64>> for ParamValue {
    fn from(v: Vec<f64>) -> Self {
        Self::Doubles(v)
    }
}

/// Ordered map of parameter names to values.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct ParameterSet {
    values: BTreeMap<String, ParamValue>,
}

impl ParameterSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a parameter, builder style.
    #[must_use]
    pub fn with(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Adds or replaces a parameter.
    pub fn insert(&mut self, name: &str, value: impl Into<ParamValue>) {
        self.values.insert(name.to_string(), value.into());
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Iterates over the parameter names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    fn value(&self, name: &str) -> Result<&ParamValue, ConfigError> {
        self.values
            .get(name)
            .ok_or_else(|| ConfigError::MissingParameter(name.to_string()))
    }

    fn wrong_type(name: &str, expected: &'static str) -> ConfigError {
        ConfigError::WrongType {
            name: name.to_string(),
            expected,
        }
    }

    /// Boolean parameter.
    ///
    /// # Errors
    /// Missing parameter or wrong type.
    pub fn get_bool(&self, name: &str) -> Result<bool, ConfigError> {
        match self.value(name)? {
            ParamValue::Bool(v) => Ok(*v),
            _ => Err(Self::wrong_type(name, "bool")),
        }
    }

    /// Integer parameter.
    ///
    /// # Errors
    /// Missing parameter or wrong type.
    pub fn get_int(&self, name: &str) -> Result<i64, ConfigError> {
        match self.value(name)? {
            ParamValue::Int(v) => Ok(*v),
            _ => Err(Self::wrong_type(name, "integer")),
        }
    }

    /// Integer parameter that must fit an `i32`.
    ///
    /// # Errors
    /// Missing parameter, wrong type, or out of range.
    pub fn get_i32(&self, name: &str) -> Result<i32, ConfigError> {
        let v = self.get_int(name)?;
        i32::try_from(v).map_err(|_| ConfigError::InvalidValue {
            name: name.to_string(),
            reason: format!("{v} does not fit a 32-bit integer"),
        })
    }

    /// Floating-point parameter. Integer values are accepted.
    ///
    /// # Errors
    /// Missing parameter or wrong type.
    #[allow(clippy::cast_precision_loss)]
    pub fn get_double(&self, name: &str) -> Result<f64, ConfigError> {
        match self.value(name)? {
            ParamValue::Double(v) => Ok(*v),
            ParamValue::Int(v) => Ok(*v as f64),
            _ => Err(Self::wrong_type(name, "double")),
        }
    }

    /// String parameter.
    ///
    /// # Errors
    /// Missing parameter or wrong type.
    pub fn get_string(&self, name: &str) -> Result<&str, ConfigError> {
        match self.value(name)? {
            ParamValue::String(v) => Ok(v),
            _ => Err(Self::wrong_type(name, "string")),
        }
    }

    /// Vector-of-doubles parameter.
    ///
    /// # Errors
    /// Missing parameter or wrong type.
    pub fn get_doubles(&self, name: &str) -> Result<&[f64], ConfigError> {
        match self.value(name)? {
            ParamValue::Doubles(v) => Ok(v),
            _ => Err(Self::wrong_type(name, "vector of doubles")),
        }
    }

    /// Vector-of-doubles parameter with a required element count.
    ///
    /// # Errors
    /// Missing parameter, wrong type, or wrong length.
    pub fn get_doubles_exact(&self, name: &str, len: usize) -> Result<&[f64], ConfigError> {
        let v = self.get_doubles(name)?;
        if v.len() == len {
            Ok(v)
        } else {
            Err(ConfigError::WrongLength {
                name: name.to_string(),
                expected: len,
                found: v.len(),
            })
        }
    }

    /// Optional boolean parameter.
    ///
    /// # Errors
    /// Present with the wrong type.
    pub fn get_bool_or(&self, name: &str, default: bool) -> Result<bool, ConfigError> {
        if self.contains(name) {
            self.get_bool(name)
        } else {
            Ok(default)
        }
    }

    /// Optional 32-bit integer parameter.
    ///
    /// # Errors
    /// Present with the wrong type or out of range.
    pub fn get_i32_or(&self, name: &str, default: i32) -> Result<i32, ConfigError> {
        if self.contains(name) {
            self.get_i32(name)
        } else {
            Ok(default)
        }
    }

    /// Optional floating-point parameter.
    ///
    /// # Errors
    /// Present with the wrong type.
    pub fn get_double_or(&self, name: &str, default: f64) -> Result<f64, ConfigError> {
        if self.contains(name) {
            self.get_double(name)
        } else {
            Ok(default)
        }
    }
}

//! # Policy parameter bag.
//!
//! [`PolicyParams`] wraps the `explorePolicyParam` object of the configuration
//! and offers typed getters. A getter returns `Ok(None)` when the key is
//! absent and an error when it is present with the wrong shape.
//!
//! ## Durations
//! Accepted forms: a JSON integer (milliseconds) or a string with a unit
//! suffix: `"250ns"`, `"10us"`, `"30ms"`, `"1.5s"`, `"2m"`, `"1h"`.
//! Negative values are rejected.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;
use crate::signal::OptionMap;

/// Free-form parameters handed to `ExplorePolicy::load_config`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyParams(OptionMap);

impl PolicyParams {
    /// An empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// Raw lookup.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// True if `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Duration parameter.
    pub fn duration(&self, key: &str) -> Result<Option<Duration>, ConfigError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => parse_duration(v)
                .map(Some)
                .ok_or_else(|| ConfigError::InvalidDuration {
                    param: key.to_string(),
                    value: v.to_string(),
                }),
        }
    }

    /// Floating-point parameter (integers are accepted).
    pub fn f64(&self, key: &str) -> Result<Option<f64>, ConfigError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => v.as_f64().map(Some).ok_or_else(|| invalid(key, "expected a number")),
        }
    }

    /// Non-negative integer parameter.
    pub fn u64(&self, key: &str) -> Result<Option<u64>, ConfigError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => v
                .as_u64()
                .map(Some)
                .ok_or_else(|| invalid(key, "expected a non-negative integer")),
        }
    }

    /// Boolean parameter.
    pub fn bool(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => v.as_bool().map(Some).ok_or_else(|| invalid(key, "expected a bool")),
        }
    }

    /// String parameter.
    pub fn string(&self, key: &str) -> Result<Option<String>, ConfigError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(invalid(key, "expected a string")),
        }
    }

    /// List-of-strings parameter.
    pub fn string_list(&self, key: &str) -> Result<Option<Vec<String>>, ConfigError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| {
                    v.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| invalid(key, "expected a list of strings"))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Some),
            Some(_) => Err(invalid(key, "expected a list of strings")),
        }
    }

    /// Nested parameter object.
    pub fn nested(&self, key: &str) -> Result<Option<PolicyParams>, ConfigError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(m)) => Ok(Some(PolicyParams(m.clone()))),
            Some(_) => Err(invalid(key, "expected an object")),
        }
    }
}

impl From<OptionMap> for PolicyParams {
    fn from(m: OptionMap) -> Self {
        Self(m)
    }
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidParam {
        param: key.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_duration(v: &Value) -> Option<Duration> {
    match v {
        Value::Number(n) => n.as_u64().map(Duration::from_millis),
        Value::String(s) => parse_duration_str(s.trim()),
        _ => None,
    }
}

fn parse_duration_str(s: &str) -> Option<Duration> {
    if s == "0" {
        return Some(Duration::ZERO);
    }
    let split = s.find(|c: char| c.is_ascii_alphabetic())?;
    let (num, unit) = s.split_at(split);
    let value: f64 = num.parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    let nanos_per_unit = match unit {
        "ns" => 1.0,
        "us" => 1e3,
        "ms" => 1e6,
        "s" => 1e9,
        "m" => 60.0 * 1e9,
        "h" => 3600.0 * 1e9,
        _ => return None,
    };
    Some(Duration::from_nanos((value * nanos_per_unit).round() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_duration_forms() {
        let p = PolicyParams::new()
            .with("a", 30)
            .with("b", "30ms")
            .with("c", "1.5s")
            .with("d", "250us")
            .with("e", "2m")
            .with("f", "0");
        assert_eq!(p.duration("a").unwrap(), Some(Duration::from_millis(30)));
        assert_eq!(p.duration("b").unwrap(), Some(Duration::from_millis(30)));
        assert_eq!(p.duration("c").unwrap(), Some(Duration::from_millis(1500)));
        assert_eq!(p.duration("d").unwrap(), Some(Duration::from_micros(250)));
        assert_eq!(p.duration("e").unwrap(), Some(Duration::from_secs(120)));
        assert_eq!(p.duration("f").unwrap(), Some(Duration::ZERO));
        assert_eq!(p.duration("missing").unwrap(), None);
    }

    #[test]
    fn test_bad_durations() {
        let p = PolicyParams::new()
            .with("neg", "-5ms")
            .with("negint", -5)
            .with("unit", "5 parsecs")
            .with("bare", "12");
        for key in ["neg", "negint", "unit", "bare"] {
            let err = p.duration(key).unwrap_err();
            assert_eq!(err.as_label(), "config_invalid_duration", "{key}");
        }
    }

    #[test]
    fn test_typed_getters() {
        let p: PolicyParams = serde_json::from_value(json!({
            "prob": 0.25,
            "n": 3,
            "flag": true,
            "names": ["a", "b"],
            "nested": {"x": 1},
            "wrong": "nope"
        }))
        .unwrap();
        assert_eq!(p.f64("prob").unwrap(), Some(0.25));
        assert_eq!(p.f64("n").unwrap(), Some(3.0));
        assert_eq!(p.u64("n").unwrap(), Some(3));
        assert_eq!(p.bool("flag").unwrap(), Some(true));
        assert_eq!(
            p.string_list("names").unwrap(),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert!(p.nested("nested").unwrap().unwrap().contains("x"));
        assert!(p.f64("wrong").is_err());
        assert!(p.string_list("wrong").is_err());
    }
}

//! ## Fit Parameters
//!
//! Parameters passed to [`crate::pipeline::Pipeline::fit_with_params`] are grouped per step.
//! They can be built in nested form with [`FitParams::set`], or parsed from flat
//! `"stepname__paramname"` keys with [`FitParams::from_flat`]. Either way they are checked
//! against the pipeline's step names before any step runs.

use crate::exceptions::{PruneError, PruneResult};
use std::collections::HashMap;

/// Separator between the step name and the parameter name in flat keys.
pub const STEP_SEPARATOR: &str = "__";

/// A single parameter value handed to a pipeline step.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ParamValue>),
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}

impl<T: Into<ParamValue>> From<Vec<T>> for ParamValue {
    fn from(v: Vec<T>) -> Self {
        ParamValue::List(v.into_iter().map(Into::into).collect())
    }
}

/// The parameters routed to one step.
pub type ParamBag = HashMap<String, ParamValue>;

/// Fit parameters keyed by step name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FitParams {
    steps: HashMap<String, ParamBag>,
}

impl FitParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `param = value` to the bag of `step`.
    pub fn set(mut self, step: &str, param: &str, value: impl Into<ParamValue>) -> Self {
        self.steps
            .entry(step.to_string())
            .or_default()
            .insert(param.to_string(), value.into());
        self
    }

    /// Parses flat `"step__param"` keys. Only the first separator splits, so
    /// `"model__a__b"` routes parameter `a__b` to step `model`.
    pub fn from_flat<I, K, V>(params: I) -> PruneResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<ParamValue>,
    {
        let mut out = FitParams::new();
        for (key, value) in params {
            let key = key.as_ref();
            match key.split_once(STEP_SEPARATOR) {
                Some((step, param)) if !step.is_empty() && !param.is_empty() => {
                    out = out.set(step, param, value);
                }
                _ => {
                    return Err(PruneError::InvalidParameter(format!(
                        "fit parameter '{}' is not of the form 'step{}param'",
                        key, STEP_SEPARATOR
                    )))
                }
            }
        }
        Ok(out)
    }

    /// Fails if any bag names a step that is not in `step_names`.
    pub fn validate_steps<'a, I>(&self, step_names: I) -> PruneResult<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let known: Vec<&str> = step_names.into_iter().collect();
        let mut unknown: Vec<&str> = self
            .steps
            .keys()
            .map(String::as_str)
            .filter(|step| !known.contains(step))
            .collect();
        if unknown.is_empty() {
            return Ok(());
        }
        unknown.sort_unstable();
        Err(PruneError::InvalidParameter(format!(
            "fit parameters reference unknown step(s): {}",
            unknown.join(", ")
        )))
    }

    /// The bag for `step`, empty when nothing was routed to it.
    pub fn for_step(&self, step: &str) -> ParamBag {
        self.steps.get(step).cloned().unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.values().all(HashMap::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_keys_are_routed_by_prefix() {
        let params = FitParams::from_flat(vec![
            ("model__epochs", ParamValue::Int(10)),
            ("model__seed", ParamValue::Int(42)),
            ("nzv__unused", ParamValue::Bool(true)),
        ])
        .unwrap();

        let model = params.for_step("model");
        assert_eq!(model.len(), 2);
        assert_eq!(model["epochs"], ParamValue::Int(10));
        assert_eq!(params.for_step("nzv")["unused"], ParamValue::Bool(true));
        assert!(params.for_step("sparse").is_empty());
    }

    #[test]
    fn test_only_first_separator_splits() {
        let params = FitParams::from_flat(vec![("model__a__b", 1.5)]).unwrap();
        assert_eq!(params.for_step("model")["a__b"], ParamValue::Float(1.5));
    }

    #[test]
    fn test_unprefixed_key_is_rejected() {
        for key in ["epochs", "__epochs", "model__"] {
            let err = FitParams::from_flat(vec![(key, 1i64)]).unwrap_err();
            assert!(matches!(err, PruneError::InvalidParameter(_)), "key {}", key);
        }
    }

    #[test]
    fn test_unknown_step_is_rejected() {
        let params = FitParams::new().set("modle", "epochs", 3i64);
        let err = params.validate_steps(["drop", "model"]).unwrap_err();
        assert!(format!("{}", err).contains("modle"));
        assert!(FitParams::new()
            .set("model", "epochs", 3i64)
            .validate_steps(["drop", "model"])
            .is_ok());
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(ParamValue::from("gini"), ParamValue::Str("gini".into()));
        assert_eq!(
            ParamValue::from(vec![1i64, 2]),
            ParamValue::List(vec![ParamValue::Int(1), ParamValue::Int(2)])
        );
        assert!(FitParams::new().is_empty());
    }
}

//! Restriction-based pruning of the parameter space.

use crate::expr::{evaluate_bool, ExprError};
use crate::params::Configuration;
use std::fmt;

/// Why a configuration was dropped by the restriction filter.
///
/// Evaluation failures (malformed expression, unknown parameter, type error)
/// count as a failed restriction: the filter is fail-closed so that a typo in
/// a restriction never lets invalid configurations through to compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct RestrictionFailure {
    pub expression: String,
    pub cause: Option<ExprError>,
}

impl fmt::Display for RestrictionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            Some(cause) => write!(
                f,
                "restriction {:?} could not be evaluated: {cause}",
                self.expression
            ),
            None => write!(f, "config fails restriction {:?}", self.expression),
        }
    }
}

/// Check every restriction against `config`.
///
/// Returns the first failing restriction, or `Ok(())` when all hold (or none
/// were supplied).
pub fn check_restrictions(
    restrictions: &[String],
    config: &Configuration,
) -> Result<(), RestrictionFailure> {
    for expression in restrictions {
        match evaluate_bool(expression, config) {
            Ok(true) => {}
            Ok(false) => {
                return Err(RestrictionFailure {
                    expression: expression.clone(),
                    cause: None,
                })
            }
            Err(cause) => {
                return Err(RestrictionFailure {
                    expression: expression.clone(),
                    cause: Some(cause),
                })
            }
        }
    }
    Ok(())
}

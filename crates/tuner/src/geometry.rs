//! Launch geometry derived from a configuration and the problem size.

use crate::error::TuneError;
use gridtune_backend::{BlockDim, GridDim};
use gridtune_space::{evaluate_number, Configuration, ParamValue};
use serde::{Deserialize, Serialize};

/// Logical extent of the problem in two dimensions, independent of any
/// configuration. Do not divide by block sizes up front; grid divisors do
/// that per configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemSize {
    pub x: usize,
    pub y: usize,
}

impl ProblemSize {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

/// Work-group dimensions by convention: `block_size_x` / `block_size_y` /
/// `block_size_z`, defaulting to 256/1/1 when a parameter is absent.
///
/// Whether the product fits the device is the orchestrator's check; a value
/// that is not a positive integer is malformed and fatal.
pub fn thread_block_dimensions(config: &Configuration) -> Result<BlockDim, TuneError> {
    let x = block_dim(config, "block_size_x", 256)?;
    let y = block_dim(config, "block_size_y", 1)?;
    let z = block_dim(config, "block_size_z", 1)?;
    Ok(BlockDim::new(x, y, z))
}

fn block_dim(config: &Configuration, name: &str, default: usize) -> Result<usize, TuneError> {
    let Some(value) = config.get(name) else {
        return Ok(default);
    };
    match value {
        ParamValue::Int(v) if v > 0 => Ok(v as usize),
        _ => Err(TuneError::InvalidBlockDim {
            name: name.to_string(),
            value,
        }),
    }
}

/// Work-groups per dimension: the problem size divided by the product of the
/// axis's divisor expressions, rounded up.
///
/// Each divisor expression is evaluated against the configuration and
/// truncated to an integer before entering the product; the division itself
/// is real-valued. When `grid_div_x` is `None` and the configuration tunes
/// `block_size_x`, the x divisors default to `["block_size_x"]`; pass an
/// empty list to divide by nothing. The y axis has no implicit default.
pub fn grid_dimensions(
    problem_size: ProblemSize,
    config: &Configuration,
    grid_div_x: Option<&[String]>,
    grid_div_y: Option<&[String]>,
) -> Result<GridDim, TuneError> {
    let div_x = match grid_div_x {
        Some(exprs) => divisor_product(exprs, config)?,
        None if config.get("block_size_x").is_some() => {
            divisor_product(&["block_size_x".to_string()], config)?
        }
        None => 1,
    };
    let div_y = match grid_div_y {
        Some(exprs) => divisor_product(exprs, config)?,
        None => 1,
    };
    Ok(GridDim::new(
        ceil_div(problem_size.x, div_x),
        ceil_div(problem_size.y, div_y),
    ))
}

fn divisor_product(exprs: &[String], config: &Configuration) -> Result<i64, TuneError> {
    let mut product: i64 = 1;
    for expr in exprs {
        let value = evaluate_number(expr, config).map_err(|source| TuneError::InvalidDivisor {
            expr: expr.clone(),
            source,
        })?;
        product *= value as i64;
    }
    if product <= 0 {
        return Err(TuneError::NonPositiveDivisor { product });
    }
    Ok(product)
}

fn ceil_div(size: usize, divisor: i64) -> usize {
    (size as f64 / divisor as f64).ceil() as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridtune_space::Configuration;

    fn config() -> Configuration {
        Configuration::from_pairs([("block_x", 41), ("block_y", 37)])
    }

    #[test]
    fn test_grid_dimensions_both_axes() {
        let grid = grid_dimensions(
            ProblemSize::new(1024, 1024),
            &config(),
            Some(&["block_x".to_string()]),
            Some(&["block_y".to_string()]),
        )
        .unwrap();
        assert_eq!(grid, GridDim::new(25, 28));
    }

    #[test]
    fn test_grid_dimensions_without_y_divisors() {
        let grid = grid_dimensions(
            ProblemSize::new(1024, 1024),
            &config(),
            Some(&["block_x".to_string()]),
            None,
        )
        .unwrap();
        assert_eq!(grid, GridDim::new(25, 1024));
    }

    #[test]
    fn test_grid_dimensions_without_x_divisors() {
        // No implicit x default: "block_size_x" is not a tuned parameter.
        let grid = grid_dimensions(
            ProblemSize::new(1024, 1024),
            &config(),
            None,
            Some(&["block_y".to_string()]),
        )
        .unwrap();
        assert_eq!(grid, GridDim::new(1024, 28));
    }

    #[test]
    fn test_grid_default_x_divisor_when_block_size_x_is_tuned() {
        let config = Configuration::from_pairs([("block_size_x", 128)]);
        let grid = grid_dimensions(ProblemSize::new(1000, 1), &config, None, None).unwrap();
        assert_eq!(grid, GridDim::new(8, 1));

        // An explicit empty list disables the default.
        let grid = grid_dimensions(ProblemSize::new(1000, 1), &config, Some(&[]), None).unwrap();
        assert_eq!(grid, GridDim::new(1000, 1));
    }

    #[test]
    fn test_divisor_expressions_truncate_before_multiplying() {
        // 48/32 = 1.5 truncates to 1, so the product is 1 per expression.
        let config = Configuration::from_pairs([("block_size_x", 48)]);
        let grid = grid_dimensions(
            ProblemSize::new(96, 1),
            &config,
            Some(&["block_size_x/32".to_string()]),
            None,
        )
        .unwrap();
        assert_eq!(grid, GridDim::new(96, 1));
    }

    #[test]
    fn test_zero_divisor_is_fatal() {
        let config = Configuration::from_pairs([("w", 0)]);
        let err = grid_dimensions(
            ProblemSize::new(64, 64),
            &config,
            Some(&["w".to_string()]),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, TuneError::NonPositiveDivisor { .. }));
    }

    #[test]
    fn test_malformed_divisor_is_fatal() {
        let err = grid_dimensions(
            ProblemSize::new(64, 64),
            &config(),
            Some(&["missing*2".to_string()]),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, TuneError::InvalidDivisor { .. }));
    }

    #[test]
    fn test_thread_block_dimensions_defaults() {
        let config = Configuration::from_pairs([("block_size_x", 123), ("block_size_y", 257)]);
        assert_eq!(
            thread_block_dimensions(&config).unwrap(),
            BlockDim::new(123, 257, 1)
        );
        let empty = Configuration::new(Vec::new());
        assert_eq!(
            thread_block_dimensions(&empty).unwrap(),
            BlockDim::new(256, 1, 1)
        );
    }

    #[test]
    fn test_non_integer_block_dim_is_fatal() {
        let config = Configuration::from_pairs([("block_size_x", 0.5)]);
        assert!(matches!(
            thread_block_dimensions(&config),
            Err(TuneError::InvalidBlockDim { .. })
        ));
    }
}

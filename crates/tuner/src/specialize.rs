//! Per-configuration kernel specialization.
//!
//! Specialization is pure text manipulation: the source is never parsed or
//! type-checked. Renaming replaces every occurrence of the base kernel name,
//! so a base name that also appears in comments or inside longer identifiers
//! will be rewritten too; pick kernel names accordingly.

use gridtune_backend::{BackendKind, GridDim};
use gridtune_space::{Configuration, ParamValue};

/// Prepend compile-time constant definitions for the grid dimensions and
/// every configuration parameter.
///
/// The emitted physical order is `grid_size_x`, `grid_size_y`, then the
/// parameters in domain order, then the original source.
pub fn specialize_kernel(
    source: &str,
    config: &Configuration,
    grid: GridDim,
    kind: BackendKind,
) -> String {
    let mut prefix = String::new();
    prefix.push_str(&kind.define_line("grid_size_x", &ParamValue::Int(grid.x as i64)));
    prefix.push('\n');
    prefix.push_str(&kind.define_line("grid_size_y", &ParamValue::Int(grid.y as i64)));
    prefix.push('\n');
    for (name, value) in config.iter() {
        prefix.push_str(&kind.define_line(name, &value));
        prefix.push('\n');
    }
    format!("{prefix}{source}")
}

/// A kernel name unique to this configuration, so the backend never serves a
/// stale cached build for a different parameter assignment.
pub fn unique_kernel_name(base: &str, config: &Configuration) -> String {
    if config.is_empty() {
        return base.to_string();
    }
    format!("{base}_{}", sanitize_symbol(&config.instance_string()))
}

/// Rewrite the kernel's declared name throughout the source.
pub fn rename_kernel(source: &str, base: &str, replacement: &str) -> String {
    source.replace(base, replacement)
}

/// Map an instance string onto identifier-safe characters.
///
/// The mapping is injective per character (`.` → `p`, `-` → `m`, other
/// non-alphanumerics → `_`), so distinct instance strings keep distinct
/// symbols.
fn sanitize_symbol(instance: &str) -> String {
    instance
        .chars()
        .map(|ch| match ch {
            c if c.is_ascii_alphanumeric() => c,
            '.' => 'p',
            '-' => 'm',
            _ => '_',
        })
        .collect()
}

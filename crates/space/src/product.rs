//! Cartesian enumeration of a parameter domain.

use crate::params::{Configuration, ParameterDomain};

/// Lazy iterator over the full cartesian product of a domain.
///
/// Configurations come out in the natural product order: the first declared
/// parameter varies slowest, the last varies fastest. The iterator is
/// restartable in the sense that `domain.configurations()` always yields the
/// same sequence for the same domain.
pub struct ConfigurationIter<'a> {
    domain: &'a ParameterDomain,
    indices: Vec<usize>,
    done: bool,
}

impl<'a> ConfigurationIter<'a> {
    pub(crate) fn new(domain: &'a ParameterDomain) -> Self {
        // A domain with an empty value list has an empty product; a domain
        // with no parameters at all has exactly one empty configuration.
        let done = domain.entries().iter().any(|(_, values)| values.is_empty());
        Self {
            domain,
            indices: vec![0; domain.len()],
            done,
        }
    }

    fn current(&self) -> Configuration {
        let entries = self
            .domain
            .entries()
            .iter()
            .zip(&self.indices)
            .map(|((name, values), &i)| (name.clone(), values[i]))
            .collect();
        Configuration::new(entries)
    }

    fn advance(&mut self) {
        for axis in (0..self.indices.len()).rev() {
            self.indices[axis] += 1;
            if self.indices[axis] < self.domain.entries()[axis].1.len() {
                return;
            }
            self.indices[axis] = 0;
        }
        self.done = true;
    }
}

impl Iterator for ConfigurationIter<'_> {
    type Item = Configuration;

    fn next(&mut self) -> Option<Configuration> {
        if self.done {
            return None;
        }
        let config = self.current();
        self.advance();
        Some(config)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.domain.cardinality() {
            Some(total) if !self.done => (0, Some(total)),
            _ => (0, None),
        }
    }
}

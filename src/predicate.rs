//! Effective predicate and the `$path` pseudo-column
//!
//! The loader consumes a compacted per-column predicate from the planner.
//! Only one column matters here: the `$path` pseudo-column, whose domain
//! prunes whole files before a split is ever built. Everything else rides
//! along into the splits untouched.

use std::collections::{BTreeMap, BTreeSet};

/// Name of the synthetic column holding each row's source file path
pub const PATH_COLUMN: &str = "$path";

/// Set of admissible values for one column
///
/// Either a finite set of UTF-8 values or unconstrained. `nullable`
/// records whether NULL is admissible alongside the listed values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueDomain {
    values: Option<BTreeSet<String>>,
    nullable: bool,
}

impl ValueDomain {
    /// Domain admitting every value
    pub fn all() -> Self {
        Self {
            values: None,
            nullable: true,
        }
    }

    /// Domain admitting exactly the given values
    pub fn of_values<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            values: Some(values.into_iter().map(Into::into).collect()),
            nullable: false,
        }
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Whether the domain admits this (non-null) value
    pub fn includes_value(&self, value: &str) -> bool {
        match &self.values {
            None => true,
            Some(values) => values.contains(value),
        }
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }
}

/// Per-column domains describing the predicate pushed into the scan
#[derive(Debug, Clone, Default)]
pub struct EffectivePredicate {
    domains: BTreeMap<String, ValueDomain>,
}

impl EffectivePredicate {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_domain(mut self, column: &str, domain: ValueDomain) -> Self {
        self.domains.insert(column.to_string(), domain);
        self
    }

    pub fn domain(&self, column: &str) -> Option<&ValueDomain> {
        self.domains.get(column)
    }

    /// Extract the domain constraining the `$path` pseudo-column, if any
    pub fn path_domain(&self) -> Option<&ValueDomain> {
        self.domain(PATH_COLUMN)
    }
}

/// Whether a file path passes the `$path` domain. Absent domain admits
/// everything.
pub fn path_matches(path_domain: Option<&ValueDomain>, path: &str) -> bool {
    match path_domain {
        None => true,
        Some(domain) => domain.includes_value(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_domain_admits_everything() {
        assert!(path_matches(None, "/t/a"));
    }

    #[test]
    fn singleton_domain_prunes() {
        let domain = ValueDomain::of_values(["/t/a"]);
        assert!(path_matches(Some(&domain), "/t/a"));
        assert!(!path_matches(Some(&domain), "/t/b"));
    }

    #[test]
    fn unconstrained_domain_admits_everything() {
        let domain = ValueDomain::all();
        assert!(domain.includes_value("/t/anything"));
        assert!(domain.is_nullable());
    }

    #[test]
    fn path_domain_extraction() {
        let predicate = EffectivePredicate::none()
            .with_domain("ds", ValueDomain::of_values(["2020-01-01"]))
            .with_domain(PATH_COLUMN, ValueDomain::of_values(["/t/a"]));

        let path_domain = predicate.path_domain().unwrap();
        assert!(path_domain.includes_value("/t/a"));
        assert!(!path_domain.includes_value("/t/b"));

        let no_path = EffectivePredicate::none().with_domain("ds", ValueDomain::all());
        assert!(no_path.path_domain().is_none());
    }
}

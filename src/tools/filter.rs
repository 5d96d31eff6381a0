//! Tool filter: the enabled-set boundary.
//!
//! The filtered catalog is what `tools/list` advertises and the only set the
//! dispatcher accepts calls for. Filtering is a pure function of its inputs.

use crate::tools::catalog::ToolCatalog;
use std::collections::BTreeSet;

/// Keep only the catalog entries named in `enabled`.
///
/// Names in `enabled` that the catalog lacks are ignored here; the config
/// resolver rejects them before this is ever called.
pub fn filter(catalog: &ToolCatalog, enabled: &BTreeSet<String>) -> ToolCatalog {
    let mut subset = ToolCatalog::new();
    for entry in catalog.list() {
        if enabled.contains(&entry.name) {
            // Names are unique in `catalog`, so registration cannot collide.
            let _ = subset.register(entry.clone());
        }
    }
    subset
}

/// Entries of `names` that the catalog does not define, sorted and deduplicated.
pub fn unknown_tools<'a, I>(catalog: &ToolCatalog, names: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    let unknown: BTreeSet<String> = names
        .into_iter()
        .filter(|name| !catalog.has_tool(name))
        .cloned()
        .collect();
    unknown.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::lightrag::lightrag_catalog;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_filter_keeps_only_enabled() {
        let catalog = lightrag_catalog().unwrap();
        let subset = filter(&catalog, &set(&["query", "health"]));

        assert_eq!(subset.names(), vec!["health", "query"]);
        assert!(!subset.has_tool("documents_scan"));
    }

    #[test]
    fn test_filter_empty_set_is_empty() {
        let catalog = lightrag_catalog().unwrap();
        assert!(filter(&catalog, &BTreeSet::new()).is_empty());
    }

    #[test]
    fn test_filter_ignores_names_outside_catalog() {
        let catalog = lightrag_catalog().unwrap();
        let subset = filter(&catalog, &set(&["query", "not_a_tool"]));
        assert_eq!(subset.names(), vec!["query"]);
    }

    #[test]
    fn test_unknown_tools_sorted_and_deduplicated() {
        let catalog = lightrag_catalog().unwrap();
        let names = vec![
            "zeta".to_string(),
            "query".to_string(),
            "alpha".to_string(),
            "zeta".to_string(),
        ];
        assert_eq!(unknown_tools(&catalog, &names), vec!["alpha", "zeta"]);
    }

    proptest! {
        #[test]
        fn prop_filter_is_idempotent(mask in proptest::collection::vec(any::<bool>(), 29)) {
            let catalog = lightrag_catalog().unwrap();
            let enabled: BTreeSet<String> = catalog
                .names()
                .into_iter()
                .zip(mask)
                .filter(|(_, keep)| *keep)
                .map(|(name, _)| name)
                .collect();

            let first = filter(&catalog, &enabled);
            let second = filter(&catalog, &enabled);
            let refiltered = filter(&first, &enabled);

            prop_assert_eq!(first.names(), second.names());
            prop_assert_eq!(first.names(), refiltered.names());
            prop_assert_eq!(first.names(), enabled.into_iter().collect::<Vec<_>>());
        }
    }
}

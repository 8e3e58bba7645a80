//! Deprecated Tool Aliases
//!
//! Maps renamed tools' old names to their canonical names. Resolution is a
//! single lookup: an alias whose target is itself an alias is not followed.

use std::collections::HashMap;

use tracing::warn;

/// Resolve `names` through `aliases`, preserving order.
///
/// Returns the resolved names and every alias that was substituted, mapped to
/// its canonical target. A deprecation warning is logged for each substitution.
pub fn resolve_aliases<S: AsRef<str>>(
    aliases: &HashMap<String, String>,
    names: &[S],
) -> (Vec<String>, HashMap<String, String>) {
    let mut resolved = Vec::with_capacity(names.len());
    let mut used = HashMap::new();

    for name in names {
        let name = name.as_ref();
        match aliases.get(name) {
            Some(canonical) => {
                warn!(alias = %name, canonical = %canonical, "tool {:?} is deprecated, use {:?} instead", name, canonical);
                used.insert(name.to_string(), canonical.clone());
                resolved.push(canonical.clone());
            }
            None => resolved.push(name.to_string()),
        }
    }

    (resolved, used)
}

/// Resolve a single name. Returns the canonical name and whether it was an alias.
pub fn resolve_alias<'a>(aliases: &'a HashMap<String, String>, name: &'a str) -> (&'a str, bool) {
    match aliases.get(name) {
        Some(canonical) => {
            warn!(alias = %name, canonical = %canonical, "tool {:?} is deprecated, use {:?} instead", name, canonical);
            (canonical.as_str(), true)
        }
        None => (name, false),
    }
}

/// Aliases whose target is itself an alias, sorted by alias name. These are
/// left unresolved past the first hop and reported as configuration mistakes.
pub fn chained_aliases(aliases: &HashMap<String, String>) -> Vec<(&str, &str)> {
    let mut chained: Vec<(&str, &str)> = aliases
        .iter()
        .filter(|(_, target)| aliases.contains_key(target.as_str()))
        .map(|(alias, target)| (alias.as_str(), target.as_str()))
        .collect();
    chained.sort();
    chained
}

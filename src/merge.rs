//! Deep merge of loaded documents.
//!
//! Mappings are merged key by key. Every other value in the overlay, null
//! included, replaces whatever the base holds at that key. Sequences are
//! replaced wholesale, never concatenated or merged by index.

use crate::value::{ConfigValue, Mapping};

/// Deep merge two mappings, with `overlay` taking precedence over `base`.
///
/// - Keys only in `base` are kept unchanged, in their original position
/// - A key holding a mapping on both sides is merged recursively
/// - Any other overlay value replaces the base value, whatever its kind
/// - New keys from `overlay` are appended in overlay order
///
/// Neither argument is modified.
///
/// # Example
/// ```
/// use load_testplan::merge::deep_merge;
/// use load_testplan::value::{ConfigValue, Mapping};
///
/// let base: Mapping = serde_yaml::from_str::<serde_yaml::Value>("a: {x: 1}")
///     .map(ConfigValue::from)
///     .unwrap()
///     .as_mapping()
///     .cloned()
///     .unwrap();
/// let overlay: Mapping = serde_yaml::from_str::<serde_yaml::Value>("a: {y: 2}")
///     .map(ConfigValue::from)
///     .unwrap()
///     .as_mapping()
///     .cloned()
///     .unwrap();
/// let merged = deep_merge(&base, &overlay);
/// assert_eq!(merged["a"].as_mapping().unwrap().len(), 2);
/// ```
pub fn deep_merge(base: &Mapping, overlay: &Mapping) -> Mapping {
    let mut out = base.clone();
    for (key, overlay_value) in overlay {
        let merged = match (out.get(key), overlay_value) {
            (Some(ConfigValue::Mapping(base_map)), ConfigValue::Mapping(overlay_map)) => {
                ConfigValue::Mapping(deep_merge(base_map, overlay_map))
            }
            _ => overlay_value.clone(),
        };
        out.insert(key.clone(), merged);
    }
    out
}

/// Merge documents in order, with later documents taking precedence.
///
/// Equivalent to folding `deep_merge` over the list, starting from an empty mapping.
pub fn deep_merge_all<'a>(documents: impl IntoIterator<Item = &'a Mapping>) -> Mapping {
    documents
        .into_iter()
        .fold(Mapping::new(), |acc, doc| deep_merge(&acc, doc))
}

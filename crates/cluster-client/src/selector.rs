//! Equality-based label selectors

use std::collections::BTreeMap;

/// Renders labels as an equality selector (`k1=v1,k2=v2`), keys in sorted order
pub fn label_selector(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(",")
}

/// Whether `labels` satisfy every `k=v` term of an equality selector.
///
/// An empty selector matches everything, as it does on the API server.
pub fn selector_matches(selector: &str, labels: Option<&BTreeMap<String, String>>) -> bool {
    selector
        .split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .all(|term| {
            let (key, value) = match term.split_once("==").or_else(|| term.split_once('=')) {
                Some(kv) => kv,
                None => return labels.is_some_and(|l| l.contains_key(term)),
            };
            labels.and_then(|l| l.get(key.trim())).map(String::as_str) == Some(value.trim())
        })
}

//! Label normalization for comparisons between extracted labels and summary cells

use std::collections::HashMap;

/// Basic normalization: strip leading and trailing whitespace
pub fn normalize(label: &str) -> String {
    label.trim().to_string()
}

/// Extended normalization: keep only alphanumeric characters, lowercased
pub fn normalize_extended(label: &str) -> String {
    label
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Normalize a list of labels, keeping a reverse mapping from each normalized
/// form to the original that produced it. Later originals win on collisions.
pub fn normalize_with_originals<S: AsRef<str>>(
    labels: &[S],
) -> (Vec<String>, HashMap<String, String>) {
    let mut normalized = Vec::with_capacity(labels.len());
    let mut originals = HashMap::new();

    for label in labels {
        let key = normalize_extended(label.as_ref());
        originals.insert(key.clone(), label.as_ref().to_string());
        normalized.push(key);
    }

    (normalized, originals)
}

/// Remove a single trailing space, as left behind by template authors
pub fn trim_trailing_space(label: &str) -> &str {
    label.strip_suffix(' ').unwrap_or(label)
}

use std::sync::LazyLock;

use regex::Regex;

static LAYER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)layer\w*\s*(\d\s*/*\s*\d*)").expect("layer pattern is valid")
});

/// Cortical layer label from a region name, whitespace removed.
///
/// `"Primary visual area, layer 2/3"` gives `"2/3"`; sublayer letters are
/// dropped, so `"layer 6a"` gives `"6"`.
pub fn extract_layer(name: &str) -> Option<String> {
    let caps = LAYER_PATTERN.captures(name)?;
    let label: String = caps
        .get(1)?
        .as_str()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    Some(label)
}

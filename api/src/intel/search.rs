use crate::intel::score::ScoredItem;

/// Token-AND filter over the aggregation window. An item matches when every
/// whitespace-separated query token is a substring of its haystack.
pub fn search(items: &[ScoredItem], query: &str, limit: usize) -> Vec<ScoredItem> {
    let tokens: Vec<String> = query
        .to_lowercase()
        .split_whitespace()
        .map(|t| t.to_string())
        .collect();

    items
        .iter()
        .filter(|item| {
            let hay = haystack(item);
            tokens.iter().all(|t| hay.contains(t.as_str()))
        })
        .take(limit)
        .cloned()
        .collect()
}

fn haystack(item: &ScoredItem) -> String {
    format!(
        "{} {} {} {}",
        item.title,
        item.description,
        item.tags.join(" "),
        item.geos.join(" ")
    )
    .to_lowercase()
}

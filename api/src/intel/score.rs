use serde::{Deserialize, Serialize};

use crate::intel::parse::{RawItem, parse_pub_date};
use crate::intel::taxonomy;
use crate::utils::round3;

/// Hours after which an item contributes zero urgency.
const URGENCY_HORIZON_H: f64 = 36.0;
const STORY_KEY_TOKENS: usize = 8;

/// A scored, tagged item ready for ranking, clustering and streaming.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredItem {
    pub src: String,
    pub title: String,
    pub link: String,
    pub description: String,
    pub region: String,
    pub tags: Vec<String>,
    pub geos: Vec<String>,
    pub ts: i64,
    pub age_h: f64,
    pub score: f64,
    pub key: String,
}

/// Blend of impact (topic coverage), confidence (source trust) and urgency
/// (freshness), all in `[0, 1]`.
pub fn score_item(raw: RawItem, now_ms: i64) -> ScoredItem {
    let haystack = format!("{} {}", raw.title, raw.description).to_lowercase();
    let tags = taxonomy::match_labels(taxonomy::TOPICS, &haystack);

    let geo_haystack = format!("{haystack} {}", raw.region.to_lowercase());
    let geos = taxonomy::match_labels(taxonomy::GEOS, &geo_haystack);

    let ts = parse_pub_date(&raw.pub_text, now_ms);
    let age_h = (now_ms - ts).max(0) as f64 / 3_600_000.0;

    let urgency = (1.0 - age_h.min(URGENCY_HORIZON_H) / URGENCY_HORIZON_H).max(0.0);
    let impact = (tags.len() as f64 / 3.0).min(1.0);
    let confidence = raw.weight;
    let score = round3(0.5 * impact + 0.3 * confidence + 0.2 * urgency);

    let key = story_key(&raw.title);

    ScoredItem {
        src: raw.src,
        title: raw.title,
        link: raw.link,
        description: raw.description,
        region: raw.region,
        tags,
        geos,
        ts,
        age_h,
        score,
        key,
    }
}

/// Best-first ordering, then the recency window, then the cap.
pub fn rank(mut items: Vec<ScoredItem>, since_hours: f64, limit: usize) -> Vec<ScoredItem> {
    items.sort_by(|a, b| b.score.total_cmp(&a.score));
    items.retain(|i| i.age_h <= since_hours);
    items.truncate(limit);
    items
}

/// Canonical cluster seed: the first [`STORY_KEY_TOKENS`] significant title
/// tokens joined with `-`. Two headlines for the same story usually share it.
pub fn story_key(title: &str) -> String {
    title_tokens(title)
        .into_iter()
        .take(STORY_KEY_TOKENS)
        .collect::<Vec<_>>()
        .join("-")
}

/// Significant title tokens in order: lowercased, punctuation split, stop
/// words and short words dropped, well-known capitals folded onto their
/// country so rewrites like "Beijing …" / "China …" stay comparable.
pub fn title_tokens(title: &str) -> Vec<String> {
    title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .filter(|w| w.len() > 3 && !STOPWORDS.contains(w))
        .map(|w| {
            PLACE_ALIASES
                .iter()
                .find(|(from, _)| *from == w)
                .map(|(_, to)| to.to_string())
                .unwrap_or_else(|| w.to_string())
        })
        .collect()
}

const STOPWORDS: &[&str] = &[
    "about", "after", "against", "amid", "among", "back", "because", "been", "before", "being",
    "between", "breaking", "could", "during", "first", "former", "from", "have", "here", "into",
    "just", "latest", "live", "more", "most", "much", "news", "over", "report", "reportedly",
    "retains", "said", "says", "should", "some", "such", "than", "that", "their", "them", "then",
    "there", "these", "they", "this", "those", "through", "under", "update", "were", "what",
    "when", "where", "which", "while", "will", "with", "would", "your",
];

const PLACE_ALIASES: &[(&str, &str)] = &[
    ("beijing", "china"),
    ("shanghai", "china"),
    ("moscow", "russia"),
    ("kremlin", "russia"),
    ("kyiv", "ukraine"),
    ("tehran", "iran"),
    ("taipei", "taiwan"),
    ("tokyo", "japan"),
    ("seoul", "korea"),
    ("pyongyang", "korea"),
    ("delhi", "india"),
    ("islamabad", "pakistan"),
    ("jerusalem", "israel"),
    ("ankara", "turkey"),
];

//! Tolerant feed parsing for the three dialects seen in the wild: RSS 2.0,
//! RDF-RSS 1.0 and Atom 1.0. Upstream XML is frequently malformed, so the
//! parser scans with regular expressions instead of a strict XML reader: a
//! broken block is skipped, and a whole feed never errors.

use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::intel::sources::{FeedSource, MAX_PER_SOURCE};

const MAX_DESCRIPTION_CHARS: usize = 600;

/// One entry as it came off the wire, before scoring. Both `title` and
/// `link` are non-empty after trimming; the parser drops anything else.
#[derive(Clone, Debug)]
pub struct RawItem {
    pub src: String,
    pub title: String,
    pub link: String,
    pub description: String,
    pub pub_text: String,
    pub weight: f64,
    pub region: String,
}

macro_rules! cached_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).unwrap())
        }
    };
}

cached_regex!(item_re, r"(?is)<item\b[^>]*>(.*?)</item>");
cached_regex!(entry_re, r"(?is)<entry\b[^>]*>(.*?)</entry>");
cached_regex!(title_re, r"(?is)<title\b[^>]*>(.*?)</title>");
cached_regex!(link_re, r"(?is)<link\b[^>]*>(.*?)</link>");
cached_regex!(guid_re, r"(?is)<guid\b[^>]*>(.*?)</guid>");
cached_regex!(desc_re, r"(?is)<description\b[^>]*>(.*?)</description>");
cached_regex!(summary_re, r"(?is)<summary\b[^>]*>(.*?)</summary>");
cached_regex!(
    content_encoded_re,
    r"(?is)<content:encoded\b[^>]*>(.*?)</content:encoded>"
);
cached_regex!(content_re, r"(?is)<content\b[^>]*>(.*?)</content>");
cached_regex!(pub_date_re, r"(?is)<pubDate\b[^>]*>(.*?)</pubDate>");
cached_regex!(updated_re, r"(?is)<updated\b[^>]*>(.*?)</updated>");
cached_regex!(published_re, r"(?is)<published\b[^>]*>(.*?)</published>");
cached_regex!(dc_date_re, r"(?is)<dc:date\b[^>]*>(.*?)</dc:date>");
cached_regex!(
    atom_alt_link_re,
    r#"(?is)<link\b[^>]*rel=["']alternate["'][^>]*href=["']([^"']+)["']"#
);
cached_regex!(atom_href_re, r#"(?is)<link\b[^>]*href=["']([^"']+)["']"#);
cached_regex!(cdata_re, r"(?is)<!\[CDATA\[(.*?)\]\]>");
cached_regex!(numeric_entity_re, r"&#(x?)([0-9a-fA-F]+);");
cached_regex!(script_re, r"(?is)<script\b[^>]*>.*?</script>");
cached_regex!(style_re, r"(?is)<style\b[^>]*>.*?</style>");
cached_regex!(tag_re, r"(?s)<[^>]*>");
cached_regex!(ws_re, r"\s+");

/// Parse a fetched feed payload into raw items, at most [`MAX_PER_SOURCE`].
pub fn parse_feed(xml: &str, source: &FeedSource) -> Vec<RawItem> {
    // RSS 2.0 and RDF both wrap entries in <item>; Atom uses <entry>.
    let mut blocks: Vec<&str> = item_re()
        .captures_iter(xml)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    let atom = blocks.is_empty();
    if atom {
        blocks = entry_re()
            .captures_iter(xml)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect();
    }

    blocks
        .into_iter()
        .take(MAX_PER_SOURCE)
        .filter_map(|block| parse_block(block, atom, source))
        .collect()
}

fn parse_block(block: &str, atom: bool, source: &FeedSource) -> Option<RawItem> {
    let title = clean_inline(&first_capture(title_re(), block));
    let link = if atom {
        atom_link(block)
    } else {
        rss_link(block)
    };

    if title.is_empty() || link.is_empty() {
        return None;
    }

    let raw_desc = [desc_re(), summary_re(), content_encoded_re(), content_re()]
        .iter()
        .map(|re| first_capture(re, block))
        .find(|text| !text.trim().is_empty())
        .unwrap_or_default();

    let pub_text = [pub_date_re(), updated_re(), published_re(), dc_date_re()]
        .iter()
        .map(|re| first_capture(re, block))
        .find(|text| !text.trim().is_empty())
        .unwrap_or_default()
        .trim()
        .to_string();

    Some(RawItem {
        src: source.src.to_string(),
        title,
        link,
        description: clean_description(&raw_desc),
        pub_text,
        weight: source.weight,
        region: source.region.to_string(),
    })
}

fn first_capture(re: &Regex, block: &str) -> String {
    re.captures(block)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

fn rss_link(block: &str) -> String {
    let link = clean_inline(&first_capture(link_re(), block));
    if !link.is_empty() {
        return link;
    }
    // some feeds only carry the URL in <guid>
    let guid = clean_inline(&first_capture(guid_re(), block));
    if guid.starts_with("http://") || guid.starts_with("https://") {
        return guid;
    }
    String::new()
}

fn atom_link(block: &str) -> String {
    if let Some(c) = atom_alt_link_re().captures(block)
        && let Some(href) = c.get(1)
    {
        return decode_entities(href.as_str()).trim().to_string();
    }
    if let Some(c) = atom_href_re().captures(block)
        && let Some(href) = c.get(1)
    {
        return decode_entities(href.as_str()).trim().to_string();
    }
    clean_inline(&first_capture(link_re(), block))
}

/// CDATA unwrap + entity decode + tag strip + whitespace collapse, for
/// titles and links. Feeds routinely entity-encode embedded markup, so
/// entities are decoded before tags are removed.
fn clean_inline(text: &str) -> String {
    let text = unwrap_cdata(text);
    let text = decode_entities(&text);
    let text = tag_re().replace_all(&text, " ");
    collapse_ws(&text)
}

/// Descriptions additionally lose scripts and styles, and are capped so
/// one verbose feed cannot dominate response bodies.
fn clean_description(text: &str) -> String {
    let text = unwrap_cdata(text);
    let text = decode_entities(&text);
    let text = script_re().replace_all(&text, " ");
    let text = style_re().replace_all(&text, " ");
    let text = tag_re().replace_all(&text, " ");
    let text = collapse_ws(&text);
    if text.chars().count() > MAX_DESCRIPTION_CHARS {
        text.chars().take(MAX_DESCRIPTION_CHARS).collect()
    } else {
        text
    }
}

fn unwrap_cdata(text: &str) -> String {
    cdata_re().replace_all(text, "$1").into_owned()
}

pub fn decode_entities(text: &str) -> String {
    let text = numeric_entity_re().replace_all(text, |caps: &Captures| {
        let radix = if caps[1].is_empty() { 10 } else { 16 };
        u32::from_str_radix(&caps[2], radix)
            .ok()
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_default()
    });
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        // decoded last so "&amp;lt;" ends up as "&lt;", not "<"
        .replace("&amp;", "&")
}

fn collapse_ws(text: &str) -> String {
    ws_re().replace_all(text, " ").trim().to_string()
}

/// Published timestamp in epoch ms. Feeds disagree on formats, so RFC 2822
/// (RSS), RFC 3339 (Atom/Dublin Core) and bare dates are all attempted;
/// anything unparsable becomes `fallback_ms`.
pub fn parse_pub_date(text: &str, fallback_ms: i64) -> i64 {
    let text = text.trim();
    if text.is_empty() {
        return fallback_ms;
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc2822(text) {
        return dt.timestamp_millis();
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(text) {
        return dt.timestamp_millis();
    }
    if let Ok(date) = chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d")
        && let Some(dt) = date.and_hms_opt(0, 0, 0)
    {
        return dt.and_utc().timestamp_millis();
    }
    fallback_ms
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_source() -> FeedSource {
        FeedSource {
            src: "test",
            url: "https://example.com/rss",
            weight: 0.8,
            region: "Global",
        }
    }

    #[test]
    fn parses_rss_with_cdata_and_entities() {
        let xml = r#"<?xml version="1.0"?>
        <rss version="2.0"><channel>
          <item>
            <title><![CDATA[Missile test &amp; response]]></title>
            <link>https://example.com/a</link>
            <description>Tom &amp; Jerry &lt;b&gt;escalate&lt;/b&gt; &#x263A; &#8212; update</description>
            <pubDate>Tue, 10 Jun 2025 04:00:00 GMT</pubDate>
          </item>
        </channel></rss>"#;

        let items = parse_feed(xml, &test_source());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Missile test & response");
        assert_eq!(items[0].link, "https://example.com/a");
        assert!(items[0].description.contains("Tom & Jerry"));
        assert!(items[0].description.contains('☺'));
        assert!(items[0].description.contains('—'));
        // markup stripped after entity handling
        assert!(!items[0].description.contains('<'));
        assert_eq!(items[0].pub_text, "Tue, 10 Jun 2025 04:00:00 GMT");
    }

    #[test]
    fn atom_prefers_rel_alternate_href() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom">
          <entry>
            <title>Quake hits coast</title>
            <link rel="self" href="https://example.com/self"/>
            <link rel="alternate" href="https://example.com/article"/>
            <summary>Strong earthquake reported.</summary>
            <updated>2025-06-10T04:00:00Z</updated>
          </entry>
        </feed>"#;

        let items = parse_feed(xml, &test_source());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].link, "https://example.com/article");
        assert_eq!(items[0].pub_text, "2025-06-10T04:00:00Z");
    }

    #[test]
    fn atom_falls_back_to_any_href() {
        let xml = r#"<feed><entry>
            <title>T</title>
            <link href="https://example.com/only"/>
          </entry></feed>"#;

        let items = parse_feed(xml, &test_source());
        assert_eq!(items[0].link, "https://example.com/only");
    }

    #[test]
    fn rdf_items_and_dc_date_are_understood() {
        let xml = r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
          <item rdf:about="https://example.com/r">
            <title>Pipeline shut down</title>
            <link>https://example.com/r</link>
            <dc:date>2025-06-10T04:00:00Z</dc:date>
          </item>
        </rdf:RDF>"#;

        let items = parse_feed(xml, &test_source());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].pub_text, "2025-06-10T04:00:00Z");
    }

    #[test]
    fn rss_link_falls_back_to_url_shaped_guid() {
        let xml = r#"<rss><channel><item>
            <title>Sanctions expanded</title>
            <guid>https://example.com/from-guid</guid>
          </item></channel></rss>"#;

        let items = parse_feed(xml, &test_source());
        assert_eq!(items[0].link, "https://example.com/from-guid");
    }

    #[test]
    fn non_url_guid_does_not_count_as_link() {
        let xml = r#"<rss><channel><item>
            <title>Orphaned</title>
            <guid isPermaLink="false">abc-123</guid>
          </item></channel></rss>"#;

        assert!(parse_feed(xml, &test_source()).is_empty());
    }

    #[test]
    fn items_missing_title_or_link_are_dropped() {
        let xml = r#"<rss><channel>
          <item><title>Has title only</title></item>
          <item><link>https://example.com/link-only</link></item>
          <item><title>Complete</title><link>https://example.com/ok</link></item>
        </channel></rss>"#;

        let items = parse_feed(xml, &test_source());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Complete");
    }

    #[test]
    fn malformed_block_is_skipped_not_fatal() {
        let xml = r#"<rss><channel>
          <item><title>Good</title><link>https://example.com/1</link></item>
          <item><title>Broken &# garbage
          <item><title>Also good</title><link>https://example.com/2</link></item>
        </channel></rss>"#;

        // the unterminated block swallows up to the next </item>; the feed
        // still yields the well-formed remainder without erroring
        let items = parse_feed(xml, &test_source());
        assert!(!items.is_empty());
        assert!(items.iter().any(|i| i.link == "https://example.com/1"));
    }

    #[test]
    fn entries_are_capped_per_source() {
        let mut xml = String::from("<rss><channel>");
        for i in 0..150 {
            xml.push_str(&format!(
                "<item><title>Item {i}</title><link>https://example.com/{i}</link></item>"
            ));
        }
        xml.push_str("</channel></rss>");

        assert_eq!(parse_feed(&xml, &test_source()).len(), MAX_PER_SOURCE);
    }

    #[test]
    fn scripts_and_styles_are_removed_from_descriptions() {
        let xml = r#"<rss><channel><item>
            <title>T</title><link>https://example.com/x</link>
            <description><![CDATA[<script>alert(1)</script><style>p{}</style><p>Visible  text</p>]]></description>
          </item></channel></rss>"#;

        let items = parse_feed(xml, &test_source());
        assert_eq!(items[0].description, "Visible text");
    }

    #[test]
    fn content_encoded_backfills_missing_description() {
        let xml = r#"<rss><channel><item>
            <title>T</title><link>https://example.com/x</link>
            <content:encoded><![CDATA[<p>Full body text</p>]]></content:encoded>
          </item></channel></rss>"#;

        let items = parse_feed(xml, &test_source());
        assert_eq!(items[0].description, "Full body text");
    }

    #[test]
    fn long_descriptions_are_truncated() {
        let long = "word ".repeat(500);
        let xml = format!(
            "<rss><channel><item><title>T</title><link>https://example.com/x</link><description>{long}</description></item></channel></rss>"
        );
        let items = parse_feed(&xml, &test_source());
        assert!(items[0].description.chars().count() <= MAX_DESCRIPTION_CHARS);
    }

    #[test]
    fn date_formats_fall_back_to_now() {
        assert_eq!(
            parse_pub_date("Tue, 10 Jun 2025 04:00:00 GMT", 0),
            1_749_528_000_000
        );
        assert_eq!(
            parse_pub_date("2025-06-10T04:00:00Z", 0),
            1_749_528_000_000
        );
        assert_eq!(parse_pub_date("2025-06-10", 0), 1_749_513_600_000);
        assert_eq!(parse_pub_date("not a date", 42), 42);
        assert_eq!(parse_pub_date("", 42), 42);
    }

    #[test]
    fn empty_feed_yields_empty_list() {
        assert!(parse_feed("<rss><channel></channel></rss>", &test_source()).is_empty());
        assert!(parse_feed("", &test_source()).is_empty());
    }
}

use serde::Serialize;

/// One registered upstream feed. The table is fixed for the lifetime of a
/// deployment; `weight` feeds the scorer's confidence term.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct FeedSource {
    pub src: &'static str,
    pub url: &'static str,
    pub weight: f64,
    pub region: &'static str,
}

/// Entries parsed per feed before the tail is ignored.
pub const MAX_PER_SOURCE: usize = 120;

pub fn sources() -> &'static [FeedSource] {
    SOURCES
}

static SOURCES: &[FeedSource] = &[
    FeedSource {
        src: "bbc-world",
        url: "https://feeds.bbci.co.uk/news/world/rss.xml",
        weight: 0.9,
        region: "Global",
    },
    FeedSource {
        src: "reuters-world",
        url: "https://www.reutersagency.com/feed/?best-topics=world",
        weight: 0.95,
        region: "Global",
    },
    FeedSource {
        src: "ap-world",
        url: "https://apnews.com/hub/world-news/rss",
        weight: 0.95,
        region: "Global",
    },
    FeedSource {
        src: "aljazeera",
        url: "https://www.aljazeera.com/xml/rss/all.xml",
        weight: 0.8,
        region: "Middle East",
    },
    FeedSource {
        src: "dw-world",
        url: "https://rss.dw.com/rdf/rss-en-world",
        weight: 0.8,
        region: "Europe",
    },
    FeedSource {
        src: "france24",
        url: "https://www.france24.com/en/rss",
        weight: 0.75,
        region: "Europe",
    },
    FeedSource {
        src: "guardian-world",
        url: "https://www.theguardian.com/world/rss",
        weight: 0.85,
        region: "Europe",
    },
    FeedSource {
        src: "nhk-world",
        url: "https://www3.nhk.or.jp/nhkworld/en/news/feeds/",
        weight: 0.8,
        region: "Asia",
    },
    FeedSource {
        src: "scmp",
        url: "https://www.scmp.com/rss/91/feed",
        weight: 0.7,
        region: "Asia",
    },
    FeedSource {
        src: "times-of-india",
        url: "https://timesofindia.indiatimes.com/rssfeeds/296589292.cms",
        weight: 0.6,
        region: "Asia",
    },
    FeedSource {
        src: "korea-herald",
        url: "https://www.koreaherald.com/rss/newsAll",
        weight: 0.6,
        region: "Asia",
    },
    FeedSource {
        src: "kyiv-independent",
        url: "https://kyivindependent.com/feed",
        weight: 0.7,
        region: "Europe",
    },
    FeedSource {
        src: "moscow-times",
        url: "https://www.themoscowtimes.com/rss/news",
        weight: 0.6,
        region: "Europe",
    },
    FeedSource {
        src: "times-of-israel",
        url: "https://www.timesofisrael.com/feed/",
        weight: 0.65,
        region: "Middle East",
    },
    FeedSource {
        src: "al-monitor",
        url: "https://www.al-monitor.com/rss",
        weight: 0.65,
        region: "Middle East",
    },
    FeedSource {
        src: "africanews",
        url: "https://www.africanews.com/feed/rss",
        weight: 0.6,
        region: "Africa",
    },
    FeedSource {
        src: "mercopress",
        url: "https://en.mercopress.com/rss/",
        weight: 0.55,
        region: "Latin America",
    },
    FeedSource {
        src: "cbc-world",
        url: "https://www.cbc.ca/webfeed/rss/rss-world",
        weight: 0.75,
        region: "North America",
    },
    FeedSource {
        src: "npr-world",
        url: "https://feeds.npr.org/1004/rss.xml",
        weight: 0.8,
        region: "North America",
    },
    FeedSource {
        src: "abc-au",
        url: "https://www.abc.net.au/news/feed/51120/rss.xml",
        weight: 0.7,
        region: "Oceania",
    },
    FeedSource {
        src: "defense-news",
        url: "https://www.defensenews.com/arc/outboundfeeds/rss/",
        weight: 0.7,
        region: "Global",
    },
    FeedSource {
        src: "breaking-defense",
        url: "https://breakingdefense.com/feed/",
        weight: 0.65,
        region: "North America",
    },
    FeedSource {
        src: "war-on-the-rocks",
        url: "https://warontherocks.com/feed/",
        weight: 0.6,
        region: "Global",
    },
    FeedSource {
        src: "bellingcat",
        url: "https://www.bellingcat.com/feed/",
        weight: 0.7,
        region: "Global",
    },
    FeedSource {
        src: "hacker-news-sec",
        url: "https://thehackernews.com/feeds/posts/default",
        weight: 0.6,
        region: "Global",
    },
    FeedSource {
        src: "bleeping-computer",
        url: "https://www.bleepingcomputer.com/feed/",
        weight: 0.65,
        region: "Global",
    },
    FeedSource {
        src: "krebs",
        url: "https://krebsonsecurity.com/feed/",
        weight: 0.75,
        region: "North America",
    },
    FeedSource {
        src: "space-news",
        url: "https://spacenews.com/feed/",
        weight: 0.7,
        region: "Global",
    },
    FeedSource {
        src: "nasa-breaking",
        url: "https://www.nasa.gov/news-release/feed/",
        weight: 0.8,
        region: "North America",
    },
    FeedSource {
        src: "ars-technica",
        url: "https://feeds.arstechnica.com/arstechnica/index",
        weight: 0.65,
        region: "North America",
    },
    FeedSource {
        src: "mit-tech-review",
        url: "https://www.technologyreview.com/feed/",
        weight: 0.7,
        region: "North America",
    },
    FeedSource {
        src: "nature-news",
        url: "https://www.nature.com/nature.rss",
        weight: 0.85,
        region: "Global",
    },
    FeedSource {
        src: "euronews",
        url: "https://www.euronews.com/rss",
        weight: 0.7,
        region: "Europe",
    },
    FeedSource {
        src: "politico-eu",
        url: "https://www.politico.eu/feed/",
        weight: 0.7,
        region: "Europe",
    },
    FeedSource {
        src: "rferl",
        url: "https://www.rferl.org/api/zrqiteuuir",
        weight: 0.7,
        region: "Europe",
    },
    FeedSource {
        src: "yonhap",
        url: "https://en.yna.co.kr/RSS/news.xml",
        weight: 0.7,
        region: "Asia",
    },
    FeedSource {
        src: "cna-asia",
        url: "https://www.channelnewsasia.com/api/v1/rss-outbound-feed?_format=xml",
        weight: 0.7,
        region: "Asia",
    },
    FeedSource {
        src: "japan-times",
        url: "https://www.japantimes.co.jp/feed/",
        weight: 0.65,
        region: "Asia",
    },
    FeedSource {
        src: "straits-times",
        url: "https://www.straitstimes.com/news/world/rss.xml",
        weight: 0.65,
        region: "Asia",
    },
    FeedSource {
        src: "taipei-times",
        url: "https://www.taipeitimes.com/xml/index.rss",
        weight: 0.6,
        region: "Asia",
    },
    FeedSource {
        src: "arab-news",
        url: "https://www.arabnews.com/rss.xml",
        weight: 0.6,
        region: "Middle East",
    },
    FeedSource {
        src: "middle-east-eye",
        url: "https://www.middleeasteye.net/rss",
        weight: 0.55,
        region: "Middle East",
    },
    FeedSource {
        src: "allafrica",
        url: "https://allafrica.com/tools/headlines/rdf/latest/headlines.rdf",
        weight: 0.55,
        region: "Africa",
    },
    FeedSource {
        src: "batimes",
        url: "https://www.batimes.com.ar/feed",
        weight: 0.55,
        region: "Latin America",
    },
    FeedSource {
        src: "c4isrnet",
        url: "https://www.c4isrnet.com/arc/outboundfeeds/rss/",
        weight: 0.65,
        region: "North America",
    },
    FeedSource {
        src: "defense-one",
        url: "https://www.defenseone.com/rss/all/",
        weight: 0.7,
        region: "North America",
    },
    FeedSource {
        src: "security-week",
        url: "https://www.securityweek.com/feed/",
        weight: 0.6,
        region: "Global",
    },
    FeedSource {
        src: "cyberscoop",
        url: "https://cyberscoop.com/feed/",
        weight: 0.6,
        region: "North America",
    },
    FeedSource {
        src: "dark-reading",
        url: "https://www.darkreading.com/rss.xml",
        weight: 0.6,
        region: "Global",
    },
    FeedSource {
        src: "esa-news",
        url: "https://www.esa.int/rssfeed/Our_Activities",
        weight: 0.75,
        region: "Europe",
    },
    FeedSource {
        src: "spaceflight-now",
        url: "https://spaceflightnow.com/feed/",
        weight: 0.6,
        region: "Global",
    },
    FeedSource {
        src: "un-news",
        url: "https://news.un.org/feed/subscribe/en/news/all/rss.xml",
        weight: 0.8,
        region: "Global",
    },
];

use serde::Serialize;

/// Declarative label dictionary entry. Matching is substring and
/// case-insensitive; the caller supplies an already-lowercased haystack.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct LabelDef {
    pub label: &'static str,
    pub keywords: &'static [&'static str],
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct GeoBucket {
    pub bucket: &'static str,
    pub geos: &'static [&'static str],
}

/// Labels whose keywords hit the haystack, in declaration order, deduped.
pub fn match_labels(dict: &'static [LabelDef], haystack: &str) -> Vec<String> {
    let mut out = Vec::new();
    for def in dict {
        if def.keywords.iter().any(|kw| haystack.contains(kw)) && !out.iter().any(|l| l == def.label)
        {
            out.push(def.label.to_string());
        }
    }
    out
}

pub static TOPICS: &[LabelDef] = &[
    LabelDef {
        label: "PRC/China",
        keywords: &[
            "china", "chinese", "beijing", "shanghai", "prc", "xi jinping", "pla ", "taiwan strait",
        ],
    },
    LabelDef {
        label: "Russia/Ukraine",
        keywords: &[
            "russia", "russian", "moscow", "kremlin", "ukraine", "ukrainian", "kyiv", "donbas",
            "crimea",
        ],
    },
    LabelDef {
        label: "Space/EO",
        keywords: &[
            "satellite", "space", "orbit", "orbital", "launch vehicle", "launches", "rocket",
            "spacecraft", "earth observation", "reconnaissance satellite",
        ],
    },
    LabelDef {
        label: "Cyber",
        keywords: &[
            "cyber", "ransomware", "malware", "breach", "zero-day", "phishing", "botnet", "ddos",
            "exploit", "vulnerability", "apt ",
        ],
    },
    LabelDef {
        label: "Conflict/Military",
        keywords: &[
            "military", "missile", "airstrike", "air strike", "troops", "offensive", "ceasefire",
            "artillery", "drone strike", "warship", "frontline", "invasion",
        ],
    },
    LabelDef {
        label: "Nuclear/WMD",
        keywords: &[
            "nuclear", "enrichment", "warhead", "ballistic", "icbm", "chemical weapons",
            "proliferation", "iaea",
        ],
    },
    LabelDef {
        label: "Terrorism",
        keywords: &[
            "terror", "extremist", "insurgent", "islamic state", "isis", "al-qaeda", "bombing",
            "hostage",
        ],
    },
    LabelDef {
        label: "Diplomacy",
        keywords: &[
            "diplomat", "summit", "sanctions", "treaty", "negotiation", "foreign minister",
            "ambassador", "united nations", "security council",
        ],
    },
    LabelDef {
        label: "Economy/Trade",
        keywords: &[
            "economy", "tariff", "inflation", "trade deal", "export controls", "supply chain",
            "central bank", "recession", "gdp",
        ],
    },
    LabelDef {
        label: "Energy",
        keywords: &[
            "energy", "pipeline", "oil price", "opec", "lng", "natural gas", "refinery",
            "power grid",
        ],
    },
    LabelDef {
        label: "Elections/Politics",
        keywords: &[
            "election", "ballot", "parliament", "coalition", "president-elect", "referendum",
            "coup", "impeach",
        ],
    },
    LabelDef {
        label: "AI/Tech",
        keywords: &[
            "artificial intelligence", " ai ", "semiconductor", "chip ", "quantum", "biotech",
            "large language model",
        ],
    },
    LabelDef {
        label: "Health/Bio",
        keywords: &[
            "outbreak", "pandemic", "virus", "vaccine", "epidemic", "pathogen", "who ",
        ],
    },
    LabelDef {
        label: "Climate/Disaster",
        keywords: &[
            "earthquake", "hurricane", "typhoon", "wildfire", "flood", "drought", "climate",
            "heatwave", "eruption",
        ],
    },
    LabelDef {
        label: "Maritime",
        keywords: &[
            "maritime", "shipping lane", "strait of hormuz", "south china sea", "red sea",
            "naval", "tanker", "piracy",
        ],
    },
    LabelDef {
        label: "Migration",
        keywords: &[
            "migrant", "refugee", "asylum", "border crossing", "displacement",
        ],
    },
];

pub static GEOS: &[LabelDef] = &[
    LabelDef {
        label: "Asia",
        keywords: &[
            "asia", "china", "beijing", "taiwan", "japan", "tokyo", "korea", "seoul", "pyongyang",
            "india", "delhi", "pakistan", "philippines", "vietnam", "indonesia",
        ],
    },
    LabelDef {
        label: "Europe",
        keywords: &[
            "europe", "european union", " eu ", "ukraine", "kyiv", "russia", "moscow", "germany",
            "france", "poland", "britain", "uk ", "nato",
        ],
    },
    LabelDef {
        label: "Middle East",
        keywords: &[
            "middle east", "israel", "gaza", "iran", "tehran", "saudi", "yemen", "syria", "iraq",
            "lebanon", "qatar",
        ],
    },
    LabelDef {
        label: "Africa",
        keywords: &[
            "africa", "nigeria", "ethiopia", "sudan", "kenya", "sahel", "congo", "somalia",
        ],
    },
    LabelDef {
        label: "North America",
        keywords: &[
            "united states", "washington", "pentagon", "white house", "canada", "mexico",
            "north america",
        ],
    },
    LabelDef {
        label: "Latin America",
        keywords: &[
            "latin america", "brazil", "argentina", "venezuela", "colombia", "chile", "peru",
            "caribbean",
        ],
    },
    LabelDef {
        label: "Oceania",
        keywords: &[
            "australia", "new zealand", "pacific islands", "oceania", "papua",
        ],
    },
    LabelDef {
        label: "Arctic",
        keywords: &["arctic", "svalbard", "northern sea route", "greenland"],
    },
];

pub static GEO_BUCKETS: &[GeoBucket] = &[
    GeoBucket {
        bucket: "Indo-Pacific",
        geos: &["Asia", "Oceania"],
    },
    GeoBucket {
        bucket: "EMEA",
        geos: &["Europe", "Middle East", "Africa"],
    },
    GeoBucket {
        bucket: "Americas",
        geos: &["North America", "Latin America"],
    },
    GeoBucket {
        bucket: "Polar",
        geos: &["Arctic"],
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_preserves_declaration_order() {
        let hay = "cyber attack hits beijing satellite ground station";
        let labels = match_labels(TOPICS, hay);
        let china = labels.iter().position(|l| l == "PRC/China").unwrap();
        let space = labels.iter().position(|l| l == "Space/EO").unwrap();
        let cyber = labels.iter().position(|l| l == "Cyber").unwrap();
        assert!(china < space && space < cyber);
    }

    #[test]
    fn match_deduplicates_labels() {
        // two PRC/China keywords in one haystack still yield one label
        let labels = match_labels(TOPICS, "china and beijing in talks");
        assert_eq!(labels.iter().filter(|l| *l == "PRC/China").count(), 1);
    }

    #[test]
    fn no_hits_yields_empty() {
        assert!(match_labels(TOPICS, "gardening tips for spring").is_empty());
    }

    #[test]
    fn geo_buckets_reference_declared_geos() {
        for bucket in GEO_BUCKETS {
            for geo in bucket.geos {
                assert!(
                    GEOS.iter().any(|g| g.label == *geo),
                    "{geo} missing from GEOS"
                );
            }
        }
    }
}

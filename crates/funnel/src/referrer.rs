//! Referrer parsing. Raw referrer strings are normalized into a
//! `{name, type, domain}` triple, using an injected lookup table for
//! well-known sources. Malformed values never error; they fail soft into
//! a best-effort triple.

use url::Url;

use beacon_core::types::ParsedReferrer;

/// A recognized referrer source.
#[derive(Debug, Clone, Copy)]
pub struct KnownReferrer {
    pub name: &'static str,
    pub kind: &'static str,
}

/// Read-only known-referrer table, injected so it can be swapped in tests.
pub trait ReferrerLookup: Send + Sync {
    fn lookup(&self, domain: &str) -> Option<KnownReferrer>;
}

/// Built-in table covering the major search engines and social platforms.
pub struct KnownReferrerTable;

const KNOWN_REFERRERS: &[(&str, &str, &str)] = &[
    ("google.com", "Google", "search"),
    ("bing.com", "Bing", "search"),
    ("duckduckgo.com", "DuckDuckGo", "search"),
    ("search.yahoo.com", "Yahoo Search", "search"),
    ("yahoo.com", "Yahoo", "search"),
    ("baidu.com", "Baidu", "search"),
    ("yandex.ru", "Yandex", "search"),
    ("ecosia.org", "Ecosia", "search"),
    ("facebook.com", "Facebook", "social"),
    ("instagram.com", "Instagram", "social"),
    ("twitter.com", "Twitter", "social"),
    ("x.com", "X", "social"),
    ("t.co", "X", "social"),
    ("linkedin.com", "LinkedIn", "social"),
    ("reddit.com", "Reddit", "social"),
    ("pinterest.com", "Pinterest", "social"),
    ("youtube.com", "YouTube", "social"),
    ("tiktok.com", "TikTok", "social"),
    ("news.ycombinator.com", "Hacker News", "social"),
    ("producthunt.com", "Product Hunt", "social"),
];

impl ReferrerLookup for KnownReferrerTable {
    fn lookup(&self, domain: &str) -> Option<KnownReferrer> {
        KNOWN_REFERRERS
            .iter()
            .find(|(known_domain, _, _)| *known_domain == domain)
            .map(|(_, name, kind)| KnownReferrer { name, kind })
    }
}

/// Parse a raw referrer string into its display triple.
pub fn parse_referrer(raw: &str, lookup: &dyn ReferrerLookup) -> ParsedReferrer {
    let trimmed = raw.trim();
    if trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("direct")
        || trimmed.eq_ignore_ascii_case("(direct)")
    {
        return ParsedReferrer {
            name: "Direct".to_string(),
            kind: "direct".to_string(),
            domain: String::new(),
        };
    }

    let host = Url::parse(trimmed)
        .ok()
        .and_then(|url| url.host_str().map(str::to_ascii_lowercase));

    match host {
        Some(host) => {
            let domain = host.trim_start_matches("www.").to_string();
            match lookup.lookup(&domain) {
                Some(known) => ParsedReferrer {
                    name: known.name.to_string(),
                    kind: known.kind.to_string(),
                    domain,
                },
                None => ParsedReferrer {
                    name: domain.clone(),
                    kind: "referrer".to_string(),
                    domain,
                },
            }
        }
        None => ParsedReferrer {
            name: trimmed.to_string(),
            kind: "referrer".to_string(),
            domain: String::new(),
        },
    }
}

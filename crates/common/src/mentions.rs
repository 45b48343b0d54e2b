// `@slug` mention extraction, used to route messages to agent participants.

use std::sync::OnceLock;

use regex::Regex;

fn mention_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"@(\w+)").expect("mention pattern should compile"))
}

/// Extract mention slugs from message content, lowercased, in order of
/// appearance. Duplicates are preserved.
///
/// The scan has no notion of email-address boundaries: `user@example.com`
/// yields a mention of `example`. Callers that care must filter upstream.
pub fn parse_mentions(content: &str) -> Vec<String> {
    mention_pattern()
        .captures_iter(content)
        .map(|captures| captures[1].to_lowercase())
        .collect()
}

/// True when `slug` is mentioned in `content`. Matching is case-insensitive
/// and exact: `@vibes` does not satisfy a query for `vibe`.
pub fn has_mention(content: &str, slug: &str) -> bool {
    let slug = slug.to_lowercase();
    parse_mentions(content).iter().any(|mention| *mention == slug)
}

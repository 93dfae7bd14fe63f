use reqwest::Url;

const ENTITIES: &[(&str, &str)] = &[
    ("&amp;", "&"),
    ("&#038;", "&"),
    ("&#8211;", "-"),
    ("&#8212;", "-"),
    ("&ndash;", "-"),
    ("&mdash;", "-"),
    ("&#039;", "'"),
    ("&#39;", "'"),
    ("&#8217;", "'"),
    ("&rsquo;", "'"),
    ("&quot;", "\""),
    ("&nbsp;", " "),
    ("&lt;", "<"),
    ("&gt;", ">"),
];

/// Decode the entities scrapers commonly leave behind and collapse whitespace
pub fn clean_text(raw: &str) -> String {
    let mut text = raw.to_string();
    for (entity, replacement) in ENTITIES {
        if text.contains(entity) {
            text = text.replace(entity, replacement);
        }
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Prefix a title once, e.g. "Toronto - "
pub fn apply_title_prefix(title: &str, prefix: Option<&str>) -> String {
    match prefix.map(str::trim).filter(|p| !p.is_empty()) {
        Some(prefix) if !title.starts_with(prefix) => {
            clean_text(&format!("{} {}", prefix, title))
        }
        _ => title.to_string(),
    }
}

/// Resolve a possibly relative URL against `base`. `None` for empty or unusable input.
pub fn absolute_url(raw: &str, base: Option<&str>) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(url) = Url::parse(raw) {
        return matches!(url.scheme(), "http" | "https").then(|| url.to_string());
    }
    let base = Url::parse(base?.trim()).ok()?;
    base.join(raw).ok().map(|url| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("  Rock &amp; Roll\n\t Night "), "Rock & Roll Night");
        assert_eq!(clean_text("Darrell&#039;s Tavern &#8211; Live"), "Darrell's Tavern - Live");
        assert_eq!(clean_text(""), "");
    }

    #[test]
    fn test_title_prefix_applied_once() {
        assert_eq!(apply_title_prefix("Jazz Night", Some("Toronto -")), "Toronto - Jazz Night");
        assert_eq!(apply_title_prefix("Toronto - Jazz Night", Some("Toronto -")), "Toronto - Jazz Night");
        assert_eq!(apply_title_prefix("Jazz Night", None), "Jazz Night");
        assert_eq!(apply_title_prefix("Jazz Night", Some("  ")), "Jazz Night");
    }

    #[test]
    fn test_absolute_url() {
        let base = Some("https://www.mississauga.ca/events-and-attractions/");
        assert_eq!(
            absolute_url("/wp-content/uploads/market.jpg", base).as_deref(),
            Some("https://www.mississauga.ca/wp-content/uploads/market.jpg")
        );
        assert_eq!(
            absolute_url("https://cdn.example.com/a.png", base).as_deref(),
            Some("https://cdn.example.com/a.png")
        );
        assert_eq!(absolute_url("", base), None);
        assert_eq!(absolute_url("/relative.png", None), None);
        assert_eq!(absolute_url("javascript:void(0)", base), None);
    }
}

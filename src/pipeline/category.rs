use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A category and the keywords that imply it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub name: String,
    pub keywords: Vec<String>,
}

impl CategoryRule {
    pub fn new(name: &str, keywords: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// Keyword-substring tagging of event text
#[derive(Debug, Clone)]
pub struct CategoryClassifier {
    /// Flattened `(keyword, category)` pairs, keywords already lower-cased
    table: Vec<(String, String)>,
    fallback: String,
}

impl CategoryClassifier {
    pub fn new(rules: &[CategoryRule], fallback: impl Into<String>) -> Self {
        let table = rules
            .iter()
            .flat_map(|rule| {
                rule.keywords
                    .iter()
                    .map(|k| k.trim().to_lowercase())
                    .filter(|k| !k.is_empty())
                    .map(move |k| (k, rule.name.clone()))
            })
            .collect();
        Self {
            table,
            fallback: fallback.into(),
        }
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    /// Categories whose keywords appear in `title + ' ' + description`, plus `context_tags`.
    ///
    /// One text can match many categories. When nothing matches, the fallback
    /// category is added so the result is never only the context tags.
    pub fn classify(&self, title: &str, description: &str, context_tags: &[String]) -> BTreeSet<String> {
        self.classify_with_fallback(title, description, context_tags).0
    }

    /// Same as [`classify`](Self::classify), also reporting whether the fallback was used
    pub fn classify_with_fallback(
        &self,
        title: &str,
        description: &str,
        context_tags: &[String],
    ) -> (BTreeSet<String>, bool) {
        let text = format!("{} {}", title, description).to_lowercase();

        let mut categories: BTreeSet<String> = self
            .table
            .iter()
            .filter(|(keyword, _)| text.contains(keyword.as_str()))
            .map(|(_, category)| category.clone())
            .collect();

        let content_matched = categories
            .iter()
            .any(|category| !context_tags.contains(category));

        categories.extend(context_tags.iter().filter(|t| !t.trim().is_empty()).cloned());

        if !content_matched {
            categories.insert(self.fallback.clone());
        }
        (categories, !content_matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{default_category_rules, DEFAULT_FALLBACK_CATEGORY};

    fn classifier() -> CategoryClassifier {
        CategoryClassifier::new(&default_category_rules(), DEFAULT_FALLBACK_CATEGORY)
    }

    #[test]
    fn test_music_keyword_plus_city_tag() {
        let categories = classifier().classify("Jazz Night at the Lounge", "", &["Toronto".to_string()]);
        assert!(categories.contains("Music"));
        assert!(categories.contains("Toronto"));
        assert!(categories.len() > 1);
    }

    #[test]
    fn test_text_can_match_many_categories() {
        let categories = classifier().classify(
            "Port Credit Busker Festival",
            "Street performers, musicians, artists and food vendors for the whole family",
            &[],
        );
        for expected in ["Festival", "Music", "Food", "Family", "Culture"] {
            assert!(categories.contains(expected), "missing {expected}: {categories:?}");
        }
        assert!(!categories.contains(DEFAULT_FALLBACK_CATEGORY));
    }

    #[test]
    fn test_no_match_adds_fallback() {
        let tags = vec!["Mississauga".to_string(), "GTA".to_string()];
        let categories = classifier().classify("Council Q&A", "Bring questions", &tags);
        let expected: BTreeSet<String> = ["Mississauga", "GTA", DEFAULT_FALLBACK_CATEGORY]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(categories, expected);
    }

    #[test]
    fn test_never_empty() {
        let categories = classifier().classify("", "", &[]);
        assert_eq!(categories.len(), 1);
        assert!(categories.contains(DEFAULT_FALLBACK_CATEGORY));
    }

    #[test]
    fn test_duplicate_hits_collapse() {
        let classifier = CategoryClassifier::new(
            &[CategoryRule::new("Music", &["jazz", "band", "JAZZ"])],
            "Event",
        );
        let categories = classifier.classify("Jazz band", "more jazz", &[]);
        assert_eq!(categories.len(), 1);
        assert!(categories.contains("Music"));
    }

    #[test]
    fn test_context_tag_matching_keyword_still_gets_fallback() {
        let classifier = CategoryClassifier::new(&[CategoryRule::new("Toronto", &["toronto"])], "Event");
        let categories = classifier.classify("Toronto Meetup", "", &["Toronto".to_string()]);
        assert!(categories.contains("Event"));
    }
}

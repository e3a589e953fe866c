//! Article metadata: schema.org JSON-LD first, then OpenGraph, Twitter,
//! Dublin Core and plain `<meta>` tags.

use std::collections::HashMap;
use std::sync::LazyLock;

use kuchiki::NodeRef;
use regex::Regex;
use serde_json::Value;

use super::dom::{attr, descendants_by_tag, inner_text};

static JSON_LD_ARTICLE_TYPES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^Article|AdvertiserContentArticle|NewsArticle|AnalysisNewsArticle|AskPublicQuestionNewsArticle|BackgroundNewsArticle|OpinionNewsArticle|ReportageNewsArticle|ReviewNewsArticle|Report|SatiricalArticle|ScholarlyArticle|MedicalScholarlyArticle|SocialMediaPosting|BlogPosting|LiveBlogPosting|DiscussionForumPosting|TechArticle|APIReference$",
    )
    .expect("Invalid JSON-LD type regex")
});
static SCHEMA_ORG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://schema\.org/?$").expect("Invalid schema.org regex")
});
static CDATA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*<!\[CDATA\[|\]\]>\s*$").expect("Invalid CDATA regex")
});
static META_PROPERTY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\s*(article|dc|dcterm|og|twitter)\s*:\s*(author|creator|description|published_time|title|site_name)\s*",
    )
    .expect("Invalid meta property regex")
});
static META_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:(dc|dcterm|og|twitter|parsely|weibo:(article|webpage))\s*[-.:]\s*)?(author|creator|pub-date|description|title|site_name)\s*$",
    )
    .expect("Invalid meta name regex")
});
static TITLE_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" [|\-\\/>»] ").expect("Invalid title separator regex"));
static HIERARCHICAL_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r" [\\/>»] ").expect("Invalid hierarchical separator regex")
});
static BEFORE_LAST_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(.*)[|\-\\/>»] .*").expect("Invalid title prefix regex"));
static AFTER_FIRST_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^|\-\\/>»]*[|\-\\/>»](.*)").expect("Invalid title suffix regex")
});
static SEPARATOR_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[|\-\\/>»]+").expect("Invalid separator run regex"));
static NON_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\W+").expect("Invalid non-word regex"));

/// Titles this similar are treated as the same title.
const TITLE_SIMILARITY: f64 = 0.75;

/// Best-effort article metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Metadata {
    pub title: Option<String>,
    pub byline: Option<String>,
    pub excerpt: Option<String>,
    pub site_name: Option<String>,
    pub published_time: Option<String>,
}

/// Reads the first schema.org article object from `application/ld+json` scripts.
pub(crate) fn json_ld(doc: &NodeRef) -> Metadata {
    for script in descendants_by_tag(doc, &["script"]) {
        if attr(&script, "type").as_deref() != Some("application/ld+json") {
            continue;
        }
        let raw = script.text_contents();
        let content = CDATA.replace_all(&raw, "");
        let Ok(parsed) = serde_json::from_str::<Value>(&content) else {
            continue;
        };
        let Some(article) = article_object(&parsed) else {
            continue;
        };
        return json_ld_fields(doc, article);
    }
    Metadata::default()
}

fn has_article_type(value: &Value) -> bool {
    value
        .get("@type")
        .and_then(Value::as_str)
        .is_some_and(|kind| JSON_LD_ARTICLE_TYPES.is_match(kind))
}

fn has_schema_context(value: &Value) -> bool {
    match value.get("@context") {
        Some(Value::String(context)) => SCHEMA_ORG.is_match(context),
        Some(Value::Object(context)) => context
            .get("@vocab")
            .and_then(Value::as_str)
            .is_some_and(|vocab| SCHEMA_ORG.is_match(vocab)),
        _ => false,
    }
}

fn article_object(parsed: &Value) -> Option<&Value> {
    let candidate = match parsed {
        Value::Array(items) => items.iter().find(|item| has_article_type(item))?,
        other => other,
    };
    if !has_schema_context(candidate) {
        return None;
    }
    let candidate = if candidate.get("@type").is_none() {
        candidate
            .get("@graph")?
            .as_array()?
            .iter()
            .find(|item| has_article_type(item))?
    } else {
        candidate
    };
    has_article_type(candidate).then_some(candidate)
}

fn trimmed_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn json_ld_fields(doc: &NodeRef, article: &Value) -> Metadata {
    let name = article.get("name").and_then(Value::as_str);
    let headline = article.get("headline").and_then(Value::as_str);

    let title = match (name, headline) {
        (Some(name), Some(headline)) if name != headline => {
            // Keep whichever matches the page title when the two disagree.
            let page_title = article_title(doc);
            let name_matches = text_similarity(name, &page_title) > TITLE_SIMILARITY;
            let headline_matches = text_similarity(headline, &page_title) > TITLE_SIMILARITY;
            if headline_matches && !name_matches {
                Some(headline.trim().to_string())
            } else {
                Some(name.trim().to_string())
            }
        }
        (Some(name), _) => Some(name.trim().to_string()),
        (None, Some(headline)) => Some(headline.trim().to_string()),
        (None, None) => None,
    };

    let byline = match article.get("author") {
        Some(Value::Object(author)) => trimmed_str(author.get("name")),
        Some(Value::Array(authors)) => {
            let names: Vec<String> = authors
                .iter()
                .filter_map(|author| trimmed_str(author.get("name")))
                .collect();
            (!names.is_empty()).then(|| names.join(", "))
        }
        _ => None,
    };

    Metadata {
        title: title.filter(|t| !t.is_empty()),
        byline,
        excerpt: trimmed_str(article.get("description")),
        site_name: article
            .get("publisher")
            .and_then(|publisher| trimmed_str(publisher.get("name"))),
        published_time: trimmed_str(article.get("datePublished")),
    }
}

/// Collects `<meta>` values keyed by normalized property or name.
fn meta_values(doc: &NodeRef) -> HashMap<String, String> {
    let mut values = HashMap::new();

    for meta in descendants_by_tag(doc, &["meta"]) {
        let Some(content) = attr(&meta, "content").map(|c| c.trim().to_string()) else {
            continue;
        };
        if content.is_empty() {
            continue;
        }

        let mut matched = false;
        if let Some(property) = attr(&meta, "property") {
            if let Some(found) = META_PROPERTY.find(&property) {
                let key: String = found
                    .as_str()
                    .to_lowercase()
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect();
                values.insert(key, content.clone());
                matched = true;
            }
        }

        if !matched {
            if let Some(name) = attr(&meta, "name").filter(|n| META_NAME.is_match(n)) {
                let key: String = name
                    .to_lowercase()
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect::<String>()
                    .replace('.', ":");
                values.insert(key, content);
            }
        }
    }

    values
}

fn first_value(values: &HashMap<String, String>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| values.get(*key).cloned())
}

/// Merges JSON-LD values with meta tags, JSON-LD winning.
pub(crate) fn article_metadata(doc: &NodeRef, json_ld: Metadata) -> Metadata {
    let values = meta_values(doc);

    let title = json_ld
        .title
        .or_else(|| {
            first_value(
                &values,
                &[
                    "dc:title",
                    "dcterm:title",
                    "og:title",
                    "weibo:article:title",
                    "weibo:webpage:title",
                    "title",
                    "twitter:title",
                    "parsely-title",
                ],
            )
        })
        .or_else(|| Some(article_title(doc)).filter(|t| !t.is_empty()));

    Metadata {
        title,
        byline: json_ld.byline.or_else(|| {
            first_value(
                &values,
                &["dc:creator", "dcterm:creator", "author", "parsely-author"],
            )
        }),
        excerpt: json_ld.excerpt.or_else(|| {
            first_value(
                &values,
                &[
                    "dc:description",
                    "dcterm:description",
                    "og:description",
                    "weibo:article:description",
                    "weibo:webpage:description",
                    "description",
                    "twitter:description",
                ],
            )
        }),
        site_name: json_ld
            .site_name
            .or_else(|| first_value(&values, &["og:site_name"])),
        published_time: json_ld.published_time.or_else(|| {
            first_value(&values, &["article:published_time", "parsely-pub-date"])
        }),
    }
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Cleans the document `<title>` of site-name prefixes and suffixes.
pub(crate) fn article_title(doc: &NodeRef) -> String {
    let original = descendants_by_tag(doc, &["title"])
        .first()
        .map(|title| inner_text(title, false))
        .unwrap_or_default();

    let mut current = original.clone();
    let mut hierarchical = false;

    if TITLE_SEPARATOR.is_match(&current) {
        hierarchical = HIERARCHICAL_SEPARATOR.is_match(&current);
        current = BEFORE_LAST_SEPARATOR.replace(&original, "$1").into_owned();
        if word_count(&current) < 3 {
            current = AFTER_FIRST_SEPARATOR.replace(&original, "$1").into_owned();
        }
    } else if current.contains(": ") {
        let trimmed = current.trim();
        let heading_matches = descendants_by_tag(doc, &["h1", "h2"])
            .iter()
            .any(|heading| heading.text_contents().trim() == trimmed);
        if !heading_matches {
            let last = original.rfind(':').map_or(0, |i| i + 1);
            current = original[last..].to_string();
            let first = original.find(':').unwrap_or(0);
            if word_count(&current) < 3 {
                current = original[(first + 1).min(original.len())..].to_string();
            } else if word_count(&original[..first]) > 5 {
                current = original.clone();
            }
        }
    } else {
        let length = current.chars().count();
        if length > 150 || length < 15 {
            let headings = descendants_by_tag(doc, &["h1"]);
            if headings.len() == 1 {
                current = inner_text(&headings[0], true);
            }
        }
    }

    let current = current.split_whitespace().collect::<Vec<_>>().join(" ");
    let count = word_count(&current);
    if count <= 4
        && (!hierarchical
            || count + 1 != word_count(&SEPARATOR_RUNS.replace_all(&original, "")))
    {
        return original.trim().to_string();
    }
    current
}

fn tokens(text: &str) -> Vec<String> {
    NON_WORD
        .split(&text.to_lowercase())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Share of `b`'s token text that also appears in `a`, from 0.0 to 1.0.
pub(crate) fn text_similarity(a: &str, b: &str) -> f64 {
    let tokens_a = tokens(a);
    let tokens_b = tokens(b);
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }
    let unique_b: Vec<&str> = tokens_b
        .iter()
        .filter(|token| !tokens_a.contains(token))
        .map(String::as_str)
        .collect();
    let distance = unique_b.join(" ").len() as f64 / tokens_b.join(" ").len() as f64;
    1.0 - distance
}

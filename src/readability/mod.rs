//! Main-content extraction.
//!
//! A port of the readability heuristics: the document is pruned of hidden
//! and unlikely nodes, paragraphs score their ancestors, the best candidate
//! (plus related siblings) becomes the article, and the result is cleaned.
//! When the article is shorter than the character threshold the whole pass
//! is retried with progressively relaxed flags, keeping the longest attempt.

mod clean;
mod dom;
mod metadata;

use std::sync::LazyLock;

use kuchiki::traits::TendrilSink;
use kuchiki::NodeRef;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::Result;
use dom::{
    ancestors, attr, create_element, descendants_by_tag, element_children, first_element_child,
    has_ancestor_tag, has_child_block_element, has_single_tag_inside, inner_html, inner_text,
    is_any_tag, is_element_without_content, is_phrasing_content, is_probably_visible, is_tag,
    is_whitespace, link_density, match_string, next_node, remove_and_get_next, rename,
    replace_with, set_attr, tag_name, Scores,
};

/// Default minimum article length, in characters.
pub const DEFAULT_CHAR_THRESHOLD: usize = 500;

/// Default number of top candidates compared when picking the article root.
pub const DEFAULT_NB_TOP_CANDIDATES: usize = 5;

/// Alternative candidates needed before climbing to a shared ancestor.
const MINIMUM_TOP_CANDIDATES: usize = 3;

/// Levels of ancestors that receive a paragraph's score.
const SCORE_ANCESTOR_DEPTH: usize = 5;

const TAGS_TO_SCORE: &[&str] = &["section", "h2", "h3", "h4", "h5", "h6", "p", "td", "pre"];

const UNLIKELY_ROLES: &[&str] = &[
    "menu",
    "menubar",
    "complementary",
    "navigation",
    "alert",
    "alertdialog",
    "dialog",
];

/// Siblings with these tags are appended as-is; others become `<div>`.
const ALTER_TO_DIV_EXCEPTIONS: &[&str] = &["div", "article", "section", "p", "ol", "ul"];

static UNLIKELY_CANDIDATES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)-ad-|ai2html|banner|breadcrumbs|combx|comment|community|cover-wrap|disqus|extra|footer|gdpr|header|legends|menu|related|remark|replies|rss|shoutbox|sidebar|skyscraper|social|sponsor|supplemental|ad-break|agegate|pagination|pager|popup|yom-remote",
    )
    .expect("Invalid unlikely candidates regex")
});
static OK_MAYBE_CANDIDATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)and|article|body|column|content|main|mathjax|shadow")
        .expect("Invalid candidate override regex")
});
static POSITIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)article|body|content|entry|hentry|h-entry|main|page|pagination|post|text|blog|story",
    )
    .expect("Invalid positive regex")
});
static NEGATIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)-ad-|hidden|^hid$| hid$| hid |^hid |banner|combx|comment|com-|contact|footer|gdpr|masthead|media|meta|outbrain|promo|related|scroll|share|shoutbox|sidebar|skyscraper|sponsor|shopping|tags|widget",
    )
    .expect("Invalid negative regex")
});
static BYLINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)byline|author|dateline|writtenby|p-author").expect("Invalid byline regex")
});
static COMMAS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\x{002C}\x{060C}\x{FE50}\x{FE10}\x{FE11}\x{2E41}\x{2E34}\x{2E32}\x{FF0C}]")
        .expect("Invalid comma regex")
});
static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.( |$)").expect("Invalid sentence regex"));

/// Extraction tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadabilityOptions {
    /// Articles shorter than this trigger a relaxed retry.
    pub char_threshold: usize,
    /// How many top-scoring candidates are compared.
    pub nb_top_candidates: usize,
    /// Keep every class attribute in the output.
    pub keep_classes: bool,
    /// Class names kept when `keep_classes` is off.
    pub classes_to_preserve: Vec<String>,
}

impl Default for ReadabilityOptions {
    fn default() -> Self {
        Self {
            char_threshold: DEFAULT_CHAR_THRESHOLD,
            nb_top_candidates: DEFAULT_NB_TOP_CANDIDATES,
            keep_classes: false,
            classes_to_preserve: Vec::new(),
        }
    }
}

/// An extracted article.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub byline: Option<String>,
    /// Description from metadata, else the first paragraph.
    pub excerpt: Option<String>,
    pub site_name: Option<String>,
    pub published_time: Option<String>,
    /// Cleaned article HTML.
    pub content: String,
    /// Plain text of `content`.
    pub text_content: String,
    /// Length of `text_content` in characters.
    pub length: usize,
}

/// Heuristic switches, relaxed one at a time on retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Flags {
    pub strip_unlikelys: bool,
    pub weight_classes: bool,
    pub clean_conditionally: bool,
}

impl Default for Flags {
    fn default() -> Self {
        Self {
            strip_unlikelys: true,
            weight_classes: true,
            clean_conditionally: true,
        }
    }
}

impl Flags {
    /// Turns off the next heuristic, or returns `None` when all are off.
    fn relax(self) -> Option<Self> {
        if self.strip_unlikelys {
            Some(Self {
                strip_unlikelys: false,
                ..self
            })
        } else if self.weight_classes {
            Some(Self {
                weight_classes: false,
                ..self
            })
        } else if self.clean_conditionally {
            Some(Self {
                clean_conditionally: false,
                ..self
            })
        } else {
            None
        }
    }
}

/// Class and id keyword weight: -25 per negative match, +25 per positive.
pub(crate) fn class_weight(node: &NodeRef, enabled: bool) -> f64 {
    if !enabled {
        return 0.0;
    }
    let mut weight = 0.0;
    for name in ["class", "id"] {
        if let Some(value) = attr(node, name).filter(|v| !v.is_empty()) {
            if NEGATIVE.is_match(&value) {
                weight -= 25.0;
            }
            if POSITIVE.is_match(&value) {
                weight += 25.0;
            }
        }
    }
    weight
}

fn initialize(node: &NodeRef, scores: &mut Scores, flags: Flags) {
    let base = match tag_name(node) {
        Some("div") => 5.0,
        Some("pre" | "td" | "blockquote") => 3.0,
        Some("address" | "ol" | "ul" | "dl" | "dd" | "dt" | "li" | "form") => -3.0,
        Some("h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "th") => -5.0,
        _ => 0.0,
    };
    scores.set(node, base + class_weight(node, flags.weight_classes));
}

fn is_valid_byline(node: &NodeRef, matched: &str) -> bool {
    let is_candidate = attr(node, "rel").as_deref() == Some("author")
        || attr(node, "itemprop").is_some_and(|prop| prop.contains("author"))
        || BYLINE.is_match(matched);
    if !is_candidate {
        return false;
    }
    let length = inner_text(node, false).chars().count();
    length > 0 && length < 100
}

fn header_duplicates_title(node: &NodeRef, title: &str) -> bool {
    if !is_any_tag(node, &["h1", "h2"]) || title.is_empty() {
        return false;
    }
    metadata::text_similarity(title, &inner_text(node, false)) > 0.75
}

/// Wraps runs of inline content directly under a `<div>` in `<p>` elements.
fn wrap_phrasing_runs(div: &NodeRef) {
    let Some(element) = div.as_element() else {
        return;
    };
    let mut paragraph: Option<NodeRef> = None;
    let mut child = div.first_child();
    while let Some(current) = child {
        let next = current.next_sibling();
        if is_phrasing_content(&current) {
            if let Some(p) = &paragraph {
                p.append(current);
            } else if !is_whitespace(&current) {
                let p = create_element(element, "p");
                current.insert_before(p.clone());
                p.append(current);
                paragraph = Some(p);
            }
        } else if let Some(p) = paragraph.take() {
            clean::trim_trailing_whitespace(&p);
        }
        child = next;
    }
}

/// One extraction attempt's article container.
struct Extraction {
    content: NodeRef,
    byline: Option<String>,
    text_length: usize,
}

/// Readability extractor over one HTML document.
///
/// # Example
///
/// ```rust,no_run
/// use a3s_browser_search::readability::Readability;
///
/// let html = "<html><body><article><p>...</p></article></body></html>";
/// if let Some(article) = Readability::new(html, "https://example.com/post").parse()? {
///     println!("{}: {} chars", article.title, article.length);
/// }
/// # Ok::<(), a3s_browser_search::SearchError>(())
/// ```
pub struct Readability {
    html: String,
    url: String,
    options: ReadabilityOptions,
}

impl Readability {
    /// Creates an extractor for `html` served from `url`.
    pub fn new(html: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            url: url.into(),
            options: ReadabilityOptions::default(),
        }
    }

    /// Replaces the extraction options.
    pub fn with_options(mut self, options: ReadabilityOptions) -> Self {
        self.options = options;
        self
    }

    /// Extracts the main article.
    ///
    /// Returns `Ok(None)` when every attempt yields no text. Fails only when
    /// the document URL cannot be parsed.
    pub fn parse(&self) -> Result<Option<Article>> {
        let document_url = Url::parse(&self.url)?;
        let doc = kuchiki::parse_html().one(self.html.clone());
        let base = base_url(&doc, &document_url);

        let json_ld = metadata::json_ld(&doc);
        let metadata = metadata::article_metadata(&doc, json_ld);
        let title = metadata.title.clone().unwrap_or_default();

        let Some(extraction) = self.grab_article(&title) else {
            debug!("No readable content found at {}", self.url);
            return Ok(None);
        };

        let content = extraction.content;
        clean::post_process(&content, &base, &document_url, &self.options);

        let excerpt = metadata.excerpt.or_else(|| {
            descendants_by_tag(&content, &["p"])
                .first()
                .map(|p| inner_text(p, false))
                .filter(|text| !text.is_empty())
        });
        let text_content = content.text_contents();
        let length = text_content.chars().count();

        Ok(Some(Article {
            title,
            byline: metadata.byline.or(extraction.byline),
            excerpt,
            site_name: metadata.site_name,
            published_time: metadata.published_time,
            content: inner_html(&content),
            text_content,
            length,
        }))
    }

    fn prepared_document(&self) -> NodeRef {
        let doc = kuchiki::parse_html().one(self.html.clone());
        clean::remove_scripts(&doc);
        clean::prep_document(&doc);
        doc
    }

    /// Runs attempts with relaxing flags until one clears the threshold.
    fn grab_article(&self, title: &str) -> Option<Extraction> {
        let mut flags = Flags::default();
        let mut attempts: Vec<Extraction> = Vec::new();

        loop {
            let doc = self.prepared_document();
            let extraction = self.attempt(&doc, title, flags)?;
            if extraction.text_length >= self.options.char_threshold {
                return Some(extraction);
            }
            debug!(
                "Readability attempt produced {} chars with {:?}",
                extraction.text_length, flags
            );
            attempts.push(extraction);

            match flags.relax() {
                Some(relaxed) => flags = relaxed,
                None => {
                    // Longest attempt wins; the earliest one on ties.
                    let best = attempts.into_iter().reduce(|best, next| {
                        if next.text_length > best.text_length {
                            next
                        } else {
                            best
                        }
                    })?;
                    return (best.text_length > 0).then_some(best);
                }
            }
        }
    }

    fn attempt(&self, doc: &NodeRef, title: &str, flags: Flags) -> Option<Extraction> {
        let page = descendants_by_tag(doc, &["body"]).into_iter().next()?;
        let mut scores = Scores::default();
        let mut byline = None;

        let elements_to_score = prune(doc, title, flags, &mut byline);
        let candidates = score_ancestors(&elements_to_score, &mut scores, flags);
        let top = top_candidates(&candidates, &mut scores, self.options.nb_top_candidates);

        let page_element = page.as_element()?;
        let (top_candidate, created) = match top.first() {
            Some(candidate) if !is_tag(candidate, "body") => (
                refine_top_candidate(candidate.clone(), &top, &mut scores, flags),
                false,
            ),
            _ => {
                let div = create_element(page_element, "div");
                for child in page.children().collect::<Vec<_>>() {
                    div.append(child);
                }
                page.append(div.clone());
                initialize(&div, &mut scores, flags);
                (div, true)
            }
        };

        let article = create_element(page_element, "div");
        append_siblings(&article, &top_candidate, &mut scores);
        clean::prep_article(&article, flags);

        if created {
            set_attr(&top_candidate, "id", "readability-page-1");
            set_attr(&top_candidate, "class", "page");
        } else {
            let wrapper = create_element(page_element, "div");
            set_attr(&wrapper, "id", "readability-page-1");
            set_attr(&wrapper, "class", "page");
            for child in article.children().collect::<Vec<_>>() {
                wrapper.append(child);
            }
            article.append(wrapper);
        }

        let text_length = inner_text(&article, true).chars().count();
        Some(Extraction {
            content: article,
            byline,
            text_length,
        })
    }
}

fn base_url(doc: &NodeRef, document_url: &Url) -> Url {
    descendants_by_tag(doc, &["base"])
        .iter()
        .find_map(|base| attr(base, "href"))
        .and_then(|href| document_url.join(&href).ok())
        .unwrap_or_else(|| document_url.clone())
}

/// Walks the document once, removing hidden, unlikely and empty nodes and
/// collecting the elements whose text will be scored.
fn prune(doc: &NodeRef, title: &str, flags: Flags, byline: &mut Option<String>) -> Vec<NodeRef> {
    let mut elements_to_score = Vec::new();
    let mut should_remove_title_header = true;
    let mut node = first_element_child(doc);

    while let Some(mut current) = node {
        let matched = match_string(&current);

        if !is_probably_visible(&current) {
            node = remove_and_get_next(&current);
            continue;
        }

        if attr(&current, "aria-modal").as_deref() == Some("true")
            && attr(&current, "role").as_deref() == Some("dialog")
        {
            node = remove_and_get_next(&current);
            continue;
        }

        if byline.is_none() && is_valid_byline(&current, &matched) {
            *byline = Some(inner_text(&current, true));
            node = remove_and_get_next(&current);
            continue;
        }

        if should_remove_title_header && header_duplicates_title(&current, title) {
            should_remove_title_header = false;
            node = remove_and_get_next(&current);
            continue;
        }

        if flags.strip_unlikelys {
            if UNLIKELY_CANDIDATES.is_match(&matched)
                && !OK_MAYBE_CANDIDATE.is_match(&matched)
                && !has_ancestor_tag(&current, "table", 3)
                && !has_ancestor_tag(&current, "code", 3)
                && !is_any_tag(&current, &["body", "a"])
            {
                debug!("Removing unlikely candidate - {}", matched.trim());
                node = remove_and_get_next(&current);
                continue;
            }

            if attr(&current, "role").is_some_and(|role| UNLIKELY_ROLES.contains(&role.as_str())) {
                node = remove_and_get_next(&current);
                continue;
            }
        }

        if is_any_tag(
            &current,
            &["div", "section", "header", "h1", "h2", "h3", "h4", "h5", "h6"],
        ) && is_element_without_content(&current)
        {
            node = remove_and_get_next(&current);
            continue;
        }

        if is_any_tag(&current, TAGS_TO_SCORE) {
            elements_to_score.push(current.clone());
        }

        if is_tag(&current, "div") {
            wrap_phrasing_runs(&current);

            if has_single_tag_inside(&current, "p") && link_density(&current) < 0.25 {
                if let Some(child) = first_element_child(&current) {
                    replace_with(&current, &child);
                    current = child;
                    elements_to_score.push(current.clone());
                }
            } else if !has_child_block_element(&current) {
                current = rename(&current, "p");
                elements_to_score.push(current.clone());
            }
        }

        node = next_node(&current, false);
    }

    elements_to_score
}

/// Propagates each scorable element's content score to its ancestors and
/// returns the newly scored candidates in discovery order.
fn score_ancestors(elements: &[NodeRef], scores: &mut Scores, flags: Flags) -> Vec<NodeRef> {
    let mut candidates = Vec::new();

    for element in elements {
        let Some(parent) = element.parent() else {
            continue;
        };
        if parent.as_element().is_none() {
            continue;
        }

        let text = inner_text(element, true);
        let length = text.chars().count();
        if length < 25 {
            continue;
        }

        let lineage = ancestors(element, SCORE_ANCESTOR_DEPTH);
        if lineage.is_empty() {
            continue;
        }

        let content_score = 1.0
            + COMMAS.split(&text).count() as f64
            + (length / 100).min(3) as f64;

        for (level, ancestor) in lineage.iter().enumerate() {
            let parent_is_element = ancestor
                .parent()
                .is_some_and(|p| p.as_element().is_some());
            if ancestor.as_element().is_none() || !parent_is_element {
                continue;
            }

            if !scores.contains(ancestor) {
                initialize(ancestor, scores, flags);
                candidates.push(ancestor.clone());
            }

            let divider = match level {
                0 => 1.0,
                1 => 2.0,
                n => n as f64 * 3.0,
            };
            scores.add(ancestor, content_score / divider);
        }
    }

    candidates
}

/// Scales scores by link density and keeps the best `limit`, highest first.
fn top_candidates(candidates: &[NodeRef], scores: &mut Scores, limit: usize) -> Vec<NodeRef> {
    let mut top: Vec<NodeRef> = Vec::with_capacity(limit + 1);

    for candidate in candidates {
        let score = scores.score(candidate) * (1.0 - link_density(candidate));
        scores.set(candidate, score);

        match top.iter().position(|t| score > scores.score(t)) {
            Some(index) => {
                top.insert(index, candidate.clone());
                top.truncate(limit);
            }
            None if top.len() < limit => top.push(candidate.clone()),
            None => {}
        }
    }

    top
}

/// Moves the top candidate up the tree when its content is spread across
/// siblings or its parent scores better.
fn refine_top_candidate(
    mut candidate: NodeRef,
    top: &[NodeRef],
    scores: &mut Scores,
    flags: Flags,
) -> NodeRef {
    let top_score = scores.score(&candidate);

    let alternatives: Vec<Vec<NodeRef>> = top
        .iter()
        .skip(1)
        .filter(|alt| scores.score(alt) / top_score >= 0.75)
        .map(|alt| ancestors(alt, usize::MAX))
        .collect();

    if alternatives.len() >= MINIMUM_TOP_CANDIDATES {
        let mut parent = candidate.parent();
        while let Some(current) = parent {
            if current.as_element().is_none() || is_tag(&current, "body") {
                break;
            }
            let containing = alternatives
                .iter()
                .filter(|lineage| lineage.contains(&current))
                .count();
            if containing >= MINIMUM_TOP_CANDIDATES {
                candidate = current;
                break;
            }
            parent = current.parent();
        }
    }
    if !scores.contains(&candidate) {
        initialize(&candidate, scores, flags);
    }

    // Climb while ancestors keep a meaningful share of the score.
    let mut last_score = scores.score(&candidate);
    let threshold = last_score / 3.0;
    let mut parent = candidate.parent();
    while let Some(current) = parent {
        if current.as_element().is_none() || is_tag(&current, "body") {
            break;
        }
        if !scores.contains(&current) {
            parent = current.parent();
            continue;
        }
        let parent_score = scores.score(&current);
        if parent_score < threshold {
            break;
        }
        if parent_score > last_score {
            candidate = current;
            break;
        }
        last_score = parent_score;
        parent = current.parent();
    }

    // An only child is replaced by its parent.
    let mut parent = candidate.parent();
    while let Some(current) = parent {
        if current.as_element().is_none()
            || is_tag(&current, "body")
            || element_children(&current).len() != 1
        {
            break;
        }
        candidate = current;
        parent = candidate.parent();
    }
    if !scores.contains(&candidate) {
        initialize(&candidate, scores, flags);
    }

    candidate
}

/// Moves the top candidate and qualifying siblings into `article`.
fn append_siblings(article: &NodeRef, candidate: &NodeRef, scores: &mut Scores) {
    let Some(parent) = candidate.parent() else {
        article.append(candidate.clone());
        return;
    };

    let top_score = scores.score(candidate);
    let threshold = f64::max(10.0, top_score * 0.2);
    let top_class = attr(candidate, "class").unwrap_or_default();

    for sibling in element_children(&parent) {
        let append = if sibling == *candidate {
            true
        } else {
            let mut bonus = 0.0;
            if !top_class.is_empty() && attr(&sibling, "class").unwrap_or_default() == top_class {
                bonus += top_score * 0.2;
            }

            if scores.contains(&sibling) && scores.score(&sibling) + bonus >= threshold {
                true
            } else if is_tag(&sibling, "p") {
                let density = link_density(&sibling);
                let content = inner_text(&sibling, true);
                let length = content.chars().count();
                (length > 80 && density < 0.25)
                    || (length < 80 && length > 0 && density == 0.0 && SENTENCE_END.is_match(&content))
            } else {
                false
            }
        };

        if !append {
            continue;
        }
        let sibling = if is_any_tag(&sibling, ALTER_TO_DIV_EXCEPTIONS) {
            sibling
        } else {
            let renamed = rename(&sibling, "div");
            scores.transfer(&sibling, &renamed);
            renamed
        };
        article.append(sibling);
    }
}

//! DOM helpers over `kuchiki` used by the extractor.
//!
//! Traversal follows element order only (`next_node` skips text and comment
//! nodes), mirroring how browsers walk `firstElementChild` and
//! `nextElementSibling`.

use std::collections::HashMap;
use std::sync::LazyLock;

use kuchiki::{ElementData, Node, NodeRef};
use regex::Regex;

/// Tags that make a `<div>` a block container rather than a paragraph.
const DIV_TO_P_ELEMS: &[&str] = &["blockquote", "dl", "div", "img", "ol", "p", "pre", "table", "ul"];

const PHRASING_ELEMS: &[&str] = &[
    "abbr", "audio", "b", "bdo", "br", "button", "cite", "code", "data", "datalist", "dfn", "em",
    "embed", "i", "img", "input", "kbd", "label", "mark", "math", "meter", "noscript", "object",
    "output", "progress", "q", "ruby", "samp", "script", "select", "small", "span", "strong",
    "sub", "sup", "textarea", "time", "var", "wbr",
];

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s{2,}").expect("Invalid whitespace regex"));
static DISPLAY_NONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)display\s*:\s*none").expect("Invalid display regex"));
static VISIBILITY_HIDDEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)visibility\s*:\s*hidden").expect("Invalid visibility regex")
});
static HASH_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#.+").expect("Invalid hash url regex"));

/// Weight applied to in-page fragment links when measuring link density.
const HASH_LINK_WEIGHT: f64 = 0.5;

/// Lowercase tag name of an element node.
pub(crate) fn tag_name(node: &NodeRef) -> Option<&str> {
    node.as_element().map(|el| &*el.name.local)
}

pub(crate) fn is_tag(node: &NodeRef, tag: &str) -> bool {
    tag_name(node) == Some(tag)
}

pub(crate) fn is_any_tag(node: &NodeRef, tags: &[&str]) -> bool {
    tag_name(node).is_some_and(|name| tags.contains(&name))
}

pub(crate) fn attr(node: &NodeRef, name: &str) -> Option<String> {
    node.as_element()
        .and_then(|el| el.attributes.borrow().get(name).map(str::to_string))
}

pub(crate) fn set_attr(node: &NodeRef, name: &str, value: &str) {
    if let Some(el) = node.as_element() {
        el.attributes.borrow_mut().insert(name, value.to_string());
    }
}

pub(crate) fn remove_attr(node: &NodeRef, name: &str) {
    if let Some(el) = node.as_element() {
        el.attributes.borrow_mut().remove(name);
    }
}

/// `class` and `id` joined by a space, for keyword matching.
pub(crate) fn match_string(node: &NodeRef) -> String {
    format!(
        "{} {}",
        attr(node, "class").unwrap_or_default(),
        attr(node, "id").unwrap_or_default()
    )
}

/// Creates a detached element sharing the namespace of `like`.
pub(crate) fn create_element(like: &ElementData, tag: &str) -> NodeRef {
    let mut name = like.name.clone();
    name.local = tag.into();
    NodeRef::new_element(name, None)
}

/// Replaces `node` with an element named `tag`, keeping attributes and children.
pub(crate) fn rename(node: &NodeRef, tag: &str) -> NodeRef {
    let Some(element) = node.as_element() else {
        return node.clone();
    };
    let mut name = element.name.clone();
    name.local = tag.into();
    let attributes: Vec<_> = element
        .attributes
        .borrow()
        .map
        .iter()
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    let replacement = NodeRef::new_element(name, attributes);
    for child in node.children().collect::<Vec<_>>() {
        replacement.append(child);
    }
    node.insert_before(replacement.clone());
    node.detach();
    replacement
}

/// Replaces `node` in the tree with `replacement`.
pub(crate) fn replace_with(node: &NodeRef, replacement: &NodeRef) {
    node.insert_before(replacement.clone());
    node.detach();
}

pub(crate) fn element_children(node: &NodeRef) -> Vec<NodeRef> {
    node.children().filter(|c| c.as_element().is_some()).collect()
}

pub(crate) fn first_element_child(node: &NodeRef) -> Option<NodeRef> {
    node.children().find(|c| c.as_element().is_some())
}

pub(crate) fn next_element_sibling(node: &NodeRef) -> Option<NodeRef> {
    let mut sibling = node.next_sibling();
    while let Some(current) = sibling {
        if current.as_element().is_some() {
            return Some(current);
        }
        sibling = current.next_sibling();
    }
    None
}

/// Depth-first successor over elements. With `skip_children`, the subtree of
/// `node` is skipped.
pub(crate) fn next_node(node: &NodeRef, skip_children: bool) -> Option<NodeRef> {
    if !skip_children {
        if let Some(child) = first_element_child(node) {
            return Some(child);
        }
    }
    if let Some(sibling) = next_element_sibling(node) {
        return Some(sibling);
    }
    let mut current = node.parent();
    while let Some(parent) = current {
        if let Some(sibling) = next_element_sibling(&parent) {
            return Some(sibling);
        }
        current = parent.parent();
    }
    None
}

/// Detaches `node` and returns the element that follows its subtree.
pub(crate) fn remove_and_get_next(node: &NodeRef) -> Option<NodeRef> {
    let next = next_node(node, true);
    node.detach();
    next
}

/// Skips whitespace-only text siblings, starting at `node` itself.
pub(crate) fn skip_whitespace(mut node: Option<NodeRef>) -> Option<NodeRef> {
    while let Some(current) = node {
        match current.as_text() {
            Some(text) if text.borrow().trim().is_empty() => node = current.next_sibling(),
            _ => return Some(current),
        }
    }
    None
}

/// All descendant elements (excluding `node`) whose tag is in `tags`.
pub(crate) fn descendants_by_tag(node: &NodeRef, tags: &[&str]) -> Vec<NodeRef> {
    node.descendants().filter(|d| is_any_tag(d, tags)).collect()
}

/// Trimmed text content, with whitespace runs collapsed when `normalize` is set.
pub(crate) fn inner_text(node: &NodeRef, normalize: bool) -> String {
    let text = node.text_contents();
    let trimmed = text.trim();
    if normalize {
        WHITESPACE_RUN.replace_all(trimmed, " ").into_owned()
    } else {
        trimmed.to_string()
    }
}

pub(crate) fn text_len(node: &NodeRef) -> usize {
    inner_text(node, true).chars().count()
}

/// Number of `separator`-delimited segments minus one.
pub(crate) fn char_count(node: &NodeRef, separator: char) -> usize {
    inner_text(node, true).split(separator).count().saturating_sub(1)
}

/// Fraction of visible text that sits inside links.
pub(crate) fn link_density(node: &NodeRef) -> f64 {
    let text_length = text_len(node);
    if text_length == 0 {
        return 0.0;
    }
    let link_length: f64 = descendants_by_tag(node, &["a"])
        .iter()
        .map(|link| {
            let weight = match attr(link, "href") {
                Some(href) if HASH_URL.is_match(&href) => HASH_LINK_WEIGHT,
                _ => 1.0,
            };
            text_len(link) as f64 * weight
        })
        .sum();
    link_length / text_length as f64
}

/// Share of text found inside descendants tagged with any of `tags`.
pub(crate) fn text_density(node: &NodeRef, tags: &[&str]) -> f64 {
    let text_length = text_len(node);
    if text_length == 0 {
        return 0.0;
    }
    let children_length: usize = descendants_by_tag(node, tags).iter().map(text_len).sum();
    children_length as f64 / text_length as f64
}

/// Whitespace text, or a `<br>`.
pub(crate) fn is_whitespace(node: &NodeRef) -> bool {
    match node.as_text() {
        Some(text) => text.borrow().trim().is_empty(),
        None => is_tag(node, "br"),
    }
}

pub(crate) fn is_phrasing_content(node: &NodeRef) -> bool {
    if node.as_text().is_some() {
        return true;
    }
    match tag_name(node) {
        Some(tag) if PHRASING_ELEMS.contains(&tag) => true,
        Some("a" | "del" | "ins") => node.children().all(|c| is_phrasing_content(&c)),
        _ => false,
    }
}

/// True when `node` has exactly one element child, tagged `tag`, and no
/// non-whitespace text of its own.
pub(crate) fn has_single_tag_inside(node: &NodeRef, tag: &str) -> bool {
    let children = element_children(node);
    if children.len() != 1 || !is_tag(&children[0], tag) {
        return false;
    }
    !node.children().any(|c| {
        c.as_text()
            .is_some_and(|text| !text.borrow().trim().is_empty())
    })
}

pub(crate) fn has_child_block_element(node: &NodeRef) -> bool {
    node.children()
        .any(|c| is_any_tag(&c, DIV_TO_P_ELEMS) || has_child_block_element(&c))
}

/// No text and nothing but line breaks or rules inside.
pub(crate) fn is_element_without_content(node: &NodeRef) -> bool {
    if node.as_element().is_none() || !node.text_contents().trim().is_empty() {
        return false;
    }
    let children = element_children(node);
    children.is_empty() || children.iter().all(|c| is_any_tag(c, &["br", "hr"]))
}

/// Whether an ancestor is `tag`. Checks the parent plus `max_depth` further
/// levels; 0 means unlimited.
pub(crate) fn has_ancestor_tag(node: &NodeRef, tag: &str, max_depth: usize) -> bool {
    node.ancestors()
        .enumerate()
        .take_while(|(depth, _)| max_depth == 0 || *depth <= max_depth)
        .any(|(_, ancestor)| is_tag(&ancestor, tag))
}

/// Ancestors from the parent upwards, at most `max_depth` of them.
pub(crate) fn ancestors(node: &NodeRef, max_depth: usize) -> Vec<NodeRef> {
    node.ancestors().take(max_depth).collect()
}

pub(crate) fn is_probably_visible(node: &NodeRef) -> bool {
    let style = attr(node, "style").unwrap_or_default();
    if DISPLAY_NONE.is_match(&style) || VISIBILITY_HIDDEN.is_match(&style) {
        return false;
    }
    if attr(node, "hidden").is_some() {
        return false;
    }
    match attr(node, "aria-hidden") {
        Some(value) if value == "true" => attr(node, "class")
            .is_some_and(|class| class.contains("fallback-image")),
        _ => true,
    }
}

/// Serialized children of `node`.
pub(crate) fn inner_html(node: &NodeRef) -> String {
    node.children().map(|child| child.to_string()).collect()
}

/// Per-node content scores for one extraction attempt.
///
/// Scored nodes are kept alive by the map so their addresses stay unique.
#[derive(Default)]
pub(crate) struct Scores {
    map: HashMap<*const Node, (NodeRef, f64)>,
}

impl Scores {
    fn key(node: &NodeRef) -> *const Node {
        &**node
    }

    pub(crate) fn get(&self, node: &NodeRef) -> Option<f64> {
        self.map.get(&Self::key(node)).map(|(_, score)| *score)
    }

    pub(crate) fn contains(&self, node: &NodeRef) -> bool {
        self.map.contains_key(&Self::key(node))
    }

    pub(crate) fn score(&self, node: &NodeRef) -> f64 {
        self.get(node).unwrap_or(0.0)
    }

    pub(crate) fn set(&mut self, node: &NodeRef, score: f64) {
        self.map.insert(Self::key(node), (node.clone(), score));
    }

    pub(crate) fn add(&mut self, node: &NodeRef, delta: f64) {
        if let Some((_, score)) = self.map.get_mut(&Self::key(node)) {
            *score += delta;
        }
    }

    /// Moves the score of `from` onto `to`, used when a node is renamed.
    pub(crate) fn transfer(&mut self, from: &NodeRef, to: &NodeRef) {
        if let Some((_, score)) = self.map.remove(&Self::key(from)) {
            self.set(to, score);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kuchiki::traits::TendrilSink;

    fn parse(html: &str) -> NodeRef {
        kuchiki::parse_html().one(html.to_string())
    }

    fn first(doc: &NodeRef, tag: &str) -> NodeRef {
        doc.descendants().find(|n| is_tag(n, tag)).unwrap()
    }

    #[test]
    fn test_inner_text_normalizes() {
        let doc = parse("<p>  hello \n\n   world  </p>");
        let p = first(&doc, "p");
        assert_eq!(inner_text(&p, true), "hello world");
        assert_eq!(inner_text(&p, false), "hello \n\n   world");
    }

    #[test]
    fn test_link_density() {
        let doc = parse(r##"<div>abcd<a href="https://x.test">efgh</a><a href="#top">ij</a></div>"##);
        let div = first(&doc, "div");
        // 4 full-weight chars + 2 half-weight chars over 10 chars of text.
        assert!((link_density(&div) - 0.5).abs() < 1e-9);

        let empty = parse("<div></div>");
        assert_eq!(link_density(&first(&empty, "div")), 0.0);
    }

    #[test]
    fn test_rename_keeps_children_and_attributes() {
        let doc = parse(r#"<div id="a" class="b">x<span>y</span></div>"#);
        let div = first(&doc, "div");
        let p = rename(&div, "p");
        assert!(is_tag(&p, "p"));
        assert_eq!(attr(&p, "id").as_deref(), Some("a"));
        assert_eq!(attr(&p, "class").as_deref(), Some("b"));
        assert_eq!(p.text_contents(), "xy");
        assert!(doc.descendants().all(|n| !is_tag(&n, "div")));
    }

    #[test]
    fn test_next_node_walks_elements() {
        let doc = parse("<body><div><p>a</p></div><section>b</section></body>");
        let div = first(&doc, "div");
        let p = next_node(&div, false).unwrap();
        assert!(is_tag(&p, "p"));
        let section = next_node(&p, false).unwrap();
        assert!(is_tag(&section, "section"));
        assert!(is_tag(&next_node(&div, true).unwrap(), "section"));
        assert!(next_node(&section, false).is_none());
    }

    #[test]
    fn test_phrasing_and_block_detection() {
        let doc = parse("<div id=\"inline\"><a href=\"#\"><b>x</b></a></div><div id=\"block\"><a><div>y</div></a></div>");
        let divs: Vec<_> = descendants_by_tag(&doc, &["div"]);
        let inline_link = first(&divs[0], "a");
        assert!(is_phrasing_content(&inline_link));
        let block_link = first(&divs[1], "a");
        assert!(!is_phrasing_content(&block_link));
        assert!(!has_child_block_element(&divs[0]));
        assert!(has_child_block_element(&divs[1]));
    }

    #[test]
    fn test_single_tag_and_empty_elements() {
        let doc = parse("<div id=\"one\"> <p>x</p> </div><div id=\"two\">t<p>x</p></div><div id=\"three\"><br><hr></div>");
        let divs = descendants_by_tag(&doc, &["div"]);
        assert!(has_single_tag_inside(&divs[0], "p"));
        assert!(!has_single_tag_inside(&divs[1], "p"));
        assert!(is_element_without_content(&divs[2]));
        assert!(!is_element_without_content(&divs[0]));
    }

    #[test]
    fn test_visibility() {
        let doc = parse(concat!(
            r#"<div style="display: none">a</div>"#,
            r#"<div hidden>b</div>"#,
            r#"<div aria-hidden="true">c</div>"#,
            r#"<div aria-hidden="true" class="fallback-image">d</div>"#,
            r#"<div>e</div>"#,
        ));
        let visible: Vec<bool> = descendants_by_tag(&doc, &["div"])
            .iter()
            .map(is_probably_visible)
            .collect();
        assert_eq!(visible, vec![false, false, false, true, true]);
    }

    #[test]
    fn test_scores_transfer() {
        let doc = parse("<div>x</div>");
        let div = first(&doc, "div");
        let mut scores = Scores::default();
        scores.set(&div, 4.0);
        scores.add(&div, 1.5);
        assert_eq!(scores.get(&div), Some(5.5));

        let p = rename(&div, "p");
        scores.transfer(&div, &p);
        assert!(!scores.contains(&div));
        assert_eq!(scores.score(&p), 5.5);
    }
}

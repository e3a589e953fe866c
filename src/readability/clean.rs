//! Cleanup passes run before scoring and on the extracted article.

use std::sync::LazyLock;

use kuchiki::NodeRef;
use regex::Regex;
use url::Url;

use super::dom::{
    attr, char_count, create_element, descendants_by_tag, element_children, first_element_child,
    has_ancestor_tag, has_single_tag_inside, inner_html, inner_text, is_any_tag,
    is_element_without_content, is_phrasing_content, is_tag, is_whitespace, link_density,
    match_string, next_node, remove_and_get_next, remove_attr, rename, replace_with, set_attr,
    skip_whitespace, text_density, text_len,
};
use super::{class_weight, Flags, ReadabilityOptions};

const PRESENTATIONAL_ATTRIBUTES: &[&str] = &[
    "align",
    "background",
    "bgcolor",
    "border",
    "cellpadding",
    "cellspacing",
    "frame",
    "hspace",
    "rules",
    "style",
    "valign",
    "vspace",
];

const DEPRECATED_SIZE_ATTRIBUTE_ELEMS: &[&str] = &["table", "th", "td", "hr", "pre"];

const HEADINGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];

/// Share widgets longer than this are kept.
const SHARE_ELEMENT_THRESHOLD: usize = 500;

/// Class kept on the page wrapper regardless of configuration.
const PAGE_CLASS: &str = "page";

static SHARE_ELEMENTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\b|_)(share|sharedaddy)(\b|_)").expect("Invalid share regex")
});
static VIDEOS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)//(www\.)?((dailymotion|youtube|youtube-nocookie|player\.vimeo|v\.qq)\.com|(archive|upload\.wikimedia)\.org|player\.twitch\.tv)",
    )
    .expect("Invalid video regex")
});

/// Drops scripts and `<noscript>` blocks.
pub(crate) fn remove_scripts(doc: &NodeRef) {
    for node in descendants_by_tag(doc, &["script", "noscript"]) {
        node.detach();
    }
}

/// Normalizes the document before scoring: removes comments and styles,
/// turns `<br>` runs into paragraphs and `<font>` into `<span>`.
pub(crate) fn prep_document(doc: &NodeRef) {
    let comments: Vec<_> = doc
        .descendants()
        .filter(|node| node.as_comment().is_some())
        .collect();
    for comment in comments {
        comment.detach();
    }

    for style in descendants_by_tag(doc, &["style"]) {
        style.detach();
    }

    replace_brs(doc);

    for font in descendants_by_tag(doc, &["font"]) {
        rename(&font, "span");
    }
}

/// Replaces two or more consecutive `<br>` with a `<p>` holding the
/// phrasing content that follows.
fn replace_brs(doc: &NodeRef) {
    for br in descendants_by_tag(doc, &["br"]) {
        if br.parent().is_none() {
            continue;
        }

        let mut replaced = false;
        let mut next = br.next_sibling();
        while let Some(candidate) = skip_whitespace(next.clone()) {
            if !is_tag(&candidate, "br") {
                break;
            }
            replaced = true;
            next = candidate.next_sibling();
            candidate.detach();
        }
        if !replaced {
            continue;
        }

        let Some(element) = br.as_element() else {
            continue;
        };
        let paragraph = create_element(element, "p");
        replace_with(&br, &paragraph);

        let mut next = paragraph.next_sibling();
        while let Some(current) = next {
            if is_tag(&current, "br") {
                if let Some(after) = skip_whitespace(current.next_sibling()) {
                    if is_tag(&after, "br") {
                        break;
                    }
                }
            }
            if !is_phrasing_content(&current) {
                break;
            }
            next = current.next_sibling();
            paragraph.append(current);
        }

        trim_trailing_whitespace(&paragraph);

        if let Some(parent) = paragraph.parent() {
            if is_tag(&parent, "p") {
                rename(&parent, "div");
            }
        }
    }
}

pub(crate) fn trim_trailing_whitespace(node: &NodeRef) {
    while let Some(last) = node.last_child() {
        if !is_whitespace(&last) {
            break;
        }
        last.detach();
    }
}

/// Cleans the extracted article before it is measured.
pub(crate) fn prep_article(article: &NodeRef, flags: Flags) {
    clean_styles(article);

    clean_conditionally(article, "form", flags);
    clean_conditionally(article, "fieldset", flags);
    for tag in ["object", "embed", "footer", "link", "aside"] {
        clean(article, tag);
    }

    for child in element_children(article) {
        clean_matched_nodes(&child, |node, matched| {
            SHARE_ELEMENTS.is_match(matched)
                && node.text_contents().chars().count() < SHARE_ELEMENT_THRESHOLD
        });
    }

    for tag in ["iframe", "input", "textarea", "select", "button"] {
        clean(article, tag);
    }
    clean_headers(article, flags);

    for tag in ["table", "ul", "div"] {
        clean_conditionally(article, tag, flags);
    }

    for heading in descendants_by_tag(article, &["h1"]) {
        rename(&heading, "h2");
    }

    for paragraph in descendants_by_tag(article, &["p"]) {
        let media = descendants_by_tag(&paragraph, &["img", "embed", "object", "iframe"]).len();
        if media == 0 && inner_text(&paragraph, false).is_empty() {
            paragraph.detach();
        }
    }

    for br in descendants_by_tag(article, &["br"]) {
        if skip_whitespace(br.next_sibling()).is_some_and(|next| is_tag(&next, "p")) {
            br.detach();
        }
    }

    unwrap_single_cell_tables(article);
}

fn unwrap_single_cell_tables(article: &NodeRef) {
    for table in descendants_by_tag(article, &["table"]) {
        let body = if has_single_tag_inside(&table, "tbody") {
            first_element_child(&table)
        } else {
            Some(table.clone())
        };
        let Some(body) = body else { continue };
        if !has_single_tag_inside(&body, "tr") {
            continue;
        }
        let Some(row) = first_element_child(&body) else { continue };
        if !has_single_tag_inside(&row, "td") {
            continue;
        }
        let Some(cell) = first_element_child(&row) else { continue };

        let tag = if cell.children().all(|c| is_phrasing_content(&c)) {
            "p"
        } else {
            "div"
        };
        let cell = rename(&cell, tag);
        replace_with(&table, &cell);
    }
}

/// Removes presentational attributes everywhere below `node` except inside SVG.
fn clean_styles(node: &NodeRef) {
    if is_tag(node, "svg") {
        return;
    }
    for name in PRESENTATIONAL_ATTRIBUTES {
        remove_attr(node, name);
    }
    if is_any_tag(node, DEPRECATED_SIZE_ATTRIBUTE_ELEMS) {
        remove_attr(node, "width");
        remove_attr(node, "height");
    }
    for child in element_children(node) {
        clean_styles(&child);
    }
}

fn is_video_embed(node: &NodeRef) -> bool {
    let attribute_match = node.as_element().is_some_and(|el| {
        el.attributes
            .borrow()
            .map
            .values()
            .any(|value| VIDEOS.is_match(&value.value))
    });
    attribute_match || (is_tag(node, "object") && VIDEOS.is_match(&inner_html(node)))
}

/// Removes every `tag` element, keeping known video embeds.
fn clean(root: &NodeRef, tag: &str) {
    let is_embed = matches!(tag, "object" | "embed" | "iframe");
    for node in descendants_by_tag(root, &[tag]) {
        if is_embed && is_video_embed(&node) {
            continue;
        }
        node.detach();
    }
}

/// Removes `<h1>`/`<h2>` whose class or id looks like chrome.
fn clean_headers(root: &NodeRef, flags: Flags) {
    for heading in descendants_by_tag(root, &["h1", "h2"]) {
        if class_weight(&heading, flags.weight_classes) < 0.0 {
            heading.detach();
        }
    }
}

/// Walks the subtree of `node` (not `node` itself), removing matches.
fn clean_matched_nodes(node: &NodeRef, filter: impl Fn(&NodeRef, &str) -> bool) {
    let end = next_node(node, true);
    let mut next = next_node(node, false);
    while let Some(current) = next {
        if end.as_ref() == Some(&current) {
            break;
        }
        next = if filter(&current, &match_string(&current)) {
            remove_and_get_next(&current)
        } else {
            next_node(&current, false)
        };
    }
}

pub(crate) fn is_data_table(table: &NodeRef) -> bool {
    if attr(table, "role").as_deref() == Some("presentation") {
        return false;
    }
    if attr(table, "datatable").as_deref() == Some("0") {
        return false;
    }
    if attr(table, "summary").is_some() {
        return true;
    }
    if descendants_by_tag(table, &["caption"])
        .first()
        .is_some_and(|caption| caption.first_child().is_some())
    {
        return true;
    }
    if !descendants_by_tag(table, &["col", "colgroup", "tfoot", "thead", "th"]).is_empty() {
        return true;
    }
    if !descendants_by_tag(table, &["table"]).is_empty() {
        return false;
    }

    let rows = descendants_by_tag(table, &["tr"]);
    let columns = rows
        .iter()
        .map(|row| {
            element_children(row)
                .iter()
                .filter(|cell| is_any_tag(cell, &["td", "th"]))
                .map(|cell| {
                    attr(cell, "colspan")
                        .and_then(|span| span.parse::<usize>().ok())
                        .unwrap_or(1)
                })
                .sum::<usize>()
        })
        .max()
        .unwrap_or(0);

    rows.len() >= 10 || columns > 4 || rows.len() * columns > 10
}

/// Removes `tag` elements that look like boilerplate: link farms, forms,
/// image clusters and short fragments. Nested matches are judged first.
fn clean_conditionally(root: &NodeRef, tag: &str, flags: Flags) {
    if !flags.clean_conditionally {
        return;
    }
    for node in descendants_by_tag(root, &[tag]).into_iter().rev() {
        if should_remove(&node, tag, flags) {
            node.detach();
        }
    }
}

fn should_remove(node: &NodeRef, tag: &str, flags: Flags) -> bool {
    let mut is_list = tag == "ul" || tag == "ol";
    if !is_list {
        let list_length: usize = descendants_by_tag(node, &["ul", "ol"])
            .iter()
            .map(text_len)
            .sum();
        let total = text_len(node);
        is_list = total > 0 && list_length as f64 / total as f64 > 0.9;
    }

    if tag == "table" && is_data_table(node) {
        return false;
    }
    if node
        .ancestors()
        .any(|ancestor| is_tag(&ancestor, "table") && is_data_table(&ancestor))
    {
        return false;
    }
    if has_ancestor_tag(node, "code", 3) {
        return false;
    }

    let weight = class_weight(node, flags.weight_classes);
    if weight < 0.0 {
        return true;
    }
    if char_count(node, ',') >= 10 {
        return false;
    }

    let paragraphs = descendants_by_tag(node, &["p"]).len() as f64;
    let images = descendants_by_tag(node, &["img"]).len();
    let list_items = descendants_by_tag(node, &["li"]).len() as f64 - 100.0;
    let inputs = descendants_by_tag(node, &["input"]).len() as f64;
    let heading_density = text_density(node, HEADINGS);
    let embeds = descendants_by_tag(node, &["object", "embed", "iframe"])
        .iter()
        .filter(|embed| !is_video_embed(embed))
        .count();
    let content_length = text_len(node);
    let density = link_density(node);
    let in_figure = has_ancestor_tag(node, "figure", 3);

    let have_to_remove = (images > 1 && paragraphs / (images as f64) < 0.5 && !in_figure)
        || (!is_list && list_items > paragraphs)
        || (inputs > (paragraphs / 3.0).floor())
        || (!is_list
            && heading_density < 0.9
            && content_length < 25
            && (images == 0 || images > 2)
            && !in_figure)
        || (!is_list && weight < 25.0 && density > 0.2)
        || (weight >= 25.0 && density > 0.5)
        || (embeds == 1 && content_length < 75)
        || embeds > 1;

    // Image galleries: one picture per list item.
    if is_list && have_to_remove {
        if element_children(node)
            .iter()
            .any(|child| element_children(child).len() > 1)
        {
            return have_to_remove;
        }
        if images == descendants_by_tag(node, &["li"]).len() {
            return false;
        }
    }

    have_to_remove
}

/// Final pass over the article: absolute URLs, flattened wrappers and
/// stripped class names.
pub(crate) fn post_process(
    article: &NodeRef,
    base: &Url,
    document_url: &Url,
    options: &ReadabilityOptions,
) {
    fix_relative_uris(article, base, document_url);
    simplify_nested_elements(article);
    if !options.keep_classes {
        clean_classes(article, &options.classes_to_preserve);
    }
}

fn to_absolute(uri: &str, base: &Url, document_url: &Url) -> String {
    if base == document_url && uri.starts_with('#') {
        return uri.to_string();
    }
    base.join(uri)
        .map(|url| url.to_string())
        .unwrap_or_else(|_| uri.to_string())
}

fn fix_relative_uris(article: &NodeRef, base: &Url, document_url: &Url) {
    for link in descendants_by_tag(article, &["a"]) {
        let Some(href) = attr(&link, "href") else { continue };
        if href.starts_with("javascript:") {
            let children: Vec<_> = link.children().collect();
            if children.len() == 1 && children[0].as_text().is_some() {
                replace_with(&link, &NodeRef::new_text(link.text_contents()));
            } else if let Some(element) = link.as_element() {
                let span = create_element(element, "span");
                for child in children {
                    span.append(child);
                }
                replace_with(&link, &span);
            }
        } else {
            set_attr(&link, "href", &to_absolute(&href, base, document_url));
        }
    }

    for media in descendants_by_tag(
        article,
        &["img", "picture", "figure", "video", "audio", "source"],
    ) {
        for name in ["src", "poster"] {
            if let Some(value) = attr(&media, name) {
                set_attr(&media, name, &to_absolute(&value, base, document_url));
            }
        }
        if let Some(srcset) = attr(&media, "srcset") {
            let rewritten = srcset
                .split(',')
                .map(str::trim)
                .filter(|candidate| !candidate.is_empty())
                .map(|candidate| match candidate.split_once(char::is_whitespace) {
                    Some((url, descriptor)) => format!(
                        "{} {}",
                        to_absolute(url, base, document_url),
                        descriptor.trim()
                    ),
                    None => to_absolute(candidate, base, document_url),
                })
                .collect::<Vec<_>>()
                .join(", ");
            set_attr(&media, "srcset", &rewritten);
        }
    }
}

/// Removes empty `<div>`/`<section>` wrappers and collapses single-child ones.
fn simplify_nested_elements(article: &NodeRef) {
    let mut node = Some(article.clone());
    while let Some(current) = node {
        let is_wrapper = current.parent().is_some()
            && is_any_tag(&current, &["div", "section"])
            && !attr(&current, "id").is_some_and(|id| id.starts_with("readability"));

        if is_wrapper {
            if is_element_without_content(&current) {
                node = remove_and_get_next(&current);
                continue;
            }
            if has_single_tag_inside(&current, "div") || has_single_tag_inside(&current, "section")
            {
                if let Some(child) = first_element_child(&current) {
                    if let (Some(from), Some(to)) = (current.as_element(), child.as_element()) {
                        let attributes: Vec<_> = from
                            .attributes
                            .borrow()
                            .map
                            .iter()
                            .map(|(key, value)| (key.clone(), value.clone()))
                            .collect();
                        let mut target = to.attributes.borrow_mut();
                        for (key, value) in attributes {
                            target.map.insert(key, value);
                        }
                    }
                    replace_with(&current, &child);
                    node = Some(child);
                    continue;
                }
            }
        }

        node = next_node(&current, false);
    }
}

fn clean_classes(node: &NodeRef, preserve: &[String]) {
    if let Some(class) = attr(node, "class") {
        let kept: Vec<&str> = class
            .split_whitespace()
            .filter(|name| *name == PAGE_CLASS || preserve.iter().any(|p| p == name))
            .collect();
        if kept.is_empty() {
            remove_attr(node, "class");
        } else {
            set_attr(node, "class", &kept.join(" "));
        }
    }
    for child in element_children(node) {
        clean_classes(&child, preserve);
    }
}

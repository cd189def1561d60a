//! Readability-style main-content extraction.
//!
//! Picks the element most likely to hold the article body, drops page chrome
//! from it, and re-serializes it with `href`/`src` resolved against the page URL.

use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use url::Url;

/// Containers that usually wrap the article body, most specific first
const CANDIDATE_SELECTORS: &[&str] = &[
    "article",
    r#"[itemprop="articleBody"]"#,
    "main",
    r#"[role="main"]"#,
    ".post-content",
    ".entry-content",
    ".article-content",
    "#content",
    ".content",
];

/// A candidate with less visible text than this is treated as a teaser
const MIN_CANDIDATE_TEXT: usize = 140;

const STRIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "nav", "header", "footer", "aside", "form", "iframe",
    "button", "svg", "template",
];

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("document has no body")]
    NoBody,

    #[error("no readable text found")]
    NoText,
}

/// Main content of an HTML page
#[derive(Debug, Clone)]
pub struct ExtractedArticle {
    pub title: String,
    /// Cleaned HTML of the article body
    pub content: String,
}

/// Extract the readable article from `html`, resolving relative links against `base`
pub fn extract_article(html: &str, base: &Url) -> Result<ExtractedArticle, ExtractError> {
    let document = Html::parse_document(html);
    let title = extract_title(&document);

    let root = find_candidate(&document)
        .or_else(|| best_paragraph_container(&document))
        .or_else(|| first_match(&document, "body"))
        .ok_or(ExtractError::NoBody)?;

    let mut content = String::new();
    if write_children(root, base, &mut content) == 0 {
        return Err(ExtractError::NoText);
    }

    Ok(ExtractedArticle {
        title,
        content: content.trim().to_string(),
    })
}

fn first_match<'a>(document: &'a Html, selector: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(selector).ok()?;
    document.select(&selector).next()
}

fn visible_text_len(element: ElementRef<'_>) -> usize {
    element.text().map(|t| t.trim().chars().count()).sum()
}

fn extract_title(document: &Html) -> String {
    let og_title = Selector::parse(r#"meta[property="og:title"]"#)
        .ok()
        .and_then(|sel| {
            document
                .select(&sel)
                .find_map(|el| el.value().attr("content"))
                .map(str::to_string)
        });

    og_title
        .or_else(|| first_match(document, "title").map(|el| el.text().collect::<String>()))
        .or_else(|| first_match(document, "h1").map(|el| el.text().collect::<String>()))
        .map(|t| t.trim().to_string())
        .unwrap_or_default()
}

fn find_candidate(document: &Html) -> Option<ElementRef<'_>> {
    CANDIDATE_SELECTORS.iter().find_map(|sel| {
        let selector = Selector::parse(sel).ok()?;
        document
            .select(&selector)
            .find(|el| visible_text_len(*el) >= MIN_CANDIDATE_TEXT)
    })
}

/// Text held by an element's direct `<p>` children
fn paragraph_score(element: ElementRef<'_>) -> usize {
    element
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|child| child.value().name() == "p")
        .map(visible_text_len)
        .sum()
}

fn best_paragraph_container(document: &Html) -> Option<ElementRef<'_>> {
    let selector = Selector::parse("div, section, td").ok()?;
    document
        .select(&selector)
        .map(|el| (paragraph_score(el), el))
        .filter(|(score, _)| *score > 0)
        .max_by_key(|(score, _)| *score)
        .map(|(_, el)| el)
}

enum Step<'a> {
    Element(ElementRef<'a>),
    Text(&'a str),
    Close(&'a str),
}

/// Serialize the children of `root`. Walks with an explicit stack so nesting
/// depth is bounded by the heap, not the call stack.
fn write_children(root: ElementRef<'_>, base: &Url, out: &mut String) -> usize {
    let mut text_len = 0;
    let mut stack = Vec::new();
    push_children(root, &mut stack);

    while let Some(step) = stack.pop() {
        match step {
            Step::Text(text) => {
                text_len += text.trim().chars().count();
                escape_into(text, out, false);
            }
            Step::Close(name) => {
                out.push_str("</");
                out.push_str(name);
                out.push('>');
            }
            Step::Element(element) => {
                let name = element.value().name();
                if STRIPPED_TAGS.contains(&name) {
                    continue;
                }
                write_open_tag(element, base, out);
                if !VOID_TAGS.contains(&name) {
                    stack.push(Step::Close(name));
                    push_children(element, &mut stack);
                }
            }
        }
    }

    text_len
}

/// Push children last-first so they pop in document order
fn push_children<'a>(element: ElementRef<'a>, stack: &mut Vec<Step<'a>>) {
    let start = stack.len();
    for child in element.children() {
        match child.value() {
            Node::Text(text) => stack.push(Step::Text(&**text)),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    stack.push(Step::Element(child));
                }
            }
            _ => {}
        }
    }
    stack[start..].reverse();
}

fn write_open_tag(element: ElementRef<'_>, base: &Url, out: &mut String) {
    out.push('<');
    out.push_str(element.value().name());
    for (attr, value) in element.value().attrs() {
        if attr.starts_with("on") || attr == "style" {
            continue;
        }
        out.push(' ');
        out.push_str(attr);
        out.push_str("=\"");
        if attr == "href" || attr == "src" {
            escape_into(&resolve_link(base, value), out, true);
        } else {
            escape_into(value, out, true);
        }
        out.push('"');
    }
    out.push('>');
}

fn resolve_link(base: &Url, link: &str) -> String {
    base.join(link.trim())
        .map(String::from)
        .unwrap_or_else(|_| link.to_string())
}

fn escape_into(text: &str, out: &mut String, attribute: bool) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://blog.example.com/posts/hello").unwrap()
    }

    fn long_text() -> String {
        "Rust makes systems programming approachable. ".repeat(6)
    }

    #[test]
    fn test_prefers_article_and_strips_chrome() {
        let html = format!(
            r#"<html><head><title>Hello</title></head><body>
                <nav><a href="/">Home</a></nav>
                <article>
                    <h1>Hello</h1>
                    <p>{}</p>
                    <script>track()</script>
                    <aside>Related posts</aside>
                </article>
                <footer>Copyright</footer>
            </body></html>"#,
            long_text()
        );

        let article = extract_article(&html, &base()).unwrap();
        assert_eq!(article.title, "Hello");
        assert!(article.content.contains("approachable"));
        assert!(!article.content.contains("track()"));
        assert!(!article.content.contains("Related posts"));
        assert!(!article.content.contains("Copyright"));
        assert!(!article.content.contains("Home"));
    }

    #[test]
    fn test_resolves_relative_links() {
        let html = format!(
            r#"<html><body><article>
                <p>{}</p>
                <a href="../about">About</a>
                <img src="/img/cat.png" alt="cat">
                <a href="https://other.example.org/x">Other</a>
            </article></body></html>"#,
            long_text()
        );

        let article = extract_article(&html, &base()).unwrap();
        assert!(article
            .content
            .contains(r#"href="https://blog.example.com/about""#));
        assert!(article
            .content
            .contains(r#"src="https://blog.example.com/img/cat.png""#));
        assert!(article
            .content
            .contains(r#"href="https://other.example.org/x""#));
    }

    #[test]
    fn test_og_title_wins() {
        let html = r#"<html><head>
                <meta property="og:title" content="Social Title">
                <title>Site | Page</title>
            </head><body><p>Some text</p></body></html>"#;

        let article = extract_article(html, &base()).unwrap();
        assert_eq!(article.title, "Social Title");
    }

    #[test]
    fn test_falls_back_to_paragraph_density() {
        let html = format!(
            r#"<html><body>
                <div class="sidebar"><p>tiny</p></div>
                <div class="story"><p>{}</p><p>{}</p></div>
            </body></html>"#,
            long_text(),
            long_text()
        );

        let article = extract_article(&html, &base()).unwrap();
        assert!(article.content.contains("approachable"));
        assert!(!article.content.contains("tiny"));
    }

    #[test]
    fn test_empty_page_is_error() {
        let html = "<html><body><script>var x = 1;</script></body></html>";
        assert_eq!(
            extract_article(html, &base()).unwrap_err(),
            ExtractError::NoText
        );
    }

    #[test]
    fn test_event_handlers_removed() {
        let html = r#"<html><body><p onclick="evil()">Click me</p></body></html>"#;
        let article = extract_article(html, &base()).unwrap();
        assert!(!article.content.contains("evil"));
        assert!(article.content.contains("Click me"));
    }

    #[test]
    fn test_deeply_nested_page_is_serialized() {
        let depth = 10_000;
        let html = format!(
            "<html><body><article>{}<p>{}</p>{}</article></body></html>",
            "<div>".repeat(depth),
            long_text(),
            "</div>".repeat(depth)
        );

        let article = extract_article(&html, &base()).unwrap();
        assert!(article.content.contains("approachable"));
        assert_eq!(article.content.matches("<div>").count(), depth);
        assert_eq!(article.content.matches("</div>").count(), depth);
    }
}

//! Rendering seams consumed by the dispatcher.
//!
//! Markdown rendering is a pure function of the accumulated content
//! string: the dispatcher re-renders the whole accumulation after every
//! fragment rather than patching incrementally, because a partial
//! Markdown document can change meaning when more text arrives (an
//! unclosed fence swallows everything after it).

pub mod diagram;

use pulldown_cmark::{CodeBlockKind, CowStr, Event as MdEvent, Options, Parser, Tag, TagEnd};

/// Render a Markdown document to HTML.
///
/// GFM tables and strikethrough are enabled. Two constructs get special
/// treatment to match the chat surface contract:
/// - fenced ```mermaid blocks become `<div class="mermaid">…</div>` so a
///   downstream diagram engine can pick them up after the stream ends;
/// - tables are wrapped in `<div class="table-wrapper">…</div>` for
///   horizontal scrolling.
pub fn markdown_to_html(source: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let mut events: Vec<MdEvent> = Vec::new();
    let mut mermaid: Option<String> = None;

    for event in Parser::new_ext(source, options) {
        match event {
            MdEvent::Start(Tag::CodeBlock(CodeBlockKind::Fenced(ref lang)))
                if is_mermaid_fence(lang) =>
            {
                mermaid = Some(String::new());
            }
            MdEvent::End(TagEnd::CodeBlock) if mermaid.is_some() => {
                if let Some(definition) = mermaid.take() {
                    events.push(MdEvent::Html(
                        format!("<div class=\"mermaid\">{}</div>", escape_html(&definition))
                            .into(),
                    ));
                }
            }
            MdEvent::Text(ref text) if mermaid.is_some() => {
                if let Some(buffer) = mermaid.as_mut() {
                    buffer.push_str(text);
                }
            }
            MdEvent::Start(Tag::Table(_)) => {
                events.push(MdEvent::Html("<div class=\"table-wrapper\">".into()));
                events.push(event);
            }
            MdEvent::End(TagEnd::Table) => {
                events.push(event);
                events.push(MdEvent::Html("</div>".into()));
            }
            other => events.push(other),
        }
    }

    let mut html = String::with_capacity(source.len() * 2);
    pulldown_cmark::html::push_html(&mut html, events.into_iter());
    html
}

fn is_mermaid_fence(info: &CowStr) -> bool {
    info.split_whitespace().next() == Some("mermaid")
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_basic_markdown() {
        let html = markdown_to_html("# Title\n\nSome **bold** text.");
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<strong>bold</strong>"));
    }

    #[test]
    fn mermaid_fences_become_divs() {
        let html = markdown_to_html("```mermaid\ngraph TD\nA --> B\n```");
        assert!(html.contains("<div class=\"mermaid\">graph TD\nA --&gt; B\n</div>"));
        assert!(!html.contains("<pre>"));
    }

    #[test]
    fn other_fences_stay_code_blocks() {
        let html = markdown_to_html("```python\nprint(1)\n```");
        assert!(html.contains("<pre>"));
        assert!(html.contains("print(1)"));
        assert!(!html.contains("class=\"mermaid\""));
    }

    #[test]
    fn tables_are_wrapped_for_scrolling() {
        let html = markdown_to_html("| a | b |\n|---|---|\n| 1 | 2 |");
        let open = html.find("<div class=\"table-wrapper\">").expect("wrapper");
        let table = html.find("<table>").expect("table");
        assert!(open < table);
        assert!(html.contains("</table></div>") || html.contains("</table>\n</div>"));
    }

    #[test]
    fn rendering_is_a_pure_function_of_the_input() {
        let source = "## Head\n\n- one\n- two\n\n```mermaid\npie\n```";
        assert_eq!(markdown_to_html(source), markdown_to_html(source));
    }

    #[test]
    fn unclosed_fence_still_renders_without_panicking() {
        let html = markdown_to_html("before\n\n```mermaid\ngraph LR");
        assert!(html.contains("before"));
    }
}

//! Deferred diagram rendering.
//!
//! Diagram definitions are only meaningful once their full text has
//! accumulated, so the dispatcher runs this pass at end-of-stream rather
//! than per fragment. The actual diagram engine lives behind
//! [`DiagramRenderer`]; the bundled [`SyntaxChecker`] only validates that
//! a definition opens with a known diagram kind.

use pulldown_cmark::{CodeBlockKind, Event as MdEvent, Options, Parser, Tag, TagEnd};

#[derive(Debug, thiserror::Error)]
pub enum DiagramError {
    #[error("empty diagram definition")]
    Empty,
    #[error("unknown diagram kind: {0}")]
    UnknownKind(String),
}

/// Boundary to the diagram engine.
pub trait DiagramRenderer {
    fn render(&self, definition: &str) -> Result<(), DiagramError>;
}

/// Collect the contents of every fenced ```mermaid block, in order.
pub fn extract_mermaid_blocks(source: &str) -> Vec<String> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);

    let mut blocks = Vec::new();
    let mut current: Option<String> = None;

    for event in Parser::new_ext(source, options) {
        match event {
            MdEvent::Start(Tag::CodeBlock(CodeBlockKind::Fenced(ref lang)))
                if lang.split_whitespace().next() == Some("mermaid") =>
            {
                current = Some(String::new());
            }
            MdEvent::End(TagEnd::CodeBlock) => {
                if let Some(block) = current.take() {
                    blocks.push(block);
                }
            }
            MdEvent::Text(ref text) => {
                if let Some(block) = current.as_mut() {
                    block.push_str(text);
                }
            }
            _ => {}
        }
    }

    blocks
}

/// Shallow validator standing in for a real diagram engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntaxChecker;

const DIAGRAM_KINDS: &[&str] = &[
    "graph",
    "flowchart",
    "sequenceDiagram",
    "classDiagram",
    "stateDiagram",
    "stateDiagram-v2",
    "erDiagram",
    "gantt",
    "pie",
    "journey",
    "mindmap",
    "timeline",
];

impl DiagramRenderer for SyntaxChecker {
    fn render(&self, definition: &str) -> Result<(), DiagramError> {
        let first = definition
            .split_whitespace()
            .next()
            .ok_or(DiagramError::Empty)?;
        if DIAGRAM_KINDS.contains(&first) {
            Ok(())
        } else {
            Err(DiagramError::UnknownKind(first.to_string()))
        }
    }
}

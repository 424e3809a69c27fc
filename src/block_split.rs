//! Flatten nested container markup into leaf block nodes.

use crate::markup::{Element, MarkupNode, TagClass};

/// Split one node into an ordered, flat list of leaf block nodes.
///
/// Container elements (`div`, `section`, ...) are descended into; block
/// children are cloned whole. Inline content sitting between blocks is
/// emitted as a synthetic `p` leaf when it carries text and dropped when it
/// does not (anchors, page-break markers). A container that yields no
/// blocks is returned whole so its content is never lost.
pub fn split_blocks(node: &MarkupNode) -> Vec<MarkupNode> {
    let mut out = Vec::with_capacity(8);
    split_into(node, &mut out);
    out
}

fn split_into(node: &MarkupNode, out: &mut Vec<MarkupNode>) {
    if node.class() != TagClass::Container {
        out.push(node.clone());
        return;
    }
    let start = out.len();
    let mut found_block = false;
    let mut run: Vec<MarkupNode> = Vec::new();
    for child in node.children() {
        match child.class() {
            TagClass::Block => {
                flush_inline_run(&mut run, out);
                out.push(child.clone());
                found_block = true;
            }
            TagClass::Container if !child.children().is_empty() => {
                flush_inline_run(&mut run, out);
                split_into(child, out);
                found_block = true;
            }
            TagClass::Container => {}
            TagClass::LineBreak | TagClass::Inline => run.push(child.clone()),
        }
    }
    if !found_block {
        out.truncate(start);
        out.push(node.clone());
        return;
    }
    flush_inline_run(&mut run, out);
}

fn flush_inline_run(run: &mut Vec<MarkupNode>, out: &mut Vec<MarkupNode>) {
    if run.iter().any(|n| !n.text_content().trim().is_empty()) {
        let mut paragraph = Element::new("p");
        paragraph.children = std::mem::take(run);
        out.push(MarkupNode::Element(paragraph));
    }
    run.clear();
}

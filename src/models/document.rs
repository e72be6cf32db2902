use serde::Serialize;
use std::fmt;

/// A node of a parsed document part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

/// An element with its qualified name (`w:p`, `w:t`, ...) kept exactly as read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn local_name(&self) -> &str {
        local_part(&self.name)
    }

    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(prefix, _)| prefix)
    }

    /// Builds a sibling name in this element's namespace prefix.
    pub fn qualified(&self, local: &str) -> String {
        match self.prefix() {
            Some(prefix) => format!("{prefix}:{local}"),
            None => local.to_string(),
        }
    }

    /// Looks an attribute up by its local name, ignoring the prefix.
    pub fn attr(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| local_part(key) == local)
            .map(|(_, value)| value.as_str())
    }

    pub fn set_attr(&mut self, key: &str, value: &str) {
        match self.attributes.iter_mut().find(|(k, _)| k == key) {
            Some(existing) => existing.1 = value.to_string(),
            None => self.attributes.push((key.to_string(), value.to_string())),
        }
    }

    pub fn with_attr(mut self, key: &str, value: &str) -> Self {
        self.set_attr(key, value);
        self
    }

    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlNode::Text(text.into()));
        self
    }

    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|child| match child {
            XmlNode::Element(el) => Some(el),
            XmlNode::Text(_) => None,
        })
    }

    pub fn find(&self, local: &str) -> Option<&XmlElement> {
        self.elements().find(|el| el.local_name() == local)
    }

    /// Character data directly inside this element.
    pub fn own_text(&self) -> String {
        self.children
            .iter()
            .filter_map(|child| match child {
                XmlNode::Text(text) => Some(text.as_str()),
                XmlNode::Element(_) => None,
            })
            .collect()
    }

    /// Flattened text: every `t` descendant concatenated in document order.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.push_text(&mut out);
        out
    }

    fn push_text(&self, out: &mut String) {
        if self.local_name() == "t" {
            out.push_str(&self.own_text());
            return;
        }
        for el in self.elements() {
            el.push_text(out);
        }
    }

    /// Replaces the element's content with a single text node.
    pub fn set_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        if text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace) {
            self.set_attr("xml:space", "preserve");
        }
        self.children = vec![XmlNode::Text(text)];
    }

    /// Pre-order list of descendants with the given local name.
    pub fn descendants_named(&self, local: &str) -> Vec<&XmlElement> {
        let mut out = Vec::new();
        self.collect_named(local, &mut out);
        out
    }

    fn collect_named<'a>(&'a self, local: &str, out: &mut Vec<&'a XmlElement>) {
        for el in self.elements() {
            if el.local_name() == local {
                out.push(el);
            }
            el.collect_named(local, out);
        }
    }

    /// Mutable counterpart of `descendants_named`; does not look inside a match.
    pub fn descendants_named_mut<'a>(&'a mut self, local: &str, out: &mut Vec<&'a mut XmlElement>) {
        for child in self.children.iter_mut() {
            if let XmlNode::Element(el) = child {
                if el.local_name() == local {
                    out.push(el);
                } else {
                    el.descendants_named_mut(local, out);
                }
            }
        }
    }

    /// First descendant (pre-order) accepted by `pred`.
    pub fn find_descendant_mut(
        &mut self,
        pred: &dyn Fn(&XmlElement) -> bool,
    ) -> Option<&mut XmlElement> {
        for child in self.children.iter_mut() {
            if let XmlNode::Element(el) = child {
                if pred(el) {
                    return Some(el);
                }
                if let Some(found) = el.find_descendant_mut(pred) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// Calls `f` on every descendant with the given local name, innermost first.
    pub fn for_each_named_mut(&mut self, local: &str, f: &mut dyn FnMut(&mut XmlElement)) {
        for child in self.children.iter_mut() {
            if let XmlNode::Element(el) = child {
                el.for_each_named_mut(local, f);
                if el.local_name() == local {
                    f(el);
                }
            }
        }
    }
}

fn local_part(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

/// The closed set of body-level node kinds the generator distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BlockKind {
    Paragraph,
    Table,
    SectionMetadata,
    Other,
}

impl BlockKind {
    /// Kinds cloned once per week.
    pub const REPEATABLE: &'static [BlockKind] = &[BlockKind::Paragraph, BlockKind::Table];
    /// Kinds copied once after the last week.
    pub const TRAILING: &'static [BlockKind] = &[BlockKind::SectionMetadata];

    pub fn of(element: &XmlElement) -> Self {
        match element.local_name() {
            "p" => BlockKind::Paragraph,
            "tbl" => BlockKind::Table,
            "sectPr" => BlockKind::SectionMetadata,
            _ => BlockKind::Other,
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BlockKind::Paragraph => "paragraph",
            BlockKind::Table => "table",
            BlockKind::SectionMetadata => "section properties",
            BlockKind::Other => "other",
        };
        f.write_str(label)
    }
}

/// A direct child of the document body, tagged with its kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub kind: BlockKind,
    pub element: XmlElement,
}

impl Block {
    pub fn new(element: XmlElement) -> Self {
        Self {
            kind: BlockKind::of(&element),
            element,
        }
    }

    pub fn text(&self) -> String {
        self.element.text()
    }
}

/// The block-level content of a document body, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Body {
    pub blocks: Vec<Block>,
}

impl Body {
    /// Classifies the children of a `w:body` element. Whitespace between blocks is dropped.
    pub fn from_element(body: &XmlElement) -> Self {
        Self {
            blocks: body.elements().cloned().map(Block::new).collect(),
        }
    }

    /// Deep copies of every block whose kind is in `kinds`, in document order.
    pub fn clone_blocks(&self, kinds: &[BlockKind]) -> Vec<Block> {
        self.blocks
            .iter()
            .filter(|block| kinds.contains(&block.kind))
            .cloned()
            .collect()
    }

    pub fn count(&self, kind: BlockKind) -> usize {
        self.blocks.iter().filter(|block| block.kind == kind).count()
    }

    pub fn outline(&self) -> Vec<BlockSummary> {
        self.blocks
            .iter()
            .enumerate()
            .map(|(index, block)| BlockSummary {
                index,
                kind: block.kind,
                text: block.text(),
            })
            .collect()
    }
}

impl From<Vec<Block>> for Body {
    fn from(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }
}

#[derive(Debug, Serialize)]
pub struct BlockSummary {
    pub index: usize,
    pub kind: BlockKind,
    pub text: String,
}

impl fmt::Display for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Document body:")?;
        writeln!(f, "  Paragraphs: {}", self.count(BlockKind::Paragraph))?;
        writeln!(f, "  Tables: {}", self.count(BlockKind::Table))?;
        writeln!(
            f,
            "  Section properties: {}",
            self.count(BlockKind::SectionMetadata)
        )?;
        writeln!(f, "  Other: {}", self.count(BlockKind::Other))?;

        for summary in self.outline() {
            writeln!(f, "  #{} {}: {}", summary.index, summary.kind, summary.text)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(text: &str) -> XmlElement {
        XmlElement::new("w:r").with_child(XmlElement::new("w:t").with_text(text))
    }

    fn paragraph(runs: &[&str]) -> XmlElement {
        runs.iter()
            .fold(XmlElement::new("w:p"), |p, text| p.with_child(run(text)))
    }

    #[test]
    fn classifies_by_local_name() {
        assert_eq!(BlockKind::of(&XmlElement::new("w:p")), BlockKind::Paragraph);
        assert_eq!(BlockKind::of(&XmlElement::new("w:tbl")), BlockKind::Table);
        assert_eq!(
            BlockKind::of(&XmlElement::new("w:sectPr")),
            BlockKind::SectionMetadata
        );
        assert_eq!(
            BlockKind::of(&XmlElement::new("w:bookmarkStart")),
            BlockKind::Other
        );
        assert_eq!(BlockKind::of(&XmlElement::new("p")), BlockKind::Paragraph);
    }

    #[test]
    fn flattened_text_spans_runs() {
        let p = paragraph(&["Owner: [Owner", "Name]"]);
        assert_eq!(p.text(), "Owner: [OwnerName]");
    }

    #[test]
    fn clone_blocks_filters_and_keeps_order() {
        let body = XmlElement::new("w:body")
            .with_child(paragraph(&["a"]))
            .with_text("\n  ")
            .with_child(XmlElement::new("w:tbl").with_child(paragraph(&["b"])))
            .with_child(XmlElement::new("w:bookmarkEnd"))
            .with_child(paragraph(&["c"]))
            .with_child(XmlElement::new("w:sectPr"));
        let body = Body::from_element(&body);
        assert_eq!(body.blocks.len(), 5);

        let repeatable = body.clone_blocks(BlockKind::REPEATABLE);
        let texts: Vec<_> = repeatable.iter().map(Block::text).collect();
        assert_eq!(texts, vec!["a", "b", "c"]);

        let trailing = body.clone_blocks(BlockKind::TRAILING);
        assert_eq!(trailing.len(), 1);
        assert_eq!(trailing[0].kind, BlockKind::SectionMetadata);
    }

    #[test]
    fn attributes_match_on_local_name() {
        let el = XmlElement::new("w:rFonts").with_attr("w:ascii", "Arial");
        assert_eq!(el.attr("ascii"), Some("Arial"));
        assert_eq!(el.qualified("rPr"), "w:rPr");
        assert_eq!(XmlElement::new("body").qualified("p"), "p");
    }

    #[test]
    fn set_text_preserves_edge_whitespace() {
        let mut t = XmlElement::new("w:t");
        t.set_text("Owner: ");
        assert_eq!(t.attr("space"), Some("preserve"));
        assert_eq!(t.own_text(), "Owner: ");
    }

    #[test]
    fn display_lists_blocks() {
        let body = Body::from(vec![Block::new(paragraph(&["Week: [TimeInterval]"]))]);
        let rendered = body.to_string();
        assert!(rendered.contains("Paragraphs: 1"));
        assert!(rendered.contains("#0 paragraph: Week: [TimeInterval]"));
    }
}

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, TimetableError};
use crate::models::document::{Block, BlockKind, XmlElement, XmlNode};

/// What to do when a marker's text is spread over several runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceholderPolicy {
    /// Only a run holding exactly the marker is rewritten; anything else is an error.
    #[default]
    Strict,
    /// Fall back to rewriting the runs of the paragraph the marker spans.
    MergeRuns,
}

/// Resets the run properties of every run in the cloned paragraphs to `font`.
///
/// Tables and section properties are left untouched.
pub fn normalize_fonts(blocks: &mut [Block], font: &str) {
    for block in blocks
        .iter_mut()
        .filter(|block| block.kind == BlockKind::Paragraph)
    {
        let prefix = block.element.prefix().map(str::to_owned);
        block.element.for_each_named_mut("r", &mut |run| {
            // math runs (m:r) carry their own property model
            if run.prefix() == prefix.as_deref() {
                reset_run_font(run, font);
            }
        });
    }
}

fn reset_run_font(run: &mut XmlElement, font: &str) {
    let fonts = XmlElement::new(run.qualified("rFonts"))
        .with_attr(&run.qualified("ascii"), font)
        .with_attr(&run.qualified("hAnsi"), font);
    let properties = XmlElement::new(run.qualified("rPr")).with_child(fonts);

    run.children.retain(|child| {
        !matches!(child, XmlNode::Element(el) if el.local_name() == "rPr")
    });
    run.children
        .insert(0, XmlNode::Element(properties));
}

/// Replaces `marker` with `value` inside a freshly cloned week block.
///
/// The first block whose flattened text contains the marker is searched for a text
/// run that is exactly the marker; that run is rewritten.
pub fn substitute(
    blocks: &mut [Block],
    marker: &str,
    value: &str,
    policy: PlaceholderPolicy,
) -> Result<()> {
    let block = blocks
        .iter_mut()
        .find(|block| block.text().contains(marker))
        .ok_or_else(|| TimetableError::MissingPlaceholder {
            placeholder: marker.to_string(),
        })?;

    let is_exact = |el: &XmlElement| el.local_name() == "t" && el.own_text() == marker;
    if let Some(text) = block.element.find_descendant_mut(&is_exact) {
        let replaced = text.own_text().replace(marker, value);
        text.set_text(replaced);
        debug!("Substituted {} in a single run", marker);
        return Ok(());
    }

    match policy {
        PlaceholderPolicy::Strict => Err(TimetableError::PlaceholderSplit {
            placeholder: marker.to_string(),
        }),
        PlaceholderPolicy::MergeRuns => {
            warn!("No single run holds placeholder {}, merging runs", marker);
            merge_runs(&mut block.element, marker, value)
        }
    }
}

fn merge_runs(container: &mut XmlElement, marker: &str, value: &str) -> Result<()> {
    let split = || TimetableError::PlaceholderSplit {
        placeholder: marker.to_string(),
    };

    let holds_marker = |el: &XmlElement| el.local_name() == "p" && el.text().contains(marker);
    let paragraph = if holds_marker(&*container) {
        container
    } else {
        container.find_descendant_mut(&holds_marker).ok_or_else(split)?
    };

    let mut texts = Vec::new();
    paragraph.descendants_named_mut("t", &mut texts);

    let full: String = texts.iter().map(|t| t.own_text()).collect();
    let start_of_marker = full.find(marker).ok_or_else(split)?;
    let end_of_marker = start_of_marker + marker.len();

    let mut offset = 0;
    let mut replaced = false;
    for text in texts {
        let own = text.own_text();
        let (start, end) = (offset, offset + own.len());
        offset = end;
        if end <= start_of_marker || start >= end_of_marker {
            continue;
        }

        let head = &own[..start_of_marker.saturating_sub(start)];
        let tail = &own[end_of_marker.min(end) - start..];
        let rewritten = if replaced {
            format!("{head}{tail}")
        } else {
            replaced = true;
            format!("{head}{value}{tail}")
        };
        text.set_text(rewritten);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(text: &str) -> XmlElement {
        XmlElement::new("w:r")
            .with_child(XmlElement::new("w:rPr").with_child(XmlElement::new("w:b")))
            .with_child(XmlElement::new("w:t").with_text(text))
    }

    fn paragraph(runs: &[&str]) -> Block {
        Block::new(
            runs.iter()
                .fold(XmlElement::new("w:p"), |p, text| p.with_child(run(text))),
        )
    }

    fn table(runs: &[&str]) -> Block {
        let cell = XmlElement::new("w:tc").with_child(paragraph(runs).element);
        Block::new(XmlElement::new("w:tbl").with_child(XmlElement::new("w:tr").with_child(cell)))
    }

    fn week() -> Vec<Block> {
        vec![
            paragraph(&["Owner: ", "[OwnerName]"]),
            table(&["Week: ", "[TimeInterval]"]),
        ]
    }

    #[test]
    fn replaces_exact_runs() {
        let mut blocks = week();
        substitute(&mut blocks, "[OwnerName]", "Ada", PlaceholderPolicy::Strict).unwrap();
        substitute(
            &mut blocks,
            "[TimeInterval]",
            "01/01/2024 - 07/01/2024",
            PlaceholderPolicy::Strict,
        )
        .unwrap();

        assert_eq!(blocks[0].text(), "Owner: Ada");
        assert_eq!(blocks[1].text(), "Week: 01/01/2024 - 07/01/2024");
    }

    #[test]
    fn only_first_containing_block_is_rewritten() {
        let mut blocks = vec![paragraph(&["[OwnerName]"]), paragraph(&["[OwnerName]"])];
        substitute(&mut blocks, "[OwnerName]", "Ada", PlaceholderPolicy::Strict).unwrap();
        assert_eq!(blocks[0].text(), "Ada");
        assert_eq!(blocks[1].text(), "[OwnerName]");
    }

    #[test]
    fn missing_marker_is_named() {
        let mut blocks = vec![paragraph(&["Owner: [OwnerName]"])];
        let err = substitute(&mut blocks, "[TimeInterval]", "x", PlaceholderPolicy::Strict)
            .unwrap_err();
        assert!(
            matches!(err, TimetableError::MissingPlaceholder { ref placeholder } if placeholder == "[TimeInterval]")
        );
    }

    #[test]
    fn marker_sharing_a_run_with_other_text_fails_under_strict() {
        let mut blocks = vec![paragraph(&["Owner: [OwnerName]"])];
        let err =
            substitute(&mut blocks, "[OwnerName]", "Ada", PlaceholderPolicy::Strict).unwrap_err();
        assert!(matches!(err, TimetableError::PlaceholderSplit { .. }));
        assert_eq!(
            err.to_string(),
            "Placeholder '[OwnerName]' is not held exactly by any single text run"
        );
    }

    #[test]
    fn merge_policy_rewrites_split_runs() {
        let mut blocks = vec![paragraph(&["Owner: [Own", "er", "Name] (main)"])];
        substitute(&mut blocks, "[OwnerName]", "Ada", PlaceholderPolicy::MergeRuns).unwrap();
        assert_eq!(blocks[0].text(), "Owner: Ada (main)");

        let texts: Vec<_> = blocks[0]
            .element
            .descendants_named("t")
            .into_iter()
            .map(XmlElement::own_text)
            .collect();
        assert_eq!(texts, vec!["Owner: Ada", "", " (main)"]);
        assert_eq!(
            blocks[0].element.descendants_named("t")[2].attr("space"),
            Some("preserve")
        );
    }

    #[test]
    fn merge_policy_reaches_into_tables() {
        let mut blocks = vec![table(&["[Time", "Interval]"])];
        substitute(&mut blocks, "[TimeInterval]", "W1", PlaceholderPolicy::MergeRuns).unwrap();
        assert_eq!(blocks[0].text(), "W1");
    }

    #[test]
    fn fonts_reset_on_paragraph_runs_only() {
        let mut blocks = week();
        normalize_fonts(&mut blocks, "Arial");

        for run in blocks[0].element.descendants_named("r") {
            let first = match &run.children[0] {
                XmlNode::Element(el) => el,
                XmlNode::Text(_) => panic!("expected run properties first"),
            };
            assert_eq!(first.name, "w:rPr");
            assert!(first.find("b").is_none());
            let fonts = first.find("rFonts").unwrap();
            assert_eq!(fonts.attr("ascii"), Some("Arial"));
            assert_eq!(fonts.attr("hAnsi"), Some("Arial"));
            assert_eq!(run.descendants_named("rPr").len(), 1);
        }

        for run in blocks[1].element.descendants_named("r") {
            assert!(run.find("rPr").unwrap().find("b").is_some());
        }
    }

    #[test]
    fn math_runs_are_not_touched() {
        let math = XmlElement::new("m:r").with_child(XmlElement::new("m:t").with_text("x"));
        let mut blocks = vec![Block::new(
            XmlElement::new("w:p").with_child(XmlElement::new("m:oMath").with_child(math)),
        )];
        normalize_fonts(&mut blocks, "Arial");
        assert!(blocks[0].element.descendants_named("rPr").is_empty());
    }
}

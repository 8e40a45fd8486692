use serde::Serialize;
use std::collections::HashMap;

use crate::catalog::{BBoxPx, Region};
use crate::sanitize::sanitize;

/// One non-empty OCR line attributed to the region that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine<'a> {
    pub region: &'a Region,
    pub line: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldText {
    pub id: String,
    pub text: String,
    pub bbox: BBoxPx,
}

/// Field id to text, ordered by first occurrence of the id.
///
/// Each entry keeps the region that created it; later regions sharing the
/// id only extend the text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap {
    entries: Vec<FieldText>,
    index: HashMap<String, usize>,
}

impl FieldMap {
    pub fn get(&self, id: &str) -> Option<&FieldText> {
        self.index.get(id).map(|&idx| &self.entries[idx])
    }

    pub fn text(&self, id: &str) -> Option<&str> {
        self.get(id).map(|entry| entry.text.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldText> {
        self.entries.iter()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn append(&mut self, region: &Region, line: &str) {
        if let Some(&idx) = self.index.get(&region.id) {
            let text = &mut self.entries[idx].text;
            text.push('\n');
            text.push_str(line);
            return;
        }
        self.index.insert(region.id.clone(), self.entries.len());
        self.entries.push(FieldText {
            id: region.id.clone(),
            text: line.to_string(),
            bbox: region.bbox,
        });
    }

    /// Sanitizes every entry, keeping ids, boxes and order.
    pub fn cleaned(&self) -> FieldMap {
        FieldMap {
            entries: self
                .entries
                .iter()
                .map(|entry| FieldText {
                    id: entry.id.clone(),
                    text: sanitize(&entry.text),
                    bbox: entry.bbox,
                })
                .collect(),
            index: self.index.clone(),
        }
    }
}

impl<'a> IntoIterator for &'a FieldMap {
    type Item = &'a FieldText;
    type IntoIter = std::slice::Iter<'a, FieldText>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Splits each region's OCR output into lines, skipping lines that are exactly
/// empty. Whitespace-only lines are kept.
pub fn parse_lines<'a, I, S>(outputs: I) -> Vec<ParsedLine<'a>>
where
    I: IntoIterator<Item = (&'a Region, S)>,
    S: AsRef<str>,
{
    let mut parsed = Vec::new();
    for (region, text) in outputs {
        for line in text.as_ref().split('\n') {
            if line.is_empty() {
                continue;
            }
            parsed.push(ParsedLine {
                region,
                line: line.to_string(),
            });
        }
    }
    parsed
}

pub fn aggregate(lines: &[ParsedLine<'_>]) -> FieldMap {
    let mut fields = FieldMap::default();
    for parsed in lines {
        fields.append(parsed.region, &parsed.line);
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(id: &str, y: u32) -> Region {
        Region::new(id, 0, y, 10, 10)
    }

    #[test]
    fn duplicate_ids_concatenate_across_regions() {
        let a1 = region("A", 0);
        let b = region("B", 20);
        let a2 = region("A", 40);
        let lines = parse_lines([(&a1, "x"), (&b, "y"), (&a2, "z")]);
        let fields = aggregate(&lines);

        assert_eq!(fields.ids(), vec!["A", "B"]);
        assert_eq!(fields.text("A"), Some("x\nz"));
        assert_eq!(fields.text("B"), Some("y"));
        assert_eq!(fields.get("A").map(|entry| entry.bbox), Some(a1.bbox));
    }

    #[test]
    fn empty_lines_are_skipped() {
        let r = region("field", 0);
        let lines = parse_lines([(&r, "foo\n\nbar\n")]);
        let texts: Vec<&str> = lines.iter().map(|p| p.line.as_str()).collect();
        assert_eq!(texts, vec!["foo", "bar"]);
        assert_eq!(aggregate(&lines).text("field"), Some("foo\nbar"));
    }

    #[test]
    fn whitespace_only_lines_are_kept() {
        let r = region("field", 0);
        let fields = aggregate(&parse_lines([(&r, "foo\n  \nbar")]));
        assert_eq!(fields.text("field"), Some("foo\n  \nbar"));
    }

    #[test]
    fn empty_output_produces_no_entry() {
        let empty = region("empty", 0);
        let blank = region("blank", 10);
        let full = region("full", 20);
        let fields = aggregate(&parse_lines([
            (&empty, ""),
            (&blank, "\n\n"),
            (&full, "text"),
        ]));
        assert!(fields.get("empty").is_none());
        assert!(fields.get("blank").is_none());
        assert_eq!(fields.ids(), vec!["full"]);
    }

    #[test]
    fn first_non_empty_region_establishes_entry() {
        let first = region("A", 0);
        let second = region("A", 50);
        let fields = aggregate(&parse_lines([(&first, ""), (&second, "late")]));
        assert_eq!(fields.text("A"), Some("late"));
        assert_eq!(fields.get("A").map(|entry| entry.bbox), Some(second.bbox));
    }

    #[test]
    fn cleaned_keeps_order_and_boxes() {
        let a = region("A", 0);
        let b = region("B", 30);
        let fields = aggregate(&parse_lines([(&a, " caf\u{e9} "), (&b, "\u{2116}1\n")]));
        let cleaned = fields.cleaned();
        assert_eq!(cleaned.ids(), vec!["A", "B"]);
        assert_eq!(cleaned.text("A"), Some("caf"));
        assert_eq!(cleaned.text("B"), Some("1"));
        assert_eq!(cleaned.get("B").map(|entry| entry.bbox), Some(b.bbox));
    }
}

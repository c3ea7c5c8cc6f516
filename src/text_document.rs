//! # Text-Level Virtual Document
//!
//! Whole-script sibling of the virtual script builder. Original text is copied up to an
//! offset or skipped, and synthetic text is recorded as labelled fragments anchored to
//! the original text it stands in for. Positions inside a fragment project onto the
//! anchor's boundaries instead of being rejected.

use crate::coords::{CoordinateIndex, Range};
use crate::node::Ranged;
use crate::virtual_script::Breakpoint;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VirtualFragment {
    pub label: String,
    pub generated: Range,
    /// Original text the fragment replaces; empty for pure insertions.
    pub anchor: Range,
}

/// Name and contents a type checker sees for the virtual document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualFile {
    pub file_name: String,
    pub text: String,
}

impl VirtualFile {
    pub fn new(original_path: &str, typescript: bool, text: String) -> Self {
        let extension = if typescript { "ts" } else { "js" };
        VirtualFile {
            file_name: format!("{original_path}.{extension}"),
            text,
        }
    }
}

pub struct VirtualDocument<'s> {
    source: &'s str,
    cursor: usize,
    skipped: Option<Range>,
    text: String,
    breakpoints: Vec<Breakpoint>,
    fragments: Vec<VirtualFragment>,
}

impl<'s> VirtualDocument<'s> {
    pub fn new(source: &'s str) -> Self {
        VirtualDocument {
            source,
            cursor: 0,
            skipped: None,
            text: String::new(),
            breakpoints: Vec::new(),
            fragments: Vec::new(),
        }
    }

    /// Copies original text from the cursor up to `offset`.
    pub fn copy_up_to(&mut self, offset: usize) {
        self.skipped = None;
        if offset <= self.cursor {
            return;
        }
        let slice = self.source.get(self.cursor..offset).unwrap_or("");
        self.breakpoints.push(Breakpoint {
            original: self.cursor,
            generated: self.text.len(),
            len: slice.len(),
        });
        self.text.push_str(slice);
        self.cursor = offset;
    }

    /// Moves the cursor to `offset` without copying; the skipped text becomes the anchor
    /// of the next synthetic fragment.
    pub fn skip_up_to(&mut self, offset: usize) {
        if offset <= self.cursor {
            return;
        }
        let start = self.skipped.map_or(self.cursor, |s| s.start);
        self.skipped = Some(Range::new(start, offset));
        self.cursor = offset;
    }

    pub fn append_synthetic(&mut self, label: &str, text: &str) {
        if text.is_empty() {
            return;
        }
        let anchor = self
            .skipped
            .take()
            .unwrap_or_else(|| Range::new(self.cursor, self.cursor));
        let generated = Range::new(self.text.len(), self.text.len() + text.len());
        self.text.push_str(text);
        match self.fragments.last_mut() {
            Some(last) if last.generated.end == generated.start => {
                last.generated.end = generated.end;
                last.anchor.end = last.anchor.end.max(anchor.end);
                if !last.label.split('+').any(|l| l == label) {
                    last.label.push('+');
                    last.label.push_str(label);
                }
            }
            _ => self.fragments.push(VirtualFragment {
                label: label.to_string(),
                generated,
                anchor,
            }),
        }
    }

    pub fn finish(self) -> VirtualText {
        VirtualText {
            text: self.text,
            breakpoints: self.breakpoints,
            fragments: self.fragments,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VirtualText {
    pub text: String,
    pub breakpoints: Vec<Breakpoint>,
    pub fragments: Vec<VirtualFragment>,
}

impl VirtualText {
    fn fragment_at(&self, offset: usize, closing: bool) -> Option<&VirtualFragment> {
        self.fragments.iter().find(|f| {
            if closing {
                f.generated.start < offset && offset <= f.generated.end
            } else {
                f.generated.start <= offset && offset < f.generated.end
            }
        })
    }

    pub fn map_start(&self, offset: usize) -> Option<usize> {
        if let Some(fragment) = self.fragment_at(offset, false) {
            return Some(fragment.anchor.start);
        }
        self.breakpoints
            .iter()
            .find(|b| b.generated <= offset && offset <= b.generated + b.len)
            .map(|b| b.original + (offset - b.generated))
    }

    pub fn map_end(&self, offset: usize) -> Option<usize> {
        if let Some(fragment) = self.fragment_at(offset, true) {
            return Some(fragment.anchor.end);
        }
        self.breakpoints
            .iter()
            .find(|b| b.generated <= offset && offset <= b.generated + b.len)
            .map(|b| b.original + (offset - b.generated))
    }

    pub fn map_range(&self, range: Range) -> Option<Range> {
        let start = self.map_start(range.start)?;
        let end = self.map_end(range.end)?;
        Some(Range::new(start, end.max(start)))
    }

    /// Whether `range` lies entirely inside one synthetic fragment.
    pub fn is_synthetic(&self, range: Range) -> bool {
        self.fragments.iter().any(|f| f.generated.contains(range))
    }

    /// Remaps tokens or comments, dropping those made of synthetic text only.
    pub fn project<T: Ranged>(&self, items: Vec<T>, coords: &CoordinateIndex) -> Vec<T> {
        items
            .into_iter()
            .filter_map(|mut item| {
                let range = item.range();
                if self.is_synthetic(range) {
                    return None;
                }
                let mapped = self.map_range(range)?;
                item.relocate(mapped, coords);
                Some(item)
            })
            .collect()
    }

    /// Best original position for a diagnostic at a generated offset.
    pub fn error_offset(&self, offset: usize) -> usize {
        self.map_start(offset)
            .or_else(|| {
                self.breakpoints
                    .iter()
                    .rev()
                    .find(|b| b.generated <= offset)
                    .map(|b| b.original + b.len)
            })
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_reactive_rewrite_projection() {
        let source = "$: d = a * 2;";
        let mut doc = VirtualDocument::new(source);
        doc.copy_up_to(0);
        doc.skip_up_to(7);
        doc.append_synthetic("reactive", "let d = __reactive(() => (");
        doc.copy_up_to(12);
        doc.skip_up_to(13);
        doc.append_synthetic("reactive", "));");
        let text = doc.finish();
        assert_eq!(text.text, "let d = __reactive(() => (a * 2));");
        assert_eq!(
            text.fragments[0],
            VirtualFragment {
                label: "reactive".into(),
                generated: Range::new(0, 26),
                anchor: Range::new(0, 7),
            }
        );
        // `a * 2` maps straight back.
        assert_eq!(text.map_range(Range::new(26, 31)), Some(Range::new(7, 12)));
        // The whole declaration projects onto the whole statement.
        assert_eq!(text.map_range(Range::new(0, 34)), Some(Range::new(0, 13)));
        // `let` is pure scaffolding.
        assert!(text.is_synthetic(Range::new(0, 3)));
    }

    #[test]
    fn test_adjacent_fragments_coalesce() {
        let mut doc = VirtualDocument::new("x");
        doc.copy_up_to(1);
        doc.append_synthetic("store", "\nlet $a = __store_value(a);");
        doc.append_synthetic("store", "\nlet $b = __store_value(b);");
        let text = doc.finish();
        assert_eq!(text.fragments.len(), 1);
        assert_eq!(text.fragments[0].anchor, Range::new(1, 1));
        assert_eq!(text.map_start(5), Some(1));
    }

    #[test]
    fn test_virtual_file_name() {
        let file = VirtualFile::new("src/App.svelte", true, String::new());
        assert_eq!(file.file_name, "src/App.svelte.ts");
    }
}

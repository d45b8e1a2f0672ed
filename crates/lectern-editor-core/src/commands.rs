//! Editing commands.
//!
//! Every toolbar and keyboard operation is a `Command`: a semantic operation
//! on the document, decoupled from how it was triggered. The engine decides
//! whether a command applies (`Engine::can_apply`) and performs it
//! (`Engine::apply`); commands themselves carry only their parameters.

use lectern_dom::Mark;
use smol_str::SmolStr;

/// Target type for a block-type change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    Paragraph,
    /// Heading level 1-6.
    Heading(u8),
}

/// Text alignment for textblocks. `Left` is the default and clears the
/// alignment attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Center,
    Right,
    Justify,
}

impl Alignment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Right => "right",
            Alignment::Justify => "justify",
        }
    }
}

/// All editor commands.
///
/// Selection-scoped commands (marks, alignment, block type, list and quote
/// toggles) operate on the current selection range. Insertion commands
/// operate at the caret and replace a non-empty selection first.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // === Text ===
    /// Insert text at the caret, replacing any selected content.
    InsertText { text: String },
    /// Split the current textblock at the caret (Enter).
    SplitBlock,
    /// Insert a soft line break (Shift+Enter).
    InsertLineBreak,
    /// Delete backward from the caret, or delete the selection (Backspace).
    DeleteBackward,
    /// Delete forward from the caret, or delete the selection (Delete).
    DeleteForward,

    // === Marks ===
    /// Toggle a mark over the selection.
    ToggleMark { mark: Mark },
    /// Wrap the selection in a link.
    SetLink { href: SmolStr },
    /// Remove any link from the selection.
    Unlink,
    /// Set the text color of the selection.
    SetTextColor { color: SmolStr },

    // === Blocks ===
    /// Change covered textblocks to a paragraph or heading.
    SetBlockType { block: BlockType },
    /// Set the alignment of covered textblocks.
    SetAlignment { align: Alignment },
    /// Wrap the covered blocks in a bullet list, or unwrap them.
    ToggleBulletList,
    /// Wrap the covered blocks in an ordered list, or unwrap them.
    ToggleOrderedList,
    /// Wrap the covered blocks in a blockquote, or unwrap them.
    ToggleBlockquote,

    // === Insertion ===
    InsertHorizontalRule,
    InsertTable { rows: usize, cols: usize },
    InsertImage { src: SmolStr, alt: SmolStr },
    InsertMedia { src: SmolStr },

    // === Selected atomic node ===
    /// Replace the selected image or media node's width (size presets).
    ResizeSelected { width: SmolStr },
    /// Delete the selected atomic node.
    DeleteSelected,

    // === Selection ===
    SelectAll,

    // === History ===
    Undo,
    Redo,
}

impl Command {
    /// Whether this command mutates the document when it applies.
    ///
    /// `SelectAll` only moves the selection; everything else either edits
    /// the tree or moves through history.
    pub fn mutates_document(&self) -> bool {
        !matches!(self, Command::SelectAll)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alignment_strings() {
        assert_eq!(Alignment::Left.as_str(), "left");
        assert_eq!(Alignment::Justify.as_str(), "justify");
    }

    #[test]
    fn test_select_all_does_not_mutate() {
        assert!(!Command::SelectAll.mutates_document());
        assert!(Command::Undo.mutates_document());
        assert!(Command::InsertText { text: "x".into() }.mutates_document());
    }
}

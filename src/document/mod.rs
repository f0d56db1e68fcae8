//! Document model: text, line index and the parse tree.
//!
//! Positions exchanged with the editor are line/character pairs; the engine
//! works in byte offsets. [`Document`] converts between the two with a rope,
//! counting characters the same way the rest of the crate does.

mod node;
mod parser;
pub mod scanner;

pub use node::{
    number_value, pointer_string, NodeId, NodeKind, NodeValue, ParsedNode, ParsedTree, PathSegment,
    SyntaxError,
};
pub use parser::parse;

use std::path::{Path, PathBuf};

use ropey::Rope;
use tower_lsp::lsp_types::{Position, Range};

#[derive(Debug, Clone)]
pub struct Document {
    path: Option<PathBuf>,
    rope: Rope,
    tree: Option<ParsedTree>,
    text: String,
}

impl Document {
    pub fn new(text: &str) -> Self {
        Self {
            path: None,
            rope: Rope::from_str(text),
            tree: parse(text),
            text: text.to_string(),
        }
    }

    pub fn with_path(path: impl Into<PathBuf>, text: &str) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::new(text)
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Parse tree, `None` when the text holds no JSON value at all.
    pub fn tree(&self) -> Option<&ParsedTree> {
        self.tree.as_ref()
    }

    /// Byte offset of an editor position. `character` counts UTF-16 code
    /// units, the LSP default encoding. Positions past the end of a line
    /// clamp to the line end; lines past the end clamp to the text end.
    pub fn offset_at(&self, position: Position) -> usize {
        let line = position.line as usize;
        if line >= self.rope.len_lines() {
            return self.text.len();
        }
        let line_start = self.rope.line_to_char(line);
        let line_slice = self.rope.line(line);
        let mut line_len = line_slice.len_chars();
        // do not step over the line break
        while line_len > 0 && matches!(line_slice.char(line_len - 1), '\n' | '\r') {
            line_len -= 1;
        }
        let line_start_cu = self.rope.char_to_utf16_cu(line_start);
        let line_end_cu = self.rope.char_to_utf16_cu(line_start + line_len);
        let target = (line_start_cu + position.character as usize).min(line_end_cu);
        // a unit inside a surrogate pair resolves to the start of its char
        self.rope.char_to_byte(self.rope.utf16_cu_to_char(target))
    }

    /// Editor position of a byte offset, in UTF-16 code units.
    pub fn position_at(&self, offset: usize) -> Position {
        let offset = offset.min(self.text.len());
        let char_index = self.rope.byte_to_char(offset);
        let line = self.rope.char_to_line(char_index);
        let character = self.rope.char_to_utf16_cu(char_index)
            - self.rope.char_to_utf16_cu(self.rope.line_to_char(line));
        Position {
            line: line as u32,
            character: character as u32,
        }
    }

    pub fn range_of(&self, start: usize, end: usize) -> Range {
        Range {
            start: self.position_at(start),
            end: self.position_at(end.max(start)),
        }
    }
}

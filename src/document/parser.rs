//! Error-tolerant parser building a [`ParsedTree`].
//!
//! Documents being edited are usually invalid, so the parser records syntax
//! errors and keeps going: missing values, colons, commas and closing
//! brackets are all recovered. A property whose value is missing extends up
//! to the next token so a cursor sitting after the colon still lands inside
//! it.

use std::sync::Arc;

use super::node::{NodeId, NodeKind, NodeValue, ParsedNode, ParsedTree, SyntaxError};
use super::scanner::{unescape, Scanner, Token, TokenKind};

/// Nesting deeper than this is reported and not descended into.
const MAX_NESTING: usize = 512;

pub fn parse(text: &str) -> Option<ParsedTree> {
    let tokens: Vec<Token> = Scanner::new(text)
        .filter(|token| !token.kind.is_comment())
        .collect();

    let mut parser = Parser {
        text,
        tokens,
        pos: 0,
        nodes: Vec::new(),
        errors: Vec::new(),
        nesting: 0,
    };

    let root = parser.parse_value(None)?;
    if let Some(extra) = parser.peek_token() {
        parser.error_at(extra, "End of file expected.");
    }

    Some(ParsedTree {
        source: Arc::from(text),
        nodes: parser.nodes,
        root,
        syntax_errors: parser.errors,
    })
}

struct Parser<'a> {
    text: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    nodes: Vec<ParsedNode>,
    errors: Vec<SyntaxError>,
    nesting: usize,
}

impl Parser<'_> {
    fn peek_token(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn peek(&self) -> TokenKind {
        self.peek_token().map(|t| t.kind).unwrap_or(TokenKind::Eof)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.peek_token()?;
        self.pos += 1;
        Some(token)
    }

    /// Offset where the next token starts, or the end of the text.
    fn next_offset(&self) -> usize {
        self.peek_token()
            .map(|t| t.offset)
            .unwrap_or(self.text.len())
    }

    fn error_at(&mut self, token: Token, message: &str) {
        self.errors.push(SyntaxError {
            offset: token.offset,
            length: token.len.max(1),
            message: message.to_string(),
        });
    }

    fn error_here(&mut self, message: &str) {
        match self.peek_token() {
            Some(token) => self.error_at(token, message),
            None => self.errors.push(SyntaxError {
                offset: self.text.len(),
                length: 0,
                message: message.to_string(),
            }),
        }
    }

    fn push(&mut self, kind: NodeKind, offset: usize, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(ParsedNode {
            kind,
            offset,
            length: 0,
            value: NodeValue::None,
            children: Vec::new(),
            parent,
            colon_offset: None,
        });
        id
    }

    fn finish(&mut self, id: NodeId, end: usize) {
        let node = &mut self.nodes[id.0];
        node.length = end.saturating_sub(node.offset);
    }

    fn attach(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent.0].children.push(child);
    }

    fn parse_value(&mut self, parent: Option<NodeId>) -> Option<NodeId> {
        let token = self.peek_token()?;
        match token.kind {
            TokenKind::OpenBrace => self.parse_container(parent, NodeKind::Object),
            TokenKind::OpenBracket => self.parse_container(parent, NodeKind::Array),
            TokenKind::String => {
                self.bump();
                Some(self.parse_string(token, parent))
            }
            TokenKind::Number => {
                self.bump();
                let id = self.push(NodeKind::Number, token.offset, parent);
                match self.text[token.offset..token.end()].parse::<f64>() {
                    Ok(n) => self.nodes[id.0].value = NodeValue::Number(n),
                    Err(_) => self.error_at(token, "Invalid number format."),
                }
                self.finish(id, token.end());
                Some(id)
            }
            TokenKind::True | TokenKind::False => {
                self.bump();
                let id = self.push(NodeKind::Boolean, token.offset, parent);
                self.nodes[id.0].value = NodeValue::Boolean(token.kind == TokenKind::True);
                self.finish(id, token.end());
                Some(id)
            }
            TokenKind::Null => {
                self.bump();
                let id = self.push(NodeKind::Null, token.offset, parent);
                self.finish(id, token.end());
                Some(id)
            }
            _ => None,
        }
    }

    fn parse_string(&mut self, token: Token, parent: Option<NodeId>) -> NodeId {
        if token.unterminated {
            self.error_at(token, "Unexpected end of string.");
        }
        let id = self.push(NodeKind::String, token.offset, parent);
        self.nodes[id.0].value = NodeValue::String(unescape(&self.text[token.offset..token.end()]));
        self.finish(id, token.end());
        id
    }

    fn parse_container(&mut self, parent: Option<NodeId>, kind: NodeKind) -> Option<NodeId> {
        let open = self.bump()?;
        let id = self.push(kind, open.offset, parent);
        let close = if kind == NodeKind::Object {
            TokenKind::CloseBrace
        } else {
            TokenKind::CloseBracket
        };

        if self.nesting >= MAX_NESTING {
            self.error_at(open, "Document is nested too deeply.");
            self.skip_to_close(close);
            let end = self.bump().map(|t| t.end()).unwrap_or(self.text.len());
            self.finish(id, end);
            return Some(id);
        }
        self.nesting += 1;

        let mut needs_comma = false;
        loop {
            let token = self.peek();
            if token == close {
                break;
            }
            if token == TokenKind::Eof {
                break;
            }
            if needs_comma {
                if token == TokenKind::Comma {
                    let comma = self.bump()?;
                    if self.peek() == close {
                        self.error_at(comma, "Trailing comma.");
                    }
                    needs_comma = false;
                    continue;
                }
                self.error_here("Expected comma.");
            }

            let parsed = if kind == NodeKind::Object {
                self.parse_property(id)
            } else {
                self.parse_value(Some(id))
            };

            match parsed {
                Some(child) => {
                    self.attach(id, child);
                    needs_comma = true;
                }
                None => {
                    let message = if kind == NodeKind::Object {
                        "Property expected."
                    } else {
                        "Value expected."
                    };
                    self.error_here(message);
                    // only skip tokens that cannot start the next element
                    if !matches!(self.peek(), TokenKind::CloseBrace | TokenKind::CloseBracket) {
                        self.bump();
                    } else {
                        break;
                    }
                }
            }
        }

        self.nesting -= 1;
        let end = if self.peek() == close {
            self.bump().map(|t| t.end()).unwrap_or(self.text.len())
        } else {
            let message = if kind == NodeKind::Object {
                "Expected '}'."
            } else {
                "Expected ']'."
            };
            self.error_here(message);
            self.last_end(id)
        };
        self.finish(id, end);
        Some(id)
    }

    fn parse_property(&mut self, object: NodeId) -> Option<NodeId> {
        let key_token = self.peek_token()?;
        if key_token.kind != TokenKind::String {
            return None;
        }
        self.bump();
        let property = self.push(NodeKind::Property, key_token.offset, Some(object));
        let key = self.parse_string(key_token, Some(property));
        self.attach(property, key);

        if self.peek() != TokenKind::Colon {
            self.error_here("Colon expected.");
            self.finish(property, key_token.end());
            return Some(property);
        }
        let colon = self.bump()?;
        self.nodes[property.0].colon_offset = Some(colon.offset);

        match self.parse_value(Some(property)) {
            Some(value) => {
                self.attach(property, value);
                let end = self.nodes[value.0].end();
                self.finish(property, end);
            }
            None => {
                self.error_here("Value expected.");
                // extend to the next token so the gap after the colon belongs here
                let end = self.next_offset().max(colon.end());
                self.finish(property, end);
                if !matches!(
                    self.peek(),
                    TokenKind::CloseBrace | TokenKind::CloseBracket | TokenKind::Comma | TokenKind::String
                ) {
                    self.bump();
                }
            }
        }
        Some(property)
    }

    fn skip_to_close(&mut self, close: TokenKind) {
        let mut depth = 0usize;
        while let Some(token) = self.peek_token() {
            match token.kind {
                TokenKind::OpenBrace | TokenKind::OpenBracket => depth += 1,
                kind if kind == close && depth == 0 => return,
                TokenKind::CloseBrace | TokenKind::CloseBracket => depth = depth.saturating_sub(1),
                _ => {}
            }
            self.bump();
        }
    }

    /// End of the last consumed token, used when a container is never closed.
    fn last_end(&self, id: NodeId) -> usize {
        let start = self.nodes[id.0].offset + 1;
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map(|t| t.end())
            .unwrap_or(start)
            .max(start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::node::PathSegment;
    use serde_json::json;

    #[test]
    fn test_parses_valid_document() {
        let tree = parse(r#"{"a": [1, "x", true, null], "b": {"c": 2.5}}"#).unwrap();
        assert!(tree.syntax_errors().is_empty());
        assert_eq!(
            tree.to_value(tree.root()),
            json!({"a": [1, "x", true, null], "b": {"c": 2.5}})
        );
    }

    #[test]
    fn test_node_ranges() {
        let text = r#"{"key": "value"}"#;
        let tree = parse(text).unwrap();
        let root = tree.node(tree.root());
        assert_eq!((root.offset, root.length), (0, text.len()));

        let value = tree.get_property(tree.root(), "key").unwrap();
        assert_eq!(tree.source_of(value), "\"value\"");
        assert_eq!(tree.path_of(value), vec![PathSegment::Key("key".into())]);
    }

    #[test]
    fn test_comments_are_ignored() {
        let tree = parse("{\n  // a comment\n  \"a\": 1 /* trailing */\n}").unwrap();
        assert!(tree.syntax_errors().is_empty());
        assert_eq!(tree.to_value(tree.root()), json!({"a": 1}));
    }

    #[test]
    fn test_missing_value_extends_property() {
        let text = r#"{"a": }"#;
        let tree = parse(text).unwrap();
        assert_eq!(tree.syntax_errors().len(), 1);
        let (_, prop) = tree.properties(tree.root()).next().unwrap();
        assert!(tree.property_value(prop).is_none());
        // cursor after the space still resolves to the property
        assert_eq!(tree.node_at_offset(6, true), Some(prop));
    }

    #[test]
    fn test_unclosed_object_recovers() {
        let tree = parse(r#"{"a": 1, "b": [1, 2"#).unwrap();
        assert!(!tree.syntax_errors().is_empty());
        assert_eq!(tree.to_value(tree.root()), json!({"a": 1, "b": [1, 2]}));
    }

    #[test]
    fn test_missing_comma_is_reported() {
        let tree = parse("{\"a\": 1\n \"b\": 2}").unwrap();
        assert_eq!(tree.syntax_errors().len(), 1);
        assert_eq!(tree.syntax_errors()[0].message, "Expected comma.");
        assert_eq!(tree.to_value(tree.root()), json!({"a": 1, "b": 2}));
    }

    #[test]
    fn test_empty_input_has_no_tree() {
        assert!(parse("").is_none());
        assert!(parse("   // only a comment").is_none());
    }

    #[test]
    fn test_find_by_path() {
        let tree = parse(r#"{"list": [{"id": "x"}]}"#).unwrap();
        let node = tree
            .find_by_path(&["list".into(), PathSegment::Index(0), "id".into()])
            .unwrap();
        assert_eq!(tree.node(node).as_str(), Some("x"));
    }
}

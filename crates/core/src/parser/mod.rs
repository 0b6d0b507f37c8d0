//! Content-stream parsing.
//!
//! - `lexer`: byte-level tokenizer with byte ranges and inline image data
//! - `content`: statement builder (operator + operand buffer, inline images)

pub mod content;
pub mod lexer;

// Re-export main types for convenience
pub use content::{ContentParser, InlineImage, Operands, Operation, Statement, parse_content};
pub use lexer::{Arity, ContentLexer, Keyword, Token, TokenKind, tokenize};

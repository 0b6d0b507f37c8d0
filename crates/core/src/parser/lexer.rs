//! Content-stream tokenizer.
//!
//! Turns raw operator-language bytes into a flat token sequence. Every token
//! carries the byte range it was read from. Arrays and dictionaries are left
//! as start/end markers; [`super::content`] assembles them into operands.
//!
//! Inline image data is special: after an `ID` operator the lexer switches
//! to raw mode and returns the image bytes as one [`TokenKind::InlineImageData`]
//! token, ending at the first whitespace followed by `EI`.

use crate::error::{RenderError, Result};
use std::ops::Range;

/// Content-stream operator keyword. Known operators are zero-allocation variants.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Keyword {
    // Graphics state
    Q,  // restore (uppercase Q)
    Qq, // save (lowercase q)
    Cm, // concat matrix
    Ww, // line width (lowercase w)
    J,  // line cap (uppercase J)
    Jj, // line join (lowercase j)
    M,  // miter limit
    D,  // dash pattern
    Ri, // rendering intent
    I,  // flatness
    Gs, // graphics state dict

    // Path construction
    Mm, // moveto (lowercase m)
    L,  // lineto
    C,  // curveto
    V,
    Y,
    H,  // closepath
    Re, // rectangle

    // Path painting
    S,      // stroke (uppercase)
    Ss,     // close+stroke (lowercase s)
    F,      // fill (uppercase, legacy)
    Ff,     // fill (lowercase f)
    FStar,  // f*
    B,      // fill+stroke
    BStar,  // B*
    Bb,     // close+fill+stroke (lowercase b)
    BbStar, // b*
    N,      // end path

    // Clipping
    WClip, // W
    WStar, // W*

    // Text object
    BT,
    ET,

    // Text state
    Tc,
    Tw,
    Tz,
    TL,
    Tf,
    Tr,
    Ts,

    // Text positioning
    Td,
    TD,
    Tm,
    TStar, // T*

    // Text showing
    Tj,
    TJ,
    Quote,       // '
    DoubleQuote, // "

    // Type 3 glyph metrics
    D0,
    D1,

    // Color
    CS,
    Cs, // lowercase
    SC,
    SCN,
    Sc,  // lowercase
    Scn, // lowercase
    G,
    Gg, // lowercase g
    RG,
    Rg, // lowercase
    K,
    Kk, // lowercase k

    // Shading
    Sh,

    // XObject
    Do,

    // Inline image
    BI,
    ID,
    EI,

    // Marked content
    MP,
    DP,
    BMC,
    BDC,
    EMC,

    // Compatibility sections
    BX,
    EX,

    // Unknown (preserves original bytes)
    Unknown(Vec<u8>),
}

/// Number of operands an operator consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Exactly this many operands.
    Exact(usize),
    /// At least this many operands (color setters).
    AtLeast(usize),
    /// Anything goes (unknown operators).
    Any,
}

impl Arity {
    /// Check an operand count against this arity.
    pub const fn accepts(self, count: usize) -> bool {
        match self {
            Self::Exact(n) => count == n,
            Self::AtLeast(n) => count >= n,
            Self::Any => true,
        }
    }
}

impl std::fmt::Display for Arity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact(n) => write!(f, "{n}"),
            Self::AtLeast(n) => write!(f, "at least {n}"),
            Self::Any => write!(f, "any number of"),
        }
    }
}

impl Keyword {
    pub fn from_bytes(b: &[u8]) -> Self {
        match b {
            // Graphics state
            b"Q" => Keyword::Q,
            b"q" => Keyword::Qq,
            b"cm" => Keyword::Cm,
            b"w" => Keyword::Ww,
            b"J" => Keyword::J,
            b"j" => Keyword::Jj,
            b"M" => Keyword::M,
            b"d" => Keyword::D,
            b"ri" => Keyword::Ri,
            b"i" => Keyword::I,
            b"gs" => Keyword::Gs,

            // Path construction
            b"m" => Keyword::Mm,
            b"l" => Keyword::L,
            b"c" => Keyword::C,
            b"v" => Keyword::V,
            b"y" => Keyword::Y,
            b"h" => Keyword::H,
            b"re" => Keyword::Re,

            // Path painting
            b"S" => Keyword::S,
            b"s" => Keyword::Ss,
            b"F" => Keyword::F,
            b"f" => Keyword::Ff,
            b"f*" => Keyword::FStar,
            b"B" => Keyword::B,
            b"B*" => Keyword::BStar,
            b"b" => Keyword::Bb,
            b"b*" => Keyword::BbStar,
            b"n" => Keyword::N,

            // Clipping
            b"W" => Keyword::WClip,
            b"W*" => Keyword::WStar,

            // Text
            b"BT" => Keyword::BT,
            b"ET" => Keyword::ET,
            b"Tc" => Keyword::Tc,
            b"Tw" => Keyword::Tw,
            b"Tz" => Keyword::Tz,
            b"TL" => Keyword::TL,
            b"Tf" => Keyword::Tf,
            b"Tr" => Keyword::Tr,
            b"Ts" => Keyword::Ts,
            b"Td" => Keyword::Td,
            b"TD" => Keyword::TD,
            b"Tm" => Keyword::Tm,
            b"T*" => Keyword::TStar,
            b"Tj" => Keyword::Tj,
            b"TJ" => Keyword::TJ,
            b"'" => Keyword::Quote,
            b"\"" => Keyword::DoubleQuote,
            b"d0" => Keyword::D0,
            b"d1" => Keyword::D1,

            // Color
            b"CS" => Keyword::CS,
            b"cs" => Keyword::Cs,
            b"SC" => Keyword::SC,
            b"SCN" => Keyword::SCN,
            b"sc" => Keyword::Sc,
            b"scn" => Keyword::Scn,
            b"G" => Keyword::G,
            b"g" => Keyword::Gg,
            b"RG" => Keyword::RG,
            b"rg" => Keyword::Rg,
            b"K" => Keyword::K,
            b"k" => Keyword::Kk,

            b"sh" => Keyword::Sh,
            b"Do" => Keyword::Do,

            b"BI" => Keyword::BI,
            b"ID" => Keyword::ID,
            b"EI" => Keyword::EI,

            b"MP" => Keyword::MP,
            b"DP" => Keyword::DP,
            b"BMC" => Keyword::BMC,
            b"BDC" => Keyword::BDC,
            b"EMC" => Keyword::EMC,

            b"BX" => Keyword::BX,
            b"EX" => Keyword::EX,

            _ => Keyword::Unknown(b.to_vec()),
        }
    }

    /// The operator mnemonic as it appears in the content stream.
    pub fn as_str(&self) -> std::borrow::Cow<'_, str> {
        let s = match self {
            Keyword::Q => "Q",
            Keyword::Qq => "q",
            Keyword::Cm => "cm",
            Keyword::Ww => "w",
            Keyword::J => "J",
            Keyword::Jj => "j",
            Keyword::M => "M",
            Keyword::D => "d",
            Keyword::Ri => "ri",
            Keyword::I => "i",
            Keyword::Gs => "gs",
            Keyword::Mm => "m",
            Keyword::L => "l",
            Keyword::C => "c",
            Keyword::V => "v",
            Keyword::Y => "y",
            Keyword::H => "h",
            Keyword::Re => "re",
            Keyword::S => "S",
            Keyword::Ss => "s",
            Keyword::F => "F",
            Keyword::Ff => "f",
            Keyword::FStar => "f*",
            Keyword::B => "B",
            Keyword::BStar => "B*",
            Keyword::Bb => "b",
            Keyword::BbStar => "b*",
            Keyword::N => "n",
            Keyword::WClip => "W",
            Keyword::WStar => "W*",
            Keyword::BT => "BT",
            Keyword::ET => "ET",
            Keyword::Tc => "Tc",
            Keyword::Tw => "Tw",
            Keyword::Tz => "Tz",
            Keyword::TL => "TL",
            Keyword::Tf => "Tf",
            Keyword::Tr => "Tr",
            Keyword::Ts => "Ts",
            Keyword::Td => "Td",
            Keyword::TD => "TD",
            Keyword::Tm => "Tm",
            Keyword::TStar => "T*",
            Keyword::Tj => "Tj",
            Keyword::TJ => "TJ",
            Keyword::Quote => "'",
            Keyword::DoubleQuote => "\"",
            Keyword::D0 => "d0",
            Keyword::D1 => "d1",
            Keyword::CS => "CS",
            Keyword::Cs => "cs",
            Keyword::SC => "SC",
            Keyword::SCN => "SCN",
            Keyword::Sc => "sc",
            Keyword::Scn => "scn",
            Keyword::G => "G",
            Keyword::Gg => "g",
            Keyword::RG => "RG",
            Keyword::Rg => "rg",
            Keyword::K => "K",
            Keyword::Kk => "k",
            Keyword::Sh => "sh",
            Keyword::Do => "Do",
            Keyword::BI => "BI",
            Keyword::ID => "ID",
            Keyword::EI => "EI",
            Keyword::MP => "MP",
            Keyword::DP => "DP",
            Keyword::BMC => "BMC",
            Keyword::BDC => "BDC",
            Keyword::EMC => "EMC",
            Keyword::BX => "BX",
            Keyword::EX => "EX",
            Keyword::Unknown(bytes) => return String::from_utf8_lossy(bytes),
        };
        std::borrow::Cow::Borrowed(s)
    }

    /// Declared operand count for this operator.
    pub const fn arity(&self) -> Arity {
        use Keyword::*;
        match self {
            Qq | Q | H | S | Ss | F | Ff | FStar | B | BStar | Bb | BbStar | N | WClip
            | WStar | BT | ET | TStar | EMC | BX | EX | BI | ID | EI => Arity::Exact(0),
            Ww | J | Jj | M | Ri | I | Gs | Tc | Tw | Tz | TL | Tr | Ts | Tj | TJ | Quote
            | CS | Cs | G | Gg | Sh | Do | MP | BMC => Arity::Exact(1),
            D | Mm | L | Tf | Td | TD | D0 | DP | BDC => Arity::Exact(2),
            DoubleQuote | RG | Rg => Arity::Exact(3),
            V | Y | Re | K | Kk => Arity::Exact(4),
            Cm | C | Tm | D1 => Arity::Exact(6),
            SC | Sc | SCN | Scn => Arity::AtLeast(1),
            Unknown(_) => Arity::Any,
        }
    }

    /// Whether this operator paints (or discards) the current path.
    pub const fn is_path_painting(&self) -> bool {
        use Keyword::*;
        matches!(self, S | Ss | F | Ff | FStar | B | BStar | Bb | BbStar | N)
    }
}

/// Token kind plus decoded value.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Operator mnemonic
    Operator(Keyword),
    /// Integer number
    Integer(i64),
    /// Real number
    Real(f64),
    /// `true` / `false`
    Bool(bool),
    /// `null`
    Null,
    /// Literal or hex string, escapes decoded
    String(Vec<u8>),
    /// Name with `#xx` escapes decoded, without the leading slash
    Name(String),
    /// `[`
    ArrayStart,
    /// `]`
    ArrayEnd,
    /// `<<`
    DictStart,
    /// `>>`
    DictEnd,
    /// Raw bytes between `ID` and `EI`; the value is `source[range]`
    InlineImageData,
}

/// A lexed token and the byte range it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub range: Range<usize>,
}

/// Streaming tokenizer over one content stream.
pub struct ContentLexer<'a> {
    data: &'a [u8],
    pos: usize,
    /// Set after an `ID` operator: the next token is raw image data.
    inline_data_pending: bool,
}

impl<'a> ContentLexer<'a> {
    pub const fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            inline_data_pending: false,
        }
    }

    /// Current byte offset.
    pub const fn tell(&self) -> usize {
        self.pos
    }

    /// The underlying source bytes.
    pub const fn source(&self) -> &'a [u8] {
        self.data
    }

    /// Read the next token, or `None` at end of input.
    pub fn next_token(&mut self) -> Result<Option<Token>> {
        if self.inline_data_pending {
            self.inline_data_pending = false;
            return self.read_inline_data().map(Some);
        }

        self.skip_whitespace_and_comments();
        if self.pos >= self.data.len() {
            return Ok(None);
        }

        let start = self.pos;
        let c = self.data[self.pos];
        let kind = match c {
            b'/' => {
                self.pos += 1;
                TokenKind::Name(self.parse_name())
            }
            b'(' => {
                self.pos += 1;
                TokenKind::String(self.parse_string()?)
            }
            b'<' => {
                if self.data.get(self.pos + 1) == Some(&b'<') {
                    self.pos += 2;
                    TokenKind::DictStart
                } else {
                    self.pos += 1;
                    TokenKind::String(self.parse_hex_string()?)
                }
            }
            b'>' => {
                if self.data.get(self.pos + 1) == Some(&b'>') {
                    self.pos += 2;
                    TokenKind::DictEnd
                } else {
                    return Err(RenderError::Syntax {
                        pos: start,
                        msg: "stray '>'".into(),
                    });
                }
            }
            b'[' => {
                self.pos += 1;
                TokenKind::ArrayStart
            }
            b']' => {
                self.pos += 1;
                TokenKind::ArrayEnd
            }
            b'{' | b'}' | b')' => {
                return Err(RenderError::Syntax {
                    pos: start,
                    msg: format!("unexpected '{}'", c as char),
                });
            }
            b'+' | b'-' | b'.' | b'0'..=b'9' => self.parse_number(),
            _ => self.parse_keyword(),
        };

        if kind == TokenKind::Operator(Keyword::ID) {
            self.inline_data_pending = true;
        }

        Ok(Some(Token {
            kind,
            range: start..self.pos,
        }))
    }

    fn skip_whitespace_and_comments(&mut self) {
        while self.pos < self.data.len() {
            let c = self.data[self.pos];
            if is_whitespace(c) {
                self.pos += 1;
            } else if c == b'%' {
                while self.pos < self.data.len()
                    && self.data[self.pos] != b'\n'
                    && self.data[self.pos] != b'\r'
                {
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    fn parse_name(&mut self) -> String {
        let mut name = Vec::new();
        while self.pos < self.data.len() {
            let c = self.data[self.pos];
            if is_whitespace(c) || is_delimiter(c) {
                break;
            }
            if c == b'#' && self.pos + 2 < self.data.len() {
                if let (Some(h), Some(l)) = (
                    hex_value(self.data[self.pos + 1]),
                    hex_value(self.data[self.pos + 2]),
                ) {
                    name.push((h << 4) | l);
                    self.pos += 3;
                    continue;
                }
            }
            name.push(c);
            self.pos += 1;
        }
        String::from_utf8_lossy(&name).into_owned()
    }

    fn parse_number(&mut self) -> TokenKind {
        let start = self.pos;
        if matches!(self.data[self.pos], b'+' | b'-') {
            self.pos += 1;
        }
        let mut has_dot = false;
        while self.pos < self.data.len() {
            match self.data[self.pos] {
                b'0'..=b'9' => self.pos += 1,
                b'.' if !has_dot => {
                    has_dot = true;
                    self.pos += 1;
                }
                _ => break,
            }
        }
        let text = std::str::from_utf8(&self.data[start..self.pos]).unwrap_or("0");
        if has_dot {
            // "5." and "-.5" are valid; a lone sign or dot reads as zero
            TokenKind::Real(text.parse::<f64>().unwrap_or(0.0))
        } else {
            match text.parse::<i64>() {
                Ok(n) => TokenKind::Integer(n),
                Err(_) => TokenKind::Real(text.parse::<f64>().unwrap_or(0.0)),
            }
        }
    }

    fn parse_string(&mut self) -> Result<Vec<u8>> {
        let start = self.pos - 1;
        let mut out = Vec::new();
        let mut depth = 1usize;
        while self.pos < self.data.len() {
            let c = self.data[self.pos];
            self.pos += 1;
            match c {
                b'(' => {
                    depth += 1;
                    out.push(c);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(out);
                    }
                    out.push(c);
                }
                b'\\' => self.parse_string_escape(&mut out),
                _ => out.push(c),
            }
        }
        Err(RenderError::Syntax {
            pos: start,
            msg: "unterminated string".into(),
        })
    }

    fn parse_string_escape(&mut self, out: &mut Vec<u8>) {
        let Some(&c) = self.data.get(self.pos) else {
            return;
        };
        self.pos += 1;
        match c {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0c),
            b'0'..=b'7' => {
                let mut value = u32::from(c - b'0');
                for _ in 0..2 {
                    match self.data.get(self.pos) {
                        Some(&d @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(d - b'0');
                            self.pos += 1;
                        }
                        _ => break,
                    }
                }
                out.push((value & 0xff) as u8);
            }
            // line continuation
            b'\r' => {
                if self.data.get(self.pos) == Some(&b'\n') {
                    self.pos += 1;
                }
            }
            b'\n' => {}
            _ => out.push(c),
        }
    }

    fn parse_hex_string(&mut self) -> Result<Vec<u8>> {
        let start = self.pos - 1;
        let mut out = Vec::new();
        let mut pending: Option<u8> = None;
        while self.pos < self.data.len() {
            let c = self.data[self.pos];
            self.pos += 1;
            if c == b'>' {
                if let Some(high) = pending {
                    out.push(high << 4);
                }
                return Ok(out);
            }
            if let Some(nibble) = hex_value(c) {
                match pending.take() {
                    Some(high) => out.push((high << 4) | nibble),
                    None => pending = Some(nibble),
                }
            }
        }
        Err(RenderError::Syntax {
            pos: start,
            msg: "unterminated hex string".into(),
        })
    }

    fn parse_keyword(&mut self) -> TokenKind {
        let start = self.pos;
        while self.pos < self.data.len() {
            let c = self.data[self.pos];
            if is_whitespace(c) || is_delimiter(c) {
                break;
            }
            self.pos += 1;
        }
        // a lone delimiter we do not otherwise handle still has to advance
        if self.pos == start {
            self.pos += 1;
        }
        match &self.data[start..self.pos] {
            b"true" => TokenKind::Bool(true),
            b"false" => TokenKind::Bool(false),
            b"null" => TokenKind::Null,
            word => TokenKind::Operator(Keyword::from_bytes(word)),
        }
    }

    /// Read raw inline image bytes up to (not including) `<ws>EI`.
    ///
    /// One whitespace byte after `ID` is part of the operator. The data ends
    /// at the first whitespace byte followed by `EI` and then whitespace,
    /// a delimiter or end of input.
    fn read_inline_data(&mut self) -> Result<Token> {
        if self.pos < self.data.len() && is_whitespace(self.data[self.pos]) {
            self.pos += 1;
        }
        let start = self.pos;
        let mut i = start;
        while i + 2 < self.data.len() {
            if is_whitespace(self.data[i])
                && self.data[i + 1] == b'E'
                && self.data[i + 2] == b'I'
                && self
                    .data
                    .get(i + 3)
                    .is_none_or(|&c| is_whitespace(c) || is_delimiter(c))
            {
                self.pos = i + 1;
                return Ok(Token {
                    kind: TokenKind::InlineImageData,
                    range: start..i,
                });
            }
            i += 1;
        }
        // `EI` directly after `ID` (empty data)
        if self.data[start..].starts_with(b"EI")
            && self
                .data
                .get(start + 2)
                .is_none_or(|&c| is_whitespace(c) || is_delimiter(c))
        {
            return Ok(Token {
                kind: TokenKind::InlineImageData,
                range: start..start,
            });
        }
        self.pos = self.data.len();
        Err(RenderError::UnterminatedInlineImage { pos: start })
    }
}

impl Iterator for ContentLexer<'_> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token().transpose()
    }
}

/// Tokenize a whole content stream.
pub fn tokenize(data: &[u8]) -> Result<Vec<Token>> {
    ContentLexer::new(data).collect()
}

pub(crate) const fn is_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\n' | b'\r' | b'\x0c' | b'\x00')
}

const fn is_delimiter(c: u8) -> bool {
    matches!(
        c,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

const fn hex_value(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(data: &[u8]) -> Vec<TokenKind> {
        tokenize(data).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_numbers_and_operators() {
        assert_eq!(
            kinds(b"1 -2.5 .5 re"),
            vec![
                TokenKind::Integer(1),
                TokenKind::Real(-2.5),
                TokenKind::Real(0.5),
                TokenKind::Operator(Keyword::Re),
            ]
        );
    }

    #[test]
    fn test_token_ranges() {
        let tokens = tokenize(b"  /F1 12 Tf").unwrap();
        assert_eq!(tokens[0].range, 2..5);
        assert_eq!(tokens[1].range, 6..8);
        assert_eq!(tokens[2].range, 9..11);
    }

    #[test]
    fn test_star_operators() {
        assert_eq!(
            kinds(b"f* B* b* W* T*"),
            vec![
                TokenKind::Operator(Keyword::FStar),
                TokenKind::Operator(Keyword::BStar),
                TokenKind::Operator(Keyword::BbStar),
                TokenKind::Operator(Keyword::WStar),
                TokenKind::Operator(Keyword::TStar),
            ]
        );
    }

    #[test]
    fn test_name_escapes() {
        assert_eq!(
            kinds(b"/A#20B"),
            vec![TokenKind::Name("A B".to_string())]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(b"(a\\(b\\)c\\101\\n)"),
            vec![TokenKind::String(b"a(b)cA\n".to_vec())]
        );
        assert_eq!(
            kinds(b"(nested (paren) ok)"),
            vec![TokenKind::String(b"nested (paren) ok".to_vec())]
        );
        assert_eq!(
            kinds(b"<48 65 6c6C 6f7>"),
            vec![TokenKind::String(b"Hellop".to_vec())]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            kinds(b"q % save\nQ"),
            vec![
                TokenKind::Operator(Keyword::Qq),
                TokenKind::Operator(Keyword::Q),
            ]
        );
    }

    #[test]
    fn test_inline_image_data_token() {
        let src = b"BI /W 2 ID \x00EI\xff\nEI Q";
        let tokens = tokenize(src).unwrap();
        let data = tokens
            .iter()
            .find(|t| t.kind == TokenKind::InlineImageData)
            .unwrap();
        // "EI" glued to data bytes is not a terminator
        assert_eq!(&src[data.range.clone()], b"\x00EI\xff");
        assert_eq!(
            tokens.last().unwrap().kind,
            TokenKind::Operator(Keyword::Q)
        );
    }

    #[test]
    fn test_unterminated_inline_image() {
        let err = tokenize(b"BI /W 1 ID abcdef").unwrap_err();
        assert!(matches!(err, RenderError::UnterminatedInlineImage { pos: 11 }));
    }

    #[test]
    fn test_arity_table() {
        assert_eq!(Keyword::Re.arity(), Arity::Exact(4));
        assert_eq!(Keyword::Scn.arity(), Arity::AtLeast(1));
        assert!(Keyword::Unknown(b"foo".to_vec()).arity().accepts(7));
        assert!(!Keyword::Cm.arity().accepts(5));
    }
}

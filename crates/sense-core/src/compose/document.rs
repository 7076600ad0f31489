//! Lossless block-YAML document.
//!
//! The parser understands the block subset compose files are written in:
//! block mappings and sequences (including compact `- key: value` items),
//! plain and quoted scalars over one or more lines, `&anchor` and `!tag`
//! properties, comments and blank lines. Flow collections and block scalars
//! are kept as opaque values. Anything outside that subset is reported as
//! malformed rather than guessed at.
//!
//! Nodes carry byte spans into the original text. Edits splice the text and
//! the tree is rebuilt from the result, so the text is always the source of
//! truth and unedited regions are reproduced byte for byte.

use super::ComposeError;
use std::ops::Range;
use std::path::{Path, PathBuf};

/// Byte range into the document text.
pub type Span = Range<usize>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarStyle {
    Plain,
    SingleQuoted,
    DoubleQuoted,
    Literal,
    Folded,
}

/// A scalar value together with its source spelling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scalar {
    /// Decoded value (quotes and escapes resolved).
    pub value: String,
    /// Text exactly as written.
    pub raw: String,
    pub style: ScalarStyle,
}

impl Scalar {
    fn plain(text: &str) -> Self {
        Self {
            value: text.to_string(),
            raw: text.to_string(),
            style: ScalarStyle::Plain,
        }
    }

    /// Interpret the scalar as a YAML boolean. Quoted scalars are strings.
    pub fn as_bool(&self) -> Option<bool> {
        if self.style != ScalarStyle::Plain {
            return None;
        }
        match self.value.as_str() {
            "true" | "True" | "TRUE" => Some(true),
            "false" | "False" | "FALSE" => Some(false),
            _ => None,
        }
    }

    /// Plain scalars spelling a YAML null.
    pub fn is_null(&self) -> bool {
        self.style == ScalarStyle::Plain && matches!(self.value.as_str(), "~" | "null" | "Null" | "NULL")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Mapping(Vec<MapEntry>),
    Sequence(Vec<SeqItem>),
    Scalar(Scalar),
    /// Flow collection kept verbatim.
    Flow(String),
    /// Key with no value. The span is empty and sits right after the colon.
    Null,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
    /// Column of the node's first character.
    pub indent: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapEntry {
    pub key: Scalar,
    pub key_span: Span,
    /// Offset just past the `:` separator.
    pub value_start: usize,
    pub value: Node,
    /// Column of the key.
    pub indent: usize,
    /// Offset past the last line that belongs to this entry.
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeqItem {
    pub node: Node,
    /// Column of the `-` indicator.
    pub dash_indent: usize,
    /// Offset past the last line that belongs to this item.
    pub end: usize,
}

impl Node {
    pub fn entries(&self) -> &[MapEntry] {
        match &self.kind {
            NodeKind::Mapping(entries) => entries,
            _ => &[],
        }
    }

    pub fn items(&self) -> &[SeqItem] {
        match &self.kind {
            NodeKind::Sequence(items) => items,
            _ => &[],
        }
    }

    /// Look up a mapping entry by key. The first occurrence wins.
    pub fn entry(&self, key: &str) -> Option<&MapEntry> {
        self.entries().iter().find(|e| e.key.value == key)
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entry(key).map(|e| &e.value)
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match &self.kind {
            NodeKind::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_scalar().map(|s| s.value.as_str())
    }

    pub fn is_mapping(&self) -> bool {
        matches!(self.kind, NodeKind::Mapping(_))
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self.kind, NodeKind::Sequence(_))
    }

    /// Null either by omission (`key:`) or by spelling (`key: ~`).
    pub fn is_null(&self) -> bool {
        match &self.kind {
            NodeKind::Null => true,
            NodeKind::Scalar(s) => s.is_null(),
            _ => false,
        }
    }
}

/// A text splice: replace `span` with `text`. Empty spans insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edit {
    pub span: Span,
    pub text: String,
}

impl Edit {
    pub fn insert(at: usize, text: impl Into<String>) -> Self {
        Self {
            span: at..at,
            text: text.into(),
        }
    }

    pub fn replace(span: Span, text: impl Into<String>) -> Self {
        Self {
            span,
            text: text.into(),
        }
    }
}

/// A parsed compose file that serializes back to its exact source text.
#[derive(Debug, Clone)]
pub struct ComposeDocument {
    path: PathBuf,
    text: String,
    root: Node,
    newline: &'static str,
}

impl PartialEq for ComposeDocument {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl ComposeDocument {
    /// Read and parse the compose file at `path`.
    pub fn load(path: &Path) -> Result<Self, ComposeError> {
        let bytes = std::fs::read(path).map_err(|e| ComposeError::Unreadable {
            path: path.to_path_buf(),
            source: e,
        })?;
        let text = String::from_utf8(bytes).map_err(|e| ComposeError::Malformed {
            path: path.to_path_buf(),
            line: None,
            reason: format!("not valid UTF-8 ({})", e.utf8_error()),
        })?;
        Self::parse(text, path)
    }

    /// Parse compose text. `path` is only used for error reporting and saving.
    pub fn parse(text: impl Into<String>, path: &Path) -> Result<Self, ComposeError> {
        let text = text.into();
        if let Err(e) = serde_yaml::from_str::<serde_yaml::Value>(&text) {
            return Err(ComposeError::Malformed {
                path: path.to_path_buf(),
                line: e.location().map(|l| l.line()),
                reason: e.to_string(),
            });
        }
        let root = parse_tree(&text).map_err(|e| ComposeError::Malformed {
            path: path.to_path_buf(),
            line: Some(e.line),
            reason: e.reason,
        })?;
        let newline = if text.contains("\r\n") { "\r\n" } else { "\n" };
        Ok(Self {
            path: path.to_path_buf(),
            text,
            root,
            newline,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// The document text. Identical to the input until an edit is applied.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Serialized bytes of the document.
    pub fn serialize(&self) -> Vec<u8> {
        self.text.as_bytes().to_vec()
    }

    /// Line terminator used by the file (`\r\n` if any line uses it).
    pub fn newline(&self) -> &'static str {
        self.newline
    }

    /// Persist the document atomically to `path`.
    pub fn save(&self, path: &Path) -> Result<(), ComposeError> {
        super::write_atomic(path, self.text.as_bytes())
    }

    /// Apply a batch of non-overlapping edits and rebuild the tree.
    ///
    /// Edits at the same offset are applied in the order given. On failure
    /// the document is left unchanged.
    pub fn apply_edits(&mut self, edits: Vec<Edit>) -> Result<(), ComposeError> {
        if edits.is_empty() {
            return Ok(());
        }

        let mut order: Vec<usize> = (0..edits.len()).collect();
        order.sort_by(|&a, &b| {
            edits[b]
                .span
                .start
                .cmp(&edits[a].span.start)
                .then(b.cmp(&a))
        });

        let mut text = self.text.clone();
        let mut floor = text.len();
        for idx in order {
            let edit = &edits[idx];
            let valid = edit.span.start <= edit.span.end
                && edit.span.end <= floor
                && text.is_char_boundary(edit.span.start)
                && text.is_char_boundary(edit.span.end);
            if !valid {
                return Err(self.malformed(format!(
                    "edit {}..{} is out of bounds or overlaps another edit",
                    edit.span.start, edit.span.end
                )));
            }
            text.replace_range(edit.span.clone(), &edit.text);
            floor = edit.span.start;
        }

        let rebuilt = Self::parse(text, &self.path).map_err(|e| {
            self.malformed(format!("edit produced an unparsable document: {}", e))
        })?;
        *self = rebuilt;
        Ok(())
    }

    /// Text to insert at a line start `at` so that `lines` begins on its own line.
    pub(crate) fn insertion_at(&self, at: usize, lines: &str) -> Edit {
        let needs_break = at == self.text.len() && !self.text.is_empty() && !self.text.ends_with('\n');
        if needs_break {
            Edit::insert(at, format!("{}{}", self.newline, lines))
        } else {
            Edit::insert(at, lines)
        }
    }

    pub(crate) fn malformed(&self, reason: String) -> ComposeError {
        ComposeError::Malformed {
            path: self.path.clone(),
            line: None,
            reason,
        }
    }

    /// 1-based line number of a byte offset.
    pub fn line_of(&self, offset: usize) -> usize {
        let end = offset.min(self.text.len());
        self.text.as_bytes()[..end].iter().filter(|b| **b == b'\n').count() + 1
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct ParseError {
    line: usize,
    reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Blank,
    Comment,
    Marker,
    Directive,
    Content,
}

#[derive(Debug, Clone, Copy)]
struct Line {
    start: usize,
    /// End of content, excluding the line terminator.
    end: usize,
    /// Start of the following line.
    next: usize,
    /// Column where content starts. Moved right for `- ` items.
    indent: usize,
    /// A tab follows the space indentation.
    tabbed: bool,
    kind: LineKind,
}

fn split_lines(text: &str) -> Vec<Line> {
    let mut lines = Vec::new();
    // A byte order mark is part of the text but not of the first line.
    let mut start = if text.starts_with('\u{feff}') {
        '\u{feff}'.len_utf8()
    } else {
        0
    };
    let bytes = text.as_bytes();
    while start < text.len() {
        let nl = text[start..].find('\n').map(|i| start + i);
        let next = nl.map_or(text.len(), |i| i + 1);
        let mut end = nl.unwrap_or(text.len());
        if end > start && bytes[end - 1] == b'\r' {
            end -= 1;
        }
        let body = &text[start..end];
        let indent = body.len() - body.trim_start_matches(' ').len();
        let rest = &body[indent..];
        let visible = rest.trim_start_matches([' ', '\t']);

        let kind = if visible.trim_end().is_empty() {
            LineKind::Blank
        } else if visible.starts_with('#') {
            LineKind::Comment
        } else if indent == 0 && (is_marker(rest, "---") || is_marker(rest, "...")) {
            LineKind::Marker
        } else if indent == 0 && rest.starts_with('%') {
            LineKind::Directive
        } else {
            LineKind::Content
        };

        lines.push(Line {
            start,
            end,
            next,
            indent,
            tabbed: rest.starts_with('\t'),
            kind,
        });
        start = next;
    }
    lines
}

fn is_marker(rest: &str, marker: &str) -> bool {
    match rest.strip_prefix(marker) {
        Some(tail) => tail.is_empty() || tail.starts_with(' ') || tail.starts_with('\t'),
        None => false,
    }
}

fn parse_tree(text: &str) -> Result<Node, ParseError> {
    let lines = split_lines(text);
    let mut parser = Parser {
        text,
        lines,
        pos: 0,
        last_end: 0,
    };
    parser.parse_document()
}

struct Parser<'a> {
    text: &'a str,
    lines: Vec<Line>,
    pos: usize,
    last_end: usize,
}

impl<'a> Parser<'a> {
    fn parse_document(&mut self) -> Result<Node, ParseError> {
        let mut seen_start = false;
        while let Some(line) = self.lines.get(self.pos) {
            match line.kind {
                LineKind::Blank | LineKind::Comment => self.pos += 1,
                LineKind::Marker if !seen_start && self.marker_text(self.pos) == "---" => {
                    self.check_marker_tail(self.pos, 3)?;
                    seen_start = true;
                    self.pos += 1;
                }
                LineKind::Marker => {
                    return Err(self.error(self.pos, "multiple documents are not supported"))
                }
                LineKind::Directive => {
                    return Err(self.error(self.pos, "YAML directives are not supported"))
                }
                LineKind::Content => break,
            }
        }

        let root = match self.peek()? {
            Some(i) => {
                let node = self.parse_block(i, None)?;
                if let Some(j) = self.peek()? {
                    return Err(self.error(j, "unexpected content after the top-level value"));
                }
                node
            }
            None => Node {
                kind: NodeKind::Null,
                span: self.text.len()..self.text.len(),
                indent: 0,
            },
        };
        Ok(root)
    }

    fn marker_text(&self, i: usize) -> &'a str {
        let line = self.lines[i];
        &self.text[line.start..line.start + 3]
    }

    fn check_marker_tail(&self, i: usize, width: usize) -> Result<(), ParseError> {
        let line = self.lines[i];
        let tail = self.text[line.start + width..line.end].trim_start();
        if tail.is_empty() || tail.starts_with('#') {
            Ok(())
        } else {
            Err(self.error(i, "content on a document marker line is not supported"))
        }
    }

    fn error(&self, i: usize, reason: &str) -> ParseError {
        ParseError {
            line: i + 1,
            reason: reason.to_string(),
        }
    }

    /// Index of the next content line, skipping blanks and comments.
    ///
    /// Only lines read here carry structure, so indentation rules are
    /// enforced here and not inside scalar or flow bodies.
    fn peek(&mut self) -> Result<Option<usize>, ParseError> {
        while let Some(line) = self.lines.get(self.pos) {
            match line.kind {
                LineKind::Blank | LineKind::Comment => self.pos += 1,
                LineKind::Marker => {
                    return Err(self.error(self.pos, "multiple documents are not supported"))
                }
                LineKind::Directive => {
                    return Err(self.error(self.pos, "YAML directives are not supported"))
                }
                LineKind::Content if line.tabbed => {
                    return Err(self.error(
                        self.pos,
                        "tab characters in indentation are not supported",
                    ))
                }
                LineKind::Content => return Ok(Some(self.pos)),
            }
        }
        Ok(None)
    }

    fn consume(&mut self, i: usize) {
        self.pos = i + 1;
        self.last_end = self.lines[i].next;
    }

    /// Content of line `i` from its (possibly virtual) indent.
    fn content(&self, i: usize) -> &'a str {
        let line = self.lines[i];
        &self.text[line.start + line.indent..line.end]
    }

    fn parse_block(&mut self, i: usize, parent: Option<usize>) -> Result<Node, ParseError> {
        let content = self.content(i);
        let indent = self.lines[i].indent;
        if is_dash(content) {
            return self.parse_sequence(indent);
        }
        if split_key(content).map_err(|r| self.error(i, &r))?.is_some() {
            return self.parse_mapping(indent);
        }
        let from = self.lines[i].start + indent;
        self.parse_inline(i, from, parent, false)
    }

    fn parse_mapping(&mut self, indent: usize) -> Result<Node, ParseError> {
        let mut entries = Vec::new();
        let mut start = None;

        while let Some(i) = self.peek()? {
            let line = self.lines[i];
            if line.indent < indent {
                break;
            }
            if line.indent > indent {
                return Err(self.error(i, "unexpected indentation"));
            }
            let content = self.content(i);
            if is_dash(content) {
                break;
            }
            let content_start = line.start + line.indent;
            let (key, offset, key_len) = match split_key(content).map_err(|r| self.error(i, &r))? {
                Some(parsed) => parsed,
                None => return Err(self.error(i, "expected a `key: value` pair")),
            };
            start.get_or_insert(content_start);

            let value_start = content_start + offset;
            let value = self.parse_inline(i, value_start, Some(indent), true)?;
            entries.push(MapEntry {
                key,
                key_span: content_start..content_start + key_len,
                value_start,
                value,
                indent,
                end: self.last_end,
            });
        }

        let start = start.unwrap_or(self.last_end);
        Ok(Node {
            kind: NodeKind::Mapping(entries),
            span: start..self.last_end,
            indent,
        })
    }

    fn parse_sequence(&mut self, indent: usize) -> Result<Node, ParseError> {
        let mut items = Vec::new();
        let mut start = None;

        while let Some(i) = self.peek()? {
            let line = self.lines[i];
            if line.indent < indent {
                break;
            }
            if line.indent > indent {
                return Err(self.error(i, "unexpected indentation"));
            }
            let content = self.content(i);
            if !is_dash(content) {
                break;
            }
            let dash_at = line.start + indent;
            start.get_or_insert(dash_at);

            let after_dash = &content[1..];
            let gap = after_dash.len() - after_dash.trim_start_matches(' ').len();
            let rest = &after_dash[gap..];

            let node = if rest.is_empty() || rest.starts_with('#') {
                self.parse_inline(i, dash_at + 1, Some(indent), false)?
            } else {
                let column = indent + 1 + gap;
                let is_nested = is_dash(rest)
                    || split_key(rest).map_err(|r| self.error(i, &r))?.is_some();
                if is_nested {
                    self.lines[i].indent = column;
                    self.parse_block(i, Some(indent))?
                } else {
                    self.parse_inline(i, line.start + column, Some(indent), false)?
                }
            };

            items.push(SeqItem {
                node,
                dash_indent: indent,
                end: self.last_end,
            });
        }

        let start = start.unwrap_or(self.last_end);
        Ok(Node {
            kind: NodeKind::Sequence(items),
            span: start..self.last_end,
            indent,
        })
    }

    /// Parse the value that starts at byte `from` on line `i`.
    ///
    /// Lines deeper than `parent` belong to the value. `compact` allows a
    /// sequence at the parent's own indent (`key:\n- item`).
    fn parse_inline(
        &mut self,
        i: usize,
        from: usize,
        parent: Option<usize>,
        compact: bool,
    ) -> Result<Node, ParseError> {
        let line = self.lines[i];
        let rest = &self.text[from..line.end];
        let lead = rest.len() - rest.trim_start().len();
        let at = from + lead;
        let value = &rest[lead..];
        let column = at - line.start;

        if value.is_empty() || value.starts_with('#') {
            return self.parse_nested(i, from, column, parent, compact);
        }

        // `&anchor` and `!tag` belong to whatever node follows them.
        let props = properties_len(value);
        if props > 0 {
            let body = &value[props..];
            if body.is_empty() || body.starts_with('#') {
                let mark = at + value[..props].trim_end().len();
                return self.parse_nested(i, mark, column, parent, compact);
            }
            return self.parse_inline(i, at + props, parent, compact);
        }

        let first = value.as_bytes()[0];
        let (node, last) = match first {
            b'|' | b'>' => return self.parse_block_scalar(i, at, parent, first == b'|'),
            b'[' | b'{' => return self.parse_flow(i, at),
            b'"' | b'\'' => self.parse_quoted_scalar(i, at, column)?,
            _ => self.parse_plain_scalar(i, at, column, parent),
        };

        self.consume(last);
        if let Some(j) = self.peek()? {
            if parent.map_or(true, |p| self.lines[j].indent > p) {
                return Err(self.error(j, "unexpected indentation after a scalar value"));
            }
        }
        Ok(node)
    }

    /// Value that starts on a following line, or null. `mark` anchors the
    /// null span.
    fn parse_nested(
        &mut self,
        i: usize,
        mark: usize,
        column: usize,
        parent: Option<usize>,
        compact: bool,
    ) -> Result<Node, ParseError> {
        self.consume(i);
        match self.peek()? {
            Some(j) if parent.map_or(true, |p| self.lines[j].indent > p) => {
                self.parse_block(j, parent)
            }
            Some(j)
                if compact
                    && Some(self.lines[j].indent) == parent
                    && is_dash(self.content(j)) =>
            {
                self.parse_sequence(self.lines[j].indent)
            }
            _ => Ok(Node {
                kind: NodeKind::Null,
                span: mark..mark,
                indent: column,
            }),
        }
    }

    /// Plain scalar starting at `at`, folding continuation lines that are
    /// deeper than `parent`. Returns the node and its last line.
    fn parse_plain_scalar(
        &self,
        i: usize,
        at: usize,
        column: usize,
        parent: Option<usize>,
    ) -> (Node, usize) {
        let value = &self.text[at..self.lines[i].end];
        let cut = comment_start(value);
        let head = value[..cut.unwrap_or(value.len())].trim_end();
        let mut pieces = vec![head];
        let mut end = at + head.len();
        let mut last = i;

        if cut.is_none() {
            let mut blanks = 0;
            for (j, next) in self.lines.iter().enumerate().skip(i + 1) {
                match next.kind {
                    LineKind::Blank => blanks += 1,
                    LineKind::Content if parent.map_or(true, |p| next.indent > p) => {
                        let body = self.text[next.start..next.end].trim_start_matches([' ', '\t']);
                        let body_start = next.end - body.len();
                        let cut = comment_start(body);
                        let piece = body[..cut.unwrap_or(body.len())].trim_end();
                        pieces.extend(std::iter::repeat("").take(blanks));
                        pieces.push(piece);
                        blanks = 0;
                        end = body_start + piece.len();
                        last = j;
                        if cut.is_some() {
                            break;
                        }
                    }
                    _ => break,
                }
            }
        }

        let node = Node {
            kind: NodeKind::Scalar(Scalar {
                value: fold_lines(&pieces),
                raw: self.text[at..end].to_string(),
                style: ScalarStyle::Plain,
            }),
            span: at..end,
            indent: column,
        };
        (node, last)
    }

    /// Quoted scalar starting at `at`, possibly spanning several lines.
    fn parse_quoted_scalar(
        &self,
        i: usize,
        at: usize,
        column: usize,
    ) -> Result<(Node, usize), ParseError> {
        let len = match quoted_len(&self.text[at..]) {
            Some(len) => len,
            None => return Err(self.error(i, "unterminated quoted scalar")),
        };
        let close = at + len;
        let last = (i..self.lines.len())
            .find(|&n| self.lines[n].next >= close)
            .unwrap_or(self.lines.len() - 1);
        if !is_trailing_comment(&self.text[close..self.lines[last].end]) {
            return Err(self.error(last, "unexpected text after quoted scalar"));
        }

        let raw = &self.text[at..close];
        let scalar = if last == i {
            parse_quoted(raw).map(|(scalar, _)| scalar)
        } else {
            let pieces: Vec<&str> = raw.split('\n').collect();
            parse_quoted(&fold_lines(&pieces)).map(|(mut scalar, _)| {
                scalar.raw = raw.to_string();
                scalar
            })
        };
        let scalar = match scalar {
            Some(scalar) => scalar,
            None => return Err(self.error(i, "invalid quoted scalar")),
        };
        let node = Node {
            kind: NodeKind::Scalar(scalar),
            span: at..close,
            indent: column,
        };
        Ok((node, last))
    }

    fn parse_block_scalar(
        &mut self,
        i: usize,
        at: usize,
        parent: Option<usize>,
        literal: bool,
    ) -> Result<Node, ParseError> {
        let header = &self.text[at + 1..self.lines[i].end];
        let header = &header[..comment_start(header).unwrap_or(header.len())];
        let chomp = if header.contains('+') {
            Chomp::Keep
        } else if header.contains('-') {
            Chomp::Strip
        } else {
            Chomp::Clip
        };

        let min_indent = parent.map_or(0, |p| p + 1);
        let mut content_last = i;
        let mut j = i + 1;
        while let Some(line) = self.lines.get(j) {
            let body = &self.text[line.start..line.end];
            if body.trim().is_empty() {
                j += 1;
                continue;
            }
            if line.indent < min_indent {
                break;
            }
            content_last = j;
            j += 1;
        }
        // Trailing blank lines are part of a kept scalar's value.
        let last = match chomp {
            Chomp::Keep => j - 1,
            Chomp::Clip | Chomp::Strip => content_last,
        };

        let body_lines: Vec<&str> = (i + 1..=content_last)
            .map(|k| &self.text[self.lines[k].start..self.lines[k].end])
            .collect();
        let strip = body_lines
            .iter()
            .filter(|l| !l.trim().is_empty())
            .map(|l| l.len() - l.trim_start_matches(' ').len())
            .min()
            .unwrap_or(0);
        let mut value = body_lines
            .iter()
            .map(|l| l.get(strip..).unwrap_or(""))
            .collect::<Vec<_>>()
            .join("\n");
        match chomp {
            Chomp::Strip => {}
            Chomp::Clip if value.is_empty() => {}
            Chomp::Clip => value.push('\n'),
            Chomp::Keep => {
                value.push('\n');
                value.push_str(&"\n".repeat(last - content_last));
            }
        }

        let end = self.lines[last].end;
        self.consume(last);
        Ok(Node {
            kind: NodeKind::Scalar(Scalar {
                value,
                raw: self.text[at..end].to_string(),
                style: if literal {
                    ScalarStyle::Literal
                } else {
                    ScalarStyle::Folded
                },
            }),
            span: at..end,
            indent: at - self.lines[i].start,
        })
    }

    fn parse_flow(&mut self, i: usize, at: usize) -> Result<Node, ParseError> {
        let bytes = self.text.as_bytes();
        let mut depth = 0usize;
        let mut k = at;
        let mut close = None;
        while k < bytes.len() {
            match bytes[k] {
                b'[' | b'{' => depth += 1,
                b']' | b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        close = Some(k);
                        break;
                    }
                }
                b'"' => {
                    k += 1;
                    while k < bytes.len() && bytes[k] != b'"' {
                        if bytes[k] == b'\\' {
                            k += 1;
                        }
                        k += 1;
                    }
                }
                b'\'' => {
                    k += 1;
                    while k < bytes.len() {
                        if bytes[k] == b'\'' {
                            if bytes.get(k + 1) == Some(&b'\'') {
                                k += 1;
                            } else {
                                break;
                            }
                        }
                        k += 1;
                    }
                }
                b'#' if k > 0 && matches!(bytes[k - 1], b' ' | b'\t' | b'\n') => {
                    while k < bytes.len() && bytes[k] != b'\n' {
                        k += 1;
                    }
                    continue;
                }
                _ => {}
            }
            k += 1;
        }

        let close = match close {
            Some(c) => c,
            None => return Err(self.error(i, "unterminated flow collection")),
        };
        let last = (i..self.lines.len())
            .find(|&n| self.lines[n].next > close)
            .unwrap_or(self.lines.len() - 1);
        if !is_trailing_comment(&self.text[close + 1..self.lines[last].end]) {
            return Err(self.error(last, "unexpected text after flow collection"));
        }

        self.pos = last + 1;
        self.last_end = self.lines[last].next;
        Ok(Node {
            kind: NodeKind::Flow(self.text[at..=close].to_string()),
            span: at..close + 1,
            indent: at - self.lines[i].start,
        })
    }
}

/// Block scalar chomping indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Chomp {
    Strip,
    Clip,
    Keep,
}

/// Length of leading `&anchor` and `!tag` properties with the spaces after them.
fn properties_len(value: &str) -> usize {
    let mut used = 0;
    loop {
        let rest = &value[used..];
        if !(rest.starts_with('&') || rest.starts_with('!')) {
            return used;
        }
        let token = rest.find([' ', '\t']).unwrap_or(rest.len());
        let after = &rest[token..];
        let gap = after.len() - after.trim_start_matches([' ', '\t']).len();
        used += token + gap;
        if gap == 0 {
            return used;
        }
    }
}

/// Byte length of the quoted scalar at the start of `s`, closing quote included.
fn quoted_len(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let quote = *bytes.first()?;
    let mut k = 1;
    while k < bytes.len() {
        let b = bytes[k];
        if quote == b'"' && b == b'\\' {
            k += 2;
            continue;
        }
        if b == quote {
            if quote == b'\'' && bytes.get(k + 1) == Some(&b'\'') {
                k += 2;
                continue;
            }
            return Some(k + 1);
        }
        k += 1;
    }
    None
}

/// Line folding of flow scalars: single breaks become spaces, each empty
/// line becomes a newline.
fn fold_lines(pieces: &[&str]) -> String {
    let mut out = String::new();
    let mut breaks = 0;
    let mut started = false;
    for piece in pieces {
        let piece = piece.trim();
        if piece.is_empty() {
            breaks += 1;
            continue;
        }
        if started {
            if breaks == 0 {
                out.push(' ');
            } else {
                out.push_str(&"\n".repeat(breaks));
            }
        }
        out.push_str(piece);
        started = true;
        breaks = 0;
    }
    out
}

fn is_dash(content: &str) -> bool {
    content == "-" || content.starts_with("- ") || content.starts_with("-\t")
}

fn is_trailing_comment(rest: &str) -> bool {
    let t = rest.trim_start();
    t.is_empty() || (t.starts_with('#') && t.len() < rest.len())
}

/// Offset of a ` #` comment inside a plain scalar line.
fn comment_start(value: &str) -> Option<usize> {
    let bytes = value.as_bytes();
    (1..bytes.len()).find(|&k| bytes[k] == b'#' && matches!(bytes[k - 1], b' ' | b'\t'))
}

/// Split `key: rest`. Returns the key, the offset just past `:`, and the key length.
fn split_key(content: &str) -> Result<Option<(Scalar, usize, usize)>, String> {
    let first = match content.as_bytes().first() {
        Some(b) => *b,
        None => return Ok(None),
    };

    if first == b'"' || first == b'\'' {
        let (key, used) = match parse_quoted(content) {
            Some(parsed) => parsed,
            None => return Ok(None),
        };
        let after = &content[used..];
        let t = after.trim_start_matches(' ');
        if let Some(tail) = t.strip_prefix(':') {
            if tail.is_empty() || tail.starts_with(' ') || tail.starts_with('\t') {
                return Ok(Some((key, used + (after.len() - t.len()) + 1, used)));
            }
        }
        return Ok(None);
    }

    if content.starts_with("? ") || content == "?" {
        return Err("complex mapping keys are not supported".to_string());
    }
    if matches!(first, b'[' | b'{' | b'#' | b'|' | b'>' | b'&' | b'*' | b'!' | b'@' | b'`') {
        return Ok(None);
    }

    let bytes = content.as_bytes();
    for k in 0..bytes.len() {
        match bytes[k] {
            b'#' if k > 0 && matches!(bytes[k - 1], b' ' | b'\t') => return Ok(None),
            b':' if k + 1 == bytes.len() || matches!(bytes[k + 1], b' ' | b'\t') => {
                let key = content[..k].trim_end();
                if key.is_empty() {
                    return Ok(None);
                }
                return Ok(Some((Scalar::plain(key), k + 1, key.len())));
            }
            _ => {}
        }
    }
    Ok(None)
}

/// Parse a quoted scalar at the start of `s`. Returns it with the bytes consumed.
fn parse_quoted(s: &str) -> Option<(Scalar, usize)> {
    let mut chars = s.char_indices();
    let (_, quote) = chars.next()?;
    let mut value = String::new();

    if quote == '\'' {
        while let Some((k, c)) = chars.next() {
            if c == '\'' {
                if s[k + 1..].starts_with('\'') {
                    chars.next();
                    value.push('\'');
                    continue;
                }
                return Some((quoted(value, &s[..=k], ScalarStyle::SingleQuoted), k + 1));
            }
            value.push(c);
        }
        return None;
    }

    while let Some((k, c)) = chars.next() {
        match c {
            '"' => return Some((quoted(value, &s[..=k], ScalarStyle::DoubleQuoted), k + 1)),
            '\\' => {
                let (_, esc) = chars.next()?;
                match esc {
                    'n' => value.push('\n'),
                    't' => value.push('\t'),
                    'r' => value.push('\r'),
                    '0' => value.push('\0'),
                    ' ' => value.push(' '),
                    '/' => value.push('/'),
                    '\\' => value.push('\\'),
                    '"' => value.push('"'),
                    'u' | 'x' | 'U' => {
                        let width = match esc {
                            'x' => 2,
                            'u' => 4,
                            _ => 8,
                        };
                        let mut code = String::new();
                        for _ in 0..width {
                            code.push(chars.next()?.1);
                        }
                        let decoded = u32::from_str_radix(&code, 16).ok().and_then(char::from_u32)?;
                        value.push(decoded);
                    }
                    other => {
                        value.push('\\');
                        value.push(other);
                    }
                }
            }
            _ => value.push(c),
        }
    }
    None
}

fn quoted(value: String, raw: &str, style: ScalarStyle) -> Scalar {
    Scalar {
        value,
        raw: raw.to_string(),
        style,
    }
}

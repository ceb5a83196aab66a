//! Comment-tolerant JSON.
//!
//! Editor settings files are JSON with `//` and `/* */` comments and
//! trailing commas. Values are read by stripping that syntax before handing
//! the text to `serde_json`. Settings that get rewritten go through
//! [`JsoncDocument`], which edits top-level members in place and leaves
//! everything else byte-for-byte intact.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::domain::{AppError, Result};

const INDENT: &[u8] = b"    ";

/// Remove `//` and `/* */` comments, keeping line breaks and string contents.
#[must_use]
pub fn strip_comments(content: &str) -> String {
    let mut result = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            result.push(c);
            if c == '\\' {
                if let Some(next) = chars.next() {
                    result.push(next);
                }
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                result.push(c);
            }
            '/' => match chars.peek() {
                Some('/') => {
                    chars.next();
                    for nc in chars.by_ref() {
                        if nc == '\n' {
                            result.push('\n');
                            break;
                        }
                    }
                }
                Some('*') => {
                    chars.next();
                    let mut prev = ' ';
                    for nc in chars.by_ref() {
                        if prev == '*' && nc == '/' {
                            break;
                        }
                        if nc == '\n' {
                            result.push('\n');
                        }
                        prev = nc;
                    }
                }
                _ => result.push(c),
            },
            _ => result.push(c),
        }
    }

    result
}

/// Drop commas that directly precede a closing `}` or `]`.
///
/// Expects comment-free input.
#[must_use]
pub fn strip_trailing_commas(content: &str) -> String {
    let mut result = String::with_capacity(content.len());
    let mut in_string = false;
    let mut escaped = false;

    for (idx, c) in content.char_indices() {
        if in_string {
            result.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                result.push(c);
            }
            ',' if content[idx + 1..].trim_start().starts_with(['}', ']']) => {}
            _ => result.push(c),
        }
    }

    result
}

/// Parse comment-tolerant JSON into a value.
///
/// # Errors
///
/// Returns an error if the text is not valid JSON once comments and
/// trailing commas are removed.
pub fn parse_value(text: &str) -> Result<Value> {
    from_str(text)
}

/// Deserialize comment-tolerant JSON.
///
/// # Errors
///
/// Returns an error if the text is not valid JSON once comments and
/// trailing commas are removed, or does not match `T`.
pub fn from_str<T: DeserializeOwned>(text: &str) -> Result<T> {
    let cleaned = strip_trailing_commas(&strip_comments(text));
    serde_json::from_str(&cleaned).map_err(AppError::json_parse)
}

/// Serialize with four-space indentation.
///
/// # Errors
///
/// Returns an error if the value cannot be serialized.
pub fn to_pretty_string<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(INDENT);
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value
        .serialize(&mut serializer)
        .map_err(AppError::json_parse)?;

    String::from_utf8(buf).map_err(|e| AppError::InvalidData {
        message: format!("Serialized JSON is not UTF-8: {e}"),
    })
}

/// One top-level member of a [`JsoncDocument`].
#[derive(Debug, Clone)]
struct Member {
    /// Whitespace and comments before the key.
    leading: String,
    /// Decoded key.
    key: String,
    /// Raw key, colon and whatever sits between them and the value.
    prefix: String,
    /// Raw value text.
    value: String,
    /// Trivia between the value and its comma.
    gap: String,
    /// Line comment following the comma on the same line.
    after_comma: String,
}

/// A top-level JSON object whose members can be edited without
/// disturbing the surrounding comments and formatting.
#[derive(Debug, Clone)]
pub struct JsoncDocument {
    /// Everything up to and including the opening brace.
    head: String,
    members: Vec<Member>,
    trailing_comma: bool,
    /// Trivia between the last member and the closing brace.
    tail: String,
    /// The closing brace and everything after it.
    after: String,
    /// Line ending used by the source text.
    newline: &'static str,
}

impl JsoncDocument {
    /// An empty object.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            head: "{".to_string(),
            members: Vec::new(),
            trailing_comma: false,
            tail: String::new(),
            after: "}\n".to_string(),
            newline: "\n",
        }
    }

    /// Parse a document.
    ///
    /// # Errors
    ///
    /// Returns an error if the top level is not an object or the text is
    /// structurally malformed.
    pub fn parse(text: &str) -> Result<Self> {
        let b = text.as_bytes();
        let open = skip_trivia(b, 0);
        if b.get(open) != Some(&b'{') {
            return Err(AppError::InvalidData {
                message: "expected a JSON object at the top level".to_string(),
            });
        }

        let head = text[..=open].to_string();
        let newline = if text.contains("\r\n") { "\r\n" } else { "\n" };
        let mut members = Vec::new();
        let mut trailing_comma = false;
        let mut pos = open + 1;

        loop {
            let key_start = skip_trivia(b, pos);
            match b.get(key_start) {
                Some(b'}') => {
                    return Ok(Self {
                        head,
                        members,
                        trailing_comma,
                        tail: text[pos..key_start].to_string(),
                        after: text[key_start..].to_string(),
                        newline,
                    });
                }
                Some(b'"') => {}
                _ => return Err(malformed(key_start, "expected a key or '}'")),
            }

            let key_end = skip_string(b, key_start)?;
            let key: String =
                serde_json::from_str(&text[key_start..key_end]).map_err(AppError::json_parse)?;

            let colon = skip_trivia(b, key_end);
            if b.get(colon) != Some(&b':') {
                return Err(malformed(colon, "expected ':'"));
            }

            let value_start = skip_trivia(b, colon + 1);
            let value_end = skip_value(b, value_start)?;
            let next = skip_trivia(b, value_end);

            let mut member = Member {
                leading: text[pos..key_start].to_string(),
                key,
                prefix: text[key_start..value_start].to_string(),
                value: text[value_start..value_end].to_string(),
                gap: String::new(),
                after_comma: String::new(),
            };

            match b.get(next) {
                Some(b',') => {
                    let comment_end = same_line_comment_end(b, next + 1);
                    member.gap = text[value_end..next].to_string();
                    member.after_comma = text[next + 1..comment_end].to_string();
                    pos = comment_end;
                    trailing_comma = true;
                }
                Some(b'}') => {
                    pos = value_end;
                    trailing_comma = false;
                }
                _ => return Err(malformed(next, "expected ',' or '}'")),
            }

            members.push(member);
        }
    }

    /// Member keys in document order, duplicates included.
    #[cfg(test)]
    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        self.members.iter().map(|m| m.key.as_str()).collect()
    }

    /// Value of `key`. With duplicate keys the last one wins.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored value text does not parse.
    #[cfg(test)]
    pub fn get(&self, key: &str) -> Result<Option<Value>> {
        self.members
            .iter()
            .rev()
            .find(|m| m.key == key)
            .map(|m| parse_value(&m.value))
            .transpose()
    }

    /// Remove every member named `key`. Returns true if any was removed.
    pub fn remove(&mut self, key: &str) -> bool {
        let before = self.members.len();
        self.members.retain(|m| m.key != key);
        if self.members.is_empty() {
            self.trailing_comma = false;
        }
        self.members.len() != before
    }

    /// Set `key` to `value`.
    ///
    /// An existing member keeps its position and surrounding comments; any
    /// duplicates of it are dropped. A new member is appended at the end.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be serialized.
    pub fn set(&mut self, key: &str, value: &Value) -> Result<()> {
        if let Some(first) = self.members.iter().position(|m| m.key == key) {
            let mut index = 0;
            self.members.retain(|m| {
                let keep = index <= first || m.key != key;
                index += 1;
                keep
            });

            let indent = self.indent_for(first);
            self.members[first].value = render_value(value, &indent, self.newline)?;
            return Ok(());
        }

        let indent = self.member_indent();
        let member = Member {
            leading: format!("{}{indent}", self.newline),
            key: key.to_string(),
            prefix: format!("{}: ", to_json_string(key)?),
            value: render_value(value, &indent, self.newline)?,
            gap: String::new(),
            after_comma: String::new(),
        };

        // Keep a comment that trails the current last value on its line
        let tail = std::mem::take(&mut self.tail);
        let (same_line, rest) = tail
            .find(['\r', '\n'])
            .map_or((tail.as_str(), ""), |n| tail.split_at(n));
        if !same_line.trim().is_empty() {
            match self.members.last_mut() {
                Some(last) => last.after_comma.push_str(same_line),
                None => self.head.push_str(same_line),
            }
        }
        self.tail = if rest.is_empty() {
            self.newline.to_string()
        } else {
            rest.to_string()
        };

        self.members.push(member);
        Ok(())
    }

    /// Render the document back to text.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.head.len() + self.tail.len() + 64);
        out.push_str(&self.head);

        let last = self.members.len().saturating_sub(1);
        for (i, m) in self.members.iter().enumerate() {
            out.push_str(&m.leading);
            out.push_str(&m.prefix);
            out.push_str(&m.value);
            out.push_str(&m.gap);
            if i < last || self.trailing_comma {
                out.push(',');
            }
            if !m.after_comma.is_empty() {
                out.push_str(&m.after_comma);
                let next = self
                    .members
                    .get(i + 1)
                    .map_or(self.tail.as_str(), |n| n.leading.as_str());
                if !next.starts_with(['\n', '\r']) {
                    out.push_str(self.newline);
                }
            }
        }

        out.push_str(&self.tail);
        out.push_str(&self.after);
        out
    }

    /// The whole document as a plain JSON value.
    ///
    /// # Errors
    ///
    /// Returns an error if any member value does not parse.
    #[cfg(test)]
    pub fn to_value(&self) -> Result<Value> {
        parse_value(&self.render())
    }

    fn member_indent(&self) -> String {
        self.members
            .first()
            .and_then(|m| indent_of(&m.leading))
            .map_or_else(|| String::from_utf8_lossy(INDENT).into_owned(), str::to_string)
    }

    fn indent_for(&self, index: usize) -> String {
        indent_of(&self.members[index].leading).map_or_else(|| self.member_indent(), str::to_string)
    }
}

impl Default for JsoncDocument {
    fn default() -> Self {
        Self::empty()
    }
}

fn to_json_string(key: &str) -> Result<String> {
    serde_json::to_string(key).map_err(AppError::json_parse)
}

/// Pretty-print `value`, indenting continuation lines by `indent`.
fn render_value(value: &Value, indent: &str, newline: &str) -> Result<String> {
    let pretty = to_pretty_string(value)?;
    if !pretty.contains('\n') {
        return Ok(pretty);
    }
    Ok(pretty.replace('\n', &format!("{newline}{indent}")))
}

/// Indentation of the line a member starts on, if it starts its own line.
fn indent_of(leading: &str) -> Option<&str> {
    let (_, indent) = leading.rsplit_once('\n')?;
    indent
        .chars()
        .all(|c| c == ' ' || c == '\t')
        .then_some(indent)
}

fn malformed(at: usize, what: &str) -> AppError {
    AppError::InvalidData {
        message: format!("malformed JSON at byte {at}: {what}"),
    }
}

/// Skip whitespace and comments starting at `i`.
fn skip_trivia(b: &[u8], mut i: usize) -> usize {
    loop {
        while i < b.len() && b[i].is_ascii_whitespace() {
            i += 1;
        }
        if b.get(i) != Some(&b'/') {
            return i;
        }
        match b.get(i + 1) {
            Some(b'/') => {
                i += 2;
                while i < b.len() && b[i] != b'\n' {
                    i += 1;
                }
            }
            Some(b'*') => {
                i += 2;
                while i + 1 < b.len() && !(b[i] == b'*' && b[i + 1] == b'/') {
                    i += 1;
                }
                i = (i + 2).min(b.len());
            }
            _ => return i,
        }
    }
}

/// End of a line comment that starts on the current line, or `i` if none.
/// The line ending itself is never part of the comment.
fn same_line_comment_end(b: &[u8], i: usize) -> usize {
    let mut j = i;
    while j < b.len() && (b[j] == b' ' || b[j] == b'\t') {
        j += 1;
    }
    if !b[j..].starts_with(b"//") {
        return i;
    }
    while j < b.len() && b[j] != b'\n' && b[j] != b'\r' {
        j += 1;
    }
    j
}

/// `i` points at an opening quote; returns the index after the closing one.
fn skip_string(b: &[u8], i: usize) -> Result<usize> {
    let mut j = i + 1;
    while j < b.len() {
        match b[j] {
            b'\\' => j += 2,
            b'"' => return Ok(j + 1),
            _ => j += 1,
        }
    }
    Err(malformed(i, "unterminated string"))
}

/// Returns the index just past the value starting at `i`.
fn skip_value(b: &[u8], i: usize) -> Result<usize> {
    match b.get(i) {
        None => Err(malformed(i, "unexpected end of input")),
        Some(b'"') => skip_string(b, i),
        Some(b'{' | b'[') => {
            let mut depth = 0usize;
            let mut j = i;
            while j < b.len() {
                match b[j] {
                    b'"' => {
                        j = skip_string(b, j)?;
                        continue;
                    }
                    b'/' if matches!(b.get(j + 1), Some(b'/' | b'*')) => {
                        j = skip_trivia(b, j);
                        continue;
                    }
                    b'{' | b'[' => depth += 1,
                    b'}' | b']' => {
                        depth -= 1;
                        if depth == 0 {
                            return Ok(j + 1);
                        }
                    }
                    _ => {}
                }
                j += 1;
            }
            Err(malformed(i, "unbalanced brackets"))
        }
        Some(_) => {
            let mut j = i;
            while j < b.len()
                && !matches!(b[j], b',' | b'}' | b']' | b'/')
                && !b[j].is_ascii_whitespace()
            {
                j += 1;
            }
            if j == i {
                Err(malformed(i, "missing value"))
            } else {
                Ok(j)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SETTINGS: &str = "// User settings\n{\n    // Font\n    \"editor.fontSize\": 14, // pinned\n    \"files.autoSave\": \"off\",\n    \"url\": \"http://x\"\n}\n";

    #[test]
    fn test_strip_comments_keeps_strings() {
        let input = r#"{
            // line comment
            "url": "http://example.com", /* block */
            "path": "C:\\dir\\" // trailing
        }"#;
        let value = parse_value(input).unwrap();
        assert_eq!(value["url"], "http://example.com");
        assert_eq!(value["path"], "C:\\dir\\");
    }

    #[test]
    fn test_trailing_commas_tolerated() {
        let value = parse_value("{\"a\": [1, 2,], \"b\": \"x,}\",}").unwrap();
        assert_eq!(value, json!({"a": [1, 2], "b": "x,}"}));
    }

    #[test]
    fn test_pretty_string_uses_four_spaces() {
        let text = to_pretty_string(&json!({"a": 1})).unwrap();
        assert_eq!(text, "{\n    \"a\": 1\n}");
    }

    #[test]
    fn test_document_round_trips_untouched() {
        let doc = JsoncDocument::parse(SETTINGS).unwrap();
        assert_eq!(doc.render(), SETTINGS);
        assert_eq!(doc.keys(), ["editor.fontSize", "files.autoSave", "url"]);
        assert_eq!(doc.get("editor.fontSize").unwrap(), Some(json!(14)));
        assert_eq!(doc.get("missing").unwrap(), None);
    }

    #[test]
    fn test_remove_keeps_other_comments() {
        let mut doc = JsoncDocument::parse(SETTINGS).unwrap();
        assert!(doc.remove("url"));
        assert!(!doc.remove("url"));
        assert_eq!(
            doc.render(),
            "// User settings\n{\n    // Font\n    \"editor.fontSize\": 14, // pinned\n    \"files.autoSave\": \"off\"\n}\n"
        );

        let mut doc = JsoncDocument::parse(SETTINGS).unwrap();
        doc.remove("editor.fontSize");
        assert_eq!(
            doc.render(),
            "// User settings\n{\n    \"files.autoSave\": \"off\",\n    \"url\": \"http://x\"\n}\n"
        );
    }

    #[test]
    fn test_set_existing_and_new() {
        let mut doc = JsoncDocument::parse(SETTINGS).unwrap();
        doc.set("editor.fontSize", &json!(16)).unwrap();
        doc.set("window.zoomLevel", &json!(1)).unwrap();
        assert_eq!(
            doc.render(),
            "// User settings\n{\n    // Font\n    \"editor.fontSize\": 16, // pinned\n    \"files.autoSave\": \"off\",\n    \"url\": \"http://x\",\n    \"window.zoomLevel\": 1\n}\n"
        );
    }

    #[test]
    fn test_set_multiline_value_is_indented() {
        let mut doc = JsoncDocument::parse("{\n  \"x\": true\n}").unwrap();
        doc.set("obj", &json!({"a": 1})).unwrap();
        assert_eq!(
            doc.render(),
            "{\n  \"x\": true,\n  \"obj\": {\n      \"a\": 1\n  }\n}"
        );
        assert_eq!(doc.to_value().unwrap(), json!({"x": true, "obj": {"a": 1}}));
    }

    #[test]
    fn test_set_on_empty_object() {
        let mut doc = JsoncDocument::parse("{}").unwrap();
        doc.set("a", &json!(1)).unwrap();
        assert_eq!(doc.render(), "{\n    \"a\": 1\n}");

        let mut doc = JsoncDocument::empty();
        doc.set("b", &json!("x")).unwrap();
        assert_eq!(doc.render(), "{\n    \"b\": \"x\"\n}\n");
    }

    #[test]
    fn test_trailing_comma_preserved() {
        let text = "{\n  \"a\": 1,\n  \"b\": 2,\n}";
        let mut doc = JsoncDocument::parse(text).unwrap();
        assert_eq!(doc.render(), text);
        doc.remove("b");
        assert_eq!(doc.render(), "{\n  \"a\": 1,\n}");
    }

    #[test]
    fn test_line_comment_after_removed_neighbour() {
        let mut doc = JsoncDocument::parse("{\"a\": 1, // c\n\"b\": 2}").unwrap();
        doc.remove("b");
        assert_eq!(doc.render(), "{\"a\": 1 // c\n}");
        assert_eq!(doc.to_value().unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_crlf_line_endings_survive_edits() {
        let text = "{\r\n    \"a\": 1, // x\r\n    \"b\": 2,\r\n    \"c\": true // t\r\n}\r\n";
        let mut doc = JsoncDocument::parse(text).unwrap();
        assert_eq!(doc.render(), text);

        doc.remove("b");
        assert_eq!(
            doc.render(),
            "{\r\n    \"a\": 1, // x\r\n    \"c\": true // t\r\n}\r\n"
        );

        doc.remove("c");
        doc.set("d", &json!({"e": 1})).unwrap();
        let out = doc.render();
        assert!(!out.contains("\r\r"), "{out:?}");
        assert_eq!(out.matches('\n').count(), out.matches("\r\n").count(), "{out:?}");
        assert_eq!(doc.to_value().unwrap(), json!({"a": 1, "d": {"e": 1}}));
    }

    #[test]
    fn test_duplicate_keys() {
        let mut doc = JsoncDocument::parse("{\"a\": 1, \"a\": 2}").unwrap();
        assert_eq!(doc.get("a").unwrap(), Some(json!(2)));
        doc.set("a", &json!(3)).unwrap();
        assert_eq!(doc.render(), "{\"a\": 3}");
    }

    #[test]
    fn test_rejects_non_objects() {
        assert!(JsoncDocument::parse("[1, 2]").is_err());
        assert!(JsoncDocument::parse("").is_err());
        assert!(JsoncDocument::parse("{\"a\": }").is_err());
        assert!(JsoncDocument::parse("{\"a\": \"open}").is_err());
    }
}

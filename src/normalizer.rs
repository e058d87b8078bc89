use regex::Regex;
use std::collections::HashMap;

/// How far into the message (in characters) we look for the header/body
/// separator.
const HEADER_SCAN_LIMIT: usize = 8_000;

/// Canonical form of one raw email: parsed headers, cleaned body, and the
/// links found in it. Everything downstream works from this struct.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEmail {
    /// Header map with lowercased keys; later duplicates override earlier ones.
    pub headers: HashMap<String, String>,
    /// Original-case body with whitespace runs collapsed and obfuscation
    /// characters folded out. Empty only for header-only input.
    pub body: String,
    /// URLs in order of first appearance, deduplicated.
    pub links: Vec<String>,
}

impl NormalizedEmail {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    /// Re-serialize to header lines, a blank line, and the body. Running
    /// the result back through [`EmailNormalizer::normalize`] yields an
    /// equal struct.
    pub fn to_raw_form(&self) -> String {
        if self.headers.is_empty() {
            return self.body.clone();
        }
        let mut keys: Vec<&String> = self.headers.keys().collect();
        keys.sort();
        let mut out = String::new();
        for key in keys {
            out.push_str(key);
            out.push_str(": ");
            out.push_str(&self.headers[key]);
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out
    }
}

/// Extract the domain part of an address like `Alice <alice@example.com>`.
pub fn domain_of(address: &str) -> Option<String> {
    let at = address.rfind('@')?;
    let domain = address[at + 1..]
        .trim_end_matches('>')
        .trim()
        .to_lowercase();
    if domain.is_empty() {
        None
    } else {
        Some(domain)
    }
}

pub struct EmailNormalizer {
    url_regex: Regex,
    header_line_regex: Regex,
    homoglyph_map: HashMap<char, char>,
}

impl EmailNormalizer {
    pub fn new() -> Self {
        let mut homoglyph_map = HashMap::new();
        // Cyrillic look-alikes
        homoglyph_map.insert('а', 'a');
        homoglyph_map.insert('е', 'e');
        homoglyph_map.insert('о', 'o');
        homoglyph_map.insert('р', 'p');
        homoglyph_map.insert('с', 'c');
        homoglyph_map.insert('х', 'x');
        // Greek look-alikes
        homoglyph_map.insert('α', 'a');
        homoglyph_map.insert('ο', 'o');

        Self {
            url_regex: Regex::new(
                r"(?i)\b(?:https?://[^\s<>()]+|www\.[a-z0-9][a-z0-9.-]*\.[a-z]{2,}(?:/[^\s<>()]*)?|[a-z0-9][a-z0-9-]*(?:\.[a-z0-9-]+)*\.[a-z]{2,}/[^\s<>()]+)",
            )
            .unwrap(),
            header_line_regex: Regex::new(r"^[A-Za-z][A-Za-z0-9-]*:").unwrap(),
            homoglyph_map,
        }
    }

    /// Total over any `&str`: never fails, never panics. Malformed byte
    /// sequences are the caller's problem to replace (U+FFFD) before the
    /// text reaches here.
    pub fn normalize(&self, raw: &str) -> NormalizedEmail {
        let (header_block, body_raw) = self.split_structure(raw);
        let headers = self.parse_headers(header_block);
        let body = self.clean_body(body_raw);
        let links = self.extract_links(&body);
        NormalizedEmail {
            headers,
            body,
            links,
        }
    }

    /// Split into header block and body. A header block exists only when
    /// the first blank line falls within the scan limit and the first line
    /// actually looks like a `Name: value` header; otherwise the whole
    /// input is body.
    fn split_structure<'a>(&self, raw: &'a str) -> (&'a str, &'a str) {
        if !self
            .header_line_regex
            .is_match(raw.trim_start_matches(['\r', '\n']))
        {
            return ("", raw);
        }
        let within_limit = |i: usize| raw[..i].chars().count() <= HEADER_SCAN_LIMIT;
        let lf = raw.find("\n\n").filter(|&i| within_limit(i));
        let crlf = raw.find("\r\n\r\n").filter(|&i| within_limit(i));
        match (lf, crlf) {
            (Some(i), Some(j)) if j < i => (&raw[..j], &raw[j + 4..]),
            (None, Some(j)) => (&raw[..j], &raw[j + 4..]),
            (Some(i), _) => (&raw[..i], &raw[i + 2..]),
            (None, None) => ("", raw),
        }
    }

    fn parse_headers(&self, block: &str) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        for line in block.lines() {
            // only RFC-token keys count as headers; anything else would
            // not survive a re-parse of the serialized form
            if !self.header_line_regex.is_match(line) {
                continue;
            }
            if let Some(colon) = line.find(':') {
                let key = line[..colon].to_lowercase();
                let value = line[colon + 1..].trim().to_string();
                // last value wins on duplicates
                headers.insert(key, value);
            }
        }
        headers
    }

    /// Fold homoglyphs to their Latin equivalents, drop zero-width and
    /// BIDI control characters, collapse whitespace runs, trim.
    fn clean_body(&self, body: &str) -> String {
        let mut unmasked = String::with_capacity(body.len());
        for ch in body.chars() {
            if let Some(&latin) = self.homoglyph_map.get(&ch) {
                unmasked.push(latin);
            } else if matches!(
                ch,
                '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{FEFF}'
                    | '\u{202D}' | '\u{202E}' | '\u{2066}'..='\u{2069}'
            ) {
                // skip
            } else {
                unmasked.push(ch);
            }
        }

        let mut collapsed = String::with_capacity(unmasked.len());
        let mut in_whitespace = false;
        for ch in unmasked.chars() {
            if ch.is_whitespace() {
                in_whitespace = true;
            } else {
                if in_whitespace && !collapsed.is_empty() {
                    collapsed.push(' ');
                }
                in_whitespace = false;
                collapsed.push(ch);
            }
        }
        collapsed
    }

    /// Total: returns an empty list when nothing matches.
    fn extract_links(&self, body: &str) -> Vec<String> {
        let mut links = Vec::new();
        for m in self.url_regex.find_iter(body) {
            let link = m
                .as_str()
                .trim_end_matches(['.', ',', ';', ':', '!', '?', '\'', '"']);
            if link.is_empty() {
                continue;
            }
            if !links.iter().any(|existing| existing == link) {
                links.push(link.to_string());
            }
        }
        links
    }
}

impl Default for EmailNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

//! Source-map v3 generation.
//!
//! The serializer records raw mappings (generated position → original
//! span) through [`SourceMapBuilder`]; the builder folds them into the
//! standard base64-VLQ `mappings` string.  URL rewriting — converting
//! canonical URLs to their importer-preferred form, and embedding the
//! string entrypoint as a `data:` URL — happens in the compile driver,
//! which owns the import cache.

use std::collections::HashMap;
use std::rc::Rc;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::Serialize;
use url::Url;

use crate::source::{SourceFile, Span};

/// Which sources get embedded in `sourcesContent`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum IncludeSources {
    /// Only sources with no usable URL.
    Auto,
    Always,
    Never,
}

/// The serialized source map, standard v3 layout.
#[derive(Debug, Serialize)]
pub struct SourceMap {
    pub version: u32,
    pub sources: Vec<String>,

    #[serde(rename = "sourcesContent", skip_serializing_if = "Option::is_none")]
    pub sources_content: Option<Vec<Option<String>>>,

    pub names: Vec<String>,
    pub mappings: String,
}

impl SourceMap {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("source maps contain only JSON-safe data")
    }
}

struct RawMapping {
    generated_line: u32,
    generated_column: u32,
    source: usize,
    source_line: u32,
    source_column: u32,
}

struct SourceEntry {
    url: Option<Url>,
    content: String,
}

#[derive(Default)]
pub struct SourceMapBuilder {
    mappings: Vec<RawMapping>,
    sources: Vec<SourceEntry>,
    source_ids: HashMap<String, usize>,
}

impl SourceMapBuilder {
    pub fn new() -> SourceMapBuilder {
        SourceMapBuilder::default()
    }

    /// Records that generated position `(line, column)` comes from the
    /// start of `span`.
    pub fn add(&mut self, line: u32, column: u32, span: &Span) {
        let source = self.source_id(&span.file);
        let location = span.start_location();
        self.mappings.push(RawMapping {
            generated_line: line,
            generated_column: column,
            source,
            source_line: location.line as u32,
            source_column: location.column as u32,
        });
    }

    fn source_id(&mut self, file: &Rc<SourceFile>) -> usize {
        let key = file.url().map(Url::to_string).unwrap_or_default();
        if let Some(&id) = self.source_ids.get(&key) {
            return id;
        }
        let id = self.sources.len();
        self.sources.push(SourceEntry {
            url: file.url().cloned(),
            content: String::from(file.text()),
        });
        self.source_ids.insert(key, id);
        id
    }

    /// Shifts every mapping down, after a prefix line (the `@charset`
    /// declaration) is prepended to the output.
    pub fn shift_lines(&mut self, lines: u32) {
        for mapping in &mut self.mappings {
            mapping.generated_line += lines;
        }
    }

    /// Shifts first-line mappings right, after a prefix (the byte-order
    /// mark) is prepended to the first line.
    pub fn shift_first_line(&mut self, columns: u32) {
        for mapping in &mut self.mappings {
            if mapping.generated_line == 0 {
                mapping.generated_column += columns;
            }
        }
    }

    /// The source URLs in first-reference order, for the driver's rewrite
    /// pass.  `None` is the string entrypoint.
    pub fn source_urls(&self) -> Vec<Option<Url>> {
        self.sources.iter().map(|s| s.url.clone()).collect()
    }

    /// Folds the recorded mappings into a [`SourceMap`].  `sources` holds
    /// each source's URL as recorded; the driver rewrites them afterward.
    pub fn build(mut self, include_sources: IncludeSources) -> SourceMap {
        self.mappings.sort_by_key(|m| (m.generated_line, m.generated_column));

        let mut mappings = String::new();
        let mut previous_line = 0u32;
        let mut previous_column = 0i64;
        let mut previous_source = 0i64;
        let mut previous_source_line = 0i64;
        let mut previous_source_column = 0i64;
        let mut first_on_line = true;

        for mapping in &self.mappings {
            while previous_line < mapping.generated_line {
                mappings.push(';');
                previous_line += 1;
                previous_column = 0;
                first_on_line = true;
            }
            if !first_on_line {
                mappings.push(',');
            }
            first_on_line = false;

            encode_vlq(i64::from(mapping.generated_column) - previous_column, &mut mappings);
            previous_column = i64::from(mapping.generated_column);

            encode_vlq(mapping.source as i64 - previous_source, &mut mappings);
            previous_source = mapping.source as i64;

            encode_vlq(
                i64::from(mapping.source_line) - previous_source_line,
                &mut mappings,
            );
            previous_source_line = i64::from(mapping.source_line);

            encode_vlq(
                i64::from(mapping.source_column) - previous_source_column,
                &mut mappings,
            );
            previous_source_column = i64::from(mapping.source_column);
        }

        let sources_content = match include_sources {
            IncludeSources::Never => None,
            IncludeSources::Always => Some(
                self.sources
                    .iter()
                    .map(|s| Some(s.content.clone()))
                    .collect(),
            ),
            IncludeSources::Auto => {
                let any_inline = self.sources.iter().any(|s| s.url.is_none());
                if any_inline {
                    Some(
                        self.sources
                            .iter()
                            .map(|s| {
                                if s.url.is_none() {
                                    Some(s.content.clone())
                                } else {
                                    None
                                }
                            })
                            .collect(),
                    )
                } else {
                    None
                }
            }
        };

        SourceMap {
            version: 3,
            sources: self
                .sources
                .iter()
                .map(|s| s.url.as_ref().map(Url::to_string).unwrap_or_default())
                .collect(),
            sources_content,
            names: Vec::new(),
            mappings,
        }
    }
}

const BASE64: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Base64 VLQ, as the source-map format defines it: the sign bit lives in
/// the lowest bit, then groups of five bits little-endian with a
/// continuation bit.
fn encode_vlq(value: i64, out: &mut String) {
    let mut vlq = if value < 0 {
        ((-value as u64) << 1) | 1
    } else {
        (value as u64) << 1
    };

    loop {
        let mut digit = (vlq & 0b11111) as usize;
        vlq >>= 5;
        if vlq != 0 {
            digit |= 0b100000;
        }
        out.push(BASE64[digit] as char);
        if vlq == 0 {
            break;
        }
    }
}

/// The set of characters percent-encoded when embedding a source as a
/// `data:` URL.
const DATA_URL_ENCODE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'\\')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Embeds stylesheet text as a `data:` URL, for entrypoints that have no
/// URL of their own.
pub fn data_url(text: &str) -> String {
    format!(
        "data:;charset=utf-8,{}",
        utf8_percent_encode(text, DATA_URL_ENCODE)
    )
}

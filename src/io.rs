//! Utilities to acquire stylesheet text from URLs.

use std::fmt;
use std::fs;
use std::io;

use data_url::DataUrl;
use url::Url;

#[derive(Debug)]
pub enum IoError {
    BadDataUrl,
    UnsupportedScheme(String),
    InvalidPath(String),
    Read { path: String, err: io::Error },
    NotUtf8(String),
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            IoError::BadDataUrl => write!(f, "invalid data: URL"),
            IoError::UnsupportedScheme(ref s) => write!(f, "unsupported URL scheme: {s}"),
            IoError::InvalidPath(ref s) => write!(f, "invalid file path: {s}"),
            IoError::Read { ref path, ref err } => write!(f, "Can't read {path}: {err}"),
            IoError::NotUtf8(ref s) => write!(f, "{s} is not valid UTF-8"),
        }
    }
}

fn decode_data_url(url: &str) -> Result<Vec<u8>, IoError> {
    let data_url = DataUrl::process(url).map_err(|_| IoError::BadDataUrl)?;

    let (bytes, fragment_id) = data_url.decode_to_vec().map_err(|_| IoError::BadDataUrl)?;

    // Per the data: URL spec (https://fetch.spec.whatwg.org/#data-urls),
    // those URLs cannot have fragment identifiers.
    if fragment_id.is_some() {
        return Err(IoError::BadDataUrl);
    }

    Ok(bytes)
}

/// Reads the entire stylesheet text referenced by a URL.
///
/// The URL can be a `data:` URL or a `file:` URL.  The bytes are decoded as
/// UTF-8; a leading byte-order mark is stripped, and undecodable sequences
/// are an error rather than replacement characters, since a stylesheet with
/// mangled identifiers would fail later with a far worse message.
pub fn acquire_data(url: &Url) -> Result<String, IoError> {
    let bytes = match url.scheme() {
        "data" => decode_data_url(url.as_str())?,
        "file" => {
            let path = url
                .to_file_path()
                .map_err(|_| IoError::InvalidPath(url.to_string()))?;
            fs::read(&path).map_err(|err| IoError::Read {
                path: path.display().to_string(),
                err,
            })?
        }
        other => return Err(IoError::UnsupportedScheme(String::from(other))),
    };

    decode_utf8(bytes).ok_or_else(|| IoError::NotUtf8(url.to_string()))
}

/// Decodes UTF-8 text, tolerating and stripping a byte-order mark.
pub fn decode_utf8(bytes: Vec<u8>) -> Option<String> {
    let (text, had_errors) = encoding_rs::UTF_8.decode_with_bom_removal(&bytes);
    if had_errors {
        None
    } else {
        Some(text.into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_data_urls() {
        let url = Url::parse("data:text/css;base64,YSB7IGI6IGM7IH0=").unwrap();
        assert_eq!(acquire_data(&url).unwrap(), "a { b: c; }");
    }

    #[test]
    fn rejects_data_urls_with_fragments() {
        let url = Url::parse("data:,a%20%7B%7D#frag").unwrap();
        assert!(matches!(acquire_data(&url), Err(IoError::BadDataUrl)));
    }

    #[test]
    fn rejects_unknown_schemes() {
        let url = Url::parse("https://example.com/style.scss").unwrap();
        assert!(matches!(
            acquire_data(&url),
            Err(IoError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn strips_byte_order_mark() {
        let bytes = b"\xef\xbb\xbfa {}".to_vec();
        assert_eq!(decode_utf8(bytes).unwrap(), "a {}");
    }

    #[test]
    fn invalid_utf8_is_an_error() {
        assert!(decode_utf8(vec![0x61, 0xff, 0xfe]).is_none());
    }
}

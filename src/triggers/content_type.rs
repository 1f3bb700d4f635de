//! Content type sniffing for request bodies that arrive without a
//! `content-type` header.
//!
//! Covers the signatures workers actually receive (markup, documents,
//! common images and archives). Anything else is classified as UTF-8 text
//! when it contains no control bytes, or as an opaque octet stream.

/// Fallback for bodies that match no signature and contain binary data.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Returned for bodies that look like plain text (including empty bodies).
pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Only the leading bytes take part in sniffing.
const SNIFF_LEN: usize = 512;

const HTML_TAGS: &[&[u8]] = &[
    b"<!DOCTYPE HTML",
    b"<HTML",
    b"<HEAD",
    b"<SCRIPT",
    b"<IFRAME",
    b"<H1",
    b"<DIV",
    b"<FONT",
    b"<TABLE",
    b"<A",
    b"<STYLE",
    b"<TITLE",
    b"<B",
    b"<BODY",
    b"<BR",
    b"<P",
    b"<!--",
];

const MAGIC: &[(&[u8], &str)] = &[
    (b"%PDF-", "application/pdf"),
    (b"%!PS-Adobe-", "application/postscript"),
    (b"\x89PNG\x0D\x0A\x1A\x0A", "image/png"),
    (b"\xFF\xD8\xFF", "image/jpeg"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"BM", "image/bmp"),
    (b"PK\x03\x04", "application/zip"),
    (b"\x1F\x8B\x08", "application/x-gzip"),
    (b"OggS\x00", "application/ogg"),
    (b"\x00\x61\x73\x6D", "application/wasm"),
];

/// Guess the mime type of `data` from its leading bytes.
pub fn sniff(data: &[u8]) -> &'static str {
    let data = &data[..data.len().min(SNIFF_LEN)];

    let text = trim_leading_whitespace(data);
    if HTML_TAGS.iter().any(|tag| is_html_tag(text, tag)) {
        return "text/html; charset=utf-8";
    }
    if text.starts_with(b"<?xml") {
        return "text/xml; charset=utf-8";
    }

    if let Some((_, mime)) = MAGIC.iter().find(|(sig, _)| data.starts_with(sig)) {
        return mime;
    }
    if data.len() >= 14 && &data[..4] == b"RIFF" && &data[8..14] == b"WEBPVP" {
        return "image/webp";
    }

    if data.iter().any(|b| is_binary_byte(*b)) {
        OCTET_STREAM
    } else {
        TEXT_PLAIN
    }
}

fn trim_leading_whitespace(data: &[u8]) -> &[u8] {
    let start = data
        .iter()
        .position(|b| !matches!(b, b'\t' | b'\n' | b'\x0C' | b'\r' | b' '))
        .unwrap_or(data.len());
    &data[start..]
}

/// Case-insensitive tag prefix followed by a space or `>`.
fn is_html_tag(data: &[u8], tag: &[u8]) -> bool {
    if data.len() <= tag.len() {
        return false;
    }
    let prefix_matches = data
        .iter()
        .zip(tag)
        .all(|(d, t)| d.to_ascii_uppercase() == *t);
    prefix_matches && matches!(data[tag.len()], b' ' | b'>')
}

fn is_binary_byte(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}

//! Response header accumulation shared by the probe and the downloaders.

use std::str;

/// Status and the size/range headers of the last response in a redirect chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ResponseHead {
    pub status: Option<u32>,
    /// `Content-Length`; zero is treated as unknown.
    pub content_length: Option<u64>,
    /// Complete length from `Content-Range: bytes a-b/N` or `bytes */N`.
    pub content_range_total: Option<u64>,
    /// `Accept-Ranges` present with a value other than `none`.
    pub accept_ranges: bool,
}

impl ResponseHead {
    /// Feeds one raw header line. A status line starts a new response, so
    /// only the headers of the final hop survive redirects.
    pub fn absorb(&mut self, raw: &[u8]) {
        let Ok(line) = str::from_utf8(raw) else {
            return;
        };
        let line = line.trim();
        if line.starts_with("HTTP/") {
            *self = ResponseHead {
                status: line
                    .split_whitespace()
                    .nth(1)
                    .and_then(|code| code.parse().ok()),
                ..ResponseHead::default()
            };
            return;
        }
        let Some((name, value)) = line.split_once(':') else {
            return;
        };
        let name = name.trim();
        let value = value.trim();
        if name.eq_ignore_ascii_case("content-length") {
            self.content_length = value.parse::<u64>().ok().filter(|&n| n > 0);
        } else if name.eq_ignore_ascii_case("accept-ranges") {
            self.accept_ranges = !value.is_empty() && !value.eq_ignore_ascii_case("none");
        } else if name.eq_ignore_ascii_case("content-range") {
            self.content_range_total = parse_content_range_total(value);
        }
    }

    /// Size of the whole resource as far as this response tells.
    pub fn resource_total(&self) -> Option<u64> {
        match self.status {
            Some(206) | Some(416) => self.content_range_total,
            Some(200) => self.content_length,
            _ => None,
        }
    }
}

fn parse_content_range_total(value: &str) -> Option<u64> {
    let rest = value.strip_prefix("bytes")?.trim_start();
    let (_, total) = rest.split_once('/')?;
    total.trim().parse().ok()
}

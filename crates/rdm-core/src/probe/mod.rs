//! Capability probe: resource size and range support.
//!
//! Issues a HEAD request through curl and reads `Accept-Ranges` and
//! `Content-Length`. Transport failures are retried a few times with a short
//! cancellable pause. When no usable metadata comes back the probe starts a
//! GET, reads the headers and aborts before the body. The probe never fails a
//! job: the worst outcome is an unknown size without range support.

mod parse;

pub(crate) use parse::ResponseHead;

use std::cell::RefCell;

use crate::config::JobConfig;
use crate::control::JobControl;
use crate::downloader::new_handle;

/// What the server told us about the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capability {
    pub supports_ranges: bool,
    /// `None` when unknown.
    pub total_bytes: Option<u64>,
}

/// Probes `url`. Runs on the calling thread.
pub fn probe(url: &str, cfg: &JobConfig, control: &JobControl) -> Capability {
    let attempts = cfg.local_retry.attempts.max(1);
    for attempt in 1..=attempts {
        match head(url, cfg) {
            Ok(h) if matches!(h.status, Some(200..=299)) => {
                let cap = Capability {
                    supports_ranges: h.accept_ranges,
                    total_bytes: h.content_length,
                };
                tracing::debug!(job = %control.id(), ?cap, "HEAD probe");
                return cap;
            }
            Ok(h) => {
                tracing::debug!(job = %control.id(), status = ?h.status, "HEAD refused, probing with GET");
                break;
            }
            Err(e) => {
                tracing::debug!(job = %control.id(), attempt, "HEAD failed: {}", e);
                if attempt < attempts && control.sleep(cfg.local_retry.delay).is_err() {
                    return Capability::default();
                }
            }
        }
    }
    if control.is_cancelled() {
        return Capability::default();
    }

    match get_headers(url, cfg, control) {
        Ok(h) if matches!(h.status, Some(200..=299)) => {
            let cap = Capability {
                supports_ranges: false,
                total_bytes: h.content_length,
            };
            tracing::debug!(job = %control.id(), ?cap, "GET probe");
            cap
        }
        Ok(h) => {
            tracing::debug!(job = %control.id(), status = ?h.status, "GET probe refused");
            Capability::default()
        }
        Err(e) => {
            tracing::debug!(job = %control.id(), "GET probe failed: {}", e);
            Capability::default()
        }
    }
}

fn head(url: &str, cfg: &JobConfig) -> Result<ResponseHead, curl::Error> {
    let head = RefCell::new(ResponseHead::default());
    let mut easy = new_handle(url, cfg)?;
    easy.nobody(true)?;
    {
        let mut transfer = easy.transfer();
        transfer.header_function(|line| {
            head.borrow_mut().absorb(line);
            true
        })?;
        transfer.perform()?;
    }
    Ok(head.into_inner())
}

/// GET that stops at the first body byte.
fn get_headers(url: &str, cfg: &JobConfig, control: &JobControl) -> Result<ResponseHead, curl::Error> {
    let head = RefCell::new(ResponseHead::default());
    let mut easy = new_handle(url, cfg)?;
    let result = {
        let mut transfer = easy.transfer();
        transfer.header_function(|line| {
            head.borrow_mut().absorb(line);
            true
        })?;
        transfer.write_function(|_| Ok(0))?;
        transfer.progress_function(|_, _, _, _| !control.is_cancelled())?;
        transfer.perform()
    };
    match result {
        Err(e) if !e.is_write_error() => Err(e),
        _ => Ok(head.into_inner()),
    }
}

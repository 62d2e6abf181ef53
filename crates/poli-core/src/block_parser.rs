//! Extraction of `[[POLI:MSG ...]]` envelopes from captured terminal text.
//!
//! Wire format:
//!
//! ```text
//! [[POLI:MSG {"to":"EXECUTER","type":"plan","id":"task-1"}]]
//! <PLAN>
//! ...payload...
//! </PLAN>
//! [[/POLI:MSG]]
//! ```
//!
//! Parsing never fails: anything malformed degrades to "no message yet" and
//! the caller keeps polling.

use regex::Regex;
use tracing::debug;

use poli_proto::{Message, Role};

/// Matches a complete envelope: header JSON, body, closing marker.
const ENVELOPE_RE: &str = r"(?s)\[\[POLI:MSG\s+(\{.*?\})\]\](.*?)\[\[/POLI:MSG\]\]";

/// Matches an inner payload open tag, e.g. `<PLAN>` or `<RESULT>`.
const OPEN_TAG_RE: &str = r"<([A-Za-z][A-Za-z0-9_-]*)>";

/// Finds structured message envelopes in free-form terminal output.
pub struct BlockParser {
    envelope: Regex,
    open_tag: Regex,
}

impl Default for BlockParser {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockParser {
    pub fn new() -> Self {
        Self {
            // Both patterns are compile-time constants; they cannot fail.
            envelope: Regex::new(ENVELOPE_RE).unwrap(),
            open_tag: Regex::new(OPEN_TAG_RE).unwrap(),
        }
    }

    /// Returns every well-formed envelope whose closing marker lies past
    /// `since_offset`, in the order the blocks appear.
    ///
    /// Blocks that ended at or before `since_offset` were already consumed
    /// and are never re-emitted. An opening marker without its closing
    /// marker (a block still being typed) yields nothing; the caller polls
    /// again once the producer has finished.
    pub fn extract(&self, text: &str, since_offset: usize) -> Vec<Message> {
        let mut messages = Vec::new();

        for caps in self.envelope.captures_iter(text) {
            let whole = caps.get(0).unwrap();
            if whole.end() <= since_offset {
                continue;
            }

            let header_str = &caps[1];
            let body = &caps[2];

            let Some(header) = parse_header(header_str) else {
                debug!("skipping block with unparseable header");
                continue;
            };

            let Some(to) = header_role(&header) else {
                debug!("skipping block without a valid recipient");
                continue;
            };
            let Some(id) = header_id(&header) else {
                debug!("skipping block without a task id");
                continue;
            };

            let kind = header
                .get("type")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();

            let Some(payload) = self.inner_payload(body) else {
                debug!(%id, "skipping block without an inner payload section");
                continue;
            };

            messages.push(Message {
                to,
                kind,
                id,
                payload,
                header,
                raw_offset: whole.end(),
            });
        }

        messages
    }

    /// Locates the first inner `<TAG>`/`</TAG>` pair in an envelope body and
    /// returns the verbatim text between the tag lines.
    ///
    /// The tag name is convention-defined (`PLAN`, `RESULT`, ...) but not
    /// fixed; whichever open tag appears first wins, provided its matching
    /// close tag follows.
    fn inner_payload(&self, body: &str) -> Option<String> {
        let open = self.open_tag.captures(body)?;
        let name = &open[1];
        let open_end = open.get(0).unwrap().end();

        let close = format!("</{name}>");
        let rel = body[open_end..].find(&close)?;
        let mut payload = &body[open_end..open_end + rel];

        // The tag lines themselves are not part of the payload; interior
        // whitespace is preserved verbatim.
        payload = payload.strip_prefix("\r\n").unwrap_or(payload);
        payload = payload.strip_prefix('\n').unwrap_or(payload);
        payload = payload.strip_suffix('\n').unwrap_or(payload);
        payload = payload.strip_suffix('\r').unwrap_or(payload);

        Some(payload.to_string())
    }
}

fn parse_header(raw: &str) -> Option<serde_json::Map<String, serde_json::Value>> {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn header_role(header: &serde_json::Map<String, serde_json::Value>) -> Option<Role> {
    header.get("to")?.as_str()?.parse().ok()
}

/// Task ids are usually strings but some producers emit bare numbers.
fn header_id(header: &serde_json::Map<String, serde_json::Value>) -> Option<String> {
    let id = match header.get("id")? {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if id.is_empty() { None } else { Some(id) }
}

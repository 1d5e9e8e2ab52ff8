//! Incremental tag parser for structured agent output.
//!
//! Structured agents stream a payload of the form
//! `<design_concept>…</design_concept><code>…</code>` with JSON-style
//! escape sequences inside both regions. Chunk boundaries are arbitrary:
//! a marker or an escape sequence may be split anywhere, so the parser
//! holds back any tail that could still become one and only releases text
//! it has proven to be plain content.
//!
//! [`TagParser::feed`] never re-emits text — each delta carries only what
//! was newly proven. [`TagParser::finalize`] handles truncated and
//! malformed payloads leniently and synthesizes the end events needed to
//! keep every start balanced.

const RATIONALE_OPEN: &str = "<design_concept>";
const RATIONALE_CLOSE: &str = "</design_concept>";
const ARTIFACT_OPEN: &str = "<code>";
const ARTIFACT_CLOSE: &str = "</code>";

/// One semantic parse event, in stream order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseEvent {
    /// The design-rationale region opened.
    RationaleStart,
    /// Newly proven rationale text (decoded, delta-only).
    RationaleDelta(String),
    /// The design-rationale region closed.
    RationaleEnd,
    /// The artifact region opened.
    ArtifactStart,
    /// Newly proven artifact text (decoded, delta-only).
    ArtifactDelta(String),
    /// The artifact region closed.
    ArtifactEnd,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Init,
    Rationale,
    BetweenFields,
    Artifact,
    Done,
}

#[derive(Clone, Copy)]
enum Field {
    Rationale,
    Artifact,
}

/// Streaming parser over the structured agent payload.
///
/// Feed arbitrary chunks; each call returns the events the new bytes
/// proved. Call [`TagParser::finalize`] exactly once when the upstream
/// stream ends (normally, by error, or by cancellation).
pub struct TagParser {
    buf: String,
    pos: usize,
    phase: Phase,
    rationale: String,
    artifact: String,
    finalized: bool,
}

impl Default for TagParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TagParser {
    /// Create a parser in the initial (pre-marker) state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: String::new(),
            pos: 0,
            phase: Phase::Init,
            rationale: String::new(),
            artifact: String::new(),
            finalized: false,
        }
    }

    /// Full decoded rationale accumulated so far.
    #[must_use]
    pub fn rationale(&self) -> &str {
        &self.rationale
    }

    /// Full decoded artifact accumulated so far.
    #[must_use]
    pub fn artifact(&self) -> &str {
        &self.artifact
    }

    /// Consume one chunk of raw stream text.
    pub fn feed(&mut self, chunk: &str) -> Vec<ParseEvent> {
        let mut out = Vec::new();
        if self.finalized {
            return out;
        }
        self.buf.push_str(chunk);
        self.drain(false, &mut out);
        out
    }

    /// End of stream: flush held-back text, recover from malformed
    /// markers, and balance any still-open region. Idempotent.
    pub fn finalize(&mut self) -> Vec<ParseEvent> {
        let mut out = Vec::new();
        if self.finalized {
            return out;
        }
        self.finalized = true;

        // A malformed or missing rationale close marker leaves us stuck
        // in the rationale while the artifact open marker sits in the
        // remainder. Cut the rationale at the artifact marker and resume.
        if self.phase == Phase::Rationale {
            if let Some(idx) = self.buf[self.pos..].find("<code") {
                let raw = trim_partial_marker(&self.buf[self.pos..self.pos + idx], RATIONALE_CLOSE);
                let (decoded, _) = decode_escapes(raw, true);
                self.pos += idx;
                self.emit_delta(Field::Rationale, decoded, &mut out);
                self.phase = Phase::BetweenFields;
                out.push(ParseEvent::RationaleEnd);
            }
        }

        let resume = self.pos;
        self.drain(true, &mut out);

        match self.phase {
            Phase::Init | Phase::Done => {}
            Phase::Rationale => {
                out.push(ParseEvent::RationaleEnd);
                out.push(ParseEvent::ArtifactStart);
                out.push(ParseEvent::ArtifactEnd);
                self.phase = Phase::Done;
            }
            Phase::BetweenFields => {
                out.push(ParseEvent::ArtifactStart);
                self.recover_artifact(resume, &mut out);
                out.push(ParseEvent::ArtifactEnd);
                self.phase = Phase::Done;
            }
            Phase::Artifact => {
                out.push(ParseEvent::ArtifactEnd);
                self.phase = Phase::Done;
            }
        }
        out
    }

    fn drain(&mut self, eof: bool, out: &mut Vec<ParseEvent>) {
        loop {
            match self.phase {
                Phase::Init => {
                    if !self.seek_marker(RATIONALE_OPEN, eof) {
                        break;
                    }
                    self.phase = Phase::Rationale;
                    out.push(ParseEvent::RationaleStart);
                }
                Phase::Rationale => {
                    if !self.consume_rationale(eof, out) {
                        break;
                    }
                    self.phase = Phase::BetweenFields;
                    out.push(ParseEvent::RationaleEnd);
                }
                Phase::BetweenFields => {
                    if !self.seek_marker(ARTIFACT_OPEN, eof) {
                        break;
                    }
                    self.phase = Phase::Artifact;
                    out.push(ParseEvent::ArtifactStart);
                }
                Phase::Artifact => {
                    if !self.consume_region(ARTIFACT_CLOSE, eof, Field::Artifact, out) {
                        break;
                    }
                    self.phase = Phase::Done;
                    out.push(ParseEvent::ArtifactEnd);
                }
                Phase::Done => {
                    // Trailing text after the artifact close is discarded.
                    self.pos = self.buf.len();
                    break;
                }
            }
        }
    }

    /// Advance past `marker` if it is fully present; otherwise park the
    /// cursor before any tail that could still become the marker.
    fn seek_marker(&mut self, marker: &str, eof: bool) -> bool {
        if let Some(idx) = self.buf[self.pos..].find(marker) {
            self.pos += idx + marker.len();
            return true;
        }
        self.pos = if eof {
            self.buf.len()
        } else {
            self.hold_point(marker)
        };
        false
    }

    /// Consume rationale text. Returns true only when the region closed
    /// at its own close marker.
    ///
    /// A fully visible artifact open marker with no close marker in
    /// sight is held, not consumed: the `<code>` may still turn out to
    /// be literal rationale content, and only a later close marker (or
    /// end of stream, handled in [`TagParser::finalize`]) decides.
    fn consume_rationale(&mut self, eof: bool, out: &mut Vec<ParseEvent>) -> bool {
        if let Some(idx) = self.buf[self.pos..].find(RATIONALE_CLOSE) {
            let (decoded, _) = decode_escapes(&self.buf[self.pos..self.pos + idx], true);
            self.pos += idx + RATIONALE_CLOSE.len();
            self.emit_delta(Field::Rationale, decoded, out);
            return true;
        }
        if let Some(idx) = self.buf[self.pos..].find(ARTIFACT_OPEN) {
            // Text before the held marker is proven: a close-marker
            // prefix or escape broken by its `<` can no longer complete.
            let (decoded, _) = decode_escapes(&self.buf[self.pos..self.pos + idx], true);
            self.pos += idx;
            self.emit_delta(Field::Rationale, decoded, out);
            return false;
        }
        let end = if eof {
            self.buf.len()
        } else {
            self.hold_point(RATIONALE_CLOSE)
                .min(self.hold_point(ARTIFACT_OPEN))
        };
        let (decoded, consumed) = {
            let raw = &self.buf[self.pos..end];
            let raw = if eof {
                trim_partial_marker(trim_partial_marker(raw, RATIONALE_CLOSE), ARTIFACT_OPEN)
            } else {
                raw
            };
            decode_escapes(raw, eof)
        };
        self.pos = if eof { self.buf.len() } else { self.pos + consumed };
        self.emit_delta(Field::Rationale, decoded, out);
        false
    }

    /// Consume region text up to `close`. Returns true when the close
    /// marker was crossed; false when more input is needed (or at eof).
    fn consume_region(
        &mut self,
        close: &str,
        eof: bool,
        field: Field,
        out: &mut Vec<ParseEvent>,
    ) -> bool {
        if let Some(idx) = self.buf[self.pos..].find(close) {
            let (decoded, _) = decode_escapes(&self.buf[self.pos..self.pos + idx], true);
            self.pos += idx + close.len();
            self.emit_delta(field, decoded, out);
            return true;
        }
        let end = if eof {
            self.buf.len()
        } else {
            self.hold_point(close)
        };
        let (decoded, consumed) = {
            let raw = &self.buf[self.pos..end];
            let raw = if eof {
                trim_partial_marker(raw, close)
            } else {
                raw
            };
            decode_escapes(raw, eof)
        };
        self.pos = if eof { self.buf.len() } else { self.pos + consumed };
        self.emit_delta(field, decoded, out);
        false
    }

    /// Earliest tail position that could still be the start of `marker`.
    ///
    /// Markers are ASCII and begin with `<`, so any candidate tail starts
    /// at an ASCII byte — the returned index is always a char boundary.
    fn hold_point(&self, marker: &str) -> usize {
        let bytes = self.buf.as_bytes();
        let scan_from = self
            .buf
            .len()
            .saturating_sub(marker.len() - 1)
            .max(self.pos);
        let mut i = self.buf.len();
        while i > scan_from {
            i -= 1;
            if bytes[i] == b'<' && marker.as_bytes().starts_with(&bytes[i..]) {
                return i;
            }
        }
        self.buf.len()
    }

    /// Lenient artifact recovery for payloads whose artifact open marker
    /// never fully arrived (truncated `<code` or a malformed variant).
    fn recover_artifact(&mut self, from: usize, out: &mut Vec<ParseEvent>) {
        let tail = &self.buf[from..];
        let Some(idx) = tail.find("<code") else {
            return;
        };
        let after = &tail[idx + "<code".len()..];
        let body = after.find('>').map_or("", |gt| &after[gt + 1..]);
        let body = body.find("</code").map_or(body, |end| &body[..end]);
        let body = trim_partial_marker(body, ARTIFACT_CLOSE);
        let (decoded, _) = decode_escapes(body, true);
        self.emit_delta(Field::Artifact, decoded, out);
    }

    fn emit_delta(&mut self, field: Field, decoded: String, out: &mut Vec<ParseEvent>) {
        if decoded.is_empty() {
            return;
        }
        match field {
            Field::Rationale => {
                self.rationale.push_str(&decoded);
                out.push(ParseEvent::RationaleDelta(decoded));
            }
            Field::Artifact => {
                self.artifact.push_str(&decoded);
                out.push(ParseEvent::ArtifactDelta(decoded));
            }
        }
    }
}

/// Drop a trailing partial occurrence of `marker` from `raw`.
fn trim_partial_marker<'a>(raw: &'a str, marker: &str) -> &'a str {
    let bytes = raw.as_bytes();
    let scan_from = raw.len().saturating_sub(marker.len() - 1);
    let mut i = raw.len();
    while i > scan_from {
        i -= 1;
        if bytes[i] == b'<' && marker.as_bytes().starts_with(&bytes[i..]) {
            return &raw[..i];
        }
    }
    raw
}

// ─────────────────────────────────────────────────────────────────────────────
// Escape decoding
// ─────────────────────────────────────────────────────────────────────────────

enum Escape {
    /// Sequence decoded to one char, consuming `usize` input bytes.
    Decoded(char, usize),
    /// Not a recognized escape — keep `usize` input bytes literally.
    Literal(usize),
    /// A consistent prefix of an escape; needs more input.
    Incomplete,
}

/// Decode JSON-style escapes in `input`, returning the decoded text and
/// the number of input bytes consumed.
///
/// An escape split at the end of `input` is held back (consumed stops
/// before its backslash) unless `eof`, in which case the raw remainder
/// is flushed literally. Lone surrogates decode to U+FFFD; unrecognized
/// escapes are kept as-is.
fn decode_escapes(input: &str, eof: bool) -> (String, usize) {
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'\\' {
            let start = i;
            while i < bytes.len() && bytes[i] != b'\\' {
                i += 1;
            }
            out.push_str(&input[start..i]);
            continue;
        }
        match classify_escape(&bytes[i..]) {
            Escape::Decoded(c, len) => {
                out.push(c);
                i += len;
            }
            Escape::Literal(len) => {
                out.push_str(&input[i..i + len]);
                i += len;
            }
            Escape::Incomplete => {
                if eof {
                    out.push_str(&input[i..]);
                    i = bytes.len();
                } else {
                    return (out, i);
                }
            }
        }
    }
    (out, input.len())
}

/// Classify the escape starting at `bytes[0] == b'\\'`.
fn classify_escape(bytes: &[u8]) -> Escape {
    if bytes.len() < 2 {
        return Escape::Incomplete;
    }
    match bytes[1] {
        b'n' => Escape::Decoded('\n', 2),
        b't' => Escape::Decoded('\t', 2),
        b'r' => Escape::Decoded('\r', 2),
        b'"' => Escape::Decoded('"', 2),
        b'\\' => Escape::Decoded('\\', 2),
        b'/' => Escape::Decoded('/', 2),
        b'b' => Escape::Decoded('\u{0008}', 2),
        b'f' => Escape::Decoded('\u{000C}', 2),
        b'u' => classify_unicode(bytes),
        _ => Escape::Literal(1),
    }
}

fn classify_unicode(bytes: &[u8]) -> Escape {
    match parse_hex4(&bytes[2..]) {
        Hex4::Short => Escape::Incomplete,
        Hex4::Invalid => Escape::Literal(1),
        Hex4::Value(code) => {
            if (0xD800..=0xDBFF).contains(&code) {
                classify_surrogate_pair(code, &bytes[6..])
            } else if (0xDC00..=0xDFFF).contains(&code) {
                // Lone low surrogate.
                Escape::Decoded('\u{FFFD}', 6)
            } else {
                Escape::Decoded(char::from_u32(u32::from(code)).unwrap_or('\u{FFFD}'), 6)
            }
        }
    }
}

/// A high surrogate must be followed by a `\uXXXX` low surrogate; the
/// pair decodes to one supplementary-plane char. Anything else decodes
/// the high half alone to U+FFFD.
fn classify_surrogate_pair(high: u16, rest: &[u8]) -> Escape {
    if rest.is_empty() {
        return Escape::Incomplete;
    }
    if rest[0] != b'\\' {
        return Escape::Decoded('\u{FFFD}', 6);
    }
    if rest.len() < 2 {
        return Escape::Incomplete;
    }
    if rest[1] != b'u' {
        return Escape::Decoded('\u{FFFD}', 6);
    }
    match parse_hex4(&rest[2..]) {
        Hex4::Short => Escape::Incomplete,
        Hex4::Invalid => Escape::Decoded('\u{FFFD}', 6),
        Hex4::Value(low) if (0xDC00..=0xDFFF).contains(&low) => {
            let combined =
                0x10000 + ((u32::from(high) - 0xD800) << 10) + (u32::from(low) - 0xDC00);
            Escape::Decoded(char::from_u32(combined).unwrap_or('\u{FFFD}'), 12)
        }
        Hex4::Value(_) => Escape::Decoded('\u{FFFD}', 6),
    }
}

enum Hex4 {
    Value(u16),
    Short,
    Invalid,
}

fn parse_hex4(bytes: &[u8]) -> Hex4 {
    let mut value: u16 = 0;
    for i in 0..4 {
        let Some(&b) = bytes.get(i) else {
            return Hex4::Short;
        };
        let Some(d) = hex_digit(b) else {
            return Hex4::Invalid;
        };
        value = (value << 4) | d;
    }
    Hex4::Value(value)
}

fn hex_digit(b: u8) -> Option<u16> {
    match b {
        b'0'..=b'9' => Some(u16::from(b - b'0')),
        b'a'..=b'f' => Some(u16::from(b - b'a' + 10)),
        b'A'..=b'F' => Some(u16::from(b - b'A' + 10)),
        _ => None,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

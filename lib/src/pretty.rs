// Copyright 2024 The Grove Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Rendering of parsed commits into the textual presentation formats.
//!
//! The printer works on the raw commit bytes retained by the store (see
//! `save_commit_buffer`), re-encoded to the requested output charset first.
//! It never fails: fields that cannot be derived render as `<unknown>` in
//! the user format and are simply omitted elsewhere.

use bstr::BString;
use bstr::ByteSlice as _;
use itertools::Itertools as _;
use thiserror::Error;

use crate::dates::DateStyle;
use crate::dates::show_date;
use crate::object_id::OBJECT_ID_HEX_LEN;
use crate::object_id::ObjectId as _;
use crate::rfc2047;
use crate::rfc2047::non_ascii;
use crate::store::CommitHandle;
use crate::store::Store;

/// Default abbreviation width for `%h`-style short ids.
pub const DEFAULT_ABBREV: usize = 7;

// Caller-assigned marker bits consulted by the `%m` escape; set by revision
// walkers, not by this crate.
pub const BOUNDARY: u32 = 1 << 5;
pub const SYMMETRIC_LEFT: u32 = 1 << 15;

/// A presentation format, selected by prefix match via
/// [`CommitFormat::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CommitFormat {
    Raw,
    #[default]
    Medium,
    Short,
    Email,
    Full,
    Fuller,
    Oneline,
    /// `format:<template>`; see the `%`-escape table in
    /// [`format_commit_message`].
    UserFormat(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid --pretty format: {0}")]
pub struct InvalidFormatError(pub String);

impl CommitFormat {
    /// Resolves a `--pretty` selector. A unique prefix of a format name is
    /// accepted; `format:<template>` selects the user format; an empty
    /// selector is the default format.
    pub fn parse(arg: &str) -> Result<Self, InvalidFormatError> {
        const FORMATS: &[(&str, usize, CommitFormat)] = &[
            ("raw", 1, CommitFormat::Raw),
            ("medium", 1, CommitFormat::Medium),
            ("short", 1, CommitFormat::Short),
            ("email", 1, CommitFormat::Email),
            ("full", 5, CommitFormat::Full),
            ("fuller", 5, CommitFormat::Fuller),
            ("oneline", 1, CommitFormat::Oneline),
        ];
        if arg.is_empty() {
            return Ok(Self::default());
        }
        let arg = arg.strip_prefix('=').unwrap_or(arg);
        if let Some(template) = arg.strip_prefix("format:") {
            return Ok(Self::UserFormat(template.to_string()));
        }
        for (name, min_len, format) in FORMATS {
            // An ambiguous prefix ("ful") satisfies neither arm.
            if name.starts_with(arg) && (arg.len() >= *min_len || arg == *name) {
                return Ok(format.clone());
            }
        }
        Err(InvalidFormatError(arg.to_string()))
    }
}

/// Options the caller threads through one rendering.
#[derive(Debug, Clone)]
pub struct PrettyOptions {
    pub format: CommitFormat,
    /// Abbreviation width for the `Merge:` line; 0 prints full ids.
    pub abbrev: usize,
    /// Style of the author (and `FULLER` committer) date line.
    pub date_style: DateStyle,
    /// Prefix for the title line, e.g. `Subject: [PATCH] `. When present the
    /// title is Q-encoded as needed.
    pub subject: Option<String>,
    /// Extra mail headers emitted after the subject; supplying a multipart
    /// header here suppresses the plain-text MIME preamble.
    pub after_subject: Option<String>,
    /// Output charset; falls back to the store's configured encoding, then
    /// UTF-8.
    pub output_encoding: Option<String>,
}

impl Default for PrettyOptions {
    fn default() -> Self {
        Self {
            format: CommitFormat::default(),
            abbrev: DEFAULT_ABBREV,
            date_style: DateStyle::Default,
            subject: None,
            after_subject: None,
            output_encoding: None,
        }
    }
}

/// Renders `commit` according to `options`.
///
/// Every format except `ONELINE` ends with exactly one newline; `ONELINE`
/// ends without one.
pub fn pretty_print_commit(store: &Store, commit: CommitHandle, options: &PrettyOptions) -> BString {
    if let CommitFormat::UserFormat(template) = &options.format {
        return format_commit_message(store, commit, template, options);
    }
    let raw = store.raw_buffer(commit).unwrap_or_default();
    let encoding = options
        .output_encoding
        .as_deref()
        .or(store.output_encoding())
        .unwrap_or("utf-8");
    let reencoded = reencode_bytes(store, raw, encoding);
    let msg: &[u8] = reencoded.as_deref().unwrap_or(raw);
    let format = &options.format;

    let indent = match format {
        CommitFormat::Oneline | CommitFormat::Email | CommitFormat::Raw => 0,
        _ => 4,
    };

    // A multipart header passed in `after_subject` takes over content-type
    // duties; otherwise a non-ASCII body needs the plain-text preamble.
    let plain_non_ascii = *format == CommitFormat::Email
        && options.after_subject.is_none()
        && body_has_non_ascii(msg);

    let mut out: Vec<u8> = Vec::new();
    let mut pos = 0;
    pp_header(store, commit, options, encoding, msg, &mut pos, &mut out);
    if *format != CommitFormat::Oneline && options.subject.is_none() {
        out.push(b'\n');
    }

    // Skip excess blank lines at the beginning of the body
    loop {
        let line = get_one_line(&msg[pos..]);
        if line.is_empty() || !trim_line(line).is_empty() {
            break;
        }
        pos += line.len();
    }

    if matches!(format, CommitFormat::Oneline | CommitFormat::Email) {
        pp_title_line(options, encoding, plain_non_ascii, msg, &mut pos, &mut out);
    }

    let beginning_of_body = out.len();
    if *format != CommitFormat::Oneline {
        pp_remainder(format, indent, msg, &mut pos, &mut out);
    }
    while out.last().is_some_and(u8::is_ascii_whitespace) {
        out.pop();
    }
    if *format != CommitFormat::Oneline {
        out.push(b'\n');
    }
    // The caller may append more body text in e-mail format; do not let the
    // trim above swallow the blank line between header and body.
    if *format == CommitFormat::Email && out.len() <= beginning_of_body {
        out.push(b'\n');
    }
    BString::from(out)
}

/// One line of `msg` including its `\n`, or everything up to the end of the
/// buffer; empty only at the end of the buffer.
fn get_one_line(msg: &[u8]) -> &[u8] {
    match msg.find_byte(b'\n') {
        Some(pos) => &msg[..=pos],
        None => msg,
    }
}

fn trim_line(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |pos| pos + 1);
    &line[..end]
}

fn body_has_non_ascii(msg: &[u8]) -> bool {
    match msg.find(b"\n\n") {
        Some(pos) => msg[pos + 2..].iter().any(|&b| non_ascii(b)),
        None => false,
    }
}

fn pp_header(
    store: &Store,
    commit: CommitHandle,
    options: &PrettyOptions,
    encoding: &str,
    msg: &[u8],
    pos: &mut usize,
    out: &mut Vec<u8>,
) {
    let format = &options.format;
    let mut parents_shown = false;
    loop {
        let line = get_one_line(&msg[*pos..]);
        if line.is_empty() {
            return;
        }
        *pos += line.len();
        if line == b"\n" {
            // End of header
            return;
        }
        if *format == CommitFormat::Raw {
            out.extend_from_slice(line);
            continue;
        }
        if line.starts_with(b"parent ") {
            // Individual parent lines are summarized by the Merge: line
            continue;
        }
        if !parents_shown {
            add_merge_info(store, commit, options, out);
            parents_shown = true;
        }
        // MEDIUM shows only the author with dates, FULL both identities
        // without dates, FULLER both identities and dates.
        if let Some(person) = line.strip_prefix(b"author ") {
            add_user_info("Author", options, encoding, trim_newline(person), out);
        }
        if let Some(person) = line.strip_prefix(b"committer ") {
            if matches!(format, CommitFormat::Full | CommitFormat::Fuller) {
                add_user_info("Commit", options, encoding, trim_newline(person), out);
            }
        }
    }
}

fn trim_newline(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\n").unwrap_or(line)
}

fn add_merge_info(store: &Store, commit: CommitHandle, options: &PrettyOptions, out: &mut Vec<u8>) {
    if matches!(options.format, CommitFormat::Oneline | CommitFormat::Email) {
        return;
    }
    let parents = store.parents(commit);
    if parents.len() < 2 {
        return;
    }
    out.extend_from_slice(b"Merge:");
    for &parent in parents {
        let id = store.id(parent);
        let hex = if options.abbrev > 0 {
            store.abbreviate(id.as_bytes(), options.abbrev)
        } else {
            id.hex()
        };
        let dots = if options.abbrev > 0 && hex.len() != OBJECT_ID_HEX_LEN {
            "..."
        } else {
            ""
        };
        out.extend_from_slice(format!(" {hex}{dots}").as_bytes());
    }
    out.push(b'\n');
}

/// Renders one `name <email> epoch tz` identity line plus its date line per
/// the format matrix.
fn add_user_info(
    what: &str,
    options: &PrettyOptions,
    encoding: &str,
    line: &[u8],
    out: &mut Vec<u8>,
) {
    let format = &options.format;
    if *format == CommitFormat::Oneline {
        return;
    }
    let Some(gt) = line.find_byte(b'>') else {
        return;
    };
    let (epoch, tz) = parse_epoch_tz(&line[gt + 1..]);

    if *format == CommitFormat::Email {
        let Some(lt) = line.find_byte(b'<') else {
            return;
        };
        let mut name_end = lt;
        while name_end > 0 && line[name_end - 1].is_ascii_whitespace() {
            name_end -= 1;
        }
        out.extend_from_slice(b"From: ");
        rfc2047::append(out, &line[..name_end], encoding);
        out.extend_from_slice(&line[name_end..=gt]);
        out.push(b'\n');
    } else {
        let filler = if *format == CommitFormat::Fuller {
            "    "
        } else {
            ""
        };
        out.extend_from_slice(format!("{what}: {filler}").as_bytes());
        out.extend_from_slice(&line[..=gt]);
        out.push(b'\n');
    }
    match format {
        CommitFormat::Medium => {
            let date = show_date(epoch, tz, options.date_style);
            out.extend_from_slice(format!("Date:   {date}\n").as_bytes());
        }
        CommitFormat::Email => {
            let date = show_date(epoch, tz, DateStyle::Rfc2822);
            out.extend_from_slice(format!("Date: {date}\n").as_bytes());
        }
        CommitFormat::Fuller => {
            let date = show_date(epoch, tz, options.date_style);
            out.extend_from_slice(format!("{what}Date: {date}\n").as_bytes());
        }
        _ => {}
    }
}

/// Parses `" epoch tz"` following the `>` of an identity line.
fn parse_epoch_tz(bytes: &[u8]) -> (u64, i32) {
    let mut rest = bytes;
    while let Some((&first, tail)) = rest.split_first() {
        if !first.is_ascii_whitespace() {
            break;
        }
        rest = tail;
    }
    let digits = rest.iter().take_while(|b| b.is_ascii_digit()).count();
    let epoch = crate::commit::parse_decimal(&rest[..digits]);
    (epoch, parse_tz(&rest[digits..]))
}

fn parse_tz(bytes: &[u8]) -> i32 {
    let mut rest = bytes;
    while let Some((&first, tail)) = rest.split_first() {
        if !first.is_ascii_whitespace() {
            break;
        }
        rest = tail;
    }
    let negative = match rest.first() {
        Some(b'-') => {
            rest = &rest[1..];
            true
        }
        Some(b'+') => {
            rest = &rest[1..];
            false
        }
        _ => false,
    };
    let digits = rest.iter().take_while(|b| b.is_ascii_digit()).count();
    let magnitude = i32::try_from(crate::commit::parse_decimal(&rest[..digits])).unwrap_or(0);
    if negative { -magnitude } else { magnitude }
}

/// Joins the consecutive non-empty lines at the head of the body into the
/// title, Q-encoding it behind a caller-supplied subject prefix.
fn pp_title_line(
    options: &PrettyOptions,
    encoding: &str,
    plain_non_ascii: bool,
    msg: &[u8],
    pos: &mut usize,
    out: &mut Vec<u8>,
) {
    let email = options.format == CommitFormat::Email;
    let mut title: Vec<u8> = Vec::new();
    loop {
        let line = get_one_line(&msg[*pos..]);
        *pos += line.len();
        let trimmed = trim_line(line);
        if line.is_empty() || trimmed.is_empty() {
            break;
        }
        if !title.is_empty() {
            if email {
                title.push(b'\n');
            }
            title.push(b' ');
        }
        title.extend_from_slice(trimmed);
    }

    if let Some(subject) = &options.subject {
        out.extend_from_slice(subject.as_bytes());
        rfc2047::append(out, &title, encoding);
    } else {
        out.extend_from_slice(&title);
    }
    out.push(b'\n');

    if plain_non_ascii {
        out.extend_from_slice(
            format!(
                "MIME-Version: 1.0\n\
                 Content-Type: text/plain; charset={encoding}\n\
                 Content-Transfer-Encoding: 8bit\n"
            )
            .as_bytes(),
        );
    }
    if let Some(after_subject) = &options.after_subject {
        out.extend_from_slice(after_subject.as_bytes());
    }
    if email {
        out.push(b'\n');
    }
}

fn pp_remainder(
    format: &CommitFormat,
    indent: usize,
    msg: &[u8],
    pos: &mut usize,
    out: &mut Vec<u8>,
) {
    let mut first = true;
    loop {
        let line = get_one_line(&msg[*pos..]);
        *pos += line.len();
        if line.is_empty() {
            break;
        }
        let trimmed = trim_line(line);
        if trimmed.is_empty() {
            if first {
                continue;
            }
            if *format == CommitFormat::Short {
                break;
            }
        }
        first = false;
        out.extend_from_slice(&b" ".repeat(indent));
        out.extend_from_slice(trimmed);
        out.push(b'\n');
    }
}

// Log message re-encoding

fn is_encoding_utf8(name: &str) -> bool {
    name.eq_ignore_ascii_case("utf-8") || name.eq_ignore_ascii_case("utf8")
}

/// Finds a `<key> <value>` header line in the commit buffer.
fn get_header<'a>(buffer: &'a [u8], key: &str) -> Option<&'a [u8]> {
    let mut rest = buffer;
    while !rest.is_empty() {
        let line = get_one_line(rest);
        rest = &rest[line.len()..];
        let line = trim_newline(line);
        if line.is_empty() {
            return None;
        }
        if let Some(value) = line.strip_prefix(key.as_bytes()) {
            if let Some(value) = value.strip_prefix(b" ") {
                return Some(value);
            }
        }
    }
    None
}

/// Re-encodes the commit's raw buffer to `output_encoding` and rewrites (or
/// drops, for UTF-8) the `encoding` header accordingly. Returns the buffer
/// unchanged as `None` when nothing needs doing, and `None` as well when the
/// backend cannot transcode between the two charsets.
pub fn logmsg_reencode(
    store: &Store,
    commit: CommitHandle,
    output_encoding: &str,
) -> Option<BString> {
    let raw = store.raw_buffer(commit)?;
    reencode_bytes(store, raw, output_encoding).map(BString::from)
}

fn reencode_bytes(store: &Store, buffer: &[u8], output_encoding: &str) -> Option<Vec<u8>> {
    if output_encoding.is_empty() {
        return None;
    }
    let declared = get_header(buffer, "encoding").map(|value| value.to_str_lossy().into_owned());
    let use_encoding = declared.as_deref().unwrap_or("utf-8");
    let out = if use_encoding == output_encoding {
        if declared.is_none() {
            // Nothing to transcode and no header to strip
            return None;
        }
        Some(buffer.to_vec())
    } else {
        store.backend().transcode(buffer, use_encoding, output_encoding)
    };
    out.map(|buffer| replace_encoding_header(buffer, output_encoding))
}

/// Rewrites the in-memory `encoding` header to the new charset, or deletes
/// it when the new charset is UTF-8.
fn replace_encoding_header(mut buffer: Vec<u8>, encoding: &str) -> Vec<u8> {
    let header_end = buffer.find(b"\n\n").unwrap_or(buffer.len());
    let Some(pos) = buffer.find(b"\nencoding ") else {
        return buffer;
    };
    if pos >= header_end {
        return buffer;
    }
    let line_start = pos + 1;
    let Some(line_len) = buffer[line_start..].find_byte(b'\n') else {
        return buffer;
    };
    let line_end = line_start + line_len + 1;
    if is_encoding_utf8(encoding) {
        // Re-coded to UTF-8; drop the header
        buffer.drain(line_start..line_end);
    } else {
        let replacement = format!("encoding {encoding}\n");
        buffer.splice(line_start..line_end, replacement.into_bytes());
    }
    buffer
}

// User-defined format

/// Fields of an identity line as the user format sees them.
#[derive(Default)]
struct Person {
    name: Option<Vec<u8>>,
    email: Option<Vec<u8>>,
    date: Option<(u64, i32)>,
    /// The raw epoch digits, for `%at`/`%ct`.
    timestamp: Option<Vec<u8>>,
}

impl Person {
    /// Parses `name <email> epoch tz`. Fields are filled left to right and
    /// whatever cannot be derived stays unset.
    fn parse(line: &[u8]) -> Self {
        let mut person = Self::default();
        let Some(lt) = line.find_byte(b'<') else {
            person.name = Some(trim_line(line).to_vec());
            return person;
        };
        person.name = Some(trim_line(&line[..lt]).to_vec());
        let rest = &line[lt + 1..];
        let Some(gt) = rest.find_byte(b'>') else {
            return person;
        };
        person.email = Some(rest[..gt].to_vec());
        let rest = &rest[gt + 1..];
        let skipped = rest
            .iter()
            .take_while(|b| b.is_ascii_whitespace())
            .count();
        let digits = rest[skipped..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count();
        if digits == 0 {
            return person;
        }
        let timestamp = &rest[skipped..skipped + digits];
        let epoch = crate::commit::parse_decimal(timestamp);
        let tz = parse_tz(&rest[skipped + digits..]);
        person.timestamp = Some(timestamp.to_vec());
        person.date = Some((epoch, tz));
        person
    }

    fn dates(&self, style: DateStyle) -> [Option<Vec<u8>>; 4] {
        let Some((epoch, tz)) = self.date else {
            return [None, None, None, None];
        };
        [
            Some(show_date(epoch, tz, style).into_bytes()),
            Some(show_date(epoch, tz, DateStyle::Rfc2822).into_bytes()),
            Some(show_date(epoch, tz, DateStyle::Relative).into_bytes()),
            Some(show_date(epoch, tz, DateStyle::Iso8601).into_bytes()),
        ]
    }
}

/// Splits the raw buffer into headers of interest, subject, and body.
struct MessageParts {
    author: Person,
    committer: Person,
    encoding: Option<Vec<u8>>,
    subject: Option<Vec<u8>>,
    body: Option<Vec<u8>>,
}

fn split_message(buffer: &[u8]) -> MessageParts {
    let mut parts = MessageParts {
        author: Person::default(),
        committer: Person::default(),
        encoding: None,
        subject: None,
        body: None,
    };
    let mut rest = buffer;
    // Headers
    while !rest.is_empty() {
        let line = get_one_line(rest);
        rest = &rest[line.len()..];
        let line = trim_newline(line);
        if line.is_empty() {
            break;
        }
        if let Some(value) = line.strip_prefix(b"author ") {
            parts.author = Person::parse(value);
        } else if let Some(value) = line.strip_prefix(b"committer ") {
            parts.committer = Person::parse(value);
        } else if let Some(value) = line.strip_prefix(b"encoding ") {
            parts.encoding = Some(value.to_vec());
        }
    }
    // Subject: the first paragraph, collapsed to one line
    let mut subject: Vec<u8> = Vec::new();
    loop {
        let line = get_one_line(rest);
        rest = &rest[line.len()..];
        let trimmed = trim_line(line);
        if trimmed.is_empty() {
            if line.is_empty() || !subject.is_empty() {
                break;
            }
            continue; // leading blank lines
        }
        if !subject.is_empty() {
            subject.push(b' ');
        }
        subject.extend_from_slice(trimmed);
    }
    if !subject.is_empty() {
        parts.subject = Some(subject);
    }
    // Body: everything after the subject paragraph and its trailing blanks
    while !rest.is_empty() {
        let line = get_one_line(rest);
        if !trim_line(line).is_empty() {
            break;
        }
        rest = &rest[line.len()..];
    }
    if !rest.is_empty() {
        parts.body = Some(rest.to_vec());
    }
    parts
}

/// Expands a `format:` template:
///
/// | escape | value |
/// |--------|-------|
/// | `%H` / `%h` | full / abbreviated commit id |
/// | `%T` / `%t` | full / abbreviated tree id |
/// | `%P` / `%p` | space-joined full / abbreviated parent ids |
/// | `%an %ae %ad %aD %ar %at %ai` | author name, email, date (chosen style, RFC 2822, relative, epoch, ISO 8601) |
/// | `%cn %ce %cd %cD %cr %ct %ci` | committer, likewise |
/// | `%e` | declared encoding |
/// | `%s` / `%b` | subject / body |
/// | `%Cred %Cgreen %Cblue %Creset` | ANSI colors |
/// | `%n` | newline |
/// | `%m` | boundary / left-right mark from caller flags |
///
/// Fields that cannot be derived render as `<unknown>`; unrecognized escapes
/// pass through verbatim.
pub fn format_commit_message(
    store: &Store,
    commit: CommitHandle,
    template: &str,
    options: &PrettyOptions,
) -> BString {
    const UNKNOWN: &[u8] = b"<unknown>";
    let raw = store.raw_buffer(commit).unwrap_or_default();
    let parts = split_message(raw);
    let id = store.id(commit);
    let parents = store.parents(commit);
    let full = |value: Option<Vec<u8>>| value.unwrap_or_else(|| UNKNOWN.to_vec());

    let [author_date, author_rfc2822, author_relative, author_iso] =
        parts.author.dates(options.date_style);
    let [committer_date, committer_rfc2822, committer_relative, committer_iso] =
        parts.committer.dates(options.date_style);
    let mark = if store.flags(commit) & BOUNDARY != 0 {
        "-"
    } else if store.flags(commit) & SYMMETRIC_LEFT != 0 {
        "<"
    } else {
        ">"
    };

    // Longest keys first so that %Cred is not read as an unknown %C.
    let table: Vec<(&str, Vec<u8>)> = vec![
        ("Cgreen", b"\x1b[32m".to_vec()),
        ("Creset", b"\x1b[m".to_vec()),
        ("Cblue", b"\x1b[34m".to_vec()),
        ("Cred", b"\x1b[31m".to_vec()),
        ("an", full(parts.author.name)),
        ("ae", full(parts.author.email)),
        ("ad", full(author_date)),
        ("aD", full(author_rfc2822)),
        ("ar", full(author_relative)),
        ("at", full(parts.author.timestamp)),
        ("ai", full(author_iso)),
        ("cn", full(parts.committer.name)),
        ("ce", full(parts.committer.email)),
        ("cd", full(committer_date)),
        ("cD", full(committer_rfc2822)),
        ("cr", full(committer_relative)),
        ("ct", full(parts.committer.timestamp)),
        ("ci", full(committer_iso)),
        ("H", id.hex().into_bytes()),
        (
            "h",
            store.abbreviate(id.as_bytes(), DEFAULT_ABBREV).into_bytes(),
        ),
        (
            "T",
            full(store.tree(commit).map(|tree| tree.hex().into_bytes())),
        ),
        (
            "t",
            full(store
                .tree(commit)
                .map(|tree| store.abbreviate(tree.as_bytes(), DEFAULT_ABBREV).into_bytes())),
        ),
        (
            "P",
            parents
                .iter()
                .map(|&parent| store.id(parent).hex())
                .join(" ")
                .into_bytes(),
        ),
        (
            "p",
            parents
                .iter()
                .map(|&parent| store.abbreviate(store.id(parent).as_bytes(), DEFAULT_ABBREV))
                .join(" ")
                .into_bytes(),
        ),
        ("e", full(parts.encoding)),
        ("s", full(parts.subject)),
        ("b", full(parts.body)),
        ("n", b"\n".to_vec()),
        ("m", mark.as_bytes().to_vec()),
    ];

    let mut out: Vec<u8> = Vec::new();
    let bytes = template.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'%' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        let rest = &bytes[i + 1..];
        match table
            .iter()
            .find(|(key, _)| rest.starts_with(key.as_bytes()))
        {
            Some((key, value)) => {
                out.extend_from_slice(value);
                i += 1 + key.len();
            }
            None => {
                // Unknown escapes pass through verbatim
                out.push(b'%');
                i += 1;
            }
        }
    }
    BString::from(out)
}

#[cfg(test)]
mod tests {
    use bstr::ByteSlice as _;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::object_id::ObjectId as _;
    use crate::tests::GraphBuilder;
    use crate::tests::commit_buffer;
    use crate::tests::commit_id;
    use crate::tests::tree_id;

    const EPOCH: u64 = 1112911993; // Thu Apr 7 15:13:13 2005 -0700

    fn options(format: CommitFormat) -> PrettyOptions {
        PrettyOptions {
            format,
            ..PrettyOptions::default()
        }
    }

    /// A store holding one commit (id byte 1) with the given buffer.
    fn store_with_commit(buffer: Vec<u8>) -> (Store, CommitHandle) {
        let mut graph = GraphBuilder::new();
        graph.commit_raw(1, buffer);
        let mut store = graph.store();
        let handle = store.lookup(&commit_id(1));
        store.parse_commit(handle).unwrap();
        (store, handle)
    }

    fn person_buffer(message: &str) -> Vec<u8> {
        format!(
            "tree {tree}\n\
             author A U Thor <author@example.com> {EPOCH} -0700\n\
             committer C O Mitter <committer@example.com> {EPOCH} -0700\n\
             \n\
             {message}",
            tree = tree_id(0x11).hex(),
        )
        .into_bytes()
    }

    #[test]
    fn test_format_selector() {
        assert_eq!(CommitFormat::parse(""), Ok(CommitFormat::Medium));
        assert_eq!(CommitFormat::parse("m"), Ok(CommitFormat::Medium));
        assert_eq!(CommitFormat::parse("=oneline"), Ok(CommitFormat::Oneline));
        assert_eq!(CommitFormat::parse("r"), Ok(CommitFormat::Raw));
        assert_eq!(CommitFormat::parse("full"), Ok(CommitFormat::Full));
        assert_eq!(CommitFormat::parse("fulle"), Ok(CommitFormat::Fuller));
        assert_eq!(CommitFormat::parse("fuller"), Ok(CommitFormat::Fuller));
        assert_eq!(
            CommitFormat::parse("format:%h"),
            Ok(CommitFormat::UserFormat("%h".to_string()))
        );
        // Ambiguous and unknown selectors are fatal
        assert_eq!(
            CommitFormat::parse("ful"),
            Err(InvalidFormatError("ful".to_string()))
        );
        assert_eq!(
            CommitFormat::parse("bogus"),
            Err(InvalidFormatError("bogus".to_string()))
        );
    }

    #[test]
    fn test_oneline() {
        let (store, commit) = store_with_commit(person_buffer("Fix bug\n\nDetails\n"));
        let out = pretty_print_commit(&store, commit, &options(CommitFormat::Oneline));
        assert_eq!(out, "Fix bug");
    }

    #[test]
    fn test_oneline_joins_title_lines() {
        let (store, commit) = store_with_commit(person_buffer("Fix bug\nin two lines\n\nBody\n"));
        let out = pretty_print_commit(&store, commit, &options(CommitFormat::Oneline));
        assert_eq!(out, "Fix bug in two lines");
    }

    #[test]
    fn test_medium() {
        let (store, commit) = store_with_commit(person_buffer("Fix bug\n\nDetails here\n"));
        let out = pretty_print_commit(&store, commit, &options(CommitFormat::Medium));
        // Blank body lines carry the indent too
        assert_eq!(
            out,
            concat!(
                "Author: A U Thor <author@example.com>\n",
                "Date:   Thu Apr 7 15:13:13 2005 -0700\n",
                "\n",
                "    Fix bug\n",
                "    \n",
                "    Details here\n",
            )
        );
    }

    #[test]
    fn test_short_stops_at_first_paragraph() {
        let (store, commit) = store_with_commit(person_buffer("Fix bug\n\nDetails here\n"));
        let out = pretty_print_commit(&store, commit, &options(CommitFormat::Short));
        assert_eq!(
            out,
            indoc! {"
                Author: A U Thor <author@example.com>

                    Fix bug
            "}
        );
    }

    #[test]
    fn test_full_and_fuller() {
        let (store, commit) = store_with_commit(person_buffer("Fix bug\n"));
        let out = pretty_print_commit(&store, commit, &options(CommitFormat::Full));
        assert_eq!(
            out,
            indoc! {"
                Author: A U Thor <author@example.com>
                Commit: C O Mitter <committer@example.com>

                    Fix bug
            "}
        );

        let out = pretty_print_commit(&store, commit, &options(CommitFormat::Fuller));
        assert_eq!(
            out,
            indoc! {"
                Author:     A U Thor <author@example.com>
                AuthorDate: Thu Apr 7 15:13:13 2005 -0700
                Commit:     C O Mitter <committer@example.com>
                CommitDate: Thu Apr 7 15:13:13 2005 -0700

                    Fix bug
            "}
        );
    }

    #[test]
    fn test_raw_is_verbatim_headers() {
        let mut graph = GraphBuilder::new();
        graph.commit(2, &[], 100);
        let parent = commit_id(2);
        let buffer = commit_buffer(&tree_id(0x11), &[parent.clone()], 100, "Fix bug\n\nBody\n");
        graph.commit_raw(1, buffer.clone());
        let mut store = graph.store();
        let commit = store.lookup(&commit_id(1));
        store.parse_commit(commit).unwrap();

        let out = pretty_print_commit(&store, commit, &options(CommitFormat::Raw));
        let headers_len = buffer.find(b"\n\n").unwrap() + 1;
        let expected = format!(
            "{}\nFix bug\n\nBody\n",
            std::str::from_utf8(&buffer[..headers_len]).unwrap()
        );
        assert_eq!(out, expected.as_bytes());
    }

    #[test]
    fn test_merge_line() {
        let mut graph = GraphBuilder::new();
        graph.commit(2, &[], 100);
        graph.commit(3, &[], 150);
        let buffer = commit_buffer(
            &tree_id(0x11),
            &[commit_id(2), commit_id(3)],
            200,
            "Merge it\n",
        );
        graph.commit_raw(1, buffer);
        let mut store = graph.store();
        let commit = store.lookup(&commit_id(1));
        store.parse_commit(commit).unwrap();

        let out = pretty_print_commit(&store, commit, &options(CommitFormat::Medium));
        let text = out.to_string();
        let first_line = text.lines().next().unwrap();
        // Abbreviated parents with the ellipsis marker
        assert_eq!(
            first_line,
            format!(
                "Merge: {}... {}...",
                &commit_id(2).hex()[..7],
                &commit_id(3).hex()[..7]
            )
        );
    }

    #[test]
    fn test_email_with_non_ascii_author() {
        let buffer = format!(
            "tree {tree}\n\
             author Zo\u{eb} <zoe@example.com> {EPOCH} -0700\n\
             committer C O Mitter <committer@example.com> {EPOCH} -0700\n\
             \n\
             Fix caf\u{e9}\n\
             \n\
             More caf\u{e9} details\n",
            tree = tree_id(0x11).hex(),
        )
        .into_bytes();
        let (store, commit) = store_with_commit(buffer);
        let out = pretty_print_commit(&store, commit, &options(CommitFormat::Email));
        let text = out.to_string();
        assert!(
            text.starts_with("From: =?utf-8?q?Zo=C3=AB?= <zoe@example.com>\n"),
            "got: {text}"
        );
        assert!(text.contains("Date: Thu, 7 Apr 2005 15:13:13 -0700\n"));
        assert!(text.contains("MIME-Version: 1.0\n"));
        assert!(text.contains("Content-Type: text/plain; charset=utf-8\n"));
        assert!(text.contains("Content-Transfer-Encoding: 8bit\n"));
        // Email bodies are unindented
        assert!(text.ends_with("\nMore caf\u{e9} details\n"));
    }

    #[test]
    fn test_email_ascii_has_no_mime_preamble() {
        let (store, commit) = store_with_commit(person_buffer("Fix bug\n\nDetails\n"));
        let out = pretty_print_commit(&store, commit, &options(CommitFormat::Email));
        let text = out.to_string();
        assert!(text.starts_with("From: A U Thor <author@example.com>\n"));
        assert!(!text.contains("MIME-Version"));
    }

    #[test]
    fn test_email_subject_prefix_is_q_encoded() {
        let (store, commit) = store_with_commit(person_buffer("Fix caf\u{e9}\n"));
        let mut opts = options(CommitFormat::Email);
        opts.subject = Some("Subject: [PATCH] ".to_string());
        let out = pretty_print_commit(&store, commit, &opts);
        assert!(
            out.to_string()
                .contains("Subject: [PATCH] =?utf-8?q?Fix=20caf=C3=A9?=\n"),
            "got: {out}"
        );
    }

    #[test]
    fn test_email_multipart_header_suppresses_preamble() {
        let (store, commit) = store_with_commit(person_buffer("Fix caf\u{e9}\n\ncaf\u{e9}\n"));
        let mut opts = options(CommitFormat::Email);
        opts.after_subject = Some("Content-Type: multipart/mixed; boundary=x\n".to_string());
        let out = pretty_print_commit(&store, commit, &opts);
        let text = out.to_string();
        assert!(text.contains("Content-Type: multipart/mixed; boundary=x\n"));
        assert!(!text.contains("MIME-Version"));
    }

    #[test]
    fn test_email_empty_body_keeps_separator() {
        let (store, commit) = store_with_commit(person_buffer("Fix bug\n"));
        let out = pretty_print_commit(&store, commit, &options(CommitFormat::Email));
        // Header block, blank, title, blank separator for appended body text
        assert!(out.to_string().ends_with("Fix bug\n\n"), "got: {out}");
    }

    #[test]
    fn test_reencode_to_utf8_drops_header() {
        // Author and message in latin-1
        let mut buffer = format!("tree {}\n", tree_id(0x11).hex()).into_bytes();
        buffer.extend_from_slice(b"author Zo\xeb <zoe@example.com> 1112911993 -0700\n");
        buffer.extend_from_slice(b"committer C O Mitter <committer@example.com> 1112911993 -0700\n");
        buffer.extend_from_slice(b"encoding iso-8859-1\n");
        buffer.extend_from_slice(b"\ncaf\xe9\n");
        let (store, commit) = store_with_commit(buffer);
        let out = logmsg_reencode(&store, commit, "utf-8").unwrap();
        assert!(!out.contains_str("encoding "));
        assert!(out.contains_str("Zo\u{eb}".as_bytes()));
        assert!(out.contains_str("caf\u{e9}".as_bytes()));
    }

    #[test]
    fn test_reencode_to_other_charset_rewrites_header() {
        let buffer = format!(
            "tree {tree}\n\
             author A U Thor <author@example.com> {EPOCH} -0700\n\
             committer C O Mitter <committer@example.com> {EPOCH} -0700\n\
             encoding utf-8\n\
             \n\
             caf\u{e9}\n",
            tree = tree_id(0x11).hex(),
        );
        let (store, commit) = store_with_commit(buffer.into_bytes());
        let out = logmsg_reencode(&store, commit, "iso-8859-1").unwrap();
        assert!(out.contains_str(b"encoding iso-8859-1\n"));
        assert!(!out.contains_str(b"encoding utf-8"));
        assert!(out.contains_str(b"caf\xe9"));
    }

    #[test]
    fn test_reencode_same_charset_is_noop() {
        let (store, commit) = store_with_commit(person_buffer("Fix bug\n"));
        assert_eq!(logmsg_reencode(&store, commit, "utf-8"), None);
    }

    #[test]
    fn test_user_format_abbrev_and_subject() {
        let (store, commit) = store_with_commit(person_buffer("Init\n\nBody text\n"));
        let opts = options(CommitFormat::UserFormat("%h %s".to_string()));
        let out = pretty_print_commit(&store, commit, &opts);
        let expected = format!("{} Init", &commit_id(1).hex()[..7]);
        assert_eq!(out, expected.as_bytes());
    }

    #[test]
    fn test_user_format_fields() {
        let mut graph = GraphBuilder::new();
        graph.commit(2, &[], 100);
        let buffer = commit_buffer(&tree_id(0x11), &[commit_id(2)], EPOCH, "Subject\n\nBody\n");
        graph.commit_raw(1, buffer);
        let mut store = graph.store();
        let commit = store.lookup(&commit_id(1));
        store.parse_commit(commit).unwrap();

        let render = |template: &str| {
            let opts = options(CommitFormat::UserFormat(template.to_string()));
            pretty_print_commit(&store, commit, &opts).to_string()
        };
        assert_eq!(render("%H"), commit_id(1).hex());
        assert_eq!(render("%T"), tree_id(0x11).hex());
        assert_eq!(render("%P"), commit_id(2).hex());
        assert_eq!(render("%an <%ae>"), "A U Thor <author@example.com>");
        assert_eq!(render("%cn"), "C O Mitter");
        assert_eq!(render("%at"), EPOCH.to_string());
        assert_eq!(render("%aD"), "Thu, 7 Apr 2005 22:13:13 +0000");
        assert_eq!(render("%ai"), "2005-04-07 22:13:13 +0000");
        assert_eq!(render("%s%n%b"), "Subject\nBody\n");
        assert_eq!(render("%Cred!%Creset"), "\x1b[31m!\x1b[m");
        assert_eq!(render("%m"), ">");
        // Missing field and unknown escapes
        assert_eq!(render("%e"), "<unknown>");
        assert_eq!(render("100%"), "100%");
        assert_eq!(render("%x %q"), "%x %q");
    }

    #[test]
    fn test_user_format_mark_flags() {
        let (mut store, commit) = store_with_commit(person_buffer("Subject\n"));
        let render = |store: &Store| {
            let opts = options(CommitFormat::UserFormat("%m".to_string()));
            pretty_print_commit(store, commit, &opts).to_string()
        };
        assert_eq!(render(&store), ">");
        store.add_flags(commit, SYMMETRIC_LEFT);
        assert_eq!(render(&store), "<");
        store.add_flags(commit, BOUNDARY);
        assert_eq!(render(&store), "-");
    }

    #[test]
    fn test_user_format_parents_of_root_render_empty() {
        let (store, commit) = store_with_commit(person_buffer("Subject\n"));
        let opts = options(CommitFormat::UserFormat("[%P][%p]".to_string()));
        let out = pretty_print_commit(&store, commit, &opts);
        assert_eq!(out, "[][]");
    }
}

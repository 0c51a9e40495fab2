//! Log Parser (spec §4.E): incremental tail of a text log, driven by an
//! ordered list of mandatory/optional regex patterns.

use std::fs::File;
use std::io;
use std::os::unix::fs::FileExt;
use std::path::PathBuf;

use regex::Regex;
use snafu::ResultExt;

use crate::config::{ParserSpec, PatternSpec};
use crate::error::{Error, PatternSnafu};

/// One captured field of a completed message, in pattern order.
pub type LogRecord = Vec<(String, String)>;

struct Pattern {
    name: String,
    regex: Regex,
    submatch_idx: usize,
    excluderegex: Option<Regex>,
    is_mandatory: bool,
}

impl Pattern {
    fn compile(spec: &PatternSpec) -> Result<Self, Error> {
        let regex = Regex::new(&spec.regex).context(PatternSnafu {
            name: spec.name.clone(),
        })?;
        let excluderegex = spec
            .excluderegex
            .as_deref()
            .map(Regex::new)
            .transpose()
            .context(PatternSnafu {
                name: spec.name.clone(),
            })?;
        Ok(Self {
            name: spec.name.clone(),
            regex,
            submatch_idx: spec.submatch_idx,
            excluderegex,
            is_mandatory: spec.is_mandatory,
        })
    }

    /// `None` if the line doesn't match, the excluderegex vetoes it, or the
    /// requested submatch group is absent.
    fn try_match(&self, line: &str) -> Option<String> {
        if let Some(exclude) = &self.excluderegex {
            if exclude.is_match(line) {
                return None;
            }
        }
        self.regex
            .captures(line)?
            .get(self.submatch_idx)
            .map(|m| m.as_str().to_string())
    }
}

/// A compiled, named, ordered pattern list.
pub struct Parser {
    pub name: String,
    patterns: Vec<Pattern>,
    anchor_idx: usize,
}

impl Parser {
    pub fn compile(spec: &ParserSpec) -> Result<Self, Error> {
        let patterns: Result<Vec<Pattern>, Error> =
            spec.patterns.iter().map(Pattern::compile).collect();
        let patterns = patterns?;
        let anchor_idx = patterns.len().saturating_sub(1);
        Ok(Self {
            name: spec.name.clone(),
            patterns,
            anchor_idx,
        })
    }
}

/// In-progress message: one slot per pattern, filled as matching lines
/// arrive, in any order relative to the pattern list.
struct Partial {
    values: Vec<Option<String>>,
}

impl Partial {
    fn new(len: usize) -> Self {
        Self {
            values: vec![None; len],
        }
    }

    fn is_mandatory_complete(&self, parser: &Parser) -> bool {
        parser
            .patterns
            .iter()
            .zip(&self.values)
            .all(|(p, v)| !p.is_mandatory || v.is_some())
    }

    fn into_record(self, parser: &Parser) -> LogRecord {
        parser
            .patterns
            .iter()
            .zip(self.values)
            .map(|(p, v)| (p.name.clone(), v.unwrap_or_default()))
            .collect()
    }
}

/// A parser job: the opaque handle of spec §3, wrapping a log path, a file
/// offset, the compiled patterns, and the anchor index.
pub struct ParserJob {
    log_path: PathBuf,
    parser: Parser,
    first_full_read: bool,
    started: bool,
    offset: u64,
    carry: Vec<u8>,
    current: Option<Partial>,
}

impl ParserJob {
    pub fn new(log_path: PathBuf, parser: Parser, first_full_read: bool) -> Self {
        Self {
            log_path,
            parser,
            first_full_read,
            started: false,
            offset: 0,
            carry: Vec::new(),
            current: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.parser.name
    }

    /// Consume everything appended to the log since the last call, feed it
    /// through the pattern state machine, and return any messages that
    /// completed. Mirrors [`crate::access::ConfigSpace`]: positional reads,
    /// no shared seek state.
    pub fn poll(&mut self) -> io::Result<Vec<LogRecord>> {
        let file = File::open(&self.log_path)?;
        let len = file.metadata()?.len();

        if !self.started {
            self.offset = if self.first_full_read { 0 } else { len };
            self.started = true;
        }

        // A rotated/truncated log file moved backwards; restart from 0
        // rather than requesting bytes past EOF forever.
        if len < self.offset {
            self.offset = 0;
            self.carry.clear();
        }

        let to_read = (len - self.offset) as usize;
        let mut buf = vec![0u8; to_read];
        if to_read > 0 {
            file.read_exact_at(&mut buf, self.offset)?;
        }
        self.offset = len;

        let mut data = std::mem::take(&mut self.carry);
        data.extend_from_slice(&buf);

        let mut records = Vec::new();
        let mut lines = data.split(|&b| b == b'\n').peekable();
        while let Some(chunk) = lines.next() {
            let is_last = lines.peek().is_none();
            if is_last {
                // No trailing newline yet: keep it for the next poll.
                if !chunk.is_empty() {
                    self.carry = chunk.to_vec();
                }
                break;
            }
            let line = String::from_utf8_lossy(chunk);
            if let Some(record) = self.feed_line(&line) {
                records.push(record);
            }
        }

        Ok(records)
    }

    fn feed_line(&mut self, line: &str) -> Option<LogRecord> {
        let anchor = &self.parser.patterns[self.parser.anchor_idx];
        let anchor_hit = anchor.try_match(line);

        if anchor_hit.is_some() {
            let anchor_already_set = self
                .current
                .as_ref()
                .map(|p| p.values[self.parser.anchor_idx].is_some())
                .unwrap_or(false);
            if anchor_already_set {
                // A fresh anchor hit while the previous message already had
                // one: that message is done growing. Flush it if it made
                // its mandatory quota, otherwise it is silently discarded
                // (spec §7: malformed log message).
                let finished = self.current.take();
                self.current = Some(Partial::new(self.parser.patterns.len()));
                if let Some(partial) = finished {
                    if partial.is_mandatory_complete(&self.parser) {
                        return Some(partial.into_record(&self.parser));
                    }
                }
            }
        }

        if self.current.is_none() {
            self.current = Some(Partial::new(self.parser.patterns.len()));
        }

        {
            let current = self.current.as_mut().unwrap();
            for (idx, pattern) in self.parser.patterns.iter().enumerate() {
                if current.values[idx].is_some() {
                    continue;
                }
                if let Some(value) = pattern.try_match(line) {
                    current.values[idx] = Some(value);
                }
            }
        }

        if self
            .current
            .as_ref()
            .unwrap()
            .is_mandatory_complete(&self.parser)
        {
            let partial = self.current.take().unwrap();
            return Some(partial.into_record(&self.parser));
        }

        None
    }
}

//! go.mod parser
//!
//! Reads the directives the audit cares about (`module`, `go`, `toolchain`,
//! `require`, `replace`, `exclude`) in both single-line and block form:
//!
//! ```text
//! module example.com/app
//!
//! go 1.21
//!
//! require (
//!     golang.org/x/text v0.14.0
//!     golang.org/x/net v0.20.0 // indirect
//! )
//! ```
//!
//! `retract`, `godebug`, `tool` and `ignore` are accepted and skipped. Anything
//! else is rejected, as the Go toolchain does.
//!
//! Shortened versions are stored in canonical form (`v1.2` as `v1.2.0`), and a
//! required version must match the path's major suffix (`/v2` takes `v2.x.y`).

use crate::error::{AuditError, Result};
use crate::gomod::model::{DependencyRecord, ModuleDescriptor, ModuleVersion, Replacement};
use crate::gomod::version::{GoVersion, check_path_major, path_major};
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

const BLOCK_DIRECTIVES: &[&str] = &[
    "require", "replace", "exclude", "retract", "godebug", "tool", "ignore",
];
const SKIPPED_DIRECTIVES: &[&str] = &["retract", "godebug", "tool", "ignore"];

/// Parser for go.mod manifests
pub struct ManifestParser {
    /// Matches the `go` directive value: `1.21`, `1.21.0`, `1.22rc1`
    go_version_re: Regex,
    /// Matches the `toolchain` directive value: `default`, `go1.22.3`
    toolchain_re: Regex,
}

impl ManifestParser {
    pub fn new() -> Self {
        Self {
            go_version_re: Regex::new(
                r"^([1-9][0-9]*)\.(0|[1-9][0-9]*)(\.(0|[1-9][0-9]*))?([a-z]+[0-9]+)?$",
            )
            .expect("go version pattern is valid"),
            toolchain_re: Regex::new(r"^default$|^go1($|\.)")
                .expect("toolchain pattern is valid"),
        }
    }

    /// Parse raw manifest bytes. `location` only appears in error messages.
    pub fn parse(&self, data: &[u8], location: &Path) -> Result<ModuleDescriptor> {
        let text = std::str::from_utf8(data).map_err(|e| AuditError::Parse {
            location: location.to_path_buf(),
            line: 0,
            message: format!("invalid UTF-8: {}", e),
        })?;

        let mut state = ParseState::new(self, location);
        let mut block: Option<(String, usize)> = None;

        for (index, raw) in text.lines().enumerate() {
            let line_no = index + 1;
            let line = tokenize(raw).map_err(|message| state.error(line_no, message))?;

            if line.tokens.is_empty() {
                continue;
            }

            if let Some((verb, _)) = &block {
                if line.tokens == [")"] {
                    block = None;
                    continue;
                }
                if line.tokens.iter().any(|t| t == "(" || t == ")") {
                    return Err(state.error(line_no, "unexpected parenthesis inside block"));
                }
                let verb = verb.clone();
                state.directive(&verb, &line.tokens, line.comment.as_deref(), line_no)?;
                continue;
            }

            let verb = line.tokens[0].as_str();
            let args = &line.tokens[1..];

            if verb == "(" || verb == ")" {
                return Err(state.error(line_no, format!("unexpected '{}'", verb)));
            }

            if args.first().map(String::as_str) == Some("(") {
                if !BLOCK_DIRECTIVES.contains(&verb) {
                    return Err(state.error(line_no, format!("{} cannot be a block", verb)));
                }
                match args.len() {
                    1 => block = Some((verb.to_string(), line_no)),
                    2 if args[1] == ")" => {}
                    _ => return Err(state.error(line_no, "syntax error after '('")),
                }
                continue;
            }

            state.directive(verb, args, line.comment.as_deref(), line_no)?;
        }

        if let Some((verb, start)) = block {
            return Err(state.error(start, format!("unterminated {} block", verb)));
        }

        let descriptor = state.finish();
        debug!(
            "Parsed {}: module '{}', {} direct dependencies",
            location.display(),
            descriptor.name,
            descriptor.dependencies.len()
        );
        Ok(descriptor)
    }
}

impl Default for ManifestParser {
    fn default() -> Self {
        Self::new()
    }
}

struct ParseState<'a> {
    parser: &'a ManifestParser,
    location: PathBuf,
    descriptor: ModuleDescriptor,
    seen_module: bool,
    seen_go: bool,
    required: HashSet<String>,
}

impl<'a> ParseState<'a> {
    fn new(parser: &'a ManifestParser, location: &Path) -> Self {
        Self {
            parser,
            location: location.to_path_buf(),
            descriptor: ModuleDescriptor::default(),
            seen_module: false,
            seen_go: false,
            required: HashSet::new(),
        }
    }

    fn error(&self, line: usize, message: impl Into<String>) -> AuditError {
        AuditError::Parse {
            location: self.location.clone(),
            line,
            message: message.into(),
        }
    }

    fn finish(self) -> ModuleDescriptor {
        self.descriptor
    }

    fn directive(
        &mut self,
        verb: &str,
        args: &[String],
        comment: Option<&str>,
        line: usize,
    ) -> Result<()> {
        match verb {
            "module" => self.module(args, line),
            "go" => self.go(args, line),
            "toolchain" => self.toolchain(args, line),
            "require" => self.require(args, comment, line),
            "exclude" => {
                let [path, version] = args else {
                    return Err(self.error(line, "usage: exclude module/path vX.Y.Z"));
                };
                let version = self.check_version(path, version, line)?;
                self.check_major_suffix(path, &version, line)?;
                self.descriptor.excludes.push(ModuleVersion {
                    path: path.clone(),
                    version: Some(version),
                });
                Ok(())
            }
            "replace" => self.replace(args, line),
            v if SKIPPED_DIRECTIVES.contains(&v) => {
                if args.is_empty() {
                    return Err(self.error(line, format!("usage: {} requires arguments", v)));
                }
                Ok(())
            }
            other => Err(self.error(line, format!("unknown directive: {}", other))),
        }
    }

    fn module(&mut self, args: &[String], line: usize) -> Result<()> {
        if self.seen_module {
            return Err(self.error(line, "repeated module statement"));
        }
        let [path] = args else {
            return Err(self.error(line, "usage: module module/path"));
        };
        self.seen_module = true;
        self.descriptor.name = path.clone();
        Ok(())
    }

    fn go(&mut self, args: &[String], line: usize) -> Result<()> {
        if self.seen_go {
            return Err(self.error(line, "repeated go statement"));
        }
        let [version] = args else {
            return Err(self.error(line, "usage: go 1.23"));
        };
        if !self.parser.go_version_re.is_match(version) {
            return Err(self.error(line, format!("invalid go version '{}'", version)));
        }
        self.seen_go = true;
        self.descriptor.go_version = version.clone();
        Ok(())
    }

    fn toolchain(&mut self, args: &[String], line: usize) -> Result<()> {
        if self.descriptor.toolchain.is_some() {
            return Err(self.error(line, "repeated toolchain statement"));
        }
        let [name] = args else {
            return Err(self.error(line, "usage: toolchain name"));
        };
        if !self.parser.toolchain_re.is_match(name) {
            return Err(self.error(
                line,
                format!(
                    "invalid toolchain version '{}': must match format go1.23.0 or default",
                    name
                ),
            ));
        }
        self.descriptor.toolchain = Some(name.clone());
        Ok(())
    }

    fn require(&mut self, args: &[String], comment: Option<&str>, line: usize) -> Result<()> {
        let [path, version] = args else {
            return Err(self.error(line, "usage: require module/path vX.Y.Z"));
        };
        let version = self.check_version(path, version, line)?;
        self.check_major_suffix(path, &version, line)?;

        if !self.required.insert(path.clone()) {
            return Err(self.error(line, format!("{}: duplicate requirement", path)));
        }

        if is_indirect(comment) {
            debug!("Skipping indirect requirement {} {}", path, version);
            return Ok(());
        }

        self.descriptor
            .dependencies
            .push(DependencyRecord::new(path.clone(), version));
        Ok(())
    }

    fn replace(&mut self, args: &[String], line: usize) -> Result<()> {
        const USAGE: &str =
            "usage: replace module/path [vX.Y.Z] => other/module vX.Y.Z | dir/path";

        let Some(arrow) = args.iter().position(|a| a == "=>") else {
            return Err(self.error(line, USAGE));
        };
        let (old, new) = (&args[..arrow], &args[arrow + 1..]);

        let old = match old {
            [path] => ModuleVersion {
                path: path.clone(),
                version: None,
            },
            [path, version] => ModuleVersion {
                path: path.clone(),
                version: Some(self.check_version(path, version, line)?),
            },
            _ => return Err(self.error(line, USAGE)),
        };

        let replacement = match new {
            [path] => {
                if !is_local_path(path) {
                    return Err(self.error(
                        line,
                        "replacement module without version must be directory path (rooted or starting with ./ or ../)",
                    ));
                }
                Replacement {
                    old,
                    new_path: path.clone(),
                    new_version: None,
                }
            }
            [path, version] => Replacement {
                new_version: Some(self.check_version(path, version, line)?),
                old,
                new_path: path.clone(),
            },
            _ => return Err(self.error(line, USAGE)),
        };

        self.descriptor.replaces.push(replacement);
        Ok(())
    }

    /// Validates `version` and returns its canonical form
    fn check_version(&self, path: &str, version: &str, line: usize) -> Result<String> {
        GoVersion::canonicalize(version).ok_or_else(|| {
            self.error(line, format!("{}@{}: invalid module version", path, version))
        })
    }

    /// `version` must already be canonical
    fn check_major_suffix(&self, path: &str, version: &str, line: usize) -> Result<()> {
        let Some(major) = path_major(path) else {
            return Err(self.error(line, format!("{}: invalid module path", path)));
        };
        let Some(parsed) = GoVersion::parse(version) else {
            return Err(self.error(
                line,
                format!("{}@{}: invalid module version", path, version),
            ));
        };
        check_path_major(&parsed, major).map_err(|reason| {
            self.error(
                line,
                format!("{}@{}: invalid version: {}", path, version, reason),
            )
        })
    }
}

/// A tokenized manifest line: the directive words plus any trailing comment
#[derive(Debug, Default, PartialEq)]
struct Line {
    tokens: Vec<String>,
    comment: Option<String>,
}

fn tokenize(raw: &str) -> std::result::Result<Line, String> {
    let mut line = Line::default();
    let mut rest = raw.trim_start();

    while !rest.is_empty() {
        if let Some(comment) = rest.strip_prefix("//") {
            line.comment = Some(comment.trim().to_string());
            break;
        }

        let (token, tail) = match rest.chars().next() {
            Some('(') | Some(')') => rest.split_at(1),
            Some('"') => {
                let end = quoted_end(rest).ok_or("unterminated quoted string")?;
                let (quoted, tail) = rest.split_at(end);
                line.tokens.push(unquote(quoted)?);
                rest = tail.trim_start();
                continue;
            }
            Some('`') => {
                let end = rest[1..].find('`').ok_or("unterminated raw string")? + 2;
                let (quoted, tail) = rest.split_at(end);
                line.tokens.push(quoted[1..quoted.len() - 1].to_string());
                rest = tail.trim_start();
                continue;
            }
            _ => {
                let end = rest
                    .find(|c: char| c.is_whitespace() || c == '(' || c == ')')
                    .unwrap_or(rest.len());
                let end = rest[..end].find("//").unwrap_or(end);
                rest.split_at(end)
            }
        };

        line.tokens.push(token.to_string());
        rest = tail.trim_start();
    }

    Ok(line)
}

/// Byte offset just past the closing quote of a double-quoted string
fn quoted_end(s: &str) -> Option<usize> {
    let mut escaped = false;
    for (i, c) in s.char_indices().skip(1) {
        match c {
            '\\' if !escaped => escaped = true,
            '"' if !escaped => return Some(i + 1),
            _ => escaped = false,
        }
    }
    None
}

/// Decodes a double-quoted Go string literal, quotes included
fn unquote(quoted: &str) -> std::result::Result<String, String> {
    let invalid = |detail: String| format!("invalid quoted string {}: {}", quoted, detail);
    let inner = quoted
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .ok_or_else(|| invalid("missing quotes".to_string()))?;

    let mut out = Vec::with_capacity(inner.len());
    let mut chars = inner.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }

        let escape = chars
            .next()
            .ok_or_else(|| invalid("trailing backslash".to_string()))?;
        match escape {
            'a' => out.push(0x07),
            'b' => out.push(0x08),
            'f' => out.push(0x0c),
            'n' => out.push(b'\n'),
            'r' => out.push(b'\r'),
            't' => out.push(b'\t'),
            'v' => out.push(0x0b),
            '\\' => out.push(b'\\'),
            '"' => out.push(b'"'),
            'x' => {
                let byte = take_digits(&mut chars, 2, 16)
                    .ok_or_else(|| invalid("\\x needs two hex digits".to_string()))?;
                out.push(byte as u8);
            }
            'u' | 'U' => {
                let count = if escape == 'u' { 4 } else { 8 };
                let c = take_digits(&mut chars, count, 16)
                    .and_then(char::from_u32)
                    .ok_or_else(|| invalid(format!("bad \\{} escape", escape)))?;
                let mut buf = [0; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
            '0'..='7' => {
                let rest = take_digits(&mut chars, 2, 8)
                    .ok_or_else(|| invalid("octal escape needs three digits".to_string()))?;
                let value = escape.to_digit(8).unwrap_or(0) * 64 + rest;
                let byte = u8::try_from(value)
                    .map_err(|_| invalid("octal escape value > 255".to_string()))?;
                out.push(byte);
            }
            other => return Err(invalid(format!("unknown escape sequence \\{}", other))),
        }
    }

    String::from_utf8(out).map_err(|_| invalid("not valid UTF-8".to_string()))
}

fn take_digits(chars: &mut std::str::Chars<'_>, count: usize, radix: u32) -> Option<u32> {
    let mut value = 0;
    for _ in 0..count {
        value = value * radix + chars.next()?.to_digit(radix)?;
    }
    Some(value)
}

/// `// indirect` or `// indirect; note`, split into words as `go mod` does
fn is_indirect(comment: Option<&str>) -> bool {
    let Some(comment) = comment else {
        return false;
    };
    let words: Vec<&str> = comment.split_whitespace().collect();
    match words.as_slice() {
        ["indirect"] => true,
        [first, _, ..] => *first == "indirect;",
        _ => false,
    }
}

fn is_local_path(path: &str) -> bool {
    path.starts_with("./")
        || path.starts_with("../")
        || path.starts_with('/')
        || path == "."
        || path == ".."
        || Path::new(path).is_absolute()
}

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use pest::Parser;
use pest::error::InputLocation;
use pest::iterators::{Pair, Pairs};
use pest_derive::Parser as PestParser;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::kernel::ast::{Action, ElifBranch, Params};
use crate::kernel::fs_guard;

pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 20;

/// Directive names that open a `{ ... }` body of nested actions.
pub const CONTAINER_KINDS: &[&str] = &["iframe"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}, column {col}: {detail}")]
pub struct ParseError {
    pub line: usize,
    pub col: usize,
    pub snippet: String,
    pub detail: String,
}

/// State for one top-level parse: the include chain currently being resolved
/// and how deep it is.
#[derive(Debug)]
pub struct ParseSession {
    visited: HashSet<PathBuf>,
    current_file: PathBuf,
    depth: usize,
    max_depth: usize,
}

impl ParseSession {
    pub fn new(root_file: &Path, max_depth: usize) -> Self {
        Self {
            visited: HashSet::new(),
            current_file: root_file.to_path_buf(),
            depth: 0,
            max_depth,
        }
    }

    /// Session for text that does not come from a file; includes resolve
    /// against the working directory.
    pub fn detached(max_depth: usize) -> Self {
        let cwd = std::env::current_dir().unwrap_or_default();
        Self::new(&cwd.join("<inline>"), max_depth)
    }

    pub fn current_file(&self) -> &Path {
        &self.current_file
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}

// ---- concrete tree ----

#[derive(Debug, Clone, PartialEq)]
enum Stmt {
    Simple {
        name: String,
        params: Option<Params>,
    },
    If {
        cond: String,
        body: Vec<Stmt>,
        elifs: Vec<(String, Vec<Stmt>)>,
        else_body: Option<Vec<Stmt>>,
    },
    Container {
        kind: String,
        target: String,
        body: Vec<Stmt>,
    },
    Include {
        file: String,
    },
    Url(String),
}

#[derive(PestParser)]
#[grammar = "src/grammar/script.pest"]
struct ScriptGrammar;

/// Deepest `{ ... }` nesting accepted by [`parse_source`].
pub const MAX_BLOCK_DEPTH: usize = 64;

type PResult<T> = Result<T, ParseError>;

/// Offset of the first `{` nested deeper than [`MAX_BLOCK_DEPTH`]. Braces in
/// strings closed on their own line do not count.
fn too_deep(src: &str) -> Option<usize> {
    let bytes = src.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;
    while let Some(&b) = bytes.get(i) {
        match b {
            b'"' => {
                if let Some(close) = closing_quote(bytes, i + 1) {
                    i = close;
                }
            }
            b'{' => {
                depth += 1;
                if depth > MAX_BLOCK_DEPTH {
                    return Some(i);
                }
            }
            b'}' => depth = depth.saturating_sub(1),
            _ => {}
        }
        i += 1;
    }
    None
}

fn closing_quote(bytes: &[u8], mut i: usize) -> Option<usize> {
    while let Some(&b) = bytes.get(i) {
        match b {
            b'\\' if bytes.get(i + 1).is_some_and(|n| *n != b'\n') => i += 2,
            b'"' => return Some(i),
            b'\n' => return None,
            _ => i += 1,
        }
    }
    None
}

/// Turns the parse tree into statements. The grammar matches any input;
/// malformed constructs come out as error rules and the first one in
/// document order becomes the [`ParseError`].
struct Walker<'a> {
    src: &'a str,
}

impl<'a> Walker<'a> {
    fn error_at(&self, pos: usize, detail: impl Into<String>) -> ParseError {
        let pos = pos.min(self.src.len());
        let before = &self.src[..pos];
        let line_start = before.rfind('\n').map(|n| n + 1).unwrap_or(0);
        let line_end = self.src[pos..]
            .find('\n')
            .map(|n| pos + n)
            .unwrap_or(self.src.len());
        ParseError {
            line: before.matches('\n').count() + 1,
            col: self.src[line_start..pos].chars().count() + 1,
            snippet: self.src[line_start..line_end].trim_end_matches('\r').to_string(),
            detail: detail.into(),
        }
    }

    fn next_pair(&self, inner: &mut Pairs<'a, Rule>, at: usize, what: &str) -> PResult<Pair<'a, Rule>> {
        inner
            .next()
            .ok_or_else(|| self.error_at(at, format!("incomplete {what}")))
    }

    fn program(&self) -> PResult<Vec<Stmt>> {
        let program = ScriptGrammar::parse(Rule::program, self.src)
            .map_err(|e| self.from_pest(&e))?
            .next()
            .ok_or_else(|| self.error_at(0, "empty parse"))?;
        self.items(program.into_inner())
    }

    /// Fallback for a grammar failure; the position is all pest can tell.
    fn from_pest(&self, err: &pest::error::Error<Rule>) -> ParseError {
        let pos = match err.location {
            InputLocation::Pos(p) | InputLocation::Span((p, _)) => p,
        };
        self.error_at(pos, "unrecognised input")
    }

    fn items(&self, pairs: Pairs<'a, Rule>) -> PResult<Vec<Stmt>> {
        let mut out = Vec::new();
        for pair in pairs {
            let at = pair.as_span().start();
            match pair.as_rule() {
                Rule::stray_close => {
                    return Err(self.error_at(at, "unexpected '}' outside of a block"));
                }
                Rule::orphan_branch => {
                    let branch = pair
                        .into_inner()
                        .next()
                        .map(|p| p.as_str())
                        .unwrap_or("else");
                    return Err(self.error_at(at, format!("'@{branch}' without a preceding '@if'")));
                }
                Rule::bad_directive => {
                    return Err(self.error_at(pair.as_span().end(), "expected an action name after '@'"));
                }
                Rule::if_block => out.push(self.if_block(pair)?),
                Rule::include => out.push(self.include(pair)?),
                Rule::container => out.push(self.container(pair)?),
                Rule::simple => out.push(self.simple(pair)?),
                Rule::url_line => out.push(Stmt::Url(pair.as_str().trim().to_string())),
                _ => {}
            }
        }
        Ok(out)
    }

    /// Statements of a `{ ... }` body; the opening brace sits just before
    /// the pair.
    fn body(&self, pair: Pair<'a, Rule>) -> PResult<Vec<Stmt>> {
        let open = pair.as_span().start().saturating_sub(1);
        let inner = pair.into_inner();
        let closed = inner
            .clone()
            .find(|p| p.as_rule() == Rule::body_end)
            .is_some_and(|end| !end.as_str().is_empty());
        let stmts = self.items(inner)?;
        if !closed {
            return Err(self.error_at(open, "unclosed '{' block: expected '}'"));
        }
        Ok(stmts)
    }

    /// Condition or target text of a block header.
    fn header(&self, pair: Pair<'a, Rule>, at: usize, kind: &str) -> PResult<String> {
        let is_error = pair.as_rule() == Rule::header_error;
        let mut text = "";
        for part in pair.into_inner() {
            match part.as_rule() {
                Rule::header_text => {
                    text = part.as_str();
                    for lit in part.into_inner() {
                        let lit_at = lit.as_span().start();
                        for inner in lit.into_inner().flatten() {
                            match inner.as_rule() {
                                Rule::open_quote => {
                                    return Err(self.error_at(lit_at, "unterminated string in block header"));
                                }
                                Rule::open_regex => {
                                    return Err(self.error_at(lit_at, "unterminated regular expression"));
                                }
                                _ => {}
                            }
                        }
                    }
                }
                Rule::stray_in_header => {
                    return Err(self.error_at(part.as_span().start(), "unexpected '}' in block header"));
                }
                Rule::no_open if part.as_span().start() >= self.src.len() => {
                    return Err(self.error_at(at, format!("expected '{{' to open the '@{kind}' block")));
                }
                Rule::no_open => {
                    return Err(self.error_at(
                        at,
                        format!("expected '{{' to open the '@{kind}' block on the same line"),
                    ));
                }
                _ => {}
            }
        }
        if is_error {
            return Err(self.error_at(at, format!("expected '{{' to open the '@{kind}' block")));
        }
        let mut text = text.trim();
        if let Some(stripped) = text.strip_suffix(':') {
            text = stripped.trim_end();
        }
        if text.is_empty() {
            return Err(self.error_at(at, format!("'@{kind}' needs a condition or target")));
        }
        Ok(text.to_string())
    }

    /// `header body` as found in `@if`, `@elif` and containers.
    fn headed_block(&self, inner: &mut Pairs<'a, Rule>, at: usize, kind: &str) -> PResult<(String, Vec<Stmt>)> {
        let what = format!("'@{kind}' block");
        let header = self.header(self.next_pair(inner, at, &what)?, at, kind)?;
        let body = self.body(self.next_pair(inner, at, &what)?)?;
        Ok((header, body))
    }

    fn if_block(&self, pair: Pair<'a, Rule>) -> PResult<Stmt> {
        let mut inner = pair.clone().into_inner();
        let (cond, body) = self.headed_block(&mut inner, pair.as_span().start(), "if")?;
        let mut elifs = Vec::new();
        let mut else_body = None;
        for branch in inner {
            let at = branch.as_span().start();
            match branch.as_rule() {
                Rule::elif_branch => {
                    elifs.push(self.headed_block(&mut branch.into_inner(), at, "elif")?);
                }
                Rule::else_branch => {
                    let part = self.next_pair(&mut branch.into_inner(), at, "'@else' block")?;
                    if part.as_rule() == Rule::missing_open {
                        return Err(self.error_at(
                            part.as_span().start(),
                            "expected '{' to open the '@else' block",
                        ));
                    }
                    else_body = Some(self.body(part)?);
                }
                _ => {}
            }
        }
        Ok(Stmt::If {
            cond,
            body,
            elifs,
            else_body,
        })
    }

    fn container(&self, pair: Pair<'a, Rule>) -> PResult<Stmt> {
        let at = pair.as_span().start();
        let mut inner = pair.into_inner();
        let kind = self.next_pair(&mut inner, at, "container")?.as_str().to_string();
        let (target, body) = self.headed_block(&mut inner, at, &kind)?;
        Ok(Stmt::Container { kind, target, body })
    }

    fn include(&self, pair: Pair<'a, Rule>) -> PResult<Stmt> {
        let at = pair.as_span().start();
        let file = pair
            .into_inner()
            .find(|p| p.as_rule() == Rule::line_text)
            .map(|p| p.as_str().trim())
            .unwrap_or_default();
        if file.is_empty() {
            return Err(self.error_at(at, "'@include' needs a file name"));
        }
        Ok(Stmt::Include {
            file: file.to_string(),
        })
    }

    fn simple(&self, pair: Pair<'a, Rule>) -> PResult<Stmt> {
        let at = pair.as_span().start();
        let mut inner = pair.into_inner();
        let name = self.next_pair(&mut inner, at, "action")?.as_str().to_string();
        let mut params = None;
        for part in inner {
            let part_at = part.as_span().start();
            match part.as_rule() {
                Rule::block_param => {
                    let mut text = "";
                    for piece in part.into_inner() {
                        match piece.as_rule() {
                            Rule::block_text => text = piece.as_str().trim(),
                            Rule::unclosed => {
                                return Err(self.error_at(part_at, "unclosed '{' in block parameter"));
                            }
                            _ => {}
                        }
                    }
                    params = Some(Params::Block(text.to_string()));
                }
                Rule::trailing => {
                    return Err(self.error_at(part_at, "unexpected text after block parameter"));
                }
                Rule::param_line => {
                    let open = part
                        .clone()
                        .into_inner()
                        .find(|braces| braces.clone().into_inner().any(|p| p.as_rule() == Rule::unclosed));
                    if let Some(braces) = open {
                        return Err(self.error_at(braces.as_span().start(), "unclosed '{' in parameter"));
                    }
                    let text = part.as_str().trim();
                    params = (!text.is_empty()).then(|| Params::Line(text.to_string()));
                }
                _ => {}
            }
        }
        Ok(Stmt::Simple { name, params })
    }
}

// ---- tree -> actions ----

fn build(stmts: Vec<Stmt>, session: &mut ParseSession) -> Vec<Action> {
    let mut out = Vec::with_capacity(stmts.len());
    for stmt in stmts {
        match stmt {
            Stmt::Simple { name, params } => out.push(Action::Simple { name, params }),
            Stmt::Url(target) => out.push(Action::Url { target }),
            Stmt::If {
                cond,
                body,
                elifs,
                else_body,
            } => {
                let then_actions = build(body, session);
                let elif_branches = elifs
                    .into_iter()
                    .map(|(condition, body)| ElifBranch {
                        condition,
                        actions: build(body, session),
                    })
                    .collect();
                let else_actions = else_body.map(|b| build(b, session)).unwrap_or_default();
                out.push(Action::Conditional {
                    condition: cond,
                    then_actions,
                    elif_branches,
                    else_actions,
                });
            }
            Stmt::Container { kind, target, body } => {
                let actions = build(body, session);
                out.push(Action::Container {
                    kind,
                    target,
                    actions,
                });
            }
            Stmt::Include { file } => out.extend(include(&file, session)),
        }
    }
    out
}

fn include(file: &str, session: &mut ParseSession) -> Vec<Action> {
    let target = fs_guard::include_target(&session.current_file, file);
    info!("processing include '{}'", target.display());
    session.depth += 1;
    let actions = parse_file(&target, session);
    session.depth -= 1;
    actions
}

/// Parses script text. Includes are resolved through `session`; a broken
/// include only loses that include, a syntax error here fails the call.
pub fn parse_source(text: &str, session: &mut ParseSession) -> Result<Vec<Action>, ParseError> {
    let walker = Walker { src: text };
    if let Some(pos) = too_deep(text) {
        return Err(walker.error_at(
            pos,
            format!("nesting too deep (more than {MAX_BLOCK_DEPTH} levels of braces)"),
        ));
    }
    let stmts = walker.program()?;
    Ok(build(stmts, session))
}

pub fn parse_str(text: &str) -> Result<Vec<Action>, ParseError> {
    parse_source(text, &mut ParseSession::detached(DEFAULT_MAX_INCLUDE_DEPTH))
}

/// Parses one file within `session`. Never fails: missing files, include
/// cycles, excessive depth and syntax errors are logged and contribute no
/// actions.
pub fn parse_file(path: &Path, session: &mut ParseSession) -> Vec<Action> {
    let canonical = match fs_guard::canonical(path) {
        Ok(p) => p,
        Err(e) => {
            warn!("{e:#}; the file will be ignored");
            return Vec::new();
        }
    };
    if session.visited.contains(&canonical) {
        warn!(
            "'{}' is already being parsed; skipping to avoid a circular include",
            canonical.display()
        );
        return Vec::new();
    }
    if session.depth > session.max_depth {
        error!(
            "maximum include depth ({}) exceeded for '{}'",
            session.max_depth,
            canonical.display()
        );
        return Vec::new();
    }
    let text = match fs::read_to_string(&canonical) {
        Ok(t) => t,
        Err(e) => {
            warn!("cannot read '{}': {e}; the file will be ignored", canonical.display());
            return Vec::new();
        }
    };

    debug!(depth = session.depth, "parsing '{}'", canonical.display());
    session.visited.insert(canonical.clone());
    let prev = std::mem::replace(&mut session.current_file, canonical.clone());
    let out = match parse_source(&text, session) {
        Ok(actions) => actions,
        Err(e) => {
            error!("syntax error in '{}': {e}", canonical.display());
            Vec::new()
        }
    };
    session.current_file = prev;
    session.visited.remove(&canonical);
    out
}

pub fn parse_script_file(path: &Path, max_depth: usize) -> Vec<Action> {
    let mut session = ParseSession::new(path, max_depth);
    parse_file(path, &mut session)
}

/// Like [`parse_script_file`] but surfaces the root file's problems instead of
/// logging them. Syntax errors come back as a [`ParseError`] inside the
/// `anyhow::Error`.
pub fn parse_script_file_strict(path: &Path, max_depth: usize) -> anyhow::Result<Vec<Action>> {
    let canonical = fs_guard::canonical(path)?;
    let text = fs::read_to_string(&canonical)?;
    let mut session = ParseSession::new(&canonical, max_depth);
    session.visited.insert(canonical.clone());
    Ok(parse_source(&text, &mut session)?)
}

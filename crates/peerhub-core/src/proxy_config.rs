//! Proxy configuration grammar.
//!
//! ```text
//! # comment
//! host "app.local:8080" {
//!     proxy_pass http://127.0.0.1:9000;
//!     proxy_pass http://127.0.0.1:9001;
//!     dist_policy round-robin;
//! }
//! ```
//!
//! `dist_policy` defaults to `round-robin`. A block without any
//! `proxy_pass` is kept with an empty backend list. A later block for the
//! same host replaces an earlier one.

use std::path::{Path, PathBuf};

use crate::backend::{Backend, DistPolicy, VirtualHostConfig};

#[derive(Debug, thiserror::Error)]
pub enum ProxyConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Quoted(String),
    Open,
    Close,
    Semi,
}

fn tokenize(text: &str) -> Result<Vec<(usize, Token)>, ProxyConfigError> {
    let mut tokens = Vec::new();
    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let mut chars = raw_line.chars().peekable();
        while let Some(&c) = chars.peek() {
            match c {
                // Comment to end of line, unless inside a quoted string.
                '#' => break,
                c if c.is_whitespace() => {
                    chars.next();
                }
                '{' => {
                    chars.next();
                    tokens.push((line_no, Token::Open));
                }
                '}' => {
                    chars.next();
                    tokens.push((line_no, Token::Close));
                }
                ';' => {
                    chars.next();
                    tokens.push((line_no, Token::Semi));
                }
                '"' => {
                    chars.next();
                    let mut value = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == '"' {
                            closed = true;
                            break;
                        }
                        value.push(c);
                    }
                    if !closed {
                        return Err(ProxyConfigError::Syntax {
                            line: line_no,
                            message: "unterminated string".into(),
                        });
                    }
                    tokens.push((line_no, Token::Quoted(value)));
                }
                _ => {
                    let mut word = String::new();
                    while let Some(&c) = chars.peek() {
                        if c.is_whitespace() || matches!(c, '{' | '}' | ';' | '"' | '#') {
                            break;
                        }
                        word.push(c);
                        chars.next();
                    }
                    tokens.push((line_no, Token::Word(word)));
                }
            }
        }
    }
    Ok(tokens)
}

fn syntax(line: usize, message: impl Into<String>) -> ProxyConfigError {
    ProxyConfigError::Syntax {
        line,
        message: message.into(),
    }
}

/// Parse config text into virtual hosts, in first-seen order.
pub fn parse(text: &str) -> Result<Vec<VirtualHostConfig>, ProxyConfigError> {
    let tokens = tokenize(text)?;
    let mut iter = tokens.into_iter().peekable();
    let mut hosts: Vec<VirtualHostConfig> = Vec::new();

    while let Some((line, token)) = iter.next() {
        match token {
            Token::Word(w) if w == "host" => {}
            other => return Err(syntax(line, format!("expected `host`, found {other:?}"))),
        }
        let name = match iter.next() {
            Some((_, Token::Quoted(name))) if !name.trim().is_empty() => name.trim().to_string(),
            Some((line, other)) => {
                return Err(syntax(line, format!("expected quoted host name, found {other:?}")))
            }
            None => return Err(syntax(line, "expected quoted host name")),
        };
        match iter.next() {
            Some((_, Token::Open)) => {}
            other => {
                let line = other.map(|(l, _)| l).unwrap_or(line);
                return Err(syntax(line, format!("expected `{{` after host {name:?}")));
            }
        }

        let mut backends = Vec::new();
        let mut policy: Option<DistPolicy> = None;
        loop {
            let (line, token) = iter
                .next()
                .ok_or_else(|| syntax(line, format!("host {name:?} is missing `}}`")))?;
            let directive = match token {
                Token::Close => break,
                Token::Word(w) => w,
                other => return Err(syntax(line, format!("unexpected {other:?}"))),
            };
            let value = match iter.next() {
                Some((_, Token::Word(v))) => v,
                _ => return Err(syntax(line, format!("`{directive}` needs a value"))),
            };
            if matches!(iter.peek(), Some((_, Token::Semi))) {
                iter.next();
            }
            match directive.as_str() {
                "proxy_pass" => {
                    let backend: Backend = value.parse().map_err(|e| syntax(line, e))?;
                    backends.push(backend);
                }
                "dist_policy" => {
                    policy = Some(value.parse().map_err(|e| syntax(line, e))?);
                }
                other => return Err(syntax(line, format!("unknown directive `{other}`"))),
            }
        }

        if backends.is_empty() {
            tracing::warn!(host = %name, "no proxy_pass defined for host");
        }
        let vhost = VirtualHostConfig {
            name,
            backends,
            policy: policy.unwrap_or_default(),
        };
        if let Some(existing) = hosts.iter_mut().find(|h| h.name == vhost.name) {
            tracing::warn!(host = %vhost.name, "duplicate host block, later definition wins");
            *existing = vhost;
        } else {
            hosts.push(vhost);
        }
    }

    Ok(hosts)
}

/// Read and parse a proxy config file.
pub fn load(path: &Path) -> Result<Vec<VirtualHostConfig>, ProxyConfigError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| ProxyConfigError::ReadFailed(path.to_path_buf(), e))?;
    parse(&text)
}

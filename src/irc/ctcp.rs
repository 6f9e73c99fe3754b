//! CTCP payload view.
//!
//! The payload is the text between the `\x01` delimiters, e.g.
//! `DCC SEND "my file.txt" 3232235777 5000 1234`. Parameters are split on
//! whitespace, with double quotes grouping a parameter that contains spaces.

pub const CTCP_DELIM: char = '\x01';

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CtcpInfo {
    kind: String,
    params: Vec<String>,
    raw_params: String,
}

impl CtcpInfo {
    pub fn parse(payload: &str) -> Self {
        let payload = payload.trim_matches(CTCP_DELIM);
        let (kind, raw_params) = match payload.split_once(' ') {
            Some((kind, rest)) => (kind, rest),
            None => (payload, ""),
        };

        Self {
            kind: kind.to_ascii_uppercase(),
            params: tokenize(raw_params),
            raw_params: raw_params.to_string(),
        }
    }

    /// Request type, upper-cased (`ACTION`, `PING`, `DCC`, ...).
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn is(&self, kind: &str) -> bool {
        self.kind.eq_ignore_ascii_case(kind)
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Everything after the type, untouched.
    pub fn raw_params(&self) -> &str {
        &self.raw_params
    }
}

fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut rest = input.trim_start();

    while !rest.is_empty() {
        if let Some(quoted) = rest.strip_prefix('"') {
            match quoted.find('"') {
                Some(end) => {
                    tokens.push(quoted[..end].to_string());
                    rest = &quoted[end + 1..];
                }
                None => {
                    tokens.push(quoted.to_string());
                    rest = "";
                }
            }
        } else {
            let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            tokens.push(rest[..end].to_string());
            rest = &rest[end..];
        }
        rest = rest.trim_start();
    }
    tokens
}

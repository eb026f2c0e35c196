//! Plain token lists: one address or CIDR block per line.

use std::io::{BufRead, BufReader, Read};

use super::TokenSource;
use crate::dedup::Candidate;
use crate::{Error, Result};

/// Strip a trailing `#` comment and surrounding whitespace.
pub fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => line[..idx].trim(),
        None => line.trim(),
    }
}

/// Parse every non-empty, non-comment line of `body`.
pub fn parse_tokens(body: &str) -> Vec<Result<Candidate>> {
    body.lines()
        .map(strip_comment)
        .filter(|line| !line.is_empty())
        .map(|line| line.parse::<Candidate>())
        .collect()
}

/// Read and parse a token list. Only I/O failures abort.
///
/// A line that is not valid UTF-8 becomes an [`Error::InvalidAddressFormat`]
/// entry like any other malformed token.
pub fn read_tokens<R: Read>(reader: R) -> Result<Vec<Result<Candidate>>> {
    let mut out = Vec::new();
    for line in BufReader::new(reader).split(b'\n') {
        let line = line?;
        let token = match std::str::from_utf8(&line) {
            Ok(text) => strip_comment(text),
            Err(_) => {
                let lossy = String::from_utf8_lossy(&line);
                out.push(Err(Error::InvalidAddressFormat(lossy.trim().to_string())));
                continue;
            }
        };
        if token.is_empty() {
            continue;
        }
        out.push(token.parse());
    }
    Ok(out)
}

/// A token list already held in memory.
pub struct TextListSource {
    name: String,
    body: String,
}

impl TextListSource {
    /// Create a source from a name and list text.
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: body.into(),
        }
    }

    /// Read the whole list from `reader`.
    pub fn from_reader<R: Read>(name: impl Into<String>, mut reader: R) -> Result<Self> {
        let mut body = String::new();
        reader.read_to_string(&mut body)?;
        Ok(Self::new(name, body))
    }
}

impl TokenSource for TextListSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn candidates(&self) -> Result<Vec<Result<Candidate>>> {
        Ok(parse_tokens(&self.body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tokens() {
        let body = r#"
# Data-center ranges
10.0.0.0/8
  192.0.2.1   # single host

bogus
"#;
        let tokens = parse_tokens(body);
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].as_ref().unwrap().to_string(), "10.0.0.0/8");
        assert_eq!(tokens[1].as_ref().unwrap().to_string(), "192.0.2.1");
        assert!(tokens[2].is_err());
    }

    #[test]
    fn test_read_tokens_matches_parse() {
        let body = "1.1.1.0/24\n# comment\n\n8.8.8.8\n";
        let read: Vec<String> = read_tokens(body.as_bytes())
            .unwrap()
            .into_iter()
            .map(|c| c.unwrap().to_string())
            .collect();
        assert_eq!(read, vec!["1.1.1.0/24", "8.8.8.8"]);
    }

    #[test]
    fn test_read_tokens_invalid_utf8_line_is_per_entry() {
        let body: &[u8] = b"10.0.0.0/8\n\xff\xfe\n12.0.0.1\r\n";
        let tokens = read_tokens(body).unwrap();
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0].as_ref().unwrap().to_string(), "10.0.0.0/8");
        assert!(matches!(tokens[1], Err(Error::InvalidAddressFormat(_))));
        assert_eq!(tokens[2].as_ref().unwrap().to_string(), "12.0.0.1");
    }

    #[test]
    fn test_text_source() {
        let source = TextListSource::from_reader("vpn", "5.6.7.0/24\n".as_bytes()).unwrap();
        assert_eq!(source.name(), "vpn");
        assert_eq!(source.candidates().unwrap().len(), 1);
    }
}

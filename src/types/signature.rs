use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// identity and timestamp attached to commits, tags and notes
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    pub email: String,
    /// unix timestamp (seconds since epoch)
    pub time: i64,
    /// offset from UTC in minutes
    pub offset_minutes: i32,
}

impl Signature {
    /// create a signature with an explicit timestamp
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        time: i64,
        offset_minutes: i32,
    ) -> Result<Self> {
        let sig = Self {
            name: name.into(),
            email: email.into(),
            time,
            offset_minutes,
        };
        validate_identity(&sig.name)?;
        validate_identity(&sig.email)?;
        if sig.offset_minutes.unsigned_abs() > MAX_OFFSET_MINUTES {
            return Err(Error::InvalidSignature(format!(
                "utc offset out of range: {} minutes",
                sig.offset_minutes
            )));
        }
        Ok(sig)
    }

    /// create a signature stamped with the current time, UTC
    pub fn now(name: impl Into<String>, email: impl Into<String>) -> Result<Self> {
        let time = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        Self::new(name, email, time, 0)
    }

    /// parse the canonical `Name <email> 1234567890 +0130` form
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidSignature(s.to_string());

        let open = s.find('<').ok_or_else(invalid)?;
        let close = open + s[open..].find('>').ok_or_else(invalid)?;

        let name = s[..open].trim_end().to_string();
        let email = s[open + 1..close].to_string();

        let mut rest = s[close + 1..].split_whitespace();
        let time = rest
            .next()
            .and_then(|t| t.parse::<i64>().ok())
            .ok_or_else(invalid)?;
        let offset = rest.next().ok_or_else(invalid)?;
        if rest.next().is_some() {
            return Err(invalid());
        }

        Ok(Self {
            name,
            email,
            time,
            offset_minutes: parse_offset(offset).ok_or_else(invalid)?,
        })
    }

    /// canonical encoding used inside commit and tag objects
    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.offset_minutes < 0 { '-' } else { '+' };
        let abs = self.offset_minutes.unsigned_abs();
        write!(
            f,
            "{} <{}> {} {}{:02}{:02}",
            self.name,
            self.email,
            self.time,
            sign,
            abs / 60,
            abs % 60
        )
    }
}

/// largest offset `+hhmm` can express
const MAX_OFFSET_MINUTES: u32 = 99 * 60 + 59;

fn parse_offset(s: &str) -> Option<i32> {
    let (sign, digits) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    Some(sign * (hours * 60 + minutes))
}

fn validate_identity(s: &str) -> Result<()> {
    if s.contains(['<', '>', '\n', '\0']) {
        return Err(Error::InvalidSignature(format!(
            "identity contains reserved character: {:?}",
            s
        )));
    }
    // the encoded form pads the name with a single space before `<`
    if s.trim() != s {
        return Err(Error::InvalidSignature(format!(
            "identity has surrounding whitespace: {:?}",
            s
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_encode() {
        let sig = Signature::new("Alice", "alice@example.com", 1234567890, 90).unwrap();
        assert_eq!(sig.encode(), "Alice <alice@example.com> 1234567890 +0130");

        let sig = Signature::new("Bob", "bob@example.com", 0, -300).unwrap();
        assert_eq!(sig.encode(), "Bob <bob@example.com> 0 -0500");
    }

    #[test]
    fn test_signature_parse() {
        let sig = Signature::parse("Alice Smith <alice@example.com> 1234567890 -0230").unwrap();
        assert_eq!(sig.name, "Alice Smith");
        assert_eq!(sig.email, "alice@example.com");
        assert_eq!(sig.time, 1234567890);
        assert_eq!(sig.offset_minutes, -150);
    }

    #[test]
    fn test_signature_parse_empty_name() {
        let sig = Signature::new("", "anon@example.com", 5, 0).unwrap();
        let parsed = Signature::parse(&sig.encode()).unwrap();
        assert_eq!(sig, parsed);
    }

    #[test]
    fn test_signature_parse_invalid() {
        assert!(Signature::parse("no email 123 +0000").is_err());
        assert!(Signature::parse("A <a@b> notanumber +0000").is_err());
        assert!(Signature::parse("A <a@b> 123 0000").is_err());
        assert!(Signature::parse("A <a@b> 123").is_err());
        assert!(Signature::parse("A <a@b> 123 +0000 extra").is_err());
    }

    #[test]
    fn test_signature_rejects_reserved_chars() {
        assert!(Signature::new("A <x>", "a@b", 0, 0).is_err());
        assert!(Signature::new("A", "a@b\n", 0, 0).is_err());
    }

    #[test]
    fn test_signature_offset_range() {
        let sig = Signature::new("A", "a@x", 1, -(99 * 60 + 59)).unwrap();
        assert_eq!(sig.encode(), "A <a@x> 1 -9959");
        assert_eq!(Signature::parse(&sig.encode()).unwrap(), sig);

        assert!(matches!(
            Signature::new("A", "a@x", 1, 6000),
            Err(Error::InvalidSignature(_))
        ));
        assert!(Signature::new("A", "a@x", 1, -6000).is_err());
    }

    #[test]
    fn test_signature_rejects_surrounding_whitespace() {
        assert!(matches!(
            Signature::new("Ann ", "ann@example.com", 0, 0),
            Err(Error::InvalidSignature(_))
        ));
        assert!(Signature::new(" Ann", "ann@example.com", 0, 0).is_err());
        assert!(Signature::new("Ann", " ann@example.com", 0, 0).is_err());

        let sig = Signature::new("Ann Lee", "ann@example.com", 0, 0).unwrap();
        assert_eq!(Signature::parse(&sig.encode()).unwrap(), sig);
    }

    #[test]
    fn test_signature_now() {
        let sig = Signature::now("A", "a@b").unwrap();
        assert!(sig.time > 0);
        assert_eq!(sig.offset_minutes, 0);
    }
}

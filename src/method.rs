//! HTTP method as a typed enum.
//!
//! Covers the RFC 9110 standard methods. The route registration shorthands
//! only exist for GET, POST, PUT and DELETE; everything else goes through
//! [`App::add`](crate::App::add).
//!
//! An unknown method string never matches a route: dispatch treats it as a
//! route miss.

use std::fmt;
use std::str::FromStr;

/// A known HTTP method.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Method {
    Connect,
    Delete,
    Get,
    Head,
    Options,
    Patch,
    Post,
    Put,
    Trace,
}

impl Method {
    /// Returns the uppercase wire representation (e.g. `"GET"`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Delete  => "DELETE",
            Self::Get     => "GET",
            Self::Head    => "HEAD",
            Self::Options => "OPTIONS",
            Self::Patch   => "PATCH",
            Self::Post    => "POST",
            Self::Put     => "PUT",
            Self::Trace   => "TRACE",
        }
    }
}

/// Parses an uppercase method string (e.g. `"GET"`). Case-sensitive per RFC 9110 §9.1.
impl FromStr for Method {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONNECT" => Ok(Self::Connect),
            "DELETE"  => Ok(Self::Delete),
            "GET"     => Ok(Self::Get),
            "HEAD"    => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            "PATCH"   => Ok(Self::Patch),
            "POST"    => Ok(Self::Post),
            "PUT"     => Ok(Self::Put),
            "TRACE"   => Ok(Self::Trace),
            _         => Err(()),
        }
    }
}

/// Bridges the `http` crate's open-ended method type. Extension methods fail.
impl TryFrom<&http::Method> for Method {
    type Error = ();

    fn try_from(m: &http::Method) -> Result<Self, Self::Error> {
        m.as_str().parse()
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_sensitive() {
        assert_eq!("DELETE".parse(), Ok(Method::Delete));
        assert_eq!("delete".parse::<Method>(), Err(()));
    }

    #[test]
    fn from_http_method() {
        assert_eq!(Method::try_from(&http::Method::PUT), Ok(Method::Put));
        let custom = http::Method::from_bytes(b"PURGE").unwrap();
        assert_eq!(Method::try_from(&custom), Err(()));
    }

    #[test]
    fn display_matches_wire_form() {
        assert_eq!(Method::Post.to_string(), "POST");
    }
}

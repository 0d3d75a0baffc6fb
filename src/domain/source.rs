use serde::{Deserialize, Serialize};

/// A followed feed: the label the user follows it under and where it lives.
///
/// The address is the identity key; nicks are chosen by the follower and may
/// collide across different followers' configs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Source {
    pub nick: String,
    pub address: String,
}

impl Source {
    pub fn new(nick: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            nick: nick.into(),
            address: address.into(),
        }
    }
}

pub(crate) fn scheme_of(address: &str) -> Option<String> {
    let (scheme, _) = address.split_once("://")?;
    if scheme.is_empty() {
        return None;
    }
    Some(scheme.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_is_lowercased() {
        assert_eq!(
            scheme_of("HTTPS://example.org/twtxt.txt").as_deref(),
            Some("https")
        );
    }

    #[test]
    fn test_scheme_missing() {
        assert_eq!(scheme_of("/home/bob/twtxt.txt"), None);
        assert_eq!(scheme_of("://nowhere"), None);
    }
}

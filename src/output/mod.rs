//! Turning records into terminal text.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use crossterm::style::Stylize;
use regex::{Captures, Regex};
use url::Url;

use crate::config::Config;
use crate::domain::Record;

static BARE_MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@([_a-zA-Z0-9]+)").expect("valid mention pattern"));

static FULL_MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@<([^ ]+) *([^>]+)>").expect("valid mention pattern"));

/// `> nick (age)` followed by the indented text.
pub fn format_record(record: &Record, now: DateTime<Utc>, config: &Config) -> String {
    format!(
        "> {} ({})\n  {}",
        record.origin.nick.as_str().underlined(),
        pretty_duration(now - record.created),
        shorten_mentions(&record.text, config)
    )
}

/// Tab separated, unstyled: nick, timestamp, text.
pub fn format_record_raw(record: &Record) -> String {
    format!(
        "{}\t{}\t{}",
        record.origin.nick,
        record.created.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        record.text
    )
}

/// Compact age such as `45s ago`, `1h 2m ago`, `2d 1h ago`, `3w ago`.
pub fn pretty_duration(age: TimeDelta) -> String {
    let mut s = age.num_seconds().max(0);
    let d = s / 86400;
    s %= 86400;

    if d >= 365 {
        return format!("{}y {}w ago", d / 365, d % 365 / 7);
    }
    if d >= 14 {
        return format!("{}w ago", d / 7);
    }

    let h = s / 3600;
    s %= 3600;
    if d > 0 {
        if h > 0 && d <= 6 {
            return format!("{}d {}h ago", d, h);
        }
        return format!("{}d ago", d);
    }

    let m = s / 60;
    s %= 60;
    match (h, m) {
        (0, 0) => format!("{}s ago", s),
        (0, m) => format!("{}m ago", m),
        (h, 0) => format!("{}h ago", h),
        (h, m) => format!("{}h {}m ago", h, m),
    }
}

/// Canonical form used to decide whether two feed URLs are the same feed.
///
/// Scheme is folded to http, default ports, user info and trailing slashes
/// are dropped, dot segments resolved and unreserved characters decoded.
pub fn normalize_url(raw: &str) -> Option<String> {
    if raw.is_empty() {
        return None;
    }

    let url = Url::parse(raw).ok()?;
    let host = url.host_str()?;

    let scheme = match url.scheme() {
        "https" => "http",
        other => other,
    };
    let port = url.port().filter(|p| !(scheme == "http" && *p == 80));

    let mut normalized = format!("{}://{}", scheme, host);
    if let Some(port) = port {
        normalized.push_str(&format!(":{}", port));
    }
    normalized.push_str(decode_unreserved(url.path()).trim_end_matches('/'));
    if let Some(query) = url.query() {
        normalized.push('?');
        normalized.push_str(query);
    }

    Some(normalized)
}

fn decode_unreserved(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut rest = path;

    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let decoded = rest
            .get(pos + 1..pos + 3)
            .and_then(|hex| u8::from_str_radix(hex, 16).ok())
            .map(char::from)
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~'));

        match decoded {
            Some(c) => {
                out.push(c);
                rest = &rest[pos + 3..];
            }
            None => {
                out.push('%');
                rest = &rest[pos + 1..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// Turns `@nick` into `@<nick address>` for nicks we follow.
pub fn expand_mentions(text: &str, following: &BTreeMap<String, String>) -> String {
    BARE_MENTION
        .replace_all(text, |caps: &Captures| match following.get(&caps[1]) {
            Some(address) => format!("@<{} {}>", &caps[1], address),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Turns `@<nick address>` into `@nick` when we know the address.
///
/// If we follow the address under another nick, that nick is shown in
/// parentheses. Mentions of ourselves are highlighted differently.
pub fn shorten_mentions(text: &str, config: &Config) -> String {
    FULL_MENTION
        .replace_all(text, |caps: &Captures| {
            let (nick, url) = (&caps[1], &caps[2]);
            match config.url_to_nick(url) {
                Some(known_as) => format_mention(nick, url, known_as, config),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn format_mention(nick: &str, url: &str, known_as: &str, config: &Config) -> String {
    let mut label = format!("@{}", nick);
    if known_as != nick {
        label.push_str(&format!("({})", known_as));
    }

    if config.is_own_url(url) {
        label.blue().to_string()
    } else {
        label.bold().to_string()
    }
}

//! Proxy listing parsers
//!
//! Two listing layouts are understood:
//! - HTML tables in the free-proxy-list.net family (IP, Port, Code, Country,
//!   Anonymity, Google, Https, Last Checked)
//! - plain text, one `IP:PORT` or `scheme://IP:PORT` per line

use crate::proxy::models::{Anonymity, ProxyCandidate, ProxyCandidateBuilder, Scheme};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::net::IpAddr;

static URL_LINE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i)(https?)://([^:/@\s]+):(\d{1,5})/?$").expect("Invalid URL line regex")
});

/// Regex pattern to match IP:PORT patterns anywhere in text
static IP_PORT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}):(\d{1,5})\b")
        .expect("Invalid IP:PORT regex")
});

static ROW_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<tr[^>]*>(.*?)</tr>").expect("Invalid row regex"));

static CELL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<td[^>]*>(.*?)</td>").expect("Invalid cell regex"));

static TAG_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("Invalid tag regex"));

static AGE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+)\s*(sec|second|min|minute|hour|hr|day)s?\b").expect("Invalid age regex")
});

/// An address read from a plain-text listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedAddress {
    pub host: String,
    pub port: u16,
    /// Scheme prefix the line carried, if any
    pub scheme: Option<Scheme>,
}

/// Stateless parser for proxy listings
pub struct ProxyParser;

impl ProxyParser {
    /// Parse a single plain-text line
    ///
    /// Supports formats:
    /// - IP:PORT
    /// - scheme://IP:PORT (http or https)
    pub fn parse_line(line: &str) -> Option<ListedAddress> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        if let Some(caps) = URL_LINE_REGEX.captures(line) {
            let scheme = match caps[1].to_lowercase().as_str() {
                "https" => Scheme::Https,
                _ => Scheme::Http,
            };
            let port = parse_port(&caps[3])?;
            return Some(ListedAddress {
                host: caps[2].to_string(),
                port,
                scheme: Some(scheme),
            });
        }

        let (host, port) = line.split_once(':')?;
        if host.is_empty() || host.contains(char::is_whitespace) {
            return None;
        }
        Some(ListedAddress {
            host: host.to_string(),
            port: parse_port(port)?,
            scheme: None,
        })
    }

    /// Parse a plain-text listing.
    ///
    /// Lines are parsed one by one; when no line parses, IP:PORT pairs are
    /// extracted from anywhere in the text instead. The source declares the
    /// anonymity and HTTPS support of its entries, an `https://` prefix on a
    /// line also marks that entry as HTTPS capable.
    pub fn parse_plain_text(
        content: &str,
        source: &str,
        anonymity: Anonymity,
        https: bool,
        fetched_at: DateTime<Utc>,
    ) -> Vec<ProxyCandidateBuilder> {
        let mut listed: Vec<ListedAddress> = content.lines().filter_map(Self::parse_line).collect();

        if listed.is_empty() {
            listed = Self::extract_with_regex(content);
        }

        listed
            .into_iter()
            .map(|entry| {
                ProxyCandidate::builder(entry.host, entry.port)
                    .anonymity(anonymity)
                    .supports_https(https || entry.scheme == Some(Scheme::Https))
                    .source_timestamp(fetched_at)
                    .source(source)
            })
            .collect()
    }

    /// Extract IPv4 IP:PORT pairs embedded in arbitrary text
    pub fn extract_with_regex(content: &str) -> Vec<ListedAddress> {
        IP_PORT_REGEX
            .captures_iter(content)
            .filter_map(|cap| {
                let host = cap.get(1)?.as_str();
                host.parse::<IpAddr>().ok()?;
                let port = parse_port(cap.get(2)?.as_str())?;
                Some(ListedAddress {
                    host: host.to_string(),
                    port,
                    scheme: None,
                })
            })
            .collect()
    }

    /// Parse an HTML proxy table.
    ///
    /// Rows that do not start with a valid IP and port, or whose anonymity
    /// column is not recognised, are skipped. Header rows use `<th>` and are
    /// skipped the same way.
    pub fn parse_table(html: &str, source: &str, fetched_at: DateTime<Utc>) -> Vec<ProxyCandidateBuilder> {
        ROW_REGEX
            .captures_iter(html)
            .filter_map(|row| {
                let cells: Vec<String> = CELL_REGEX
                    .captures_iter(&row[1])
                    .map(|cell| cell_text(&cell[1]))
                    .collect();
                Self::parse_row(&cells, source, fetched_at)
            })
            .collect()
    }

    fn parse_row(
        cells: &[String],
        source: &str,
        fetched_at: DateTime<Utc>,
    ) -> Option<ProxyCandidateBuilder> {
        if cells.len() < 7 {
            return None;
        }

        let host = cells[0].as_str();
        host.parse::<IpAddr>().ok()?;
        let port = parse_port(&cells[1])?;
        let anonymity = Anonymity::from_listing(&cells[4])?;

        let timestamp = cells
            .get(7)
            .and_then(|age| parse_age(age))
            .and_then(|age| fetched_at.checked_sub_signed(age))
            .unwrap_or(fetched_at);

        Some(
            ProxyCandidate::builder(host, port)
                .country_code(Some(cells[2].as_str()))
                .anonymity(anonymity)
                .google(parse_yes_no(&cells[5]))
                .supports_https(parse_yes_no(&cells[6]).unwrap_or(false))
                .source_timestamp(timestamp)
                .source(source),
        )
    }
}

fn parse_port(s: &str) -> Option<u16> {
    match s.trim().parse::<u16>() {
        Ok(0) | Err(_) => None,
        Ok(port) => Some(port),
    }
}

fn cell_text(raw: &str) -> String {
    TAG_REGEX
        .replace_all(raw, "")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .trim()
        .to_string()
}

/// Parse a "yes" / "no" column; anything else is unknown
pub fn parse_yes_no(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "yes" => Some(true),
        "no" => Some(false),
        _ => None,
    }
}

/// Parse a "last checked" column such as `34 secs ago` or `1 hour 2 mins ago`
pub fn parse_age(s: &str) -> Option<ChronoDuration> {
    let mut total = ChronoDuration::zero();
    let mut matched = false;

    for cap in AGE_REGEX.captures_iter(s) {
        let amount: i64 = cap[1].parse().ok()?;
        let unit = cap[2].to_lowercase();
        let part = match unit.as_str() {
            "sec" | "second" => ChronoDuration::try_seconds(amount),
            "min" | "minute" => ChronoDuration::try_minutes(amount),
            "hour" | "hr" => ChronoDuration::try_hours(amount),
            "day" => ChronoDuration::try_days(amount),
            _ => continue,
        };
        total = total.checked_add(&part?)?;
        matched = true;
    }

    matched.then_some(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = r#"
<section id="list">
<table class="table table-striped table-bordered">
<thead><tr><th>IP Address</th><th>Port</th><th>Code</th><th>Country</th><th>Anonymity</th><th>Google</th><th>Https</th><th>Last Checked</th></tr></thead>
<tbody>
<tr><td>10.0.0.1</td><td>8080</td><td>US</td><td class='hm'>United States</td><td>elite proxy</td><td class='hm'>no</td><td class='hx'>yes</td><td class='hm'>1 min ago</td></tr>
<tr><td>10.0.0.2</td><td>3128</td><td>GB</td><td class='hm'>United Kingdom</td><td>anonymous</td><td class='hm'>yes</td><td class='hx'>no</td><td class='hm'>34 secs ago</td></tr>
<tr><td>10.0.0.3</td><td>80</td><td></td><td class='hm'>Unknown</td><td>transparent</td><td class='hm'></td><td class='hx'>no</td><td class='hm'>2 hours 5 mins ago</td></tr>
<tr><td>not-an-ip</td><td>80</td><td>US</td><td>x</td><td>elite proxy</td><td>no</td><td>no</td><td>1 min ago</td></tr>
</tbody>
</table>
</section>
"#;

    #[test]
    fn test_parse_simple_format() {
        let entry = ProxyParser::parse_line("192.168.1.1:8080").unwrap();
        assert_eq!(entry.host, "192.168.1.1");
        assert_eq!(entry.port, 8080);
        assert_eq!(entry.scheme, None);
    }

    #[test]
    fn test_parse_url_format() {
        let entry = ProxyParser::parse_line("https://192.168.1.1:8080/").unwrap();
        assert_eq!(entry.host, "192.168.1.1");
        assert_eq!(entry.port, 8080);
        assert_eq!(entry.scheme, Some(Scheme::Https));

        let entry = ProxyParser::parse_line("HTTP://proxy.example.com:3128").unwrap();
        assert_eq!(entry.host, "proxy.example.com");
        assert_eq!(entry.scheme, Some(Scheme::Http));
    }

    #[test]
    fn test_parse_empty_and_comment_lines() {
        assert!(ProxyParser::parse_line("").is_none());
        assert!(ProxyParser::parse_line("# This is a comment").is_none());
    }

    #[test]
    fn test_parse_invalid_format() {
        assert!(ProxyParser::parse_line("invalid").is_none());
        assert!(ProxyParser::parse_line("192.168.1.1").is_none());
        assert!(ProxyParser::parse_line("192.168.1.1:abc").is_none());
        assert!(ProxyParser::parse_line("192.168.1.1:0").is_none());
        assert!(ProxyParser::parse_line("192.168.1.1:70000").is_none());
        assert!(ProxyParser::parse_line("socks5://192.168.1.1:1080").is_none());
    }

    #[test]
    fn test_parse_plain_text() {
        let content = r#"
# HTTP Proxies
192.168.1.1:8080
https://192.168.1.2:3128
garbage line
"#;
        let now = Utc::now();
        let proxies: Vec<_> =
            ProxyParser::parse_plain_text(content, "plain", Anonymity::Anonymous, false, now)
                .into_iter()
                .map(|b| b.build())
                .collect();
        assert_eq!(proxies.len(), 2);
        assert_eq!(proxies[0].address(), "192.168.1.1:8080");
        assert!(!proxies[0].supports_https());
        assert!(proxies[1].supports_https());
        assert_eq!(proxies[0].anonymity(), Anonymity::Anonymous);
        assert_eq!(proxies[0].source(), "plain");
        assert_eq!(proxies[0].source_timestamp(), now);
    }

    #[test]
    fn test_parse_plain_text_falls_back_to_regex() {
        let content = "<p>Here is a proxy: 192.168.1.1:8080 and another one 10.0.0.1:3128.</p>";
        let proxies =
            ProxyParser::parse_plain_text(content, "html", Anonymity::Transparent, false, Utc::now());
        assert_eq!(proxies.len(), 2);
    }

    #[test]
    fn test_extract_rejects_invalid_ip_and_port() {
        assert!(ProxyParser::extract_with_regex("999.999.999.999:8080").is_empty());
        assert!(ProxyParser::extract_with_regex("192.168.1.1:0").is_empty());
    }

    #[test]
    fn test_parse_table() {
        let now = Utc::now();
        let proxies: Vec<_> = ProxyParser::parse_table(TABLE, "fpl", now)
            .into_iter()
            .map(|b| b.build())
            .collect();
        assert_eq!(proxies.len(), 3);

        let first = &proxies[0];
        assert_eq!(first.address(), "10.0.0.1:8080");
        assert_eq!(first.country_code(), Some("US"));
        assert_eq!(first.anonymity(), Anonymity::Elite);
        assert_eq!(first.google(), Some(false));
        assert!(first.supports_https());
        assert_eq!(first.source_timestamp(), now - ChronoDuration::minutes(1));

        let second = &proxies[1];
        assert_eq!(second.anonymity(), Anonymity::Anonymous);
        assert_eq!(second.google(), Some(true));
        assert!(!second.supports_https());

        let third = &proxies[2];
        assert_eq!(third.country_code(), None);
        assert_eq!(third.google(), None);
        assert_eq!(third.anonymity(), Anonymity::Transparent);
    }

    #[test]
    fn test_parse_table_without_rows() {
        assert!(ProxyParser::parse_table("<html><body>Access denied</body></html>", "x", Utc::now())
            .is_empty());
    }

    #[test]
    fn test_parse_age() {
        assert_eq!(parse_age("34 secs ago"), Some(ChronoDuration::seconds(34)));
        assert_eq!(parse_age("1 min ago"), Some(ChronoDuration::minutes(1)));
        assert_eq!(
            parse_age("2 hours 5 mins ago"),
            Some(ChronoDuration::hours(2) + ChronoDuration::minutes(5))
        );
        assert_eq!(parse_age("3 days ago"), Some(ChronoDuration::days(3)));
        assert_eq!(parse_age("just now"), None);
    }

    #[test]
    fn test_parse_yes_no() {
        assert_eq!(parse_yes_no("yes"), Some(true));
        assert_eq!(parse_yes_no(" No "), Some(false));
        assert_eq!(parse_yes_no(""), None);
    }
}

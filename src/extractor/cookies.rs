//! Netscape cookie files handed to yt-dlp
//!
//! Instagram and some TikTok listings only answer to a logged-in session. The
//! dashboard accepts a browser export in the Netscape format, stores it under
//! the data directory and reports which platforms it carries cookies for.

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

use crate::models::Platform;

/// File name of an uploaded cookie file inside the data directory
pub const COOKIE_FILE_NAME: &str = "cookies.txt";

pub const MAX_COOKIE_FILE_BYTES: usize = 1024 * 1024;

const HTTP_ONLY_PREFIX: &str = "#HttpOnly_";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CookieFileError {
    #[error("The cookie file is empty")]
    Empty,

    #[error("The cookie file is larger than {max} bytes")]
    TooLarge { max: usize },

    #[error("The cookie file is not a text file")]
    NotText,

    #[error("Line {line} is not a Netscape cookie entry")]
    MalformedLine { line: usize },

    #[error("The cookie file has no cookies for YouTube, TikTok or Instagram")]
    NoPlatformCookies,

    #[error("Cannot read cookie file {path}: {message}")]
    Unreadable { path: String, message: String },
}

/// Cookies found for one platform
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PlatformCookies {
    pub platform: Platform,
    pub cookies: usize,
    pub expired: usize,
    /// When the last persistent cookie of the platform lapses
    pub valid_until: Option<DateTime<Utc>>,
}

impl PlatformCookies {
    pub fn is_usable(&self) -> bool {
        self.cookies > self.expired
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CookieReport {
    pub total: usize,
    /// In [`Platform::ALL`] order, only platforms with at least one cookie
    pub platforms: Vec<PlatformCookies>,
}

impl CookieReport {
    /// Whether some platform still has an unexpired cookie
    pub fn is_usable(&self) -> bool {
        self.platforms.iter().any(PlatformCookies::is_usable)
    }

    pub fn summary(&self) -> String {
        let parts: Vec<String> = self
            .platforms
            .iter()
            .map(|p| {
                if p.is_usable() {
                    format!("{} ({} cookies)", p.platform.label(), p.cookies)
                } else {
                    format!("{} (expired)", p.platform.label())
                }
            })
            .collect();
        parts.join(", ")
    }
}

fn platform_for_domain(domain: &str) -> Option<Platform> {
    let host = domain.trim_start_matches('.').to_ascii_lowercase();
    let matches = |base: &str| host == base || host.ends_with(&format!(".{}", base));
    if matches("youtube.com") || matches("google.com") {
        Some(Platform::YouTube)
    } else if matches("tiktok.com") {
        Some(Platform::TikTok)
    } else if matches("instagram.com") {
        Some(Platform::Instagram)
    } else {
        None
    }
}

/// Validate the contents of a cookie file and summarize it
///
/// Every non-comment line must have the seven tab separated Netscape fields.
/// An expiry of `0` marks a session cookie, which never counts as expired.
pub fn inspect_cookies(content: &[u8], now: DateTime<Utc>) -> Result<CookieReport, CookieFileError> {
    if content.len() > MAX_COOKIE_FILE_BYTES {
        return Err(CookieFileError::TooLarge {
            max: MAX_COOKIE_FILE_BYTES,
        });
    }
    let text = std::str::from_utf8(content).map_err(|_| CookieFileError::NotText)?;

    let mut total = 0;
    let mut platforms: Vec<PlatformCookies> = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let entry = match line.strip_prefix(HTTP_ONLY_PREFIX) {
            Some(entry) => entry,
            None if line.starts_with('#') => continue,
            None => line,
        };

        let fields: Vec<&str> = entry.split('\t').collect();
        if fields.len() != 7 {
            return Err(CookieFileError::MalformedLine { line: index + 1 });
        }
        let expiry: i64 = fields[4]
            .trim()
            .parse()
            .map_err(|_| CookieFileError::MalformedLine { line: index + 1 })?;
        total += 1;

        let Some(platform) = platform_for_domain(fields[0]) else {
            continue;
        };
        let position = match platforms.iter().position(|p| p.platform == platform) {
            Some(position) => position,
            None => {
                platforms.push(PlatformCookies {
                    platform,
                    cookies: 0,
                    expired: 0,
                    valid_until: None,
                });
                platforms.len() - 1
            }
        };
        let entry = &mut platforms[position];
        entry.cookies += 1;

        if expiry > 0 {
            match Utc.timestamp_opt(expiry, 0).single() {
                Some(expires_at) if expires_at <= now => entry.expired += 1,
                Some(expires_at) => {
                    entry.valid_until = entry.valid_until.max(Some(expires_at));
                }
                None => return Err(CookieFileError::MalformedLine { line: index + 1 }),
            }
        }
    }

    if total == 0 {
        return Err(CookieFileError::Empty);
    }
    if platforms.is_empty() {
        return Err(CookieFileError::NoPlatformCookies);
    }

    platforms.sort_by_key(|p| Platform::ALL.iter().position(|all| *all == p.platform));
    Ok(CookieReport { total, platforms })
}

/// Read and inspect a configured cookie file
pub async fn inspect_cookie_file(
    path: &Path,
    now: DateTime<Utc>,
) -> Result<CookieReport, CookieFileError> {
    let content = tokio::fs::read(path)
        .await
        .map_err(|e| CookieFileError::Unreadable {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
    inspect_cookies(&content, now)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "# Netscape HTTP Cookie File\n# This is a generated file!\n\n";

    fn line(domain: &str, name: &str, expiry: i64) -> String {
        format!("{}\tTRUE\t/\tTRUE\t{}\t{}\tvalue\n", domain, expiry, name)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_counts_cookies_per_platform() {
        let future = now().timestamp() + 86_400;
        let content = format!(
            "{}{}{}#HttpOnly_{}{}",
            HEADER,
            line(".instagram.com", "sessionid", future),
            line(".instagram.com", "csrftoken", 0),
            line(".youtube.com", "LOGIN_INFO", future),
            line(".example.org", "other", future),
        );

        let report = inspect_cookies(content.as_bytes(), now()).unwrap();
        assert_eq!(report.total, 4);
        assert_eq!(report.platforms.len(), 2);
        assert_eq!(report.platforms[0].platform, Platform::YouTube);
        assert_eq!(report.platforms[1].platform, Platform::Instagram);
        assert_eq!(report.platforms[1].cookies, 2);
        assert_eq!(report.platforms[1].expired, 0);
        assert_eq!(
            report.platforms[1].valid_until,
            Utc.timestamp_opt(future, 0).single()
        );
        assert!(report.is_usable());
        assert_eq!(report.summary(), "YouTube (1 cookies), Instagram (2 cookies)");
    }

    #[test]
    fn test_expired_cookies_are_not_usable() {
        let past = now().timestamp() - 60;
        let content = format!("{}{}", HEADER, line(".instagram.com", "sessionid", past));

        let report = inspect_cookies(content.as_bytes(), now()).unwrap();
        assert_eq!(report.platforms[0].expired, 1);
        assert!(!report.is_usable());
        assert_eq!(report.summary(), "Instagram (expired)");
    }

    #[test]
    fn test_rejects_invalid_files() {
        assert_eq!(inspect_cookies(b"", now()), Err(CookieFileError::Empty));
        assert_eq!(inspect_cookies(HEADER.as_bytes(), now()), Err(CookieFileError::Empty));
        assert_eq!(
            inspect_cookies(b"session=abc; path=/", now()),
            Err(CookieFileError::MalformedLine { line: 1 })
        );
        assert_eq!(
            inspect_cookies(&[0xff, 0xfe, 0x00], now()),
            Err(CookieFileError::NotText)
        );

        let content = format!("{}{}", HEADER, line(".example.org", "id", 0));
        assert_eq!(
            inspect_cookies(content.as_bytes(), now()),
            Err(CookieFileError::NoPlatformCookies)
        );

        let oversized = vec![b'#'; MAX_COOKIE_FILE_BYTES + 1];
        assert!(matches!(
            inspect_cookies(&oversized, now()),
            Err(CookieFileError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_domain_matching() {
        assert_eq!(platform_for_domain(".www.tiktok.com"), Some(Platform::TikTok));
        assert_eq!(platform_for_domain("instagram.com"), Some(Platform::Instagram));
        assert_eq!(platform_for_domain("notinstagram.com"), None);
    }
}

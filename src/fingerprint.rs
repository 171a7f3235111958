//! Browser identity sent to upstream sources.
//!
//! The sources only serve pages to something that looks like a desktop
//! browser with a French locale. One fixed Chrome profile is used for every
//! request so that page fetches and proxied stream fetches present the same
//! identity.

use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, ORIGIN, REFERER, USER_AGENT,
};

/// Chrome on Windows, the most common desktop profile.
pub const CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Referer/Origin presented by the stream proxy. Stream hosts check these
/// against the site that embeds their player.
pub const PROXY_REFERER: &str = "https://xalaflix.io/";
pub const PROXY_ORIGIN: &str = "https://xalaflix.io";

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";
const ACCEPT_JSON: &str = "application/json";
const ACCEPT_LANGUAGE_FR: &str = "fr-FR,fr;q=0.9,en-US;q=0.8,en;q=0.7";

/// What a source expects to receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptKind {
    Html,
    Json,
}

/// Browser profile with a fixed fingerprint.
#[derive(Debug, Clone)]
pub struct BrowserProfile {
    pub user_agent: &'static str,
    pub accept: &'static str,
    pub accept_language: &'static str,
    pub sec_ch_ua: &'static str,
    pub sec_ch_ua_mobile: &'static str,
    pub sec_ch_ua_platform: &'static str,
}

/// The desktop Chrome profile used for all source traffic.
#[must_use]
pub fn chrome_profile() -> BrowserProfile {
    BrowserProfile {
        user_agent: CHROME_USER_AGENT,
        accept: ACCEPT_HTML,
        accept_language: ACCEPT_LANGUAGE_FR,
        sec_ch_ua: "\"Not_A Brand\";v=\"8\", \"Chromium\";v=\"120\", \"Google Chrome\";v=\"120\"",
        sec_ch_ua_mobile: "?0",
        sec_ch_ua_platform: "\"Windows\"",
    }
}

impl BrowserProfile {
    /// Default headers installed on the shared client.
    pub fn to_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        headers.insert(USER_AGENT, HeaderValue::from_static(self.user_agent));
        headers.insert(ACCEPT, HeaderValue::from_static(self.accept));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(self.accept_language));
        headers.insert(
            HeaderName::from_static("sec-ch-ua"),
            HeaderValue::from_static(self.sec_ch_ua),
        );
        headers.insert(
            HeaderName::from_static("sec-ch-ua-mobile"),
            HeaderValue::from_static(self.sec_ch_ua_mobile),
        );
        headers.insert(
            HeaderName::from_static("sec-ch-ua-platform"),
            HeaderValue::from_static(self.sec_ch_ua_platform),
        );

        headers
    }
}

/// Per-request headers a source adds on top of the profile: its own
/// Referer/Origin and the content type it serves.
pub fn site_headers(site: &str, accept: AcceptKind) -> HeaderMap {
    let mut headers = HeaderMap::new();

    let accept = match accept {
        AcceptKind::Html => ACCEPT_HTML,
        AcceptKind::Json => ACCEPT_JSON,
    };
    headers.insert(ACCEPT, HeaderValue::from_static(accept));

    let origin = site.trim_end_matches('/');
    if let Ok(value) = HeaderValue::from_str(&format!("{origin}/")) {
        headers.insert(REFERER, value);
    }
    if let Ok(value) = HeaderValue::from_str(origin) {
        headers.insert(ORIGIN, value);
    }

    headers
}

/// Identity header set sent with every proxied stream request.
pub fn proxy_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(CHROME_USER_AGENT));
    headers.insert(REFERER, HeaderValue::from_static(PROXY_REFERER));
    headers.insert(ORIGIN, HeaderValue::from_static(PROXY_ORIGIN));
    headers
}

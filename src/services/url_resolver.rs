//! Turns address-bar input into loadable urls and classifies urls the host
//! can render natively.

use url::Url;

use crate::types::settings::NavigationSettings;

pub struct UrlResolver {
    native_hosts: Vec<String>,
    search_url: String,
}

impl UrlResolver {
    pub fn new(settings: &NavigationSettings) -> Self {
        Self {
            native_hosts: settings.native_hosts.clone(),
            search_url: settings.search_url.clone(),
        }
    }

    /// Normalizes raw user input into a fully qualified url.
    ///
    /// - `about:` urls and urls with an explicit http(s) scheme pass through
    /// - bare hostnames (`example.com/page`) get `https://`
    /// - anything else becomes a search
    pub fn resolve_input(&self, input: &str) -> String {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return "about:blank".to_string();
        }
        if trimmed.starts_with("about:") {
            return trimmed.to_string();
        }
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            return trimmed.to_string();
        }
        if looks_like_host(trimmed) {
            return format!("https://{}", trimmed);
        }
        self.search(trimmed)
    }

    fn search(&self, query: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
        self.search_url.replace("{}", &encoded)
    }

    /// Whether `url` points at a site whose pages the app has native views for.
    pub fn is_app_supported(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        let Some(host) = parsed.host_str() else {
            return false;
        };
        self.native_hosts
            .iter()
            .any(|native| host == native || host.ends_with(&format!(".{}", native)))
    }
}

fn looks_like_host(input: &str) -> bool {
    if input.contains(char::is_whitespace) {
        return false;
    }
    let host = input.split(['/', '?', '#']).next().unwrap_or_default();
    let host = host.split(':').next().unwrap_or_default();
    host == "localhost" || (host.contains('.') && !host.starts_with('.') && !host.ends_with('.'))
}

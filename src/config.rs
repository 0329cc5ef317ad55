use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::{
    Error, Result, BASE_URL, PAGES, PAGE_DELAY_MS, START_PAGE, STORE_PATH, TIMEOUT_SECS,
    USER_AGENT,
};

/// Everything a run needs. Built once and handed to the fetcher and the driver.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub base_url: String,
    pub pages: usize,
    pub start_page: usize,
    pub store_path: PathBuf,
    pub page_delay: Duration,
    pub timeout: Duration,
    pub user_agent: String,
    /// When non-empty, these communities are refreshed from their about endpoint
    /// instead of crawling the listing.
    pub refresh: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.into(),
            pages: PAGES,
            start_page: START_PAGE,
            store_path: PathBuf::from(STORE_PATH),
            page_delay: Duration::from_millis(PAGE_DELAY_MS),
            timeout: Duration::from_secs(TIMEOUT_SECS),
            user_agent: USER_AGENT.into(),
            refresh: Vec::new(),
        }
    }
}

impl Config {
    /// Defaults overridden by `SUBSCRAP_*` variables. A `.env` file is read first if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(url) = lookup("SUBSCRAP_BASE_URL") {
            config.base_url = url.trim_end_matches('/').to_owned();
        }
        if let Some(v) = lookup("SUBSCRAP_PAGES") {
            config.pages = parse_var("SUBSCRAP_PAGES", v)?;
        }
        if let Some(v) = lookup("SUBSCRAP_START_PAGE") {
            config.start_page = parse_var("SUBSCRAP_START_PAGE", v)?;
            if config.start_page == 0 {
                return Err(Error::Config {
                    key: "SUBSCRAP_START_PAGE",
                    value: "0".into(),
                });
            }
        }
        if let Some(path) = lookup("SUBSCRAP_STORE_PATH") {
            config.store_path = PathBuf::from(path);
        }
        if let Some(v) = lookup("SUBSCRAP_PAGE_DELAY_MS") {
            config.page_delay = Duration::from_millis(parse_var("SUBSCRAP_PAGE_DELAY_MS", v)?);
        }
        if let Some(v) = lookup("SUBSCRAP_TIMEOUT_SECS") {
            config.timeout = Duration::from_secs(parse_var("SUBSCRAP_TIMEOUT_SECS", v)?);
        }
        if let Some(agent) = lookup("SUBSCRAP_USER_AGENT") {
            config.user_agent = agent;
        }
        if let Some(list) = lookup("SUBSCRAP_REFRESH") {
            config.refresh = list
                .split(',')
                .map(|name| name.trim().trim_start_matches("r/").to_owned())
                .filter(|name| !name.is_empty())
                .collect();
        }

        Ok(config)
    }

    pub fn listing_url(&self, page: usize) -> String {
        format!("{}/best/communities/{page}/", self.base_url)
    }

    pub fn about_url(&self, name: &str) -> String {
        format!("{}/r/{name}/about.json", self.base_url)
    }
}

fn parse_var<T: FromStr>(key: &'static str, value: String) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config { key, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn no_variables_gives_defaults() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.pages, 50);
        assert_eq!(config.start_page, 1);
    }

    #[test]
    fn variables_override_defaults() {
        let config = Config::from_lookup(lookup(&[
            ("SUBSCRAP_BASE_URL", "http://127.0.0.1:3000/"),
            ("SUBSCRAP_PAGES", "3"),
            ("SUBSCRAP_PAGE_DELAY_MS", "0"),
            ("SUBSCRAP_STORE_PATH", "/tmp/subs.json"),
            ("SUBSCRAP_REFRESH", "rust, r/python,,"),
        ]))
        .unwrap();

        assert_eq!(config.base_url, "http://127.0.0.1:3000");
        assert_eq!(config.pages, 3);
        assert_eq!(config.page_delay, Duration::ZERO);
        assert_eq!(config.store_path, PathBuf::from("/tmp/subs.json"));
        assert_eq!(config.refresh, ["rust", "python"]);
        assert_eq!(config.listing_url(2), "http://127.0.0.1:3000/best/communities/2/");
        assert_eq!(config.about_url("rust"), "http://127.0.0.1:3000/r/rust/about.json");
    }

    #[test]
    fn unparseable_value_is_a_config_error() {
        let err = Config::from_lookup(lookup(&[("SUBSCRAP_PAGES", "lots")])).unwrap_err();
        assert!(matches!(err, Error::Config { key: "SUBSCRAP_PAGES", .. }));

        let err = Config::from_lookup(lookup(&[("SUBSCRAP_START_PAGE", "0")])).unwrap_err();
        assert!(matches!(err, Error::Config { key: "SUBSCRAP_START_PAGE", .. }));
    }
}

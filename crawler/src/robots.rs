use parking_lot::RwLock;
use reqwest::{header, Client, Url};
use std::collections::HashMap;

/// Rules of the `*` group of one host's robots.txt.
#[derive(Debug, Clone, Default)]
pub struct Robots {
    allows: Vec<String>,
    disallows: Vec<String>,
    crawl_delay_ms: Option<u64>,
}

impl Robots {
    pub fn parse(txt: &str) -> Self {
        let mut active = false;
        let mut rules = Robots::default();
        for line in txt.lines() {
            let l = line.trim();
            if l.is_empty() || l.starts_with('#') { continue; }
            let Some((k, v)) = l.split_once(':') else { continue };
            let val = v.trim();
            match k.trim().to_lowercase().as_str() {
                "user-agent" => active = val == "*",
                "allow" if active && !val.is_empty() => rules.allows.push(val.to_string()),
                "disallow" if active && !val.is_empty() => rules.disallows.push(val.to_string()),
                "crawl-delay" if active => {
                    if let Ok(n) = val.parse::<f64>() { rules.crawl_delay_ms = Some((n * 1000.0) as u64); }
                }
                _ => {}
            }
        }
        rules
    }

    /// Longest matching rule wins; ties go to Allow.
    pub fn allows(&self, path: &str) -> bool {
        let longest = |rules: &[String]| rules.iter().filter(|r| path.starts_with(r.as_str())).map(String::len).max();
        match (longest(&self.allows[..]), longest(&self.disallows[..])) {
            (Some(a), Some(d)) => a >= d,
            (_, None) => true,
            (None, Some(_)) => false,
        }
    }

    pub fn crawl_delay_ms(&self) -> Option<u64> {
        self.crawl_delay_ms
    }
}

/// robots.txt per host, fetched once.
#[derive(Default)]
pub struct RobotsCache {
    hosts: RwLock<HashMap<String, Robots>>,
}

impl RobotsCache {
    pub async fn allowed(&self, client: &Client, url: &Url) -> bool {
        let Some(host) = url.host_str() else { return false };
        let cached = self.hosts.read().get(host).cloned();
        let rules = match cached {
            Some(r) => r,
            None => {
                let robots_url = format!("{}://{}/robots.txt", url.scheme(), host);
                let txt = match client.get(&robots_url).header(header::ACCEPT, "text/plain").send().await {
                    Ok(resp) if resp.status().is_success() => resp.text().await.unwrap_or_default(),
                    _ => String::new(),
                };
                let parsed = Robots::parse(&txt);
                self.hosts.write().insert(host.to_string(), parsed.clone());
                parsed
            }
        };
        rules.allows(url.path())
    }

    pub fn delay_ms(&self, url: &Url) -> Option<u64> {
        let host = url.host_str()?;
        self.hosts.read().get(host).and_then(Robots::crawl_delay_ms)
    }
}

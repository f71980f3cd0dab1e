use anyhow::{anyhow, Result};
use reqwest::Url;
use scraper::{Html, Selector};

/// What the crawler keeps of a fetched page.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub title: String,
    /// Text of every element matched by the content selector, one per line.
    pub text: String,
    pub links: Vec<Url>,
}

pub struct Extractor {
    title: Selector,
    content: Selector,
    link: Selector,
}

impl Extractor {
    pub fn new(content: &str) -> Result<Self> {
        let parse = |s: &str| Selector::parse(s).map_err(|e| anyhow!("invalid selector {s:?}: {e}"));
        Ok(Self { title: parse("title")?, content: parse(content)?, link: parse("a[href]")? })
    }

    pub fn extract(&self, html: &str, base: &Url) -> Page {
        let doc = Html::parse_document(html);
        let title = doc
            .select(&self.title)
            .next()
            .map(|n| n.text().collect::<String>())
            .unwrap_or_default();
        let text = doc
            .select(&self.content)
            .map(|n| n.text().collect::<String>())
            .filter(|t| !t.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        let mut links = Vec::new();
        for a in doc.select(&self.link) {
            if let Some(h) = a.value().attr("href") {
                if let Ok(mut u) = base.join(h) {
                    if u.scheme().starts_with("http") {
                        u.set_fragment(None);
                        links.push(u);
                    }
                }
            }
        }
        Page { title: title.trim().to_string(), text, links }
    }
}

/// Canonical form used as the index label: no fragment.
pub fn norm(u: &Url) -> String {
    let mut s = u.clone();
    s.set_fragment(None);
    s.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HTML: &str = r##"<html><head><title> Java (programming language) </title></head>
<body>
  <div id="nav"><a href="/wiki/Main_Page">Main</a></div>
  <p>Java is a <a href="/wiki/Programming_language#History">programming language</a>.</p>
  <p>   </p>
  <p>It runs on the <a href="https://example.org/jvm">JVM</a>.</p>
  <a href="mailto:someone@example.org">mail</a>
</body></html>"##;

    #[test]
    fn paragraphs_title_and_links() {
        let base = Url::parse("https://en.wikipedia.org/wiki/Java").unwrap();
        let page = Extractor::new("p").unwrap().extract(HTML, &base);
        assert_eq!(page.title, "Java (programming language)");
        assert_eq!(page.text, "Java is a programming language.\nIt runs on the JVM.");
        let links: Vec<String> = page.links.iter().map(|u| u.to_string()).collect();
        assert_eq!(
            links,
            vec![
                "https://en.wikipedia.org/wiki/Main_Page",
                "https://en.wikipedia.org/wiki/Programming_language",
                "https://example.org/jvm",
            ]
        );
    }

    #[test]
    fn bad_selector_is_rejected() {
        assert!(Extractor::new("p[").is_err());
    }

    #[test]
    fn norm_drops_fragment() {
        let u = Url::parse("https://a.test/x#frag").unwrap();
        assert_eq!(norm(&u), "https://a.test/x");
    }
}

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use nd_core::{Article, ArticleSource, Error, FeedSource, Result};
use scraper::Html;
use tracing::{debug, info, warn};
use url::Url;

use super::jsonld;
use super::utils;

pub const DEFAULT_LINK_SELECTOR: &str = "article a[href], h2 a[href], h3 a[href]";
const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct ScraperSettings {
    pub max_articles_per_source: usize,
    pub recency_window: chrono::Duration,
    pub request_timeout: Duration,
}

impl Default for ScraperSettings {
    fn default() -> Self {
        Self {
            max_articles_per_source: 10,
            recency_window: chrono::Duration::hours(24),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Generic listing-page scraper: follows article links found on the feed's
/// landing page and extracts title, body and publication date from each.
#[derive(Debug, Clone)]
pub struct HtmlSourceScraper {
    client: reqwest::Client,
    settings: ScraperSettings,
}

impl HtmlSourceScraper {
    pub fn new() -> Result<Self> {
        Self::with_settings(ScraperSettings::default())
    }

    pub fn with_settings(settings: ScraperSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(settings.request_timeout)
            .build()?;
        Ok(Self { client, settings })
    }

    pub fn settings(&self) -> &ScraperSettings {
        &self.settings
    }

    async fn fetch_page(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }

    async fn fetch_article(&self, feed: &FeedSource, url: &str, now: DateTime<Utc>) -> Option<Article> {
        match self.fetch_page(url).await {
            Ok(html) => {
                let article = parse_article(&html, url, feed, now);
                if article.is_none() {
                    debug!("No article content found at {}", url);
                }
                article
            }
            Err(e) => {
                warn!("Failed to fetch article {} from {}: {}", url, feed.name, e);
                None
            }
        }
    }
}

#[async_trait]
impl ArticleSource for HtmlSourceScraper {
    async fn fetch_articles(&self, feed: &FeedSource) -> Result<Vec<Article>> {
        let base = utils::parse_url(&feed.url)?;
        let listing = self
            .fetch_page(&feed.url)
            .await
            .map_err(|e| Error::source_unavailable(&feed.name, e.to_string()))?;

        let selector = feed.link_selector.as_deref().unwrap_or(DEFAULT_LINK_SELECTOR);
        let links = extract_links(&listing, &base, selector, self.settings.max_articles_per_source)?;
        debug!("{}: following {} links", feed.name, links.len());

        let now = Utc::now();
        let articles: Vec<Article> = join_all(links.iter().map(|link| self.fetch_article(feed, link, now)))
            .await
            .into_iter()
            .flatten()
            .collect();

        let fetched = articles.len();
        let recent = filter_recent(articles, now, self.settings.recency_window);
        info!("🔍 {}: {} articles, {} recent", feed.name, fetched, recent.len());
        Ok(recent)
    }
}

/// Absolute, de-duplicated article links on the listing page, restricted to
/// the listing's own site.
pub fn extract_links(html: &str, base: &Url, css: &str, limit: usize) -> Result<Vec<String>> {
    let selector = utils::selector(css)?;
    let document = Html::parse_document(html);
    let site = site_host(base);

    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for href in document.select(&selector).filter_map(|el| el.value().attr("href")) {
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') || href.starts_with("mailto:") || href.starts_with("javascript:") {
            continue;
        }
        let Ok(mut url) = base.join(href) else {
            continue;
        };
        url.set_fragment(None);
        if site_host(&url) != site || url.path() == base.path() {
            continue;
        }
        if seen.insert(url.to_string()) {
            links.push(url.to_string());
        }
        if links.len() >= limit {
            break;
        }
    }
    Ok(links)
}

fn site_host(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    host.strip_prefix("www.").unwrap_or(host).to_string()
}

/// Article extracted from a single page, or `None` when the page has no title.
pub fn parse_article(html: &str, url: &str, feed: &FeedSource, scraped_at: DateTime<Utc>) -> Option<Article> {
    let document = Html::parse_document(html);

    let title = utils::meta_content(&document, "meta[property='og:title']")
        .or_else(|| utils::first_text(&document, "h1"))
        .or_else(|| utils::first_text(&document, "title"))?;

    let body = ["article p", "main p", "p"]
        .iter()
        .find_map(|css| paragraphs(&document, css))
        .or_else(|| utils::meta_content(&document, "meta[name='description']"))
        .unwrap_or_default();

    let published_at = utils::meta_content(&document, "meta[property='article:published_time']")
        .and_then(|raw| jsonld::parse_timestamp(&raw))
        .or_else(|| time_element(&document))
        .or_else(|| jsonld::extract_date_published(&document))
        .unwrap_or(scraped_at);

    Some(
        Article::new(&feed.name, url, title, body)
            .published_at(published_at)
            .with_category_hint(&feed.category),
    )
}

fn paragraphs(document: &Html, css: &str) -> Option<String> {
    let selector = utils::selector(css).ok()?;
    let text = document
        .select(&selector)
        .map(utils::element_text)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n");
    (!text.is_empty()).then_some(text)
}

fn time_element(document: &Html) -> Option<DateTime<Utc>> {
    let selector = utils::selector("time[datetime]").ok()?;
    document
        .select(&selector)
        .filter_map(|el| el.value().attr("datetime"))
        .find_map(jsonld::parse_timestamp)
}

pub fn filter_recent(articles: Vec<Article>, now: DateTime<Utc>, window: chrono::Duration) -> Vec<Article> {
    let cutoff = now - window;
    articles.into_iter().filter(|a| a.published_at >= cutoff).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn feed() -> FeedSource {
        let mut feed = FeedSource::new("verge", "The Verge", "https://www.theverge.com/ai-artificial-intelligence");
        feed.category = "Tech Industry".to_string();
        feed
    }

    #[test]
    fn test_extract_links_resolves_and_filters() {
        let html = r##"
            <article><h2><a href="/2025/3/4/chip-deal">Chip deal</a></h2></article>
            <article><a href="https://www.theverge.com/2025/3/4/chip-deal#comments">Same</a></article>
            <h3><a href="https://ads.example.net/buy">Ad</a></h3>
            <h3><a href="#top">Top</a></h3>
            <h2><a href="https://theverge.com/2025/3/5/policy">Policy</a></h2>
        "##;
        let base = Url::parse("https://www.theverge.com/ai-artificial-intelligence").unwrap();
        let links = extract_links(html, &base, DEFAULT_LINK_SELECTOR, 10).unwrap();
        assert_eq!(
            links,
            vec![
                "https://www.theverge.com/2025/3/4/chip-deal".to_string(),
                "https://theverge.com/2025/3/5/policy".to_string(),
            ]
        );
    }

    #[test]
    fn test_extract_links_limit() {
        let html: String = (0..20)
            .map(|i| format!(r#"<article><a href="/story/{}">Story</a></article>"#, i))
            .collect();
        let base = Url::parse("https://example.com/").unwrap();
        assert_eq!(extract_links(&html, &base, DEFAULT_LINK_SELECTOR, 10).unwrap().len(), 10);
    }

    #[test]
    fn test_invalid_selector() {
        let base = Url::parse("https://example.com/").unwrap();
        assert!(matches!(
            extract_links("<a href='/x'>x</a>", &base, "a[[", 10),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_parse_article() {
        let html = r#"
            <html><head>
              <title>Site | Chip deal</title>
              <meta property="article:published_time" content="2025-03-04T08:00:00Z">
            </head><body>
              <h1>Nvidia signs chip deal</h1>
              <article><p>First paragraph.</p><p>Second  paragraph.</p></article>
              <footer><p>Footer</p></footer>
            </body></html>
        "#;
        let now = Utc.with_ymd_and_hms(2025, 3, 4, 12, 0, 0).unwrap();
        let article = parse_article(html, "https://www.theverge.com/a", &feed(), now).unwrap();
        assert_eq!(article.title, "Nvidia signs chip deal");
        assert_eq!(article.body_text, "First paragraph.\n\nSecond paragraph.");
        assert_eq!(article.source_name, "The Verge");
        assert_eq!(article.category_hint.as_deref(), Some("Tech Industry"));
        assert_eq!(article.published_at, Utc.with_ymd_and_hms(2025, 3, 4, 8, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_article_without_date_uses_scrape_time() {
        let html = "<h1>Title</h1><p>Body</p>";
        let now = Utc.with_ymd_and_hms(2025, 3, 4, 12, 0, 0).unwrap();
        let article = parse_article(html, "https://example.com/a", &feed(), now).unwrap();
        assert_eq!(article.published_at, now);
        assert_eq!(article.body_text, "Body");
    }

    #[test]
    fn test_parse_article_without_title() {
        let now = Utc::now();
        assert!(parse_article("<p>Only body</p>", "https://example.com/a", &feed(), now).is_none());
    }

    #[test]
    fn test_filter_recent() {
        let now = Utc.with_ymd_and_hms(2025, 3, 4, 12, 0, 0).unwrap();
        let fresh = Article::new("S", "https://s/1", "fresh", "").published_at(now - chrono::Duration::hours(3));
        let stale = Article::new("S", "https://s/2", "stale", "").published_at(now - chrono::Duration::hours(30));
        let recent = filter_recent(vec![fresh, stale], now, chrono::Duration::hours(24));
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].title, "fresh");
    }

    #[tokio::test]
    async fn test_unreachable_source_is_unavailable() {
        let scraper = HtmlSourceScraper::with_settings(ScraperSettings {
            request_timeout: Duration::from_millis(500),
            ..ScraperSettings::default()
        })
        .unwrap();
        let feed = FeedSource::new("nowhere", "Nowhere", "http://127.0.0.1:9/news");
        match scraper.fetch_articles(&feed).await {
            Err(Error::SourceUnavailable { source_name, .. }) => assert_eq!(source_name, "Nowhere"),
            other => panic!("expected SourceUnavailable, got {:?}", other.map(|a| a.len())),
        }
    }
}

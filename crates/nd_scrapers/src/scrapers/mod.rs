pub mod html;
pub mod jsonld;

/// Common utilities for scrapers
pub(crate) mod utils {
    use nd_core::{Error, Result};
    use scraper::{ElementRef, Html, Selector};
    use url::Url;

    pub fn parse_url(url: &str) -> Result<Url> {
        Url::parse(url).map_err(|e| Error::InvalidUrl(format!("{}: {}", url, e)))
    }

    pub fn selector(css: &str) -> Result<Selector> {
        Selector::parse(css).map_err(|e| Error::InvalidConfig(format!("Invalid selector {:?}: {}", css, e)))
    }

    pub fn element_text(el: ElementRef<'_>) -> String {
        el.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
    }

    pub fn first_text(document: &Html, css: &str) -> Option<String> {
        let selector = selector(css).ok()?;
        document
            .select(&selector)
            .map(element_text)
            .find(|text| !text.is_empty())
    }

    pub fn meta_content(document: &Html, css: &str) -> Option<String> {
        let selector = selector(css).ok()?;
        document
            .select(&selector)
            .filter_map(|el| el.value().attr("content"))
            .map(|c| c.trim().to_string())
            .find(|c| !c.is_empty())
    }
}

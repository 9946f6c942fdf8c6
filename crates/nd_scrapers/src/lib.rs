pub mod scrapers;

pub use scrapers::html::{HtmlSourceScraper, ScraperSettings};

pub mod prelude {
    pub use super::scrapers::html::{HtmlSourceScraper, ScraperSettings};
    pub use nd_core::{Article, ArticleSource, Error, FeedSource, Result};
}

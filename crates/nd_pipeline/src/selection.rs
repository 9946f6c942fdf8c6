use nd_core::{Category, FeedSource, NewsletterConfig, DEFAULT_CATEGORY};
use tracing::{debug, warn};

/// Feeds and categories a run works with, after defaults are applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSelection {
    pub feeds: Vec<FeedSource>,
    /// Ordered by priority, lowest first.
    pub categories: Vec<Category>,
}

impl RunSelection {
    /// Category names the summarizer may assign. Always ends with the
    /// default category.
    pub fn allowed_categories(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .categories
            .iter()
            .filter(|c| c.name != DEFAULT_CATEGORY)
            .map(|c| c.name.clone())
            .collect();
        names.push(DEFAULT_CATEGORY.to_string());
        names
    }

    /// Sort key for a category label: selected categories in priority order,
    /// then labels outside the selection, then the default category.
    pub fn category_rank(&self, label: &str) -> (u32, u32) {
        if label == DEFAULT_CATEGORY {
            return (u32::MAX, u32::MAX);
        }
        match self.categories.iter().find(|c| c.name == label) {
            Some(category) => (0, category.priority),
            None => (1, 0),
        }
    }

    pub fn category(&self, label: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.name == label)
    }
}

/// Expand the configured selection: an empty id list means every enabled
/// entry. Unknown ids are dropped with a warning and disabled entries are
/// never selected.
pub fn resolve_selection(config: &NewsletterConfig) -> RunSelection {
    let feeds = resolve(&config.feeds, &config.feed_ids, "feed", |f| &f.id, |f| f.enabled);
    let mut categories = resolve(&config.categories, &config.category_ids, "category", |c| &c.id, |c| c.enabled);
    categories.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id)));

    debug!(feeds = feeds.len(), categories = categories.len(), "Resolved run selection");
    RunSelection { feeds, categories }
}

fn resolve<T: Clone>(
    all: &[T],
    ids: &[String],
    kind: &str,
    id_of: impl Fn(&T) -> &String,
    enabled: impl Fn(&T) -> bool,
) -> Vec<T> {
    if ids.is_empty() {
        return all.iter().filter(|item| enabled(item)).cloned().collect();
    }

    let mut selected: Vec<T> = Vec::new();
    for id in ids {
        match all.iter().find(|item| id_of(item) == id) {
            Some(item) if !enabled(item) => warn!(kind, id = %id, "Skipping disabled {}", kind),
            Some(item) => {
                if !selected.iter().any(|s| id_of(s) == id) {
                    selected.push(item.clone());
                }
            }
            None => warn!(kind, id = %id, "Unknown {} id in selection", kind),
        }
    }
    selected
}

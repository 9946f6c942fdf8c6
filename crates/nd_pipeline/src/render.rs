//! HTML, Markdown and plain-text newsletter rendering.

use std::collections::BTreeSet;
use std::fmt::Write;

use chrono::{DateTime, Utc};
use nd_core::config::default_categories;
use nd_core::{Category, EnrichedStory, Error, RenderRequest, RenderedNewsletter, Renderer, Result};

const HIGH_IMPACT: u8 = 7;
const MAX_LISTED_SOURCES: usize = 3;

const STYLE: &str = r#"<style>
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; background: #f5f7fa; color: #333; margin: 0; }
.container { max-width: 720px; margin: 0 auto; background: #fff; }
.header { background: #4f46e5; color: #fff; padding: 32px 24px; text-align: center; }
.stats { display: flex; justify-content: space-around; padding: 16px; background: #eef2ff; }
.stat-number { display: block; font-size: 1.4em; font-weight: bold; }
.stat-label { font-size: 0.8em; color: #666; }
.story { padding: 20px 24px; border-bottom: 1px solid #eee; }
.story-meta span { margin-right: 12px; font-size: 0.85em; }
.consolidated-badge { background: #10b981; color: #fff; padding: 2px 6px; border-radius: 4px; }
.read-more { color: #4f46e5; text-decoration: none; font-weight: 600; }
.footer { padding: 24px; text-align: center; color: #888; font-size: 0.85em; }
</style>"#;

#[derive(Debug, Clone, Default)]
pub struct NewsletterStats {
    pub unique_stories: usize,
    pub sources_analyzed: usize,
    pub high_impact: usize,
    pub top_category: Option<String>,
}

impl NewsletterStats {
    pub fn from_stories(stories: &[EnrichedStory]) -> Self {
        let sources: BTreeSet<&str> = stories
            .iter()
            .flat_map(|s| s.story.source_names.iter().map(String::as_str))
            .collect();

        // First category to reach the highest count wins.
        let mut counts: Vec<(&str, usize)> = Vec::new();
        for story in stories {
            match counts.iter_mut().find(|(name, _)| *name == story.category()) {
                Some((_, n)) => *n += 1,
                None => counts.push((story.category(), 1)),
            }
        }
        let top_category = counts
            .iter()
            .fold(None::<(&str, usize)>, |best, &(name, n)| match best {
                Some((_, m)) if m >= n => best,
                _ => Some((name, n)),
            })
            .map(|(name, _)| name.to_string());

        Self {
            unique_stories: stories.len(),
            sources_analyzed: sources.len(),
            high_impact: stories.iter().filter(|s| s.impact_score() >= HIGH_IMPACT).count(),
            top_category,
        }
    }
}

/// Renders stories in the order given; ordering is the caller's job.
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    categories: Vec<Category>,
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new(default_categories())
    }
}

impl TemplateRenderer {
    pub fn new(categories: Vec<Category>) -> Self {
        Self { categories }
    }

    fn emoji(&self, label: &str) -> &str {
        self.categories
            .iter()
            .find(|c| c.name == label)
            .map(|c| c.emoji.as_str())
            .unwrap_or("📰")
    }

    fn html(&self, request: &RenderRequest<'_>, stats: &NewsletterStats) -> std::result::Result<String, std::fmt::Error> {
        let mut out = String::new();
        let date = long_date(request.generated_at);
        writeln!(out, "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">")?;
        writeln!(out, "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">")?;
        writeln!(out, "<title>{}</title>\n{}\n</head>\n<body>\n<div class=\"container\">", escape(request.title), STYLE)?;
        writeln!(
            out,
            "<div class=\"header\"><h1>🤖 {}</h1><p>Your curated AI &amp; technology newsletter for {}</p></div>",
            escape(request.title),
            date
        )?;

        if request.stories.is_empty() {
            writeln!(out, "<div class=\"content\"><h2>No Stories Available</h2>")?;
            writeln!(out, "<p>We weren't able to find any new AI/technology stories today. This might be due to:</p>")?;
            writeln!(
                out,
                "<ul><li>Technical issues with news source scraping</li><li>No new articles published in the last 24 hours</li><li>All articles were filtered out during deduplication</li></ul></div>"
            )?;
        } else {
            writeln!(out, "<div class=\"stats\">")?;
            for (value, label) in [
                (stats.unique_stories.to_string(), "Unique Stories"),
                (stats.sources_analyzed.to_string(), "Sources Analyzed"),
                (stats.high_impact.to_string(), "High Impact"),
                (stats.top_category.clone().unwrap_or_else(|| "N/A".to_string()), "Top Category"),
            ] {
                writeln!(
                    out,
                    "<div class=\"stat-item\"><span class=\"stat-number\">{}</span><span class=\"stat-label\">{}</span></div>",
                    escape(&value),
                    label
                )?;
            }
            writeln!(out, "</div>\n<div class=\"content\">")?;
            for story in request.stories {
                self.story_html(&mut out, story)?;
            }
            writeln!(out, "</div>")?;
        }

        writeln!(
            out,
            "<div class=\"footer\"><p><strong>{}</strong></p><p>Generated on {} at {} UTC</p></div>",
            escape(request.title),
            date,
            request.generated_at.format("%H:%M")
        )?;
        writeln!(out, "</div>\n</body>\n</html>")?;
        Ok(out)
    }

    fn story_html(&self, out: &mut String, enriched: &EnrichedStory) -> std::fmt::Result {
        let story = &enriched.story;
        let summary = enriched.enrichment.summary();
        writeln!(out, "<div class=\"story\">")?;
        writeln!(out, "<h2 class=\"story-title\">{}</h2>", escape(&story.canonical_title))?;
        write!(
            out,
            "<div class=\"story-meta\"><span class=\"story-category\">{} {}</span><span class=\"story-impact\">Impact: {} ({}/10)</span><span class=\"story-sources\">{}</span>",
            self.emoji(&summary.category_label),
            escape(&summary.category_label),
            stars(summary.impact_score),
            summary.impact_score,
            escape(&sources_line(enriched))
        )?;
        if story.is_consolidated {
            write!(out, "<span class=\"consolidated-badge\">CONSOLIDATED</span>")?;
        }
        writeln!(out, "</div>")?;
        writeln!(out, "<div class=\"story-summary\">{}</div>", escape(&summary.summary_text))?;
        if !summary.key_points.is_empty() {
            write!(out, "<div class=\"key-points\"><h4>Key Points:</h4><ul>")?;
            for point in &summary.key_points {
                write!(out, "<li>{}</li>", escape(point))?;
            }
            writeln!(out, "</ul></div>")?;
        }
        writeln!(
            out,
            "<a href=\"{}\" class=\"read-more\" target=\"_blank\" rel=\"noopener\">Read Full Article →</a>\n</div>",
            escape(&story.canonical_url)
        )
    }

    fn markdown(&self, request: &RenderRequest<'_>, stats: &NewsletterStats) -> std::result::Result<String, std::fmt::Error> {
        let mut out = String::new();
        writeln!(out, "# {}\n\n_{}_\n", request.title, long_date(request.generated_at))?;
        if request.stories.is_empty() {
            writeln!(out, "## No Stories Available\n\nNo new AI/technology stories were found today.")?;
            return Ok(out);
        }
        writeln!(
            out,
            "**{}** unique stories · **{}** sources · **{}** high impact\n",
            stats.unique_stories, stats.sources_analyzed, stats.high_impact
        )?;
        for enriched in request.stories {
            let summary = enriched.enrichment.summary();
            writeln!(out, "## {}\n", enriched.story.canonical_title)?;
            write!(
                out,
                "{} {} · Impact {} ({}/10) · {}",
                self.emoji(&summary.category_label),
                summary.category_label,
                stars(summary.impact_score),
                summary.impact_score,
                sources_line(enriched)
            )?;
            if enriched.story.is_consolidated {
                write!(out, " · **CONSOLIDATED**")?;
            }
            writeln!(out, "\n\n{}\n", summary.summary_text)?;
            for point in &summary.key_points {
                writeln!(out, "- {}", point)?;
            }
            writeln!(out, "\n[Read full article]({})\n", enriched.story.canonical_url)?;
        }
        Ok(out)
    }

    fn text(&self, request: &RenderRequest<'_>) -> std::result::Result<String, std::fmt::Error> {
        let mut out = String::new();
        writeln!(out, "{}\n{}\n", request.title, long_date(request.generated_at))?;
        if request.stories.is_empty() {
            writeln!(out, "No Stories Available")?;
            return Ok(out);
        }
        for (i, enriched) in request.stories.iter().enumerate() {
            let summary = enriched.enrichment.summary();
            writeln!(out, "{}. {}", i + 1, enriched.story.canonical_title)?;
            writeln!(
                out,
                "   {} | Impact {}/10 | {}",
                summary.category_label,
                summary.impact_score,
                sources_line(enriched)
            )?;
            writeln!(out, "   {}", summary.summary_text)?;
            for point in &summary.key_points {
                writeln!(out, "   - {}", point)?;
            }
            writeln!(out, "   {}\n", enriched.story.canonical_url)?;
        }
        Ok(out)
    }
}

impl Renderer for TemplateRenderer {
    fn render(&self, request: RenderRequest<'_>) -> Result<RenderedNewsletter> {
        let stats = NewsletterStats::from_stories(request.stories);
        let fault = |e: std::fmt::Error| Error::Render(e.to_string());
        Ok(RenderedNewsletter {
            title: request.title.to_string(),
            html: self.html(&request, &stats).map_err(fault)?,
            markdown: self.markdown(&request, &stats).map_err(fault)?,
            text: self.text(&request).map_err(fault)?,
            story_count: request.stories.len(),
        })
    }
}

fn long_date(at: DateTime<Utc>) -> String {
    at.format("%B %d, %Y").to_string()
}

fn stars(impact: u8) -> String {
    "⭐".repeat(usize::from(impact.min(5)))
}

fn sources_line(enriched: &EnrichedStory) -> String {
    let story = &enriched.story;
    if !story.is_consolidated {
        return story.canonical_source.clone();
    }
    let names: Vec<&str> = story.source_names.iter().map(String::as_str).collect();
    let listed = names.iter().take(MAX_LISTED_SOURCES).copied().collect::<Vec<_>>().join(", ");
    let more = if names.len() > MAX_LISTED_SOURCES { "..." } else { "" };
    format!("{} sources: {}{}", story.original_article_count, listed, more)
}

/// Minimal archive entry for a run that could not produce a newsletter.
pub fn error_newsletter(title: &str, reason: &str, at: DateTime<Utc>) -> RenderedNewsletter {
    let when = at.format("%Y-%m-%d %H:%M:%S UTC");
    RenderedNewsletter {
        title: title.to_string(),
        html: format!(
            "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{title}</title></head>\n<body>\n\
             <h1>Newsletter Generation Failed</h1>\n\
             <p>The newsletter could not be generated due to an error:</p>\n\
             <p><strong>{reason}</strong></p>\n<p>Time: {when}</p>\n</body>\n</html>\n",
            title = escape(title),
            reason = escape(reason),
            when = when,
        ),
        markdown: format!("# Newsletter Generation Failed\n\n**{}**\n\nTime: {}\n", reason, when),
        text: format!("Newsletter Generation Failed\n\n{}\nTime: {}\n", reason, when),
        story_count: 0,
    }
}

pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

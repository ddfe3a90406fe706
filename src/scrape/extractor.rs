//! Review extraction from raw listing-page markup.
//!
//! The upstream markup is third-party and volatile, so every selector lives in
//! `ExtractorConfig` rather than in code: when the site changes structure the
//! fix is a config update. Extraction is a pure function over one page and is
//! deliberately tolerant — a malformed block is skipped, never raised, and a
//! fully malformed page yields an empty list (which the pagination driver
//! reads as end-of-data).

use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use anyhow::{anyhow, Result};

/// A review pulled out of markup, not yet validated or persisted.
///
/// Fields the markup may omit are `Option` so downstream validation can tell
/// "missing" apart from "empty".
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewCandidate {
    pub store_name: Option<String>,
    pub country: Option<String>,
    pub rating: u8,
    pub content: Option<String>,
    pub review_date: Option<NaiveDate>,
}

/// CSS selectors for one upstream page layout.
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Structural marker for one discrete review block. An attribute marker
    /// survives styling churn better than class-name matching.
    pub review_block: String,
    /// Filled-star icons inside a block; the rating is their count.
    pub star_icon: String,
    pub store_name: String,
    /// Raw location text; normalization is a read-side concern.
    pub country: String,
    pub content: String,
    pub review_date: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            review_block: "[data-review-content-id]".to_string(),
            star_icon: ".review-star-rating .filled-star".to_string(),
            store_name: ".review-merchant-name".to_string(),
            country: ".review-merchant-location".to_string(),
            content: ".review-content".to_string(),
            review_date: ".review-date".to_string(),
        }
    }
}

pub struct ReviewExtractor {
    review_block: Selector,
    star_icon: Selector,
    store_name: Selector,
    country: Selector,
    content: Selector,
    review_date: Selector,
}

impl ReviewExtractor {
    pub fn new() -> Result<Self> {
        Self::with_config(&ExtractorConfig::default())
    }

    pub fn with_config(config: &ExtractorConfig) -> Result<Self> {
        let parse = |name: &str, sel: &str| {
            Selector::parse(sel).map_err(|e| anyhow!("invalid {name} selector {sel:?}: {e}"))
        };
        Ok(Self {
            review_block: parse("review_block", &config.review_block)?,
            star_icon: parse("star_icon", &config.star_icon)?,
            store_name: parse("store_name", &config.store_name)?,
            country: parse("country", &config.country)?,
            content: parse("content", &config.content)?,
            review_date: parse("review_date", &config.review_date)?,
        })
    }

    /// Extract every well-formed review block from one page of markup.
    pub fn extract(&self, markup: &str) -> Vec<ReviewCandidate> {
        let doc = Html::parse_document(markup);
        let mut out = Vec::new();
        let mut skipped = 0usize;

        for block in doc.select(&self.review_block) {
            match self.extract_block(block) {
                Some(candidate) => out.push(candidate),
                None => skipped += 1,
            }
        }

        if skipped > 0 {
            debug!(skipped, kept = out.len(), "dropped malformed review blocks");
        }
        out
    }

    fn extract_block(&self, block: ElementRef<'_>) -> Option<ReviewCandidate> {
        // Rating comes from counting filled-star icons; a count outside 1..=5
        // means the block is not a review we can trust, so no candidate.
        let stars = block.select(&self.star_icon).count();
        if !(1..=5).contains(&stars) {
            return None;
        }

        let store_name = self.text_of(block, &self.store_name);
        let country = self.text_of(block, &self.country);
        let content = self.text_of(block, &self.content);
        let review_date = self
            .text_of(block, &self.review_date)
            .and_then(|raw| parse_review_date(&raw));

        Some(ReviewCandidate {
            store_name,
            country,
            rating: stars as u8,
            content,
            review_date,
        })
    }

    fn text_of(&self, block: ElementRef<'_>, sel: &Selector) -> Option<String> {
        let el = block.select(sel).next()?;
        let text = el.text().collect::<Vec<_>>().join(" ");
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// Parse a locale-formatted review date like "June 5, 2024". Edited reviews
/// carry an "Edited" prefix on the same element.
pub fn parse_review_date(raw: &str) -> Option<NaiveDate> {
    let cleaned = raw.trim().trim_start_matches("Edited").trim();
    for fmt in ["%B %d, %Y", "%b %d, %Y", "%Y-%m-%d"] {
        if let Ok(d) = NaiveDate::parse_from_str(cleaned, fmt) {
            return Some(d);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review_block(stars: usize, store: &str, location: &str, body: &str, date: &str) -> String {
        let icons = "<span class=\"filled-star\"></span>".repeat(stars);
        format!(
            r#"<div data-review-content-id="r{stars}{store}">
                 <div class="review-star-rating">{icons}</div>
                 <h3 class="review-merchant-name">{store}</h3>
                 <p class="review-merchant-location">{location}</p>
                 <div class="review-content"><p>{body}</p></div>
                 <time class="review-date">{date}</time>
               </div>"#
        )
    }

    fn page(blocks: &[String]) -> String {
        format!("<html><body>{}</body></html>", blocks.join("\n"))
    }

    #[test]
    fn extracts_well_formed_blocks_and_drops_zero_star_block() {
        let markup = page(&[
            review_block(5, "Glow Cosmetics", "United States", "Great app", "June 5, 2024"),
            review_block(5, "Peak Gear", "Canada", "Works well", "May 30, 2024"),
            review_block(3, "Urban Roots", "Australia", "Decent", "May 2, 2024"),
            review_block(0, "Ghost Store", "Nowhere", "broken block", "May 1, 2024"),
        ]);

        let extractor = ReviewExtractor::new().unwrap();
        let candidates = extractor.extract(&markup);

        assert_eq!(candidates.len(), 3);
        let ratings: Vec<u8> = candidates.iter().map(|c| c.rating).collect();
        assert_eq!(ratings, vec![5, 5, 3]);
        assert_eq!(candidates[0].store_name.as_deref(), Some("Glow Cosmetics"));
        assert_eq!(candidates[0].country.as_deref(), Some("United States"));
        assert_eq!(
            candidates[0].review_date,
            Some(NaiveDate::from_ymd_opt(2024, 6, 5).unwrap())
        );
    }

    #[test]
    fn missing_fields_stay_missing_not_empty() {
        let markup = page(&[format!(
            r#"<div data-review-content-id="r1">
                 <div class="review-star-rating"><span class="filled-star"></span></div>
                 <h3 class="review-merchant-name">Solo Store</h3>
               </div>"#
        )]);

        let extractor = ReviewExtractor::new().unwrap();
        let candidates = extractor.extract(&markup);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].rating, 1);
        assert_eq!(candidates[0].country, None);
        assert_eq!(candidates[0].content, None);
        assert_eq!(candidates[0].review_date, None);
    }

    #[test]
    fn fully_malformed_page_yields_empty_list() {
        let extractor = ReviewExtractor::new().unwrap();
        assert!(extractor.extract("<html><body><p>maintenance</p></body></html>").is_empty());
        assert!(extractor.extract("<<<<not even html").is_empty());
    }

    #[test]
    fn parses_edited_dates() {
        assert_eq!(
            parse_review_date("Edited June 5, 2024"),
            Some(NaiveDate::from_ymd_opt(2024, 6, 5).unwrap())
        );
        assert_eq!(parse_review_date("gibberish"), None);
    }

    #[test]
    fn whitespace_in_nested_content_is_collapsed() {
        let markup = page(&[review_block(
            4,
            "Tidy Shop",
            "Germany",
            "Multi\n   line   body",
            "May 2, 2024",
        )]);
        let extractor = ReviewExtractor::new().unwrap();
        let candidates = extractor.extract(&markup);
        assert_eq!(candidates[0].content.as_deref(), Some("Multi line body"));
    }
}

//! Canonical app allow-list.
//!
//! The system only stores review data for these six apps. The set is a
//! configuration constant, not runtime-editable; changing it requires a
//! reconciler run to purge now-excluded data.

/// One canonical app: display name plus the stable slug used to build its
/// review-listing URL on the upstream app store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanonicalApp {
    pub name: &'static str,
    pub slug: &'static str,
}

pub const CANONICAL_APPS: [CanonicalApp; 6] = [
    CanonicalApp {
        name: "StoreSEO",
        slug: "storeseo",
    },
    CanonicalApp {
        name: "StoreFAQ",
        slug: "storefaq",
    },
    CanonicalApp {
        name: "Vidzy",
        slug: "vidzy",
    },
    CanonicalApp {
        name: "EasyFlow Product Options",
        slug: "easyflow-product-options",
    },
    CanonicalApp {
        name: "BetterDocs FAQ",
        slug: "betterdocs-knowledgebase",
    },
    CanonicalApp {
        name: "TrustSync",
        slug: "trustsync",
    },
];

const REVIEWS_BASE_URL: &str = "https://apps.shopify.com";

impl CanonicalApp {
    /// URL of one review-listing page, newest first.
    pub fn review_page_url(&self, page: u32) -> String {
        format!(
            "{REVIEWS_BASE_URL}/{}/reviews?page={page}&sort_by=newest",
            self.slug
        )
    }
}

/// Look up a canonical app by display name or slug (case-insensitive).
pub fn find_app(name_or_slug: &str) -> Option<&'static CanonicalApp> {
    let needle = name_or_slug.trim();
    CANONICAL_APPS
        .iter()
        .find(|a| a.name.eq_ignore_ascii_case(needle) || a.slug.eq_ignore_ascii_case(needle))
}

/// Membership test against the allow-list (by display name).
pub fn is_canonical(app_name: &str) -> bool {
    CANONICAL_APPS
        .iter()
        .any(|a| a.name.eq_ignore_ascii_case(app_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_name_and_slug() {
        assert_eq!(find_app("StoreSEO").unwrap().slug, "storeseo");
        assert_eq!(find_app("storefaq").unwrap().name, "StoreFAQ");
        assert_eq!(find_app("EASYFLOW-PRODUCT-OPTIONS").unwrap().name, "EasyFlow Product Options");
        assert!(find_app("Vitals").is_none());
    }

    #[test]
    fn review_page_url_shape() {
        let app = find_app("vidzy").unwrap();
        assert_eq!(
            app.review_page_url(3),
            "https://apps.shopify.com/vidzy/reviews?page=3&sort_by=newest"
        );
    }

    #[test]
    fn allow_list_has_six_distinct_slugs() {
        let mut slugs: Vec<_> = CANONICAL_APPS.iter().map(|a| a.slug).collect();
        slugs.sort();
        slugs.dedup();
        assert_eq!(slugs.len(), 6);
    }
}

//! Value objects for the Affiliates context.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use alpes_core::error::DomainError;
pub use alpes_core::values::{Email, Phone};
use serde::{Deserialize, Serialize};

/// Kind of partner an affiliate is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AffiliateType {
    /// Comparison, coupon and cashback sites.
    Traditional,
    /// Content creators.
    Influencer,
    /// Magazines and news portals.
    EditorialMedia,
    /// Customers or employees recommending the brand.
    Ambassador,
    /// SaaS integrators.
    B2bPartner,
    /// Partner agencies.
    Agency,
}

impl AffiliateType {
    /// Wire name of the type.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Traditional => "traditional",
            Self::Influencer => "influencer",
            Self::EditorialMedia => "editorial_media",
            Self::Ambassador => "ambassador",
            Self::B2bPartner => "b2b_partner",
            Self::Agency => "agency",
        }
    }
}

impl fmt::Display for AffiliateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AffiliateType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "traditional" => Ok(Self::Traditional),
            "influencer" => Ok(Self::Influencer),
            "editorial_media" => Ok(Self::EditorialMedia),
            "ambassador" => Ok(Self::Ambassador),
            "b2b_partner" => Ok(Self::B2bPartner),
            "agency" => Ok(Self::Agency),
            other => Err(DomainError::Validation(format!(
                "unsupported affiliate type: '{other}'"
            ))),
        }
    }
}

/// Lifecycle status of an affiliate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AffiliateStatus {
    /// Registered, not yet activated.
    Pending,
    /// Can promote campaigns.
    Active,
    /// Deactivated; may be activated again.
    Inactive,
    /// Suspended; terminal.
    Suspended,
}

impl fmt::Display for AffiliateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "PENDING",
            Self::Active => "ACTIVE",
            Self::Inactive => "INACTIVE",
            Self::Suspended => "SUSPENDED",
        };
        f.write_str(name)
    }
}

/// Public profile of an affiliate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffiliateProfile {
    affiliate_type: AffiliateType,
    categories: Vec<String>,
    description: String,
    website: Option<String>,
    social_links: BTreeMap<String, String>,
}

impl AffiliateProfile {
    /// Builds a profile. Categories are trimmed, lowercased and
    /// de-duplicated; social network names are lowercased.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if no category remains, the
    /// description is blank or the website is not an http(s) URL.
    pub fn new(
        affiliate_type: AffiliateType,
        categories: &[String],
        description: &str,
        website: Option<&str>,
        social_links: &BTreeMap<String, String>,
    ) -> Result<Self, DomainError> {
        let mut normalized: Vec<String> = Vec::with_capacity(categories.len());
        for category in categories {
            let category = category.trim().to_lowercase();
            if !category.is_empty() && !normalized.contains(&category) {
                normalized.push(category);
            }
        }
        if normalized.is_empty() {
            return Err(DomainError::Validation(
                "at least one category is required".into(),
            ));
        }
        let description = description.trim();
        if description.is_empty() {
            return Err(DomainError::Validation(
                "affiliate description must not be empty".into(),
            ));
        }
        Ok(Self {
            affiliate_type,
            categories: normalized,
            description: description.to_owned(),
            website: normalize_website(website)?,
            social_links: normalize_links(social_links),
        })
    }

    /// Kind of partner.
    #[must_use]
    pub fn affiliate_type(&self) -> AffiliateType {
        self.affiliate_type
    }

    /// Categories in registration order.
    #[must_use]
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Short description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Affiliate website.
    #[must_use]
    pub fn website(&self) -> Option<&str> {
        self.website.as_deref()
    }

    /// Social network handles keyed by network name.
    #[must_use]
    pub fn social_links(&self) -> &BTreeMap<String, String> {
        &self.social_links
    }

    /// Whether the profile lists `category` (case-insensitive).
    #[must_use]
    pub fn has_category(&self, category: &str) -> bool {
        let category = category.trim().to_lowercase();
        self.categories.iter().any(|c| *c == category)
    }

    /// Applies a partial update and returns the new profile together with
    /// the fields that actually changed. A blank description is ignored;
    /// the website may be cleared with an empty string; social links are
    /// replaced as a whole.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the new website is malformed.
    pub fn with_changes(
        &self,
        description: Option<&str>,
        website: Option<&str>,
        social_links: Option<&BTreeMap<String, String>>,
    ) -> Result<(Self, BTreeMap<String, String>), DomainError> {
        let mut next = self.clone();
        let mut changes = BTreeMap::new();

        if let Some(description) = description.map(str::trim).filter(|d| !d.is_empty()) {
            if description != self.description {
                next.description = description.to_owned();
                changes.insert("description".to_owned(), description.to_owned());
            }
        }
        if let Some(website) = website {
            let website = normalize_website(Some(website))?;
            if website != self.website {
                changes.insert(
                    "website".to_owned(),
                    website.clone().unwrap_or_default(),
                );
                next.website = website;
            }
        }
        if let Some(links) = social_links {
            let links = normalize_links(links);
            if links != self.social_links {
                let networks: Vec<&str> = links.keys().map(String::as_str).collect();
                changes.insert("social_links".to_owned(), networks.join(","));
                next.social_links = links;
            }
        }
        Ok((next, changes))
    }
}

fn normalize_website(website: Option<&str>) -> Result<Option<String>, DomainError> {
    let Some(website) = website.map(str::trim).filter(|w| !w.is_empty()) else {
        return Ok(None);
    };
    if website.starts_with("http://") || website.starts_with("https://") {
        Ok(Some(website.to_owned()))
    } else {
        Err(DomainError::Validation(format!(
            "website must be an http(s) URL: '{website}'"
        )))
    }
}

fn normalize_links(links: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    links
        .iter()
        .map(|(network, handle)| (network.trim().to_lowercase(), handle.trim().to_owned()))
        .filter(|(network, handle)| !network.is_empty() && !handle.is_empty())
        .collect()
}

/// Accumulated performance of an affiliate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AffiliateMetrics {
    /// Clicks on the affiliate's links.
    pub clicks: u64,
    /// Conversions attributed to the affiliate.
    pub conversions: u64,
    /// Revenue generated.
    pub revenue: f64,
}

impl AffiliateMetrics {
    /// Conversions per hundred clicks, 0 without clicks.
    #[must_use]
    pub fn conversion_rate(&self) -> f64 {
        if self.clicks == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let rate = self.conversions as f64 / self.clicks as f64 * 100.0;
        rate
    }

    /// Adds new figures to the totals.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if `revenue` is negative or not
    /// finite, or if a counter no longer fits a `u64`.
    pub fn accumulate(&self, clicks: u64, conversions: u64, revenue: f64) -> Result<Self, DomainError> {
        if !revenue.is_finite() || revenue < 0.0 {
            return Err(DomainError::Validation(format!(
                "revenue must be a non-negative amount, got {revenue}"
            )));
        }
        let (Some(clicks), Some(conversions)) = (
            self.clicks.checked_add(clicks),
            self.conversions.checked_add(conversions),
        ) else {
            return Err(DomainError::Validation(
                "click and conversion totals are out of range".into(),
            ));
        };
        Ok(Self {
            clicks,
            conversions,
            revenue: self.revenue + revenue,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> AffiliateProfile {
        AffiliateProfile::new(
            AffiliateType::Traditional,
            &["Cupones".into()],
            "Coupon portal",
            Some("https://deals.example"),
            &BTreeMap::from([("Instagram".to_owned(), "@deals".to_owned())]),
        )
        .unwrap()
    }

    #[test]
    fn test_affiliate_type_parses_wire_names() {
        assert_eq!("editorial_media".parse::<AffiliateType>().unwrap(), AffiliateType::EditorialMedia);
        assert_eq!(" B2B_Partner ".parse::<AffiliateType>().unwrap(), AffiliateType::B2bPartner);
        assert!(matches!(
            "reseller".parse::<AffiliateType>(),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn test_affiliate_type_serializes_as_snake_case() {
        let json = serde_json::to_value(AffiliateType::B2bPartner).unwrap();

        assert_eq!(json, "b2b_partner");
    }

    #[test]
    fn test_profile_normalizes_categories_and_links() {
        let profile = profile();

        assert_eq!(profile.categories(), ["cupones"]);
        assert_eq!(profile.social_links()["instagram"], "@deals");
        assert!(profile.has_category("CUPONES"));
    }

    #[test]
    fn test_profile_requires_category_and_description() {
        let no_category = AffiliateProfile::new(
            AffiliateType::Agency,
            &[" ".into()],
            "Agency",
            None,
            &BTreeMap::new(),
        );
        let no_description = AffiliateProfile::new(
            AffiliateType::Agency,
            &["moda".into()],
            "  ",
            None,
            &BTreeMap::new(),
        );

        assert!(matches!(no_category, Err(DomainError::Validation(_))));
        assert!(matches!(no_description, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_with_changes_reports_only_changed_fields() {
        // Arrange
        let profile = profile();
        let links = BTreeMap::from([("tiktok".to_owned(), "@deals".to_owned())]);

        // Act
        let (next, changes) = profile
            .with_changes(Some("Coupon portal"), Some(""), Some(&links))
            .unwrap();

        // Assert
        assert_eq!(changes.len(), 2);
        assert_eq!(changes["website"], "");
        assert_eq!(changes["social_links"], "tiktok");
        assert_eq!(next.website(), None);
        assert_eq!(next.description(), "Coupon portal");
    }

    #[test]
    fn test_metrics_accumulate_and_compute_conversion_rate() {
        let metrics = AffiliateMetrics::default()
            .accumulate(200, 5, 120.0)
            .unwrap()
            .accumulate(200, 5, 30.0)
            .unwrap();

        assert_eq!((metrics.clicks, metrics.conversions), (400, 10));
        assert!((metrics.revenue - 150.0).abs() < f64::EPSILON);
        assert!((metrics.conversion_rate() - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_metrics_reject_negative_revenue_and_overflow() {
        let full = AffiliateMetrics {
            clicks: u64::MAX,
            conversions: 0,
            revenue: 0.0,
        };

        assert!(matches!(
            AffiliateMetrics::default().accumulate(1, 0, -1.0),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(full.accumulate(1, 0, 0.0), Err(DomainError::Validation(_))));
        assert_eq!(full.accumulate(0, 1, 0.0).unwrap().clicks, u64::MAX);
    }
}

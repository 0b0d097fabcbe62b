//! Value objects for the Influencers context.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use alpes_core::error::DomainError;
pub use alpes_core::values::{Email, Phone};
use serde::{Deserialize, Serialize};

/// Public profile of an influencer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    categories: Vec<String>,
    description: String,
    bio: String,
    website: Option<String>,
}

impl Profile {
    /// Builds a profile. Categories are trimmed, lowercased and deduplicated
    /// in first-seen order.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if no category remains or the
    /// website is not an http(s) URL.
    pub fn new(
        categories: &[String],
        description: &str,
        bio: &str,
        website: Option<&str>,
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
        Ok(Self {
            categories: normalized,
            description: description.trim().to_owned(),
            bio: bio.trim().to_owned(),
            website: normalize_website(website)?,
        })
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

    /// Long-form biography.
    #[must_use]
    pub fn bio(&self) -> &str {
        &self.bio
    }

    /// Personal website.
    #[must_use]
    pub fn website(&self) -> Option<&str> {
        self.website.as_deref()
    }

    /// Whether the profile lists `category` (case-insensitive).
    #[must_use]
    pub fn has_category(&self, category: &str) -> bool {
        let category = category.trim().to_lowercase();
        self.categories.iter().any(|c| *c == category)
    }

    /// Applies a partial update and returns the new profile together with
    /// the fields that actually changed.
    ///
    /// A blank description is ignored; bio and website may be cleared with
    /// an empty string.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the new website is malformed.
    pub fn with_changes(
        &self,
        description: Option<&str>,
        bio: Option<&str>,
        website: Option<&str>,
    ) -> Result<(Self, BTreeMap<String, String>), DomainError> {
        let mut next = self.clone();
        let mut changes = BTreeMap::new();

        if let Some(description) = description.map(str::trim).filter(|d| !d.is_empty()) {
            if description != self.description {
                next.description = description.to_owned();
                changes.insert("description".to_owned(), description.to_owned());
            }
        }
        if let Some(bio) = bio.map(str::trim) {
            if bio != self.bio {
                next.bio = bio.to_owned();
                changes.insert("bio".to_owned(), bio.to_owned());
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

/// Lifecycle status of an influencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InfluencerStatus {
    /// Registered, not yet activated.
    Pending,
    /// Can take part in campaigns.
    Active,
    /// Deactivated; may be activated again.
    Inactive,
    /// Suspended; terminal.
    Suspended,
}

impl fmt::Display for InfluencerStatus {
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

/// Supported social platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Instagram.
    Instagram,
    /// `TikTok`.
    TikTok,
    /// `YouTube`.
    YouTube,
    /// Twitter / X.
    Twitter,
    /// Facebook.
    Facebook,
    /// `LinkedIn`.
    LinkedIn,
    /// Twitch.
    Twitch,
    /// Personal blog.
    Blog,
}

impl Platform {
    /// Wire name of the platform.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Instagram => "instagram",
            Self::TikTok => "tiktok",
            Self::YouTube => "youtube",
            Self::Twitter => "twitter",
            Self::Facebook => "facebook",
            Self::LinkedIn => "linkedin",
            Self::Twitch => "twitch",
            Self::Blog => "blog",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "instagram" => Ok(Self::Instagram),
            "tiktok" => Ok(Self::TikTok),
            "youtube" => Ok(Self::YouTube),
            "twitter" | "x" => Ok(Self::Twitter),
            "facebook" => Ok(Self::Facebook),
            "linkedin" => Ok(Self::LinkedIn),
            "twitch" => Ok(Self::Twitch),
            "blog" => Ok(Self::Blog),
            other => Err(DomainError::Validation(format!(
                "unsupported platform: '{other}'"
            ))),
        }
    }
}

/// Influencer size derived from follower count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InfluencerTier {
    /// Fewer than 10k followers.
    Nano,
    /// 10k to 100k.
    Micro,
    /// 100k to 1M.
    Macro,
    /// 1M or more.
    Mega,
}

impl InfluencerTier {
    /// Tier for a follower count.
    #[must_use]
    pub fn for_followers(followers: u64) -> Self {
        match followers {
            0..10_000 => Self::Nano,
            10_000..100_000 => Self::Micro,
            100_000..1_000_000 => Self::Macro,
            _ => Self::Mega,
        }
    }
}

/// Audience figures for one platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudienceData {
    platform: Platform,
    followers: u64,
    engagement_rate: f64,
    average_reach: u64,
}

impl AudienceData {
    /// Creates audience data.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the engagement rate is outside
    /// 0..=100.
    pub fn new(
        platform: Platform,
        followers: u64,
        engagement_rate: f64,
        average_reach: u64,
    ) -> Result<Self, DomainError> {
        if !engagement_rate.is_finite() || !(0.0..=100.0).contains(&engagement_rate) {
            return Err(DomainError::Validation(format!(
                "engagement rate must be between 0 and 100, got {engagement_rate}"
            )));
        }
        Ok(Self {
            platform,
            followers,
            engagement_rate,
            average_reach,
        })
    }

    /// The platform.
    #[must_use]
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Follower count.
    #[must_use]
    pub fn followers(&self) -> u64 {
        self.followers
    }

    /// Engagement rate in percent.
    #[must_use]
    pub fn engagement_rate(&self) -> f64 {
        self.engagement_rate
    }

    /// Average reach per post.
    #[must_use]
    pub fn average_reach(&self) -> u64 {
        self.average_reach
    }

    /// Tier for this platform's follower count.
    #[must_use]
    pub fn tier(&self) -> InfluencerTier {
        InfluencerTier::for_followers(self.followers)
    }
}

/// Audience demographics as percentage distributions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Demographics {
    gender_distribution: BTreeMap<String, f64>,
    age_distribution: BTreeMap<String, f64>,
    top_countries: Vec<String>,
}

impl Demographics {
    /// Creates demographics.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if a share is negative or a
    /// distribution adds up to more than 100%.
    pub fn new(
        gender_distribution: BTreeMap<String, f64>,
        age_distribution: BTreeMap<String, f64>,
        top_countries: Vec<String>,
    ) -> Result<Self, DomainError> {
        check_distribution("gender", &gender_distribution)?;
        check_distribution("age", &age_distribution)?;
        Ok(Self {
            gender_distribution,
            age_distribution,
            top_countries: top_countries
                .into_iter()
                .map(|c| c.trim().to_uppercase())
                .filter(|c| !c.is_empty())
                .collect(),
        })
    }

    /// Share of audience per gender.
    #[must_use]
    pub fn gender_distribution(&self) -> &BTreeMap<String, f64> {
        &self.gender_distribution
    }

    /// Share of audience per age bracket.
    #[must_use]
    pub fn age_distribution(&self) -> &BTreeMap<String, f64> {
        &self.age_distribution
    }

    /// Countries with the largest audience share.
    #[must_use]
    pub fn top_countries(&self) -> &[String] {
        &self.top_countries
    }
}

fn check_distribution(name: &str, distribution: &BTreeMap<String, f64>) -> Result<(), DomainError> {
    if distribution.values().any(|v| !v.is_finite() || *v < 0.0) {
        return Err(DomainError::Validation(format!(
            "{name} distribution contains a negative share"
        )));
    }
    let total: f64 = distribution.values().sum();
    if total > 100.0 + 1e-6 {
        return Err(DomainError::Validation(format!(
            "{name} distribution adds up to {total}%, more than 100%"
        )));
    }
    Ok(())
}

/// Accumulated campaign results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InfluencerMetrics {
    /// Campaigns completed.
    pub completed_campaigns: u32,
    /// Average engagement across campaigns.
    pub average_engagement: f64,
    /// Average cost per thousand impressions.
    pub average_cpm: f64,
    /// Revenue generated.
    pub revenue: f64,
}

impl InfluencerMetrics {
    /// Folds new results in: counts and revenue accumulate, averages are
    /// replaced only by positive values.
    #[must_use]
    pub fn accumulate(
        &self,
        completed_campaigns: u32,
        average_engagement: f64,
        average_cpm: f64,
        revenue: f64,
    ) -> Self {
        Self {
            completed_campaigns: self.completed_campaigns.saturating_add(completed_campaigns),
            average_engagement: if average_engagement > 0.0 {
                average_engagement
            } else {
                self.average_engagement
            },
            average_cpm: if average_cpm > 0.0 {
                average_cpm
            } else {
                self.average_cpm
            },
            revenue: self.revenue + revenue,
        }
    }
}

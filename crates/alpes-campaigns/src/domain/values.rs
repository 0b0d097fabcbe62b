//! Value objects for the Campaigns context. They are replaced wholesale on
//! every change, never mutated in place.

use std::fmt;
use std::str::FromStr;

use alpes_core::error::DomainError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How affiliates are paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CommissionType {
    /// Cost per acquisition.
    Cpa,
    /// Cost per lead.
    Cpl,
    /// Cost per click.
    Cpc,
}

impl CommissionType {
    /// Wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cpa => "CPA",
            Self::Cpl => "CPL",
            Self::Cpc => "CPC",
        }
    }
}

impl fmt::Display for CommissionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommissionType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CPA" => Ok(Self::Cpa),
            "CPL" => Ok(Self::Cpl),
            "CPC" => Ok(Self::Cpc),
            _ => Err(DomainError::Validation(format!(
                "invalid commission type: '{s}'"
            ))),
        }
    }
}

/// Commission paid per qualifying action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommissionTerms {
    commission_type: CommissionType,
    amount: f64,
    currency: String,
    description: Option<String>,
}

impl CommissionTerms {
    /// Creates commission terms.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the amount is not positive or
    /// the currency is not a three-letter code.
    pub fn new(
        commission_type: CommissionType,
        amount: f64,
        currency: &str,
        description: Option<&str>,
    ) -> Result<Self, DomainError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(DomainError::Validation(format!(
                "commission amount must be positive, got {amount}"
            )));
        }
        let currency = currency.trim().to_ascii_uppercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(DomainError::Validation(format!(
                "currency must be a three-letter code, got '{currency}'"
            )));
        }
        Ok(Self {
            commission_type,
            amount,
            currency,
            description: description
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_owned),
        })
    }

    /// Commission type.
    #[must_use]
    pub fn commission_type(&self) -> CommissionType {
        self.commission_type
    }

    /// Amount per action.
    #[must_use]
    pub fn amount(&self) -> f64 {
        self.amount
    }

    /// ISO currency code.
    #[must_use]
    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Free-form terms description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

/// When the campaign may run. An open end means it runs indefinitely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignPeriod {
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
}

impl CampaignPeriod {
    /// Creates a period.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if `end` is not after `start`.
    pub fn new(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Result<Self, DomainError> {
        if let Some(end) = end {
            if end <= start {
                return Err(DomainError::Validation(
                    "campaign end must be after its start".into(),
                ));
            }
        }
        Ok(Self { start, end })
    }

    /// Start of the period.
    #[must_use]
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// End of the period.
    #[must_use]
    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.end
    }

    /// Whether `now` falls within `[start, end]`.
    #[must_use]
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        now >= self.start && self.end.is_none_or(|end| now <= end)
    }
}

/// Copy and assets handed to affiliates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionalMaterial {
    /// Headline.
    pub title: String,
    /// Body copy.
    pub description: String,
    /// Landing page links.
    pub links: Vec<String>,
    /// Image URLs.
    pub images: Vec<String>,
    /// Banner URLs.
    pub banners: Vec<String>,
}

/// Who may be assigned to the campaign. Empty lists mean no restriction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AffiliateCriteria {
    allowed_types: Vec<String>,
    required_categories: Vec<String>,
    allowed_countries: Vec<String>,
    min_followers: Option<u64>,
    min_engagement_rate: Option<f64>,
}

impl AffiliateCriteria {
    /// Creates criteria with types and categories lowercased and countries
    /// uppercased.
    #[must_use]
    pub fn new(
        allowed_types: &[String],
        required_categories: &[String],
        allowed_countries: &[String],
        min_followers: Option<u64>,
        min_engagement_rate: Option<f64>,
    ) -> Self {
        Self {
            allowed_types: normalize(allowed_types, str::to_lowercase),
            required_categories: normalize(required_categories, str::to_lowercase),
            allowed_countries: normalize(allowed_countries, str::to_uppercase),
            min_followers,
            min_engagement_rate,
        }
    }

    /// Allowed affiliate types.
    #[must_use]
    pub fn allowed_types(&self) -> &[String] {
        &self.allowed_types
    }

    /// Categories of which an affiliate must cover at least one.
    #[must_use]
    pub fn required_categories(&self) -> &[String] {
        &self.required_categories
    }

    /// Allowed countries.
    #[must_use]
    pub fn allowed_countries(&self) -> &[String] {
        &self.allowed_countries
    }

    /// Minimum follower count.
    #[must_use]
    pub fn min_followers(&self) -> Option<u64> {
        self.min_followers
    }

    /// Minimum engagement rate.
    #[must_use]
    pub fn min_engagement_rate(&self) -> Option<f64> {
        self.min_engagement_rate
    }

    /// Whether an affiliate of `affiliate_type` covering `categories` fits.
    #[must_use]
    pub fn accepts(&self, categories: &[String], affiliate_type: &str) -> bool {
        let affiliate_type = affiliate_type.trim().to_lowercase();
        if !self.allowed_types.is_empty() && !self.allowed_types.contains(&affiliate_type) {
            return false;
        }
        self.required_categories.is_empty()
            || categories
                .iter()
                .map(|c| c.trim().to_lowercase())
                .any(|c| self.required_categories.contains(&c))
    }
}

fn normalize(values: &[String], case: fn(&str) -> String) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        let value = case(value.trim());
        if !value.is_empty() && !out.contains(&value) {
            out.push(value);
        }
    }
    out
}

/// Lifecycle status of a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CampaignStatus {
    /// Created, not yet running.
    Draft,
    /// Running.
    Active,
    /// Temporarily stopped.
    Paused,
    /// Completed; terminal.
    Finished,
    /// Cancelled; terminal.
    Cancelled,
}

impl CampaignStatus {
    /// Whether no further lifecycle transition is possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled)
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Draft => "DRAFT",
            Self::Active => "ACTIVE",
            Self::Paused => "PAUSED",
            Self::Finished => "FINISHED",
            Self::Cancelled => "CANCELLED",
        };
        f.write_str(name)
    }
}

/// Accumulated campaign performance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CampaignMetrics {
    /// Affiliates currently assigned.
    pub assigned_affiliates: u32,
    /// Total clicks.
    pub clicks: u64,
    /// Total conversions.
    pub conversions: u64,
    /// Total spend.
    pub spend: f64,
    /// Total revenue.
    pub revenue: f64,
}

impl CampaignMetrics {
    /// Conversions per click, 0 without clicks.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn conversion_rate(&self) -> f64 {
        if self.clicks == 0 {
            return 0.0;
        }
        self.conversions as f64 / self.clicks as f64
    }
}

/// Influencer and category a campaign was generated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginReference {
    /// Originating influencer.
    pub influencer_id: Uuid,
    /// Category the blueprint was chosen for.
    pub category: String,
}

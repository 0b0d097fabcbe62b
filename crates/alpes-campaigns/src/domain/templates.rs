//! Campaign blueprints per influencer category.
//!
//! Pure lookup and parameter generation; nothing here touches storage.
//! Category lookup tries an exact match, then a substring match in either
//! direction against the known keys, then falls back to the default
//! blueprint.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::commands::CampaignParameters;
use super::values::{CommissionType, OriginReference};

const INFLUENCER: &str = "{influencer}";
const CATEGORY: &str = "{category}";

/// Default campaign settings for one influencer category.
#[deny(missing_docs)]
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignBlueprint {
    /// Category key.
    pub key: &'static str,
    /// Campaign name with an `{influencer}` placeholder.
    pub name_template: &'static str,
    /// Description with `{influencer}` and `{category}` placeholders.
    pub description_template: &'static str,
    /// How affiliates are paid.
    pub commission_type: CommissionType,
    /// Commission per qualifying action.
    pub amount: f64,
    /// ISO currency of `amount`.
    pub currency: &'static str,
    /// Campaign length from creation.
    pub duration_days: i64,
    /// Material headline.
    pub material_title: &'static str,
    /// Material body copy.
    pub material_description: &'static str,
    /// Affiliate types allowed to join.
    pub allowed_affiliate_types: &'static [&'static str],
    /// Landing page links.
    pub material_links: &'static [&'static str],
    /// Minimum follower count for joining affiliates.
    pub min_followers: u64,
    /// Minimum engagement rate, in percent.
    pub min_engagement_rate: f64,
}

static BLUEPRINTS: &[CampaignBlueprint] = &[
    CampaignBlueprint {
        key: "tecnologia",
        name_template: "Tech Innovation - {influencer}",
        description_template: "Innovative tech products promoted by {influencer}, specialist in {category}",
        commission_type: CommissionType::Cpa,
        amount: 50.0,
        currency: "USD",
        duration_days: 45,
        material_title: "The latest in technology",
        material_description: "Discover the most innovative tech products on the market",
        allowed_affiliate_types: &["influencer", "tech_reviewer"],
        material_links: &[
            "https://alpes-partners.example/tech-products",
            "https://alpes-partners.example/tech-reviews",
        ],
        min_followers: 1_000,
        min_engagement_rate: 3.0,
    },
    CampaignBlueprint {
        key: "lifestyle",
        name_template: "Lifestyle Essentials - {influencer}",
        description_template: "Lifestyle and wellbeing products with {influencer} in {category}",
        commission_type: CommissionType::Cpl,
        amount: 25.0,
        currency: "USD",
        duration_days: 60,
        material_title: "Everyday essentials",
        material_description: "Products that make daily life better",
        allowed_affiliate_types: &["influencer", "lifestyle_blogger"],
        material_links: &["https://alpes-partners.example/lifestyle"],
        min_followers: 500,
        min_engagement_rate: 4.0,
    },
    CampaignBlueprint {
        key: "moda",
        name_template: "Fashion Forward - {influencer}",
        description_template: "This season's fashion styled by {influencer} for {category} lovers",
        commission_type: CommissionType::Cpa,
        amount: 35.0,
        currency: "USD",
        duration_days: 30,
        material_title: "New season trends",
        material_description: "The looks everyone will be wearing",
        allowed_affiliate_types: &["influencer", "fashion_blogger"],
        material_links: &[
            "https://alpes-partners.example/fashion",
            "https://alpes-partners.example/new-collection",
        ],
        min_followers: 2_000,
        min_engagement_rate: 5.0,
    },
    CampaignBlueprint {
        key: "fitness",
        name_template: "Fitness Revolution - {influencer}",
        description_template: "Training gear and supplements recommended by {influencer} for the {category} community",
        commission_type: CommissionType::Cpa,
        amount: 40.0,
        currency: "USD",
        duration_days: 90,
        material_title: "Transform your training",
        material_description: "Equipment and nutrition for every fitness goal",
        allowed_affiliate_types: &["influencer", "fitness_trainer"],
        material_links: &[
            "https://alpes-partners.example/fitness-gear",
            "https://alpes-partners.example/supplements",
        ],
        min_followers: 1_500,
        min_engagement_rate: 6.0,
    },
    CampaignBlueprint {
        key: "belleza",
        name_template: "Beauty Secrets - {influencer}",
        description_template: "Beauty and skincare favourites chosen by {influencer} in {category}",
        commission_type: CommissionType::Cpl,
        amount: 30.0,
        currency: "USD",
        duration_days: 45,
        material_title: "Beauty routines that work",
        material_description: "Skincare and makeup picked by the experts",
        allowed_affiliate_types: &["influencer", "beauty_guru"],
        material_links: &["https://alpes-partners.example/beauty"],
        min_followers: 3_000,
        min_engagement_rate: 7.0,
    },
    CampaignBlueprint {
        key: "gastronomia",
        name_template: "Culinary Experience - {influencer}",
        description_template: "Food experiences curated by {influencer} for {category} fans",
        commission_type: CommissionType::Cpc,
        amount: 15.0,
        currency: "USD",
        duration_days: 60,
        material_title: "Taste something new",
        material_description: "Restaurants, recipes and ingredients worth trying",
        allowed_affiliate_types: &["influencer", "food_blogger"],
        material_links: &["https://alpes-partners.example/food"],
        min_followers: 800,
        min_engagement_rate: 4.5,
    },
    CampaignBlueprint {
        key: "viajes",
        name_template: "Travel Adventures - {influencer}",
        description_template: "Destinations and travel deals shared by {influencer} in {category}",
        commission_type: CommissionType::Cpa,
        amount: 60.0,
        currency: "USD",
        duration_days: 120,
        material_title: "Your next adventure",
        material_description: "Flights, stays and experiences around the world",
        allowed_affiliate_types: &["influencer", "travel_blogger"],
        material_links: &[
            "https://alpes-partners.example/travel",
            "https://alpes-partners.example/destinations",
        ],
        min_followers: 2_500,
        min_engagement_rate: 5.5,
    },
    CampaignBlueprint {
        key: "gaming",
        name_template: "Gaming Elite - {influencer}",
        description_template: "Games and gear played by {influencer} for the {category} crowd",
        commission_type: CommissionType::Cpa,
        amount: 45.0,
        currency: "USD",
        duration_days: 60,
        material_title: "Level up",
        material_description: "Hardware, games and accessories for serious players",
        allowed_affiliate_types: &["influencer", "gamer", "streamer"],
        material_links: &["https://alpes-partners.example/gaming"],
        min_followers: 5_000,
        min_engagement_rate: 8.0,
    },
    CampaignBlueprint {
        key: "educacion",
        name_template: "Learning Hub - {influencer}",
        description_template: "Courses and learning tools recommended by {influencer} in {category}",
        commission_type: CommissionType::Cpl,
        amount: 20.0,
        currency: "USD",
        duration_days: 90,
        material_title: "Keep learning",
        material_description: "Online courses and resources for every level",
        allowed_affiliate_types: &["influencer", "educator", "coach"],
        material_links: &["https://alpes-partners.example/courses"],
        min_followers: 1_000,
        min_engagement_rate: 3.5,
    },
    CampaignBlueprint {
        key: "finanzas",
        name_template: "Financial Freedom - {influencer}",
        description_template: "Financial products explained by {influencer} for the {category} audience",
        commission_type: CommissionType::Cpa,
        amount: 80.0,
        currency: "USD",
        duration_days: 60,
        material_title: "Take control of your money",
        material_description: "Savings, investing and budgeting tools",
        allowed_affiliate_types: &["influencer", "financial_advisor"],
        material_links: &["https://alpes-partners.example/finance"],
        min_followers: 3_000,
        min_engagement_rate: 4.0,
    },
];

static DEFAULT_BLUEPRINT: CampaignBlueprint = CampaignBlueprint {
    key: "default",
    name_template: "General Campaign - {influencer} ({category})",
    description_template: "General promotion with {influencer} for the {category} audience",
    commission_type: CommissionType::Cpl,
    amount: 25.0,
    currency: "USD",
    duration_days: 30,
    material_title: "Featured products",
    material_description: "A selection of products for every audience",
    allowed_affiliate_types: &["influencer"],
    material_links: &["https://alpes-partners.example/products"],
    min_followers: 500,
    min_engagement_rate: 2.0,
};

impl CampaignBlueprint {
    /// Campaign name for `influencer` and `category`.
    #[must_use]
    pub fn campaign_name(&self, influencer: &str, category: &str) -> String {
        self.name_template
            .replace(INFLUENCER, influencer.trim())
            .replace(CATEGORY, category)
    }

    /// Campaign description for `influencer` and `category`.
    #[must_use]
    pub fn campaign_description(&self, influencer: &str, category: &str) -> String {
        self.description_template
            .replace(INFLUENCER, influencer.trim())
            .replace(CATEGORY, category)
    }

    /// Parameters for a campaign starting at `now`, auto-activated and
    /// tagged with its origin.
    #[must_use]
    pub fn parameters(
        &self,
        influencer_id: Uuid,
        influencer_name: &str,
        category: &str,
        now: DateTime<Utc>,
    ) -> CampaignParameters {
        CampaignParameters {
            name: self.campaign_name(influencer_name, category),
            description: self.campaign_description(influencer_name, category),
            commission_type: self.commission_type,
            amount: self.amount,
            currency: self.currency.to_owned(),
            commission_description: None,
            start: now,
            end: Some(now + Duration::days(self.duration_days)),
            material_title: self.material_title.to_owned(),
            material_description: self.material_description.to_owned(),
            material_links: to_owned_vec(self.material_links),
            material_images: Vec::new(),
            material_banners: Vec::new(),
            target_categories: vec![category.to_owned()],
            allowed_affiliate_types: to_owned_vec(self.allowed_affiliate_types),
            allowed_countries: Vec::new(),
            min_followers: Some(self.min_followers),
            min_engagement_rate: Some(self.min_engagement_rate),
            auto_activate: true,
            origin: Some(OriginReference {
                influencer_id,
                category: category.to_owned(),
            }),
        }
    }
}

fn to_owned_vec(values: &[&str]) -> Vec<String> {
    values.iter().map(|&v| v.to_owned()).collect()
}

/// Blueprint for `category`, falling back to the default.
#[must_use]
pub fn blueprint_for(category: &str) -> &'static CampaignBlueprint {
    let category = category.trim().to_lowercase();
    if category.is_empty() {
        return &DEFAULT_BLUEPRINT;
    }
    BLUEPRINTS
        .iter()
        .find(|b| b.key == category)
        .or_else(|| {
            BLUEPRINTS
                .iter()
                .find(|b| category.contains(b.key) || b.key.contains(category.as_str()))
        })
        .unwrap_or(&DEFAULT_BLUEPRINT)
}

/// Categories with a dedicated blueprint.
#[must_use]
pub fn available_categories() -> Vec<&'static str> {
    BLUEPRINTS.iter().map(|b| b.key).collect()
}

/// One parameter set per non-blank category, in input order.
#[must_use]
pub fn generate_for_influencer(
    influencer_id: Uuid,
    influencer_name: &str,
    categories: &[String],
    now: DateTime<Utc>,
) -> Vec<CampaignParameters> {
    categories
        .iter()
        .map(|c| c.trim().to_lowercase())
        .filter(|c| !c.is_empty())
        .map(|category| {
            blueprint_for(&category).parameters(influencer_id, influencer_name, &category, now)
        })
        .collect()
}

//! NAICS prefix classification of industry codes.

/// Store-based retail subsectors.
static BRICK_AND_MORTAR_PREFIXES: &[&str] = &[
    "441", // motor vehicle and parts dealers
    "442", // furniture and home furnishings
    "443", // electronics and appliance stores
    "444", // building material and garden
    "445", // food and beverage stores
    "446", // health and personal care
    "447", // gasoline stations
    "448", // clothing and accessories
    "451", // sporting goods, hobby, books
    "452", // general merchandise
    "453", // miscellaneous store retailers
];

/// Online selling and the logistics behind it.
static ECOMMERCE_PREFIXES: &[&str] = &[
    "4541", // electronic shopping and mail-order houses
    "4251", // wholesale electronic markets and agents
    "492",  // couriers and messengers
    "4931", // warehousing and storage
];

/// Category membership of one industry code. Both, either or neither flag
/// may be set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CategoryTag {
    pub is_brick_and_mortar: bool,
    pub is_ecommerce: bool,
}

pub fn classify(industry_code: &str) -> CategoryTag {
    let matches = |prefixes: &[&str]| prefixes.iter().any(|p| industry_code.starts_with(p));

    CategoryTag {
        is_brick_and_mortar: matches(BRICK_AND_MORTAR_PREFIXES),
        is_ecommerce: matches(ECOMMERCE_PREFIXES),
    }
}

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    Moisturizer,
    Cleanser,
    Treatment,
    #[serde(rename = "Face Mask")]
    FaceMask,
    #[serde(rename = "Eye cream")]
    EyeCream,
    #[serde(rename = "Sun protect")]
    SunProtect,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Moisturizer,
        Category::Cleanser,
        Category::Treatment,
        Category::FaceMask,
        Category::EyeCream,
        Category::SunProtect,
    ];

    /// Label as printed in the source dataset.
    pub fn label(self) -> &'static str {
        match self {
            Self::Moisturizer => "Moisturizer",
            Self::Cleanser => "Cleanser",
            Self::Treatment => "Treatment",
            Self::FaceMask => "Face Mask",
            Self::EyeCream => "Eye cream",
            Self::SunProtect => "Sun protect",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for Category {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        Self::ALL
            .into_iter()
            .find(|category| category.label().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| DomainError::InvalidArgument(format!("unknown category `{trimmed}`")))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SkinType {
    Combination,
    Dry,
    Normal,
    Oily,
    Sensitive,
}

impl SkinType {
    pub const ALL: [SkinType; 5] =
        [SkinType::Combination, SkinType::Dry, SkinType::Normal, SkinType::Oily, SkinType::Sensitive];

    pub fn label(self) -> &'static str {
        match self {
            Self::Combination => "Combination",
            Self::Dry => "Dry",
            Self::Normal => "Normal",
            Self::Oily => "Oily",
            Self::Sensitive => "Sensitive",
        }
    }
}

impl fmt::Display for SkinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The five suitability flags. Two products match only when all five agree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SkinSuitability {
    pub combination: bool,
    pub dry: bool,
    pub normal: bool,
    pub oily: bool,
    pub sensitive: bool,
}

impl SkinSuitability {
    pub fn suits(&self, skin_type: SkinType) -> bool {
        match skin_type {
            SkinType::Combination => self.combination,
            SkinType::Dry => self.dry,
            SkinType::Normal => self.normal,
            SkinType::Oily => self.oily,
            SkinType::Sensitive => self.sensitive,
        }
    }

    pub fn skin_types(&self) -> impl Iterator<Item = SkinType> + '_ {
        SkinType::ALL.into_iter().filter(|skin_type| self.suits(*skin_type))
    }
}

/// Ordered ingredient entries exactly as listed on the label.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngredientList(Vec<String>);

impl IngredientList {
    pub const DELIMITER: &'static str = ", ";

    pub fn new(entries: Vec<String>) -> Self {
        Self(entries)
    }

    /// Splits label text on the comma-space convention. Never fails: blank text
    /// yields an empty list and blank entries are dropped.
    pub fn parse(raw: &str) -> Self {
        Self(
            raw.split(Self::DELIMITER)
                .map(str::trim)
                .filter(|entry| !entry.is_empty())
                .map(str::to_owned)
                .collect(),
        )
    }

    pub fn entries(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub category: Category,
    pub brand: String,
    pub name: String,
    pub price: Decimal,
    pub rank: f64,
    pub ingredients: IngredientList,
    pub suitability: SkinSuitability,
}

impl Product {
    pub fn display_name(&self) -> String {
        format!("{} - {}", self.brand, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::{Category, IngredientList, SkinSuitability, SkinType};

    #[test]
    fn category_parses_dataset_labels() {
        assert_eq!("Face Mask".parse::<Category>().ok(), Some(Category::FaceMask));
        assert_eq!("eye cream".parse::<Category>().ok(), Some(Category::EyeCream));
        assert_eq!(" Sun protect ".parse::<Category>().ok(), Some(Category::SunProtect));
        assert!("Serum".parse::<Category>().is_err());
    }

    #[test]
    fn ingredient_list_keeps_label_order() {
        let list = IngredientList::parse("Water, Glycerin, Shea Butter");
        assert_eq!(list.entries(), ["Water", "Glycerin", "Shea Butter"]);
    }

    #[test]
    fn ingredient_list_parsing_is_total() {
        assert!(IngredientList::parse("").is_empty());
        assert!(IngredientList::parse(" ,  , ").is_empty());
        assert_eq!(IngredientList::parse("Water").len(), 1);
        assert_eq!(IngredientList::parse("1,2-Hexanediol, Water").entries(), ["1,2-Hexanediol", "Water"]);
    }

    #[test]
    fn suitability_lists_flagged_skin_types() {
        let suitability = SkinSuitability { dry: true, sensitive: true, ..SkinSuitability::default() };
        let types: Vec<SkinType> = suitability.skin_types().collect();
        assert_eq!(types, vec![SkinType::Dry, SkinType::Sensitive]);
    }
}

//! Ingredient set encoding.
//!
//! Only the dominant part of each formulation is encoded: the first
//! `floor(0.8 * len)` label entries, since ingredients are listed in descending
//! concentration. Slash-joined entries (`"Aqua/Water"`) are alias groups and
//! contribute every side as its own token.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::catalog::Catalog;
use crate::domain::product::IngredientList;
use crate::errors::DomainError;

pub const DOMINANT_PREFIX_RATIO: f64 = 0.8;
pub const ALIAS_SEPARATOR: char = '/';

/// Number of leading entries that take part in encoding.
pub fn dominant_prefix_len(len: usize) -> usize {
    (DOMINANT_PREFIX_RATIO * len as f64).floor() as usize
}

pub fn dominant_prefix(ingredients: &IngredientList) -> &[String] {
    let entries = ingredients.entries();
    &entries[..dominant_prefix_len(entries.len())]
}

/// Splits one label entry into its alias tokens. Entries without a slash yield
/// themselves; blank sides are dropped.
pub fn alias_tokens(entry: &str) -> impl Iterator<Item = &str> {
    entry.split(ALIAS_SEPARATOR).map(str::trim).filter(|token| !token.is_empty())
}

/// Sorted, deduplicated token columns shared by every feature vector.
/// Deserialized lists are re-sorted so lookups stay valid.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Vocabulary {
    tokens: Vec<String>,
}

impl Vocabulary {
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: BTreeSet<String> = tokens.into_iter().map(Into::into).collect();
        Self { tokens: set.into_iter().collect() }
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.position(token).is_some()
    }

    pub fn position(&self, token: &str) -> Option<usize> {
        self.tokens.binary_search_by(|candidate| candidate.as_str().cmp(token)).ok()
    }
}

impl From<Vec<String>> for Vocabulary {
    fn from(tokens: Vec<String>) -> Self {
        Self::from_tokens(tokens)
    }
}

impl From<Vocabulary> for Vec<String> {
    fn from(vocabulary: Vocabulary) -> Self {
        vocabulary.tokens
    }
}

/// Dense 0/1 matrix, one row per catalog product in catalog order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    n_features: usize,
    rows: Vec<Vec<u8>>,
}

impl FeatureMatrix {
    pub fn from_rows(n_features: usize, rows: Vec<Vec<u8>>) -> Result<Self, DomainError> {
        if let Some((index, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != n_features) {
            return Err(DomainError::InvalidArgument(format!(
                "feature row {index} has {} columns, expected {n_features}",
                row.len()
            )));
        }
        Ok(Self { n_features, rows })
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn row(&self, index: usize) -> &[u8] {
        &self.rows[index]
    }

    pub fn rows(&self) -> impl ExactSizeIterator<Item = &[u8]> + '_ {
        self.rows.iter().map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Vocabulary and feature matrix derived together from one catalog snapshot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedCatalog {
    pub vocabulary: Vocabulary,
    pub features: FeatureMatrix,
}

impl EncodedCatalog {
    pub fn from_catalog(catalog: &Catalog) -> Self {
        let vocabulary = build_vocabulary(catalog);
        let features = encode(catalog, &vocabulary);
        info!(
            event_name = "encoding.catalog_encoded",
            products = features.n_rows(),
            vocabulary_size = vocabulary.len(),
            "ingredient set encoding completed"
        );
        Self { vocabulary, features }
    }

    /// Rejects a matrix that was derived from a different snapshot size.
    pub fn ensure_matches(&self, catalog: &Catalog) -> Result<(), DomainError> {
        ensure_rows_match(&self.features, catalog)
    }
}

pub(crate) fn ensure_rows_match(features: &FeatureMatrix, catalog: &Catalog) -> Result<(), DomainError> {
    if features.n_rows() != catalog.len() {
        return Err(DomainError::InvalidArgument(format!(
            "feature matrix has {} rows but the catalog has {} products",
            features.n_rows(),
            catalog.len()
        )));
    }
    Ok(())
}

pub fn build_vocabulary(catalog: &Catalog) -> Vocabulary {
    let tokens = catalog.products().iter().fold(BTreeSet::new(), |mut tokens, product| {
        for entry in dominant_prefix(&product.ingredients) {
            tokens.extend(alias_tokens(entry).map(str::to_owned));
        }
        tokens
    });
    Vocabulary { tokens: tokens.into_iter().collect() }
}

pub fn encode(catalog: &Catalog, vocabulary: &Vocabulary) -> FeatureMatrix {
    let rows = catalog.products().iter().map(|product| encode_product(&product.ingredients, vocabulary)).collect();
    FeatureMatrix { n_features: vocabulary.len(), rows }
}

/// Encodes one ingredient list. A column is 1 when its token appears among the
/// alias tokens of the list's dominant prefix.
pub fn encode_product(ingredients: &IngredientList, vocabulary: &Vocabulary) -> Vec<u8> {
    let present: HashSet<&str> = dominant_prefix(ingredients).iter().flat_map(|entry| alias_tokens(entry)).collect();
    vocabulary.tokens().iter().map(|token| u8::from(present.contains(token.as_str()))).collect()
}

#[cfg(test)]
mod tests {
    use super::{
        build_vocabulary, dominant_prefix_len, encode, encode_product, EncodedCatalog, FeatureMatrix, Vocabulary,
    };
    use crate::catalog::fixtures::{dry_sensitive_moisturizers, product};
    use crate::catalog::Catalog;
    use crate::domain::product::{Category, IngredientList};

    #[test]
    fn prefix_length_rounds_down() {
        assert_eq!(dominant_prefix_len(0), 0);
        assert_eq!(dominant_prefix_len(1), 0);
        assert_eq!(dominant_prefix_len(3), 2);
        assert_eq!(dominant_prefix_len(5), 4);
        assert_eq!(dominant_prefix_len(10), 8);
    }

    #[test]
    fn vocabulary_covers_only_dominant_prefixes() {
        let catalog = Catalog::new(dry_sensitive_moisturizers());
        let vocabulary = build_vocabulary(&catalog);

        assert_eq!(vocabulary.tokens(), ["Aqua", "Glycerin", "Water"]);
        assert!(!vocabulary.contains("Shea Butter"));
        assert!(!vocabulary.contains("Retinol"));
    }

    #[test]
    fn trailing_token_enters_vocabulary_through_another_products_prefix() {
        let catalog = Catalog::new(vec![
            product(Category::Cleanser, "A", "One", 10, "Water, Glycerin, Niacinamide, Zinc, Perfume"),
            product(Category::Cleanser, "B", "Two", 10, "Perfume, Water, Glycerin, Zinc, Clay"),
        ]);
        let vocabulary = build_vocabulary(&catalog);

        assert!(vocabulary.contains("Perfume"));
        assert!(!vocabulary.contains("Clay"));
        assert_eq!(vocabulary.len(), 5);
    }

    #[test]
    fn vocabulary_is_sorted_and_alias_split() {
        let catalog = Catalog::new(vec![product(
            Category::Treatment,
            "A",
            "Serum",
            10,
            "Water/Aqua/Eau, Niacinamide, Zinc PCA, Panthenol, Perfume",
        )]);
        let vocabulary = build_vocabulary(&catalog);

        assert_eq!(vocabulary.tokens(), ["Aqua", "Eau", "Niacinamide", "Panthenol", "Water", "Zinc PCA"]);
        assert_eq!(vocabulary.position("Niacinamide"), Some(2));
    }

    #[test]
    fn alias_entry_encodes_every_side_as_present() {
        let vocabulary = Vocabulary::from_tokens(["Aqua", "Glycerin", "Water"]);
        let encoded = encode_product(&IngredientList::parse("Water/Aqua, Niacinamide, Perfume"), &vocabulary);

        assert_eq!(encoded, vec![1, 0, 1]);
    }

    #[test]
    fn encoding_is_total_and_fixed_width() {
        let vocabulary = Vocabulary::from_tokens(["Glycerin", "Water"]);

        assert_eq!(encode_product(&IngredientList::parse(""), &vocabulary), vec![0, 0]);
        assert_eq!(encode_product(&IngredientList::parse("Water"), &vocabulary), vec![0, 0]);
        assert_eq!(encode_product(&IngredientList::parse("Water, Glycerin"), &vocabulary), vec![0, 1]);
        assert_eq!(encode_product(&IngredientList::parse("Water, Glycerin"), &Vocabulary::default()), Vec::<u8>::new());
    }

    #[test]
    fn identical_lists_encode_identically() {
        let catalog = Catalog::new(vec![
            product(Category::Cleanser, "A", "One", 10, "Water, Glycerin, Clay, Zinc, Perfume"),
            product(Category::Cleanser, "B", "Two", 12, "Water, Glycerin, Clay, Zinc, Perfume"),
        ]);
        let encoded = EncodedCatalog::from_catalog(&catalog);

        assert_eq!(encoded.features.row(0), encoded.features.row(1));
        assert!(encoded.ensure_matches(&catalog).is_ok());
        assert!(encoded.ensure_matches(&Catalog::default()).is_err());
    }

    #[test]
    fn single_ingredient_product_gets_an_all_zero_row() {
        let catalog = Catalog::new(vec![
            product(Category::Cleanser, "A", "One", 10, "Water, Glycerin, Clay"),
            product(Category::Cleanser, "B", "Solo", 12, "Squalane"),
        ]);
        let vocabulary = build_vocabulary(&catalog);
        let features = encode(&catalog, &vocabulary);

        assert_eq!(features.n_rows(), 2);
        assert!(features.row(1).iter().all(|value| *value == 0));
        assert!(!vocabulary.contains("Squalane"));
    }

    #[test]
    fn ragged_rows_are_rejected() {
        assert!(FeatureMatrix::from_rows(2, vec![vec![0, 1], vec![1]]).is_err());
        assert!(FeatureMatrix::from_rows(2, vec![vec![0, 1], vec![1, 1]]).is_ok());
    }

    #[test]
    fn deserialized_vocabulary_is_sorted_and_deduplicated() {
        let vocabulary: Vocabulary =
            serde_json::from_str(r#"["Water", "Glycerin", "Aqua", "Water"]"#).expect("token list parses");

        assert_eq!(vocabulary.tokens(), ["Aqua", "Glycerin", "Water"]);
        assert_eq!(vocabulary.position("Glycerin"), Some(1));
        assert_eq!(serde_json::to_string(&vocabulary).expect("serializes"), r#"["Aqua","Glycerin","Water"]"#);
    }
}

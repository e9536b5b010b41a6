//! Immutable catalog snapshot and the dataset loader that produces it.

pub mod loader;

use tracing::warn;

use crate::domain::product::Product;
use crate::errors::DomainError;

pub use loader::{load_catalog, load_catalog_from_reader, CatalogError, LoadOptions, LoadReport};

/// One cleaned dataset snapshot. Products are never mutated after construction;
/// row indices are stable for the lifetime of the snapshot.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    products: Vec<Product>,
}

/// Result of resolving a product name. `duplicates` counts the later rows that
/// carry the same name and were passed over in favour of the first match.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NameLookup<'a> {
    pub index: usize,
    pub product: &'a Product,
    pub duplicates: usize,
}

impl Catalog {
    pub fn new(products: Vec<Product>) -> Self {
        Self { products }
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn get(&self, index: usize) -> Option<&Product> {
        self.products.get(index)
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    /// Resolves `name` (and `brand`, when given) to the first matching row in
    /// catalog order.
    pub fn lookup(&self, name: &str, brand: Option<&str>) -> Result<NameLookup<'_>, DomainError> {
        let mut matches = self.products.iter().enumerate().filter(|(_, product)| {
            product.name == name && brand.map_or(true, |brand| product.brand == brand)
        });

        let Some((index, product)) = matches.next() else {
            return Err(DomainError::ProductNotFound { name: name.to_owned() });
        };
        let duplicates = matches.count();

        if duplicates > 0 {
            warn!(
                event_name = "catalog.lookup.ambiguous_name",
                product_name = name,
                selected_index = index,
                duplicates,
                "product name is not unique; using the first match in catalog order"
            );
        }

        Ok(NameLookup { index, product, duplicates })
    }

    /// Names that occur on more than one row, in first-occurrence order.
    pub fn duplicate_names(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        let mut reported = std::collections::HashSet::new();
        let mut duplicates = Vec::new();
        for product in &self.products {
            let name = product.name.as_str();
            if !seen.insert(name) && reported.insert(name) {
                duplicates.push(name);
            }
        }
        duplicates
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::product;
    use super::Catalog;
    use crate::domain::product::Category;
    use crate::errors::DomainError;

    #[test]
    fn lookup_uses_first_match_and_reports_duplicates() {
        let catalog = Catalog::new(vec![
            product(Category::Cleanser, "Alpha", "Gentle Wash", 12, "Water"),
            product(Category::Cleanser, "Beta", "Gentle Wash", 8, "Water"),
            product(Category::Cleanser, "Gamma", "Gentle Wash", 9, "Water"),
        ]);

        let lookup = catalog.lookup("Gentle Wash", None).expect("name exists");
        assert_eq!(lookup.index, 0);
        assert_eq!(lookup.product.brand, "Alpha");
        assert_eq!(lookup.duplicates, 2);
        assert_eq!(catalog.duplicate_names(), vec!["Gentle Wash"]);
    }

    #[test]
    fn lookup_can_be_narrowed_by_brand() {
        let catalog = Catalog::new(vec![
            product(Category::Cleanser, "Alpha", "Gentle Wash", 12, "Water"),
            product(Category::Cleanser, "Beta", "Gentle Wash", 8, "Water"),
        ]);

        let lookup = catalog.lookup("Gentle Wash", Some("Beta")).expect("brand and name exist");
        assert_eq!(lookup.index, 1);
        assert_eq!(lookup.duplicates, 0);
    }

    #[test]
    fn lookup_of_unknown_name_is_not_found() {
        let catalog = Catalog::new(vec![product(Category::Cleanser, "Alpha", "Gentle Wash", 12, "Water")]);

        assert_eq!(
            catalog.lookup("Harsh Scrub", None),
            Err(DomainError::ProductNotFound { name: "Harsh Scrub".to_owned() })
        );
    }
}

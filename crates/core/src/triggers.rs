//! Fungal-acne trigger annotation.
//!
//! Unlike encoding, annotation inspects the full ingredient list: trace amounts
//! near the end of a label still matter to someone avoiding these ingredients.

use crate::domain::product::Product;
use crate::encoding::{alias_tokens, ALIAS_SEPARATOR};

pub const FUNGAL_ACNE_TRIGGERS: [&str; 49] = [
    "acetylated glycol stearate",
    "ascorbyl palmitate",
    "coconut oil",
    "decyl oleate",
    "ethylhexyl palmitate",
    "galactomyces",
    "glycerides citrate",
    "glycerine",
    "glyceryl laurate",
    "glyceryl monostearate",
    "glyceryl oleate",
    "glyceryl stearate",
    "glycol distearate",
    "hexyl laurate",
    "hydrogenated coco-glycerides",
    "hydrogenated castor oil",
    "hydrogenated palm glycerides",
    "isopropyl palmitate",
    "isopropyl myristate",
    "lecithin",
    "lactic acid",
    "mango butter",
    "methyl glucose sesquistearate",
    "monostearate",
    "PEG-7 glyceryl cocoate",
    "PEG-8 laurate",
    "PEG-10 isostearate",
    "PEG-20 glyceryl triisostearate",
    "PEG-30 dipolyhydroxystearate",
    "PEG-35 castor oil",
    "PEG-40 stearate",
    "PEG-40 castor oil",
    "PEG-90 glyceryl isostearate",
    "PEG-100 stearate",
    "PEG-glyceryl stearate",
    "polyglyceryl isostearate",
    "polyglyceryl-3 diisostearate",
    "polysorbate-20",
    "polysorbate-40",
    "polysorbate-60",
    "polysorbate-80",
    "retinyl palmitate",
    "shea butter",
    "sodium cocoyl isethionate",
    "sodium methyl cocoyl taurate",
    "sorbitan laurate",
    "sorbitan trioleate",
    "sucrose cocoate",
    "trihydroxystearin",
];

pub fn is_trigger(token: &str) -> bool {
    let token = token.trim();
    FUNGAL_ACNE_TRIGGERS.iter().any(|trigger| trigger.eq_ignore_ascii_case(token))
}

/// Triggers found in `product`, lower-cased, in label order. An alias entry is
/// checked side by side and may contribute several matches; repeated
/// ingredients are reported every time they occur.
pub fn annotate_triggers(product: &Product) -> Vec<String> {
    let mut found = Vec::new();
    for entry in product.ingredients.entries() {
        let entry = entry.trim().to_lowercase();
        if entry.contains(ALIAS_SEPARATOR) {
            found.extend(alias_tokens(&entry).filter(|token| is_trigger(token)).map(str::to_owned));
        } else if is_trigger(&entry) {
            found.push(entry);
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::{annotate_triggers, is_trigger, FUNGAL_ACNE_TRIGGERS};
    use crate::catalog::fixtures::product;
    use crate::domain::product::Category;

    #[test]
    fn reference_list_matches_case_insensitively() {
        assert_eq!(FUNGAL_ACNE_TRIGGERS.len(), 49);
        assert!(is_trigger("Shea Butter"));
        assert!(is_trigger("peg-40 castor oil"));
        assert!(is_trigger("  Lecithin "));
        assert!(!is_trigger("Glycerin"));
    }

    #[test]
    fn triggers_in_the_trailing_fifth_are_still_reported() {
        let product = product(
            Category::Moisturizer,
            "Barrier Lab",
            "Rich Cream",
            40,
            "Water, Squalane, Niacinamide, Panthenol, Ceramide NP, Cholesterol, Allantoin, Tocopherol, Shea Butter, Lecithin",
        );

        assert_eq!(annotate_triggers(&product), vec!["shea butter", "lecithin"]);
    }

    #[test]
    fn alias_entries_are_checked_per_side() {
        let product = product(
            Category::Cleanser,
            "Foam Co",
            "Daily Foam",
            12,
            "Water/Aqua, Coconut Oil / Mango Butter, Glycerine/Glycerin",
        );

        assert_eq!(annotate_triggers(&product), vec!["coconut oil", "mango butter", "glycerine"]);
    }

    #[test]
    fn duplicates_are_kept_in_label_order() {
        let product = product(Category::Treatment, "Acid Co", "Peel", 30, "Lactic Acid, Water, Lactic Acid");

        assert_eq!(annotate_triggers(&product), vec!["lactic acid", "lactic acid"]);
    }

    #[test]
    fn products_without_triggers_get_an_empty_list() {
        let toner = product(Category::Treatment, "Acid Co", "Toner", 18, "Water, Niacinamide");
        assert!(annotate_triggers(&toner).is_empty());

        let empty = product(Category::Treatment, "Acid Co", "Blank", 18, "");
        assert!(annotate_triggers(&empty).is_empty());
    }
}

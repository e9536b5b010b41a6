pub mod catalog;
pub mod clustering;
pub mod config;
pub mod domain;
pub mod encoding;
pub mod errors;
pub mod insights;
pub mod pipeline;
pub mod recommend;
pub mod report;
pub mod triggers;

pub use catalog::{load_catalog, Catalog, CatalogError, LoadReport, NameLookup};
pub use clustering::{
    cluster, locate_elbow, select_k, ClusterCountSelector, ClusterModel, Clusterer, Deadline, ElbowPoint,
    KMeansClusterer, KMeansParams, KSelection,
};
pub use config::{AppConfig, ConfigError};
pub use domain::product::{Category, IngredientList, Product, SkinSuitability, SkinType};
pub use encoding::{build_vocabulary, encode, encode_product, EncodedCatalog, FeatureMatrix, Vocabulary};
pub use errors::{ApplicationError, DomainError};
pub use insights::{category_summary, ingredient_frequencies, price_outliers, CategorySummary, PriceOutlier};
pub use pipeline::{ClusterRun, Pipeline};
pub use recommend::{recommend, RecommendationEngine, RecommendationQuery, RecommendationRow, Recommendations};
pub use report::{ClusterReport, ReportError};
pub use triggers::{annotate_triggers, FUNGAL_ACNE_TRIGGERS};

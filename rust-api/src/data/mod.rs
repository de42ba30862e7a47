//! Race results and feature engineering modules

pub mod features;
pub mod form;
pub mod live;
pub mod results;

// Re-export commonly used types
pub use features::{
    feature_names, save_features, FeatureBuilder, FeatureRow, FeatureVector, FEATURE_COUNT,
    FEATURE_NAMES,
};
pub use form::{form_after, prior_form, FormTracker, PriorForm};
pub use live::{build_live_features, LiveFeatures};
pub use results::{load_results, save_results, status_is_dnf, ResultRecord};

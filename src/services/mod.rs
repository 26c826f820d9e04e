pub mod attempt_service;
pub mod heatmap_service;
pub mod reporting_service;
pub mod test_service;

pub mod answer;
pub mod attempt;
pub mod heatmap;
pub mod user;

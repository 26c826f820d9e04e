pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use crate::services::{
    attempt_service::AttemptService, heatmap_service::HeatmapService,
    reporting_service::ReportingService,
};
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub attempt_service: AttemptService,
    pub heatmap_service: HeatmapService,
    pub reporting_service: ReportingService,
}

impl AppState {
    pub fn new(pool: PgPool) -> Self {
        let config = crate::config::get_config();

        let attempt_service = AttemptService::new(pool.clone());
        let heatmap_service = HeatmapService::new(pool.clone(), config.heatmap_timezone);
        let reporting_service = ReportingService::new(
            pool.clone(),
            heatmap_service.clone(),
            config.heatmap_timezone,
        );

        Self {
            pool,
            attempt_service,
            heatmap_service,
            reporting_service,
        }
    }
}

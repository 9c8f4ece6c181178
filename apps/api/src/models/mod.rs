pub mod analytics;
pub mod consultation;
pub mod crs;
pub mod pathway;
pub mod report;
pub mod user;

pub mod combine;
pub mod config;
pub mod dataset;
pub mod extract;
pub mod normalize;
pub mod pipeline;
pub mod regime;
pub mod report;
pub mod schema;
pub mod table;
pub mod utils;

pub mod performance_order;
pub mod race_category;
pub mod rating_scale;
pub mod rating_status;
pub mod terrain_condition;

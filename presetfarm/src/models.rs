pub mod app_setting;
pub mod error;
pub mod tree;

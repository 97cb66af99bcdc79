pub mod apply;
pub mod settings;

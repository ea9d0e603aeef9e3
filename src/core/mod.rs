pub mod agent;
pub mod text;

pub mod app;
pub mod input;
pub mod render;
pub mod text;
pub mod theme;

pub use app::run;

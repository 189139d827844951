pub mod app_context;
pub mod cache;
pub mod constants;
pub mod settings;

pub use app_context::AppContext;
pub use settings::Settings;

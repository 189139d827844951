pub mod telegram_init_data;

pub use telegram_init_data::verify_init_data;

pub mod discriminator;
pub mod events;
pub mod launchpad_monitor;
pub mod tx_decode;

pub use events::LaunchEvent;

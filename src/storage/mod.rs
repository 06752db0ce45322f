pub mod console;
pub mod store;
pub mod types;

pub use console::{Console, LineConsole};
pub use store::{ConfigStore, LEGACY_PROFILE_NAME};
pub use types::{Configuration, ProfileInfo};

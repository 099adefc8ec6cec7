pub mod config_loader;
pub mod constants;
pub mod format;
pub mod pda;

pub use config_loader::*;
pub use constants::*;
pub use format::*;
pub use pda::*;

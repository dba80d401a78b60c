pub mod classify;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod details;
pub mod labels;
pub mod layout;
pub mod layout_dump;
pub mod model;
pub mod reconcile;
pub mod render;
pub mod scene;
pub mod session;
pub mod store;
pub mod theme;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{Config, load_config};
pub use layout::{Layout, compute_layout};
pub use reconcile::{LayoutState, MergeMode, reconcile};
pub use session::{Session, Trigger};

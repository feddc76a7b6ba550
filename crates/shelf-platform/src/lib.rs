mod paths;
mod settings;

pub use paths::{AppPaths, AppPathsError};
pub use settings::Settings;

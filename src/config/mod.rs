mod loader;
mod types;

pub use loader::{CONFIG_FILE, apply_env, load, load_file};
pub use types::{Config, DEFAULT_DOCKER_HOST};

/// Configuration system
///
/// Sections are declared with `config_struct!` in `schemas/`, one file per
/// concern. `utils` loads `config.toml`, validates it and exposes the global
/// instance through `with_config` / `get_config_clone`.
#[macro_use]
pub mod macros;
pub mod schemas;
pub mod utils;

pub use schemas::*;
pub use utils::{
    get_config_clone, load_config, load_config_from_path, parse_config, save_config, set_config,
    to_toml, unknown_keys, with_config, write_default_config, CONFIG,
};

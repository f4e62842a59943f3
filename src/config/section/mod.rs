//! Configuration section definitions.
//!
//! Each module corresponds to a section in `flint.toml`:
//!
//! | Module    | TOML Section | Purpose                                  |
//! |-----------|--------------|------------------------------------------|
//! | `paths`   | `[paths]`    | Source, compiled output and deps dirs    |
//! | `install` | `[install]`  | Package manager command                  |
//! | `bundle`  | `[bundle]`   | Bundler command, excludes, externals     |
//! | `serve`   | `[serve]`    | WebSocket port and file watching         |

mod bundle;
mod install;
mod paths;
mod serve;

pub use bundle::BundleConfig;
pub use install::InstallConfig;
pub use paths::PathsConfig;
pub use serve::ServeConfig;

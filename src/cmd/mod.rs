//! CLI command implementations.
//!
//! | Module     | Commands handled |
//! |------------|------------------|
//! | `serve`    | `Serve`          |
//! | `separate` | `Separate`       |
//! | `config`   | `Config`         |

pub mod config;
pub mod separate;
pub mod serve;

pub use config::cmd_config;
pub use separate::cmd_separate;
pub use serve::cmd_serve;

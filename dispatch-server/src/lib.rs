//! Dispatch Server - order consolidation and delivery assignment engine
//!
//! Merges nearby food-delivery orders into group orders, assigns the
//! consolidated batches to delivery partners, and tracks every order
//! through its lifecycle.
//!
//! # Module structure
//!
//! ```text
//! dispatch-server/src/
//! ├── core/        # config, state, server, background tasks
//! ├── engine/      # matcher, coordinator, scheduler, lifecycle, indices
//! ├── store/       # in-memory order/group/assignment stores
//! ├── directory/   # restaurant/partner registries, notification sink
//! ├── api/         # HTTP routes and handlers
//! └── utils/       # logging, error re-exports
//! ```

pub mod api;
pub mod core;
pub mod directory;
pub mod engine;
pub mod store;
pub mod utils;

// Re-export common types
pub use core::{Config, Server, ServerState};
pub use engine::{DispatchEngine, SubmitOrder};
pub use utils::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_level};

pub fn print_banner() {
    println!(
        r#"
    ____  _                  __       __
   / __ \(_)________  ____ _/ /______/ /_
  / / / / / ___/ __ \/ __ `/ __/ ___/ __ \
 / /_/ / (__  ) /_/ / /_/ / /_/ /__/ / / /
/_____/_/____/ .___/\__,_/\__/\___/_/ /_/
            /_/
    "#
    );
}

pub mod actions;
pub mod cli;
pub mod config;
pub mod context;
pub mod interpreter;
pub mod parser;
pub mod template;

// Re-export main types
pub use actions::{ActionFlow, ActionRegistry, ActionRunner, FlowError, Step};
pub use context::{ComponentResolver, Context, StaticResolver};
pub use interpreter::{Bindings, Val};

// Re-export the template entry points
pub use template::{evaluate, get_id_by_template, is_template};

pub mod ats_handlers;
pub mod profile_handlers;
pub mod query_handlers;
pub mod suggestion_handlers;
pub mod system_handlers;
pub mod template_handlers;

pub use ats_handlers::*;
pub use profile_handlers::*;
pub use query_handlers::*;
pub use suggestion_handlers::*;
pub use system_handlers::*;
pub use template_handlers::*;

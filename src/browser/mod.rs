pub mod launcher;
pub mod options;
pub mod pool;
pub mod session;
pub mod target;

pub use options::{Options, Settings};
pub use pool::BrowserPool;
pub use session::TargetSession;
pub use target::{Phase, Target, TargetBuilder, DEFAULT_HOME_PAGE};

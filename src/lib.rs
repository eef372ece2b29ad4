//! Browser test helpers: named page descriptors of CSS/XPath locators, and
//! element interaction (wait, click, type, read) with timeouts and retries.

pub mod browser;
pub mod config;
pub mod driver;
pub mod error;
pub mod interaction;
pub mod scaffold;
pub mod selectors;

pub use browser::{BrowserPool, Options, Settings, Target, TargetSession};
pub use error::{Error, Result, WaitAction};
pub use selectors::{Locator, LocatorKind, PageDescriptor, Params};

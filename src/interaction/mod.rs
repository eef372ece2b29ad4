//! Element operations against a single tab, addressed by [`Locator`].
//!
//! These work on any [`PageDriver`](crate::driver::PageDriver) and do not
//! wait for the element first; [`Target`](crate::browser::Target) layers the
//! wait on top.
//!
//! [`Locator`]: crate::selectors::Locator

pub mod click;
pub mod hover;
pub mod keyboard;
pub mod screenshot;
pub mod value;
pub mod wait;

pub use click::{click, click_element, ClickOptions};
pub use hover::{hover, HoverOptions};
pub use keyboard::{erase, type_into, type_text, TypeOptions};
pub use screenshot::{screenshot, Encoding, Screenshot, ScreenshotOptions};
pub use value::{
    get_value, get_values, query, query_all, read_raw_value, read_value, release, require,
};
pub use wait::{wait_for, wait_options};

/// Default wait timeout in ms for element operations.
pub const DEFAULT_TIMEOUT: u64 = 30_000;

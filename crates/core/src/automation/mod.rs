//! Page automation: the capability trait the reservation flow consumes and
//! its Chrome DevTools implementation.

mod cdp;
mod error;
mod launcher;
mod page;
mod selector;
mod traits;

pub use cdp::{CdpClient, CdpEvent, CdpResponse, CdpResponseError};
pub use error::AutomationError;
pub use launcher::{chrome_args, BrowserLauncher, LaunchedBrowser, TargetInfo};
pub use page::CdpPage;
pub use selector::{js_string, TextSelector};
pub use traits::{DialogPolicy, ElementHandle, Key, PageAutomation};

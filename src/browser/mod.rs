//! Browser infrastructure for launching and managing Chrome instances

mod wrapper;

pub use crate::browser_setup::{download_managed_browser, find_browser_executable};
pub use wrapper::{BrowserWrapper, create_blank_page, launch_browser};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("Failed to create page: {0}")]
    PageCreationFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Script evaluation failed: {0}")]
    ScriptFailed(String),

    #[error("Network log unavailable: {0}")]
    NetworkLog(String),
}

pub type BrowserResult<T> = Result<T, BrowserError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::DiscoveryError;

    #[test]
    fn browser_errors_surface_as_session_errors() {
        let err: DiscoveryError = BrowserError::LaunchFailed("no chrome".into()).into();
        assert!(matches!(err, DiscoveryError::Session(BrowserError::LaunchFailed(_))));
        assert_eq!(
            err.to_string(),
            "Browser session error: Failed to launch browser: no chrome"
        );
    }
}

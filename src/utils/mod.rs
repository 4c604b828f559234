// Shared helpers for sessions and the discovery loop
pub mod constants;
mod timeout;
mod wait_for_element;

pub use timeout::{validate_discovery_timeout, validate_page_load_timeout, validate_poll_interval};
pub use wait_for_element::wait_for_element_src;

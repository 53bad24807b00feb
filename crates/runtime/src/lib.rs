//! Process runtime shared by the stayup binaries: signal handling and the
//! standalone health endpoint.

pub mod health;
pub mod shutdown;

pub use shutdown::{run_until_shutdown, shutdown_signal};

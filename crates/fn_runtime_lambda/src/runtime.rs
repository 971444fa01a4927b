pub mod bootstrap;
pub mod event_loop;

pub use bootstrap::{bootstrap, prepare_process, BootstrapError, Bootstrapped};
pub use event_loop::EventLoop;

pub mod control_plane;
pub mod environment;
pub mod runtime_api;

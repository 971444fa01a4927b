pub mod control_plane;
pub mod http_stub;

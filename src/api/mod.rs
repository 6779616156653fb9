// HTTP and WebSocket APIs

pub mod admin;
pub mod dashboard;
pub mod websocket;

pub use admin::{create_admin_router, AdminAppState};
pub use dashboard::{create_dashboard_router, DashboardAppState};
pub use websocket::{create_ws_router, ws_handler, WsAppState};

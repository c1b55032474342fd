//! REST API endpoint tests

mod attachment_tests;
mod auth_tests;
mod health_tests;
mod notification_tests;
mod project_tests;
mod task_tests;
mod team_tests;
mod user_tests;
mod websocket_tests;

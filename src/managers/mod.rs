//! State owners: tabs, persisted sessions, scroll history, navigation
//! interception and the per-tab view lifecycle.

pub mod navigation_interceptor;
pub mod scroll_history;
pub mod session_manager;
pub mod tab_manager;
pub mod view_controller;

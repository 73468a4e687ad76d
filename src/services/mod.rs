//! Services: asynchronous and session-wide work (scroll restoration, data
//! resolution, the internal channel, persistence-backed lookups, settings).

pub mod entity_fetcher;
pub mod internal_channel;
pub mod navigation_reactor;
pub mod page_analyzer;
pub mod scroll_restorer;
pub mod settings_engine;
pub mod tab_data_resolver;
pub mod url_resolver;

// Shared type definitions
// Each submodule defines types used across the engine.

pub mod entities;
pub mod errors;
pub mod host;
pub mod navigation;
pub mod path;
pub mod scroll;
pub mod session;
pub mod settings;
pub mod tab;
pub mod tab_data;
pub mod view;

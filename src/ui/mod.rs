//! Desktop shell: hosts a tab view in a `wry` webview inside a `tao` window.

pub mod webview_app;

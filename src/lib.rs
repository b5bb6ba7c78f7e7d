pub mod capture;
pub mod config;
pub mod coordinator;
pub mod evidence;
pub mod hotkeys;
pub mod menu;
pub mod models;
pub mod net;
pub mod paths;
pub mod releases;
pub mod settings;
pub mod slug;

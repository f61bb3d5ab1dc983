//! Terminal browser and editor for LMDB key/value databases

pub mod layout;
pub mod notice;
pub mod scanner;
pub mod session;
pub mod settings;
pub mod store;
pub mod ui;
pub mod value;

//! Push-style handlers served through the bridge.

pub mod static_files;

pub use static_files::StaticFiles;

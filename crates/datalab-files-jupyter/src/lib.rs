//! Jupyter notebook server backend for Datalab.
//!
//! `JupyterFileManager` maps the contents API onto the `FileManager` trait and
//! `JupyterSessionClient` reports which notebooks have a running kernel.

mod client;
mod manager;
mod sessions;

pub use client::{ContentsModel, JupyterClient};
pub use manager::JupyterFileManager;
pub use sessions::JupyterSessionClient;

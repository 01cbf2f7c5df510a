//! # datamart-client
//!
//! Client for the Data Mart, a flat-namespace object store reached over HTTP.
//!
//! Remote objects are exposed the way local files are: check that one
//! exists, stream it in, write it through a handle that uploads on
//! [`commit`](DataMartWriter::commit), or save and load serde values in a
//! gzip-compressed object format.
//!
//! # Quick Start
//!
//! ```no_run
//! use datamart_client::{Client, ClientConfig};
//! use tokio::io::AsyncWriteExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), datamart_client::DataMartError> {
//!     let client = Client::new(ClientConfig::new(
//!         "https://app.displayr.com/API",
//!         "company-secret",
//!         "12345",
//!     ))?;
//!
//!     let mut writer = client.open_write("notes.txt")?;
//!     writer.write_all(b"This is a test line.").await?;
//!     writer.commit().await?;
//!
//!     let mut reader = client.open_read("notes.txt").await?;
//!     assert_eq!(reader.read_to_vec().await?, b"This is a test line.");
//!
//!     let name = client.save_object(&vec![1.5, 2.5], "weights").await?;
//!     let weights: Vec<f64> = client.load_object(&name).await?;
//!     assert_eq!(weights, vec![1.5, 2.5]);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod client;
pub mod codec;
pub mod config;
pub mod stream;
mod error;

pub use api::DataMartApi;
pub use client::Client;
pub use config::{ClientConfig, Credentials};
pub use error::DataMartError;
pub use stream::{DataMartHandle, DataMartReader, DataMartWriter, OpenMode, ReadableStream};

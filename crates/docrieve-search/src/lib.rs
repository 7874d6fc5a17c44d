//! Search façade (§4.9): the thin layer the processing manager calls for
//! `search`, sitting on top of [`docrieve_vector::VectorIndexFacade`].

pub mod error;
pub mod service;

pub use error::{SearchError, SearchResult};
pub use service::SearchService;

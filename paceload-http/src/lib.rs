#![forbid(unsafe_code)]

mod backend;
mod client;
mod error;
mod types;
mod util;

pub use backend::{HttpBackend, HttpBackendOptions, HttpSession, PROFILE_KIND};
pub use client::HttpClient;
pub use error::{Error, Result};
pub use types::{HttpRequest, HttpResponse};

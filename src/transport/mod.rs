pub mod client;

pub use client::{HttpClient, HttpRequest, HttpResponse, ReqwestHttpClient};

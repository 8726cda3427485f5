mod http;

pub use http::HttpFleetDirectory;

mod client;
mod url;

pub use client::ReqwestPeerClient;
pub use url::build_peer_url;

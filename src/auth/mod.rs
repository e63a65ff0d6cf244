//! Browser-redirect login: callback listener and the flow driving it.

mod error;
mod flow;
mod server;

pub use error::AuthError;
pub use flow::{
    authorization_url, canonical_base_url, BrowserOpener, LoginFlow, SystemBrowser, AUTH_PATH,
    LOCAL_SERVICE_PARAM,
};
pub use server::{build_router, AuthSession, CallbackServer, Delivery, TokenSlot, TOKEN_PARAM};

use std::sync::Arc;

use assistant::{ChatClient, SessionStore};
use stock::{PriceCache, PriceClient, SymbolResolver};

pub mod analysis;
pub mod command;
pub mod config;
pub mod message;
pub mod prompt;

/// `(channel id, user id)`
pub type SessionKey = (u64, u64);

pub type PriceProvider = PriceCache<PriceClient>;

pub struct Data {
    pub price_client: Arc<PriceProvider>,
    pub resolver: SymbolResolver,
    /// `None` when no chat API key is configured.
    pub chat_client: Option<Arc<ChatClient>>,
    pub sessions: Arc<SessionStore<SessionKey>>,
}

pub type Error = anyhow::Error;
pub type Context<'a> = poise::Context<'a, Data, Error>;

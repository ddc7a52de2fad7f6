//! Deck-related AnkiConnect actions.

use serde::Serialize;

use crate::client::AnkiClient;
use crate::error::Result;

/// Provides access to deck-related AnkiConnect operations.
///
/// Obtained via [`AnkiClient::decks()`].
#[derive(Debug)]
pub struct DeckActions<'a> {
    pub(crate) client: &'a AnkiClient,
}

#[derive(Serialize)]
struct CreateDeckParams<'a> {
    deck: &'a str,
}

impl<'a> DeckActions<'a> {
    /// Get all deck names.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use deckmend::AnkiClient;
    /// # async fn example() -> deckmend::Result<()> {
    /// let client = AnkiClient::new();
    /// for deck in client.decks().names().await? {
    ///     println!("{deck}");
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn names(&self) -> Result<Vec<String>> {
        self.client.invoke_without_params("deckNames").await
    }

    /// Create a deck, returning its ID.
    ///
    /// Creating a deck that already exists returns the existing deck's ID.
    /// Use `::` for nesting, e.g. `"PSYC 2240::Chapter 5"`.
    pub async fn create(&self, name: &str) -> Result<i64> {
        self.client
            .invoke("createDeck", CreateDeckParams { deck: name })
            .await
    }
}

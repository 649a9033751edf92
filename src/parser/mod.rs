pub mod card;

use std::sync::LazyLock;

use scraper::{Html, Selector};
use thiserror::Error;

use crate::product::RawProductRecord;

pub const CONTAINER_ID: &str = "collectionList";

static CONTAINER: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(&format!("div#{}", CONTAINER_ID)).unwrap());
static CARD: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.collection-card").unwrap());

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("container #{0} not found")]
    MissingContainer(&'static str),
}

/// Markup → raw records. Cards are parsed independently; a card without a
/// details block is skipped.
pub fn parse_page(markup: &[u8]) -> Result<Vec<RawProductRecord>, ParseError> {
    let html = String::from_utf8_lossy(markup);
    let doc = Html::parse_document(&html);

    let container = doc
        .select(&CONTAINER)
        .next()
        .ok_or(ParseError::MissingContainer(CONTAINER_ID))?;

    let stamp = card::extraction_timestamp();
    Ok(container
        .select(&CARD)
        .filter_map(|el| card::parse_card(el, &stamp))
        .collect())
}

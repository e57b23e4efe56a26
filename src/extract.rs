//! Ad card extraction from a category listing page

use anyhow::{anyhow, Result};
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

use crate::types::ListingRecord;

const CARD: &str = "div.col.s6.m4.l3";
const DESCRIPTION: &str = "p.ad__card-description";
const PRICE: &str = "p.ad__card-price";
const LOCATION: &str = "p.ad__card-location";
const LOCATION_TEXT: &str = "span";
const IMAGE: &str = "img.ad__card-img";

/// Currency marker removed from price text
const CURRENCY: &str = "CFA";

/// Card field that could not be found; the card is dropped
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MissingField {
    #[error("description")]
    Description,
    #[error("price")]
    Price,
    #[error("address")]
    Address,
    #[error("image")]
    Image,
}

/// Compiled CSS selectors for the coinafrique card markup
pub struct Selectors {
    card: Selector,
    description: Selector,
    price: Selector,
    location: Selector,
    location_text: Selector,
    image: Selector,
}

fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("Invalid selector '{}': {}", css, e))
}

impl Selectors {
    pub fn new() -> Result<Self> {
        Ok(Self {
            card: parse_selector(CARD)?,
            description: parse_selector(DESCRIPTION)?,
            price: parse_selector(PRICE)?,
            location: parse_selector(LOCATION)?,
            location_text: parse_selector(LOCATION_TEXT)?,
            image: parse_selector(IMAGE)?,
        })
    }
}

/// Parsed listing page
pub struct ListingPage {
    document: Html,
}

impl ListingPage {
    pub fn parse(html: &str) -> Self {
        Self {
            document: Html::parse_document(html),
        }
    }

    /// Ad card containers in document order. The iterator is consumed once.
    pub fn cards<'a>(&'a self, selectors: &'a Selectors) -> impl Iterator<Item = ElementRef<'a>> + 'a {
        self.document.select(&selectors.card)
    }
}

/// Result of extracting every card on one page
#[derive(Debug, Default)]
pub struct PageExtraction {
    pub records: Vec<ListingRecord>,
    /// (card index on the page, first field that was missing)
    pub skipped: Vec<(usize, MissingField)>,
}

impl PageExtraction {
    pub fn cards_seen(&self) -> usize {
        self.records.len() + self.skipped.len()
    }
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>()
}

/// Strip the currency marker and every whitespace character
pub fn clean_price(raw: &str) -> String {
    raw.replace(CURRENCY, "")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

/// Build a record from one card, or report the first missing field
pub fn extract_card(card: ElementRef<'_>, selectors: &Selectors) -> Result<ListingRecord, MissingField> {
    let description = card
        .select(&selectors.description)
        .next()
        .ok_or(MissingField::Description)?;

    let price = card
        .select(&selectors.price)
        .next()
        .ok_or(MissingField::Price)?;

    let address = card
        .select(&selectors.location)
        .next()
        .and_then(|loc| loc.select(&selectors.location_text).next())
        .ok_or(MissingField::Address)?;

    let image_url = card
        .select(&selectors.image)
        .next()
        .and_then(|img| img.value().attr("src"))
        .ok_or(MissingField::Image)?;

    Ok(ListingRecord {
        item_description: element_text(description).trim().to_string(),
        price: clean_price(&element_text(price)),
        address: element_text(address).trim().to_string(),
        image_url: image_url.to_string(),
    })
}

/// Extract all cards from one page body; malformed cards are skipped
pub fn extract_page(html: &str, selectors: &Selectors) -> PageExtraction {
    let page = ListingPage::parse(html);
    let mut extraction = PageExtraction::default();

    for (index, card) in page.cards(selectors).enumerate() {
        match extract_card(card, selectors) {
            Ok(record) => extraction.records.push(record),
            Err(field) => extraction.skipped.push((index, field)),
        }
    }

    extraction
}

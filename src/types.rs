//! Listing records and the fixed set of scraped categories

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// One ad card as stored in a category table and written to its export.
///
/// Field names follow the table columns so the CSV header matches the schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListingRecord {
    #[serde(rename = "type_item")]
    pub item_description: String,
    /// Raw price text with the currency marker and whitespace removed
    pub price: String,
    pub address: String,
    #[serde(rename = "image_link")]
    pub image_url: String,
}

/// Upper bound for the user-selected page count
pub const MAX_REQUESTED_PAGES: u32 = 120;

/// Listing category scraped from coinafrique
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Category {
    MenClothes,
    MenShoes,
    ChildrenClothes,
    ChildrenShoes,
}

impl Category {
    /// Scrape order used when no category is selected
    pub const ALL: [Category; 4] = [
        Category::MenClothes,
        Category::MenShoes,
        Category::ChildrenClothes,
        Category::ChildrenShoes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::MenClothes => "men-clothes",
            Category::MenShoes => "men-shoes",
            Category::ChildrenClothes => "children-clothes",
            Category::ChildrenShoes => "children-shoes",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Category::MenClothes => "Men's Clothes",
            Category::MenShoes => "Men's Shoes",
            Category::ChildrenClothes => "Children's Clothes",
            Category::ChildrenShoes => "Children's Shoes",
        }
    }

    /// Path of the category listing below the site base URL
    pub fn url_path(&self) -> &'static str {
        match self {
            Category::MenClothes => "/categorie/vetements-homme",
            Category::MenShoes => "/categorie/chaussures-homme",
            Category::ChildrenClothes => "/categorie/vetements-enfants",
            Category::ChildrenShoes => "/categorie/chaussures-enfants",
        }
    }

    pub fn table_name(&self) -> &'static str {
        match self {
            Category::MenClothes => "mens_clothes_tab",
            Category::MenShoes => "mens_shoes_tab",
            Category::ChildrenClothes => "children_clothes_tab",
            Category::ChildrenShoes => "children_shoes_tab",
        }
    }

    /// SQLite file holding this category's table
    pub fn store_file(&self) -> &'static str {
        match self {
            Category::MenClothes => "mens_clothes.db",
            Category::MenShoes => "mens_shoes.db",
            Category::ChildrenClothes => "children_clothes.db",
            Category::ChildrenShoes => "children_shoes.db",
        }
    }

    /// De-duplicated CSV written after each scrape
    pub fn export_file(&self) -> &'static str {
        match self {
            Category::MenClothes => "mens_clothes_clean_data.csv",
            Category::MenShoes => "mens_shoes_clean_data.csv",
            Category::ChildrenClothes => "children_clothes_clean_data.csv",
            Category::ChildrenShoes => "children_shoes_clean_data.csv",
        }
    }

    /// Hand-collected CSV the user may drop next to the exports
    pub fn local_file(&self) -> &'static str {
        match self {
            Category::MenClothes => "men_clothes.csv",
            Category::MenShoes => "men_shoes.csv",
            Category::ChildrenClothes => "children_clothes.csv",
            Category::ChildrenShoes => "children_shoes.csv",
        }
    }

    /// Hard ceiling on pages fetched, whatever the user asked for
    pub fn page_cap(&self) -> u32 {
        match self {
            Category::MenClothes | Category::MenShoes => 119,
            Category::ChildrenClothes => 22,
            Category::ChildrenShoes => 8,
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "men-clothes" => Some(Category::MenClothes),
            "men-shoes" => Some(Category::MenShoes),
            "children-clothes" => Some(Category::ChildrenClothes),
            "children-shoes" => Some(Category::ChildrenShoes),
            _ => None,
        }
    }
}

/// Number of pages a session actually fetches
pub fn effective_pages(requested: u32, cap: u32) -> u32 {
    requested.min(cap)
}

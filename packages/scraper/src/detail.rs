//! Product detail page extraction.
//!
//! A detail page carries the title in the first `<h1>`, the price and stock
//! line in labelled paragraphs, the rating as a class token, the category
//! in the breadcrumb, and the remaining fields in a two-column
//! `table.table-striped` keyed by row label.

use std::collections::BTreeMap;
use std::str::FromStr as _;

use catalog_book_models::{BookRecord, StarRating};
use scraper::{ElementRef, Html};

use crate::parsing::{clean_price, first_integer, parse_count};
use crate::{ScrapeError, element_text, parse_selector};

/// Breadcrumb position of the category entry (Home / Books / Category).
const CATEGORY_CRUMB: usize = 2;

/// Extracts a [`BookRecord`] from a product page.
///
/// Any structural fault is logged against `url` and reported as `None` so
/// the caller can skip the item and carry on.
#[must_use]
pub fn extract_book(document: &Html, url: &str) -> Option<BookRecord> {
    match try_extract_book(document) {
        Ok(book) => Some(book),
        Err(e) => {
            log::error!("Error parsing book details from {url}: {e}");
            None
        }
    }
}

/// Extracts a [`BookRecord`] from a product page.
///
/// Unparseable prices and counts default to zero; only missing structure
/// is an error.
///
/// # Errors
///
/// Returns [`ScrapeError::MissingElement`] if the title, price, stock line,
/// rating or category breadcrumb is absent, and [`ScrapeError::Parse`] if
/// the rating token is not a known star rating.
pub fn try_extract_book(document: &Html) -> Result<BookRecord, ScrapeError> {
    let info = product_info(document)?;

    let title = element_text(require(document, "h1")?);
    let price = clean_price(&element_text(require(document, "p.price_color")?));

    let availability_text = element_text(require(document, "p.availability")?);
    let availability = first_integer(&availability_text).unwrap_or(0);

    let rating = star_rating(require(document, "p.star-rating")?)?;

    let crumb_sel = parse_selector("ul.breadcrumb li")?;
    let category = document
        .select(&crumb_sel)
        .nth(CATEGORY_CRUMB)
        .map(element_text)
        .ok_or(ScrapeError::MissingElement("ul.breadcrumb li (category)"))?;

    let description = description(document)?;

    let field = |label: &str| info.get(label).map_or("", String::as_str);

    Ok(BookRecord {
        title,
        price,
        availability,
        rating,
        category,
        description,
        upc: field("UPC").to_owned(),
        product_type: field("Product Type").to_owned(),
        price_excl_tax: info.get("Price (excl. tax)").map_or(0.0, |v| clean_price(v)),
        price_incl_tax: info.get("Price (incl. tax)").map_or(0.0, |v| clean_price(v)),
        tax: info.get("Tax").map_or(0.0, |v| clean_price(v)),
        num_reviews: info
            .get("Number of reviews")
            .map_or(0, |v| parse_count(v, "num_reviews")),
    })
}

/// Reads the product information table into a label → value map.
///
/// Rows without both a `<th>` label and a `<td>` value are ignored.
fn product_info(document: &Html) -> Result<BTreeMap<String, String>, ScrapeError> {
    let table_sel = parse_selector("table.table-striped")?;
    let row_sel = parse_selector("tr")?;
    let th_sel = parse_selector("th")?;
    let td_sel = parse_selector("td")?;

    let mut info = BTreeMap::new();

    let Some(table) = document.select(&table_sel).next() else {
        return Ok(info);
    };

    for row in table.select(&row_sel) {
        let (Some(th), Some(td)) = (row.select(&th_sel).next(), row.select(&td_sel).next())
        else {
            continue;
        };
        info.insert(element_text(th), element_text(td));
    }

    Ok(info)
}

/// Reads the rating word from the second class token, e.g.
/// `class="star-rating Three"`.
fn star_rating(element: ElementRef<'_>) -> Result<StarRating, ScrapeError> {
    let token = element
        .value()
        .attr("class")
        .and_then(|classes| classes.split_whitespace().nth(1))
        .ok_or(ScrapeError::MissingElement("p.star-rating class token"))?;

    StarRating::from_str(token)
        .map_err(|_| ScrapeError::Parse(format!("unknown star rating {token:?}")))
}

/// Returns the first paragraph after the `#product_description` anchor,
/// or an empty string when the page has no description.
fn description(document: &Html) -> Result<String, ScrapeError> {
    let anchor_sel = parse_selector("div#product_description")?;
    let p_sel = parse_selector("p")?;

    let Some(anchor) = document.select(&anchor_sel).next() else {
        return Ok(String::new());
    };

    if let Some(p) = anchor.select(&p_sel).next() {
        return Ok(element_text(p));
    }

    for sibling in anchor.next_siblings().filter_map(ElementRef::wrap) {
        if sibling.value().name() == "p" {
            return Ok(element_text(sibling));
        }
        if let Some(p) = sibling.select(&p_sel).next() {
            return Ok(element_text(p));
        }
    }

    Ok(String::new())
}

/// Returns the first element matching `selector`, or a
/// [`ScrapeError::MissingElement`] naming it.
fn require<'a>(document: &'a Html, selector: &'static str) -> Result<ElementRef<'a>, ScrapeError> {
    let sel = parse_selector(selector)?;
    document
        .select(&sel)
        .next()
        .ok_or(ScrapeError::MissingElement(selector))
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// Builds a product page in the catalogue's markup.
    pub fn product_page(title: &str, upc: &str, stock: &str, rating: &str) -> String {
        format!(
            r#"<html><body>
<ul class="breadcrumb">
  <li><a href="../../index.html">Home</a></li>
  <li><a href="../category/books_1/index.html">Books</a></li>
  <li><a href="../category/books/poetry_23/index.html">Poetry</a></li>
  <li class="active">{title}</li>
</ul>
<div class="product_main">
  <h1>{title}</h1>
  <p class="price_color">£51.77</p>
  <p class="instock availability"><i class="icon-ok"></i>
    {stock}
  </p>
  <p class="star-rating {rating}"><i class="icon-star"></i></p>
</div>
<div id="product_description" class="sub-header"><h2>Product Description</h2></div>
<p>It's hard to imagine a world without A Light in the Attic.</p>
<div class="sub-header"><h2>Product Information</h2></div>
<table class="table table-striped">
  <tr><th>UPC</th><td>{upc}</td></tr>
  <tr><th>Product Type</th><td>Books</td></tr>
  <tr><th>Price (excl. tax)</th><td>£51.77</td></tr>
  <tr><th>Price (incl. tax)</th><td>£51.77</td></tr>
  <tr><th>Tax</th><td>£0.00</td></tr>
  <tr><th>Availability</th><td>{stock}</td></tr>
  <tr><th>Number of reviews</th><td>0</td></tr>
</table>
</body></html>"#
        )
    }
}

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::models::{Availability, StatusReport};
use crate::utils::error::AppError;

const SUMMARY_SELECTOR: &str = ".summary, .entry-summary, .product-summary";
const NOTIFY_WIDGET_SELECTOR: &str =
    "[class*='notify'], [id*='notify'], .cwginstock-subscribe-form, .woocommerce_waitlist";
const CONTROL_SELECTOR: &str = "button, a, input[type='submit'], input[type='button']";
const PURCHASE_SELECTOR: &str = "button, input[type='submit'], input[type='button'], a.button";
const PRIMARY_IMAGE_SELECTOR: &str = ".woocommerce-product-gallery__image img";
const FALLBACK_IMAGE_SELECTOR: &str = "img.wp-post-image";
const GALLERY_LINK_SELECTOR: &str = ".woocommerce-product-gallery__wrapper a[href]";
const ANY_IMAGE_SELECTOR: &str = "img[src]";
const PRICE_SELECTOR: &str = ".price";
const SALE_AMOUNT_SELECTOR: &str = "ins .woocommerce-Price-amount";
const AMOUNT_SELECTOR: &str = ".woocommerce-Price-amount";

const UPLOAD_PATH: &str = "/wp-content/uploads/";
const IMAGE_EXTENSIONS: [&str; 6] = [".jpg", ".jpeg", ".png", ".gif", ".webp", ".avif"];
const PURCHASE_LABELS: [&str; 2] = ["add to cart", "buy now"];
const LAZY_SOURCE_ATTRIBUTES: [&str; 2] = ["data-src", "data-lazy-src"];

/// Classifies product pages into availability, image and price.
///
/// Availability is decided by ordered rules applied inside the product summary
/// region; the first rule that matches wins. Image and price extraction are
/// best-effort and never affect the classification.
pub struct PageAnalyzer {
    summary: Selector,
    notify_widget: Selector,
    control: Selector,
    purchase: Selector,
    primary_image: Selector,
    fallback_image: Selector,
    gallery_link: Selector,
    any_image: Selector,
    price: Selector,
    sale_amount: Selector,
    amount: Selector,
    out_of_stock: Regex,
    in_stock: Regex,
}

impl PageAnalyzer {
    pub fn new() -> Result<Self, AppError> {
        Ok(Self {
            summary: parse_selector(SUMMARY_SELECTOR)?,
            notify_widget: parse_selector(NOTIFY_WIDGET_SELECTOR)?,
            control: parse_selector(CONTROL_SELECTOR)?,
            purchase: parse_selector(PURCHASE_SELECTOR)?,
            primary_image: parse_selector(PRIMARY_IMAGE_SELECTOR)?,
            fallback_image: parse_selector(FALLBACK_IMAGE_SELECTOR)?,
            gallery_link: parse_selector(GALLERY_LINK_SELECTOR)?,
            any_image: parse_selector(ANY_IMAGE_SELECTOR)?,
            price: parse_selector(PRICE_SELECTOR)?,
            sale_amount: parse_selector(SALE_AMOUNT_SELECTOR)?,
            amount: parse_selector(AMOUNT_SELECTOR)?,
            out_of_stock: parse_regex(r"(?i)\bout\s+of\s+stock\b")?,
            in_stock: parse_regex(r"(?i)\bin\s+stock\b")?,
        })
    }

    /// Analyze raw HTML fetched from `url`. Never fails; missing structure
    /// degrades to `Unknown`.
    pub fn analyze(&self, url: &str, html: &str) -> StatusReport {
        let document = Html::parse_document(html);
        self.analyze_document(url, &document)
    }

    pub fn analyze_document(&self, url: &str, document: &Html) -> StatusReport {
        let Some(summary) = document.select(&self.summary).next() else {
            let diagnostic = AppError::ParseAmbiguous {
                url: url.to_string(),
                message: format!("no product summary region matching '{}'", SUMMARY_SELECTOR),
            };
            tracing::warn!("{}", diagnostic);
            return StatusReport::unknown();
        };

        let availability = self.classify(summary);
        if availability == Availability::Unknown {
            tracing::warn!(
                "{}",
                AppError::ParseAmbiguous {
                    url: url.to_string(),
                    message: "summary region has no stock markers".to_string(),
                }
            );
        }

        StatusReport::new(availability)
            .with_image(self.extract_image(document))
            .with_price(self.extract_price(summary))
    }

    /// Availability rules, in precedence order.
    pub fn classify(&self, summary: ElementRef) -> Availability {
        if self.has_notify_control(summary) {
            return Availability::OutOfStock;
        }

        let text = collapsed_text(summary);
        if self.out_of_stock.is_match(&text) {
            return Availability::OutOfStock;
        }

        if self.has_purchase_control(summary) {
            return Availability::InStock;
        }

        if self.in_stock.is_match(&text) {
            return Availability::InStock;
        }

        Availability::Unknown
    }

    fn has_notify_control(&self, summary: ElementRef) -> bool {
        if summary.select(&self.notify_widget).next().is_some() {
            return true;
        }

        summary
            .select(&self.control)
            .any(|control| control_label(control).contains("notify me"))
    }

    fn has_purchase_control(&self, summary: ElementRef) -> bool {
        summary.select(&self.purchase).any(|control| {
            let label = control_label(control);
            PURCHASE_LABELS.contains(&label.as_str())
        })
    }

    /// Image fallback chain over the whole document.
    pub fn extract_image(&self, document: &Html) -> Option<String> {
        let primary = document
            .select(&self.primary_image)
            .next()
            .or_else(|| document.select(&self.fallback_image).next());

        if let Some(image) = primary {
            if let Some(url) = image.value().attr("data-large_image").and_then(image_url) {
                return Some(url);
            }

            for attribute in LAZY_SOURCE_ATTRIBUTES {
                if let Some(url) = image.value().attr(attribute).and_then(image_url) {
                    return Some(url);
                }
            }
        }

        if let Some(url) = document
            .select(&self.gallery_link)
            .filter_map(|link| link.value().attr("href"))
            .find_map(image_url)
        {
            return Some(url);
        }

        document
            .select(&self.any_image)
            .filter_map(|image| image.value().attr("src"))
            .filter(|src| src.contains(UPLOAD_PATH))
            .find_map(image_url)
    }

    /// Price text from the summary's price wrapper, preferring the sale amount.
    pub fn extract_price(&self, summary: ElementRef) -> Option<String> {
        let wrapper = summary.select(&self.price).next()?;

        let amount = wrapper
            .select(&self.sale_amount)
            .next()
            .or_else(|| wrapper.select(&self.amount).next());

        let text = match amount {
            Some(amount) => collapsed_text(amount),
            None => collapsed_text(wrapper),
        };

        if text.is_empty() { None } else { Some(text) }
    }
}

fn parse_selector(css: &str) -> Result<Selector, AppError> {
    Selector::parse(css).map_err(|e| AppError::Parse {
        message: format!("Invalid CSS selector '{}': {:?}", css, e),
    })
}

fn parse_regex(pattern: &str) -> Result<Regex, AppError> {
    Regex::new(pattern).map_err(|e| AppError::Parse {
        message: format!("Invalid pattern '{}': {}", pattern, e),
    })
}

/// Element text with whitespace runs collapsed to single spaces.
fn collapsed_text(element: ElementRef) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lowercased visible label of a button, link or input.
fn control_label(control: ElementRef) -> String {
    let label = if control.value().name() == "input" {
        control
            .value()
            .attr("value")
            .map(|value| value.split_whitespace().collect::<Vec<_>>().join(" "))
            .unwrap_or_default()
    } else {
        collapsed_text(control)
    };
    label.to_lowercase()
}

/// Accepts absolute http(s) URLs whose path ends in an image extension.
fn image_url(candidate: &str) -> Option<String> {
    let url = Url::parse(candidate.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }

    let path = url.path().to_lowercase();
    if IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
        Some(url.to_string())
    } else {
        None
    }
}

use serde::{Deserialize, Serialize};

use crate::models::Availability;

/// Result of analysing one fetched page. Produced fresh on every poll.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusReport {
    pub availability: Availability,
    pub image_url: Option<String>,
    pub price: Option<String>,
}

impl StatusReport {
    pub fn new(availability: Availability) -> Self {
        Self {
            availability,
            image_url: None,
            price: None,
        }
    }

    pub fn unknown() -> Self {
        Self::new(Availability::Unknown)
    }

    pub fn with_image(mut self, image_url: Option<String>) -> Self {
        self.image_url = image_url;
        self
    }

    pub fn with_price(mut self, price: Option<String>) -> Self {
        self.price = price;
        self
    }
}

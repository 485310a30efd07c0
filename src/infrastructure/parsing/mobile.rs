//! Field extraction from the mobile item-detail page
//!
//! The mobile variant is fetched only when the desktop page did not expose
//! a model. It carries a structured page-config assignment that is tried
//! first; a plain label/value span pair is the fallback when the blob is
//! missing or not valid JSON.

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::domain::product::MobileFields;
use crate::infrastructure::error::ScrapeError;
use crate::infrastructure::parsing::{captured_text, compile_pattern};

#[derive(Debug)]
pub struct MobileParser {
    page_config: Regex,
    model_span: Regex,
    title: Regex,
}

impl MobileParser {
    pub fn new() -> Result<Self, ScrapeError> {
        Ok(Self {
            page_config: compile_pattern(r"(?s)window\.pageConfig\s*=\s*(\{.*?\});")?,
            model_span: compile_pattern(r"规格型号</span>\s*<span>([^<]+)</span>")?,
            title: compile_pattern(r"(?s)<title>(.*?)</title>")?,
        })
    }

    pub fn parse(&self, html: &str) -> MobileFields {
        let mut fields = MobileFields::default();

        if let Some(caps) = self.page_config.captures(html) {
            match serde_json::from_str::<Value>(&caps[1]) {
                Ok(data) => {
                    let product = data.get("product");
                    let extend = product.and_then(|p| p.get("extend"));
                    fields.brand = json_text(extend, "brand")
                        .or_else(|| json_text(product, "brand"));
                    fields.model = json_text(extend, "model")
                        .or_else(|| json_text(extend, "skuModel"));
                }
                Err(err) => {
                    debug!(error = %err, "page config blob is not valid JSON");
                }
            }
        }

        if fields.model.is_none() {
            fields.model = captured_text(&self.model_span, html);
        }
        fields.title = captured_text(&self.title, html);
        fields
    }
}

fn json_text(value: Option<&Value>, key: &str) -> Option<String> {
    value
        .and_then(|v| v.get(key))
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

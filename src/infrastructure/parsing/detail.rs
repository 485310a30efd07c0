//! Field extraction from the desktop item-detail page

use regex::Regex;

use crate::domain::product::DetailFields;
use crate::infrastructure::error::ScrapeError;
use crate::infrastructure::parsing::{captured_text, compile_pattern};

/// Extracts brand, model, shop and title from a desktop detail page.
///
/// The model lives inside the specification parameter list; the
/// energy-label variant of the key takes precedence over the plain key.
/// The shop name is an inline JSON field embedded in the page scripts.
#[derive(Debug)]
pub struct DetailParser {
    brand: Regex,
    parameter_block: Regex,
    model_energy: Regex,
    model_plain: Regex,
    shop: Regex,
    title: Regex,
}

impl DetailParser {
    pub fn new() -> Result<Self, ScrapeError> {
        Ok(Self {
            brand: compile_pattern(r"品牌：<a[^>]*?>([^<]+)</a>")?,
            parameter_block: compile_pattern(
                r#"(?s)<ul class="parameter2 p-parameter-list">(.*?)</ul>"#,
            )?,
            model_energy: compile_pattern(r#"能效网规格型号：</li>\s*<li title="([^"]+)""#)?,
            model_plain: compile_pattern(r#"规格型号：</li>\s*<li title="([^"]+)""#)?,
            shop: compile_pattern(r#""shopName":"([^"]+)""#)?,
            title: compile_pattern(r"(?s)<title>(.*?)</title>")?,
        })
    }

    pub fn parse(&self, html: &str) -> DetailFields {
        let model = self.parameter_block.captures(html).and_then(|caps| {
            let block = &caps[1];
            captured_text(&self.model_energy, block)
                .or_else(|| captured_text(&self.model_plain, block))
        });

        DetailFields {
            title: captured_text(&self.title, html),
            brand: captured_text(&self.brand, html),
            model,
            shop: self.shop.captures(html).map(|caps| caps[1].to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn page(parameter_list: &str) -> String {
        format!(
            r#"<html><head><title> Haier BCD-216 三门冰箱 </title></head>
            <body>
              <div class="p-parameter">品牌：<a href="https://haier.jd.com" clstag="shangpin">Haier</a></div>
              {parameter_list}
              <script>var pageData = {{"shopName":"海尔官方旗舰店","venderId":1000}};</script>
            </body></html>"#
        )
    }

    #[rstest]
    #[case::energy_label_key(
        r#"<ul class="parameter2 p-parameter-list">
             <li>能效网规格型号：</li> <li title="BCD-216WGHC3E9C9U1">BCD-216WGHC3E9C9U1</li>
           </ul>"#,
        "BCD-216WGHC3E9C9U1"
    )]
    #[case::plain_key(
        r#"<ul class="parameter2 p-parameter-list">
             <li>规格型号：</li> <li title="BCD-216STPA">BCD-216STPA</li>
           </ul>"#,
        "BCD-216STPA"
    )]
    fn model_is_read_from_the_parameter_list(#[case] list: &str, #[case] expected: &str) {
        let parser = DetailParser::new().unwrap();
        let fields = parser.parse(&page(list));
        assert_eq!(fields.model.as_deref(), Some(expected));
        assert_eq!(fields.brand.as_deref(), Some("Haier"));
        assert_eq!(fields.shop.as_deref(), Some("海尔官方旗舰店"));
        assert_eq!(fields.title.as_deref(), Some("Haier BCD-216 三门冰箱"));
    }

    #[test]
    fn energy_label_key_wins_over_plain_key() {
        let list = r#"<ul class="parameter2 p-parameter-list">
             <li>规格型号：</li> <li title="PLAIN-1">PLAIN-1</li>
             <li>能效网规格型号：</li> <li title="ENERGY-1">ENERGY-1</li>
           </ul>"#;
        let parser = DetailParser::new().unwrap();
        assert_eq!(parser.parse(&page(list)).model.as_deref(), Some("ENERGY-1"));
    }

    #[test]
    fn missing_parameter_list_leaves_model_absent() {
        let parser = DetailParser::new().unwrap();
        let fields = parser.parse(&page(""));
        assert_eq!(fields.model, None);
        // The rest of the page still degrades gracefully field by field.
        assert_eq!(fields.brand.as_deref(), Some("Haier"));
    }

    #[test]
    fn bare_page_yields_all_fields_absent() {
        let parser = DetailParser::new().unwrap();
        let fields = parser.parse("<html><body>captcha</body></html>");
        assert_eq!(fields, DetailFields::default());
    }

    #[test]
    fn model_key_outside_the_parameter_list_is_ignored() {
        let html = r#"<div>规格型号：</li> <li title="LOOSE-1"></div>"#;
        let parser = DetailParser::new().unwrap();
        assert_eq!(parser.parse(html).model, None);
    }
}

//! Official USD exchange rate lookup.
//!
//! The National Bank of the Kyrgyz Republic publishes daily rates as an
//! HTML table; [`NbkrRateSource`] fetches and scrapes it. The page is
//! only trusted when its currency selector actually has the US dollar
//! selected — a different selection means the rates in the table belong
//! to some other currency.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use rust_decimal::Decimal;
use thiserror::Error;

pub const NBKR_URL: &str = "https://www.nbkr.kg/index1.jsp?item=1562&lang=RUS&valuta_id=15";
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

re!(re_usd_option, r#"(?s)<option([^>]*)value="15"[^>]*>\s*1\s+Доллар\s+США"#);
re!(re_stat_right, r#"(?s)<td[^>]*class="stat-right"[^>]*>\s*([^<]*?)\s*</td>"#);

#[derive(Debug, Error)]
pub enum RateError {
    #[error("{user_message}")]
    Network {
        user_message: String,
        technical_detail: String,
    },
    #[error("the USD rate page has a different currency selected")]
    UsdNotSelected,
    #[error("no date given for the rate lookup")]
    DateMissing,
    #[error("no rate published for {date}")]
    RateNotFound { date: String },
    #[error("cannot parse rate value '{value}'")]
    Parse { value: String },
}

/// Source of the USD→local exchange rate for a given `DD.MM.YYYY` date.
pub trait RateSource {
    fn rate_for(&self, date: &str) -> Result<Decimal, RateError>;
}

/// Live scraper of the NBKR daily-rates page.
pub struct NbkrRateSource {
    url: String,
    client: reqwest::blocking::Client,
}

impl NbkrRateSource {
    pub fn new() -> Result<Self, RateError> {
        Self::with_url(NBKR_URL)
    }

    pub fn with_url(url: impl Into<String>) -> Result<Self, RateError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .map_err(|e| RateError::Network {
                user_message: "Check the internet connection".to_string(),
                technical_detail: format!("cannot build HTTP client: {e}"),
            })?;
        Ok(Self { url: url.into(), client })
    }

    fn fetch(&self) -> Result<String, RateError> {
        let resp = self.client.get(&self.url).send().map_err(|e| RateError::Network {
            user_message: "Check the internet connection".to_string(),
            technical_detail: format!("cannot reach the NBKR site: {e}"),
        })?;
        resp.text().map_err(|e| RateError::Network {
            user_message: "Check the internet connection".to_string(),
            technical_detail: format!("cannot read the NBKR response: {e}"),
        })
    }
}

impl RateSource for NbkrRateSource {
    fn rate_for(&self, date: &str) -> Result<Decimal, RateError> {
        if date.is_empty() {
            return Err(RateError::DateMissing);
        }
        let html = self.fetch()?;
        let rate = parse_rate(&html, date)?;
        tracing::info!("NBKR USD rate for {date}: {rate}");
        Ok(rate)
    }
}

/// Constant rate, for operator overrides and tests.
pub struct FixedRate(pub Decimal);

impl RateSource for FixedRate {
    fn rate_for(&self, _date: &str) -> Result<Decimal, RateError> {
        Ok(self.0)
    }
}

/// Scrape the rate for `date` out of the NBKR page.
///
/// The table row carrying the date holds the value in its
/// `stat-right` cell, decimal comma, e.g. `89,2534`. The published
/// value is truncated (not rounded) to 2 decimal places.
pub fn parse_rate(html: &str, date: &str) -> Result<Decimal, RateError> {
    if date.is_empty() {
        return Err(RateError::DateMissing);
    }
    if !usd_selected(html) {
        return Err(RateError::UsdNotSelected);
    }

    for row in html.split("<tr") {
        if !row.contains(date) {
            continue;
        }
        let Some(cap) = re_stat_right().captures(row) else {
            continue;
        };
        let raw = cap[1].trim().replace(',', ".");
        let value: Decimal = raw
            .parse()
            .map_err(|_| RateError::Parse { value: raw.clone() })?;
        return Ok(value.trunc_with_scale(2));
    }
    Err(RateError::RateNotFound { date: date.to_string() })
}

fn usd_selected(html: &str) -> bool {
    re_usd_option()
        .captures(html)
        .is_some_and(|cap| cap[1].contains("selected"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    const PAGE: &str = r#"
    <select name="valuta_id">
      <option value="14">1 Евро</option>
      <option selected="" value="15">1 Доллар США</option>
    </select>
    <table>
      <tr><td>14.01.2026</td><td class="stat-right">89,4012</td></tr>
      <tr><td>15.01.2026</td><td class="stat-right"> 89,2577 </td></tr>
    </table>
    "#;

    #[test]
    fn rate_is_found_and_truncated() {
        // 89,2577 truncates down, never rounds up
        let rate = parse_rate(PAGE, "15.01.2026").unwrap();
        assert_eq!(rate, Decimal::from_str("89.25").unwrap());
    }

    #[test]
    fn each_date_reads_its_own_row() {
        let rate = parse_rate(PAGE, "14.01.2026").unwrap();
        assert_eq!(rate, Decimal::from_str("89.40").unwrap());
    }

    #[test]
    fn unlisted_date_is_an_error() {
        let err = parse_rate(PAGE, "01.01.2020").unwrap_err();
        assert!(matches!(err, RateError::RateNotFound { .. }));
    }

    #[test]
    fn unselected_usd_is_rejected() {
        let page = PAGE.replace(r#"selected="" value="15""#, r#"value="15""#);
        let err = parse_rate(&page, "15.01.2026").unwrap_err();
        assert!(matches!(err, RateError::UsdNotSelected));
    }

    #[test]
    fn empty_date_is_rejected() {
        assert!(matches!(parse_rate(PAGE, ""), Err(RateError::DateMissing)));
    }

    #[test]
    fn garbage_cell_is_a_parse_error() {
        let page = PAGE.replace("89,2577", "н/д");
        let err = parse_rate(&page, "15.01.2026").unwrap_err();
        assert!(matches!(err, RateError::Parse { .. }));
    }

    #[test]
    fn fixed_rate_ignores_the_date() {
        let source = FixedRate(Decimal::from_str("89.25").unwrap());
        assert_eq!(source.rate_for("15.01.2026").unwrap(), source.0);
    }
}

use crate::prelude::*;
use anyhow::anyhow;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::{collections::BTreeSet, fmt::Display, str::FromStr};
use url::Url;

pub const SEARCH_INPUT: &str = "#tw-source-text-ta";
pub const SEARCH_RESULT: &str = "#tw-target-text > span";
pub const PAGE_RESULT: &str = "span[jsname=\"W297wb\"]";
pub const PAGE_RETRY: &str = "button[jsname=\"s3WOVd\"]";

static SEARCH_RESULT_SELECTOR: Lazy<Selector> = Lazy::new(|| selector(SEARCH_RESULT));
static PAGE_RESULT_SELECTOR: Lazy<Selector> = Lazy::new(|| selector(PAGE_RESULT));

fn selector(css: &str) -> Selector {
    match Selector::parse(css) {
        Ok(selector) => selector,
        Err(e) => panic!("Invalid built-in selector {}: {:?}", css, e),
    }
}

/// Which of the provider's two surfaces answers the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// The inline widget rendered on a search results page; text is typed in.
    SearchWidget,
    /// The standalone translate page; text travels in the URL.
    DedicatedPage,
}

impl Variant {
    pub fn input_selector(self) -> Option<&'static str> {
        match self {
            Variant::SearchWidget => Some(SEARCH_INPUT),
            Variant::DedicatedPage => None,
        }
    }

    pub fn retry_selector(self) -> Option<&'static str> {
        match self {
            Variant::SearchWidget => None,
            Variant::DedicatedPage => Some(PAGE_RETRY),
        }
    }

    fn result_selector(self) -> &'static Selector {
        match self {
            Variant::SearchWidget => &*SEARCH_RESULT_SELECTOR,
            Variant::DedicatedPage => &*PAGE_RESULT_SELECTOR,
        }
    }

    pub fn query_url(self, text: &str, from: &str, to: &str, search_query: &str) -> Result<Url> {
        let url = match self {
            Variant::SearchWidget => {
                Url::parse_with_params("https://www.google.com/search", &[("q", search_query)])?
            }
            Variant::DedicatedPage => Url::parse_with_params(
                "https://translate.google.com/",
                &[
                    ("hl", to),
                    ("tab", "wT"),
                    ("sl", from),
                    ("tl", to),
                    ("text", text),
                    ("op", "translate"),
                ],
            )?,
        };

        Ok(url)
    }
}

impl FromStr for Variant {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "search" => Ok(Variant::SearchWidget),
            "page" => Ok(Variant::DedicatedPage),
            other => Err(anyhow!("unknown translate variant {:?}, expected search or page", other)),
        }
    }
}

impl Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Variant::SearchWidget => write!(f, "search"),
            Variant::DedicatedPage => write!(f, "page"),
        }
    }
}

/// Text of the first result node, if one is rendered with non-blank text.
pub fn extract_result(source: &str, variant: Variant) -> Option<String> {
    let document = Html::parse_document(source);
    let result = document
        .select(variant.result_selector())
        .map(|node| node.text().collect::<String>())
        .map(|text| text.trim().to_string())
        .find(|text| !text.is_empty());
    result
}

/// Same scheme, host and path, and the same decoded query pairs in any order.
pub fn same_location(current: &Url, target: &Url) -> bool {
    let pairs = |url: &Url| {
        url.query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect::<BTreeSet<_>>()
    };

    current.scheme() == target.scheme()
        && current.host_str() == target.host_str()
        && current.path() == target.path()
        && pairs(current) == pairs(target)
}

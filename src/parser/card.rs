use std::sync::LazyLock;

use scraper::{ElementRef, Selector};

use crate::product::RawProductRecord;

static DETAILS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("div.product-details").unwrap());
static TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h3.product-title").unwrap());
static PRICE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.price-container span.price").unwrap());
static DESCRIPTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"p[style="font-size: 14px; color: #777;"]"#).unwrap());

/// Which raw field a descriptor paragraph feeds. First trigger wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Descriptor {
    Rating,
    Colors,
    Size,
    Gender,
}

const TRIGGERS: &[(&str, Descriptor)] = &[
    ("Rating:", Descriptor::Rating),
    ("Colors", Descriptor::Colors),
    ("Size:", Descriptor::Size),
    ("Gender:", Descriptor::Gender),
];

fn classify(text: &str) -> Option<Descriptor> {
    TRIGGERS
        .iter()
        .find(|(trigger, _)| text.contains(trigger))
        .map(|(_, d)| *d)
}

/// Local wall-clock time, ISO 8601 with microseconds.
pub fn extraction_timestamp() -> String {
    chrono::Local::now()
        .naive_local()
        .format("%Y-%m-%dT%H:%M:%S%.6f")
        .to_string()
}

pub fn parse_card(card: ElementRef<'_>, timestamp: &str) -> Option<RawProductRecord> {
    let details = card.select(&DETAILS).next()?;

    let mut record = RawProductRecord {
        title: first_text(details, &TITLE),
        price_text: first_text(details, &PRICE),
        rating_text: None,
        colors_text: None,
        size_text: None,
        gender_text: None,
        timestamp: timestamp.to_string(),
    };

    for p in details.select(&DESCRIPTOR) {
        let text = element_text(p);
        let slot = match classify(&text) {
            Some(Descriptor::Rating) => &mut record.rating_text,
            Some(Descriptor::Colors) => &mut record.colors_text,
            Some(Descriptor::Size) => &mut record.size_text,
            Some(Descriptor::Gender) => &mut record.gender_text,
            None => continue,
        };
        *slot = Some(text);
    }

    Some(record)
}

fn first_text(scope: ElementRef<'_>, selector: &Selector) -> Option<String> {
    scope.select(selector).next().map(element_text)
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

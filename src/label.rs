//! Text labels drawn under an entity's icon.
//!
//! Labels are built from the name, address and a few descriptive tags, the
//! most important first. `LabelMode::Main` draws only the first one.

use serde::Deserialize;

use crate::color::{Color, DEFAULT_COLOR};
use crate::scheme::Scheme;
use crate::tags::Tags;

pub const DEFAULT_FONT_SIZE: f64 = 10.0;

/// Longer label texts are cut and end with an ellipsis.
pub const MAX_LABEL_LENGTH: usize = 26;

const NAME_COLOR: Color = Color::rgb(0x00, 0x00, 0x00);
const LINK_COLOR: Color = Color::rgb(0x00, 0x00, 0x88);
const MAX_LINK_LENGTH: usize = 25;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelMode {
    No,
    /// Only the most important label, usually the name.
    Main,
    All,
}

impl LabelMode {
    /// The labels drawn in this mode.
    pub fn select<'l>(&self, labels: &'l [Label]) -> &'l [Label] {
        match self {
            LabelMode::No => &[],
            LabelMode::Main => &labels[..labels.len().min(1)],
            LabelMode::All => labels,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Label {
    pub text: String,
    pub color: Color,
    pub size: f64,
}

impl Label {
    pub fn new(text: impl Into<String>) -> Self {
        Label::colored(text, DEFAULT_COLOR)
    }

    pub fn colored(text: impl Into<String>, color: Color) -> Self {
        Label {
            text: text.into(),
            color,
            size: DEFAULT_FONT_SIZE,
        }
    }

    /// The text as drawn, at most `MAX_LABEL_LENGTH` characters plus an
    /// ellipsis.
    pub fn display_text(&self) -> String {
        shorten(&self.text, MAX_LABEL_LENGTH)
    }
}

fn shorten(text: &str, length: usize) -> String {
    match text.char_indices().nth(length) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_owned(),
    }
}

/// `11000` volts reads as `11 kV`.
fn format_voltage(value: &str) -> String {
    match value.trim().parse::<u64>() {
        Ok(volts) if volts >= 1000 && volts % 1000 == 0 => format!("{} kV", volts / 1000),
        Ok(volts) => format!("{} V", volts),
        Err(_) => value.to_owned(),
    }
}

/// Website without scheme, `www.` and trailing slash.
fn format_link(value: &str) -> String {
    let link = value
        .strip_prefix("http://")
        .or_else(|| value.strip_prefix("https://"))
        .unwrap_or(value);
    let link = link.strip_prefix("www.").unwrap_or(link);
    let link = link.strip_suffix('/').unwrap_or(link);
    shorten(link, MAX_LINK_LENGTH)
}

/// Tag values read while building labels, and their keys.
struct Reader<'t> {
    tags: &'t Tags,
    used: Vec<&'t str>,
}

impl<'t> Reader<'t> {
    fn take(&mut self, key: &str) -> Option<&'t str> {
        let (key, value) = self.tags.get_key_value(key)?;
        self.used.push(key.as_str());
        Some(value.as_str())
    }
}

/// Labels for `tags`, with the keys they were built from.
pub fn construct_labels<'t>(tags: &'t Tags, scheme: &Scheme) -> (Vec<Label>, Vec<&'t str>) {
    let mut labels = Vec::new();
    let mut reader = Reader {
        tags,
        used: Vec::new(),
    };

    if let Some(name) = reader.take("name").or_else(|| reader.take("name:en")) {
        labels.push(Label::colored(name, NAME_COLOR));
    }
    let mut other_names: Vec<String> = Vec::new();
    other_names.extend(reader.take("alt_name").map(str::to_owned));
    other_names.extend(reader.take("old_name").map(|name| format!("ex {}", name)));
    if !other_names.is_empty() {
        labels.push(Label::new(format!("({})", other_names.join(", "))));
    }
    if let Some(number) = reader.take("addr:housenumber") {
        labels.push(Label::new(number));
    }

    let mut voltages: Vec<&str> = ["voltage:primary", "voltage:secondary"]
        .into_iter()
        .filter_map(|key| reader.take(key))
        .collect();
    if let Some(voltage) = reader.take("voltage") {
        voltages = voltage.split(';').collect();
    }
    if !voltages.is_empty() {
        let formatted: Vec<String> = voltages.into_iter().map(format_voltage).collect();
        labels.push(Label::new(formatted.join(", ")));
    }
    if let Some(frequency) = reader.take("frequency") {
        let formatted: Vec<String> = frequency
            .split(';')
            .map(|value| format!("{} Hz", value))
            .collect();
        labels.push(Label::new(formatted.join(", ")));
    }
    if let Some(route_ref) = reader.take("route_ref") {
        labels.push(Label::new(route_ref.replace(';', " ")));
    }
    if let Some(website) = reader.take("website") {
        labels.push(Label::colored(format_link(website), LINK_COLOR));
    }
    if let Some(phone) = reader.take("phone") {
        labels.push(Label::new(phone));
    }
    if let Some(height) = reader.take("height") {
        labels.push(Label::new(format!("↕ {} m", height)));
    }

    let mut used = reader.used;
    for (key, value) in tags {
        if scheme.is_writable(key) && !used.contains(&key.as_str()) {
            labels.push(Label::new(value.as_str()));
            used.push(key.as_str());
        }
    }
    (labels, used)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::tags::tag_set;

    fn scheme() -> Scheme {
        let data = fs::read_to_string("test_data/scheme.yml")
            .expect("Unable to read the test yml file.");
        Scheme::from_yaml(&data).unwrap()
    }

    fn texts(labels: &[Label]) -> Vec<&str> {
        labels.iter().map(|label| label.text.as_str()).collect()
    }

    #[test]
    fn test_name_comes_first() {
        let tags = tag_set(&[
            ("amenity", "cafe"),
            ("addr:housenumber", "12"),
            ("old_name", "Le Bistrot"),
            ("alt_name", "Chez Paul"),
            ("name", "Café Paul"),
        ]);
        let (labels, used) = construct_labels(&tags, &scheme());
        assert_eq!(vec!["Café Paul", "(Chez Paul, ex Le Bistrot)", "12"], texts(&labels));
        assert_eq!(NAME_COLOR, labels[0].color);
        assert!(!used.contains(&"amenity"));
        assert_eq!(4, used.len());

        let english = tag_set(&[("name:en", "Paul's")]);
        assert_eq!(vec!["Paul's"], texts(&construct_labels(&english, &scheme()).0));
    }

    #[test]
    fn test_descriptive_tags() {
        let tags = tag_set(&[
            ("power", "line"),
            ("voltage", "110000;20000;400"),
            ("frequency", "50"),
            ("website", "https://www.example.org/"),
            ("height", "30"),
            ("cuisine", "french"),
        ]);
        let (labels, used) = construct_labels(&tags, &scheme());
        assert_eq!(
            vec!["110 kV, 20 kV, 400 V", "50 Hz", "example.org", "↕ 30 m", "french"],
            texts(&labels)
        );
        assert_eq!(LINK_COLOR, labels[2].color);
        assert_eq!(5, used.len());
    }

    #[test]
    fn test_long_texts_are_shortened() {
        let label = Label::new("Boulangerie Pâtisserie du Champ de Mars");
        assert_eq!("Boulangerie Pâtisserie du ...", label.display_text());
        assert_eq!("Paul", Label::new("Paul").display_text());
        assert_eq!(
            "verylongdomainnameforabak...",
            format_link("http://verylongdomainnameforabakery.fr")
        );
    }

    #[test]
    fn test_label_modes() {
        let labels = vec![Label::new("Café Paul"), Label::new("12")];
        assert!(LabelMode::No.select(&labels).is_empty());
        assert_eq!(1, LabelMode::Main.select(&labels).len());
        assert_eq!(2, LabelMode::All.select(&labels).len());
        assert!(LabelMode::Main.select(&[]).is_empty());
    }
}

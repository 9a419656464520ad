//! Static option lists offered by the registration form.

use serde::Serialize;

use agrisathi_core::PreferredLanguage;

/// One selectable value with its display labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionItem {
    pub value: &'static str,
    pub label: &'static str,
    pub label_ne: &'static str,
}

/// Everything the registration form needs to render its choices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationOptions {
    pub agriculture_types: Vec<OptionItem>,
    pub economic_scales: Vec<OptionItem>,
    pub provinces: Vec<OptionItem>,
    pub languages: Vec<OptionItem>,
}

const fn item(value: &'static str, label: &'static str, label_ne: &'static str) -> OptionItem {
    OptionItem {
        value,
        label,
        label_ne,
    }
}

const AGRICULTURE_TYPES: [OptionItem; 7] = [
    item("crop_farming", "Crop Farming", "बाली खेती"),
    item("livestock", "Livestock", "पशुपालन"),
    item("poultry", "Poultry", "कुखुरापालन"),
    item("fisheries", "Fisheries", "माछापालन"),
    item("horticulture", "Horticulture", "बागवानी"),
    item("beekeeping", "Beekeeping", "मौरीपालन"),
    item("mixed_farming", "Mixed Farming", "मिश्रित खेती"),
];

const ECONOMIC_SCALES: [OptionItem; 4] = [
    item("subsistence", "Subsistence", "निर्वाहमुखी"),
    item("small_commercial", "Small Commercial", "साना व्यावसायिक"),
    item("medium_commercial", "Medium Commercial", "मझौला व्यावसायिक"),
    item("large_commercial", "Large Commercial", "ठूला व्यावसायिक"),
];

const PROVINCES: [OptionItem; 7] = [
    item("koshi", "Koshi", "कोशी"),
    item("madhesh", "Madhesh", "मधेस"),
    item("bagmati", "Bagmati", "बागमती"),
    item("gandaki", "Gandaki", "गण्डकी"),
    item("lumbini", "Lumbini", "लुम्बिनी"),
    item("karnali", "Karnali", "कर्णाली"),
    item("sudurpashchim", "Sudurpashchim", "सुदूरपश्चिम"),
];

/// Build the option lists.
#[must_use]
pub fn registration_options() -> RegistrationOptions {
    RegistrationOptions {
        agriculture_types: AGRICULTURE_TYPES.to_vec(),
        economic_scales: ECONOMIC_SCALES.to_vec(),
        provinces: PROVINCES.to_vec(),
        languages: vec![
            item(PreferredLanguage::English.code(), "English", "अंग्रेजी"),
            item(PreferredLanguage::Nepali.code(), "Nepali", "नेपाली"),
        ],
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_seven_provinces() {
        let options = registration_options();
        assert_eq!(options.provinces.len(), 7);
        assert_eq!(options.languages.len(), 2);
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(registration_options()).unwrap();
        assert!(json["agricultureTypes"].is_array());
        assert_eq!(json["economicScales"][0]["labelNe"], "निर्वाहमुखी");
    }
}

//! Prompt construction for the advisory routes.

use chrono::NaiveDate;

use agrisathi_core::PreferredLanguage;

use crate::models::FarmerProfile;

use super::vision::PlantSuggestion;

/// System prompt shared by every advisory request.
pub const ADVISOR_SYSTEM_PROMPT: &str = "You are AgriSathi, an agricultural advisor for \
smallholder farmers in Nepal. Give practical, safe, locally appropriate advice. Prefer \
low-cost and organic options, name the season or month when timing matters, and say \
plainly when a problem needs an in-person visit from an agricultural extension officer.";

/// Instruction appended when the answer must be in Nepali.
const NEPALI_INSTRUCTION: &str = "Answer in Nepali (Devanagari script).";

/// System prompt for `language`.
#[must_use]
pub fn system_prompt(language: PreferredLanguage) -> String {
    match language {
        PreferredLanguage::English => ADVISOR_SYSTEM_PROMPT.to_owned(),
        PreferredLanguage::Nepali => format!("{ADVISOR_SYSTEM_PROMPT} {NEPALI_INSTRUCTION}"),
    }
}

/// One-paragraph description of the farmer for prompt context.
#[must_use]
pub fn farmer_context(profile: &FarmerProfile) -> String {
    format!(
        "The farmer lives in {}, {} district, {} province. Farming type: {}. Economic scale: {}.",
        profile.location_info.municipality,
        profile.location_info.district,
        profile.location_info.province,
        profile.farm_info.farmer_type,
        profile.farm_info.economic_scale,
    )
}

/// Free-form question, optionally grounded in the asker's profile.
#[must_use]
pub fn question_prompt(question: &str, profile: Option<&FarmerProfile>) -> String {
    match profile {
        Some(profile) => format!("{}\n\nQuestion: {question}", farmer_context(profile)),
        None => format!("Question: {question}"),
    }
}

/// Weekly tips for the week containing `today`.
#[must_use]
pub fn weekly_tips_prompt(profile: &FarmerProfile, today: NaiveDate) -> String {
    format!(
        "{}\n\nToday is {}. Give five short, numbered farming tips for this week, \
         suited to the season and the farmer's situation.",
        farmer_context(profile),
        today.format("%B %-d, %Y"),
    )
}

/// Diagnosis of a described crop problem.
#[must_use]
pub fn diagnosis_prompt(description: &str, crop_type: Option<&str>) -> String {
    let crop = crop_type.map_or_else(String::new, |c| format!("Crop: {c}\n"));
    format!(
        "{crop}Symptoms: {description}\n\nList the most likely causes (disease, pest, or \
         deficiency), how to confirm each, and treatment steps in order of cost."
    )
}

/// Care guide for an identified plant.
#[must_use]
pub fn care_guide_prompt(suggestion: &PlantSuggestion, crop_type: Option<&str>) -> String {
    let common = if suggestion.common_names.is_empty() {
        String::new()
    } else {
        format!(" ({})", suggestion.common_names.join(", "))
    };
    let context = crop_type.map_or_else(String::new, |c| {
        format!(" The farmer believes this is {c}.")
    });
    format!(
        "A photo was identified as {}{common}.{context} Write a short care guide for \
         growing it in Nepal: planting season, soil and water needs, common pests and \
         diseases, and harvest timing.",
        suggestion.scientific_name,
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_nepali_system_prompt() {
        assert!(system_prompt(PreferredLanguage::Nepali).ends_with(NEPALI_INSTRUCTION));
        assert_eq!(
            system_prompt(PreferredLanguage::English),
            ADVISOR_SYSTEM_PROMPT
        );
    }

    #[test]
    fn test_diagnosis_prompt_includes_crop() {
        let prompt = diagnosis_prompt("yellow leaves", Some("rice"));
        assert!(prompt.starts_with("Crop: rice\n"));
        assert!(!diagnosis_prompt("yellow leaves", None).contains("Crop:"));
    }

    #[test]
    fn test_weekly_tips_prompt_has_date() {
        let profile: FarmerProfile = serde_json::from_value(serde_json::json!({
            "id": "6f1c2a1e-8c1b-4d0e-9a7b-1f2e3d4c5b6a",
            "personalInfo": {"firstName": "Sita", "lastName": "Rai"},
            "locationInfo": {"province": "Koshi", "district": "Jhapa", "municipality": "Damak"},
            "farmInfo": {"farmerType": "crop_farming", "economicScale": "subsistence"},
            "email": "sita@example.com",
            "emailVerified": false,
            "preferredLanguage": "en",
            "createdAt": "2026-01-01T00:00:00Z"
        }))
        .unwrap();
        let prompt = weekly_tips_prompt(&profile, NaiveDate::from_ymd_opt(2026, 3, 9).unwrap());
        assert!(prompt.contains("March 9, 2026"));
        assert!(prompt.contains("Jhapa district"));
    }
}

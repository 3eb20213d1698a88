use serde::{Deserialize, Serialize};

// ==================================================================================================
// PreviewCarrier Response Models
// ==================================================================================================

/// One carrier from `POST /api/v1/Carrier/PreviewCarrier`
///
/// The endpoint returns an array; an empty array means the MC number is unknown.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Carrier {
    pub company_name: Option<String>,
    pub dot_number: Option<String>,
    pub docket_number: Option<String>,
    pub risk_assessment_details: Option<RiskAssessmentDetails>,
    pub is_blocked: bool,
    pub freight_validate_status: Option<String>,
}

impl Carrier {
    pub fn total_points(&self) -> i64 {
        self.risk_assessment_details
            .as_ref()
            .and_then(|d| d.total_points)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RiskAssessmentDetails {
    pub total_points: Option<i64>,
    pub authority: Option<RiskCategory>,
    pub insurance: Option<RiskCategory>,
    pub operation: Option<RiskCategory>,
    pub safety: Option<RiskCategory>,
    pub other: Option<RiskCategory>,
}

impl RiskAssessmentDetails {
    /// Categories in display order, skipping the ones the API left out
    pub fn categories(&self) -> Vec<(&'static str, &RiskCategory)> {
        [
            ("Authority", &self.authority),
            ("Insurance", &self.insurance),
            ("Operation", &self.operation),
            ("Safety", &self.safety),
            ("Other", &self.other),
        ]
        .into_iter()
        .filter_map(|(name, category)| category.as_ref().map(|c| (name, c)))
        .collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RiskCategory {
    pub total_points: Option<i64>,
    pub overall_rating: Option<String>,
    pub infractions: Vec<Infraction>,
}

impl RiskCategory {
    pub fn points(&self) -> i64 {
        self.total_points.unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Infraction {
    pub points: Option<i64>,
    pub risk_level: Option<String>,
    pub rule_text: Option<String>,
    pub rule_output: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_preview_response() {
        let body = r#"[{
            "CompanyName": "ACME TRUCKING LLC",
            "DotNumber": "1234567",
            "DocketNumber": "MC123456",
            "IsBlocked": false,
            "FreightValidateStatus": "Review Recommended",
            "RiskAssessmentDetails": {
                "TotalPoints": 130,
                "Authority": {"TotalPoints": 0, "OverallRating": "Low", "Infractions": []},
                "Safety": {
                    "TotalPoints": 130,
                    "Infractions": [
                        {"Points": 130, "RiskLevel": "Medium", "RuleText": "Crash rate", "RuleOutput": "Above average"}
                    ]
                }
            }
        }]"#;

        let carriers: Vec<Carrier> = serde_json::from_str(body).unwrap();
        assert_eq!(carriers.len(), 1);

        let carrier = &carriers[0];
        assert_eq!(carrier.company_name.as_deref(), Some("ACME TRUCKING LLC"));
        assert_eq!(carrier.total_points(), 130);

        let details = carrier.risk_assessment_details.as_ref().unwrap();
        let names: Vec<&str> = details.categories().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["Authority", "Safety"]);
        assert_eq!(details.safety.as_ref().unwrap().infractions[0].points, Some(130));
    }

    #[test]
    fn test_missing_fields_default() {
        let carrier: Carrier = serde_json::from_str(r#"{"TotalPoints": null}"#).unwrap();
        assert!(carrier.company_name.is_none());
        assert!(!carrier.is_blocked);
        assert_eq!(carrier.total_points(), 0);
    }

    #[test]
    fn test_null_points_default_to_zero() {
        let category: RiskCategory =
            serde_json::from_str(r#"{"TotalPoints": null, "Infractions": []}"#).unwrap();
        assert_eq!(category.points(), 0);
    }
}

// Carrier to Slack converter
//
// Builds Block Kit messages from a carrier preview. Points map onto four risk
// bands shared by the overall score, each category, and MyCarrierProtect.

use serde_json::{json, Value};

use crate::models::carrier::{Carrier, Infraction};
use crate::models::slack::SlackMessage;

pub const HEADER_TEXT: &str = "MyCarrierPortal Risk Assessment";
pub const INVITE_ACTION_ID: &str = "invite_carrier";
pub const DECLINE_ACTION_ID: &str = "decline_carrier";

/// Points added by each MyCarrierProtect flag
const PROTECT_FLAG_POINTS: i64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RiskLevel {
    Low,
    Medium,
    ReviewRequired,
    Fail,
}

impl RiskLevel {
    /// Negative or missing points count as zero
    pub fn from_points(points: i64) -> Self {
        match points.max(0) {
            0..=124 => RiskLevel::Low,
            125..=249 => RiskLevel::Medium,
            250..=999 => RiskLevel::ReviewRequired,
            _ => RiskLevel::Fail,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::ReviewRequired => "Review Required",
            RiskLevel::Fail => "Fail",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            RiskLevel::Low => "🟢",
            RiskLevel::Medium => "🟡",
            RiskLevel::ReviewRequired => "🟠",
            RiskLevel::Fail => "🔴",
        }
    }
}

/// One line per infraction, or a fixed note when there are none
pub fn format_infractions(infractions: &[Infraction]) -> String {
    if infractions.is_empty() {
        return "No infractions found.".to_string();
    }
    infractions
        .iter()
        .map(|i| {
            format!(
                "- {}: {} ({} points)",
                i.rule_text.as_deref().unwrap_or("N/A"),
                i.rule_output.as_deref().unwrap_or("N/A"),
                i.points.unwrap_or(0)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn or_na(value: Option<&str>) -> &str {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => "N/A",
    }
}

fn section(text: String) -> Value {
    json!({
        "type": "section",
        "text": {"type": "mrkdwn", "text": text}
    })
}

fn context(text: String) -> Value {
    json!({
        "type": "context",
        "elements": [{"type": "mrkdwn", "text": text}]
    })
}

fn divider() -> Value {
    json!({"type": "divider"})
}

fn rated_section(name: &str, points: i64, infractions: &[Infraction]) -> [Value; 2] {
    let level = RiskLevel::from_points(points);
    [
        section(format!("*{}:* {} {}", name, level.emoji(), level.label())),
        context(format!(
            "Risk Level: {} | Points: {}\nInfractions:\n{}",
            level.label(),
            points,
            format_infractions(infractions)
        )),
    ]
}

/// Flags the carrier API reports outside the scored categories
pub fn protect_infractions(carrier: &Carrier) -> Vec<Infraction> {
    let mut infractions = Vec::new();
    if carrier.is_blocked {
        infractions.push(Infraction {
            points: Some(PROTECT_FLAG_POINTS),
            risk_level: Some(RiskLevel::ReviewRequired.label().to_string()),
            rule_text: Some("MyCarrierProtect: Blocked".to_string()),
            rule_output: Some("Carrier blocked by 3 or more companies".to_string()),
        });
    }
    let review_recommended = carrier
        .freight_validate_status
        .as_deref()
        .map(|s| s.eq_ignore_ascii_case("Review Recommended"))
        .unwrap_or(false);
    if review_recommended {
        infractions.push(Infraction {
            points: Some(PROTECT_FLAG_POINTS),
            risk_level: Some(RiskLevel::ReviewRequired.label().to_string()),
            rule_text: Some("FreightValidate Status".to_string()),
            rule_output: Some(
                "Carrier has a FreightValidate Review Recommended status".to_string(),
            ),
        });
    }
    infractions
}

/// Full block list for one carrier
pub fn build_risk_blocks(carrier: &Carrier, mc_number: &str) -> Vec<Value> {
    let total_points = carrier.total_points();
    let overall = RiskLevel::from_points(total_points);

    let mut blocks = vec![
        json!({
            "type": "header",
            "text": {"type": "plain_text", "text": HEADER_TEXT, "emoji": true}
        }),
        section(format!(
            "*{}*\nDOT: {} / MC: {}",
            or_na(carrier.company_name.as_deref()),
            or_na(carrier.dot_number.as_deref()),
            or_na(carrier.docket_number.as_deref())
        )),
        section(format!(
            "*Overall assessment:* {} {}",
            overall.emoji(),
            overall.label()
        )),
        context(format!("Total Points: {}", total_points)),
        divider(),
    ];

    if let Some(details) = &carrier.risk_assessment_details {
        for (name, category) in details.categories() {
            blocks.extend(rated_section(name, category.points(), &category.infractions));
        }
    }

    let protect = protect_infractions(carrier);
    if !protect.is_empty() {
        let points = protect.iter().filter_map(|i| i.points).sum();
        blocks.extend(rated_section("MyCarrierProtect", points, &protect));
        blocks.push(divider());
    }

    blocks.push(json!({
        "type": "actions",
        "block_id": "carrier_decision",
        "elements": [
            {
                "type": "button",
                "action_id": INVITE_ACTION_ID,
                "style": "primary",
                "text": {"type": "plain_text", "text": "Invite"},
                "value": mc_number
            },
            {
                "type": "button",
                "action_id": DECLINE_ACTION_ID,
                "style": "danger",
                "text": {"type": "plain_text", "text": "Decline"},
                "value": mc_number
            }
        ]
    }));

    blocks
}

/// In-channel message posted back for a slash command
pub fn build_carrier_message(carrier: &Carrier, mc_number: &str) -> SlackMessage {
    let mut message = SlackMessage::in_channel(build_risk_blocks(carrier, mc_number));
    // Notification fallback for clients that do not render blocks
    message.text = Some(format!(
        "{}: {}",
        HEADER_TEXT,
        or_na(carrier.company_name.as_deref())
    ));
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::carrier::{RiskAssessmentDetails, RiskCategory};

    fn infraction(text: &str, output: &str, points: i64) -> Infraction {
        Infraction {
            points: Some(points),
            risk_level: None,
            rule_text: Some(text.to_string()),
            rule_output: Some(output.to_string()),
        }
    }

    #[test]
    fn test_risk_level_boundaries() {
        assert_eq!(RiskLevel::from_points(0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_points(124), RiskLevel::Low);
        assert_eq!(RiskLevel::from_points(125), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_points(249), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_points(250), RiskLevel::ReviewRequired);
        assert_eq!(RiskLevel::from_points(999), RiskLevel::ReviewRequired);
        assert_eq!(RiskLevel::from_points(1000), RiskLevel::Fail);
        assert_eq!(RiskLevel::from_points(-5), RiskLevel::Low);
    }

    #[test]
    fn test_risk_level_labels_and_emoji() {
        assert_eq!(RiskLevel::Low.emoji(), "🟢");
        assert_eq!(RiskLevel::Medium.emoji(), "🟡");
        assert_eq!(RiskLevel::ReviewRequired.label(), "Review Required");
        assert_eq!(RiskLevel::Fail.emoji(), "🔴");
    }

    #[test]
    fn test_format_infractions() {
        assert_eq!(format_infractions(&[]), "No infractions found.");
        let text = format_infractions(&[
            infraction("Authority age", "Less than 1 year", 100),
            infraction("Insurance", "Lapsed", 200),
        ]);
        assert_eq!(
            text,
            "- Authority age: Less than 1 year (100 points)\n- Insurance: Lapsed (200 points)"
        );
    }

    #[test]
    fn test_blocks_for_clean_carrier() {
        let carrier = Carrier {
            company_name: Some("ACME".to_string()),
            dot_number: Some("1234567".to_string()),
            docket_number: None,
            risk_assessment_details: Some(RiskAssessmentDetails {
                total_points: Some(10),
                safety: Some(RiskCategory {
                    total_points: Some(10),
                    overall_rating: None,
                    infractions: vec![infraction("Crashes", "One", 10)],
                }),
                ..Default::default()
            }),
            is_blocked: false,
            freight_validate_status: None,
        };

        let blocks = build_risk_blocks(&carrier, "123456");
        assert_eq!(blocks[0]["text"]["text"], HEADER_TEXT);
        assert_eq!(blocks[1]["text"]["text"], "*ACME*\nDOT: 1234567 / MC: N/A");
        assert_eq!(blocks[2]["text"]["text"], "*Overall assessment:* 🟢 Low");
        assert_eq!(blocks[3]["elements"][0]["text"], "Total Points: 10");
        assert_eq!(blocks[5]["text"]["text"], "*Safety:* 🟢 Low");
        // header, company, overall, total, divider, safety x2, actions
        assert_eq!(blocks.len(), 8);

        let actions = blocks.last().unwrap();
        assert_eq!(actions["type"], "actions");
        assert_eq!(actions["elements"][0]["action_id"], INVITE_ACTION_ID);
        assert_eq!(actions["elements"][1]["value"], "123456");
    }

    #[test]
    fn test_protect_section_for_flagged_carrier() {
        let carrier = Carrier {
            is_blocked: true,
            freight_validate_status: Some("review recommended".to_string()),
            ..Default::default()
        };

        assert_eq!(protect_infractions(&carrier).len(), 2);

        let blocks = build_risk_blocks(&carrier, "123456");
        let protect = blocks
            .iter()
            .find(|b| {
                b["text"]["text"]
                    .as_str()
                    .map(|t| t.starts_with("*MyCarrierProtect:*"))
                    .unwrap_or(false)
            })
            .unwrap();
        assert_eq!(protect["text"]["text"], "*MyCarrierProtect:* 🔴 Fail");
    }

    #[test]
    fn test_carrier_message_is_in_channel() {
        let msg = build_carrier_message(&Carrier::default(), "123456");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["response_type"], "in_channel");
        assert_eq!(value["text"], "MyCarrierPortal Risk Assessment: N/A");
    }
}

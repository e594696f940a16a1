//! Typed view of an inbound form submission.
//!
//! The website posts an open-ended field map whose `source` entry names the
//! form it came from. Known forms are resolved into their own variant with a
//! fixed, ordered set of fields; anything else is kept as the raw map.

use serde_json::{Map, Value};

use super::value::{is_truthy, render_value};

/// Field carrying the form tag.
pub const SOURCE_FIELD: &str = "source";

pub const ROOFING_QUIZ: &str = "roofing-quiz";
pub const TERRACE_QUIZ: &str = "terrace-quiz";
pub const CALLBACK_MODAL: &str = "callback-modal";
pub const CTA_PHONE: &str = "cta-phone";

/// A form submission resolved by its `source` tag.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    RoofingQuiz(RoofingQuiz),
    TerraceQuiz(TerraceQuiz),
    CallbackModal(CallbackModal),
    CtaPhone(CtaPhone),
    /// Unrecognized or missing tag. Keeps every field except `source`, in
    /// insertion order.
    Other(Map<String, Value>),
}

/// Roofing works quiz.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoofingQuiz {
    pub work_type: Option<String>,
    pub roof_area: Option<String>,
    pub location: Option<String>,
    pub start_time: Option<String>,
    pub gift: Option<String>,
    pub phone: Option<String>,
}

/// Terrace and extension quiz.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TerraceQuiz {
    pub work_type: Option<String>,
    pub area: Option<String>,
    pub location: Option<String>,
    pub start_time: Option<String>,
    pub gift: Option<String>,
    pub phone: Option<String>,
}

/// "Call me back" modal window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackModal {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub context: Option<String>,
}

/// Phone number left in the free consultation block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CtaPhone {
    pub phone: Option<String>,
}

/// Read a field, keeping it only when it is truthy.
fn field(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields
        .get(key)
        .filter(|v| is_truthy(v))
        .map(render_value)
}

/// Normalize the `source` tag: stringified, trimmed, lowercased.
pub fn source_tag(fields: &Map<String, Value>) -> String {
    fields
        .get(SOURCE_FIELD)
        .map(render_value)
        .unwrap_or_default()
        .trim()
        .to_lowercase()
}

impl Submission {
    /// Resolve a raw field map into a typed submission.
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        match source_tag(&fields).as_str() {
            ROOFING_QUIZ => Submission::RoofingQuiz(RoofingQuiz {
                work_type: field(&fields, "workType"),
                roof_area: field(&fields, "roofArea"),
                location: field(&fields, "location"),
                start_time: field(&fields, "startTime"),
                gift: field(&fields, "gift"),
                phone: field(&fields, "phone"),
            }),
            TERRACE_QUIZ => Submission::TerraceQuiz(TerraceQuiz {
                work_type: field(&fields, "terraceWorkType"),
                area: field(&fields, "terraceArea"),
                location: field(&fields, "terraceLocation"),
                start_time: field(&fields, "terraceStartTime"),
                gift: field(&fields, "terraceGift"),
                phone: field(&fields, "phone"),
            }),
            CALLBACK_MODAL => Submission::CallbackModal(CallbackModal {
                name: field(&fields, "name"),
                phone: field(&fields, "phone"),
                context: field(&fields, "context"),
            }),
            CTA_PHONE => Submission::CtaPhone(CtaPhone {
                phone: field(&fields, "phone"),
            }),
            _ => Submission::Other(
                fields
                    .into_iter()
                    .filter(|(key, _)| key != SOURCE_FIELD)
                    .collect(),
            ),
        }
    }

    /// Short name of the variant, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Submission::RoofingQuiz(_) => ROOFING_QUIZ,
            Submission::TerraceQuiz(_) => TERRACE_QUIZ,
            Submission::CallbackModal(_) => CALLBACK_MODAL,
            Submission::CtaPhone(_) => CTA_PHONE,
            Submission::Other(_) => "other",
        }
    }

    /// Human-readable category line, for known forms only.
    pub fn category(&self) -> Option<&'static str> {
        match self {
            Submission::RoofingQuiz(_) => Some("Request type: Roofing works quiz"),
            Submission::TerraceQuiz(_) => Some("Request type: Terrace and extension quiz"),
            Submission::CallbackModal(_) => Some("Request type: Callback request (modal window)"),
            Submission::CtaPhone(_) => Some("Request type: Phone from the free consultation block"),
            Submission::Other(_) => None,
        }
    }

    /// Body lines below the header, in display order.
    pub fn lines(&self) -> Vec<String> {
        let labelled: Vec<(&str, &Option<String>)> = match self {
            Submission::RoofingQuiz(q) => vec![
                ("Type of work", &q.work_type),
                ("Roof area", &q.roof_area),
                ("Property location", &q.location),
                ("When to start", &q.start_time),
                ("Chosen gift", &q.gift),
                ("Client phone", &q.phone),
            ],
            Submission::TerraceQuiz(q) => vec![
                ("Type of work", &q.work_type),
                ("Extension area", &q.area),
                ("Property location", &q.location),
                ("When to start", &q.start_time),
                ("Chosen gift", &q.gift),
                ("Client phone", &q.phone),
            ],
            Submission::CallbackModal(c) => vec![
                ("Name", &c.name),
                ("Phone", &c.phone),
                ("Context", &c.context),
            ],
            Submission::CtaPhone(c) => vec![("Phone", &c.phone)],
            Submission::Other(fields) => {
                return fields
                    .iter()
                    .map(|(key, value)| format!("{}: {}", key, render_value(value)))
                    .collect();
            }
        };

        self.category()
            .map(str::to_string)
            .into_iter()
            .chain(
                labelled
                    .into_iter()
                    .filter_map(|(label, value)| {
                        value.as_ref().map(|v| format!("{}: {}", label, v))
                    }),
            )
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("Expected JSON object"),
        }
    }

    #[test]
    fn test_source_tag_is_normalized() {
        assert_eq!(source_tag(&fields(json!({"source": "  Roofing-QUIZ "}))), "roofing-quiz");
        assert_eq!(source_tag(&fields(json!({"name": "Ivan"}))), "");
    }

    #[test]
    fn test_from_fields_roofing_quiz() {
        let submission = Submission::from_fields(fields(json!({
            "source": "roofing-quiz",
            "workType": "Full replacement",
            "roofArea": 120,
            "phone": "",
        })));

        assert_eq!(
            submission,
            Submission::RoofingQuiz(RoofingQuiz {
                work_type: Some("Full replacement".to_string()),
                roof_area: Some("120".to_string()),
                ..Default::default()
            })
        );
    }

    #[test]
    fn test_from_fields_terrace_uses_prefixed_keys() {
        let submission = Submission::from_fields(fields(json!({
            "source": "terrace-quiz",
            "workType": "ignored",
            "terraceWorkType": "Veranda",
        })));

        match submission {
            Submission::TerraceQuiz(q) => {
                assert_eq!(q.work_type, Some("Veranda".to_string()));
            }
            other => panic!("Expected TerraceQuiz, got {:?}", other),
        }
    }

    #[test]
    fn test_from_fields_unknown_keeps_order_without_source() {
        let submission = Submission::from_fields(fields(json!({
            "zeta": "1",
            "source": "landing-form",
            "alpha": "",
        })));

        match submission {
            Submission::Other(map) => {
                let keys: Vec<&String> = map.keys().collect();
                assert_eq!(keys, vec!["zeta", "alpha"]);
            }
            other => panic!("Expected Other, got {:?}", other),
        }
    }

    #[test]
    fn test_cta_phone_lines() {
        let submission = Submission::from_fields(fields(json!({
            "source": "cta-phone",
            "phone": "+7 999 000-00-00",
        })));

        assert_eq!(submission.kind(), "cta-phone");
        assert_eq!(
            submission.lines(),
            vec![
                "Request type: Phone from the free consultation block".to_string(),
                "Phone: +7 999 000-00-00".to_string(),
            ]
        );
    }

    #[test]
    fn test_falsy_values_emit_no_line() {
        let submission = Submission::from_fields(fields(json!({
            "source": "callback-modal",
            "name": null,
            "phone": false,
            "context": 0,
        })));

        assert_eq!(
            submission.lines(),
            vec!["Request type: Callback request (modal window)".to_string()]
        );
    }
}

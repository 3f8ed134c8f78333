mod common;

use common::{date, definition, integer_definition};
use licensor_license::{validate_definition, validate_values, LicenseError, MatchBy};
use licensor_types::{
    FieldDefinitionId, FieldKind, FieldValue, ProvidedValue, SubmittedValue,
};
use pretty_assertions::assert_eq;

fn today() -> chrono::NaiveDate {
    date(2024, 1, 1)
}

fn validation_message(result: Result<impl std::fmt::Debug, LicenseError>) -> String {
    match result {
        Err(LicenseError::Validation(message)) => message,
        other => panic!("expected a validation error, got {other:?}"),
    }
}

// ── Counts and matching ─────────────────────────────────────────

#[test]
fn seats_out_of_range_rejected() {
    let defs = vec![integer_definition(1, "Seats", 1, 100, 5)];
    let provided = vec![ProvidedValue::by_id(FieldDefinitionId::new(1), FieldValue::Integer(500))];
    let message = validation_message(validate_values(&defs, &provided, MatchBy::Id, today()));
    assert!(message.contains("Seats"), "{message}");
    assert!(message.contains("between 1 and 100"), "{message}");
}

#[test]
fn seats_in_range_accepted() {
    let defs = vec![integer_definition(1, "Seats", 1, 100, 5)];
    for seats in [1, 50, 100] {
        let provided = vec![ProvidedValue::by_name("Seats", seats.to_string())];
        let values = validate_values(&defs, &provided, MatchBy::Name, today()).unwrap();
        assert_eq!(values[0].value, FieldValue::Integer(seats));
    }
}

#[test]
fn missing_and_extra_values_rejected() {
    let defs = vec![
        integer_definition(1, "Seats", 1, 100, 5),
        definition(2, "Note", FieldKind::Text { default: String::new() }),
    ];
    let one = vec![ProvidedValue::by_name("Seats", "5")];
    assert!(validation_message(validate_values(&defs, &one, MatchBy::Name, today()))
        .contains("expected 2"));

    let three = vec![
        ProvidedValue::by_name("Seats", "5"),
        ProvidedValue::by_name("Note", ""),
        ProvidedValue::by_name("Admin", "true"),
    ];
    assert!(validate_values(&defs, &three, MatchBy::Name, today()).is_err());
}

#[test]
fn duplicate_value_rejected() {
    let defs = vec![
        integer_definition(1, "Seats", 1, 100, 5),
        definition(2, "Note", FieldKind::Text { default: String::new() }),
    ];
    let provided = vec![
        ProvidedValue::by_name("Seats", "5"),
        ProvidedValue::by_name(" Seats ", "6"),
    ];
    let message = validation_message(validate_values(&defs, &provided, MatchBy::Name, today()));
    assert!(message.contains("more than once"), "{message}");
}

#[test]
fn unknown_name_rejected() {
    let defs = vec![integer_definition(1, "Seats", 1, 100, 5)];
    let provided = vec![ProvidedValue::by_name("seats", "5")];
    let message = validation_message(validate_values(&defs, &provided, MatchBy::Name, today()));
    assert!(message.contains("unknown custom field"), "{message}");
}

#[test]
fn by_id_requires_an_id() {
    let defs = vec![integer_definition(1, "Seats", 1, 100, 5)];
    let provided = vec![ProvidedValue::by_name("Seats", "5")];
    assert!(validate_values(&defs, &provided, MatchBy::Id, today()).is_err());
}

#[test]
fn inactive_definitions_are_ignored() {
    let mut retired = integer_definition(2, "Legacy", 0, 10, 0);
    retired.active = false;
    let defs = vec![integer_definition(1, "Seats", 1, 100, 5), retired];

    let provided = vec![ProvidedValue::by_name("Seats", "5")];
    assert_eq!(validate_values(&defs, &provided, MatchBy::Name, today()).unwrap().len(), 1);

    let smuggled = vec![
        ProvidedValue::by_name("Seats", "5"),
        ProvidedValue::by_name("Legacy", "3"),
    ];
    assert!(validate_values(&defs, &smuggled, MatchBy::Name, today()).is_err());
}

// ── Rehydration ─────────────────────────────────────────────────

#[test]
fn values_take_identity_from_definition() {
    let defs = vec![
        definition(7, "Tier", FieldKind::MultiChoice {
            options: vec!["Basic".to_string(), "Pro".to_string()],
            default: None,
        }),
        integer_definition(3, "Seats", 1, 100, 5),
    ];
    let provided = vec![
        ProvidedValue {
            definition_id: Some(FieldDefinitionId::new(3)),
            name: "Spoofed".to_string(),
            value: SubmittedValue::Typed(FieldValue::Integer(10)),
        },
        ProvidedValue::by_id(FieldDefinitionId::new(7), FieldValue::MultiChoice("Pro".to_string())),
    ];
    let values = validate_values(&defs, &provided, MatchBy::Id, today()).unwrap();

    // Definition order, names from storage.
    assert_eq!(values[0].name, "Tier");
    assert_eq!(values[0].definition_id, FieldDefinitionId::new(7));
    assert_eq!(values[1].name, "Seats");
    assert_eq!(values[1].value, FieldValue::Integer(10));
}

#[test]
fn typed_value_of_wrong_type_rejected() {
    let defs = vec![integer_definition(1, "Seats", 1, 100, 5)];
    let provided = vec![ProvidedValue::by_id(
        FieldDefinitionId::new(1),
        FieldValue::Text("5".to_string()),
    )];
    let message = validation_message(validate_values(&defs, &provided, MatchBy::Id, today()));
    assert!(message.contains("must be Integer"), "{message}");
}

// ── Per-type rules ──────────────────────────────────────────────

#[test]
fn decimal_range_and_parse() {
    let defs = vec![definition(1, "Ratio", FieldKind::Decimal { min: 0.0, max: 1.0, default: 0.5 })];
    let ok = vec![ProvidedValue::by_name("Ratio", "0.25")];
    assert_eq!(
        validate_values(&defs, &ok, MatchBy::Name, today()).unwrap()[0].value,
        FieldValue::Decimal(0.25)
    );
    for raw in ["1.5", "NaN", "abc"] {
        let bad = vec![ProvidedValue::by_name("Ratio", raw)];
        assert!(validate_values(&defs, &bad, MatchBy::Name, today()).is_err(), "{raw}");
    }
}

#[test]
fn text_accepts_empty() {
    let defs = vec![definition(1, "Note", FieldKind::Text { default: "x".to_string() })];
    let provided = vec![ProvidedValue::by_name("Note", "")];
    let values = validate_values(&defs, &provided, MatchBy::Name, today()).unwrap();
    assert_eq!(values[0].value, FieldValue::Text(String::new()));
}

#[test]
fn boolean_parses_common_spellings() {
    let defs = vec![definition(1, "Support", FieldKind::Boolean { default: false })];
    for (raw, expected) in [("true", true), ("Yes", true), ("0", false), ("off", false)] {
        let provided = vec![ProvidedValue::by_name("Support", raw)];
        let values = validate_values(&defs, &provided, MatchBy::Name, today()).unwrap();
        assert_eq!(values[0].value, FieldValue::Boolean(expected));
    }
}

#[test]
fn multichoice_must_be_an_option() {
    let defs = vec![definition(1, "Tier", FieldKind::MultiChoice {
        options: vec!["Basic".to_string(), "Pro".to_string()],
        default: Some("Basic".to_string()),
    })];
    let ok = vec![ProvidedValue::by_name("Tier", " Pro ")];
    assert_eq!(
        validate_values(&defs, &ok, MatchBy::Name, today()).unwrap()[0].value,
        FieldValue::MultiChoice("Pro".to_string())
    );
    let bad = vec![ProvidedValue::by_name("Tier", "Enterprise")];
    assert!(validation_message(validate_values(&defs, &bad, MatchBy::Name, today()))
        .contains("not one of"));
}

#[test]
fn date_must_be_after_today() {
    let defs = vec![definition(1, "Support until", FieldKind::Date { default: None })];
    let future = vec![ProvidedValue::by_name("Support until", "2024-01-02")];
    assert_eq!(
        validate_values(&defs, &future, MatchBy::Name, today()).unwrap()[0].value,
        FieldValue::Date(date(2024, 1, 2))
    );
    for raw in ["2024-01-01", "2023-12-31", "01/02/2024"] {
        let bad = vec![ProvidedValue::by_name("Support until", raw)];
        assert!(validate_values(&defs, &bad, MatchBy::Name, today()).is_err(), "{raw}");
    }
}

// ── Definitions ─────────────────────────────────────────────────

#[test]
fn definition_name_unique_among_active() {
    let existing = vec![integer_definition(1, "Seats", 1, 100, 5)];
    let duplicate = integer_definition(2, "Seats", 1, 10, 1);
    assert!(validation_message(validate_definition(&duplicate, &existing)).contains("already exists"));

    let mut retired = existing.clone();
    retired[0].active = false;
    assert!(validate_definition(&duplicate, &retired).is_ok());
}

#[test]
fn definition_constraints_checked() {
    assert!(validate_definition(&integer_definition(1, "Seats", 10, 1, 5), &[]).is_err());
    assert!(validate_definition(&integer_definition(1, "Seats", 1, 10, 50), &[]).is_err());
    assert!(validate_definition(&integer_definition(1, " ", 1, 10, 5), &[]).is_err());
    assert!(validate_definition(
        &definition(1, "Ratio", FieldKind::Decimal { min: 0.0, max: f64::INFINITY, default: 1.0 }),
        &[]
    )
    .is_err());
    assert!(validate_definition(
        &definition(1, "Tier", FieldKind::MultiChoice { options: vec![], default: None }),
        &[]
    )
    .is_err());
    assert!(validate_definition(
        &definition(1, "Tier", FieldKind::MultiChoice {
            options: vec!["Basic".to_string()],
            default: Some("Pro".to_string()),
        }),
        &[]
    )
    .is_err());
    assert!(validate_definition(&integer_definition(1, "Seats", 1, 10, 5), &[]).is_ok());
}
